/// A contiguous unused range of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSlot {
  pub offset: usize,
  pub len: usize,
}

impl FreeSlot {
  pub fn new(
    offset: usize,
    len: usize,
  ) -> Self {
    Self { offset, len }
  }

  pub fn end(&self) -> usize {
    self.offset + self.len
  }
}

/// Free slots in insertion order.
///
/// The order is not sorted by offset or length: released ranges are appended
/// at the back and first-fit scans from the front, so a slot split by an
/// allocation keeps its position in the list.
///
/// ```text
///   index:   0         1         2
///          ┌───────┐ ┌───────┐ ┌───────┐
///          │ 9 : 1 │ │ 3 : 3 │ │ 0 : 2 │   offset : len
///          └───────┘ └───────┘ └───────┘
///   take(2) skips #0 (too small), splits #1 -> (5 : 1), returns 3
/// ```
#[derive(Debug, Clone, Default)]
pub(crate) struct FreeList {
  slots: Vec<FreeSlot>,
}

impl FreeList {
  /// A list holding one slot covering `[0, capacity)`, or nothing when
  /// `capacity` is zero.
  pub fn with_capacity(capacity: usize) -> Self {
    let mut list = Self::default();
    list.reset_trailing(0, capacity);
    list
  }

  /// First-fit: carves `size` bytes out of the first slot large enough and
  /// returns the offset of the carved range.
  pub fn take_first_fit(
    &mut self,
    size: usize,
  ) -> Option<usize> {
    let index = self.slots.iter().position(|slot| slot.len >= size)?;
    let slot = &mut self.slots[index];
    let offset = slot.offset;

    if slot.len == size {
      self.slots.remove(index);
    } else {
      slot.offset += size;
      slot.len -= size;
    }

    Some(offset)
  }

  pub fn push(
    &mut self,
    slot: FreeSlot,
  ) {
    self.slots.push(slot);
  }

  /// Replaces every slot with a single `[offset, capacity)` slot, or with
  /// nothing when that range is empty.
  pub fn reset_trailing(
    &mut self,
    offset: usize,
    capacity: usize,
  ) {
    self.slots.clear();
    if offset < capacity {
      self.slots.push(FreeSlot::new(offset, capacity - offset));
    }
  }

  pub fn total(&self) -> usize {
    self.slots.iter().map(|slot| slot.len).sum()
  }

  pub fn largest(&self) -> usize {
    self.slots.iter().map(|slot| slot.len).max().unwrap_or(0)
  }

  pub fn len(&self) -> usize {
    self.slots.len()
  }

  pub fn as_slice(&self) -> &[FreeSlot] {
    &self.slots
  }
}
