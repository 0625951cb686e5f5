use std::{
  collections::HashMap,
  fmt,
  sync::atomic::{AtomicU64, Ordering},
};

use log::{debug, error, trace, warn};

use crate::{
  chunk::{Chunk, ChunkId},
  error::{AllocError, Result},
  free_list::{FreeList, FreeSlot},
  stats::Stats,
};

/// Ids are drawn from one process-wide counter, so a chunk issued by one
/// manager is never accepted by another.
static NEXT_CHUNK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy)]
struct Placement {
  offset: usize,
  size: usize,
}

impl Placement {
  fn end(&self) -> usize {
    self.offset + self.size
  }
}

/// Allocator over one fixed-size byte buffer.
///
/// ```text
///   capacity = 10
///
///   offset:  0   1   2   3   4   5   6   7   8   9
///          ┌───────────┬───────────┬───────────┬───┐
///          │    #1     │   free    │    #3     │ f │
///          └───────────┴───────────┴───────────┴───┘
///   free list (insertion order): [(9, 1), (3, 3)]
///
///   allocate(4): no slot fits -> compact -> first-fit again
///
///          ┌───────────┬───────────┬───────────────┐
///          │    #1     │    #3     │      #4       │
///          └───────────┴───────────┴───────────────┘
/// ```
///
/// All operations need exclusive access; the manager does no locking.
pub struct MemoryManager {
  buf: Box<[u8]>,
  free_bytes: usize,
  /// Live set, keyed by chunk identity, holding each chunk's current offset.
  placements: HashMap<ChunkId, Placement>,
  free_list: FreeList,
  compactions: u64,
  poisoned: bool,
}

impl MemoryManager {
  pub fn new(capacity: usize) -> Self {
    debug!("new memory manager, capacity = {} bytes", capacity);

    Self {
      buf: vec![0u8; capacity].into_boxed_slice(),
      free_bytes: capacity,
      placements: HashMap::new(),
      free_list: FreeList::with_capacity(capacity),
      compactions: 0,
      poisoned: false,
    }
  }

  /// Allocates `size` zeroed bytes.
  ///
  /// Placement is first-fit over the free list in its current order. When
  /// enough bytes are free in aggregate but no single slot can hold `size`,
  /// the buffer is compacted once and placement is retried.
  ///
  /// # Errors
  ///
  /// - [`AllocError::InvalidArgument`] when `size` is zero.
  /// - [`AllocError::OutOfMemory`] when fewer than `size` bytes are free.
  /// - [`AllocError::InternalDefect`] when bookkeeping turns out to be
  ///   inconsistent; the manager is poisoned afterwards.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Chunk> {
    self.ensure_sound()?;

    if size == 0 {
      return Err(AllocError::InvalidArgument("allocation size must be > 0"));
    }

    if size > self.free_bytes {
      debug!(
        "allocate({}) rejected, only {} bytes free",
        size, self.free_bytes
      );
      return Err(AllocError::OutOfMemory {
        requested: size,
        free: self.free_bytes,
      });
    }

    let offset = match self.free_list.take_first_fit(size) {
      Some(offset) => offset,
      None => {
        warn!(
          "allocate({}): {} bytes free across {} slots but none fits, compacting",
          size,
          self.free_bytes,
          self.free_list.len()
        );
        self.compact()?;

        match self.free_list.take_first_fit(size) {
          Some(offset) => offset,
          None => {
            return Err(self.defect(format!(
              "no slot fits {} bytes after compaction ({} bytes free)",
              size, self.free_bytes
            )));
          }
        }
      }
    };

    self.buf[offset..offset + size].fill(0);

    let id = ChunkId(NEXT_CHUNK_ID.fetch_add(1, Ordering::Relaxed));
    self.placements.insert(id, Placement { offset, size });
    self.free_bytes -= size;

    debug!(
      "allocated chunk {} at offset {}, size = {}, free = {}",
      id, offset, size, self.free_bytes
    );

    Ok(Chunk::new(id, size))
  }

  /// Copies `len` bytes of `chunk` starting at `start`. A `len` of `None`
  /// stands for the whole chunk size, so it only fits when `start` is 0.
  pub fn read(
    &self,
    chunk: &Chunk,
    start: usize,
    len: Option<usize>,
  ) -> Result<Vec<u8>> {
    self.ensure_sound()?;
    let placement = self.placement(chunk)?;

    let len = len.unwrap_or(placement.size);
    check_bounds(start, len, placement.size)?;

    let from = placement.offset + start;
    trace!("read chunk {} [{}..{})", chunk.id(), start, start + len);

    Ok(self.buf[from..from + len].to_vec())
  }

  /// Copies `data` into `chunk` starting at `start`.
  ///
  /// Accepts text (`&str`, `String`) as its UTF-8 bytes or raw bytes. Bytes
  /// of the chunk outside the written range are left as they are.
  pub fn write(
    &mut self,
    chunk: &Chunk,
    data: impl AsRef<[u8]>,
    start: usize,
  ) -> Result<()> {
    self.ensure_sound()?;
    let placement = self.placement(chunk)?;

    let data = data.as_ref();
    check_bounds(start, data.len(), placement.size)?;

    let from = placement.offset + start;
    self.buf[from..from + data.len()].copy_from_slice(data);
    trace!(
      "wrote chunk {} [{}..{})",
      chunk.id(),
      start,
      start + data.len()
    );

    Ok(())
  }

  /// Returns `chunk`'s range to the free list. The handle is invalid from
  /// here on.
  pub fn release(
    &mut self,
    chunk: &Chunk,
  ) -> Result<()> {
    self.ensure_sound()?;

    let placement = self
      .placements
      .remove(&chunk.id())
      .ok_or(AllocError::InvalidHandle { id: chunk.id() })?;

    self.free_list.push(FreeSlot::new(placement.offset, placement.size));
    self.free_bytes += placement.size;

    debug!(
      "released chunk {} at offset {}, size = {}, free = {}",
      chunk.id(),
      placement.offset,
      placement.size,
      self.free_bytes
    );

    Ok(())
  }

  /// Moves every live chunk towards offset 0, in offset order, and
  /// collapses the free list into one trailing slot.
  ///
  /// Chunk contents, sizes and identities are preserved; only offsets
  /// change.
  pub fn compact(&mut self) -> Result<()> {
    self.ensure_sound()?;

    let mut order: Vec<&mut Placement> = self.placements.values_mut().collect();
    order.sort_unstable_by_key(|placement| placement.offset);

    let mut next_offset = 0;
    let mut moved = 0usize;

    for placement in order {
      if placement.offset != next_offset {
        // Regions may overlap; copy_within has memmove semantics.
        self
          .buf
          .copy_within(placement.offset..placement.end(), next_offset);
        placement.offset = next_offset;
        moved += 1;
      }
      next_offset += placement.size;
    }

    let used = self.capacity().saturating_sub(self.free_bytes);
    if next_offset != used {
      return Err(self.defect(format!(
        "compaction ended at offset {} but {} bytes are in use",
        next_offset, used
      )));
    }

    self.free_list.reset_trailing(next_offset, self.buf.len());
    self.compactions += 1;

    debug!(
      "compacted: moved {} of {} chunks, free slot at offset {}",
      moved,
      self.placements.len(),
      next_offset
    );

    Ok(())
  }

  pub fn capacity(&self) -> usize {
    self.buf.len()
  }

  pub fn free_bytes(&self) -> usize {
    self.free_bytes
  }

  pub fn live_count(&self) -> usize {
    self.placements.len()
  }

  pub fn is_live(
    &self,
    chunk: &Chunk,
  ) -> bool {
    self.placements.contains_key(&chunk.id())
  }

  pub fn is_poisoned(&self) -> bool {
    self.poisoned
  }

  /// Current offset of `chunk` in the buffer. Changes when the buffer is
  /// compacted.
  pub fn offset_of(
    &self,
    chunk: &Chunk,
  ) -> Result<usize> {
    self.ensure_sound()?;
    Ok(self.placement(chunk)?.offset)
  }

  pub fn free_slots(&self) -> &[FreeSlot] {
    self.free_list.as_slice()
  }

  pub fn stats(&self) -> Stats {
    Stats {
      capacity: self.capacity(),
      free_bytes: self.free_bytes,
      used_bytes: self.capacity().saturating_sub(self.free_bytes),
      live_chunks: self.placements.len(),
      free_slots: self.free_list.len(),
      largest_free_slot: self.free_list.largest(),
      compactions: self.compactions,
    }
  }

  /// Audits all bookkeeping: byte conservation, free counter agreement,
  /// and that live chunks and free slots tile the buffer without overlap.
  ///
  /// A failed audit poisons the manager.
  pub fn validate(&mut self) -> Result<()> {
    self.ensure_sound()?;

    let live_total: usize = self.placements.values().map(|p| p.size).sum();
    if live_total + self.free_bytes != self.capacity() {
      return Err(self.defect(format!(
        "{} live bytes + {} free bytes != capacity {}",
        live_total,
        self.free_bytes,
        self.capacity()
      )));
    }

    let listed = self.free_list.total();
    if listed != self.free_bytes {
      return Err(self.defect(format!(
        "free list holds {} bytes, counter says {}",
        listed, self.free_bytes
      )));
    }

    let mut ranges: Vec<(usize, usize)> = self
      .placements
      .values()
      .map(|p| (p.offset, p.end()))
      .chain(self.free_list.as_slice().iter().map(|s| (s.offset, s.end())))
      .collect();
    ranges.sort_unstable();

    let mut prev_end = 0;
    for (start, end) in ranges {
      if start < prev_end {
        return Err(self.defect(format!(
          "range [{}..{}) overlaps a range ending at {}",
          start, end, prev_end
        )));
      }
      prev_end = end;
    }

    if prev_end > self.capacity() {
      return Err(self.defect(format!(
        "range ends at {} past capacity {}",
        prev_end,
        self.capacity()
      )));
    }

    Ok(())
  }

  fn placement(
    &self,
    chunk: &Chunk,
  ) -> Result<Placement> {
    self
      .placements
      .get(&chunk.id())
      .copied()
      .ok_or(AllocError::InvalidHandle { id: chunk.id() })
  }

  fn ensure_sound(&self) -> Result<()> {
    if self.poisoned {
      return Err(AllocError::InternalDefect(
        "memory manager was poisoned by an earlier internal defect".to_string(),
      ));
    }
    Ok(())
  }

  fn defect(
    &mut self,
    message: String,
  ) -> AllocError {
    error!("internal defect, poisoning memory manager: {}", message);
    self.poisoned = true;
    AllocError::InternalDefect(message)
  }
}

fn check_bounds(
  start: usize,
  len: usize,
  size: usize,
) -> Result<()> {
  match start.checked_add(len) {
    Some(end) if end <= size => Ok(()),
    _ => Err(AllocError::OutOfBounds { start, len, size }),
  }
}

impl fmt::Display for MemoryManager {
  /// One line per region, in offset order.
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let mut regions: Vec<(usize, usize, Option<ChunkId>)> = self
      .placements
      .iter()
      .map(|(id, p)| (p.offset, p.size, Some(*id)))
      .chain(
        self
          .free_list
          .as_slice()
          .iter()
          .map(|s| (s.offset, s.len, None)),
      )
      .collect();
    regions.sort_unstable_by_key(|(offset, _, _)| *offset);

    writeln!(f, "{}", self.stats())?;
    for (offset, len, owner) in regions {
      match owner {
        Some(id) => writeln!(f, "  [{:>6}..{:>6})  chunk {}", offset, offset + len, id)?,
        None => writeln!(f, "  [{:>6}..{:>6})  free", offset, offset + len)?,
      }
    }
    Ok(())
  }
}
