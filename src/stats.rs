use std::fmt;

/// Snapshot of a manager's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
  pub capacity: usize,
  pub free_bytes: usize,
  pub used_bytes: usize,
  pub live_chunks: usize,
  pub free_slots: usize,
  pub largest_free_slot: usize,
  /// Compaction passes run since construction.
  pub compactions: u64,
}

impl Stats {
  /// Share of free bytes that cannot be served by the largest free slot.
  ///
  /// `0.0` means all free space is contiguous (or nothing is free); values
  /// approaching `1.0` mean free space is scattered in many small slots.
  pub fn fragmentation(&self) -> f64 {
    if self.free_bytes == 0 {
      return 0.0;
    }
    1.0 - self.largest_free_slot as f64 / self.free_bytes as f64
  }
}

impl fmt::Display for Stats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "capacity={} used={} free={} chunks={} slots={} largest={} fragmentation={:.2} compactions={}",
      self.capacity,
      self.used_bytes,
      self.free_bytes,
      self.live_chunks,
      self.free_slots,
      self.largest_free_slot,
      self.fragmentation(),
      self.compactions,
    )
  }
}
