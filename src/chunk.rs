use std::fmt;

/// Identity of one allocation. Never reused by the manager that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub(crate) u64);

impl fmt::Display for ChunkId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Handle to a live allocation.
///
/// A chunk carries its identity and its (immutable) size, nothing else. The
/// current offset lives in the manager's placement table, so compaction can
/// move the bytes without touching handles held by callers.
///
/// ```text
///   Chunk { id: #3, size: 4 }
///        │
///        ▼  lookup by id
///   ┌────────────────────────┐
///   │ placements             │
///   │   #1 -> offset 0       │
///   │   #3 -> offset 6  ─────┼──► buf[6..10]
///   └────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
  id: ChunkId,
  size: usize,
}

impl Chunk {
  pub(crate) fn new(
    id: ChunkId,
    size: usize,
  ) -> Self {
    Self { id, size }
  }

  pub fn id(&self) -> ChunkId {
    self.id
  }

  pub fn size(&self) -> usize {
    self.size
  }
}
