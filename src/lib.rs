//! # bufallocator - A Compacting Buffer Allocator
//!
//! This crate manages sub-ranges of one fixed-size byte buffer. Callers get
//! opaque [`Chunk`] handles back from [`MemoryManager::allocate`] and go
//! through the manager for every read, write and release.
//!
//! ## Overview
//!
//! Free space is tracked as a list of `(offset, len)` slots. Allocation is
//! **first-fit** over that list; when enough bytes are free overall but no
//! single slot is large enough, the manager **compacts** the buffer and
//! tries again:
//!
//! ```text
//!   Before (capacity 10, 4 bytes free but fragmented):
//!
//!   ┌───────────┬───────────┬───────────┬───┐
//!   │   m1      │   free    │   m3      │ f │
//!   └───────────┴───────────┴───────────┴───┘
//!   0           3           6           9  10
//!
//!   allocate(4) -> first-fit fails -> compact -> first-fit succeeds:
//!
//!   ┌───────────┬───────────┬───────────────┐
//!   │   m1      │   m3      │     new       │
//!   └───────────┴───────────┴───────────────┘
//!   0           3           6              10
//! ```
//!
//! Compaction moves bytes, never handles: a chunk's offset lives in the
//! manager's placement table, keyed by the chunk's identity.
//!
//! ## Crate Structure
//!
//! ```text
//!   bufallocator
//!   ├── chunk      - Chunk handle and ChunkId
//!   ├── error      - AllocError and Result
//!   ├── free_list  - FreeSlot / FreeList (first-fit, insertion order)
//!   ├── manager    - MemoryManager
//!   ├── script     - line-oriented command driver
//!   └── stats      - Stats snapshot
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use bufallocator::MemoryManager;
//!
//! let mut manager = MemoryManager::new(100);
//!
//! let chunk = manager.allocate(10).unwrap();
//! manager.write(&chunk, "hello!", 0).unwrap();
//! assert_eq!(manager.read(&chunk, 0, Some(6)).unwrap(), b"hello!");
//!
//! manager.release(&chunk).unwrap();
//! assert!(manager.read(&chunk, 0, None).is_err());
//! ```
//!
//! ## Errors
//!
//! Every operation returns [`Result`]. Argument and handle errors leave the
//! manager untouched. [`AllocError::InternalDefect`] means bookkeeping is
//! inconsistent: the manager poisons itself and rejects all later calls.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: operations take `&mut self`; wrap the manager
//!   in a `Mutex` to share it.
//! - **No alignment**: chunks are byte ranges, not typed memory.
//! - **Whole-buffer compaction**: a fragmented allocation moves every live
//!   chunk that is not already packed at the front.

mod chunk;
mod error;
mod free_list;
mod manager;
pub mod script;
mod stats;

pub use chunk::{Chunk, ChunkId};
pub use error::{AllocError, Result};
pub use free_list::FreeSlot;
pub use manager::MemoryManager;
pub use stats::Stats;
