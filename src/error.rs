use thiserror::Error;

use crate::chunk::ChunkId;

/// Errors returned by [`MemoryManager`](crate::MemoryManager) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
  #[error("out of memory (requested: {requested} bytes, free: {free} bytes)")]
  OutOfMemory { requested: usize, free: usize },

  #[error("unrecognized memory chunk {id}")]
  InvalidHandle { id: ChunkId },

  #[error("invalid argument: {0}")]
  InvalidArgument(&'static str),

  #[error("out of chunk boundaries (start: {start}, len: {len}, chunk size: {size})")]
  OutOfBounds { start: usize, len: usize, size: usize },

  #[error("internal defect: {0}")]
  InternalDefect(String),
}

impl AllocError {
  /// `true` when the manager that produced this error can no longer be trusted.
  pub fn is_fatal(&self) -> bool {
    matches!(self, AllocError::InternalDefect(_))
  }
}

pub type Result<T> = core::result::Result<T, AllocError>;
