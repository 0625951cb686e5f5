//! Line-oriented driver over a [`MemoryManager`].
//!
//! ```text
//!   # comments and blank lines are skipped
//!   alloc a 3
//!   write a 0 abc
//!   read  a 0 3        -> "abc"
//!   free  a
//!   compact
//!   stats
//! ```
//!
//! Offsets and sizes are parsed as signed integers so that negative values
//! reach the allocator's argument checks as [`AllocError::InvalidArgument`]
//! instead of failing to parse.

use std::{collections::HashMap, fmt};

use log::debug;
use thiserror::Error;

use crate::{AllocError, Chunk, MemoryManager, Stats};

#[derive(Debug, Error)]
pub enum ScriptError {
  #[error("line {line}: unknown command `{command}`")]
  UnknownCommand { line: usize, command: String },

  #[error("line {line}: expected {expected}")]
  Syntax { line: usize, expected: &'static str },

  #[error("line {line}: unknown chunk name `{name}`")]
  UnknownName { line: usize, name: String },

  #[error("line {line}: chunk name `{name}` is still live")]
  NameInUse { line: usize, name: String },

  #[error("line {line}: {source}")]
  Alloc {
    line: usize,
    #[source]
    source: AllocError,
  },
}

impl ScriptError {
  /// The allocator error behind this failure, if any.
  pub fn alloc_error(&self) -> Option<&AllocError> {
    match self {
      ScriptError::Alloc { source, .. } => Some(source),
      _ => None,
    }
  }
}

/// Result of one executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  Skipped,
  Allocated { name: String, offset: usize, size: usize },
  Released { name: String },
  Written { name: String, len: usize },
  Read { name: String, data: Vec<u8> },
  Compacted,
  Stats(Stats),
}

impl fmt::Display for Outcome {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Outcome::Skipped => Ok(()),
      Outcome::Allocated { name, offset, size } => {
        write!(f, "{} = {} bytes at offset {}", name, size, offset)
      }
      Outcome::Released { name } => write!(f, "{} released", name),
      Outcome::Written { name, len } => write!(f, "{} <- {} bytes", name, len),
      Outcome::Read { name, data } => {
        write!(f, "{} -> {:?}", name, String::from_utf8_lossy(data))
      }
      Outcome::Compacted => write!(f, "compacted"),
      Outcome::Stats(stats) => write!(f, "{}", stats),
    }
  }
}

/// A manager plus a table of named chunks.
///
/// Released chunks stay bound to their name, so reusing the name reports
/// the allocator's `InvalidHandle` rather than an unknown name.
pub struct Session {
  manager: MemoryManager,
  names: HashMap<String, Chunk>,
  line: usize,
}

impl Session {
  pub fn new(capacity: usize) -> Self {
    Self {
      manager: MemoryManager::new(capacity),
      names: HashMap::new(),
      line: 0,
    }
  }

  pub fn manager(&self) -> &MemoryManager {
    &self.manager
  }

  /// Executes one line.
  pub fn execute(
    &mut self,
    input: &str,
  ) -> Result<Outcome, ScriptError> {
    self.line += 1;
    let line = self.line;

    // Trailing whitespace is kept: it is part of `write` text.
    let input = input.trim_start().trim_end_matches(['\r', '\n']);
    if input.trim_end().is_empty() || input.starts_with('#') {
      return Ok(Outcome::Skipped);
    }

    let (command, rest) = split_word(input);
    debug!("line {}: {}", line, input);

    match command {
      "alloc" => {
        let (name, rest) = split_word(rest);
        let size = parse_signed(line, rest, "alloc <name> <size>")?;
        self.alloc(line, name, size)
      }
      "free" => {
        let name = expect_word(line, rest, "free <name>")?;
        let chunk = self.lookup(line, name)?;
        self.manager.release(&chunk).map_err(|source| ScriptError::Alloc { line, source })?;
        Ok(Outcome::Released { name: name.to_string() })
      }
      "write" => {
        let (name, rest) = split_word(rest);
        // Exactly one separator before the text, the rest is written verbatim.
        let (start, text) = rest
          .split_once(char::is_whitespace)
          .unwrap_or((rest, ""));
        let chunk = self.lookup(line, expect_word(line, name, "write <name> <start> <text>")?)?;
        let start = parse_signed(line, start, "write <name> <start> <text>")?;
        let start = non_negative(line, start, "write offset must be >= 0")?;
        self
          .manager
          .write(&chunk, text, start)
          .map_err(|source| ScriptError::Alloc { line, source })?;
        Ok(Outcome::Written { name: name.to_string(), len: text.len() })
      }
      "read" => {
        let (name, rest) = split_word(rest);
        let (start, len) = split_word(rest);
        let chunk = self.lookup(line, expect_word(line, name, "read <name> <start> [len]")?)?;
        let start = parse_signed(line, start, "read <name> <start> [len]")?;
        let start = non_negative(line, start, "read offset must be >= 0")?;
        let len = match len.trim() {
          "" => None,
          len => {
            let len = parse_signed(line, len, "read <name> <start> [len]")?;
            Some(non_negative(line, len, "read length must be >= 0")?)
          }
        };
        let data = self
          .manager
          .read(&chunk, start, len)
          .map_err(|source| ScriptError::Alloc { line, source })?;
        Ok(Outcome::Read { name: name.to_string(), data })
      }
      "compact" => {
        self.manager.compact().map_err(|source| ScriptError::Alloc { line, source })?;
        Ok(Outcome::Compacted)
      }
      "stats" => Ok(Outcome::Stats(self.manager.stats())),
      other => Err(ScriptError::UnknownCommand { line, command: other.to_string() }),
    }
  }

  /// Executes every line of `script`, stopping at the first error.
  pub fn run(
    &mut self,
    script: &str,
  ) -> Result<Vec<Outcome>, ScriptError> {
    script
      .lines()
      .map(|line| self.execute(line))
      .filter(|outcome| !matches!(outcome, Ok(Outcome::Skipped)))
      .collect()
  }

  fn alloc(
    &mut self,
    line: usize,
    name: &str,
    size: i64,
  ) -> Result<Outcome, ScriptError> {
    let name = expect_word(line, name, "alloc <name> <size>")?;
    if let Some(existing) = self.names.get(name) {
      if self.manager.is_live(existing) {
        return Err(ScriptError::NameInUse { line, name: name.to_string() });
      }
    }

    let size = usize::try_from(size).map_err(|_| ScriptError::Alloc {
      line,
      source: AllocError::InvalidArgument("allocation size must be > 0"),
    })?;
    let chunk = self
      .manager
      .allocate(size)
      .map_err(|source| ScriptError::Alloc { line, source })?;
    let offset = self
      .manager
      .offset_of(&chunk)
      .map_err(|source| ScriptError::Alloc { line, source })?;

    self.names.insert(name.to_string(), chunk);
    Ok(Outcome::Allocated { name: name.to_string(), offset, size })
  }

  fn lookup(
    &self,
    line: usize,
    name: &str,
  ) -> Result<Chunk, ScriptError> {
    self
      .names
      .get(name)
      .copied()
      .ok_or_else(|| ScriptError::UnknownName { line, name: name.to_string() })
  }
}

fn split_word(input: &str) -> (&str, &str) {
  let input = input.trim_start();
  match input.find(char::is_whitespace) {
    Some(at) => (&input[..at], input[at..].trim_start()),
    None => (input, ""),
  }
}

fn expect_word<'a>(
  line: usize,
  word: &'a str,
  expected: &'static str,
) -> Result<&'a str, ScriptError> {
  let word = word.trim();
  if word.is_empty() {
    return Err(ScriptError::Syntax { line, expected });
  }
  Ok(word)
}

fn parse_signed(
  line: usize,
  word: &str,
  expected: &'static str,
) -> Result<i64, ScriptError> {
  word
    .trim()
    .parse::<i64>()
    .map_err(|_| ScriptError::Syntax { line, expected })
}

fn non_negative(
  line: usize,
  value: i64,
  message: &'static str,
) -> Result<usize, ScriptError> {
  usize::try_from(value).map_err(|_| ScriptError::Alloc {
    line,
    source: AllocError::InvalidArgument(message),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fragmentation_script() {
    let mut session = Session::new(10);
    let outcomes = session
      .run(
        "alloc m1 3\n\
         alloc m2 3\n\
         alloc m3 3\n\
         free m2\n\
         write m1 0 abc\n\
         write m3 0 xyz\n\
         # needs compaction\n\
         alloc mem 4\n\
         read m1 0 3\n\
         read m3 0\n",
      )
      .unwrap();

    assert_eq!(
      outcomes[6],
      Outcome::Allocated { name: "mem".into(), offset: 6, size: 4 }
    );
    assert_eq!(outcomes[7], Outcome::Read { name: "m1".into(), data: b"abc".to_vec() });
    assert_eq!(outcomes[8], Outcome::Read { name: "m3".into(), data: b"xyz".to_vec() });
    assert_eq!(session.manager().stats().compactions, 1);
  }

  #[test]
  fn test_negative_values_are_invalid_arguments() {
    let mut session = Session::new(10);
    session.execute("alloc a 4").unwrap();

    for line in ["read a -2 3", "write a -1 x", "read a 0 -1", "alloc b -5", "alloc c 0"] {
      let err = session.execute(line).unwrap_err();
      assert!(
        matches!(err.alloc_error(), Some(AllocError::InvalidArgument(_))),
        "{}: {}",
        line,
        err
      );
    }
    assert_eq!(session.manager().free_bytes(), 6);
  }

  #[test]
  fn test_released_name_reports_invalid_handle() {
    let mut session = Session::new(10);
    session.execute("alloc a 4").unwrap();
    session.execute("free a").unwrap();

    for line in ["read a 0", "write a 0 x", "free a"] {
      let err = session.execute(line).unwrap_err();
      assert!(matches!(
        err.alloc_error(),
        Some(AllocError::InvalidHandle { .. })
      ));
    }

    // The name can be rebound once its chunk is gone.
    assert!(session.execute("alloc a 2").is_ok());
  }

  #[test]
  fn test_parse_errors() {
    let mut session = Session::new(10);

    assert!(matches!(
      session.execute("grow a 4"),
      Err(ScriptError::UnknownCommand { line: 1, .. })
    ));
    assert!(matches!(
      session.execute("alloc a"),
      Err(ScriptError::Syntax { line: 2, .. })
    ));
    assert!(matches!(
      session.execute("free nobody"),
      Err(ScriptError::UnknownName { line: 3, .. })
    ));

    session.execute("alloc a 1").unwrap();
    assert!(matches!(
      session.execute("alloc a 1"),
      Err(ScriptError::NameInUse { .. })
    ));
  }

  #[test]
  fn test_write_keeps_spaces_in_text() {
    let mut session = Session::new(16);
    session.execute("alloc a 16").unwrap();
    session.execute("write a 0 hello world").unwrap();

    assert_eq!(
      session.execute("read a 0 11").unwrap(),
      Outcome::Read { name: "a".into(), data: b"hello world".to_vec() }
    );
  }

  #[test]
  fn test_write_keeps_surrounding_spaces_in_text() {
    let mut session = Session::new(8);
    session.execute("alloc a 8").unwrap();

    assert_eq!(
      session.execute("write a 0  hi  \n").unwrap(),
      Outcome::Written { name: "a".into(), len: 5 }
    );
    assert_eq!(
      session.execute("read a 0 5").unwrap(),
      Outcome::Read { name: "a".into(), data: b" hi  ".to_vec() }
    );
  }

  #[test]
  fn test_split_word() {
    assert_eq!(split_word("  alloc a 3"), ("alloc", "a 3"));
    assert_eq!(split_word("stats"), ("stats", ""));
  }
}
