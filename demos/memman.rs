use std::{
  fs,
  io::{self, BufRead, Read, Write},
  path::PathBuf,
};

use anyhow::{Context, Result};
use bufallocator::{
  MemoryManager,
  script::{Outcome, Session},
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "memman")]
#[command(about = "Drive a compacting buffer allocator from a script or stdin")]
struct Args {
  /// Buffer capacity in bytes
  #[arg(long, default_value_t = 100)]
  capacity: usize,

  /// Script file with one command per line (reads stdin when omitted)
  #[arg(long)]
  script: Option<PathBuf>,

  /// Run the guided fragmentation walkthrough instead of a script
  #[arg(long)]
  walkthrough: bool,
}

/// Waits until the user presses ENTER.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = io::stdin().bytes().next();
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let args = Args::parse();
  log::info!("memman: capacity = {} bytes", args.capacity);

  if args.walkthrough {
    return walkthrough();
  }

  let mut session = Session::new(args.capacity);

  match args.script {
    Some(path) => {
      let script = fs::read_to_string(&path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
      for line in script.lines() {
        report(&mut session, line);
      }
    }
    None => {
      let stdin = io::stdin();
      for line in stdin.lock().lines() {
        report(&mut session, &line.context("failed to read stdin")?);
        io::stdout().flush()?;
      }
    }
  }

  print!("{}", session.manager());
  Ok(())
}

/// Runs one command and prints its outcome. Errors are printed, not fatal,
/// unless the manager reports a defect.
fn report(
  session: &mut Session,
  line: &str,
) {
  match session.execute(line) {
    Ok(Outcome::Skipped) => {}
    Ok(outcome) => println!("{}", outcome),
    Err(err) => {
      if err.alloc_error().is_some_and(|err| err.is_fatal()) {
        log::error!("{}", err);
      } else {
        println!("error: {}", err);
      }
    }
  }
}

fn walkthrough() -> Result<()> {
  let mut manager = MemoryManager::new(10);

  println!("[start]\n{}", manager);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Fill nine of ten bytes with three 3-byte chunks.
  // --------------------------------------------------------------------
  let m1 = manager.allocate(3)?;
  let m2 = manager.allocate(3)?;
  let m3 = manager.allocate(3)?;
  manager.write(&m1, "abc", 0)?;
  manager.write(&m3, "xyz", 0)?;
  println!("\n[1] Allocate three chunks of 3 bytes\n{}", manager);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Free the middle chunk. Four bytes are free, but split in two slots.
  // --------------------------------------------------------------------
  manager.release(&m2)?;
  println!("\n[2] Release the middle chunk\n{}", manager);
  println!("[2] free slots = {:?}", manager.free_slots());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Ask for 4 bytes. First-fit fails, so the buffer is compacted.
  // --------------------------------------------------------------------
  let big = manager.allocate(4)?;
  println!("\n[3] Allocate 4 bytes (forces compaction)\n{}", manager);
  println!(
    "[3] new chunk at offset {}, m1 = {:?}, m3 = {:?}",
    manager.offset_of(&big)?,
    String::from_utf8_lossy(&manager.read(&m1, 0, None)?),
    String::from_utf8_lossy(&manager.read(&m3, 0, None)?),
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) The released handle stays dead.
  // --------------------------------------------------------------------
  match manager.read(&m2, 0, None) {
    Ok(_) => println!("\n[4] released chunk was readable?!"),
    Err(err) => println!("\n[4] read through released chunk: {}", err),
  }

  println!("\n[5] End of walkthrough.");
  Ok(())
}
