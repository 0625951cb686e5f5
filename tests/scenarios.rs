use bufallocator::{AllocError, FreeSlot, MemoryManager};

#[test]
fn test_sanity() {
  let mut manager = MemoryManager::new(100);
  let mem = manager.allocate(10).unwrap();

  manager.write(&mem, "hello!", 0).unwrap();
  assert_eq!(manager.read(&mem, 0, Some(6)).unwrap(), b"hello!");

  // exact fit
  manager.write(&mem, "1234567890", 0).unwrap();
  assert_eq!(manager.read(&mem, 0, None).unwrap(), b"1234567890");
  assert_eq!(manager.read(&mem, 0, Some(10)).unwrap(), b"1234567890");

  assert!(matches!(
    manager.write(&mem, "hello world!!!", 0),
    Err(AllocError::OutOfBounds { .. })
  ));
  assert!(matches!(
    manager.read(&mem, 0, Some(30)),
    Err(AllocError::OutOfBounds { .. })
  ));
  assert!(matches!(
    manager.allocate(100),
    Err(AllocError::OutOfMemory { requested: 100, free: 90 })
  ));

  manager.release(&mem).unwrap();
  let m1 = manager.allocate(3).unwrap();
  let m2 = manager.allocate(3).unwrap();
  let m3 = manager.allocate(3).unwrap();
  manager.write(&m1, "abc", 0).unwrap();
  manager.write(&m2, "xyz", 0).unwrap();
  manager.write(&m3, "qwe", 0).unwrap();

  assert_eq!(manager.read(&m1, 0, Some(3)).unwrap(), b"abc");
  assert_eq!(manager.read(&m2, 0, Some(3)).unwrap(), b"xyz");
  assert_eq!(manager.read(&m3, 0, Some(3)).unwrap(), b"qwe");
}

#[test]
fn test_free_then_reuse() {
  let mut manager = MemoryManager::new(10);
  let first = manager.allocate(9).unwrap();
  manager.release(&first).unwrap();

  let mem = manager.allocate(9).unwrap();
  manager.write(&mem, "test", 0).unwrap();

  assert!(matches!(
    manager.allocate(2),
    Err(AllocError::OutOfMemory { .. })
  ));

  let one_byte = manager.allocate(1).unwrap();
  assert_eq!(manager.read(&mem, 0, Some(4)).unwrap(), b"test");

  manager.write(&one_byte, "X", 0).unwrap();
  assert_eq!(manager.read(&one_byte, 0, None).unwrap(), b"X");
}

#[test]
fn test_fragmented_allocation_compacts() {
  let mut manager = MemoryManager::new(10);
  let m1 = manager.allocate(3).unwrap();
  let m2 = manager.allocate(3).unwrap();
  let m3 = manager.allocate(3).unwrap();
  assert_eq!(manager.offset_of(&m1).unwrap(), 0);
  assert_eq!(manager.offset_of(&m2).unwrap(), 3);
  assert_eq!(manager.offset_of(&m3).unwrap(), 6);

  manager.release(&m2).unwrap();
  assert_eq!(manager.free_bytes(), 4);
  assert_eq!(
    manager.free_slots(),
    &[FreeSlot::new(9, 1), FreeSlot::new(3, 3)]
  );

  manager.write(&m1, "abc", 0).unwrap();
  manager.write(&m3, "xyz", 0).unwrap();

  let mem = manager.allocate(4).unwrap();

  assert_eq!(manager.stats().compactions, 1);
  assert_eq!(manager.offset_of(&m1).unwrap(), 0);
  assert_eq!(manager.offset_of(&m3).unwrap(), 3);
  assert_eq!(manager.offset_of(&mem).unwrap(), 6);
  assert!(manager.free_slots().is_empty());

  assert_eq!(manager.read(&m1, 0, Some(3)).unwrap(), b"abc");
  assert_eq!(manager.read(&m3, 0, Some(3)).unwrap(), b"xyz");
  assert_eq!(manager.read(&mem, 0, None).unwrap(), vec![0u8; 4]);

  manager.write(&mem, "test", 0).unwrap();
  assert_eq!(manager.read(&mem, 0, Some(4)).unwrap(), b"test");

  manager.write(&m1, "ABC", 0).unwrap();
  assert_eq!(manager.read(&m1, 0, Some(3)).unwrap(), b"ABC");
  assert!(manager.validate().is_ok());
}

#[test]
fn test_out_of_memory_after_any_allocation() {
  let mut manager = MemoryManager::new(100);
  let _one = manager.allocate(1).unwrap();

  assert!(matches!(
    manager.allocate(100),
    Err(AllocError::OutOfMemory { requested: 100, free: 99 })
  ));
  assert_eq!(manager.stats().compactions, 0);
}

#[test]
fn test_released_chunk_is_dead() {
  let mut manager = MemoryManager::new(8);
  let chunk = manager.allocate(8).unwrap();
  manager.release(&chunk).unwrap();

  let id = chunk.id();
  assert_eq!(
    manager.read(&chunk, 0, None),
    Err(AllocError::InvalidHandle { id })
  );
  assert_eq!(
    manager.write(&chunk, "x", 0),
    Err(AllocError::InvalidHandle { id })
  );
  assert_eq!(manager.release(&chunk), Err(AllocError::InvalidHandle { id }));

  // A new allocation at the same offset is a different chunk.
  let again = manager.allocate(8).unwrap();
  assert_eq!(manager.offset_of(&again).unwrap(), 0);
  assert_ne!(again, chunk);
  assert!(manager.read(&chunk, 0, None).is_err());
}

#[test]
fn test_text_and_bytes_are_equivalent() {
  let mut manager = MemoryManager::new(16);
  let text = manager.allocate(5).unwrap();
  let bytes = manager.allocate(5).unwrap();

  // Five characters, six bytes once encoded.
  assert!(matches!(
    manager.write(&text, "héllo", 0),
    Err(AllocError::OutOfBounds { start: 0, len: 6, size: 5 })
  ));
  manager.write(&text, "hello", 0).unwrap();
  manager.write(&bytes, vec![b'h', b'e', b'l', b'l', b'o'], 0).unwrap();

  assert_eq!(
    manager.read(&text, 0, None).unwrap(),
    manager.read(&bytes, 0, None).unwrap()
  );
}
