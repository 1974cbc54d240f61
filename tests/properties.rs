use std::{ptr::NonNull, slice};

use brkalloc::{AllocError, Arena, BlockInfo, FirstFit, HEADER_SIZE, MIN_PAYLOAD};
use test_log::test;
use typenum::consts::U1;

/// Byte-exact sizes, no rounding.
type ExactHeap = FirstFit<Arena, U1>;
type WordHeap = FirstFit<Arena>;

fn exact_heap() -> ExactHeap {
  FirstFit::new(Arena::with_capacity(64 * 1024))
}

fn word_heap() -> WordHeap {
  FirstFit::new(Arena::with_capacity(64 * 1024))
}

/// Deterministic byte pattern, different for every `seed`.
fn pattern(
  seed: usize,
  len: usize,
) -> Vec<u8> {
  let mut state = seed as u32 ^ 0x9E37_79B9;
  (0..len)
    .map(|_| {
      state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
      (state >> 24) as u8
    })
    .collect()
}

unsafe fn fill(
  ptr: NonNull<u8>,
  bytes: &[u8],
) {
  unsafe { ptr.as_ptr().copy_from_nonoverlapping(bytes.as_ptr(), bytes.len()) }
}

unsafe fn contents<'a>(
  ptr: NonNull<u8>,
  len: usize,
) -> &'a [u8] {
  unsafe { slice::from_raw_parts(ptr.as_ptr(), len) }
}

#[test]
fn zeroed_allocations_read_as_zero() {
  let mut heap = word_heap();

  for (count, element_size) in [(1, 1), (10, 4), (3, 17), (64, 8), (1, 1000)] {
    // Leave garbage behind for the zeroed allocation to land on.
    let dirty = heap.allocate(count * element_size).unwrap();
    unsafe {
      dirty.as_ptr().write_bytes(0xEE, count * element_size);
      heap.release(Some(dirty)).unwrap();
    }

    let clean = heap.allocate_zeroed(count, element_size).unwrap();

    unsafe {
      assert!(contents(clean, count * element_size).iter().all(|&b| b == 0));
      heap.release(Some(clean)).unwrap();
    }
  }
}

#[test]
fn payload_round_trip() {
  let mut heap = FirstFit::<Arena>::new(Arena::with_capacity(1 << 20));
  let sizes = [1, 2, 7, 8, 9, 31, 100, 255, 1000, 4096, 65_537, 200_000];

  let live: Vec<(NonNull<u8>, Vec<u8>)> = sizes
    .iter()
    .enumerate()
    .map(|(seed, &size)| {
      let ptr = heap.allocate(size).unwrap();
      let bytes = pattern(seed, size);
      unsafe { fill(ptr, &bytes) };
      (ptr, bytes)
    })
    .collect();

  for (ptr, bytes) in &live {
    unsafe { assert_eq!(contents(*ptr, bytes.len()), bytes.as_slice()) };
  }
}

#[test]
fn first_fit_picks_earliest_sufficient_block() {
  let mut heap = exact_heap();

  let small = heap.allocate(50).unwrap();
  heap.allocate(8).unwrap();
  let medium = heap.allocate(100).unwrap();
  heap.allocate(8).unwrap();
  let large = heap.allocate(150).unwrap();
  heap.allocate(8).unwrap();

  unsafe {
    heap.release(Some(small)).unwrap();
    heap.release(Some(medium)).unwrap();
    heap.release(Some(large)).unwrap();
  }

  let grows = heap.grower().grow_calls();

  assert_eq!(heap.allocate(80), Ok(medium));
  assert_eq!(heap.grower().grow_calls(), grows);
}

#[test]
fn split_threshold_with_exact_sizes() {
  let mut heap = exact_heap();

  let roomy = heap.allocate(100 + HEADER_SIZE + MIN_PAYLOAD).unwrap();
  let fence = heap.allocate(8).unwrap();
  let tight = heap.allocate(100 + HEADER_SIZE + MIN_PAYLOAD - 1).unwrap();
  heap.allocate(8).unwrap();

  unsafe {
    heap.release(Some(roomy)).unwrap();
  }
  assert_eq!(heap.allocate(100), Ok(roomy));

  let blocks: Vec<BlockInfo> = heap.blocks().take(3).collect();
  assert_eq!(
    blocks,
    vec![
      BlockInfo { payload: roomy.as_ptr() as usize, size: 100, is_free: false },
      BlockInfo {
        payload: roomy.as_ptr() as usize + 100 + HEADER_SIZE,
        size: MIN_PAYLOAD,
        is_free: true,
      },
      BlockInfo { payload: fence.as_ptr() as usize, size: 8, is_free: false },
    ]
  );

  unsafe {
    heap.release(Some(tight)).unwrap();
  }
  assert_eq!(heap.allocate(100), Ok(tight));
  unsafe {
    assert_eq!(heap.usable_size(tight), Ok(100 + HEADER_SIZE + MIN_PAYLOAD - 1));
  }
  assert_eq!(heap.stats().blocks, 5);
}

#[test]
fn split_threshold_with_word_sizes() {
  let mut heap = word_heap();

  let block = heap.allocate(104 + HEADER_SIZE + MIN_PAYLOAD).unwrap();
  heap.allocate(8).unwrap();

  unsafe {
    heap.release(Some(block)).unwrap();
  }
  assert_eq!(heap.allocate(100), Ok(block));

  let remainder = heap.blocks().nth(1).unwrap();
  assert_eq!(remainder.size, MIN_PAYLOAD);
  assert!(remainder.is_free);
}

#[test]
fn coalescing_enables_reuse_without_growth() {
  let mut heap = word_heap();

  let a = heap.allocate(100).unwrap();
  let b = heap.allocate(200).unwrap();
  let c = heap.allocate(300).unwrap();

  unsafe {
    heap.release(Some(b)).unwrap();
    heap.release(Some(a)).unwrap();
  }
  assert_eq!(heap.stats().free_blocks, 1);

  let grows = heap.grower().grow_calls();
  let d = heap.allocate(250).unwrap();

  assert_eq!(d, a);
  assert_eq!(heap.grower().grow_calls(), grows);

  unsafe {
    heap.release(Some(c)).unwrap();
    heap.release(Some(d)).unwrap();
  }
  let stats = heap.stats();
  assert_eq!(stats.blocks, 1);
  assert_eq!(stats.free_bytes + HEADER_SIZE, stats.heap_bytes);
}

#[test]
fn shrink_keeps_the_pointer() {
  let mut heap = word_heap();

  let ptr = heap.allocate(256).unwrap();
  let bytes = pattern(1, 256);

  unsafe {
    fill(ptr, &bytes);

    assert_eq!(heap.resize(Some(ptr), 64), Ok(Some(ptr)));
    assert_eq!(contents(ptr, 64), &bytes[..64]);
    assert_eq!(heap.usable_size(ptr), Ok(64));
  }
}

#[test]
fn grow_moves_and_copies() {
  let mut heap = word_heap();

  let ptr = heap.allocate(40).unwrap();
  heap.allocate(16).unwrap();
  let bytes = pattern(2, 40);

  unsafe {
    fill(ptr, &bytes);

    let moved = heap.resize(Some(ptr), 400).unwrap().unwrap();

    assert_ne!(moved, ptr);
    assert_eq!(contents(moved, 40), bytes.as_slice());
    assert_eq!(heap.release(Some(ptr)), Err(AllocError::AlreadyFree));
  }
}

#[test]
fn failed_grow_leaves_the_block_alone() {
  let mut heap = FirstFit::<Arena>::new(Arena::with_capacity(256));

  let ptr = heap.allocate(64).unwrap();
  let bytes = pattern(3, 64);

  unsafe {
    fill(ptr, &bytes);

    assert_eq!(heap.resize(Some(ptr), 4096), Err(AllocError::OutOfMemory));
    assert_eq!(contents(ptr, 64), bytes.as_slice());
    assert_eq!(heap.usable_size(ptr), Ok(64));
  }
}

#[test]
fn null_and_zero_are_safe() {
  let mut heap = word_heap();

  unsafe {
    assert_eq!(heap.release(None), Ok(()));

    let ptr = heap.resize(None, 32).unwrap().unwrap();
    assert_eq!(heap.usable_size(ptr), Ok(32));

    assert_eq!(heap.resize(Some(ptr), 0), Ok(None));
  }

  let stats = heap.stats();
  assert_eq!(stats.used_bytes, 0);
  assert_eq!(stats.free_blocks, 1);
}

#[test]
fn failed_first_allocation_leaves_the_heap_empty() {
  let mut heap = FirstFit::<Arena>::new(Arena::with_capacity(64));

  assert_eq!(heap.allocate(1024), Err(AllocError::OutOfMemory));
  assert_eq!(heap.blocks().count(), 0);
  assert_eq!(heap.stats().heap_bytes, 0);
  assert_eq!(heap.stats().grow_calls, 1);

  // The next request that fits becomes the base of the heap.
  let ptr = heap.allocate(16).unwrap();
  let base = heap.blocks().next().unwrap();

  assert_eq!(base.payload, ptr.as_ptr() as usize);
  assert_eq!(heap.grower().used(), 16 + HEADER_SIZE);
  assert_eq!(heap.stats().heap_bytes, 16 + HEADER_SIZE);

  unsafe {
    heap.release(Some(ptr)).unwrap();
  }
  assert_eq!(heap.stats().free_blocks, 1);
}

#[test]
fn shrink_does_not_merge_with_free_neighbor() {
  let mut heap = word_heap();

  let a = heap.allocate(200).unwrap();
  let b = heap.allocate(64).unwrap();
  let c = heap.allocate(8).unwrap();

  unsafe {
    heap.release(Some(b)).unwrap();
    heap.resize(Some(a), 64).unwrap();
  }

  let free: Vec<bool> = heap.blocks().map(|block| block.is_free).collect();
  assert_eq!(free, vec![false, true, true, false]);

  // The next release sweeps the whole list.
  unsafe {
    heap.release(Some(c)).unwrap();
  }
  let free: Vec<bool> = heap.blocks().map(|block| block.is_free).collect();
  assert_eq!(free, vec![false, true]);
}
