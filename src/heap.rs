use std::{alloc, ptr::NonNull};

use libc::{c_void, intptr_t, sbrk};
use log::debug;

use crate::{align::align_up, error::AllocError};

/// The source of raw heap memory.
///
/// Grants are expected to follow one another without gaps. A grant that
/// starts further on is accepted as a new heap segment, and blocks on either
/// side of the gap are never merged.
///
/// # Safety
///
/// Every successful [`grow`](HeapGrower::grow) must return a region of exactly
/// `increment` bytes, aligned to `align` and valid for reads and writes until
/// the grower is dropped, that does not overlap any earlier grant and starts
/// above all of them.
pub unsafe trait HeapGrower {
  /// Extends the heap by exactly `increment` bytes starting at an `align`
  /// boundary, and returns the start of the new region.
  ///
  /// Bytes skipped to reach the boundary leave a gap before the region.
  fn grow(
    &mut self,
    increment: usize,
    align: usize,
  ) -> Result<NonNull<u8>, AllocError>;
}

/// Grows the process data segment with `sbrk(2)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sbrk;

impl Sbrk {
  pub const fn new() -> Self {
    Self
  }

  /// The current program break, i.e. `sbrk(0)`.
  pub fn program_break(&self) -> *mut u8 {
    unsafe { sbrk(0) as *mut u8 }
  }
}

unsafe impl HeapGrower for Sbrk {
  fn grow(
    &mut self,
    increment: usize,
    align: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let current = self.program_break() as usize;
    let pad = align_up(current, align).ok_or(AllocError::OutOfMemory)? - current;

    let total = pad
      .checked_add(increment)
      .and_then(|total| intptr_t::try_from(total).ok())
      .ok_or(AllocError::OutOfMemory)?;

    let address = unsafe { sbrk(total) };

    if address == usize::MAX as *mut c_void {
      debug!("sbrk({}) refused", total);
      return Err(AllocError::OutOfMemory);
    }

    // The break may have moved since it was read; align from what we got.
    let granted = address as usize;
    let start = align_up(granted, align).ok_or(AllocError::OutOfMemory)?;

    if start + increment > granted + total as usize {
      debug!("break moved from {:#x} to {:#x} under sbrk", current, granted);
      return Err(AllocError::OutOfMemory);
    }

    debug!("sbrk({}) = {:?}, grant at {:#x}", total, address, start);

    NonNull::new(start as *mut u8).ok_or(AllocError::OutOfMemory)
  }
}

/// A fixed-capacity heap carved out of one up-front allocation.
///
/// Hands out aligned slices front to back and refuses to grow past its
/// capacity, which makes heap exhaustion and growth observable in tests.
#[derive(Debug)]
pub struct Arena {
  base: NonNull<u8>,
  layout: alloc::Layout,
  used: usize,
  grow_calls: usize,
}

// The arena owns its buffer outright.
unsafe impl Send for Arena {}

impl Arena {
  const ALIGN: usize = 16;

  pub fn with_capacity(capacity: usize) -> Self {
    let layout = match alloc::Layout::from_size_align(capacity.max(1), Self::ALIGN) {
      Ok(layout) => layout,
      Err(_) => panic!("arena capacity {} is too large", capacity),
    };

    let base = match NonNull::new(unsafe { alloc::alloc(layout) }) {
      Some(base) => base,
      None => alloc::handle_alloc_error(layout),
    };

    Self {
      base,
      layout,
      used: 0,
      grow_calls: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.used
  }

  /// Number of times [`HeapGrower::grow`] was called, successful or not.
  pub fn grow_calls(&self) -> usize {
    self.grow_calls
  }
}

unsafe impl HeapGrower for Arena {
  fn grow(
    &mut self,
    increment: usize,
    align: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    self.grow_calls += 1;

    let base = self.base.as_ptr() as usize;
    let start = align_up(base + self.used, align).ok_or(AllocError::OutOfMemory)? - base;

    let remaining = self.capacity().saturating_sub(start);
    if increment > remaining {
      debug!("arena exhausted: {} requested, {} left", increment, remaining);
      return Err(AllocError::OutOfMemory);
    }

    let address = unsafe { self.base.add(start) };
    self.used = start + increment;

    Ok(address)
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_arena_grants_are_contiguous() {
    let mut arena = Arena::with_capacity(64);

    let first = arena.grow(24, 8).unwrap();
    let second = arena.grow(40, 8).unwrap();

    assert_eq!(first.as_ptr() as usize % Arena::ALIGN, 0);
    assert_eq!(unsafe { first.add(24) }, second);
    assert_eq!(arena.used(), 64);
    assert_eq!(arena.grow_calls(), 2);
  }

  #[test]
  fn test_arena_skips_to_alignment() {
    let mut arena = Arena::with_capacity(128);

    let first = arena.grow(24, 1).unwrap();
    let second = arena.grow(16, 16).unwrap();

    assert_eq!(second.as_ptr() as usize % 16, 0);
    assert_eq!(unsafe { first.add(32) }, second);
    assert_eq!(arena.used(), 48);
  }

  #[test]
  fn test_arena_refuses_past_capacity() {
    let mut arena = Arena::with_capacity(32);

    arena.grow(16, 1).unwrap();

    assert_eq!(arena.grow(17, 1), Err(AllocError::OutOfMemory));
    assert_eq!(arena.used(), 16);
    assert_eq!(arena.grow_calls(), 2);
    assert!(arena.grow(16, 1).is_ok());
  }

  #[test]
  fn test_sbrk_rejects_oversized_increment() {
    assert_eq!(Sbrk::new().grow(usize::MAX, 1), Err(AllocError::OutOfMemory));
  }
}
