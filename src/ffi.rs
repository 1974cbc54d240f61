//! `malloc`, `free`, `calloc` and `realloc` symbols backed by one
//! process-wide `sbrk` heap.
//!
//! Linking a binary against this crate with the `c-abi` feature makes every
//! allocation in the process, libc's included, go through [`FirstFit`].
//! Break space claimed by anyone else in between is skipped and left as a gap
//! between heap segments.
//!
//! [`FirstFit`]: crate::FirstFit

use std::ptr::{self, NonNull};

use libc::{c_void, size_t};
use log::error;

use crate::{error::AllocError, global::LockedHeap, heap::Sbrk};

static HEAP: LockedHeap<Sbrk> = LockedHeap::new(Sbrk::new());

#[unsafe(no_mangle)]
pub extern "C" fn malloc(size: size_t) -> *mut c_void {
  HEAP
    .lock()
    .allocate(size)
    .map_or(ptr::null_mut(), |payload| payload.as_ptr().cast())
}

/// # Safety
///
/// `ptr` must be null or come from one of this module's functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
  let result = unsafe { HEAP.lock().release(NonNull::new(ptr.cast())) };

  // Logged after the lock is gone so an allocating logger cannot deadlock.
  if let Err(err) = result {
    error!("free({:?}) failed: {}", ptr, err);
  }
}

#[unsafe(no_mangle)]
pub extern "C" fn calloc(
  nmemb: size_t,
  size: size_t,
) -> *mut c_void {
  HEAP
    .lock()
    .allocate_zeroed(nmemb, size)
    .map_or(ptr::null_mut(), |payload| payload.as_ptr().cast())
}

/// # Safety
///
/// `ptr` must be null or come from one of this module's functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(
  ptr: *mut c_void,
  size: size_t,
) -> *mut c_void {
  let result = unsafe { HEAP.lock().resize(NonNull::new(ptr.cast()), size) };

  match result {
    Ok(Some(payload)) => payload.as_ptr().cast(),
    Ok(None) | Err(AllocError::OutOfMemory | AllocError::InvalidArgument) => ptr::null_mut(),
    Err(err) => {
      error!("realloc({:?}, {}) failed: {}", ptr, size, err);
      ptr::null_mut()
    }
  }
}
