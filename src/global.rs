use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
};

use log::error;
use spin::{Mutex, MutexGuard};
use typenum::{PowerOfTwo, Unsigned, consts::U16};

use crate::{
  allocator::FirstFit,
  error::AllocError,
  heap::{HeapGrower, Sbrk},
};

/// A [`FirstFit`] heap behind a spinning mutex, usable as a
/// `#[global_allocator]`.
///
/// ```rust,no_run
/// use brkalloc::{LockedHeap, Sbrk};
///
/// #[global_allocator]
/// static GLOBAL: LockedHeap<Sbrk> = LockedHeap::new(Sbrk::new());
///
/// fn main() {
///   let numbers = vec![1, 2, 3];
///   println!("{:?}", numbers);
/// }
/// ```
///
/// Payloads are aligned to [`FirstFit::ALIGN`], which is 16 with the default
/// granularity and covers every primitive type. A layout asking for more is
/// refused with a null pointer before the heap is touched.
pub struct LockedHeap<G, A = U16>
where
  G: HeapGrower,
  A: Unsigned + PowerOfTwo,
{
  heap: Mutex<FirstFit<G, A>>,
}

impl<G, A> LockedHeap<G, A>
where
  G: HeapGrower,
  A: Unsigned + PowerOfTwo,
{
  pub const fn new(grower: G) -> Self {
    Self {
      heap: Mutex::new(FirstFit::new(grower)),
    }
  }

  /// Locks the heap for direct use of the [`FirstFit`] API.
  pub fn lock(&self) -> MutexGuard<'_, FirstFit<G, A>> {
    self.heap.lock()
  }

  /// Whether every payload the heap hands out satisfies `layout`.
  fn serves(layout: Layout) -> bool {
    layout.align() <= FirstFit::<G, A>::ALIGN
  }

  unsafe fn reallocate(
    heap: &mut FirstFit<G, A>,
    ptr: *mut u8,
    new_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let old = NonNull::new(ptr).ok_or(AllocError::InvalidArgument)?;

    unsafe {
      let usable = heap.usable_size(old)?;

      // Trimming in place keeps the pointer, and with it the alignment.
      if usable >= new_size {
        return heap.resize(Some(old), new_size)?.ok_or(AllocError::InvalidArgument);
      }

      let moved = heap.allocate(new_size)?;
      ptr::copy_nonoverlapping(old.as_ptr(), moved.as_ptr(), usable);
      heap.release(Some(old))?;

      Ok(moved)
    }
  }
}

impl Default for LockedHeap<Sbrk> {
  fn default() -> Self {
    Self::new(Sbrk::new())
  }
}

unsafe impl<G, A> GlobalAlloc for LockedHeap<G, A>
where
  G: HeapGrower + Send,
  A: Unsigned + PowerOfTwo,
{
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if !Self::serves(layout) {
      return ptr::null_mut();
    }

    self
      .heap
      .lock()
      .allocate(layout.size())
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    let result = unsafe { self.heap.lock().release(NonNull::new(ptr)) };

    // Logged after the lock is gone so an allocating logger cannot deadlock.
    if let Err(err) = result {
      error!("dealloc({:?}) failed: {}", ptr, err);
    }
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if !Self::serves(layout) {
      return ptr::null_mut();
    }

    self
      .heap
      .lock()
      .allocate_zeroed(layout.size(), 1)
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    // The layout was served once, so a moved block satisfies it as well.
    let result = unsafe { Self::reallocate(&mut self.heap.lock(), ptr, new_size) };

    match result {
      Ok(moved) => moved.as_ptr(),
      Err(AllocError::OutOfMemory) => ptr::null_mut(),
      Err(err) => {
        error!("realloc({:?}, {}) failed: {}", ptr, new_size, err);
        ptr::null_mut()
      }
    }
  }
}
