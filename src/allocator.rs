use std::{marker::PhantomData, ptr, ptr::NonNull};

use log::{debug, trace, warn};
use typenum::{PowerOfTwo, Unsigned, consts::U8};

use crate::{
  align::align_up,
  block::{BlockPtr, HEADER_ALIGN, HEADER_SIZE},
  coalesce::coalesce_blocks,
  error::AllocError,
  heap::HeapGrower,
  search::find_free_block,
  split::split_block,
};

/// A first-fit allocator over a growable heap.
///
/// Blocks form one singly linked list in address order. Allocation reuses the
/// first free block that fits (splitting off the unused tail when it is big
/// enough), and otherwise grows the heap through `G` and appends a block.
/// Releasing a block merges every run of physically adjacent free blocks.
///
/// `A` is the granularity request sizes are rounded up to, as a
/// [`typenum`] power of two. The default of 8 keeps every header and payload
/// word aligned, so a miss grows the heap by `round8(size) + HEADER_SIZE`.
/// `U1` is the byte-exact setting: sizes are never rounded and a miss grows
/// the heap by exactly `size + HEADER_SIZE`. Payloads are aligned to
/// [`FirstFit::ALIGN`].
///
/// The allocator is single threaded. Wrap it in a
/// [`LockedHeap`](crate::LockedHeap) to share it.
pub struct FirstFit<G, A = U8>
where
  G: HeapGrower,
  A: Unsigned + PowerOfTwo,
{
  __granularity: PhantomData<A>,
  grower: G,
  head: Option<BlockPtr>,
  heap_end: usize,
  heap_bytes: usize,
  grow_calls: usize,
}

// The allocator exclusively owns every block reachable from `head`.
unsafe impl<G, A> Send for FirstFit<G, A>
where
  G: HeapGrower + Send,
  A: Unsigned + PowerOfTwo,
{
}

/// A snapshot of one block, as reported by [`FirstFit::blocks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  /// Address of the first payload byte.
  pub payload: usize,
  /// Payload length in bytes.
  pub size: usize,
  pub is_free: bool,
}

/// Aggregate figures over the whole heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Bytes obtained from the grower, headers included.
  pub heap_bytes: usize,
  /// Calls made to the grower, successful or not.
  pub grow_calls: usize,
  pub blocks: usize,
  pub free_blocks: usize,
  /// Payload bytes in free blocks.
  pub free_bytes: usize,
  /// Payload bytes in blocks handed out to callers.
  pub used_bytes: usize,
}

impl<G, A> FirstFit<G, A>
where
  G: HeapGrower,
  A: Unsigned + PowerOfTwo,
{
  /// Multiple every request size is rounded up to.
  pub const GRANULARITY: usize = A::USIZE;

  /// Alignment of every payload: the granularity, capped at
  /// [`HEADER_ALIGN`](crate::HEADER_ALIGN).
  pub const ALIGN: usize = if A::USIZE < HEADER_ALIGN {
    A::USIZE
  } else {
    HEADER_ALIGN
  };

  /// Creates an empty allocator. No memory is requested until the first
  /// allocation.
  pub const fn new(grower: G) -> Self {
    Self {
      __granularity: PhantomData,
      grower,
      head: None,
      heap_end: 0,
      heap_bytes: 0,
      grow_calls: 0,
    }
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  /// Allocates at least `size` bytes.
  ///
  /// # Errors
  ///
  /// * [`AllocError::InvalidArgument`] when `size` is zero.
  /// * [`AllocError::OutOfMemory`] when the heap cannot grow.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if size == 0 {
      return Err(AllocError::InvalidArgument);
    }

    let size = Self::round(size)?;

    let block = match self.head {
      None => {
        let block = self.request_space(None, size)?;
        self.head = Some(block);
        block
      }
      Some(head) => match unsafe { find_free_block(head, size) } {
        (Some(block), _) => unsafe {
          split_block(block, size);
          block.set_free(false);
          block
        },
        (None, last) => self.request_space(Some(last), size)?,
      },
    };

    Ok(block.payload())
  }

  /// Releases the block behind `ptr`. A null pointer is a no-op.
  ///
  /// # Errors
  ///
  /// * [`AllocError::CorruptHeader`] when `ptr` lies outside the heap or its
  ///   header was not written by this allocator.
  /// * [`AllocError::AlreadyFree`] when the block was already released.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or have been returned by this allocator. The header
  /// checks catch most violations, but not all of them.
  pub unsafe fn release(
    &mut self,
    ptr: Option<NonNull<u8>>,
  ) -> Result<(), AllocError> {
    let Some(payload) = ptr else {
      return Ok(());
    };

    unsafe {
      let block = self.header_of(payload)?;
      self.release_block(block);
    }

    Ok(())
  }

  /// Allocates `count * element_size` bytes and zeroes the whole payload.
  ///
  /// # Errors
  ///
  /// * [`AllocError::InvalidArgument`] when the total is zero.
  /// * [`AllocError::OutOfMemory`] when the total overflows or the heap
  ///   cannot grow.
  pub fn allocate_zeroed(
    &mut self,
    count: usize,
    element_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let total = count.checked_mul(element_size).ok_or(AllocError::OutOfMemory)?;

    if total == 0 {
      return Err(AllocError::InvalidArgument);
    }

    let payload = self.allocate(total)?;

    unsafe {
      let block = BlockPtr::from_payload(payload);
      ptr::write_bytes(payload.as_ptr(), 0, block.size());
    }

    Ok(payload)
  }

  /// Resizes the block behind `ptr` to hold `new_size` bytes.
  ///
  /// * A null `ptr` allocates.
  /// * A zero `new_size` releases `ptr` and returns `None`.
  /// * A block that is already big enough is trimmed in place and the same
  ///   pointer comes back.
  /// * Otherwise the contents move to a fresh block and the old one is
  ///   released. If that allocation fails the old block is left untouched.
  ///
  /// A following free neighbor is never absorbed to grow in place.
  ///
  /// # Safety
  ///
  /// Same contract as [`FirstFit::release`].
  pub unsafe fn resize(
    &mut self,
    ptr: Option<NonNull<u8>>,
    new_size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    let Some(payload) = ptr else {
      return self.allocate(new_size).map(Some);
    };

    if new_size == 0 {
      unsafe { self.release(ptr)? };
      return Ok(None);
    }

    unsafe {
      let block = self.header_of(payload)?;
      let size = Self::round(new_size)?;

      if block.size() >= size {
        split_block(block, size);
        return Ok(Some(payload));
      }

      let moved = self.allocate(new_size)?;
      ptr::copy_nonoverlapping(payload.as_ptr(), moved.as_ptr(), block.size().min(new_size));
      self.release_block(block);

      trace!("moved {:#x} to {:#x}", payload.as_ptr() as usize, moved.as_ptr() as usize);

      Ok(Some(moved))
    }
  }

  /// Payload bytes actually available behind `ptr`, which may exceed the
  /// size originally requested.
  ///
  /// # Safety
  ///
  /// Same contract as [`FirstFit::release`].
  pub unsafe fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<usize, AllocError> {
    unsafe { Ok(self.header_of(ptr)?.size()) }
  }

  /// Walks the block list in address order.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      current: self.head,
      _heap: PhantomData,
    }
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      heap_bytes: self.heap_bytes,
      grow_calls: self.grow_calls,
      ..HeapStats::default()
    };

    for block in self.blocks() {
      stats.blocks += 1;
      if block.is_free {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
      } else {
        stats.used_bytes += block.size;
      }
    }

    stats
  }

  fn round(size: usize) -> Result<usize, AllocError> {
    align_up(size, Self::GRANULARITY).ok_or(AllocError::OutOfMemory)
  }

  /// Grows the heap by one block of `size` payload bytes, linked after `last`.
  ///
  /// A grant that does not start at the current heap end opens a new segment.
  /// Its block is still linked in address order, but the coalescer never
  /// merges across the gap.
  fn request_space(
    &mut self,
    last: Option<BlockPtr>,
    size: usize,
  ) -> Result<BlockPtr, AllocError> {
    let total = size.checked_add(HEADER_SIZE).ok_or(AllocError::OutOfMemory)?;

    self.grow_calls += 1;
    let address = self.grower.grow(total, Self::ALIGN)?;

    debug_assert_eq!(address.as_ptr() as usize % Self::ALIGN, 0);

    if self.head.is_some() && address.as_ptr() as usize != self.heap_end {
      debug!(
        "heap grew at {:?}, {} bytes past the end at {:#x}; new segment",
        address,
        address.as_ptr() as usize - self.heap_end,
        self.heap_end
      );
    }

    let block = unsafe { BlockPtr::write(address, size, None, false) };

    if let Some(last) = last {
      unsafe { last.set_next(Some(block)) };
    }

    self.heap_end = unsafe { block.end() };
    self.heap_bytes += total;
    debug!("heap grew by {} bytes, new block at {:#x}", total, block.addr());

    Ok(block)
  }

  /// Locates and validates the in-use header in front of `payload`.
  unsafe fn header_of(
    &self,
    payload: NonNull<u8>,
  ) -> Result<BlockPtr, AllocError> {
    let Some(head) = self.head else {
      warn!("{:?} released before anything was allocated", payload);
      return Err(AllocError::CorruptHeader);
    };

    let addr = payload.as_ptr() as usize;

    if addr < head.payload().as_ptr() as usize || addr > self.heap_end {
      warn!("{:#x} lies outside the heap", addr);
      return Err(AllocError::CorruptHeader);
    }

    unsafe {
      let block = BlockPtr::from_payload(payload);

      if !block.guard_intact() || block.size() > self.heap_end - addr {
        warn!("no valid header in front of {:#x}", addr);
        return Err(AllocError::CorruptHeader);
      }

      if block.is_free() {
        warn!("{:#x} is already free", addr);
        return Err(AllocError::AlreadyFree);
      }

      Ok(block)
    }
  }

  unsafe fn release_block(
    &mut self,
    block: BlockPtr,
  ) {
    unsafe {
      block.set_free(true);

      if let Some(head) = self.head {
        let merged = coalesce_blocks(head);
        trace!("released {:#x}, merged {} blocks", block.addr(), merged);
      }
    }
  }
}

/// Iterator over the blocks of a [`FirstFit`] heap, in address order.
pub struct Blocks<'a> {
  current: Option<BlockPtr>,
  _heap: PhantomData<&'a ()>,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let block = self.current?;

    unsafe {
      self.current = block.next();

      Some(BlockInfo {
        payload: block.payload().as_ptr() as usize,
        size: block.size(),
        is_free: block.is_free(),
      })
    }
  }
}
