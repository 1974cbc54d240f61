use std::{mem, ptr, ptr::NonNull};

/// Magic value stamped into every header this allocator writes.
const GUARD: u32 = 0xB10C_4EAD;

/// Bytes of metadata in front of every payload.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

/// Strongest payload alignment the heap can offer: headers are a whole
/// number of these, so a payload is as aligned as its header.
pub const HEADER_ALIGN: usize = mem::align_of::<Block>();

/// Smallest payload worth carving out of an oversized block.
pub const MIN_PAYLOAD: usize = 8;

/// The header that precedes every payload on the heap.
///
/// ```text
///   ┌──────────┬──────────┬─────────┬─────────┬────────────────────┐
///   │ size     │ next     │ guard   │ is_free │ payload (size B)   │
///   └──────────┴──────────┴─────────┴─────────┴────────────────────┘
///   ▲                                         ▲
///   BlockPtr                                  BlockPtr::payload()
/// ```
///
/// Headers may sit on any byte boundary when the allocator runs with byte
/// granularity, so fields are only ever touched through unaligned accesses.
#[repr(C, align(16))]
struct Block {
  size: usize,
  next: *mut Block,
  guard: u32,
  is_free: u8,
}

/// A pointer to a header living inside the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockPtr(NonNull<Block>);

impl BlockPtr {
  /// Writes a fresh header at `addr`.
  ///
  /// # Safety
  ///
  /// `addr` must be valid for writes of `HEADER_SIZE` bytes.
  pub unsafe fn write(
    addr: NonNull<u8>,
    size: usize,
    next: Option<BlockPtr>,
    is_free: bool,
  ) -> Self {
    let block = addr.cast::<Block>();

    unsafe {
      block.as_ptr().write_unaligned(Block {
        size,
        next: raw(next),
        guard: GUARD,
        is_free: is_free as u8,
      });
    }

    Self(block)
  }

  /// Derives the header location from a payload pointer.
  ///
  /// # Safety
  ///
  /// `payload - HEADER_SIZE` must lie in the same allocation as `payload`.
  pub unsafe fn from_payload(payload: NonNull<u8>) -> Self {
    Self(unsafe { payload.sub(HEADER_SIZE) }.cast())
  }

  pub fn addr(self) -> usize {
    self.0.as_ptr() as usize
  }

  /// Start of the caller-usable bytes.
  pub fn payload(self) -> NonNull<u8> {
    unsafe { self.0.cast::<u8>().add(HEADER_SIZE) }
  }

  /// One past the last payload byte.
  pub unsafe fn end(self) -> usize {
    self.addr() + HEADER_SIZE + unsafe { self.size() }
  }

  pub unsafe fn size(self) -> usize {
    unsafe { ptr::addr_of!((*self.0.as_ptr()).size).read_unaligned() }
  }

  pub unsafe fn set_size(
    self,
    size: usize,
  ) {
    unsafe { ptr::addr_of_mut!((*self.0.as_ptr()).size).write_unaligned(size) }
  }

  pub unsafe fn next(self) -> Option<BlockPtr> {
    let next = unsafe { ptr::addr_of!((*self.0.as_ptr()).next).read_unaligned() };
    NonNull::new(next).map(BlockPtr)
  }

  pub unsafe fn set_next(
    self,
    next: Option<BlockPtr>,
  ) {
    unsafe { ptr::addr_of_mut!((*self.0.as_ptr()).next).write_unaligned(raw(next)) }
  }

  pub unsafe fn is_free(self) -> bool {
    unsafe { ptr::addr_of!((*self.0.as_ptr()).is_free).read_unaligned() != 0 }
  }

  pub unsafe fn set_free(
    self,
    is_free: bool,
  ) {
    unsafe { ptr::addr_of_mut!((*self.0.as_ptr()).is_free).write_unaligned(is_free as u8) }
  }

  /// Whether the header still carries the magic stamped by [`BlockPtr::write`].
  pub unsafe fn guard_intact(self) -> bool {
    unsafe { ptr::addr_of!((*self.0.as_ptr()).guard).read_unaligned() == GUARD }
  }
}

fn raw(block: Option<BlockPtr>) -> *mut Block {
  block.map_or(ptr::null_mut(), |block| block.0.as_ptr())
}
