use core::fmt;

/// Reasons an allocator call can fail.
///
/// Every variant is recoverable: the heap stays consistent and usable after
/// any of them is returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocError {
  /// Zero-byte request to `allocate`, or a zero total to `allocate_zeroed`.
  InvalidArgument,
  /// The heap grower refused to extend the heap, or the size arithmetic
  /// overflowed.
  OutOfMemory,
  /// The pointer does not lead to a header this allocator wrote.
  CorruptHeader,
  /// The block behind the pointer has already been released.
  AlreadyFree,
}

impl fmt::Display for AllocError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let message = match self {
      AllocError::InvalidArgument => "invalid allocation size",
      AllocError::OutOfMemory => "out of memory",
      AllocError::CorruptHeader => "pointer does not refer to a valid block header",
      AllocError::AlreadyFree => "block has already been released",
    };

    f.write_str(message)
  }
}

impl std::error::Error for AllocError {}
