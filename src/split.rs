use log::trace;

use crate::block::{BlockPtr, HEADER_SIZE, MIN_PAYLOAD};

/// Shrinks `block` to `size` bytes and turns the tail into a new free block.
///
/// Nothing happens unless the tail can hold a header plus [`MIN_PAYLOAD`]
/// bytes; smaller leftovers stay inside `block` as internal fragmentation.
/// Returns the carved-out block, if any.
pub(crate) unsafe fn split_block(
  block: BlockPtr,
  size: usize,
) -> Option<BlockPtr> {
  unsafe {
    let available = block.size();

    if available < size.saturating_add(HEADER_SIZE + MIN_PAYLOAD) {
      return None;
    }

    let remainder = BlockPtr::write(
      block.payload().add(size),
      available - size - HEADER_SIZE,
      block.next(),
      true,
    );

    block.set_size(size);
    block.set_next(Some(remainder));

    trace!(
      "split {:#x}: kept {} bytes, {} bytes free at {:#x}",
      block.addr(),
      size,
      remainder.size(),
      remainder.addr()
    );

    Some(remainder)
  }
}
