use log::trace;

use crate::block::BlockPtr;

/// First-fit scan of the block list starting at `head`.
///
/// Returns the earliest free block holding at least `size` bytes, together
/// with the last block visited before it. When nothing fits, the second
/// value is the tail of the list, which is where a new block gets linked.
pub(crate) unsafe fn find_free_block(
  head: BlockPtr,
  size: usize,
) -> (Option<BlockPtr>, BlockPtr) {
  unsafe {
    let mut last = head;
    let mut current = Some(head);

    while let Some(block) = current {
      if block.is_free() && block.size() >= size {
        trace!("first fit for {} bytes at {:#x} ({} bytes)", size, block.addr(), block.size());
        return (Some(block), last);
      }
      last = block;
      current = block.next();
    }

    (None, last)
  }
}
