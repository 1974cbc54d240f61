use log::trace;

use crate::block::{BlockPtr, HEADER_SIZE};

/// Merges every run of adjacent free blocks in the list starting at `head`.
///
/// Only blocks that touch in memory merge; list neighbors separated by a gap
/// between heap segments stay apart. A block that absorbs its successor is
/// examined again, so a run of any length collapses in a single pass. Returns
/// the number of absorbed headers.
pub(crate) unsafe fn coalesce_blocks(head: BlockPtr) -> usize {
  unsafe {
    let mut merged = 0;
    let mut current = head;

    while let Some(next) = current.next() {
      if current.is_free() && next.is_free() && current.end() == next.addr() {
        current.set_size(current.size() + next.size() + HEADER_SIZE);
        current.set_next(next.next());
        merged += 1;
        trace!("absorbed {:#x} into {:#x}", next.addr(), current.addr());
      } else {
        current = next;
      }
    }

    merged
  }
}
