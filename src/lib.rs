//! # brkalloc - A First-Fit `sbrk` Allocator
//!
//! This crate provides a drop-in `malloc` / `free` / `calloc` / `realloc`
//! allocator that manages a single heap grown with the `sbrk` system call.
//! Every block carries an intrusive header, all blocks form one linked list in
//! address order, and free space is found with a linear **first-fit** search.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌────┬────────┬────┬────────┬────┬──────┐                          │
//!   │   │ H1 │  used  │ H2 │  free  │ H3 │ used │                          │
//!   │   └────┴────────┴────┴────────┴────┴──────┘                          │
//!   │   ▲                                       ▲                          │
//!   │   │     H1.next = H2, H2.next = H3,       │                          │
//!   │   │     H3.next = null                    │                          │
//!   │   Heap base                           Program break                  │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - Checked size rounding
//!   ├── allocator  - FirstFit: allocate / release / allocate_zeroed / resize
//!   ├── block      - Header layout and payload arithmetic (internal)
//!   ├── coalesce   - Merging of adjacent free blocks (internal)
//!   ├── error      - AllocError
//!   ├── ffi        - C symbols, behind the `c-abi` feature
//!   ├── global     - LockedHeap, a GlobalAlloc wrapper
//!   ├── heap       - HeapGrower trait, Sbrk and Arena growers
//!   ├── search     - First-fit free block search (internal)
//!   └── split      - Block splitting (internal)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brkalloc::{Arena, FirstFit};
//!
//! let mut heap: FirstFit<Arena> = FirstFit::new(Arena::with_capacity(4096));
//!
//! let ptr = heap.allocate(100).unwrap();
//! unsafe {
//!   ptr.as_ptr().write_bytes(7, 100);
//!
//!   let ptr = heap.resize(Some(ptr), 400).unwrap();
//!   heap.release(ptr).unwrap();
//! }
//! ```
//!
//! ## How It Works
//!
//! ```text
//!   allocate(n):
//!     first fit ──found──▶ split off the tail ──▶ mark used ──▶ payload
//!         │
//!       none
//!         ▼
//!     grow heap by n + header ──▶ link after tail ──▶ payload
//!
//!   release(p):
//!     header = p - HEADER_SIZE ──▶ check guard ──▶ mark free ──▶ coalesce
//! ```
//!
//! A block is split only when the tail can hold a header plus
//! [`MIN_PAYLOAD`] bytes. Every release walks the whole list and merges
//! every run of adjacent free blocks. The heap never shrinks.
//!
//! ## Limitations
//!
//! - **Single-threaded core**: [`FirstFit`] needs `&mut self`; share it through
//!   [`LockedHeap`].
//! - **Linear search**: no size classes, cost grows with the block count.
//! - **16-byte alignment at most**: payloads are aligned to the granularity,
//!   capped at [`HEADER_ALIGN`]. [`LockedHeap`] refuses layouts that need more.
//! - **Shared break**: space another `sbrk` user claims between two grants
//!   becomes a gap. The heap continues past it as a new segment, and blocks
//!   on either side are never merged.
//!
//! ## Logging
//!
//! Decisions are reported through the [`log`] facade. A heap used as the
//! global allocator logs while holding its lock, so pair it with a logger that
//! does not allocate, or turn logging off with `log`'s `max_level_off`
//! feature.

pub mod align;
mod allocator;
mod block;
mod coalesce;
mod error;
#[cfg(feature = "c-abi")]
pub mod ffi;
mod global;
mod heap;
mod search;
mod split;

pub use allocator::{BlockInfo, Blocks, FirstFit, HeapStats};
pub use block::{HEADER_ALIGN, HEADER_SIZE, MIN_PAYLOAD};
pub use error::AllocError;
pub use global::LockedHeap;
pub use heap::{Arena, HeapGrower, Sbrk};
