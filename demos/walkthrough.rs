use std::{io::Read, ptr::NonNull, slice};

use brkalloc::{FirstFit, HeapStats, Sbrk};

/// Waits until the user presses ENTER, when started with `--pause`.
/// Useful to inspect the process with `pmap` or `gdb` between steps.
fn pause(enabled: bool) {
  if enabled {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

fn print_program_break(
  label: &str,
  heap: &FirstFit<Sbrk>,
) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    heap.grower().program_break(),
  );
}

fn print_stats(stats: HeapStats) {
  println!(
    "  > heap: {} bytes in {} blocks ({} free, {} bytes free), {} sbrk calls",
    stats.heap_bytes, stats.blocks, stats.free_blocks, stats.free_bytes, stats.grow_calls
  );
}

/// # Safety
///
/// `ptr` must be valid for writes of `offset + text.len()` bytes.
unsafe fn write_str(
  ptr: NonNull<u8>,
  offset: usize,
  text: &str,
) {
  unsafe { ptr.as_ptr().add(offset).copy_from_nonoverlapping(text.as_ptr(), text.len()) }
}

/// # Safety
///
/// `ptr` must be valid for reads of `len` initialized bytes.
unsafe fn read_str(
  ptr: NonNull<u8>,
  len: usize,
) -> String {
  let bytes = unsafe { slice::from_raw_parts(ptr.as_ptr(), len) };
  String::from_utf8_lossy(bytes).into_owned()
}

fn main() {
  env_logger::init();

  let pause_enabled = std::env::args().any(|arg| arg == "--pause");
  let mut heap: FirstFit<Sbrk> = FirstFit::new(Sbrk::new());

  print_program_break("start", &heap);
  pause(pause_enabled);

  unsafe {
    // --------------------------------------------------------------------
    // 1) Simple allocate and release.
    // --------------------------------------------------------------------
    println!("\n[1] Allocating 25 bytes...");
    if let Ok(text) = heap.allocate(25) {
      let greeting = "Hello Malloc!";
      write_str(text, 0, greeting);
      println!("  > String: {}", read_str(text, greeting.len()));
      heap.release(Some(text)).ok();
      println!("  > String released.");
    }
    print_program_break("after [1]", &heap);
    pause(pause_enabled);

    // --------------------------------------------------------------------
    // 2) Zeroed allocation of 10 u32s.
    // --------------------------------------------------------------------
    println!("\n[2] Allocating 10 u32 with allocate_zeroed...");
    if let Ok(array) = heap.allocate_zeroed(10, size_of::<u32>()) {
      let bytes = slice::from_raw_parts(array.as_ptr(), 10 * size_of::<u32>());
      let all_zero = bytes.iter().all(|&byte| byte == 0);
      println!("  > block is all zeros: {}", if all_zero { "Yes" } else { "No" });
      heap.release(Some(array)).ok();
      println!("  > Array released.");
    }
    pause(pause_enabled);

    // --------------------------------------------------------------------
    // 3) Resize from 10 to 50 bytes, keeping the contents.
    // --------------------------------------------------------------------
    println!("\n[3] Allocating and resizing...");
    if let Ok(text) = heap.allocate(10) {
      write_str(text, 0, "Initial");
      println!("  > Initial string (10 bytes): {}", read_str(text, 7));

      match heap.resize(Some(text), 50) {
        Ok(Some(grown)) => {
          println!("  > Resize successful. Old content retained: {}", read_str(grown, 7));
          let suffix = " - Extended to 50 bytes.";
          write_str(grown, 7, suffix);
          println!("  > New string: {}", read_str(grown, 7 + suffix.len()));
          heap.release(Some(grown)).ok();
        }
        _ => {
          println!("  > resize failed!");
          heap.release(Some(text)).ok();
        }
      }
    }
    print_stats(heap.stats());
    pause(pause_enabled);

    // --------------------------------------------------------------------
    // 4) Fragmentation and coalescing.
    // --------------------------------------------------------------------
    println!("\n[4] Coalescing...");
    let p1 = heap.allocate(100).ok();
    let p2 = heap.allocate(200).ok();
    let p3 = heap.allocate(300).ok();
    println!("  > Allocated p1(100), p2(200), p3(300)");

    heap.release(p2).ok();
    println!("  > Released p2");

    heap.release(p1).ok();
    println!("  > Released p1 (merges with p2)");
    print_stats(heap.stats());

    let grows = heap.stats().grow_calls;
    let p4 = heap.allocate(250).ok();
    println!(
      "  > Allocating 250 bytes after releasing p1+p2: {} ({})",
      if p4.is_some() { "SUCCESS" } else { "FAILED" },
      if heap.stats().grow_calls == grows { "reused" } else { "heap grew" },
    );

    heap.release(p3).ok();
    heap.release(p4).ok();
    print_stats(heap.stats());
  }

  print_program_break("end", &heap);
  println!("\nAll steps completed. The heap is never returned; the OS reclaims it at exit.");
}
