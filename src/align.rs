/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. Returns `None` when the rounded value does
/// not fit in a `usize`.
///
/// # Examples
///
/// ```rust
/// use brkalloc::align::align_up;
///
/// assert_eq!(align_up(13, 8), Some(16));
/// assert_eq!(align_up(16, 8), Some(16));
/// assert_eq!(align_up(usize::MAX, 8), None);
/// ```
pub const fn align_up(
  value: usize,
  align: usize,
) -> Option<usize> {
  debug_assert!(align.is_power_of_two());

  match value.checked_add(align - 1) {
    Some(bumped) => Some(bumped & !(align - 1)),
    None => None,
  }
}
