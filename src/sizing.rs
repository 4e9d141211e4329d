//! Duration and width arithmetic.
//!
//! Converts a task's work-days and a facility's manpower into the number of
//! day-cells the task occupies, and into pixel geometry for rendering.
//!
//! # Rounding
//! Span lengths round half up (`2.5 → 3`), so more manpower shortens a
//! span but a task never shrinks below one cell. Pixel widths snap to whole
//! cells for the same reason.

use crate::models::DAY_MS;

/// Number of day-cells a task occupies.
///
/// `round(duration / manpower)` clamped to at least 1. Returns 0 only when
/// `manpower` is 0, which callers treat as "cannot place".
///
/// # Examples
/// ```
/// use schedule_board::sizing::span_length;
///
/// assert_eq!(span_length(4, 2), 2);
/// assert_eq!(span_length(1, 5), 1);
/// assert_eq!(span_length(5, 2), 3);
/// assert_eq!(span_length(3, 0), 0);
/// ```
pub fn span_length(duration: u32, manpower: u32) -> usize {
    if manpower == 0 {
        return 0;
    }
    let (d, m) = (u64::from(duration), u64::from(manpower));
    // half-up rounding in integers: floor((2d + m) / 2m)
    let rounded = (2 * d + m) / (2 * m);
    rounded.max(1) as usize
}

/// Rendered width of a task block in pixels.
///
/// Raw width `duration * cell_width / manpower`, snapped to the nearest
/// whole number of cells, never narrower than one cell.
pub fn pixel_width(duration: u32, manpower: u32, cell_width: f64) -> f64 {
    if manpower == 0 || cell_width <= 0.0 {
        return cell_width;
    }
    let raw = f64::from(duration) * cell_width / f64::from(manpower);
    let snapped = (raw / cell_width).round() * cell_width;
    snapped.max(cell_width)
}

/// Horizontal offset of a task inside an aggregated cell.
///
/// `floor((task_start - view_start) / day) * (cell_width / days_per_cell)`.
/// Whole days are floored toward negative infinity.
pub fn left_offset(task_start: i64, view_start: i64, cell_width: f64, days_per_cell: u32) -> f64 {
    let days = (task_start - view_start).div_euclid(DAY_MS);
    days as f64 * (cell_width / f64::from(days_per_cell.max(1)))
}

/// Width of one day inside a cell that aggregates `days_per_cell` days.
#[inline]
pub fn day_width(cell_width: f64, days_per_cell: u32) -> f64 {
    cell_width / f64::from(days_per_cell.max(1))
}
