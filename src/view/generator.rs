//! View generation.
//!
//! Builds the ordered column descriptors for each zoom level.
//!
//! # Bucket Boundaries
//! Month-view columns are calendar days. Quarter and year columns are not
//! calendar weeks/months: their boundaries are `anchor + k * step` for a
//! fixed anchor, with `step` of 7 and 30 days. Walking the anchor forward
//! keeps boundaries identical from one week to the next no matter where the
//! project starts. The 30-day step drifts from real month starts over long
//! projects; the uniform column width depends on it.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use super::{Column, ProjectedGrid, View, ViewKind};
use crate::config::BoardConfig;
use crate::models::{add_days, day_floor, TimeWindow, DAY_MS};

const MONTH_LABELS: [&str; 12] = [
    "sty", "lut", "mar", "kwi", "maj", "cze", "lip", "sie", "wrz", "paź", "lis", "gru",
];

/// Start of the `step_days` bucket containing `time_ms`, counted from `anchor_ms`.
///
/// Equivalent to walking from the anchor in `step_days` increments until the
/// next step would pass `time_ms`; also valid before the anchor.
///
/// # Examples
/// ```
/// use schedule_board::models::DAY_MS;
/// use schedule_board::view::anchored_bucket_start;
///
/// assert_eq!(anchored_bucket_start(0, 7, 9 * DAY_MS), 7 * DAY_MS);
/// assert_eq!(anchored_bucket_start(0, 7, -DAY_MS), -7 * DAY_MS);
/// ```
pub fn anchored_bucket_start(anchor_ms: i64, step_days: u32, time_ms: i64) -> i64 {
    let step = i64::from(step_days.max(1)) * DAY_MS;
    anchor_ms + (time_ms - anchor_ms).div_euclid(step) * step
}

/// Day-granular view: 25 consecutive days from the project start.
pub fn generate_month_view(project_start: i64, project_end: i64, config: &BoardConfig) -> View {
    generate_view(ViewKind::Month, project_start, project_end, config)
}

/// Week-granular view: 13 anchored weeks from the week containing the project start.
pub fn generate_quarter_view(project_start: i64, project_end: i64, config: &BoardConfig) -> View {
    generate_view(ViewKind::Quarter, project_start, project_end, config)
}

/// 30-day-granular view: 12 anchored buckets from the one containing the project start.
pub fn generate_year_view(project_start: i64, project_end: i64, config: &BoardConfig) -> View {
    generate_view(ViewKind::Year, project_start, project_end, config)
}

/// Generates any view for a project window.
pub fn generate_view(
    kind: ViewKind,
    project_start: i64,
    project_end: i64,
    config: &BoardConfig,
) -> View {
    let project = TimeWindow::new(day_floor(project_start), day_floor(project_end));
    let origin = match kind {
        ViewKind::Month => project.start_ms,
        ViewKind::Quarter | ViewKind::Year => {
            anchored_bucket_start(config.epoch_anchor_ms, kind.days_per_bucket(), project.start_ms)
        }
    };
    generate_at(kind, origin, project, config)
}

/// Generates a view whose first column starts at `origin` (already a bucket start).
pub(super) fn generate_at(
    kind: ViewKind,
    origin: i64,
    project: TimeWindow,
    config: &BoardConfig,
) -> View {
    let count = kind.column_count();
    let cell_width = config.viewport_width / count as f64;
    let step = i64::from(kind.days_per_bucket());

    let columns = (0..count as i64)
        .map(|i| {
            let bucket_start = add_days(origin, i * step);
            Column {
                label: column_label(kind, bucket_start),
                bucket_start,
                pixel_width: cell_width,
                in_project: bucket_start <= project.end_ms,
            }
        })
        .collect();

    View {
        kind,
        columns,
        cell_width,
        project,
        is_editable: kind.is_editable(),
        cells: ProjectedGrid::default(),
    }
}

fn column_label(kind: ViewKind, bucket_start: i64) -> String {
    let Some(date) = to_date(bucket_start) else {
        return String::new();
    };
    match kind {
        ViewKind::Month => date.format("%d.%m").to_string(),
        ViewKind::Quarter => format!("T{}", date.iso_week().week()),
        ViewKind::Year => format!("{} {}", MONTH_LABELS[date.month0() as usize], date.year()),
    }
}

fn to_date(time_ms: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(time_ms).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-01T00:00Z, a Monday
    const JAN_1_2024: i64 = 1_704_067_200_000;

    #[test]
    fn test_month_view_columns() {
        let config = BoardConfig::default();
        let view = generate_month_view(JAN_1_2024 + 3_600_000, JAN_1_2024 + 10 * DAY_MS, &config);

        assert_eq!(view.kind, ViewKind::Month);
        assert_eq!(view.columns.len(), 25);
        assert_eq!(view.columns[0].bucket_start, JAN_1_2024);
        assert_eq!(view.columns[1].bucket_start, JAN_1_2024 + DAY_MS);
        assert_eq!(view.columns[0].label, "01.01");
        assert_eq!(view.columns[24].label, "25.01");
        assert!((view.cell_width - 60.0).abs() < 1e-10); // 1500 / 25
        assert!(view.is_editable);
    }

    #[test]
    fn test_in_project_flag() {
        let config = BoardConfig::default();
        let view = generate_month_view(JAN_1_2024, JAN_1_2024 + 10 * DAY_MS, &config);
        assert!(view.columns[10].in_project);
        assert!(!view.columns[11].in_project);
    }

    #[test]
    fn test_quarter_view_uses_anchor() {
        // Default anchor is a Monday, so buckets start on Mondays.
        let config = BoardConfig::default();
        let wednesday = JAN_1_2024 + 2 * DAY_MS;
        let view = generate_quarter_view(wednesday, wednesday + 80 * DAY_MS, &config);

        assert_eq!(view.columns.len(), 13);
        assert_eq!(view.columns[0].bucket_start, JAN_1_2024);
        assert_eq!(view.columns[1].bucket_start, JAN_1_2024 + 7 * DAY_MS);
        assert_eq!(view.columns[0].label, "T1");
        assert_eq!(view.columns[1].label, "T2");
        assert!(!view.is_editable);
    }

    #[test]
    fn test_quarter_boundaries_stable_across_starts() {
        let config = BoardConfig::default();
        let a = generate_quarter_view(JAN_1_2024 + DAY_MS, JAN_1_2024, &config);
        let b = generate_quarter_view(JAN_1_2024 + 5 * DAY_MS, JAN_1_2024, &config);
        assert_eq!(a.columns[0].bucket_start, b.columns[0].bucket_start);
    }

    #[test]
    fn test_year_view_thirty_day_buckets() {
        let config = BoardConfig::default().with_epoch_anchor(JAN_1_2024);
        let view = generate_year_view(JAN_1_2024 + 45 * DAY_MS, JAN_1_2024 + 300 * DAY_MS, &config);

        assert_eq!(view.columns.len(), 12);
        assert_eq!(view.columns[0].bucket_start, JAN_1_2024 + 30 * DAY_MS);
        assert_eq!(view.columns[1].bucket_start, JAN_1_2024 + 60 * DAY_MS);
        assert_eq!(view.columns[0].label, "sty 2024"); // Jan 31
        assert_eq!(view.columns[1].label, "mar 2024"); // Mar 1 (leap year)
        assert!((view.cell_width - 125.0).abs() < 1e-10);
    }

    #[test]
    fn test_anchored_bucket_start() {
        assert_eq!(anchored_bucket_start(0, 7, 0), 0);
        assert_eq!(anchored_bucket_start(0, 7, 7 * DAY_MS - 1), 0);
        assert_eq!(anchored_bucket_start(0, 7, 7 * DAY_MS), 7 * DAY_MS);
        assert_eq!(anchored_bucket_start(DAY_MS, 30, 0), DAY_MS - 30 * DAY_MS);
    }

    #[test]
    fn test_anchored_bucket_matches_walk() {
        let anchor = BoardConfig::default().epoch_anchor_ms;
        let target = JAN_1_2024 + 17 * DAY_MS + 123;
        let mut walked = anchor;
        while walked + 7 * DAY_MS <= target {
            walked += 7 * DAY_MS;
        }
        assert_eq!(anchored_bucket_start(anchor, 7, target), walked);
    }
}
