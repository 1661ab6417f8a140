//! Writing streaks
//!
//! A day is active when any document was created or modified on it. Streaks
//! are always recomputed from the full active-day set; there are no stored
//! counters, so backdated or reordered edits never leave a stale streak.

use crate::types::DocumentRecord;
use chrono::{Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Streak statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    /// Consecutive active days ending today (or yesterday)
    pub current_streak: u32,
    /// Longest run of consecutive active days
    pub longest_streak: u32,
    /// Active days in the current calendar month
    pub active_days_this_month: u32,
    /// When the longest streak started
    pub longest_streak_start: Option<NaiveDate>,
    /// When the longest streak ended
    pub longest_streak_end: Option<NaiveDate>,
    /// Total days with activity
    pub total_active_days: u32,
}

impl StreakState {
    /// Share of the current month's elapsed days that were active.
    pub fn month_activity_percentage(&self, today: NaiveDate) -> f64 {
        let elapsed = today.day();
        if elapsed == 0 {
            0.0
        } else {
            (self.active_days_this_month as f64 / elapsed as f64) * 100.0
        }
    }
}

/// Distinct days on which any document was created or modified.
pub fn active_days(documents: &[DocumentRecord], offset: FixedOffset) -> BTreeSet<NaiveDate> {
    documents
        .iter()
        .flat_map(|d| [d.created_day(offset), d.modified_day(offset)])
        .collect()
}

/// Compute streaks from the active-day set as of `today`.
pub fn compute_streaks(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> StreakState {
    let mut state = StreakState {
        total_active_days: days.len() as u32,
        ..Default::default()
    };

    // Current streak: anchor on today, or yesterday if today has no activity yet
    let yesterday = today.pred_opt();
    let anchor = if days.contains(&today) {
        Some(today)
    } else {
        yesterday.filter(|d| days.contains(d))
    };
    if let Some(mut day) = anchor {
        while days.contains(&day) {
            state.current_streak += 1;
            match day.pred_opt() {
                Some(prev) => day = prev,
                None => break,
            }
        }
    }

    // Longest streak: single ascending scan
    let mut run = 0u32;
    let mut run_start: Option<NaiveDate> = None;
    let mut previous: Option<NaiveDate> = None;
    for &day in days {
        let continues = previous.and_then(|p| p.succ_opt()) == Some(day);
        if continues {
            run += 1;
        } else {
            run = 1;
            run_start = Some(day);
        }
        if run > state.longest_streak {
            state.longest_streak = run;
            state.longest_streak_start = run_start;
            state.longest_streak_end = Some(day);
        }
        previous = Some(day);
    }

    state.active_days_this_month = days
        .iter()
        .filter(|d| d.year() == today.year() && d.month() == today.month())
        .count() as u32;

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn set(days: &[NaiveDate]) -> BTreeSet<NaiveDate> {
        days.iter().copied().collect()
    }

    #[test]
    fn test_gap_breaks_current_streak() {
        let days = set(&[
            day(2024, 1, 1),
            day(2024, 1, 2),
            day(2024, 1, 3),
            day(2024, 1, 5),
        ]);
        let state = compute_streaks(&days, day(2024, 1, 5));

        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 3);
        assert_eq!(state.longest_streak_start, Some(day(2024, 1, 1)));
        assert_eq!(state.longest_streak_end, Some(day(2024, 1, 3)));
        assert_eq!(state.active_days_this_month, 4);
        assert_eq!(state.total_active_days, 4);
    }

    #[test]
    fn test_streak_survives_until_end_of_today() {
        let days = set(&[day(2024, 3, 8), day(2024, 3, 9), day(2024, 3, 10)]);

        // Nothing written yet today: yesterday's run still counts
        let state = compute_streaks(&days, day(2024, 3, 11));
        assert_eq!(state.current_streak, 3);

        // Two days idle: streak is gone
        let state = compute_streaks(&days, day(2024, 3, 12));
        assert_eq!(state.current_streak, 0);
        assert_eq!(state.longest_streak, 3);
        assert_eq!(state.active_days_this_month, 3);
    }

    #[test]
    fn test_month_boundary_counts() {
        let days = set(&[day(2024, 1, 30), day(2024, 1, 31), day(2024, 2, 1)]);
        let state = compute_streaks(&days, day(2024, 2, 1));

        assert_eq!(state.current_streak, 3);
        assert_eq!(state.active_days_this_month, 1);
        assert_eq!(state.month_activity_percentage(day(2024, 2, 1)), 100.0);
    }

    #[test]
    fn test_empty_history() {
        let state = compute_streaks(&BTreeSet::new(), day(2024, 1, 1));
        assert_eq!(state, StreakState::default());
    }

    #[test]
    fn test_active_days_include_modifications() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let docs = vec![DocumentRecord {
            path: "a.md".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            modified_at: Utc.with_ymd_and_hms(2024, 1, 4, 9, 0, 0).unwrap(),
            size_bytes: 10,
        }];

        let days = active_days(&docs, utc);
        assert_eq!(days, set(&[day(2024, 1, 1), day(2024, 1, 4)]));
    }
}
