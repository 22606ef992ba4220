//! Dose schedule calculation.
//!
//! Every schedule is built from fixed daily grids in the pharmacy's local
//! time zone:
//! - 1/day: 08:00
//! - 2/day: 08:00, 20:00
//! - 3/day: 08:00, 14:00, 20:00 (the three dose windows)
//! - 4/day: 08:00, 12:00, 16:00, 20:00
//!
//! Given a reference instant the grid is rotated so it starts at the next
//! slot still due today. Comparison is per clock hour: a slot stays current
//! until its hour has fully elapsed.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::DEFAULT_UTC_OFFSET_MINUTES;

/// A wall-clock time of day at minute precision
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DoseTime {
    hour: u8,
    minute: u8,
}

impl DoseTime {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for DoseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// One of the three canonical daily dose windows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseWindow {
    Morning,
    Afternoon,
    Evening,
}

impl DoseWindow {
    pub const ALL: [DoseWindow; 3] = [DoseWindow::Morning, DoseWindow::Afternoon, DoseWindow::Evening];

    /// Local hour at which the window opens
    pub const fn hour(self) -> u8 {
        match self {
            DoseWindow::Morning => 8,
            DoseWindow::Afternoon => 14,
            DoseWindow::Evening => 20,
        }
    }

    /// 1-based position within the day
    pub const fn index(self) -> u8 {
        match self {
            DoseWindow::Morning => 1,
            DoseWindow::Afternoon => 2,
            DoseWindow::Evening => 3,
        }
    }

    pub const fn time(self) -> DoseTime {
        DoseTime::new(self.hour(), 0)
    }

    pub fn from_hour(hour: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.hour() == hour)
    }
}

const ONCE_DAILY: [DoseTime; 1] = [DoseWindow::Morning.time()];
const TWICE_DAILY: [DoseTime; 2] = [DoseWindow::Morning.time(), DoseWindow::Evening.time()];
const THRICE_DAILY: [DoseTime; 3] = [
    DoseWindow::Morning.time(),
    DoseWindow::Afternoon.time(),
    DoseWindow::Evening.time(),
];
const FOUR_TIMES_DAILY: [DoseTime; 4] = [
    DoseTime::new(8, 0),
    DoseTime::new(12, 0),
    DoseTime::new(16, 0),
    DoseTime::new(20, 0),
];

/// The static daily grid for a frequency; empty for as-needed or unknown values
pub fn canonical_grid(frequency: u8) -> &'static [DoseTime] {
    match frequency {
        1 => &ONCE_DAILY,
        2 => &TWICE_DAILY,
        3 => &THRICE_DAILY,
        4 => &FOUR_TIMES_DAILY,
        _ => &[],
    }
}

/// The pharmacy's default local zone (+05:30)
pub fn default_zone() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).expect("+05:30 is a valid offset")
}

/// Local clock hour of `instant` in `zone`
pub fn local_hour(instant: DateTime<Utc>, zone: &FixedOffset) -> u32 {
    instant.with_timezone(zone).hour()
}

/// Upcoming dose times using the default local zone
pub fn next_dose_times(frequency: u8, reference: Option<DateTime<Utc>>) -> Vec<DoseTime> {
    next_dose_times_in(frequency, reference, &default_zone())
}

/// Upcoming dose times for `frequency` doses per day, ordered from now
///
/// Without a reference instant the canonical grid is returned as-is.
pub fn next_dose_times_in(
    frequency: u8,
    reference: Option<DateTime<Utc>>,
    zone: &FixedOffset,
) -> Vec<DoseTime> {
    let grid = canonical_grid(frequency);

    let Some(instant) = reference else {
        return grid.to_vec();
    };

    if frequency == 4 {
        return grid.to_vec();
    }

    let hour = local_hour(instant, zone);
    let start = grid
        .iter()
        .position(|t| u32::from(t.hour()) >= hour)
        .unwrap_or(0);

    grid[start..].iter().chain(&grid[..start]).copied().collect()
}

/// Render times as `HH:MM` strings for display
pub fn format_times(times: &[DoseTime]) -> Vec<String> {
    times.iter().map(ToString::to_string).collect()
}
