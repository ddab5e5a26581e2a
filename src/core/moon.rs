//! Today's moon panel
//!
//! Phase from the mean synodic month, counted from a known new moon. Good to
//! within about a day, which is plenty for "what should I look for tonight".

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::Serialize;

/// Mean length of a lunar cycle in days
const SYNODIC_MONTH_DAYS: f64 = 29.530588853;

/// New moon of 2000-01-06 18:14 UTC
const REFERENCE_NEW_MOON_UNIX: i64 = 947_182_440;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoonPhase {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl MoonPhase {
    const CYCLE: [MoonPhase; 8] = [
        MoonPhase::NewMoon,
        MoonPhase::WaxingCrescent,
        MoonPhase::FirstQuarter,
        MoonPhase::WaxingGibbous,
        MoonPhase::FullMoon,
        MoonPhase::WaningGibbous,
        MoonPhase::LastQuarter,
        MoonPhase::WaningCrescent,
    ];

    /// Nearest of the eight named phases for a position in the cycle (0.0..1.0).
    fn from_cycle_fraction(fraction: f64) -> Self {
        let index = (fraction * 8.0 + 0.5).floor() as usize % 8;
        Self::CYCLE[index]
    }

    pub fn name(&self) -> &'static str {
        match self {
            MoonPhase::NewMoon => "New moon",
            MoonPhase::WaxingCrescent => "Waxing crescent",
            MoonPhase::FirstQuarter => "First quarter",
            MoonPhase::WaxingGibbous => "Waxing gibbous",
            MoonPhase::FullMoon => "Full moon",
            MoonPhase::WaningGibbous => "Waning gibbous",
            MoonPhase::LastQuarter => "Last quarter",
            MoonPhase::WaningCrescent => "Waning crescent",
        }
    }

    pub fn viewing_hint(&self) -> &'static str {
        match self {
            MoonPhase::NewMoon => "Hard to see: the moon rises and sets with the sun.",
            MoonPhase::WaxingCrescent => "Look low in the west just after sunset.",
            MoonPhase::FirstQuarter => "Up from the afternoon; best in the evening after 7 pm.",
            MoonPhase::WaxingGibbous => "Rises in the afternoon; look south-east in the evening.",
            MoonPhase::FullMoon => "Rises at sunset and stays up all night.",
            MoonPhase::WaningGibbous => "Rises after dark; best late in the evening.",
            MoonPhase::LastQuarter => "Rises around midnight; look for it in the morning sky.",
            MoonPhase::WaningCrescent => "Look low in the east before sunrise.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MoonReport {
    pub date: NaiveDate,
    pub phase: MoonPhase,
    pub phase_name: &'static str,
    /// Days since the last new moon
    pub age_days: f64,
    /// Illuminated fraction of the disc, 0.0 to 1.0
    pub illumination: f64,
    pub viewing_hint: &'static str,
}

/// Days since the most recent new moon at `at`.
pub fn moon_age_days(at: DateTime<Utc>) -> f64 {
    let elapsed = (at.timestamp() - REFERENCE_NEW_MOON_UNIX) as f64 / SECONDS_PER_DAY;
    elapsed.rem_euclid(SYNODIC_MONTH_DAYS)
}

/// The moon as it looks around midday UTC on `date`.
pub fn report_for(date: NaiveDate) -> MoonReport {
    let at = date.and_time(NaiveTime::MIN).and_utc() + TimeDelta::hours(12);
    let age_days = moon_age_days(at);
    let fraction = age_days / SYNODIC_MONTH_DAYS;
    let phase = MoonPhase::from_cycle_fraction(fraction);

    MoonReport {
        date,
        phase,
        phase_name: phase.name(),
        age_days,
        illumination: (1.0 - (2.0 * std::f64::consts::PI * fraction).cos()) / 2.0,
        viewing_hint: phase.viewing_hint(),
    }
}
