use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use chrono::{Duration, NaiveDate};
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::models::{
    CycleSettings, CycleSnapshot, Period, PeriodDaySet, DEFAULT_CYCLE_LENGTH,
    DEFAULT_PERIOD_LENGTH,
};

/// Logged days at most this far apart belong to the same period.
pub const PERIOD_GAP_TOLERANCE_DAYS: i64 = 3;
/// Number of future cycles forecast after the current one.
pub const FORECAST_CYCLES: i64 = 3;
/// Fertile window, in days after a period start. Not scaled by cycle length.
pub const FERTILE_WINDOW_OFFSETS: RangeInclusive<i64> = 11..=17;
pub const OVULATION_OFFSET_DAYS: i64 = 14;

/// Whole days from `from` to `to`. Dates carry no time of day, so this is
/// already the ceiling of the exact difference.
fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

fn offset(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

/// Split the logged days into periods, tolerating gaps of up to three days.
pub fn group_into_periods(days: &PeriodDaySet) -> Vec<Period> {
    let mut periods = Vec::new();
    let mut run: Vec<NaiveDate> = Vec::new();

    for date in days.iter() {
        if let Some(&last) = run.last() {
            if days_between(last, date) > PERIOD_GAP_TOLERANCE_DAYS {
                periods.extend(Period::from_run(std::mem::take(&mut run)));
            }
        }
        run.push(date);
    }
    periods.extend(Period::from_run(run));

    periods
}

/// Mean distance between consecutive period starts, rounded half up.
/// Falls back to `fallback` until there are two periods to compare.
pub fn infer_cycle_length(periods: &[Period], fallback: u32) -> u32 {
    if periods.len() < 2 {
        return fallback;
    }

    let total: i64 = periods
        .windows(2)
        .map(|w| days_between(w[0].start, w[1].start))
        .sum();
    let mean = total as f64 / (periods.len() - 1) as f64;

    (mean + 0.5).floor() as u32
}

/// Compute the full cycle picture for `today`.
pub fn compute_snapshot(
    days: &PeriodDaySet,
    settings: &CycleSettings,
    today: NaiveDate,
) -> CycleSnapshot {
    let periods = group_into_periods(days);
    let Some(latest) = periods.last() else {
        return CycleSnapshot::default();
    };

    let fallback = match settings.cycle_length {
        0 => DEFAULT_CYCLE_LENGTH,
        n => n,
    };
    let period_length = match settings.period_length {
        0 => DEFAULT_PERIOD_LENGTH,
        n => n,
    };

    let start = latest.start;
    let cycle_length = infer_cycle_length(&periods, fallback);
    let cycle = i64::from(cycle_length);

    let next_period_date = offset(start, cycle);

    // Rust's `%` keeps the sign of the dividend, so logged days after today
    // yield a negative cycle day.
    let current_cycle_day = match days_between(start, today) % cycle {
        0 => cycle,
        day => day,
    };

    CycleSnapshot {
        has_period_data: true,
        most_recent_period_start: Some(start),
        most_recent_period_end: Some(latest.end),
        average_cycle_length: Some(cycle_length),
        next_period_date: Some(next_period_date),
        days_until_next_period: Some(days_between(today, next_period_date)),
        current_cycle_day: Some(current_cycle_day),
        fertile_window_start: Some(offset(start, *FERTILE_WINDOW_OFFSETS.start())),
        fertile_window_end: Some(offset(start, *FERTILE_WINDOW_OFFSETS.end())),
        days_until_ovulation: Some(days_between(
            today,
            offset(start, OVULATION_OFFSET_DAYS),
        )),
        predicted_period_dates: predict_period_dates(
            days,
            start,
            cycle,
            i64::from(period_length),
        ),
        predicted_fertility_dates: predict_fertility_dates(start, cycle),
    }
}

fn predict_period_dates(
    days: &PeriodDaySet,
    start: NaiveDate,
    cycle: i64,
    period_length: i64,
) -> BTreeSet<NaiveDate> {
    // Unlogged days of the current period. Once every expected day is logged
    // this adds nothing.
    let mut predicted: BTreeSet<NaiveDate> = (0..period_length)
        .map(|day| offset(start, day))
        .filter(|date| !days.contains(*date))
        .collect();

    for n in 1..=FORECAST_CYCLES {
        let cycle_start = offset(start, cycle * n);
        predicted.extend((0..period_length).map(|day| offset(cycle_start, day)));
    }

    predicted
}

fn predict_fertility_dates(start: NaiveDate, cycle: i64) -> BTreeSet<NaiveDate> {
    (0..=FORECAST_CYCLES)
        .map(|n| offset(start, cycle * n))
        .flat_map(|cycle_start| FERTILE_WINDOW_OFFSETS.map(move |day| offset(cycle_start, day)))
        .collect()
}

/// Coarse chance of conception for today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PregnancyChance {
    VeryLow,
    High,
    LowAfterOvulation,
    LowBeforeOvulation,
}

impl PregnancyChance {
    pub fn level(self) -> &'static str {
        match self {
            PregnancyChance::VeryLow => "Very Low",
            PregnancyChance::High => "High",
            PregnancyChance::LowAfterOvulation | PregnancyChance::LowBeforeOvulation => "Low",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PregnancyChance::VeryLow => {
                "During menstruation, the chances of conception are very low."
            }
            PregnancyChance::High => {
                "You are in your fertile window, the best time for conception."
            }
            PregnancyChance::LowAfterOvulation => {
                "The fertile window has passed, chances of conception are low."
            }
            PregnancyChance::LowBeforeOvulation => {
                "Approaching the fertile window. Chances of conception are low."
            }
        }
    }
}

impl Serialize for PregnancyChance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PregnancyChance", 2)?;
        state.serialize_field("level", self.level())?;
        state.serialize_field("description", self.description())?;
        state.end()
    }
}

pub fn pregnancy_chance(
    snapshot: &CycleSnapshot,
    days: &PeriodDaySet,
    today: NaiveDate,
) -> PregnancyChance {
    if days.contains(today) {
        return PregnancyChance::VeryLow;
    }

    match snapshot.days_until_ovulation {
        Some(d) if (-3..=3).contains(&d) => PregnancyChance::High,
        Some(d) if d < -3 => PregnancyChance::LowAfterOvulation,
        _ => PregnancyChance::LowBeforeOvulation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_date_key;
    use pretty_assertions::assert_eq;

    fn date(key: &str) -> NaiveDate {
        parse_date_key(key).unwrap()
    }

    fn set(keys: &[&str]) -> PeriodDaySet {
        PeriodDaySet::from_keys(keys).unwrap()
    }

    fn range(first: &str, last: &str) -> Vec<NaiveDate> {
        date(first)
            .iter_days()
            .take_while(|d| *d <= date(last))
            .collect()
    }

    fn starts(periods: &[Period]) -> Vec<NaiveDate> {
        periods.iter().map(|p| p.start).collect()
    }

    #[test]
    fn empty_input_has_no_periods() {
        assert!(group_into_periods(&PeriodDaySet::new()).is_empty());
    }

    #[test]
    fn single_day_is_one_period() {
        let periods = group_into_periods(&set(&["2024-05-10"]));
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].start, periods[0].end);
    }

    #[test]
    fn three_day_gap_merges() {
        let periods = group_into_periods(&set(&["2024-01-01", "2024-01-04"]));
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].days, vec![date("2024-01-01"), date("2024-01-04")]);
    }

    #[test]
    fn four_day_gap_splits() {
        let periods = group_into_periods(&set(&["2024-01-01", "2024-01-05"]));
        assert_eq!(starts(&periods), vec![date("2024-01-01"), date("2024-01-05")]);
    }

    #[test]
    fn grouping_ignores_input_order() {
        let periods = group_into_periods(&set(&[
            "2024-02-01",
            "2024-01-02",
            "2024-01-29",
            "2024-01-01",
        ]));
        assert_eq!(starts(&periods), vec![date("2024-01-01"), date("2024-01-29")]);
        assert_eq!(periods[1].end, date("2024-02-01"));
    }

    #[test]
    fn regrouping_flattened_periods_is_stable() {
        let input = set(&[
            "2024-01-01", "2024-01-03", "2024-01-06", "2024-01-30", "2024-02-02", "2024-03-01",
        ]);
        let periods = group_into_periods(&input);
        let flattened: PeriodDaySet = periods.iter().flat_map(|p| p.days.clone()).collect();
        assert_eq!(group_into_periods(&flattened), periods);
    }

    #[test]
    fn cycle_length_falls_back_with_one_period() {
        let periods = group_into_periods(&set(&["2024-01-01", "2024-01-02"]));
        assert_eq!(infer_cycle_length(&periods, 31), 31);
    }

    #[test]
    fn cycle_length_is_rounded_mean() {
        // Gaps of 27 and 30 days: mean 28.5 rounds up.
        let periods = group_into_periods(&set(&["2024-01-01", "2024-01-28", "2024-02-27"]));
        assert_eq!(infer_cycle_length(&periods, 20), 29);

        // Gaps of 27 and 28 days: mean 27.5 rounds up.
        let periods = group_into_periods(&set(&["2024-01-01", "2024-01-28", "2024-02-25"]));
        assert_eq!(infer_cycle_length(&periods, 20), 28);
    }

    #[test]
    fn no_data_snapshot_is_empty() {
        let snapshot = compute_snapshot(
            &PeriodDaySet::new(),
            &CycleSettings::default(),
            date("2024-02-10"),
        );
        assert_eq!(snapshot, CycleSnapshot::default());
        assert!(!snapshot.has_period_data);
    }

    #[test]
    fn two_period_scenario() {
        let mut days: PeriodDaySet = range("2024-01-01", "2024-01-04").into_iter().collect();
        for d in range("2024-01-29", "2024-02-01") {
            days.insert(d);
        }
        let settings = CycleSettings::new(28, 5).unwrap();

        let snapshot = compute_snapshot(&days, &settings, date("2024-02-10"));

        assert!(snapshot.has_period_data);
        assert_eq!(snapshot.average_cycle_length, Some(28));
        assert_eq!(snapshot.most_recent_period_start, Some(date("2024-01-29")));
        assert_eq!(snapshot.most_recent_period_end, Some(date("2024-02-01")));
        assert_eq!(snapshot.current_cycle_day, Some(12));
        assert_eq!(snapshot.next_period_date, Some(date("2024-02-26")));
        assert_eq!(snapshot.days_until_next_period, Some(16));
        assert_eq!(snapshot.days_until_ovulation, Some(2));

        // Only 02-02 is missing from the current 5-day period.
        let mut expected: BTreeSet<NaiveDate> = BTreeSet::from([date("2024-02-02")]);
        expected.extend(range("2024-02-26", "2024-03-01"));
        expected.extend(range("2024-03-25", "2024-03-29"));
        expected.extend(range("2024-04-22", "2024-04-26"));
        assert_eq!(snapshot.predicted_period_dates, expected);
    }

    #[test]
    fn cycle_day_wraps_to_one_after_a_full_cycle() {
        let days = set(&["2024-01-01"]);
        let settings = CycleSettings::default();

        let snapshot = compute_snapshot(&days, &settings, date("2024-01-30"));
        assert_eq!(snapshot.current_cycle_day, Some(1));
    }

    #[test]
    fn cycle_day_zero_becomes_cycle_length() {
        let days = set(&["2024-01-01"]);
        let settings = CycleSettings::default();

        let snapshot = compute_snapshot(&days, &settings, date("2024-01-29"));
        assert_eq!(snapshot.current_cycle_day, Some(28));

        let snapshot = compute_snapshot(&days, &settings, date("2024-01-01"));
        assert_eq!(snapshot.current_cycle_day, Some(28));
    }

    #[test]
    fn single_period_uses_configured_cycle_length() {
        let days = set(&["2024-01-01", "2024-01-02"]);
        let settings = CycleSettings::new(32, 5).unwrap();

        let snapshot = compute_snapshot(&days, &settings, date("2024-01-10"));
        assert_eq!(snapshot.average_cycle_length, Some(32));
        assert_eq!(snapshot.next_period_date, Some(date("2024-02-02")));
    }

    #[test]
    fn fertile_window_ignores_cycle_length() {
        let days = set(&["2024-01-20", "2024-03-01"]);
        let snapshot = compute_snapshot(&days, &CycleSettings::default(), date("2024-03-05"));

        assert_eq!(snapshot.average_cycle_length, Some(41));
        assert_eq!(snapshot.fertile_window_start, Some(date("2024-03-12")));
        assert_eq!(snapshot.fertile_window_end, Some(date("2024-03-18")));
    }

    #[test]
    fn forecast_covers_three_future_cycles() {
        let days: PeriodDaySet = range("2024-03-01", "2024-03-05").into_iter().collect();
        let settings = CycleSettings::new(30, 5).unwrap();

        let snapshot = compute_snapshot(&days, &settings, date("2024-03-03"));

        // The current period is complete, so only future days are predicted.
        assert_eq!(snapshot.predicted_period_dates.len(), 15);
        assert_eq!(
            snapshot.predicted_period_dates.first(),
            Some(&date("2024-03-31"))
        );
        assert_eq!(
            snapshot.predicted_period_dates.last(),
            Some(&date("2024-06-03"))
        );

        assert_eq!(snapshot.predicted_fertility_dates.len(), 28);
        assert!(snapshot.predicted_fertility_dates.contains(&date("2024-03-12")));
        assert!(snapshot.predicted_fertility_dates.contains(&date("2024-06-16")));
        assert!(!snapshot.predicted_fertility_dates.contains(&date("2024-06-17")));
    }

    #[test]
    fn overdue_period_is_negative() {
        let days = set(&["2024-01-01"]);
        let snapshot = compute_snapshot(&days, &CycleSettings::default(), date("2024-02-03"));
        assert_eq!(snapshot.days_until_next_period, Some(-5));
    }

    #[test]
    fn pregnancy_chance_levels() {
        let days = set(&["2024-03-01", "2024-03-02"]);
        let settings = CycleSettings::default();
        let chance = |today: &str| {
            let today = date(today);
            pregnancy_chance(&compute_snapshot(&days, &settings, today), &days, today)
        };

        assert_eq!(chance("2024-03-02"), PregnancyChance::VeryLow);
        assert_eq!(chance("2024-03-05"), PregnancyChance::LowBeforeOvulation);
        assert_eq!(chance("2024-03-12"), PregnancyChance::High);
        assert_eq!(chance("2024-03-18"), PregnancyChance::High);
        assert_eq!(chance("2024-03-19"), PregnancyChance::LowAfterOvulation);
        assert_eq!(PregnancyChance::LowAfterOvulation.level(), "Low");
    }

    #[test]
    fn pregnancy_chance_without_data_is_low() {
        let days = PeriodDaySet::new();
        let today = date("2024-03-12");
        let snapshot = compute_snapshot(&days, &CycleSettings::default(), today);
        assert_eq!(
            pregnancy_chance(&snapshot, &days, today),
            PregnancyChance::LowBeforeOvulation
        );
    }
}
