//! Presentation-side readings of a [`CycleSnapshot`]: cycle phase, the next
//! notable event, and short day-to-day suggestions.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{CycleSettings, CycleSnapshot, DataOwner, DayDetails, PeriodDaySet};
use crate::prediction::{self, PregnancyChance};

const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Fertile,
    Luteal,
    Premenstrual,
}

impl CyclePhase {
    pub fn from_cycle_day(day: i64) -> Self {
        match day {
            i64::MIN..=5 => CyclePhase::Menstrual,
            6..=10 => CyclePhase::Follicular,
            11..=17 => CyclePhase::Fertile,
            18..=25 => CyclePhase::Luteal,
            _ => CyclePhase::Premenstrual,
        }
    }

    fn tips(self) -> &'static [&'static str] {
        match self {
            CyclePhase::Menstrual => &[
                "Consider gentle exercise and rest during your period",
                "Stay hydrated and maintain a balanced diet",
            ],
            CyclePhase::Follicular => &[],
            CyclePhase::Fertile => &[
                "This is your fertile window - plan accordingly",
                "Consider tracking cervical mucus for fertility awareness",
            ],
            CyclePhase::Luteal => &[
                "Energy levels typically increase during this phase",
                "Great time for high-intensity workouts",
            ],
            CyclePhase::Premenstrual => &[
                "PMS symptoms may appear - practice self-care",
                "Consider reducing caffeine and increasing magnesium",
            ],
        }
    }
}

/// The event a summary view should lead with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UpcomingEvent {
    CurrentPeriod { is_first_day: bool, period_day: i64 },
    NextPeriod { days: i64 },
    Ovulation { days: i64 },
}

/// 1-indexed day within the current period, if today is a logged period day.
pub fn current_period_day(
    snapshot: &CycleSnapshot,
    days: &PeriodDaySet,
    today: NaiveDate,
) -> Option<i64> {
    let start = snapshot.most_recent_period_start?;
    days.contains(today)
        .then(|| (today - start).num_days() + 1)
}

/// The ongoing period, or whichever of next period and ovulation is nearer.
/// Events already in the past are skipped; ties favour the period.
pub fn closest_event(
    snapshot: &CycleSnapshot,
    days: &PeriodDaySet,
    today: NaiveDate,
) -> Option<UpcomingEvent> {
    if !snapshot.has_period_data {
        return None;
    }

    if let Some(period_day) = current_period_day(snapshot, days, today) {
        return Some(UpcomingEvent::CurrentPeriod {
            is_first_day: snapshot.most_recent_period_start == Some(today),
            period_day,
        });
    }

    let period = snapshot
        .days_until_next_period
        .map(|days| UpcomingEvent::NextPeriod { days });
    let ovulation = snapshot
        .days_until_ovulation
        .map(|days| UpcomingEvent::Ovulation { days });

    period
        .into_iter()
        .chain(ovulation)
        .filter(|event| event_days(event) >= 0)
        .min_by_key(event_days)
}

fn event_days(event: &UpcomingEvent) -> i64 {
    match *event {
        UpcomingEvent::CurrentPeriod { .. } => 0,
        UpcomingEvent::NextPeriod { days } | UpcomingEvent::Ovulation { days } => days,
    }
}

/// Up to three short tips for today.
pub fn suggestions(
    owner: DataOwner,
    snapshot: &CycleSnapshot,
    today_log: Option<&DayDetails>,
) -> Vec<&'static str> {
    if !snapshot.has_period_data {
        return match owner {
            DataOwner::Partner => vec![
                "Your partner hasn't started tracking their period yet",
                "Once they begin tracking, you'll see their cycle insights here",
            ],
            DataOwner::Own => vec![
                "Start tracking your period to get personalized insights",
                "Log your first period day to begin cycle predictions",
            ],
        };
    }

    let mut tips: Vec<&'static str> = Vec::new();

    if let Some(day) = snapshot.current_cycle_day.filter(|d| *d > 0) {
        tips.extend(CyclePhase::from_cycle_day(day).tips());
    }

    if let Some(log) = today_log {
        let symptom_tips = [
            ("cramps", "Try heat therapy or gentle stretching for cramps"),
            ("fatigue", "Listen to your body and rest when needed"),
            ("bloating", "Reduce salt intake and stay hydrated"),
        ];
        let mood_tips = [
            ("anxious", "Practice deep breathing or meditation"),
            ("irritable", "Take breaks and avoid stressful situations"),
        ];
        tips.extend(
            symptom_tips
                .iter()
                .filter(|(tag, _)| log.symptoms.contains(*tag))
                .map(|(_, tip)| *tip),
        );
        tips.extend(
            mood_tips
                .iter()
                .filter(|(tag, _)| log.mood.contains(*tag))
                .map(|(_, tip)| *tip),
        );
    }

    if tips.is_empty() {
        tips.push("Keep tracking to receive personalized insights");
        tips.push("Regular exercise can help with cycle regularity");
    }

    tips.truncate(MAX_SUGGESTIONS);
    tips
}

/// Everything a status view needs, computed in one pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub today: NaiveDate,
    pub is_partner_data: bool,
    #[serde(flatten)]
    pub snapshot: CycleSnapshot,
    pub pregnancy_chance: Option<PregnancyChance>,
    pub phase: Option<CyclePhase>,
    pub current_period_day: Option<i64>,
    pub closest_event: Option<UpcomingEvent>,
    pub suggestions: Vec<&'static str>,
}

impl CycleReport {
    pub fn build(
        owner: DataOwner,
        days: &PeriodDaySet,
        settings: &CycleSettings,
        today_log: Option<&DayDetails>,
        today: NaiveDate,
    ) -> Self {
        let snapshot = prediction::compute_snapshot(days, settings, today);

        let pregnancy_chance = snapshot
            .has_period_data
            .then(|| prediction::pregnancy_chance(&snapshot, days, today));
        let phase = snapshot
            .current_cycle_day
            .filter(|d| *d > 0)
            .map(CyclePhase::from_cycle_day);

        Self {
            today,
            is_partner_data: owner.is_partner(),
            pregnancy_chance,
            phase,
            current_period_day: current_period_day(&snapshot, days, today),
            closest_event: closest_event(&snapshot, days, today),
            suggestions: suggestions(owner, &snapshot, today_log),
            snapshot,
        }
    }
}
