//! Aggregate insights
//!
//! Turns a set of stored measurements into the summaries shown next to the
//! charts: today's insight with a canned recommendation, a per-day summary
//! with a rule-based hint, a week-over-week heart rate trend and per-metric
//! avg/min/max. All day and week windows are computed in UTC.

use crate::store::MeasurementStore;
use crate::types::{HeartStatus, Measurement};
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const SUMMARY_OK: &str =
    "Your heart metrics look balanced today. Keep your routine steady and stay hydrated.";
pub const SUMMARY_ELEVATED: &str = "Your heart shows some elevated patterns today. It might help to take breaks, reduce stress and avoid heavy exertion.";
pub const SUMMARY_WARNING: &str = "Several readings are outside the optimal range. If you feel unwell, consider resting and consulting a medical professional.";

pub const HINT_NO_DATA: &str =
    "No data recorded for the selected day. Please select a different date.";

/// Daily aggregate of a user's readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyInsight {
    /// Status derived from the unrounded average score
    pub status: HeartStatus,
    /// Average score, rounded
    pub score: i64,
    pub avg_heart_rate: i64,
    pub max_heart_rate: f64,
    pub min_heart_rate: f64,
    pub avg_spo2: i64,
    pub summary_text: String,
}

impl DailyInsight {
    /// Aggregate readings. Returns `None` when there is nothing to aggregate.
    pub fn from_measurements(measurements: &[&Measurement]) -> Option<Self> {
        if measurements.is_empty() {
            return None;
        }

        let avg_heart_rate = mean(measurements.iter().map(|m| m.heart_rate))?;
        let avg_spo2 = mean(measurements.iter().map(|m| m.spo2))?;
        let avg_score = mean(measurements.iter().map(|m| f64::from(m.score)))?;
        let max_heart_rate = measurements
            .iter()
            .map(|m| m.heart_rate)
            .fold(f64::NEG_INFINITY, f64::max);
        let min_heart_rate = measurements
            .iter()
            .map(|m| m.heart_rate)
            .fold(f64::INFINITY, f64::min);

        let status = HeartStatus::from_average(avg_score);
        let summary_text = match status {
            HeartStatus::Ok => SUMMARY_OK,
            HeartStatus::Elevated => SUMMARY_ELEVATED,
            HeartStatus::Warning => SUMMARY_WARNING,
        };

        Some(Self {
            status,
            score: avg_score.round() as i64,
            avg_heart_rate: avg_heart_rate.round() as i64,
            max_heart_rate,
            min_heart_rate,
            avg_spo2: avg_spo2.round() as i64,
            summary_text: summary_text.to_string(),
        })
    }
}

/// Today's insight for a user: readings from UTC midnight through `now`
pub fn today_for_user(
    store: &MeasurementStore,
    user_id: u64,
    now: DateTime<Utc>,
) -> Option<DailyInsight> {
    let start = start_of_day(now.date_naive());
    let readings = store.for_user_between(user_id, start, now);
    DailyInsight::from_measurements(&readings)
}

/// Per-day averages (one decimal) and heart rate extremes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: Option<NaiveDate>,
    pub count: usize,
    pub avg_heart_rate: Option<f64>,
    pub avg_spo2: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub avg_motion_level: Option<f64>,
    pub highest_bpm: Option<f64>,
    pub lowest_bpm: Option<f64>,
}

impl DaySummary {
    pub fn from_measurements(date: NaiveDate, measurements: &[&Measurement]) -> Self {
        let hr = MetricSummary::from_values(measurements.iter().map(|m| m.heart_rate));
        Self {
            date: Some(date),
            count: measurements.len(),
            avg_heart_rate: hr.avg.map(round1),
            avg_spo2: mean(measurements.iter().map(|m| m.spo2)).map(round1),
            avg_temperature: mean(measurements.iter().map(|m| m.temperature)).map(round1),
            avg_motion_level: mean(measurements.iter().map(|m| m.motion_level)).map(round1),
            highest_bpm: hr.max,
            lowest_bpm: hr.min,
        }
    }

    /// Summary of all readings whose UTC date is `date`
    pub fn for_day(store: &MeasurementStore, date: NaiveDate) -> Self {
        let start = start_of_day(date);
        let end = add_days(start, 1);
        let readings: Vec<&Measurement> = store
            .between(start, end)
            .into_iter()
            .filter(|m| m.created_at < end)
            .collect();
        Self::from_measurements(date, &readings)
    }
}

/// Rule-based hint for a day.
///
/// Motion is read on a 0-100 scale here, unlike the evaluator's 0-1 fraction.
pub fn day_hint(summary: &DaySummary) -> String {
    let (Some(avg_hr), Some(avg_o2), Some(avg_motion)) = (
        summary.avg_heart_rate,
        summary.avg_spo2,
        summary.avg_motion_level,
    ) else {
        return HINT_NO_DATA.to_string();
    };

    if avg_o2 < 92.0 {
        return "⚠️ Low average SpO₂ detected for the day. This requires monitoring; ensure periods of deep rest and relaxation.".to_string();
    }
    if avg_hr > 90.0 {
        return format!(
            "Your average heart rate of {avg_hr} BPM is elevated. Consider stress reduction techniques or lighter physical activity."
        );
    }
    if avg_motion > 60.0 {
        return "Good day! High average motion and normal heart rate suggest healthy activity levels.".to_string();
    }
    if avg_hr < 60.0 {
        return format!(
            "Average heart rate of {avg_hr} BPM is low. If you are an athlete, this is normal; otherwise, monitor for potential bradycardia."
        );
    }
    "Your vitals look stable for the selected day. Keep a balanced routine.".to_string()
}

/// Week-over-week heart rate trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTrend {
    pub week_start: NaiveDate,
    /// Average heart rate this week, 0 without data
    pub week_avg: f64,
    /// Average heart rate the week before, 0 without data
    pub last_week_avg: f64,
    /// Percentage change rounded to one decimal, 0 when last week is empty
    pub percentage_change: f64,
}

impl WeeklyTrend {
    /// Trend for the week starting on the Monday of `day`
    pub fn for_week_of(store: &MeasurementStore, day: NaiveDate) -> Self {
        let week_start = monday_of(day);
        let start = start_of_day(week_start);
        let end = add_days(start, 7);
        let last_start = sub_days(start, 7);

        let week_avg = window_heart_rate_avg(store, start, end);
        let last_week_avg = window_heart_rate_avg(store, last_start, start);

        let percentage_change = if last_week_avg != 0.0 {
            round1((week_avg - last_week_avg) / last_week_avg * 100.0)
        } else {
            0.0
        };

        Self {
            week_start,
            week_avg,
            last_week_avg,
            percentage_change,
        }
    }
}

fn window_heart_rate_avg(store: &MeasurementStore, from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    mean(
        store
            .between(from, to)
            .into_iter()
            .filter(|m| m.created_at < to)
            .map(|m| m.heart_rate),
    )
    .unwrap_or(0.0)
}

/// Average, minimum and maximum of one metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl MetricSummary {
    pub fn from_values(values: impl Iterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for value in values {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            avg: Some(sum / count as f64),
            min: Some(min),
            max: Some(max),
        }
    }
}

/// Per-metric summaries over a set of readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsOverview {
    pub heart_rate: MetricSummary,
    pub spo2: MetricSummary,
    pub temperature: MetricSummary,
    pub motion_level: MetricSummary,
}

impl MetricsOverview {
    pub fn from_measurements<'a>(measurements: impl Iterator<Item = &'a Measurement> + Clone) -> Self {
        Self {
            heart_rate: MetricSummary::from_values(measurements.clone().map(|m| m.heart_rate)),
            spo2: MetricSummary::from_values(measurements.clone().map(|m| m.spo2)),
            temperature: MetricSummary::from_values(measurements.clone().map(|m| m.temperature)),
            motion_level: MetricSummary::from_values(measurements.map(|m| m.motion_level)),
        }
    }
}

/// Monday of the ISO week containing `day`, clamped to `NaiveDate::MIN`
pub fn monday_of(day: NaiveDate) -> NaiveDate {
    day.checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_monday())))
        .unwrap_or(NaiveDate::MIN)
}

// Window bounds saturate at the ends of the calendar
fn add_days(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    at.checked_add_signed(Duration::days(days))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn sub_days(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    at.checked_sub_signed(Duration::days(days))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::types::MeasurementInput;
    use pretty_assertions::assert_eq;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn put(store: &mut MeasurementStore, user_id: u64, input: MeasurementInput, when: DateTime<Utc>) {
        let evaluation = evaluate(&input);
        store.insert(user_id, &input, &evaluation, "device", when).unwrap();
    }

    #[test]
    fn test_daily_insight_averages() {
        let mut store = MeasurementStore::default();
        put(&mut store, 1, MeasurementInput::new(70.0, 98.0, 22.0, 0.1), ts(4, 8));
        put(&mut store, 1, MeasurementInput::new(45.0, 97.0, 22.0, 0.1), ts(4, 9));
        put(&mut store, 1, MeasurementInput::new(81.0, 96.0, 22.0, 0.1), ts(4, 10));

        let insight = today_for_user(&store, 1, ts(4, 12)).unwrap();
        // scores 100, 80, 100 -> 93.33
        assert_eq!(insight.score, 93);
        assert_eq!(insight.status, HeartStatus::Ok);
        assert_eq!(insight.avg_heart_rate, 65);
        assert_eq!(insight.avg_spo2, 97);
        assert_eq!(insight.max_heart_rate, 81.0);
        assert_eq!(insight.min_heart_rate, 45.0);
        assert_eq!(insight.summary_text, SUMMARY_OK);
    }

    #[test]
    fn test_daily_insight_window_and_user() {
        let mut store = MeasurementStore::default();
        // yesterday, other user, and a future reading are all excluded
        put(&mut store, 1, MeasurementInput::new(115.0, 88.0, 30.0, 0.1), ts(3, 23));
        put(&mut store, 2, MeasurementInput::new(115.0, 88.0, 30.0, 0.1), ts(4, 8));
        put(&mut store, 1, MeasurementInput::new(115.0, 88.0, 30.0, 0.1), ts(4, 20));
        put(&mut store, 1, MeasurementInput::new(105.0, 94.0, 22.0, 0.1), ts(4, 9));

        let insight = today_for_user(&store, 1, ts(4, 12)).unwrap();
        assert_eq!(insight.score, 80);
        assert_eq!(insight.status, HeartStatus::Ok);

        assert!(today_for_user(&store, 3, ts(4, 12)).is_none());
    }

    #[test]
    fn test_daily_insight_status_from_average() {
        let mut store = MeasurementStore::default();
        put(&mut store, 1, MeasurementInput::new(115.0, 88.0, 30.0, 0.1), ts(4, 8));
        put(&mut store, 1, MeasurementInput::new(72.0, 98.0, 22.0, 0.1), ts(4, 9));

        // (35 + 100) / 2 = 67.5
        let insight = today_for_user(&store, 1, ts(4, 12)).unwrap();
        assert_eq!(insight.status, HeartStatus::Elevated);
        assert_eq!(insight.score, 68);
        assert_eq!(insight.summary_text, SUMMARY_ELEVATED);
    }

    #[test]
    fn test_day_summary_and_hint() {
        let mut store = MeasurementStore::default();
        put(&mut store, 1, MeasurementInput::new(95.0, 97.0, 21.0, 0.2), ts(4, 8));
        put(&mut store, 1, MeasurementInput::new(96.0, 98.0, 22.0, 0.4), ts(4, 9));
        put(&mut store, 1, MeasurementInput::new(60.0, 98.0, 22.0, 0.4), ts(5, 0));

        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let summary = DaySummary::for_day(&store, day);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.avg_heart_rate, Some(95.5));
        assert_eq!(summary.avg_motion_level, Some(0.3));
        assert_eq!(summary.highest_bpm, Some(96.0));
        assert_eq!(summary.lowest_bpm, Some(95.0));
        assert!(day_hint(&summary).contains("95.5 BPM is elevated"));
    }

    #[test]
    fn test_day_hint_rules() {
        let base = DaySummary {
            avg_heart_rate: Some(75.0),
            avg_spo2: Some(97.0),
            avg_motion_level: Some(20.0),
            ..Default::default()
        };
        assert!(day_hint(&base).starts_with("Your vitals look stable"));

        let low_o2 = DaySummary {
            avg_spo2: Some(91.0),
            avg_heart_rate: Some(120.0),
            ..base.clone()
        };
        assert!(day_hint(&low_o2).contains("Low average SpO₂"));

        let active = DaySummary {
            avg_motion_level: Some(70.0),
            ..base.clone()
        };
        assert!(day_hint(&active).starts_with("Good day!"));

        let slow = DaySummary {
            avg_heart_rate: Some(55.0),
            ..base
        };
        assert!(day_hint(&slow).contains("bradycardia"));

        assert_eq!(day_hint(&DaySummary::default()), HINT_NO_DATA);
    }

    #[test]
    fn test_weekly_trend() {
        let mut store = MeasurementStore::default();
        // 2024-03-04 is a Monday
        put(&mut store, 1, MeasurementInput::new(60.0, 98.0, 22.0, 0.1), ts(1, 8));
        put(&mut store, 1, MeasurementInput::new(80.0, 98.0, 22.0, 0.1), ts(2, 8));
        put(&mut store, 1, MeasurementInput::new(77.0, 98.0, 22.0, 0.1), ts(5, 8));

        let trend = WeeklyTrend::for_week_of(&store, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(trend.week_start, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(trend.week_avg, 77.0);
        assert_eq!(trend.last_week_avg, 70.0);
        assert_eq!(trend.percentage_change, 10.0);

        let empty = WeeklyTrend::for_week_of(&MeasurementStore::default(), trend.week_start);
        assert_eq!(empty.week_avg, 0.0);
        assert_eq!(empty.percentage_change, 0.0);
    }

    #[test]
    fn test_windows_at_calendar_bounds() {
        let mut store = MeasurementStore::default();
        let last_noon = Utc.from_utc_datetime(&NaiveDate::MAX.and_hms_opt(12, 0, 0).unwrap());
        put(&mut store, 1, MeasurementInput::new(70.0, 98.0, 22.0, 0.1), last_noon);

        let summary = DaySummary::for_day(&store, NaiveDate::MAX);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.avg_heart_rate, Some(70.0));

        let late = WeeklyTrend::for_week_of(&store, NaiveDate::MAX);
        assert_eq!(late.week_avg, 70.0);

        let early = WeeklyTrend::for_week_of(&store, NaiveDate::MIN);
        assert_eq!(early.week_start, NaiveDate::MIN);
        assert_eq!(early.last_week_avg, 0.0);
        assert_eq!(early.percentage_change, 0.0);

        assert_eq!(DaySummary::for_day(&store, NaiveDate::MIN).count, 0);
    }

    #[test]
    fn test_metric_summary() {
        let summary = MetricSummary::from_values([3.0, 1.0, 2.0].into_iter());
        assert_eq!(summary.avg, Some(2.0));
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(3.0));

        assert_eq!(MetricSummary::from_values(std::iter::empty()), MetricSummary::default());
    }
}
