//! Analytics arithmetic
//!
//! Pure helpers used by the tracking endpoints and the admin summary:
//! window and duration clamping, referrer normalisation, anonymous visitor
//! ids, daily series gap filling and the conversion funnel.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::analytics_event::DailyCount;

/// Summary window used when the client does not ask for one
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Largest summary window
pub const MAX_WINDOW_DAYS: i64 = 365;

/// Longest time on page we accept (one day)
pub const MAX_DURATION_SECS: i32 = 86_400;

/// Clamps a requested summary window to `1..=365` days, defaulting to 30
pub fn clamp_window_days(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, MAX_WINDOW_DAYS)
}

/// Clamps a reported time on page to `0..=86400` seconds
pub fn clamp_duration(seconds: i64) -> i32 {
    seconds.clamp(0, MAX_DURATION_SECS as i64) as i32
}

/// A window of whole UTC days ending today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl Window {
    /// The last `days` days including today
    pub fn last_days(days: i64, now: DateTime<Utc>) -> Self {
        let last_day = now.date_naive();
        let first_day = last_day - Duration::days(days.max(1) - 1);
        Self { first_day, last_day }
    }

    /// Midnight UTC at the start of the window
    pub fn since(&self) -> DateTime<Utc> {
        self.first_day.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn days(&self) -> i64 {
        (self.last_day - self.first_day).num_days() + 1
    }
}

/// Expands sparse per-day counts into one entry per day of the window
pub fn fill_daily_series(counts: &[DailyCount], window: &Window) -> Vec<DailyCount> {
    let mut series = Vec::with_capacity(window.days() as usize);
    let mut day = window.first_day;

    while day <= window.last_day {
        let count = counts
            .iter()
            .find(|c| c.day == day)
            .map(|c| c.count)
            .unwrap_or(0);
        series.push(DailyCount { day, count });
        day += Duration::days(1);
    }

    series
}

/// Reduces a referrer URL to its host, without a leading `www.`
///
/// Returns None for blank or unparseable referrers.
pub fn referrer_domain(referrer: &str) -> Option<String> {
    let referrer = referrer.trim();
    if referrer.is_empty() {
        return None;
    }

    let parsed = url::Url::parse(referrer).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Stable anonymous visitor id for clients that send no session id
///
/// Hashes the IP address and user agent so the raw IP is never stored.
pub fn visitor_hash(ip: &str, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.as_bytes());
    hex::encode(hasher.finalize())
}

/// `part / whole` as a percentage rounded to two decimals; 0 when `whole` is 0
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }

    let pct = part as f64 / whole as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Aggregate counts feeding the conversion funnel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunnelCounts {
    pub visitors: i64,
    pub subscribers: i64,
    pub consultations: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub name: &'static str,
    pub count: i64,

    /// Percentage of the previous stage that reached this one
    pub conversion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Funnel {
    pub stages: Vec<FunnelStage>,

    /// Completed consultations as a percentage of visitors
    pub overall_conversion: f64,
}

/// Builds the visitor → subscriber → consultation → completed funnel
///
/// The first stage's conversion is 100 when it has any visitors.
pub fn build_funnel(counts: &FunnelCounts) -> Funnel {
    let steps = [
        ("visitors", counts.visitors),
        ("subscribers", counts.subscribers),
        ("consultations", counts.consultations),
        ("completed", counts.completed),
    ];

    let mut stages = Vec::with_capacity(steps.len());
    let mut previous = counts.visitors;

    for (name, count) in steps {
        stages.push(FunnelStage {
            name,
            count,
            conversion: percentage(count, previous),
        });
        previous = count;
    }

    Funnel {
        stages,
        overall_conversion: percentage(counts.completed, counts.visitors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_clamp_window_days() {
        assert_eq!(clamp_window_days(None), 30);
        assert_eq!(clamp_window_days(Some(0)), 1);
        assert_eq!(clamp_window_days(Some(-5)), 1);
        assert_eq!(clamp_window_days(Some(7)), 7);
        assert_eq!(clamp_window_days(Some(10_000)), 365);
    }

    #[test]
    fn test_clamp_duration() {
        assert_eq!(clamp_duration(-3), 0);
        assert_eq!(clamp_duration(42), 42);
        assert_eq!(clamp_duration(1_000_000), MAX_DURATION_SECS);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(5, 5), 100.0);
    }

    #[test]
    fn test_percentage_zero_denominator() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(10, 0), 0.0);
    }

    #[test]
    fn test_funnel_with_no_traffic() {
        let funnel = build_funnel(&FunnelCounts::default());

        assert_eq!(funnel.stages.len(), 4);
        assert!(funnel.stages.iter().all(|s| s.conversion == 0.0));
        assert_eq!(funnel.overall_conversion, 0.0);
    }

    #[test]
    fn test_funnel_stage_conversions() {
        let funnel = build_funnel(&FunnelCounts {
            visitors: 200,
            subscribers: 50,
            consultations: 10,
            completed: 4,
        });

        let conversions: Vec<f64> = funnel.stages.iter().map(|s| s.conversion).collect();
        assert_eq!(conversions, vec![100.0, 25.0, 20.0, 40.0]);
        assert_eq!(funnel.overall_conversion, 2.0);
    }

    #[test]
    fn test_funnel_zero_middle_stage() {
        let funnel = build_funnel(&FunnelCounts {
            visitors: 10,
            subscribers: 0,
            consultations: 3,
            completed: 1,
        });

        // consultations divide by zero subscribers
        assert_eq!(funnel.stages[2].conversion, 0.0);
        assert_eq!(funnel.stages[3].conversion, 33.33);
    }

    #[test]
    fn test_window_last_days() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 15, 30, 0).unwrap();
        let window = Window::last_days(7, now);

        assert_eq!(window.first_day, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(window.last_day, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(window.days(), 7);
        assert_eq!(window.since(), Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_fill_daily_series() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let window = Window::last_days(3, now);
        let sparse = vec![DailyCount {
            day: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            count: 12,
        }];

        let series = fill_daily_series(&sparse, &window);
        let counts: Vec<i64> = series.iter().map(|d| d.count).collect();

        assert_eq!(series.len(), 3);
        assert_eq!(counts, vec![0, 12, 0]);
        assert_eq!(series[0].day, NaiveDate::from_ymd_opt(2025, 3, 8).unwrap());
    }

    #[test]
    fn test_referrer_domain() {
        assert_eq!(
            referrer_domain("https://www.Google.com/search?q=rust"),
            Some("google.com".to_string())
        );
        assert_eq!(
            referrer_domain("http://news.ycombinator.com/item?id=1"),
            Some("news.ycombinator.com".to_string())
        );
        assert_eq!(referrer_domain(""), None);
        assert_eq!(referrer_domain("not a url"), None);
    }

    #[test]
    fn test_visitor_hash() {
        let a = visitor_hash("203.0.113.7", "Mozilla/5.0");
        assert_eq!(a.len(), 64);
        assert_eq!(a, visitor_hash("203.0.113.7", "Mozilla/5.0"));
        assert_ne!(a, visitor_hash("203.0.113.8", "Mozilla/5.0"));
    }
}
