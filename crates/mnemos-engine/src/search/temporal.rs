//! Temporal search: natural-language time expressions over creation time

use super::{ScoredFact, SearchEngine, SearchFilters};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use mnemos_core::Result;
use mnemos_store::FactStore;

/// An inclusive time window resolved from a query expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn day_start(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Resolve a natural-language time expression relative to `now`
///
/// Recognizes: yesterday, today, this/last week, this/last month, this/last
/// year, "last N days/weeks/months", quarter labels ("Q2 2026") and ISO
/// dates (2026-08-24). Returns None when the query has no time expression.
pub fn parse_time_expression(query: &str, now: DateTime<Utc>) -> Option<TimeWindow> {
    let lower = query.to_lowercase();
    let today = day_start(now.date_naive())?;

    if lower.contains("yesterday") {
        return Some(TimeWindow {
            start: today - Duration::days(1),
            end: today,
        });
    }
    if lower.contains("today") {
        return Some(TimeWindow {
            start: today,
            end: now,
        });
    }
    if lower.contains("this week") {
        let weekday = now.date_naive().weekday().num_days_from_monday() as i64;
        return Some(TimeWindow {
            start: today - Duration::days(weekday),
            end: now,
        });
    }
    if lower.contains("last week") {
        return Some(TimeWindow {
            start: now - Duration::days(7),
            end: now,
        });
    }
    if lower.contains("this month") {
        return Some(TimeWindow {
            start: day_start(now.date_naive().with_day(1)?)?,
            end: now,
        });
    }
    if lower.contains("last month") {
        return Some(TimeWindow {
            start: now - Duration::days(30),
            end: now,
        });
    }
    if lower.contains("this year") {
        return Some(TimeWindow {
            start: day_start(NaiveDate::from_ymd_opt(now.year(), 1, 1)?)?,
            end: now,
        });
    }
    if lower.contains("last year") {
        return Some(TimeWindow {
            start: now - Duration::days(365),
            end: now,
        });
    }

    let tokens: Vec<&str> = lower.split_whitespace().collect();

    // "last N days|weeks|months"
    for window in tokens.windows(3) {
        if window[0] != "last" {
            continue;
        }
        let Ok(n) = window[1].parse::<i64>() else {
            continue;
        };
        let duration = match window[2].trim_end_matches('s') {
            "day" => Duration::days(n),
            "week" => Duration::days(n * 7),
            "month" => Duration::days(n * 30),
            _ => continue,
        };
        return Some(TimeWindow {
            start: now - duration,
            end: now,
        });
    }

    // Quarter label: "q2 2026"
    for window in tokens.windows(2) {
        let Some(quarter) = window[0]
            .strip_prefix('q')
            .and_then(|q| q.parse::<u32>().ok())
            .filter(|q| (1..=4).contains(q))
        else {
            continue;
        };
        let Ok(year) = window[1].parse::<i32>() else {
            continue;
        };
        let start_month = (quarter - 1) * 3 + 1;
        let start = day_start(NaiveDate::from_ymd_opt(year, start_month, 1)?)?;
        let end = if quarter == 4 {
            day_start(NaiveDate::from_ymd_opt(year + 1, 1, 1)?)?
        } else {
            day_start(NaiveDate::from_ymd_opt(year, start_month + 3, 1)?)?
        };
        return Some(TimeWindow { start, end });
    }

    // ISO date token
    for token in &tokens {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
        if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
            let start = day_start(date)?;
            return Some(TimeWindow {
                start,
                end: start + Duration::days(1),
            });
        }
    }

    None
}

impl SearchEngine {
    /// Facts created inside the window the query describes, newest first
    ///
    /// Without a recognizable time expression (and no explicit time filter)
    /// the result is empty rather than an error; the selector should not
    /// have routed such a query here.
    pub(crate) async fn temporal_search(
        &self,
        user_id: &str,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredFact>> {
        let window = parse_time_expression(query, Utc::now())
            .map(|w| (w.start, w.end))
            .or(filters.time_range);
        let Some((start, end)) = window else {
            return Ok(Vec::new());
        };

        let mut facts = self.stores.facts.facts_in_range(user_id, start, end).await?;
        facts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = facts.len() as f64;
        Ok(facts
            .into_iter()
            .enumerate()
            .map(|(i, fact)| ScoredFact {
                fact,
                // Linear recency score: newest 1.0, oldest approaches 0
                score: (total - i as f64) / total,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 15, 30, 0).unwrap()
    }

    #[test]
    fn test_yesterday_is_one_full_day() {
        let w = parse_time_expression("what did I do yesterday", now()).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2026, 8, 23, 0, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2026, 8, 24, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_last_week_is_seven_days() {
        let w = parse_time_expression("restaurants from last week", now()).unwrap();
        assert_eq!(w.end - w.start, Duration::days(7));
        assert_eq!(w.end, now());
    }

    #[test]
    fn test_last_n_days() {
        let w = parse_time_expression("last 3 days", now()).unwrap();
        assert_eq!(w.end - w.start, Duration::days(3));
    }

    #[test]
    fn test_quarter_label() {
        let w = parse_time_expression("expenses in Q2 2026", now()).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_fourth_quarter_crosses_year() {
        let w = parse_time_expression("q4 2025", now()).unwrap();
        assert_eq!(w.end, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_iso_date() {
        let w = parse_time_expression("what happened on 2026-03-15?", now()).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(w.end - w.start, Duration::days(1));
    }

    #[test]
    fn test_no_time_expression() {
        assert!(parse_time_expression("favorite food", now()).is_none());
    }

    #[test]
    fn test_this_week_starts_monday() {
        // 2026-08-24 is a Monday
        let w = parse_time_expression("this week", now()).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2026, 8, 24, 0, 0, 0).unwrap());
    }
}
