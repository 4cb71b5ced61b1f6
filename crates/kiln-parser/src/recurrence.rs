//! The `every:`/`e:` recurrence expression grammar (§6) and next-occurrence
//! computation.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::{ParseError, Result};

/// Whether `weekend` in a single-word recurrence expression covers Saturday
/// alone or both Saturday and Sunday. The spec notes this as an observed
/// inconsistency in its source material and asks implementations to make
/// the choice explicit and configurable rather than guess silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekendPolicy {
    SaturdayOnly,
    SaturdayAndSunday,
}

impl Default for WeekendPolicy {
    fn default() -> Self {
        WeekendPolicy::SaturdayAndSunday
    }
}

/// A parsed recurrence rule. Always paired with the original source text
/// by the caller (`Task::recurrence_text`) so rendering can round-trip
/// exactly instead of re-serializing a canonical form that may drift from
/// what the user wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceRule {
    Daily { interval: u32 },
    Weekly { interval: u32, days: Vec<Weekday> },
    Monthly { interval: u32 },
    Yearly { interval: u32, month_days: Vec<(u32, u32)> },
}

impl RecurrenceRule {
    /// Parses the text following `every:`/`e:` in a task line.
    pub fn parse(text: &str, weekend: WeekendPolicy) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::Task("empty recurrence expression".to_string()));
        }

        if let Some(rule) = parse_single_word(text, weekend) {
            return Ok(rule);
        }

        if let Some(rule) = parse_interval_unit(text)? {
            return Ok(rule);
        }

        if let Some(days) = parse_weekday_list(text) {
            return Ok(RecurrenceRule::Weekly { interval: 1, days });
        }

        if let Some(month_days) = parse_month_day_combinations(text)? {
            return Ok(RecurrenceRule::Yearly { interval: 1, month_days });
        }

        Err(ParseError::Task(format!("unrecognized recurrence expression: {text:?}")))
    }

    /// True if `date` satisfies the rule, phased relative to `anchor` (the
    /// due/scheduled date the rule was originally attached to).
    pub fn matches(&self, anchor: NaiveDate, date: NaiveDate) -> bool {
        match self {
            RecurrenceRule::Daily { interval } => {
                let days = (date - anchor).num_days();
                days >= 0 && days % i64::from(*interval) == 0
            }
            RecurrenceRule::Weekly { interval, days } => {
                let day_matches =
                    if days.is_empty() { date.weekday() == anchor.weekday() } else { days.contains(&date.weekday()) };
                if !day_matches {
                    return false;
                }
                let anchor_week_start = monday_on_or_before(anchor);
                let date_week_start = monday_on_or_before(date);
                let week_offset = (date_week_start - anchor_week_start).num_days() / 7;
                week_offset >= 0 && week_offset % i64::from(*interval) == 0
            }
            RecurrenceRule::Monthly { interval } => {
                if date.day() != anchor.day() {
                    return false;
                }
                let month_offset =
                    (date.year() - anchor.year()) * 12 + date.month() as i32 - anchor.month() as i32;
                month_offset >= 0 && month_offset % *interval as i32 == 0
            }
            RecurrenceRule::Yearly { interval, month_days } => {
                let day_matches = if month_days.is_empty() {
                    (date.month(), date.day()) == (anchor.month(), anchor.day())
                } else {
                    month_days.contains(&(date.month(), date.day()))
                };
                if !day_matches {
                    return false;
                }
                let year_offset = date.year() - anchor.year();
                year_offset >= 0 && year_offset % *interval as i32 == 0
            }
        }
    }

    /// The first date at or after `from` satisfying the rule, phased from
    /// `anchor`. Scans forward day by day; bounded so a malformed rule
    /// cannot loop forever.
    pub fn next_occurrence_at_or_after(&self, anchor: NaiveDate, from: NaiveDate) -> NaiveDate {
        let horizon = from + Duration::days(366 * 5);
        let mut candidate = from;
        while candidate <= horizon {
            if self.matches(anchor, candidate) {
                return candidate;
            }
            candidate = candidate.succ_opt().expect("date arithmetic within five-year horizon");
        }
        candidate
    }
}

fn monday_on_or_before(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn parse_single_word(text: &str, weekend: WeekendPolicy) -> Option<RecurrenceRule> {
    match text.to_ascii_lowercase().as_str() {
        "day" => Some(RecurrenceRule::Daily { interval: 1 }),
        "week" => Some(RecurrenceRule::Weekly { interval: 1, days: vec![] }),
        "month" => Some(RecurrenceRule::Monthly { interval: 1 }),
        "year" => Some(RecurrenceRule::Yearly { interval: 1, month_days: vec![] }),
        "weekday" => Some(RecurrenceRule::Weekly {
            interval: 1,
            days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        }),
        "weekend" => Some(RecurrenceRule::Weekly {
            interval: 1,
            days: match weekend {
                WeekendPolicy::SaturdayOnly => vec![Weekday::Sat],
                WeekendPolicy::SaturdayAndSunday => vec![Weekday::Sat, Weekday::Sun],
            },
        }),
        _ => None,
    }
}

fn parse_interval_unit(text: &str) -> Result<Option<RecurrenceRule>> {
    let mut parts = text.split_whitespace();
    let (Some(n), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
        return Ok(None);
    };
    let Ok(interval) = n.parse::<u32>() else {
        return Ok(None);
    };
    let rule = match unit.to_ascii_lowercase().as_str() {
        "days" => RecurrenceRule::Daily { interval },
        "weeks" => RecurrenceRule::Weekly { interval, days: vec![] },
        "months" => RecurrenceRule::Monthly { interval },
        "years" => RecurrenceRule::Yearly { interval, month_days: vec![] },
        _ => return Ok(None),
    };
    Ok(Some(rule))
}

fn parse_weekday(token: &str) -> Option<Weekday> {
    match token.to_ascii_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "wed" | "weds" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_weekday_list(text: &str) -> Option<Vec<Weekday>> {
    let mut days = Vec::new();
    for token in text.split_whitespace() {
        days.push(parse_weekday(token)?);
    }
    if days.is_empty() {
        None
    } else {
        Some(days)
    }
}

fn parse_month(token: &str) -> Option<u32> {
    match token.to_ascii_lowercase().as_str() {
        "jan" | "january" => Some(1),
        "feb" | "february" => Some(2),
        "mar" | "march" => Some(3),
        "apr" | "april" => Some(4),
        "may" => Some(5),
        "jun" | "june" => Some(6),
        "jul" | "july" => Some(7),
        "aug" | "august" => Some(8),
        "sep" | "sept" | "september" => Some(9),
        "oct" | "october" => Some(10),
        "nov" | "november" => Some(11),
        "dec" | "december" => Some(12),
        _ => None,
    }
}

fn parse_ordinal_day(token: &str) -> Option<u32> {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u32>().ok().filter(|d| (1..=31).contains(d))
}

/// Parses whitespace-separated month names and ordinal days into a yearly
/// rule's `(month, day)` pairs. Days with no preceding/following month
/// default to the 1st of every month named, per §6.
fn parse_month_day_combinations(text: &str) -> Result<Option<Vec<(u32, u32)>>> {
    let mut months = Vec::new();
    let mut days = Vec::new();
    for token in text.split_whitespace() {
        if let Some(month) = parse_month(token) {
            months.push(month);
        } else if let Some(day) = parse_ordinal_day(token) {
            days.push(day);
        } else {
            return Ok(None);
        }
    }
    if months.is_empty() {
        return Ok(None);
    }
    if days.is_empty() {
        days.push(1);
    }
    let mut month_days = Vec::new();
    for &month in &months {
        for &day in &days {
            month_days.push((month, day));
        }
    }
    Ok(Some(month_days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_word_day_parses() {
        let rule = RecurrenceRule::parse("day", WeekendPolicy::default()).unwrap();
        assert_eq!(rule, RecurrenceRule::Daily { interval: 1 });
    }

    #[test]
    fn weekend_policy_controls_days() {
        let sat_only = RecurrenceRule::parse("weekend", WeekendPolicy::SaturdayOnly).unwrap();
        assert_eq!(sat_only, RecurrenceRule::Weekly { interval: 1, days: vec![Weekday::Sat] });

        let both = RecurrenceRule::parse("weekend", WeekendPolicy::SaturdayAndSunday).unwrap();
        assert_eq!(both, RecurrenceRule::Weekly { interval: 1, days: vec![Weekday::Sat, Weekday::Sun] });
    }

    #[test]
    fn interval_unit_parses() {
        let rule = RecurrenceRule::parse("2 weeks", WeekendPolicy::default()).unwrap();
        assert_eq!(rule, RecurrenceRule::Weekly { interval: 2, days: vec![] });
    }

    #[test]
    fn weekday_list_parses_as_weekly() {
        let rule = RecurrenceRule::parse("mon wed fri", WeekendPolicy::default()).unwrap();
        assert_eq!(
            rule,
            RecurrenceRule::Weekly { interval: 1, days: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri] }
        );
    }

    #[test]
    fn month_day_combination_parses_as_yearly() {
        let rule = RecurrenceRule::parse("jan 1st", WeekendPolicy::default()).unwrap();
        assert_eq!(rule, RecurrenceRule::Yearly { interval: 1, month_days: vec![(1, 1)] });
    }

    #[test]
    fn month_alone_defaults_to_first_of_month() {
        let rule = RecurrenceRule::parse("december", WeekendPolicy::default()).unwrap();
        assert_eq!(rule, RecurrenceRule::Yearly { interval: 1, month_days: vec![(12, 1)] });
    }

    #[test]
    fn daily_next_occurrence_is_the_floor_itself() {
        let rule = RecurrenceRule::Daily { interval: 1 };
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        assert_eq!(rule.next_occurrence_at_or_after(anchor, from), from);
    }

    #[test]
    fn every_two_weeks_respects_phase() {
        let rule = RecurrenceRule::Weekly { interval: 2, days: vec![Weekday::Mon] };
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(); // a Monday
        let from = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(); // next Monday, off-phase
        let next = rule.next_occurrence_at_or_after(anchor, from);
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn unrecognized_expression_is_an_error() {
        assert!(RecurrenceRule::parse("whenever", WeekendPolicy::default()).is_err());
    }

    #[test]
    fn bare_week_phases_off_the_anchors_own_weekday() {
        let rule = RecurrenceRule::parse("week", WeekendPolicy::default()).unwrap();
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(); // a Monday
        let floor = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(rule.next_occurrence_at_or_after(anchor, floor), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    }

    #[test]
    fn bare_year_phases_off_the_anchors_own_month_and_day() {
        let rule = RecurrenceRule::parse("year", WeekendPolicy::default()).unwrap();
        let anchor = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let floor = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
        assert_eq!(rule.next_occurrence_at_or_after(anchor, floor), NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
    }

    #[test]
    fn interval_weeks_with_no_explicit_days_also_phases_off_anchor_weekday() {
        let rule = RecurrenceRule::parse("2 weeks", WeekendPolicy::default()).unwrap();
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(); // a Wednesday
        let floor = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        assert_eq!(rule.next_occurrence_at_or_after(anchor, floor), NaiveDate::from_ymd_opt(2024, 1, 17).unwrap());
    }
}
