/// Progress display derived from controller state, plus the "time alive"
/// clock derived from the configured birth date.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};

use crate::error::ConfigError;
use crate::sim::controller::StageController;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DotState {
    Current,
    Completed,
    /// Reached but not completed.
    Reachable,
    Locked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NavDot {
    pub id: u32,
    pub state: DotState,
}

/// Whole percent of registered stages completed.
pub fn percent_complete(c: &StageController) -> u32 {
    let total = c.registry().len();
    if total == 0 {
        return 0;
    }
    (c.completed().len() * 100 / total) as u32
}

pub fn nav_dots(c: &StageController) -> Vec<NavDot> {
    c.registry()
        .iter()
        .map(|s| {
            let state = if s.id == c.current() {
                DotState::Current
            } else if c.is_completed(s.id) {
                DotState::Completed
            } else if c.can_navigate_to(s.id) {
                DotState::Reachable
            } else {
                DotState::Locked
            };
            NavDot { id: s.id, state }
        })
        .collect()
}

/// Nearest navigable stage before (`forward == false`) or after the
/// current one.
pub fn neighbour_dot(c: &StageController, forward: bool) -> Option<u32> {
    let dots = nav_dots(c);
    let here = dots.iter().position(|d| d.state == DotState::Current)?;
    let open = |d: &&NavDot| d.state != DotState::Locked;
    if forward {
        dots[here + 1..].iter().find(open).map(|d| d.id)
    } else {
        dots[..here].iter().rev().find(open).map(|d| d.id)
    }
}

// ══════════════════════════════════════════════════════════════
// Time alive
// ══════════════════════════════════════════════════════════════

/// `YYYY-MM-DD`.
pub fn parse_birth_date(s: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| ConfigError::BirthDate(s.to_string()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeAlive {
    pub years: u32,
    /// Days since the most recent birthday.
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl TimeAlive {
    pub fn describe(&self) -> String {
        format!(
            "{} years, {} days, {:02}h {:02}m {:02}s",
            self.years, self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Elapsed time from midnight (UTC) of `birth` to `now`. None when the
/// birth date lies in the future.
pub fn time_alive(birth: NaiveDate, now: DateTime<Utc>) -> Option<TimeAlive> {
    let born = birth.and_hms_opt(0, 0, 0)?.and_utc();
    if now < born {
        return None;
    }
    let today = now.date_naive();
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    // Feb 29 in a non-leap year rolls over to Mar 1.
    let last_birthday = birth
        .with_year(birth.year() + years)
        .or_else(|| NaiveDate::from_ymd_opt(birth.year() + years, 3, 1))?;

    Some(TimeAlive {
        years: years as u32,
        days: (today - last_birthday).num_days() as u32,
        hours: now.hour(),
        minutes: now.minute(),
        seconds: now.second(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::domain::stage::{StageDescriptor, StageKind};
    use crate::sim::registry::StageRegistry;

    fn four() -> StageController {
        let stages = (1..=4)
            .map(|i| StageDescriptor::new(i, StageKind::Content, "s", "intro"))
            .collect();
        StageController::new(StageRegistry::new(stages).unwrap(), 1)
    }

    #[test]
    fn percent_tracks_completions() {
        let mut c = four();
        assert_eq!(percent_complete(&c), 0);
        c.complete_stage(1);
        assert_eq!(percent_complete(&c), 25);
        c.complete_stage(1);
        assert_eq!(percent_complete(&c), 25);
        for id in 2..=4 {
            c.complete_stage(id);
        }
        assert_eq!(percent_complete(&c), 100);
    }

    #[test]
    fn dots_reflect_reach() {
        let mut c = four();
        c.complete_stage(1);
        c.advance_from_stage(1);
        c.advance_from_stage(2);
        let states: Vec<DotState> = nav_dots(&c).iter().map(|d| d.state).collect();
        assert_eq!(
            states,
            vec![DotState::Completed, DotState::Reachable, DotState::Current, DotState::Locked]
        );
        assert_eq!(neighbour_dot(&c, false), Some(2));
        assert_eq!(neighbour_dot(&c, true), None);
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, sec).unwrap()
    }

    #[test]
    fn birth_date_parsing() {
        assert_eq!(parse_birth_date("1996-02-29").unwrap(), NaiveDate::from_ymd_opt(1996, 2, 29).unwrap());
        assert!(parse_birth_date("1997-02-29").is_err());
        assert!(parse_birth_date("1996-13-01").is_err());
        assert!(matches!(parse_birth_date("soon"), Err(ConfigError::BirthDate(_))));
    }

    #[test]
    fn time_alive_counts_from_last_birthday() {
        let birth = parse_birth_date("2000-06-15").unwrap();
        let t = time_alive(birth, utc(2024, 6, 20, 10, 30, 5)).unwrap();
        assert_eq!(t.years, 24);
        assert_eq!(t.days, 5);
        assert_eq!((t.hours, t.minutes, t.seconds), (10, 30, 5));

        assert_eq!(time_alive(birth, utc(2024, 6, 14, 0, 0, 0)).unwrap().years, 23);
        assert_eq!(time_alive(birth, utc(1999, 1, 1, 0, 0, 0)), None);
    }

    #[test]
    fn leap_day_birthday_rolls_to_march() {
        let birth = parse_birth_date("1996-02-29").unwrap();
        let on_march_first = time_alive(birth, utc(2023, 3, 1, 12, 0, 0)).unwrap();
        assert_eq!((on_march_first.years, on_march_first.days), (27, 0));
        let day_before = time_alive(birth, utc(2023, 2, 28, 12, 0, 0)).unwrap();
        assert_eq!((day_before.years, day_before.days), (26, 364));
        let leap_year = time_alive(birth, utc(2024, 2, 29, 0, 0, 0)).unwrap();
        assert_eq!((leap_year.years, leap_year.days), (28, 0));
    }
}
