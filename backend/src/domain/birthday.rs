//! Birthday arithmetic: days until the next occurrence and the greeting.
//!
//! Everything here is pure. Callers supply "today" as a calendar date, so the
//! time-of-day is discarded before any comparison happens.
//!
//! People born on 29 February celebrate on 28 February in common years. The
//! rule is applied per candidate year, so a leap-day birthday that has passed
//! in a common year rolls over to 29 February when the following year is a
//! leap year.
//!
//! The clamp is re-evaluated for next year rather than carried over: on
//! 2023-03-01 a 2000-02-29 birthday is due on 2024-02-29 (365 days), not on
//! 2024-02-28 (364 days) as clamping first and then adding a year would give.

use std::fmt;

use chrono::{Datelike, NaiveDate};

use super::Username;

/// Failure to place the next birthday on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BirthdayError {
    /// The next occurrence lies beyond the representable calendar range.
    #[error("next birthday after {today} is outside the supported calendar range")]
    OutOfRange { today: NaiveDate },
}

/// Occurrence of `date_of_birth` in `year`.
///
/// # Examples
/// ```
/// use birthday::domain::birthday_in_year;
/// use chrono::NaiveDate;
///
/// let leap_day = NaiveDate::from_ymd_opt(2000, 2, 29).expect("valid date");
/// assert_eq!(
///     birthday_in_year(leap_day, 2023),
///     NaiveDate::from_ymd_opt(2023, 2, 28)
/// );
/// ```
pub fn birthday_in_year(date_of_birth: NaiveDate, year: i32) -> Option<NaiveDate> {
    date_of_birth
        .with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
}

/// Whole days from `today` until the next occurrence of `date_of_birth`.
///
/// A birthday falling on `today` yields `0`; one that already passed this
/// year is measured against next year's occurrence.
pub fn days_until_next_birthday(
    date_of_birth: NaiveDate,
    today: NaiveDate,
) -> Result<u32, BirthdayError> {
    let out_of_range = BirthdayError::OutOfRange { today };
    let this_year = birthday_in_year(date_of_birth, today.year()).ok_or(out_of_range)?;
    let next = if this_year < today {
        today
            .year()
            .checked_add(1)
            .and_then(|year| birthday_in_year(date_of_birth, year))
            .ok_or(out_of_range)?
    } else {
        this_year
    };

    u32::try_from(next.signed_duration_since(today).num_days()).map_err(|_| out_of_range)
}

/// Greeting for a stored user relative to a reference day.
///
/// # Examples
/// ```
/// use birthday::domain::{BirthdayGreeting, Username};
/// use chrono::NaiveDate;
///
/// let username = Username::new("alice").expect("valid username");
/// let born = NaiveDate::from_ymd_opt(1990, 5, 20).expect("valid date");
/// let today = NaiveDate::from_ymd_opt(2024, 5, 15).expect("valid date");
///
/// let greeting = BirthdayGreeting::compute(username, born, today).expect("in range");
/// assert_eq!(greeting.days_until(), 5);
/// assert_eq!(greeting.message(), "Hello, alice! Your birthday is in 5 day(s)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthdayGreeting {
    username: Username,
    days_until: u32,
}

impl BirthdayGreeting {
    /// Derive the greeting for `username` born on `date_of_birth`.
    pub fn compute(
        username: Username,
        date_of_birth: NaiveDate,
        today: NaiveDate,
    ) -> Result<Self, BirthdayError> {
        let days_until = days_until_next_birthday(date_of_birth, today)?;
        Ok(Self {
            username,
            days_until,
        })
    }

    /// Whole days until the next birthday; `0` means today.
    pub fn days_until(&self) -> u32 {
        self.days_until
    }

    /// Whether the birthday falls on the reference day.
    pub fn is_birthday(&self) -> bool {
        self.days_until == 0
    }

    /// Rendered greeting.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BirthdayGreeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_birthday() {
            write!(f, "Hello, {}! Happy birthday!", self.username)
        } else {
            write!(
                f,
                "Hello, {}! Your birthday is in {} day(s)",
                self.username, self.days_until
            )
        }
    }
}

/// Render the greeting message for a stored date of birth.
pub fn compute_message(
    username: &Username,
    date_of_birth: NaiveDate,
    today: NaiveDate,
) -> Result<String, BirthdayError> {
    BirthdayGreeting::compute(username.clone(), date_of_birth, today).map(|greeting| greeting.message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
    }

    fn days_of(year: i32) -> impl Iterator<Item = NaiveDate> {
        date(year, 1, 1)
            .iter_days()
            .take_while(move |day| day.year() == year)
    }

    #[fixture]
    fn alice() -> Username {
        Username::new("alice").expect("valid username")
    }

    #[rstest]
    fn birthday_today_is_celebrated(alice: Username) {
        let message = compute_message(&alice, date(1990, 5, 15), date(2024, 5, 15))
            .expect("in range");
        assert_eq!(message, "Hello, alice! Happy birthday!");
    }

    #[rstest]
    fn upcoming_birthday_counts_days(alice: Username) {
        let message = compute_message(&alice, date(1990, 5, 20), date(2024, 5, 15))
            .expect("in range");
        assert_eq!(message, "Hello, alice! Your birthday is in 5 day(s)");
    }

    #[rstest]
    fn passed_birthday_rolls_over_to_next_year(alice: Username) {
        let greeting = BirthdayGreeting::compute(alice, date(1990, 5, 10), date(2024, 5, 15))
            .expect("in range");
        assert_eq!(greeting.days_until(), 360);
        assert!(greeting.days_until() > 300);
        assert!(!greeting.is_birthday());
    }

    #[rstest]
    #[case(date(1990, 1, 1), date(2024, 12, 31), 1)]
    #[case(date(1990, 12, 31), date(2025, 1, 1), 364)]
    #[case(date(1990, 12, 31), date(2024, 1, 1), 365)]
    #[case(date(1990, 3, 1), date(2024, 2, 28), 2)]
    #[case(date(1990, 3, 1), date(2023, 2, 28), 1)]
    fn crosses_year_and_month_boundaries(
        #[case] born: NaiveDate,
        #[case] today: NaiveDate,
        #[case] expected: u32,
    ) {
        assert_eq!(days_until_next_birthday(born, today), Ok(expected));
    }

    #[rstest]
    #[case::common_year_celebrates_on_28th(date(2023, 2, 28), 0)]
    #[case::day_before_in_common_year(date(2023, 2, 27), 1)]
    #[case::passed_in_common_year_rolls_to_leap_day(date(2023, 3, 1), 365)]
    #[case::leap_year_celebrates_on_29th(date(2024, 2, 29), 0)]
    #[case::leap_year_28th_is_one_day_early(date(2024, 2, 28), 1)]
    #[case::passed_in_leap_year_rolls_to_28th(date(2024, 3, 1), 364)]
    fn leap_day_birthdays_use_28_february_in_common_years(
        #[case] today: NaiveDate,
        #[case] expected: u32,
    ) {
        assert_eq!(days_until_next_birthday(date(2000, 2, 29), today), Ok(expected));
    }

    #[rstest]
    fn clamp_is_not_carried_into_a_leap_year(alice: Username) {
        let born = date(2000, 2, 29);
        let today = date(2023, 3, 1);

        assert_eq!(birthday_in_year(born, 2023), Some(date(2023, 2, 28)));
        assert_eq!(birthday_in_year(born, 2024), Some(date(2024, 2, 29)));
        assert_eq!(
            compute_message(&alice, born, today).expect("in range"),
            "Hello, alice! Your birthday is in 365 day(s)"
        );
    }

    #[rstest]
    #[case(1950)]
    #[case(1988)]
    #[case(2023)]
    fn same_month_and_day_always_yields_zero(#[case] birth_year: i32) {
        for today in days_of(2024) {
            let Some(born) = today.with_year(birth_year) else {
                continue;
            };
            assert_eq!(days_until_next_birthday(born, today), Ok(0), "born {born}");
        }
    }

    #[rstest]
    fn future_birthdays_match_exact_difference_for_any_birth_year() {
        let today = date(2024, 5, 15);
        for upcoming in days_of(2024).filter(|day| *day > today) {
            let expected = upcoming.signed_duration_since(today).num_days();
            for birth_year in [1970, 1990, 2003] {
                let born = upcoming.with_year(birth_year).expect("no leap day after May");
                let days = days_until_next_birthday(born, today).expect("in range");
                assert_eq!(i64::from(days), expected, "born {born}");
            }
        }
    }

    #[rstest]
    fn passed_birthdays_exceed_the_naive_difference() {
        let today = date(2024, 5, 15);
        for passed in days_of(2024).filter(|day| *day < today && !(day.month() == 2 && day.day() == 29)) {
            let born = passed.with_year(1990).expect("common-year date exists");
            let naive = passed.signed_duration_since(today).num_days();
            let next = passed.with_year(2025).expect("common-year date exists");
            let expected = next.signed_duration_since(today).num_days();

            let days = i64::from(days_until_next_birthday(born, today).expect("in range"));
            assert_eq!(days, expected, "born {born}");
            assert!(days > naive);
        }
    }

    #[rstest]
    fn end_of_calendar_is_reported() {
        let today = NaiveDate::MAX;
        let born = date(1990, 1, 1);
        assert_eq!(
            days_until_next_birthday(born, today),
            Err(BirthdayError::OutOfRange { today })
        );
    }
}
