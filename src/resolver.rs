//! Collection locator resolution.
//!
//! A conference's table of contents has been published under three URI
//! families over the years:
//!
//! | Scheme | URI | Notes |
//! |--------|-----|-------|
//! | General conference | `/general-conference/{year}/{month}` | Session grouping throughout |
//! | Liahona magazine | `/liahona/{year}/{month + 1}` | Published one month after the conference |
//! | Ensign magazine | `/ensign/{year}/{month + 1}` | Historical name of the magazine path |
//!
//! [`resolve`] picks the primary scheme for a period; [`fallback`] names the
//! historical alias that the fetcher tries once when the primary fails.
//!
//! The month shift is calendar-naive: December would become month 13. Only
//! April and October are ever looked up, and a month-13 URI simply yields no
//! document.

use std::fmt;

use crate::models::Period;

/// Which upstream URI family a locator belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    GeneralConference,
    Liahona,
    Ensign,
}

impl Scheme {
    fn root(self) -> &'static str {
        match self {
            Scheme::GeneralConference => "general-conference",
            Scheme::Liahona => "liahona",
            Scheme::Ensign => "ensign",
        }
    }

    /// Magazines come out one month after the conference they report.
    fn month_lag(self) -> u32 {
        match self {
            Scheme::GeneralConference => 0,
            Scheme::Liahona | Scheme::Ensign => 1,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root())
    }
}

/// A canonical URI for one period's collection under one scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    pub scheme: Scheme,
    pub uri: String,
}

impl ResourceLocator {
    fn new(scheme: Scheme, period: Period) -> Self {
        let month = period.month() + scheme.month_lag();
        Self {
            scheme,
            uri: format!("/{}/{}/{:02}", scheme.root(), period.year(), month),
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Primary locator: general conference before `cutoff_year`, the magazine
/// path from `cutoff_year` on.
///
/// # Arguments
///
/// * `period` - The conference to locate
/// * `cutoff_year` - First year served from the magazine path
///
/// # Returns
///
/// The [`ResourceLocator`] to try first. Magazine locators carry the month
/// after the conference.
///
/// # Examples
///
/// ```ignore
/// let april = Period::new(2023, 4)?;
/// assert_eq!(resolve(april, 2025).uri, "/general-conference/2023/04");
/// assert_eq!(resolve(april, 2020).uri, "/liahona/2023/05");
/// ```
pub fn resolve(period: Period, cutoff_year: i32) -> ResourceLocator {
    if period.year() < cutoff_year {
        ResourceLocator::new(Scheme::GeneralConference, period)
    } else {
        ResourceLocator::new(Scheme::Liahona, period)
    }
}

/// The renamed-endpoint alias tried once after the primary fails.
pub fn fallback(period: Period) -> ResourceLocator {
    ResourceLocator::new(Scheme::Ensign, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    #[test]
    fn test_before_cutoff_uses_general_conference() {
        for year in [1971, 1999, 2024] {
            for month in [4, 10] {
                let loc = resolve(period(year, month), 2025);
                assert_eq!(loc.scheme, Scheme::GeneralConference);
                assert_eq!(loc.uri, format!("/general-conference/{year}/{month:02}"));
            }
        }
    }

    #[test]
    fn test_from_cutoff_uses_magazine_with_lag() {
        assert_eq!(resolve(period(2025, 4), 2025).uri, "/liahona/2025/05");
        assert_eq!(resolve(period(2030, 10), 2025).uri, "/liahona/2030/11");
        assert_eq!(resolve(period(2025, 4), 2025).scheme, Scheme::Liahona);
    }

    #[test]
    fn test_cutoff_is_configurable() {
        assert_eq!(resolve(period(1976, 10), 1977).uri, "/general-conference/1976/10");
        assert_eq!(resolve(period(1977, 4), 1977).uri, "/liahona/1977/05");
    }

    #[test]
    fn test_fallback_is_ensign_with_lag() {
        let loc = fallback(period(1987, 4));
        assert_eq!(loc.scheme, Scheme::Ensign);
        assert_eq!(loc.to_string(), "/ensign/1987/05");
    }

    #[test]
    fn test_december_shift_is_calendar_naive() {
        assert_eq!(resolve(period(2026, 12), 2025).uri, "/liahona/2026/13");
    }
}
