//! Time filters shared by every view.

use serde::{Deserialize, Serialize};

/// Earliest year a filter may name.
pub const MIN_YEAR: i32 = 2001;

/// Latest year a filter may name.
pub const MAX_YEAR: i32 = 2100;

/// A rejected filter. Invalid filters are never silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// A year lies outside `MIN_YEAR..=MAX_YEAR`.
    #[error("Year {0} is outside {MIN_YEAR}..={MAX_YEAR}")]
    YearOutOfRange(i32),

    /// A range starts after it ends.
    #[error("Year range {from}..={to} is inverted")]
    InvertedRange {
        /// First year.
        from: i32,
        /// Last year.
        to: i32,
    },

    /// A month lies outside `1..=12`.
    #[error("Month {0} is outside 1..=12")]
    MonthOutOfRange(u8),

    /// Both a single year and a range were given.
    #[error("Give either a single year or a year range, not both")]
    AmbiguousYears,

    /// A filter value could not be parsed.
    #[error("Invalid value {value:?} for {name}")]
    Unparseable {
        /// Parameter name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Restriction on the incident year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum YearFilter {
    /// Every year.
    #[default]
    All,
    /// One year.
    Single(i32),
    /// An inclusive range of years.
    Range {
        /// First year, inclusive.
        from: i32,
        /// Last year, inclusive.
        to: i32,
    },
}

impl YearFilter {
    /// Whether `year` passes this filter.
    #[must_use]
    pub const fn contains(&self, year: i32) -> bool {
        match *self {
            Self::All => true,
            Self::Single(y) => y == year,
            Self::Range { from, to } => from <= year && year <= to,
        }
    }
}

/// Year and month restriction applied to a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeFilter {
    /// Year restriction.
    pub years: YearFilter,
    /// Optional month (1-12).
    pub month: Option<u8>,
}

impl TimeFilter {
    /// No restriction.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            years: YearFilter::All,
            month: None,
        }
    }

    /// A single year.
    #[must_use]
    pub const fn year(year: i32) -> Self {
        Self {
            years: YearFilter::Single(year),
            month: None,
        }
    }

    /// An inclusive year range.
    #[must_use]
    pub const fn range(from: i32, to: i32) -> Self {
        Self {
            years: YearFilter::Range { from, to },
            month: None,
        }
    }

    /// Adds a month restriction.
    #[must_use]
    pub const fn with_month(mut self, month: u8) -> Self {
        self.month = Some(month);
        self
    }

    /// Builds a filter from the optional parts a caller may supply.
    ///
    /// `year` selects one year; `year_from`/`year_to` select a range, and a
    /// missing end defaults to [`MIN_YEAR`] or [`MAX_YEAR`]. The result is
    /// validated.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::AmbiguousYears`] if both `year` and a range
    /// bound are given, or any error from [`TimeFilter::validate`].
    pub fn from_parts(
        year: Option<i32>,
        year_from: Option<i32>,
        year_to: Option<i32>,
        month: Option<u8>,
    ) -> Result<Self, FilterError> {
        let years = match (year, year_from, year_to) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(FilterError::AmbiguousYears);
            }
            (Some(y), None, None) => YearFilter::Single(y),
            (None, None, None) => YearFilter::All,
            (None, from, to) => YearFilter::Range {
                from: from.unwrap_or(MIN_YEAR),
                to: to.unwrap_or(MAX_YEAR),
            },
        };

        let filter = Self { years, month };
        filter.validate()?;
        Ok(filter)
    }

    /// Checks years against `MIN_YEAR..=MAX_YEAR`, range order, and month.
    ///
    /// # Errors
    ///
    /// Returns the first [`FilterError`] found.
    pub const fn validate(&self) -> Result<(), FilterError> {
        match self.years {
            YearFilter::All => {}
            YearFilter::Single(y) => {
                if y < MIN_YEAR || y > MAX_YEAR {
                    return Err(FilterError::YearOutOfRange(y));
                }
            }
            YearFilter::Range { from, to } => {
                if from < MIN_YEAR || from > MAX_YEAR {
                    return Err(FilterError::YearOutOfRange(from));
                }
                if to < MIN_YEAR || to > MAX_YEAR {
                    return Err(FilterError::YearOutOfRange(to));
                }
                if from > to {
                    return Err(FilterError::InvertedRange { from, to });
                }
            }
        }

        if let Some(m) = self.month
            && (m < 1 || m > 12)
        {
            return Err(FilterError::MonthOutOfRange(m));
        }

        Ok(())
    }

    /// Whether a row with this year and month passes the filter.
    #[must_use]
    pub fn contains(&self, year: i32, month: u8) -> bool {
        self.years.contains(year) && self.month.is_none_or(|m| m == month)
    }
}
