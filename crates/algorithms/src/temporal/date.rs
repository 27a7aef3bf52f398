//! Date keys embedded in raster file names

use chrono::NaiveDate;
use geozonal_core::{Error, Result};
use regex::Regex;
use std::fmt;

/// Matches `20220101`, `2022-01-01` and `2022_01_01`
pub const DEFAULT_DATE_PATTERN: &str = r"(\d{4}[-_]?\d{2}[-_]?\d{2})";
/// Applied after `-` and `_` are removed from the matched token
pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";

/// Why a file name has no usable date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateKeyFailure {
    /// Nothing in the name matches the pattern
    NoMatch,
    /// The pattern matched but no token is a valid date
    Invalid { token: String },
    /// Two different dates are embedded in the name
    Ambiguous { first: NaiveDate, second: NaiveDate },
}

impl fmt::Display for DateKeyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateKeyFailure::NoMatch => write!(f, "no date token in file name"),
            DateKeyFailure::Invalid { token } => write!(f, "'{}' is not a valid date", token),
            DateKeyFailure::Ambiguous { first, second } => {
                write!(f, "file name holds two dates ({} and {})", first, second)
            }
        }
    }
}

/// A declared file-name date convention: a regex whose first capture group
/// is the date token, and the chrono format the token is parsed with.
#[derive(Debug, Clone)]
pub struct DatePattern {
    regex: Regex,
    format: String,
}

impl DatePattern {
    pub fn new(pattern: &str, format: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| Error::InvalidParameter {
            name: "date_pattern",
            value: pattern.to_string(),
            reason: e.to_string(),
        })?;
        if regex.captures_len() < 2 {
            return Err(Error::InvalidParameter {
                name: "date_pattern",
                value: pattern.to_string(),
                reason: "needs one capture group around the date".to_string(),
            });
        }
        Ok(Self {
            regex,
            format: format.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Parse the date embedded in `file_name`.
    ///
    /// Every match is considered; repeated tokens of the same date are fine,
    /// two distinct dates are not.
    pub fn parse(&self, file_name: &str) -> std::result::Result<NaiveDate, DateKeyFailure> {
        let mut found: Option<NaiveDate> = None;
        let mut invalid: Option<String> = None;

        for caps in self.regex.captures_iter(file_name) {
            let Some(token) = caps.get(1) else { continue };
            let cleaned: String = token
                .as_str()
                .chars()
                .filter(|c| *c != '-' && *c != '_')
                .collect();
            match NaiveDate::parse_from_str(&cleaned, &self.format) {
                Ok(date) => match found {
                    Some(first) if first != date => {
                        return Err(DateKeyFailure::Ambiguous {
                            first,
                            second: date,
                        });
                    }
                    _ => found = Some(date),
                },
                Err(_) => {
                    invalid.get_or_insert_with(|| token.as_str().to_string());
                }
            }
        }

        match (found, invalid) {
            (Some(date), _) => Ok(date),
            (None, Some(token)) => Err(DateKeyFailure::Invalid { token }),
            (None, None) => Err(DateKeyFailure::NoMatch),
        }
    }
}
