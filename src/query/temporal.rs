use crate::client::SearchParams;
use crate::error::{Result, StacError};
use crate::query::filter::Filter;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive date range used by the temporal checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    /// # Errors
    /// Returns [`StacError::InvalidTimeRange`] if either date is not
    /// `YYYY-MM-DD` or `start` is after `end`.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| StacError::InvalidTimeRange(format!("'{}': {}", s, e)))
        };
        let (start, end) = (parse(start)?, parse(end)?);
        if start > end {
            return Err(StacError::InvalidTimeRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// ISO 8601 interval, e.g. `1850-01-01/2020-01-01`.
    pub fn interval(&self) -> String {
        format!("{}/{}", self.start, self.end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// The three ways a time range can be expressed in a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilterMethod {
    Datetime,
    Query,
    Filter,
}

impl TimeFilterMethod {
    pub const ALL: [TimeFilterMethod; 3] = [
        TimeFilterMethod::Datetime,
        TimeFilterMethod::Query,
        TimeFilterMethod::Filter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilterMethod::Datetime => "datetime",
            TimeFilterMethod::Query => "query",
            TimeFilterMethod::Filter => "filter",
        }
    }

    /// Constrain `params` to `range` using this method.
    pub fn apply(&self, range: &TimeRange, params: SearchParams) -> SearchParams {
        match self {
            TimeFilterMethod::Datetime => params.datetime(range.interval()),
            TimeFilterMethod::Query => params.query(vec![
                format!("start_datetime>{}", range.start),
                format!("end_datetime<{}", range.end),
            ]),
            TimeFilterMethod::Filter => {
                params.filter(Filter::t_intersects("start_datetime", range.interval()))
            }
        }
    }
}

impl fmt::Display for TimeFilterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFilterMethod {
    type Err = StacError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "datetime" => Ok(TimeFilterMethod::Datetime),
            "query" => Ok(TimeFilterMethod::Query),
            "filter" => Ok(TimeFilterMethod::Filter),
            other => Err(StacError::Config(format!(
                "unknown time filter method '{}'",
                other
            ))),
        }
    }
}
