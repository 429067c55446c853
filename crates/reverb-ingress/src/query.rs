//! Query string parsing: time windows and pagination.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reverb_store::{Paging, TimeRange};
use serde::Deserialize;

use crate::error::IngressError;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const UNBOUNDED_LIMIT: i64 = -1;

const RANGE_TOGETHER: &str = "startTime and endTime must be provided together and be valid";
const RANGE_REQUIRED: &str = "No or invalid startTime or endTime provided in URL";

/// Query parameters shared by the listing endpoints.
///
/// Values are kept as strings so that bad input is reported with the
/// endpoint's own message instead of a generic rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
  pub start_time: Option<String>,
  pub end_time: Option<String>,
  pub page: Option<String>,
  pub limit: Option<String>,
}

impl LogQuery {
  /// Both bounds or neither.
  pub fn optional_range(&self) -> Result<Option<TimeRange>, IngressError> {
    match (non_empty(&self.start_time), non_empty(&self.end_time)) {
      (None, None) => Ok(None),
      (Some(start), Some(end)) => match (parse_time(start), parse_time(end)) {
        (Some(start), Some(end)) => Ok(Some(TimeRange::new(start, end))),
        _ => Err(IngressError::InvalidRange {
          message: RANGE_TOGETHER,
        }),
      },
      _ => Err(IngressError::InvalidRange {
        message: RANGE_TOGETHER,
      }),
    }
  }

  /// Both bounds, parsed.
  pub fn required_range(&self) -> Result<TimeRange, IngressError> {
    let start = non_empty(&self.start_time).and_then(parse_time);
    let end = non_empty(&self.end_time).and_then(parse_time);
    match (start, end) {
      (Some(start), Some(end)) => Ok(TimeRange::new(start, end)),
      _ => Err(IngressError::InvalidRange {
        message: RANGE_REQUIRED,
      }),
    }
  }

  /// `page` defaults to 1 and `limit` to 10; `limit=-1` lists everything.
  pub fn paging(&self) -> Result<Paging, IngressError> {
    let page = match non_empty(&self.page) {
      None => DEFAULT_PAGE,
      Some(raw) => raw
        .parse::<u32>()
        .ok()
        .filter(|page| *page >= 1)
        .ok_or(IngressError::InvalidPageParameter)?,
    };

    let limit = match non_empty(&self.limit) {
      None => i64::from(DEFAULT_LIMIT),
      Some(raw) => raw
        .parse::<i64>()
        .map_err(|_| IngressError::InvalidPageParameter)?,
    };

    match limit {
      UNBOUNDED_LIMIT => Ok(Paging::Unbounded),
      limit if limit >= 1 => Ok(Paging::Page {
        page,
        limit: u32::try_from(limit).map_err(|_| IngressError::InvalidPageParameter)?,
      }),
      _ => Err(IngressError::InvalidPageParameter),
    }
  }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a timestamp given as RFC 3339, a naive date-time (taken as UTC) or a
/// plain date (midnight UTC).
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
  if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
    return Some(time.with_timezone(&Utc));
  }

  for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
    if let Ok(time) = NaiveDateTime::parse_from_str(raw, format) {
      return Some(time.and_utc());
    }
  }

  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .ok()
    .and_then(|date| date.and_hms_opt(0, 0, 0))
    .map(|time| time.and_utc())
}
