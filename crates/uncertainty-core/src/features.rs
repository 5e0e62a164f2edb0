//! Column resolution for conditioning and regression features.
//!
//! A requested feature is read from the frame when present. Otherwise, if it
//! names one of the calendar features below and the frame has a time column,
//! it is derived from the timestamps.

use std::borrow::Cow;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::FrameError;
use crate::frame::{Column, DataFrame};

/// Calendar features derivable from a time column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFeature {
    /// Hour of day, 0-23
    Hour,
    /// Day of week, 1 = Monday .. 7 = Sunday
    DayOfWeek,
    /// Day of month, 1-31
    DayOfMonth,
    Month,
    Quarter,
    Year,
    /// 1.0 on Saturday and Sunday, else 0.0
    IsWeekend,
}

impl TimeFeature {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hour" => Some(TimeFeature::Hour),
            "dow" => Some(TimeFeature::DayOfWeek),
            "dom" => Some(TimeFeature::DayOfMonth),
            "month" => Some(TimeFeature::Month),
            "quarter" => Some(TimeFeature::Quarter),
            "year" => Some(TimeFeature::Year),
            "is_weekend" => Some(TimeFeature::IsWeekend),
            _ => None,
        }
    }

    pub fn value(&self, ts: &DateTime<Utc>) -> f64 {
        match self {
            TimeFeature::Hour => ts.hour() as f64,
            TimeFeature::DayOfWeek => ts.weekday().number_from_monday() as f64,
            TimeFeature::DayOfMonth => ts.day() as f64,
            TimeFeature::Month => ts.month() as f64,
            TimeFeature::Quarter => ((ts.month() - 1) / 3 + 1) as f64,
            TimeFeature::Year => ts.year() as f64,
            TimeFeature::IsWeekend => {
                if ts.weekday().number_from_monday() >= 6 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Resolves a grouping column, deriving calendar features when needed.
pub fn grouping_column<'a>(
    frame: &'a DataFrame,
    name: &str,
    time_col: &str,
) -> Result<Cow<'a, Column>, FrameError> {
    if frame.has_column(name) {
        return frame.column(name).map(Cow::Borrowed);
    }
    match TimeFeature::from_name(name) {
        Some(feature) => {
            let times = frame.times(time_col)?;
            Ok(Cow::Owned(Column::Float(
                times.iter().map(|t| feature.value(t)).collect(),
            )))
        }
        None => Err(FrameError::MissingColumn(name.to_string())),
    }
}

/// Resolves a numeric feature, deriving calendar features when needed.
pub fn numeric_feature<'a>(
    frame: &'a DataFrame,
    name: &str,
    time_col: &str,
) -> Result<Cow<'a, [f64]>, FrameError> {
    if frame.has_column(name) {
        return frame.floats(name).map(Cow::Borrowed);
    }
    match TimeFeature::from_name(name) {
        Some(feature) => {
            let times = frame.times(time_col)?;
            Ok(Cow::Owned(times.iter().map(|t| feature.value(t)).collect()))
        }
        None => Err(FrameError::MissingColumn(name.to_string())),
    }
}

const KEY_SEPARATOR: char = '|';

/// Escapes the key separator so distinct value tuples never share a key.
fn escape_key_part(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == KEY_SEPARATOR {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Builds one grouping key per row from the given columns, joined with `|`.
pub fn group_keys(
    frame: &DataFrame,
    columns: &[String],
    time_col: &str,
) -> Result<Vec<String>, FrameError> {
    let resolved = columns
        .iter()
        .map(|name| grouping_column(frame, name, time_col))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((0..frame.height())
        .map(|row| {
            resolved
                .iter()
                .map(|col| escape_key_part(&col.render(row)))
                .collect::<Vec<_>>()
                .join(&KEY_SEPARATOR.to_string())
        })
        .collect())
}
