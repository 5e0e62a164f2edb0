//! Minimal columnar table shared by training, future and prediction frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// A single typed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum Column {
    Float(Vec<f64>),
    Text(Vec<String>),
    Time(Vec<DateTime<Utc>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
            Column::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Float(_) => "float",
            Column::Text(_) => "text",
            Column::Time(_) => "time",
        }
    }

    /// Renders one cell as a string; used to build grouping keys.
    pub fn render(&self, row: usize) -> String {
        match self {
            Column::Float(v) => {
                let x = v[row];
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    format!("{}", x as i64)
                } else {
                    format!("{x}")
                }
            }
            Column::Text(v) => v[row].clone(),
            Column::Time(v) => v[row].to_rfc3339(),
        }
    }

    /// Returns a new column holding the given rows in order.
    pub fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Float(v) => Column::Float(rows.iter().map(|&i| v[i]).collect()),
            Column::Text(v) => Column::Text(rows.iter().map(|&i| v[i].clone()).collect()),
            Column::Time(v) => Column::Time(rows.iter().map(|&i| v[i]).collect()),
        }
    }
}

impl From<Vec<f64>> for Column {
    fn from(values: Vec<f64>) -> Self {
        Column::Float(values)
    }
}

impl From<Vec<String>> for Column {
    fn from(values: Vec<String>) -> Self {
        Column::Text(values)
    }
}

impl From<Vec<&str>> for Column {
    fn from(values: Vec<&str>) -> Self {
        Column::Text(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<DateTime<Utc>>> for Column {
    fn from(values: Vec<DateTime<Utc>>) -> Self {
        Column::Time(values)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedColumn {
    pub name: String,
    pub column: Column,
}

/// Ordered set of named, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    columns: Vec<NamedColumn>,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a frame from `(name, column)` pairs, checking lengths and names.
    pub fn from_columns<N, C, I>(columns: I) -> Result<Self, FrameError>
    where
        N: Into<String>,
        C: Into<Column>,
        I: IntoIterator<Item = (N, C)>,
    {
        let mut frame = Self::new();
        for (name, column) in columns {
            frame = frame.with_column(name, column)?;
        }
        Ok(frame)
    }

    /// Appends a column. Fails on a duplicate name or a length mismatch.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        column: impl Into<Column>,
    ) -> Result<Self, FrameError> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(FrameError::DuplicateColumn(name));
        }
        let column = column.into();
        self.check_length(&name, &column)?;
        self.columns.push(NamedColumn { name, column });
        Ok(self)
    }

    /// Inserts a column, replacing any existing column with the same name in place.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        column: impl Into<Column>,
    ) -> Result<(), FrameError> {
        let name = name.into();
        let column = column.into();
        self.check_length(&name, &column)?;
        match self.columns.iter().position(|c| c.name == name) {
            Some(idx) => self.columns[idx].column = column,
            None => self.columns.push(NamedColumn { name, column }),
        }
        Ok(())
    }

    fn check_length(&self, name: &str, column: &Column) -> Result<(), FrameError> {
        if let Some(first) = self.columns.iter().find(|c| c.name != name) {
            let expected = first.column.len();
            if column.len() != expected {
                return Err(FrameError::LengthMismatch {
                    name: name.to_string(),
                    expected,
                    found: column.len(),
                });
            }
        }
        Ok(())
    }

    pub fn height(&self) -> usize {
        self.columns.first().map(|c| c.column.len()).unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, FrameError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.column)
            .ok_or_else(|| FrameError::MissingColumn(name.to_string()))
    }

    pub fn floats(&self, name: &str) -> Result<&[f64], FrameError> {
        match self.column(name)? {
            Column::Float(v) => Ok(v),
            other => Err(FrameError::TypeMismatch {
                name: name.to_string(),
                expected: "float",
                found: other.type_name(),
            }),
        }
    }

    pub fn times(&self, name: &str) -> Result<&[DateTime<Utc>], FrameError> {
        match self.column(name)? {
            Column::Time(v) => Ok(v),
            other => Err(FrameError::TypeMismatch {
                name: name.to_string(),
                expected: "time",
                found: other.type_name(),
            }),
        }
    }

    /// Returns a frame holding only `rows`, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> DataFrame {
        DataFrame {
            columns: self
                .columns
                .iter()
                .map(|c| NamedColumn {
                    name: c.name.clone(),
                    column: c.column.take(rows),
                })
                .collect(),
        }
    }

    /// Returns rows `start..end`, clamped to the frame height.
    pub fn slice(&self, start: usize, end: usize) -> DataFrame {
        let end = end.min(self.height());
        let start = start.min(end);
        let rows: Vec<usize> = (start..end).collect();
        self.take_rows(&rows)
    }
}
