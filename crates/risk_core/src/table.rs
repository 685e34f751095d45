//! In-memory order table
//!
//! Columnar storage of typed cells with the original header order preserved.
//! Stages never mutate a table they borrow: row filters and column additions
//! consume `self` and hand back the new table.

use crate::errors::{Result, RiskError};
use crate::schema::{is_missing_marker, Field, LabelPolicy, Schema};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Classify a raw CSV field
    pub fn from_raw(raw: &str) -> Self {
        if is_missing_marker(raw) {
            Value::Missing
        } else {
            Value::Text(raw.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric reading of the cell; text is parsed, non-finite values rejected
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Render the cell as written to CSV
    pub fn render(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Floats keep a decimal point so integral prices read back as floats
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// Named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// Order records held column by column
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTable {
    columns: Vec<Column>,
    schema: Schema,
    rows: usize,
}

impl OrderTable {
    /// Build a labeled table from columns, validating the header set
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        Self::new_with(columns, LabelPolicy::Required)
    }

    pub fn new_with(columns: Vec<Column>, labels: LabelPolicy) -> Result<Self> {
        let headers: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let schema = Schema::from_headers_with(&headers, labels)?;
        let rows = columns.first().map(|c| c.values.len()).unwrap_or(0);

        if let Some(bad) = columns.iter().find(|c| c.values.len() != rows) {
            return Err(RiskError::Schema(format!(
                "column '{}' has {} values, expected {}",
                bad.name,
                bad.values.len(),
                rows
            )));
        }

        Ok(Self {
            columns,
            schema,
            rows,
        })
    }

    /// Load a labeled comma-delimited file with a header row
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_csv_path_with(path, LabelPolicy::Required)
    }

    pub fn from_csv_path_with<P: AsRef<Path>>(path: P, labels: LabelPolicy) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let table = Self::from_reader_with(file, labels)?;
        debug!(
            "Read {} rows × {} columns from {}",
            table.len(),
            table.width(),
            path.as_ref().display()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_with(reader, LabelPolicy::Required)
    }

    pub fn from_reader_with<R: Read>(reader: R, labels: LabelPolicy) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        // Validate before reading any rows
        Schema::from_headers_with(&headers, labels)?;

        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::new(),
            })
            .collect();

        for record in csv_reader.records() {
            let record = record?;
            for (column, raw) in columns.iter_mut().zip(record.iter()) {
                column.values.push(Value::from_raw(raw));
            }
        }

        Self::new_with(columns, labels)
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.to_writer(file)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.headers())?;
        for row in 0..self.rows {
            csv_writer.write_record(self.columns.iter().map(|c| c.values[row].render()))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cells of a known field, if the table carries it
    pub fn field(&self, field: Field) -> Option<&[Value]> {
        self.column(field.column()).map(|c| c.values.as_slice())
    }

    /// Cells of a row, in header order
    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    /// Replace a column with the same name, or append a new one
    pub fn with_column(mut self, name: &str, values: Vec<Value>) -> Result<Self> {
        if values.len() != self.rows {
            return Err(RiskError::Schema(format!(
                "column '{}' has {} values, table has {} rows",
                name,
                values.len(),
                self.rows
            )));
        }

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => {
                self.columns.push(Column {
                    name: name.to_string(),
                    values,
                });
                if let Some(field) = Field::from_column(name) {
                    self.schema = self.schema.with(field);
                }
            }
        }
        Ok(self)
    }

    /// Keep the rows whose mask entry is true
    pub fn retain_rows(self, keep: &[bool]) -> Self {
        let rows = keep.iter().filter(|k| **k).count();
        let columns = self
            .columns
            .into_iter()
            .map(|c| Column {
                name: c.name,
                values: c
                    .values
                    .into_iter()
                    .zip(keep.iter())
                    .filter_map(|(v, k)| k.then_some(v))
                    .collect(),
            })
            .collect();

        Self {
            columns,
            schema: self.schema,
            rows,
        }
    }

    /// New table holding the given rows in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: indices.iter().map(|&i| c.values[i].clone()).collect(),
            })
            .collect();

        Self {
            columns,
            schema: self.schema.clone(),
            rows: indices.len(),
        }
    }
}
