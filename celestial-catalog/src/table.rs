//! Column-oriented in-memory tables returned by cone searches.
//!
//! A [`CatalogueTable`] is an ordered set of equally long [`Column`]s. Row
//! order is the order the service returned; nothing is deduplicated. Tables
//! are treated as immutable once fetched: the row operations
//! ([`take`](CatalogueTable::take), [`filter`](CatalogueTable::filter))
//! return new tables.

use crate::error::{CatalogError, Result};
use std::fmt;

/// A single cell of an [`ColumnData::Object`] column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Typed column storage. Nulls are `NaN` for floats and `None` elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Float(Vec<f64>),
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
    /// Heterogeneous or array-valued cells.
    Object(Vec<Value>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Object(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Float(_) => "float",
            ColumnData::Int(_) => "int",
            ColumnData::Bool(_) => "bool",
            ColumnData::Text(_) => "text",
            ColumnData::Object(_) => "object",
        }
    }

    fn take(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Float(v) => ColumnData::Float(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Int(v) => ColumnData::Int(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Bool(v) => ColumnData::Bool(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Text(v) => {
                ColumnData::Text(indices.iter().map(|&i| v[i].clone()).collect())
            }
            ColumnData::Object(v) => {
                ColumnData::Object(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }

    /// Render one cell as text; nulls render as an empty string.
    pub fn cell_to_string(&self, row: usize) -> String {
        match self {
            ColumnData::Float(v) if v[row].is_nan() => String::new(),
            ColumnData::Float(v) => v[row].to_string(),
            ColumnData::Int(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
            ColumnData::Bool(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
            ColumnData::Text(v) => v[row].clone().unwrap_or_default(),
            ColumnData::Object(v) => v[row].to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub unit: Option<String>,
    pub ucd: Option<String>,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            unit: None,
            ucd: None,
            data,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, ColumnData::Float(values))
    }

    pub fn int(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self::new(name, ColumnData::Int(values))
    }

    pub fn text<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        let values = values.into_iter().map(|v| v.map(Into::into)).collect();
        Self::new(name, ColumnData::Text(values))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Rows fetched from one catalogue, stored column-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueTable {
    name: String,
    columns: Vec<Column>,
    rows: usize,
}

impl CatalogueTable {
    /// Build a table, checking that every column has the same length and
    /// that column names are unique.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let name = name.into();
        let rows = columns.first().map(Column::len).unwrap_or(0);

        for (i, column) in columns.iter().enumerate() {
            if column.len() != rows {
                return Err(CatalogError::InvalidTable(format!(
                    "{}: column '{}' has {} rows, expected {}",
                    name,
                    column.name,
                    column.len(),
                    rows
                )));
            }
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(CatalogError::InvalidTable(format!(
                    "{}: duplicate column '{}'",
                    name, column.name
                )));
            }
        }

        Ok(Self {
            name,
            columns,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`column`](Self::column) but a missing column is a
    /// [`CatalogError::SchemaMismatch`].
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| self.schema_mismatch(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Rename `from` to `to`. Renaming a column onto itself is a no-op.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return self.require_column(from).map(|_| ());
        }
        if self.has_column(to) {
            return Err(CatalogError::InvalidTable(format!(
                "{}: cannot rename '{}' to existing column '{}'",
                self.name, from, to
            )));
        }
        let missing = self.schema_mismatch(from);
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == from)
            .ok_or(missing)?;
        column.name = to.to_string();
        Ok(())
    }

    /// Values of a float or integer column as `f64`; nulls become `NaN`.
    pub fn numeric_values(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.require_column(name)?;
        match &column.data {
            ColumnData::Float(v) => Ok(v.clone()),
            ColumnData::Int(v) => Ok(v
                .iter()
                .map(|x| x.map(|i| i as f64).unwrap_or(f64::NAN))
                .collect()),
            other => Err(CatalogError::InvalidTable(format!(
                "{}: column '{}' is {}, expected a numeric column",
                self.name,
                name,
                other.type_name()
            ))),
        }
    }

    /// New table whose row `k` is row `indices[k]` of this one. Indices may
    /// repeat; every index must be in range.
    pub fn take(&self, indices: &[usize]) -> Result<CatalogueTable> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.rows) {
            return Err(CatalogError::InvalidTable(format!(
                "{}: row index {} out of range for {} rows",
                self.name, bad, self.rows
            )));
        }
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                unit: c.unit.clone(),
                ucd: c.ucd.clone(),
                data: c.data.take(indices),
            })
            .collect();
        Ok(CatalogueTable {
            name: self.name.clone(),
            columns,
            rows: indices.len(),
        })
    }

    /// New table keeping the rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<CatalogueTable> {
        if mask.len() != self.rows {
            return Err(CatalogError::InvalidTable(format!(
                "{}: mask has {} entries for {} rows",
                self.name,
                mask.len(),
                self.rows
            )));
        }
        let kept: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.take(&kept)
    }

    /// Convert every text and object column to a uniform text column. Nulls
    /// become empty strings, so the result has no missing text cells.
    pub fn coerce_text(&mut self) {
        for column in &mut self.columns {
            let strings: Vec<Option<String>> = match &column.data {
                ColumnData::Text(v) => v.iter().map(|s| Some(s.clone().unwrap_or_default())).collect(),
                ColumnData::Object(v) => v.iter().map(|x| Some(x.to_string())).collect(),
                _ => continue,
            };
            column.data = ColumnData::Text(strings);
        }
    }

    /// Render the first `limit` rows as an aligned text table.
    pub fn preview(&self, limit: usize) -> String {
        let shown = self.rows.min(limit);
        let mut cells: Vec<Vec<String>> = vec![self.column_names()];
        for row in 0..shown {
            cells.push(
                self.columns
                    .iter()
                    .map(|c| c.data.cell_to_string(row))
                    .collect(),
            );
        }

        let widths: Vec<usize> = (0..self.columns.len())
            .map(|col| cells.iter().map(|r| r[col].len()).max().unwrap_or(0))
            .collect();

        let mut out = String::new();
        for (i, row) in cells.iter().enumerate() {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, &w)| format!("{:>w$}", cell, w = w))
                .collect();
            out.push_str(line.join(" ").trim_end());
            out.push('\n');
            if i == 0 {
                let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
                out.push_str(&rule.join(" "));
                out.push('\n');
            }
        }
        out
    }

    fn schema_mismatch(&self, column: &str) -> CatalogError {
        CatalogError::SchemaMismatch {
            catalogue: self.name.clone(),
            column: column.to_string(),
            available: self.column_names(),
        }
    }
}
