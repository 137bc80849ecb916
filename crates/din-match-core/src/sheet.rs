//! Tabular boundary: a header plus string rows, and the typed view over them.
//!
//! Handles:
//! - Header lookup ignoring case and whitespace runs ("  drug  name" == "Drug Name")
//! - Required-column checks before any row is touched
//! - Appending the result column (and padding short rows) when absent

use thiserror::Error;

use crate::config::ColumnNames;
use crate::models::{DrugKind, TargetRecord};
use crate::resolver::normalize_text;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SheetError {
    #[error("Required column missing: {column}")]
    MissingColumn { column: String },
}

pub type SheetResult<T> = Result<T, SheetError>;

/// Header and rows of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(header: impl IntoIterator<Item = S>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<S: Into<String>>(&mut self, row: impl IntoIterator<Item = S>) {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column whose header matches `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        let wanted = normalize_text(name);
        self.header.iter().position(|h| normalize_text(h) == wanted)
    }

    pub fn require_column(&self, name: &str) -> SheetResult<usize> {
        self.column(name).ok_or_else(|| SheetError::MissingColumn {
            column: name.to_string(),
        })
    }

    /// Index of `name`, appending the column if absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(i) = self.column(name) {
            return i;
        }
        self.header.push(name.to_string());
        let width = self.header.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        width - 1
    }

    /// Cell text, empty for cells past the end of a short row.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Write a cell, padding the row if needed. Out-of-range rows are ignored.
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if let Some(r) = self.rows.get_mut(row) {
            if r.len() <= column {
                r.resize(column + 1, String::new());
            }
            r[column] = value.into();
        }
    }
}

/// Resolved column positions of a target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub kind: usize,
    pub name: usize,
    pub ingredients: usize,
    pub strength: usize,
    pub form: usize,
    pub country: usize,
    pub result: usize,
}

impl ColumnLayout {
    /// Locate every column. All but the result column are required; the
    /// result column is appended when absent.
    pub fn resolve(table: &mut Table, names: &ColumnNames) -> SheetResult<Self> {
        let kind = table.require_column(&names.kind)?;
        let name = table.require_column(&names.name)?;
        let ingredients = table.require_column(&names.ingredients)?;
        let strength = table.require_column(&names.strength)?;
        let form = table.require_column(&names.form)?;
        let country = table.require_column(&names.country)?;
        let result = table.ensure_column(&names.result);

        Ok(Self {
            kind,
            name,
            ingredients,
            strength,
            form,
            country,
            result,
        })
    }
}

impl TargetRecord {
    /// Typed view of one row. `None` when the type cell is not a known kind.
    pub fn from_row(table: &Table, row: usize, layout: &ColumnLayout) -> Option<Self> {
        let kind = DrugKind::parse(table.cell(row, layout.kind))?;
        let identifier = table.cell(row, layout.result).trim();

        Some(Self {
            kind,
            name: table.cell(row, layout.name).to_string(),
            strength_text: table.cell(row, layout.strength).to_string(),
            ingredients_text: table.cell(row, layout.ingredients).to_string(),
            dosage_form: table.cell(row, layout.form).to_string(),
            country_code: table.cell(row, layout.country).trim().to_string(),
            identifier: (!identifier.is_empty()).then(|| identifier.to_string()),
        })
    }
}
