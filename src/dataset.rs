//! Column-major numeric dataset read by variable leaves.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::float::Float;

/// A named dataset column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub index: usize,
}

/// Read-only table of `rows x columns` values, stored column by column so
/// that every variable is one contiguous slice.
#[derive(Clone, Debug)]
pub struct Dataset<F: Float> {
    variables: Vec<Variable>,
    values: Vec<F>,
    rows: usize,
}

impl<F: Float> Dataset<F> {
    /// Build a dataset from named columns of equal length.
    pub fn new(names: Vec<String>, columns: Vec<Vec<F>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(Error::ShapeMismatch {
                what: "variable names",
                expected: columns.len(),
                actual: names.len(),
            });
        }
        let rows = columns.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(rows * columns.len());
        for column in &columns {
            if column.len() != rows {
                return Err(Error::ShapeMismatch {
                    what: "dataset column",
                    expected: rows,
                    actual: column.len(),
                });
            }
            values.extend_from_slice(column);
        }
        let variables = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Variable { name, index })
            .collect();
        Ok(Dataset {
            variables,
            values,
            rows,
        })
    }

    /// Build a dataset whose columns are named `X1`, `X2`, ...
    pub fn from_columns(columns: Vec<Vec<F>>) -> Result<Self> {
        let names = (1..=columns.len()).map(|i| format!("X{i}")).collect();
        Self::new(names, columns)
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.variables.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// The full column at `index`.
    pub fn column(&self, index: usize) -> Option<&[F]> {
        (index < self.cols()).then(|| &self.values[index * self.rows..(index + 1) * self.rows])
    }

    /// The full column of the variable called `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&[F]> {
        self.variable(name).and_then(|v| self.column(v.index))
    }

    /// Rows `range` of column `index`.
    pub fn values(&self, index: usize, range: Range<usize>) -> Result<&[F]> {
        self.check_range(&range)?;
        let column = self.column(index).ok_or(Error::UnknownVariable {
            column: index,
            columns: self.cols(),
        })?;
        Ok(&column[range])
    }

    /// Fail unless `range` lies within the dataset.
    pub fn check_range(&self, range: &Range<usize>) -> Result<()> {
        if range.start > range.end || range.end > self.rows {
            return Err(Error::RowRange {
                start: range.start,
                end: range.end,
                rows: self.rows,
            });
        }
        Ok(())
    }
}
