use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Rectangular view over pipeline result rows.
///
/// Columns appear in first-seen order across all rows; a row that lacks a
/// column holds null in that cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn from_documents(docs: Vec<Value>) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut objects = Vec::with_capacity(docs.len());
        for (i, doc) in docs.into_iter().enumerate() {
            let Value::Object(map) = doc else {
                return Err(Error::DataShape(format!("row {i} is not an object")));
            };
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
            objects.push(map);
        }

        let rows = objects
            .into_iter()
            .map(|mut map| {
                columns
                    .iter()
                    .map(|c| map.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Ok(Self { columns, rows })
    }

    /// Rename a column in place. Row count and order are untouched; an
    /// unknown column is left alone.
    pub fn rename_column(mut self, from: &str, to: &str) -> Self {
        if let Some(col) = self.columns.iter_mut().find(|c| c.as_str() == from) {
            *col = to.to_string();
        }
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row {
            columns: &self.columns,
            cells,
        })
    }
}

/// One table row with by-name cell access.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    cells: &'a [Value],
}

impl<'a> Row<'a> {
    /// Null when the column is absent or the cell is empty.
    pub fn get(&self, column: &str) -> &'a Value {
        static NULL: Value = Value::Null;
        self.columns
            .iter()
            .position(|c| c == column)
            .map_or(&NULL, |i| &self.cells[i])
    }

    pub fn str(&self, column: &str) -> Option<&'a str> {
        self.get(column).as_str()
    }

    pub fn f64(&self, column: &str) -> Option<f64> {
        self.get(column).as_f64()
    }

    pub fn u64(&self, column: &str) -> Option<u64> {
        let v = self.get(column);
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
    }
}
