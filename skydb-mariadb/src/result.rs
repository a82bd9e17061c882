//! The canonical typed tabular result carrier.

use std::collections::HashMap;
use std::sync::Weak;

use skydb_core::{Error, Result, TypeDescriptor, Value};

/// Whatever owns the session pool implements this so a `DbResult` can
/// push an in-place `update()` back onto the server without holding a
/// strong reference to its parent `Database`.
pub(crate) trait ResultBackend: Send + Sync {
    fn update_by_primary_key(
        &self,
        db_name: &str,
        table_name: &str,
        primary_key: &[(String, Value)],
        updates: &[(String, Value)],
    ) -> Result<()>;
}

#[derive(Clone)]
pub struct DbResult {
    pub(crate) field_names: Vec<String>,
    pub(crate) field_types: Vec<TypeDescriptor>,
    pub(crate) name_to_index: HashMap<String, usize>,
    pub(crate) rows: Vec<Vec<Value>>,
    pub(crate) db_name: Option<String>,
    pub(crate) table_name: Option<String>,
    pub(crate) primary_key_columns: Vec<usize>,
    pub successful: bool,
    pub(crate) backend: Option<Weak<dyn ResultBackend>>,
}

impl std::fmt::Debug for DbResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbResult")
            .field("field_names", &self.field_names)
            .field("record_count", &self.record_count())
            .field("successful", &self.successful)
            .finish()
    }
}

impl DbResult {
    pub fn empty() -> Self {
        Self {
            field_names: Vec::new(),
            field_types: Vec::new(),
            name_to_index: HashMap::new(),
            rows: Vec::new(),
            db_name: None,
            table_name: None,
            primary_key_columns: Vec::new(),
            successful: true,
            backend: None,
        }
    }

    pub fn failed() -> Self {
        Self { successful: false, ..Self::empty() }
    }

    pub(crate) fn new(
        field_names: Vec<String>,
        field_types: Vec<TypeDescriptor>,
        data_rows: Vec<Vec<Value>>,
    ) -> Self {
        let name_to_index =
            field_names.iter().enumerate().map(|(i, name)| (name.clone(), i)).collect();

        let mut rows = Vec::with_capacity(data_rows.len() + 1);
        rows.push(field_names.iter().map(|n| Value::Str(n.clone())).collect());
        rows.extend(data_rows);

        Self {
            field_names,
            field_types,
            name_to_index,
            rows,
            db_name: None,
            table_name: None,
            primary_key_columns: Vec::new(),
            successful: true,
            backend: None,
        }
    }

    pub fn field_count(&self) -> usize {
        self.field_types.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Data rows only, excluding the header row of field names.
    pub fn record_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    pub fn get(&self, row_index: usize, col_index: usize, expected_type: TypeDescriptor) -> Option<&Value> {
        let cell = self.rows.get(row_index)?.get(col_index)?;
        match cell.type_descriptor() {
            Some(t) if t == expected_type => Some(cell),
            None => Some(cell), // null is always a valid read regardless of expected type
            _ => None,
        }
    }

    pub fn get_by_name(&self, row_index: usize, field_name: &str, expected_type: TypeDescriptor) -> Option<&Value> {
        let col = *self.name_to_index.get(field_name)?;
        self.get(row_index, col, expected_type)
    }

    /// First data row (index ≥ 1) whose listed columns all match, or `None`.
    pub fn lookup_index(&self, criteria: &[(&str, Value)]) -> Option<usize> {
        'rows: for row_index in 1..self.rows.len() {
            for (field, value) in criteria {
                let col = match self.name_to_index.get(*field) {
                    Some(&col) => col,
                    None => continue 'rows,
                };
                if self.rows[row_index][col] != *value {
                    continue 'rows;
                }
            }
            return Some(row_index);
        }
        None
    }

    pub fn set(&mut self, row_index: usize, col_index: usize, new_value: Value) -> Result<()> {
        let row = self
            .rows
            .get_mut(row_index)
            .ok_or_else(|| Error::InvalidArgument("row index out of bounds".into()))?;
        let cell =
            row.get_mut(col_index).ok_or_else(|| Error::InvalidArgument("column index out of bounds".into()))?;
        *cell = new_value;
        Ok(())
    }

    /// Mutates the row in place and, if this result is attached to a live
    /// `Database`, propagates the change as an `UPDATE` keyed by the row's
    /// primary-key column(s).
    pub fn update(&mut self, row_index: usize, fields: &[(&str, Value)]) -> Result<()> {
        if row_index == 0 || row_index >= self.rows.len() {
            return Err(Error::InvalidArgument("row index out of bounds".into()));
        }

        for (field, value) in fields {
            let col = *self
                .name_to_index
                .get(*field)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown field {}", field)))?;
            self.rows[row_index][col] = value.clone();
        }

        let (db_name, table_name) = match (&self.db_name, &self.table_name) {
            (Some(db), Some(table)) => (db.clone(), table.clone()),
            _ => return Ok(()), // not attached to a table; in-memory mutation only
        };

        let backend = match self.backend.as_ref().and_then(Weak::upgrade) {
            Some(backend) => backend,
            None => return Err(Error::DatabaseGone),
        };

        let primary_key: Vec<(String, Value)> = self
            .primary_key_columns
            .iter()
            .map(|&col| (self.field_names[col].clone(), self.rows[row_index][col].clone()))
            .collect();

        let updates: Vec<(String, Value)> =
            fields.iter().map(|(f, v)| (f.to_string(), v.clone())).collect();

        backend.update_by_primary_key(&db_name, &table_name, &primary_key, &updates)
    }

    /// A new result sharing field names/types with rows restricted to `[start, end)`.
    pub fn range(&self, start: usize, end: usize) -> DbResult {
        let start = start.max(1);
        let end = end.min(self.rows.len());

        let mut out = DbResult::new(self.field_names.clone(), self.field_types.clone(), Vec::new());
        if start < end {
            out.rows.extend(self.rows[start..end].iter().cloned());
        }
        out.db_name = self.db_name.clone();
        out.table_name = self.table_name.clone();
        out.primary_key_columns = self.primary_key_columns.clone();
        out
    }

    pub fn append_records(&mut self, other: &DbResult) {
        self.rows.extend(other.rows.iter().skip(1).cloned());
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('"');
                out.push_str(&escape_csv_field(&cell_to_string(cell)));
                out.push('"');
            }
            out.push_str("\r\n");
        }
        out
    }

    pub fn to_bytes(&self, record_delim: &str, field_delim: &str) -> String {
        let mut out = String::new();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    out.push_str(field_delim);
                }
                out.push_str(&cell_to_string(cell));
            }
            out.push_str(record_delim);
        }
        out
    }

    /// Row-then-column-wise equality: types must match, null < non-null.
    pub fn compare(&self, other: &DbResult) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        let rows = self.rows.len().min(other.rows.len());
        for row_index in 0..rows {
            let cols = self.rows[row_index].len().min(other.rows[row_index].len());
            for col in 0..cols {
                let ord = self.rows[row_index][col].cmp_typed(&other.rows[row_index][col]);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
        self.rows.len().cmp(&other.rows.len())
    }
}

pub(crate) fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Boolean(b) => b.to_string(),
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::I128(v) => v.to_string(),
        Value::U8(v) => v.to_string(),
        Value::U16(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::U128(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Str(s) => s.clone(),
        Value::Bytes(b) => String::from_utf8_lossy(b).to_string(),
    }
}

fn escape_csv_field(field: &str) -> String {
    field.replace('"', "\"\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_projection_matches_the_documented_example() {
        let result = DbResult::new(
            vec!["k".to_string(), "v".to_string()],
            vec![TypeDescriptor::String, TypeDescriptor::String],
            vec![
                vec![Value::Str("a".to_string()), Value::Str("b,c".to_string())],
                vec![Value::Str("d".to_string()), Value::Str("e\"f".to_string())],
            ],
        );

        assert_eq!(result.to_csv(), "\"k\",\"v\"\r\n\"a\",\"b,c\"\r\n\"d\",\"e\"\"f\"\r\n");
    }

    #[test]
    fn lookup_index_finds_matching_data_row() {
        let result = DbResult::new(
            vec!["pk".to_string(), "name".to_string()],
            vec![TypeDescriptor::I64, TypeDescriptor::String],
            vec![
                vec![Value::I64(1), Value::Str("alpha".to_string())],
                vec![Value::I64(2), Value::Str("beta".to_string())],
            ],
        );

        let idx = result.lookup_index(&[("pk", Value::I64(2))]).unwrap();
        assert_eq!(idx, 2);
    }

    #[test]
    fn range_preserves_field_metadata() {
        let result = DbResult::new(
            vec!["pk".to_string()],
            vec![TypeDescriptor::I64],
            vec![vec![Value::I64(1)], vec![Value::I64(2)], vec![Value::I64(3)]],
        );

        let sliced = result.range(1, 3);
        assert_eq!(sliced.record_count(), 2);
        assert_eq!(sliced.field_names, result.field_names);
    }
}
