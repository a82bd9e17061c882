//! Schema operations: table/field/database DDL, `DESCRIBE` caching, and the
//! catalog-introspection queries (`get_database_names`/`get_table_names`/
//! `get_num_records`/`get_size`).

use std::convert::TryFrom;

use skydb_core::{Error, Result, TypeDescriptor, Value};

use crate::result::{cell_to_string, DbResult};
use crate::sql::ident::validate_field_name;

use super::Database;

impl Database {
    pub fn add_table(
        &self,
        db_name: &str,
        table_name: &str,
        primary_key: &str,
        fields: &[(&str, &str)],
    ) -> Result<bool> {
        validate_field_name(db_name)?;
        validate_field_name(table_name)?;
        let db_table = self.qualify_table(db_name, table_name);
        let sql = crate::sql::builder::add_table(&db_table, primary_key, fields)?;
        self.execute(&sql)?;
        Ok(true)
    }

    /// Creates every `(table_name, primary_key, fields)` triple in order,
    /// stopping at the first failure.
    pub fn add_table_list(
        &self,
        db_name: &str,
        tables: &[(&str, &str, &[(&str, &str)])],
    ) -> Result<bool> {
        for (table_name, primary_key, fields) in tables {
            self.add_table(db_name, table_name, primary_key, fields)?;
        }
        Ok(true)
    }

    pub fn delete_table(&self, db_name: &str, table_name: &str) -> Result<bool> {
        validate_field_name(db_name)?;
        validate_field_name(table_name)?;
        let db_table = self.qualify_table(db_name, table_name);
        self.execute(&crate::sql::builder::delete_table(&db_table))?;
        self.invalidate_describe(db_name, table_name);
        Ok(true)
    }

    pub fn rename_table(&self, db_name: &str, table_name: &str, new_name: &str) -> Result<bool> {
        validate_field_name(db_name)?;
        validate_field_name(table_name)?;
        let db_table = self.qualify_table(db_name, table_name);
        let sql = crate::sql::builder::rename_table(&db_table, new_name)?;
        self.execute(&sql)?;
        self.invalidate_describe(db_name, table_name);
        self.invalidate_describe(db_name, new_name);
        Ok(true)
    }

    /// Memoized `DESCRIBE db.table`, reshaped into `["field","type",
    /// "primary_key"]` rows.
    pub fn describe_table(&self, db_name: &str, table_name: &str) -> Result<DbResult> {
        self.describe_table_cached(db_name, table_name)
    }

    pub(crate) fn describe_table_cached(&self, db_name: &str, table_name: &str) -> Result<DbResult> {
        let key = self.cache_key(db_name, table_name);

        if let Some(cached) = self.inner.describe_cache.lock().unwrap().get(&key) {
            return Ok(cached.clone());
        }

        let described = self.describe_table_uncached(db_name, table_name)?;
        self.inner.describe_cache.lock().unwrap().insert(key, described.clone());
        Ok(described)
    }

    fn describe_table_uncached(&self, db_name: &str, table_name: &str) -> Result<DbResult> {
        validate_field_name(db_name)?;
        validate_field_name(table_name)?;
        let db_table = self.qualify_table(db_name, table_name);
        let sql = crate::sql::builder::describe_table(&db_table);
        let raw = self.query_result_set(&sql)?;

        let field_col = raw.name_to_index.get("Field").copied();
        let type_col = raw.name_to_index.get("Type").copied();
        let key_col = raw.name_to_index.get("Key").copied();

        let (field_col, type_col, key_col) = match (field_col, type_col, key_col) {
            (Some(f), Some(t), Some(k)) => (f, t, k),
            _ => return Err(Error::ProtocolError("DESCRIBE reply missing Field/Type/Key columns".into())),
        };

        let mut rows = Vec::with_capacity(raw.record_count());
        for row_index in 1..raw.row_count() {
            let field = cell_to_string(&raw.rows[row_index][field_col]);
            let sql_type = cell_to_string(&raw.rows[row_index][type_col]);
            let is_primary = cell_to_string(&raw.rows[row_index][key_col]) == "PRI";
            rows.push(vec![Value::Str(field), Value::Str(sql_type), Value::Boolean(is_primary)]);
        }

        Ok(DbResult::new(
            vec!["field".to_string(), "type".to_string(), "primary_key".to_string()],
            vec![TypeDescriptor::String, TypeDescriptor::String, TypeDescriptor::Boolean],
            rows,
        ))
    }

    /// Names of the primary-key column(s) of `db.table`, via the description
    /// cache. Used to build the WHERE clause for `update_record_dict` and to
    /// populate `DbResult::primary_key_columns` on freshly fetched results.
    pub(crate) fn primary_key_field_names(&self, db_name: &str, table_name: &str) -> Result<Vec<String>> {
        let described = self.describe_table_cached(db_name, table_name)?;
        let field_col = *described
            .name_to_index
            .get("field")
            .ok_or_else(|| Error::ProtocolError("description cache missing field column".into()))?;
        let pk_col = *described
            .name_to_index
            .get("primary_key")
            .ok_or_else(|| Error::ProtocolError("description cache missing primary_key column".into()))?;

        let mut names = Vec::new();
        for row_index in 1..described.row_count() {
            if described.rows[row_index][pk_col] == Value::Boolean(true) {
                if let Value::Str(name) = &described.rows[row_index][field_col] {
                    names.push(name.clone());
                }
            }
        }
        Ok(names)
    }

    /// Indices into `field_names` that are primary-key columns of
    /// `db.table`. A failed lookup (e.g. the table was dropped underneath
    /// us) degrades to "no known primary key" rather than failing the
    /// caller's fetch.
    pub(crate) fn primary_key_columns_for(
        &self,
        db_name: &str,
        table_name: &str,
        field_names: &[String],
    ) -> Vec<usize> {
        let pk_names = match self.primary_key_field_names(db_name, table_name) {
            Ok(names) => names,
            Err(_) => return Vec::new(),
        };

        field_names
            .iter()
            .enumerate()
            .filter(|(_, name)| pk_names.iter().any(|pk| *pk == **name))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn add_field(&self, db_name: &str, table_name: &str, field: &str, sql_type: &str) -> Result<bool> {
        validate_field_name(db_name)?;
        validate_field_name(table_name)?;
        let db_table = self.qualify_table(db_name, table_name);
        let sql = crate::sql::builder::add_field(&db_table, field, sql_type)?;
        self.execute(&sql)?;
        self.invalidate_describe(db_name, table_name);
        Ok(true)
    }

    pub fn delete_field(&self, db_name: &str, table_name: &str, field: &str) -> Result<bool> {
        validate_field_name(db_name)?;
        validate_field_name(table_name)?;
        let db_table = self.qualify_table(db_name, table_name);
        let sql = crate::sql::builder::delete_field(&db_table, field)?;
        self.execute(&sql)?;
        self.invalidate_describe(db_name, table_name);
        Ok(true)
    }

    pub fn change_field_type(&self, db_name: &str, table_name: &str, field: &str, sql_type: &str) -> Result<bool> {
        validate_field_name(db_name)?;
        validate_field_name(table_name)?;
        let db_table = self.qualify_table(db_name, table_name);
        let sql = crate::sql::builder::change_field_type(&db_table, field, sql_type)?;
        self.execute(&sql)?;
        self.invalidate_describe(db_name, table_name);
        Ok(true)
    }

    pub fn change_field_name(&self, db_name: &str, table_name: &str, field: &str, new_name: &str) -> Result<bool> {
        validate_field_name(db_name)?;
        validate_field_name(table_name)?;
        let db_table = self.qualify_table(db_name, table_name);
        let sql = crate::sql::builder::change_field_name(&db_table, field, new_name)?;
        self.execute(&sql)?;
        self.invalidate_describe(db_name, table_name);
        Ok(true)
    }

    pub fn add_database(&self, db_name: &str) -> Result<bool> {
        validate_field_name(db_name)?;
        let qualified = self.qualify(db_name);
        self.execute(&crate::sql::builder::add_database(&qualified))?;
        Ok(true)
    }

    pub fn delete_database(&self, db_name: &str) -> Result<bool> {
        validate_field_name(db_name)?;
        let qualified = self.qualify(db_name);
        self.execute(&crate::sql::builder::delete_database(&qualified))?;
        Ok(true)
    }

    /// MariaDB has no `RENAME DATABASE`; this performs the conventional
    /// create-new / `RENAME TABLE` per table / drop-old sequence instead.
    pub fn rename_database(&self, db_name: &str, new_name: &str) -> Result<bool> {
        validate_field_name(db_name)?;
        validate_field_name(new_name)?;

        let old = self.qualify(db_name);
        let new = self.qualify(new_name);

        self.execute(&crate::sql::builder::add_database(&new))?;

        let tables = self.get_table_names(Some(db_name))?;
        for row_index in 1..tables.row_count() {
            if let Value::Str(table) = &tables.rows[row_index][0] {
                let sql = format!("RENAME TABLE {}.{} TO {}.{}", old, table, new, table);
                self.execute(&sql)?;
                self.invalidate_describe(db_name, table);
            }
        }

        self.execute(&crate::sql::builder::delete_database(&old))?;
        Ok(true)
    }

    pub fn get_database_names(&self) -> Result<DbResult> {
        let sql = crate::sql::builder::get_database_names();
        let mut result = self.query_result_set(sql)?;
        rename_single_column(&mut result, "database_name");
        Ok(result)
    }

    /// Lists the tables of `db_name`, falling back to the connection's
    /// default database when `db_name` is `None`.
    pub fn get_table_names(&self, db_name: Option<&str>) -> Result<DbResult> {
        let db = match db_name.map(str::to_string).or_else(|| self.inner.default_database.clone()) {
            Some(db) => db,
            None => {
                return Err(Error::InvalidArgument(
                    "no database given and no default database configured".into(),
                ))
            }
        };
        validate_field_name(&db)?;
        let qualified = self.qualify(&db);
        let sql = crate::sql::builder::get_table_names(&qualified);
        let mut result = self.query_result_set(&sql)?;
        rename_single_column(&mut result, "table_name");
        Ok(result)
    }

    pub fn get_num_records(&self, db_name: &str, table_name: &str) -> Result<i64> {
        validate_field_name(db_name)?;
        validate_field_name(table_name)?;
        let db_table = self.qualify_table(db_name, table_name);
        let sql = crate::sql::builder::get_num_records(&db_table);
        let result = self.query_result_set(&sql)?;
        result
            .rows
            .get(1)
            .and_then(|row| row.get(0))
            .and_then(value_as_i64)
            .ok_or_else(|| Error::ProtocolError("COUNT(*) reply had no row".into()))
    }

    pub fn get_size(&self, db_name: &str, table_name: Option<&str>) -> Result<i64> {
        validate_field_name(db_name)?;
        if let Some(table) = table_name {
            validate_field_name(table)?;
        }
        let qualified = self.qualify(db_name);
        let sql = crate::sql::builder::get_size(&qualified, table_name);
        let result = self.query_result_set(&sql)?;
        Ok(result
            .rows
            .get(1)
            .and_then(|row| row.get(0))
            .and_then(value_as_i64)
            .unwrap_or(0))
    }

    pub fn ensure_field_indexed(
        &self,
        db_name: &str,
        table_name: &str,
        field: &str,
        index_name: Option<&str>,
    ) -> Result<bool> {
        validate_field_name(db_name)?;
        validate_field_name(table_name)?;
        let db_table = self.qualify_table(db_name, table_name);
        let owned_name;
        let index_name = match index_name {
            Some(name) => name,
            None => {
                owned_name = format!("idx_{}", field);
                &owned_name
            }
        };
        let sql = crate::sql::builder::ensure_field_indexed(&db_table, field, index_name)?;
        self.execute(&sql)?;
        Ok(true)
    }
}

/// `SHOW DATABASES`/`SHOW TABLES` return a single unnamed-by-us column;
/// relabel it so callers don't have to know the server's literal header.
fn rename_single_column(result: &mut DbResult, name: &str) {
    if result.field_names.len() != 1 {
        return;
    }
    result.field_names[0] = name.to_string();
    result.name_to_index.clear();
    result.name_to_index.insert(name.to_string(), 0);
    if let Some(header) = result.rows.get_mut(0) {
        header[0] = Value::Str(name.to_string());
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::I8(v) => Some(*v as i64),
        Value::I16(v) => Some(*v as i64),
        Value::I32(v) => Some(*v as i64),
        Value::I64(v) => Some(*v),
        Value::U8(v) => Some(*v as i64),
        Value::U16(v) => Some(*v as i64),
        Value::U32(v) => Some(*v as i64),
        Value::U64(v) => i64::try_from(*v).ok(),
        Value::Str(s) => s.parse().ok(),
        Value::Bytes(b) => std::str::from_utf8(b).ok().and_then(|s| s.parse().ok()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_single_column_relabels_header_and_index() {
        let mut result = DbResult::new(
            vec!["Database".to_string()],
            vec![TypeDescriptor::String],
            vec![vec![Value::Str("orders".to_string())]],
        );

        rename_single_column(&mut result, "database_name");

        assert_eq!(result.field_names, vec!["database_name".to_string()]);
        assert_eq!(*result.name_to_index.get("database_name").unwrap(), 0);
        assert_eq!(result.rows[0][0], Value::Str("database_name".to_string()));
    }

    #[test]
    fn value_as_i64_parses_text_protocol_integers() {
        assert_eq!(value_as_i64(&Value::Str("42".to_string())), Some(42));
        assert_eq!(value_as_i64(&Value::I64(7)), Some(7));
        assert_eq!(value_as_i64(&Value::Null), None);
    }
}
