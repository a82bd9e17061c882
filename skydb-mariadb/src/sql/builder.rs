//! Renders the query/DDL shapes from §4.5: equality/LIKE/disjunctive
//! SELECT, INSERT, UPDATE, DELETE, and schema DDL. All SQL is raw text;
//! there are no prepared statements.

use skydb_core::{Error, Result, Value};

use super::ident::validate_field_name;
use super::literal::render_value;

fn validate_fields(pairs: &[(&str, Value)]) -> Result<()> {
    for (field, _) in pairs {
        validate_field_name(field)?;
    }
    Ok(())
}

fn where_clause(pairs: &[(&str, Value)], joiner: &str, op: &str) -> String {
    pairs
        .iter()
        .map(|(field, value)| format!("{}{}{}", field, op, render_value(value)))
        .collect::<Vec<_>>()
        .join(joiner)
}

pub(crate) fn select(
    db_table: &str,
    select_list: &str,
    order_by: Option<&str>,
    criteria: &[(&str, Value)],
) -> Result<String> {
    validate_fields(criteria)?;
    let mut sql = format!("SELECT {} FROM {}", select_list, db_table);
    if !criteria.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(criteria, " AND ", "="));
    }
    if let Some(order_by) = order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    Ok(sql)
}

pub(crate) fn select_like(
    db_table: &str,
    select_list: &str,
    order_by: Option<&str>,
    criteria: &[(&str, Value)],
) -> Result<String> {
    validate_fields(criteria)?;
    let mut sql = format!("SELECT {} FROM {}", select_list, db_table);
    if !criteria.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(criteria, " AND ", " LIKE "));
    }
    if let Some(order_by) = order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    Ok(sql)
}

pub(crate) fn select_or(
    db_table: &str,
    select_list: &str,
    order_by: Option<&str>,
    criteria: &[(&str, Value)],
) -> Result<String> {
    validate_fields(criteria)?;
    let mut sql = format!("SELECT {} FROM {}", select_list, db_table);
    if !criteria.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(criteria, " OR ", "="));
    }
    if let Some(order_by) = order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    Ok(sql)
}

pub(crate) fn insert(db_table: &str, fields: &[(&str, Value)]) -> Result<String> {
    if fields.is_empty() {
        return Err(Error::InvalidArgument("insert requires at least one field".into()));
    }
    validate_fields(fields)?;

    let names: Vec<&str> = fields.iter().map(|(f, _)| *f).collect();
    let values: Vec<String> = fields.iter().map(|(_, v)| render_value(v)).collect();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        db_table,
        names.join(","),
        values.join(",")
    ))
}

pub(crate) fn update(db_table: &str, set: &[(&str, Value)], criteria: &[(&str, Value)]) -> Result<String> {
    if set.is_empty() {
        return Err(Error::InvalidArgument("update requires at least one field".into()));
    }
    validate_fields(set)?;
    validate_fields(criteria)?;

    let mut sql = format!("UPDATE {} SET {}", db_table, where_clause(set, ",", "="));
    if !criteria.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(criteria, " AND ", "="));
    }
    Ok(sql)
}

pub(crate) fn delete(db_table: &str, criteria: &[(&str, Value)]) -> Result<String> {
    validate_fields(criteria)?;
    let mut sql = format!("DELETE FROM {}", db_table);
    if !criteria.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(criteria, " AND ", "="));
    }
    Ok(sql)
}

pub(crate) fn delete_like(db_table: &str, criteria: &[(&str, Value)]) -> Result<String> {
    validate_fields(criteria)?;
    let mut sql = format!("DELETE FROM {}", db_table);
    if !criteria.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(criteria, " AND ", " LIKE "));
    }
    Ok(sql)
}

pub(crate) fn add_table(
    db_table: &str,
    primary_key: &str,
    fields: &[(&str, &str)],
) -> Result<String> {
    validate_field_name(primary_key)?;
    for (field, _) in fields {
        validate_field_name(field)?;
    }

    let columns: Vec<String> = fields
        .iter()
        .map(|(name, sql_type)| {
            if *name == primary_key {
                format!("{} {} PRIMARY KEY", name, sql_type)
            } else {
                format!("{} {}", name, sql_type)
            }
        })
        .collect();

    Ok(format!("CREATE TABLE {} ({})", db_table, columns.join(",")))
}

pub(crate) fn delete_table(db_table: &str) -> String {
    format!("DROP TABLE {}", db_table)
}

pub(crate) fn rename_table(db_table: &str, new_name: &str) -> Result<String> {
    validate_field_name(new_name)?;
    Ok(format!("RENAME TABLE {} TO {}", db_table, new_name))
}

pub(crate) fn describe_table(db_table: &str) -> String {
    format!("DESCRIBE {}", db_table)
}

pub(crate) fn add_field(db_table: &str, field: &str, sql_type: &str) -> Result<String> {
    validate_field_name(field)?;
    Ok(format!("ALTER TABLE {} ADD COLUMN {} {}", db_table, field, sql_type))
}

pub(crate) fn delete_field(db_table: &str, field: &str) -> Result<String> {
    validate_field_name(field)?;
    Ok(format!("ALTER TABLE {} DROP COLUMN {}", db_table, field))
}

pub(crate) fn change_field_type(db_table: &str, field: &str, sql_type: &str) -> Result<String> {
    validate_field_name(field)?;
    Ok(format!("ALTER TABLE {} MODIFY COLUMN {} {}", db_table, field, sql_type))
}

pub(crate) fn change_field_name(db_table: &str, field: &str, new_name: &str) -> Result<String> {
    validate_field_name(field)?;
    validate_field_name(new_name)?;
    Ok(format!("ALTER TABLE {} RENAME COLUMN {} TO {}", db_table, field, new_name))
}

pub(crate) fn add_database(db_name: &str) -> String {
    format!("CREATE DATABASE {}", db_name)
}

pub(crate) fn delete_database(db_name: &str) -> String {
    format!("DROP DATABASE {}", db_name)
}

pub(crate) fn get_database_names() -> &'static str {
    "SHOW DATABASES"
}

pub(crate) fn get_table_names(db_name: &str) -> String {
    format!("SHOW TABLES FROM {}", db_name)
}

pub(crate) fn get_num_records(db_table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", db_table)
}

pub(crate) fn get_size(db_name: &str, table_name: Option<&str>) -> String {
    match table_name {
        Some(table) => format!(
            "SELECT data_length + index_length FROM information_schema.tables \
             WHERE table_schema='{}' AND table_name='{}'",
            db_name, table
        ),
        None => format!(
            "SELECT SUM(data_length + index_length) FROM information_schema.tables \
             WHERE table_schema='{}'",
            db_name
        ),
    }
}

pub(crate) fn ensure_field_indexed(db_table: &str, field: &str, index_name: &str) -> Result<String> {
    validate_field_name(field)?;
    Ok(format!("CREATE INDEX {} ON {} ({})", index_name, db_table, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_equality_shape() {
        let sql = select("db.t", "*", None, &[("pk", Value::I64(42))]).unwrap();
        assert_eq!(sql, "SELECT * FROM db.t WHERE pk=42");
    }

    #[test]
    fn select_like_shape() {
        let sql = select_like("db.t", "name", None, &[("name", Value::Str("alpha%".into()))]).unwrap();
        assert_eq!(sql, "SELECT name FROM db.t WHERE name LIKE 'alpha%'");
    }

    #[test]
    fn insert_shape() {
        let sql = insert(
            "db.t",
            &[("pk", Value::I64(42)), ("name", Value::Str("hello".into())), ("v", Value::I64(7))],
        )
        .unwrap();
        assert_eq!(sql, "INSERT INTO db.t (pk,name,v) VALUES (42,'hello',7)");
    }

    #[test]
    fn rejects_invalid_field_names() {
        let err = select("db.t", "*", None, &[("1bad", Value::I64(1))]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn update_shape_with_where() {
        let sql = update("db.t", &[("v", Value::I64(9))], &[("pk", Value::I64(42))]).unwrap();
        assert_eq!(sql, "UPDATE db.t SET v=9 WHERE pk=42");
    }
}
