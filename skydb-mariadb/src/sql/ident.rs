//! Identifier validation and the multi-tenant instance-suffix convention.

use skydb_core::{Error, Result};

/// Non-empty, letters/digits/underscore only, not digit-first.
pub(crate) fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn validate_field_name(name: &str) -> Result<()> {
    if is_valid_field_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("invalid field name: {:?}", name)))
    }
}

/// Appends the instance suffix to a database name for multi-tenant isolation.
pub(crate) fn qualified_database_name(db_name: &str, instance_suffix: &str) -> String {
    format!("{}{}", db_name, instance_suffix)
}

pub(crate) fn qualified_table_name(db_name: &str, instance_suffix: &str, table_name: &str) -> String {
    format!("{}.{}", qualified_database_name(db_name, instance_suffix), table_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_digit_first_names() {
        assert!(!is_valid_field_name("1abc"));
    }

    #[test]
    fn rejects_empty_and_punctuated_names() {
        assert!(!is_valid_field_name(""));
        assert!(!is_valid_field_name("a-b"));
        assert!(!is_valid_field_name("a.b"));
    }

    #[test]
    fn accepts_letters_digits_and_underscore() {
        assert!(is_valid_field_name("field_1"));
        assert!(is_valid_field_name("_private"));
    }

    #[test]
    fn appends_instance_suffix_to_database_name() {
        assert_eq!(qualified_database_name("orders", "_tenant1"), "orders_tenant1");
        assert_eq!(qualified_database_name("orders", ""), "orders");
    }
}
