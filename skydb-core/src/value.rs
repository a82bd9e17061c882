//! The typed value model shared by column decoding and the result table.

/// Identifies the semantic type of a column or cell.
///
/// The scalar, string, and byte-string variants are the ones the MariaDB
/// backend actually materializes off the wire (see the column-type mapping
/// in the wire codec). The container variants (`List`, `Queue`, `Stack`,
/// `Tree`, `HashTable`, `Vector`, `Opaque`) exist for API parity with the
/// original generic type-descriptor catalog and are never produced by this
/// backend; a future non-SQL backend could use them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Boolean,
    I8,
    I16,
    I24,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    String,
    Bytes,
    List,
    Queue,
    Stack,
    Tree,
    HashTable,
    Vector,
    Opaque,
}

impl TypeDescriptor {
    /// `true` for the two variants that must never carry a null cell in a
    /// constructed `DbResult` row (empty values are substituted instead).
    pub fn forbids_null(&self) -> bool {
        matches!(self, TypeDescriptor::String | TypeDescriptor::Bytes)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeDescriptor::Boolean => "boolean",
            TypeDescriptor::I8 => "i8",
            TypeDescriptor::I16 => "i16",
            TypeDescriptor::I24 => "i24",
            TypeDescriptor::I32 => "i32",
            TypeDescriptor::I64 => "i64",
            TypeDescriptor::I128 => "i128",
            TypeDescriptor::U8 => "u8",
            TypeDescriptor::U16 => "u16",
            TypeDescriptor::U32 => "u32",
            TypeDescriptor::U64 => "u64",
            TypeDescriptor::U128 => "u128",
            TypeDescriptor::F32 => "f32",
            TypeDescriptor::F64 => "f64",
            TypeDescriptor::String => "string",
            TypeDescriptor::Bytes => "bytes",
            TypeDescriptor::List => "list",
            TypeDescriptor::Queue => "queue",
            TypeDescriptor::Stack => "stack",
            TypeDescriptor::Tree => "tree",
            TypeDescriptor::HashTable => "hash_table",
            TypeDescriptor::Vector => "vector",
            TypeDescriptor::Opaque => "opaque",
        }
    }
}

/// A single typed cell. `Null` is distinct from `Bytes(vec![])`/`Str(String::new())`
/// except where `TypeDescriptor::forbids_null` requires the empty substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn type_descriptor(&self) -> Option<TypeDescriptor> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(_) => TypeDescriptor::Boolean,
            Value::I8(_) => TypeDescriptor::I8,
            Value::I16(_) => TypeDescriptor::I16,
            Value::I32(_) => TypeDescriptor::I32,
            Value::I64(_) => TypeDescriptor::I64,
            Value::I128(_) => TypeDescriptor::I128,
            Value::U8(_) => TypeDescriptor::U8,
            Value::U16(_) => TypeDescriptor::U16,
            Value::U32(_) => TypeDescriptor::U32,
            Value::U64(_) => TypeDescriptor::U64,
            Value::U128(_) => TypeDescriptor::U128,
            Value::F32(_) => TypeDescriptor::F32,
            Value::F64(_) => TypeDescriptor::F64,
            Value::Str(_) => TypeDescriptor::String,
            Value::Bytes(_) => TypeDescriptor::Bytes,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Matches a cell against a value the same way `compare`/`lookup_index` do:
    /// type must match, and `Null` is ordered before any non-null value.
    pub fn cmp_typed(&self, other: &Value) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::I8(a), Value::I8(b)) => a.cmp(b),
            (Value::I16(a), Value::I16(b)) => a.cmp(b),
            (Value::I32(a), Value::I32(b)) => a.cmp(b),
            (Value::I64(a), Value::I64(b)) => a.cmp(b),
            (Value::I128(a), Value::I128(b)) => a.cmp(b),
            (Value::U8(a), Value::U8(b)) => a.cmp(b),
            (Value::U16(a), Value::U16(b)) => a.cmp(b),
            (Value::U32(a), Value::U32(b)) => a.cmp(b),
            (Value::U64(a), Value::U64(b)) => a.cmp(b),
            (Value::U128(a), Value::U128(b)) => a.cmp(b),
            (Value::F32(a), Value::F32(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::F64(a), Value::F64(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
