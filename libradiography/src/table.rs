use indexmap::IndexMap;

use super::error::TableError;

/// Separator between an entry name and its cycle number, e.g. `hits;2`
pub const CYCLE_SEPARATOR: char = ';';

/// Strip any cycle marker from an entry name.
///
/// Truncates at the first separator, so `hits;2` and `hits;1` both become `hits`.
pub fn base_name(entry_name: &str) -> &str {
    match entry_name.split_once(CYCLE_SEPARATOR) {
        Some((base, _)) => base,
        None => entry_name,
    }
}

/// The cycle number of an entry name, if it carries a valid one
pub fn cycle_number(entry_name: &str) -> Option<u32> {
    entry_name
        .rsplit_once(CYCLE_SEPARATOR)
        .and_then(|(_, cycle)| cycle.parse::<u32>().ok())
}

/// A single homogeneous column of numeric values.
///
/// The simulation writes event ids as integers and positions/energies as
/// doubles, so a column keeps the element type it was stored with.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the element type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
        }
    }

    /// Append `other` after the values already held (existing first, then new).
    pub fn extend_from(&mut self, name: &str, other: Column) -> Result<(), TableError> {
        match (self, other) {
            (Self::F32(a), Self::F32(b)) => a.extend(b),
            (Self::F64(a), Self::F64(b)) => a.extend(b),
            (Self::I32(a), Self::I32(b)) => a.extend(b),
            (Self::I64(a), Self::I64(b)) => a.extend(b),
            (Self::U32(a), Self::U32(b)) => a.extend(b),
            (Self::U64(a), Self::U64(b)) => a.extend(b),
            (existing, incoming) => {
                return Err(TableError::SchemaConflict {
                    name: name.to_string(),
                    existing: existing.type_name(),
                    incoming: incoming.type_name(),
                })
            }
        }
        Ok(())
    }

    /// Widen every value to f64
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::F32(v) => v.iter().map(|x| *x as f64).collect(),
            Self::F64(v) => v.clone(),
            Self::I32(v) => v.iter().map(|x| *x as f64).collect(),
            Self::I64(v) => v.iter().map(|x| *x as f64).collect(),
            Self::U32(v) => v.iter().map(|x| *x as f64).collect(),
            Self::U64(v) => v.iter().map(|x| *x as f64).collect(),
        }
    }
}

/// A table: named columns in the order they were stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: IndexMap<String, Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, column: Column) {
        self.columns.insert(name.to_string(), column);
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Column)> {
        self.columns.iter()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &String> {
        self.columns.keys()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Fold a later table with the same base name into this one.
    ///
    /// Columns present in both are concatenated, existing values first.
    /// Columns only present in `other` are inserted as they are, and columns
    /// only present in `self` are left alone.
    pub fn absorb(&mut self, other: Table) -> Result<(), TableError> {
        for (name, incoming) in other.columns {
            match self.columns.get_mut(&name) {
                Some(existing) => existing.extend_from(&name, incoming)?,
                None => {
                    self.columns.insert(name, incoming);
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, Column)> for Table {
    fn from_iter<I: IntoIterator<Item = (String, Column)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}
