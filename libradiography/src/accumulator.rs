use indexmap::IndexMap;

use super::error::TableError;
use super::table::{base_name, Table};

/// In-progress merged tables, keyed by base name.
///
/// Iteration order is the order in which each base name was first seen.
#[derive(Debug, Default)]
pub struct Accumulator {
    tables: IndexMap<String, Table>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table read under `entry_name` (cycle marker allowed)
    pub fn absorb(&mut self, entry_name: &str, table: Table) -> Result<(), TableError> {
        let base = base_name(entry_name);
        match self.tables.get_mut(base) {
            Some(existing) => existing.absorb(table)?,
            None => {
                self.tables.insert(base.to_string(), table);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, base: &str) -> Option<&Table> {
        self.tables.get(base)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Table)> {
        self.tables.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn single(name: &str, values: Vec<i64>) -> Table {
        let mut table = Table::new();
        table.insert(name, Column::I64(values));
        table
    }

    #[test]
    fn cycles_collapse_to_base_name() {
        let mut acc = Accumulator::new();
        acc.absorb("T;1", single("c", vec![1])).unwrap();
        acc.absorb("T;2", single("c", vec![2])).unwrap();
        assert_eq!(acc.len(), 1);
        assert_eq!(
            acc.get("T").unwrap().column("c"),
            Some(&Column::I64(vec![1, 2]))
        );
    }

    #[test]
    fn keeps_first_seen_order() {
        let mut acc = Accumulator::new();
        acc.absorb("photons;1", single("x", vec![1])).unwrap();
        acc.absorb("detector;1", single("x", vec![1])).unwrap();
        acc.absorb("photons;1", single("x", vec![2])).unwrap();
        let names: Vec<&String> = acc.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["photons", "detector"]);
    }
}
