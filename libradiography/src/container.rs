use hdf5::types::{
    FixedAscii, FixedUnicode, FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode,
};
use hdf5::{File, Group, H5Type, Location, LocationType};
use std::path::{Path, PathBuf};

use super::error::ContainerError;
use super::table::{base_name, cycle_number, Column, Table};

/// Extension of every container file, input or output
pub const CONTAINER_EXTENSION: &str = "h5";
/// Attribute marking a top-level group as a table
pub const TABLE_CLASS_ATTR: &str = "class";
pub const TABLE_CLASS: &str = "table";
/// Attribute holding the write position of a table or column
pub const ORDER_ATTR: &str = "order";
/// Longest fixed-length string attribute that is read in full
const MAX_FIXED_STRING: usize = 64;
/// This is the version of the output format
const FORMAT_VERSION: &str = "1.0";

/// What kind of object a top-level entry of a container is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Table,
    Group,
    Dataset,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
}

impl Entry {
    pub fn is_table(&self) -> bool {
        self.kind == EntryKind::Table
    }
}

// Structure
// / - version
// |---- <table name> - class = "table", order
// |    |---- <column>(1-D dset) - order
// |    |---- <column>(1-D dset) - order
// |---- <anything else is not a table>

/// Read-only handle on a container file.
///
/// The underlying HDF5 file is closed when the reader is dropped.
#[derive(Debug)]
pub struct ContainerReader {
    file: File,
    path: PathBuf,
}

impl ContainerReader {
    pub fn open(path: &Path) -> Result<Self, ContainerError> {
        if !path.exists() {
            return Err(ContainerError::BadFilePath(path.to_path_buf()));
        }
        Ok(Self {
            file: File::open(path)?,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List every top-level entry in write order, classifying tables
    pub fn entries(&self) -> Result<Vec<Entry>, ContainerError> {
        let mut entries = Vec::new();
        for name in ordered_members(&self.file)? {
            let kind = match self.file.loc_type_by_name(&name)? {
                LocationType::Group => {
                    if is_table(&self.file.group(&name)?)? {
                        EntryKind::Table
                    } else {
                        EntryKind::Group
                    }
                }
                LocationType::Dataset => EntryKind::Dataset,
                _ => EntryKind::Other,
            };
            entries.push(Entry { name, kind });
        }
        Ok(entries)
    }

    /// Resolve a table by exact entry name, or by base name (highest cycle wins)
    pub fn find_table(&self, name: &str) -> Result<String, ContainerError> {
        let tables: Vec<Entry> = self
            .entries()?
            .into_iter()
            .filter(|entry| entry.is_table())
            .collect();
        if tables.iter().any(|entry| entry.name == name) {
            return Ok(name.to_string());
        }
        tables
            .into_iter()
            .filter(|entry| base_name(&entry.name) == name)
            .max_by_key(|entry| cycle_number(&entry.name).unwrap_or(0))
            .map(|entry| entry.name)
            .ok_or_else(|| ContainerError::NoSuchTable(name.to_string()))
    }

    /// Load every column of a table into memory, in write order
    pub fn read_table(&self, name: &str) -> Result<Table, ContainerError> {
        let group = self.file.group(name)?;
        if !is_table(&group)? {
            return Err(ContainerError::NoSuchTable(name.to_string()));
        }
        let mut table = Table::new();
        for column_name in ordered_members(&group)? {
            if !matches!(group.loc_type_by_name(&column_name)?, LocationType::Dataset) {
                log::warn!(
                    "Skipping {column_name} in table {name} of {}: not a dataset",
                    self.path.display()
                );
                continue;
            }
            let column = read_column(&group, name, &column_name)?;
            table.insert(&column_name, column);
        }
        Ok(table)
    }
}

fn has_attr(loc: &Location, name: &str) -> Result<bool, ContainerError> {
    Ok(loc.attr_names()?.iter().any(|n| n == name))
}

fn is_table(group: &Group) -> Result<bool, ContainerError> {
    if !has_attr(group, TABLE_CLASS_ATTR)? {
        return Ok(false);
    }
    Ok(read_string_attr(group, TABLE_CLASS_ATTR)? == TABLE_CLASS)
}

/// Read a scalar string attribute stored with any of the HDF5 string types.
///
/// Trailing NUL and space padding of fixed-length strings is removed.
fn read_string_attr(loc: &Location, name: &str) -> Result<String, ContainerError> {
    let attr = loc.attr(name)?;
    let value = match attr.dtype()?.to_descriptor()? {
        TypeDescriptor::VarLenUnicode => attr.read_scalar::<VarLenUnicode>()?.as_str().to_string(),
        TypeDescriptor::VarLenAscii => attr.read_scalar::<VarLenAscii>()?.as_str().to_string(),
        TypeDescriptor::FixedUnicode(_) => attr
            .read_scalar::<FixedUnicode<MAX_FIXED_STRING>>()?
            .as_str()
            .to_string(),
        TypeDescriptor::FixedAscii(_) => attr
            .read_scalar::<FixedAscii<MAX_FIXED_STRING>>()?
            .as_str()
            .to_string(),
        other => {
            return Err(ContainerError::BadAttribute {
                name: name.to_string(),
                kind: format!("{other:?}"),
            })
        }
    };
    Ok(value.trim_end_matches(['\0', ' ']).to_string())
}

/// Position written by [`ContainerWriter`], if the object carries one
fn written_order(group: &Group, name: &str) -> Result<Option<u64>, ContainerError> {
    let order = match group.loc_type_by_name(name)? {
        LocationType::Group => read_order_attr(&group.group(name)?)?,
        LocationType::Dataset => read_order_attr(&group.dataset(name)?)?,
        _ => None,
    };
    Ok(order)
}

fn read_order_attr(loc: &Location) -> Result<Option<u64>, ContainerError> {
    if !has_attr(loc, ORDER_ATTR)? {
        return Ok(None);
    }
    Ok(Some(loc.attr(ORDER_ATTR)?.read_scalar::<u64>()?))
}

fn name_key(name: &str) -> (&str, Option<u32>, &str) {
    (base_name(name), cycle_number(name), name)
}

/// Members of a group in the order they were written.
///
/// Uses link creation order when the file tracks it, otherwise the `order`
/// attribute written by [`ContainerWriter`]. Files with neither fall back to name
/// order, comparing cycle numbers numerically so `T;2` comes before `T;10`.
fn ordered_members(group: &Group) -> Result<Vec<String>, ContainerError> {
    let mut links: Vec<(String, Option<i64>)> =
        group.iter_visit_default(Vec::new(), |_, name, info, links| {
            links.push((name.to_string(), info.creation_order));
            true
        })?;
    if links.iter().all(|(_, created)| created.is_some()) {
        links.sort_by_key(|(_, created)| *created);
        return Ok(links.into_iter().map(|(name, _)| name).collect());
    }

    let mut members = Vec::with_capacity(links.len());
    for (name, _) in links {
        let order = written_order(group, &name)?;
        members.push((name, order));
    }
    if members.iter().all(|(_, order)| order.is_some()) {
        members.sort_by_key(|(_, order)| *order);
    } else {
        members.sort_by(|(a, _), (b, _)| name_key(a).cmp(&name_key(b)));
    }
    Ok(members.into_iter().map(|(name, _)| name).collect())
}

fn read_column(group: &Group, table: &str, name: &str) -> Result<Column, ContainerError> {
    let dset = group.dataset(name)?;
    if dset.ndim() != 1 {
        return Err(ContainerError::BadColumnRank {
            table: table.to_string(),
            column: name.to_string(),
            rank: dset.ndim(),
        });
    }
    let column = match dset.dtype()?.to_descriptor()? {
        TypeDescriptor::Float(FloatSize::U4) => Column::F32(dset.read_raw()?),
        TypeDescriptor::Float(FloatSize::U8) => Column::F64(dset.read_raw()?),
        TypeDescriptor::Integer(IntSize::U4) => Column::I32(dset.read_raw()?),
        TypeDescriptor::Integer(IntSize::U8) => Column::I64(dset.read_raw()?),
        TypeDescriptor::Unsigned(IntSize::U4) => Column::U32(dset.read_raw()?),
        TypeDescriptor::Unsigned(IntSize::U8) => Column::U64(dset.read_raw()?),
        other => {
            return Err(ContainerError::UnsupportedColumnType {
                table: table.to_string(),
                column: name.to_string(),
                kind: format!("{other:?}"),
            })
        }
    };
    Ok(column)
}

/// A simple struct which wraps around the hdf5-rust library.
///
/// Creates (or truncates) a container file and writes tables into it.
#[derive(Debug)]
pub struct ContainerWriter {
    file: File,
    path: PathBuf,
}

impl ContainerWriter {
    /// Create the writer, truncating any file at path
    pub fn create(path: &Path) -> Result<Self, ContainerError> {
        let file = File::create(path)?;
        let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);
        write_string_attr(&file, "version", &version)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a table as a group of 1-D column datasets.
    ///
    /// Tables and columns are tagged with their write position so readers list
    /// them in the same order.
    pub fn write_table(&self, name: &str, table: &Table) -> Result<(), ContainerError> {
        let order = self.file.member_names()?.len() as u64;
        let group = self.file.create_group(name)?;
        write_string_attr(&group, TABLE_CLASS_ATTR, TABLE_CLASS)?;
        write_order_attr(&group, order)?;
        for (idx, (column_name, column)) in table.columns().enumerate() {
            let idx = idx as u64;
            match column {
                Column::F32(v) => write_column(&group, column_name, v, idx)?,
                Column::F64(v) => write_column(&group, column_name, v, idx)?,
                Column::I32(v) => write_column(&group, column_name, v, idx)?,
                Column::I64(v) => write_column(&group, column_name, v, idx)?,
                Column::U32(v) => write_column(&group, column_name, v, idx)?,
                Column::U64(v) => write_column(&group, column_name, v, idx)?,
            }
        }
        Ok(())
    }

    /// Flush and close the file
    pub fn close(self) -> Result<(), ContainerError> {
        self.file.flush()?;
        Ok(())
    }
}

fn write_column<T: H5Type>(
    group: &Group,
    name: &str,
    values: &[T],
    order: u64,
) -> Result<(), ContainerError> {
    let dset = group
        .new_dataset_builder()
        .with_data(values)
        .create(name)?;
    write_order_attr(&dset, order)
}

fn write_order_attr(loc: &Location, order: u64) -> Result<(), ContainerError> {
    loc.new_attr::<u64>().create(ORDER_ATTR)?.write_scalar(&order)?;
    Ok(())
}

fn write_string_attr(loc: &Location, name: &str, value: &str) -> Result<(), ContainerError> {
    let value: VarLenUnicode = value
        .parse()
        .map_err(|e: hdf5::types::StringError| ContainerError::BadString(e.to_string()))?;
    loc.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_list_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim_t0.h5");

        let mut hits = Table::new();
        hits.insert("event", Column::I32(vec![0, 0, 1]));
        hits.insert("x_ax", Column::F64(vec![0.5, -1.25, 3.0]));
        let writer = ContainerWriter::create(&path).unwrap();
        writer.write_table("hits;1", &hits).unwrap();
        // Not a table: no class attribute
        writer.file.create_group("run_info").unwrap();
        writer
            .file
            .new_dataset_builder()
            .with_data(&[1.0f64, 2.0])
            .create("loose")
            .unwrap();
        writer.close().unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        let mut entries = reader.entries().unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let kinds: Vec<(&str, EntryKind)> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.kind))
            .collect();
        assert_eq!(
            kinds,
            [
                ("hits;1", EntryKind::Table),
                ("loose", EntryKind::Dataset),
                ("run_info", EntryKind::Group),
            ]
        );

        let table = reader.read_table("hits;1").unwrap();
        assert_eq!(table, hits);
        let names: Vec<&String> = table.column_names().collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn find_table_prefers_highest_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycles.h5");
        let mut table = Table::new();
        table.insert("c", Column::F32(vec![1.0]));
        let writer = ContainerWriter::create(&path).unwrap();
        writer.write_table("hits;1", &table).unwrap();
        writer.write_table("hits;3", &table).unwrap();
        writer.write_table("detector", &table).unwrap();
        writer.close().unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        assert_eq!(reader.find_table("hits").unwrap(), "hits;3");
        assert_eq!(reader.find_table("hits;1").unwrap(), "hits;1");
        assert_eq!(reader.find_table("detector").unwrap(), "detector");
        assert!(matches!(
            reader.find_table("missing"),
            Err(ContainerError::NoSuchTable(_))
        ));
    }

    #[test]
    fn fixed_ascii_class_marks_a_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("external.h5");
        {
            let file = File::create(&path).unwrap();
            let group = file.create_group("hits").unwrap();
            let class = FixedAscii::<5>::from_ascii(b"table").unwrap();
            group
                .new_attr::<FixedAscii<5>>()
                .create(TABLE_CLASS_ATTR)
                .unwrap()
                .write_scalar(&class)
                .unwrap();
            group
                .new_dataset_builder()
                .with_data(&[1.5f64, 2.5])
                .create("energy")
                .unwrap();
        }

        let reader = ContainerReader::open(&path).unwrap();
        let entries = reader.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Table);
        assert_eq!(
            reader.read_table("hits").unwrap().column("energy"),
            Some(&Column::F64(vec![1.5, 2.5]))
        );
    }

    #[test]
    fn non_string_class_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.h5");
        {
            let file = File::create(&path).unwrap();
            let group = file.create_group("hits").unwrap();
            group
                .new_attr::<u8>()
                .create(TABLE_CLASS_ATTR)
                .unwrap()
                .write_scalar(&1u8)
                .unwrap();
        }

        let reader = ContainerReader::open(&path).unwrap();
        assert!(matches!(
            reader.entries(),
            Err(ContainerError::BadAttribute { .. })
        ));
    }

    #[test]
    fn tables_and_columns_keep_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ordered.h5");
        let mut table = Table::new();
        table.insert("z_ax", Column::F64(vec![1.0]));
        table.insert("energy", Column::F64(vec![2.0]));
        table.insert("a_ax", Column::F64(vec![3.0]));
        let writer = ContainerWriter::create(&path).unwrap();
        writer.write_table("photons", &table).unwrap();
        writer.write_table("detector", &table).unwrap();
        writer.write_table("beam", &table).unwrap();
        writer.close().unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        let names: Vec<String> = reader
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["photons", "detector", "beam"]);
        let columns: Vec<String> = reader
            .read_table("detector")
            .unwrap()
            .column_names()
            .cloned()
            .collect();
        assert_eq!(columns, ["z_ax", "energy", "a_ax"]);
    }

    #[test]
    fn untagged_cycles_sort_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycles.h5");
        {
            let file = File::create(&path).unwrap();
            for name in ["T;10", "T;2", "S;1"] {
                let group = file.create_group(name).unwrap();
                write_string_attr(&group, TABLE_CLASS_ATTR, TABLE_CLASS).unwrap();
            }
        }

        let reader = ContainerReader::open(&path).unwrap();
        let names: Vec<String> = reader
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["S;1", "T;2", "T;10"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ContainerReader::open(&dir.path().join("nope.h5"));
        assert!(matches!(result, Err(ContainerError::BadFilePath(_))));
    }
}
