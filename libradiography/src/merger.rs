use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::accumulator::Accumulator;
use super::container::{ContainerReader, ContainerWriter, CONTAINER_EXTENSION};
use super::error::MergerError;
use super::merge_status::{MergePhase, MergeStatus};

/// Files starting with this marker are outputs of earlier merges and are never merged again
pub const MERGE_MARKER: &str = "merge";

/// Decide whether a directory entry is an input of the merge.
///
/// An empty `prefix_filter` matches nothing.
pub fn is_merge_input(file_name: &str, prefix_filter: &str, output_name: &str) -> bool {
    file_name.ends_with(&format!(".{CONTAINER_EXTENSION}"))
        && !file_name.starts_with(MERGE_MARKER)
        && !file_name.starts_with(output_name)
        && !prefix_filter.is_empty()
        && file_name.starts_with(prefix_filter)
}

/// Get all of the input files in a directory, sorted by name
pub fn discover_inputs(
    directory: &Path,
    prefix_filter: &str,
    output_name: &str,
) -> Result<Vec<PathBuf>, MergerError> {
    if !directory.is_dir() {
        return Err(MergerError::BadDirectory(directory.to_path_buf()));
    }
    let mut file_list: Vec<PathBuf> = Vec::new();
    for item in directory.read_dir()? {
        let item = item?;
        let file_name = item.file_name();
        let Some(file_name) = file_name.to_str() else {
            log::warn!("Skipping non UTF-8 file name {:?}", item.file_name());
            continue;
        };
        if is_merge_input(file_name, prefix_filter, output_name) {
            file_list.push(item.path());
        }
    }
    // Directory order is platform defined; sorting makes concatenation order reproducible
    file_list.sort();
    Ok(file_list)
}

/// First `{output_name}{n}.h5` in the directory that does not exist yet, counting from 0
pub fn next_output_path(directory: &Path, output_name: &str) -> PathBuf {
    let mut counter: u64 = 0;
    loop {
        let candidate = directory.join(format!("{output_name}{counter}.{CONTAINER_EXTENSION}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// What a finished merge produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub output_path: PathBuf,
    pub files_read: usize,
    pub tables_written: usize,
}

/// Merger combines same-named tables across a set of container files.
///
/// The inputs and the output path are fixed when the Merger is created;
/// nothing is read or written until [`Merger::run`] is called.
#[derive(Debug)]
pub struct Merger {
    file_stack: Vec<PathBuf>,
    output_path: PathBuf,
    total_data_size_bytes: u64,
}

impl Merger {
    /// Scan `directory` for inputs and pick the output name.
    pub fn new(
        directory: &Path,
        prefix_filter: &str,
        output_name: &str,
    ) -> Result<Self, MergerError> {
        let file_stack = discover_inputs(directory, prefix_filter, output_name)?;
        let mut total_data_size_bytes = 0;
        for path in file_stack.iter() {
            total_data_size_bytes += path.metadata()?.len();
        }
        if file_stack.is_empty() {
            log::warn!(
                "No files in {} matched the prefix '{prefix_filter}'; the output will hold no tables",
                directory.display()
            );
        }
        Ok(Self {
            file_stack,
            output_path: next_output_path(directory, output_name),
            total_data_size_bytes,
        })
    }

    pub fn get_file_stack(&self) -> &[PathBuf] {
        &self.file_stack
    }

    pub fn get_output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn get_total_data_size(&self) -> u64 {
        self.total_data_size_bytes
    }

    /// Merge the inputs and write the output file
    pub fn run(self) -> Result<MergeSummary, MergerError> {
        self.merge(None)
    }

    /// Same as [`Merger::run`], reporting progress of each phase on `tx`
    pub fn run_with_status(self, tx: &Sender<MergeStatus>) -> Result<MergeSummary, MergerError> {
        self.merge(Some(tx))
    }

    fn merge(self, tx: Option<&Sender<MergeStatus>>) -> Result<MergeSummary, MergerError> {
        let n_files = self.file_stack.len();
        let mut accumulator = Accumulator::new();

        log::info!("Reading {n_files} files...");
        send(tx, MergeStatus::fraction(0, n_files, MergePhase::Reading));
        for (idx, path) in self.file_stack.iter().enumerate() {
            read_into(path, &mut accumulator)?;
            send(tx, MergeStatus::fraction(idx + 1, n_files, MergePhase::Reading));
        }

        let n_tables = accumulator.len();
        log::info!(
            "Writing {n_tables} tables to {}...",
            self.output_path.display()
        );
        if let Err(e) = write_output(&self.output_path, &accumulator, tx) {
            // Never leave a partial output behind
            if self.output_path.exists() {
                if let Err(io) = std::fs::remove_file(&self.output_path) {
                    log::warn!(
                        "Could not remove partial output {}: {io}",
                        self.output_path.display()
                    );
                }
            }
            return Err(e);
        }

        Ok(MergeSummary {
            output_path: self.output_path,
            files_read: n_files,
            tables_written: n_tables,
        })
    }
}

/// Read every table of one file into the accumulator. The file is closed on return.
fn read_into(path: &Path, accumulator: &mut Accumulator) -> Result<(), MergerError> {
    let reader = ContainerReader::open(path)?;
    for entry in reader.entries()? {
        if !entry.is_table() {
            log::debug!("Skipping {} in {}: not a table", entry.name, path.display());
            continue;
        }
        let table = reader.read_table(&entry.name)?;
        accumulator
            .absorb(&entry.name, table)
            .map_err(|source| MergerError::TableError {
                path: path.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

fn write_output(
    path: &Path,
    accumulator: &Accumulator,
    tx: Option<&Sender<MergeStatus>>,
) -> Result<(), MergerError> {
    let n_tables = accumulator.len();
    let writer = ContainerWriter::create(path)?;
    send(tx, MergeStatus::fraction(0, n_tables, MergePhase::Writing));
    for (idx, (name, table)) in accumulator.iter().enumerate() {
        writer.write_table(name, table)?;
        send(tx, MergeStatus::fraction(idx + 1, n_tables, MergePhase::Writing));
    }
    writer.close()?;
    Ok(())
}

/// Progress is advisory: a closed receiver does not stop the merge
fn send(tx: Option<&Sender<MergeStatus>>, status: MergeStatus) {
    if let Some(tx) = tx {
        if tx.send(status).is_err() {
            log::debug!("Merge status receiver is gone; dropping progress update");
        }
    }
}

/// Merge every matching file of `directory` into `{output_name}{n}.h5` in the same directory
pub fn merge(
    directory: &Path,
    prefix_filter: &str,
    output_name: &str,
) -> Result<MergeSummary, MergerError> {
    Merger::new(directory, prefix_filter, output_name)?.run()
}
