use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TableError {
    #[error("Column {name} has element type {existing} but the incoming data has element type {incoming}; they cannot be concatenated")]
    SchemaConflict {
        name: String,
        existing: &'static str,
        incoming: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Container failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Could not open container because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Column {column} of table {table} has an unsupported element type: {kind}")]
    UnsupportedColumnType {
        table: String,
        column: String,
        kind: String,
    },
    #[error("Column {column} of table {table} is not one dimensional (rank {rank})")]
    BadColumnRank {
        table: String,
        column: String,
        rank: usize,
    },
    #[error("Container does not hold a table named {0}")]
    NoSuchTable(String),
    #[error("Attribute {name} is not a string attribute (found {kind})")]
    BadAttribute { name: String, kind: String },
    #[error("Container could not encode string attribute: {0}")]
    BadString(String),
}

#[derive(Debug, Error)]
pub enum MergerError {
    #[error("Merger failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Merger could not read the directory {0:?}")]
    BadDirectory(PathBuf),
    #[error("Merger failed due to container error: {0}")]
    ContainerError(#[from] ContainerError),
    #[error("Merger failed to combine tables from {path:?}: {source}")]
    TableError {
        path: PathBuf,
        #[source]
        source: TableError,
    },
}

#[derive(Debug, Error)]
pub enum BranchError {
    #[error("Branch extraction failed due to container error: {0}")]
    ContainerError(#[from] ContainerError),
    #[error("Table {table} has no branch named {branch}")]
    NoSuchBranch { table: String, branch: String },
    #[error("Branches {x} and {y} have different lengths ({x_len} and {y_len})")]
    MismatchedLengths {
        x: String,
        y: String,
        x_len: usize,
        y_len: usize,
    },
}

#[derive(Debug, Error)]
pub enum HeatmapError {
    #[error("Heatmap size must be positive, found {0}")]
    BadSize(f64),
    #[error("Heatmap pixel size must be positive, found {0}")]
    BadPixelSize(f64),
    #[error("Heatmap with size {size} and pixel size {pixel_size} has no bins")]
    NoBins { size: f64, pixel_size: f64 },
    #[error("Heatmap failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Heatmap failed to create image: {0}")]
    ImageError(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum CnrError {
    #[error("The {0} region does not cover any pixels of the image")]
    EmptyRegion(&'static str),
    #[error("The background region has zero standard deviation; CNR is undefined")]
    FlatBackground,
    #[error("CNR failed to load image: {0}")]
    ImageError(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config is missing the {0} section")]
    MissingSection(&'static str),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Merger error: {0}")]
    MergerError(#[from] MergerError),
    #[error("Processor failed due to branch extraction error: {0}")]
    BranchError(#[from] BranchError),
    #[error("Processor failed due to Heatmap error: {0}")]
    HeatmapError(#[from] HeatmapError),
    #[error("Processor failed due to CNR error: {0}")]
    CnrError(#[from] CnrError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
