//! # libradiography
//!
//! libradiography holds the analysis tools for radiography simulations. The detector
//! simulation writes one container file per thread (or per run), each holding tables of
//! detector hits. This library merges those files into a single file, extracts pairs of
//! branches from the merged tables, bins them into a density image (heatmap), and measures
//! the contrast-to-noise ratio (CNR) of an image.
//!
//! ## Installation
//!
//! The only method of install is from source. The HDF5 C library (1.10 or newer) must be
//! available on the system; see the [hdf5-rust](https://github.com/aldanor/hdf5-rust)
//! documentation for details. Then build the command line application with
//!
//! ```bash
//! cargo install --path ./radiography_cli
//! ```
//!
//! ## Configuration
//!
//! The command line application is driven by a YAML configuration file. A template can be
//! generated with `radiography_cli -p config.yml new`. The format is as follows:
//!
//! ```yml
//! data_path: /path/to/simulation/output
//! starts_with: sim
//! output_name: merged
//! heatmap:
//!   source_name: merged0
//!   table_name: Photons
//!   x_branch: X_axis
//!   y_branch: Y_axis
//!   size: 100.0
//!   pixel_size: 0.5
//!   log_factor: 1.0e-7
//!   x_shift: 0.0
//!   y_shift: 0.0
//!   chunk_size: 1048576
//!   save_as: null
//! cnr:
//!   image_path: /path/to/image.png
//!   signal: [x1, y1, x2, y2]
//!   background: [x1, y1, x2, y2]
//! ```
//!
//! - `data_path`: directory holding the simulation output files (`.h5`). Merged files are
//! written to the same directory.
//! - `starts_with`: only files whose name starts with this prefix are merged. An empty
//! prefix merges nothing.
//! - `output_name`: merged files are named `<output_name><n>.h5`, where `n` is the smallest
//! number not already taken, so a merge never overwrites an earlier one. Files starting with
//! `merge` or with `output_name` are never used as inputs.
//! - `heatmap`: which merged file (`source_name`, a file stem in `data_path`), table, and
//! branches to bin, and the binning parameters. Positions are shifted by `x_shift` and
//! `y_shift`, binned on a square grid from `-size` to `size` with pixels of `pixel_size`, and
//! normalized as `ln(max / (count + log_factor))`. If `save_as` is set the heatmap is written
//! to `<save_as>.h5` and `<save_as>.png`.
//! - `cnr`: image and the signal and background rectangles, as two corners in pixel
//! coordinates.
//!
//! ## Merging
//!
//! Tables with the same name across the input files are combined column by column, in file
//! name order. A cycle marker on a table name (`Photons;2`) is ignored, so every cycle of a
//! table lands in the same output table. A column that only appears in a later file is
//! added as it is, without the values of earlier files. Objects that are not tables are
//! skipped.
//!
//! ## Data Format
//!
//! ```text
//! merged0.h5 - version
//! |---- <table> - class = "table", order
//! |    |---- <column>(1-D dset) - order
//! |    |---- <column>(1-D dset) - order
//! ```
//!
//! `order` is the write position of a table or column; tables are listed in the order each
//! name first appeared in the inputs. Input files only need the `class` attribute, which may
//! be any HDF5 string type.
//!
//! Columns may be 32 or 64 bit floats, signed integers, or unsigned integers.
pub mod accumulator;
pub mod branches;
pub mod cnr;
pub mod config;
pub mod container;
pub mod error;
pub mod heatmap;
pub mod merge_status;
pub mod merger;
pub mod process;
pub mod table;
