use std::path::PathBuf;
use std::sync::mpsc::Sender;

use super::branches::extract_branches;
use super::cnr::{load_grayscale, measure_cnr, CnrMeasurement};
use super::config::Config;
use super::error::ProcessorError;
use super::heatmap::Heatmap;
use super::merge_status::MergeStatus;
use super::merger::{MergeSummary, Merger};

/// Merge the simulation output described by the config.
///
/// Meant to be called from a separate thread; progress is reported on `tx`.
pub fn process_merge(
    config: &Config,
    tx: &Sender<MergeStatus>,
) -> Result<MergeSummary, ProcessorError> {
    let directory = config.get_data_directory()?;
    let merger = Merger::new(directory, &config.starts_with, &config.output_name)?;
    log::info!(
        "Merging {} files ({}) into {}",
        merger.get_file_stack().len(),
        human_bytes::human_bytes(merger.get_total_data_size() as f64),
        merger.get_output_path().display()
    );
    let summary = merger.run_with_status(tx)?;
    log::info!(
        "{} tables from {} files written to {}.",
        summary.tables_written,
        summary.files_read,
        summary.output_path.display()
    );
    Ok(summary)
}

/// Build the heatmap described by the config, saving it if requested
pub fn process_heatmap(config: &Config) -> Result<Heatmap, ProcessorError> {
    let heatmap_config = config.get_heatmap_config()?;
    let source = config.get_heatmap_source()?;
    let pair = extract_branches(
        &source,
        &heatmap_config.table_name,
        &heatmap_config.x_branch,
        &heatmap_config.y_branch,
    )?;
    let heatmap = Heatmap::from_branches(&pair, &heatmap_config.params)?;

    if let Some(save_as) = &heatmap_config.save_as {
        let hdf_path: PathBuf = save_as.with_extension("h5");
        let png_path: PathBuf = save_as.with_extension("png");
        if let Some(parent) = hdf_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        heatmap.write_hdf5(&hdf_path)?;
        heatmap.save_image(&png_path)?;
        log::info!(
            "Heatmap written to {} and {}",
            hdf_path.display(),
            png_path.display()
        );
    }
    Ok(heatmap)
}

/// Measure the CNR of the configured image and regions
pub fn process_cnr(config: &Config) -> Result<CnrMeasurement, ProcessorError> {
    let cnr_config = config.get_cnr_config()?;
    let image = load_grayscale(config.get_cnr_image()?)?;
    let measurement = measure_cnr(&image, &cnr_config.signal, &cnr_config.background)?;
    log::info!("Signal avg: {:.3}", measurement.signal_mean);
    log::info!("Background avg: {:.3}", measurement.background_mean);
    log::info!("Background std dev: {:.3}", measurement.background_std);
    log::info!("CNR: {:.1}", measurement.cnr);
    Ok(measurement)
}
