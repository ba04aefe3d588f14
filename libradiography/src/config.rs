use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::cnr::Region;
use super::container::CONTAINER_EXTENSION;
use super::error::ConfigError;
use super::heatmap::HeatmapParams;

/// Which table and branches to bin, and how
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeatmapConfig {
    /// File stem of the container holding the table, inside `data_path`
    pub source_name: String,
    pub table_name: String,
    pub x_branch: String,
    pub y_branch: String,
    #[serde(flatten)]
    pub params: HeatmapParams,
    /// If set, the heatmap is saved as `<save_as>.h5` and `<save_as>.png`
    pub save_as: Option<PathBuf>,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            source_name: String::from("merged0"),
            table_name: String::from("Photons"),
            x_branch: String::from("X_axis"),
            y_branch: String::from("Y_axis"),
            params: HeatmapParams::default(),
            save_as: None,
        }
    }
}

/// Image and regions for a fixed-region CNR measurement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CnrConfig {
    pub image_path: PathBuf,
    pub signal: Region,
    pub background: Region,
}

impl Default for CnrConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::from("None"),
            signal: Region::new(0.0, 0.0, 0.0, 0.0),
            background: Region::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

/// Structure representing the application configuration.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub data_path: PathBuf,
    pub starts_with: String,
    pub output_name: String,
    pub heatmap: Option<HeatmapConfig>,
    pub cnr: Option<CnrConfig>,
}

impl Default for Config {
    /// Generate a new Config object. Paths are placeholders
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("None"),
            starts_with: String::from(""),
            output_name: String::from("merged"),
            heatmap: Some(HeatmapConfig::default()),
            cnr: Some(CnrConfig::default()),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Get the directory holding the simulation output
    pub fn get_data_directory(&self) -> Result<&Path, ConfigError> {
        if self.data_path.is_dir() {
            Ok(&self.data_path)
        } else {
            Err(ConfigError::BadFilePath(self.data_path.clone()))
        }
    }

    pub fn get_heatmap_config(&self) -> Result<&HeatmapConfig, ConfigError> {
        self.heatmap
            .as_ref()
            .ok_or(ConfigError::MissingSection("heatmap"))
    }

    pub fn get_cnr_config(&self) -> Result<&CnrConfig, ConfigError> {
        self.cnr.as_ref().ok_or(ConfigError::MissingSection("cnr"))
    }

    /// Get the path to the container the heatmap reads from
    pub fn get_heatmap_source(&self) -> Result<PathBuf, ConfigError> {
        let heatmap = self.get_heatmap_config()?;
        let path = self
            .get_data_directory()?
            .join(format!("{}.{CONTAINER_EXTENSION}", heatmap.source_name));
        if path.exists() {
            Ok(path)
        } else {
            Err(ConfigError::BadFilePath(path))
        }
    }

    /// Get the image the CNR is measured on
    pub fn get_cnr_image(&self) -> Result<&Path, ConfigError> {
        let cnr = self.get_cnr_config()?;
        if cnr.image_path.exists() {
            Ok(&cnr.image_path)
        } else {
            Err(ConfigError::BadFilePath(cnr.image_path.clone()))
        }
    }
}
