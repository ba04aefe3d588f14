use hdf5::File;
use image::GrayImage;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::branches::{BranchPair, DEFAULT_CHUNK_SIZE};
use super::error::HeatmapError;

/// Detector pixel pitch in mm
pub const DEFAULT_PIXEL_SIZE: f64 = 0.5;

const HEATMAP_NAME: &str = "heatmap";
const COUNTS_NAME: &str = "counts";
const X_EDGES_NAME: &str = "x_edges";
const Y_EDGES_NAME: &str = "y_edges";

/// Binning and normalization controls for a heatmap
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeatmapParams {
    /// Half width of the square field of view, mm
    pub size: f64,
    pub pixel_size: f64,
    /// Added to every count before the log so empty pixels stay finite
    pub log_factor: f64,
    pub x_shift: f64,
    pub y_shift: f64,
    pub chunk_size: usize,
}

impl Default for HeatmapParams {
    fn default() -> Self {
        Self {
            size: 100.0,
            pixel_size: DEFAULT_PIXEL_SIZE,
            log_factor: 1.0e-7,
            x_shift: 0.0,
            y_shift: 0.0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl HeatmapParams {
    pub fn validate(&self) -> Result<(), HeatmapError> {
        if !(self.size > 0.0) {
            return Err(HeatmapError::BadSize(self.size));
        }
        if !(self.pixel_size > 0.0) {
            return Err(HeatmapError::BadPixelSize(self.pixel_size));
        }
        if self.edges().len() < 2 {
            return Err(HeatmapError::NoBins {
                size: self.size,
                pixel_size: self.pixel_size,
            });
        }
        Ok(())
    }

    /// Bin edges `-size, -size + pixel, ...`, stopping before `size + pixel`
    pub fn edges(&self) -> Vec<f64> {
        let start = -self.size;
        let stop = self.size + self.pixel_size;
        let n_edges = ((stop - start) / self.pixel_size).ceil() as usize;
        (0..n_edges)
            .map(|i| start + i as f64 * self.pixel_size)
            .collect()
    }
}

/// Index of the bin holding `value`.
///
/// Bins are half open except the last, which also holds the final edge.
fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    let n_bins = edges.len().checked_sub(1)?;
    if value.is_nan() || n_bins == 0 {
        return None;
    }
    let mut idx = edges.partition_point(|edge| *edge <= value);
    if value == edges[n_bins] {
        idx -= 1;
    }
    if idx == 0 || idx > n_bins {
        None
    } else {
        Some(idx - 1)
    }
}

/// A 2D count histogram filled chunk by chunk. Indexed `[x_bin, y_bin]`.
#[derive(Debug, Clone)]
pub struct Histogram2D {
    x_edges: Vec<f64>,
    y_edges: Vec<f64>,
    counts: Array2<f64>,
}

impl Histogram2D {
    pub fn new(x_edges: Vec<f64>, y_edges: Vec<f64>) -> Self {
        let nx = x_edges.len().saturating_sub(1);
        let ny = y_edges.len().saturating_sub(1);
        Self {
            x_edges,
            y_edges,
            counts: Array2::zeros((nx, ny)),
        }
    }

    /// Count every in-range (x, y) point; points outside the edges are dropped
    pub fn fill(&mut self, x: &[f64], y: &[f64]) {
        for (xv, yv) in x.iter().zip(y.iter()) {
            if let (Some(ix), Some(iy)) = (bin_index(&self.x_edges, *xv), bin_index(&self.y_edges, *yv)) {
                self.counts[[ix, iy]] += 1.0;
            }
        }
    }

    pub fn counts(&self) -> &Array2<f64> {
        &self.counts
    }

    /// Counts as an image: transposed so rows follow y, then rotated by 180 degrees
    pub fn to_image_orientation(&self) -> Array2<f64> {
        let (nx, ny) = self.counts.dim();
        Array2::from_shape_fn((ny, nx), |(r, c)| self.counts[[nx - 1 - c, ny - 1 - r]])
    }
}

/// Density image of detector hits, normalized as `ln(max / (count + log_factor))`
#[derive(Debug, Clone)]
pub struct Heatmap {
    pub counts: Array2<f64>,
    pub image: Array2<f64>,
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    pub params: HeatmapParams,
}

impl Heatmap {
    /// Bin a pair of branches, chunk by chunk
    pub fn from_branches(pair: &BranchPair, params: &HeatmapParams) -> Result<Self, HeatmapError> {
        params.validate()?;
        let edges = params.edges();
        let mut histogram = Histogram2D::new(edges.clone(), edges);
        let mut x_shifted = Vec::new();
        let mut y_shifted = Vec::new();
        for (x_chunk, y_chunk) in pair.chunks(params.chunk_size) {
            x_shifted.clear();
            y_shifted.clear();
            x_shifted.extend(x_chunk.iter().map(|x| x - params.x_shift));
            y_shifted.extend(y_chunk.iter().map(|y| y - params.y_shift));
            histogram.fill(&x_shifted, &y_shifted);
        }
        let heatmap = Self::from_histogram(&histogram, params);
        log::info!(
            "Heatmap size: ({}, {}) [pixels]",
            heatmap.image.nrows(),
            heatmap.image.ncols()
        );
        Ok(heatmap)
    }

    pub fn from_histogram(histogram: &Histogram2D, params: &HeatmapParams) -> Self {
        let counts = histogram.to_image_orientation();
        let max = counts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let image = counts.mapv(|count| (max / (count + params.log_factor)).ln());
        Self {
            counts,
            image,
            x_edges: histogram.x_edges.clone(),
            y_edges: histogram.y_edges.clone(),
            params: params.clone(),
        }
    }

    pub fn rows(&self) -> usize {
        self.image.nrows()
    }

    pub fn cols(&self) -> usize {
        self.image.ncols()
    }

    /// The row two thirds of the way down the image
    pub fn profile(&self) -> ArrayView1<'_, f64> {
        self.image.row(2 * self.rows() / 3)
    }

    /// Write the normalized map, the counts and the edges to an HDF5 file
    pub fn write_hdf5(&self, path: &Path) -> Result<(), HeatmapError> {
        let file = File::create(path)?;
        let heatmap_dset = file
            .new_dataset_builder()
            .with_data(&self.image)
            .create(HEATMAP_NAME)?;
        heatmap_dset
            .new_attr::<f64>()
            .create("log_factor")?
            .write_scalar(&self.params.log_factor)?;
        file.new_dataset_builder()
            .with_data(&self.counts)
            .create(COUNTS_NAME)?;
        file.new_dataset_builder()
            .with_data(self.x_edges.as_slice())
            .create(X_EDGES_NAME)?;
        file.new_dataset_builder()
            .with_data(self.y_edges.as_slice())
            .create(Y_EDGES_NAME)?;
        file.new_attr::<f64>()
            .create("size")?
            .write_scalar(&self.params.size)?;
        file.new_attr::<f64>()
            .create("pixel_size")?
            .write_scalar(&self.params.pixel_size)?;
        Ok(())
    }

    /// Scale the finite range of the normalized map to 8-bit gray.
    ///
    /// +inf maps to white; -inf and NaN map to black.
    pub fn to_gray_image(&self) -> GrayImage {
        let (lo, hi) = self
            .image
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        let span = hi - lo;
        GrayImage::from_fn(self.cols() as u32, self.rows() as u32, |x, y| {
            let v = self.image[[y as usize, x as usize]];
            let level = if v == f64::INFINITY {
                255.0
            } else if !v.is_finite() {
                0.0
            } else if span > 0.0 {
                (v - lo) / span * 255.0
            } else {
                0.0
            };
            image::Luma([level.round() as u8])
        })
    }

    /// Save [`Heatmap::to_gray_image`] in a format chosen by the path's extension
    pub fn save_image(&self, path: &Path) -> Result<(), HeatmapError> {
        self.to_gray_image().save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(size: f64, pixel_size: f64) -> HeatmapParams {
        HeatmapParams {
            size,
            pixel_size,
            log_factor: 1.0,
            chunk_size: 2,
            ..Default::default()
        }
    }

    fn pair(x: Vec<f64>, y: Vec<f64>) -> BranchPair {
        BranchPair {
            x_name: "x".into(),
            y_name: "y".into(),
            x,
            y,
        }
    }

    #[test]
    fn edges_follow_arange() {
        assert_eq!(params(1.0, 0.5).edges(), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(params(10.0, 0.5).edges().len(), 41);
    }

    #[test]
    fn binning_edges() {
        let edges = [0.0, 1.0, 2.0];
        assert_eq!(bin_index(&edges, 0.0), Some(0));
        assert_eq!(bin_index(&edges, 0.999), Some(0));
        assert_eq!(bin_index(&edges, 1.0), Some(1));
        assert_eq!(bin_index(&edges, 2.0), Some(1));
        assert_eq!(bin_index(&edges, 2.001), None);
        assert_eq!(bin_index(&edges, -0.1), None);
        assert_eq!(bin_index(&edges, f64::NAN), None);
    }

    #[test]
    fn orientation_is_transpose_then_half_turn() {
        // 2 x bins by 3 y bins
        let mut histogram = Histogram2D::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0, 3.0]);
        histogram.fill(&[0.5], &[0.5]);
        histogram.fill(&[1.5, 1.5], &[2.5, 2.5]);
        let image = histogram.to_image_orientation();
        assert_eq!(image.dim(), (3, 2));
        // counts[0][0] lands in the bottom right, counts[1][2] in the top left
        assert_eq!(image[[2, 1]], 1.0);
        assert_eq!(image[[0, 0]], 2.0);
        assert_eq!(image.sum(), 3.0);
    }

    #[test]
    fn heatmap_normalization() {
        let hits = pair(vec![-0.75, -0.75, 0.25, 5.0], vec![-0.75, -0.75, 0.75, 0.0]);
        let heatmap = Heatmap::from_branches(&hits, &params(1.0, 0.5)).unwrap();
        assert_eq!((heatmap.rows(), heatmap.cols()), (4, 4));
        // the out of range hit is dropped
        assert_eq!(heatmap.counts.sum(), 3.0);
        // (-0.75, -0.75) is x bin 0, y bin 0 -> bottom right after the rotation
        assert_eq!(heatmap.counts[[3, 3]], 2.0);
        assert!((heatmap.image[[3, 3]] - (2.0f64 / 3.0).ln()).abs() < 1e-12);
        assert!((heatmap.image[[0, 0]] - 2.0f64.ln()).abs() < 1e-12);
        assert_eq!(heatmap.profile().len(), 4);
    }

    #[test]
    fn shifts_move_the_data() {
        let hits = pair(vec![10.25], vec![-9.75]);
        let mut p = params(1.0, 0.5);
        p.x_shift = 10.0;
        p.y_shift = -10.0;
        let heatmap = Heatmap::from_branches(&hits, &p).unwrap();
        assert_eq!(heatmap.counts.sum(), 1.0);
    }

    #[test]
    fn bad_params() {
        let hits = pair(vec![], vec![]);
        assert!(matches!(
            Heatmap::from_branches(&hits, &params(0.0, 0.5)),
            Err(HeatmapError::BadSize(_))
        ));
        assert!(matches!(
            Heatmap::from_branches(&hits, &params(1.0, -1.0)),
            Err(HeatmapError::BadPixelSize(_))
        ));
    }

    #[test]
    fn pixel_wider_than_field_has_no_bins() {
        let p = params(1.0e-20, 1.0);
        assert!(matches!(p.validate(), Err(HeatmapError::NoBins { .. })));
        assert!(matches!(
            Heatmap::from_branches(&pair(vec![0.0], vec![0.0]), &p),
            Err(HeatmapError::NoBins { .. })
        ));
        assert!(params(1.0, 0.5).validate().is_ok());
    }

    #[test]
    fn gray_image_spans_full_range() {
        let hits = pair(vec![-0.75, -0.75, 0.25], vec![-0.75, -0.75, 0.75]);
        let heatmap = Heatmap::from_branches(&hits, &params(1.0, 0.5)).unwrap();
        let gray = heatmap.to_gray_image();
        assert_eq!(gray.dimensions(), (4, 4));
        // most hits -> smallest log value -> black
        assert_eq!(gray.get_pixel(3, 3).0[0], 0);
        // empty pixel -> largest log value -> white
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn writes_hdf5() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.h5");
        let hits = pair(vec![0.1], vec![0.1]);
        let heatmap = Heatmap::from_branches(&hits, &params(1.0, 0.5)).unwrap();
        heatmap.write_hdf5(&path).unwrap();
        let file = File::open(&path).unwrap();
        let edges: Vec<f64> = file.dataset(X_EDGES_NAME).unwrap().read_raw().unwrap();
        assert_eq!(edges, heatmap.x_edges);
        assert_eq!(file.dataset(HEATMAP_NAME).unwrap().shape(), vec![4, 4]);
    }
}
