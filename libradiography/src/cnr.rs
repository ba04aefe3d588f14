//! Contrast-to-noise ratio of a radiograph.
//!
//! CNR is measured between a signal region and a background region of a grayscale image:
//!
//! ```text
//! CNR = (mean(signal) - mean(background)) / std(background)
//! ```
//!
//! using the population standard deviation. Regions are rectangles in pixel
//! coordinates, with x along columns and y along rows, and may be given by any two
//! opposite corners. Fractional corners are rounded half-to-even.
//!
//! [`measure_cnr`] works on fixed regions. [`CnrSession`] holds the state of a
//! rectangle-selection session driven by press / drag / release events: the first
//! rectangle drawn is the signal, the second the background, and drawing a third
//! starts over.
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::CnrError;

/// A rectangle given by two opposite corners `(x1, y1)` and `(x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Region {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl From<[f64; 4]> for Region {
    fn from(corners: [f64; 4]) -> Self {
        Self::new(corners[0], corners[1], corners[2], corners[3])
    }
}

impl From<Region> for [f64; 4] {
    fn from(region: Region) -> Self {
        [region.x1, region.y1, region.x2, region.y2]
    }
}

fn pixel_range(a: f64, b: f64, limit: usize) -> (usize, usize) {
    let clamp = |v: f64| (v.round_ties_even().max(0.0) as usize).min(limit);
    (clamp(a.min(b)), clamp(a.max(b)))
}

impl Region {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// The pixels covered by the region, clipped to the image
    pub fn view<'a>(&self, image: &'a Array2<f64>) -> ArrayView2<'a, f64> {
        let (rows, cols) = image.dim();
        let (y_lo, y_hi) = pixel_range(self.y1, self.y2, rows);
        let (x_lo, x_hi) = pixel_range(self.x1, self.x2, cols);
        image.slice(s![y_lo..y_hi, x_lo..x_hi])
    }
}

/// Mean and population standard deviation of a region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    pub mean: f64,
    pub std: f64,
}

impl RegionStats {
    pub fn of(image: &Array2<f64>, region: &Region, label: &'static str) -> Result<Self, CnrError> {
        let view = region.view(image);
        let mean = view.mean().ok_or(CnrError::EmptyRegion(label))?;
        Ok(Self {
            mean,
            std: view.std(0.0),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CnrMeasurement {
    pub signal_mean: f64,
    pub background_mean: f64,
    pub background_std: f64,
    pub cnr: f64,
}

fn contrast_to_noise(signal_mean: f64, background: RegionStats) -> Result<f64, CnrError> {
    if background.std == 0.0 {
        return Err(CnrError::FlatBackground);
    }
    Ok((signal_mean - background.mean) / background.std)
}

/// CNR between two fixed regions of an image
pub fn measure_cnr(
    image: &Array2<f64>,
    signal: &Region,
    background: &Region,
) -> Result<CnrMeasurement, CnrError> {
    let signal_stats = RegionStats::of(image, signal, "signal")?;
    let background_stats = RegionStats::of(image, background, "background")?;
    let cnr = contrast_to_noise(signal_stats.mean, background_stats)?;
    Ok(CnrMeasurement {
        signal_mean: signal_stats.mean,
        background_mean: background_stats.mean,
        background_std: background_stats.std,
        cnr,
    })
}

/// Load an image as 8-bit luminance values
pub fn load_grayscale(path: &Path) -> Result<Array2<f64>, CnrError> {
    let gray = image::open(path)?.to_luma8();
    let (width, height) = gray.dimensions();
    Ok(Array2::from_shape_fn(
        (height as usize, width as usize),
        |(y, x)| gray.get_pixel(x as u32, y as u32).0[0] as f64,
    ))
}

/// What a completed rectangle measured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CnrEvent {
    Signal { mean: f64 },
    Background { mean: f64, std: f64, cnr: f64 },
}

/// Rectangle-selection state for measuring CNR interactively.
///
/// Coordinates outside the image are ignored, as a click outside the plot would be.
#[derive(Debug, Clone)]
pub struct CnrSession {
    image: Array2<f64>,
    rectangles: Vec<Region>,
    start: Option<(f64, f64)>,
    signal_mean: f64,
}

impl CnrSession {
    pub fn new(image: Array2<f64>) -> Self {
        Self {
            image,
            rectangles: Vec::new(),
            start: None,
            signal_mean: 0.0,
        }
    }

    /// Live rectangles; at most two
    pub fn rectangles(&self) -> &[Region] {
        &self.rectangles
    }

    pub fn is_dragging(&self) -> bool {
        self.start.is_some()
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        let (rows, cols) = self.image.dim();
        (-0.5..=cols as f64 - 0.5).contains(&x) && (-0.5..=rows as f64 - 0.5).contains(&y)
    }

    /// Start a rectangle. A third rectangle discards the previous pair.
    pub fn press(&mut self, x: f64, y: f64) {
        if !self.contains(x, y) {
            return;
        }
        self.start = Some((x, y));
        self.rectangles.push(Region::new(x, y, x + 1.0, y + 1.0));
        if self.rectangles.len() > 2 {
            self.rectangles.drain(..2);
        }
    }

    /// Stretch the current rectangle to (x, y)
    pub fn drag(&mut self, x: f64, y: f64) {
        if self.start.is_none() || !self.contains(x, y) {
            return;
        }
        if let Some(rect) = self.rectangles.last_mut() {
            rect.x2 = x;
            rect.y2 = y;
        }
    }

    /// Finish the current rectangle and measure it.
    ///
    /// Returns `Ok(None)` when no rectangle was being drawn or the release is outside the image.
    pub fn release(&mut self, x: f64, y: f64) -> Result<Option<CnrEvent>, CnrError> {
        if !self.contains(x, y) {
            return Ok(None);
        }
        let Some((x1, y1)) = self.start.take() else {
            return Ok(None);
        };
        let region = Region::new(x1, y1, x, y);
        if let Some(rect) = self.rectangles.last_mut() {
            *rect = region;
        }

        if self.rectangles.len() == 1 {
            let stats = RegionStats::of(&self.image, &region, "signal")?;
            self.signal_mean = stats.mean;
            log::info!("Signal avg: {}", stats.mean);
            Ok(Some(CnrEvent::Signal { mean: stats.mean }))
        } else {
            let stats = RegionStats::of(&self.image, &region, "background")?;
            let cnr = contrast_to_noise(self.signal_mean, stats)?;
            log::info!("Background avg: {}", stats.mean);
            log::info!("Background std dev: {}", stats.std);
            log::info!("CNR: {cnr}");
            Ok(Some(CnrEvent::Background {
                mean: stats.mean,
                std: stats.std,
                cnr,
            }))
        }
    }
}
