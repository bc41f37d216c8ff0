//! Piecewise-linear histogram standardization (Nyúl & Udupa).
//!
//! A set of images is fitted jointly: each image's foreground intensity
//! landmarks (percentiles) are mapped onto a common output range and averaged
//! into a standard scale. Transforming an image maps its own landmarks onto
//! that scale, interpolating linearly between them.

use std::path::Path;

use ndarray::{Array1, Array3};
use rayon::prelude::*;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct NyulStandardizer {
    pub output_min: f64,
    pub output_max: f64,
    pub min_percentile: f64,
    pub max_percentile: f64,
    pub percentile_after_min: f64,
    pub percentile_before_max: f64,
    pub percentile_step: f64,
}

impl Default for NyulStandardizer {
    fn default() -> Self {
        Self {
            output_min: 1.0,
            output_max: 100.0,
            min_percentile: 1.0,
            max_percentile: 99.0,
            percentile_after_min: 10.0,
            percentile_before_max: 90.0,
            percentile_step: 10.0,
        }
    }
}

/// Fitted standard scale, one value per landmark percentile.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardHistogram {
    pub percentiles: Vec<f64>,
    pub scale: Array1<f64>,
}

impl NyulStandardizer {
    /// Landmark percentiles, e.g. `[1, 10, 20, ..., 90, 99]`.
    pub fn percentiles(&self) -> Vec<f64> {
        let mut percentiles = vec![self.min_percentile];
        let mut p = self.percentile_after_min;
        while p <= self.percentile_before_max + f64::EPSILON {
            percentiles.push(p);
            p += self.percentile_step;
        }
        percentiles.push(self.max_percentile);
        percentiles
    }

    /// Fit the standard scale jointly over all `images`.
    ///
    /// # Errors
    ///
    /// Fails if an image has no foreground (positive) voxels or a flat
    /// foreground histogram.
    pub fn fit(&self, images: &[&Array3<f32>]) -> Result<StandardHistogram> {
        if images.is_empty() {
            return Err(PipelineError::Normalization("no images to fit".into()));
        }
        let percentiles = self.percentiles();
        let range = self.output_max - self.output_min;
        let mut scale = Array1::<f64>::zeros(percentiles.len());

        for (index, image) in images.iter().enumerate() {
            let landmarks = landmarks(image, &percentiles).ok_or_else(|| {
                PipelineError::Normalization(format!("image {index} has no foreground"))
            })?;
            let (low, high) = (landmarks[0], landmarks[landmarks.len() - 1]);
            if high <= low {
                return Err(PipelineError::Normalization(format!(
                    "image {index} has a flat intensity histogram"
                )));
            }
            for (s, l) in scale.iter_mut().zip(&landmarks) {
                *s += self.output_min + (l - low) / (high - low) * range;
            }
        }
        scale /= images.len() as f64;

        Ok(StandardHistogram { percentiles, scale })
    }
}

impl StandardHistogram {
    /// Map `image` onto the standard scale.
    ///
    /// Foreground voxels are mapped piecewise-linearly (extrapolating beyond
    /// the outer landmarks); background voxels stay zero.
    pub fn transform(&self, image: &Array3<f32>) -> Result<Array3<f32>> {
        let landmarks = landmarks(image, &self.percentiles)
            .ok_or_else(|| PipelineError::Normalization("image has no foreground".into()))?;
        let scale = self.scale.to_vec();
        let mut out = image.clone();
        out.par_mapv_inplace(|v| {
            if is_foreground(v) {
                interpolate(&landmarks, &scale, v as f64) as f32
            } else {
                0.0
            }
        });
        Ok(out)
    }

    /// Persist the scale as a `.npy` array.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        ndarray_npy::write_npy(path, &self.scale)?;
        Ok(())
    }
}

fn is_foreground(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

/// Foreground intensity at each percentile, `None` without foreground.
fn landmarks(image: &Array3<f32>, percentiles: &[f64]) -> Option<Vec<f64>> {
    let mut voxels: Vec<f32> = image.iter().copied().filter(|&v| is_foreground(v)).collect();
    if voxels.is_empty() {
        return None;
    }
    voxels.par_sort_unstable_by(f32::total_cmp);
    Some(percentiles.iter().map(|&p| percentile(&voxels, p)).collect())
}

/// Linear-interpolated percentile of sorted data.
fn percentile(sorted: &[f32], p: f64) -> f64 {
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] as f64 + (sorted[upper] as f64 - sorted[lower] as f64) * weight
}

/// Piecewise-linear map from `xs` to `ys` with linear extrapolation.
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let last = xs.len() - 1;
    let segment = xs.partition_point(|&l| l <= x).clamp(1, last);
    let (x0, x1) = (xs[segment - 1], xs[segment]);
    let (y0, y1) = (ys[segment - 1], ys[segment]);
    if x1 <= x0 {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(offset: f32, gain: f32) -> Array3<f32> {
        Array3::from_shape_fn((10, 10, 10), |(x, y, z)| {
            offset + gain * (x + 10 * y + 100 * z + 1) as f32
        })
    }

    #[test]
    fn default_landmarks() {
        let p = NyulStandardizer::default().percentiles();
        assert_eq!(p, vec![1.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 99.0]);
    }

    #[test]
    fn percentile_matches_linear_rule() {
        let data = [1.0_f32, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&data, 50.0), 2.5);
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 100.0), 4.0);
    }

    #[test]
    fn linearly_related_images_map_to_same_scale() {
        let a = ramp(0.0, 1.0);
        let b = ramp(50.0, 3.0);
        let model = NyulStandardizer::default().fit(&[&a, &b]).unwrap();
        assert!((model.scale[0] - 1.0).abs() < 1e-9);
        assert!((model.scale[model.scale.len() - 1] - 100.0).abs() < 1e-9);

        let na = model.transform(&a).unwrap();
        let nb = model.transform(&b).unwrap();
        let diff = (&na - &nb).mapv(f32::abs).fold(0.0_f32, |m, &v| m.max(v));
        assert!(diff < 1e-2, "max difference {diff}");
    }

    #[test]
    fn background_stays_zero() {
        let mut a = ramp(0.0, 1.0);
        a[[0, 0, 0]] = 0.0;
        let model = NyulStandardizer::default().fit(&[&a]).unwrap();
        assert_eq!(model.transform(&a).unwrap()[[0, 0, 0]], 0.0);
    }

    #[test]
    fn empty_image_cannot_be_fitted() {
        let zeros = Array3::<f32>::zeros((2, 2, 2));
        assert!(NyulStandardizer::default().fit(&[&zeros]).is_err());
    }
}
