//! Acceptance-threshold calibration from embedding dispersion.
//!
//! Each identity's samples are reduced to 2-D with PCA and summarized by the
//! area of their one-sigma ellipse. Tight clusters earn strict thresholds,
//! diffuse ones lenient thresholds.

use crate::pca::{Pca, PcaError};
use crate::types::Embedding;

// --- Named constants ---
/// Lowest acceptance threshold calibration can assign (most diffuse cluster).
pub const MIN_THRESHOLD: f32 = 0.1;
/// Highest acceptance threshold calibration can assign (tightest cluster).
pub const MAX_THRESHOLD: f32 = 0.9;
const CALIBRATION_COMPONENTS: usize = 2;

/// Area of the one-sigma ellipse of `embeddings` in their top-2 PCA plane.
///
/// Fewer than 2 samples have no dispersion and yield an area of 0.
pub fn confidence_area(embeddings: &[Embedding]) -> Result<f64, PcaError> {
    if embeddings.len() < 2 {
        return Ok(0.0);
    }

    let pca = Pca::fit(embeddings, CALIBRATION_COMPONENTS)?;
    let std = pca.projected_std();
    if std.len() < CALIBRATION_COMPONENTS {
        return Ok(0.0);
    }

    let (semi_major, semi_minor) = (std[0], std[1]);
    Ok(std::f64::consts::PI * semi_major * semi_minor)
}

/// Map areas to thresholds in [`MIN_THRESHOLD`, `MAX_THRESHOLD`].
///
/// Areas are min-max normalized (all equal → 0), then
/// `threshold = MIN + (MAX - MIN) * (1 - normalized)`.
pub fn thresholds_from_areas(areas: &[f64]) -> Vec<f32> {
    let min = areas.iter().copied().fold(f64::INFINITY, f64::min);
    let max = areas.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    areas
        .iter()
        .map(|&area| {
            let normalized = if range > 0.0 { (area - min) / range } else { 0.0 };
            let span = (MAX_THRESHOLD - MIN_THRESHOLD) as f64;
            (MIN_THRESHOLD as f64 + span * (1.0 - normalized)) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `count` points scattered around `center` along the first two axes.
    fn cluster(center: &[f32], spread: f32, count: usize) -> Vec<Embedding> {
        (0..count)
            .map(|i| {
                let angle = i as f32 * 2.0 * std::f32::consts::PI / count as f32;
                let mut v = center.to_vec();
                v[0] += spread * angle.cos();
                v[1] += spread * 0.5 * angle.sin();
                Embedding::new(v)
            })
            .collect()
    }

    #[test]
    fn test_area_degenerate_inputs() {
        assert_eq!(confidence_area(&[]).unwrap(), 0.0);
        assert_eq!(confidence_area(&[Embedding::new(vec![1.0, 2.0])]).unwrap(), 0.0);
    }

    #[test]
    fn test_area_grows_with_spread() {
        let center = [1.0, 1.0, 1.0, 1.0];
        let tight = confidence_area(&cluster(&center, 0.01, 8)).unwrap();
        let diffuse = confidence_area(&cluster(&center, 0.5, 8)).unwrap();
        assert!(tight > 0.0);
        assert!(diffuse > tight * 100.0, "tight={tight}, diffuse={diffuse}");
    }

    #[test]
    fn test_area_of_known_ellipse() {
        // Four points at (±2, 0) and (0, ±1): σ₁ = √2, σ₂ = √0.5 → area = π.
        let data = [
            Embedding::new(vec![2.0, 0.0]),
            Embedding::new(vec![-2.0, 0.0]),
            Embedding::new(vec![0.0, 1.0]),
            Embedding::new(vec![0.0, -1.0]),
        ];
        let area = confidence_area(&data).unwrap();
        assert!((area - std::f64::consts::PI).abs() < 1e-6, "area = {area}");
    }

    #[test]
    fn test_thresholds_span_bounds() {
        let t = thresholds_from_areas(&[0.0, 5.0, 10.0]);
        assert!((t[0] - MAX_THRESHOLD).abs() < 1e-6);
        assert!((t[1] - 0.5).abs() < 1e-6);
        assert!((t[2] - MIN_THRESHOLD).abs() < 1e-6);
    }

    #[test]
    fn test_thresholds_equal_areas() {
        let t = thresholds_from_areas(&[3.0, 3.0]);
        assert!(t.iter().all(|v| (v - MAX_THRESHOLD).abs() < 1e-6));
        assert!(thresholds_from_areas(&[]).is_empty());
    }
}
