//! Diffraction spot extraction from a detector image.
//!
//! 1. **Threshold**: pixels above `threshold` are spot pixels
//! 2. **Label**: connected components (4- or 8-connectivity) via union-find
//! 3. **Measure**: intensity-weighted centroid and mass per component
//! 4. **Filter**: reject components outside `[min_pixels, max_pixels]`

use std::collections::HashMap;

use tracing::debug;

use crate::detector::{DetectorSpot, RegArrayDetector2d};

/// Parameters for [`extract_spots`].
#[derive(Debug, Clone)]
pub struct SpotExtractionConfig {
    /// Pixels strictly above this value belong to spots. Default 0.
    pub threshold: f32,
    /// Minimum number of pixels in a spot. Default 1.
    pub min_pixels: usize,
    /// Maximum number of pixels in a spot. Default 10000.
    pub max_pixels: usize,
    /// Use 8-connectivity (diagonal neighbours) for labeling. Default true.
    pub use_8_connectivity: bool,
    /// Keep at most this many spots, brightest first. None = all. Default None.
    pub max_spots: Option<usize>,
}

impl Default for SpotExtractionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            min_pixels: 1,
            max_pixels: 10_000,
            use_8_connectivity: true,
            max_spots: None,
        }
    }
}

/// Extract spots from the detector image, sorted by decreasing integrated intensity.
///
/// Spot positions are intensity-weighted centroids in pixel coordinates.
pub fn extract_spots(detector: &RegArrayDetector2d, config: &SpotExtractionConfig) -> Vec<DetectorSpot> {
    let (nu, nv) = detector.size;
    let mask: Vec<bool> = detector.data.iter().map(|&v| v > config.threshold).collect();
    let labels = label_connected_components(&mask, nu, nv, config.use_8_connectivity);
    let num_labels = labels.iter().copied().max().unwrap_or(0) as usize;

    let mut spots = compute_spot_centroids(&detector.data, &labels, num_labels, nv, config);
    spots.sort_by(|a, b| {
        b.intensity
            .unwrap_or(0.0)
            .total_cmp(&a.intensity.unwrap_or(0.0))
    });
    if let Some(max) = config.max_spots {
        spots.truncate(max);
    }
    debug!("Extracted {} spots from {num_labels} components", spots.len());
    spots
}

/// Two-pass connected component labeling on a `nu × nv` mask stored u-major.
///
/// Returns sequential labels starting at 1, 0 for background.
fn label_connected_components(mask: &[bool], nu: usize, nv: usize, use_8_connectivity: bool) -> Vec<u32> {
    let mut labels = vec![0u32; nu * nv];
    let mut parent: Vec<u32> = vec![0];
    let mut next_label = 1u32;

    fn find(parent: &mut [u32], mut x: u32) -> u32 {
        while parent[x as usize] != x {
            parent[x as usize] = parent[parent[x as usize] as usize];
            x = parent[x as usize];
        }
        x
    }

    fn union(parent: &mut [u32], a: u32, b: u32) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            // Merge into the lower root
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            parent[hi as usize] = lo;
        }
    }

    for u in 0..nu {
        for v in 0..nv {
            let idx = u * nv + v;
            if !mask[idx] {
                continue;
            }
            let mut neighbors = [0u32; 4];
            let mut count = 0;
            let mut push = |label: u32| {
                if label > 0 {
                    neighbors[count] = label;
                    count += 1;
                }
            };
            if v > 0 {
                push(labels[idx - 1]);
            }
            if u > 0 {
                push(labels[idx - nv]);
                if use_8_connectivity {
                    if v > 0 {
                        push(labels[idx - nv - 1]);
                    }
                    if v + 1 < nv {
                        push(labels[idx - nv + 1]);
                    }
                }
            }

            let neighbors = &neighbors[..count];
            match neighbors.iter().copied().min() {
                None => {
                    parent.push(next_label);
                    labels[idx] = next_label;
                    next_label += 1;
                }
                Some(min_label) => {
                    labels[idx] = min_label;
                    for &n in neighbors {
                        union(&mut parent, min_label, n);
                    }
                }
            }
        }
    }

    // Flatten to sequential labels
    let mut root_map = HashMap::new();
    let mut seq = 1u32;
    for label in labels.iter_mut().filter(|l| **l > 0) {
        let root = find(&mut parent, *label);
        *label = *root_map.entry(root).or_insert_with(|| {
            let s = seq;
            seq += 1;
            s
        });
    }
    labels
}

fn compute_spot_centroids(
    data: &[f32],
    labels: &[u32],
    num_labels: usize,
    nv: usize,
    config: &SpotExtractionConfig,
) -> Vec<DetectorSpot> {
    #[derive(Default, Clone)]
    struct Accum {
        sum_u: f64,
        sum_v: f64,
        sum_intensity: f64,
        pixel_count: usize,
    }

    let mut accums = vec![Accum::default(); num_labels + 1];
    for (idx, (&label, &value)) in labels.iter().zip(data).enumerate() {
        if label == 0 {
            continue;
        }
        let intensity = value as f64;
        let acc = &mut accums[label as usize];
        acc.sum_u += (idx / nv) as f64 * intensity;
        acc.sum_v += (idx % nv) as f64 * intensity;
        acc.sum_intensity += intensity;
        acc.pixel_count += 1;
    }

    accums
        .into_iter()
        .skip(1)
        .filter(|acc| {
            acc.pixel_count >= config.min_pixels
                && acc.pixel_count <= config.max_pixels
                && acc.sum_intensity > 0.0
        })
        .map(|acc| DetectorSpot {
            u: acc.sum_u / acc.sum_intensity,
            v: acc.sum_v / acc.sum_intensity,
            intensity: Some(acc.sum_intensity),
            energy: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::add_to_image;

    #[test]
    fn test_extract_square_spots() {
        let mut det = RegArrayDetector2d::new((64, 48), 1.0, 10.0);
        add_to_image(&mut det.data, det.size, 10.0, 2, (10.0, 12.0));
        add_to_image(&mut det.data, det.size, 50.0, 1, (40.0, 30.0));
        let spots = extract_spots(&det, &SpotExtractionConfig::default());
        assert_eq!(spots.len(), 2);
        // Brightest first: 25 * 10 = 250 < 9 * 50 = 450
        assert_eq!((spots[0].u, spots[0].v), (40.0, 30.0));
        assert_eq!(spots[0].intensity, Some(450.0));
        assert_eq!((spots[1].u, spots[1].v), (10.0, 12.0));
    }

    #[test]
    fn test_connectivity() {
        let mut det = RegArrayDetector2d::new((10, 10), 1.0, 10.0);
        // Two pixels touching by a corner
        det.set(2, 2, 1.0);
        det.set(3, 3, 1.0);
        let eight = extract_spots(&det, &SpotExtractionConfig::default());
        assert_eq!(eight.len(), 1);
        assert_eq!((eight[0].u, eight[0].v), (2.5, 2.5));
        let four = extract_spots(
            &det,
            &SpotExtractionConfig {
                use_8_connectivity: false,
                ..Default::default()
            },
        );
        assert_eq!(four.len(), 2);
    }

    #[test]
    fn test_u_shaped_blob_is_merged() {
        let mut det = RegArrayDetector2d::new((10, 10), 1.0, 10.0);
        // Two arms joined at the bottom: labels must be unified
        for u in 1..5 {
            det.set(u, 1, 1.0);
            det.set(u, 5, 1.0);
        }
        for v in 1..6 {
            det.set(5, v, 1.0);
        }
        let spots = extract_spots(&det, &SpotExtractionConfig::default());
        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].intensity, Some(13.0));
    }

    #[test]
    fn test_size_filters() {
        let mut det = RegArrayDetector2d::new((20, 20), 1.0, 10.0);
        det.set(2, 2, 5.0);
        add_to_image(&mut det.data, det.size, 1.0, 2, (12.0, 12.0));
        let config = SpotExtractionConfig {
            min_pixels: 2,
            ..Default::default()
        };
        let spots = extract_spots(&det, &config);
        assert_eq!(spots.len(), 1);
        assert_eq!((spots[0].u, spots[0].v), (12.0, 12.0));

        let config = SpotExtractionConfig {
            max_spots: Some(1),
            ..Default::default()
        };
        assert_eq!(extract_spots(&det, &config).len(), 1);
    }
}
