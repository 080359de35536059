//! Gnomonic projection of Laue spots.
//!
//! In the gnomonic plane the spots of planes sharing a zone axis fall on a
//! straight line, and the projected point of a spot is, up to sign, the
//! direction of the reflecting plane normal. This turns detector spots into
//! the plane-normal directions consumed by the indexer.

use std::f64::consts::FRAC_PI_2;

use tracing::{debug, info, warn};

use crate::detector::{DetectorSpot, RegArrayDetector2d};
use crate::Vector3;

/// Gnomonic projection of a lab point, incident beam along X.
///
/// Returns `None` for a point on the beam axis (`r = 0`), where the
/// projection is undefined.
pub fn gnomonic_projection_point(point: &Vector3) -> Option<Vector3> {
    let r = point.y.hypot(point.z);
    if r == 0.0 {
        return None;
    }
    let theta = 0.5 * (r / point.x).atan();
    let p = point.x * (FRAC_PI_2 - theta).tan();
    Some(Vector3::new(point.x, -point.y * p / r, -point.z * p / r))
}

/// Inverse of [`gnomonic_projection_point`]: back from the gnomonic plane to
/// the detector plane. `None` on the beam axis.
pub fn gnomonic_inverse_point(point: &Vector3) -> Option<Vector3> {
    let p = point.y.hypot(point.z);
    if p == 0.0 {
        return None;
    }
    let theta = (point.x / p).atan();
    let r = point.x * (2.0 * theta).tan();
    Some(Vector3::new(point.x, -point.y * r / p, -point.z * r / p))
}

/// Gnomonic projection of a lab point about an arbitrary projection center
/// `oc` (the impact of the direct beam on the detector).
///
/// Returns `None` when the point lies on the beam axis or the geometry is
/// degenerate.
pub fn gnomonic_projection_point_oc(point: &Vector3, oc: &Vector3) -> Option<Vector3> {
    let cr = point - oc;
    let r = cr.y.hypot(cr.z);
    let (oc_norm, cr_norm, point_norm) = (oc.norm(), cr.norm(), point.norm());
    if r == 0.0 || oc_norm == 0.0 || point_norm == 0.0 {
        return None;
    }
    let u_oc = oc / oc_norm;
    let u_cr = cr / cr_norm;
    // atan2 form keeps precision near 0 and π
    let alpha = u_oc.cross(&u_cr).norm().atan2(u_oc.dot(&u_cr)) - FRAC_PI_2;
    let theta = 0.5 * u_oc.dot(&(point / point_norm)).clamp(-1.0, 1.0).acos();
    let denom = (theta - alpha).sin();
    if denom == 0.0 {
        return None;
    }
    let p = oc_norm * theta.cos() / denom;
    Some(Vector3::new(
        point.x,
        oc.y - cr.y * p / r,
        oc.z - cr.z * p / r,
    ))
}

/// Project a series of points, each independently. With `oc = None` the
/// on-axis formula is used.
pub fn gnomonic_projection_points(points: &[Vector3], oc: Option<&Vector3>) -> Vec<Option<Vector3>> {
    points
        .iter()
        .map(|p| match oc {
            Some(oc) => gnomonic_projection_point_oc(p, oc),
            None => gnomonic_projection_point(p),
        })
        .collect()
}

/// Unit directions of the gnomonic points of detector spots.
///
/// These are the (negated) normals of the reflecting planes in the lab
/// frame. Spots on the beam axis cannot be projected and are dropped.
pub fn spot_normals(detector: &RegArrayDetector2d, spots: &[DetectorSpot], oc: Option<&Vector3>) -> Vec<Vector3> {
    let points: Vec<Vector3> = spots.iter().map(|s| detector.pixel_to_lab(s.u, s.v)).collect();
    let projected = gnomonic_projection_points(&points, oc);
    let mut normals = Vec::with_capacity(spots.len());
    for (spot, gp) in spots.iter().zip(projected) {
        match gp.and_then(|g| g.try_normalize(0.0)) {
            Some(n) => normals.push(n),
            None => debug!("Spot at ({:.1}, {:.1}) lies on the beam axis, dropped", spot.u, spot.v),
        }
    }
    normals
}

// ── Whole image ─────────────────────────────────────────────────────────────

/// Options for [`gnomonic_projection`].
#[derive(Debug, Clone)]
pub struct GnomonicConfig {
    /// Pixel size of the projected image in mm. Default: inverse of the detector pixel size.
    pub pixel_size: Option<f64>,
    /// Pixels with exactly this value are projected. Default 255.
    pub hit_value: f32,
    /// Value written at each projected pixel. Default 1.
    pub mark_value: f32,
}

impl Default for GnomonicConfig {
    fn default() -> Self {
        Self {
            pixel_size: None,
            hit_value: 255.0,
            mark_value: 1.0,
        }
    }
}

/// Gnomonic projection of a whole detector image.
///
/// Every pixel equal to `hit_value` is projected with the on-axis formula
/// into a virtual detector of the same size and position. The beam axis
/// lands at the center of the virtual detector. Projected pixels falling
/// outside of it are moved to its center and counted.
pub fn gnomonic_projection(detector: &RegArrayDetector2d, config: &GnomonicConfig) -> RegArrayDetector2d {
    let mut gnom = detector.clone();
    gnom.pixel_size = config.pixel_size.unwrap_or(1.0 / detector.pixel_size);
    gnom.ucen = gnom.size.0 as f64 / 2.0 + gnom.ref_pos.dot(&gnom.u_dir) / gnom.pixel_size;
    gnom.vcen = gnom.size.1 as f64 / 2.0 + gnom.ref_pos.dot(&gnom.v_dir) / gnom.pixel_size;
    gnom.clear();

    let (nu, nv) = detector.size;
    if nu == 0 || nv == 0 {
        debug!("Empty detector, nothing to project");
        return gnom;
    }
    let (max_u, max_v) = ((nu - 1) as f64, (nv - 1) as f64);
    let in_range = |u: f64, v: f64| (0.0..=max_u).contains(&u) && (0.0..=max_v).contains(&v);

    let mut num_hits = 0usize;
    let mut num_clamped = 0usize;
    let mut num_skipped = 0usize;
    for u in 0..nu {
        for v in 0..nv {
            if detector.get(u, v) != config.hit_value {
                continue;
            }
            num_hits += 1;
            let point = detector.pixel_to_lab(u as f64, v as f64);
            let Some(g) = gnomonic_projection_point(&point) else {
                debug!("Pixel ({u}, {v}) lies on the beam axis, not projected");
                num_skipped += 1;
                continue;
            };
            let (mut ug, mut vg) = gnom.lab_to_pixel(&g);
            if !in_range(ug, vg) {
                debug!("Projected pixel ({ug:.1}, {vg:.1}) outside the image, moved to the center");
                num_clamped += 1;
                (ug, vg) = (gnom.ucen, gnom.vcen);
                if !in_range(ug, vg) {
                    num_skipped += 1;
                    continue;
                }
            }
            gnom.set(ug as usize, vg as usize, config.mark_value);
        }
    }

    if num_clamped > 0 {
        warn!("{num_clamped} of {num_hits} projected pixels fell outside the gnomonic image");
    }
    info!(
        "Gnomonic projection: {num_hits} hit pixels, {num_clamped} clamped, {num_skipped} skipped"
    );
    gnom
}
