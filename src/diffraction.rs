//! Diffraction geometry: wavelength selection, diffracted wave vectors,
//! zone-axis ellipses and rotating-crystal (DCT) Bragg conditions.
//!
//! Wave vectors are in nm⁻¹ without the 2π factor, so `|k| = 1/λ`.

use std::f64::consts::{FRAC_PI_2, PI};

use tracing::debug;

use crate::crystal::{HklDirection, HklPlane, Orientation};
use crate::detector::RegArrayDetector2d;
use crate::error::{LaueError, Result};
use crate::scattering::ScatteringTable;
use crate::{Matrix3, Vector3};

/// λ[nm] · E[keV]
pub const KEV_NM: f64 = 1.2398;

/// Maximum disagreement (radians) tolerated between the glancing and Bragg angles.
const BRAGG_CONSISTENCY_TOL: f64 = 1e-6;

#[inline]
pub fn lambda_kev_to_nm(energy_kev: f64) -> f64 {
    KEV_NM / energy_kev
}

#[inline]
pub fn lambda_nm_to_kev(lambda_nm: f64) -> f64 {
    KEV_NM / lambda_nm
}

/// Energy and glancing angle selected by a lattice plane in a white beam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reflection {
    /// Selected energy in keV. Negative when `theta` is negative.
    pub energy_kev: f64,
    /// Glancing angle between the incident beam and the plane (radians).
    pub theta: f64,
}

/// Scattering vector of `plane` expressed in the lab frame (`gᵀ · G_c`).
#[inline]
pub fn lab_scattering_vector(plane: &HklPlane, orientation: &Orientation) -> Vector3 {
    orientation.orientation_matrix().transpose() * plane.scattering_vector()
}

/// Select the wavelength diffracted by `plane` for a polychromatic beam along `incident`.
///
/// The glancing angle is `arccos(X·Ĝs) − π/2`. A non-positive angle means
/// the plane cannot diffract forward; the result is still returned and
/// callers are expected to skip it.
pub fn select_lambda(plane: &HklPlane, orientation: &Orientation, incident: &Vector3) -> Reflection {
    let gs = lab_scattering_vector(plane, orientation);
    let cos_angle = incident.dot(&gs.normalize()).clamp(-1.0, 1.0);
    let theta = cos_angle.acos() - FRAC_PI_2;
    let lambda = 2.0 * plane.interplanar_spacing() * theta.sin();
    Reflection {
        energy_kev: lambda_nm_to_kev(lambda),
        theta,
    }
}

/// Diffracted wave vector `X/λ + Gs` for `plane`, or `None` when the Bragg
/// angle is below `min_theta_deg`.
///
/// Fails with [`LaueError::ModelConsistency`] if the plane's own Bragg angle
/// at the selected energy disagrees with the glancing angle.
pub fn diffracted_vector(
    plane: &HklPlane,
    orientation: &Orientation,
    incident: &Vector3,
    min_theta_deg: f64,
) -> Result<Option<Vector3>> {
    let reflection = select_lambda(plane, orientation, incident);
    if reflection.theta.abs() < min_theta_deg.to_radians() {
        return Ok(None);
    }
    let bragg = plane.bragg_angle(reflection.energy_kev);
    if !((reflection.theta - bragg).abs() < BRAGG_CONSISTENCY_TOL) {
        let [h, k, l] = plane.miller_indices();
        return Err(LaueError::ModelConsistency {
            h,
            k,
            l,
            glancing: reflection.theta,
            bragg,
        });
    }
    let lambda = lambda_kev_to_nm(reflection.energy_kev);
    Ok(Some(incident / lambda + lab_scattering_vector(plane, orientation)))
}

/// Diffracted intensity `I0 · f(q)/f(0)` with `q = 1/(2·d_hkl)`.
pub fn diffracted_intensity(plane: &HklPlane, i0: f64, table: &ScatteringTable) -> f64 {
    let q = 1.0 / (2.0 * plane.interplanar_spacing());
    i0 * table.relative_factor(q)
}

// ── Zone-axis ellipse ───────────────────────────────────────────────────────

/// Points of the ellipse along which every plane of `zone_axis` diffracts.
///
/// The detector is assumed normal to X; `incident` may be tilted. Points
/// are lab positions (mm) in the detector plane, the first one at the far
/// end of the major axis. Returns `None` when the zone axis is parallel to
/// the detector or the conic is not an ellipse.
pub fn zone_axis_ellipse(
    orientation: &Orientation,
    detector: &RegArrayDetector2d,
    zone_axis: &HklDirection,
    incident: &Vector3,
    n: usize,
) -> Option<Vec<Vector3>> {
    let origin = Vector3::zeros();
    let mut za = orientation.orientation_matrix().transpose() * zone_axis.direction();
    // The zone axis is a line; take the half facing the detector
    if za.dot(&detector.w_dir) < 0.0 {
        za = -za;
    }
    let oa = detector.project_along_direction(&za, &origin)?;
    let on = detector.project_along_direction(&detector.w_dir, &origin)?;
    let na = oa - on;

    let psi = za.cross(incident).norm().atan2(za.dot(incident));
    let nu = za.cross(&detector.w_dir).norm().atan2(za.dot(&detector.w_dir));
    let e = nu.sin() / psi.cos();
    if !(0.0..1.0).contains(&e) {
        debug!("zone axis {:?}: eccentricity {e:.3}, not an ellipse", zone_axis.indices());
        return None;
    }
    let eta = FRAC_PI_2 - na.y.atan2(na.z);
    let factor = nu.tan() + (psi - nu).tan() + psi.sin() / (nu.cos() * (psi + nu).cos());
    let a = 0.5 * on.norm() * factor;
    let b = a * (1.0 - e * e).sqrt();
    // N and A lie on the major axis; shift so that N sits at distance NX from its end
    let nx = on.norm() * (psi - nu).tan();
    let shift = a - nx;
    debug!(
        "zone axis {:?}: psi={:.2} deg, nu={:.2} deg, a={a:.2} mm, b={b:.2} mm",
        zone_axis.indices(),
        psi.to_degrees(),
        nu.to_degrees()
    );

    let (sin_eta, cos_eta) = eta.sin_cos();
    let steps = n.max(2) - 1;
    let points = (0..=steps)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / steps as f64;
            let (x, y) = (a * t.cos(), b * t.sin());
            let py = cos_eta * x - sin_eta * y + shift * cos_eta;
            let pz = sin_eta * x + cos_eta * y + shift * sin_eta;
            on + Vector3::new(0.0, py, pz)
        })
        .collect();
    Some(points)
}

// ── Rotating crystal (DCT) geometry ─────────────────────────────────────────

/// Rotation of the sample stage by `omega_deg` about the lab Z axis.
pub fn omega_rotation(omega_deg: f64) -> Matrix3 {
    let (s, c) = omega_deg.to_radians().sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Solve `a·cos(ω) + b·sin(ω) = c` for ω.
///
/// Returns both solutions in degrees within [0, 360), or `None` when there is none.
pub fn solve_trig_equation(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    let delta = 4.0 * (a * a + b * b - c * c);
    if delta < 0.0 {
        return None;
    }
    let half_root = 0.5 * delta.sqrt();
    let w1 = 2.0 * (b - half_root).atan2(a + c);
    let w2 = 2.0 * (b + half_root).atan2(a + c);
    Some((
        w1.to_degrees().rem_euclid(360.0),
        w2.to_degrees().rem_euclid(360.0),
    ))
}

/// The two stage rotations (degrees) that bring `plane` into Bragg condition
/// for a monochromatic beam along X.
pub fn dct_omega_angles(plane: &HklPlane, orientation: &Orientation, energy_kev: f64) -> Option<(f64, f64)> {
    let lambda = lambda_kev_to_nm(energy_kev);
    let gs = lab_scattering_vector(plane, orientation);
    let theta = plane.bragg_angle(energy_kev);
    if theta.is_nan() {
        // λ > 2d: the plane cannot diffract at this energy
        return None;
    }
    let a = gs.x;
    let b = -gs.y;
    let c = -2.0 * theta.sin().powi(2) / lambda;
    solve_trig_equation(a, b, c)
}

/// Diffracted wave vector for a monochromatic beam along X after rotating
/// the stage by `omega_deg`.
pub fn dct_diffracted_vector(
    plane: &HklPlane,
    orientation: &Orientation,
    energy_kev: f64,
    omega_deg: f64,
) -> Vector3 {
    let lambda = lambda_kev_to_nm(energy_kev);
    let gs = omega_rotation(omega_deg) * lab_scattering_vector(plane, orientation);
    Vector3::x() / lambda + gs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crystal::{build_list, Lattice};

    #[test]
    fn test_wavelength_conversion() {
        assert!((lambda_kev_to_nm(12.398) - 0.1).abs() < 1e-12);
        assert!((lambda_nm_to_kev(lambda_kev_to_nm(37.5)) - 37.5).abs() < 1e-12);
    }

    #[test]
    fn test_select_lambda_bragg_law() {
        let ni = Lattice::cubic(0.3524);
        let o = Orientation::from_euler(10.0, 20.0, 30.0);
        for plane in build_list(&ni, 2, None) {
            let r = select_lambda(&plane, &o, &Vector3::x());
            if r.theta.abs() < 1e-3 {
                continue;
            }
            let lambda = lambda_kev_to_nm(r.energy_kev);
            let d = plane.interplanar_spacing();
            assert!(
                (lambda - 2.0 * d * r.theta.sin()).abs() < 1e-12,
                "{plane}: Bragg law violated"
            );
        }
    }

    #[test]
    fn test_diffracted_vector_is_elastic_and_consistent() {
        let ni = Lattice::cubic(0.3524);
        let o = Orientation::from_euler(45.0, 30.0, 10.0);
        let mut count = 0;
        for plane in build_list(&ni, 3, None) {
            let r = select_lambda(&plane, &o, &Vector3::x());
            let Some(k) = diffracted_vector(&plane, &o, &Vector3::x(), 0.1).unwrap() else {
                assert!(r.theta.abs() < 0.1f64.to_radians());
                continue;
            };
            let lambda = lambda_kev_to_nm(r.energy_kev).abs();
            assert!(
                (k.norm() - 1.0 / lambda).abs() * lambda < 1e-9,
                "{plane}: |k| should be 1/lambda"
            );
            assert!((plane.bragg_angle(r.energy_kev) - r.theta).abs() < 1e-6);
            count += 1;
        }
        assert!(count > 100);
    }

    #[test]
    fn test_grazing_plane_is_skipped() {
        // (0 1 0) in the cube orientation is parallel to the beam: theta = 0
        let lat = Lattice::cubic(0.4);
        let plane = HklPlane::new(0, 1, 0, &lat);
        let k = diffracted_vector(&plane, &Orientation::cube(), &Vector3::x(), 0.1).unwrap();
        assert!(k.is_none());
    }

    #[test]
    fn test_diffraction_angle_is_two_theta() {
        let lat = Lattice::cubic(0.4);
        let plane = HklPlane::new(-1, 2, 3, &lat);
        let o = Orientation::cube();
        let r = select_lambda(&plane, &o, &Vector3::x());
        assert!(r.theta > 0.0);
        let k = diffracted_vector(&plane, &o, &Vector3::x(), 0.1).unwrap().unwrap();
        let two_theta = k.normalize().dot(&Vector3::x()).acos();
        assert!((two_theta - 2.0 * r.theta).abs() < 1e-9);
    }

    #[test]
    fn test_zone_axis_ellipse_contains_zone_spots() {
        let lat = Lattice::cubic(0.4);
        let o = Orientation::cube();
        let det = RegArrayDetector2d::new((2048, 2048), 0.1, 100.0);
        let za = HklDirection::new(2, 0, 1, &lat);
        let ellipse = zone_axis_ellipse(&o, &det, &za, &Vector3::x(), 101).expect("ellipse");
        assert_eq!(ellipse.len(), 101);
        // Normal incidence: the ellipse passes through the direct beam at t = pi
        assert!((ellipse[50] - Vector3::new(100.0, 0.0, 0.0)).norm() < 1e-9);

        // Spot of a plane of the [2 0 1] zone (2h + l = 0)
        let plane = HklPlane::new(-1, 1, 2, &lat);
        let k = diffracted_vector(&plane, &o, &Vector3::x(), 0.1).unwrap().unwrap();
        let spot = det.project_along_direction(&k, &Vector3::zeros()).unwrap();

        // Express the spot in the ellipse frame and check the conic equation
        let psi = (2.0 / 5f64.sqrt()).acos();
        let a = 0.5 * 100.0 * (2.0 * psi).tan();
        let b = a * (1.0 - psi.tan().powi(2)).sqrt();
        let far = ellipse[0] - Vector3::new(100.0, 0.0, 0.0);
        let axis = far.normalize();
        let rel = spot - Vector3::new(100.0, 0.0, 0.0);
        let x = rel.dot(&axis) - a;
        let y = (rel - rel.dot(&axis) * axis).norm();
        let value = (x / a).powi(2) + (y / b).powi(2);
        assert!((value - 1.0).abs() < 1e-9, "spot off the ellipse: {value}");
    }

    #[test]
    fn test_solve_trig_equation() {
        let (a, b, c) = (0.3, -1.2, 0.5);
        let (w1, w2) = solve_trig_equation(a, b, c).unwrap();
        for w in [w1, w2] {
            let r = w.to_radians();
            assert!((a * r.cos() + b * r.sin() - c).abs() < 1e-12, "omega={w}");
            assert!((0.0..360.0).contains(&w));
        }
        assert!(solve_trig_equation(0.1, 0.1, 1.0).is_none());
    }

    #[test]
    fn test_dct_bragg_condition() {
        let al = Lattice::cubic(0.40495);
        let o = Orientation::from_euler(20.0, 35.0, 50.0);
        let energy = 40.0;
        let lambda = lambda_kev_to_nm(energy);
        let mut solved = 0;
        for plane in build_list(&al, 2, None) {
            let Some((w1, w2)) = dct_omega_angles(&plane, &o, energy) else {
                continue;
            };
            for w in [w1, w2] {
                let k = dct_diffracted_vector(&plane, &o, energy, w);
                assert!(
                    (k.norm() * lambda - 1.0).abs() < 1e-9,
                    "{plane} at omega={w:.3}: |k| = {}",
                    k.norm()
                );
            }
            solved += 1;
        }
        assert!(solved > 0);
    }
}
