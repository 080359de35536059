//! Laue pattern renderer.
//!
//! Every plane of the candidate list selects its own wavelength from the
//! white beam; the diffracted beam is projected onto the detector and a
//! square spot is stamped at the impact. Spot values encode either a
//! constant, the diffracted energy or the diffracted intensity.

use std::str::FromStr;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::crystal::{HklDirection, HklPlane, Orientation};
use crate::detector::RegArrayDetector2d;
use crate::diffraction::{diffracted_intensity, diffracted_vector, select_lambda, zone_axis_ellipse};
use crate::error::{LaueError, Result};
use crate::scattering::ScatteringLibrary;
use crate::Vector3;

/// Saturation value of an 8-bit image.
pub const MAX_VAL: f32 = 255.0;

/// Meaning of the pixel values written into the spots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorField {
    /// Every spot gets the saturation value.
    #[default]
    Constant,
    /// Spot value is the diffracted energy in keV.
    Energy,
    /// Spot value is `255 · f(q)/f(0)` from the element's scattering table.
    Intensity,
}

impl FromStr for ColorField {
    type Err = LaueError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "constant" => Ok(Self::Constant),
            "energy" => Ok(Self::Energy),
            "intensity" => Ok(Self::Intensity),
            _ => Err(LaueError::UnsupportedColorField(s.to_string())),
        }
    }
}

/// Energy window of the incident spectrum, in keV.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyBand {
    pub min_kev: f64,
    pub max_kev: f64,
}

impl EnergyBand {
    pub fn new(min_kev: f64, max_kev: f64) -> Self {
        Self { min_kev, max_kev }
    }

    /// Band spanning the energies listed in a spectrum. `None` if it is empty.
    pub fn from_spectrum(energies: &[f64]) -> Option<Self> {
        let min = energies.iter().copied().reduce(f64::min)?;
        let max = energies.iter().copied().reduce(f64::max)?;
        Some(Self::new(min, max))
    }

    #[inline]
    pub fn contains(&self, energy_kev: f64) -> bool {
        energy_kev >= self.min_kev && energy_kev <= self.max_kev
    }
}

/// Rendering options for [`compute_laue_pattern`].
#[derive(Debug, Clone)]
pub struct PatternConfig {
    /// Unit vector of the incident beam. Default +X.
    pub incident: Vector3,
    /// Only reflections whose energy falls in this band are drawn. Default: all.
    pub energy_band: Option<EnergyBand>,
    /// Half side of the square spot in pixels. Default 5.
    pub spot_radius: usize,
    /// Pixel value encoding. Default constant.
    pub color_field: ColorField,
    /// Clip to 8 bits and invert the image. Default false.
    pub inverted: bool,
    /// Stamp a 3× saturated spot at the reference pixel. Default false.
    pub show_direct_beam: bool,
    /// Reflections below this Bragg angle (degrees) are ignored. Default 0.1.
    pub min_theta_deg: f64,
    /// Zone axes whose diffraction ellipse is drawn. Default none.
    pub zone_axes: Vec<HklDirection>,
    /// Number of points per ellipse. Default 101.
    pub ellipse_points: usize,
    /// Element whose table is looked up in the [`ScatteringLibrary`] for the
    /// intensity encoding. Default "Ni".
    pub element: String,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            incident: Vector3::x(),
            energy_band: None,
            spot_radius: 5,
            color_field: ColorField::Constant,
            inverted: false,
            show_direct_beam: false,
            min_theta_deg: 0.1,
            zone_axes: Vec::new(),
            ellipse_points: 101,
            element: "Ni".to_string(),
        }
    }
}

/// Render a transmission Laue pattern into `detector.data` and return a copy.
///
/// The detector buffer is reset first. `library` is only needed for
/// [`ColorField::Intensity`], where the table of `config.element` is loaded
/// from it on first use.
pub fn compute_laue_pattern(
    orientation: &Orientation,
    detector: &mut RegArrayDetector2d,
    planes: &[HklPlane],
    config: &PatternConfig,
    library: Option<&mut ScatteringLibrary>,
) -> Result<Vec<f32>> {
    let t0 = Instant::now();
    let missing = || LaueError::MissingScatteringTable(config.element.clone());
    let table = match config.color_field {
        ColorField::Intensity => {
            let library = library.ok_or_else(missing)?;
            let table = library.load(&config.element).map_err(|e| {
                warn!("{e:#}");
                missing()
            })?;
            Some(table)
        }
        _ => None,
    };

    detector.clear();
    let size = detector.size;
    if config.show_direct_beam {
        let center = (detector.ucen, detector.vcen);
        add_to_image(&mut detector.data, size, 3.0 * MAX_VAL, config.spot_radius, center);
    }
    if let Some(band) = &config.energy_band {
        debug!("Energy band [{:.1}, {:.1}] keV", band.min_kev, band.max_kev);
    }

    let origin = Vector3::zeros();
    let mut num_spots = 0usize;
    for plane in planes {
        let reflection = select_lambda(plane, orientation, &config.incident);
        // Backward solution; its Friedel mate draws the same spot
        if reflection.theta <= 0.0 {
            continue;
        }
        let energy = reflection.energy_kev.abs();
        if config.energy_band.is_some_and(|band| !band.contains(energy)) {
            debug!("Skipping {plane} which would diffract at {energy:.1} keV");
            continue;
        }
        let Some(k) = diffracted_vector(plane, orientation, &config.incident, config.min_theta_deg)? else {
            continue;
        };
        if k.dot(&detector.w_dir) == 0.0 {
            continue;
        }
        let Some(r) = detector.project_along_direction(&k, &origin) else {
            continue;
        };
        let (u, v) = detector.lab_to_pixel(&r);
        let value = match config.color_field {
            ColorField::Constant => MAX_VAL,
            ColorField::Energy => energy as f32,
            ColorField::Intensity => match table {
                Some(table) => diffracted_intensity(plane, MAX_VAL as f64, table) as f32,
                None => return Err(missing()),
            },
        };
        if detector.contains(u, v) {
            debug!(
                "{plane} hits ({u:.1}, {v:.1}) px at {energy:.1} keV, theta={:.2} deg",
                reflection.theta.to_degrees()
            );
            num_spots += 1;
        }
        add_to_image(&mut detector.data, size, value, config.spot_radius, (u, v));
    }

    for zone_axis in &config.zone_axes {
        let Some(points) = zone_axis_ellipse(
            orientation,
            detector,
            zone_axis,
            &config.incident,
            config.ellipse_points,
        ) else {
            continue;
        };
        for p in points {
            let (u, v) = detector.lab_to_pixel(&p);
            if detector.contains(u, v) {
                detector.set(u as usize, v as usize, MAX_VAL);
            }
        }
    }

    if config.inverted {
        for value in detector.data.iter_mut() {
            let byte = value.clamp(0.0, MAX_VAL) as u8;
            *value = (!byte) as f32;
        }
    }

    info!(
        "Rendered {num_spots} spots from {} planes in {:.1} ms",
        planes.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(detector.data.clone())
}

/// Add a square spot of side `2·radius + 1` filled with `value` to an image.
///
/// The center is truncated to integer pixels; the part of the spot outside
/// the image is dropped, as is a spot with a non-finite center. Overlapping
/// spots accumulate.
pub fn add_to_image(data: &mut [f32], size: (usize, usize), value: f32, radius: usize, center: (f64, f64)) {
    if !(center.0.is_finite() && center.1.is_finite()) {
        return;
    }
    let (nu, nv) = (size.0 as i64, size.1 as i64);
    // Float to int casts saturate at the i64 bounds
    let (cu, cv) = (center.0 as i64, center.1 as i64);
    let r = i64::try_from(radius).unwrap_or(i64::MAX);
    let (u0, u1) = (cu.saturating_sub(r).max(0), cu.saturating_add(r).saturating_add(1).min(nu));
    let (v0, v1) = (cv.saturating_sub(r).max(0), cv.saturating_add(r).saturating_add(1).min(nv));
    for u in u0..u1 {
        let row = u as usize * size.1;
        for v in v0..v1 {
            data[row + v as usize] += value;
        }
    }
}
