//! Experiment description and forward simulation.
//!
//! An [`Experiment`] ties an X-ray source, a single-crystal sample and one or
//! more detectors together. [`Experiment::forward_simulation`] renders the
//! expected image of the active detector for a [`Simulation`]: a white-beam
//! Laue pattern or a monochromatic rotating-crystal (DCT) pattern.

use tracing::{debug, info, warn};

use crate::crystal::{HklPlane, Lattice, Orientation};
use crate::detector::RegArrayDetector2d;
use crate::diffraction::{dct_diffracted_vector, dct_omega_angles};
use crate::error::{LaueError, Result};
use crate::pattern::{add_to_image, compute_laue_pattern, EnergyBand, PatternConfig, MAX_VAL};
use crate::scattering::ScatteringLibrary;
use crate::Vector3;

// ── Source and sample ───────────────────────────────────────────────────────

/// X-ray source emitting along +X.
#[derive(Debug, Clone, PartialEq)]
pub struct XraySource {
    /// Position in the lab frame (mm).
    pub position: Vector3,
    /// Lower bound of the spectrum in keV.
    pub min_energy: Option<f64>,
    /// Upper bound of the spectrum in keV.
    pub max_energy: Option<f64>,
}

impl Default for XraySource {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            min_energy: None,
            max_energy: None,
        }
    }
}

impl XraySource {
    /// Make the source monochromatic.
    pub fn set_energy(&mut self, energy_kev: f64) {
        self.min_energy = Some(energy_kev);
        self.max_energy = Some(energy_kev);
    }

    /// Set the spectrum bounds. A negative minimum is clamped to 0.
    pub fn set_energy_range(&mut self, min_kev: f64, max_kev: f64) {
        let min_kev = if min_kev < 0.0 {
            warn!("Minimum energy must be positive, got {min_kev} keV; using 0");
            0.0
        } else {
            min_kev
        };
        self.min_energy = Some(min_kev);
        self.max_energy = Some(max_kev);
    }

    /// The spectrum as an energy band, if both bounds are set.
    pub fn energy_band(&self) -> Option<EnergyBand> {
        Some(EnergyBand::new(self.min_energy?, self.max_energy?))
    }
}

/// A single crystal placed in the beam.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    /// Position in the lab frame (mm).
    pub position: Vector3,
    pub lattice: Lattice,
    pub orientation: Orientation,
}

impl Sample {
    /// Sample at the origin of the lab frame.
    pub fn new(name: &str, lattice: Lattice, orientation: Orientation) -> Self {
        Self {
            name: name.to_string(),
            position: Vector3::zeros(),
            lattice,
            orientation,
        }
    }
}

// ── Simulations ─────────────────────────────────────────────────────────────

/// White-beam Laue simulation. The energy band of the pattern config is
/// replaced by the source spectrum when the latter is set.
#[derive(Debug, Clone)]
pub struct LaueSimulation {
    pub planes: Vec<HklPlane>,
    pub pattern: PatternConfig,
}

/// Options of a rotating-crystal simulation.
#[derive(Debug, Clone)]
pub struct DctConfig {
    /// Lower bound of the stage rotation window, degrees. Default 0.
    pub omega_min: f64,
    /// Upper bound of the stage rotation window, degrees. Default 360.
    pub omega_max: f64,
    /// Half side of the square spot in pixels. Default 3.
    pub spot_radius: usize,
}

impl Default for DctConfig {
    fn default() -> Self {
        Self {
            omega_min: 0.0,
            omega_max: 360.0,
            spot_radius: 3,
        }
    }
}

/// Monochromatic rotating-crystal simulation: every reflection reaching the
/// Bragg condition within the ω window is drawn.
#[derive(Debug, Clone)]
pub struct DctSimulation {
    pub planes: Vec<HklPlane>,
    pub config: DctConfig,
}

/// The simulations an [`Experiment`] knows how to run.
#[derive(Debug, Clone)]
pub enum Simulation {
    Laue(LaueSimulation),
    Dct(DctSimulation),
}

// ── Experiment ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Experiment {
    pub source: XraySource,
    pub sample: Sample,
    pub detectors: Vec<RegArrayDetector2d>,
    pub active_detector: usize,
}

impl Experiment {
    pub fn new(source: XraySource, sample: Sample) -> Self {
        Self {
            source,
            sample,
            detectors: Vec::new(),
            active_detector: 0,
        }
    }

    /// Add a detector, optionally making it the active one.
    pub fn add_detector(&mut self, detector: RegArrayDetector2d, set_active: bool) {
        self.detectors.push(detector);
        if set_active {
            self.active_detector = self.detectors.len() - 1;
        }
    }

    pub fn active_detector(&self) -> Result<&RegArrayDetector2d> {
        self.detectors.get(self.active_detector).ok_or(LaueError::NoDetector)
    }

    pub fn active_detector_mut(&mut self) -> Result<&mut RegArrayDetector2d> {
        self.detectors.get_mut(self.active_detector).ok_or(LaueError::NoDetector)
    }

    /// Render the expected image of the active detector.
    ///
    /// The image is written into the detector buffer and a copy is returned.
    /// `library` supplies the scattering tables of the intensity encoding.
    pub fn forward_simulation(
        &mut self,
        simulation: &Simulation,
        library: Option<&mut ScatteringLibrary>,
    ) -> Result<Vec<f32>> {
        info!("Forward simulation for sample {}", self.sample.name);
        match simulation {
            Simulation::Laue(sim) => self.simulate_laue(sim, library),
            Simulation::Dct(sim) => self.simulate_dct(sim),
        }
    }

    fn simulate_laue(&mut self, sim: &LaueSimulation, library: Option<&mut ScatteringLibrary>) -> Result<Vec<f32>> {
        let mut config = sim.pattern.clone();
        if let Some(band) = self.source.energy_band() {
            config.energy_band = Some(band);
        }
        let orientation = self.sample.orientation;
        let detector = self.active_detector_mut()?;
        compute_laue_pattern(&orientation, detector, &sim.planes, &config, library)
    }

    fn simulate_dct(&mut self, sim: &DctSimulation) -> Result<Vec<f32>> {
        let energy = match (self.source.min_energy, self.source.max_energy) {
            (Some(min), Some(max)) if min == max => min,
            (Some(min_kev), Some(max_kev)) => return Err(LaueError::NotMonochromatic { min_kev, max_kev }),
            _ => return Err(LaueError::EnergyNotSet),
        };
        let orientation = self.sample.orientation;
        let origin = self.sample.position;
        let config = &sim.config;
        let detector = self.active_detector_mut()?;
        detector.clear();
        let size = detector.size;

        let mut num_spots = 0usize;
        for plane in &sim.planes {
            let Some((w1, w2)) = dct_omega_angles(plane, &orientation, energy) else {
                continue;
            };
            for omega in [w1, w2] {
                if omega < config.omega_min || omega > config.omega_max {
                    continue;
                }
                let k = dct_diffracted_vector(plane, &orientation, energy, omega);
                let Some(r) = detector.project_along_direction(&k, &origin) else {
                    continue;
                };
                let (u, v) = detector.lab_to_pixel(&r);
                if detector.contains(u, v) {
                    debug!("{plane} at omega={omega:.2} deg hits ({u:.1}, {v:.1}) px");
                    num_spots += 1;
                }
                add_to_image(&mut detector.data, size, MAX_VAL, config.spot_radius, (u, v));
            }
        }
        info!("DCT simulation at {energy:.1} keV: {num_spots} spots on the detector");
        Ok(detector.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crystal::{build_list, Extinction};
    use crate::pattern::ColorField;
    use crate::scattering::ScatteringTable;

    fn nickel_experiment() -> Experiment {
        let lattice = Lattice::cubic(0.3524);
        let sample = Sample::new("Ni", lattice, Orientation::from_euler(10.0, 20.0, 30.0));
        let mut exp = Experiment::new(XraySource::default(), sample);
        exp.add_detector(RegArrayDetector2d::new((512, 512), 0.4, 100.0), true);
        exp
    }

    #[test]
    fn test_energy_range() {
        let mut source = XraySource::default();
        assert!(source.energy_band().is_none());
        source.set_energy_range(-5.0, 80.0);
        assert_eq!(source.min_energy, Some(0.0));
        assert_eq!(source.energy_band(), Some(EnergyBand::new(0.0, 80.0)));
        source.set_energy(40.0);
        assert_eq!(source.energy_band(), Some(EnergyBand::new(40.0, 40.0)));
    }

    #[test]
    fn test_active_detector() {
        let sample = Sample::new("Al", Lattice::cubic(0.405), Orientation::cube());
        let mut exp = Experiment::new(XraySource::default(), sample);
        assert!(matches!(exp.active_detector(), Err(LaueError::NoDetector)));
        exp.add_detector(RegArrayDetector2d::new((10, 10), 1.0, 10.0), true);
        exp.add_detector(RegArrayDetector2d::new((20, 20), 1.0, 10.0), false);
        assert_eq!(exp.active_detector().unwrap().size, (10, 10));
        exp.add_detector(RegArrayDetector2d::new((30, 30), 1.0, 10.0), true);
        assert_eq!(exp.active_detector().unwrap().size, (30, 30));
    }

    #[test]
    fn test_laue_uses_source_band() {
        let mut exp = nickel_experiment();
        exp.source.set_energy_range(20.0, 60.0);
        let planes = build_list(&exp.sample.lattice, 3, Some(Extinction::Fcc));
        let sim = Simulation::Laue(LaueSimulation {
            planes: planes.clone(),
            pattern: PatternConfig::default(),
        });
        let image = exp.forward_simulation(&sim, None).unwrap();
        assert_eq!(image, exp.active_detector().unwrap().data);

        let mut det = RegArrayDetector2d::new((512, 512), 0.4, 100.0);
        let config = PatternConfig {
            energy_band: Some(EnergyBand::new(20.0, 60.0)),
            ..Default::default()
        };
        let expected = compute_laue_pattern(&exp.sample.orientation, &mut det, &planes, &config, None).unwrap();
        assert_eq!(image, expected);
    }

    #[test]
    fn test_laue_intensity_from_library() {
        let mut exp = nickel_experiment();
        let sim = Simulation::Laue(LaueSimulation {
            planes: build_list(&exp.sample.lattice, 3, Some(Extinction::Fcc)),
            pattern: PatternConfig {
                color_field: ColorField::Intensity,
                ..Default::default()
            },
        });
        let mut library = ScatteringLibrary::default();
        assert!(matches!(
            exp.forward_simulation(&sim, Some(&mut library)),
            Err(LaueError::MissingScatteringTable(ref s)) if s == "Ni"
        ));

        library.insert("Ni", ScatteringTable::from_rows(vec![(0.0, 28.0), (100.0, 1.0)]).unwrap());
        let image = exp.forward_simulation(&sim, Some(&mut library)).unwrap();
        // Every q of the list is below 100 nm^-1, so every spot takes the first row
        assert!(image.iter().any(|&v| v > 0.0));
        assert!(image.iter().all(|&v| v % MAX_VAL == 0.0));
    }

    #[test]
    fn test_dct_needs_monochromatic_source() {
        let mut exp = nickel_experiment();
        let sim = Simulation::Dct(DctSimulation {
            planes: build_list(&exp.sample.lattice, 2, Some(Extinction::Fcc)),
            config: DctConfig::default(),
        });
        assert!(matches!(exp.forward_simulation(&sim, None), Err(LaueError::EnergyNotSet)));
        exp.source.set_energy_range(30.0, 40.0);
        assert!(matches!(
            exp.forward_simulation(&sim, None),
            Err(LaueError::NotMonochromatic { .. })
        ));
    }

    #[test]
    fn test_dct_draws_spots() {
        let mut exp = nickel_experiment();
        exp.source.set_energy(40.0);
        let planes = build_list(&exp.sample.lattice, 2, Some(Extinction::Fcc));
        let sim = Simulation::Dct(DctSimulation {
            planes: planes.clone(),
            config: DctConfig::default(),
        });
        let image = exp.forward_simulation(&sim, None).unwrap();
        assert!(image.iter().any(|&v| v > 0.0));

        // An empty ω window draws nothing
        let sim = Simulation::Dct(DctSimulation {
            planes,
            config: DctConfig {
                omega_min: 400.0,
                omega_max: 500.0,
                ..Default::default()
            },
        });
        let image = exp.forward_simulation(&sim, None).unwrap();
        assert!(image.iter().all(|&v| v == 0.0));
    }
}
