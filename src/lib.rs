//! # laue
//!
//! **Laue X-ray diffraction** for single crystals: forward simulation of
//! white-beam patterns on a flat detector, gnomonic projection of the spots,
//! and recovery of the crystal orientation from a handful of spots.
//!
//! ## Features
//!
//! - **Diffraction model**: per-plane wavelength selection, diffracted wave
//!   vectors with a model-consistency check, zone-axis ellipses, and the
//!   rotating-crystal (DCT) geometry
//! - **Pattern rendering**: square spots accumulated on a detector image,
//!   encoded as constant value, diffracted energy or diffracted intensity
//! - **Gnomonic projection**: points, spot lists and whole images; zone
//!   ellipses become straight lines
//! - **Indexing**: triplet matching against a sorted table of
//!   inter-planar angles, followed by consensus voting in the fundamental zone
//! - **Persistence**: angle tables serialize with [rkyv](https://docs.rs/rkyv);
//!   detector images load and save as 8-bit PNG (feature `image`)
//!
//! ## Example
//!
//! ```no_run
//! use laue::{
//!     build_list, compute_laue_pattern, extract_spots, index, spot_normals, Extinction,
//!     IndexConfig, Lattice, Orientation, PatternConfig, RegArrayDetector2d,
//!     SpotExtractionConfig,
//! };
//!
//! let nickel = Lattice::from_symbol("Ni").unwrap();
//! let planes = build_list(&nickel, 3, Some(Extinction::Fcc));
//! let orientation = Orientation::from_euler(20.0, 10.0, 5.0);
//!
//! // Simulate a pattern on a 1024 x 1024 detector, 100 mm behind the sample
//! let mut detector = RegArrayDetector2d::new((1024, 1024), 0.2, 100.0);
//! compute_laue_pattern(&orientation, &mut detector, &planes, &PatternConfig::default(), None)
//!     .unwrap();
//!
//! // Back from the image to the orientation
//! let spots = extract_spots(&detector, &SpotExtractionConfig::default());
//! let normals = spot_normals(&detector, &spots, None);
//! let result = index(&normals, &planes, &IndexConfig::default()).unwrap();
//! if result.is_solved() {
//!     println!("Euler angles: {:?}", result.orientations[0].euler());
//!     println!("{} votes, CI {:.2} in {:.1} ms",
//!         result.votes, result.confidence, result.solve_time_ms);
//! }
//! ```
//!
//! ## Algorithm overview
//!
//! 1. **Wavelength selection**: each plane picks the wavelength satisfying
//!    Bragg's law for its glancing angle with the incident beam
//! 2. **Projection**: the diffracted beam `k = k_i + G` is intersected with
//!    the detector plane
//! 3. **Gnomonic projection**: each spot maps to a point whose direction is
//!    the reflecting plane normal, up to a sign
//! 4. **Triplet matching**: pairwise angles between spot directions are
//!    matched to theoretical angles; triplets built on exactly three planes
//!    give one orientation candidate each
//! 5. **Polling**: candidates are clustered by misorientation and the most
//!    voted cluster wins, with a confidence index
//!
//! ## Conventions
//!
//! - Lab frame: X along the incident beam, Z up
//! - Orientation matrices are passive: `V_crystal = g · V_lab`
//! - Lengths in nm for lattices and wavelengths, mm for detectors, energies in keV
//! - Reciprocal vectors carry no 2π factor: `|G| = 1/d`

pub mod crystal;
pub mod detector;
pub mod diffraction;
pub mod error;
pub mod experiment;
pub mod gnomonic;
pub mod indexing;
pub mod pattern;
pub mod scattering;
pub mod spots;

pub use crystal::{build_list, Extinction, HklDirection, HklPlane, Lattice, Orientation, Symmetry};
pub use detector::{DetectorSpot, RegArrayDetector2d};
pub use diffraction::{diffracted_vector, lambda_kev_to_nm, lambda_nm_to_kev, select_lambda, Reflection};
pub use error::{LaueError, Result};
pub use experiment::{
    DctConfig, DctSimulation, Experiment, LaueSimulation, Sample, Simulation, XraySource,
};
pub use gnomonic::{
    gnomonic_projection, gnomonic_projection_point, gnomonic_projection_point_oc,
    gnomonic_projection_points, spot_normals, GnomonicConfig,
};
pub use indexing::{
    index, index_with_table, poll_system, AngleTable, IndexConfig, IndexResult, IndexStatus,
    PollResult,
};
pub use pattern::{compute_laue_pattern, ColorField, EnergyBand, PatternConfig};
pub use scattering::{ScatteringLibrary, ScatteringTable};
pub use spots::{extract_spots, SpotExtractionConfig};

// Commonly used types
pub type Quaternion = nalgebra::UnitQuaternion<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;
pub type Matrix3 = nalgebra::Matrix3<f64>;
