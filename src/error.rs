//! Error type shared by the simulation and indexing code.

use thiserror::Error;

/// Domain errors raised by the crate.
///
/// Geometric degeneracies (parallel vectors, spots off the detector) are not
/// errors; the affected reflection or point is skipped instead.
#[derive(Debug, Error)]
pub enum LaueError {
    /// The Bragg angle recomputed from the plane disagrees with the glancing
    /// angle found by wavelength selection. Indicates a broken lattice or
    /// orientation model.
    #[error(
        "inconsistent diffraction model for ({h} {k} {l}): glancing angle {glancing:.9} rad, \
         Bragg angle {bragg:.9} rad"
    )]
    ModelConsistency {
        h: i32,
        k: i32,
        l: i32,
        glancing: f64,
        bragg: f64,
    },

    #[error("unsupported color field '{0}' (expected constant, energy or intensity)")]
    UnsupportedColorField(String),

    #[error("unsupported crystal structure '{0}'")]
    UnsupportedSymmetry(String),

    #[error("unsupported extinction rule '{0}' (expected fcc or bcc)")]
    UnsupportedExtinction(String),

    #[error("matrix is not a proper rotation (det = {det:.6}, orthonormality error = {error:.2e})")]
    NotARotation { det: f64, error: f64 },

    #[error("no scattering table available for element '{0}'")]
    MissingScatteringTable(String),

    #[error("scattering table is empty")]
    EmptyScatteringTable,

    #[error("angle table was built for {expected} planes but {found} were supplied")]
    AngleTableMismatch { expected: usize, found: usize },

    #[error("DCT simulation needs a monochromatic source, got [{min_kev}, {max_kev}] keV")]
    NotMonochromatic { min_kev: f64, max_kev: f64 },

    #[error("X-ray source energy is not set")]
    EnergyNotSet,

    #[error("experiment has no detector")]
    NoDetector,
}

pub type Result<T> = std::result::Result<T, LaueError>;
