//! Crystal description: lattice geometry, symmetry and orientation.

mod lattice;
mod orientation;
mod symmetry;

pub use lattice::{build_list, Extinction, HklDirection, HklPlane, Lattice};
pub use orientation::Orientation;
pub use symmetry::{rotation_angle, Symmetry};
