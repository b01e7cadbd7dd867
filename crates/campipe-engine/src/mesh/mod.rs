//! Grid meshes for lens-corrected sampling.
//!
//! A mesh is an `xpoints x ypoints` grid of [`MeshVertex`] over the unit
//! square, drawn as one triangle strip. The texture coordinate of each
//! vertex is where the camera image is sampled for that grid point.

mod file;
mod grid;
mod lens;

pub use grid::{build, build_indices, index_count, Mesh, MeshVertex};
pub use lens::LensModel;
