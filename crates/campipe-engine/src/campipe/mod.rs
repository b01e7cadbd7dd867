//! Camera pipeline: a feed, a lens correction mesh, and outputs that
//! render the corrected image into FBOs.

mod output;
mod pipe;

pub use output::{Output, OutputId};
pub use pipe::{mesh_for_config, Campipe};
