//! Off-device frame export.
//!
//! The render thread maps an FBO, copies the pixels into an [`OwnedFrame`]
//! and hands it to an [`Exporter`], which sends it from a background thread.
//! Transports live outside the engine behind [`FrameSink`].

mod exporter;
mod frame;

pub use exporter::{ExportStats, ExportStatus, Exporter, FrameSink};
pub use frame::OwnedFrame;
