//! Campipe engine crate.
//!
//! GLES2 draw-call compositing for camera pipelines: lens-correction meshes,
//! camera and static feeds, offscreen outputs, a layered compositor, bitmap
//! text and off-device frame export.

pub mod logging;
pub mod time;
pub mod coords;
pub mod error;
pub mod config;

pub mod gl;
pub mod render;
pub mod mesh;
pub mod feed;
pub mod compositor;
pub mod campipe;
pub mod text;
pub mod export;

pub mod platform;
pub mod runloop;

pub use error::{Error, ErrorClass, FrameAction, Result};
