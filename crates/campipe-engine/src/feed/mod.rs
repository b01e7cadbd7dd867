//! Per-frame image sources.
//!
//! A [`Feed`] hides where frames come from (a camera producer or a static
//! texture) behind one dequeue/queue contract:
//!
//! ```text
//! Disabled --enable--> Idle --dequeue--> CheckedOut --queue--> Idle
//!     ^                  |                                      |
//!     +-----disable------+--------------------------------------+
//! ```
//!
//! At most one frame is checked out at a time. The textures a feed exposes
//! through [`Feed::planes`] keep their names for the feed's lifetime; only
//! their contents change per frame.

mod buffer;
mod camera;
mod image_slot;
mod pool;
mod static_feed;
mod synthetic;

pub use buffer::{CameraBuffer, Plane};
pub use camera::{CameraFeed, FrameProducer, Rejected};
pub use image_slot::ImageSlot;
pub use pool::{BufferPool, FrameCallback};
pub use static_feed::StaticFeed;
pub use synthetic::SyntheticProducer;

use crate::error::Result;
use crate::gl::{TextureId, TextureTarget};
use crate::render::RenderCtx;

/// Colour layout of a feed's planes, which decides the sampling shader.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FeedFormat {
    /// Three luminance planes sampled as `ytex`/`utex`/`vtex`.
    Yuv420,
    /// One RGB texture sampled as `tex`.
    Rgb,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FeedState {
    Disabled,
    Idle,
    CheckedOut,
}

impl FeedState {
    pub fn name(self) -> &'static str {
        match self {
            FeedState::Disabled => "disabled",
            FeedState::Idle => "idle",
            FeedState::CheckedOut => "checked out",
        }
    }
}

/// One texture a feed exposes, with the sampler it is meant for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PlaneTexture {
    pub sampler: &'static str,
    pub target: TextureTarget,
    pub texture: TextureId,
}

/// The textures of a feed, in plane order.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FeedPlanes {
    planes: Vec<PlaneTexture>,
}

impl FeedPlanes {
    pub fn new(planes: Vec<PlaneTexture>) -> Self {
        Self { planes }
    }

    pub fn get(&self, index: usize) -> Option<&PlaneTexture> {
        self.planes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaneTexture> {
        self.planes.iter()
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}

/// What `dequeue` produced.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameInfo {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
}

pub trait Feed {
    /// Starts the producer and seeds it with the free pool.
    fn enable(&mut self, ctx: &RenderCtx<'_>) -> Result<()>;

    /// Waits (bounded) for the next frame and makes it current in
    /// [`Feed::planes`]. A timeout skips the frame; it does not disable the
    /// feed.
    fn dequeue(&mut self, ctx: &RenderCtx<'_>) -> Result<FrameInfo>;

    /// Returns the current frame to the producer.
    fn queue(&mut self) -> Result<()>;

    /// Stops the producer and frees the pool. Idempotent.
    fn disable(&mut self, ctx: &RenderCtx<'_>);

    /// Disables and releases the feed's textures. The feed is unusable
    /// afterwards.
    fn terminate(&mut self, ctx: &RenderCtx<'_>);

    fn planes(&self) -> &FeedPlanes;

    fn format(&self) -> FeedFormat;

    fn state(&self) -> FeedState;
}
