use std::path::Path;

use crate::error::{Error, Result};
use crate::gl::{Filter, TextureTarget};
use crate::render::{ImageData, RenderCtx, Texture};

use super::{Feed, FeedFormat, FeedPlanes, FeedState, FrameInfo, PlaneTexture};

/// Feed showing one fixed RGB texture, for running without a camera.
///
/// Dequeue never blocks; the checkout discipline is still enforced so code
/// written against it behaves the same with a camera.
#[derive(Debug)]
pub struct StaticFeed {
    texture: Option<Texture>,
    planes: FeedPlanes,
    state: FeedState,
    sequence: u64,
}

impl StaticFeed {
    pub fn from_image(ctx: &RenderCtx<'_>, image: &ImageData) -> Result<Self> {
        let texture = Texture::upload(ctx, image, Filter::Linear)?;
        let planes = FeedPlanes::new(vec![PlaneTexture {
            sampler: "tex",
            target: TextureTarget::Texture2D,
            texture: texture.id(),
        }]);
        Ok(Self { texture: Some(texture), planes, state: FeedState::Disabled, sequence: 0 })
    }

    pub fn load(ctx: &RenderCtx<'_>, path: impl AsRef<Path>) -> Result<Self> {
        let image = ImageData::load(path)?;
        Self::from_image(ctx, &image)
    }

    fn size(&self) -> (u32, u32) {
        self.texture.as_ref().map_or((0, 0), |t| (t.width(), t.height()))
    }
}

impl Feed for StaticFeed {
    fn enable(&mut self, _ctx: &RenderCtx<'_>) -> Result<()> {
        if self.texture.is_none() {
            return Err(Error::FeedState { expected: "disabled", actual: "terminated" });
        }
        if self.state != FeedState::Disabled {
            return Err(Error::FeedState { expected: "disabled", actual: self.state.name() });
        }
        self.state = FeedState::Idle;
        Ok(())
    }

    fn dequeue(&mut self, _ctx: &RenderCtx<'_>) -> Result<FrameInfo> {
        match self.state {
            FeedState::Idle => {}
            FeedState::CheckedOut => return Err(Error::AlreadyCheckedOut),
            FeedState::Disabled => return Err(Error::FeedState { expected: "idle", actual: "disabled" }),
        }
        let (width, height) = self.size();
        let info = FrameInfo { sequence: self.sequence, width, height };
        self.sequence += 1;
        self.state = FeedState::CheckedOut;
        Ok(info)
    }

    fn queue(&mut self) -> Result<()> {
        match self.state {
            FeedState::CheckedOut => {
                self.state = FeedState::Idle;
                Ok(())
            }
            FeedState::Idle => Err(Error::NothingCheckedOut),
            FeedState::Disabled => Err(Error::FeedState { expected: "checked out", actual: "disabled" }),
        }
    }

    fn disable(&mut self, _ctx: &RenderCtx<'_>) {
        self.state = FeedState::Disabled;
    }

    fn terminate(&mut self, ctx: &RenderCtx<'_>) {
        self.disable(ctx);
        if let Some(texture) = self.texture.take() {
            texture.destroy(ctx);
        }
    }

    fn planes(&self) -> &FeedPlanes {
        &self.planes
    }

    fn format(&self) -> FeedFormat {
        FeedFormat::Rgb
    }

    fn state(&self) -> FeedState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{HeadlessGl, PixelFormat};

    fn feed(gl: &HeadlessGl) -> StaticFeed {
        let ctx = RenderCtx::new(gl);
        let img = ImageData::from_packed(2, 2, PixelFormat::Rgb, &[200u8; 12]).unwrap();
        StaticFeed::from_image(&ctx, &img).unwrap()
    }

    #[test]
    fn exposes_one_rgb_plane() {
        let gl = HeadlessGl::new(4, 4);
        let feed = feed(&gl);
        assert_eq!(feed.format(), FeedFormat::Rgb);
        assert_eq!(feed.planes().len(), 1);
        assert_eq!(feed.planes().get(0).unwrap().sampler, "tex");
    }

    #[test]
    fn follows_checkout_discipline() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::new(&gl);
        let mut feed = feed(&gl);

        assert!(feed.dequeue(&ctx).is_err());
        feed.enable(&ctx).unwrap();
        let a = feed.dequeue(&ctx).unwrap();
        assert_eq!((a.width, a.height), (2, 2));
        assert!(matches!(feed.dequeue(&ctx), Err(Error::AlreadyCheckedOut)));
        feed.queue().unwrap();
        assert!(matches!(feed.queue(), Err(Error::NothingCheckedOut)));
        assert_eq!(feed.dequeue(&ctx).unwrap().sequence, a.sequence + 1);
    }

    #[test]
    fn terminate_releases_texture() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::new(&gl);
        let mut feed = feed(&gl);
        feed.terminate(&ctx);
        feed.terminate(&ctx);
        assert_eq!(gl.live_objects().textures, 0);
        assert!(feed.enable(&ctx).is_err());
    }
}
