use crate::config::CameraConfig;
use crate::error::{Error, Result};
use crate::gl::{Filter, ImageImporter, TextureId, TextureTarget};
use crate::render::RenderCtx;

use super::{
    BufferPool, CameraBuffer, Feed, FeedFormat, FeedPlanes, FeedState, FrameCallback, FrameInfo, ImageSlot,
    Plane, PlaneTexture,
};

/// A buffer the producer would not take back.
#[derive(Debug)]
pub struct Rejected {
    pub buffer: CameraBuffer,
    pub reason: String,
}

/// The hardware side of a camera feed.
///
/// The producer fills buffers it was handed through [`FrameProducer::submit`]
/// and passes them to the callback given to [`FrameProducer::start`]. It does
/// not replenish itself: buffers come back only when the feed submits them.
pub trait FrameProducer {
    fn start(&mut self, config: &CameraConfig, on_frame: FrameCallback) -> std::result::Result<(), String>;

    fn submit(&mut self, buffer: CameraBuffer) -> std::result::Result<(), Rejected>;

    /// Stops capture. Buffers still held by the producer are dropped.
    fn stop(&mut self);
}

/// Feed over a [`FrameProducer`], importing each frame's Y/U/V planes as
/// external images without copying.
#[derive(Debug)]
pub struct CameraFeed<P> {
    producer: P,
    config: CameraConfig,
    pool: Option<BufferPool>,
    current: Option<CameraBuffer>,
    slots: [ImageSlot; 3],
    planes: FeedPlanes,
    state: FeedState,
    terminated: bool,
}

impl<P: FrameProducer> CameraFeed<P> {
    /// Creates the three external plane textures. The producer is not
    /// started until [`Feed::enable`].
    pub fn new(ctx: &RenderCtx<'_>, producer: P, config: CameraConfig) -> Result<Self> {
        let gl = ctx.gl;
        let mut textures: Vec<TextureId> = Vec::with_capacity(3);
        for _ in Plane::ALL {
            match gl.create_texture() {
                Ok(tex) => textures.push(tex),
                Err(msg) => {
                    log::error!("failed to create camera plane texture: {msg}");
                    for tex in textures {
                        gl.delete_texture(tex);
                    }
                    return Err(Error::creation("camera plane texture", msg));
                }
            }
        }

        for &tex in &textures {
            gl.bind_texture(TextureTarget::External, Some(tex));
            gl.tex_parameters(TextureTarget::External, Filter::Linear);
        }
        gl.bind_texture(TextureTarget::External, None);

        let planes = Plane::ALL
            .iter()
            .zip(&textures)
            .map(|(plane, &texture)| PlaneTexture {
                sampler: plane.sampler(),
                target: TextureTarget::External,
                texture,
            })
            .collect();

        Ok(Self {
            producer,
            config,
            pool: None,
            current: None,
            slots: Default::default(),
            planes: FeedPlanes::new(planes),
            state: FeedState::Disabled,
            terminated: false,
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn producer_mut(&mut self) -> &mut P {
        &mut self.producer
    }

    /// Buffers sitting on the free list, not yet handed to the producer.
    pub fn free_buffers(&self) -> usize {
        self.pool.as_ref().map_or(0, BufferPool::free_len)
    }

    /// Hands every free buffer back to the producer. A buffer the producer
    /// rejects stays on the free list for the next flush.
    fn flush_free(&mut self) {
        let Some(pool) = self.pool.as_mut() else { return };
        while let Some(buffer) = pool.take_free() {
            if let Err(Rejected { buffer, reason }) = self.producer.submit(buffer) {
                log::warn!("producer rejected buffer {}: {reason}", buffer.index());
                pool.release(buffer);
                break;
            }
        }
    }

    fn import_planes(&mut self, importer: &dyn ImageImporter, buffer: &CameraBuffer) -> Result<()> {
        for ((slot, plane), tex) in self.slots.iter_mut().zip(Plane::ALL).zip(self.planes.iter()) {
            slot.replace(importer, buffer, plane, tex.texture)?;
        }
        Ok(())
    }

    fn state_error(&self, expected: &'static str) -> Error {
        let actual = if self.terminated { "terminated" } else { self.state.name() };
        Error::FeedState { expected, actual }
    }
}

impl<P: FrameProducer> Feed for CameraFeed<P> {
    fn enable(&mut self, _ctx: &RenderCtx<'_>) -> Result<()> {
        if self.terminated || self.state != FeedState::Disabled {
            return Err(self.state_error("disabled"));
        }

        let pool = BufferPool::new(self.config.buffers, self.config.width, self.config.height);
        self.producer.start(&self.config, pool.callback()).map_err(Error::ProducerInit)?;
        self.pool = Some(pool);
        self.flush_free();
        self.state = FeedState::Idle;
        log::info!(
            "camera feed enabled: {}x{} @ {} fps, {} buffers",
            self.config.width,
            self.config.height,
            self.config.fps,
            self.config.buffers
        );
        Ok(())
    }

    fn dequeue(&mut self, ctx: &RenderCtx<'_>) -> Result<FrameInfo> {
        match self.state {
            FeedState::Idle => {}
            FeedState::CheckedOut => return Err(Error::AlreadyCheckedOut),
            FeedState::Disabled => return Err(self.state_error("idle")),
        }
        let Some(pool) = self.pool.as_ref() else {
            return Err(self.state_error("idle"));
        };

        let buffer = pool.dequeue(self.config.dequeue_timeout()).inspect_err(|e| log::warn!("{e}"))?;

        let imported = match ctx.images {
            Some(importer) => self.import_planes(importer, &buffer),
            None => Err(Error::ImageImport("no image importer on this context".into())),
        };
        if let Err(e) = imported {
            log::error!("{e}");
            if let Some(pool) = self.pool.as_mut() {
                pool.release(buffer);
            }
            self.flush_free();
            return Err(e);
        }
        // Without this the first imported frames can show stale contents.
        ctx.gl.finish();

        let info = FrameInfo { sequence: buffer.sequence(), width: buffer.width(), height: buffer.height() };
        self.current = Some(buffer);
        self.state = FeedState::CheckedOut;
        Ok(info)
    }

    fn queue(&mut self) -> Result<()> {
        match self.state {
            FeedState::CheckedOut => {}
            FeedState::Idle => return Err(Error::NothingCheckedOut),
            FeedState::Disabled => return Err(self.state_error("checked out")),
        }

        if let (Some(buffer), Some(pool)) = (self.current.take(), self.pool.as_mut()) {
            pool.release(buffer);
        }
        self.flush_free();
        self.state = FeedState::Idle;
        Ok(())
    }

    fn disable(&mut self, ctx: &RenderCtx<'_>) {
        if self.state == FeedState::Disabled {
            return;
        }
        if let Some(importer) = ctx.images {
            for slot in &mut self.slots {
                slot.release(importer);
            }
        }
        self.producer.stop();
        self.current = None;
        self.pool = None;
        self.state = FeedState::Disabled;
        log::info!("camera feed disabled");
    }

    fn terminate(&mut self, ctx: &RenderCtx<'_>) {
        self.disable(ctx);
        if !self.terminated {
            for plane in self.planes.iter() {
                ctx.gl.delete_texture(plane.texture);
            }
            self.terminated = true;
        }
    }

    fn planes(&self) -> &FeedPlanes {
        &self.planes
    }

    fn format(&self) -> FeedFormat {
        FeedFormat::Yuv420
    }

    fn state(&self) -> FeedState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::feed::SyntheticProducer;
    use crate::gl::{Gl, HeadlessGl};

    /// Producer driven by the test: submitted buffers wait until `fire`.
    #[derive(Default, Clone)]
    struct Manual {
        inner: Arc<Mutex<ManualInner>>,
    }

    #[derive(Default)]
    struct ManualInner {
        callback: Option<FrameCallback>,
        held: Vec<CameraBuffer>,
        started: usize,
        stopped: usize,
    }

    impl Manual {
        fn fire(&self) {
            let mut inner = self.inner.lock().unwrap();
            if let Some(mut buf) = inner.held.pop() {
                buf.set_sequence(buf.index() as u64);
                inner.callback.as_ref().unwrap().deliver(buf);
            }
        }

        fn held(&self) -> usize {
            self.inner.lock().unwrap().held.len()
        }
    }

    impl FrameProducer for Manual {
        fn start(&mut self, _: &CameraConfig, on_frame: FrameCallback) -> std::result::Result<(), String> {
            let mut inner = self.inner.lock().unwrap();
            inner.callback = Some(on_frame);
            inner.started += 1;
            Ok(())
        }

        fn submit(&mut self, buffer: CameraBuffer) -> std::result::Result<(), Rejected> {
            self.inner.lock().unwrap().held.push(buffer);
            Ok(())
        }

        fn stop(&mut self) {
            let mut inner = self.inner.lock().unwrap();
            inner.held.clear();
            inner.callback = None;
            inner.stopped += 1;
        }
    }

    fn config() -> CameraConfig {
        CameraConfig { width: 8, height: 6, dequeue_timeout_ms: 20, ..CameraConfig::default() }
    }

    #[test]
    fn enable_seeds_every_buffer_into_the_producer() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::with_importer(&gl, &gl);
        let manual = Manual::default();
        let mut feed = CameraFeed::new(&ctx, manual.clone(), config()).unwrap();

        feed.enable(&ctx).unwrap();
        assert_eq!(manual.held(), 3);
        assert_eq!(feed.free_buffers(), 0);
        assert!(matches!(feed.enable(&ctx), Err(Error::FeedState { .. })));
    }

    #[test]
    fn dequeue_imports_planes_and_queue_refills_producer() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::with_importer(&gl, &gl);
        let manual = Manual::default();
        let mut feed = CameraFeed::new(&ctx, manual.clone(), config()).unwrap();
        feed.enable(&ctx).unwrap();

        manual.fire();
        let info = feed.dequeue(&ctx).unwrap();
        assert_eq!((info.width, info.height), (8, 6));
        assert_eq!(feed.state(), FeedState::CheckedOut);
        assert_eq!(gl.live_objects().images, 3);

        let y = gl.texture_storage(feed.planes().get(0).unwrap().texture).unwrap();
        assert_eq!((y.width, y.height), (8, 6));
        let u = gl.texture_storage(feed.planes().get(1).unwrap().texture).unwrap();
        assert_eq!((u.width, u.height), (4, 3));

        assert_eq!(manual.held(), 2);
        feed.queue().unwrap();
        assert_eq!(manual.held(), 3);
        assert_eq!(feed.state(), FeedState::Idle);

        // Images stay alive until the next import replaces them.
        manual.fire();
        feed.dequeue(&ctx).unwrap();
        assert_eq!(gl.live_objects().images, 3);
        feed.queue().unwrap();
    }

    #[test]
    fn checkout_discipline_is_enforced() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::with_importer(&gl, &gl);
        let manual = Manual::default();
        let mut feed = CameraFeed::new(&ctx, manual.clone(), config()).unwrap();

        assert!(matches!(feed.dequeue(&ctx), Err(Error::FeedState { .. })));
        feed.enable(&ctx).unwrap();
        assert!(matches!(feed.queue(), Err(Error::NothingCheckedOut)));

        manual.fire();
        manual.fire();
        feed.dequeue(&ctx).unwrap();
        assert!(matches!(feed.dequeue(&ctx), Err(Error::AlreadyCheckedOut)));
        feed.queue().unwrap();
        feed.dequeue(&ctx).unwrap();
        feed.queue().unwrap();
    }

    #[test]
    fn timeout_leaves_feed_idle() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::with_importer(&gl, &gl);
        let mut feed = CameraFeed::new(&ctx, Manual::default(), config()).unwrap();
        feed.enable(&ctx).unwrap();

        let err = feed.dequeue(&ctx).unwrap_err();
        assert!(matches!(err, Error::DequeueTimeout { timeout_ms: 20 }));
        assert_eq!(feed.state(), FeedState::Idle);
    }

    #[test]
    fn dequeue_without_importer_is_an_import_error() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::new(&gl);
        let mut feed = CameraFeed::new(&ctx, Manual::default(), config()).unwrap();
        feed.enable(&ctx).unwrap();
        assert!(matches!(feed.dequeue(&ctx), Err(Error::ImageImport(_))));
    }

    #[test]
    fn failed_import_returns_buffer_to_producer() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::with_importer(&gl, &gl);
        let manual = Manual::default();
        let mut feed = CameraFeed::new(&ctx, manual.clone(), config()).unwrap();
        feed.enable(&ctx).unwrap();

        let v = feed.planes().get(2).unwrap().texture;
        gl.delete_texture(v);
        manual.fire();
        assert_eq!(manual.held(), 2);

        assert!(matches!(feed.dequeue(&ctx), Err(Error::ImageImport(_))));
        assert_eq!(feed.state(), FeedState::Idle);
        assert_eq!(manual.held(), 3);
        assert_eq!(feed.free_buffers(), 0);
        assert!(matches!(feed.queue(), Err(Error::NothingCheckedOut)));
    }

    #[test]
    fn rejected_buffers_stay_on_the_free_list() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::with_importer(&gl, &gl);
        let mut feed = CameraFeed::new(&ctx, SyntheticProducer::new(), config()).unwrap();

        // Buffers are handed over only after the producer has started.
        assert_eq!(feed.free_buffers(), 0);
        feed.enable(&ctx).unwrap();
        assert_eq!(feed.free_buffers(), 0);
        assert!(feed.producer().is_running());

        // Stopping drains the buffers already submitted, then refuses more.
        feed.producer_mut().stop();
        feed.dequeue(&ctx).unwrap();
        feed.queue().unwrap();
        assert_eq!(feed.free_buffers(), 1);
        feed.terminate(&ctx);
    }

    #[test]
    fn disable_is_idempotent_and_terminate_frees_textures() {
        let gl = HeadlessGl::new(4, 4);
        let ctx = RenderCtx::with_importer(&gl, &gl);
        let manual = Manual::default();
        let mut feed = CameraFeed::new(&ctx, manual.clone(), config()).unwrap();
        feed.enable(&ctx).unwrap();
        manual.fire();
        feed.dequeue(&ctx).unwrap();

        feed.disable(&ctx);
        feed.disable(&ctx);
        assert_eq!(feed.state(), FeedState::Disabled);
        assert_eq!(gl.live_objects().images, 0);
        assert_eq!(manual.inner.lock().unwrap().stopped, 1);

        feed.terminate(&ctx);
        assert_eq!(gl.live_objects().textures, 0);
        assert!(matches!(feed.enable(&ctx), Err(Error::FeedState { actual: "terminated", .. })));
    }
}
