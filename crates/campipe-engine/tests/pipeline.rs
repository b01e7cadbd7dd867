//! Full frame path on the headless backend: camera feed, correction pass,
//! compositor, readback.

use campipe_engine::campipe::Campipe;
use campipe_engine::compositor::Compositor;
use campipe_engine::config::CameraConfig;
use campipe_engine::coords::{ColorRgba, Rect, Viewport};
use campipe_engine::export::{ExportStatus, Exporter, FrameSink, OwnedFrame};
use campipe_engine::feed::{CameraFeed, Feed, FeedState, StaticFeed, SyntheticProducer};
use campipe_engine::gl::{Gl, HeadlessGl, PixelFormat, TextureTarget};
use campipe_engine::mesh::Mesh;
use campipe_engine::platform::{HeadlessPlatform, Platform};
use campipe_engine::render::{DebugChecks, ImageData, RenderCtx, ShaderLibrary, SharedFbo};
use campipe_engine::runloop::{self, ExitFlag, FrameControl, LoopConfig};

use std::io;
use std::sync::{Arc, Mutex};

#[derive(Default, Clone)]
struct Collect(Arc<Mutex<Vec<OwnedFrame>>>);

impl FrameSink for Collect {
    fn send(&mut self, frame: &OwnedFrame) -> io::Result<()> {
        self.0.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

#[test]
fn camera_frames_reach_the_composited_target() {
    campipe_engine::logging::init_logging(Default::default());

    let gl = HeadlessGl::new(320, 240);
    let ctx = RenderCtx::with_importer(&gl, &gl).with_checks(DebugChecks::off());
    let shaders = ShaderLibrary::builtin();

    let camera = CameraConfig { width: 640, height: 480, fps: 60, ..Default::default() };
    let feed = CameraFeed::new(&ctx, SyntheticProducer::new(), camera).unwrap();
    let mut pipe = Campipe::with_mesh(&ctx, &shaders, Box::new(feed), Mesh::identity()).unwrap();
    let out = pipe.output_create(&ctx, 128, 128, false).unwrap();

    let mut target = SharedFbo::create(&ctx, 128, 128).unwrap();
    let mut comp = Compositor::create(&ctx, &shaders, target.target()).unwrap();
    let layer = comp.create_layer(&ctx).unwrap();
    comp.set_texture(&ctx, layer, Some(pipe.output_texture(out).unwrap())).unwrap();

    pipe.enable(&ctx).unwrap();
    for _ in 0..3 {
        let info = pipe.dequeue(&ctx).unwrap();
        assert_eq!((info.width, info.height), (640, 480));
        assert_eq!(pipe.feed().state(), FeedState::CheckedOut);
        comp.draw(&ctx, None);
        pipe.queue().unwrap();
    }

    {
        let frame = target.map(&ctx).unwrap();
        assert_eq!(frame.stride, 512);
        assert_eq!(frame.data.len(), 512 * 128);
    }
    target.unmap();

    let draws = gl.draws();
    assert_eq!(draws.len(), 6, "one correction and one composite draw per frame");

    let correction = &draws[0];
    assert_eq!(correction.framebuffer, Some(pipe.output_fbo(out).unwrap().framebuffer));
    assert_eq!(correction.viewport, Viewport::full(128, 128));
    assert_eq!(correction.textures.len(), 3);
    assert!(correction.textures.iter().all(|(_, t, _)| *t == TextureTarget::External));

    let composite = &draws[1];
    assert_eq!(composite.framebuffer, Some(target.target().framebuffer));
    assert_eq!(composite.textures, vec![(0, TextureTarget::Texture2D, pipe.output_texture(out).unwrap())]);

    assert_eq!(gl.binding_snapshot(), Default::default());

    comp.destroy(&ctx);
    target.destroy(&ctx);
    pipe.terminate(&ctx);
    let live = gl.live_objects();
    assert_eq!((live.buffers, live.textures, live.framebuffers, live.images), (0, 0, 0, 0));
}

#[test]
fn static_feed_runs_through_the_loop_and_exporter() {
    let mut platform = HeadlessPlatform::new(64, 48).unwrap();
    let shaders = ShaderLibrary::builtin();
    let sink = Collect::default();

    let stats = {
        let ctx = platform.render_ctx(DebugChecks::off());
        let image = ImageData::from_packed(2, 2, PixelFormat::Rgb, &[255, 0, 0, 0, 255, 0, 0, 0, 255, 9, 9, 9]).unwrap();
        let feed = StaticFeed::from_image(&ctx, &image).unwrap();
        let mut pipe = Campipe::with_mesh(&ctx, &shaders, Box::new(feed), Mesh::identity()).unwrap();
        let out = pipe.output_create(&ctx, 32, 32, true).unwrap();
        pipe.enable(&ctx).unwrap();

        let mut export_fbo = SharedFbo::create(&ctx, 32, 32).unwrap();
        let mut comp = Compositor::create(&ctx, &shaders, export_fbo.target()).unwrap();
        comp.set_clear_color(Some(ColorRgba::black()));
        let id = comp.create_layer(&ctx).unwrap();
        comp.set_texture(&ctx, id, Some(pipe.output_texture(out).unwrap())).unwrap();
        comp.set_display_rect(id, Rect::new(0.25, 0.25, 0.5, 0.5)).unwrap();

        let mut exporter = Exporter::new(sink.clone());

        let config = LoopConfig { max_frames: Some(5), checks: DebugChecks::off(), ..Default::default() };
        let stats = runloop::run(&mut platform, &ExitFlag::new(), &config, |f| {
            pipe.dequeue(&f.render)?;
            comp.draw(&f.render, None);
            let frame = export_fbo.map(&f.render)?;
            let status = exporter.submit(&frame)?;
            export_fbo.unmap();
            pipe.queue()?;
            assert!(matches!(status, ExportStatus::Started | ExportStatus::Dropped));
            Ok(FrameControl::Continue)
        })
        .unwrap();

        let (_, export_stats) = exporter.finish().unwrap();
        assert_eq!(export_stats.sent + export_stats.dropped, 5);
        assert!(export_stats.sent >= 1);

        let ctx = platform.render_ctx(DebugChecks::off());
        comp.destroy(&ctx);
        export_fbo.destroy(&ctx);
        pipe.terminate(&ctx);
        stats
    };

    assert_eq!(stats.frames, 5);
    assert_eq!(platform.presented(), 5);

    let frames = sink.0.lock().unwrap();
    let first = &frames[0];
    assert_eq!((first.width, first.height), (32, 32));
    // Cleared to opaque black; the layer covers only the centre.
    assert_eq!(first.row(0)[..4], [0, 0, 0, 255]);
}
