//! Properties that must hold for any layer stack or call sequence.

use campipe_engine::Error;
use campipe_engine::compositor::Compositor;
use campipe_engine::coords::{Mat4, Rect};
use campipe_engine::feed::{Feed, FeedState, StaticFeed};
use campipe_engine::gl::{Filter, Gl, HeadlessGl, PixelFormat};
use campipe_engine::render::{DebugChecks, Fbo, ImageData, RenderCtx, ShaderLibrary, Texture};
use proptest::prelude::*;

fn rect() -> impl Strategy<Value = Rect> {
    (0.0f32..0.9, 0.0f32..0.9, 0.05f32..1.0, 0.05f32..1.0).prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
}

// ── draw state ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn compositing_leaves_no_bindings_behind(
        layers in prop::collection::vec((rect(), any::<bool>(), 0.1f32..2.0), 1..8),
    ) {
        let gl = HeadlessGl::new(64, 64);
        let ctx = RenderCtx::new(&gl).with_checks(DebugChecks { check_errors: false, check_bindings: true });
        let fbo = Fbo::create(&ctx, 48, 32).unwrap();
        let tex = Texture::empty(&ctx, 4, 4, PixelFormat::Rgba, Filter::Linear).unwrap();
        let mut comp = Compositor::create(&ctx, &ShaderLibrary::builtin(), fbo.target()).unwrap();

        for (r, textured, s) in &layers {
            let id = comp.create_layer(&ctx).unwrap();
            comp.set_display_rect(id, *r).unwrap();
            comp.set_transform(id, Mat4::scale(*s, *s, 1.0)).unwrap();
            if *textured {
                comp.set_texture(&ctx, id, Some(tex.id())).unwrap();
            }
        }

        comp.draw(&ctx, None);

        prop_assert_eq!(gl.binding_snapshot(), Default::default());
        prop_assert!(gl.take_errors().is_empty());
        prop_assert_eq!(gl.draws().len(), layers.len());
    }
}

// ── feed checkout ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Op {
    Enable,
    Dequeue,
    Queue,
    Disable,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Enable), Just(Op::Dequeue), Just(Op::Queue), Just(Op::Disable)]
}

proptest! {
    #[test]
    fn at_most_one_frame_is_checked_out(ops in prop::collection::vec(op(), 1..40)) {
        let gl = HeadlessGl::new(8, 8);
        let ctx = RenderCtx::new(&gl);
        let image = ImageData::from_packed(1, 1, PixelFormat::Rgb, &[1, 2, 3]).unwrap();
        let mut feed = StaticFeed::from_image(&ctx, &image).unwrap();
        let mut expected = FeedState::Disabled;

        for op in ops {
            match op {
                Op::Enable => {
                    let r = feed.enable(&ctx);
                    if expected == FeedState::Disabled {
                        prop_assert!(r.is_ok());
                        expected = FeedState::Idle;
                    } else {
                        let rejected = matches!(r, Err(Error::FeedState { .. }));
                        prop_assert!(rejected);
                    }
                }
                Op::Dequeue => {
                    let r = feed.dequeue(&ctx);
                    match expected {
                        FeedState::Idle => {
                            prop_assert!(r.is_ok());
                            expected = FeedState::CheckedOut;
                        }
                        FeedState::CheckedOut => {
                            let rejected = matches!(r, Err(Error::AlreadyCheckedOut));
                            prop_assert!(rejected);
                        }
                        FeedState::Disabled => {
                            let rejected = matches!(r, Err(Error::FeedState { .. }));
                            prop_assert!(rejected);
                        }
                    }
                }
                Op::Queue => {
                    let r = feed.queue();
                    match expected {
                        FeedState::CheckedOut => {
                            prop_assert!(r.is_ok());
                            expected = FeedState::Idle;
                        }
                        FeedState::Idle => {
                            let rejected = matches!(r, Err(Error::NothingCheckedOut));
                            prop_assert!(rejected);
                        }
                        FeedState::Disabled => {
                            let rejected = matches!(r, Err(Error::FeedState { .. }));
                            prop_assert!(rejected);
                        }
                    }
                }
                Op::Disable => {
                    feed.disable(&ctx);
                    expected = FeedState::Disabled;
                }
            }
            prop_assert_eq!(feed.state(), expected);
        }

        feed.terminate(&ctx);
        prop_assert_eq!(gl.live_objects().textures, 0);
    }
}

// ── layer order ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Texture,
    Transform,
    DisplayRect,
}

/// A layer count plus every (layer, mutation) pair in shuffled order.
fn layer_mutations() -> impl Strategy<Value = (usize, Vec<(usize, Mutation)>)> {
    (1usize..8).prop_flat_map(|count| {
        let all: Vec<_> = (0..count)
            .flat_map(|i| [(i, Mutation::Texture), (i, Mutation::Transform), (i, Mutation::DisplayRect)])
            .collect();
        (Just(count), Just(all).prop_shuffle())
    })
}

proptest! {
    #[test]
    fn layers_draw_in_creation_order(
        (count, mutations) in layer_mutations(),
        removed in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let gl = HeadlessGl::new(64, 64);
        let ctx = RenderCtx::new(&gl).with_checks(DebugChecks::off());
        let fbo = Fbo::create(&ctx, 32, 32).unwrap();
        let mut comp = Compositor::create(&ctx, &ShaderLibrary::builtin(), fbo.target()).unwrap();

        let mut stack = Vec::new();
        for _ in 0..count {
            let tex = gl.create_texture().unwrap();
            let id = comp.create_layer(&ctx).unwrap();
            comp.set_texture(&ctx, id, Some(tex)).unwrap();
            stack.push((id, tex));
        }

        // Later layers are touched first as often as not; none of it may
        // reorder the stack.
        for (i, mutation) in mutations {
            let id = stack[i].0;
            match mutation {
                Mutation::Texture => {
                    let tex = gl.create_texture().unwrap();
                    comp.set_texture(&ctx, id, Some(tex)).unwrap();
                    stack[i].1 = tex;
                }
                Mutation::Transform => comp.set_transform(id, Mat4::scale(0.5, 0.5, 1.0)).unwrap(),
                Mutation::DisplayRect => comp.set_display_rect(id, Rect::new(0.25, 0.25, 0.5, 0.5)).unwrap(),
            }
        }

        for idx in removed {
            if stack.len() > 1 {
                let (id, _) = stack.remove(idx.index(stack.len()));
                comp.remove_layer(&ctx, id).unwrap();
            }
        }

        let order: Vec<_> = comp.layers().map(|l| l.id()).collect();
        let expected: Vec<_> = stack.iter().map(|(id, _)| *id).collect();
        prop_assert_eq!(order, expected);

        comp.draw(&ctx, None);
        let first: Vec<_> = gl.draws().iter().map(|d| d.textures[0].2).collect();
        gl.clear_draws();
        comp.draw(&ctx, None);
        let second: Vec<_> = gl.draws().iter().map(|d| d.textures[0].2).collect();

        let textures: Vec<_> = stack.iter().map(|(_, t)| *t).collect();
        prop_assert_eq!(&first, &textures);
        prop_assert_eq!(first, second);
    }
}
