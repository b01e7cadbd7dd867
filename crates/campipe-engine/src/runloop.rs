//! Per-frame render loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{FrameAction, Result};
use crate::platform::Platform;
use crate::render::{DebugChecks, RenderCtx};
use crate::time::{FpsCounter, FrameClock, FrameTime};

/// Control directive returned by the frame callback.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameControl {
    Continue,
    /// Stop without presenting the current frame.
    Exit,
}

/// Process-wide stop request, set from a signal handler or another thread.
#[derive(Debug, Clone, Default)]
pub struct ExitFlag(Arc<AtomicBool>);

impl ExitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run loop configuration.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Stop after this many frames (presented or skipped).
    pub max_frames: Option<u64>,
    /// How often the frame rate is logged.
    pub fps_window: Duration,
    pub checks: DebugChecks,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_frames: None,
            fps_window: Duration::from_secs(1),
            checks: DebugChecks::default(),
        }
    }
}

/// Per-frame context passed to the frame callback.
pub struct FrameCtx<'a> {
    pub render: RenderCtx<'a>,
    pub time: FrameTime,
    /// Screen size in pixels.
    pub screen: (u32, u32),
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct LoopStats {
    /// Frames drawn and presented.
    pub frames: u64,
    /// Frames abandoned after a transient error.
    pub skipped: u64,
}

/// Calls `frame` once per frame and presents the result until `exit` is
/// set, the callback returns [`FrameControl::Exit`] or the frame limit is
/// reached.
///
/// Errors that only spoil the current frame (a dequeue timeout, a failed
/// export) are logged and the frame is skipped without presenting. Any other
/// error stops the loop and is returned.
pub fn run<P, F>(platform: &mut P, exit: &ExitFlag, config: &LoopConfig, mut frame: F) -> Result<LoopStats>
where
    P: Platform + ?Sized,
    F: FnMut(&FrameCtx<'_>) -> Result<FrameControl>,
{
    let mut clock = FrameClock::new();
    let mut fps = FpsCounter::with_window(config.fps_window);
    let mut stats = LoopStats::default();

    loop {
        if exit.is_requested() {
            log::info!("exit requested");
            break;
        }
        if let Some(max) = config.max_frames
            && stats.frames + stats.skipped >= max
        {
            log::debug!("frame limit {max} reached");
            break;
        }

        let time = clock.tick();
        let outcome = {
            let ctx = FrameCtx {
                render: platform.render_ctx(config.checks),
                time,
                screen: platform.size(),
            };
            frame(&ctx)
        };

        match outcome {
            Ok(FrameControl::Continue) => {}
            Ok(FrameControl::Exit) => break,
            Err(e) => match e.action() {
                FrameAction::Continue => log::warn!("frame {}: {e}", time.frame_index),
                FrameAction::SkipFrame => {
                    log::warn!("frame {} skipped: {e}", time.frame_index);
                    stats.skipped += 1;
                    continue;
                }
                FrameAction::Fatal => {
                    log::error!("frame {} failed: {e}", time.frame_index);
                    return Err(e);
                }
            },
        }

        if let Err(e) = platform.present() {
            log::error!("present failed: {e}");
            return Err(e);
        }
        stats.frames += 1;

        if let Some(rate) = fps.frame(time.now) {
            log::info!("{rate:.1} fps");
        }
    }

    log::info!("render loop stopped after {} frames ({} skipped)", stats.frames, stats.skipped);
    Ok(stats)
}
