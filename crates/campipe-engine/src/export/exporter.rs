use std::io;
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::render::MappedFrame;

use super::OwnedFrame;

/// Where exported frames go (a socket, an SPI panel, a file).
///
/// Runs on the export thread, never on the GL thread.
pub trait FrameSink: Send + 'static {
    fn send(&mut self, frame: &OwnedFrame) -> io::Result<()>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExportStatus {
    /// The frame was handed to the export thread.
    Started,
    /// The previous export is still running; this frame was not exported.
    Dropped,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ExportStats {
    pub sent: u64,
    pub dropped: u64,
    pub failed: u64,
}

type Job<S> = JoinHandle<(S, io::Result<()>)>;

enum Slot<S> {
    Idle(S),
    Busy(Job<S>),
    /// The export thread panicked and took the sink with it.
    Lost,
}

/// Ships frames to a [`FrameSink`] on a background thread, one at a time.
///
/// At most one export is in flight. A frame submitted while the previous
/// one is still being sent is dropped rather than queued, so a slow sink
/// lowers the export rate without stalling the render loop.
pub struct Exporter<S: FrameSink> {
    slot: Slot<S>,
    stats: ExportStats,
}

impl<S: FrameSink> Exporter<S> {
    pub fn new(sink: S) -> Self {
        Self { slot: Slot::Idle(sink), stats: ExportStats::default() }
    }

    /// Copies `frame` out and starts sending it, unless an export is
    /// already running.
    pub fn submit(&mut self, frame: &MappedFrame<'_>) -> Result<ExportStatus> {
        if let Slot::Busy(job) = &self.slot
            && !job.is_finished()
        {
            self.stats.dropped += 1;
            log::trace!("export busy, dropping frame");
            return Ok(ExportStatus::Dropped);
        }

        let mut sink = self.reclaim()?;
        let owned = OwnedFrame::from_mapped(frame);
        let spawned = thread::Builder::new().name("frame-export".into()).spawn(move || {
            let result = sink.send(&owned);
            (sink, result)
        });
        match spawned {
            Ok(job) => {
                self.slot = Slot::Busy(job);
                Ok(ExportStatus::Started)
            }
            Err(e) => {
                log::error!("failed to spawn export thread: {e}");
                Err(Error::Export(e.to_string()))
            }
        }
    }

    /// Joins the running export, if any, and takes the sink back.
    fn reclaim(&mut self) -> Result<S> {
        match std::mem::replace(&mut self.slot, Slot::Lost) {
            Slot::Idle(sink) => Ok(sink),
            Slot::Busy(job) => match job.join() {
                Ok((sink, result)) => {
                    self.record(result);
                    Ok(sink)
                }
                Err(_) => {
                    log::error!("export thread panicked");
                    Err(Error::Export("export thread panicked".into()))
                }
            },
            Slot::Lost => Err(Error::Export("frame sink was lost".into())),
        }
    }

    fn record(&mut self, result: io::Result<()>) {
        match result {
            Ok(()) => self.stats.sent += 1,
            Err(e) => {
                self.stats.failed += 1;
                log::warn!("frame export failed: {e}");
            }
        }
    }

    /// True while an export is running.
    pub fn is_busy(&self) -> bool {
        matches!(&self.slot, Slot::Busy(job) if !job.is_finished())
    }

    /// Counts so far. An export still in flight is not counted yet.
    pub fn stats(&self) -> ExportStats {
        self.stats
    }

    /// Waits for the running export and returns the sink.
    pub fn finish(mut self) -> Result<(S, ExportStats)> {
        let sink = self.reclaim()?;
        Ok((sink, self.stats))
    }
}

impl<S: FrameSink> Drop for Exporter<S> {
    fn drop(&mut self) {
        if let Slot::Busy(_) = self.slot {
            let _ = self.reclaim();
        }
    }
}

impl<S: FrameSink> std::fmt::Debug for Exporter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter").field("busy", &self.is_busy()).field("stats", &self.stats).finish()
    }
}
