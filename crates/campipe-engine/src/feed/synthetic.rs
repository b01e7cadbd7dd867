use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::CameraConfig;

use super::{CameraBuffer, FrameCallback, FrameProducer, Plane, Rejected};

/// Software camera: a worker thread that paints a moving test pattern into
/// each submitted buffer and delivers it at the configured frame rate.
#[derive(Debug, Default)]
pub struct SyntheticProducer {
    worker: Option<Worker>,
}

#[derive(Debug)]
struct Worker {
    submit: Sender<CameraBuffer>,
    handle: JoinHandle<()>,
}

impl SyntheticProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl FrameProducer for SyntheticProducer {
    fn start(&mut self, config: &CameraConfig, on_frame: FrameCallback) -> Result<(), String> {
        if self.worker.is_some() {
            return Err("synthetic producer already running".into());
        }

        let (submit, rx) = mpsc::channel();
        let interval = config.frame_interval();
        let handle = thread::Builder::new()
            .name("synthetic-camera".into())
            .spawn(move || run(rx, on_frame, interval))
            .map_err(|e| format!("failed to spawn producer thread: {e}"))?;

        self.worker = Some(Worker { submit, handle });
        Ok(())
    }

    fn submit(&mut self, buffer: CameraBuffer) -> Result<(), Rejected> {
        match &self.worker {
            Some(w) => w.submit.send(buffer).map_err(|e| Rejected {
                buffer: e.0,
                reason: "producer thread exited".into(),
            }),
            None => Err(Rejected { buffer, reason: "producer not started".into() }),
        }
    }

    fn stop(&mut self) {
        let Some(Worker { submit, handle }) = self.worker.take() else { return };
        // Closing the submit side ends the worker's receive loop.
        drop(submit);
        if handle.join().is_err() {
            log::error!("synthetic producer thread panicked");
        }
    }
}

impl Drop for SyntheticProducer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(rx: Receiver<CameraBuffer>, on_frame: FrameCallback, interval: Duration) {
    let mut next = Instant::now();
    let mut sequence = 0u64;

    while let Ok(mut buffer) = rx.recv() {
        next += interval;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            // Fell behind; don't try to catch up with a burst.
            next = now;
        }

        fill_test_pattern(&mut buffer, sequence);
        buffer.set_sequence(sequence);
        sequence += 1;
        on_frame.deliver(buffer);
    }
    log::debug!("synthetic producer stopped after {sequence} frames");
}

/// Diagonal luma ramp scrolling by 4 px per frame over flat chroma bands.
pub fn fill_test_pattern(buffer: &mut CameraBuffer, sequence: u64) {
    let shift = (sequence * 4) as usize;

    let (y, w, h) = buffer.plane_mut(Plane::Y);
    for row in 0..h as usize {
        for col in 0..w as usize {
            y[row * w as usize + col] = ((col + row + shift) & 0xff) as u8;
        }
    }

    let (u, w, _) = buffer.plane_mut(Plane::U);
    for (i, px) in u.iter_mut().enumerate() {
        *px = if (i % w as usize) < w as usize / 2 { 96 } else { 160 };
    }
    let (v, w, h) = buffer.plane_mut(Plane::V);
    for (i, px) in v.iter_mut().enumerate() {
        *px = if i / (w.max(1) as usize) < h as usize / 2 { 160 } else { 96 };
    }
}
