//! Frame scheduling: motion update, composition and submission, one tick at
//! a time, plus out-of-band redraws requested by input.

use std::time::{Duration, Instant};

use log::{error, trace};

use crate::error::ViewerError;
use crate::scene::Frame;

/// Receives composed frames. Implemented by the GPU renderer and by the
/// headless recorder.
pub trait FrameSink {
    fn submit(&mut self, frame: &Frame) -> Result<(), ViewerError>;
}

/// State the scheduler drives. `advance` moves time forward by one fixed
/// step, `compose` reads the current state without changing it.
pub trait FrameSource {
    fn advance(&mut self);
    fn compose(&self) -> Frame;
}

/// Drives the perpetual render loop.
///
/// The host calls [`FrameScheduler::tick`] once per frame: from
/// `requestAnimationFrame` in the browser, on each [`FramePacer`] deadline
/// natively. Input handlers call [`FrameScheduler::request_redraw`] and the
/// host follows up with [`FrameScheduler::redraw_if_dirty`], which redraws
/// without advancing the car.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    ticks: u64,
    redraws: u64,
    failures: u64,
    dirty: bool,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// One scheduled frame. A failed submission is logged and returned; the
    /// next tick composes a fresh frame regardless.
    pub fn tick<V, S>(&mut self, source: &mut V, sink: &mut S) -> Result<(), ViewerError>
    where
        V: FrameSource + ?Sized,
        S: FrameSink + ?Sized,
    {
        self.ticks += 1;
        source.advance();
        self.present(source, sink)
    }

    /// Handles a host redraw event: a due tick advances the scene, otherwise
    /// only pending input changes are presented. Returns whether a frame was
    /// produced.
    pub fn redraw<V, S>(
        &mut self,
        tick_due: bool,
        source: &mut V,
        sink: &mut S,
    ) -> Result<bool, ViewerError>
    where
        V: FrameSource + ?Sized,
        S: FrameSink + ?Sized,
    {
        if tick_due {
            self.tick(source, sink).map(|()| true)
        } else {
            self.redraw_if_dirty(source, sink)
        }
    }

    pub fn request_redraw(&mut self) {
        self.dirty = true;
    }

    /// Submits a frame for pending input changes. Returns whether a frame
    /// was produced.
    pub fn redraw_if_dirty<V, S>(&mut self, source: &V, sink: &mut S) -> Result<bool, ViewerError>
    where
        V: FrameSource + ?Sized,
        S: FrameSink + ?Sized,
    {
        if !self.dirty {
            return Ok(false);
        }
        self.redraws += 1;
        self.present(source, sink).map(|()| true)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    fn present<V, S>(&mut self, source: &V, sink: &mut S) -> Result<(), ViewerError>
    where
        V: FrameSource + ?Sized,
        S: FrameSink + ?Sized,
    {
        self.dirty = false;
        let frame = source.compose();
        trace!("submitting {} draw commands", frame.commands.len());
        sink.submit(&frame).map_err(|err| {
            self.failures += 1;
            error!("frame submission failed: {err}");
            err
        })
    }
}

/// Tick rate for hosts whose redraw events are not display-synced.
pub const TICK_INTERVAL: Duration = Duration::from_micros(16_667);

/// Fixed-rate tick deadline. Redraws between deadlines are input redraws.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    interval: Duration,
    next: Instant,
}

impl FramePacer {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next: start,
        }
    }

    /// Returns whether a tick is due at `now` and moves the deadline on if
    /// so. A host that fell more than one interval behind resumes from `now`
    /// instead of replaying the missed ticks.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.interval;
        if self.next <= now {
            self.next = now + self.interval;
        }
        true
    }

    pub fn deadline(&self) -> Instant {
        self.next
    }
}
