//! The live, event-driven timing of one run.
//!
//! A [`SegmentTimer`] keeps one timestamp per segment boundary: the start
//! followed by the end of every segment handled so far. Skipped segments end
//! at a NaN timestamp.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::compare::ComparisonSet;
use crate::time_series::pad_missing;

/// Abstract input driving the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// the current segment is done
    Complete,
    /// the current segment is done but its time should not count
    Skip,
    /// take back the last completion
    Undo,
    /// stop timing, keeping what was recorded so far
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    NotStarted,
    /// timing the segment with this index
    Running(usize),
    Finished,
    Aborted,
}

/// What an event did to the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced,
    Finished,
    Undone,
    /// undo during the first segment, timing starts over
    Restarted,
    Aborted,
    Ignored,
}

/// Source of the current time in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Monotonic wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<f64>>);

impl ManualClock {
    pub fn advance(&self, seconds: f64) {
        self.0.set(self.0.get() + seconds);
    }

    pub fn set(&self, seconds: f64) {
        self.0.set(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.0.get()
    }
}

/// Receives the lines the timer prints while running.
pub trait ReportSink {
    fn report(&mut self, line: &str);
}

impl<F: FnMut(&str)> ReportSink for F {
    fn report(&mut self, line: &str) {
        self(line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    NeverStarted,
    /// no segment end was recorded before the run ended
    AbortedEarly,
    /// the user chose not to keep the run
    Declined,
}

/// Boundary timestamps of a finished (or abandoned) run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTimes {
    timestamps: Vec<f64>,
    num_segments: usize,
}

impl RunTimes {
    /// Elapsed time since the start at the end of every segment. Segments
    /// after the last one recorded are missing.
    pub fn cumulative(&self) -> Vec<f64> {
        let start = self.timestamps[0];
        pad_missing(
            self.timestamps[1..].iter().map(|time| time - start).collect(),
            self.num_segments,
        )
    }

    /// Time spent on every segment. A skipped segment makes its own entry and
    /// the following one missing.
    pub fn standalone(&self) -> Vec<f64> {
        pad_missing(
            self.timestamps
                .windows(2)
                .map(|pair| pair[1] - pair[0])
                .collect(),
            self.num_segments,
        )
    }

    pub fn is_complete(&self) -> bool {
        self.standalone().iter().all(|time| !time.is_nan())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Finalized {
    Discarded(DiscardReason),
    /// a run worth keeping, pending confirmation
    Pending(RunTimes),
}

pub struct SegmentTimer<C: Clock> {
    segments: Vec<String>,
    comparison: ComparisonSet,
    clock: C,
    decimals: usize,
    timestamps: Vec<f64>,
    state: TimerState,
}

impl<C: Clock> SegmentTimer<C> {
    pub fn new(segments: Vec<String>, comparison: ComparisonSet, clock: C, decimals: usize) -> Self {
        Self {
            segments,
            comparison,
            clock,
            decimals,
            timestamps: Vec::new(),
            state: TimerState::NotStarted,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, TimerState::Finished | TimerState::Aborted)
    }

    pub fn start(&mut self, sink: &mut impl ReportSink) {
        self.timestamps = vec![self.clock.now()];
        self.state = TimerState::Running(0);
        self.announce(0, sink);
    }

    pub fn on_event(&mut self, event: TimerEvent, sink: &mut impl ReportSink) -> Transition {
        let TimerState::Running(index) = self.state else {
            debug!("Ignoring {event:?} while {:?}", self.state);
            return Transition::Ignored;
        };
        debug!("Dispatching {event:?} during {}", self.segments[index]);
        match event {
            TimerEvent::Complete => {
                let now = self.clock.now();
                self.end_segment(index, now, sink)
            }
            TimerEvent::Skip => self.end_segment(index, f64::NAN, sink),
            TimerEvent::Undo => self.undo(index, sink),
            TimerEvent::Abort => {
                info!("Aborting run during {}", self.segments[index]);
                self.state = TimerState::Aborted;
                Transition::Aborted
            }
        }
    }

    fn announce(&self, index: usize, sink: &mut impl ReportSink) {
        sink.report(&format!("Current segment: {}", self.segments[index]));
    }

    fn end_segment(&mut self, index: usize, time: f64, sink: &mut impl ReportSink) -> Transition {
        self.timestamps.push(time);
        let standalone = time - self.timestamps[index];
        let cumulative = time - self.timestamps[0];
        sink.report(&self.comparison.segment_report(
            index,
            standalone,
            cumulative,
            self.decimals,
        ));

        let next = index + 1;
        if next == self.segments.len() {
            self.state = TimerState::Finished;
            Transition::Finished
        } else {
            self.state = TimerState::Running(next);
            self.announce(next, sink);
            Transition::Advanced
        }
    }

    fn undo(&mut self, index: usize, sink: &mut impl ReportSink) -> Transition {
        if index == 0 {
            info!("Restarting {}", self.segments[0]);
            self.timestamps = vec![self.clock.now()];
            self.announce(0, sink);
            return Transition::Restarted;
        }
        self.timestamps.pop();
        info!("Undoing finish of {}", self.segments[index - 1]);
        self.state = TimerState::Running(index - 1);
        self.announce(index - 1, sink);
        Transition::Undone
    }

    /// Turns the recorded timestamps into a run, or explains why there is
    /// nothing to keep. Runs that never reached a recorded segment end are
    /// discarded without asking.
    pub fn finalize(self) -> Finalized {
        if self.timestamps.is_empty() {
            warn!("Timer was never started.");
            return Finalized::Discarded(DiscardReason::NeverStarted);
        }
        let run = RunTimes {
            timestamps: self.timestamps,
            num_segments: self.segments.len(),
        };
        if run.cumulative().iter().all(|time| time.is_nan()) {
            warn!("Not adding new time because run aborted during first segment.");
            return Finalized::Discarded(DiscardReason::AbortedEarly);
        }
        Finalized::Pending(run)
    }
}
