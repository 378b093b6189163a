use chrono::Local;
use log::{info, warn};

use crate::compare::{CompareStyle, ComparisonSet};
use crate::error::{Result, SplitError};
use crate::input::InputSource;
use crate::time_set::TimeSet;
use crate::timer::{Clock, DiscardReason, Finalized, ReportSink, SegmentTimer};

pub const CONFIRM_QUESTION: &str = "Should this run be added?";

/// How a timed attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// appended to the store as the run with this index
    Stored { index: usize },
    Discarded(DiscardReason),
}

/// Times one run of `time_set`'s task and appends it if the user keeps it.
///
/// The store is only modified in memory; saving it is up to the caller.
pub fn run_session<I, C, S>(
    time_set: &mut TimeSet,
    style: CompareStyle,
    input: &mut I,
    clock: C,
    sink: &mut S,
    decimals: usize,
) -> Result<SessionOutcome>
where
    I: InputSource + ?Sized,
    C: Clock,
    S: ReportSink,
{
    info!("Comparing against {style}");
    let comparison = ComparisonSet::build(time_set, style)?;
    let segments = time_set.segments().to_vec();
    let mut timer = SegmentTimer::new(segments.clone(), comparison, clock, decimals);

    if input.wait_for_start(&segments[0])? {
        timer.start(sink);
        while !timer.is_done() {
            match input.next_event()? {
                Some(event) => {
                    timer.on_event(event, sink);
                }
                None => {
                    warn!("Input ended during {:?}", timer.state());
                    break;
                }
            }
        }
    }

    let run = match timer.finalize() {
        Finalized::Pending(run) => run,
        Finalized::Discarded(reason) => return Ok(SessionOutcome::Discarded(reason)),
    };
    let standalone = run.standalone();
    if time_set.is_empty() && standalone.iter().any(|time| time.is_nan()) {
        return Err(SplitError::IncompleteFirstRun);
    }

    if !input.confirm(CONFIRM_QUESTION)? {
        info!("Not adding new completion time at user request.");
        return Ok(SessionOutcome::Discarded(DiscardReason::Declined));
    }
    info!("Adding new completion time.");
    time_set.append_run(Local::now(), standalone)?;
    Ok(SessionOutcome::Stored {
        index: time_set.len() - 1,
    })
}
