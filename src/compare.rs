use clap::ValueEnum;
use crossterm::style::Color;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};
use crate::format::{make_time_string, paint_bold, time_or_missing, MISSING};
use crate::time_series::{cumulative_from_standalone, standalone_from_cumulative};
use crate::time_set::{TimeSet, TimeView};

/// How the live (green/red) baseline of a run is derived from history.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareStyle {
    /// no comparison
    None,
    /// the run with the best final time
    #[default]
    BestRun,
    /// the run with the worst final time
    WorstRun,
    /// the most recently stored run
    LastRun,
    /// the best time of every segment, from any run
    BestSegments,
    /// the worst time of every segment, from any run
    WorstSegments,
    /// the mean time of every segment
    AverageSegments,
    /// best segments plus an even share of the best run's remaining time save
    BalancedBest,
}

/// Optional per-segment reference times. `None` means nothing to compare to.
#[derive(Debug, Clone, Default)]
pub struct CompareTime(Option<Vec<f64>>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOutcome {
    Worse,
    Equal,
    Better,
}

/// Discrete and numeric result of comparing one time to a baseline.
#[derive(Debug, Clone, Copy)]
pub struct CompareResult {
    pub outcome: CompareOutcome,
    /// `time - baseline`; NaN when no comparison was possible.
    pub delta: f64,
}

impl CompareResult {
    pub fn unavailable() -> Self {
        Self {
            outcome: CompareOutcome::Equal,
            delta: f64::NAN,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.delta.is_nan()
    }

    /// ` (+1.2)` style suffix, ` (????)` when no baseline was available.
    pub fn delta_string(&self, decimals: usize) -> String {
        if self.is_available() {
            format!(" ({})", make_time_string(self.delta, decimals, true))
        } else {
            format!(" ({MISSING})")
        }
    }
}

impl CompareTime {
    pub fn new(data: Vec<f64>) -> Self {
        Self(Some(data))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn data(&self) -> Option<&[f64]> {
        self.0.as_deref()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn compare(&self, segment_index: usize, time: f64, min_better: bool) -> CompareResult {
        let Some(baseline) = self.0.as_ref().and_then(|data| data.get(segment_index)) else {
            return CompareResult::unavailable();
        };
        let delta = time - baseline;
        if delta.is_nan() {
            return CompareResult::unavailable();
        }
        let outcome = if delta == 0.0 {
            CompareOutcome::Equal
        } else if (delta < 0.0) == min_better {
            CompareOutcome::Better
        } else {
            CompareOutcome::Worse
        };
        CompareResult { outcome, delta }
    }
}

impl PartialEq for CompareTime {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(these), Some(those)) => {
                these.len() == those.len()
                    && these
                        .iter()
                        .zip(those)
                        .all(|(a, b)| (a.is_nan() && b.is_nan()) || a == b)
            }
            _ => false,
        }
    }
}

/// Color of one reported time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportColor {
    White,
    Green,
    Red,
    /// beats the best time ever recorded for this split
    Gold,
}

impl ReportColor {
    /// Gold whenever the best-ever comparison is better, regardless of the
    /// live comparison; otherwise green/red/white from the live comparison.
    pub fn choose(current: &CompareResult, best: &CompareResult) -> Self {
        if best.outcome == CompareOutcome::Better {
            return ReportColor::Gold;
        }
        match current.outcome {
            CompareOutcome::Better => ReportColor::Green,
            CompareOutcome::Worse => ReportColor::Red,
            CompareOutcome::Equal => ReportColor::White,
        }
    }

    pub fn terminal_color(self) -> Color {
        match self {
            ReportColor::White => Color::White,
            ReportColor::Green => Color::Green,
            ReportColor::Red => Color::Red,
            ReportColor::Gold => Color::Yellow,
        }
    }
}

type Baselines = (CompareTime, CompareTime);

fn from_standalone(standalone: Vec<f64>) -> Baselines {
    let cumulative = cumulative_from_standalone(&standalone);
    (CompareTime::new(standalone), CompareTime::new(cumulative))
}

fn from_run(time_set: &TimeSet, run_index: usize) -> Baselines {
    let cumulative = time_set.cumulative_times()[run_index].clone();
    let standalone = standalone_from_cumulative(&cumulative);
    (CompareTime::new(standalone), CompareTime::new(cumulative))
}

/// Best segments with the best run's leftover time save spread evenly, so the
/// baseline still adds up to the best run's final time.
fn balanced_best(time_set: &TimeSet) -> Result<Baselines> {
    let best_run = &time_set.standalone_times()[time_set.best_run_index()?];
    let best_segments = time_set.best_per_segment(TimeView::Standalone);
    Ok(from_standalone(spread_time_save(best_run, &best_segments)?))
}

/// Adds an equal share of `best_run`'s total time save over `best_segments`
/// to every best segment.
fn spread_time_save(best_run: &[f64], best_segments: &[f64]) -> Result<Vec<f64>> {
    if best_run.iter().any(|time| time.is_nan()) {
        return Err(SplitError::IncompleteBestRun);
    }
    let time_save: f64 = best_run
        .iter()
        .zip(best_segments)
        .map(|(run_time, best_time)| run_time - best_time)
        .sum();
    let share = time_save / best_segments.len() as f64;
    Ok(best_segments.iter().map(|best_time| best_time + share).collect())
}

impl CompareStyle {
    /// Standalone and cumulative baselines this style derives from `time_set`.
    pub fn baselines(self, time_set: &TimeSet) -> Result<Baselines> {
        if time_set.is_empty() {
            return Ok((CompareTime::none(), CompareTime::none()));
        }
        match self {
            CompareStyle::None => Ok((CompareTime::none(), CompareTime::none())),
            CompareStyle::BestRun => Ok(from_run(time_set, time_set.best_run_index()?)),
            CompareStyle::WorstRun => Ok(from_run(time_set, time_set.worst_run_index()?)),
            CompareStyle::LastRun => Ok(from_run(time_set, time_set.len() - 1)),
            CompareStyle::BestSegments => Ok(from_standalone(
                time_set.best_per_segment(TimeView::Standalone),
            )),
            CompareStyle::WorstSegments => Ok(from_standalone(
                time_set.worst_per_segment(TimeView::Standalone),
            )),
            CompareStyle::AverageSegments => Ok(from_standalone(
                time_set.average_per_segment(TimeView::Standalone),
            )),
            CompareStyle::BalancedBest => balanced_best(time_set),
        }
    }
}

/// Baselines for gold detection: best standalone and best cumulative time of
/// every segment, whatever live style is in effect.
pub fn best_ever(time_set: &TimeSet) -> Baselines {
    if time_set.is_empty() {
        return (CompareTime::none(), CompareTime::none());
    }
    (
        CompareTime::new(time_set.best_per_segment(TimeView::Standalone)),
        CompareTime::new(time_set.best_per_segment(TimeView::Cumulative)),
    )
}

/// One time measured against the live and best-ever baselines.
#[derive(Debug, Clone, Copy)]
pub struct SplitComparison {
    pub time: f64,
    pub current: CompareResult,
    pub best: CompareResult,
    pub color: ReportColor,
}

impl SplitComparison {
    fn new(
        segment_index: usize,
        time: f64,
        current: &CompareTime,
        best: &CompareTime,
        min_best: bool,
    ) -> Self {
        let current = current.compare(segment_index, time, min_best);
        let best = best.compare(segment_index, time, min_best);
        Self {
            time,
            current,
            best,
            color: ReportColor::choose(&current, &best),
        }
    }

    /// Time and live difference, e.g. `1:02.3 (-0.4)`, without color.
    pub fn plain_text(&self, decimals: usize) -> String {
        format!(
            "{}{}",
            time_or_missing(self.time, decimals),
            self.current.delta_string(decimals)
        )
    }

    pub fn render(&self, decimals: usize) -> String {
        paint_bold(&self.plain_text(decimals), self.color.terminal_color())
    }
}

/// The four baselines consulted after every segment of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSet {
    pub current_standalone: CompareTime,
    pub current_cumulative: CompareTime,
    pub best_standalone: CompareTime,
    pub best_cumulative: CompareTime,
    pub min_best: bool,
}

impl ComparisonSet {
    pub fn build(time_set: &TimeSet, style: CompareStyle) -> Result<Self> {
        let (current_standalone, current_cumulative) = style.baselines(time_set)?;
        let (best_standalone, best_cumulative) = best_ever(time_set);
        Ok(Self {
            current_standalone,
            current_cumulative,
            best_standalone,
            best_cumulative,
            min_best: time_set.min_best(),
        })
    }

    /// A set with nothing to compare against.
    pub fn empty(min_best: bool) -> Self {
        Self {
            current_standalone: CompareTime::none(),
            current_cumulative: CompareTime::none(),
            best_standalone: CompareTime::none(),
            best_cumulative: CompareTime::none(),
            min_best,
        }
    }

    pub fn standalone(&self, segment_index: usize, time: f64) -> SplitComparison {
        SplitComparison::new(
            segment_index,
            time,
            &self.current_standalone,
            &self.best_standalone,
            self.min_best,
        )
    }

    pub fn cumulative(&self, segment_index: usize, time: f64) -> SplitComparison {
        SplitComparison::new(
            segment_index,
            time,
            &self.current_cumulative,
            &self.best_cumulative,
            self.min_best,
        )
    }

    /// The line printed after a segment ends. The first segment's cumulative
    /// time equals its standalone time, so it is only shown from the second
    /// segment on.
    pub fn segment_report(
        &self,
        segment_index: usize,
        standalone: f64,
        cumulative: f64,
        decimals: usize,
    ) -> String {
        let mut message = format!(
            "Segment time: {}",
            self.standalone(segment_index, standalone).render(decimals)
        );
        if segment_index > 0 {
            message.push_str(&format!(
                ", cumulative time: {}",
                self.cumulative(segment_index, cumulative).render(decimals)
            ));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_set::tests::{at, fixture, segments};
    use assert_matches::assert_matches;

    fn data(compare_time: &CompareTime) -> Vec<f64> {
        compare_time.data().unwrap().to_vec()
    }

    #[test]
    fn run_styles_use_stored_cumulative_times() {
        let time_set = fixture();

        let (standalone, cumulative) = CompareStyle::BestRun.baselines(&time_set).unwrap();
        assert_eq!(data(&cumulative), time_set.cumulative_times()[1]);
        assert_eq!(data(&standalone), vec![15., 15., 10., 30.]);

        let (_, cumulative) = CompareStyle::WorstRun.baselines(&time_set).unwrap();
        assert_eq!(data(&cumulative), vec![1., 61., 121., 141.]);

        let (standalone, cumulative) = CompareStyle::LastRun.baselines(&time_set).unwrap();
        assert_eq!(data(&standalone), vec![60., 1., 60., 10.]);
        assert_eq!(data(&cumulative), vec![60., 61., 121., 131.]);
    }

    #[test]
    fn segment_styles_sum_standalone_baselines() {
        let time_set = fixture();

        let (standalone, cumulative) = CompareStyle::BestSegments.baselines(&time_set).unwrap();
        assert_eq!(data(&standalone), vec![1., 1., 10., 10.]);
        assert_eq!(data(&cumulative), vec![1., 2., 12., 22.]);

        let (standalone, _) = CompareStyle::WorstSegments.baselines(&time_set).unwrap();
        assert_eq!(data(&standalone), vec![60., 60., 60., 40.]);

        let (standalone, cumulative) =
            CompareStyle::AverageSegments.baselines(&time_set).unwrap();
        assert_eq!(data(&standalone), vec![21.5, 24., 40., 25.]);
        assert_eq!(data(&cumulative), vec![21.5, 45.5, 85.5, 110.5]);
    }

    #[test]
    fn balanced_best_spreads_time_save() {
        let time_set = fixture();
        let (standalone, cumulative) = CompareStyle::BalancedBest.baselines(&time_set).unwrap();
        assert_eq!(data(&standalone), vec![13., 13., 22., 22.]);
        assert_eq!(data(&cumulative), vec![13., 26., 48., 70.]);

        let total: f64 = data(&standalone).iter().sum();
        let best_final = time_set.cumulative_times()[1][3];
        assert!((total - best_final).abs() < 1e-9);
    }

    #[test]
    fn balanced_best_matches_best_run_total_with_fractions() {
        let time_set = TimeSet::from_rows(
            segments(&["a", "b", "c"]),
            vec![
                (at(0), vec![3.3, 4.1, 5.7]),
                (at(1), vec![2.9, 4.4, 6.2]),
                (at(2), vec![3.1, 3.8, 6.9]),
            ],
            true,
        )
        .unwrap();
        let (standalone, _) = CompareStyle::BalancedBest.baselines(&time_set).unwrap();
        let best_final = time_set.cumulative_times()[time_set.best_run_index().unwrap()][2];
        let total: f64 = data(&standalone).iter().sum();
        assert!((total - best_final).abs() < 1e-9);
    }

    #[test]
    fn empty_store_has_no_baselines() {
        let time_set = TimeSet::create_empty(segments(&["a", "b"]), true).unwrap();
        for style in CompareStyle::value_variants() {
            let (standalone, cumulative) = style.baselines(&time_set).unwrap();
            assert!(standalone.is_none(), "{style} should have no baseline");
            assert!(cumulative.is_none());
        }
        let (standalone, cumulative) = best_ever(&time_set);
        assert!(standalone.is_none() && cumulative.is_none());
    }

    #[test]
    fn none_style_has_no_baselines() {
        let (standalone, cumulative) = CompareStyle::None.baselines(&fixture()).unwrap();
        assert_eq!(standalone, CompareTime::none());
        assert_eq!(cumulative, CompareTime::none());
    }

    #[test]
    fn best_ever_ignores_live_style() {
        let time_set = fixture();
        let worst = ComparisonSet::build(&time_set, CompareStyle::WorstRun).unwrap();
        let best = ComparisonSet::build(&time_set, CompareStyle::BestSegments).unwrap();
        assert_eq!(worst.best_standalone, best.best_standalone);
        assert_eq!(worst.best_cumulative, best.best_cumulative);
        assert_eq!(data(&worst.best_cumulative), vec![1., 30., 40., 70.]);
    }

    #[test]
    fn compare_classification() {
        let baseline = CompareTime::new(vec![10., 20.]);

        let result = baseline.compare(0, 8., true);
        assert_eq!(result.outcome, CompareOutcome::Better);
        assert_eq!(result.delta, -2.);

        assert_eq!(baseline.compare(0, 12., true).outcome, CompareOutcome::Worse);
        assert_eq!(baseline.compare(0, 12., false).outcome, CompareOutcome::Better);
        assert_eq!(baseline.compare(1, 20., true).outcome, CompareOutcome::Equal);
        assert_eq!(baseline.compare(1, 20., true).delta, 0.);
    }

    #[test]
    fn compare_without_data_is_equal_and_undefined() {
        let result = CompareTime::none().compare(0, 5., true);
        assert_eq!(result.outcome, CompareOutcome::Equal);
        assert!(!result.is_available());

        let result = CompareTime::new(vec![3.]).compare(0, f64::NAN, true);
        assert_eq!(result.outcome, CompareOutcome::Equal);
        assert!(result.delta.is_nan());

        let result = CompareTime::new(vec![f64::NAN]).compare(0, 3., true);
        assert_eq!(result.outcome, CompareOutcome::Equal);
        assert!(result.delta.is_nan());
    }

    #[test]
    fn compare_time_equality_with_missing_values() {
        assert_eq!(CompareTime::none(), CompareTime::none());
        assert_ne!(CompareTime::none(), CompareTime::new(vec![]));
        assert_eq!(
            CompareTime::new(vec![1., f64::NAN]),
            CompareTime::new(vec![1., f64::NAN])
        );
        assert_ne!(CompareTime::new(vec![1., f64::NAN]), CompareTime::new(vec![1., 2.]));
        assert_ne!(CompareTime::new(vec![1.]), CompareTime::new(vec![1., 2.]));
    }

    #[test]
    fn gold_overrides_live_color() {
        let better = CompareResult {
            outcome: CompareOutcome::Better,
            delta: -1.,
        };
        let worse = CompareResult {
            outcome: CompareOutcome::Worse,
            delta: 1.,
        };
        let equal = CompareResult::unavailable();

        assert_eq!(ReportColor::choose(&worse, &better), ReportColor::Gold);
        assert_eq!(ReportColor::choose(&better, &better), ReportColor::Gold);
        assert_eq!(ReportColor::choose(&better, &worse), ReportColor::Green);
        assert_eq!(ReportColor::choose(&worse, &worse), ReportColor::Red);
        assert_eq!(ReportColor::choose(&equal, &equal), ReportColor::White);
    }

    #[test]
    fn record_run_is_gold_on_every_split() {
        let comparison = ComparisonSet::build(&fixture(), CompareStyle::WorstRun).unwrap();
        let record = [0.5, 0.5, 9., 9.];
        let mut cumulative = 0.;
        for (index, &time) in record.iter().enumerate() {
            cumulative += time;
            assert_eq!(comparison.standalone(index, time).color, ReportColor::Gold);
            assert_eq!(
                comparison.standalone(index, time).best.outcome,
                CompareOutcome::Better
            );
            assert_eq!(comparison.cumulative(index, cumulative).color, ReportColor::Gold);
        }
    }

    #[test]
    fn live_colors_against_best_run() {
        let comparison = ComparisonSet::build(&fixture(), CompareStyle::BestRun).unwrap();
        assert_eq!(comparison.standalone(0, 14.).color, ReportColor::Green);
        assert_eq!(comparison.standalone(0, 16.).color, ReportColor::Red);
        assert_eq!(comparison.standalone(0, 15.).color, ReportColor::White);
        assert_eq!(comparison.standalone(0, f64::NAN).color, ReportColor::White);
    }

    #[test]
    fn split_text_shows_missing_markers() {
        let comparison = ComparisonSet::build(&fixture(), CompareStyle::BestRun).unwrap();
        assert_eq!(comparison.standalone(0, 14.).plain_text(1), "14.0 (-1.0)");
        assert_eq!(comparison.standalone(0, f64::NAN).plain_text(1), "???? (????)");
        assert_eq!(
            ComparisonSet::empty(true).standalone(0, 3.).plain_text(1),
            "3.0 (????)"
        );
    }

    #[test]
    fn segment_report_shows_cumulative_after_first_segment() {
        let comparison = ComparisonSet::build(&fixture(), CompareStyle::BestRun).unwrap();
        let first = comparison.segment_report(0, 14., 14., 1);
        assert!(first.starts_with("Segment time: "));
        assert!(first.contains("14.0 (-1.0)"));
        assert!(!first.contains("cumulative"));

        let second = comparison.segment_report(1, 16., 30., 1);
        assert!(second.contains("16.0 (+1.0)"));
        assert!(second.contains(", cumulative time: "));
        assert!(second.contains("30.0 (+0.0)"));
    }

    #[test]
    fn style_names() {
        assert_eq!(CompareStyle::BalancedBest.to_string(), "BALANCED_BEST");
        assert_eq!(CompareStyle::default(), CompareStyle::BestRun);
        assert_eq!(
            CompareStyle::from_str("average-segments", true).unwrap(),
            CompareStyle::AverageSegments
        );
        assert_eq!(
            serde_json::to_string(&CompareStyle::LastRun).unwrap(),
            "\"last-run\""
        );
    }

    #[test]
    fn time_save_needs_every_segment_of_the_best_run() {
        assert_matches!(
            spread_time_save(&[1., f64::NAN], &[1., 2.]),
            Err(SplitError::IncompleteBestRun)
        );
        assert_eq!(spread_time_save(&[3., 5.], &[1., 5.]).unwrap(), vec![2., 6.]);
    }

    #[test]
    fn balanced_best_requires_finished_best_run() {
        let time_set = TimeSet::from_rows(
            segments(&["a", "b"]),
            vec![(at(0), vec![1., f64::NAN])],
            true,
        )
        .unwrap();
        assert_matches!(
            CompareStyle::BalancedBest.baselines(&time_set),
            Err(SplitError::NoFinishedRun)
        );
    }
}
