use std::cell::OnceCell;

use chrono::{DateTime, Local};
use log::debug;

use crate::error::{Result, SplitError};
use crate::time_series::cumulative_from_standalone;
use crate::util;

/// Name of the timestamp column in persisted tables.
pub const TIMESTAMP_COLUMN: &str = "timestamp";
/// Label of the synthetic row added to multi-segment standalone summaries.
pub const TOTAL_ROW: &str = "total";
/// Characters that cannot appear in segment (or task) names.
pub const RESERVED_CHARACTERS: &[char] = &[','];

/// Which derived view of the run table an aggregate runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeView {
    Standalone,
    Cumulative,
}

/// Aggregate statistics of one segment column (or the synthetic total).
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub label: String,
    pub min: f64,
    pub median: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub sum: f64,
    pub count: usize,
}

impl SummaryRow {
    fn from_column(label: &str, column: &[f64]) -> Self {
        Self {
            label: label.to_string(),
            min: util::min(column).unwrap_or(f64::NAN),
            median: util::median(column).unwrap_or(f64::NAN),
            max: util::max(column).unwrap_or(f64::NAN),
            mean: util::mean(column).unwrap_or(f64::NAN),
            std: util::std_dev(column).unwrap_or(f64::NAN),
            sum: util::sum(column),
            count: util::count(column),
        }
    }
}

/// Pearson correlations between standalone segment times.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub segments: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, first: &str, second: &str) -> Option<f64> {
        let row = self.segments.iter().position(|s| s == first)?;
        let column = self.segments.iter().position(|s| s == second)?;
        Some(self.values[row][column])
    }
}

/// The historical runs of a single timed task.
///
/// Runs are stored as standalone segment times, one row per run, with
/// missing segments recorded as NaN. The cumulative view is derived on first
/// use and cached until the next [`TimeSet::append_run`].
#[derive(Debug, Clone)]
pub struct TimeSet {
    segments: Vec<String>,
    min_best: bool,
    timestamps: Vec<DateTime<Local>>,
    standalone: Vec<Vec<f64>>,
    cumulative: OnceCell<Vec<Vec<f64>>>,
}

fn validate_segments(segments: &[String]) -> Result<()> {
    if segments.is_empty() {
        return Err(SplitError::EmptySegments);
    }
    for (index, segment) in segments.iter().enumerate() {
        if segment.trim().is_empty() {
            return Err(SplitError::Schema("segment names cannot be blank".into()));
        }
        if segment == TIMESTAMP_COLUMN {
            return Err(SplitError::Schema(format!(
                "\"{TIMESTAMP_COLUMN}\" is reserved and cannot name a segment"
            )));
        }
        if segment.contains(RESERVED_CHARACTERS) {
            return Err(SplitError::Schema(format!(
                "segment \"{segment}\" contains one of {RESERVED_CHARACTERS:?}"
            )));
        }
        if segments[..index].contains(segment) {
            return Err(SplitError::Schema(format!(
                "segment \"{segment}\" appears more than once"
            )));
        }
    }
    Ok(())
}

impl TimeSet {
    /// Creates a store with no runs.
    pub fn create_empty(segments: Vec<String>, min_best: bool) -> Result<Self> {
        validate_segments(&segments)?;
        Ok(Self {
            segments,
            min_best,
            timestamps: Vec::new(),
            standalone: Vec::new(),
            cumulative: OnceCell::new(),
        })
    }

    /// Creates a store from previously recorded `(timestamp, standalone)` rows.
    pub fn from_rows<I>(segments: Vec<String>, rows: I, min_best: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (DateTime<Local>, Vec<f64>)>,
    {
        let mut time_set = Self::create_empty(segments, min_best)?;
        for (timestamp, standalone) in rows {
            time_set.append_run(timestamp, standalone)?;
        }
        Ok(time_set)
    }

    /// Appends one run given its standalone segment times.
    pub fn append_run(&mut self, timestamp: DateTime<Local>, standalone: Vec<f64>) -> Result<()> {
        if standalone.len() != self.num_segments() {
            return Err(SplitError::RunLength {
                expected: self.num_segments(),
                actual: standalone.len(),
            });
        }
        self.timestamps.push(timestamp);
        self.standalone.push(standalone);
        self.cumulative = OnceCell::new();
        debug!("Stored run {} of {} segments", self.len(), self.num_segments());
        Ok(())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn is_multi_segment(&self) -> bool {
        self.num_segments() > 1
    }

    pub fn min_best(&self) -> bool {
        self.min_best
    }

    pub fn len(&self) -> usize {
        self.standalone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standalone.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Local>] {
        &self.timestamps
    }

    pub fn segment_index(&self, segment: &str) -> Result<usize> {
        self.segments
            .iter()
            .position(|s| s == segment)
            .ok_or_else(|| SplitError::UnknownSegment(segment.to_string()))
    }

    pub fn standalone_times(&self) -> &[Vec<f64>] {
        &self.standalone
    }

    pub fn cumulative_times(&self) -> &[Vec<f64>] {
        self.cumulative.get_or_init(|| {
            self.standalone
                .iter()
                .map(|run| cumulative_from_standalone(run))
                .collect()
        })
    }

    pub fn view(&self, view: TimeView) -> &[Vec<f64>] {
        match view {
            TimeView::Standalone => self.standalone_times(),
            TimeView::Cumulative => self.cumulative_times(),
        }
    }

    fn column(&self, view: TimeView, segment_index: usize) -> Vec<f64> {
        self.view(view).iter().map(|run| run[segment_index]).collect()
    }

    fn columns(&self, view: TimeView) -> impl Iterator<Item = Vec<f64>> + '_ {
        (0..self.num_segments()).map(move |index| self.column(view, index))
    }

    fn extreme_per_segment(&self, view: TimeView, best: bool) -> Vec<f64> {
        let take_min = self.min_best == best;
        self.columns(view)
            .map(|column| {
                let extreme = if take_min {
                    util::min(&column)
                } else {
                    util::max(&column)
                };
                extreme.unwrap_or(f64::NAN)
            })
            .collect()
    }

    /// Best value of each segment, possibly taken from different runs.
    pub fn best_per_segment(&self, view: TimeView) -> Vec<f64> {
        self.extreme_per_segment(view, true)
    }

    pub fn worst_per_segment(&self, view: TimeView) -> Vec<f64> {
        self.extreme_per_segment(view, false)
    }

    pub fn average_per_segment(&self, view: TimeView) -> Vec<f64> {
        self.columns(view)
            .map(|column| util::mean(&column).unwrap_or(f64::NAN))
            .collect()
    }

    /// Index of the run with the best (or worst) final cumulative time.
    ///
    /// Runs that never recorded their final segment cannot be extremal. Ties
    /// go to the earliest run.
    pub fn extreme_run_index(&self, best: bool) -> Result<usize> {
        let last = self.num_segments() - 1;
        let take_min = self.min_best == best;
        self.cumulative_times()
            .iter()
            .map(|run| run[last])
            .enumerate()
            .filter(|(_, final_time)| !final_time.is_nan())
            .reduce(|current, candidate| {
                let replaces = if take_min {
                    candidate.1 < current.1
                } else {
                    candidate.1 > current.1
                };
                if replaces {
                    candidate
                } else {
                    current
                }
            })
            .map(|(index, _)| index)
            .ok_or(SplitError::NoFinishedRun)
    }

    pub fn best_run_index(&self) -> Result<usize> {
        self.extreme_run_index(true)
    }

    pub fn worst_run_index(&self) -> Result<usize> {
        self.extreme_run_index(false)
    }

    pub fn last_run_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    /// Seconds spent across every recorded segment of every run.
    pub fn total_time_spent(&self) -> f64 {
        self.standalone.iter().map(|run| util::sum(run)).sum()
    }

    /// Per-segment statistics of standalone times.
    ///
    /// Multi-segment tasks get a trailing [`TOTAL_ROW`] whose statistics are
    /// sums of the segment statistics. Its std adds variances, which assumes
    /// segment times are independent.
    pub fn standalone_summary(&self) -> Vec<SummaryRow> {
        let mut rows: Vec<SummaryRow> = self
            .segments
            .iter()
            .zip(self.columns(TimeView::Standalone))
            .map(|(segment, column)| SummaryRow::from_column(segment, &column))
            .collect();

        if self.is_multi_segment() {
            let total = SummaryRow {
                label: TOTAL_ROW.to_string(),
                min: rows.iter().map(|row| row.min).sum(),
                median: rows.iter().map(|row| row.median).sum(),
                max: rows.iter().map(|row| row.max).sum(),
                mean: rows.iter().map(|row| row.mean).sum(),
                std: rows.iter().map(|row| row.std * row.std).sum::<f64>().sqrt(),
                sum: rows.iter().map(|row| row.sum).sum(),
                count: rows.last().map_or(0, |row| row.count),
            };
            rows.push(total);
        }
        rows
    }

    /// Per-segment statistics of cumulative times.
    ///
    /// Summing cumulative times only means something for the final segment,
    /// so every other `sum` is NaN.
    pub fn cumulative_summary(&self) -> Vec<SummaryRow> {
        let last = self.num_segments() - 1;
        self.segments
            .iter()
            .zip(self.columns(TimeView::Cumulative))
            .enumerate()
            .map(|(index, (segment, column))| {
                let mut row = SummaryRow::from_column(segment, &column);
                if index != last {
                    row.sum = f64::NAN;
                }
                row
            })
            .collect()
    }

    /// Correlations between the standalone times of the given segments (all
    /// segments when `None`), over runs that recorded every one of them.
    pub fn correlations(&self, segments: Option<&[String]>) -> Result<CorrelationMatrix> {
        let selected = segments.unwrap_or(&self.segments);
        if selected.len() < 2 {
            return Err(SplitError::NotMeaningful(
                "correlations are not meaningful for single segments".into(),
            ));
        }
        let indices = selected
            .iter()
            .map(|segment| self.segment_index(segment))
            .collect::<Result<Vec<usize>>>()?;

        let samples: Vec<Vec<f64>> = self
            .standalone
            .iter()
            .map(|run| indices.iter().map(|&index| run[index]).collect::<Vec<f64>>())
            .filter(|sample| sample.iter().all(|value| !value.is_nan()))
            .collect();

        let count = samples.len() as f64;
        let means: Vec<f64> = (0..indices.len())
            .map(|column| samples.iter().map(|sample| sample[column]).sum::<f64>() / count)
            .collect();
        let covariance = |a: usize, b: usize| -> f64 {
            samples
                .iter()
                .map(|sample| (sample[a] - means[a]) * (sample[b] - means[b]))
                .sum()
        };

        let values = (0..indices.len())
            .map(|a| {
                (0..indices.len())
                    .map(|b| covariance(a, b) / (covariance(a, a) * covariance(b, b)).sqrt())
                    .collect()
            })
            .collect();

        Ok(CorrelationMatrix {
            segments: selected.to_vec(),
            values,
        })
    }
}

fn same_times(these: &[f64], those: &[f64]) -> bool {
    these.len() == those.len()
        && these
            .iter()
            .zip(those)
            .all(|(a, b)| (a.is_nan() && b.is_nan()) || a == b)
}

impl PartialEq for TimeSet {
    fn eq(&self, other: &Self) -> bool {
        self.min_best == other.min_best
            && self.segments == other.segments
            && self.timestamps == other.timestamps
            && self.standalone.len() == other.standalone.len()
            && self
                .standalone
                .iter()
                .zip(&other.standalone)
                .all(|(these, those)| same_times(these, those))
    }
}
