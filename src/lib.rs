// Library surface for the binary, headless integration tests and reuse.
pub mod app_dirs;
pub mod compare;
pub mod config;
pub mod error;
pub mod format;
pub mod input;
pub mod session;
pub mod storage;
pub mod task;
pub mod time_series;
pub mod time_set;
pub mod timer;
pub mod util;

pub use compare::{CompareStyle, CompareTime, ComparisonSet};
pub use error::{Result, SplitError};
pub use session::{run_session, SessionOutcome};
pub use time_set::TimeSet;
pub use timer::{SegmentTimer, TimerEvent};
