//! Timed tasks and the directory they are kept in.
//!
//! Every task owns one directory under the data directory holding its
//! definition (`task.json`) and its run history (`times.csv`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};
use crate::storage;
use crate::time_set::{SummaryRow, TimeSet, RESERVED_CHARACTERS, TOTAL_ROW};

pub const TASK_FILE: &str = "task.json";
pub const TIMES_FILE: &str = "times.csv";

fn default_min_best() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedTask {
    pub name: String,
    pub segments: Vec<String>,
    /// smaller times are better
    #[serde(default = "default_min_best")]
    pub min_best: bool,
    #[serde(skip)]
    directory: PathBuf,
}

impl TimedTask {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn times_path(&self) -> PathBuf {
        self.directory.join(TIMES_FILE)
    }

    fn from_directory(directory: &Path) -> Result<Self> {
        let bytes = fs::read(directory.join(TASK_FILE))?;
        let mut task: TimedTask = serde_json::from_slice(&bytes)?;
        task.directory = directory.to_path_buf();
        debug!("Loaded task {} from {}", task.name, directory.display());
        Ok(task)
    }

    fn save(&self) -> Result<()> {
        fs::write(
            self.directory.join(TASK_FILE),
            serde_json::to_vec_pretty(self)?,
        )?;
        Ok(())
    }

    /// The task's run history, empty if nothing was recorded yet.
    pub fn load_times(&self) -> Result<TimeSet> {
        let path = self.times_path();
        if !path.exists() {
            return TimeSet::create_empty(self.segments.clone(), self.min_best);
        }
        let time_set = storage::load(&path, self.min_best)?;
        if time_set.segments() != self.segments.as_slice() {
            return Err(SplitError::Schema(format!(
                "{} has columns {:?} but task \"{}\" has segments {:?}",
                path.display(),
                time_set.segments(),
                self.name,
                self.segments
            )));
        }
        Ok(time_set)
    }

    pub fn save_times(&self, time_set: &TimeSet) -> Result<()> {
        storage::save(time_set, self.times_path())
    }
}

/// Keeps letters and digits, replacing everything else with `_`.
pub fn sanitize_directory_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SplitError::Schema("task names cannot be blank".into()));
    }
    if name.contains(RESERVED_CHARACTERS) {
        return Err(SplitError::Schema(format!(
            "task \"{name}\" contains one of {RESERVED_CHARACTERS:?}"
        )));
    }
    Ok(())
}

/// Time spent on one task, or on all of them for the total row.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSpent {
    pub label: String,
    pub runs: usize,
    pub seconds: f64,
}

/// All tasks stored under one data directory.
#[derive(Debug, Clone)]
pub struct TaskDirectory {
    root: PathBuf,
}

impl TaskDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collect_tasks(directory: &Path, tasks: &mut Vec<TimedTask>) -> Result<()> {
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            if path.join(TASK_FILE).exists() {
                tasks.push(TimedTask::from_directory(&path)?);
            } else {
                Self::collect_tasks(&path, tasks)?;
            }
        }
        Ok(())
    }

    /// Every stored task, sorted by name.
    pub fn list(&self) -> Result<Vec<TimedTask>> {
        let mut tasks = Vec::new();
        if self.root.is_dir() {
            Self::collect_tasks(&self.root, &mut tasks)?;
        }
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Found {} stored tasks", tasks.len());
        Ok(tasks)
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.list()?.into_iter().map(|task| task.name).collect())
    }

    pub fn open(&self, name: &str) -> Result<TimedTask> {
        self.list()?
            .into_iter()
            .find(|task| task.name == name)
            .ok_or_else(|| SplitError::UnknownTask(name.to_string()))
    }

    pub fn create(&self, name: &str, segments: Vec<String>, min_best: bool) -> Result<TimedTask> {
        check_name(name)?;
        TimeSet::create_empty(segments.clone(), min_best)?;
        if self.names()?.iter().any(|existing| existing == name) {
            return Err(SplitError::TaskExists(name.to_string()));
        }

        let directory = self.root.join(sanitize_directory_name(name));
        if directory.exists() {
            return Err(SplitError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "{} already exists and creating task \"{name}\" there would overwrite it",
                    directory.display()
                ),
            )));
        }
        fs::create_dir_all(&directory)?;

        let task = TimedTask {
            name: name.to_string(),
            segments,
            min_best,
            directory,
        };
        task.save()?;
        info!(
            "Added new task with name {name}. It's stored in {}.",
            task.directory.display()
        );
        Ok(task)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let task = self.open(name)?;
        fs::remove_dir_all(task.directory())?;
        info!("Deleted task with name {name}.");
        Ok(())
    }

    fn selected(&self, names: Option<&[String]>) -> Result<Vec<TimedTask>> {
        match names {
            None => self.list(),
            Some(names) => names.iter().map(|name| self.open(name)).collect(),
        }
    }

    /// Runs recorded and time spent per task, followed by a total row.
    pub fn time_spent(&self, names: Option<&[String]>) -> Result<Vec<TimeSpent>> {
        let mut rows = self
            .selected(names)?
            .into_iter()
            .map(|task| {
                let time_set = task.load_times()?;
                Ok(TimeSpent {
                    label: task.name,
                    runs: time_set.len(),
                    seconds: time_set.total_time_spent(),
                })
            })
            .collect::<Result<Vec<TimeSpent>>>()?;
        rows.push(TimeSpent {
            label: TOTAL_ROW.to_string(),
            runs: rows.iter().map(|row| row.runs).sum(),
            seconds: rows.iter().map(|row| row.seconds).sum(),
        });
        Ok(rows)
    }

    /// Final-time statistics of each task, labelled by task name.
    pub fn final_time_summaries(&self, names: Option<&[String]>) -> Result<Vec<SummaryRow>> {
        self.selected(names)?
            .into_iter()
            .map(|task| {
                let summary = task.load_times()?.cumulative_summary();
                let mut last = summary
                    .into_iter()
                    .last()
                    .ok_or(SplitError::EmptySegments)?;
                last.label = task.name;
                Ok(last)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_set::tests::{fixture, segments};
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn create_then_open() {
        let dir = tempdir().unwrap();
        let tasks = TaskDirectory::new(dir.path());
        let created = tasks
            .create("3x3 blind", segments(&["memo", "exec"]), true)
            .unwrap();

        assert_eq!(created.directory(), dir.path().join("3x3_blind"));
        assert!(created.directory().join(TASK_FILE).exists());

        let opened = tasks.open("3x3 blind").unwrap();
        assert_eq!(opened, created);
        assert!(opened.load_times().unwrap().is_empty());
    }

    #[test]
    fn duplicate_names_are_refused() {
        let dir = tempdir().unwrap();
        let tasks = TaskDirectory::new(dir.path());
        tasks.create("run", segments(&["a"]), true).unwrap();
        assert_matches!(
            tasks.create("run", segments(&["b"]), true),
            Err(SplitError::TaskExists(name)) if name == "run"
        );
        tasks.create("run one", segments(&["a"]), true).unwrap();
        assert_matches!(
            tasks.create("run-one", segments(&["b"]), true),
            Err(SplitError::Io(_))
        );
    }

    #[test]
    fn invalid_definitions_are_refused() {
        let dir = tempdir().unwrap();
        let tasks = TaskDirectory::new(dir.path());
        assert_matches!(tasks.create("a,b", segments(&["x"]), true), Err(SplitError::Schema(_)));
        assert_matches!(tasks.create(" ", segments(&["x"]), true), Err(SplitError::Schema(_)));
        assert_matches!(tasks.create("ok", vec![], true), Err(SplitError::EmptySegments));
        assert!(tasks.list().unwrap().is_empty());
    }

    #[test]
    fn list_is_sorted_and_recursive() {
        let dir = tempdir().unwrap();
        let tasks = TaskDirectory::new(dir.path());
        tasks.create("zeta", segments(&["a"]), true).unwrap();
        tasks.create("alpha", segments(&["a"]), false).unwrap();

        let nested = TaskDirectory::new(dir.path().join("group"));
        nested.create("middle", segments(&["a"]), true).unwrap();

        assert_eq!(tasks.names().unwrap(), vec!["alpha", "middle", "zeta"]);
        assert!(!tasks.open("alpha").unwrap().min_best);
    }

    #[test]
    fn missing_root_lists_nothing() {
        let dir = tempdir().unwrap();
        let tasks = TaskDirectory::new(dir.path().join("absent"));
        assert!(tasks.list().unwrap().is_empty());
        assert_matches!(tasks.open("x"), Err(SplitError::UnknownTask(_)));
    }

    #[test]
    fn times_roundtrip_through_task() {
        let dir = tempdir().unwrap();
        let tasks = TaskDirectory::new(dir.path());
        let task = tasks
            .create("cube", segments(&["first", "second", "third", "fourth"]), true)
            .unwrap();
        task.save_times(&fixture()).unwrap();
        assert_eq!(tasks.open("cube").unwrap().load_times().unwrap(), fixture());
    }

    #[test]
    fn mismatched_columns_are_a_schema_error() {
        let dir = tempdir().unwrap();
        let tasks = TaskDirectory::new(dir.path());
        let task = tasks.create("cube", segments(&["a", "b"]), true).unwrap();
        task.save_times(&fixture()).unwrap();
        assert_matches!(task.load_times(), Err(SplitError::Schema(_)));
    }

    #[test]
    fn delete_removes_directory() {
        let dir = tempdir().unwrap();
        let tasks = TaskDirectory::new(dir.path());
        let task = tasks.create("gone", segments(&["a"]), true).unwrap();
        tasks.delete("gone").unwrap();
        assert!(!task.directory().exists());
        assert_matches!(tasks.delete("gone"), Err(SplitError::UnknownTask(_)));
    }

    #[test]
    fn time_spent_adds_total_row() {
        let dir = tempdir().unwrap();
        let tasks = TaskDirectory::new(dir.path());
        let cube = tasks
            .create("cube", segments(&["first", "second", "third", "fourth"]), true)
            .unwrap();
        cube.save_times(&fixture()).unwrap();
        tasks.create("empty", segments(&["a"]), true).unwrap();

        let rows = tasks.time_spent(None).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].label, "cube");
        assert_eq!(rows[0].runs, 4);
        assert_eq!(rows[0].seconds, 442.);
        assert_eq!(rows[2].label, TOTAL_ROW);
        assert_eq!(rows[2].runs, 4);

        let only_empty = tasks.time_spent(Some(&["empty".to_string()])).unwrap();
        assert_eq!(only_empty[0].seconds, 0.);
        assert_matches!(
            tasks.time_spent(Some(&["nope".to_string()])),
            Err(SplitError::UnknownTask(_))
        );
    }

    #[test]
    fn final_time_summaries_use_last_segment() {
        let dir = tempdir().unwrap();
        let tasks = TaskDirectory::new(dir.path());
        let cube = tasks
            .create("cube", segments(&["first", "second", "third", "fourth"]), true)
            .unwrap();
        cube.save_times(&fixture()).unwrap();

        let summaries = tasks.final_time_summaries(None).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].label, "cube");
        assert_eq!(summaries[0].min, 70.);
        assert_eq!(summaries[0].max, 141.);
        assert_eq!(summaries[0].count, 4);
    }
}
