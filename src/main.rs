use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand, ValueEnum};
use crossterm::{
    terminal::{disable_raw_mode, enable_raw_mode},
    tty::IsTty,
};
use env_logger::Env;
use itertools::Itertools;
use log::info;
use splitr::{
    config::{Config, ConfigStore, FileConfigStore, CONFIG_KEYS},
    format::{make_time_string, render_table},
    input::{InputSource, KeyInput, LineInput, PedalInput},
    run_session,
    task::{TaskDirectory, TimedTask},
    time_set::{SummaryRow, TimeSet},
    timer::SystemClock,
    CompareStyle, SessionOutcome,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
};

/// multi-segment run timer with live split comparisons
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Times repeated multi-step activities segment by segment, compares every split against your history as you go, and keeps summaries of every task."
)]
pub struct Cli {
    /// directory holding task data, overriding the configured one
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,

    /// config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// create a new timed task
    Create {
        name: String,
        /// names of the segments, in order
        #[clap(required = true)]
        segments: Vec<String>,
        /// larger times are better
        #[clap(long)]
        max_best: bool,
    },
    /// interactively time a run of a task
    Time {
        name: String,
        /// what to compare live splits against (defaults to the configured style)
        #[clap(short, long, value_enum)]
        compare: Option<CompareStyle>,
        /// how segment completions are signalled
        #[clap(short, long, value_enum, default_value_t = InputKind::Line)]
        input: InputKind,
    },
    /// detailed statistics of one task, or final times of several
    Summarize {
        name: Option<String>,
        /// tasks to include when no single task is given
        #[clap(short, long, value_delimiter = ',', conflicts_with = "name")]
        tasks: Option<Vec<String>>,
    },
    /// print every recorded run of a task
    PrintTimes { name: String },
    /// list tasks, or the segments of one task
    List { name: Option<String> },
    /// delete a task and all of its runs
    Delete {
        name: String,
        /// skip the confirmation question
        #[clap(long)]
        force: bool,
    },
    /// correlations between segment times of a task
    Correlation {
        name: String,
        /// segments to correlate (all when omitted)
        #[clap(short, long, value_delimiter = ',')]
        segments: Option<Vec<String>>,
    },
    /// total time spent per task
    TimeSpent {
        #[clap(short, long, value_delimiter = ',')]
        tasks: Option<Vec<String>>,
    },
    /// show or change configuration values
    Config {
        /// setting to show or change
        #[clap(short, long)]
        name: Option<String>,
        /// new value for the setting
        #[clap(short, long, requires = "name")]
        value: Option<String>,
        /// skip the confirmation question
        #[clap(long)]
        force: bool,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
pub enum InputKind {
    /// Typed lines; enter completes, or type skip, undo, abort
    Line,
    /// Single key presses with the configured key sets
    Keys,
    /// Audio pedal; needs an audio capture backend, none is built in yet
    Pedal,
}

/// Restores cooked mode however the timing loop ends.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn ask(question: &str) -> splitr::Result<bool> {
    LineInput::stdio().confirm(question)
}

fn summary_table(first_column: &str, rows: &[SummaryRow], decimals: usize) -> String {
    let headers = [first_column, "min", "median", "max", "mean", "std", "sum", "count"]
        .map(String::from)
        .to_vec();
    let rows = rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.label.clone()];
            cells.extend(
                [row.min, row.median, row.max, row.mean, row.std, row.sum]
                    .iter()
                    .map(|&value| make_time_string(value, decimals, false)),
            );
            cells.push(row.count.to_string());
            cells
        })
        .collect_vec();
    render_table(&headers, &rows)
}

fn print_detailed_summary(task: &TimedTask, time_set: &TimeSet, decimals: usize) {
    println!("\nTask: {} ({} runs)\n", task.name, time_set.len());
    if time_set.is_multi_segment() {
        println!("Standalone segment times:");
        println!("{}\n", summary_table("segment", &time_set.standalone_summary(), decimals));
        println!("Cumulative segment times:");
    }
    println!("{}\n", summary_table("segment", &time_set.cumulative_summary(), decimals));
}

fn print_times(time_set: &TimeSet, decimals: usize) {
    let headers = std::iter::once("timestamp".to_string())
        .chain(time_set.segments().iter().cloned())
        .collect_vec();
    let rows = time_set
        .timestamps()
        .iter()
        .zip(time_set.standalone_times())
        .map(|(timestamp, run)| {
            std::iter::once(timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
                .chain(run.iter().map(|&time| make_time_string(time, decimals, false)))
                .collect_vec()
        })
        .collect_vec();
    println!("{}", render_table(&headers, &rows));
}

fn time_task(
    tasks: &TaskDirectory,
    config: &Config,
    name: &str,
    compare: Option<CompareStyle>,
    input: InputKind,
) -> Result<(), Box<dyn Error>> {
    let task = tasks.open(name)?;
    let mut time_set = task.load_times()?;
    let style = compare.unwrap_or(config.default_compare_style);
    let decimals = config.num_decimal_places;

    let outcome = match input {
        InputKind::Line => {
            let mut sink = |line: &str| println!("{line}");
            run_session(
                &mut time_set,
                style,
                &mut LineInput::stdio(),
                SystemClock::new(),
                &mut sink,
                decimals,
            )?
        }
        InputKind::Keys => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty for key input").exit();
            }
            let bindings = config.key_bindings()?;
            let _raw = RawModeGuard::enable()?;
            let mut input = KeyInput::spawn(bindings, io::stdout());
            let mut sink = |line: &str| print!("{line}\r\n");
            run_session(
                &mut time_set,
                style,
                &mut input,
                SystemClock::new(),
                &mut sink,
                decimals,
            )?
        }
        InputKind::Pedal => {
            let mut input = PedalInput::default_device()?;
            let mut sink = |line: &str| println!("{line}");
            run_session(
                &mut time_set,
                style,
                &mut input,
                SystemClock::new(),
                &mut sink,
                decimals,
            )?
        }
    };

    match outcome {
        SessionOutcome::Stored { index } => {
            task.save_times(&time_set)?;
            println!("Stored run {} of {}.", index + 1, task.name);
        }
        SessionOutcome::Discarded(reason) => info!("Run discarded ({reason:?})"),
    }
    Ok(())
}

fn configure(
    store: &FileConfigStore,
    mut config: Config,
    name: Option<String>,
    value: Option<String>,
    force: bool,
) -> Result<(), Box<dyn Error>> {
    match (name, value) {
        (None, _) => {
            for key in CONFIG_KEYS {
                println!("{key}: {}", config.get(key)?);
            }
        }
        (Some(name), None) => println!("{name}: {}", config.get(&name)?),
        (Some(name), Some(value)) => {
            let question = format!(
                "Current: {name} -> {}. Should it be changed to {name} -> {value}?",
                config.get(&name)?
            );
            if force || ask(&question)? {
                config.set(&name, &value)?;
                store.save(&config)?;
                info!("Set {name} to {value} in {}", store.path().display());
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let config = store.load();
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data_directory());
    let tasks = TaskDirectory::new(data_dir);
    let decimals = config.num_decimal_places;

    match cli.command {
        Command::Create {
            name,
            segments,
            max_best,
        } => {
            tasks.create(&name, segments, !max_best)?;
        }
        Command::Time {
            name,
            compare,
            input,
        } => time_task(&tasks, &config, &name, compare, input)?,
        Command::Summarize { name: Some(name), .. } => {
            let task = tasks.open(&name)?;
            print_detailed_summary(&task, &task.load_times()?, decimals);
        }
        Command::Summarize { name: None, tasks: names } => {
            let rows = tasks.final_time_summaries(names.as_deref())?;
            println!("{}", summary_table("task", &rows, decimals));
        }
        Command::PrintTimes { name } => print_times(&tasks.open(&name)?.load_times()?, decimals),
        Command::List { name: None } => {
            for name in tasks.names()? {
                println!("{name}");
            }
        }
        Command::List { name: Some(name) } => {
            let task = tasks.open(&name)?;
            println!("Task name: {}", task.name);
            println!("\tSegments: {}", task.segments.join(", "));
            println!(
                "\tBetter times are: {}",
                if task.min_best { "smaller" } else { "larger" }
            );
        }
        Command::Delete { name, force } => {
            tasks.open(&name)?;
            if force || ask(&format!("Are you sure you'd like to delete {name}?"))? {
                tasks.delete(&name)?;
            }
        }
        Command::Correlation { name, segments } => {
            let matrix = tasks
                .open(&name)?
                .load_times()?
                .correlations(segments.as_deref())?;
            let headers = std::iter::once(String::new())
                .chain(matrix.segments.iter().cloned())
                .collect_vec();
            let rows = matrix
                .segments
                .iter()
                .zip(&matrix.values)
                .map(|(segment, values)| {
                    std::iter::once(segment.clone())
                        .chain(values.iter().map(|value| format!("{value:.3}")))
                        .collect_vec()
                })
                .collect_vec();
            println!("{}", render_table(&headers, &rows));
        }
        Command::TimeSpent { tasks: names } => {
            let rows = tasks
                .time_spent(names.as_deref())?
                .into_iter()
                .map(|row| {
                    vec![
                        row.label,
                        row.runs.to_string(),
                        make_time_string(row.seconds, decimals, false),
                    ]
                })
                .collect_vec();
            let headers = ["task", "runs", "time spent"].map(String::from).to_vec();
            println!("{}", render_table(&headers, &rows));
        }
        Command::Config { name, value, force } => configure(&store, config, name, value, force)?,
    }

    Ok(())
}
