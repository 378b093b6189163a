use std::collections::VecDeque;
use std::io::{self, BufRead, Stdout, StdinLock, Write};
use std::sync::mpsc::{self, Receiver};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::debug;

use crate::error::{Result, SplitError};
use crate::timer::{ManualClock, TimerEvent};

/// Where timer events and yes/no answers come from.
pub trait InputSource {
    /// Blocks until the next event. `None` once the source is exhausted.
    fn next_event(&mut self) -> Result<Option<TimerEvent>>;

    /// Blocks until the user starts timing `first_segment`. Returns false if
    /// the run was never started.
    fn wait_for_start(&mut self, first_segment: &str) -> Result<bool>;

    fn confirm(&mut self, question: &str) -> Result<bool>;
}

fn read_trimmed_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_lowercase()))
}

/// Line-oriented input: enter completes a segment, words trigger the rest.
pub struct LineInput<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> LineInput<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl LineInput<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> InputSource for LineInput<R, W> {
    fn next_event(&mut self) -> Result<Option<TimerEvent>> {
        let Some(line) = read_trimmed_line(&mut self.reader)? else {
            return Ok(None);
        };
        let event = match line.as_str() {
            "skip" => TimerEvent::Skip,
            "undo" => TimerEvent::Undo,
            "abort" => TimerEvent::Abort,
            _ => TimerEvent::Complete,
        };
        debug!("Read {event:?} from \"{line}\"");
        Ok(Some(event))
    }

    fn wait_for_start(&mut self, first_segment: &str) -> Result<bool> {
        writeln!(self.writer, "Press enter to start {first_segment}")?;
        self.writer.flush()?;
        Ok(read_trimmed_line(&mut self.reader)?.is_some())
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        write!(self.writer, "{question} [y/N]: ")?;
        self.writer.flush()?;
        Ok(matches!(
            read_trimmed_line(&mut self.reader)?.as_deref(),
            Some("y" | "yes")
        ))
    }
}

/// Parses a key name such as `a`, `enter`, `space` or `esc`.
pub fn parse_key(name: &str) -> Result<KeyCode> {
    let lowered = name.trim().to_lowercase();
    let mut chars = lowered.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(KeyCode::Char(c));
    }
    let code = match lowered.as_str() {
        "enter" | "return" => KeyCode::Enter,
        "space" => KeyCode::Char(' '),
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        "delete" => KeyCode::Delete,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        function if function.starts_with('f') => function[1..]
            .parse::<u8>()
            .ok()
            .filter(|number| (1..=12).contains(number))
            .map(KeyCode::F)
            .ok_or_else(|| SplitError::Config(format!("unknown key \"{name}\"")))?,
        _ => return Err(SplitError::Config(format!("unknown key \"{name}\""))),
    };
    Ok(code)
}

/// Keys bound to each timer event.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindings {
    pub continue_keys: Vec<KeyCode>,
    pub skip_keys: Vec<KeyCode>,
    pub undo_keys: Vec<KeyCode>,
    pub abort_keys: Vec<KeyCode>,
}

impl KeyBindings {
    /// Ctrl-C always aborts, whatever else is bound.
    pub fn classify(&self, key: &KeyEvent) -> Option<TimerEvent> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(TimerEvent::Abort);
        }
        let code = match key.code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            code => code,
        };
        if self.undo_keys.contains(&code) {
            Some(TimerEvent::Undo)
        } else if self.continue_keys.contains(&code) {
            Some(TimerEvent::Complete)
        } else if self.skip_keys.contains(&code) {
            Some(TimerEvent::Skip)
        } else if self.abort_keys.contains(&code) {
            Some(TimerEvent::Abort)
        } else {
            None
        }
    }
}

/// Single key presses read from the terminal, which must be in raw mode.
pub struct KeyInput<W: Write> {
    rx: Receiver<KeyEvent>,
    bindings: KeyBindings,
    writer: W,
}

impl<W: Write> KeyInput<W> {
    /// Reads terminal events on a background thread.
    ///
    /// The thread is detached and stays blocked in [`event::read`] after the
    /// input is dropped. It only exits on the next key press, which is
    /// swallowed, so spawn at most one per process.
    pub fn spawn(bindings: KeyBindings, writer: W) -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(Event::Key(key)) => {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self::from_receiver(rx, bindings, writer)
    }

    pub fn from_receiver(rx: Receiver<KeyEvent>, bindings: KeyBindings, writer: W) -> Self {
        Self {
            rx,
            bindings,
            writer,
        }
    }

    fn next_key(&self) -> Option<KeyEvent> {
        self.rx.recv().ok()
    }
}

impl<W: Write> InputSource for KeyInput<W> {
    fn next_event(&mut self) -> Result<Option<TimerEvent>> {
        while let Some(key) = self.next_key() {
            if let Some(event) = self.bindings.classify(&key) {
                debug!("Dispatching {event:?} because {:?} was pressed", key.code);
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    fn wait_for_start(&mut self, first_segment: &str) -> Result<bool> {
        write!(self.writer, "Press a continue key to start {first_segment}\r\n")?;
        self.writer.flush()?;
        while let Some(key) = self.next_key() {
            match self.bindings.classify(&key) {
                Some(TimerEvent::Complete) => return Ok(true),
                Some(TimerEvent::Abort) => return Ok(false),
                _ => {}
            }
        }
        Ok(false)
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        write!(self.writer, "{question} [y/n]\r\n")?;
        self.writer.flush()?;
        while let Some(key) = self.next_key() {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => return Ok(true),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => return Ok(false),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(false)
                }
                _ => {}
            }
        }
        Ok(false)
    }
}

/// Sample level below which a drum pedal read as a microphone is pressed.
pub const PEDAL_PRESS_THRESHOLD: i16 = -16500;

/// Turns a stream of 16-bit sample chunks into presses. A press held over
/// several chunks counts once.
#[derive(Debug, Clone)]
pub struct ThresholdDetector {
    threshold: i16,
    extreme_on_previous: bool,
}

impl ThresholdDetector {
    pub fn new(threshold: i16) -> Self {
        Self {
            threshold,
            extreme_on_previous: false,
        }
    }

    /// True if this chunk begins a new press.
    pub fn feed(&mut self, chunk: &[i16]) -> bool {
        let extreme = chunk
            .iter()
            .min()
            .is_some_and(|&lowest| lowest < self.threshold);
        let pressed = extreme && !self.extreme_on_previous;
        self.extreme_on_previous = extreme;
        pressed
    }
}

impl Default for ThresholdDetector {
    fn default() -> Self {
        Self::new(PEDAL_PRESS_THRESHOLD)
    }
}

/// A pedal that only ever completes segments. Confirmation is asked on the
/// line input.
pub struct PedalInput<R: BufRead, W: Write> {
    chunks: Receiver<Vec<i16>>,
    detector: ThresholdDetector,
    lines: LineInput<R, W>,
}

impl<R: BufRead, W: Write> PedalInput<R, W> {
    pub fn new(chunks: Receiver<Vec<i16>>, detector: ThresholdDetector, lines: LineInput<R, W>) -> Self {
        Self {
            chunks,
            detector,
            lines,
        }
    }

    fn next_press(&mut self) -> bool {
        while let Ok(chunk) = self.chunks.recv() {
            if self.detector.feed(&chunk) {
                debug!("Received pedal press");
                return true;
            }
        }
        false
    }
}

impl PedalInput<StdinLock<'static>, Stdout> {
    /// Opens the default capture device.
    pub fn default_device() -> Result<Self> {
        Err(SplitError::Unavailable(
            "no audio capture backend is built in, pedal input cannot be used".into(),
        ))
    }
}

impl<R: BufRead, W: Write> InputSource for PedalInput<R, W> {
    fn next_event(&mut self) -> Result<Option<TimerEvent>> {
        Ok(self.next_press().then_some(TimerEvent::Complete))
    }

    fn wait_for_start(&mut self, first_segment: &str) -> Result<bool> {
        writeln!(self.lines.writer, "Hit the pedal to start {first_segment}")?;
        self.lines.writer.flush()?;
        Ok(self.next_press())
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        self.lines.confirm(question)
    }
}

/// Replays a fixed script against a [`ManualClock`], for driving sessions
/// without a terminal.
#[derive(Debug)]
pub struct ScriptedInput {
    clock: ManualClock,
    starts: bool,
    events: VecDeque<(f64, TimerEvent)>,
    answers: VecDeque<bool>,
    questions: Vec<String>,
}

impl ScriptedInput {
    /// Each event fires after the clock advanced by its delay in seconds.
    pub fn new<I>(clock: ManualClock, events: I) -> Self
    where
        I: IntoIterator<Item = (f64, TimerEvent)>,
    {
        Self {
            clock,
            starts: true,
            events: events.into_iter().collect(),
            answers: VecDeque::new(),
            questions: Vec::new(),
        }
    }

    pub fn never_started(mut self) -> Self {
        self.starts = false;
        self
    }

    /// Answers for successive confirmations; unanswered ones are declined.
    pub fn answering<I: IntoIterator<Item = bool>>(mut self, answers: I) -> Self {
        self.answers = answers.into_iter().collect();
        self
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }
}

impl InputSource for ScriptedInput {
    fn next_event(&mut self) -> Result<Option<TimerEvent>> {
        Ok(self.events.pop_front().map(|(delay, event)| {
            self.clock.advance(delay);
            event
        }))
    }

    fn wait_for_start(&mut self, _first_segment: &str) -> Result<bool> {
        Ok(self.starts)
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        self.questions.push(question.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}
