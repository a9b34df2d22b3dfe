//! Per-scene event log and tallies, plus the cross-scene entity history.
//!
//! A [`Timeframe`] is the unit of "current state" while parsing: ordered
//! field lists, a free-text scene log and the spoken tallies frozen when the
//! scene closes. The [`Tracker`] owns the frames in performance order along
//! with a per-entity history that spans all scenes.
//!
//! Spoken counts are not known until a scene ends, so a history entry for
//! them holds a counter cell shared with the scene tally instead of text.
//! The cell fills up while the scene runs and the entry renders its final
//! `<n>x spoken` form lazily at output time; no list contents are rewritten.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

static NO_VALUES: Vec<String> = Vec::new();

// ------------- Fields -------------
/// Scene-scoped value list categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Role,
    Person,
    Puppet,
    Clothing,
    HandProp,
    FrontProp,
    SecondProp,
    JustProp,
    Backdrop,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::Role => "role",
            Field::Person => "person",
            Field::Puppet => "puppet",
            Field::Clothing => "clothing",
            Field::HandProp => "hand prop",
            Field::FrontProp => "front rail prop",
            Field::SecondProp => "second rail prop",
            Field::JustProp => "prop",
            Field::Backdrop => "backdrop",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ------------- Timeframe -------------
#[derive(Debug)]
pub struct Timeframe {
    title: String,
    index: usize,
    lists: BTreeMap<Field, Vec<String>>,
    log: Vec<String>,
    spoken: BTreeMap<String, u32>,
    closed: bool,
}

impl Timeframe {
    fn new(title: &str, index: usize) -> Self {
        Self {
            title: title.trim().to_owned(),
            index,
            lists: BTreeMap::new(),
            log: Vec::new(),
            spoken: BTreeMap::new(),
            closed: false,
        }
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    /// 1-based scene number.
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn values(&self, field: Field) -> &[String] {
        self.lists.get(&field).unwrap_or(&NO_VALUES)
    }
    pub fn contains(&self, field: Field, value: &str) -> bool {
        self.values(field).iter().any(|v| v == value)
    }
    pub fn log(&self) -> &[String] {
        &self.log
    }
    /// Spoken tallies, populated at scene close.
    pub fn spoken(&self) -> &BTreeMap<String, u32> {
        &self.spoken
    }
    pub fn closed(&self) -> bool {
        self.closed
    }
}

// ------------- History -------------
#[derive(Debug)]
enum HistoryBody {
    Text(String),
    Spoken(Rc<Cell<u32>>),
}

/// One scene-stamped entry in an entity's history.
#[derive(Debug)]
pub struct HistoryEntry {
    scene: String,
    body: HistoryBody,
}

impl HistoryEntry {
    pub fn scene(&self) -> &str {
        &self.scene
    }
    pub fn render(&self) -> String {
        match &self.body {
            HistoryBody::Text(text) => text.clone(),
            HistoryBody::Spoken(cell) => format!("{}x spoken", cell.get()),
        }
    }
}

// ------------- Tracker -------------
pub struct Tracker {
    frames: Vec<Timeframe>,
    history: BTreeMap<String, Vec<HistoryEntry>>,
    cells: BTreeMap<String, Rc<Cell<u32>>>,
    anomalies: Vec<(usize, String)>,
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            history: BTreeMap::new(),
            cells: BTreeMap::new(),
            anomalies: Vec::new(),
        }
    }

    /// Start a scene-scoped context. Returns the 1-based scene number.
    pub fn open_scene(&mut self, title: &str) -> usize {
        if self.frames.last().is_some_and(|f| !f.closed) {
            self.close_scene();
        }
        let index = self.frames.len() + 1;
        self.frames.push(Timeframe::new(title, index));
        index
    }

    // Content can arrive before the first title; it lands in an untitled
    // frame so nothing is dropped.
    fn frame(&mut self) -> &mut Timeframe {
        if self.frames.last().map_or(true, |f| f.closed) {
            self.open_scene("Prelude");
        }
        self.frames.last_mut().unwrap()
    }

    pub fn add(&mut self, field: Field, value: &str) {
        self.frame()
            .lists
            .entry(field)
            .or_default()
            .push(value.to_owned());
    }

    pub fn add_once(&mut self, field: Field, value: &str) {
        let frame = self.frame();
        let list = frame.lists.entry(field).or_default();
        if !list.iter().any(|v| v == value) {
            list.push(value.to_owned());
        }
    }

    /// Append a line to the current scene log.
    pub fn log(&mut self, text: &str) {
        self.frame().log.push(text.to_owned());
    }

    /// Append a scene-stamped entry to an entity's cross-scene history.
    pub fn add_event_text(&mut self, entity: &str, text: &str) {
        let scene = self.frame().title.clone();
        self.history
            .entry(entity.to_owned())
            .or_default()
            .push(HistoryEntry { scene, body: HistoryBody::Text(text.to_owned()) });
    }

    /// Credit one spoken line to an entity. The first credit of the scene
    /// plants the provisional history entry sharing the tally cell.
    pub fn record_spoken(&mut self, entity: &str) {
        let scene = self.frame().title.clone();
        if !self.cells.contains_key(entity) {
            let cell = Rc::new(Cell::new(0u32));
            self.cells.insert(entity.to_owned(), Rc::clone(&cell));
            self.history
                .entry(entity.to_owned())
                .or_default()
                .push(HistoryEntry { scene, body: HistoryBody::Spoken(cell) });
        }
        let cell = &self.cells[entity];
        cell.set(cell.get() + 1);
    }

    /// Freeze the scene: tallies move into the frame and the live cells
    /// are retired, making every spoken entry final.
    pub fn close_scene(&mut self) {
        let spoken: BTreeMap<String, u32> = self
            .cells
            .iter()
            .map(|(name, cell)| (name.clone(), cell.get()))
            .collect();
        self.cells.clear();
        if let Some(frame) = self.frames.last_mut() {
            frame.spoken = spoken;
            frame.closed = true;
        }
    }

    /// Record a continuity anomaly: scene log, anomaly list, diagnostics.
    pub fn note_anomaly(&mut self, text: &str) {
        warn!(note = %text, "continuity anomaly");
        let index = self.frame().index;
        self.frame().log.push(format!("note: {}", text));
        self.anomalies.push((index, text.to_owned()));
    }

    pub fn frames(&self) -> &[Timeframe] {
        &self.frames
    }
    pub fn history(&self) -> &BTreeMap<String, Vec<HistoryEntry>> {
        &self.history
    }
    pub fn history_of(&self, entity: &str) -> &[HistoryEntry] {
        self.history.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }
    pub fn anomalies(&self) -> &[(usize, String)] {
        &self.anomalies
    }
    pub fn scene_count(&self) -> usize {
        self.frames.len()
    }
    pub fn current_title(&self) -> Option<&str> {
        self.frames.last().map(|f| f.title.as_str())
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}
