//! The line-driven scene parser.
//!
//! [`SceneParser`] consumes raw scene text one line at a time, drives the
//! [`Stage`] and [`Tracker`] mutations and emits the normalized script.
//! Classification happens in one place, [`classify`], evaluated in a fixed
//! priority order so tie-breaks are reproducible:
//!
//! 1. blank lines and structural markers (rules, navigation, TOC rows,
//!    scene titles, section headers, INTRO/DIALOGUE separators),
//! 2. cue-prefixed lines (`%` tags),
//! 3. `Name: text` shaped lines,
//! 4. everything else.
//!
//! A `Name: text` line is section content while a header section is open
//! and dialogue otherwise. Nothing in this module can end the run; lines
//! that fit nowhere become advisory notes and parsing continues.

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::config::{RoleGroups, Substitutions};
use crate::construct::{
    Attr, Backdrop, CostumeEvent, PropEvent, PropKind, RoleDecl, Stage,
};
use crate::timeframe::{Field, Tracker};

// Lines consumed silently when nothing else matches.
const BOILERPLATE: [&str; 5] = ["end", "the end", "applause", "blackout", "curtain falls"];

lazy_static! {
    static ref RULE_RE: Regex = Regex::new(r"^-{4,}$").unwrap();
    static ref NAV_RE: Regex = Regex::new(r"^<<.*>>$").unwrap();
    static ref TOC_RE: Regex = Regex::new(r"^\*\s*\[#.*\]").unwrap();
    static ref TITLE_RE: Regex = Regex::new(r"^=+\s*([^=].*?)\s*=+$").unwrap();
    static ref SECTION_RE: Regex = Regex::new(r"^(Backdrop|Puppets|Costumes|Setting):$").unwrap();
    static ref CUE_RE: Regex = Regex::new(r"^%([a-z]{3})\s*(.*)$").unwrap();
    static ref NAME_COLON_RE: Regex =
        Regex::new(r"^(?P<names>[^:()%]{1,80}?)\s*(?:\((?P<comment>[^)]*)\))?\s*:\s*(?P<text>.*)$")
            .unwrap();
    static ref CAST_RE: Regex = Regex::new(
        r"^(?P<name>[^(]+?)\s*\(\s*(?P<player>[^,/|)]*?)\s*(?:/\s*(?P<voice>[^,|)]*?)\s*)?,\s*(?P<hands>[^|)]*?)\s*\|\s*(?P<puppet>[^|)]*?)\s*\|\s*(?P<costume>[^)]*?)\s*\)$"
    )
    .unwrap();
    static ref PROP_SUFFIX_RE: Regex =
        Regex::new(r"(?i)^(?P<name>.+?)\s*\((?P<kind>hand|front|second|just)\)$").unwrap();
    static ref INLINE_PROP_RE: Regex = Regex::new(r"\[\[([^\[\]]+)\]\]").unwrap();
}

// ------------- Classification -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Backdrop,
    Puppets,
    Costumes,
    Setting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CueTag {
    Ambience,
    Light,
    Sound,
    Video,
    Fog,
    Mix,
    Action,
    Hand,
    Stagehand,
    Note,
    Group,
}

const CUE_TAGS: [(&str, CueTag); 11] = [
    ("amb", CueTag::Ambience),
    ("lig", CueTag::Light),
    ("snd", CueTag::Sound),
    ("vid", CueTag::Video),
    ("fog", CueTag::Fog),
    ("mix", CueTag::Mix),
    ("act", CueTag::Action),
    ("hnd", CueTag::Hand),
    ("sta", CueTag::Stagehand),
    ("not", CueTag::Note),
    ("grp", CueTag::Group),
];

impl CueTag {
    fn category(&self) -> &'static str {
        match self {
            CueTag::Ambience => "ambience",
            CueTag::Light => "light",
            CueTag::Sound => "sound",
            CueTag::Video => "video",
            CueTag::Fog => "fog",
            CueTag::Mix => "mix",
            CueTag::Action => "action",
            CueTag::Hand => "hand",
            CueTag::Stagehand => "stagehand",
            CueTag::Note => "note",
            CueTag::Group => "group",
        }
    }
}

#[derive(Debug, PartialEq)]
enum LineClass {
    Blank,
    Rule,
    Navigation,
    Toc,
    SceneTitle(String),
    SectionHeader(Section),
    IntroHeader,
    DialogueHeader,
    Cue(CueTag, String),
    NameColon {
        names: String,
        comment: Option<String>,
        text: String,
    },
    Plain(String),
}

// Section routing gets the split parts; put a line back together for the
// handlers that want the whole thing.
fn rebuild(names: &str, comment: Option<&str>, text: &str) -> String {
    let mut line = names.to_owned();
    if let Some(comment) = comment {
        line.push_str(" (");
        line.push_str(comment);
        line.push(')');
    }
    if !text.is_empty() {
        line.push_str(": ");
        line.push_str(text);
    }
    line
}

fn classify(line: &str) -> LineClass {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineClass::Blank;
    }
    if RULE_RE.is_match(trimmed) {
        return LineClass::Rule;
    }
    if NAV_RE.is_match(trimmed) {
        return LineClass::Navigation;
    }
    if TOC_RE.is_match(trimmed) {
        return LineClass::Toc;
    }
    if let Some(captures) = TITLE_RE.captures(trimmed) {
        return LineClass::SceneTitle(captures[1].to_owned());
    }
    if let Some(captures) = SECTION_RE.captures(trimmed) {
        let section = match &captures[1] {
            "Backdrop" => Section::Backdrop,
            "Puppets" => Section::Puppets,
            "Costumes" => Section::Costumes,
            _ => Section::Setting,
        };
        return LineClass::SectionHeader(section);
    }
    if trimmed == "INTRO" {
        return LineClass::IntroHeader;
    }
    if trimmed == "DIALOGUE" {
        return LineClass::DialogueHeader;
    }
    if let Some(captures) = CUE_RE.captures(trimmed) {
        if let Some((_, tag)) = CUE_TAGS.iter().find(|(code, _)| *code == &captures[1]) {
            return LineClass::Cue(*tag, captures[2].to_owned());
        }
        // unknown cue tags fall through to the unmatched path
    }
    if let Some(captures) = NAME_COLON_RE.captures(trimmed) {
        return LineClass::NameColon {
            names: captures["names"].trim().to_owned(),
            comment: captures.name("comment").map(|m| m.as_str().trim().to_owned()),
            text: captures["text"].trim().to_owned(),
        };
    }
    LineClass::Plain(trimmed.to_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Idle,
    InSection(Section),
    Intro,
}

// ------------- Parser -------------
/// The finished pass: final entity store, timeframes and normalized lines.
pub struct Production {
    pub stage: Stage,
    pub tracker: Tracker,
    pub normalized: Vec<String>,
}

impl Production {
    pub fn normalized_text(&self) -> String {
        let mut text = self.normalized.join("\n");
        text.push('\n');
        text
    }
}

pub struct SceneParser {
    stage: Stage,
    tracker: Tracker,
    subs: Substitutions,
    groups: RoleGroups,
    state: ParserState,
    out: Vec<String>,
    scene_cast: BTreeSet<String>,
    scene_props: BTreeMap<String, bool>,
    scene_backdrop: bool,
    scene_open: bool,
    scene_index: usize,
}

impl SceneParser {
    /// Configuration objects are taken at construction; their scope is the
    /// whole run and nothing else mutates them from outside.
    pub fn new(subs: Substitutions, groups: RoleGroups) -> Self {
        Self {
            stage: Stage::new(),
            tracker: Tracker::new(),
            subs,
            groups,
            state: ParserState::Idle,
            out: Vec::new(),
            scene_cast: BTreeSet::new(),
            scene_props: BTreeMap::new(),
            scene_backdrop: false,
            scene_open: false,
            scene_index: 0,
        }
    }

    /// Feed a whole file; lines are processed strictly in order.
    pub fn consume(&mut self, text: &str) {
        for line in text.lines() {
            self.take_line(line);
        }
    }

    pub fn take_line(&mut self, raw: &str) {
        let line = self.subs.apply(raw);
        match classify(&line) {
            LineClass::Blank => {
                if matches!(self.state, ParserState::InSection(_)) {
                    self.state = ParserState::Idle;
                }
            }
            LineClass::Rule | LineClass::Navigation | LineClass::Toc => {
                debug!(line = %line.trim(), "structural line consumed");
                if matches!(self.state, ParserState::InSection(_)) {
                    self.state = ParserState::Idle;
                }
            }
            LineClass::SceneTitle(title) => self.open_scene(&title),
            LineClass::SectionHeader(section) => {
                self.ensure_scene();
                self.state = ParserState::InSection(section);
            }
            LineClass::IntroHeader => {
                self.ensure_scene();
                self.state = ParserState::Intro;
            }
            LineClass::DialogueHeader => {
                self.ensure_scene();
                self.state = ParserState::Idle;
            }
            LineClass::Cue(tag, rest) => {
                self.ensure_scene();
                if matches!(self.state, ParserState::InSection(_)) {
                    self.state = ParserState::Idle;
                }
                self.handle_cue(tag, &rest);
            }
            LineClass::NameColon { names, comment, text } => match self.state {
                ParserState::InSection(section) => {
                    self.section_line(section, &names, comment.as_deref(), &text)
                }
                _ => {
                    self.ensure_scene();
                    self.state = ParserState::Idle;
                    self.dialogue(&names, comment.as_deref(), &text);
                }
            },
            LineClass::Plain(text) => match self.state {
                ParserState::InSection(section) => {
                    self.section_line(section, &text, None, "")
                }
                ParserState::Intro => self.tracker.log(&text),
                ParserState::Idle => {
                    if BOILERPLATE.contains(&text.to_lowercase().as_str()) {
                        debug!(line = %text, "boilerplate consumed");
                    } else {
                        self.anomaly(&format!("unmatched line: {}", text));
                    }
                }
            },
        }
    }

    /// Close the final scene and hand the results over.
    pub fn finish(mut self) -> Production {
        if self.scene_open {
            self.close_scene();
        }
        Production {
            stage: self.stage,
            tracker: self.tracker,
            normalized: self.out,
        }
    }

    // ------------- scene boundaries -------------
    fn ensure_scene(&mut self) {
        if !self.scene_open {
            self.open_scene("Prelude");
        }
    }

    fn open_scene(&mut self, title: &str) {
        if self.scene_open {
            self.close_scene();
        }
        self.scene_index = self.tracker.open_scene(title);
        self.out.push(title.trim().to_owned());
        self.scene_cast.clear();
        self.scene_props.clear();
        self.scene_backdrop = false;
        self.scene_open = true;
        self.state = ParserState::Idle;
        info!(scene = %title.trim(), index = self.scene_index, "scene opened");
    }

    fn close_scene(&mut self) {
        let unused: Vec<String> = self
            .scene_props
            .iter()
            .filter(|(_, used)| !**used)
            .map(|(name, _)| name.clone())
            .collect();
        for name in unused {
            self.anomaly(&format!("unused prop: {}", name));
        }
        let cast = self.scene_cast.clone();
        let departures = self.stage.settle(&cast);
        for dropped in &departures.dropped {
            if let Some(costume) = &dropped.costume {
                self.out.push(format!("\tclothing- {}: {}", dropped.name, costume));
                self.tracker
                    .add_event_text(&dropped.name, &format!("costume off: {}", costume));
                self.tracker
                    .add_event_text(costume, &format!("taken off by {}", dropped.name));
            }
            for prop in &dropped.props {
                self.out
                    .push(format!("\tnote prop released by {}: {}", dropped.name, prop));
            }
            self.tracker.add_event_text(&dropped.name, "left the stage");
        }
        for person in &departures.persons {
            self.out.push(format!("\tperson- {}", person));
        }
        for puppet in &departures.puppets {
            self.out.push(format!("\tpuppet- {}", puppet));
        }
        self.tracker.close_scene();
        self.out.push("\tcurtain".to_owned());
        self.scene_open = false;
        self.state = ParserState::Idle;
    }

    // ------------- notes -------------
    fn anomaly(&mut self, text: &str) {
        self.ensure_scene();
        self.tracker.note_anomaly(text);
        self.out.push(format!("\tnote {}", text));
    }

    // ------------- cues -------------
    fn handle_cue(&mut self, tag: CueTag, rest: &str) {
        let rest = rest.trim();
        match tag {
            CueTag::Ambience | CueTag::Light | CueTag::Sound | CueTag::Video | CueTag::Fog
            | CueTag::Mix => {
                let category = tag.category();
                if rest.is_empty() {
                    self.anomaly(&format!("empty {} cue", category));
                    return;
                }
                let n = self.stage.count(category, rest);
                let line = if n == 1 {
                    format!("{}: {}", category, rest)
                } else {
                    format!("{} (again): {}", category, rest)
                };
                self.tracker.log(&line);
                self.out.push(format!("\tnote {}", line));
            }
            CueTag::Action => {
                let Some((names, text)) = rest.split_once(':') else {
                    self.anomaly(&format!("malformed action cue: {}", rest));
                    return;
                };
                let text = text.trim();
                for role in self.resolve_names(names) {
                    self.ensure_cast(&role);
                    self.tracker.log(&format!("action {}: {}", role, text));
                    self.tracker
                        .add_event_text(&role, &format!("action: {}", text));
                }
                self.out
                    .push(format!("\tnote action {}: {}", names.trim(), text));
            }
            CueTag::Hand => {
                let Some((role, prop)) = rest.split_once(':') else {
                    self.anomaly(&format!("malformed hand prop cue: {}", rest));
                    return;
                };
                let role = role.trim().to_owned();
                let prop = prop.trim().to_owned();
                if prop.is_empty() {
                    self.anomaly(&format!("hand prop cue without prop: {}", role));
                    return;
                }
                self.ensure_cast(&role);
                let event =
                    self.stage
                        .keep_prop(&prop, PropKind::Hand, Some(&role), self.scene_index);
                self.note_prop_event(&prop, &role, &event);
                if let Some(used) = self.scene_props.get_mut(&prop) {
                    *used = true;
                }
                self.tracker.add_once(Field::HandProp, &prop);
                self.tracker.log(&format!("hand prop {}: {}", role, prop));
                self.out.push(format!("\tnote hand prop {}: {}", role, prop));
            }
            CueTag::Stagehand => {
                self.tracker.log(&format!("stagehand: {}", rest));
                self.out.push(format!("\tnote stagehand: {}", rest));
            }
            CueTag::Note => {
                self.tracker.log(&format!("note: {}", rest));
                self.out.push(format!("\tnote {}", rest));
            }
            CueTag::Group => {
                let Some((name, members)) = rest.split_once(':') else {
                    self.anomaly(&format!("malformed group definition: {}", rest));
                    return;
                };
                let members: Vec<String> = members
                    .split(',')
                    .map(|m| m.trim().to_owned())
                    .filter(|m| !m.is_empty())
                    .collect();
                if members.is_empty() {
                    self.anomaly(&format!("group without members: {}", name.trim()));
                    return;
                }
                self.tracker
                    .log(&format!("group {} = {}", name.trim(), members.join(", ")));
                self.groups.define(name, members);
            }
        }
    }

    fn note_prop_event(&mut self, prop: &str, owner: &str, event: &PropEvent) {
        match event {
            PropEvent::Added => {
                self.tracker.log(&format!("prop (new): {} ({})", prop, owner));
            }
            PropEvent::Matched => {}
            PropEvent::Reassigned { from } => {
                // an explicit remove+add pair, never a silent overwrite
                self.out.push(format!(
                    "\tnote prop- {}: {}",
                    from.as_deref().unwrap_or("-"),
                    prop
                ));
                self.out.push(format!("\tnote prop+ {}: {}", owner, prop));
                self.tracker.log(&format!(
                    "prop {} moves from {} to {}",
                    prop,
                    from.as_deref().unwrap_or("-"),
                    owner
                ));
            }
        }
    }

    // ------------- sections -------------
    fn section_line(&mut self, section: Section, names: &str, comment: Option<&str>, text: &str) {
        // Plain section lines arrive with everything in `names`.
        match section {
            Section::Backdrop => {
                let line = rebuild(names, comment, text);
                self.backdrop_line(&line);
            }
            Section::Puppets => {
                let line = rebuild(names, comment, text);
                self.cast_line(&line);
            }
            Section::Costumes => self.costume_line(names, text),
            Section::Setting => {
                if text.is_empty() {
                    self.setting_items(None, names);
                } else {
                    let owner = names.to_owned();
                    self.setting_items(Some(&owner), text);
                }
            }
        }
    }

    fn backdrop_line(&mut self, line: &str) {
        if self.scene_backdrop {
            self.anomaly(&format!("backdrop redefined: {}", line));
            return;
        }
        let backdrop = Backdrop::parse(line);
        let composite = backdrop.to_string();
        let n = self.stage.count("backdrop", &composite);
        let log = if n == 1 {
            format!("backdrop: {}", composite)
        } else {
            format!("backdrop (again): {}", composite)
        };
        self.tracker.log(&log);
        self.tracker.add(Field::Backdrop, &composite);
        self.out.push(format!("\tbackdrop {}", composite));
        self.scene_backdrop = true;
    }

    fn cast_line(&mut self, line: &str) {
        if line.contains(':') {
            self.anomaly(&format!("unreadable cast line: {}", line));
            return;
        }
        let decl = match CAST_RE.captures(line) {
            Some(captures) => {
                let name = captures["name"].trim().to_owned();
                RoleDecl {
                    player: self.attr_field(captures.name("player").map(|m| m.as_str()), "Person", &name),
                    voice: self.attr_field(captures.name("voice").map(|m| m.as_str()), "Voice", &name),
                    hands: self.attr_field(captures.name("hands").map(|m| m.as_str()), "Hands", &name),
                    puppet: self.attr_field(captures.name("puppet").map(|m| m.as_str()), "Puppet", &name),
                    costume: self.attr_field(captures.name("costume").map(|m| m.as_str()), "Costume", &name),
                    name,
                }
            }
            None if line.contains('(') => {
                self.anomaly(&format!("unreadable cast line: {}", line));
                return;
            }
            None => RoleDecl::bare(line),
        };
        if decl.name.is_empty() {
            self.anomaly(&format!("unreadable cast line: {}", line));
            return;
        }
        self.admit(decl);
    }

    // Anonymous tokens (`?` or `?label`) resolve through the name forge so
    // the same token always yields the same synthetic identifier.
    fn attr_field(&mut self, token: Option<&str>, category: &str, context: &str) -> Attr {
        let token = token.map(str::trim).unwrap_or("");
        match token.strip_prefix('?') {
            Some(label) => {
                let raw = (!label.is_empty()).then_some(label);
                Attr::Named(self.stage.allocate_name(raw, category, context))
            }
            None => Attr::parse(token),
        }
    }

    fn costume_line(&mut self, names: &str, text: &str) {
        if text.is_empty() {
            self.anomaly(&format!("costume line without costume: {}", names));
            return;
        }
        for role in self.resolve_names(names) {
            self.ensure_cast(&role);
            let attr = self.attr_field(Some(text), "Costume", &role);
            if let Some(event) = self.stage.assign_costume(&role, &attr) {
                self.emit_costume(&role, event);
            }
        }
    }

    fn setting_items(&mut self, owner: Option<&str>, text: &str) {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        // suffix convention first (it carries ownership), inline tag markup
        // after; both run on every line
        let inline: Vec<String> = INLINE_PROP_RE
            .captures_iter(text)
            .map(|captures| captures[1].trim().to_owned())
            .collect();
        let had_inline = !inline.is_empty();
        let stripped = INLINE_PROP_RE.replace_all(text, "");
        let listed = match owner {
            Some(_) => stripped.as_ref().to_owned(),
            None => stripped.trim_start_matches('-').to_owned(),
        };
        for item in listed.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (raw_name, kind) = match PROP_SUFFIX_RE.captures(item) {
                Some(captures) => (
                    captures["name"].trim().to_owned(),
                    PropKind::parse(&captures["kind"]).unwrap_or(PropKind::Just),
                ),
                // untagged leftovers on a line that used inline markup are
                // prose, not prop names
                None if had_inline => continue,
                None => (
                    item.to_owned(),
                    if owner.is_some() { PropKind::Hand } else { PropKind::Just },
                ),
            };
            let name = match raw_name.strip_prefix('?') {
                Some(label) => {
                    let raw = (!label.is_empty()).then_some(label);
                    let context = owner.unwrap_or("").to_owned();
                    self.stage.allocate_name(raw, "Prop", &context)
                }
                None => raw_name,
            };
            let prop_owner = owner.filter(|_| kind != PropKind::Just);
            let prop_owner = prop_owner.map(str::to_owned);
            if let Some(role) = &prop_owner {
                self.ensure_cast(role);
            }
            self.declare_prop(&name, kind, prop_owner.as_deref(), &mut seen);
        }
        for name in inline {
            self.declare_prop(&name, PropKind::Just, None, &mut seen);
        }
    }

    fn declare_prop(&mut self, name: &str, kind: PropKind, owner: Option<&str>, seen: &mut BTreeSet<String>) {
        // both extraction mechanisms can hit the same name on one line;
        // dedupe by resolved name so the tally counts the line once
        if !seen.insert(name.to_owned()) {
            return;
        }
        let event = self.stage.keep_prop(name, kind, owner, self.scene_index);
        let owner_label = owner.unwrap_or("-").to_owned();
        self.note_prop_event(name, &owner_label, &event);
        self.scene_props.entry(name.to_owned()).or_insert(false);
        let field = match kind {
            PropKind::Hand => Field::HandProp,
            PropKind::FrontRail => Field::FrontProp,
            PropKind::SecondRail => Field::SecondProp,
            PropKind::Just => Field::JustProp,
        };
        self.tracker.add_once(field, name);
        self.tracker.log(&format!("{} prop set out: {}", kind.label(), name));
    }

    // ------------- cast -------------
    fn ensure_cast(&mut self, role: &str) {
        if self.scene_cast.contains(role) {
            return;
        }
        if !self.stage.roles().contains(role) {
            self.anomaly(&format!("unknown role referenced: {}", role));
        }
        self.admit(RoleDecl::bare(role));
    }

    fn admit(&mut self, decl: RoleDecl) {
        let name = decl.name.clone();
        let costume = decl.costume.clone();
        let update = self.stage.register_role(decl, self.scene_index);
        for change in &update.changes {
            self.anomaly(&format!(
                "{} changed for {}: {} -> {}",
                change.field, name, change.from, change.to
            ));
        }
        if let Some((puppet, from)) = &update.handover {
            self.tracker
                .log(&format!("puppet {} passes from {} to {}", puppet, from, name));
            self.tracker
                .add_event_text(puppet, &format!("passed from {} to {}", from, name));
        }
        let first = self.scene_cast.insert(name.clone());
        if first {
            self.tracker.add_once(Field::Role, &name);
            let record = self
                .stage
                .roles()
                .get(&name)
                .expect("role registered above")
                .clone();
            let arrivals = self.stage.enter(&name);
            for person in &arrivals.persons {
                self.out.push(format!("\tperson+ {}", person));
            }
            for puppet in &arrivals.puppets {
                self.out.push(format!("\tpuppet+ {}", puppet));
            }
            for person in record.persons() {
                self.tracker.add_once(Field::Person, &person);
            }
            self.tracker
                .add_event_text(record.player(), &format!("plays {}", name));
            if record.hands() != record.player() {
                self.tracker
                    .add_event_text(record.hands(), &format!("hands for {}", name));
            }
            if record.voice() != record.player() {
                self.tracker
                    .add_event_text(record.voice(), &format!("voice of {}", name));
            }
            if let Some(puppet) = record.puppet() {
                self.tracker.add_once(Field::Puppet, puppet);
                self.tracker.add_event_text(
                    puppet,
                    &format!("operated by {} as {}", record.hands(), name),
                );
            }
        }
        if let Some(event) = self.stage.assign_costume(&name, &costume) {
            self.emit_costume(&name, event);
        }
    }

    fn emit_costume(&mut self, role: &str, event: CostumeEvent) {
        match event {
            CostumeEvent::Add(costume) => {
                self.out.push(format!("\tclothing+ {}: {}", role, costume));
                self.tracker.add_once(Field::Clothing, &costume);
                self.tracker
                    .add_event_text(role, &format!("costume on: {}", costume));
                self.tracker
                    .add_event_text(&costume, &format!("put on by {}", role));
            }
            CostumeEvent::Keep(costume) => {
                self.out.push(format!("\tclothing= {}: {}", role, costume));
                self.tracker.add_once(Field::Clothing, &costume);
            }
            CostumeEvent::Change { from, to } => {
                self.out.push(format!("\tclothing- {}: {}", role, from));
                self.out.push(format!("\tclothing+ {}: {}", role, to));
                self.tracker.add_once(Field::Clothing, &to);
                self.tracker
                    .add_event_text(role, &format!("costume change: {} -> {}", from, to));
                self.tracker
                    .add_event_text(&from, &format!("taken off by {}", role));
                self.tracker
                    .add_event_text(&to, &format!("put on by {}", role));
            }
            CostumeEvent::Remove(costume) => {
                self.out.push(format!("\tclothing- {}: {}", role, costume));
                self.tracker
                    .add_event_text(role, &format!("costume off: {}", costume));
                self.tracker
                    .add_event_text(&costume, &format!("taken off by {}", role));
            }
        }
    }

    // ------------- dialogue -------------
    fn dialogue(&mut self, names: &str, comment: Option<&str>, text: &str) {
        if text.is_empty() {
            self.anomaly(&format!("dialogue without text: {}", names));
            return;
        }
        let roles = self.resolve_names(names);
        if roles.is_empty() {
            self.anomaly(&format!("dialogue without speaker: {}", text));
            return;
        }
        for role in &roles {
            self.ensure_cast(role);
            self.credit_spoken(role);
            match comment {
                Some(comment) => self
                    .out
                    .push(format!("\tspoken {} ({}): {}", role, comment, text)),
                None => self.out.push(format!("\tspoken {}: {}", role, text)),
            }
        }
    }

    /// Composite names ("A, B and C", or a defined group name) resolve
    /// independently; each resolved role receives the shared text.
    fn resolve_names(&self, names: &str) -> Vec<String> {
        let mut resolved = Vec::new();
        for chunk in names.split(',') {
            for part in chunk.split(" and ") {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                for role in self.groups.resolve(part) {
                    if !resolved.contains(&role) {
                        resolved.push(role);
                    }
                }
            }
        }
        resolved
    }

    fn credit_spoken(&mut self, role: &str) {
        let mut beneficiaries = BTreeSet::new();
        beneficiaries.insert(role.to_owned());
        if let Some(record) = self.stage.roles().get(role) {
            beneficiaries.insert(record.player().to_owned());
            if record.voice() != record.player() {
                beneficiaries.insert(record.voice().to_owned());
            }
            if let Some(puppet) = record.puppet() {
                beneficiaries.insert(puppet.to_owned());
            }
        }
        for entity in beneficiaries {
            self.tracker.record_spoken(&entity);
        }
    }
}
