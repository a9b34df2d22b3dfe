//! Read-only projections over the finished entity store and timeframes.
//!
//! A [`ReportBuilder`] is constructed over a [`Production`] after every
//! scene has been parsed; it mutates nothing. Several projections (costume
//! images, full cross-scene histories) are only valid once parsing has
//! completed, which the ownership flow already guarantees: the parser gives
//! up the stage and tracker in [`Production`] and the builder only borrows
//! them.
//!
//! All listings use case-insensitive natural ordering, numeric-aware when
//! enabled so embedded scene numbers compare numerically.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::config::PicturePool;
use crate::construct::{Prop, Role, Stage};
use crate::script::Production;
use crate::timeframe::{Field, Tracker};

lazy_static! {
    static ref PLAYS_RE: Regex = Regex::new(r"^plays (.+)$").unwrap();
    static ref HANDS_RE: Regex = Regex::new(r"^hands for (.+)$").unwrap();
    static ref VOICE_RE: Regex = Regex::new(r"^voice of (.+)$").unwrap();
}

// ------------- Natural ordering -------------
/// Case-insensitive comparison; with `numeric` set, digit runs compare as
/// numbers so "Scene 2" sorts before "Scene 10".
pub fn natural_cmp(a: &str, b: &str, numeric: bool) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if !numeric {
        return a.cmp(&b);
    }
    let mut ac = a.chars().peekable();
    let mut bc = b.chars().peekable();
    loop {
        match (ac.peek().copied(), bc.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let mut na: u128 = 0;
                    while let Some(d) = ac.peek().and_then(|c| c.to_digit(10)) {
                        na = na.saturating_mul(10).saturating_add(d as u128);
                        ac.next();
                    }
                    let mut nb: u128 = 0;
                    while let Some(d) = bc.peek().and_then(|c| c.to_digit(10)) {
                        nb = nb.saturating_mul(10).saturating_add(d as u128);
                        bc.next();
                    }
                    match na.cmp(&nb) {
                        Ordering::Equal => (),
                        other => return other,
                    }
                } else {
                    match x.cmp(&y) {
                        Ordering::Equal => {
                            ac.next();
                            bc.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

// ------------- Snapshot -------------
/// Final entity model, serialized for the external report generators.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub scenes: Vec<SceneSnap>,
    pub roles: Vec<Role>,
    pub puppets: Vec<PuppetSnap>,
    pub costumes: Vec<CostumeSnap>,
    pub props: Vec<Prop>,
    pub anomalies: Vec<AnomalySnap>,
}

#[derive(Debug, Serialize)]
pub struct SceneSnap {
    pub index: usize,
    pub title: String,
    pub backdrops: Vec<String>,
    pub spoken: Vec<(String, u32)>,
}

#[derive(Debug, Serialize)]
pub struct PuppetSnap {
    pub name: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CostumeSnap {
    pub name: String,
    pub wearers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AnomalySnap {
    pub scene: usize,
    pub note: String,
}

// ------------- Builder -------------
pub struct ReportBuilder<'a> {
    stage: &'a Stage,
    tracker: &'a Tracker,
    pictures: Option<&'a PicturePool>,
    numeric: bool,
    title: String,
    stamp: Option<String>,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(production: &'a Production) -> Self {
        Self {
            stage: &production.stage,
            tracker: &production.tracker,
            pictures: None,
            numeric: true,
            title: String::from("Callboard"),
            stamp: None,
        }
    }
    pub fn with_pictures(mut self, pool: &'a PicturePool) -> Self {
        self.pictures = Some(pool);
        self
    }
    pub fn numeric_sort(mut self, numeric: bool) -> Self {
        self.numeric = numeric;
        self
    }
    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_owned();
        self
    }
    pub fn stamped(mut self, stamp: &str) -> Self {
        self.stamp = Some(stamp.to_owned());
        self
    }

    fn sorted(&self, mut names: Vec<String>) -> Vec<String> {
        names.sort_by(|a, b| natural_cmp(a, b, self.numeric));
        names
    }

    fn spoken_total(&self, name: &str) -> u32 {
        self.tracker
            .frames()
            .iter()
            .filter_map(|f| f.spoken().get(name))
            .sum()
    }

    fn staged(&self, field: Field) -> Vec<String> {
        let mut names = BTreeSet::new();
        for frame in self.tracker.frames() {
            for value in frame.values(field) {
                names.insert(value.clone());
            }
        }
        self.sorted(names.into_iter().collect())
    }

    /// Person × scene duty table recovered from the free-text histories.
    fn backstage_rows(&self) -> Vec<(String, Vec<String>)> {
        let mut rows = Vec::new();
        for person in self.sorted(self.staged(Field::Person)) {
            let mut cells = Vec::new();
            for frame in self.tracker.frames() {
                let mut duties = Vec::new();
                for entry in self.tracker.history_of(&person) {
                    if entry.scene() != frame.title() {
                        continue;
                    }
                    let text = entry.render();
                    if let Some(c) = PLAYS_RE.captures(&text) {
                        duties.push(c[1].to_owned());
                    } else if let Some(c) = HANDS_RE.captures(&text) {
                        duties.push(format!("{} (h)", &c[1]));
                    } else if let Some(c) = VOICE_RE.captures(&text) {
                        duties.push(format!("{} (v)", &c[1]));
                    }
                }
                cells.push(duties.join(", "));
            }
            rows.push((person, cells));
        }
        rows
    }

    // ------------- text -------------
    pub fn text(&self) -> String {
        let mut out = String::new();
        let underline = "=".repeat(self.title.len());
        out.push_str(&format!("{}\n{}\n", self.title, underline));
        if let Some(stamp) = &self.stamp {
            out.push_str(&format!("generated {}\n", stamp));
        }
        out.push_str(&format!("scenes: {}\n\n", self.tracker.scene_count()));

        // timeline
        out.push_str("Timeline\n--------\n");
        for frame in self.tracker.frames() {
            out.push_str(&format!("  {}. {}\n", frame.index(), frame.title()));
            for line in frame.log() {
                out.push_str(&format!("    {}\n", line));
            }
            for name in self.sorted(frame.spoken().keys().cloned().collect()) {
                out.push_str(&format!("    {}: {}x spoken\n", name, frame.spoken()[&name]));
            }
        }
        out.push('\n');

        // roles
        out.push_str("Roles\n-----\n");
        for name in self.sorted(self.stage.roles().names().iter().map(|n| n.to_string()).collect()) {
            let role = self.stage.roles().get(&name).expect("listed name");
            out.push_str(&format!("  {}\n", role.name()));
            out.push_str(&format!(
                "    player {}, hands {}, voice {}\n",
                role.player(),
                role.hands(),
                role.voice()
            ));
            out.push_str(&format!("    puppet {}\n", role.puppet().unwrap_or("-")));
            let scenes: Vec<String> = role.scenes().iter().map(|s| s.to_string()).collect();
            out.push_str(&format!("    scenes {}\n", scenes.join(", ")));
            out.push_str(&format!("    spoken {}\n", self.spoken_total(role.name())));
        }
        out.push('\n');

        // puppets
        out.push_str("Puppets\n-------\n");
        for name in self.sorted(self.stage.puppets().history().keys().cloned().collect()) {
            let roles: Vec<String> = self.stage.puppets().history()[&name]
                .iter()
                .cloned()
                .collect();
            out.push_str(&format!(
                "  {} - {} ({}x spoken)\n",
                name,
                self.sorted(roles).join(", "),
                self.spoken_total(&name)
            ));
        }
        out.push('\n');

        // costumes
        out.push_str("Costumes\n--------\n");
        for name in self.sorted(self.stage.wardrobe().worn().keys().cloned().collect()) {
            let wearers: Vec<String> = self.stage.wardrobe().worn()[&name].iter().cloned().collect();
            out.push_str(&format!("  {} - {}\n", name, self.sorted(wearers).join(", ")));
        }
        out.push('\n');

        // props
        out.push_str("Props\n-----\n");
        for name in self.sorted(self.stage.props().iter().map(|p| p.name().to_owned()).collect()) {
            let prop = self.stage.props().get(&name).expect("listed name");
            let scenes: Vec<String> = prop.scenes().iter().map(|s| s.to_string()).collect();
            out.push_str(&format!(
                "  {} ({}) - owner {}, used {}x, scenes {}\n",
                prop.name(),
                prop.kind(),
                prop.owner().unwrap_or("-"),
                prop.uses(),
                scenes.join(", ")
            ));
        }
        out.push('\n');

        // cue values
        out.push_str("Cues\n----\n");
        for category in self.stage.tallies().categories() {
            out.push_str(&format!("  {}\n", category));
            for key in self.sorted(
                self.stage
                    .tallies()
                    .keys(category)
                    .iter()
                    .map(|k| k.to_string())
                    .collect(),
            ) {
                out.push_str(&format!(
                    "    {} ({}x)\n",
                    key,
                    self.stage.tallies().get(category, &key)
                ));
            }
        }
        out.push('\n');

        // histories
        out.push_str("Histories\n---------\n");
        for name in self.sorted(self.tracker.history().keys().cloned().collect()) {
            out.push_str(&format!("  {}\n", name));
            for entry in self.tracker.history_of(&name) {
                out.push_str(&format!("    {}: {}\n", entry.scene(), entry.render()));
            }
        }
        out.push('\n');

        // presence tables
        out.push_str("Puppets by scene\n----------------\n");
        out.push_str(&self.presence_table(Field::Puppet));
        out.push_str("\nRoles by scene\n--------------\n");
        out.push_str(&self.presence_table(Field::Role));
        out.push_str("\nBackdrops by scene\n------------------\n");
        out.push_str(&self.presence_table(Field::Backdrop));

        // backstage assignments
        out.push_str("\nBackstage\n---------\n");
        let mut headers = vec![String::from("person")];
        headers.extend(self.tracker.frames().iter().map(|f| f.index().to_string()));
        let rows: Vec<Vec<String>> = self
            .backstage_rows()
            .into_iter()
            .map(|(person, cells)| {
                let mut row = vec![person];
                row.extend(cells);
                row
            })
            .collect();
        out.push_str(&ascii_table(&headers, &rows));

        // anomalies
        out.push_str("\nAnomalies\n---------\n");
        if self.tracker.anomalies().is_empty() {
            out.push_str("  none\n");
        }
        for (scene, note) in self.tracker.anomalies() {
            out.push_str(&format!("  scene {}: {}\n", scene, note));
        }
        out
    }

    fn presence_table(&self, field: Field) -> String {
        let mut headers = vec![String::from("name")];
        headers.extend(self.tracker.frames().iter().map(|f| f.index().to_string()));
        let rows: Vec<Vec<String>> = self
            .staged(field)
            .into_iter()
            .map(|name| {
                let mut row = vec![name.clone()];
                for frame in self.tracker.frames() {
                    row.push(if frame.contains(field, &name) {
                        String::from("x")
                    } else {
                        String::new()
                    });
                }
                row
            })
            .collect();
        ascii_table(&headers, &rows)
    }

    // ------------- html -------------
    pub fn html(&self) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        out.push_str(&format!("<title>{}</title>\n", escape(&self.title)));
        out.push_str(STYLE);
        out.push_str("</head>\n<body>\n");
        out.push_str(&format!("<h1>{}</h1>\n", escape(&self.title)));
        if let Some(stamp) = &self.stamp {
            out.push_str(&format!("<p class=\"stamp\">generated {}</p>\n", escape(stamp)));
        }
        out.push_str(
            "<p class=\"nav\"><a href=\"#timeline\">Timeline</a> <a href=\"#roles\">Roles</a> \
             <a href=\"#puppets\">Puppets</a> <a href=\"#costumes\">Costumes</a> \
             <a href=\"#props\">Props</a> <a href=\"#presence\">Presence</a> \
             <a href=\"#backstage\">Backstage</a> <a href=\"#anomalies\">Anomalies</a></p>\n",
        );

        out.push_str("<h2 id=\"timeline\">Timeline</h2>\n");
        for frame in self.tracker.frames() {
            out.push_str(&format!(
                "<h3>{}. {}</h3>\n<ul>\n",
                frame.index(),
                escape(frame.title())
            ));
            for line in frame.log() {
                if line.starts_with("note: ") {
                    out.push_str(&format!("<li class=\"anomaly\">{}</li>\n", escape(line)));
                } else {
                    out.push_str(&format!("<li>{}</li>\n", escape(line)));
                }
            }
            for name in self.sorted(frame.spoken().keys().cloned().collect()) {
                out.push_str(&format!(
                    "<li>{}: {}x spoken</li>\n",
                    escape(&name),
                    frame.spoken()[&name]
                ));
            }
            out.push_str("</ul>\n");
        }

        out.push_str("<h2 id=\"roles\">Roles</h2>\n<table>\n<tr><th>role</th><th>player</th><th>hands</th><th>voice</th><th>puppet</th><th>scenes</th><th>spoken</th></tr>\n");
        for name in self.sorted(self.stage.roles().names().iter().map(|n| n.to_string()).collect()) {
            let role = self.stage.roles().get(&name).expect("listed name");
            let scenes: Vec<String> = role.scenes().iter().map(|s| s.to_string()).collect();
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(role.name()),
                escape(role.player()),
                escape(role.hands()),
                escape(role.voice()),
                escape(role.puppet().unwrap_or("-")),
                scenes.join(", "),
                self.spoken_total(role.name())
            ));
        }
        out.push_str("</table>\n");

        out.push_str("<h2 id=\"puppets\">Puppets</h2>\n<table>\n<tr><th>puppet</th><th>roles</th><th>spoken</th><th>picture</th></tr>\n");
        for name in self.sorted(self.stage.puppets().history().keys().cloned().collect()) {
            let roles: Vec<String> = self.stage.puppets().history()[&name]
                .iter()
                .cloned()
                .collect();
            let picture = self
                .pictures
                .and_then(|pool| pool.get(&name))
                .unwrap_or("");
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&name),
                escape(&self.sorted(roles).join(", ")),
                self.spoken_total(&name),
                picture
            ));
        }
        out.push_str("</table>\n");

        out.push_str("<h2 id=\"costumes\">Costumes</h2>\n<table>\n<tr><th>costume</th><th>wearers</th></tr>\n");
        for name in self.sorted(self.stage.wardrobe().worn().keys().cloned().collect()) {
            let wearers: Vec<String> = self.stage.wardrobe().worn()[&name].iter().cloned().collect();
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape(&name),
                escape(&self.sorted(wearers).join(", "))
            ));
        }
        out.push_str("</table>\n");

        out.push_str("<h2 id=\"props\">Props</h2>\n<table>\n<tr><th>prop</th><th>kind</th><th>owner</th><th>used</th></tr>\n");
        for name in self.sorted(self.stage.props().iter().map(|p| p.name().to_owned()).collect()) {
            let prop = self.stage.props().get(&name).expect("listed name");
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}x</td></tr>\n",
                escape(prop.name()),
                prop.kind(),
                escape(prop.owner().unwrap_or("-")),
                prop.uses()
            ));
        }
        out.push_str("</table>\n");

        out.push_str("<h2 id=\"presence\">Presence</h2>\n");
        out.push_str("<h3>Puppets</h3>\n");
        out.push_str(&self.html_presence(Field::Puppet));
        out.push_str("<h3>Roles</h3>\n");
        out.push_str(&self.html_presence(Field::Role));
        out.push_str("<h3>Backdrops</h3>\n");
        out.push_str(&self.html_presence(Field::Backdrop));

        out.push_str("<h2 id=\"backstage\">Backstage</h2>\n<table>\n<tr><th>person</th>");
        for frame in self.tracker.frames() {
            out.push_str(&format!("<th>{}</th>", frame.index()));
        }
        out.push_str("</tr>\n");
        for (person, cells) in self.backstage_rows() {
            out.push_str(&format!("<tr><td>{}</td>", escape(&person)));
            for cell in cells {
                out.push_str(&format!("<td>{}</td>", escape(&cell)));
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</table>\n");

        out.push_str("<h2 id=\"anomalies\">Anomalies</h2>\n<ul>\n");
        if self.tracker.anomalies().is_empty() {
            out.push_str("<li>none</li>\n");
        }
        for (scene, note) in self.tracker.anomalies() {
            out.push_str(&format!(
                "<li class=\"anomaly\">scene {}: {}</li>\n",
                scene,
                escape(note)
            ));
        }
        out.push_str("</ul>\n</body>\n</html>\n");
        out
    }

    fn html_presence(&self, field: Field) -> String {
        let mut out = String::from("<table>\n<tr><th>name</th>");
        for frame in self.tracker.frames() {
            out.push_str(&format!("<th>{}</th>", frame.index()));
        }
        out.push_str("</tr>\n");
        for name in self.staged(field) {
            out.push_str(&format!("<tr><td>{}</td>", escape(&name)));
            for frame in self.tracker.frames() {
                if frame.contains(field, &name) {
                    out.push_str("<td class=\"on\">x</td>");
                } else {
                    out.push_str("<td></td>");
                }
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</table>\n");
        out
    }

    // ------------- snapshot -------------
    pub fn snapshot(&self) -> Snapshot {
        let scenes = self
            .tracker
            .frames()
            .iter()
            .map(|frame| SceneSnap {
                index: frame.index(),
                title: frame.title().to_owned(),
                backdrops: frame.values(Field::Backdrop).to_vec(),
                spoken: frame
                    .spoken()
                    .iter()
                    .map(|(name, count)| (name.clone(), *count))
                    .collect(),
            })
            .collect();
        let roles = self
            .sorted(self.stage.roles().names().iter().map(|n| n.to_string()).collect())
            .into_iter()
            .filter_map(|name| self.stage.roles().get(&name).cloned())
            .collect();
        let puppets = self
            .sorted(self.stage.puppets().history().keys().cloned().collect())
            .into_iter()
            .map(|name| PuppetSnap {
                roles: self.stage.puppets().history()[&name].iter().cloned().collect(),
                name,
            })
            .collect();
        let costumes = self
            .sorted(self.stage.wardrobe().worn().keys().cloned().collect())
            .into_iter()
            .map(|name| CostumeSnap {
                wearers: self.stage.wardrobe().worn()[&name].iter().cloned().collect(),
                name,
            })
            .collect();
        let props = self
            .sorted(self.stage.props().iter().map(|p| p.name().to_owned()).collect())
            .into_iter()
            .filter_map(|name| self.stage.props().get(&name).cloned())
            .collect();
        let anomalies = self
            .tracker
            .anomalies()
            .iter()
            .map(|(scene, note)| AnomalySnap { scene: *scene, note: note.clone() })
            .collect();
        Snapshot { scenes, roles, puppets, costumes, props, anomalies }
    }
}

// ------------- helpers -------------
fn ascii_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let columns = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }
    let mut out = String::from("  ");
    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            out.push_str(" | ");
        }
        out.push_str(&format!("{:width$}", header, width = widths[i]));
    }
    out.push('\n');
    out.push_str("  ");
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            out.push_str("-+-");
        }
        out.push_str(&"-".repeat(*width));
    }
    out.push('\n');
    for row in rows {
        out.push_str("  ");
        for i in 0..columns {
            if i > 0 {
                out.push_str(" | ");
            }
            let empty = String::new();
            let cell = row.get(i).unwrap_or(&empty);
            out.push_str(&format!("{:width$}", cell, width = widths[i]));
        }
        out.push('\n');
    }
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

const STYLE: &str = "<style>\n\
body { font-family: sans-serif; margin: 2em; }\n\
table { border-collapse: collapse; margin: 0.5em 0; }\n\
th, td { border: 1px solid #999; padding: 0.2em 0.6em; text-align: left; }\n\
th { background: #eee; }\n\
td.on { background: #cfc; text-align: center; }\n\
.anomaly { background: #fdd; }\n\
.nav a { margin-right: 1em; }\n\
.stamp { color: #666; }\n\
</style>\n";
