//! Run configuration and the auxiliary lookup tables.
//!
//! Everything the parser needs from the outside world is loaded once, up
//! front, into explicit objects handed to [`crate::script::SceneParser`] at
//! construction. There is no global mutable state; the scope of a loaded
//! table is one run.
//!
//! Three tables share one flat format: semicolon-separated fields, one entry
//! per line, `#` starting a comment line. This matches the files the
//! surrounding tooling produces and consumes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{CallboardError, Result};

// ------------- Settings -------------
/// Run settings, read from a TOML file with `CALLBOARD_`-prefixed
/// environment overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Scene script files, in performance order.
    pub script_files: Vec<PathBuf>,
    /// Optional `pattern;replacement` substitution table.
    pub substitutions: Option<PathBuf>,
    /// Optional `group;role;role;...` alias table.
    pub role_groups: Option<PathBuf>,
    /// Optional `name;html-fragment` puppet picture pool.
    pub pictures: Option<PathBuf>,
    /// Directory the artifacts are written into.
    pub out_dir: PathBuf,
    /// Compare embedded digit runs numerically when sorting listings.
    pub numeric_sort: bool,
    /// Heading for the HTML report.
    pub html_title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            script_files: Vec::new(),
            substitutions: None,
            role_groups: None,
            pictures: None,
            out_dir: PathBuf::from("out"),
            numeric_sort: true,
            html_title: String::from("Callboard"),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CALLBOARD"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}

// ------------- Table reading -------------
// Shared reader for the semicolon-separated tables. Field counts are
// checked here so the loaders below can index without surprises.
fn read_table(path: &Path, min_fields: usize) -> Result<Vec<Vec<String>>> {
    let text = fs::read_to_string(path)
        .map_err(|e| CallboardError::MissingInput(format!("{}: {}", path.display(), e)))?;
    let mut rows = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<String> = line.split(';').map(str::to_owned).collect();
        if fields.len() < min_fields {
            return Err(CallboardError::Table {
                message: format!("expected at least {} fields, got {}", min_fields, fields.len()),
                file: path.display().to_string(),
                line: number + 1,
            });
        }
        rows.push(fields);
    }
    debug!(file = %path.display(), rows = rows.len(), "table loaded");
    Ok(rows)
}

// ------------- Substitutions -------------
/// Fixed substitution table applied to every raw line before parsing.
/// Pairs apply in file order; patterns are literal, not regular expressions.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    pairs: Vec<(String, String)>,
}

impl Substitutions {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut pairs = Vec::new();
        for row in read_table(path, 2)? {
            pairs.push((row[0].clone(), row[1].clone()));
        }
        Ok(Self { pairs })
    }
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            pairs: pairs.into_iter().map(|(p, r)| (p.into(), r.into())).collect(),
        }
    }
    pub fn apply(&self, line: &str) -> String {
        let mut out = line.to_owned();
        for (pattern, replacement) in &self.pairs {
            if out.contains(pattern.as_str()) {
                out = out.replace(pattern.as_str(), replacement);
            }
        }
        out
    }
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

// ------------- Role groups -------------
/// Expands a group cue name into its member role names. Groups come from
/// the alias table and from `%grp` lines met while parsing; a later
/// definition for the same name wins.
#[derive(Debug, Clone, Default)]
pub struct RoleGroups {
    groups: BTreeMap<String, Vec<String>>,
}

impl RoleGroups {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut groups = Self::default();
        for row in read_table(path, 2)? {
            let members = row[1..].iter().map(|m| m.trim().to_owned()).collect();
            groups.define(&row[0], members);
        }
        Ok(groups)
    }
    pub fn define(&mut self, group: &str, members: Vec<String>) {
        self.groups.insert(group.trim().to_lowercase(), members);
    }
    /// A group name resolves to its members, anything else to itself.
    pub fn resolve(&self, name: &str) -> Vec<String> {
        match self.groups.get(&name.trim().to_lowercase()) {
            Some(members) => members.clone(),
            None => vec![name.trim().to_owned()],
        }
    }
    pub fn is_group(&self, name: &str) -> bool {
        self.groups.contains_key(&name.trim().to_lowercase())
    }
    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

// ------------- Picture pool -------------
/// Name-keyed HTML fragments embedded next to puppet catalog entries in
/// the HTML report. Names match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PicturePool {
    by_name: BTreeMap<String, String>,
}

impl PicturePool {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        for row in read_table(path, 2)? {
            // the fragment itself may contain semicolons
            by_name.insert(row[0].trim().to_lowercase(), row[1..].join(";"));
        }
        Ok(Self { by_name })
    }
    pub fn get(&self, name: &str) -> Option<&str> {
        self.by_name.get(&name.trim().to_lowercase()).map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.by_name.len()
    }
}
