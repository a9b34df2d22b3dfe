//! Callboard – a continuity tracker for live puppet performance scripts.
//!
//! Callboard ingests line-oriented scene scripts (cast lines, cue tags,
//! dialogue, backdrop/prop sections) and maintains a running model of who
//! and what is on stage across the ordered sequence of scenes:
//! * A [`construct::Role`] is a character, distinct from the humans
//!   (player, hands, voice) animating it.
//! * A [`construct::Stage`] owns one keeper per entity category (roles,
//!   puppets, costumes, props) plus usage tallies and the synthetic-name
//!   forge for anonymous entities.
//! * A [`timeframe::Timeframe`] is one scene's worth of "current state":
//!   field lists, the scene log and the spoken tallies frozen at close.
//! * The [`script::SceneParser`] drives everything line by line and emits
//!   the normalized event script.
//! * The [`report::ReportBuilder`] projects the finished model into text,
//!   HTML and a JSON snapshot.
//!
//! ## Modules
//! * [`construct`] – Scene-spanning entities and the keepers that own them.
//! * [`timeframe`] – Per-scene event log, tallies and entity histories.
//! * [`script`] – The line classifier and scene parser.
//! * [`report`] – Read-only text/HTML/JSON projections.
//! * [`config`] – Run settings and the auxiliary lookup tables.
//! * [`error`] – The error enum for the tooling layer.
//!
//! ## Forgiveness
//! The core never fails. Continuity surprises such as a player swapped
//! mid-run, an unused prop or an unknown role in the dialogue become notes
//! in the normalized script, the scene log and the diagnostic stream, and
//! parsing continues with best-effort defaults. Only missing input files
//! are fatal, and only in the surrounding tooling.
//!
//! ## Quick Start
//! ```
//! use callboard::config::{RoleGroups, Substitutions};
//! use callboard::script::SceneParser;
//! use callboard::report::ReportBuilder;
//!
//! let mut parser = SceneParser::new(Substitutions::default(), RoleGroups::default());
//! parser.consume("= Scene 1 =\nPuppets:\nAlice (Anna, ---|Bobcat|Dress)\n\nAlice: Hello!\n");
//! let production = parser.finish();
//! assert!(production.stage.roles().contains("Alice"));
//! let report = ReportBuilder::new(&production).text();
//! assert!(report.contains("Alice"));
//! ```

pub mod config;
pub mod construct;
pub mod error;
pub mod report;
pub mod script;
pub mod timeframe;
