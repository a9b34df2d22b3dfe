//! Batch entry point: load the run configuration, parse every scene file in
//! order, then write the normalized script, the reports and the snapshot.
//!
//! The run always completes once the inputs are readable; anomalies show up
//! as advisory markers in the artifacts, not as a non-zero exit status.

use std::fs;
use std::path::Path;

use chrono::Local;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use callboard::config::{PicturePool, RoleGroups, Settings, Substitutions};
use callboard::error::{CallboardError, Result};
use callboard::report::ReportBuilder;
use callboard::script::SceneParser;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let config_path = std::env::args().nth(1).unwrap_or_else(|| String::from("callboard"));
    if let Err(e) = run(&config_path) {
        error!(error = %e, "run failed");
        std::process::exit(1);
    }
}

fn run(config_path: &str) -> Result<()> {
    let settings = Settings::load(config_path)?;
    if settings.script_files.is_empty() {
        return Err(CallboardError::Config(String::from(
            "no script_files configured",
        )));
    }

    let subs = match &settings.substitutions {
        Some(path) => Substitutions::from_file(path)?,
        None => Substitutions::default(),
    };
    let groups = match &settings.role_groups {
        Some(path) => RoleGroups::from_file(path)?,
        None => RoleGroups::default(),
    };
    let pictures = match &settings.pictures {
        Some(path) => Some(PicturePool::from_file(path)?),
        None => None,
    };
    info!(
        substitutions = subs.len(),
        groups = groups.len(),
        files = settings.script_files.len(),
        "configuration loaded"
    );

    let mut parser = SceneParser::new(subs, groups);
    for path in &settings.script_files {
        let text = fs::read_to_string(path)
            .map_err(|e| CallboardError::MissingInput(format!("{}: {}", path.display(), e)))?;
        info!(file = %path.display(), "parsing");
        parser.consume(&text);
    }
    let production = parser.finish();

    let stamp = Local::now().format("%Y-%m-%d %H:%M").to_string();
    let mut builder = ReportBuilder::new(&production)
        .numeric_sort(settings.numeric_sort)
        .titled(&settings.html_title)
        .stamped(&stamp);
    if let Some(pool) = &pictures {
        builder = builder.with_pictures(pool);
    }

    fs::create_dir_all(&settings.out_dir)?;
    write_artifact(&settings.out_dir, "normalized.txt", &production.normalized_text())?;
    write_artifact(&settings.out_dir, "report.txt", &builder.text())?;
    write_artifact(&settings.out_dir, "report.html", &builder.html())?;
    let snapshot = serde_json::to_string_pretty(&builder.snapshot())
        .map_err(|e| CallboardError::Output(e.to_string()))?;
    write_artifact(&settings.out_dir, "snapshot.json", &snapshot)?;

    info!(
        scenes = production.tracker.scene_count(),
        roles = production.stage.roles().len(),
        anomalies = production.tracker.anomalies().len(),
        "run complete"
    );
    Ok(())
}

fn write_artifact(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, content)?;
    info!(file = %path.display(), bytes = content.len(), "artifact written");
    Ok(())
}
