use callboard::config::{PicturePool, RoleGroups, Substitutions};
use callboard::report::{natural_cmp, ReportBuilder};
use callboard::script::{Production, SceneParser};
use std::cmp::Ordering;

const SHOW: &str = "= Scene 1: Morning =\n\
                    Backdrop:\n\
                    Forest | Meadow | Gate\n\
                    \n\
                    Puppets:\n\
                    Alice (Anna, Ben|Bobcat|Dress)\n\
                    Knight (Ben/Carl, Dana|Horse|Armor)\n\
                    \n\
                    Setting:\n\
                    Alice: Broom (hand)\n\
                    \n\
                    INTRO\n\
                    A quiet morning in the woods.\n\
                    DIALOGUE\n\
                    %amb Forest murmur\n\
                    %hnd Alice: Broom\n\
                    Alice: Good morning!\n\
                    Knight: Onward!\n\
                    \n\
                    = Scene 2: Evening =\n\
                    Backdrop:\n\
                    Forest | Meadow | Gate\n\
                    \n\
                    Puppets:\n\
                    Alice (Anna, Ben|Bobcat|Gown)\n\
                    \n\
                    Setting:\n\
                    Alice: Lantern (hand)\n\
                    \n\
                    DIALOGUE\n\
                    %amb Forest murmur\n\
                    Alice: Good night.\n";

fn parse(script: &str) -> Production {
    let mut parser = SceneParser::new(Substitutions::default(), RoleGroups::default());
    parser.consume(script);
    parser.finish()
}

#[test]
fn parsing_is_idempotent_from_fresh_state() {
    let first = parse(SHOW);
    let second = parse(SHOW);
    assert_eq!(first.normalized_text(), second.normalized_text());
    assert_eq!(
        ReportBuilder::new(&first).text(),
        ReportBuilder::new(&second).text()
    );
    assert_eq!(
        ReportBuilder::new(&first).html(),
        ReportBuilder::new(&second).html()
    );
}

#[test]
fn natural_ordering_is_case_insensitive_and_numeric_aware() {
    assert_eq!(natural_cmp("Scene 2", "Scene 10", true), Ordering::Less);
    assert_eq!(natural_cmp("Scene 10", "Scene 2", false), Ordering::Less);
    assert_eq!(natural_cmp("alice", "Bob", true), Ordering::Less);
    assert_eq!(natural_cmp("Bobcat", "bobcat", true), Ordering::Equal);
    assert_eq!(natural_cmp("a2b", "a10b", true), Ordering::Less);
}

#[test]
fn scene_blocks_open_with_the_title_and_close_with_one_curtain() {
    let production = parse(SHOW);
    assert_eq!(production.normalized[0], "Scene 1: Morning");
    let curtains = production
        .normalized
        .iter()
        .filter(|line| line.as_str() == "\tcurtain")
        .count();
    assert_eq!(curtains, 2);
    // the curtain is the last directive of each block
    assert_eq!(production.normalized.last().unwrap(), "\tcurtain");
}

#[test]
fn person_diff_emits_one_arrival_and_one_departure() {
    let production = parse(SHOW);
    let count = |needle: &str| {
        production
            .normalized
            .iter()
            .filter(|line| line.as_str() == needle)
            .count()
    };
    // Anna carries over between the scenes: one arrival, no departure
    assert_eq!(count("\tperson+ Anna"), 1);
    assert_eq!(count("\tperson- Anna"), 0);
    // the Knight leaves after scene 1 and takes Carl and Dana along
    assert_eq!(count("\tperson- Carl"), 1);
    assert_eq!(count("\tperson- Dana"), 1);
    assert_eq!(count("\tpuppet- Horse"), 1);
    // Ben hands for Alice in scene 2, so he stays
    assert_eq!(count("\tperson- Ben"), 0);
}

#[test]
fn backdrop_repeats_are_acknowledged_not_recounted() {
    let production = parse(SHOW);
    assert_eq!(
        production.stage.tallies().get("backdrop", "Forest | Meadow | Gate"),
        2
    );
    let report = ReportBuilder::new(&production).text();
    assert!(report.contains("Forest | Meadow | Gate (2x)"));
}

#[test]
fn text_report_carries_all_catalogs() {
    let production = parse(SHOW);
    let report = ReportBuilder::new(&production).text();
    for heading in [
        "Timeline", "Roles", "Puppets", "Costumes", "Props", "Cues",
        "Histories", "Puppets by scene", "Backstage", "Anomalies",
    ] {
        assert!(report.contains(heading), "missing section {}", heading);
    }
    // presence: Bobcat on in both scenes
    assert!(report.contains("Bobcat | x | x"));
    // backstage duties recovered from the history heuristics
    assert!(report.contains("Alice (h)"));
    assert!(report.contains("Knight (v)"));
    // spoken totals
    assert!(report.contains("Alice\n"));
    assert!(report.contains("spoken 2"));
}

#[test]
fn html_report_anchors_highlights_and_embeds_pictures() {
    let production = parse(SHOW);
    let mut pictures = std::env::temp_dir();
    pictures.push("callboard_pictures_test.csv");
    std::fs::write(&pictures, "Bobcat;<img src=\"bobcat.png\">\n").unwrap();
    let pool = PicturePool::from_file(&pictures).unwrap();
    let html = ReportBuilder::new(&production)
        .with_pictures(&pool)
        .titled("Morning Show")
        .html();
    assert!(html.contains("<h1>Morning Show</h1>"));
    assert!(html.contains("id=\"roles\""));
    assert!(html.contains("id=\"backstage\""));
    assert!(html.contains("<img src=\"bobcat.png\">"));
    assert!(html.contains("class=\"on\""));
    // the unused prop note is highlighted
    assert!(html.contains("class=\"anomaly\""));
}

#[test]
fn snapshot_lists_every_registered_entity() {
    let production = parse(SHOW);
    let snapshot = ReportBuilder::new(&production).snapshot();
    let json = serde_json::to_string_pretty(&snapshot).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["scenes"].as_array().unwrap().len(), 2);
    let roles: Vec<&str> = value["roles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["Alice", "Knight"]);
    assert_eq!(value["puppets"][0]["name"], "Bobcat");
    assert_eq!(value["props"][0]["name"], "Broom");
    assert_eq!(value["scenes"][0]["backdrops"][0], "Forest | Meadow | Gate");
}
