use callboard::config::{RoleGroups, Substitutions};
use callboard::script::{Production, SceneParser};

fn parse(script: &str) -> Production {
    let mut parser = SceneParser::new(Substitutions::default(), RoleGroups::default());
    parser.consume(script);
    parser.finish()
}

#[test]
fn three_lines_tally_three_and_render_final() {
    // placeholder player and hands: both resolve to the role's own name
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (None, ---|Bobcat|Costume1)\n\
         \n\
         DIALOGUE\n\
         Alice: Good morning!\n\
         Alice: What a day.\n\
         Alice: Indeed.\n",
    );
    let alice = production.stage.roles().get("Alice").unwrap();
    assert_eq!(alice.player(), "Alice");
    assert_eq!(alice.hands(), "Alice");
    assert_eq!(alice.puppet(), Some("Bobcat"));
    let frame = &production.tracker.frames()[0];
    assert_eq!(frame.spoken().get("Alice"), Some(&3));
    assert_eq!(frame.spoken().get("Bobcat"), Some(&3));
    // exactly one spoken entry each, rendered final after close
    for entity in ["Alice", "Bobcat"] {
        let rendered: Vec<String> = production
            .tracker
            .history_of(entity)
            .iter()
            .map(|entry| entry.render())
            .collect();
        let spoken: Vec<&String> = rendered.iter().filter(|r| r.ends_with("x spoken")).collect();
        assert_eq!(spoken, vec!["3x spoken"], "history of {}", entity);
        assert_eq!(rendered.last().unwrap(), "3x spoken");
    }
}

#[test]
fn fan_out_credits_player_voice_and_puppet() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Knight (Ben/Carl, Dana|Horse|Armor)\n\
         \n\
         DIALOGUE\n\
         Knight: Onward!\n",
    );
    let knight = production.stage.roles().get("Knight").unwrap();
    assert_eq!(knight.player(), "Ben");
    assert_eq!(knight.voice(), "Carl");
    assert_eq!(knight.hands(), "Dana");
    let frame = &production.tracker.frames()[0];
    assert_eq!(frame.spoken().get("Knight"), Some(&1));
    assert_eq!(frame.spoken().get("Ben"), Some(&1));
    assert_eq!(frame.spoken().get("Carl"), Some(&1));
    assert_eq!(frame.spoken().get("Horse"), Some(&1));
    // hands are not credited with spoken lines
    assert_eq!(frame.spoken().get("Dana"), None);
}

#[test]
fn tallies_are_scene_scoped() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         \n\
         DIALOGUE\n\
         Alice: One.\n\
         Alice: Two.\n\
         \n\
         = Scene 2 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         \n\
         DIALOGUE\n\
         Alice: Three.\n",
    );
    let frames = production.tracker.frames();
    assert_eq!(frames[0].spoken().get("Alice"), Some(&2));
    assert_eq!(frames[1].spoken().get("Alice"), Some(&1));
    // one spoken history entry per scene, each rendered with its own count
    let rendered: Vec<String> = production
        .tracker
        .history_of("Alice")
        .iter()
        .filter(|entry| entry.render().ends_with("x spoken"))
        .map(|entry| format!("{}: {}", entry.scene(), entry.render()))
        .collect();
    assert_eq!(rendered, vec!["Scene 1: 2x spoken", "Scene 2: 1x spoken"]);
}

#[test]
fn multi_name_line_credits_each_speaker_once() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         Bob (Ben, |Tomcat|Coat)\n\
         \n\
         DIALOGUE\n\
         Alice, Bob: We ride!\n",
    );
    let frame = &production.tracker.frames()[0];
    assert_eq!(frame.spoken().get("Alice"), Some(&1));
    assert_eq!(frame.spoken().get("Bob"), Some(&1));
    // the shared text lands once per resolved role in the normalized script
    let spoken_lines: Vec<&String> = production
        .normalized
        .iter()
        .filter(|line| line.starts_with("\tspoken"))
        .collect();
    assert_eq!(
        spoken_lines,
        vec!["\tspoken Alice: We ride!", "\tspoken Bob: We ride!"]
    );
}

#[test]
fn comments_travel_with_the_spoken_directive() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         \n\
         DIALOGUE\n\
         Alice (laughing): What a day.\n",
    );
    assert!(production
        .normalized
        .iter()
        .any(|line| line == "\tspoken Alice (laughing): What a day."));
}
