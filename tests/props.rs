use callboard::config::{RoleGroups, Substitutions};
use callboard::construct::PropKind;
use callboard::script::{Production, SceneParser};

fn parse(script: &str) -> Production {
    let mut parser = SceneParser::new(Substitutions::default(), RoleGroups::default());
    parser.consume(script);
    parser.finish()
}

fn anomalies_matching<'a>(production: &'a Production, needle: &str) -> Vec<&'a str> {
    production
        .tracker
        .anomalies()
        .iter()
        .filter(|(_, note)| note.contains(needle))
        .map(|(_, note)| note.as_str())
        .collect()
}

#[test]
fn declared_but_unreferenced_prop_flags_once() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         \n\
         Setting:\n\
         Alice: Broom (hand)\n\
         \n\
         DIALOGUE\n\
         Alice: No broom today.\n",
    );
    assert_eq!(
        anomalies_matching(&production, "unused prop"),
        vec!["unused prop: Broom"]
    );
}

#[test]
fn referenced_prop_is_not_flagged() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         \n\
         Setting:\n\
         Alice: Broom (hand)\n\
         \n\
         DIALOGUE\n\
         %hnd Alice: Broom\n\
         Alice: Sweep sweep.\n",
    );
    assert!(anomalies_matching(&production, "unused prop").is_empty());
    // declared once, used once: matched against the registry, not re-created
    let broom = production.stage.props().get("Broom").unwrap();
    assert_eq!(broom.uses(), 2);
    assert_eq!(broom.kind(), PropKind::Hand);
    assert_eq!(broom.owner(), Some("Alice"));
}

#[test]
fn reassignment_is_an_explicit_remove_add_pair() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         \n\
         Setting:\n\
         Alice: Broom (hand)\n\
         \n\
         DIALOGUE\n\
         %hnd Alice: Broom\n\
         \n\
         = Scene 2 =\n\
         Puppets:\n\
         Bob (Ben, |Tomcat|Coat)\n\
         \n\
         DIALOGUE\n\
         %hnd Bob: Broom\n",
    );
    let position = |needle: &str| {
        production
            .normalized
            .iter()
            .position(|line| line == needle)
            .unwrap_or_else(|| panic!("missing directive: {}", needle))
    };
    let removed = position("\tnote prop- Alice: Broom");
    let added = position("\tnote prop+ Bob: Broom");
    assert!(removed < added);
    assert_eq!(production.stage.props().get("Broom").unwrap().owner(), Some("Bob"));
}

#[test]
fn suffix_and_inline_extraction_dedupe_per_line() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         \n\
         Setting:\n\
         Alice: Broom (hand), [[Broom]]\n\
         \n\
         DIALOGUE\n\
         %hnd Alice: Broom\n",
    );
    let broom = production.stage.props().get("Broom").unwrap();
    // one declaration plus one cue reference; the inline repeat on the same
    // line does not double count
    assert_eq!(broom.uses(), 2);
    assert_eq!(broom.kind(), PropKind::Hand);
    assert_eq!(broom.owner(), Some("Alice"));
}

#[test]
fn inline_markup_extracts_from_prose_lines() {
    let production = parse(
        "= Scene 1 =\n\
         Setting:\n\
         Table with [[Vase]] and [[Candle]]\n",
    );
    let vase = production.stage.props().get("Vase").unwrap();
    assert_eq!(vase.kind(), PropKind::Just);
    assert_eq!(vase.owner(), None);
    assert!(production.stage.props().contains("Candle"));
    // the prose remainder is not a prop
    assert!(!production.stage.props().contains("Table with and"));
    assert_eq!(
        anomalies_matching(&production, "unused prop"),
        vec!["unused prop: Candle", "unused prop: Vase"]
    );
}

#[test]
fn rail_kinds_parse_from_the_suffix_convention() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Knight (Ben, |Horse|Armor)\n\
         \n\
         Setting:\n\
         Knight: Lance (second), Banner (front)\n\
         - Ladder\n",
    );
    assert_eq!(
        production.stage.props().get("Lance").unwrap().kind(),
        PropKind::SecondRail
    );
    assert_eq!(
        production.stage.props().get("Banner").unwrap().kind(),
        PropKind::FrontRail
    );
    let ladder = production.stage.props().get("Ladder").unwrap();
    assert_eq!(ladder.kind(), PropKind::Just);
    assert_eq!(ladder.owner(), None);
}
