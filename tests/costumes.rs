use callboard::config::{RoleGroups, Substitutions};
use callboard::script::{Production, SceneParser};

fn parse(script: &str) -> Production {
    let mut parser = SceneParser::new(Substitutions::default(), RoleGroups::default());
    parser.consume(script);
    parser.finish()
}

fn directives<'a>(production: &'a Production, prefix: &str) -> Vec<&'a str> {
    production
        .normalized
        .iter()
        .filter(|line| line.starts_with(prefix))
        .map(String::as_str)
        .collect()
}

#[test]
fn costume_law_add_keep_change() {
    // [C1, C1, C2] over three scenes: add@1, keep@2, remove+add@3
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|C1)\n\
         \n\
         = Scene 2 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|C1)\n\
         \n\
         = Scene 3 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|C2)\n",
    );
    assert_eq!(
        directives(&production, "\tclothing"),
        vec![
            "\tclothing+ Alice: C1",
            "\tclothing= Alice: C1",
            "\tclothing- Alice: C1",
            "\tclothing+ Alice: C2",
        ]
    );
}

#[test]
fn dropped_role_takes_its_costume_off() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         \n\
         = Scene 2 =\n\
         Puppets:\n\
         Bob (Ben, |Tomcat|Coat)\n",
    );
    assert!(production
        .normalized
        .iter()
        .any(|line| line == "\tclothing- Alice: Dress"));
    assert_eq!(production.stage.wardrobe().current("Alice"), None);
    // the record survives for history lookups
    assert!(production.stage.roles().contains("Alice"));
    assert!(production.stage.wardrobe().known("Dress"));
}

#[test]
fn placeholder_costume_is_an_explicit_removal() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         \n\
         = Scene 2 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|---)\n",
    );
    assert_eq!(
        directives(&production, "\tclothing"),
        vec!["\tclothing+ Alice: Dress", "\tclothing- Alice: Dress"]
    );
    assert_eq!(production.stage.wardrobe().current("Alice"), None);
}

#[test]
fn costumes_section_assigns_like_a_cast_line() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|)\n\
         \n\
         Costumes:\n\
         Alice: Gown\n",
    );
    assert!(production
        .normalized
        .iter()
        .any(|line| line == "\tclothing+ Alice: Gown"));
    assert_eq!(production.stage.wardrobe().current("Alice"), Some("Gown"));
}

#[test]
fn costume_history_names_both_sides() {
    let production = parse(
        "= Scene 1 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Dress)\n\
         \n\
         = Scene 2 =\n\
         Puppets:\n\
         Alice (Anna, |Bobcat|Gown)\n",
    );
    let dress: Vec<String> = production
        .tracker
        .history_of("Dress")
        .iter()
        .map(|entry| entry.render())
        .collect();
    assert_eq!(dress, vec!["put on by Alice", "taken off by Alice"]);
    let alice: Vec<String> = production
        .tracker
        .history_of("Alice")
        .iter()
        .map(|entry| entry.render())
        .collect();
    assert!(alice.contains(&String::from("costume on: Dress")));
    assert!(alice.contains(&String::from("costume change: Dress -> Gown")));
}
