use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use callboard::config::{RoleGroups, Substitutions};
use callboard::report::ReportBuilder;
use callboard::script::SceneParser;

// A synthetic run: every scene re-casts a small ensemble, swaps one
// costume, sets out props and speaks a handful of lines.
fn synthetic_show(scenes: usize) -> String {
    let mut show = String::new();
    for i in 1..=scenes {
        show.push_str(&format!("= Scene {} =\n", i));
        show.push_str("Backdrop:\nForest | Meadow | Gate\n\n");
        show.push_str("Puppets:\n");
        show.push_str(&format!("Alice (Anna, Ben|Bobcat|Dress{})\n", i % 3));
        show.push_str("Knight (Ben/Carl, Dana|Horse|Armor)\n");
        show.push_str("Jester (Eva, ?|?|Motley)\n\n");
        show.push_str("Setting:\nAlice: Broom (hand), Bucket (front)\n- Ladder\n\n");
        show.push_str("DIALOGUE\n");
        show.push_str("%amb Forest murmur\n%lig Warm wash\n");
        show.push_str("%hnd Alice: Broom\n");
        for _ in 0..5 {
            show.push_str("Alice: Good morning!\n");
            show.push_str("Knight: Onward!\n");
            show.push_str("Alice and Knight: Together!\n");
        }
        show.push('\n');
    }
    show
}

fn parse_show(show: &str) -> usize {
    let mut parser = SceneParser::new(Substitutions::default(), RoleGroups::default());
    parser.consume(show);
    parser.finish().normalized.len()
}

fn criterion_benchmark(c: &mut Criterion) {
    let show = synthetic_show(50);
    c.bench_function("parse 50 scenes", |b| b.iter(|| parse_show(black_box(&show))));

    let mut parser = SceneParser::new(Substitutions::default(), RoleGroups::default());
    parser.consume(&show);
    let production = parser.finish();
    c.bench_function("text report over 50 scenes", |b| {
        b.iter(|| ReportBuilder::new(black_box(&production)).text().len())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
