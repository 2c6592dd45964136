use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use reaction_paths::config::Config;
use reaction_paths::layout::compute_layout;
use reaction_paths::parser::parse_diagram;
use reaction_paths::render::render_svg;
use reaction_paths::text_metrics::CharWidthEstimator;
use std::hint::black_box;

fn synthetic_profile(levels: usize, branch_every: usize) -> String {
    let mut out = String::from("reaction\n");
    for i in 0..levels {
        let energy = ((i * 37) % 23) as f32 / 10.0 - 1.1;
        let attach = if branch_every > 0 && i > 0 && i % branch_every == 0 {
            " attach"
        } else {
            ""
        };
        out.push_str(&format!("level l{i} {energy:.2} \"L$_{{{i}}}$\"{attach}\n"));
    }
    for i in 1..levels {
        out.push_str(&format!("link l{} l{}\n", i - 1, i));
    }
    out
}

fn fixture(name: &str) -> &'static str {
    match name {
        "reference" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/benches/fixtures/reference.rpd"
        )),
        "long_profile" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/benches/fixtures/long_profile.rpd"
        )),
        _ => panic!("unknown fixture"),
    }
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for name in ["reference", "long_profile"] {
        let input = fixture(name);
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, data| {
            b.iter(|| {
                let parsed = parse_diagram(black_box(data)).expect("parse failed");
                black_box(parsed.names.len());
            });
        });
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = Config::default();
    for name in ["reference", "long_profile"] {
        let diagram = parse_diagram(fixture(name))
            .and_then(|source| source.build_with(&config, CharWidthEstimator))
            .expect("build failed");
        group.bench_with_input(BenchmarkId::from_parameter(name), &diagram, |b, diagram| {
            b.iter(|| {
                let layout = compute_layout(black_box(diagram), &config.layout).expect("layout");
                black_box(layout.columns.len());
            });
        });
    }
    group.finish();
}

fn bench_layout_synthetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_synthetic");
    let config = Config::default();
    for (levels, branch_every) in [(100usize, 0usize), (500, 3), (2000, 4)] {
        let name = format!("levels_{levels}_branch_{branch_every}");
        let diagram = parse_diagram(&synthetic_profile(levels, branch_every))
            .and_then(|source| source.build_with(&config, CharWidthEstimator))
            .expect("build failed");
        group.bench_with_input(BenchmarkId::from_parameter(name), &diagram, |b, diagram| {
            b.iter(|| {
                let layout = compute_layout(black_box(diagram), &config.layout).expect("layout");
                black_box(layout.links.len());
            });
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");
    let config = Config::default();
    for name in ["reference", "long_profile"] {
        let input = fixture(name);
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, data| {
            b.iter(|| {
                let diagram = parse_diagram(black_box(data))
                    .and_then(|source| source.build_with(&config, CharWidthEstimator))
                    .expect("build failed");
                let layout = compute_layout(&diagram, &config.layout).expect("layout");
                let svg = render_svg(&layout, &config);
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_layout,
    bench_layout_synthetic,
    bench_end_to_end
);
criterion_main!(benches);
