use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use daw_session::SessionContext;
use daw_session::project::loader::loader_for;
use daw_session::project::serialization::{parse_document, write_document};
use daw_session::project::{FormatVersion, Project, project_to_document};
use daw_session::value::Value;
use daw_session::{ObjectRef, UndoCommand};

/// A current-format document with `instruments` tracks of `events` clips each
fn build_document(instruments: u32, events: u32) -> String {
    let mut project = Project::new(SessionContext::software()).unwrap();
    for i in 0..instruments {
        let id = project.add_instrument(&format!("Track {}", i), "guitar").unwrap();
        for e in 0..events {
            project
                .add_event_from_file(id, e as f64 * 4.0, format!("/audio/take{}.wav", e))
                .unwrap();
        }
        project
            .perform(UndoCommand::new(
                ObjectRef::Instrument(id),
                "SetPan",
                vec![Value::Float(-0.5)],
            ))
            .unwrap();
    }
    write_document(&project_to_document(&project)).unwrap()
}

/// Benchmark document parsing (quick-xml into the element tree)
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_document");
    for size in [4u32, 16, 64] {
        let text = build_document(size, 8);
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| black_box(parse_document(text).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark restoring a project from a parsed document
///
/// Files do not exist, so each event also exercises the waveform fallback.
fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_project");
    for size in [4u32, 16, 64] {
        let root = parse_document(&build_document(size, 8)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &root, |b, root| {
            b.iter(|| {
                let mut project = Project::new(SessionContext::software()).unwrap();
                loader_for(FormatVersion::CURRENT)
                    .load_project(&mut project, root)
                    .unwrap();
                black_box(project.instruments().len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_load);
criterion_main!(benches);
