//! Parsing throughput benchmarks.
//!
//! Run with:
//! ```bash
//! cargo bench -p kiln-parser
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kiln_parser::{parse_document, scan_tasks, WeekendPolicy};

fn document_with_tasks(task_count: usize) -> String {
    let mut doc = String::from("---\ntype: project\nstatus: active\nname: bench\n---\n");
    for i in 0..task_count {
        doc.push_str(&format!("- [ ] task number {i} due:2024-0{}-01 priority:{}\n", (i % 9) + 1, i % 5));
    }
    doc
}

fn bench_parse_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_document");
    for &count in &[10usize, 100, 1_000] {
        let doc = document_with_tasks(count);
        group.throughput(Throughput::Bytes(doc.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &doc, |b, doc| {
            b.iter(|| parse_document(black_box(doc)).unwrap());
        });
    }
    group.finish();
}

fn bench_scan_tasks(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_tasks");
    for &count in &[10usize, 100, 1_000] {
        let doc = document_with_tasks(count);
        let parsed = parse_document(&doc).unwrap();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &parsed.content, |b, body| {
            b.iter(|| scan_tasks(black_box(body), WeekendPolicy::default()).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse_document, bench_scan_tasks);
criterion_main!(benches);
