use criterion::{black_box, criterion_group, criterion_main, Criterion};
use devtool_assistant::analysis::{build_chunks, parse_digest};
use devtool_assistant::ingest::{ingest_directory, IngestOptions};

fn synthetic_digest(file_count: usize, lines_per_file: usize) -> String {
    let separator = "=".repeat(48);
    let mut digest = format!(
        "Repository: synthetic\nFiles analyzed: {}\n\nDirectory structure:\n",
        file_count
    );
    for i in 0..file_count {
        digest.push_str(&format!(
            "\n{sep}\nFile: src/feature_{:03}/file_{:05}.py\n{sep}\n",
            i % 120,
            i,
            sep = separator
        ));
        for line in 0..lines_per_file {
            digest.push_str(&format!("def f_{i}_{line}(x):\n    return x * {line}\n"));
        }
    }
    digest
}

fn bench_parse_digest(c: &mut Criterion) {
    let digest = synthetic_digest(2_000, 20);
    c.bench_function("parse_digest_2000_files", |b| {
        b.iter(|| {
            let files = parse_digest(black_box(&digest));
            black_box(files.len());
        });
    });
}

fn bench_build_chunks(c: &mut Criterion) {
    let mut digest = synthetic_digest(2_000, 20);
    // One oversized file forces the line-splitting path
    digest.push_str(&synthetic_digest(1, 5_000));
    let files = parse_digest(&digest);

    c.bench_function("build_chunks_6000_budget", |b| {
        b.iter(|| {
            let chunks = build_chunks(black_box(&files), 6_000);
            black_box(chunks.len());
        });
    });
}

fn bench_ingest_directory(c: &mut Criterion) {
    let temp = tempfile::tempdir().expect("tempdir");
    let src_dir = temp.path().join("src");
    std::fs::create_dir_all(&src_dir).expect("create src");
    for i in 0..500 {
        let path = src_dir.join(format!("file_{i:04}.py"));
        std::fs::write(path, format!("def f{i}():\n    return {i}\n"))
            .expect("write synthetic source");
    }
    let options = IngestOptions::default();

    c.bench_function("ingest_directory_500_files", |b| {
        b.iter(|| {
            let digest = ingest_directory(temp.path(), "synthetic", &options)
                .expect("ingest should succeed");
            black_box(digest.file_count);
        });
    });
}

criterion_group!(
    perf_core,
    bench_parse_digest,
    bench_build_chunks,
    bench_ingest_directory
);
criterion_main!(perf_core);
