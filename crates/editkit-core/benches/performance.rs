use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use editkit_core::{LayoutConfig, LayoutManager, LineStorage, TextDocument};

fn large_text(line_count: usize) -> String {
    let mut out = String::with_capacity(line_count * 64);
    for i in 0..line_count {
        out.push_str(&format!(
            "{i:06} the quick brown fox jumps over the lazy dog (editkit benchmark line)\n"
        ));
    }
    out.pop();
    out
}

fn bench_storage_build(c: &mut Criterion) {
    c.bench_function("line_storage/build_100k", |b| {
        b.iter(|| {
            let storage = LineStorage::build((0..100_000u32).map(|i| (i, 64, 16.0)));
            black_box(storage.length());
        })
    });
}

fn bench_storage_lookup(c: &mut Criterion) {
    let storage = LineStorage::build((0..100_000u32).map(|i| (i, 40 + (i as usize % 50), 16.0)));
    let length = storage.length();
    let height = storage.height();

    c.bench_function("line_storage/offset_and_y_lookup", |b| {
        let mut step = 0usize;
        b.iter(|| {
            step = (step + 7_919) % length;
            let by_offset = storage.get_line(black_box(step)).map(|line| line.index);
            let y = (step as f64 / length as f64) * height;
            let by_y = storage.get_line_at_y(black_box(y)).map(|line| line.index);
            black_box((by_offset, by_y));
        })
    });
}

fn bench_storage_churn(c: &mut Criterion) {
    c.bench_function("line_storage/insert_delete_1k", |b| {
        b.iter_batched(
            || LineStorage::build((0..50_000u32).map(|i| (i, 32, 16.0))),
            |mut storage| {
                for i in 0..1_000usize {
                    let index = (i * 37) % storage.count();
                    storage.insert_at_index(index, 0, 12, 16.0);
                    storage.delete_at_index((index + 1) % storage.count());
                }
                black_box(storage.count());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_layout_open(c: &mut Criterion) {
    let text = large_text(50_000);
    c.bench_function("layout/open_50k_lines", |b| {
        b.iter(|| {
            let layout = LayoutManager::new(black_box(&text), LayoutConfig::default());
            black_box(layout.line_count());
        })
    });
}

fn bench_typing_in_middle(c: &mut Criterion) {
    let text = large_text(50_000);
    c.bench_function("document/typing_middle_100", |b| {
        b.iter_batched(
            || {
                let mut document = TextDocument::new(&text);
                let middle = document.len_utf16() / 2;
                document.set_selections([middle..middle]);
                document
            },
            |mut document| {
                for i in 0..100 {
                    let text = if i % 10 == 9 { "\n" } else { "x" };
                    document.insert_text(text).unwrap();
                }
                black_box(document.line_count());
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_storage_build,
    bench_storage_lookup,
    bench_storage_churn,
    bench_layout_open,
    bench_typing_in_middle
);
criterion_main!(benches);
