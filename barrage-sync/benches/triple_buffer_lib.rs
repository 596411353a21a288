use barrage_sync::triple_buffer::buffer;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

pub fn benchmark(c: &mut Criterion) {
    let (mut reader, mut editor) = buffer::<u8>(0);
    {
        let mut uncontended = c.benchmark_group("uncontended");
        uncontended.bench_function("read output", |b| {
            b.iter(|| {
                black_box(*reader.front());
            });
        });
        uncontended.bench_function("clean update", |b| {
            b.iter(|| {
                black_box(reader.acquire());
            });
        });
        uncontended.bench_function("write input", |b| {
            b.iter(|| {
                *editor.back_mut() = black_box(0);
            });
        });
        uncontended.bench_function("publish", |b| {
            b.iter(|| {
                editor.publish();
            });
        });
        uncontended.bench_function("publish + dirty update", |b| {
            b.iter(|| {
                editor.publish();
                black_box(reader.acquire());
            });
        });
        uncontended.bench_function("transmit", |b| {
            b.iter(|| {
                *editor.back_mut() = black_box(0);
                editor.publish();
                black_box(*reader.latest());
            });
        });
    }

    {
        let mut read_contended = c.benchmark_group("read contention");
        testbench::run_under_contention(
            || black_box(*reader.latest()),
            || {
                read_contended.bench_function("write input", |b| {
                    b.iter(|| {
                        *editor.back_mut() = black_box(0);
                    })
                });
                read_contended.bench_function("send", |b| {
                    b.iter(|| {
                        *editor.back_mut() = black_box(0);
                        editor.publish();
                    })
                });
            },
        );
    }

    {
        let mut write_contended = c.benchmark_group("write contention");
        testbench::run_under_contention(
            || {
                *editor.back_mut() = black_box(0);
                editor.publish();
            },
            || {
                write_contended.bench_function("update", |b| {
                    b.iter(|| {
                        black_box(reader.acquire());
                    })
                });
                write_contended.bench_function("receive", |b| {
                    b.iter(|| {
                        black_box(*reader.latest());
                    })
                });
            },
        );
    }
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
