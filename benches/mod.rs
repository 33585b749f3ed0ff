use criterion::{criterion_group, criterion_main};

mod engine;

criterion_group!(
    benches,
    engine::bench_tokenize,
    engine::bench_parse_number,
    engine::bench_feed_line,
    engine::bench_hex_dump
);
criterion_main!(benches);
