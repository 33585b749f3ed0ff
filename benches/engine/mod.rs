use criterion::{Criterion, Throughput};
use nanoshell::logging::hex_dump_to;
use nanoshell::marshal::{parse, ParamType, ScalarType};
use nanoshell::registry::{Descriptor, Registry};
use nanoshell::session::Shell;
use nanoshell::token::tokenize;

fn ok_handler(_argc: usize, _argv: &[&str]) -> i32 {
    0
}

fn drop_output(data: &[u8]) -> usize {
    data.len()
}

static TABLE: &[Descriptor] = &[
    Descriptor::command("status", "Show device status", ok_handler),
    Descriptor::command("reboot", "Restart the device", ok_handler),
];

pub fn bench_tokenize(c: &mut Criterion) {
    let line = "upload \"some file.bin\" 0x8000 [1,2,3,4] -17";
    let mut group = c.benchmark_group("tokenize");
    group.throughput(Throughput::Bytes(line.len() as u64));
    group.bench_function("quoted_line", |b| {
        b.iter(|| tokenize(std::hint::black_box(line)))
    });
    group.finish();
}

pub fn bench_parse_number(c: &mut Criterion) {
    let registry = Registry::empty();
    let mut group = c.benchmark_group("parse");
    group.bench_function("hex_u32", |b| {
        b.iter(|| parse(std::hint::black_box("0xDEADBEEF"), ParamType::U32, &registry))
    });
    group.bench_function("float", |b| {
        b.iter(|| parse(std::hint::black_box("3.14159"), ParamType::Float, &registry))
    });
    group.bench_function("i32_array", |b| {
        b.iter(|| {
            parse(
                std::hint::black_box("[1,2,3,4,5,6,7,8]"),
                ParamType::Array(ScalarType::I32),
                &registry,
            )
        })
    });
    group.finish();
}

pub fn bench_feed_line(c: &mut Criterion) {
    let line = b"status\r";
    let mut group = c.benchmark_group("feed");
    group.throughput(Throughput::Bytes(line.len() as u64));
    group.bench_function("dispatch_line", |b| {
        let mut shell = Shell::new(Registry::new(TABLE));
        shell.set_output_function(drop_output);
        b.iter(|| shell.input(std::hint::black_box(line)))
    });
    group.finish();
}

pub fn bench_hex_dump(c: &mut Criterion) {
    let data = [0x5Au8; 256];
    let mut group = c.benchmark_group("hex_dump");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("256_bytes", |b| {
        b.iter(|| {
            let mut out = String::with_capacity(2048);
            hex_dump_to(&mut out, 0x2000_0000, std::hint::black_box(&data))
        })
    });
    group.finish();
}
