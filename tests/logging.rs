use nanoshell::logging::{hex_dump_to, LogBroker, LogLevel, LogSink};

use std::fmt::Write;
use std::sync::{Mutex, MutexGuard, OnceLock};

static EVENTS: OnceLock<Mutex<Vec<String>>> = OnceLock::new();

static TEST_GUARD: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    TEST_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn events() -> &'static Mutex<Vec<String>> {
    EVENTS.get_or_init(|| Mutex::new(Vec::new()))
}

fn record(event: String) {
    events().lock().unwrap().push(event);
}

fn drain_events() -> Vec<String> {
    events().lock().unwrap().drain(..).collect()
}

fn sink_a(data: &[u8]) -> usize {
    record(format!("a:{}", String::from_utf8_lossy(data)));
    data.len()
}

fn sink_b(data: &[u8]) -> usize {
    record(format!("b:{}", String::from_utf8_lossy(data)));
    data.len()
}

fn lock_a() {
    record("lock".to_string());
}

fn unlock_a() {
    record("unlock".to_string());
}

const ADDR_DIGITS: usize = (usize::BITS / 4) as usize;

#[test]
fn sinks_filter_by_level() {
    let _guard = serial();
    drain_events();
    let mut broker = LogBroker::new();
    broker.register(LogSink::new(sink_a, LogLevel::Warning)).unwrap();
    broker.register(LogSink::new(sink_b, LogLevel::Verbose)).unwrap();

    broker.write(LogLevel::Error, "E");
    broker.write(LogLevel::Info, "I");

    assert_eq!(drain_events(), vec!["a:E", "b:E", "b:I"]);
}

#[test]
fn inactive_sinks_are_skipped() {
    let _guard = serial();
    drain_events();
    let mut broker = LogBroker::new();
    let index = broker.register(LogSink::new(sink_a, LogLevel::All)).unwrap();
    broker.set_active(index, false);
    broker.write(LogLevel::Error, "E");
    assert!(drain_events().is_empty());
}

#[test]
fn unregister_removes_by_callback() {
    let _guard = serial();
    drain_events();
    let mut broker = LogBroker::new();
    broker.register(LogSink::new(sink_a, LogLevel::All)).unwrap();
    assert_eq!(broker.sink_count(), 1);
    assert!(broker.unregister(sink_a));
    assert!(!broker.unregister(sink_a));
    assert_eq!(broker.sink_count(), 0);
}

#[test]
fn lock_hooks_bracket_the_broadcast() {
    let _guard = serial();
    drain_events();
    let mut broker = LogBroker::new();
    let mut sink = LogSink::new(sink_a, LogLevel::All);
    sink.lock = Some(lock_a);
    sink.unlock = Some(unlock_a);
    broker.register(sink).unwrap();

    broker.write(LogLevel::Info, "X");

    assert_eq!(drain_events(), vec!["lock", "a:X", "unlock"]);
}

#[test]
fn formatted_records_are_crlf_terminated() {
    let _guard = serial();
    drain_events();
    let mut broker = LogBroker::new();
    broker.register(LogSink::new(sink_a, LogLevel::All)).unwrap();
    broker.log(LogLevel::Info, format_args!("temp={}", 23));
    assert_eq!(drain_events(), vec!["a:temp=23\r\n"]);
}

#[test]
fn hex_dump_layout_matches_reference() {
    // 20 bytes claimed at 0x1004: first row starts at the aligned-down
    // 0x1000 with four placeholder columns, second row trails off after
    // byte 19.
    let data: Vec<u8> = (0u8..20).collect();
    let mut out = String::new();
    hex_dump_to(&mut out, 0x1004, &data).unwrap();

    let mut expected = String::new();
    write!(expected, "memory of 0x{:0w$x}, size: 20:\r\n", 0x1004usize, w = ADDR_DIGITS).unwrap();
    for _ in 0..(2 + ADDR_DIGITS + 2 - "Offset: ".len()) {
        expected.push(' ');
    }
    expected.push_str("Offset: 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F\r\n");
    write!(expected, "0x{:0w$x}: ", 0x1000usize, w = ADDR_DIGITS).unwrap();
    expected.push_str("            ");
    for byte in 0u8..12 {
        write!(expected, "{:02x} ", byte).unwrap();
    }
    expected.push_str("|     ............ |\r\n");
    write!(expected, "0x{:0w$x}: ", 0x1010usize, w = ADDR_DIGITS).unwrap();
    for byte in 12u8..20 {
        write!(expected, "{:02x} ", byte).unwrap();
    }
    expected.push_str("                        ");
    expected.push_str("| ........         |\r\n");

    assert_eq!(out, expected);
}

#[test]
fn hex_dump_shows_printable_ascii() {
    let mut out = String::new();
    hex_dump_to(&mut out, 0x2000, b"Hi!\x01").unwrap();
    assert!(out.contains("| Hi!."));
}

#[test]
fn aligned_single_row_has_no_placeholders() {
    let mut out = String::new();
    hex_dump_to(&mut out, 0x3000, &[0xAA; 16]).unwrap();
    let rows: Vec<&str> = out.split("\r\n").filter(|l| l.contains(": aa")).collect();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].contains("   aa"));
}
