//! Bulk packet decode benchmark.
//!
//! Full-capacity packets are the worst case the load path has to handle
//! while holding the controller's state lock.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use vib_common::consts::{PACKET_FIELDS, PACKET_MAX_SIZE};
use vib_common::packet::PacketStore;

fn full_packet_text() -> String {
    let mut text = (PACKET_MAX_SIZE * PACKET_FIELDS).to_string();
    for i in 0..PACKET_MAX_SIZE {
        let intensity = if i % 2 == 0 { 5000 } else { 0 };
        text.push_str(&format!(" 10 {intensity} 1500 {}", u8::from(i % 3 == 0)));
    }
    text
}

fn full_packet_flat() -> Vec<i64> {
    let mut values = vec![(PACKET_MAX_SIZE * PACKET_FIELDS) as i64];
    for i in 0..PACKET_MAX_SIZE as i64 {
        values.extend_from_slice(&[10, (i % 2) * 5000, 1500, i % 3]);
    }
    values
}

fn bench_parse(c: &mut Criterion) {
    let text = full_packet_text();
    c.bench_function("packet_parse_text_full", |b| {
        b.iter(|| PacketStore::parse(black_box(&text)).unwrap())
    });

    let flat = full_packet_flat();
    c.bench_function("packet_from_flat_full", |b| {
        b.iter(|| PacketStore::from_flat(black_box(&flat)).unwrap())
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
