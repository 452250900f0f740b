//! Criterion benchmark for parsing `adb devices` output.
//!
//! Run with:
//! ```bash
//! cargo bench --package droid-remote-core --bench device_list_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use droid_remote_core::device::parse_device_list;

fn listing(devices: usize) -> String {
    let mut out = String::from("List of devices attached\n");
    for i in 0..devices {
        out.push_str(&format!("192.168.1.{}:5555\tdevice\n", i % 254 + 1));
    }
    out
}

fn bench_parse_device_list(c: &mut Criterion) {
    let small = listing(4);
    let large = listing(256);

    c.bench_function("parse_device_list_4", |b| {
        b.iter(|| parse_device_list(black_box(&small)))
    });
    c.bench_function("parse_device_list_256", |b| {
        b.iter(|| parse_device_list(black_box(&large)))
    });
}

criterion_group!(benches, bench_parse_device_list);
criterion_main!(benches);
