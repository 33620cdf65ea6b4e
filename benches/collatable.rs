//! Encoding and decoding benchmarks for collatable keys.

use collatable::{encode, read_all, varint, Collatable, CollatableReader, Value};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn composite_key(id: i64) -> Collatable {
    let mut key = Collatable::new();
    key.begin_array()
        .add_str("user")
        .add_number(id)
        .add_bool(id % 2 == 0)
        .end_array();
    key
}

fn record(n: usize) -> Value {
    let items = (0..n)
        .map(|i| {
            Value::from(vec![
                (String::from("id"), Value::from(i as u64)),
                (String::from("name"), Value::from(format!("item-{}", i))),
                (String::from("tags"), Value::from(vec![Value::from("a"), Value::Null])),
            ])
        })
        .collect::<Vec<Value>>();
    Value::from(items)
}

fn bench_varint(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint");
    for (value, name) in [(0u64, "zero"), (300, "2_byte"), (u64::MAX, "max_u64")] {
        let mut encoded = Vec::new();
        varint::write_vec(&mut encoded, value);
        group.bench_with_input(BenchmarkId::new("write", name), &value, |b, &value| {
            let mut buf = [0u8; varint::MAX_VARINT_LEN];
            b.iter(|| varint::put(&mut buf, black_box(value)));
        });
        group.bench_with_input(BenchmarkId::new("get", name), &encoded[..], |b, data| {
            b.iter(|| varint::get(black_box(data)));
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.bench_function("composite_key", |b| {
        b.iter(|| composite_key(black_box(42)))
    });
    for n in [1usize, 100, 1000] {
        let value = record(n);
        group.bench_with_input(BenchmarkId::new("value", n), &value, |b, value| {
            let mut buf = Vec::new();
            b.iter(|| {
                buf.clear();
                encode(black_box(value), &mut buf);
                buf.len()
            });
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for n in [1usize, 100, 1000] {
        let bytes = Collatable::from(&record(n)).into_bytes();
        group.bench_with_input(BenchmarkId::new("read_all", n), &bytes[..], |b, data| {
            b.iter(|| read_all(black_box(data)));
        });
        group.bench_with_input(BenchmarkId::new("skip", n), &bytes[..], |b, data| {
            b.iter(|| {
                let mut reader = CollatableReader::new(black_box(data));
                reader.skip_value().is_ok()
            });
        });
    }
    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let low = composite_key(7);
    let high = composite_key(42);
    c.bench_function("compare_keys", |b| {
        b.iter(|| black_box(low.as_bytes()) < black_box(high.as_bytes()))
    });
}

criterion_group!(benches, bench_varint, bench_encode, bench_decode, bench_compare);
criterion_main!(benches);
