use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use cubesat_link::core::codec::{BinaryDecoder, BinaryEncoder};

fn telemetry_encoder(fields: usize) -> BinaryEncoder {
    let mut encoder = BinaryEncoder::new();
    for i in 0..fields {
        match i % 3 {
            0 => encoder.add_float(format!("sensor_{i}"), i as f64 * 0.25, false),
            1 => {
                let _ = encoder.add_int(format!("counter_{i}"), i as i64 * 1_000, None);
            }
            _ => {
                let _ = encoder.add_string(format!("status_{i}"), "nominal", None);
            }
        }
    }
    encoder
}

#[allow(clippy::unwrap_used)]
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("telemetry_codec");

    for &fields in &[8usize, 64, 256] {
        let mut encoder = telemetry_encoder(fields);
        let blob = encoder.to_bytes();
        let key_map = encoder.key_map();
        group.throughput(Throughput::Bytes(blob.len() as u64));

        group.bench_function(format!("encode_{fields}_fields"), |b| {
            b.iter_batched(
                || telemetry_encoder(fields),
                |mut encoder| encoder.to_bytes(),
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("decode_{fields}_fields"), |b| {
            b.iter(|| {
                let decoder = BinaryDecoder::new(&blob, Some(&key_map));
                assert_eq!(decoder.len(), fields);
            })
        });
    }

    group.bench_function("decode_without_key_map", |b| {
        let blob = telemetry_encoder(64).to_bytes();
        b.iter(|| BinaryDecoder::new(&blob, None))
    });

    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
