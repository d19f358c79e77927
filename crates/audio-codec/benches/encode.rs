//! WAV encoding benchmarks.

use audio_codec::{WavCodec, WavEncoding};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use echo_core::AudioBuffer;

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for seconds in [1usize, 5, 15] {
        let len = seconds * 44_100;
        let samples: Vec<f32> = (0..len).map(|i| (i as f32 / 100.0).sin() * 0.5).collect();
        let buffer = AudioBuffer::mono(samples, 44_100);

        for encoding in [WavEncoding::Float32, WavEncoding::Pcm16] {
            let codec = WavCodec::new(encoding);
            group.bench_with_input(
                BenchmarkId::new(format!("{encoding:?}"), format!("{seconds}s")),
                &buffer,
                |b, buffer| b.iter(|| codec.encode_to_vec(black_box(buffer), 44_100)),
            );
        }
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let samples: Vec<f32> = (0..5 * 44_100).map(|i| (i as f32 / 50.0).cos() * 0.5).collect();
    let buffer = AudioBuffer::mono(samples, 44_100);
    let bytes = WavCodec::default()
        .encode_to_vec(&buffer, 44_100)
        .expect("encode");

    c.bench_function("decode_5s_float", |b| {
        b.iter(|| WavCodec::decode_slice(black_box(&bytes)))
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
