use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use thorwire::client::frame::frame;
use thorwire::protocol::{Array, ReadBuffer, WriteBuffer};
use thorwire::{Compression, FrameReader, Record, RecordBatch};

fn records(count: usize, size: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::new(Bytes::from(vec![7u8; size]))
                .with_key(Bytes::from(format!("key-{}", i)))
                .with_deltas(i as i32, i as i64)
        })
        .collect()
}

fn bench_record_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_codec");
    for size in [128usize, 1024usize, 4096usize] {
        let array = Array::new(records(100, size));
        group.throughput(Throughput::Bytes((100 * size) as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &array, |b, array| {
            b.iter(|| {
                let mut buf = WriteBuffer::with_capacity(100 * (size + 16));
                buf.write(array).unwrap();
                buf.freeze()
            });
        });

        let mut buf = WriteBuffer::new();
        buf.write(&array).unwrap();
        let encoded = buf.freeze();
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut read = ReadBuffer::new(encoded.clone());
                let decoded: Array<Record> = read.read().unwrap();
                assert_eq!(decoded.items().len(), 100);
            });
        });
    }
    group.finish();
}

fn bench_batch_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_roundtrip");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let payload = records(200, 512);
    group.throughput(Throughput::Elements(payload.len() as u64));

    for codec in Compression::ALL {
        let batch = RecordBatch::new(0, 0, payload.clone(), codec);
        group.bench_with_input(BenchmarkId::from_parameter(codec), &batch, |b, batch| {
            b.iter(|| {
                rt.block_on(async {
                    let mut buf = WriteBuffer::new();
                    batch.serialize(&mut buf).await.unwrap();
                    let mut read = ReadBuffer::new(buf.freeze());
                    RecordBatch::deserialize(&mut read).await.unwrap()
                })
            });
        });
    }
    group.finish();
}

fn bench_frame_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_reader");
    let mut wire = Vec::new();
    for i in 0..1000 {
        wire.extend_from_slice(&frame(format!("response-{}", i).as_bytes()).unwrap());
    }
    group.throughput(Throughput::Bytes(wire.len() as u64));

    for chunk in [64usize, 1500usize, 16384usize] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut reader = FrameReader::default();
                let mut frames = 0;
                for piece in wire.chunks(chunk) {
                    reader.push(piece);
                    while reader.next_frame().unwrap().is_some() {
                        frames += 1;
                    }
                }
                assert_eq!(frames, 1000);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_record_codec,
    bench_batch_compression,
    bench_frame_reassembly
);
criterion_main!(benches);
