use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hpcc_client::HpccResult;
use hpcc_client::ecl::{LiteralTable, RecordSchema, TypePolicy};
use hpcc_client::gateway::{EclGateway, EclOutput, RunOptions, ScriptSource};
use hpcc_client::spray::{SprayOptions, Sprayer};
use hpcc_client::types::{DataSet, DataType, Field, Schema, Value};

/// Accepts every script without doing anything.
struct NullCluster;

impl EclGateway for NullCluster {
    fn run(&self, _script: ScriptSource<'_>, _options: &RunOptions) -> HpccResult<EclOutput> {
        Ok(EclOutput::default())
    }
}

fn dataset(rows: usize) -> DataSet {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64),
        Field::new("name", DataType::Utf8),
        Field::new("score", DataType::Float64),
        Field::new("active", DataType::Bool),
    ]);
    let rows = (0..rows)
        .map(|i| {
            vec![
                Value::Int64(i as i64),
                Value::Utf8(format!("O'Name {i}")),
                if i % 10 == 0 { Value::Null } else { Value::Float64(i as f64 * 0.5) },
                Value::Bool(i % 2 == 0),
            ]
        })
        .collect();
    DataSet::new(schema, rows)
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    for rows in [1_000usize, 50_000] {
        let ds = dataset(rows);
        group.throughput(Throughput::Elements(rows as u64));
        for policy in [TypePolicy::StringOnly, TypePolicy::Inferred] {
            let schema = RecordSchema::derive(&ds, policy);
            group.bench_with_input(BenchmarkId::new(format!("{policy:?}"), rows), &ds, |b, ds| {
                b.iter(|| {
                    let table = LiteralTable::prepare(black_box(ds), &schema);
                    black_box(table.serialize_all())
                })
            });
        }
    }
    group.finish();
}

fn bench_chunked_spray(c: &mut Criterion) {
    let ds = dataset(50_000);
    let mut group = c.benchmark_group("chunked_spray");
    group.throughput(Throughput::Elements(ds.row_count() as u64));
    for chunk_size in [1_000usize, 10_000] {
        let sprayer = Sprayer::new(
            NullCluster,
            SprayOptions {
                chunk_size,
                max_workers: 4,
                ..Default::default()
            },
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &ds, |b, ds| {
            b.iter(|| black_box(sprayer.spray_dataset(ds, "bench::target").unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_serialize, bench_chunked_spray);
criterion_main!(benches);
