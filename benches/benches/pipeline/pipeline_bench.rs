use std::{hint::black_box, io::Cursor};

use adcp_core::{Pd0Builder, Pd0Data, Pd0Reader};
use adcp_processing::{
    Attitude, CoordinateTransformEngine, ProcessingConfig, Survey, VelocityField,
};
use adcp_types::CoordinateFrame;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const N_ENSEMBLES: usize = 2_000;

fn fixture(n_cells: u8) -> Vec<u8> {
    Pd0Builder::new(n_cells, 4)
        .with_bottom_track([1500; 4])
        .with_attitude(|e| (((e * 37) % 36_000) as u16, 150, -250))
        .build(N_ENSEMBLES)
        .unwrap()
}

fn decode(bytes: &[u8]) -> Pd0Data {
    Pd0Reader::new(Cursor::new(bytes))
        .unwrap()
        .read_all()
        .unwrap()
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(N_ENSEMBLES as u64));

    for n_cells in [20u8, 100] {
        let bytes = fixture(n_cells);
        group.bench_with_input(BenchmarkId::from_parameter(n_cells), &bytes, |b, bytes| {
            b.iter(|| black_box(decode(bytes)))
        });
    }

    group.finish();
}

fn bench_transform(c: &mut Criterion) {
    let data = decode(&fixture(50));
    let engine = CoordinateTransformEngine::new(
        &data.fixed_leader,
        Attitude::from_leaders(&data.variable_leaders),
    );
    let beam = VelocityField::from_raw(&data.velocity, CoordinateFrame::Beam).unwrap();

    let mut group = c.benchmark_group("transform");
    group.throughput(Throughput::Elements(N_ENSEMBLES as u64));

    for to in [CoordinateFrame::Instrument, CoordinateFrame::Ship, CoordinateFrame::Earth] {
        group.bench_with_input(BenchmarkId::from_parameter(to), &to, |b, &to| {
            b.iter(|| black_box(engine.transform(&beam, to).unwrap()))
        });
    }

    group.finish();
}

fn bench_survey(c: &mut Criterion) {
    let data = decode(&fixture(50));
    let mut config = ProcessingConfig::default();
    config.masking.velocity.bottom.enabled = true;

    c.bench_function("survey_earth_speed_and_backscatter", |b| {
        b.iter(|| {
            let mut survey = Survey::new(data.clone(), config.clone()).unwrap();
            let speed = survey.speed(CoordinateFrame::Earth).unwrap();
            let sv = survey.absolute_backscatter().unwrap();
            black_box((speed, sv))
        })
    });
}

criterion_group!(benches, bench_decode, bench_transform, bench_survey);
criterion_main!(benches);
