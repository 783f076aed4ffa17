//! Benchmark: frame traffic through the bus.
//!
//! A 64x32 frame is 6 KiB of pixels. Every worker pushes one per frame
//! interval and the render loop drains all routes once per iteration, so
//! both sides sit on the hot path.
//!
//! Measured:
//!
//! - `push_latest` into a mailbox with room, and into a full one where
//!   every push evicts the oldest frame
//! - one `MessageBus::poll` over 1, 4 and 16 busy workers

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mxos_event::WorkerMessage;
use mxos_runtime::bus::{BusConfig, Mailbox, MessageBus};
use mxos_types::{Dimensions, Frame, RegistrationId};

fn frame_message(sequence: u64) -> WorkerMessage {
    WorkerMessage::FrameReady {
        frame: Frame::blank(Dimensions::default()),
        sequence,
    }
}

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("mailbox_push");

    group.bench_function("with_room", |b| {
        let mailbox = Mailbox::new(4);
        let mut sequence = 0_u64;
        b.iter(|| {
            sequence += 1;
            black_box(mailbox.push_latest(frame_message(sequence), WorkerMessage::is_frame))
                .ok();
            mailbox.try_pop();
        });
    });

    group.bench_function("evicting", |b| {
        let mailbox = Mailbox::new(4);
        for sequence in 0..4 {
            mailbox
                .push_latest(frame_message(sequence), WorkerMessage::is_frame)
                .ok();
        }
        let mut sequence = 4_u64;
        b.iter(|| {
            sequence += 1;
            black_box(mailbox.push_latest(frame_message(sequence), WorkerMessage::is_frame))
                .ok();
        });
    });

    group.finish();
}

fn bench_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_poll");

    for workers in [1_u32, 4, 16] {
        let mut bus = MessageBus::new(BusConfig::default());
        let ports: Vec<_> = (1..=workers)
            .map(|n| bus.open(RegistrationId::new(n)))
            .collect();

        group.throughput(Throughput::Elements(u64::from(workers)));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            let mut sequence = 0_u64;
            b.iter(|| {
                sequence += 1;
                for port in &ports {
                    port.send(frame_message(sequence)).ok();
                }
                black_box(bus.poll())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_push, bench_poll);
criterion_main!(benches);
