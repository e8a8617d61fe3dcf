use std::net::SocketAddr;

use bacnet_controller::controller::{Controller, ControllerConfig};
use bacnet_controller::discovery::encode_i_am;
use bacnet_controller::encoding::{encode_character_string, encode_real, encode_unsigned, FrameWriter};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn encode_benchmark(c: &mut Criterion) {
    c.bench_function("encode_primitives", |b| {
        b.iter(|| {
            let mut w = FrameWriter::with_capacity(64);
            encode_unsigned(&mut w, black_box(65_536)).unwrap();
            encode_real(&mut w, black_box(21.5)).unwrap();
            encode_character_string(&mut w, black_box("Temperature")).unwrap();
            w.len()
        })
    });

    let config = ControllerConfig::default();
    c.bench_function("encode_i_am", |b| b.iter(|| encode_i_am(black_box(&config.device)).unwrap()));
}

fn dispatch_benchmark(c: &mut Criterion) {
    let mut controller = Controller::from_config(&ControllerConfig::default()).unwrap();
    let peer: SocketAddr = "192.168.1.10:47808".parse().unwrap();
    // ReadProperty AnalogInput:3 PresentValue
    let request = [
        0x81, 0x0A, 0x00, 0x0F, 0x01, 0x04, 0x10, 0x01, 0x0C, 0x00, 0x00, 0x00, 0x03, 0x21, 0x55,
    ];

    c.bench_function("dispatch_read_property", |b| {
        b.iter(|| controller.on_datagram(black_box(&request), peer))
    });
}

criterion_group!(benches, encode_benchmark, dispatch_benchmark);
criterion_main!(benches);
