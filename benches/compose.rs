use criterion::{criterion_group, criterion_main, Criterion};
use cdp_compositor::backend::Font8x8;
use cdp_compositor::compositor::{Compositor, HeadlessBackend, Renderer};
use cdp_compositor::config::Config;
use cdp_compositor::protocol::Request;
use cdp_compositor::server::{self, Incoming};
use std::io::Write;
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;

fn bench_full_frame_composition(c: &mut Criterion) {
    let mut config = Config::default();
    config.display.width = 1920;
    config.display.height = 1080;

    let mut state = Compositor::new(&config);
    state.spawn_demo_windows();

    let (stream, _peer) = UnixStream::pair().expect("socket pair");
    let client = server::accept_client(&mut state, stream).expect("accept client");

    let (width, height) = (640u32, 480u32);
    let mut shm = tempfile::tempfile().expect("shm file");
    let pixels: Vec<u8> = (0..width * height)
        .flat_map(|i| (0x0040_0000 | (i & 0xFFFF)).to_ne_bytes())
        .collect();
    shm.write_all(&pixels).expect("fill shm");

    let requests = [
        (Request::CreateSurface { x: 600, y: 300, width: width as i32, height: height as i32 }, None),
        (
            Request::AttachBuffer { surface: 1, width, height, stride: width * 4, format: 0 },
            Some(OwnedFd::from(shm)),
        ),
        (Request::Commit { surface: 1 }, None),
    ];
    for (request, fd) in requests {
        server::handle_request(&mut state, client, Incoming { request, fd });
    }

    let mut backend = HeadlessBackend::allocate(1920, 1080).expect("backend");
    let mut renderer = Renderer::new(Box::new(Font8x8));

    c.bench_function("compose_1080p_frame", |b| {
        b.iter(|| {
            state.add_full_damage();
            renderer.render(&mut state, &mut backend).expect("render frame");
        })
    });
}

criterion_group!(benches, bench_full_frame_composition);
criterion_main!(benches);
