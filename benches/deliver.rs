use criterion::{criterion_group, criterion_main, Criterion};
use edgefirst_evs::{
    camera::{BufferDesc, Camera, FrameSink},
    error::Result,
    image::{self, Image},
    stream::StreamHandler,
};
use std::{
    hint::black_box,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Camera that accepts everything and only counts returned frames.
#[derive(Default)]
struct NullCamera {
    returned: AtomicUsize,
}

impl Camera for NullCamera {
    fn id(&self) -> &str {
        "null"
    }

    fn set_max_frames_in_flight(&self, _count: u32) -> Result<()> {
        Ok(())
    }

    fn start_video_stream(&self, _sink: Arc<dyn FrameSink>) -> Result<()> {
        Ok(())
    }

    fn stop_video_stream(&self) {}

    fn done_with_frame(&self, _frame: BufferDesc) {
        self.returned.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn benchmark_deliver(c: &mut Criterion) {
    let camera = Arc::new(NullCamera::default());
    let handler = StreamHandler::new(camera.clone());
    handler.start_stream().unwrap();
    let image = Arc::new(Image::new(640, 480, image::YUYV).unwrap());

    let mut id = 0u32;
    c.bench_function("deliver/replace_ready", |b| {
        b.iter(|| {
            id = id.wrapping_add(1);
            handler.deliver_frame(Some(BufferDesc::new(id, image.clone())));
        })
    });

    c.bench_function("deliver/get_done", |b| {
        b.iter(|| {
            id = id.wrapping_add(1);
            handler.deliver_frame(Some(BufferDesc::new(id, image.clone())));
            let frame = handler.get_new_frame().unwrap();
            handler.done_with_frame(black_box(&frame)).unwrap();
        })
    });

    black_box(camera.returned.load(Ordering::Relaxed));
}

criterion_group!(benches, benchmark_deliver);
criterion_main!(benches);
