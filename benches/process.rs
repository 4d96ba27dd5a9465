use criterion::{criterion_group, criterion_main, Criterion};
use edgefirst_eis::{
    EisConfig, EisState, Image, ImageDef, ImageFormat, Mode, Scratch, Settings, Stabilizer,
};

pub fn benchmark_process(c: &mut Criterion) {
    let fmts = [ImageFormat::Nv12, ImageFormat::Yuv422];
    let modes = [Mode::Off, Mode::PassThrough, Mode::On];
    let threads = [1, 2, 4, 8];

    for fmt in fmts.iter() {
        let in_def = ImageDef::new(*fmt, 1920, 1080);
        let out_def = ImageDef::new(*fmt, 1600, 900);
        let mut src = Image::new(in_def.width, in_def.height, *fmt);
        for (i, px) in src.as_slice_mut().iter_mut().enumerate() {
            *px = (i.wrapping_mul(2654435761) >> 7) as u8;
        }
        let mut dst = Image::new(out_def.width, out_def.height, *fmt);
        let mut scratch = Scratch::new();

        let mut group = c.benchmark_group(format!("process/{}", fmt));
        for n_thread in threads.iter() {
            let config = EisConfig {
                n_thread: *n_thread,
                ..Default::default()
            };
            let mut eis = EisState::new();
            eis.init(&config, &in_def, &out_def).unwrap();

            for mode in modes.iter() {
                let settings = Settings {
                    mode: *mode,
                    ..Default::default()
                };
                group.bench_function(format!("{:?}-{}", mode, n_thread), |b| {
                    b.iter(|| {
                        eis.process(&src.desc(), &mut dst.desc_mut(), &settings, &mut scratch)
                            .unwrap()
                    })
                });
            }

            eis.finalize().unwrap();
        }
        group.finish();
    }
}

criterion_group!(benches, benchmark_process);
criterion_main!(benches);
