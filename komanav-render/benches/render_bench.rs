use criterion::{criterion_group, criterion_main, Criterion};

use komanav_core::{apply_padding, to_pixel_rect, PaddingConfig, Panel};
use komanav_render::{
    post_process, DocumentHost, RenderBuffer, RenderGateway, RenderRequest, RenderSettings,
};

/// Host that hands back a page-sized grey buffer for every request.
struct FlatHost;

impl DocumentHost for FlatHost {
    fn current_page(&self) -> u32 {
        1
    }

    fn page_count(&self) -> u32 {
        1
    }

    fn page_size(&self, _page: u32) -> Option<(u32, u32)> {
        Some((1072, 1448))
    }

    fn turn_page(&mut self, _delta: i32) -> bool {
        false
    }

    fn render(&mut self, request: &RenderRequest) -> Option<RenderBuffer> {
        let w = (request.rect.w * request.zoom).round() as u32;
        let h = (request.rect.h * request.zoom).round() as u32;
        Some(RenderBuffer::filled(w, h, [180, 180, 180, 255]))
    }
}

fn bench_post_process(c: &mut Criterion) {
    let source = RenderBuffer::filled(1072, 1448, [90, 140, 200, 255]);

    c.bench_function("post_process_1072x1448", |b| {
        b.iter(|| {
            let mut buffer = source.clone();
            post_process(&mut buffer, 1.3, 1.8, false, true)
        });
    });
}

fn bench_padding(c: &mut Criterion) {
    let config = PaddingConfig::default();
    let panels: Vec<Panel> = (0..64)
        .map(|i| {
            let f = i as f64 / 64.0;
            Panel::new(f * 0.5, f * 0.4, 0.2 + f * 0.3, 0.1 + f * 0.5)
        })
        .collect();

    c.bench_function("pixel_rect_and_padding_64", |b| {
        b.iter(|| {
            panels
                .iter()
                .map(|p| apply_padding(&to_pixel_rect(p, 1000, 1500), 1000, 1500, &config))
                .fold(0.0, |acc, r| acc + r.w)
        });
    });
}

fn bench_render_panel(c: &mut Criterion) {
    let gateway = RenderGateway::new(
        RenderSettings {
            contrast: 1.2,
            ..Default::default()
        },
        PaddingConfig::default(),
    );
    let mut host = FlatHost;
    let panel = Panel::new(0.084, 0.0, 0.857, 0.322);

    c.bench_function("render_panel_with_contrast", |b| {
        b.iter(|| gateway.render_panel(&mut host, 1, &panel));
    });
}

criterion_group!(benches, bench_post_process, bench_padding, bench_render_panel);
criterion_main!(benches);
