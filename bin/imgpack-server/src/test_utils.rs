//! Shared fixtures for handler tests.

use std::io::Cursor;
use std::sync::Arc;

use axum_test::TestServer;
use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::{DynamicImage, ExtendedColorType, ImageFormat, RgbaImage};
use tempfile::TempDir;

use crate::config::Config;
use crate::lifecycle::Phase;
use crate::routes;
use crate::state::AppState;

/// A running router over a throwaway data directory.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    _data_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Same as [`TestApp::new`], with `configure` applied to the defaults.
    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_data_dir(data_dir.path());
        configure(&mut config);
        let state = Arc::new(AppState::new(config));
        state.roots.ensure().unwrap();
        state.lifecycle.advance(Phase::Listening);

        let server = TestServer::new(routes::build(Arc::clone(&state))).unwrap();
        Self { server, state, _data_dir: data_dir }
    }
}

fn sample(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| image::Rgba([(x * 11) as u8, (y * 13) as u8, 200, 255]))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(sample(width, height))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// An ICO container with one square entry per side length.
pub fn ico_bytes(sides: &[u32]) -> Vec<u8> {
    let raw: Vec<(u32, Vec<u8>)> = sides.iter().map(|&s| (s, sample(s, s).into_raw())).collect();
    let frames: Vec<IcoFrame<'_>> = raw
        .iter()
        .map(|(s, px)| IcoFrame::as_png(px, *s, *s, ExtendedColorType::Rgba8).unwrap())
        .collect();
    let mut out = Vec::new();
    IcoEncoder::new(&mut out).encode_images(&frames).unwrap();
    out
}
