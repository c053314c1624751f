//! In-memory `RemoteImageService` with call counters, for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cutsheet_contracts::request::{GenerationRequest, UpscaleRequest};
use cutsheet_contracts::{CutsheetError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use crate::remote::RemoteImageService;
use crate::tiler::{decode_image, encode_png, tile, TileSet};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub upload: usize,
    pub generate: usize,
    pub upscale: usize,
    pub fetch: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.upload + self.generate + self.upscale + self.fetch
    }
}

#[derive(Default)]
struct FakeState {
    has_key: bool,
    calls: CallCounts,
    blobs: HashMap<String, Vec<u8>>,
    composite: Vec<u8>,
    fail_generate: bool,
    fail_upscale_call: Option<usize>,
    garbage_upscales: bool,
    generation_requests: Vec<GenerationRequest>,
}

#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRemote {
    pub fn with_key() -> Self {
        let remote = Self::default();
        remote.state().has_key = true;
        remote
    }

    pub fn without_key() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake remote state")
    }

    pub fn serve_composite(&self, png: Vec<u8>) {
        self.state().composite = png;
    }

    pub fn fail_generation(&self) {
        self.state().fail_generate = true;
    }

    /// Make the `call`-th upscale (1-based) fail.
    pub fn fail_upscale_call(&self, call: usize) {
        self.state().fail_upscale_call = Some(call);
    }

    pub fn serve_garbage_upscales(&self) {
        self.state().garbage_upscales = true;
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn generation_requests(&self) -> Vec<GenerationRequest> {
        self.state().generation_requests.clone()
    }
}

impl RemoteImageService for FakeRemote {
    fn upload(&self, bytes: &[u8], _mime: &str) -> Result<String> {
        let mut state = self.state();
        state.calls.upload += 1;
        let url = format!("mem://upload/{}", state.calls.upload);
        state.blobs.insert(url.clone(), bytes.to_vec());
        Ok(url)
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut state = self.state();
        state.calls.generate += 1;
        state.generation_requests.push(request.clone());
        if state.fail_generate {
            return Err(CutsheetError::network("generation provider returned 500"));
        }
        let url = format!("mem://composite/{}", state.calls.generate);
        let composite = state.composite.clone();
        state.blobs.insert(url.clone(), composite);
        Ok(url)
    }

    fn upscale(&self, request: &UpscaleRequest) -> Result<String> {
        let mut state = self.state();
        state.calls.upscale += 1;
        let call = state.calls.upscale;
        if state.fail_upscale_call == Some(call) {
            return Err(CutsheetError::network("upscale provider unavailable"));
        }
        let url = format!("mem://upscaled/{call}");
        let bytes = if state.garbage_upscales {
            b"not an image".to_vec()
        } else {
            let source = state
                .blobs
                .get(&request.image_url)
                .cloned()
                .ok_or_else(|| CutsheetError::network("upscale input not uploaded"))?;
            let image = decode_image(&source)?;
            let (width, height) = image.dimensions();
            let scale = request.scale;
            encode_png(&image.resize_exact(width * scale, height * scale, FilterType::Nearest))?
        };
        state.blobs.insert(url.clone(), bytes);
        Ok(url)
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut state = self.state();
        state.calls.fetch += 1;
        state
            .blobs
            .get(url)
            .cloned()
            .ok_or_else(|| CutsheetError::network(format!("download of {url} failed (404)")))
    }

    fn has_credentials(&self) -> bool {
        self.state().has_key
    }
}

/// Composite whose nine panels each have a distinct flat colour.
pub fn sample_composite(width: u32, height: u32) -> DynamicImage {
    let (col, row) = ((width / 3).max(1), (height / 3).max(1));
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        let panel = (y / row).min(2) * 3 + (x / col).min(2);
        Rgba([(panel * 28) as u8, (255 - panel * 28) as u8, (x ^ y) as u8, 255])
    }))
}

pub fn sample_composite_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(&sample_composite(width, height)).expect("encode sample composite")
}

pub fn sample_tiles(width: u32, height: u32) -> Result<TileSet> {
    tile(&sample_composite(width, height))
}
