//! One user's working state, passed explicitly to every action.

use std::str::FromStr;

use cutsheet_contracts::events::EventLog;
use cutsheet_contracts::request::{GenerationParams, GenerationRequest};
use cutsheet_contracts::{CutsheetError, Result};
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde_json::{json, Map, Value};

use crate::archive::{assemble, ArchiveBundle};
use crate::config::ClientConfig;
use crate::fal::FalClient;
use crate::remote::RemoteImageService;
use crate::selection::Selection;
use crate::tiler::{decode_image, tile, TileSet};

/// The uploaded photo. Only jpg, png and webp are accepted.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

impl SourceImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&bytes)
            .map_err(|err| CutsheetError::config(format!("unrecognized source image: {err}")))?;
        let mime = match format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
            other => {
                return Err(CutsheetError::config(format!(
                    "unsupported source format {other:?} (use jpg, png or webp)"
                )))
            }
        };
        let (width, height) = decode_image(&bytes)?.dimensions();
        Ok(Self {
            bytes,
            mime,
            width,
            height,
        })
    }
}

/// Composite returned by the generation API, kept with its original bytes.
#[derive(Debug, Clone)]
pub struct CompositeImage {
    pub bytes: Vec<u8>,
    pub image: DynamicImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityMode {
    #[default]
    Plain,
    Upscale,
}

impl FromStr for QualityMode {
    type Err = CutsheetError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "plain" | "original" => Ok(Self::Plain),
            "upscale" | "upscaled" => Ok(Self::Upscale),
            other => Err(CutsheetError::config(format!(
                "unsupported quality mode '{other}' (expected plain or upscale)"
            ))),
        }
    }
}

pub struct SessionContext {
    remote: Box<dyn RemoteImageService>,
    events: EventLog,
    source: Option<SourceImage>,
    composite: Option<CompositeImage>,
    tiles: Option<TileSet>,
    selection: Selection,
}

impl SessionContext {
    pub fn new(remote: Box<dyn RemoteImageService>, events: EventLog) -> Self {
        events.record(
            "session_started",
            map_object(json!({"credentials": remote.has_credentials()})),
        );
        Self {
            remote,
            events,
            source: None,
            composite: None,
            tiles: None,
            selection: Selection::new(),
        }
    }

    pub fn with_fal(config: ClientConfig, events: EventLog) -> Result<Self> {
        Ok(Self::new(Box::new(FalClient::new(config)?), events))
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn composite(&self) -> Option<&CompositeImage> {
        self.composite.as_ref()
    }

    pub fn tiles(&self) -> Option<&TileSet> {
        self.tiles.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn select_all(&mut self) {
        self.selection = Selection::all();
    }

    pub fn load_source(&mut self, bytes: Vec<u8>) -> Result<&SourceImage> {
        let source = SourceImage::from_bytes(bytes)?;
        self.events.record(
            "source_loaded",
            map_object(json!({
                "mime": source.mime,
                "width": source.width,
                "height": source.height,
                "bytes": source.bytes.len(),
            })),
        );
        Ok(&*self.source.insert(source))
    }

    /// Upload the source, generate a composite, fetch and tile it.
    ///
    /// Config problems are reported before any network call. Any later
    /// failure leaves the previous composite, tiles and selection untouched.
    pub fn generate(&mut self, params: GenerationParams) -> Result<&TileSet> {
        let Some(source) = self.source.as_ref() else {
            return Err(CutsheetError::config("no source image loaded"));
        };
        if !self.remote.has_credentials() {
            return Err(CutsheetError::config("FAL_KEY (or FAL_API_KEY) not set"));
        }

        self.events.record(
            "generation_started",
            map_object(json!({
                "resolution": params.resolution.as_str(),
                "aspect_ratio": params.aspect_ratio.as_str(),
            })),
        );
        let (composite, tiles) = match self.run_generation(source, params) {
            Ok(result) => result,
            Err(err) => {
                self.events.record(
                    "generation_failed",
                    map_object(json!({
                        "error_kind": err.kind(),
                        "error": err.to_string(),
                    })),
                );
                return Err(err);
            }
        };

        let (width, height) = composite.image.dimensions();
        self.events.record(
            "generation_finished",
            map_object(json!({"width": width, "height": height})),
        );
        self.commit(composite, tiles)
    }

    /// Tile an already generated composite without touching the network.
    pub fn load_composite(&mut self, bytes: Vec<u8>) -> Result<&TileSet> {
        let image = decode_image(&bytes)?;
        let tiles = tile(&image)?;
        self.commit(CompositeImage { bytes, image }, tiles)
    }

    fn run_generation(
        &self,
        source: &SourceImage,
        params: GenerationParams,
    ) -> Result<(CompositeImage, TileSet)> {
        let uploaded = self.remote.upload(&source.bytes, source.mime)?;
        self.events.record(
            "upload_finished",
            map_object(json!({"inline": uploaded.starts_with("data:")})),
        );
        let request = GenerationRequest::contact_sheet(vec![uploaded], params)?;
        let composite_url = self.remote.generate(&request)?;
        let bytes = self.remote.fetch(&composite_url)?;
        let image = decode_image(&bytes)?;
        let tiles = tile(&image)?;
        Ok((CompositeImage { bytes, image }, tiles))
    }

    fn commit(&mut self, composite: CompositeImage, tiles: TileSet) -> Result<&TileSet> {
        let (width, height) = tiles.source_dimensions();
        self.events.record(
            "tiles_ready",
            map_object(json!({
                "width": width,
                "height": height,
                "tiles": tiles
                    .iter()
                    .map(|tile| json!({
                        "index": tile.index,
                        "label": tile.shot.code,
                        "bounds": [tile.bounds.left, tile.bounds.top, tile.bounds.right, tile.bounds.bottom],
                    }))
                    .collect::<Vec<_>>(),
            })),
        );
        self.composite = Some(composite);
        self.selection.clear();
        Ok(&*self.tiles.insert(tiles))
    }

    /// Build the ZIP for the current selection.
    ///
    /// `Upscale` without a configured key degrades to original quality with a
    /// warning rather than failing.
    pub fn download(&self, mode: QualityMode) -> Result<ArchiveBundle> {
        let Some(tiles) = self.tiles.as_ref() else {
            return Err(CutsheetError::config("nothing generated yet"));
        };
        let mut skipped_upscale = false;
        let upscaler = match mode {
            QualityMode::Upscale if self.remote.has_credentials() => Some(self.remote.as_ref()),
            QualityMode::Upscale => {
                skipped_upscale = true;
                None
            }
            QualityMode::Plain => None,
        };
        if skipped_upscale && !self.selection.is_empty() {
            self.events.record(
                "upscale_skipped",
                map_object(json!({"reason": "no API key configured"})),
            );
        }

        let mut bundle = assemble(tiles, &self.selection, upscaler, &self.events)?;
        if skipped_upscale {
            bundle.warnings.insert(
                0,
                "upscale requested but no API key is configured; using original quality"
                    .to_string(),
            );
        }
        Ok(bundle)
    }
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use cutsheet_contracts::events::EventLog;
    use cutsheet_contracts::request::{AspectRatio, GenerationParams};
    use image::{DynamicImage, ImageFormat, RgbaImage};

    use super::{QualityMode, SessionContext};
    use crate::testing::{sample_composite_png, FakeRemote};

    fn session_with(remote: &FakeRemote) -> anyhow::Result<SessionContext> {
        Ok(SessionContext::new(
            Box::new(remote.clone()),
            EventLog::in_memory("session-test"),
        ))
    }

    fn photo_png() -> Vec<u8> {
        sample_composite_png(64, 48)
    }

    #[test]
    fn generate_without_key_makes_no_network_calls() -> anyhow::Result<()> {
        let remote = FakeRemote::without_key();
        let mut session = session_with(&remote)?;
        session.load_source(photo_png())?;

        let err = session.generate(GenerationParams::default()).unwrap_err();
        assert_eq!(err.kind(), "config");
        assert_eq!(remote.calls().total(), 0);
        assert!(session.tiles().is_none());
        Ok(())
    }

    #[test]
    fn generate_without_source_is_a_config_error() -> anyhow::Result<()> {
        let remote = FakeRemote::with_key();
        let mut session = session_with(&remote)?;
        let err = session.generate(GenerationParams::default()).unwrap_err();
        assert_eq!(err.kind(), "config");
        assert_eq!(remote.calls().total(), 0);
        Ok(())
    }

    #[test]
    fn generate_uploads_generates_fetches_and_tiles() -> anyhow::Result<()> {
        let remote = FakeRemote::with_key();
        remote.serve_composite(sample_composite_png(300, 168));
        let mut session = session_with(&remote)?;
        session.load_source(photo_png())?;

        let params = GenerationParams {
            aspect_ratio: AspectRatio::Square,
            ..GenerationParams::default()
        };
        let tiles = session.generate(params)?;
        assert_eq!(tiles.len(), 9);
        assert_eq!(tiles.source_dimensions(), (300, 168));

        let calls = remote.calls();
        assert_eq!((calls.upload, calls.generate, calls.fetch), (1, 1, 1));
        let requests = remote.generation_requests();
        assert_eq!(requests[0].image_urls, vec!["mem://upload/1"]);
        assert_eq!(requests[0].aspect_ratio, AspectRatio::Square);

        let types = session.events().event_types();
        let expected = [
            "session_started",
            "source_loaded",
            "generation_started",
            "upload_finished",
            "generation_finished",
            "tiles_ready",
        ];
        assert_eq!(types, expected);
        Ok(())
    }

    #[test]
    fn failed_generation_keeps_previous_tiles() -> anyhow::Result<()> {
        let remote = FakeRemote::with_key();
        remote.serve_composite(sample_composite_png(90, 90));
        let mut session = session_with(&remote)?;
        session.load_source(photo_png())?;
        session.generate(GenerationParams::default())?;
        session.selection_mut().insert(2)?;

        remote.fail_generation();
        let err = session.generate(GenerationParams::default()).unwrap_err();
        assert_eq!(err.kind(), "network");
        assert_eq!(
            session.tiles().map(|tiles| tiles.source_dimensions()),
            Some((90, 90))
        );
        assert!(session.selection().contains(2));
        assert!(session
            .events()
            .event_types()
            .contains(&"generation_failed".to_string()));
        Ok(())
    }

    #[test]
    fn generation_error_survives_an_unwritable_event_log() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory")?;
        let events = EventLog::with_file(blocker.join("events.jsonl"), "session-test");

        let remote = FakeRemote::with_key();
        remote.fail_generation();
        let mut session = SessionContext::new(Box::new(remote.clone()), events);
        session.load_source(photo_png())?;

        let err = session.generate(GenerationParams::default()).unwrap_err();
        assert_eq!(err.kind(), "network");
        assert!(session
            .events()
            .event_types()
            .contains(&"generation_failed".to_string()));
        Ok(())
    }

    #[test]
    fn undecodable_composite_is_a_decode_error() -> anyhow::Result<()> {
        let remote = FakeRemote::with_key();
        remote.serve_composite(b"<html>error page</html>".to_vec());
        let mut session = session_with(&remote)?;
        session.load_source(photo_png())?;

        let err = session.generate(GenerationParams::default()).unwrap_err();
        assert_eq!(err.kind(), "decode");
        assert!(session.tiles().is_none());
        assert!(session.composite().is_none());
        Ok(())
    }

    #[test]
    fn new_generation_clears_selection() -> anyhow::Result<()> {
        let remote = FakeRemote::with_key();
        remote.serve_composite(sample_composite_png(60, 60));
        let mut session = session_with(&remote)?;
        session.load_source(photo_png())?;
        session.generate(GenerationParams::default())?;
        session.select_all();
        assert_eq!(session.selection().len(), 9);

        session.generate(GenerationParams::default())?;
        assert!(session.selection().is_empty());
        Ok(())
    }

    #[test]
    fn download_requires_tiles_and_selection() -> anyhow::Result<()> {
        let remote = FakeRemote::with_key();
        let mut session = session_with(&remote)?;
        assert_eq!(
            session.download(QualityMode::Plain).unwrap_err().kind(),
            "config"
        );

        session.load_composite(sample_composite_png(30, 30))?;
        assert_eq!(
            session.download(QualityMode::Plain).unwrap_err().kind(),
            "config"
        );
        assert_eq!(remote.calls().total(), 0);
        Ok(())
    }

    #[test]
    fn upscale_download_with_key_upscales_every_selected_tile() -> anyhow::Result<()> {
        let remote = FakeRemote::with_key();
        let mut session = session_with(&remote)?;
        session.load_composite(sample_composite_png(60, 45))?;
        session.selection_mut().insert(7)?;
        session.selection_mut().insert(1)?;

        let bundle = session.download(QualityMode::Upscale)?;
        let names: Vec<&str> = bundle.entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["cut_02_LS_upscaled.png", "cut_08_Low-angle_upscaled.png"]);
        assert!(bundle.warnings.is_empty());
        let calls = remote.calls();
        assert_eq!((calls.upload, calls.upscale, calls.fetch), (2, 2, 2));
        Ok(())
    }

    #[test]
    fn upscale_download_without_key_degrades_to_plain() -> anyhow::Result<()> {
        let remote = FakeRemote::without_key();
        let mut session = session_with(&remote)?;
        session.load_composite(sample_composite_png(60, 45))?;
        session.selection_mut().insert(0)?;

        let bundle = session.download(QualityMode::Upscale)?;
        assert_eq!(bundle.entries[0].name, "cut_01_ELS.png");
        assert_eq!(bundle.warnings.len(), 1);
        assert_eq!(remote.calls().total(), 0);
        Ok(())
    }

    #[test]
    fn unsupported_source_format_is_rejected() -> anyhow::Result<()> {
        let remote = FakeRemote::with_key();
        let mut session = session_with(&remote)?;
        let mut bmp = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(RgbaImage::new(4, 4)).write_to(&mut bmp, ImageFormat::Bmp)?;

        let err = session.load_source(bmp.into_inner()).unwrap_err();
        assert_eq!(err.kind(), "config");
        assert!(session.source().is_none());
        Ok(())
    }

    #[test]
    fn quality_mode_parses_shell_values() -> anyhow::Result<()> {
        assert_eq!("upscale".parse::<QualityMode>()?, QualityMode::Upscale);
        assert_eq!("Plain".parse::<QualityMode>()?, QualityMode::Plain);
        assert!("hd".parse::<QualityMode>().is_err());
        Ok(())
    }
}
