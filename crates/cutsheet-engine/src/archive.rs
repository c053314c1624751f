//! Packs selected tiles into one in-memory ZIP, optionally upscaling each.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use cutsheet_contracts::events::EventLog;
use cutsheet_contracts::request::UpscaleRequest;
use cutsheet_contracts::shots::{bundle_name, ARCHIVE_MIME};
use cutsheet_contracts::{CutsheetError, Result};
use image::ImageFormat;
use serde_json::{json, Map, Value};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::remote::RemoteImageService;
use crate::selection::Selection;
use crate::tiler::{decode_image, encode_png, Tile, TileSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntrySummary {
    pub index: usize,
    pub name: String,
    pub upscaled: bool,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct ArchiveBundle {
    /// Suggested download name, e.g. `nanobanana_cuts_3files.zip`.
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    pub entries: Vec<ArchiveEntrySummary>,
    /// One line per tile that fell back to its original quality.
    pub warnings: Vec<String>,
}

impl ArchiveBundle {
    pub fn upscaled_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.upscaled).count()
    }

    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Result of trying to upscale one tile. A fallback is not an error for the
/// archive as a whole.
#[derive(Debug)]
pub enum UpscaleOutcome {
    Upscaled(Vec<u8>),
    Fallback(CutsheetError),
}

/// Build the archive for `selection`.
///
/// An empty selection is rejected with a config error. When `upscaler` is
/// given every selected tile goes through upload, upscale and fetch; a
/// failure there keeps the original PNG for that tile and moves on. Only a
/// ZIP serialization failure aborts.
pub fn assemble(
    tiles: &TileSet,
    selection: &Selection,
    upscaler: Option<&dyn RemoteImageService>,
    events: &EventLog,
) -> Result<ArchiveBundle> {
    if selection.is_empty() {
        return Err(CutsheetError::config("nothing to archive: no cuts selected"));
    }
    let selected = selection
        .iter()
        .map(|index| {
            tiles
                .get(index)
                .ok_or_else(|| CutsheetError::config(format!("no tile at index {index}")))
        })
        .collect::<Result<Vec<&Tile>>>()?;

    events.record(
        "archive_started",
        map_object(json!({
            "count": selected.len(),
            "upscale": upscaler.is_some(),
            "indices": selection.iter().collect::<Vec<_>>(),
        })),
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries = Vec::with_capacity(selected.len());
    let mut warnings = Vec::new();

    for (position, tile) in selected.iter().enumerate() {
        let original = tile.to_png()?;
        let (bytes, upscaled) = match upscaler {
            Some(remote) => {
                events.record(
                    "upscale_started",
                    map_object(json!({
                        "index": tile.index,
                        "position": position + 1,
                        "total": selected.len(),
                    })),
                );
                match upscale_tile(remote, &original) {
                    UpscaleOutcome::Upscaled(bytes) => {
                        events.record(
                            "upscale_finished",
                            map_object(json!({"index": tile.index, "bytes": bytes.len()})),
                        );
                        (bytes, true)
                    }
                    UpscaleOutcome::Fallback(err) => {
                        let warning = format!(
                            "cut {} upscale failed, keeping original quality: {err}",
                            tile.index + 1
                        );
                        events.record(
                            "upscale_failed",
                            map_object(json!({
                                "index": tile.index,
                                "error_kind": err.kind(),
                                "error": err.to_string(),
                            })),
                        );
                        warnings.push(warning);
                        (original, false)
                    }
                }
            }
            None => (original, false),
        };

        let name = tile.shot.entry_name(upscaled);
        zip.start_file(name.as_str(), options)
            .map_err(|err| CutsheetError::Archive(format!("failed to start {name}: {err}")))?;
        zip.write_all(&bytes)
            .map_err(|err| CutsheetError::Archive(format!("failed to write {name}: {err}")))?;
        entries.push(ArchiveEntrySummary {
            index: tile.index,
            name,
            upscaled,
            size: bytes.len(),
        });
    }

    let bytes = zip
        .finish()
        .map_err(|err| CutsheetError::Archive(format!("failed to finish archive: {err}")))?
        .into_inner();
    let bundle = ArchiveBundle {
        file_name: bundle_name(entries.len()),
        mime: ARCHIVE_MIME,
        bytes,
        entries,
        warnings,
    };
    events.record(
        "archive_finished",
        map_object(json!({
            "file_name": bundle.file_name,
            "bytes": bundle.bytes.len(),
            "entries": bundle.entries.iter().map(|entry| entry.name.clone()).collect::<Vec<_>>(),
            "upscaled": bundle.upscaled_count(),
        })),
    );
    Ok(bundle)
}

pub fn upscale_tile(remote: &dyn RemoteImageService, png: &[u8]) -> UpscaleOutcome {
    match try_upscale(remote, png) {
        Ok(bytes) => UpscaleOutcome::Upscaled(bytes),
        Err(err) => UpscaleOutcome::Fallback(err),
    }
}

fn try_upscale(remote: &dyn RemoteImageService, png: &[u8]) -> Result<Vec<u8>> {
    let uploaded = remote.upload(png, "image/png")?;
    let result_url = remote.upscale(&UpscaleRequest::new(uploaded))?;
    let bytes = remote.fetch(&result_url)?;
    let decoded = decode_image(&bytes)?;
    if image::guess_format(&bytes).ok() == Some(ImageFormat::Png) {
        return Ok(bytes);
    }
    // Entries are always `.png`; re-encode whatever the provider sent.
    encode_png(&decoded)
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
