//! Cuts a composite contact sheet into its nine panels.
//!
//! Panels are `W/3` by `H/3` pixels (integer division). The last column and
//! the last row are clamped to the true image edge, so when a dimension is
//! not a multiple of three they absorb the one or two remainder pixels and
//! nothing is dropped.

use std::io::Cursor;

use cutsheet_contracts::shots::{Shot, GRID_SIDE, SHOTS, TILE_COUNT};
use cutsheet_contracts::{CutsheetError, Result};
use image::{DynamicImage, GenericImageView, ImageFormat};

/// Pixel region of one tile; `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl TileBounds {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn overlaps(&self, other: &TileBounds) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    pub index: usize,
    pub bounds: TileBounds,
    pub shot: &'static Shot,
    image: DynamicImage,
}

impl Tile {
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }
}

/// The nine tiles of one composite, in row-major order.
#[derive(Debug, Clone)]
pub struct TileSet {
    source_width: u32,
    source_height: u32,
    tiles: Vec<Tile>,
}

impl TileSet {
    pub fn get(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tile> {
        self.tiles.iter()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn source_dimensions(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }
}

impl<'a> IntoIterator for &'a TileSet {
    type Item = &'a Tile;
    type IntoIter = std::slice::Iter<'a, Tile>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.iter()
    }
}

/// Bounds of all nine tiles for a `width` x `height` image.
pub fn grid_bounds(width: u32, height: u32) -> Result<[TileBounds; TILE_COUNT]> {
    let side = GRID_SIDE as u32;
    if width < side || height < side {
        return Err(CutsheetError::decode(format!(
            "composite image {width}x{height} is smaller than the {side}x{side} grid"
        )));
    }
    let col_width = width / side;
    let row_height = height / side;
    let edge = |cell: u32, size: u32, full: u32| {
        if cell + 1 == side {
            full
        } else {
            (cell + 1) * size
        }
    };

    let mut bounds = [TileBounds {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    }; TILE_COUNT];
    for row in 0..side {
        for col in 0..side {
            bounds[(row * side + col) as usize] = TileBounds {
                left: col * col_width,
                top: row * row_height,
                right: edge(col, col_width, width),
                bottom: edge(row, row_height, height),
            };
        }
    }
    Ok(bounds)
}

pub fn tile(image: &DynamicImage) -> Result<TileSet> {
    let (width, height) = image.dimensions();
    let tiles = grid_bounds(width, height)?
        .into_iter()
        .zip(SHOTS.iter())
        .enumerate()
        .map(|(index, (bounds, shot))| Tile {
            index,
            bounds,
            shot,
            image: image.crop_imm(bounds.left, bounds.top, bounds.width(), bounds.height()),
        })
        .collect();
    Ok(TileSet {
        source_width: width,
        source_height: height,
        tiles,
    })
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|err| CutsheetError::decode(format!("not a decodable image: {err}")))
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|err| CutsheetError::decode(format!("PNG encode failed: {err}")))?;
    Ok(out.into_inner())
}
