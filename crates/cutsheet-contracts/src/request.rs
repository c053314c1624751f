use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CutsheetError, Result};
use crate::prompt::CONTACT_SHEET_PROMPT;

pub const OUTPUT_FORMAT: &str = "png";
pub const UPSCALE_FACTOR: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    pub const ALL: [Resolution; 2] = [Resolution::OneK, Resolution::FourK];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::FourK => "4K",
        }
    }
}

impl FromStr for Resolution {
    type Err = CutsheetError;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|value| value.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                CutsheetError::config(format!(
                    "unsupported resolution '{trimmed}' (expected one of: 1K, 4K)"
                ))
            })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "auto")]
    Auto,
    #[default]
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "9:16")]
    Tall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 6] = [
        AspectRatio::Auto,
        AspectRatio::Wide,
        AspectRatio::Square,
        AspectRatio::Standard,
        AspectRatio::Portrait,
        AspectRatio::Tall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Wide => "16:9",
            Self::Square => "1:1",
            Self::Standard => "4:3",
            Self::Portrait => "3:4",
            Self::Tall => "9:16",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = CutsheetError;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|value| value.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                let expected = Self::ALL
                    .iter()
                    .map(|value| value.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                CutsheetError::config(format!(
                    "unsupported aspect ratio '{trimmed}' (expected one of: {expected})"
                ))
            })
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-chosen knobs for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationParams {
    pub resolution: Resolution,
    pub aspect_ratio: AspectRatio,
}

impl GenerationParams {
    pub fn parse(resolution: &str, aspect_ratio: &str) -> Result<Self> {
        Ok(Self {
            resolution: resolution.parse()?,
            aspect_ratio: aspect_ratio.parse()?,
        })
    }
}

/// Payload for the contact-sheet generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image_urls: Vec<String>,
    pub num_images: u32,
    pub aspect_ratio: AspectRatio,
    pub output_format: String,
    pub resolution: Resolution,
}

impl GenerationRequest {
    pub fn contact_sheet(image_urls: Vec<String>, params: GenerationParams) -> Result<Self> {
        if image_urls.iter().all(|url| url.trim().is_empty()) {
            return Err(CutsheetError::config(
                "generation needs at least one input image URL",
            ));
        }
        Ok(Self {
            prompt: CONTACT_SHEET_PROMPT.to_string(),
            image_urls,
            num_images: 1,
            aspect_ratio: params.aspect_ratio,
            output_format: OUTPUT_FORMAT.to_string(),
            resolution: params.resolution,
        })
    }
}

/// Payload for the upscale endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpscaleRequest {
    pub image_url: String,
    pub scale: u32,
}

impl UpscaleRequest {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            scale: UPSCALE_FACTOR,
        }
    }
}
