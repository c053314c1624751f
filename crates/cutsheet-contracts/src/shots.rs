//! Canonical shot labels for the nine panels, in row-major grid order.

pub const GRID_SIDE: usize = 3;
pub const TILE_COUNT: usize = GRID_SIDE * GRID_SIDE;

pub const ARCHIVE_MIME: &str = "application/zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shot {
    pub index: usize,
    /// Short display label, e.g. `MCU`.
    pub code: &'static str,
    /// `code` with path separators removed, safe inside an archive entry name.
    pub file_label: &'static str,
    pub title: &'static str,
}

pub const SHOTS: [Shot; TILE_COUNT] = [
    Shot {
        index: 0,
        code: "ELS",
        file_label: "ELS",
        title: "Extreme Long Shot",
    },
    Shot {
        index: 1,
        code: "LS",
        file_label: "LS",
        title: "Long Shot",
    },
    Shot {
        index: 2,
        code: "3/4",
        file_label: "3-4",
        title: "Medium Long Shot",
    },
    Shot {
        index: 3,
        code: "MS",
        file_label: "MS",
        title: "Medium Shot",
    },
    Shot {
        index: 4,
        code: "MCU",
        file_label: "MCU",
        title: "Medium Close-Up",
    },
    Shot {
        index: 5,
        code: "CU",
        file_label: "CU",
        title: "Close-Up",
    },
    Shot {
        index: 6,
        code: "ECU",
        file_label: "ECU",
        title: "Extreme Close-Up",
    },
    Shot {
        index: 7,
        code: "Low-angle",
        file_label: "Low-angle",
        title: "Low Angle Shot",
    },
    Shot {
        index: 8,
        code: "High-angle",
        file_label: "High-angle",
        title: "High Angle Shot",
    },
];

pub fn shot(index: usize) -> Option<&'static Shot> {
    SHOTS.get(index)
}

impl Shot {
    /// Archive entry name: `cut_05_MCU.png`, or `cut_05_MCU_upscaled.png`.
    pub fn entry_name(&self, upscaled: bool) -> String {
        let suffix = if upscaled { "_upscaled" } else { "" };
        format!(
            "cut_{:02}_{}{}.png",
            self.index + 1,
            self.file_label,
            suffix
        )
    }

    /// Human-facing caption, numbered from 1.
    pub fn caption(&self) -> String {
        format!("{}. {} ({})", self.index + 1, self.title, self.code)
    }
}

/// Download name offered for an archive holding `count` cuts.
pub fn bundle_name(count: usize) -> String {
    format!("nanobanana_cuts_{count}files.zip")
}
