use std::collections::BTreeSet;

use cutsheet_contracts::shots::TILE_COUNT;
use cutsheet_contracts::{CutsheetError, Result};

/// Tiles chosen for download, always iterated in ascending index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    indices: BTreeSet<usize>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            indices: (0..TILE_COUNT).collect(),
        }
    }

    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Result<Self> {
        let mut selection = Self::new();
        for index in indices {
            selection.insert(index)?;
        }
        Ok(selection)
    }

    /// Build from user-facing cut numbers (1..=9).
    pub fn from_one_based(numbers: &[usize]) -> Result<Self> {
        let mut selection = Self::new();
        for &number in numbers {
            if number == 0 || number > TILE_COUNT {
                return Err(CutsheetError::config(format!(
                    "cut number {number} out of range (1-{TILE_COUNT})"
                )));
            }
            selection.insert(number - 1)?;
        }
        Ok(selection)
    }

    pub fn insert(&mut self, index: usize) -> Result<bool> {
        check_index(index)?;
        Ok(self.indices.insert(index))
    }

    pub fn remove(&mut self, index: usize) -> bool {
        self.indices.remove(&index)
    }

    /// Flip one tile; returns whether it is selected afterwards.
    pub fn toggle(&mut self, index: usize) -> Result<bool> {
        check_index(index)?;
        if self.indices.remove(&index) {
            return Ok(false);
        }
        self.indices.insert(index);
        Ok(true)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }
}

fn check_index(index: usize) -> Result<()> {
    if index >= TILE_COUNT {
        return Err(CutsheetError::config(format!(
            "tile index {index} out of range (0-{})",
            TILE_COUNT - 1
        )));
    }
    Ok(())
}
