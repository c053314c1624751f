pub mod error;
pub mod events;
pub mod prompt;
pub mod request;
pub mod shots;

pub use error::{CutsheetError, Result};
