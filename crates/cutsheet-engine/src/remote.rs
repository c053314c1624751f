use cutsheet_contracts::request::{GenerationRequest, UpscaleRequest};
use cutsheet_contracts::Result;

/// The third-party calls one session needs.
///
/// Every method blocks until the provider answers or a client-side deadline
/// expires. Implementations must not retry.
pub trait RemoteImageService: Send + Sync {
    /// Store `bytes` somewhere the provider can read and return its URL.
    fn upload(&self, bytes: &[u8], mime: &str) -> Result<String>;

    /// Run a contact-sheet generation and return the composite image URL.
    fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Run one upscale job and return the upscaled image URL.
    fn upscale(&self, request: &UpscaleRequest) -> Result<String>;

    /// Plain GET of a result artifact.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// Whether a key is configured. Callers check this before any call so a
    /// missing key never costs a round-trip.
    fn has_credentials(&self) -> bool;
}
