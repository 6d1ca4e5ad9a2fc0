//! Frame ingestion sources.
//!
//! A source is polled by exactly one worker. `next_frame` returning `Ok(None)`
//! means "no new frame yet", never end-of-stream; the worker simply tries again
//! on its next iteration.
//!
//! Only the synthetic `stub://` source ships with the crate. Real decoders
//! (RTSP, USB, files) are external and plug in through `FrameSource`.

pub mod synthetic;

use anyhow::{anyhow, Result};
use std::time::Duration;

use crate::frame::Frame;

pub use synthetic::{SyntheticConfig, SyntheticSource};

/// A pollable source of decoded frames.
pub trait FrameSource: Send {
    /// Human-readable location (URL or path) for logs.
    fn describe(&self) -> String;

    /// Poll for the next frame. Blocks only the calling worker.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn frames_captured(&self) -> u64;
}

/// Open a source by URL. Only `stub://` is understood here.
pub fn open_url(url: &str, min_interval: Duration) -> Result<Box<dyn FrameSource>> {
    if url.trim().is_empty() {
        return Err(anyhow!("source url is empty"));
    }
    if url.starts_with("stub://") {
        let source = SyntheticSource::new(SyntheticConfig {
            url: url.to_string(),
            min_interval,
            ..SyntheticConfig::default()
        });
        return Ok(Box::new(source));
    }
    let scheme = url.split("://").next().unwrap_or(url);
    Err(anyhow!(
        "no frame decoder registered for '{}' (scheme '{}')",
        url,
        scheme
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_stub_urls_only() {
        let source = open_url("stub://crib", Duration::ZERO).expect("stub source");
        assert_eq!(source.describe(), "stub://crib");

        let err = open_url("rtsp://10.0.0.4/stream", Duration::ZERO)
            .err()
            .expect("rtsp unsupported");
        assert!(err.to_string().contains("rtsp"));

        assert!(open_url("  ", Duration::ZERO).is_err());
    }
}
