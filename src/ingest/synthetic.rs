//! Synthetic frame source for `stub://` URLs.
//!
//! Produces a slowly changing gradient so downstream stages see distinct
//! frames. The source paces itself: polls arriving sooner than
//! `min_interval` after the previous frame return `Ok(None)`.

use anyhow::Result;
use std::time::{Duration, Instant};

use super::FrameSource;
use crate::frame::Frame;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Minimum spacing between produced frames (0.2s = 5 fps).
    pub min_interval: Duration,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://synthetic".to_string(),
            width: 640,
            height: 480,
            min_interval: Duration::from_millis(200),
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    scene_state: u8,
    last_emit: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        log::info!("SyntheticSource: opened {}", config.url);
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
            last_emit: None,
        }
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = Frame::rgb_len(self.config.width, self.config.height);
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        self.config.url.clone()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let now = Instant::now();
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.config.min_interval {
                return Ok(None);
            }
        }
        self.last_emit = Some(now);
        self.frame_count += 1;

        let pixels = self.generate_pixels();
        Ok(Some(Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )))
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
