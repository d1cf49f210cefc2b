//! Headless drivers and the outer loop
//!
//! Frames and samples are consumed and dropped; on-screen messages go to
//! the log. The loop runs until the host quits, restarting once per `EXEC`
//! request.

use anyhow::{Context, Result};
use retrohost_core::drivers::{NullMenu, VideoConfig};
use retrohost_core::input::NullInput;
use retrohost_core::plugin::VideoFrame;
use retrohost_core::{AudioDriver, Drivers, Host, TickResult, VideoDriver};
use retrohost_shared::PixelFormat;

#[derive(Debug, Default)]
pub struct HeadlessVideo {
    frames: u64,
    last_message: Option<String>,
}

impl HeadlessVideo {
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl VideoDriver for HeadlessVideo {
    fn name(&self) -> &str {
        "headless"
    }

    fn init(&mut self, config: &VideoConfig) -> bool {
        tracing::debug!(
            width = config.geometry.base_width,
            height = config.geometry.base_height,
            "Headless video"
        );
        true
    }

    fn frame(&mut self, _frame: &VideoFrame<'_>, _format: PixelFormat) -> bool {
        self.frames += 1;
        true
    }

    fn message(&mut self, text: &str) {
        if self.last_message.as_deref() != Some(text) {
            tracing::debug!(target: "retrohost::osd", "{text}");
            self.last_message = Some(text.to_string());
        }
    }

    // No pixels are kept to read back.
    fn supports_screenshot(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct HeadlessAudio;

impl AudioDriver for HeadlessAudio {
    fn name(&self) -> &str {
        "headless"
    }

    fn init(&mut self, sample_rate: f64) -> bool {
        tracing::debug!(sample_rate, "Headless audio");
        true
    }

    fn start(&mut self) -> bool {
        true
    }

    fn stop(&mut self) -> bool {
        true
    }

    fn write(&mut self, samples: &[i16]) -> usize {
        samples.len() / 2
    }
}

pub fn drivers() -> Drivers {
    Drivers::new(
        Box::new(HeadlessVideo::default()),
        Box::new(HeadlessAudio),
        Box::new(NullInput),
        Box::new(NullMenu),
    )
}

/// Init the host and tick it until it quits. Returns the frames run.
pub fn run(host: &mut Host) -> Result<u64> {
    host.init().context("Failed to start core")?;
    let mut frames = 0;
    loop {
        while host.tick() != TickResult::Quit {}
        frames += host.frame_count();

        let next = host.exec_content().cloned();
        host.shutdown();
        let Some(content) = next else {
            break;
        };
        tracing::info!(content = %content.display(), "Restarting with new content");
        host.ctx.launch.content = Some(content);
        host.ctx.runloop = Default::default();
        host.init().context("Failed to restart core")?;
    }
    Ok(frames)
}
