//! Video, audio and menu driver contracts
//!
//! Hardware backends are external to the host. Each concern is a trait with a
//! null implementation; [`Drivers`] owns the active set plus the state the
//! frame loop needs between ticks (the last video frame, the audio batch of
//! the current frame).

use retrohost_shared::{GameGeometry, HwContextType, PixelFormat, Rotation};

use crate::input::{Hotkeys, InputDriver, NullInput};
use crate::plugin::VideoFrame;

/// Parameters a video driver is (re)initialized with.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoConfig {
    pub geometry: GameGeometry,
    pub pixel_format: PixelFormat,
    pub rotation: Rotation,
    pub fullscreen: bool,
    /// Accelerated context requested by the core, if any.
    pub hw_context: Option<HwContextType>,
}

pub trait VideoDriver {
    fn name(&self) -> &str;

    fn init(&mut self, config: &VideoConfig) -> bool;

    fn deinit(&mut self) {}

    /// Present a frame. Returns false once the output is gone (window closed).
    fn frame(&mut self, frame: &VideoFrame<'_>, format: PixelFormat) -> bool;

    fn alive(&self) -> bool {
        true
    }

    fn has_focus(&self) -> bool {
        true
    }

    fn set_rotation(&mut self, _rotation: Rotation) -> bool {
        true
    }

    fn set_aspect_ratio(&mut self, _ratio: f32) {}

    fn set_fullscreen(&mut self, _fullscreen: bool) {}

    fn grab_mouse(&mut self, _grab: bool) {}

    /// On-screen message for the frame about to be presented.
    fn message(&mut self, _text: &str) {}

    /// Whether an accelerated context of this type can be provided.
    fn supports_hw_context(&self, _context: HwContextType) -> bool {
        false
    }

    /// Whether the presented frame may be read back for screenshots.
    fn supports_screenshot(&self) -> bool {
        true
    }
}

pub trait AudioDriver {
    fn name(&self) -> &str;

    fn init(&mut self, sample_rate: f64) -> bool;

    fn deinit(&mut self) {}

    fn start(&mut self) -> bool;

    fn stop(&mut self) -> bool;

    /// Write interleaved stereo samples; returns frames consumed.
    fn write(&mut self, samples: &[i16]) -> usize;

    fn set_nonblocking(&mut self, _nonblocking: bool) {}
}

/// The menu UI. Rendering is the driver's business; the host only tells it
/// when it opens, closes, and ticks.
pub trait MenuDriver {
    fn name(&self) -> &str;

    fn opened(&mut self) {}

    fn closed(&mut self) {}

    fn iterate(&mut self, _pressed: Hotkeys) {}
}

#[derive(Debug, Default)]
pub struct NullVideo;

impl VideoDriver for NullVideo {
    fn name(&self) -> &str {
        "null"
    }

    fn init(&mut self, _config: &VideoConfig) -> bool {
        true
    }

    fn frame(&mut self, _frame: &VideoFrame<'_>, _format: PixelFormat) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioDriver for NullAudio {
    fn name(&self) -> &str {
        "null"
    }

    fn init(&mut self, _sample_rate: f64) -> bool {
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

#[derive(Debug, Default)]
pub struct NullMenu;

impl MenuDriver for NullMenu {
    fn name(&self) -> &str {
        "null"
    }
}

/// Owned copy of the last frame the core produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pitch: usize,
    pub format: PixelFormat,
}

impl CachedFrame {
    pub fn view(&self) -> VideoFrame<'_> {
        VideoFrame {
            data: &self.data,
            width: self.width,
            height: self.height,
            pitch: self.pitch,
        }
    }
}

pub struct Drivers {
    pub video: Box<dyn VideoDriver>,
    pub audio: Box<dyn AudioDriver>,
    pub input: Box<dyn InputDriver>,
    pub menu: Box<dyn MenuDriver>,
    video_active: bool,
    audio_active: bool,
    audio_running: bool,
    cached: Option<CachedFrame>,
    /// Samples of the current frame, flushed by [`Drivers::flush_audio`].
    audio_batch: Vec<i16>,
    /// Play each frame's samples backwards (rewind).
    audio_reverse: bool,
}

impl Default for Drivers {
    fn default() -> Self {
        Self::new(
            Box::new(NullVideo),
            Box::new(NullAudio),
            Box::new(NullInput),
            Box::new(NullMenu),
        )
    }
}

impl Drivers {
    pub fn new(
        video: Box<dyn VideoDriver>,
        audio: Box<dyn AudioDriver>,
        input: Box<dyn InputDriver>,
        menu: Box<dyn MenuDriver>,
    ) -> Self {
        Self {
            video,
            audio,
            input,
            menu,
            video_active: false,
            audio_active: false,
            audio_running: false,
            cached: None,
            audio_batch: Vec::new(),
            audio_reverse: false,
        }
    }

    /// Bring video and audio up. Audio failing only disables audio; video
    /// failing is reported to the caller.
    pub fn init(&mut self, video: &VideoConfig, sample_rate: f64) -> bool {
        self.video_active = self.video.init(video);
        if !self.video_active {
            tracing::error!(driver = self.video.name(), "Failed to initialize video driver");
            return false;
        }

        self.audio_active = self.audio.init(sample_rate);
        if self.audio_active {
            self.audio_running = self.audio.start();
        } else {
            tracing::warn!(driver = self.audio.name(), "Failed to initialize audio driver; audio disabled");
        }

        tracing::info!(
            video = self.video.name(),
            audio = self.audio.name(),
            input = self.input.name(),
            width = video.geometry.base_width,
            height = video.geometry.base_height,
            format = video.pixel_format.name(),
            "Drivers initialized"
        );
        true
    }

    pub fn deinit(&mut self) {
        if self.audio_active {
            if self.audio_running {
                self.audio.stop();
            }
            self.audio.deinit();
        }
        if self.video_active {
            self.video.deinit();
        }
        self.video_active = false;
        self.audio_active = false;
        self.audio_running = false;
        self.audio_batch.clear();
    }

    pub fn video_active(&self) -> bool {
        self.video_active
    }

    pub fn audio_active(&self) -> bool {
        self.audio_active
    }

    /// False once an initialized video driver has lost its output.
    pub fn video_alive(&self) -> bool {
        !self.video_active || self.video.alive()
    }

    /// Present a core frame; `None` repeats the previous one.
    pub fn present(&mut self, frame: Option<VideoFrame<'_>>, format: PixelFormat) {
        if let Some(frame) = frame {
            match &mut self.cached {
                Some(cached) => {
                    cached.data.clear();
                    cached.data.extend_from_slice(frame.data);
                    cached.width = frame.width;
                    cached.height = frame.height;
                    cached.pitch = frame.pitch;
                    cached.format = format;
                }
                None => {
                    self.cached = Some(CachedFrame {
                        data: frame.data.to_vec(),
                        width: frame.width,
                        height: frame.height,
                        pitch: frame.pitch,
                        format,
                    });
                }
            }
        }
        self.present_cached();
    }

    /// Show the last frame again (pause, menu, netplay stall).
    pub fn present_cached(&mut self) {
        if !self.video_active {
            return;
        }
        if let Some(cached) = &self.cached {
            self.video.frame(&cached.view(), cached.format);
        }
    }

    pub fn cached_frame(&self) -> Option<&CachedFrame> {
        self.cached.as_ref()
    }

    pub fn clear_cached_frame(&mut self) {
        self.cached = None;
    }

    pub fn push_sample(&mut self, left: i16, right: i16) {
        self.audio_batch.push(left);
        self.audio_batch.push(right);
    }

    /// Queue interleaved stereo samples; returns frames accepted.
    pub fn push_samples(&mut self, samples: &[i16]) -> usize {
        let frames = samples.len() / 2;
        self.audio_batch.extend_from_slice(&samples[..frames * 2]);
        frames
    }

    /// Hand this frame's samples to the driver. Muted or stopped audio drops
    /// them.
    pub fn flush_audio(&mut self, muted: bool) {
        if self.audio_batch.is_empty() {
            return;
        }
        if self.audio_active && self.audio_running && !muted {
            if self.audio_reverse {
                let reversed: Vec<i16> = self
                    .audio_batch
                    .chunks_exact(2)
                    .rev()
                    .flatten()
                    .copied()
                    .collect();
                self.audio.write(&reversed);
            } else {
                self.audio.write(&self.audio_batch);
            }
        }
        self.audio_batch.clear();
    }

    /// Drop samples queued this frame.
    pub fn discard_audio(&mut self) {
        self.audio_batch.clear();
    }

    pub fn set_audio_reverse(&mut self, reverse: bool) {
        self.audio_reverse = reverse;
    }

    pub fn audio_reverse(&self) -> bool {
        self.audio_reverse
    }

    pub fn start_audio(&mut self) -> bool {
        if !self.audio_active {
            return false;
        }
        if !self.audio_running {
            self.audio_running = self.audio.start();
        }
        self.audio_running
    }

    pub fn stop_audio(&mut self) -> bool {
        if !self.audio_active {
            return false;
        }
        if self.audio_running && self.audio.stop() {
            self.audio_running = false;
        }
        !self.audio_running
    }

    pub fn audio_running(&self) -> bool {
        self.audio_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingAudio, RecordingVideo};

    fn config() -> VideoConfig {
        VideoConfig {
            geometry: GameGeometry::default(),
            pixel_format: PixelFormat::Xrgb8888,
            rotation: Rotation::Deg0,
            fullscreen: false,
            hw_context: None,
        }
    }

    fn drivers() -> (Drivers, RecordingVideo, RecordingAudio) {
        let video = RecordingVideo::default();
        let audio = RecordingAudio::default();
        let drivers = Drivers::new(
            Box::new(video.clone()),
            Box::new(audio.clone()),
            Box::new(NullInput),
            Box::new(NullMenu),
        );
        (drivers, video, audio)
    }

    #[test]
    fn test_dupe_frame_repeats_cached() {
        let (mut drivers, video, _) = drivers();
        assert!(drivers.init(&config(), 44100.0));

        let pixels = [1u8, 2, 3, 4];
        drivers.present(
            Some(VideoFrame {
                data: &pixels,
                width: 1,
                height: 1,
                pitch: 4,
            }),
            PixelFormat::Xrgb8888,
        );
        drivers.present(None, PixelFormat::Xrgb8888);

        assert_eq!(video.frames(), 2);
        assert_eq!(drivers.cached_frame().unwrap().data, pixels);
    }

    #[test]
    fn test_reverse_audio_flips_stereo_frames() {
        let (mut drivers, _, audio) = drivers();
        assert!(drivers.init(&config(), 44100.0));

        drivers.set_audio_reverse(true);
        drivers.push_samples(&[1, 2, 3, 4, 5, 6]);
        drivers.flush_audio(false);
        assert_eq!(audio.written(), vec![5, 6, 3, 4, 1, 2]);

        drivers.set_audio_reverse(false);
        drivers.push_sample(7, 8);
        drivers.flush_audio(false);
        assert_eq!(audio.written(), vec![5, 6, 3, 4, 1, 2, 7, 8]);
    }

    #[test]
    fn test_muted_and_stopped_audio_drop_samples() {
        let (mut drivers, _, audio) = drivers();
        assert!(drivers.init(&config(), 44100.0));

        drivers.push_sample(1, 1);
        drivers.flush_audio(true);
        assert!(drivers.stop_audio());
        drivers.push_sample(2, 2);
        drivers.flush_audio(false);
        assert!(audio.written().is_empty());

        assert!(drivers.start_audio());
        drivers.push_sample(3, 3);
        drivers.flush_audio(false);
        assert_eq!(audio.written(), vec![3, 3]);
    }

    #[test]
    fn test_odd_sample_count_truncated() {
        let (mut drivers, _, _) = drivers();
        assert_eq!(drivers.push_samples(&[1, 2, 3]), 1);
    }
}
