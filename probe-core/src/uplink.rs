//! Picture capture and transmission.

use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::comms::MessageBus;
use crate::config::FrameConfig;

/// Capture a picture and send it to `sender`. Assumed synchronous;
/// failures are the action's own business.
pub trait CaptureAction: Send {
    fn capture_and_send(&mut self, sender: &str);
}

/// Produces RGB332 frames, one byte per pixel.
pub trait FrameSource: Send {
    fn capture(&mut self, width: usize, height: usize) -> Vec<u8>;
}

impl<F> FrameSource for F
where
    F: FnMut(usize, usize) -> Vec<u8> + Send,
{
    fn capture(&mut self, width: usize, height: usize) -> Vec<u8> {
        self(width, height)
    }
}

/// Deterministic test pattern; shifts by one on every capture.
#[derive(Default)]
pub struct TestPattern {
    frame: u8,
}

impl FrameSource for TestPattern {
    fn capture(&mut self, width: usize, height: usize) -> Vec<u8> {
        let shift = self.frame;
        self.frame = self.frame.wrapping_add(1);
        let Some(pixels) = width.checked_mul(height) else {
            return Vec::new();
        };
        (0..pixels)
            .map(|i| {
                let (x, y) = (i % width.max(1), i / width.max(1));
                let r = (x * 8 / width.max(1)) as u8;
                let g = (y * 8 / height.max(1)) as u8;
                (r << 5) | ((g & 0x07) << 2) | (shift & 0x03)
            })
            .collect()
    }
}

/// Sends captured frames over the message bus from the probe's id.
pub struct CameraUplink<F: FrameSource> {
    probe_id: String,
    bus: MessageBus,
    frame: FrameConfig,
    source: F,
}

impl<F: FrameSource> CameraUplink<F> {
    pub fn new(probe_id: impl Into<String>, bus: MessageBus, frame: FrameConfig, source: F) -> Self {
        Self {
            probe_id: probe_id.into(),
            bus,
            frame,
            source,
        }
    }
}

impl<F: FrameSource> CaptureAction for CameraUplink<F> {
    fn capture_and_send(&mut self, sender: &str) {
        if let Err(e) = self.frame.pixel_count() {
            warn!("{} capture for {} skipped: {}", self.probe_id, sender, e);
            return;
        }
        let data = self.source.capture(self.frame.width, self.frame.height);
        match self.bus.send(&self.probe_id, sender, &data) {
            Ok(()) => info!("{} sent {} byte frame to {}", self.probe_id, data.len(), sender),
            Err(e) => warn!("{} frame to {} lost: {}", self.probe_id, sender, e),
        }
    }
}

/// Records the senders it was invoked for. Clones share one record.
#[derive(Clone, Default)]
pub struct RecordingCapture {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Senders in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CaptureAction for RecordingCapture {
    fn capture_and_send(&mut self, sender: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(sender.to_string());
        }
    }
}
