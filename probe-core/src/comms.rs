//! Message bus between the probe and the ground.
//!
//! Sends are queued and delivered in order on `tick`, so a subscriber never
//! runs inside the sender's call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::error::{ProbeError, ProbeResult};

/// A routed payload between two named participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub sender: String,
    pub target: String,
    pub payload: Vec<u8>,
}

type Subscriber = Arc<dyn Fn(&Envelope) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<String, Subscriber>,
    queue: Vec<Envelope>,
}

/// Shared message bus. Clone is cheap; all clones share one queue.
#[derive(Clone, Default)]
pub struct MessageBus {
    inner: Arc<Mutex<BusInner>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the receiver for an id, replacing any previous one.
    pub fn subscribe(
        &self,
        id: impl Into<String>,
        receiver: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> ProbeResult<()> {
        let mut inner = self.inner.lock().map_err(|_| ProbeError::LockPoisoned)?;
        inner.subscribers.insert(id.into(), Arc::new(receiver));
        Ok(())
    }

    pub fn is_subscribed(&self, id: &str) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.subscribers.contains_key(id))
            .unwrap_or(false)
    }

    /// Queue a payload for delivery on the next tick.
    pub fn send(&self, sender: &str, target: &str, payload: &[u8]) -> ProbeResult<()> {
        debug!("bus send {} -> {} ({} bytes)", sender, target, payload.len());
        let mut inner = self.inner.lock().map_err(|_| ProbeError::LockPoisoned)?;
        inner.queue.push(Envelope {
            sender: sender.to_string(),
            target: target.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    /// Number of envelopes waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.inner.lock().map(|inner| inner.queue.len()).unwrap_or(0)
    }

    /// Deliver everything queued before this call. Returns the number
    /// delivered; envelopes without a subscriber are dropped and logged.
    pub fn tick(&self) -> ProbeResult<usize> {
        let pending = {
            let mut inner = self.inner.lock().map_err(|_| ProbeError::LockPoisoned)?;
            std::mem::take(&mut inner.queue)
        };

        let mut delivered = 0;
        for envelope in pending {
            let receiver = {
                let inner = self.inner.lock().map_err(|_| ProbeError::LockPoisoned)?;
                inner.subscribers.get(&envelope.target).cloned()
            };
            match receiver {
                Some(receiver) => {
                    (*receiver)(&envelope);
                    delivered += 1;
                }
                None => warn!(
                    "bus dropped {} bytes from {}: no subscriber for {}",
                    envelope.payload.len(),
                    envelope.sender,
                    envelope.target
                ),
            }
        }
        Ok(delivered)
    }
}

/// Expand an RGB332 frame into RGBA pixels.
///
/// Each byte is one pixel: bits 7..5 red, 4..2 green, 1..0 blue.
pub fn decode_rgb332(data: &[u8], width: usize, height: usize) -> ProbeResult<Vec<[u8; 4]>> {
    let pixels = width
        .checked_mul(height)
        .ok_or(ProbeError::FrameTooLarge { width, height })?;
    if data.len() != pixels {
        return Err(ProbeError::FrameSize {
            len: data.len(),
            width,
            height,
        });
    }
    let scale = |v: u8, max: u16| (u16::from(v) * 255 / max) as u8;
    Ok(data
        .iter()
        .map(|&b| [scale(b >> 5, 7), scale((b >> 2) & 0x07, 7), scale(b & 0x03, 3), 255])
        .collect())
}
