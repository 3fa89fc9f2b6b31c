//! Unsolicited firmware event forwarding.
//!
//! Firmware emits out-of-band packets at its own pace; the transport layer
//! pushes each one here, and this module repackages it for the external
//! delivery channel. Forwarding is fire-and-forget — a failed delivery is
//! logged, never retried.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::context::DeviceContext;
use crate::error::Result;
use crate::wire::FRAME_SIZE_MASK;

/// Notification identifier the external channel sees for forwarded
/// firmware events.
pub const FW_EVENT_NOTIFICATION: u32 = 0x40;

/// External delivery channel for unsolicited events.
pub trait EventSink: fmt::Debug + Send + Sync {
    /// Deliver one packaged event.
    ///
    /// # Errors
    ///
    /// Delivery failures propagate to the forwarder, which drops the event.
    fn deliver(&self, notification: u32, packet: Bytes) -> Result<()>;
}

/// A sink that discards everything, for contexts without an event channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn deliver(&self, _notification: u32, _packet: Bytes) -> Result<()> {
        Ok(())
    }
}

/// Forward one raw firmware packet to the event sink.
///
/// The packet's leading word carries the frame size, which does not count
/// the word itself — the forwarded slice is the frame plus those 4 bytes.
/// Slicing is the only adjustment; the payload is handed off zero-copy.
pub fn forward_fw_event(ctx: &DeviceContext, raw: &Bytes) {
    if raw.len() < 4 {
        warn!(len = raw.len(), "runt firmware event dropped");
        return;
    }

    let mut word = [0u8; 4];
    word.copy_from_slice(&raw[..4]);
    let frame_len = (u32::from_le_bytes(word) & FRAME_SIZE_MASK) as usize;
    let total = frame_len + 4;
    if raw.len() < total {
        warn!(
            declared = total,
            actual = raw.len(),
            "truncated firmware event dropped"
        );
        return;
    }

    let packet = raw.slice(..total);
    if let Err(e) = ctx.events().deliver(FW_EVENT_NOTIFICATION, packet) {
        debug!(error = %e, "event delivery failed, not retried");
    }
}
