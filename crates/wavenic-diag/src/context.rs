//! Shared per-device state handed to every handler.
//!
//! No ambient globals: everything a handler may touch — the transport, the
//! identity snapshot, firmware feature sets, the event sink, and the coarse
//! serialization lock — travels in one [`DeviceContext`].

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::events::EventSink;
use crate::transport::Transport;

/// Static identity of the device this context fronts, captured at
/// construction from driver-held state.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    /// Hardware device ID.
    pub device_id: u32,
    /// PCIe vendor ID.
    pub vendor_id: u32,
    /// Silicon stepping.
    pub silicon_step: u32,
    /// Running firmware version word.
    pub firmware_version: u32,
    /// Driver build version.
    pub build_version: u32,
    /// Human-readable driver version string.
    pub driver_version: String,
}

/// A set of supported feature indices out of a fixed total, reported as a
/// bitmap rounded up to whole 32-bit words.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    total: u32,
    enabled: BTreeSet<u32>,
}

impl FeatureSet {
    /// An empty set over `total` feature indices.
    #[must_use]
    pub const fn new(total: u32) -> Self {
        Self {
            total,
            enabled: BTreeSet::new(),
        }
    }

    /// Build a set over `total` indices with the given indices enabled;
    /// out-of-range indices are ignored.
    pub fn with_enabled(total: u32, enabled: impl IntoIterator<Item = u32>) -> Self {
        Self {
            total,
            enabled: enabled.into_iter().filter(|&i| i < total).collect(),
        }
    }

    /// Mark a feature index supported. Out-of-range indices are ignored.
    pub fn set(&mut self, index: u32) {
        if index < self.total {
            self.enabled.insert(index);
        }
    }

    /// Whether the feature index is supported.
    #[must_use]
    pub fn has(&self, index: u32) -> bool {
        self.enabled.contains(&index)
    }

    /// Total number of feature indices the bitmap covers.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.total
    }

    /// Bitmap length in bytes, rounded up to whole words.
    #[must_use]
    pub const fn bitmap_len(&self) -> usize {
        4 * (self.total.div_ceil(32) as usize)
    }
}

/// Firmware version and capability snapshot.
#[derive(Debug, Clone)]
pub struct FirmwareFeatures {
    /// Firmware major version.
    pub major: u32,
    /// Firmware minor version.
    pub minor: u32,
    /// Raw capability flags word.
    pub capa_flags: u32,
    /// Supported API feature indices.
    pub api: FeatureSet,
    /// Supported capability feature indices.
    pub capa: FeatureSet,
}

/// Everything one device's diagnostic handlers share.
#[derive(Debug)]
pub struct DeviceContext {
    transport: Arc<dyn Transport>,
    identity: DeviceIdentity,
    firmware: FirmwareFeatures,
    events: Arc<dyn EventSink>,
    /// Serializes register batches, memory accesses, and firmware-command
    /// sends from this core against each other. Never held across a call
    /// boundary.
    op_lock: Mutex<()>,
}

impl DeviceContext {
    /// Assemble a context from its collaborators.
    pub fn new(
        transport: Arc<dyn Transport>,
        identity: DeviceIdentity,
        firmware: FirmwareFeatures,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transport,
            identity,
            firmware,
            events,
            op_lock: Mutex::new(()),
        }
    }

    /// The transport this device talks through.
    #[must_use]
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Device identity snapshot.
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Firmware feature snapshot.
    #[must_use]
    pub fn firmware(&self) -> &FirmwareFeatures {
        &self.firmware
    }

    /// The external event delivery channel.
    #[must_use]
    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Take the device-wide serialization lock. A poisoned lock is taken
    /// anyway: the protected state is the device, not the mutex payload.
    pub(crate) fn lock_device(&self) -> MutexGuard<'_, ()> {
        self.op_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
