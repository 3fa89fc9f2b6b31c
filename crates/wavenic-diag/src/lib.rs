//! Privileged diagnostic command executor for Wavenic WN7xxx wireless MACs.
//!
//! Sits between a user-mode diagnostic client and the device transport
//! layer: takes an opaque command buffer, decodes the opcode, performs
//! register / periphery / device-memory access or relays a firmware
//! command, and hands back an owned, exactly sized response buffer.
//! Unsolicited firmware events flow the other way, through
//! [`DiagExecutor::forward_event`].
//!
//! Transport framing, firmware image handling, power management, and PCI
//! probing belong to the surrounding driver; this crate consumes them
//! through the [`Transport`] trait.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use wavenic_diag::{
//!     DeviceContext, DeviceIdentity, DiagExecutor, FeatureSet, FirmwareFeatures,
//!     NullSink, Opcode, SoftwareTransport,
//! };
//!
//! let transport = Arc::new(SoftwareTransport::new());
//! let identity = DeviceIdentity {
//!     device_id: u32::from(wavenic_chip::pcie::device_id::WN7100),
//!     vendor_id: u32::from(wavenic_chip::pcie::VENDOR_ID),
//!     silicon_step: 1,
//!     firmware_version: 0x2A00_0000,
//!     build_version: 0,
//!     driver_version: "wavenic 0.3.0".into(),
//! };
//! let firmware = FirmwareFeatures {
//!     major: 42,
//!     minor: 0,
//!     capa_flags: 0,
//!     api: FeatureSet::new(64),
//!     capa: FeatureSet::new(64),
//! };
//! let executor = DiagExecutor::new(DeviceContext::new(
//!     transport,
//!     identity,
//!     firmware,
//!     Arc::new(NullSink),
//! ));
//!
//! let info = executor.execute(Opcode::DeviceInfo.raw(), &[]).unwrap();
//! assert!(!info.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod context;
mod error;
mod events;
mod executor;
mod hcmd;
mod info;
mod memory;
mod registers;
mod response;
mod transport;
pub mod transports;
pub mod wire;

pub use context::{DeviceContext, DeviceIdentity, FeatureSet, FirmwareFeatures};
pub use error::{DiagError, Result};
pub use events::{EventSink, NullSink, FW_EVENT_NOTIFICATION};
pub use executor::{DiagExecutor, Opcode};
pub use response::Response;
pub use transport::{
    FirmwareCommand, FirmwareReply, HwAccessGuard, HwAccessToken, LivenessGuard,
    LivenessToken, Transport,
};
pub use transports::{PcieTransport, SoftwareTransport};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        DeviceContext, DeviceIdentity, DiagError, DiagExecutor, EventSink, FeatureSet,
        FirmwareFeatures, NullSink, Opcode, Response, Result, SoftwareTransport, Transport,
    };
}
