//! Command dispatch.
//!
//! The single entry point for diagnostic commands: takes a liveness
//! reference on the device, routes by opcode to exactly one handler, and
//! releases the reference on every path out.

use bytes::Bytes;
use tracing::debug;

use crate::context::DeviceContext;
use crate::error::{DiagError, Result};
use crate::response::Response;
use crate::transport::LivenessGuard;
use crate::{events, hcmd, info, memory, registers};

/// Stable opcode identifiers for the diagnostic commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    /// Relay an opaque firmware command.
    HostCommand = 1,
    /// Execute an ordered register read/write batch.
    RegisterAccess = 2,
    /// Write a byte range of device memory or periphery space.
    MemoryWrite = 3,
    /// Read a byte range of device memory or periphery space.
    MemoryRead = 4,
    /// Report the device identity snapshot.
    DeviceInfo = 5,
    /// Report the firmware version/capability snapshot.
    FirmwareInfo = 6,
}

impl Opcode {
    /// Decode a raw opcode; `None` for anything unrecognized.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::HostCommand),
            2 => Some(Self::RegisterAccess),
            3 => Some(Self::MemoryWrite),
            4 => Some(Self::MemoryRead),
            5 => Some(Self::DeviceInfo),
            6 => Some(Self::FirmwareInfo),
            _ => None,
        }
    }

    /// The wire value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// The diagnostic command executor for one device.
#[derive(Debug)]
pub struct DiagExecutor {
    ctx: DeviceContext,
}

impl DiagExecutor {
    /// Wrap a device context.
    #[must_use]
    pub const fn new(ctx: DeviceContext) -> Self {
        Self { ctx }
    }

    /// The underlying context.
    #[must_use]
    pub const fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    /// Execute one diagnostic command.
    ///
    /// Holds a device liveness reference for the duration of the call; the
    /// reference is taken exactly once and released on every path — handler
    /// success, handler failure, and unrecognized opcodes alike.
    ///
    /// # Errors
    ///
    /// Propagates the liveness refusal without routing; otherwise returns
    /// the handler's result. Unknown opcodes yield `NotSupported`.
    pub fn execute(&self, opcode: u32, request: &[u8]) -> Result<Response> {
        let ctx = &self.ctx;
        let _device = LivenessGuard::acquire(ctx.transport())?;

        let result = match Opcode::from_raw(opcode) {
            Some(Opcode::HostCommand) => hcmd::send_host_command(ctx, request),
            Some(Opcode::RegisterAccess) => registers::run_batch(ctx, request),
            Some(Opcode::MemoryWrite) => memory::indirect_write(ctx, request),
            Some(Opcode::MemoryRead) => memory::indirect_read(ctx, request),
            Some(Opcode::DeviceInfo) => info::device_info(ctx),
            Some(Opcode::FirmwareInfo) => info::firmware_info(ctx),
            None => Err(DiagError::NotSupported { opcode }),
        };

        if let Err(e) = &result {
            debug!(opcode, error = %e, "diagnostic command failed");
        }
        result
        // liveness reference released here, success or failure
    }

    /// Push one unsolicited firmware event toward the external channel.
    pub fn forward_event(&self, raw: &Bytes) {
        events::forward_fw_event(&self.ctx, raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for raw in 1..=6 {
            let op = Opcode::from_raw(raw).unwrap();
            assert_eq!(op.raw(), raw);
        }
        assert_eq!(Opcode::from_raw(0), None);
        assert_eq!(Opcode::from_raw(7), None);
        assert_eq!(Opcode::from_raw(u32::MAX), None);
    }
}
