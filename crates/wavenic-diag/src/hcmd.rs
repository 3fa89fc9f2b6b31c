//! Firmware command relay.
//!
//! Forwards an opaque firmware command through the transport and, when the
//! caller asked for it, repackages the raw reply into a self-describing
//! envelope.

use tracing::debug;

use crate::context::DeviceContext;
use crate::error::{DiagError, Result};
use crate::response::Response;
use crate::transport::FirmwareCommand;
use crate::wire::{HostCmdRequest, HOST_CMD_HDR_LEN};

/// Relay a host command to the firmware.
///
/// The payload travels by reference — nothing is copied on the way down.
/// The send happens under the device-wide lock; only one firmware command
/// from this path is in flight at a time. The transport's retained reply
/// buffer is released on every path out of this function (drop).
///
/// # Errors
///
/// `InvalidArgument` for a malformed request, transport failures opaquely,
/// and `Transport` if a wanted reply was not retained.
pub fn send_host_command(ctx: &DeviceContext, request: &[u8]) -> Result<Response> {
    let req = HostCmdRequest::parse(request)?;
    let cmd = FirmwareCommand {
        id: req.id,
        payload: req.data,
        want_reply: req.want_reply,
    };

    debug!(
        id = format_args!("{:#x}", cmd.id),
        len = cmd.payload.len(),
        want_reply = cmd.want_reply,
        "relaying host command"
    );

    let reply = {
        let _device = ctx.lock_device();
        ctx.transport().send_command(&cmd)?
    };

    if !req.want_reply {
        return Ok(Response::empty());
    }

    let reply = reply
        .ok_or_else(|| DiagError::transport("firmware reply requested but none retained"))?;
    let packet = reply.packet();

    let mut resp = Response::zeroed(HOST_CMD_HDR_LEN + packet.len())?;
    resp.put_u32_le(0, req.id);
    #[allow(clippy::cast_possible_truncation)]
    resp.put_u32_le(8, packet.len() as u32);
    resp.put_bytes(HOST_CMD_HDR_LEN, packet);

    Ok(resp)
}
