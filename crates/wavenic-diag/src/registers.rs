//! Register batch executor.
//!
//! Executes an ordered list of register reads and writes under a single
//! arbitration, collecting read results in caller order.

use tracing::debug;
use wavenic_chip::AddressClass;

use crate::context::DeviceContext;
use crate::error::Result;
use crate::response::Response;
use crate::transport::HwAccessGuard;
use crate::wire::{RegBatchRequest, RegOpKind, REG_BATCH_HDR_LEN, REG_OP_LEN};

/// Execute a register batch.
///
/// Exclusive MAC access is taken only when every operation in the batch lies
/// in the periphery aperture; a single address outside disables arbitration
/// for the whole batch. That is long-standing policy for this command and is
/// kept as observed.
///
/// # Errors
///
/// `InvalidArgument` for a malformed batch, `OutOfMemory` if the result
/// buffer cannot be allocated, `Busy` if required arbitration fails — in
/// which case the result buffer is discarded, not returned.
pub fn run_batch(ctx: &DeviceContext, request: &[u8]) -> Result<Response> {
    let batch = RegBatchRequest::parse(request)?;

    // First pass: size the result (reads only) and classify every address.
    let read_count = batch
        .ops
        .iter()
        .filter(|op| op.kind == RegOpKind::Read)
        .count();
    let wants_exclusive = batch
        .ops
        .iter()
        .all(|op| AddressClass::is_periphery(op.address));

    let mut resp = Response::zeroed(REG_BATCH_HDR_LEN + read_count * REG_OP_LEN)?;
    #[allow(clippy::cast_possible_truncation)]
    resp.put_u32_le(0, read_count as u32);

    debug!(
        ops = batch.ops.len(),
        reads = read_count,
        exclusive = wants_exclusive,
        "executing register batch"
    );

    let _device = ctx.lock_device();
    let transport = ctx.transport();
    let _access = if wants_exclusive {
        Some(HwAccessGuard::grab(transport)?)
    } else {
        None
    };

    // Second pass: caller order, reads filling consecutive result slots.
    let mut slot = REG_BATCH_HDR_LEN;
    for op in &batch.ops {
        match op.kind {
            RegOpKind::Read => {
                let value = transport.read_register(op.address);
                resp.put_u32_le(slot, RegOpKind::Read as u32);
                resp.put_u32_le(slot + 4, op.address);
                resp.put_u32_le(slot + 8, value);
                slot += REG_OP_LEN;
            }
            RegOpKind::Write => transport.write_register(op.address, op.value),
        }
    }

    Ok(resp)
}
