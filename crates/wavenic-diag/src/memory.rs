//! Indirect device-memory and periphery access.
//!
//! Reads and writes arbitrary byte ranges of the device address space.
//! Periphery addresses go word-by-word through the arbitrated indirect
//! ports; everything else uses the bulk device-memory path. Both directions
//! run under the device-wide serialization lock.

use tracing::debug;
use wavenic_chip::csr::{HBUS_TARG_PRPH_WADDR, HBUS_TARG_PRPH_WDAT};
use wavenic_chip::prph::WORD_SIZE;
use wavenic_chip::{pack_partial_write, AddressClass};

use crate::context::DeviceContext;
use crate::error::{DiagError, Result};
use crate::response::Response;
use crate::transport::HwAccessGuard;
use crate::wire::{MemReadRequest, MemWriteRequest};

fn le_word(chunk: &[u8]) -> u32 {
    u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
}

/// Read `length` bytes starting at `offset`.
///
/// # Errors
///
/// `InvalidArgument` for a length that is not a whole number of words —
/// rejected before any allocation or hardware access. `Busy` if a periphery
/// read cannot be arbitrated; the output allocation is discarded.
pub fn indirect_read(ctx: &DeviceContext, request: &[u8]) -> Result<Response> {
    let req = MemReadRequest::parse(request)?;
    let len = req.length as usize;
    if len % WORD_SIZE != 0 {
        return Err(DiagError::invalid_argument(format!(
            "read length {len} is not word-aligned"
        )));
    }
    let words = len / WORD_SIZE;

    let mut resp = Response::zeroed(len)?;

    debug!(offset = format_args!("{:#x}", req.offset), len, "indirect read");

    let _device = ctx.lock_device();
    let transport = ctx.transport();
    match AddressClass::classify(req.offset) {
        AddressClass::Periphery => {
            let _access = HwAccessGuard::grab(transport)?;
            for i in 0..words {
                #[allow(clippy::cast_possible_truncation)]
                let addr = req.offset.wrapping_add((i * WORD_SIZE) as u32);
                resp.put_u32_le(i * WORD_SIZE, transport.read_periphery(addr));
            }
        }
        AddressClass::DeviceMemory => {
            let mut buf = vec![0u32; words];
            transport.read_device_memory(req.offset, &mut buf)?;
            for (i, word) in buf.iter().enumerate() {
                resp.put_u32_le(i * WORD_SIZE, *word);
            }
        }
    }

    Ok(resp)
}

/// Write the request's data starting at `offset`.
///
/// Periphery writes shorter than a word use the packed write-address /
/// write-data register pair; word-multiple periphery writes go word-by-word
/// under one arbitration; device-memory writes are bulk, with any trailing
/// sub-word bytes dropped as the bulk path has always done.
///
/// # Errors
///
/// `InvalidArgument` for an empty periphery write or a periphery length of
/// a word or more that is not word-aligned; `Busy` if arbitration fails.
pub fn indirect_write(ctx: &DeviceContext, request: &[u8]) -> Result<Response> {
    let req = MemWriteRequest::parse(request)?;
    let data = req.data;

    debug!(
        offset = format_args!("{:#x}", req.offset),
        len = data.len(),
        "indirect write"
    );

    let _device = ctx.lock_device();
    let transport = ctx.transport();
    match AddressClass::classify(req.offset) {
        AddressClass::Periphery => {
            if data.is_empty() {
                return Err(DiagError::invalid_argument("empty periphery write"));
            }
            if data.len() < WORD_SIZE {
                // Sub-word write: one packed transaction through the
                // write-address/write-data pair.
                let (reg_addr, reg_data) = pack_partial_write(req.offset, data);
                let _access = HwAccessGuard::grab(transport)?;
                transport.write_register(HBUS_TARG_PRPH_WADDR, reg_addr);
                transport.write_register(HBUS_TARG_PRPH_WDAT, reg_data);
            } else {
                if data.len() % WORD_SIZE != 0 {
                    return Err(DiagError::invalid_argument(format!(
                        "periphery write length {} is not word-aligned",
                        data.len()
                    )));
                }
                let _access = HwAccessGuard::grab(transport)?;
                for (i, chunk) in data.chunks_exact(WORD_SIZE).enumerate() {
                    #[allow(clippy::cast_possible_truncation)]
                    let addr = req.offset.wrapping_add((i * WORD_SIZE) as u32);
                    transport.write_periphery(addr, le_word(chunk));
                }
            }
        }
        AddressClass::DeviceMemory => {
            let words: Vec<u32> = data.chunks_exact(WORD_SIZE).map(le_word).collect();
            transport.write_device_memory(req.offset, &words)?;
        }
    }

    Ok(Response::empty())
}
