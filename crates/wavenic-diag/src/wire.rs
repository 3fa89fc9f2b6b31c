//! Wire formats for diagnostic requests and responses.
//!
//! Requests arrive as opaque byte buffers whose declared length the caller
//! vouches for; parsing here performs the per-field structural checks only.
//! All multi-byte fields are little-endian.

use crate::error::{DiagError, Result};

/// One register operation on the wire: kind, address, value.
pub const REG_OP_LEN: usize = 12;
/// Register batch header: operation count.
pub const REG_BATCH_HDR_LEN: usize = 4;
/// Memory read request: offset, length.
pub const MEM_READ_REQ_LEN: usize = 8;
/// Memory write header: offset, length (data follows).
pub const MEM_WRITE_HDR_LEN: usize = 8;
/// Host command header: id, want-reply flag, payload length.
pub const HOST_CMD_HDR_LEN: usize = 12;
/// Device info response header, ahead of the version string.
pub const DEV_INFO_HDR_LEN: usize = 20;
/// Firmware info response header, ahead of the two bitmaps.
pub const FW_INFO_HDR_LEN: usize = 20;

/// Mask extracting the frame size from a firmware rx packet's leading
/// length-and-flags word.
pub const FRAME_SIZE_MASK: u32 = 0x0000_3FFF;

fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    let bytes = buf
        .get(offset..offset + 4)
        .ok_or_else(|| DiagError::invalid_argument(format!("request truncated at byte {offset}")))?;
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(word))
}

/// Direction of a register operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RegOpKind {
    /// Read the register; the result is copied into the response.
    Read = 1,
    /// Write the register; produces no output.
    Write = 2,
}

impl RegOpKind {
    fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            1 => Ok(Self::Read),
            2 => Ok(Self::Write),
            other => Err(DiagError::invalid_argument(format!(
                "unknown register op kind {other}"
            ))),
        }
    }
}

/// One decoded register operation.
#[derive(Debug, Clone, Copy)]
pub struct RegOp {
    /// Read or write.
    pub kind: RegOpKind,
    /// Absolute register address.
    pub address: u32,
    /// Value to write; ignored for reads.
    pub value: u32,
}

/// An ordered register batch.
#[derive(Debug, Clone)]
pub struct RegBatchRequest {
    /// Operations in caller order.
    pub ops: Vec<RegOp>,
}

impl RegBatchRequest {
    /// Decode a batch from its wire form.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the buffer is shorter than the declared
    /// operation count requires, or an operation kind is unknown.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let num = read_u32(buf, 0)? as usize;
        let need = REG_BATCH_HDR_LEN
            .checked_add(num.checked_mul(REG_OP_LEN).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        if buf.len() < need {
            return Err(DiagError::invalid_argument(format!(
                "register batch declares {num} ops but carries {} bytes",
                buf.len()
            )));
        }

        let mut ops = Vec::with_capacity(num);
        for idx in 0..num {
            let base = REG_BATCH_HDR_LEN + idx * REG_OP_LEN;
            ops.push(RegOp {
                kind: RegOpKind::from_raw(read_u32(buf, base)?)?,
                address: read_u32(buf, base + 4)?,
                value: read_u32(buf, base + 8)?,
            });
        }
        Ok(Self { ops })
    }
}

/// Decoded indirect memory read request.
#[derive(Debug, Clone, Copy)]
pub struct MemReadRequest {
    /// Absolute device address.
    pub offset: u32,
    /// Number of bytes to read; must be word-aligned.
    pub length: u32,
}

impl MemReadRequest {
    /// Decode from wire form.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a truncated buffer.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        Ok(Self {
            offset: read_u32(buf, 0)?,
            length: read_u32(buf, 4)?,
        })
    }
}

/// Decoded indirect memory write request; borrows its data from the request
/// buffer for the duration of the call.
#[derive(Debug, Clone, Copy)]
pub struct MemWriteRequest<'a> {
    /// Absolute device address.
    pub offset: u32,
    /// Bytes to write.
    pub data: &'a [u8],
}

impl<'a> MemWriteRequest<'a> {
    /// Decode from wire form, checking the declared length against the
    /// buffer actually supplied.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a truncated buffer.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let offset = read_u32(buf, 0)?;
        let len = read_u32(buf, 4)? as usize;
        let data = buf.get(MEM_WRITE_HDR_LEN..MEM_WRITE_HDR_LEN + len).ok_or_else(|| {
            DiagError::invalid_argument(format!(
                "memory write declares {len} bytes but carries {}",
                buf.len().saturating_sub(MEM_WRITE_HDR_LEN)
            ))
        })?;
        Ok(Self { offset, data })
    }
}

/// Decoded firmware host command request; payload is borrowed, zero-copy.
#[derive(Debug, Clone, Copy)]
pub struct HostCmdRequest<'a> {
    /// Firmware command identifier.
    pub id: u32,
    /// Whether the caller wants the raw firmware reply back.
    pub want_reply: bool,
    /// Opaque command payload.
    pub data: &'a [u8],
}

impl<'a> HostCmdRequest<'a> {
    /// Decode from wire form.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a truncated buffer.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let id = read_u32(buf, 0)?;
        let want_reply = read_u32(buf, 4)? != 0;
        let len = read_u32(buf, 8)? as usize;
        let data = buf.get(HOST_CMD_HDR_LEN..HOST_CMD_HDR_LEN + len).ok_or_else(|| {
            DiagError::invalid_argument(format!(
                "host command declares {len} payload bytes but carries {}",
                buf.len().saturating_sub(HOST_CMD_HDR_LEN)
            ))
        })?;
        Ok(Self {
            id,
            want_reply,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u32(buf: &mut Vec<u8>, value: u32) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn test_reg_batch_roundtrip_fields() {
        let mut buf = Vec::new();
        push_u32(&mut buf, 2);
        push_u32(&mut buf, 1); // read
        push_u32(&mut buf, 0x24);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 2); // write
        push_u32(&mut buf, 0x28);
        push_u32(&mut buf, 0xDEAD_BEEF);

        let batch = RegBatchRequest::parse(&buf).unwrap();
        assert_eq!(batch.ops.len(), 2);
        assert_eq!(batch.ops[0].kind, RegOpKind::Read);
        assert_eq!(batch.ops[1].address, 0x28);
        assert_eq!(batch.ops[1].value, 0xDEAD_BEEF);
    }

    #[test]
    fn test_reg_batch_overdeclared_count() {
        let mut buf = Vec::new();
        push_u32(&mut buf, 5); // declares 5 ops, carries none
        let err = RegBatchRequest::parse(&buf).unwrap_err();
        assert!(matches!(err, DiagError::InvalidArgument { .. }));
    }

    #[test]
    fn test_reg_batch_unknown_kind() {
        let mut buf = Vec::new();
        push_u32(&mut buf, 1);
        push_u32(&mut buf, 7);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 0);
        assert!(RegBatchRequest::parse(&buf).is_err());
    }

    #[test]
    fn test_host_cmd_payload_borrowed() {
        let mut buf = Vec::new();
        push_u32(&mut buf, 0x88);
        push_u32(&mut buf, 1);
        push_u32(&mut buf, 3);
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let cmd = HostCmdRequest::parse(&buf).unwrap();
        assert_eq!(cmd.id, 0x88);
        assert!(cmd.want_reply);
        assert_eq!(cmd.data, &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_mem_write_truncated_data() {
        let mut buf = Vec::new();
        push_u32(&mut buf, 0x100);
        push_u32(&mut buf, 8);
        buf.extend_from_slice(&[1, 2, 3]); // only 3 of 8 declared bytes
        assert!(MemWriteRequest::parse(&buf).is_err());
    }
}
