//! Device and firmware descriptive snapshots.
//!
//! Pure read-only reporters: no hardware access, no mutation — each call
//! serializes driver-held state into a fresh response.

use crate::context::{DeviceContext, FeatureSet};
use crate::error::Result;
use crate::response::Response;
use crate::wire::{DEV_INFO_HDR_LEN, FW_INFO_HDR_LEN};

/// Build the device identity snapshot.
///
/// The response is the fixed header followed by the driver version string
/// and its NUL terminator; the zero-filled allocation already carries the
/// terminator.
///
/// # Errors
///
/// `OutOfMemory` if the response cannot be allocated.
pub fn device_info(ctx: &DeviceContext) -> Result<Response> {
    let ident = ctx.identity();
    let version = ident.driver_version.as_bytes();

    let mut resp = Response::zeroed(DEV_INFO_HDR_LEN + version.len() + 1)?;
    resp.put_u32_le(0, ident.device_id);
    resp.put_u32_le(4, ident.vendor_id);
    resp.put_u32_le(8, ident.silicon_step);
    resp.put_u32_le(12, ident.firmware_version);
    resp.put_u32_le(16, ident.build_version);
    resp.put_bytes(DEV_INFO_HDR_LEN, version);

    Ok(resp)
}

/// Build the firmware version/capability snapshot: header plus the API and
/// capability bitmaps, each rounded up to whole words.
///
/// # Errors
///
/// `OutOfMemory` if the response cannot be allocated.
pub fn firmware_info(ctx: &DeviceContext) -> Result<Response> {
    let fw = ctx.firmware();
    let api_len = fw.api.bitmap_len();
    let capa_len = fw.capa.bitmap_len();

    let mut resp = Response::zeroed(FW_INFO_HDR_LEN + api_len + capa_len)?;
    resp.put_u32_le(0, fw.major);
    resp.put_u32_le(4, fw.minor);
    resp.put_u32_le(8, fw.capa_flags);
    #[allow(clippy::cast_possible_truncation)]
    resp.put_u32_le(12, api_len as u32);
    #[allow(clippy::cast_possible_truncation)]
    resp.put_u32_le(16, capa_len as u32);

    fill_bitmap(&mut resp, FW_INFO_HDR_LEN, &fw.api);
    fill_bitmap(&mut resp, FW_INFO_HDR_LEN + api_len, &fw.capa);

    Ok(resp)
}

/// Set bit `index % 32` of little-endian word `index / 32` for every
/// supported index; unsupported indices stay zero.
fn fill_bitmap(resp: &mut Response, base: usize, set: &FeatureSet) {
    for index in 0..set.total() {
        if set.has(index) {
            let word = (index / 32) as usize;
            let bit = index % 32;
            let byte = base + word * 4 + (bit / 8) as usize;
            resp.or_byte(byte, 1 << (bit % 8));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_bitmap_le_word_convention() {
        let set = FeatureSet::with_enabled(64, [0, 7, 31, 32, 39]);
        let mut resp = Response::zeroed(8).unwrap();
        fill_bitmap(&mut resp, 0, &set);

        let word0 = u32::from_le_bytes(resp.as_bytes()[0..4].try_into().unwrap());
        let word1 = u32::from_le_bytes(resp.as_bytes()[4..8].try_into().unwrap());
        assert_eq!(word0, (1 << 0) | (1 << 7) | (1 << 31));
        assert_eq!(word1, (1 << 0) | (1 << 7));
    }
}
