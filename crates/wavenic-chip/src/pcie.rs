//! PCIe identifiers for the WN7xxx family.

/// Wavenic PCIe vendor ID.
pub const VENDOR_ID: u16 = 0x1AE9;

/// Known device IDs.
pub mod device_id {
    /// WN7100 — 2x2 dual-band MAC.
    pub const WN7100: u16 = 0x7100;
    /// WN7200 — 2x2 tri-band MAC, external amplifier.
    pub const WN7200: u16 = 0x7201;
}

/// Every device ID this driver family binds to.
pub const ALL_DEVICE_IDS: [u16; 2] = [device_id::WN7100, device_id::WN7200];

/// `lspci -d` filter string matching any Wavenic device.
#[must_use]
pub fn lspci_filter() -> String {
    format!("{VENDOR_ID:04x}:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_vendor() {
        assert_eq!(lspci_filter(), "1ae9:");
    }
}
