//! Control/status register map for the WN7xxx MAC.
//!
//! The first `0x400` bytes of BAR0 are directly mapped control/status
//! registers, readable without arbitration. The host bus window at
//! `0x400..0x460` carries the indirect-access register pairs used to reach
//! device memory and the periphery aperture.

// ── Direct control/status window ─────────────────────────────────────────────

/// First address past the directly mapped control/status registers.
pub const CSR_END: u32 = 0x400;

/// Hardware interface configuration.
pub const HW_IF_CONFIG: u32 = 0x000;

/// General-purpose control — hosts the MAC arbitration handshake.
pub const GP_CNTRL: u32 = 0x024;

/// Hardware revision / silicon step.
pub const HW_REV: u32 = 0x028;

// ── GP_CNTRL bit definitions ─────────────────────────────────────────────────

pub mod gp_cntrl {
    //! Bits of [`super::GP_CNTRL`].

    /// MAC clock is running; indirect access will complete.
    pub const MAC_CLOCK_READY: u32 = 1 << 0;
    /// Device initialisation finished.
    pub const INIT_DONE: u32 = 1 << 2;
    /// Host requests exclusive MAC access. Set, then poll
    /// [`MAC_CLOCK_READY`] until the arbiter wakes the MAC.
    pub const MAC_ACCESS_REQ: u32 = 1 << 3;
    /// Device is entering a low-power state; arbitration will fail.
    pub const GOING_TO_SLEEP: u32 = 1 << 4;
}

// ── Host bus indirect-access window ──────────────────────────────────────────

/// Base of the host bus register window.
pub const HBUS_BASE: u32 = 0x400;

/// Device-memory read address (auto-incrementing).
pub const HBUS_TARG_MEM_RADDR: u32 = HBUS_BASE + 0x00C;
/// Device-memory write address (auto-incrementing).
pub const HBUS_TARG_MEM_WADDR: u32 = HBUS_BASE + 0x010;
/// Device-memory write data port.
pub const HBUS_TARG_MEM_WDAT: u32 = HBUS_BASE + 0x018;
/// Device-memory read data port.
pub const HBUS_TARG_MEM_RDAT: u32 = HBUS_BASE + 0x01C;

/// Periphery write address. The high byte carries the byte-count-minus-one
/// for sub-word writes; see [`crate::prph::pack_partial_write`].
pub const HBUS_TARG_PRPH_WADDR: u32 = HBUS_BASE + 0x044;
/// Periphery read address.
pub const HBUS_TARG_PRPH_RADDR: u32 = HBUS_BASE + 0x048;
/// Periphery write data port.
pub const HBUS_TARG_PRPH_WDAT: u32 = HBUS_BASE + 0x04C;
/// Periphery read data port.
pub const HBUS_TARG_PRPH_RDAT: u32 = HBUS_BASE + 0x050;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hbus_window_past_csr_window() {
        assert_eq!(HBUS_BASE, CSR_END);
        assert!(GP_CNTRL < CSR_END);
        assert!(HW_REV < CSR_END);
    }

    #[test]
    fn indirect_ports_distinct() {
        let ports = [
            HBUS_TARG_MEM_RADDR,
            HBUS_TARG_MEM_WADDR,
            HBUS_TARG_MEM_WDAT,
            HBUS_TARG_MEM_RDAT,
            HBUS_TARG_PRPH_WADDR,
            HBUS_TARG_PRPH_RADDR,
            HBUS_TARG_PRPH_WDAT,
            HBUS_TARG_PRPH_RDAT,
        ];
        for (i, a) in ports.iter().enumerate() {
            for b in &ports[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
