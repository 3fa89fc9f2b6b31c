//! PCIe transport: the real arbitration handshake and indirect-port
//! protocol over a mapped BAR0.
//!
//! Covers the register, periphery, and device-memory primitives. The
//! firmware command ring needs the full descriptor machinery the
//! surrounding driver owns, so `send_command` is not available on this
//! backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use wavenic_chip::csr::{
    gp_cntrl, GP_CNTRL, HBUS_TARG_MEM_RADDR, HBUS_TARG_MEM_RDAT, HBUS_TARG_MEM_WADDR,
    HBUS_TARG_MEM_WDAT, HBUS_TARG_PRPH_RADDR, HBUS_TARG_PRPH_RDAT, HBUS_TARG_PRPH_WADDR,
    HBUS_TARG_PRPH_WDAT,
};
use wavenic_chip::prph::{PRPH_ADDR_MASK, PRPH_BYTECNT_SHIFT};

use super::mmap::BarRegion;
use crate::error::{DiagError, Result};
use crate::transport::{
    FirmwareCommand, FirmwareReply, HwAccessToken, LivenessToken, Transport,
};

/// How many times to poll for the MAC clock after requesting access.
const GRAB_POLL_ATTEMPTS: u32 = 1500;
/// Delay between polls.
const GRAB_POLL_INTERVAL: Duration = Duration::from_micros(10);

/// Full-word periphery transactions carry byte-count-minus-one = 3.
const PRPH_WORD_ACCESS: u32 = 3 << PRPH_BYTECNT_SHIFT;

/// Transport over a mapped BAR0.
#[derive(Debug)]
pub struct PcieTransport {
    bar: BarRegion,
    live_refs: AtomicU32,
}

impl PcieTransport {
    /// Open BAR0 of the device at the given PCIe address.
    ///
    /// # Errors
    ///
    /// Propagates mapping failures.
    pub fn open(pcie_address: &str) -> Result<Self> {
        let bar = BarRegion::map(pcie_address, 0)?;
        tracing::info!(
            "PCIe transport ready for {pcie_address} (BAR0 {:#x} bytes)",
            bar.size()
        );
        Ok(Self {
            bar,
            live_refs: AtomicU32::new(0),
        })
    }

    fn gp_cntrl(&self) -> u32 {
        self.read_register(GP_CNTRL)
    }
}

impl Transport for PcieTransport {
    fn send_command(&self, _cmd: &FirmwareCommand<'_>) -> Result<Option<FirmwareReply>> {
        Err(DiagError::transport(
            "host command ring is not reachable over BAR access",
        ))
    }

    fn grab_hw_access(&self) -> Result<HwAccessToken> {
        // Request MAC access, then wait for the arbiter to wake the clock.
        let cntrl = self.gp_cntrl();
        self.write_register(GP_CNTRL, cntrl | gp_cntrl::MAC_ACCESS_REQ);

        for _ in 0..GRAB_POLL_ATTEMPTS {
            let cntrl = self.gp_cntrl();
            if cntrl & gp_cntrl::MAC_CLOCK_READY != 0
                && cntrl & gp_cntrl::GOING_TO_SLEEP == 0
            {
                return Ok(HwAccessToken::new());
            }
            std::thread::sleep(GRAB_POLL_INTERVAL);
        }

        // Give the request back before failing.
        let cntrl = self.gp_cntrl();
        self.write_register(GP_CNTRL, cntrl & !gp_cntrl::MAC_ACCESS_REQ);
        tracing::warn!("MAC arbitration timed out");
        Err(DiagError::busy("MAC clock did not come up"))
    }

    fn release_hw_access(&self, _token: HwAccessToken) {
        let cntrl = self.gp_cntrl();
        self.write_register(GP_CNTRL, cntrl & !gp_cntrl::MAC_ACCESS_REQ);
    }

    fn read_register(&self, addr: u32) -> u32 {
        // A misdirected read behaves like a PCI master abort: all ones.
        self.bar.read_u32(addr as usize).unwrap_or_else(|_| {
            tracing::warn!(addr = format_args!("{addr:#x}"), "register read outside BAR");
            u32::MAX
        })
    }

    fn write_register(&self, addr: u32, value: u32) {
        if self.bar.write_u32(addr as usize, value).is_err() {
            tracing::warn!(addr = format_args!("{addr:#x}"), "register write outside BAR dropped");
        }
    }

    fn read_periphery(&self, addr: u32) -> u32 {
        self.write_register(
            HBUS_TARG_PRPH_RADDR,
            (addr & PRPH_ADDR_MASK) | PRPH_WORD_ACCESS,
        );
        self.read_register(HBUS_TARG_PRPH_RDAT)
    }

    fn write_periphery(&self, addr: u32, value: u32) {
        self.write_register(
            HBUS_TARG_PRPH_WADDR,
            (addr & PRPH_ADDR_MASK) | PRPH_WORD_ACCESS,
        );
        self.write_register(HBUS_TARG_PRPH_WDAT, value);
    }

    fn read_device_memory(&self, addr: u32, out: &mut [u32]) -> Result<()> {
        // The memory ports auto-increment, one arbitration per burst.
        let token = self.grab_hw_access()?;
        self.write_register(HBUS_TARG_MEM_RADDR, addr);
        for word in out.iter_mut() {
            *word = self.read_register(HBUS_TARG_MEM_RDAT);
        }
        self.release_hw_access(token);
        Ok(())
    }

    fn write_device_memory(&self, addr: u32, data: &[u32]) -> Result<()> {
        let token = self.grab_hw_access()?;
        self.write_register(HBUS_TARG_MEM_WADDR, addr);
        for word in data {
            self.write_register(HBUS_TARG_MEM_WDAT, *word);
        }
        self.release_hw_access(token);
        Ok(())
    }

    fn ref_device(&self) -> Result<LivenessToken> {
        if self.gp_cntrl() & gp_cntrl::GOING_TO_SLEEP != 0 {
            return Err(DiagError::busy("device is going to sleep"));
        }
        self.live_refs.fetch_add(1, Ordering::AcqRel);
        Ok(LivenessToken::new())
    }

    fn unref_device(&self, _token: LivenessToken) {
        self.live_refs.fetch_sub(1, Ordering::AcqRel);
    }
}
