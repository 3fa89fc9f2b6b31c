//! Software (emulated device) transport.
//!
//! Backs the [`Transport`] primitives with plain maps instead of silicon.
//! This enables:
//!
//! 1. **CI without hardware**: the full executor runs against this backend
//!    and every test passes without a physical WN7xxx.
//! 2. **Fault injection**: arbitration refusal, liveness refusal, and
//!    transport send failures can be switched on to exercise error paths.
//! 3. **Protocol observation**: every register write lands in an ordered
//!    log, so tests can assert exact indirect-port traffic.
//!
//! The emulator also checks the arbitration discipline: periphery accesses
//! while exclusive access is not held trip a debug assertion.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::error::{DiagError, Result};
use crate::transport::{
    FirmwareCommand, FirmwareReply, HwAccessToken, LivenessToken, Transport,
};

/// One recorded firmware command: id, payload copy, want-reply flag.
pub type SentCommand = (u32, Vec<u8>, bool);

#[derive(Debug, Default)]
struct SwState {
    registers: BTreeMap<u32, u32>,
    periphery: BTreeMap<u32, u32>,
    memory: BTreeMap<u32, u32>,

    hw_access_held: bool,
    hw_busy: bool,
    liveness_refused: bool,
    send_fails: bool,

    replies: VecDeque<Bytes>,
    sent: Vec<SentCommand>,
    register_writes: Vec<(u32, u32)>,

    hw_grabs: u32,
    hw_releases: u32,
    liveness_refs: u32,
    liveness_unrefs: u32,
}

/// In-memory emulated device.
#[derive(Debug, Default)]
pub struct SoftwareTransport {
    state: Mutex<SwState>,
}

impl SoftwareTransport {
    /// A fresh emulated device with all spaces zeroed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SwState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Preload a directly mapped register.
    pub fn seed_register(&self, addr: u32, value: u32) {
        self.state().registers.insert(addr, value);
    }

    /// Preload a periphery word.
    pub fn seed_periphery(&self, addr: u32, value: u32) {
        self.state().periphery.insert(addr, value);
    }

    /// Preload one word of device memory.
    pub fn seed_memory_word(&self, addr: u32, value: u32) {
        self.state().memory.insert(addr, value);
    }

    /// Read back one word of device memory.
    #[must_use]
    pub fn memory_word(&self, addr: u32) -> u32 {
        self.state().memory.get(&addr).copied().unwrap_or(0)
    }

    /// Read back one periphery word.
    #[must_use]
    pub fn periphery_word(&self, addr: u32) -> u32 {
        self.state().periphery.get(&addr).copied().unwrap_or(0)
    }

    /// Make arbitration fail with `Busy` until cleared.
    pub fn set_hw_busy(&self, busy: bool) {
        self.state().hw_busy = busy;
    }

    /// Make liveness acquisition fail until cleared.
    pub fn refuse_liveness(&self, refuse: bool) {
        self.state().liveness_refused = refuse;
    }

    /// Make firmware command sends fail until cleared.
    pub fn fail_sends(&self, fail: bool) {
        self.state().send_fails = fail;
    }

    /// Queue a raw reply packet for the next reply-wanting command.
    pub fn push_reply(&self, packet: Bytes) {
        self.state().replies.push_back(packet);
    }

    /// Every firmware command sent so far, in order.
    #[must_use]
    pub fn sent_commands(&self) -> Vec<SentCommand> {
        self.state().sent.clone()
    }

    /// Ordered log of all register writes.
    #[must_use]
    pub fn register_writes(&self) -> Vec<(u32, u32)> {
        self.state().register_writes.clone()
    }

    /// Successful arbitration grabs.
    #[must_use]
    pub fn hw_grabs(&self) -> u32 {
        self.state().hw_grabs
    }

    /// Arbitration releases.
    #[must_use]
    pub fn hw_releases(&self) -> u32 {
        self.state().hw_releases
    }

    /// Liveness references taken.
    #[must_use]
    pub fn liveness_refs(&self) -> u32 {
        self.state().liveness_refs
    }

    /// Liveness references dropped.
    #[must_use]
    pub fn liveness_unrefs(&self) -> u32 {
        self.state().liveness_unrefs
    }
}

impl Transport for SoftwareTransport {
    fn send_command(&self, cmd: &FirmwareCommand<'_>) -> Result<Option<FirmwareReply>> {
        let mut state = self.state();
        if state.send_fails {
            return Err(DiagError::transport("emulated send failure"));
        }
        state.sent.push((cmd.id, cmd.payload.to_vec(), cmd.want_reply));
        if !cmd.want_reply {
            return Ok(None);
        }
        Ok(state.replies.pop_front().map(FirmwareReply::new))
    }

    fn grab_hw_access(&self) -> Result<HwAccessToken> {
        let mut state = self.state();
        if state.hw_busy {
            return Err(DiagError::busy("emulated arbitration refusal"));
        }
        debug_assert!(!state.hw_access_held, "nested exclusive access grab");
        state.hw_access_held = true;
        state.hw_grabs += 1;
        Ok(HwAccessToken::new())
    }

    fn release_hw_access(&self, _token: HwAccessToken) {
        let mut state = self.state();
        debug_assert!(state.hw_access_held, "release without grab");
        state.hw_access_held = false;
        state.hw_releases += 1;
    }

    fn read_register(&self, addr: u32) -> u32 {
        self.state().registers.get(&addr).copied().unwrap_or(0)
    }

    fn write_register(&self, addr: u32, value: u32) {
        let mut state = self.state();
        state.registers.insert(addr, value);
        state.register_writes.push((addr, value));
    }

    fn read_periphery(&self, addr: u32) -> u32 {
        let state = self.state();
        debug_assert!(state.hw_access_held, "periphery read without exclusive access");
        state.periphery.get(&addr).copied().unwrap_or(0)
    }

    fn write_periphery(&self, addr: u32, value: u32) {
        let mut state = self.state();
        debug_assert!(state.hw_access_held, "periphery write without exclusive access");
        state.periphery.insert(addr, value);
    }

    fn read_device_memory(&self, addr: u32, out: &mut [u32]) -> Result<()> {
        let state = self.state();
        for (i, word) in out.iter_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let a = addr.wrapping_add((i * 4) as u32);
            *word = state.memory.get(&a).copied().unwrap_or(0);
        }
        Ok(())
    }

    fn write_device_memory(&self, addr: u32, data: &[u32]) -> Result<()> {
        let mut state = self.state();
        for (i, word) in data.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let a = addr.wrapping_add((i * 4) as u32);
            state.memory.insert(a, *word);
        }
        Ok(())
    }

    fn ref_device(&self) -> Result<LivenessToken> {
        let mut state = self.state();
        if state.liveness_refused {
            return Err(DiagError::busy("emulated device is asleep"));
        }
        state.liveness_refs += 1;
        Ok(LivenessToken::new())
    }

    fn unref_device(&self, _token: LivenessToken) {
        self.state().liveness_unrefs += 1;
    }
}
