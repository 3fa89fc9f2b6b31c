//! Collaborator boundary toward the bus/firmware transport layer.
//!
//! The executor core never touches hardware directly — everything goes
//! through [`Transport`]. Backends live in [`crate::transports`]; tests run
//! against the software transport, real use runs against the PCIe transport.

use std::fmt;

use bytes::Bytes;

use crate::error::Result;

/// A firmware command ready to send. The payload is borrowed from the
/// request buffer — the transport serializes it in place, no copy.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareCommand<'a> {
    /// Firmware command identifier.
    pub id: u32,
    /// Opaque command payload.
    pub payload: &'a [u8],
    /// Ask the transport to retain the raw reply packet.
    pub want_reply: bool,
}

/// A retained firmware reply packet: header plus body, as it came off the
/// bus. Dropping the reply releases the transport's reply-holding buffer.
#[derive(Debug)]
pub struct FirmwareReply {
    packet: Bytes,
}

impl FirmwareReply {
    /// Wrap a raw reply packet.
    #[must_use]
    pub const fn new(packet: Bytes) -> Self {
        Self { packet }
    }

    /// The raw packet bytes (header + body).
    #[must_use]
    pub fn packet(&self) -> &[u8] {
        &self.packet
    }

    /// Reply length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packet.len()
    }

    /// True for a zero-length reply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packet.is_empty()
    }
}

/// Evidence of a granted exclusive-hardware-access arbitration.
///
/// Minted by [`Transport::grab_hw_access`] and consumed by
/// [`Transport::release_hw_access`]; the core only ever holds it inside a
/// [`HwAccessGuard`].
#[derive(Debug)]
pub struct HwAccessToken {
    _priv: (),
}

impl HwAccessToken {
    /// Mint a token. Only transport implementations call this.
    #[must_use]
    pub const fn new() -> Self {
        Self { _priv: () }
    }
}

impl Default for HwAccessToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Evidence of a held device liveness reference.
#[derive(Debug)]
pub struct LivenessToken {
    _priv: (),
}

impl LivenessToken {
    /// Mint a token. Only transport implementations call this.
    #[must_use]
    pub const fn new() -> Self {
        Self { _priv: () }
    }
}

impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The primitives the surrounding driver exposes to this core.
///
/// Register and periphery accessors are infallible the way raw MMIO is:
/// a misdirected read comes back as whatever the bus returns, it does not
/// error. Periphery accessors assume the caller holds exclusive access
/// where the silicon requires it.
pub trait Transport: fmt::Debug + Send + Sync {
    /// Send a firmware command, blocking until the firmware replies or the
    /// transport gives up. Returns the retained reply iff `want_reply` was
    /// set and the transport kept the packet.
    ///
    /// # Errors
    ///
    /// Transport-layer failures propagate opaquely.
    fn send_command(&self, cmd: &FirmwareCommand<'_>) -> Result<Option<FirmwareReply>>;

    /// Request exclusive MAC access. Fails fast with `Busy` if the device
    /// cannot currently be arbitrated (asleep, held elsewhere).
    ///
    /// # Errors
    ///
    /// `Busy` if arbitration is unavailable.
    fn grab_hw_access(&self) -> Result<HwAccessToken>;

    /// Return exclusive MAC access.
    fn release_hw_access(&self, token: HwAccessToken);

    /// Read a directly mapped register.
    fn read_register(&self, addr: u32) -> u32;

    /// Write a directly mapped register.
    fn write_register(&self, addr: u32, value: u32);

    /// Read one periphery word. Caller holds exclusive access.
    fn read_periphery(&self, addr: u32) -> u32;

    /// Write one periphery word. Caller holds exclusive access.
    fn write_periphery(&self, addr: u32, value: u32);

    /// Bulk-read `out.len()` words of device memory starting at `addr`.
    ///
    /// # Errors
    ///
    /// Transport-layer failures propagate opaquely.
    fn read_device_memory(&self, addr: u32, out: &mut [u32]) -> Result<()>;

    /// Bulk-write `data.len()` words of device memory starting at `addr`.
    ///
    /// # Errors
    ///
    /// Transport-layer failures propagate opaquely.
    fn write_device_memory(&self, addr: u32, data: &[u32]) -> Result<()>;

    /// Take a reference that keeps the device from being torn down while a
    /// call is in flight. Fails if the device is tearing down or cannot be
    /// woken.
    ///
    /// # Errors
    ///
    /// `Busy` or a transport failure if the device is unavailable.
    fn ref_device(&self) -> Result<LivenessToken>;

    /// Drop a liveness reference.
    fn unref_device(&self, token: LivenessToken);
}

/// Scoped exclusive MAC access: released on drop, on every exit path.
#[derive(Debug)]
pub struct HwAccessGuard<'t> {
    transport: &'t dyn Transport,
    token: Option<HwAccessToken>,
}

impl<'t> HwAccessGuard<'t> {
    /// Arbitrate for exclusive access.
    ///
    /// # Errors
    ///
    /// `Busy` if the device cannot be arbitrated; nothing is held on failure.
    pub fn grab(transport: &'t dyn Transport) -> Result<Self> {
        let token = transport.grab_hw_access()?;
        Ok(Self {
            transport,
            token: Some(token),
        })
    }
}

impl Drop for HwAccessGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.transport.release_hw_access(token);
        }
    }
}

/// Scoped device liveness reference: released on drop, exactly once.
#[derive(Debug)]
pub struct LivenessGuard<'t> {
    transport: &'t dyn Transport,
    token: Option<LivenessToken>,
}

impl<'t> LivenessGuard<'t> {
    /// Take a liveness reference.
    ///
    /// # Errors
    ///
    /// Propagates the transport's refusal; nothing is held on failure.
    pub fn acquire(transport: &'t dyn Transport) -> Result<Self> {
        let token = transport.ref_device()?;
        Ok(Self {
            transport,
            token: Some(token),
        })
    }
}

impl Drop for LivenessGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.transport.unref_device(token);
        }
    }
}
