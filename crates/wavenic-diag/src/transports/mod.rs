//! Transport implementations.
//!
//! Two backends:
//! - **Software**: an in-memory emulated device — CI and algorithm
//!   validation without hardware, with fault injection for the failure
//!   paths real silicon makes hard to reach on demand.
//! - **PCIe**: sysfs `resource0` BAR mapping with the real arbitration
//!   handshake and indirect-port protocol. Register and memory primitives
//!   only; the firmware command ring is not reachable this way.

pub mod mmap;
pub mod pcie;
pub mod software;

pub use pcie::PcieTransport;
pub use software::SoftwareTransport;
