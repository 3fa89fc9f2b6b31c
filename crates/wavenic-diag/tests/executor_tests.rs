//! End-to-end executor tests over the software transport.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use wavenic_chip::csr::{HBUS_TARG_PRPH_WADDR, HBUS_TARG_PRPH_WDAT};
use wavenic_chip::prph::PRPH_BASE;
use wavenic_diag::{
    DeviceContext, DeviceIdentity, DiagError, DiagExecutor, EventSink, FeatureSet,
    FirmwareFeatures, NullSink, Opcode, Response, SoftwareTransport, FW_EVENT_NOTIFICATION,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn identity() -> DeviceIdentity {
    DeviceIdentity {
        device_id: u32::from(wavenic_chip::pcie::device_id::WN7100),
        vendor_id: u32::from(wavenic_chip::pcie::VENDOR_ID),
        silicon_step: 3,
        firmware_version: 0x2A07_0000,
        build_version: 0,
        driver_version: "wavenic 0.3.0".into(),
    }
}

fn firmware() -> FirmwareFeatures {
    FirmwareFeatures {
        major: 42,
        minor: 7,
        capa_flags: 0x00C0_FFEE,
        api: FeatureSet::with_enabled(64, 0..40),
        capa: FeatureSet::with_enabled(64, [1, 5]),
    }
}

fn executor(transport: Arc<SoftwareTransport>) -> DiagExecutor {
    DiagExecutor::new(DeviceContext::new(
        transport,
        identity(),
        firmware(),
        Arc::new(NullSink),
    ))
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// (kind, address, value) triples to a batch request.
fn batch_request(ops: &[(u32, u32, u32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    push_u32(&mut buf, ops.len() as u32);
    for &(kind, addr, value) in ops {
        push_u32(&mut buf, kind);
        push_u32(&mut buf, addr);
        push_u32(&mut buf, value);
    }
    buf
}

fn mem_read_request(offset: u32, length: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    push_u32(&mut buf, offset);
    push_u32(&mut buf, length);
    buf
}

fn mem_write_request(offset: u32, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    push_u32(&mut buf, offset);
    push_u32(&mut buf, data.len() as u32);
    buf.extend_from_slice(data);
    buf
}

fn host_cmd_request(id: u32, want_reply: bool, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    push_u32(&mut buf, id);
    push_u32(&mut buf, u32::from(want_reply));
    push_u32(&mut buf, data.len() as u32);
    buf.extend_from_slice(data);
    buf
}

fn word_at(resp: &Response, offset: usize) -> u32 {
    u32::from_le_bytes(resp.as_bytes()[offset..offset + 4].try_into().unwrap())
}

// ── Register batches ─────────────────────────────────────────────────────────

#[test]
fn test_read_only_periphery_batch_in_order() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    let addrs = [PRPH_BASE, PRPH_BASE + 8, PRPH_BASE + 0x40, PRPH_BASE + 4];
    for (i, addr) in addrs.iter().enumerate() {
        transport.seed_register(*addr, 0x1000 + i as u32);
    }

    let req = batch_request(&addrs.map(|a| (1, a, 0)));
    let resp = exec.execute(Opcode::RegisterAccess.raw(), &req).unwrap();

    assert_eq!(word_at(&resp, 0), 4);
    assert_eq!(resp.len(), 4 + 4 * 12);
    for (i, addr) in addrs.iter().enumerate() {
        let base = 4 + i * 12;
        assert_eq!(word_at(&resp, base), 1); // read marker
        assert_eq!(word_at(&resp, base + 4), *addr);
        assert_eq!(word_at(&resp, base + 8), 0x1000 + i as u32);
    }

    // Whole batch in the periphery aperture: one arbitration, returned.
    assert_eq!(transport.hw_grabs(), 1);
    assert_eq!(transport.hw_releases(), 1);
}

#[test]
fn test_mixed_batch_skips_arbitration() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());
    transport.seed_register(PRPH_BASE, 0xAAAA);

    // One op outside the aperture disables arbitration for the whole batch.
    let req = batch_request(&[(1, PRPH_BASE, 0), (2, 0x28, 0xBEEF)]);
    let resp = exec.execute(Opcode::RegisterAccess.raw(), &req).unwrap();

    assert_eq!(word_at(&resp, 0), 1);
    assert_eq!(word_at(&resp, 8), 0xAAAA);
    assert_eq!(transport.hw_grabs(), 0);
    assert_eq!(transport.register_writes(), vec![(0x28, 0xBEEF)]);
}

#[test]
fn test_batch_write_visible_to_later_read() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    // Caller order: the write must land before the read of the same address.
    let req = batch_request(&[(2, 0x100, 0x55AA), (1, 0x100, 0)]);
    let resp = exec.execute(Opcode::RegisterAccess.raw(), &req).unwrap();

    assert_eq!(word_at(&resp, 0), 1);
    assert_eq!(word_at(&resp, 8), 0x55AA);
}

#[test]
fn test_write_only_batch_empty_result() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    let req = batch_request(&[(2, 0x10, 1), (2, 0x14, 2)]);
    let resp = exec.execute(Opcode::RegisterAccess.raw(), &req).unwrap();

    assert_eq!(resp.len(), 4);
    assert_eq!(word_at(&resp, 0), 0);
    assert_eq!(
        transport.register_writes(),
        vec![(0x10, 1), (0x14, 2)]
    );
}

// ── Indirect memory ──────────────────────────────────────────────────────────

#[test]
fn test_memory_roundtrip() {
    init_tracing();
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    let data: Vec<u8> = (0..32u8).collect();
    let addr = 0x0004_0000;

    exec.execute(Opcode::MemoryWrite.raw(), &mem_write_request(addr, &data))
        .unwrap();
    let resp = exec
        .execute(Opcode::MemoryRead.raw(), &mem_read_request(addr, 32))
        .unwrap();

    assert_eq!(resp.as_bytes(), &data[..]);
}

#[test]
fn test_unaligned_read_rejected_without_hardware_access() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    for len in [1, 2, 3, 5, 7, 1023] {
        let err = exec
            .execute(Opcode::MemoryRead.raw(), &mem_read_request(PRPH_BASE, len))
            .unwrap_err();
        assert!(matches!(err, DiagError::InvalidArgument { .. }));
    }
    assert_eq!(transport.hw_grabs(), 0);
}

#[test]
fn test_periphery_read_word_loop() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    transport.seed_periphery(PRPH_BASE + 0x10, 0x0101_0101);
    transport.seed_periphery(PRPH_BASE + 0x14, 0x0202_0202);

    let resp = exec
        .execute(
            Opcode::MemoryRead.raw(),
            &mem_read_request(PRPH_BASE + 0x10, 8),
        )
        .unwrap();

    assert_eq!(word_at(&resp, 0), 0x0101_0101);
    assert_eq!(word_at(&resp, 4), 0x0202_0202);
    assert_eq!(transport.hw_grabs(), 1);
    assert_eq!(transport.hw_releases(), 1);
}

#[test]
fn test_subword_periphery_write_packing() {
    // Bit-exact packed writes for lengths 1, 2, 3.
    let cases: [(&[u8], u32, u32); 3] = [
        (&[0x5A], 0x20, 0x0000_005A),
        (&[0x34, 0x12], 0x0100_0020, 0x0000_1234),
        (&[0xEF, 0xCD, 0xAB], 0x0200_0020, 0x00AB_CDEF),
    ];

    for (data, want_addr_reg, want_data_reg) in cases {
        let transport = Arc::new(SoftwareTransport::new());
        let exec = executor(transport.clone());

        exec.execute(
            Opcode::MemoryWrite.raw(),
            &mem_write_request(PRPH_BASE + 0x20, data),
        )
        .unwrap();

        assert_eq!(
            transport.register_writes(),
            vec![
                (HBUS_TARG_PRPH_WADDR, want_addr_reg),
                (HBUS_TARG_PRPH_WDAT, want_data_reg),
            ]
        );
        assert_eq!(transport.hw_grabs(), 1);
        assert_eq!(transport.hw_releases(), 1);
    }
}

#[test]
fn test_word_periphery_write_lands() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    let mut data = Vec::new();
    push_u32(&mut data, 0xAAAA_0001);
    push_u32(&mut data, 0xAAAA_0002);
    exec.execute(
        Opcode::MemoryWrite.raw(),
        &mem_write_request(PRPH_BASE + 0x80, &data),
    )
    .unwrap();

    assert_eq!(transport.periphery_word(PRPH_BASE + 0x80), 0xAAAA_0001);
    assert_eq!(transport.periphery_word(PRPH_BASE + 0x84), 0xAAAA_0002);
    assert_eq!(transport.hw_grabs(), 1);
    assert_eq!(transport.hw_releases(), 1);
}

#[test]
fn test_unaligned_long_periphery_write_rejected() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    let err = exec
        .execute(
            Opcode::MemoryWrite.raw(),
            &mem_write_request(PRPH_BASE, &[1, 2, 3, 4, 5]),
        )
        .unwrap_err();
    assert!(matches!(err, DiagError::InvalidArgument { .. }));
    assert_eq!(transport.hw_grabs(), 0);
}

#[test]
fn test_device_memory_write_drops_trailing_bytes() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    // Six bytes to ordinary memory: one whole word lands, the tail is
    // dropped, exactly as the bulk path has always behaved.
    exec.execute(
        Opcode::MemoryWrite.raw(),
        &mem_write_request(0x2000, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
    )
    .unwrap();

    assert_eq!(transport.memory_word(0x2000), 0x4433_2211);
    assert_eq!(transport.memory_word(0x2004), 0);
}

// ── Info reporters ───────────────────────────────────────────────────────────

#[test]
fn test_device_info_layout() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport);

    let resp = exec.execute(Opcode::DeviceInfo.raw(), &[]).unwrap();

    let version = "wavenic 0.3.0";
    assert_eq!(resp.len(), 20 + version.len() + 1);
    assert_eq!(word_at(&resp, 0), 0x7100);
    assert_eq!(word_at(&resp, 4), 0x1AE9);
    assert_eq!(word_at(&resp, 8), 3);
    assert_eq!(word_at(&resp, 12), 0x2A07_0000);
    assert_eq!(word_at(&resp, 16), 0);
    assert_eq!(&resp.as_bytes()[20..20 + version.len()], version.as_bytes());
    assert_eq!(*resp.as_bytes().last().unwrap(), 0); // NUL terminator
}

#[test]
fn test_firmware_info_bitmaps() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport);

    let resp = exec.execute(Opcode::FirmwareInfo.raw(), &[]).unwrap();

    assert_eq!(word_at(&resp, 0), 42);
    assert_eq!(word_at(&resp, 4), 7);
    assert_eq!(word_at(&resp, 8), 0x00C0_FFEE);
    assert_eq!(word_at(&resp, 12), 8); // api bitmap bytes
    assert_eq!(word_at(&resp, 16), 8); // capa bitmap bytes
    assert_eq!(resp.len(), 20 + 8 + 8);

    // 40 supported API indices out of 64: bits 0..31 then 32..39.
    assert_eq!(word_at(&resp, 20), 0xFFFF_FFFF);
    assert_eq!(word_at(&resp, 24), 0x0000_00FF);

    // Capability indices 1 and 5.
    assert_eq!(word_at(&resp, 28), (1 << 1) | (1 << 5));
    assert_eq!(word_at(&resp, 32), 0);
}

// ── Firmware command relay ───────────────────────────────────────────────────

#[test]
fn test_host_command_without_reply() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    let resp = exec
        .execute(
            Opcode::HostCommand.raw(),
            &host_cmd_request(0x88, false, &[0xDE, 0xAD]),
        )
        .unwrap();

    assert!(resp.is_empty());
    assert_eq!(
        transport.sent_commands(),
        vec![(0x88, vec![0xDE, 0xAD], false)]
    );
}

#[test]
fn test_host_command_with_reply_envelope() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    let reply: &[u8] = &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
    transport.push_reply(Bytes::from_static(reply));

    let resp = exec
        .execute(Opcode::HostCommand.raw(), &host_cmd_request(0x42, true, &[]))
        .unwrap();

    assert_eq!(resp.len(), 12 + reply.len());
    assert_eq!(word_at(&resp, 0), 0x42);
    assert_eq!(word_at(&resp, 8), reply.len() as u32);
    assert_eq!(&resp.as_bytes()[12..], reply);
}

#[test]
fn test_host_command_missing_reply_is_transport_failure() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport);

    let err = exec
        .execute(Opcode::HostCommand.raw(), &host_cmd_request(0x42, true, &[]))
        .unwrap_err();
    assert!(matches!(err, DiagError::Transport { .. }));
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_opcode_not_supported() {
    let transport = Arc::new(SoftwareTransport::new());
    let exec = executor(transport.clone());

    for opcode in [0, 7, 0x100, u32::MAX] {
        let err = exec.execute(opcode, &[]).unwrap_err();
        assert!(matches!(err, DiagError::NotSupported { .. }));
    }
    // The liveness reference was still taken and returned each time.
    assert_eq!(transport.liveness_refs(), 4);
    assert_eq!(transport.liveness_unrefs(), 4);
}

// ── Event forwarding ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RecordingSink {
    received: Mutex<Vec<(u32, Bytes)>>,
}

impl EventSink for RecordingSink {
    fn deliver(&self, notification: u32, packet: Bytes) -> wavenic_diag::Result<()> {
        self.received.lock().unwrap().push((notification, packet));
        Ok(())
    }
}

fn executor_with_sink(
    transport: Arc<SoftwareTransport>,
    sink: Arc<RecordingSink>,
) -> DiagExecutor {
    DiagExecutor::new(DeviceContext::new(transport, identity(), firmware(), sink))
}

#[test]
fn test_event_forwarding_includes_length_word() {
    let transport = Arc::new(SoftwareTransport::new());
    let sink = Arc::new(RecordingSink::default());
    let exec = executor_with_sink(transport, sink.clone());

    // Frame of 12 bytes, flag bits above the size mask set, 4 bytes of
    // trailing slack that must not be forwarded.
    let mut raw = Vec::new();
    push_u32(&mut raw, 12 | 0x8000_0000);
    raw.extend_from_slice(&[0xA0; 16]);
    let raw = Bytes::from(raw);

    exec.forward_event(&raw);

    let received = sink.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (notification, packet) = &received[0];
    assert_eq!(*notification, FW_EVENT_NOTIFICATION);
    assert_eq!(packet.len(), 16); // 12-byte frame + the 4-byte length word
    assert_eq!(&packet[..], &raw[..16]);
}

#[test]
fn test_runt_and_truncated_events_dropped() {
    let transport = Arc::new(SoftwareTransport::new());
    let sink = Arc::new(RecordingSink::default());
    let exec = executor_with_sink(transport, sink.clone());

    exec.forward_event(&Bytes::from_static(&[0x01, 0x02]));

    let mut truncated = Vec::new();
    push_u32(&mut truncated, 100);
    truncated.extend_from_slice(&[0; 8]);
    exec.forward_event(&Bytes::from(truncated));

    assert!(sink.received.lock().unwrap().is_empty());
}
