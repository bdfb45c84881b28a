use sigmadsp::adau14xx::{SAFELOAD_ADDRESS_REGISTER, SAFELOAD_COUNT_REGISTER};
use sigmadsp::conversion::{clamp, db_to_linear, linear_to_db};
use sigmadsp::memory_transport::TransportOp;
use sigmadsp::{new_dsp, ChipFamily, Dsp, DspCore, MemoryTransport, SigmaDspError};

fn dsp(family: ChipFamily, use_safeload: bool) -> (Box<dyn Dsp>, MemoryTransport) {
    let bus = MemoryTransport::new();
    let core = DspCore::new(Box::new(bus.clone()), use_safeload);
    (new_dsp(family, core), bus)
}

#[test]
fn software_safeload_never_writes_the_target() {
    let (mut dsp, bus) = dsp(ChipFamily::Adau14xx, true);
    dsp.safeload(0x1000, &[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
    let writes = bus.writes();
    assert!(writes.iter().all(|(a, _)| *a != 0x1000));
    assert_eq!(
        &writes[writes.len() - 2..],
        &[
            (SAFELOAD_ADDRESS_REGISTER, vec![0, 0, 0x10, 0x00]),
            (SAFELOAD_COUNT_REGISTER, vec![0, 0, 0, 1]),
        ]
    );
}

#[test]
fn capacity_errors_leave_the_bus_untouched() {
    for family in [ChipFamily::Adau14xx, ChipFamily::Adau1x0x] {
        let (mut dsp, bus) = dsp(family, true);
        let err = dsp.safeload(0x0000, &[0u8; 6 * 4]).unwrap_err();
        assert!(matches!(err, SigmaDspError::SafeloadCapacityExceeded { requested: 6, .. }));
        assert!(bus.ops().is_empty(), "{family}");
    }
}

#[test]
fn hardware_safeload_reads_control_before_committing() {
    let (mut dsp, bus) = dsp(ChipFamily::Adau1x0x, true);
    dsp.safeload(0x0008, &[1, 2, 3, 4]).unwrap();
    let ops = bus.ops();
    assert!(matches!(
        ops[ops.len() - 2],
        TransportOp::Read { address: 0x081C, length: 2 }
    ));
    assert_eq!(
        ops.last(),
        Some(&TransportOp::Write {
            address: 0x081C,
            data: vec![0x00, 0x20]
        })
    );
}

#[test]
fn adjust_volume_from_half_scale() {
    let (mut dsp, bus) = dsp(ChipFamily::Adau14xx, false);
    bus.set_register(0x0050, &[0x00, 0x80, 0x00, 0x00]);
    let realized = dsp.adjust_volume(6.0, 0x0050).unwrap();
    let expected = linear_to_db(clamp(db_to_linear(linear_to_db(0.5) + 6.0), 0.0, 1.0));
    assert!((realized - expected).abs() < 1e-4, "{realized} vs {expected}");
    assert!(realized <= 0.0);
}

#[test]
fn adjust_volume_is_capped_at_unity() {
    let (mut dsp, bus) = dsp(ChipFamily::Adau1x0x, false);
    bus.set_register(0x0050, &[0x00, 0x40, 0x00, 0x00]);
    assert_eq!(dsp.adjust_volume(20.0, 0x0050).unwrap(), 0.0);
    assert_eq!(bus.register(0x0050), Some(vec![0x00, 0x80, 0x00, 0x00]));
}

#[test]
fn setting_the_same_volume_twice_is_stable() {
    for family in [ChipFamily::Adau14xx, ChipFamily::Adau1x0x] {
        let (mut dsp, _bus) = dsp(family, false);
        for db in [-60.0, -20.5, -3.0, 0.0, 12.0] {
            let first = dsp.set_volume(db, 0x0060, false).unwrap();
            let second = dsp.set_volume(db, 0x0060, false).unwrap();
            assert_eq!(first, second, "{family} at {db} dB");
        }
    }
}

#[test]
fn volume_through_safeload() {
    let (mut dsp, bus) = dsp(ChipFamily::Adau14xx, true);
    dsp.set_volume(0.0, 0x0070, false).unwrap();
    // the memory map does not apply safeloads, the staged word is in the first data register
    assert_eq!(bus.register(0x6000), Some(vec![0x01, 0x00, 0x00, 0x00]));
    assert_eq!(bus.register(SAFELOAD_ADDRESS_REGISTER), Some(vec![0, 0, 0, 0x70]));
}

#[test]
fn silence_is_minus_infinity() {
    let (mut dsp, _bus) = dsp(ChipFamily::Adau14xx, false);
    assert_eq!(dsp.set_volume(f64::NEG_INFINITY, 0x0080, false).unwrap(), f64::NEG_INFINITY);
}
