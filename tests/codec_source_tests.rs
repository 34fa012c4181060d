//! Codec bring-up tests

mod common;

use audioreactive_input::audio::{CodecSource, ControlBus};
use audioreactive_input::config::ChannelFormat;
use audioreactive_input::hal::codec::{BringUpState, CodecModel, Step};
use audioreactive_input::{
    AudioSource, BusError, CapturePins, DeviceConfig, DriverError, InitError, LineAllocator,
    PinManager, PinOwner,
};
use common::{NoopDelay, RecordingI2c, ScriptedDriver};

const SDA: u8 = 21;
const SCL: u8 = 22;

type Source<'a> = CodecSource<'a, ScriptedDriver<i32>, PinManager, RecordingI2c, NoopDelay>;

fn codec<'a>(model: CodecModel, pins: &'a PinManager, i2c: RecordingI2c) -> Source<'a> {
    let bus = ControlBus::new(i2c, NoopDelay::default(), Some(SDA), Some(SCL));
    CodecSource::new(
        model,
        ScriptedDriver::constant(1 << 16),
        pins,
        DeviceConfig::default(),
        bus,
    )
}

fn wiring() -> CapturePins {
    CapturePins::i2s(15, 32, 14).with_mclk(0)
}

fn register_writes(model: CodecModel) -> usize {
    model
        .init_sequence()
        .iter()
        .filter(|s| matches!(s, Step::Write { .. }))
        .count()
}

#[test]
fn test_full_bring_up() {
    let pins = PinManager::new();
    let mut src = codec(CodecModel::Es8311, &pins, RecordingI2c::new());
    assert_eq!(src.state(), BringUpState::Unconfigured);

    src.initialize(wiring());

    assert!(src.is_initialized());
    assert_eq!(src.state(), BringUpState::CaptureStarted);
    assert_eq!(src.last_init_error(), None);
    assert_eq!(pins.claimed_by(PinOwner::I2c), 2);
    assert_eq!(pins.claimed_by(PinOwner::Audio), 4);

    let writes = &src.bus().i2c.writes;
    assert_eq!(writes.len(), register_writes(CodecModel::Es8311));
    assert!(writes.iter().all(|(addr, bytes)| *addr == 0x18 && bytes.len() == 2));
    assert!(src.last_report().unwrap().all_acked());

    let mut buf = [0.0f32; 32];
    assert_eq!(src.get_samples(&mut buf), 32);
    assert!(buf.iter().all(|&s| s == 1.0));
}

#[test]
fn test_bus_lines_missing() {
    let pins = PinManager::new();
    let bus = ControlBus::new(RecordingI2c::new(), NoopDelay::default(), None, Some(SCL));
    let mut src: Source<'_> = CodecSource::new(
        CodecModel::Es7243,
        ScriptedDriver::new(),
        &pins,
        DeviceConfig::default(),
        bus,
    );

    src.initialize(wiring());

    assert!(!src.is_initialized());
    assert_eq!(src.state(), BringUpState::Unconfigured);
    assert_eq!(src.last_init_error(), Some(InitError::Bus(BusError::Unassigned)));
    assert!(src.bus().i2c.writes.is_empty());
    assert_eq!(src.i2s().driver().install_count, 0);
    assert_eq!(pins.claimed_count(), 0);
    assert_eq!(src.stats().snapshot().init_failures, 1);
}

#[test]
fn test_bus_lines_contended() {
    let pins = PinManager::new();
    pins.claim(SCL, true, PinOwner::Leds).unwrap();
    let mut src = codec(CodecModel::Es8388, &pins, RecordingI2c::new());

    src.initialize(wiring());

    assert_eq!(src.last_init_error(), Some(InitError::Bus(BusError::Contended)));
    assert_eq!(pins.owner_of(SDA), PinOwner::None);
    assert_eq!(pins.owner_of(SCL), PinOwner::Leds);
    assert!(src.bus().i2c.writes.is_empty());
}

#[test]
fn test_bus_already_joined_by_someone_else() {
    let pins = PinManager::new();
    pins.join_bus(Some(SDA), Some(SCL)).unwrap();
    let mut src = codec(CodecModel::Es7243, &pins, RecordingI2c::new());

    src.initialize(wiring());

    assert_eq!(src.state(), BringUpState::CaptureStarted);
    assert_eq!(pins.claimed_by(PinOwner::I2c), 2);
}

#[test]
fn test_dropped_acks_tolerated() {
    let pins = PinManager::new();
    let mut src = codec(CodecModel::Es8311, &pins, RecordingI2c::nack_at(&[0, 3]));

    src.initialize(wiring());

    assert!(src.is_initialized());
    assert_eq!(src.state(), BringUpState::CaptureStarted);

    let report = src.last_report().unwrap();
    assert_eq!(report.failures, 2);
    assert_eq!(report.writes as usize, register_writes(CodecModel::Es8311));
    assert_eq!(
        report.first_failure,
        Some(BusError::Nack { addr: 0x18, reg: 0x00 })
    );
    // Sequence kept going after the NACKs
    assert_eq!(src.bus().i2c.writes.len(), register_writes(CodecModel::Es8311));
}

#[test]
fn test_silent_device_stops_bring_up() {
    let pins = PinManager::new();
    let mut src = codec(CodecModel::Es7243, &pins, RecordingI2c::absent());

    src.initialize(wiring());

    assert!(!src.is_initialized());
    assert_eq!(src.state(), BringUpState::Unconfigured);
    assert_eq!(
        src.last_init_error(),
        Some(InitError::Bus(BusError::Nack { addr: 0x13, reg: 0x00 }))
    );
    assert_eq!(src.i2s().driver().install_count, 0);
    assert_eq!(pins.claimed_count(), 0);
}

#[test]
fn test_i2s_failure_after_programming() {
    let pins = PinManager::new();
    let mut drv = ScriptedDriver::<i32>::new();
    drv.fail_install = Some(-4);
    let bus = ControlBus::new(RecordingI2c::new(), NoopDelay::default(), Some(SDA), Some(SCL));
    let mut src = CodecSource::new(CodecModel::Wm8978, drv, &pins, DeviceConfig::default(), bus);

    src.initialize(wiring());

    assert!(!src.is_initialized());
    assert_eq!(src.state(), BringUpState::Unconfigured);
    assert_eq!(
        src.last_init_error(),
        Some(InitError::DriverInstall(DriverError::new(-4)))
    );
    assert_eq!(pins.claimed_count(), 0);
}

#[test]
fn test_contended_audio_line_gives_back_bus() {
    let pins = PinManager::new();
    pins.claim(14, true, PinOwner::Leds).unwrap();
    let before = pins.claimed_count();
    let mut src = codec(CodecModel::Es8311, &pins, RecordingI2c::new());

    src.initialize(CapturePins::i2s(15, 32, 14));

    assert!(!src.is_initialized());
    assert_eq!(src.state(), BringUpState::Unconfigured);
    assert_eq!(src.last_init_error(), Some(InitError::LineInUse { line: 14 }));
    assert_eq!(pins.claimed_count(), before);
    assert_eq!(pins.owner_of(SDA), PinOwner::None);
    assert_eq!(pins.owner_of(SCL), PinOwner::None);
    assert_eq!(pins.owner_of(14), PinOwner::Leds);
}

#[test]
fn test_failed_bring_up_keeps_existing_bus() {
    let pins = PinManager::new();
    pins.join_bus(Some(SDA), Some(SCL)).unwrap();
    let mut src = codec(CodecModel::Es8388, &pins, RecordingI2c::absent());

    src.initialize(wiring());

    assert!(!src.is_initialized());
    assert_eq!(pins.claimed_by(PinOwner::I2c), 2);
    assert_eq!(pins.claimed_by(PinOwner::Audio), 0);
}

#[test]
fn test_bus_speed_set_before_programming() {
    for (model, hz) in [
        (CodecModel::Es7243, 100_000),
        (CodecModel::Es8388, 100_000),
        (CodecModel::Es8311, 100_000),
        (CodecModel::Wm8978, 400_000),
        (CodecModel::Ac101, 400_000),
    ] {
        let pins = PinManager::new();
        let mut src = codec(model, &pins, RecordingI2c::new());

        src.initialize(wiring());

        assert_eq!(src.bus().i2c.speeds, vec![(hz, 0)], "{:?}", model);
    }
}

#[test]
fn test_bus_speed_refused_is_tolerated() {
    let pins = PinManager::new();
    let i2c = RecordingI2c {
        fail_speed: true,
        ..RecordingI2c::new()
    };
    let mut src = codec(CodecModel::Wm8978, &pins, i2c);

    src.initialize(wiring());

    assert!(src.is_initialized());
    assert_eq!(src.bus().i2c.speeds, vec![(400_000, 0)]);
    assert_eq!(src.bus().i2c.writes.len(), register_writes(CodecModel::Wm8978));
}

#[test]
fn test_no_bus_speed_without_bus() {
    let pins = PinManager::new();
    pins.claim(SDA, true, PinOwner::User).unwrap();
    let mut src = codec(CodecModel::Ac101, &pins, RecordingI2c::new());

    src.initialize(wiring());

    assert!(src.bus().i2c.speeds.is_empty());
}

#[test]
fn test_ac101_reset_delay_and_wide_values() {
    let pins = PinManager::new();
    let mut src = codec(CodecModel::Ac101, &pins, RecordingI2c::new());

    src.initialize(wiring());

    assert_eq!(src.state(), BringUpState::CaptureStarted);
    assert_eq!(src.bus().delay.total_ns, 100_000_000);

    let writes = &src.bus().i2c.writes;
    assert_eq!(writes[0], (0x1A, vec![0x00, 0x01, 0x23]));
    assert!(writes.iter().all(|(_, bytes)| bytes.len() == 3));
}

#[test]
fn test_wm8978_nine_bit_packing() {
    let pins = PinManager::new();
    let mut src = codec(CodecModel::Wm8978, &pins, RecordingI2c::new());

    src.initialize(wiring());

    let writes = &src.bus().i2c.writes;
    // R2 = 0b1_1011_1111: bit 8 rides in the register byte
    assert_eq!(writes[2], (0x1A, vec![(2 << 1) | 1, 0b1011_1111]));
    // R4 = 0b0_0101_0000
    assert_eq!(writes[4], (0x1A, vec![4 << 1, 0b0101_0000]));
    assert_eq!(src.bus().delay.total_ns, 0);
}

#[test]
fn test_codec_fixes_capture_slot() {
    let pins = PinManager::new();
    let src = codec(CodecModel::Es7243, &pins, RecordingI2c::new());
    assert_eq!(src.i2s().config().channel_format, ChannelFormat::OnlyRight);

    let src = codec(CodecModel::Es8388, &pins, RecordingI2c::new());
    assert_eq!(src.i2s().config().channel_format, ChannelFormat::OnlyLeft);
}

#[test]
fn test_deinitialize_keeps_bus() {
    let pins = PinManager::new();
    let mut src = codec(CodecModel::Es8388, &pins, RecordingI2c::new());
    src.initialize(wiring());

    src.deinitialize();
    src.deinitialize();

    assert!(!src.is_initialized());
    assert_eq!(src.state(), BringUpState::Unconfigured);
    assert_eq!(pins.claimed_by(PinOwner::Audio), 0);
    assert_eq!(pins.claimed_by(PinOwner::I2c), 2);

    let mut buf = [1.0f32; 8];
    assert_eq!(src.get_samples(&mut buf), 0);
    assert!(buf.iter().all(|&s| s == 0.0));
}

#[test]
fn test_reinitialize_reprograms() {
    let pins = PinManager::new();
    let mut src = codec(CodecModel::Es7243, &pins, RecordingI2c::new());

    src.initialize(wiring());
    src.deinitialize();
    src.initialize(wiring());

    assert_eq!(src.state(), BringUpState::CaptureStarted);
    assert_eq!(
        src.bus().i2c.writes.len(),
        2 * register_writes(CodecModel::Es7243)
    );
    assert_eq!(src.bus().i2c.speeds.len(), 2);
}
