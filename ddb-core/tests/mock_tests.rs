use std::io::ErrorKind;

use ddb_core::utils::config::{ControllerConfig, Profile};
use ddb_core::utils::controllers::motors::{
    start_auxiliary, DifferentialDrive, Motor, MotorChannel, ShieldDrive,
};
use ddb_core::utils::controllers::sensors::{
    Distance, DistanceSensor, HcSr04, IrProximity, ProximitySensor, SensorError,
};
use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTrans};
use embedded_hal_mock::eh1::pwm::{Mock as PwmMock, Transaction as PwmTrans};
use embedded_hal_mock::eh1::MockError;

/// Trigger pin transactions for one ranging pulse.
fn trigger_pulse() -> Vec<PinTrans> {
    vec![
        PinTrans::set(State::Low),
        PinTrans::set(State::High),
        PinTrans::set(State::Low),
    ]
}

/// Echo pin reads: `low` polls before the rising edge, then `high` polls before the fall.
fn echo_reads(
    low: usize,
    high: usize,
    falls: bool,
) -> Vec<PinTrans> {
    let mut reads = vec![PinTrans::get(State::Low); low];
    reads.extend(vec![PinTrans::get(State::High); high]);
    if falls {
        reads.push(PinTrans::get(State::Low));
    }
    reads
}

/// Transactions of a channel built by `MotorChannel::new` (max duty read, then released).
fn channel_setup(max_duty: u16) -> (Vec<PwmTrans>, Vec<PinTrans>, Vec<PinTrans>) {
    (
        vec![PwmTrans::max_duty_cycle(max_duty), PwmTrans::set_duty_cycle(0)],
        vec![PinTrans::set(State::Low)],
        vec![PinTrans::set(State::Low)],
    )
}

fn finish(channel: MotorChannel<PwmMock, PinMock, PinMock>) {
    let (mut pwm, mut a, mut b) = channel.into_parts();
    pwm.done();
    a.done();
    b.done();
}

#[test]
fn test_ir_proximity_is_active_low() {
    let pin = PinMock::new(&[PinTrans::get(State::High), PinTrans::get(State::Low)]);
    let mut ir = IrProximity::new(pin);
    assert_eq!(ir.is_clear(), Ok(true));
    assert_eq!(ir.is_clear(), Ok(false));
    ir.release().done();
}

#[test]
fn test_hc_sr04_measures_pulse_width() {
    // Rising edge on the second poll, then three more high polls: 30 µs wide.
    let trig = PinMock::new(&trigger_pulse());
    let echo = PinMock::new(&echo_reads(1, 4, true));
    let mut sensor = HcSr04::with_timeout(trig, echo, NoopDelay::new(), 100);

    assert_eq!(sensor.measure(), Distance::from_echo_us(30));

    let (mut trig, mut echo, _) = sensor.release();
    trig.done();
    echo.done();
}

#[test]
fn test_hc_sr04_missing_echo_is_unknown() {
    // Timeout of 30 µs at a 10 µs poll step: reads at 0, 10, 20, 30.
    let trig = PinMock::new(&trigger_pulse());
    let echo = PinMock::new(&echo_reads(4, 0, false));
    let mut sensor = HcSr04::with_timeout(trig, echo, NoopDelay::new(), 30);

    assert_eq!(sensor.measure(), Distance::Unknown);

    let (mut trig, mut echo, _) = sensor.release();
    trig.done();
    echo.done();
}

#[test]
fn test_hc_sr04_stuck_high_echo_is_unknown() {
    let trig = PinMock::new(&trigger_pulse());
    let echo = PinMock::new(&echo_reads(0, 5, false));
    let mut sensor = HcSr04::with_timeout(trig, echo, NoopDelay::new(), 30);

    assert_eq!(sensor.measure(), Distance::Unknown);

    let (mut trig, mut echo, _) = sensor.release();
    trig.done();
    echo.done();
}

#[test]
fn test_hc_sr04_zero_width_echo_is_unknown() {
    let trig = PinMock::new(&trigger_pulse());
    let echo = PinMock::new(&echo_reads(0, 1, true));
    let mut sensor = HcSr04::with_timeout(trig, echo, NoopDelay::new(), 100);

    assert_eq!(sensor.measure(), Distance::Unknown);

    let (mut trig, mut echo, _) = sensor.release();
    trig.done();
    echo.done();
}

#[test]
fn test_hc_sr04_uses_configured_echo_timeout() {
    // 20 µs budget: reads at 0, 10, 20, then give up.
    let config = ControllerConfig {
        echo_timeout_us: 20,
        ..ControllerConfig::default()
    };
    let trig = PinMock::new(&trigger_pulse());
    let echo = PinMock::new(&echo_reads(3, 0, false));
    let mut sensor = HcSr04::from_config(trig, echo, NoopDelay::new(), &config);

    assert_eq!(sensor.measure(), Distance::Unknown);

    let (mut trig, mut echo, _) = sensor.release();
    trig.done();
    echo.done();
}

#[test]
fn test_hc_sr04_trigger_pin_fault_is_unknown() {
    let trig = PinMock::new(&[
        PinTrans::set(State::Low).with_error(MockError::Io(ErrorKind::NotConnected))
    ]);
    let echo = PinMock::new(&[]);
    let mut sensor = HcSr04::new(trig, echo, NoopDelay::new());

    assert_eq!(sensor.trigger(), Err(SensorError::Disconnected));
    let (mut trig, mut echo, _) = sensor.release();
    trig.done();
    echo.done();

    let trig = PinMock::new(&[
        PinTrans::set(State::Low).with_error(MockError::Io(ErrorKind::NotConnected))
    ]);
    let echo = PinMock::new(&[]);
    let mut sensor = HcSr04::new(trig, echo, NoopDelay::new());

    assert_eq!(sensor.measure(), Distance::Unknown);
    let (mut trig, mut echo, _) = sensor.release();
    trig.done();
    echo.done();
}

#[test]
fn test_hc_sr04_echo_pin_fault_is_unknown() {
    let trig = PinMock::new(&trigger_pulse());
    let echo = PinMock::new(&[
        PinTrans::get(State::Low),
        PinTrans::get(State::High).with_error(MockError::Io(ErrorKind::NotConnected)),
    ]);
    let mut sensor = HcSr04::new(trig, echo, NoopDelay::new());

    assert_eq!(sensor.measure(), Distance::Unknown);

    let (mut trig, mut echo, _) = sensor.release();
    trig.done();
    echo.done();
}

#[test]
fn test_ir_proximity_pin_fault_is_reported() {
    let pin = PinMock::new(&[
        PinTrans::get(State::High).with_error(MockError::Io(ErrorKind::NotConnected))
    ]);
    let mut ir = IrProximity::new(pin);
    assert_eq!(ir.is_clear(), Err(SensorError::Disconnected));
    ir.release().done();
}

#[test]
fn test_motor_channel_run_and_release() {
    let (mut pwm, mut a, mut b) = channel_setup(255);
    pwm.extend([PwmTrans::set_duty_cycle(200), PwmTrans::set_duty_cycle(0)]);
    a.extend([PinTrans::set(State::High), PinTrans::set(State::Low)]);
    b.extend([PinTrans::set(State::Low), PinTrans::set(State::Low)]);

    let mut channel =
        MotorChannel::new(PwmMock::new(&pwm), PinMock::new(&a), PinMock::new(&b)).unwrap();
    channel.run(200).unwrap();
    channel.release().unwrap();
    finish(channel);
}

#[test]
fn test_motor_channel_scales_and_clamps_duty() {
    let (mut pwm, mut a, mut b) = channel_setup(1000);
    pwm.extend([
        PwmTrans::set_duty_cycle(200),
        PwmTrans::set_duty_cycle(1000),
        PwmTrans::set_duty_cycle(1000),
    ]);
    a.extend([
        PinTrans::set(State::High),
        PinTrans::set(State::Low),
        PinTrans::set(State::Low),
    ]);
    b.extend([
        PinTrans::set(State::Low),
        PinTrans::set(State::High),
        PinTrans::set(State::High),
    ]);

    let mut channel =
        MotorChannel::new(PwmMock::new(&pwm), PinMock::new(&a), PinMock::new(&b)).unwrap();
    channel.run(51).unwrap();
    channel.run(-255).unwrap();
    channel.run(-300).unwrap();
    finish(channel);
}

#[test]
fn test_shield_drive_applies_polarity_and_spares_brushes() {
    // Left wheel wired inverted: logical forward spins it backward.
    let (mut lp, mut la, mut lb) = channel_setup(255);
    lp.extend([PwmTrans::set_duty_cycle(200), PwmTrans::set_duty_cycle(0)]);
    la.extend([PinTrans::set(State::Low), PinTrans::set(State::Low)]);
    lb.extend([PinTrans::set(State::High), PinTrans::set(State::Low)]);

    let (mut rp, mut ra, mut rb) = channel_setup(255);
    rp.extend([PwmTrans::set_duty_cycle(200), PwmTrans::set_duty_cycle(0)]);
    ra.extend([PinTrans::set(State::High), PinTrans::set(State::Low)]);
    rb.extend([PinTrans::set(State::Low), PinTrans::set(State::Low)]);

    // Brush channels: started once at the vacuum brush speed, never released by the drive.
    let config = ControllerConfig::for_profile(Profile::Vacuum);
    let (mut bp, mut ba, mut bb) = channel_setup(255);
    bp.push(PwmTrans::set_duty_cycle(180));
    ba.push(PinTrans::set(State::High));
    bb.push(PinTrans::set(State::Low));

    let left = MotorChannel::new(PwmMock::new(&lp), PinMock::new(&la), PinMock::new(&lb)).unwrap();
    let right = MotorChannel::new(PwmMock::new(&rp), PinMock::new(&ra), PinMock::new(&rb)).unwrap();
    let mut brushes =
        [MotorChannel::new(PwmMock::new(&bp), PinMock::new(&ba), PinMock::new(&bb)).unwrap()];
    start_auxiliary(&mut brushes, &config).unwrap();

    let mut drive = ShieldDrive::new(left, right, config.polarity);
    drive.drive(200, 200).unwrap();
    drive.stop().unwrap();

    let (left, right) = drive.release();
    finish(left);
    finish(right);
    let [brush] = brushes;
    finish(brush);
}
