use clap::{Parser, ValueEnum};
use core::cell::RefCell;
use core::convert::Infallible;
use ddb_core::mk_static;
use ddb_core::utils::controllers::motors::{start_auxiliary, Motor, ShieldDrive};
use ddb_core::utils::controllers::sensors::{Distance, DistanceSensor, ProximitySensor, SensorError};
use ddb_core::utils::{AvoidanceController, ControllerConfig, Profile, Side, TELEMETRY_CHANNEL};
use embassy_executor::{Executor, Spawner};
use embedded_hal::delay::DelayNs;
use serde::Deserialize;
use static_cell::StaticCell;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts
{
    /// JSON scenario of sensor frames; a built-in corridor run is used when omitted
    #[clap(long)]
    scenario: Option<PathBuf>,
    /// JSON controller config; overrides the profile preset
    #[clap(long)]
    config: Option<PathBuf>,
    /// robot build preset
    #[clap(long, value_enum, default_value = "vacuum")]
    profile: ProfileArg,
    /// number of ticks to run (defaults to one per scenario frame)
    #[clap(long)]
    ticks: Option<u32>,
    /// print each telemetry report as a JSON line on stdout
    #[clap(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg
{
    Vacuum,
    Rover,
}

impl From<ProfileArg> for Profile
{
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Vacuum => Profile::Vacuum,
            ProfileArg::Rover => Profile::Rover,
        }
    }
}

fn clear() -> bool {
    true
}

/// One tick's worth of sensor input. `forward_cm: null` is a timed-out echo.
#[derive(Debug, Clone, Copy, Deserialize)]
struct Frame
{
    forward_cm: Option<f32>,
    #[serde(default = "clear")]
    left_clear: bool,
    #[serde(default = "clear")]
    right_clear: bool,
}

#[derive(Debug, Deserialize)]
struct Scenario
{
    frames: Vec<Frame>,
}

/// Frames replayed in order; the last one repeats once the script runs out.
struct Script
{
    frames: Vec<Frame>,
    cursor: usize,
}

impl Script
{
    fn advance(&mut self) -> Frame {
        let frame = self.frames[self.cursor.min(self.frames.len() - 1)];
        self.cursor += 1;
        frame
    }

    fn current(&self) -> Frame {
        self.frames[self.cursor.saturating_sub(1).min(self.frames.len() - 1)]
    }
}

/// Rangefinder fed from the script. Each measurement moves to the next frame.
struct ScriptedRange(&'static RefCell<Script>);

impl DistanceSensor for ScriptedRange
{
    fn trigger(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read_echo(&mut self) -> Result<u32, SensorError> {
        Err(SensorError::Timeout)
    }

    fn measure(&mut self) -> Distance {
        match self.0.borrow_mut().advance().forward_cm {
            Some(cm) => Distance::Centimeters(cm),
            None => Distance::Unknown,
        }
    }
}

/// Proximity switch reading the frame the rangefinder last moved to.
struct ScriptedSwitch
{
    script: &'static RefCell<Script>,
    side: Side,
}

impl ProximitySensor for ScriptedSwitch
{
    fn is_clear(&mut self) -> Result<bool, SensorError> {
        let frame = self.script.borrow().current();
        Ok(match self.side {
            Side::Left => frame.left_clear,
            Side::Right => frame.right_clear,
        })
    }
}

/// Motor channel that logs to console instead of driving a bridge.
struct ConsoleMotor
{
    name: &'static str,
}

impl Motor for ConsoleMotor
{
    type Error = Infallible;

    fn run(
        &mut self,
        speed: i16,
    ) -> Result<(), Self::Error> {
        info!(motor = self.name, speed, "run");
        Ok(())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        info!(motor = self.name, "release");
        Ok(())
    }
}

/// Virtual clock: holds advance simulated time instead of sleeping.
#[derive(Default)]
struct SimDelay
{
    elapsed_ns: u64,
}

impl DelayNs for SimDelay
{
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.elapsed_ns += ns as u64;
    }

    fn delay_ms(
        &mut self,
        ms: u32,
    ) {
        self.elapsed_ns += ms as u64 * 1_000_000;
        tracing::debug!(ms, t_ms = self.elapsed_ns / 1_000_000, "hold");
    }
}

type SimController =
    AvoidanceController<ScriptedRange, ScriptedSwitch, ShieldDrive<ConsoleMotor, ConsoleMotor>, SimDelay>;

/// Corridor run touching every rule: open floor, side walls, a dead end, and a dropped echo.
fn corridor() -> Vec<Frame> {
    let frame = |forward_cm, left_clear, right_clear| Frame {
        forward_cm,
        left_clear,
        right_clear,
    };
    vec![
        frame(Some(150.0), true, true),
        frame(Some(120.0), true, true),
        frame(Some(90.0), false, true),
        frame(Some(80.0), true, false),
        frame(Some(20.0), true, true),
        frame(Some(15.0), false, true),
        frame(None, true, true),
        frame(Some(200.0), true, true),
    ]
}

fn load(opts: &Opts) -> Result<(ControllerConfig, Vec<Frame>), String> {
    let config = match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("reading {}: {e}", path.display()))?;
            serde_json::from_str::<ControllerConfig>(&text)
                .map_err(|e| format!("parsing {}: {e}", path.display()))?
        }
        None => ControllerConfig::for_profile(opts.profile.into()),
    };
    config.validate().map_err(|e| format!("invalid config: {e}"))?;

    let frames = match &opts.scenario {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("reading {}: {e}", path.display()))?;
            serde_json::from_str::<Scenario>(&text)
                .map_err(|e| format!("parsing {}: {e}", path.display()))?
                .frames
        }
        None => corridor(),
    };
    if frames.is_empty() {
        return Err("scenario has no frames".into());
    }
    Ok((config, frames))
}

#[embassy_executor::task]
async fn telemetry_task(json: bool) -> ! {
    loop {
        let report = TELEMETRY_CHANNEL.receiver().receive().await;
        if json {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{line}"),
                Err(e) => error!("telemetry encode failed: {:?}", e),
            }
        } else {
            info!(
                tick = report.tick,
                reading = ?report.reading,
                maneuver = ?report.maneuver,
                "tick complete"
            );
        }
    }
}

#[embassy_executor::task]
async fn control_task(
    mut ctrl: SimController,
    mut brushes: [ConsoleMotor; 2],
    ticks: u32,
) {
    ctrl.run(Some(ticks)).await;
    while !TELEMETRY_CHANNEL.is_empty() {
        embassy_futures::yield_now().await;
    }
    for brush in brushes.iter_mut() {
        brush.release().unwrap_or_else(|e| match e {});
    }
    let (.., clock) = ctrl.release();
    info!(ticks, sim_ms = clock.elapsed_ns / 1_000_000, "simulation finished");
    std::process::exit(0);
}

#[embassy_executor::task]
async fn main_task(spawner: Spawner) {
    let opts: Opts = Opts::parse();
    let (config, frames) = match load(&opts) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    let ticks = opts.ticks.unwrap_or(frames.len() as u32);
    info!(?config, ticks, "starting avoidance simulation");

    // Brushes run for the whole session; the drive never touches them.
    let mut brushes = [ConsoleMotor { name: "brush-1" }, ConsoleMotor { name: "brush-2" }];
    start_auxiliary(&mut brushes, &config).unwrap_or_else(|e| match e {});

    let script: &'static RefCell<Script> = mk_static!(RefCell<Script>, RefCell::new(Script { frames, cursor: 0 }));
    let drive = ShieldDrive::new(
        ConsoleMotor { name: "left" },
        ConsoleMotor { name: "right" },
        config.polarity,
    );
    let ctrl = AvoidanceController::new(
        ScriptedRange(script),
        ScriptedSwitch {
            script,
            side: Side::Left,
        },
        ScriptedSwitch {
            script,
            side: Side::Right,
        },
        drive,
        SimDelay::default(),
        config,
    );

    spawner.spawn(telemetry_task(opts.json)).unwrap();
    spawner.spawn(control_task(ctrl, brushes, ticks)).unwrap();
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner)).unwrap();
    });
}
