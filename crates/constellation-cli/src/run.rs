//! Main entrypoint for running Constellation

use std::io::Write as _;

use clap::Parser as _;
use color_eyre::eyre::{ContextCompat as _, Result};
use constellation::simulation::{InputEvent, SimulationContext, TickInput};
use constellation_protocol::{Control, InputMessages, OutputMessages};
use tokio::io::AsyncBufReadExt as _;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

use crate::cli_args::CliArgs;
use crate::config::{Config, LogLevel};

/// The number of microseconds in a second.
pub const ONE_MICROSECOND: u64 = 1_000_000;

/// Whether the host loop should carry on after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Keep going
    Continue,
    /// The host asked us to exit
    End,
}

/// Main entrypoint
pub async fn run() -> Result<()> {
    let cli_args = CliArgs::parse();
    let config = setup(&cli_args)?;

    let mut host = Host::new(
        SimulationContext::new(config.simulation),
        config.tick_rate,
        std::io::stdout(),
    );

    if let Some(ticks) = cli_args.ticks {
        tracing::info!("Running {ticks} headless ticks");
        host.run_headless(ticks)?;
    } else {
        tracing::info!("Running interactively at {} ticks/second", config.tick_rate);
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        host.run_interactive(stdin).await?;
    }

    tracing::trace!("Leaving Constellation's main `run()` function");
    Ok(())
}

/// Prepare the application to start.
fn setup(cli_args: &CliArgs) -> Result<Config> {
    let mut config = Config::load(cli_args.config.as_deref())?;

    if let Some(seed) = cli_args.seed {
        config.simulation.seed = Some(seed);
    }
    if let Some(tick_rate) = cli_args.tick_rate {
        config.tick_rate = tick_rate;
    }
    if let Some(log_level) = cli_args.log_level {
        config.log_level = log_level;
    }
    if let Some(log_path) = cli_args.log_path.clone() {
        config.log_path = log_path;
    }

    setup_logging(&config)?;

    tracing::info!("Starting Constellation");
    tracing::debug!("Loaded config: {config:?}");

    Ok(config)
}

/// Setup logging. STDOUT carries the simulation's output, so logs only ever go to a file.
fn setup_logging(config: &Config) -> Result<()> {
    let are_log_filters_manually_set = std::env::var("CONSTELLATION_LOG").is_ok();
    let level_as_string = format!("{:?}", config.log_level).to_lowercase();

    let is_loggable = !matches!(config.log_level, LogLevel::Off) || are_log_filters_manually_set;
    if !is_loggable {
        return Ok(());
    }

    let directory = config
        .log_path
        .parent()
        .context("Couldn't get log path's parent")?;
    std::fs::create_dir_all(directory)?;
    let file = std::fs::File::create(&config.log_path)?;

    let filters = if are_log_filters_manually_set {
        if let Ok(user_filters) = std::env::var("CONSTELLATION_LOG") {
            std::env::set_var("RUST_LOG", user_filters);
        }

        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("error".parse()?)
            .from_env_lossy()
    } else {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("off".parse()?)
            .from_env_lossy()
            .add_directive(format!("constellation={level_as_string}").parse()?)
            .add_directive(format!("constellation_protocol={level_as_string}").parse()?)
            .add_directive(format!("constellation_cli={level_as_string}").parse()?)
    };

    let logfile_layer = tracing_subscriber::fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_filter(filters);

    tracing_subscriber::registry().with(logfile_layer).init();

    Ok(())
}

/// Owns a simulation and shuttles messages between it and the host process.
pub struct Host<W: std::io::Write> {
    /// The simulation
    context: SimulationContext,
    /// Where frames and events are written, usually STDOUT
    output: W,
    /// Ticks per second when running interactively
    tick_rate: u64,
    /// Input received since the last tick
    pending: Vec<InputEvent>,
    /// The time at which the previous tick happened.
    last_tick: tokio::time::Instant,
}

impl<W: std::io::Write> Host<W> {
    /// Instantiate
    pub fn new(context: SimulationContext, tick_rate: u32, output: W) -> Self {
        Self {
            context,
            output,
            tick_rate: u64::from(tick_rate.max(1)),
            pending: Vec::new(),
            last_tick: tokio::time::Instant::now(),
        }
    }

    /// Tick as fast as possible using the configured time step. Input isn't read.
    pub fn run_headless(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.tick(None)?;
        }
        self.output.flush()?;
        Ok(())
    }

    /// Tick at the configured rate using real elapsed time, applying input as it arrives. Exits
    /// on an `end` message or when the input closes.
    pub async fn run_interactive<R: tokio::io::AsyncBufRead + Unpin>(
        &mut self,
        input: R,
    ) -> Result<()> {
        let mut lines = input.lines();
        self.last_tick = tokio::time::Instant::now();

        #[expect(
            clippy::integer_division_remainder_used,
            reason = "This is caused by the `tokio::select!`"
        )]
        loop {
            tokio::select! {
                dt = self.sleep_until_next_tick() => {
                    self.tick(Some(dt))?;
                },
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        tracing::debug!("Input closed, exiting");
                        break;
                    };
                    if self.handle_line(&line)? == Flow::End {
                        tracing::debug!("Received `end` message, exiting");
                        break;
                    }
                }
            }
        }

        self.output.flush()?;
        Ok(())
    }

    /// Sleep until the next tick is due. Returns the seconds since the previous tick.
    async fn sleep_until_next_tick(&mut self) -> f32 {
        let target = ONE_MICROSECOND.wrapping_div(self.tick_rate);
        let target_tick_rate_micro = std::time::Duration::from_micros(target);
        if let Some(wait) = target_tick_rate_micro.checked_sub(self.last_tick.elapsed()) {
            tokio::time::sleep(wait).await;
        }
        let elapsed = self.last_tick.elapsed().as_secs_f32();
        self.last_tick = tokio::time::Instant::now();
        elapsed
    }

    /// Handle one line of input from the host.
    fn handle_line(&mut self, line: &str) -> Result<Flow> {
        if line.trim().is_empty() {
            return Ok(Flow::Continue);
        }

        let message = match constellation_protocol::decode_input(line) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!("{error}");
                self.send(&OutputMessages::Error {
                    message: error.to_string(),
                })?;
                return Ok(Flow::Continue);
            }
        };

        tracing::trace!("Received message: {message:?}");
        match message {
            InputMessages::Control(Control::Start) => self.context.start(),
            InputMessages::Control(Control::Stop) => self.context.stop(),
            InputMessages::Control(Control::End) => return Ok(Flow::End),
            other => {
                if let Some(event) = other.into_input_event() {
                    self.pending.push(event);
                }
            }
        }

        Ok(Flow::Continue)
    }

    /// Run one tick with all the pending input, and send whatever it produced.
    fn tick(&mut self, dt: Option<f32>) -> Result<()> {
        let mut input = TickInput::default();
        input.dt = dt;
        input.events = std::mem::take(&mut self.pending);

        let output = self.context.tick(&input);
        for message in OutputMessages::from_tick(output) {
            self.send(&message)?;
        }
        Ok(())
    }

    /// Write a single message as a line of JSON.
    fn send(&mut self, message: &OutputMessages) -> Result<()> {
        let json = constellation_protocol::encode_output(message)?;
        self.output.write_all(json.as_bytes())?;
        self.output.write_all(b"\n")?;
        self.output.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn host() -> Host<Vec<u8>> {
        let mut config = constellation::config::Config::default();
        config.seed = Some(1);
        Host::new(SimulationContext::new(config), 60, Vec::new())
    }

    fn lines(host: &Host<Vec<u8>>) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(&host.output)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn frames(host: &Host<Vec<u8>>) -> usize {
        lines(host)
            .iter()
            .filter(|line| line.get("frame").is_some())
            .count()
    }

    #[test]
    fn headless_sends_a_frame_every_tick() {
        let mut host = host();
        host.run_headless(4).unwrap();
        assert_eq!(frames(&host), 4);

        let last = lines(&host).pop().unwrap();
        assert_eq!(last["frame"]["tick"], 4);
    }

    #[test]
    fn stopping_pauses_output() {
        let mut host = host();
        assert_eq!(host.handle_line(r#""stop""#).unwrap(), Flow::Continue);
        host.run_headless(3).unwrap();
        assert_eq!(frames(&host), 0);

        host.handle_line(r#""start""#).unwrap();
        host.run_headless(1).unwrap();
        assert_eq!(frames(&host), 1);
    }

    #[test]
    fn bad_input_is_reported_and_ignored() {
        let mut host = host();
        assert_eq!(host.handle_line("nonsense").unwrap(), Flow::Continue);
        assert_eq!(host.handle_line("   ").unwrap(), Flow::Continue);

        let output = lines(&host);
        assert_eq!(output.len(), 1);
        assert!(output.first().unwrap().get("error").is_some());
    }

    #[test]
    fn input_is_applied_on_the_next_tick() {
        let mut host = host();
        host.handle_line(r#"{"click_create": {"position": [10.0, 10.0]}}"#)
            .unwrap();
        assert_eq!(host.pending.len(), 1);

        host.run_headless(1).unwrap();
        assert!(host.pending.is_empty());
        let created = lines(&host)
            .iter()
            .filter_map(|line| line.get("events"))
            .flat_map(|events| events["events"].as_array().cloned().unwrap_or_default())
            .filter(|event| event.get("particle_created").is_some())
            .count();
        assert!(created >= 1);
    }

    #[tokio::test]
    async fn interactive_exits_on_end() {
        let mut host = host();
        let input: &[u8] = b"\"clear\"\n\"end\"\n\"stop\"\n";
        host.run_interactive(input).await.unwrap();
        assert!(host.context.is_running());
    }

    #[tokio::test]
    async fn interactive_exits_when_input_closes() {
        let mut host = host();
        let input: &[u8] = b"";
        host.run_interactive(input).await.unwrap();
    }
}
