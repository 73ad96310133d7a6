//! Forwards every packet after a fixed delay.
//!
//! The delay is read once from the `delay` port, e.g. `500ms` or `1m 30s`.
//! Packets are handled one at a time, so the delay also limits throughput.

use std::time::Duration;

use clap::Parser;
use conduit_node_api::{
    conduit_message::descriptor::{ComponentDescription, PortDescription, PortRole},
    CommonArgs, Configuration, NodeRunConfig, Outputs, Packet, Policy, PolicyError,
};
use eyre::Context;

#[derive(Debug, Parser)]
#[command(name = "conduit-delay", about = "Forwards packets after a delay")]
pub struct Args {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Component's input port endpoint
    #[arg(long = "port.in", value_name = "ADDRESS")]
    pub input: Option<String>,
    /// Component's delay configuration port endpoint
    #[arg(long = "port.delay", value_name = "ADDRESS")]
    pub delay: Option<String>,
    /// Component's output port endpoint
    #[arg(long = "port.out", value_name = "ADDRESS")]
    pub output: Option<String>,
}

impl Args {
    pub fn run_config(&self) -> NodeRunConfig {
        let mut config = NodeRunConfig::new();
        config.set_address("in", self.input.clone());
        config.set_address("delay", self.delay.clone());
        config.set_address("out", self.output.clone());
        config
    }
}

pub fn description() -> ComponentDescription {
    ComponentDescription::new("core/delay", "Forwards packets after a given delay")
        .input(PortDescription::new(
            "in",
            PortRole::Primary,
            "all",
            "Input port for packets to be delayed",
        ))
        .input(PortDescription::new(
            "delay",
            PortRole::Config,
            "string",
            "Configuration port for the delay, e.g. 500ms or 2s",
        ))
        .output(PortDescription::new(
            "out",
            PortRole::Data,
            "all",
            "Output port for the delayed packets",
        ))
}

/// Sleeps for the configured duration, then forwards the packet unchanged.
#[derive(Debug, Default)]
pub struct Delay;

impl Policy for Delay {
    type Config = Duration;

    fn configuration(&self) -> Configuration<Duration> {
        Configuration::gate("delay", parse_delay)
    }

    fn handle(&mut self, packet: Packet, delay: &Duration) -> Result<Outputs, PolicyError> {
        std::thread::sleep(*delay);
        Ok(Outputs::single("out", packet))
    }
}

pub fn parse_delay(raw: &[u8]) -> eyre::Result<Duration> {
    let text = std::str::from_utf8(raw).context("delay is not valid UTF-8")?;
    let delay = humantime::parse_duration(text.trim())
        .with_context(|| format!("invalid delay `{text}`"))?;
    tracing::info!("using delay {}", humantime::format_duration(delay));
    Ok(delay)
}

pub fn lib_main() -> eyre::Result<()> {
    let args = Args::parse();
    if args.common.json {
        return conduit_node_api::print_description(&description());
    }
    conduit_node_api::set_up_tracing(args.common.debug)?;

    let stats = conduit_node_api::run_node(description(), &args.run_config(), Delay)?;
    tracing::debug!("{stats:?}");
    Ok(())
}
