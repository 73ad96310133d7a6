//! Copies every packet to each of its outputs.

use clap::Parser;
use conduit_node_api::{
    conduit_message::descriptor::{ComponentDescription, PortDescription, PortRole},
    CommonArgs, Configuration, NodeRunConfig, Outputs, Packet, Policy, PolicyError, PortId,
    ResolvedPort,
};
use eyre::Context;

#[derive(Debug, Parser)]
#[command(name = "conduit-splitter", about = "Copies packets to several outputs")]
pub struct Args {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Component's input port endpoint
    #[arg(long = "port.in", value_name = "ADDRESS")]
    pub input: Option<String>,
    /// Comma-separated list of output port endpoints
    #[arg(long = "port.out", value_name = "ADDRESSES")]
    pub output: Option<String>,
}

impl Args {
    pub fn run_config(&self) -> NodeRunConfig {
        let mut config = NodeRunConfig::new();
        config.set_address("in", self.input.clone());
        config.set_address("out", self.output.clone());
        config
    }
}

pub fn description() -> ComponentDescription {
    ComponentDescription::new("core/splitter", "Copies incoming packets to every output")
        .input(PortDescription::new(
            "in",
            PortRole::Primary,
            "all",
            "Input port for packets to be copied",
        ))
        .output(
            PortDescription::new(
                "out",
                PortRole::Data,
                "all",
                "Comma-separated list of output port endpoints",
            )
            .array(),
        )
}

/// Sends a copy of each packet to `out[0]`, `out[1]`, ... in that order.
///
/// A failed send doesn't stop the remaining copies.
#[derive(Debug, Clone)]
pub struct Splitter {
    outputs: Vec<PortId>,
}

impl Splitter {
    pub fn new(outputs: Vec<PortId>) -> Self {
        Self { outputs }
    }

    /// Uses the elements of the `out` array port, in declaration order.
    pub fn from_resolved(ports: &[ResolvedPort]) -> Self {
        let outputs = ports
            .iter()
            .filter(|port| port.id.base() == "out")
            .enumerate()
            .map(|(i, port)| {
                tracing::info!("OUT[{i}]={}", port.address);
                port.id.clone()
            })
            .collect();
        Self::new(outputs)
    }

    pub fn outputs(&self) -> &[PortId] {
        &self.outputs
    }
}

impl Policy for Splitter {
    type Config = ();

    fn configuration(&self) -> Configuration<()> {
        Configuration::Static(())
    }

    fn handle(&mut self, packet: Packet, _: &()) -> Result<Outputs, PolicyError> {
        Ok(self
            .outputs
            .iter()
            .map(|port| (port.clone(), packet.clone()))
            .collect())
    }
}

pub fn lib_main() -> eyre::Result<()> {
    let args = Args::parse();
    if args.common.json {
        return conduit_node_api::print_description(&description());
    }
    conduit_node_api::set_up_tracing(args.common.debug)?;

    let config = args.run_config();
    let ports = config
        .resolve(&description())
        .context("invalid port configuration")?;
    let splitter = Splitter::from_resolved(&ports);

    let stats = conduit_node_api::run_node(description(), &config, splitter)?;
    tracing::debug!("{stats:?}");
    Ok(())
}
