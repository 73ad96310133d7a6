//! The custom node API allows you to write components of a conduit network in
//! Rust.
//!
//! A component is a [`Policy`] that is driven by the [`Component`] harness:
//!
//! ```no_run
//! use conduit_node_api::{
//!     conduit_message::descriptor::{ComponentDescription, PortDescription, PortRole},
//!     Configuration, NodeRunConfig, Outputs, Packet, Policy, PolicyError,
//! };
//!
//! struct Forward;
//!
//! impl Policy for Forward {
//!     type Config = ();
//!
//!     fn configuration(&self) -> Configuration<()> {
//!         Configuration::Static(())
//!     }
//!
//!     fn handle(&mut self, packet: Packet, _: &()) -> Result<Outputs, PolicyError> {
//!         Ok(Outputs::single("out", packet))
//!     }
//! }
//!
//! let description = ComponentDescription::new("core/forward", "Forwards packets")
//!     .input(PortDescription::new("in", PortRole::Primary, "all", "Input port"))
//!     .output(PortDescription::new("out", PortRole::Data, "all", "Output port"));
//! let config = NodeRunConfig::new()
//!     .with_address("in", "tcp://*:5000")
//!     .with_address("out", "tcp://127.0.0.1:5001");
//! conduit_node_api::run_node(description, &config, Forward)?;
//! # Ok::<(), eyre::Report>(())
//! ```

use conduit_message::descriptor::ComponentDescription;
use eyre::WrapErr;

pub use conduit_communication_layer::{self, PortAddress, PortEvent};
pub use conduit_message::{self, Packet, PacketKind, PortId};
#[cfg(feature = "tracing")]
pub use conduit_tracing::set_up_tracing;
pub use config::{CommonArgs, NodeRunConfig, ResolvedPort};
pub use error::{PolicyError, StartupError};
pub use gate::{await_config, GateOutcome};
pub use harness::{Component, RunStats, Termination};
pub use policy::{Configuration, Outputs, Policy};
pub use ports::{InputPort, OutputPort, Ports};
pub use shutdown::{set_up_ctrlc_handler, ShutdownSignal, ShutdownTrigger};
pub use state::{ComponentState, InvalidTransition};

mod config;
mod error;
mod gate;
mod harness;
mod policy;
mod ports;
mod shutdown;
mod state;

/// Runs `policy` on TCP ports until the primary input disconnects or ctrl-c
/// is pressed.
pub fn run_node<P: Policy>(
    description: ComponentDescription,
    config: &NodeRunConfig,
    policy: P,
) -> eyre::Result<RunStats> {
    let (trigger, shutdown) = ShutdownSignal::new();
    set_up_ctrlc_handler(trigger)?;

    let mut layer = conduit_communication_layer::tcp::TcpLayer::new();
    let name = description.name.clone();
    let mut component = Component::init(description, config, &mut layer, policy, shutdown)
        .wrap_err_with(|| format!("failed to start `{name}`"))?;
    component.run().wrap_err_with(|| format!("`{name}` failed"))
}

/// Prints the description of a component as pretty JSON to stdout.
pub fn print_description(description: &ComponentDescription) -> eyre::Result<()> {
    let json = serde_json::to_string_pretty(description)
        .context("failed to serialize component description")?;
    println!("{json}");
    Ok(())
}
