use conduit_communication_layer::{CommunicationLayer, PortEvent};
use conduit_message::{
    descriptor::{ComponentDescription, Direction},
    Packet, PortId, Substream,
};
use eyre::eyre;

use crate::{
    gate::{await_config, GateOutcome},
    policy::{Configuration, Outputs, Policy},
    ports::Ports,
    ComponentState, NodeRunConfig, PolicyError, ShutdownSignal, StartupError,
};

/// Why the steady-state loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Shutdown was requested through the [`ShutdownSignal`].
    Interrupt,
    /// The peer of the primary input unbound.
    Disconnect,
}

/// Counters collected while a component runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Packets received on the primary input, including malformed ones.
    pub received: u64,
    /// Packets the policy handled successfully.
    pub processed: u64,
    pub invalid: u64,
    pub policy_errors: u64,
    pub send_errors: u64,
    pub receive_errors: u64,
    pub terminated_by: Termination,
}

impl RunStats {
    fn new() -> Self {
        Self {
            received: 0,
            processed: 0,
            invalid: 0,
            policy_errors: 0,
            send_errors: 0,
            receive_errors: 0,
            terminated_by: Termination::Interrupt,
        }
    }
}

/// Runs a [`Policy`] on a set of ports.
///
/// The harness owns the ports and the shutdown signal. It waits for the
/// configuration if the policy asks for one, then hands every valid packet
/// of the primary input to the policy and routes the results.
pub struct Component<P: Policy> {
    description: ComponentDescription,
    policy: P,
    ports: Ports,
    primary: PortId,
    shutdown: ShutdownSignal,
    state: ComponentState,
    stats: RunStats,
}

impl<P: Policy> Component<P> {
    /// Opens the ports of the component.
    ///
    /// Fails if a required address is missing, an address is malformed or a
    /// port can't be opened. No port stays open on failure.
    pub fn init(
        description: ComponentDescription,
        config: &NodeRunConfig,
        layer: &mut dyn CommunicationLayer,
        policy: P,
        shutdown: ShutdownSignal,
    ) -> Result<Self, StartupError> {
        let primary = description
            .primary_input()
            .ok_or(StartupError::NoPrimaryInput)?
            .name
            .clone();
        let ports = Ports::open(&description, config, layer)?;

        let mut needed = vec![primary.clone()];
        needed.extend(policy.configuration().port().cloned());
        if let Some(missing) = needed.into_iter().find(|id| ports.input(id).is_none()) {
            return Err(StartupError::MissingAddress(missing));
        }

        Ok(Self {
            description,
            policy,
            ports,
            primary,
            shutdown,
            state: ComponentState::Init,
            stats: RunStats::new(),
        })
    }

    pub fn state(&self) -> ComponentState {
        self.state
    }

    pub fn description(&self) -> &ComponentDescription {
        &self.description
    }

    /// Runs the component until it is interrupted or its primary input
    /// disconnects. All ports are closed before this returns.
    pub fn run(&mut self) -> eyre::Result<RunStats> {
        tracing::info!("starting `{}`", self.description.name);
        let result = self.run_inner();
        if self.state < ComponentState::Terminating {
            self.state.transition(ComponentState::Terminating)?;
        }
        self.ports.close();
        self.state.transition(ComponentState::Terminated)?;

        let stats = result?;
        tracing::info!(
            "`{}` terminated by {:?} after processing {} packets",
            self.description.name,
            stats.terminated_by,
            stats.processed
        );
        Ok(stats)
    }

    fn run_inner(&mut self) -> eyre::Result<RunStats> {
        let config = match self.policy.configuration() {
            Configuration::Static(config) => config,
            Configuration::Gate { port, parse } => {
                self.state.transition(ComponentState::AwaitConfig)?;
                let input = self
                    .ports
                    .input(&port)
                    .ok_or_else(|| eyre!("configuration port `{port}` is not open"))?;
                match await_config(input, &self.shutdown, parse) {
                    GateOutcome::Configured(config) => config,
                    GateOutcome::Interrupted => {
                        tracing::info!("interrupted while waiting for configuration");
                        return Ok(self.finish(Termination::Interrupt));
                    }
                }
            }
        };
        self.state.transition(ComponentState::Running)?;

        let termination = self.steady_loop(&config)?;
        Ok(self.finish(termination))
    }

    fn finish(&mut self, termination: Termination) -> RunStats {
        self.stats.terminated_by = termination;
        self.stats.clone()
    }

    fn steady_loop(&mut self, config: &P::Config) -> eyre::Result<Termination> {
        let events = self
            .ports
            .input(&self.primary)
            .ok_or_else(|| eyre!("primary input `{}` is not open", self.primary))?
            .events()
            .clone();
        let mut substream = Substream::default();

        let termination = loop {
            if self.shutdown.is_triggered() {
                break Termination::Interrupt;
            }
            let event = flume::Selector::new()
                .recv(self.shutdown.receiver(), |_| None)
                .recv(&events, Some)
                .wait();

            let packet = match event {
                None => break Termination::Interrupt,
                Some(Err(flume::RecvError::Disconnected)) => {
                    tracing::warn!("primary input `{}` shut down", self.primary);
                    break Termination::Disconnect;
                }
                Some(Ok(PortEvent::Disconnected)) => {
                    tracing::debug!("peer of `{}` disconnected", self.primary);
                    break Termination::Disconnect;
                }
                Some(Ok(PortEvent::Error(err))) => {
                    self.stats.receive_errors += 1;
                    tracing::warn!("receive error on `{}`: {err}", self.primary);
                    continue;
                }
                Some(Ok(PortEvent::Packet(packet))) => packet,
            };

            self.stats.received += 1;
            if packet.is_empty() {
                tracing::debug!("received disconnect marker on `{}`", self.primary);
                break Termination::Disconnect;
            }
            let checked = packet
                .check()
                .and_then(|kind| substream.track(kind).map(|()| kind));
            if let Err(err) = checked {
                self.stats.invalid += 1;
                tracing::warn!("skipping invalid packet on `{}`: {err}", self.primary);
                continue;
            }

            self.process(packet, config);
        };

        self.state.transition(ComponentState::Terminating)?;
        if substream.depth() > 0 {
            tracing::warn!(
                "{} substream(s) on `{}` were never closed",
                substream.depth(),
                self.primary
            );
        }
        Ok(termination)
    }

    fn process(&mut self, packet: Packet, config: &P::Config) {
        debug_assert!(self.state.accepts_data());
        match self.policy.handle(packet, config) {
            Ok(outputs) => {
                self.stats.processed += 1;
                self.route(outputs);
            }
            Err(err) => {
                self.stats.policy_errors += 1;
                self.report(err);
            }
        }
    }

    fn route(&mut self, outputs: Outputs) {
        for (port, packet) in outputs {
            self.send(&port, &packet);
        }
    }

    fn report(&mut self, err: PolicyError) {
        tracing::warn!("processing failed: {err}");
        let Some(port) = self.description.error_output().map(|p| p.name.clone()) else {
            return;
        };
        if self.ports.output_mut(&port).is_some() {
            self.send(&port, &Packet::data(err.message()));
        }
    }

    fn send(&mut self, port: &PortId, packet: &Packet) {
        match self.ports.output_mut(port) {
            Some(output) => {
                if let Err(err) = output.send(packet) {
                    self.stats.send_errors += 1;
                    tracing::warn!("failed to send to `{port}`: {err}");
                }
            }
            None => match self.description.port(port.base()) {
                Some((Direction::Output, _)) => {
                    tracing::debug!("output `{port}` is not connected, dropping packet");
                }
                _ => tracing::error!("policy routed a packet to undeclared output `{port}`"),
            },
        }
    }
}
