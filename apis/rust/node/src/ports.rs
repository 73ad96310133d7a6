use conduit_communication_layer::{BoxError, CommunicationLayer, PortEvent, Publisher, Subscriber};
use conduit_message::{
    descriptor::{ComponentDescription, Direction},
    Packet, PortId,
};

use crate::{NodeRunConfig, StartupError};

/// A bound input port.
pub struct InputPort {
    id: PortId,
    subscriber: Box<dyn Subscriber>,
}

impl InputPort {
    pub fn new(id: PortId, subscriber: Box<dyn Subscriber>) -> Self {
        Self { id, subscriber }
    }

    pub fn id(&self) -> &PortId {
        &self.id
    }

    pub fn events(&self) -> &flume::Receiver<PortEvent> {
        self.subscriber.events()
    }
}

/// A connected output port.
pub struct OutputPort {
    id: PortId,
    publisher: Box<dyn Publisher>,
}

impl OutputPort {
    pub fn new(id: PortId, publisher: Box<dyn Publisher>) -> Self {
        Self { id, publisher }
    }

    pub fn send(&mut self, packet: &Packet) -> Result<(), BoxError> {
        self.publisher.publish(packet)
    }
}

enum Port {
    Input(InputPort),
    Output(OutputPort),
}

impl Port {
    fn id(&self) -> &PortId {
        match self {
            Port::Input(port) => &port.id,
            Port::Output(port) => &port.id,
        }
    }

    fn close(&mut self) {
        match self {
            Port::Input(port) => port.subscriber.close(),
            Port::Output(port) => port.publisher.close(),
        }
    }
}

/// The ports of a component, in the order they were opened.
///
/// Ports are closed exactly once, in reverse order, either through
/// [`Ports::close`] or on drop.
pub struct Ports {
    ports: Vec<Port>,
    closed: bool,
}

impl Ports {
    /// Opens all configured ports of the component.
    ///
    /// If a port fails to open, the ports opened before it are closed again.
    pub fn open(
        description: &ComponentDescription,
        config: &NodeRunConfig,
        layer: &mut dyn CommunicationLayer,
    ) -> Result<Self, StartupError> {
        let mut ports = Ports::empty();
        for resolved in config.resolve(description)? {
            let open_error = |source: BoxError| StartupError::OpenPort {
                port: resolved.id.clone(),
                address: resolved.address.clone(),
                source,
            };
            match resolved.direction {
                Direction::Input => {
                    let subscriber = layer.bind(&resolved.address).map_err(open_error)?;
                    tracing::debug!("bound {}={}", resolved.id, resolved.address);
                    ports.push_input(InputPort::new(resolved.id.clone(), subscriber));
                }
                Direction::Output => {
                    let publisher = layer.connect(&resolved.address).map_err(open_error)?;
                    tracing::debug!("connecting {}={}", resolved.id, resolved.address);
                    ports.push_output(OutputPort::new(resolved.id.clone(), publisher));
                }
            }
        }
        Ok(ports)
    }

    pub fn empty() -> Self {
        Self {
            ports: Vec::new(),
            closed: false,
        }
    }

    pub fn push_input(&mut self, port: InputPort) {
        self.ports.push(Port::Input(port));
    }

    pub fn push_output(&mut self, port: OutputPort) {
        self.ports.push(Port::Output(port));
    }

    pub fn input(&self, id: &str) -> Option<&InputPort> {
        self.ports.iter().find_map(|port| match port {
            Port::Input(input) if input.id.as_str() == id => Some(input),
            _ => None,
        })
    }

    pub fn output_mut(&mut self, id: &str) -> Option<&mut OutputPort> {
        self.ports.iter_mut().find_map(|port| match port {
            Port::Output(output) if output.id.as_str() == id => Some(output),
            _ => None,
        })
    }

    /// Closes all ports in reverse opening order. Later calls do nothing.
    pub fn close(&mut self) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }
        for port in self.ports.iter_mut().rev() {
            port.close();
            tracing::debug!("closed port `{}`", port.id());
        }
    }
}

impl Drop for Ports {
    fn drop(&mut self) {
        self.close();
    }
}
