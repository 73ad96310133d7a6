use conduit_communication_layer::PortEvent;
use conduit_message::PacketKind;

use crate::{ports::InputPort, ShutdownSignal};

/// Result of waiting for the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome<T> {
    Configured(T),
    Interrupted,
}

/// Blocks until the first valid data packet on `port` parses successfully.
///
/// Invalid packets, brackets and packets that fail to parse are logged and
/// skipped. There is no timeout: only a shutdown request ends the wait
/// without a value.
pub fn await_config<T, E, F>(
    port: &InputPort,
    shutdown: &ShutdownSignal,
    mut parse: F,
) -> GateOutcome<T>
where
    F: FnMut(&[u8]) -> Result<T, E>,
    E: std::fmt::Display,
{
    tracing::debug!("waiting for configuration on `{}`", port.id());
    let mut port_alive = true;
    loop {
        if shutdown.is_triggered() {
            return GateOutcome::Interrupted;
        }
        if !port_alive {
            shutdown.wait();
            return GateOutcome::Interrupted;
        }

        let event = flume::Selector::new()
            .recv(shutdown.receiver(), |_| None)
            .recv(port.events(), |event| {
                Some(event.unwrap_or_else(|_| {
                    tracing::warn!("configuration port `{}` shut down", port.id());
                    port_alive = false;
                    PortEvent::Disconnected
                }))
            })
            .wait();
        let Some(event) = event else {
            return GateOutcome::Interrupted;
        };

        let packet = match event {
            PortEvent::Packet(packet) => packet,
            PortEvent::Disconnected => {
                tracing::debug!("peer of configuration port `{}` disconnected", port.id());
                continue;
            }
            PortEvent::Error(err) => {
                tracing::warn!("receive error on `{}`: {err}", port.id());
                continue;
            }
        };

        match packet.check() {
            Ok(PacketKind::Data) => {}
            Ok(kind) => {
                tracing::debug!("ignoring {kind:?} on configuration port `{}`", port.id());
                continue;
            }
            Err(err) => {
                tracing::warn!("invalid configuration packet on `{}`: {err}", port.id());
                continue;
            }
        }
        let payload = packet.payload().unwrap_or_default();
        match parse(payload) {
            Ok(value) => {
                tracing::debug!("configuration received on `{}`", port.id());
                return GateOutcome::Configured(value);
            }
            Err(err) => {
                tracing::warn!("failed to parse configuration on `{}`: {err}", port.id());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use conduit_communication_layer::{memory::MemoryLayer, CommunicationLayer, PortAddress};
    use conduit_message::Packet;

    use super::*;

    fn bind(layer: &mut MemoryLayer, name: &str) -> InputPort {
        let address = PortAddress::Memory(name.into());
        let subscriber = layer.bind(&address).unwrap();
        InputPort::new(name.into(), subscriber)
    }

    fn parse_number(raw: &[u8]) -> Result<u64, String> {
        std::str::from_utf8(raw)
            .map_err(|err| err.to_string())?
            .trim()
            .parse()
            .map_err(|err: std::num::ParseIntError| err.to_string())
    }

    #[test]
    fn skips_malformed_attempts() {
        let mut layer = MemoryLayer::new();
        let port = bind(&mut layer, "cfg");
        let (_trigger, shutdown) = ShutdownSignal::new();

        let sender = layer.sender("cfg");
        sender.send(Packet::from_frames(vec![]));
        sender.send(Packet::from_frames(vec![b"x".to_vec()]));
        sender.send(Packet::open_bracket());
        sender.event(PortEvent::Error("reset".into()));
        sender.disconnect();
        sender.send(Packet::data("soon"));
        sender.send(Packet::data("42"));
        sender.send(Packet::data("7"));

        assert_eq!(
            await_config(&port, &shutdown, parse_number),
            GateOutcome::Configured(42)
        );
        // the gate stops at the first usable packet
        assert_eq!(
            port.events().try_recv(),
            Ok(PortEvent::Packet(Packet::data("7")))
        );
    }

    #[test]
    fn interrupt_ends_the_wait() {
        let mut layer = MemoryLayer::new();
        let port = bind(&mut layer, "cfg");
        let (trigger, shutdown) = ShutdownSignal::new();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trigger.trigger();
        });
        assert_eq!(
            await_config(&port, &shutdown, parse_number),
            GateOutcome::Interrupted
        );
        handle.join().unwrap();
    }
}
