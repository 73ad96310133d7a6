use std::collections::BTreeMap;

use conduit_communication_layer::PortAddress;
use conduit_message::{
    descriptor::{ComponentDescription, Direction},
    PortId,
};

use crate::StartupError;

/// Flags shared by all component binaries.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CommonArgs {
    /// Print the component description in JSON and exit.
    #[arg(long)]
    pub json: bool,
    /// Enable debug mode.
    #[arg(long)]
    pub debug: bool,
}

/// Port addresses of one component instance, as handed over by the launcher.
///
/// Assembled once at startup and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRunConfig {
    addresses: BTreeMap<PortId, String>,
}

/// A port with a parsed address, ready to be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPort {
    /// `out[1]` for elements of array ports, the declared name otherwise.
    pub id: PortId,
    pub direction: Direction,
    pub address: PortAddress,
}

impl NodeRunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw address of `port`. Blank addresses count as missing.
    pub fn with_address(mut self, port: &str, address: impl Into<String>) -> Self {
        self.set_address(port, Some(address.into()));
        self
    }

    pub fn set_address(&mut self, port: &str, address: Option<String>) {
        match address {
            Some(address) if !address.trim().is_empty() => {
                self.addresses.insert(port.into(), address);
            }
            _ => {
                self.addresses.remove(port);
            }
        }
    }

    pub fn address(&self, port: &str) -> Option<&str> {
        self.addresses.get(port).map(String::as_str)
    }

    /// Matches the configured addresses against the declared ports.
    ///
    /// Ports are returned in declaration order, inputs first. Optional ports
    /// without an address are left out.
    pub fn resolve(
        &self,
        description: &ComponentDescription,
    ) -> Result<Vec<ResolvedPort>, StartupError> {
        if let Some(unknown) = self
            .addresses
            .keys()
            .find(|name| description.port(name).is_none())
        {
            return Err(StartupError::UnknownPort(unknown.clone()));
        }

        let mut resolved = Vec::new();
        for (direction, port) in description.ports() {
            let Some(raw) = self.address(&port.name) else {
                if port.required {
                    return Err(StartupError::MissingAddress(port.name.clone()));
                }
                continue;
            };
            let parse = |raw: &str| {
                raw.parse::<PortAddress>()
                    .map_err(|source| StartupError::InvalidAddress {
                        port: port.name.clone(),
                        source,
                    })
            };

            if port.array {
                let entries: Vec<_> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .collect();
                if entries.is_empty() {
                    return Err(StartupError::MissingAddress(port.name.clone()));
                }
                for (index, entry) in entries.into_iter().enumerate() {
                    resolved.push(ResolvedPort {
                        id: PortId::indexed(&port.name, index),
                        direction,
                        address: parse(entry)?,
                    });
                }
            } else {
                resolved.push(ResolvedPort {
                    id: port.name.clone(),
                    direction,
                    address: parse(raw)?,
                });
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use conduit_message::descriptor::{PortDescription, PortRole};

    use super::*;

    fn description() -> ComponentDescription {
        ComponentDescription::new("test/fanout", "test component")
            .input(PortDescription::new("in", PortRole::Primary, "all", ""))
            .output(PortDescription::new("out", PortRole::Data, "all", "").array())
            .output(PortDescription::new("err", PortRole::Error, "string", "").optional())
    }

    #[test]
    fn resolves_in_declaration_order() {
        let config = NodeRunConfig::new()
            .with_address("out", "mem://a, mem://b ,,mem://c")
            .with_address("in", "tcp://127.0.0.1:5000");

        let resolved = config.resolve(&description()).unwrap();
        let ids: Vec<_> = resolved.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["in", "out[0]", "out[1]", "out[2]"]);
        assert_eq!(resolved[0].direction, Direction::Input);
        assert_eq!(resolved[2].address, PortAddress::Memory("b".into()));
    }

    #[test]
    fn missing_required_address_is_fatal() {
        let config = NodeRunConfig::new().with_address("in", "mem://in");
        assert!(matches!(
            config.resolve(&description()),
            Err(StartupError::MissingAddress(port)) if port.as_str() == "out"
        ));

        let blank = config.clone().with_address("out", "  ");
        assert!(blank.resolve(&description()).is_err());

        let only_commas = config.with_address("out", " , ,");
        assert!(matches!(
            only_commas.resolve(&description()),
            Err(StartupError::MissingAddress(_))
        ));
    }

    #[test]
    fn optional_port_may_be_missing() {
        let config = NodeRunConfig::new()
            .with_address("in", "mem://in")
            .with_address("out", "mem://out");
        let resolved = config.resolve(&description()).unwrap();
        assert!(resolved.iter().all(|p| p.id.as_str() != "err"));
    }

    #[test]
    fn rejects_unknown_ports_and_bad_addresses() {
        let unknown = NodeRunConfig::new().with_address("bogus", "mem://x");
        assert!(matches!(
            unknown.resolve(&description()),
            Err(StartupError::UnknownPort(_))
        ));

        let bad = NodeRunConfig::new()
            .with_address("in", "udp://1.2.3.4:5")
            .with_address("out", "mem://out");
        assert!(matches!(
            bad.resolve(&description()),
            Err(StartupError::InvalidAddress { .. })
        ));
    }
}
