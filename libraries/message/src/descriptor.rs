//! Self-description of a component.
//!
//! Components print their [`ComponentDescription`] as JSON instead of running
//! when started with `--json`. The external graph composer uses it to find
//! out which ports a component has and which of them must be connected.

use serde::{Deserialize, Serialize};

use crate::id::PortId;

/// # Component description
///
/// ## Example
///
/// ```json
/// {
///   "name": "core/delay",
///   "description": "Forwards packets after a configured delay",
///   "inputs": [
///     { "name": "in", "role": "primary", "type": "all", "required": true, ... }
///   ],
///   "outputs": [ ... ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentDescription {
    /// Name under which the component is registered.
    pub name: String,
    /// One-line summary.
    pub description: String,
    /// Input ports, in the order they are opened.
    #[serde(default)]
    pub inputs: Vec<PortDescription>,
    /// Output ports, in the order they are opened.
    #[serde(default)]
    pub outputs: Vec<PortDescription>,
}

impl ComponentDescription {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, port: PortDescription) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn output(mut self, port: PortDescription) -> Self {
        self.outputs.push(port);
        self
    }

    /// All declared ports with their direction, inputs first.
    pub fn ports(&self) -> impl Iterator<Item = (Direction, &PortDescription)> {
        self.inputs
            .iter()
            .map(|p| (Direction::Input, p))
            .chain(self.outputs.iter().map(|p| (Direction::Output, p)))
    }

    pub fn port(&self, name: &str) -> Option<(Direction, &PortDescription)> {
        self.ports().find(|(_, p)| p.name.as_str() == name)
    }

    /// The input port that drives the steady-state loop.
    pub fn primary_input(&self) -> Option<&PortDescription> {
        self.inputs.iter().find(|p| p.role == PortRole::Primary)
    }

    /// The output port that receives processing errors.
    pub fn error_output(&self) -> Option<&PortDescription> {
        self.outputs.iter().find(|p| p.role == PortRole::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortDescription {
    pub name: PortId,
    pub description: String,
    /// Informal type of the payload, e.g. `string` or `json`.
    #[serde(rename = "type")]
    pub data_type: String,
    pub role: PortRole,
    /// Startup fails if a required port has no address.
    pub required: bool,
    /// Array ports take a comma-separated list of addresses.
    #[serde(default)]
    pub array: bool,
}

impl PortDescription {
    pub fn new(name: &str, role: PortRole, data_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            description: description.to_owned(),
            data_type: data_type.to_owned(),
            role,
            required: true,
            array: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortRole {
    /// The input that is read by the steady-state loop.
    Primary,
    /// An input that is read once, before the steady-state loop starts.
    Config,
    /// A regular output.
    Data,
    /// An output that receives the text of processing errors.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}
