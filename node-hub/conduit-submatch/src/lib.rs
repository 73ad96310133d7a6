//! Maps the named capture groups of a regular expression to a JSON object.

use std::collections::BTreeMap;

use clap::Parser;
use conduit_node_api::{
    conduit_message::descriptor::{ComponentDescription, PortDescription, PortRole},
    CommonArgs, Configuration, NodeRunConfig, Outputs, Packet, PacketKind, Policy, PolicyError,
};
use eyre::Context;
use regex::Regex;

#[derive(Debug, Parser)]
#[command(
    name = "conduit-submatch",
    about = "Maps regular expression submatches to JSON"
)]
pub struct Args {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Component's pattern configuration port endpoint
    #[arg(long = "port.pattern", value_name = "ADDRESS")]
    pub pattern: Option<String>,
    /// Component's input port endpoint
    #[arg(long = "port.in", value_name = "ADDRESS")]
    pub input: Option<String>,
    /// Component's output port endpoint
    #[arg(long = "port.map", value_name = "ADDRESS")]
    pub map: Option<String>,
}

impl Args {
    pub fn run_config(&self) -> NodeRunConfig {
        let mut config = NodeRunConfig::new();
        config.set_address("pattern", self.pattern.clone());
        config.set_address("in", self.input.clone());
        config.set_address("map", self.map.clone());
        config
    }
}

pub fn description() -> ComponentDescription {
    ComponentDescription::new(
        "core/submatch",
        "Matches strings against a pattern and sends the named submatches as JSON",
    )
    .input(PortDescription::new(
        "pattern",
        PortRole::Config,
        "string",
        "Regular expression with named capture groups",
    ))
    .input(PortDescription::new(
        "in",
        PortRole::Primary,
        "string",
        "Strings to match",
    ))
    .output(PortDescription::new(
        "map",
        PortRole::Data,
        "json",
        "Object mapping group names to submatches",
    ))
}

#[derive(Debug, Default)]
pub struct Submatch;

impl Policy for Submatch {
    type Config = Regex;

    fn configuration(&self) -> Configuration<Regex> {
        Configuration::gate("pattern", parse_pattern)
    }

    fn handle(&mut self, packet: Packet, pattern: &Regex) -> Result<Outputs, PolicyError> {
        if packet.kind() != Some(PacketKind::Data) {
            return Ok(Outputs::single("map", packet));
        }
        let text = packet.payload_str().unwrap_or_default();
        let submatches = submatches(pattern, &text);
        let json = serde_json::to_vec(&submatches).context("failed to serialize submatches")?;
        Ok(Outputs::single("map", Packet::data(json)))
    }
}

pub fn parse_pattern(raw: &[u8]) -> eyre::Result<Regex> {
    let pattern = std::str::from_utf8(raw).context("pattern is not valid UTF-8")?;
    let regex = Regex::new(pattern).with_context(|| format!("invalid pattern `{pattern}`"))?;
    tracing::info!("using pattern `{regex}`");
    Ok(regex)
}

/// Named submatches of the first match of `pattern` in `text`.
///
/// Groups that didn't take part in the match map to an empty string. No
/// match at all gives an empty map.
pub fn submatches<'a>(pattern: &'a Regex, text: &str) -> BTreeMap<&'a str, String> {
    let Some(captures) = pattern.captures(text) else {
        return BTreeMap::new();
    };
    pattern
        .capture_names()
        .flatten()
        .map(|name| {
            let value = captures.name(name).map(|m| m.as_str()).unwrap_or_default();
            (name, value.to_owned())
        })
        .collect()
}

pub fn lib_main() -> eyre::Result<()> {
    let args = Args::parse();
    if args.common.json {
        return conduit_node_api::print_description(&description());
    }
    conduit_node_api::set_up_tracing(args.common.debug)?;

    let stats = conduit_node_api::run_node(description(), &args.run_config(), Submatch)?;
    tracing::debug!("{stats:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> Regex {
        parse_pattern(br"(?P<year>\d{4})-(?P<month>\d{2})").unwrap()
    }

    #[test]
    fn maps_named_groups() {
        let re = date();
        let map = submatches(&re, "2024-05");
        assert_eq!(map.len(), 2);
        assert_eq!(map["year"], "2024");
        assert_eq!(map["month"], "05");
    }

    #[test]
    fn no_match_is_empty() {
        assert!(submatches(&date(), "hello").is_empty());
    }

    #[test]
    fn unnamed_and_missing_groups() {
        let pattern = parse_pattern(br"(\w+)(?:-(?P<suffix>\d+))?").unwrap();
        let map = submatches(&pattern, "abc");
        assert_eq!(map.len(), 1);
        assert_eq!(map["suffix"], "");

        let unnamed = parse_pattern(br"(\d+)").unwrap();
        assert!(submatches(&unnamed, "42").is_empty());
    }

    #[test]
    fn rejects_invalid_patterns() {
        assert!(parse_pattern(b"(unclosed").is_err());
        assert!(parse_pattern(&[0xff]).is_err());
    }

    #[test]
    fn handle_emits_json() {
        let outputs = Submatch.handle(Packet::data("2024-05"), &date()).unwrap();
        let (port, packet) = outputs.into_iter().next().unwrap();
        assert_eq!(port.as_str(), "map");

        let json: serde_json::Value = serde_json::from_slice(packet.payload().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"year": "2024", "month": "05"}));
    }
}
