//! Runs the command line received on the `cmd` port in the platform shell.
//!
//! The captured output is sent to `out`, failures are sent to `err`. Both
//! outputs are optional.

mod error;

use std::process::Command;

use clap::Parser;
use conduit_node_api::{
    conduit_message::descriptor::{ComponentDescription, PortDescription, PortRole},
    CommonArgs, Configuration, NodeRunConfig, Outputs, Packet, PacketKind, Policy, PolicyError,
};
pub use error::Error;

#[derive(Debug, Parser)]
#[command(name = "conduit-exec", about = "Executes commands")]
pub struct Args {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Component's command input port endpoint
    #[arg(long = "port.cmd", value_name = "ADDRESS")]
    pub cmd: Option<String>,
    /// Component's output port endpoint
    #[arg(long = "port.out", value_name = "ADDRESS")]
    pub output: Option<String>,
    /// Component's error port endpoint
    #[arg(long = "port.err", value_name = "ADDRESS")]
    pub error: Option<String>,
}

impl Args {
    pub fn run_config(&self) -> NodeRunConfig {
        let mut config = NodeRunConfig::new();
        config.set_address("cmd", self.cmd.clone());
        config.set_address("out", self.output.clone());
        config.set_address("err", self.error.clone());
        config
    }
}

pub fn description() -> ComponentDescription {
    ComponentDescription::new("core/exec", "Executes a given command")
        .input(PortDescription::new(
            "cmd",
            PortRole::Primary,
            "string",
            "Command line to execute",
        ))
        .output(
            PortDescription::new("out", PortRole::Data, "string", "Output of the command")
                .optional(),
        )
        .output(
            PortDescription::new(
                "err",
                PortRole::Error,
                "string",
                "Error text of failed commands",
            )
            .optional(),
        )
}

#[derive(Debug, Default)]
pub struct Exec;

impl Policy for Exec {
    type Config = ();

    fn configuration(&self) -> Configuration<()> {
        Configuration::Static(())
    }

    fn handle(&mut self, packet: Packet, _: &()) -> Result<Outputs, PolicyError> {
        if packet.kind() != Some(PacketKind::Data) {
            return Ok(Outputs::single("out", packet));
        }
        let command = packet.payload_str().unwrap_or_default();
        let output = execute(&command).map_err(|err| PolicyError::new(err.to_string()))?;
        tracing::debug!("{output}");
        Ok(Outputs::single("out", Packet::data(output)))
    }
}

/// Runs `command` in the shell and returns stdout followed by stderr, with
/// all newlines removed.
pub fn execute(command: &str) -> Result<String, Error> {
    tracing::debug!("executing `{command}`");
    let result = shell(command).output().map_err(|source| Error::Spawn {
        command: command.to_owned(),
        source,
    })?;

    let mut captured = result.stdout;
    captured.extend_from_slice(&result.stderr);
    let output = String::from_utf8_lossy(&captured).replace('\n', "");
    if !result.status.success() {
        return Err(Error::Failed {
            command: command.to_owned(),
            status: result.status,
            output,
        });
    }
    Ok(output)
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut shell = Command::new("sh");
    shell.arg("-c").arg(command);
    shell
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut shell = Command::new("cmd");
    shell.arg("/C").arg(command);
    shell
}

pub fn lib_main() -> eyre::Result<()> {
    let args = Args::parse();
    if args.common.json {
        return conduit_node_api::print_description(&description());
    }
    conduit_node_api::set_up_tracing(args.common.debug)?;

    let stats = conduit_node_api::run_node(description(), &args.run_config(), Exec)?;
    tracing::debug!("{stats:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn strips_newlines() {
        assert_eq!(execute("printf 'a\\nb\\n'").unwrap(), "ab");
        assert_eq!(execute("echo out; echo err >&2").unwrap(), "outerr");
    }

    #[test]
    #[cfg(unix)]
    fn non_zero_exit_is_an_error() {
        let err = execute("echo nope; exit 3").unwrap_err();
        let Error::Failed { status, output, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(status.code(), Some(3));
        assert_eq!(output, "nope");
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn brackets_are_forwarded() {
        let outputs = Exec.handle(Packet::open_bracket(), &()).unwrap();
        assert_eq!(outputs, Outputs::single("out", Packet::open_bracket()));
    }

    #[test]
    fn only_the_command_port_is_required() {
        let args = Args::try_parse_from(["conduit-exec", "--port.cmd", "tcp://*:5000"]).unwrap();
        let ports = args.run_config().resolve(&description()).unwrap();
        assert_eq!(ports.len(), 1);

        let args = Args::try_parse_from(["conduit-exec", "--port.out", "tcp://*:5000"]).unwrap();
        assert!(args.run_config().resolve(&description()).is_err());
    }
}
