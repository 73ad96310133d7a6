#![cfg(unix)]

use conduit_exec::{description, Exec};
use conduit_node_api::{
    conduit_communication_layer::memory::MemoryLayer, Component, NodeRunConfig, Packet,
    PortEvent, RunStats, ShutdownSignal,
};

fn run(layer: &mut MemoryLayer, config: &NodeRunConfig, commands: &[&str]) -> RunStats {
    let (_trigger, shutdown) = ShutdownSignal::new();
    let mut component = Component::init(description(), config, layer, Exec, shutdown).unwrap();
    let input = layer.sender("cmd");
    for command in commands {
        input.send(Packet::data(*command));
    }
    input.disconnect();
    component.run().unwrap()
}

fn packets(layer: &MemoryLayer, name: &str) -> Vec<Packet> {
    layer
        .receiver(name)
        .try_iter()
        .filter_map(|event| match event {
            PortEvent::Packet(packet) => Some(packet),
            _ => None,
        })
        .collect()
}

fn full_config() -> NodeRunConfig {
    NodeRunConfig::new()
        .with_address("cmd", "mem://cmd")
        .with_address("out", "mem://out")
        .with_address("err", "mem://err")
}

#[test]
fn success_goes_to_out_only() {
    let mut layer = MemoryLayer::new();
    let stats = run(&mut layer, &full_config(), &["echo ok"]);

    assert_eq!(stats.processed, 1);
    assert_eq!(packets(&layer, "out"), [Packet::data("ok")]);
    assert!(packets(&layer, "err").is_empty());
}

#[test]
fn failure_goes_to_err_only() {
    let mut layer = MemoryLayer::new();
    let stats = run(&mut layer, &full_config(), &["exit 1"]);

    assert_eq!(stats.policy_errors, 1);
    assert!(packets(&layer, "out").is_empty());
    let errors = packets(&layer, "err");
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].payload().unwrap().is_empty());
}

#[test]
fn works_without_outputs() {
    let mut layer = MemoryLayer::new();
    let config = NodeRunConfig::new().with_address("cmd", "mem://cmd");
    let stats = run(&mut layer, &config, &["echo ok", "exit 1"]);

    assert_eq!(stats.processed, 1);
    assert_eq!(stats.policy_errors, 1);
    assert_eq!(stats.send_errors, 0);
}
