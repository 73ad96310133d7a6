use conduit_node_api::{
    conduit_communication_layer::memory::MemoryLayer, Component, NodeRunConfig, Packet,
    PortEvent, ShutdownSignal,
};
use conduit_splitter::{description, Splitter};

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

#[test]
fn every_output_gets_every_packet_in_order() {
    let mut layer = MemoryLayer::new();
    let config = NodeRunConfig::new()
        .with_address("in", "mem://in")
        .with_address("out", "mem://a,mem://b,mem://c");
    let splitter = Splitter::from_resolved(&config.resolve(&description()).unwrap());
    assert_eq!(splitter.outputs().len(), 3);

    let (_trigger, shutdown) = ShutdownSignal::new();
    let mut component =
        Component::init(description(), &config, &mut layer, splitter, shutdown).unwrap();
    let input = layer.sender("in");
    input.send(Packet::data("X"));
    input.send(Packet::data("Y"));
    input.disconnect();

    let stats = component.run().unwrap();
    assert_eq!(stats.processed, 2);
    for name in ["a", "b", "c"] {
        assert_eq!(
            packets(&layer, name),
            [Packet::data("X"), Packet::data("Y")],
            "{name}"
        );
        assert_eq!(layer.close_count(name), 1);
    }
}

#[test]
fn failed_copy_does_not_stop_later_outputs() {
    let mut layer = MemoryLayer::new();
    let config = NodeRunConfig::new()
        .with_address("in", "mem://in")
        .with_address("out", "mem://a,mem://b,mem://c");
    let splitter = Splitter::from_resolved(&config.resolve(&description()).unwrap());

    let (_trigger, shutdown) = ShutdownSignal::new();
    let mut component =
        Component::init(description(), &config, &mut layer, splitter, shutdown).unwrap();
    layer.set_failing("a", true);
    let input = layer.sender("in");
    input.send(Packet::data("X"));
    input.send(Packet::data("Y"));
    input.disconnect();

    let stats = component.run().unwrap();
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.send_errors, 2);
    assert!(packets(&layer, "a").is_empty());
    for name in ["b", "c"] {
        assert_eq!(
            packets(&layer, name),
            [Packet::data("X"), Packet::data("Y")],
            "{name}"
        );
    }
}
