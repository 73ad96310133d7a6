//! In-process transport backed by `flume` channels.
//!
//! Every `mem://name` address maps to one channel. A component binds or
//! connects to it through the [`MemoryLayer`], the other end is reached
//! through [`MemoryLayer::sender`] and [`MemoryLayer::receiver`] on a clone of
//! the same layer.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use conduit_message::Packet;

use crate::{BoxError, CommunicationLayer, PortAddress, PortEvent, Publisher, Subscriber};

/// Registry of named in-process channels. Clones share the registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryLayer {
    channels: Arc<Mutex<HashMap<String, Channel>>>,
}

#[derive(Debug)]
struct Channel {
    sender: flume::Sender<PortEvent>,
    receiver: flume::Receiver<PortEvent>,
    closes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    bound: bool,
}

impl Channel {
    fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            closes: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
            bound: false,
        }
    }
}

impl MemoryLayer {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, Channel>> {
        // the map stays consistent even if a holder of the lock panicked
        self.channels.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn with_channel<T>(&self, name: &str, f: impl FnOnce(&mut Channel) -> T) -> T {
        let mut channels = self.channels();
        f(channels.entry(name.to_owned()).or_insert_with(Channel::new))
    }

    /// Returns a handle for feeding events into the port bound at `name`.
    pub fn sender(&self, name: &str) -> MemorySender {
        self.with_channel(name, |c| MemorySender(c.sender.clone()))
    }

    /// Returns a receiver for the events published to `name`.
    pub fn receiver(&self, name: &str) -> flume::Receiver<PortEvent> {
        self.with_channel(name, |c| c.receiver.clone())
    }

    /// Makes every publish to `name` fail until `failing` is reset.
    pub fn set_failing(&self, name: &str, failing: bool) {
        self.with_channel(name, |c| c.failing.store(failing, Ordering::SeqCst));
    }

    /// How many times a port on `name` was closed.
    pub fn close_count(&self, name: &str) -> usize {
        self.with_channel(name, |c| c.closes.load(Ordering::SeqCst))
    }
}

impl CommunicationLayer for MemoryLayer {
    fn bind(&mut self, address: &PortAddress) -> Result<Box<dyn Subscriber>, BoxError> {
        let PortAddress::Memory(name) = address else {
            return Err(format!("memory layer cannot bind `{address}`").into());
        };
        self.with_channel(name, |c| {
            if c.bound {
                return Err(format!("`{address}` is already bound").into());
            }
            c.bound = true;
            Ok(Box::new(MemorySubscriber {
                events: c.receiver.clone(),
                closes: c.closes.clone(),
                closed: false,
            }) as Box<dyn Subscriber>)
        })
    }

    fn connect(&mut self, address: &PortAddress) -> Result<Box<dyn Publisher>, BoxError> {
        let PortAddress::Memory(name) = address else {
            return Err(format!("memory layer cannot connect to `{address}`").into());
        };
        Ok(self.with_channel(name, |c| {
            Box::new(MemoryPublisher {
                sender: c.sender.clone(),
                closes: c.closes.clone(),
                failing: c.failing.clone(),
                closed: false,
            }) as Box<dyn Publisher>
        }))
    }
}

/// Feeds events into an in-process input port.
#[derive(Debug, Clone)]
pub struct MemorySender(flume::Sender<PortEvent>);

impl MemorySender {
    /// Sends a packet as if a peer had published it.
    pub fn send(&self, packet: Packet) {
        self.event(PortEvent::Packet(packet));
    }

    /// Signals that the peer unbound.
    pub fn disconnect(&self) {
        self.event(PortEvent::Disconnected);
    }

    /// Sends a raw port event.
    pub fn event(&self, event: PortEvent) {
        // the registry keeps a receiver alive, so this can't fail
        let _ = self.0.send(event);
    }
}

struct MemorySubscriber {
    events: flume::Receiver<PortEvent>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

impl Subscriber for MemorySubscriber {
    fn events(&self) -> &flume::Receiver<PortEvent> {
        &self.events
    }

    fn close(&mut self) {
        if !std::mem::replace(&mut self.closed, true) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct MemoryPublisher {
    sender: flume::Sender<PortEvent>,
    closes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    closed: bool,
}

impl Publisher for MemoryPublisher {
    fn publish(&mut self, packet: &Packet) -> Result<(), BoxError> {
        if self.closed {
            return Err("port is closed".into());
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err("memory channel is set to fail".into());
        }
        self.sender
            .send(PortEvent::Packet(packet.clone()))
            .map_err(|_| "memory channel disconnected".into())
    }

    fn close(&mut self) {
        if !std::mem::replace(&mut self.closed, true) {
            let _ = self.sender.send(PortEvent::Disconnected);
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
