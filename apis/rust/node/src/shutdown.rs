use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use eyre::Context;

/// Requests a graceful shutdown of a component. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    sender: flume::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownTrigger {
    /// Requests the shutdown. Returns `false` if it was already requested.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.sender.try_send(());
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

/// Receiving side of a [`ShutdownTrigger`], owned by the component harness.
#[derive(Debug)]
pub struct ShutdownSignal {
    receiver: flume::Receiver<()>,
    triggered: Arc<AtomicBool>,
    // keeps the channel connected after all triggers are dropped
    _sender: flume::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> (ShutdownTrigger, ShutdownSignal) {
        let (sender, receiver) = flume::bounded(1);
        let triggered = Arc::new(AtomicBool::new(false));
        let trigger = ShutdownTrigger {
            sender: sender.clone(),
            triggered: triggered.clone(),
        };
        let signal = ShutdownSignal {
            receiver,
            triggered,
            _sender: sender,
        };
        (trigger, signal)
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Becomes ready once the shutdown was requested.
    pub(crate) fn receiver(&self) -> &flume::Receiver<()> {
        &self.receiver
    }

    /// Blocks until the shutdown is requested.
    pub(crate) fn wait(&self) {
        if !self.is_triggered() {
            let _ = self.receiver.recv();
        }
    }
}

/// Triggers a graceful shutdown on the first ctrl-c and aborts on the second.
pub fn set_up_ctrlc_handler(trigger: ShutdownTrigger) -> eyre::Result<()> {
    let mut ctrlc_sent = false;
    ctrlc::set_handler(move || {
        if ctrlc_sent {
            tracing::warn!("received second ctrlc signal -> aborting immediately");
            std::process::abort();
        } else {
            tracing::info!("received ctrlc signal");
            trigger.trigger();
            ctrlc_sent = true;
        }
    })
    .wrap_err("failed to set ctrl-c handler")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn trigger_is_idempotent() {
        let (trigger, signal) = ShutdownSignal::new();
        assert!(!signal.is_triggered());

        assert!(trigger.trigger());
        assert!(!trigger.clone().trigger());
        assert!(signal.is_triggered());

        assert_eq!(signal.receiver().try_recv(), Ok(()));
        assert!(signal.receiver().try_recv().is_err());
        signal.wait();
    }

    #[test]
    fn dropped_triggers_do_not_shut_down() {
        let (trigger, signal) = ShutdownSignal::new();
        drop(trigger);
        assert_eq!(
            signal.receiver().recv_timeout(Duration::from_millis(20)),
            Err(flume::RecvTimeoutError::Timeout)
        );
        assert!(!signal.is_triggered());
    }
}
