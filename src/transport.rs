//! In-process transport: broker registry and per-module senders.
//!
//! Delivery is reliable and FIFO per (sender, recipient) pair. Channels are
//! unbounded, so sends never block. A send to an endpoint that is gone
//! (registry torn down, or the receiving module exited) is dropped
//! silently; that only happens during shutdown.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crossbeam::channel::{self, Receiver};

use crate::ids::{Channel, MachineId};
use crate::message::{Envelope, Request};

/// Broker-side endpoint table for every machine in the process.
///
/// Modules never own the registry; they hold it as a plain shared
/// collaborator. Teardown happens through channel closure, not through
/// registry liveness.
pub struct Registry {
    endpoints: Mutex<HashMap<(MachineId, Channel), channel::Sender<Envelope>>>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            endpoints: Mutex::new(HashMap::new()),
        })
    }

    /// Register a module's inbound queue under one or more channels of a
    /// machine. Registering a channel twice is a wiring bug.
    pub fn register(&self, machine: MachineId, channels: &[Channel]) -> Receiver<Envelope> {
        let (tx, rx) = channel::unbounded();
        let mut endpoints = self.endpoints.lock().expect("registry lock poisoned");
        for &ch in channels {
            if endpoints.insert((machine, ch), tx.clone()).is_some() {
                panic!("channel {ch:?} registered twice on machine {machine}");
            }
        }
        rx
    }

    /// Drop every endpoint. Cached connections held by live senders keep
    /// working; new lookups fail and their messages are dropped.
    pub fn shutdown(&self) {
        self.endpoints
            .lock()
            .expect("registry lock poisoned")
            .clear();
    }

    fn endpoint(&self, machine: MachineId, channel: Channel) -> Option<channel::Sender<Envelope>> {
        self.endpoints
            .lock()
            .expect("registry lock poisoned")
            .get(&(machine, channel))
            .cloned()
    }
}

/// Outbound side of one module. Connections are established lazily on first
/// send and cached for the module's lifetime.
pub struct Sender {
    registry: Arc<Registry>,
    machine: MachineId,
    connections: HashMap<(MachineId, Channel), channel::Sender<Envelope>>,
}

impl Sender {
    pub fn new(registry: Arc<Registry>, machine: MachineId) -> Self {
        Self {
            registry,
            machine,
            connections: HashMap::new(),
        }
    }

    pub fn machine(&self) -> MachineId {
        self.machine
    }

    /// Deliver `request` to `channel` on `to`, stamped with this module's
    /// machine id.
    pub fn send(&mut self, request: Request, to: MachineId, channel: Channel) {
        let connection = match self.connections.entry((to, channel)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match self.registry.endpoint(to, channel) {
                Some(tx) => entry.insert(tx),
                None => {
                    tracing::debug!(
                        "dropping {} to machine {to} {channel:?}: no endpoint",
                        request.kind()
                    );
                    return;
                }
            },
        };

        let envelope = Envelope {
            from: self.machine,
            request,
        };
        if let Err(err) = connection.send(envelope) {
            tracing::debug!(
                "dropping {} to machine {to} {channel:?}: receiver gone",
                err.into_inner().request.kind()
            );
            self.connections.remove(&(to, channel));
        }
    }

    /// Deliver `request` to a channel on this module's own machine.
    pub fn send_local(&mut self, request: Request, channel: Channel) {
        self.send(request, self.machine, channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn propose(value: u64) -> Request {
        Request::PaxosPropose { value }
    }

    #[test]
    fn delivers_in_fifo_order_per_sender() {
        let registry = Registry::new();
        let rx = registry.register(MachineId::new(0), &[Channel::Scheduler]);
        let mut sender = Sender::new(Arc::clone(&registry), MachineId::new(1));

        for value in 0..4 {
            sender.send(propose(value), MachineId::new(0), Channel::Scheduler);
        }

        for value in 0..4 {
            let envelope = rx.recv().unwrap();
            assert_eq!(envelope.from, MachineId::new(1));
            assert_eq!(envelope.request, propose(value));
        }
    }

    #[test]
    fn one_receiver_serves_multiple_channels() {
        let registry = Registry::new();
        let rx = registry.register(
            MachineId::new(0),
            &[Channel::Interleaver, Channel::LocalLog],
        );
        let mut sender = Sender::new(Arc::clone(&registry), MachineId::new(0));

        sender.send_local(propose(1), Channel::Interleaver);
        sender.send_local(propose(2), Channel::LocalLog);

        assert_eq!(rx.recv().unwrap().request, propose(1));
        assert_eq!(rx.recv().unwrap().request, propose(2));
    }

    #[test]
    fn unregistered_destination_drops_silently() {
        let registry = Registry::new();
        let mut sender = Sender::new(registry, MachineId::new(0));
        sender.send(propose(1), MachineId::new(9), Channel::Scheduler);
    }

    #[test]
    fn shutdown_drops_new_connections_but_keeps_cached_ones() {
        let registry = Registry::new();
        let rx = registry.register(MachineId::new(0), &[Channel::Scheduler]);
        let mut cached = Sender::new(Arc::clone(&registry), MachineId::new(1));
        cached.send(propose(1), MachineId::new(0), Channel::Scheduler);

        registry.shutdown();

        cached.send(propose(2), MachineId::new(0), Channel::Scheduler);
        let mut fresh = Sender::new(Arc::clone(&registry), MachineId::new(2));
        fresh.send(propose(3), MachineId::new(0), Channel::Scheduler);

        assert_eq!(rx.recv().unwrap().request, propose(1));
        assert_eq!(rx.recv().unwrap().request, propose(2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_registration_is_fatal() {
        let registry = Registry::new();
        let _rx = registry.register(MachineId::new(0), &[Channel::Scheduler]);
        let _rx2 = registry.register(MachineId::new(0), &[Channel::Scheduler]);
    }
}
