//! In-process cluster scaffolding shared by integration tests.

// Each integration test uses only part of the fixture surface.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;

use ordlog::{
    spawn, Channel, Config, Envelope, Interleaver, MachineId, MultiHomeOrderer, Registry, Request,
    Sender, Transaction,
};

const RECV_DEADLINE: Duration = Duration::from_secs(2);

/// An N-replica, P-partition topology with real module threads wired over
/// the in-process transport. Tests play the external collaborators by
/// sending into module channels and reading registered output channels.
pub struct Cluster {
    config: Arc<Config>,
    registry: Arc<Registry>,
    outputs: HashMap<(MachineId, Channel), Receiver<Envelope>>,
}

impl Cluster {
    pub fn new(num_replicas: u32, num_partitions: u32) -> Self {
        let config = Config::new(num_replicas, num_partitions);
        config.validate().expect("test topology is valid");
        Self {
            config: Arc::new(config),
            registry: Registry::new(),
            outputs: HashMap::new(),
        }
    }

    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    pub fn machines(&self) -> Vec<MachineId> {
        let config = &self.config;
        (0..config.num_replicas)
            .flat_map(|replica| {
                (0..config.num_partitions)
                    .map(move |partition| config.make_machine_id(replica, partition))
            })
            .collect()
    }

    /// Spawn an interleaver on every machine, with a scheduler output
    /// channel next to it.
    pub fn add_interleavers(&mut self) {
        for machine in self.machines() {
            let inbound = self
                .registry
                .register(machine, &[Channel::Interleaver, Channel::LocalLog]);
            let sender = Sender::new(Arc::clone(&self.registry), machine);
            spawn(Interleaver::new(self.config(), sender), inbound, None);
            self.add_output(machine, Channel::Scheduler);
        }
    }

    /// Spawn a multi-home orderer on the ordering leader of every region,
    /// ticking at the configured period.
    pub fn add_orderers(&mut self) {
        let partition = self.config.leader_partition_for_multi_home_ordering;
        let tick = MultiHomeOrderer::tick_period(&self.config);
        for replica in 0..self.config.num_replicas {
            let machine = self.config.make_machine_id(replica, partition);
            let inbound = self.registry.register(machine, &[Channel::MultiHomeOrderer]);
            let sender = Sender::new(Arc::clone(&self.registry), machine);
            spawn(
                MultiHomeOrderer::new(self.config(), sender),
                inbound,
                Some(tick),
            );
        }
    }

    /// Register a plain channel the test reads from directly.
    pub fn add_output(&mut self, machine: MachineId, channel: Channel) {
        let rx = self.registry.register(machine, &[channel]);
        self.outputs.insert((machine, channel), rx);
    }

    pub fn sender(&self, machine: MachineId) -> Sender {
        Sender::new(Arc::clone(&self.registry), machine)
    }

    pub fn recv(&self, machine: MachineId, channel: Channel) -> Envelope {
        self.outputs
            .get(&(machine, channel))
            .expect("output channel registered")
            .recv_timeout(RECV_DEADLINE)
            .unwrap_or_else(|_| {
                panic!("no envelope on {channel:?} of machine {machine} within deadline")
            })
    }

    /// Next transaction forwarded to the machine's scheduler channel.
    pub fn recv_txn(&self, machine: MachineId) -> Transaction {
        match self.recv(machine, Channel::Scheduler).request {
            Request::ForwardTxn { txn } => txn,
            other => panic!("expected forward_txn at the scheduler, got {}", other.kind()),
        }
    }
}
