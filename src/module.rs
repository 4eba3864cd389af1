//! Module event loops.
//!
//! Every component runs as an independent single-threaded loop fed by one
//! inbound channel (which may serve several logical [`Channel`]s) and an
//! optional periodic tick. The loop suspends only at the channel wait and
//! exits cooperatively when the inbound channel disconnects.
//!
//! [`Channel`]: crate::ids::Channel

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use crossbeam::select;

use crate::message::Envelope;

pub trait Module: Send {
    fn name(&self) -> &'static str;

    fn handle(&mut self, envelope: Envelope);

    /// Periodic input; only invoked when the module was spawned with a tick
    /// period.
    fn handle_tick(&mut self) {}
}

/// Run `module` on a dedicated thread until its inbound channel closes.
pub fn spawn<M: Module + 'static>(
    mut module: M,
    inbound: Receiver<Envelope>,
    tick_period: Option<Duration>,
) -> JoinHandle<()> {
    let name = module.name();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            match tick_period {
                Some(period) => {
                    let ticker = channel::tick(period);
                    loop {
                        select! {
                            recv(inbound) -> envelope => match envelope {
                                Ok(envelope) => module.handle(envelope),
                                Err(_) => break,
                            },
                            recv(ticker) -> _ => module.handle_tick(),
                        }
                    }
                }
                None => {
                    for envelope in inbound.iter() {
                        module.handle(envelope);
                    }
                }
            }
            tracing::debug!("module {name} stopped");
        })
        .expect("failed to spawn module thread")
}
