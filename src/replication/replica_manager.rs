//! The replica registry: the set of attached downstream replicas plus the
//! acknowledgement counter and its wake signal, held only by a master.
//!
//! The ack counter and the replica list share one `Mutex`, and a `Condvar`
//! tied to that same mutex wakes `WAIT`. Because every `bump_acks` happens
//! under the lock right before `notify_all`, a waiter that re-checks the
//! counter after waking can never miss an increment — the same pattern the
//! store's expiry sweep uses to shut down promptly instead of sleeping out
//! a full interval.

use std::{
    collections::HashMap,
    io::Write,
    net::{SocketAddr, TcpStream},
    sync::{Condvar, Mutex},
    time::{Duration, Instant},
};

use crate::logging::log_info;

struct State {
    replicas: HashMap<SocketAddr, TcpStream>,
    acks: u64,
}

pub struct ReplicaRegistry {
    state: Mutex<State>,
    ack_signal: Condvar,
}

impl Default for ReplicaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicaRegistry {
    pub fn new() -> Self {
        ReplicaRegistry {
            state: Mutex::new(State {
                replicas: HashMap::new(),
                acks: 0,
            }),
            ack_signal: Condvar::new(),
        }
    }

    /// Attach a connection that has just completed `PSYNC`.
    pub fn attach(&self, addr: SocketAddr, stream: TcpStream) {
        self.state.lock().unwrap().replicas.insert(addr, stream);
        log_info!("replica {addr} attached");
    }

    pub fn detach(&self, addr: SocketAddr) {
        if self.state.lock().unwrap().replicas.remove(&addr).is_some() {
            log_info!("replica {addr} detached");
        }
    }

    pub fn replica_count(&self) -> usize {
        self.state.lock().unwrap().replicas.len()
    }

    /// Write `frame` to every attached replica; a replica whose write fails
    /// is evicted from the registry.
    pub fn broadcast(&self, frame: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let mut dead = Vec::new();
        for (&addr, stream) in state.replicas.iter_mut() {
            if stream.write_all(frame).is_err() {
                dead.push(addr);
            }
        }
        for addr in dead {
            state.replicas.remove(&addr);
            log_info!("replica {addr} evicted after a failed write");
        }
    }

    pub fn reset_acks(&self) {
        self.state.lock().unwrap().acks = 0;
    }

    pub fn bump_acks(&self) {
        let mut state = self.state.lock().unwrap();
        state.acks += 1;
        self.ack_signal.notify_all();
    }

    pub fn acks(&self) -> u64 {
        self.state.lock().unwrap().acks
    }

    /// Block until at least `target` acks have arrived or `deadline` passes,
    /// re-checking the deadline on a short tick so cancellation is bounded.
    /// Returns the final ack count.
    pub fn wait_for_acks(&self, target: u64, deadline: Instant, tick: Duration) -> u64 {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.acks >= target || Instant::now() >= deadline {
                return state.acks;
            }
            let remaining = deadline.saturating_duration_since(Instant::now()).min(tick);
            let (guard, _timed_out) = self.ack_signal.wait_timeout(state, remaining).unwrap();
            state = guard;
        }
    }
}
