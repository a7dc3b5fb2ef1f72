//! Single-permit activation gates for the pattern workers
//!
//! A gate starts closed. `release` opens it; a waiter consumes the permit and
//! the gate closes again. Releasing an already open gate is a no-op, so any
//! number of notifications during a pass collapse into one more pass.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
#[cfg(test)]
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ActivationGate {
    open: Mutex<bool>,
    signal: Condvar,
}

impl ActivationGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, bool> {
        self.open.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn release(&self) {
        let mut open = self.state();
        *open = true;
        self.signal.notify_one();
    }

    /// Block until released, consuming the permit
    pub fn wait(&self) {
        let mut open = self.state();
        while !*open {
            open = self.signal.wait(open).unwrap_or_else(|e| e.into_inner());
        }
        *open = false;
    }

    /// `true` if a permit was consumed before `timeout`
    #[cfg(test)]
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let open = self.state();
        let (mut open, _) = self
            .signal
            .wait_timeout_while(open, timeout, |open| !*open)
            .unwrap_or_else(|e| e.into_inner());
        let taken = *open;
        *open = false;
        taken
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        *self.state()
    }
}

/// The set of gates the notification loop releases together
#[derive(Debug, Clone, Default)]
pub struct GateBank {
    gates: Vec<Arc<ActivationGate>>,
}

impl GateBank {
    pub fn with_gates(count: usize) -> Self {
        Self {
            gates: (0..count).map(|_| Arc::new(ActivationGate::new())).collect(),
        }
    }

    pub fn gate(&self, index: usize) -> Option<Arc<ActivationGate>> {
        self.gates.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn release_all(&self) {
        for gate in &self.gates {
            gate.release();
        }
    }
}
