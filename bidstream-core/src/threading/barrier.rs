//! Start gate for coordinated thread startup
//!
//! Works like `std::sync::Barrier`, except that the gate can be aborted.
//! If spawning one thread of a run fails, the threads already waiting are
//! released instead of blocking forever.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct GateState {
    arrived: usize,
    open: bool,
    aborted: bool,
}

/// Releases all parties together once `n` have arrived
#[derive(Debug)]
pub struct StartGate {
    parties: usize,
    state: Mutex<GateState>,
    cvar: Condvar,
}

impl StartGate {
    /// Create a gate for `n` parties; a gate for zero parties is already open
    pub fn new(n: usize) -> Self {
        Self {
            parties: n,
            state: Mutex::new(GateState { arrived: 0, open: n == 0, aborted: false }),
            cvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until every party has arrived
    ///
    /// Returns `true` when the gate opened normally and `false` if it was aborted.
    pub fn wait(&self) -> bool {
        let mut state = self.lock();
        state.arrived += 1;
        if state.arrived >= self.parties {
            state.open = true;
            self.cvar.notify_all();
        }
        while !state.open && !state.aborted {
            state = self.cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        !state.aborted
    }

    /// Release every waiter without starting the run
    pub fn abort(&self) {
        let mut state = self.lock();
        state.aborted = true;
        self.cvar.notify_all();
    }

    pub fn parties(&self) -> usize {
        self.parties
    }
}
