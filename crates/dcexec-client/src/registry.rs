use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::collaborator::Collaborator;
use crate::host::HostState;

/// Maps host addresses to their shared [`HostState`].
///
/// The registry is an ordinary value: create one at startup, keep it behind
/// an `Arc` if several components need it, and build every
/// [`Server`](crate::Server) from it. It only holds weak references, so a
/// host's state lives exactly as long as some `Server` points at it.
pub struct HostRegistry {
    collaborator: Arc<dyn Collaborator>,
    hosts: Mutex<HashMap<String, Weak<HostState>>>,
}

impl HostRegistry {
    pub fn new(collaborator: Arc<dyn Collaborator>) -> Self {
        Self {
            collaborator,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    pub fn collaborator(&self) -> &Arc<dyn Collaborator> {
        &self.collaborator
    }

    fn hosts_map(&self) -> MutexGuard<'_, HashMap<String, Weak<HostState>>> {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the live state for `address`, creating a fresh one if no
    /// `Server` currently references it.
    ///
    /// Concurrent callers for the same address always get the same state.
    pub fn state_for(&self, address: &str) -> Arc<HostState> {
        let mut hosts = self.hosts_map();
        if let Some(state) = hosts.get(address).and_then(Weak::upgrade) {
            return state;
        }

        hosts.retain(|_, state| state.strong_count() > 0);
        tracing::debug!("Creating host state for {}", address);
        let state = Arc::new(HostState::new(address.to_string(), self.collaborator.clone()));
        hosts.insert(address.to_string(), Arc::downgrade(&state));
        state
    }

    /// Addresses that currently have live state, sorted.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .hosts_map()
            .iter()
            .filter(|(_, state)| state.strong_count() > 0)
            .map(|(address, _)| address.clone())
            .collect();
        hosts.sort();
        hosts
    }

    /// Number of live `Server` handles for `address`.
    pub fn handle_count(&self, address: &str) -> usize {
        self.hosts_map()
            .get(address)
            .map(Weak::strong_count)
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRegistry")
            .field("hosts", &self.hosts())
            .finish()
    }
}
