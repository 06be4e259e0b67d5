//! # Execution Substrate
//!
//! [`Host`] is everything a vault operation may touch besides the vault
//! itself: asset ledgers, deployed code, installed strategy modules, the
//! logical clock and the event log. [`Chain`] adds the registry and every
//! deployed vault.
//!
//! Operations are applied one at a time, in order, by whoever owns the
//! `Chain`; there is no interior locking. Multi-vault operations (router
//! batches, vault creation) run inside [`Chain::atomically`], which restores
//! a full snapshot on failure.

use std::collections::BTreeMap;
use std::sync::Arc;
use strata_protocol::{Address, AssetBook, CodeRegistry, LogicalClock};

use crate::events::{EventLog, VaultEvent};
use crate::registry::Registry;
use crate::strategy::{ModuleTable, Strategy};
use crate::vault::Vault;

/// Shared environment of every vault.
#[derive(Debug, Clone, Default)]
pub struct Host {
    pub assets: AssetBook,
    pub code: CodeRegistry,
    pub modules: ModuleTable,
    pub clock: LogicalClock,
    pub events: EventLog,
}

impl Host {
    pub fn new(clock: LogicalClock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// Appends `event` stamped with the current logical time.
    pub fn emit(&mut self, event: VaultEvent) {
        let now = self.clock.now();
        self.events.emit(now, event);
    }

    /// Deploys `bytecode` at `address` and installs `module` behind it.
    pub fn deploy_strategy(&mut self, address: Address, bytecode: Vec<u8>, module: Arc<dyn Strategy>) {
        self.code.deploy(address, bytecode);
        self.modules.install(address, module);
    }
}

/// Host, registry and all deployed vaults.
#[derive(Debug, Clone)]
pub struct Chain {
    pub host: Host,
    pub registry: Registry,
    vaults: BTreeMap<Address, Vault>,
}

impl Chain {
    /// Creates an empty chain whose registry is owned by `registry_owner`.
    pub fn new(registry_owner: Address, clock: LogicalClock) -> Self {
        Self {
            host: Host::new(clock),
            registry: Registry::new(registry_owner),
            vaults: BTreeMap::new(),
        }
    }

    pub fn vault(&self, address: &Address) -> Option<&Vault> {
        self.vaults.get(address)
    }

    pub fn vault_mut(&mut self, address: &Address) -> Option<&mut Vault> {
        self.vaults.get_mut(address)
    }

    /// Splits the borrow so a vault can run against the host.
    pub fn vault_and_host(&mut self, address: &Address) -> Option<(&mut Vault, &mut Host)> {
        let vault = self.vaults.get_mut(address)?;
        Some((vault, &mut self.host))
    }

    pub fn vaults(&self) -> impl Iterator<Item = &Vault> {
        self.vaults.values()
    }

    pub(crate) fn insert_vault(&mut self, vault: Vault) {
        self.vaults.insert(vault.address(), vault);
    }

    /// Full copy of the chain state.
    pub fn snapshot(&self) -> Chain {
        self.clone()
    }

    /// Replaces the chain state with an earlier snapshot.
    pub fn restore(&mut self, snapshot: Chain) {
        *self = snapshot;
    }

    /// Runs `op` as one atomic unit across every vault and the host.
    pub fn atomically<T, E>(&mut self, op: impl FnOnce(&mut Chain) -> Result<T, E>) -> Result<T, E> {
        let snapshot = self.snapshot();
        let result = op(self);
        if result.is_err() {
            tracing::debug!("multi-vault operation rolled back");
            self.restore(snapshot);
        }
        result
    }
}
