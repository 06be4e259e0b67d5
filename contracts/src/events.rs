//! # Observability Events
//!
//! Events are immutable records emitted by successful operations. Nothing
//! inside strata reads them back; they exist for external monitoring and
//! indexing. Each emit is mirrored to `tracing` at `info` level.
//!
//! An operation that fails leaves no events behind: the atomic wrappers
//! [`truncate`](EventLog::truncate) the log back to its length before the
//! operation started.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_protocol::{Address, MarketTag};
use uuid::Uuid;

/// Which exit path produced a [`VaultEvent::Withdrawn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawKind {
    /// Exact assets out, shares computed (rounded up).
    Withdraw,
    /// Exact shares in, assets computed (rounded down).
    Redeem,
}

/// Every event a vault, the factory or the router can emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    /// Assets entered the vault and shares were minted.
    Deposited {
        vault: Address,
        caller: Address,
        receiver: Address,
        assets: u64,
        shares: u64,
    },
    /// Shares were burned and assets left the vault.
    Withdrawn {
        vault: Address,
        kind: WithdrawKind,
        caller: Address,
        receiver: Address,
        owner: Address,
        assets: u64,
        shares: u64,
    },
    /// The high-water mark moved; `fee_shares` may be zero at a 0% rate.
    FeeCrystallized {
        vault: Address,
        recipient: Address,
        fee_assets: u64,
        fee_shares: u64,
        previous_mark: u128,
        new_mark: u128,
    },
    /// Fee rate changed.
    FeeUpdated {
        vault: Address,
        old_rate_bps: u16,
        new_rate_bps: u16,
    },
    StrategyWhitelisted {
        vault: Address,
        strategy: Address,
    },
    StrategyRevoked {
        vault: Address,
        strategy: Address,
    },
    /// A strategy change entered the timelock.
    StrategyQueued {
        vault: Address,
        strategy: Address,
        eligible_at: DateTime<Utc>,
    },
    /// The active strategy slot changed.
    StrategyChanged {
        vault: Address,
        previous: Option<Address>,
        current: Address,
        migrated: u64,
    },
    Paused {
        vault: Address,
    },
    Unpaused {
        vault: Address,
    },
    /// Everything was pulled back from the strategy to idle.
    EmergencyWithdrawal {
        vault: Address,
        strategy: Address,
        recovered: u64,
    },
    VaultRegistered {
        vault: Address,
        asset: Address,
        market: MarketTag,
    },
    /// Shares stranded at the router were redeemed to a recovery account.
    SharesSwept {
        vault: Address,
        recovery: Address,
        shares: u64,
        assets: u64,
    },
}

/// One emitted event with its identity and logical timestamp.
///
/// `id` is derived from `seq`, the record's position in the log since
/// genesis, so replaying the same operations reproduces the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub seq: u64,
    pub emitted_at: DateTime<Utc>,
    pub event: VaultEvent,
}

/// Append-only event log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
    next_seq: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event stamped with `at`.
    pub fn emit(&mut self, at: DateTime<Utc>, event: VaultEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        tracing::info!(seq, ?event, "event");
        self.records.push(EventRecord {
            id: Uuid::from_u128(seq as u128),
            seq,
            emitted_at: at,
            event,
        });
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Iterates over the bare events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &VaultEvent> {
        self.records.iter().map(|r| &r.event)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Removes and returns every record, e.g. after shipping them to an indexer.
    pub fn drain(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.records)
    }

    /// Drops records beyond `len`. Used to discard a failed unit's events;
    /// their sequence numbers are handed out again.
    pub fn truncate(&mut self, len: usize) {
        let dropped = self.records.len().saturating_sub(len);
        self.next_seq -= dropped as u64;
        self.records.truncate(len);
    }
}
