// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # strata Protocol: Substrate Primitives
//!
//! The pieces every strata contract stands on. A vault never talks to a
//! global environment; it is handed these primitives explicitly, which is
//! what makes every operation a deterministic, replayable unit.
//!
//! - **address**: 20-byte principals and validated market tags.
//! - **hash**: BLAKE3/SHA-256 and deterministic contract addresses.
//! - **token**: the fungible-token shape shared by assets and shares.
//! - **code**: code inspection, including delegated-account detection.
//! - **clock**: the logical clock that drives timelocks.
//! - **config**: protocol constants and the validated deployment config.
//! - **logging**: `tracing` subscriber setup for embedders and tests.
//!
//! ## Design Philosophy
//!
//! 1. Integer arithmetic only, `u64` amounts with `u128` intermediates.
//! 2. Deterministic containers (`BTreeMap`) wherever state is iterated.
//! 3. Identity is an explicit parameter, never ambient.

pub mod address;
pub mod clock;
pub mod code;
pub mod config;
pub mod hash;
pub mod logging;
pub mod token;

pub use address::{Address, AddressError, MarketTag};
pub use clock::LogicalClock;
pub use code::{CodeInspector, CodeRegistry};
pub use config::{ConfigError, DeploymentConfig};
pub use token::{AssetBook, FungibleToken, TokenError, TokenLedger};
