//! `dispatch_core` — the dispatch and accounting engine for a credit-backed
//! distributed task marketplace.
//!
//! # Architecture
//!
//! Eight components, leaves first:
//!
//! - [`wallet`] (C1) — balances, the append-only transaction ledger, platform accrual.
//! - [`planner`] (C2) — partitions a task's input items into bounded contiguous buckets.
//! - [`allocator`] (C3) — grants/resumes/releases/revokes exclusive bucket leases.
//! - [`aggregator`] (C4) — merges streaming per-item progress into per-bucket results.
//! - [`settlement`] (C5) — the three-way payout on bucket completion.
//! - [`heartbeat`] (C6) — worker liveness, gating claims.
//! - [`lifecycle`] (C7) — [`lifecycle::DispatchService`], the facade composing C1-C6.
//! - C8, the HTTP projection, lives in the `server` crate, not here.
//!
//! # Critical invariants
//!
//! - Every monetary quantity is a [`money::Money`] (`Decimal`), rounded to two
//!   external / six internal fractional digits — never a binary float.
//! - A bucket's payout fires at most once (`BucketResult::payout_issued`).
//! - A task's mutex is always acquired before the wallet's, never the
//!   reverse (`lifecycle::DispatchService`, `store::Store`).
//! - `BucketResult` ranges for a given task never overlap; leases and
//!   results share the same "covered ranges" accounting in `planner`.

pub mod aggregator;
pub mod allocator;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod ids;
pub mod lifecycle;
pub mod models;
pub mod money;
pub mod planner;
pub mod settlement;
pub mod store;
pub mod wallet;

pub use config::DispatchConfig;
pub use error::{DispatchError, DispatchResult, StateReason};
pub use lifecycle::DispatchService;
pub use money::Money;
