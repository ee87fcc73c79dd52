//! User, wallet transaction, and platform ledger models (§3). Generalizes
//! the teacher's `Agent` balance (`backend/src/models/agent.rs`) from a
//! single `i64` counter into an append-only ledger of signed [`Money`]
//! transactions, since the spec requires reconstructing a balance from its
//! transaction history (invariant 4, §8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub session_id: String,
    pub wallet_balance: Money,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, session_id: String, seed_balance: Money) -> Self {
        let now = Utc::now();
        Self {
            id,
            session_id,
            wallet_balance: seed_balance,
            roles: vec!["customer".to_string(), "worker".to_string()],
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
    SeedCredit,
    WalletDeposit,
    WalletWithdrawal,
    ChunkDebit,
    ChunkCredit,
    PlatformFee,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: Money,
    pub balance_after: Money,
    pub meta: TransactionMeta,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformLedger {
    pub total_earnings: Money,
}
