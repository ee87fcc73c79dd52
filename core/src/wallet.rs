//! Wallet ledger (C1, §4.5).
//!
//! Generalizes the teacher's `Agent::debit`/`Agent::credit`
//! (`backend/src/models/agent.rs`) — a single `i64` balance mutation — into
//! an append-only transaction log: every balance-changing operation appends
//! exactly one [`WalletTransaction`] row carrying the post-change balance,
//! per §4.5's invariant and testable property 4 in §8.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::config::DispatchConfig;
use crate::error::WalletError;
use crate::ids::{new_transaction_id, PLATFORM_USER_ID};
use crate::models::user::{PlatformLedger, TransactionMeta, TransactionType, User, WalletTransaction};
use crate::money::{round_external, Money};

/// The users + transactions + platform ledger collection, guarded as a
/// single unit (see DESIGN.md / SPEC_FULL.md §5 ADDED note): every
/// wallet-affecting operation, including the three-way payout, needs
/// exclusive write access to more than one user at once.
#[derive(Debug, Default)]
pub struct WalletBook {
    users: HashMap<String, User>,
    transactions: Vec<WalletTransaction>,
    platform: PlatformLedger,
}

impl WalletBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn platform_ledger(&self) -> &PlatformLedger {
        &self.platform
    }

    /// Last `limit` transactions for a user, most recent first, plus the
    /// total count (§6 `/api/me`: `walletTransactionsTotal`).
    pub fn transactions_for(&self, user_id: &str, limit: usize) -> (Vec<WalletTransaction>, usize) {
        let mut all: Vec<&WalletTransaction> = self.transactions.iter().filter(|t| t.user_id == user_id).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = all.len();
        (all.into_iter().take(limit).cloned().collect(), total)
    }

    /// Create a user with a seed balance if one doesn't exist yet (on-the-fly
    /// session users, or a worker credited for the first time). A non-zero
    /// seed is itself recorded as a `seed-credit` transaction so invariant 4
    /// in §8 (`balance == seed + sum(transactions)`) holds from entity zero.
    pub fn ensure_user(&mut self, user_id: &str, seed_balance: Money) -> &User {
        if !self.users.contains_key(user_id) {
            let user = User::new(user_id.to_string(), user_id.to_string(), seed_balance);
            self.users.insert(user_id.to_string(), user);
            if !seed_balance.is_zero() {
                let tx = WalletTransaction {
                    id: new_transaction_id(),
                    user_id: user_id.to_string(),
                    tx_type: TransactionType::SeedCredit,
                    amount: round_external(seed_balance),
                    balance_after: round_external(seed_balance),
                    meta: TransactionMeta::default(),
                    created_at: chrono::Utc::now(),
                };
                self.transactions.push(tx);
            }
        }
        self.users.get(user_id).expect("just inserted")
    }

    /// Apply a signed delta to `user_id`'s balance and append one
    /// transaction row with the resulting balance. The caller (§4.4's
    /// settlement, or deposit/withdraw below) is responsible for any
    /// precondition checks (sufficient balance, sandbox gate, etc).
    pub fn adjust(
        &mut self,
        user_id: &str,
        delta: Money,
        tx_type: TransactionType,
        meta: TransactionMeta,
    ) -> Result<WalletTransaction, WalletError> {
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| WalletError::UserNotFound(user_id.to_string()))?;
        let new_balance = round_external(user.wallet_balance + delta);
        user.wallet_balance = new_balance;
        user.updated_at = chrono::Utc::now();
        let tx = WalletTransaction {
            id: new_transaction_id(),
            user_id: user_id.to_string(),
            tx_type,
            amount: round_external(delta),
            balance_after: new_balance,
            meta,
            created_at: chrono::Utc::now(),
        };
        self.transactions.push(tx.clone());
        Ok(tx)
    }

    /// Accrue a platform fee: bump `totalEarnings` and append the
    /// `platform-fee` transaction against the synthetic `platform` user id.
    pub fn accrue_platform_fee(&mut self, amount: Money, meta: TransactionMeta) -> WalletTransaction {
        self.platform.total_earnings = round_external(self.platform.total_earnings + amount);
        let tx = WalletTransaction {
            id: new_transaction_id(),
            user_id: PLATFORM_USER_ID.to_string(),
            tx_type: TransactionType::PlatformFee,
            amount: round_external(amount),
            balance_after: self.platform.total_earnings,
            meta,
            created_at: chrono::Utc::now(),
        };
        self.transactions.push(tx.clone());
        tx
    }
}

/// Sandbox-gated deposit (`POST /api/wallet/deposit`).
pub fn deposit(
    book: &mut WalletBook,
    cfg: &DispatchConfig,
    user_id: &str,
    amount: Money,
) -> Result<WalletTransaction, WalletError> {
    if !cfg.wallet_sandbox_enabled {
        return Err(WalletError::SandboxDisabled);
    }
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount);
    }
    book.ensure_user(user_id, Decimal::ZERO);
    book.adjust(user_id, amount, TransactionType::WalletDeposit, TransactionMeta::default())
}

/// Sandbox-gated withdrawal (`POST /api/wallet/withdraw`); additionally
/// requires `amount <= currentBalance`.
pub fn withdraw(
    book: &mut WalletBook,
    cfg: &DispatchConfig,
    user_id: &str,
    amount: Money,
) -> Result<WalletTransaction, WalletError> {
    if !cfg.wallet_sandbox_enabled {
        return Err(WalletError::SandboxDisabled);
    }
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount);
    }
    book.ensure_user(user_id, Decimal::ZERO);
    let balance = book.get_user(user_id).map(|u| u.wallet_balance).unwrap_or(Decimal::ZERO);
    if amount > balance {
        return Err(WalletError::InsufficientBalance { amount, balance });
    }
    book.adjust(user_id, -amount, TransactionType::WalletWithdrawal, TransactionMeta::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ensure_user_seeds_balance_with_transaction() {
        let mut book = WalletBook::new();
        book.ensure_user("u1", dec!(50));
        let (txs, total) = book.transactions_for("u1", 10);
        assert_eq!(total, 1);
        assert_eq!(txs[0].tx_type, TransactionType::SeedCredit);
        assert_eq!(book.get_user("u1").unwrap().wallet_balance, dec!(50));
    }

    #[test]
    fn deposit_requires_sandbox() {
        let mut book = WalletBook::new();
        let cfg = DispatchConfig::default();
        let err = deposit(&mut book, &cfg, "u1", dec!(10)).unwrap_err();
        assert_eq!(err, WalletError::SandboxDisabled);
    }

    #[test]
    fn withdraw_rejects_overdraft() {
        let mut book = WalletBook::new();
        let mut cfg = DispatchConfig::default();
        cfg.wallet_sandbox_enabled = true;
        book.ensure_user("u1", dec!(10));
        let err = withdraw(&mut book, &cfg, "u1", dec!(20)).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientBalance { .. }));
    }

    #[test]
    fn balance_equals_seed_plus_transaction_sum() {
        let mut book = WalletBook::new();
        let mut cfg = DispatchConfig::default();
        cfg.wallet_sandbox_enabled = true;
        book.ensure_user("u1", dec!(100));
        deposit(&mut book, &cfg, "u1", dec!(25)).unwrap();
        withdraw(&mut book, &cfg, "u1", dec!(10)).unwrap();
        let (txs, _) = book.transactions_for("u1", 10);
        let sum: Decimal = txs.iter().map(|t| t.amount).sum();
        assert_eq!(sum, book.get_user("u1").unwrap().wallet_balance);
    }
}
