//! Error hierarchy.
//!
//! Each subsystem gets its own `thiserror` enum, the way the teacher's
//! `AgentError` / `TransactionError` / `SettlementError` are scoped to their
//! own modules. [`DispatchError`] is the aggregate a caller composing several
//! subsystems (the allocator, the lifecycle facade) actually propagates.

use thiserror::Error;

/// Errors raised while planning or normalising a bucket partition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlannerError {
    #[error("task has no input items to plan over")]
    EmptyInput,
}

/// Errors raised by wallet ledger operations (C1).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("sandbox wallet operations are disabled")]
    SandboxDisabled,

    #[error("withdrawal of {amount} exceeds balance {balance}")]
    InsufficientBalance {
        amount: crate::money::Money,
        balance: crate::money::Money,
    },

    #[error("deposit/withdrawal amount must be positive")]
    InvalidAmount,
}

/// Errors raised while settling a bucket payout (C5).
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("customer account not found for task {0}")]
    CustomerNotFound(String),

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Soft, non-fatal reasons the allocator declines to grant a bucket.
///
/// These are never raised as errors: they flow back to the worker as
/// `{ ok: false, message }`, per the propagation policy in the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateReason {
    NoBucket,
    NotAssigned,
    Revoked,
    BudgetExhausted,
    InsufficientFunds,
}

impl StateReason {
    /// The exact wire string used on `/api/worker/next-chunk` and friends.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            StateReason::NoBucket => "no-chunk",
            StateReason::NotAssigned => "not-assigned",
            StateReason::Revoked => "revoked",
            StateReason::BudgetExhausted => "budget-exhausted",
            StateReason::InsufficientFunds => "insufficient-funds",
        }
    }
}

/// The aggregate error type returned by `DispatchService` (C7) operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("worker {worker_id} is not registered for task {task_id}")]
    WorkerNotRegistered { task_id: String, worker_id: String },

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
