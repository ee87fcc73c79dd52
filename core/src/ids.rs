//! Opaque id generation.
//!
//! Every entity id in the system is a prefixed UUID v4 string; the prefix is
//! purely a debugging aid (it never affects routing or comparisons).

use uuid::Uuid;

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4())
}

pub fn new_task_id() -> String {
    new_id("task")
}

pub fn new_transaction_id() -> String {
    new_id("tx")
}

pub const PLATFORM_USER_ID: &str = "platform";
