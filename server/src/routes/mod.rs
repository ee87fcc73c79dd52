pub mod me;
pub mod tasks;
pub mod wallet;
pub mod worker;
