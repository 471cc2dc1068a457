pub mod frame;
pub mod transaction;

pub use frame::RawFrame;
pub use transaction::{exchange, Command, Exchange, TransactionConfig, WriteStatus};
