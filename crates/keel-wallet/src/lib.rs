//! # keel-wallet
//! Spending side of the toolkit: fork-id signature hashes, transaction
//! construction over validated envelopes, and the one-shot signing session
//! state machine.

pub mod builder;
pub mod session;
pub mod sighash;
