//! # keel-envelope
//! The Merkle envelope: a self-contained record binding an unspent output
//! to a block via its raw transaction, inclusion proof, and header.
//! Parsing is two-stage — untyped JSON into a [`raw::RawEnvelope`], then an
//! exhaustive semantic validation producing a frozen [`Envelope`] — so that
//! downstream signing code only ever sees verified data.

pub mod raw;
mod validate;

pub use validate::{Envelope, compose_envelope};
