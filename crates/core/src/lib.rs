//! Domain logic for the certificate generator.
//!
//! Everything in this crate is synchronous and free of HTTP concerns so the
//! same code paths serve the synchronous, asynchronous and preview flows.

pub mod archive;
pub mod cleanup;
pub mod error;
pub mod fonts;
pub mod generation;
pub mod naming;
pub mod placement;
pub mod render;
pub mod table;
pub mod types;
