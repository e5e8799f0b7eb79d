//! Deterministic, pure logic shared by the engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and injected callbacks and return deterministic outputs suitable for
//! tests.

pub mod crypto;
pub mod fingerprint;
pub mod prompt;
pub mod template;
pub mod trust;
pub mod types;
