//! Cryptography utilities for Warden

pub mod hash;

pub use hash::*;
