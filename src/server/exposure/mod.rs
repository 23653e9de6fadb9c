//! API Exposure modules for different protocols
//!
//! Each exposure type consumes the entity registry and produces a Router for
//! that protocol.

pub mod rest;

pub use rest::RestExposure;
