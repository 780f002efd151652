//! # Integration Tests
//!
//! Cross-crate end-to-end tests.
//!
//! - Delivery scenarios: success, failing endpoint, drain on recovery,
//!   shutdown mid-batch
//! - Source properties: folder enumeration and looping, rate pacing
//! - Full run over a local HTTP endpoint

#[cfg(test)]
mod support;

#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod sources;

#[cfg(test)]
mod http_e2e;
