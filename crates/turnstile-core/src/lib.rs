//! # Turnstile Core
//!
//! Request admission control for a multi-tenant HTTP API.
//! This crate holds the domain (identifiers, tiers, policies, verdicts), the
//! window limiter and the admission gate. Counters live behind the
//! [`ports::CounterStore`] trait; implementations are in `turnstile-infra`.

pub mod admission;
pub mod domain;
pub mod error;
pub mod ports;

pub use admission::{AdmissionConfig, AdmissionGate, AdmissionRequest, AdmissionResult, Denial};
pub use error::{AdmissionError, PolicyError};
