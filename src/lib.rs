//! Gatekeeper - Weighted Admission Control
//!
//! This crate decides, per incoming request, whether the request may proceed.
//! Every operation carries a cost that is charged against a per-client budget
//! resetting on a fixed window. Anonymous clients are budgeted by network
//! address and credential-bearing clients by credential, independently.
//! Counters live in a shared store (Redis, or process memory for a single
//! instance) that performs the charge-and-check atomically.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
