//! Agent-Forge orchestration core.
//!
//! The control plane that turns an incoming code-forge issue into a
//! reviewed pull request: claim discovery, routing, agent dispatch,
//! pipeline tracking and the cross-cutting rate-limit/safety guards that
//! every outbound forge action passes through.

pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{CoreError, CoreResult};
