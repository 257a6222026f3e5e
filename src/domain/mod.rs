//! Domain layer: pure types and port traits for the orchestration core.
//!
//! Nothing under `domain` performs I/O. Adapters in `infrastructure`
//! implement the traits declared in `domain::ports`; services in
//! `services` depend only on those traits, never on concrete adapters.

pub mod errors;
pub mod models;
pub mod ports;
