//! Port traits (`spec.md` §6). Adapters in `infrastructure` implement
//! these; services depend only on the trait, never the concrete adapter.

pub mod clock;
pub mod credential_store;
pub mod forge;
pub mod llm;

pub use clock::Clock;
pub use credential_store::CredentialStore;
pub use forge::{ForgePort, RateLimitStatus};
pub use llm::{LlmCompletion, LlmProvider};
