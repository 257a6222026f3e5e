pub mod logger;
pub mod secret_scrubbing;

pub use logger::{init, LoggerGuard};
pub use secret_scrubbing::SecretScrubber;
