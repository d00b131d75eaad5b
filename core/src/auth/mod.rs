pub mod capability;
pub mod enrollment;
pub mod orchestrator;
pub mod outcome;
pub mod request;
pub mod simulated;

pub use capability::*;
pub use enrollment::*;
pub use orchestrator::*;
pub use outcome::*;
pub use request::*;
pub use simulated::*;

/// Log target shared by every diagnostic emitted around the biometric platform.
pub const LOG_TARGET: &str = "BiometricAuth";
