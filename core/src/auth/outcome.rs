use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes delivered with the platform's authentication-error callback.
pub mod error_codes {
    pub const ERROR_HW_UNAVAILABLE: i32 = 1;
    pub const ERROR_UNABLE_TO_PROCESS: i32 = 2;
    pub const ERROR_TIMEOUT: i32 = 3;
    pub const ERROR_NO_SPACE: i32 = 4;
    pub const ERROR_CANCELED: i32 = 5;
    pub const ERROR_LOCKOUT: i32 = 7;
    pub const ERROR_VENDOR: i32 = 8;
    pub const ERROR_LOCKOUT_PERMANENT: i32 = 9;
    pub const ERROR_USER_CANCELED: i32 = 10;
    pub const ERROR_NO_BIOMETRICS: i32 = 11;
    pub const ERROR_HW_NOT_PRESENT: i32 = 12;
    pub const ERROR_NEGATIVE_BUTTON: i32 = 13;
    pub const ERROR_NO_DEVICE_CREDENTIAL: i32 = 14;

    /// Codes that mean the challenge was dismissed rather than broken.
    pub fn is_cancellation(code: i32) -> bool {
        matches!(
            code,
            ERROR_CANCELED | ERROR_USER_CANCELED | ERROR_NEGATIVE_BUTTON
        )
    }

    /// Short diagnostic name for a code; unmapped codes are reported as "unmapped".
    pub fn describe(code: i32) -> &'static str {
        match code {
            ERROR_HW_UNAVAILABLE => "hardware unavailable",
            ERROR_UNABLE_TO_PROCESS => "unable to process",
            ERROR_TIMEOUT => "timeout",
            ERROR_NO_SPACE => "no space",
            ERROR_CANCELED => "canceled",
            ERROR_LOCKOUT => "lockout",
            ERROR_VENDOR => "vendor",
            ERROR_LOCKOUT_PERMANENT => "permanent lockout",
            ERROR_USER_CANCELED => "user canceled",
            ERROR_NO_BIOMETRICS => "no biometrics",
            ERROR_HW_NOT_PRESENT => "hardware not present",
            ERROR_NEGATIVE_BUTTON => "negative button",
            ERROR_NO_DEVICE_CREDENTIAL => "no device credential",
            _ => "unmapped",
        }
    }
}

/// Terminal classification of one challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeOutcome {
    /// The platform confirmed a verified biometric match.
    Succeeded,
    /// A biometric sample did not match.
    Failed,
    /// Non-retryable termination reported by the platform.
    Error { code: i32, message: String },
    /// The user, the app or the lifecycle dismissed the challenge.
    Cancelled,
}

impl ChallengeOutcome {
    /// Translate the platform error callback; cancel-class codes become `Cancelled`.
    pub fn from_platform_error(code: i32, message: impl Into<String>) -> Self {
        if error_codes::is_cancellation(code) {
            ChallengeOutcome::Cancelled
        } else {
            ChallengeOutcome::Error {
                code,
                message: message.into(),
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ChallengeOutcome::Succeeded)
    }
}

impl fmt::Display for ChallengeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeOutcome::Succeeded => f.write_str("succeeded"),
            ChallengeOutcome::Failed => f.write_str("failed"),
            ChallengeOutcome::Error { code, message } => {
                write!(f, "error {} ({}): {}", code, error_codes::describe(*code), message)
            }
            ChallengeOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}
