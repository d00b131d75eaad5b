use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::LOG_TARGET;
use crate::BioAuthError;

/// Raw availability codes reported by the platform biometric manager.
pub mod availability_codes {
    pub const BIOMETRIC_SUCCESS: i32 = 0;
    pub const BIOMETRIC_STATUS_UNKNOWN: i32 = -1;
    pub const BIOMETRIC_ERROR_UNSUPPORTED: i32 = -2;
    pub const BIOMETRIC_ERROR_HW_UNAVAILABLE: i32 = 1;
    pub const BIOMETRIC_ERROR_NONE_ENROLLED: i32 = 11;
    pub const BIOMETRIC_ERROR_NO_HARDWARE: i32 = 12;
    pub const BIOMETRIC_ERROR_SECURITY_UPDATE_REQUIRED: i32 = 15;
}

/// Authenticator classes a challenge may be restricted to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuthenticatorStrength {
    /// Highest-assurance biometric tier.
    Strong,
    /// Convenience biometrics; never requested by this crate but reported by some platforms.
    Weak,
}

impl AuthenticatorStrength {
    /// Bit flag the platform uses for this class.
    pub fn platform_flag(self) -> i32 {
        match self {
            AuthenticatorStrength::Strong => 0x000F,
            AuthenticatorStrength::Weak => 0x00FF,
        }
    }

    pub fn from_platform_flag(flag: i32) -> Option<Self> {
        match flag {
            0x000F => Some(AuthenticatorStrength::Strong),
            0x00FF => Some(AuthenticatorStrength::Weak),
            _ => None,
        }
    }
}

/// Classification of one capability query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CapabilityStatus {
    Available,
    NoHardware,
    HardwareUnavailable,
    NotEnrolled,
    Unknown,
}

impl CapabilityStatus {
    /// Map a raw platform response. Anything unrecognized degrades to `Unknown`.
    pub fn from_platform_code(code: i32) -> Self {
        use availability_codes::*;

        match code {
            BIOMETRIC_SUCCESS => CapabilityStatus::Available,
            BIOMETRIC_ERROR_NO_HARDWARE => CapabilityStatus::NoHardware,
            BIOMETRIC_ERROR_HW_UNAVAILABLE => CapabilityStatus::HardwareUnavailable,
            BIOMETRIC_ERROR_NONE_ENROLLED => CapabilityStatus::NotEnrolled,
            _ => CapabilityStatus::Unknown,
        }
    }

    /// Canonical platform code for this status, used by simulated devices.
    pub fn platform_code(self) -> i32 {
        use availability_codes::*;

        match self {
            CapabilityStatus::Available => BIOMETRIC_SUCCESS,
            CapabilityStatus::NoHardware => BIOMETRIC_ERROR_NO_HARDWARE,
            CapabilityStatus::HardwareUnavailable => BIOMETRIC_ERROR_HW_UNAVAILABLE,
            CapabilityStatus::NotEnrolled => BIOMETRIC_ERROR_NONE_ENROLLED,
            CapabilityStatus::Unknown => BIOMETRIC_STATUS_UNKNOWN,
        }
    }

    pub fn is_available(self) -> bool {
        self == CapabilityStatus::Available
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityStatus::Available => "available",
            CapabilityStatus::NoHardware => "no-hardware",
            CapabilityStatus::HardwareUnavailable => "hardware-unavailable",
            CapabilityStatus::NotEnrolled => "not-enrolled",
            CapabilityStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityStatus {
    type Err = BioAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "available" => Ok(CapabilityStatus::Available),
            "no-hardware" => Ok(CapabilityStatus::NoHardware),
            "hardware-unavailable" => Ok(CapabilityStatus::HardwareUnavailable),
            "not-enrolled" => Ok(CapabilityStatus::NotEnrolled),
            "unknown" => Ok(CapabilityStatus::Unknown),
            other => Err(BioAuthError::InvalidInput(format!(
                "unknown capability status '{}'",
                other
            ))),
        }
    }
}

/// Abstraction over the platform's biometric manager.
pub trait BiometricManager: Send + Sync {
    /// Raw availability code for the requested authenticator class.
    fn can_authenticate(&self, strength: AuthenticatorStrength) -> i32;
}

/// Queries the platform for strong-biometric availability.
///
/// Every call goes to the platform; nothing is cached, so a user who enrolls a
/// fingerprint and comes back is seen as capable on the next attempt.
#[derive(Clone)]
pub struct CapabilityChecker {
    manager: Arc<dyn BiometricManager>,
    strength: AuthenticatorStrength,
}

impl CapabilityChecker {
    pub fn new(manager: Arc<dyn BiometricManager>) -> Self {
        Self {
            manager,
            strength: AuthenticatorStrength::Strong,
        }
    }

    pub fn check(&self) -> CapabilityStatus {
        let code = self.manager.can_authenticate(self.strength);
        let status = CapabilityStatus::from_platform_code(code);

        match status {
            CapabilityStatus::Available => {
                debug!(target: LOG_TARGET, "Strong biometric authentication available.")
            }
            CapabilityStatus::NoHardware => {
                debug!(target: LOG_TARGET, "No biometric hardware available.")
            }
            CapabilityStatus::HardwareUnavailable => {
                debug!(target: LOG_TARGET, "Biometric hardware unavailable.")
            }
            CapabilityStatus::NotEnrolled => {
                debug!(target: LOG_TARGET, "No biometrics enrolled.")
            }
            CapabilityStatus::Unknown => {
                debug!(target: LOG_TARGET, code, "Unrecognized biometric availability.")
            }
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::availability_codes::*;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    struct FixedManager {
        code: AtomicI32,
        queries: AtomicUsize,
    }

    impl FixedManager {
        fn new(code: i32) -> Arc<Self> {
            Arc::new(Self {
                code: AtomicI32::new(code),
                queries: AtomicUsize::new(0),
            })
        }
    }

    impl BiometricManager for FixedManager {
        fn can_authenticate(&self, strength: AuthenticatorStrength) -> i32 {
            assert_eq!(strength, AuthenticatorStrength::Strong);
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.code.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn maps_known_platform_codes() {
        assert_eq!(
            CapabilityStatus::from_platform_code(BIOMETRIC_SUCCESS),
            CapabilityStatus::Available
        );
        assert_eq!(
            CapabilityStatus::from_platform_code(BIOMETRIC_ERROR_NO_HARDWARE),
            CapabilityStatus::NoHardware
        );
        assert_eq!(
            CapabilityStatus::from_platform_code(BIOMETRIC_ERROR_HW_UNAVAILABLE),
            CapabilityStatus::HardwareUnavailable
        );
        assert_eq!(
            CapabilityStatus::from_platform_code(BIOMETRIC_ERROR_NONE_ENROLLED),
            CapabilityStatus::NotEnrolled
        );
    }

    #[test]
    fn unrecognized_codes_degrade_to_unknown() {
        for code in [
            BIOMETRIC_STATUS_UNKNOWN,
            BIOMETRIC_ERROR_UNSUPPORTED,
            BIOMETRIC_ERROR_SECURITY_UPDATE_REQUIRED,
            42,
        ] {
            let status = CapabilityStatus::from_platform_code(code);
            assert_eq!(status, CapabilityStatus::Unknown);
            assert!(!status.is_available());
        }
    }

    #[test]
    fn check_requeries_every_call() {
        let manager = FixedManager::new(BIOMETRIC_ERROR_NONE_ENROLLED);
        let checker = CapabilityChecker::new(manager.clone());

        assert_eq!(checker.check(), CapabilityStatus::NotEnrolled);

        // user enrolled a fingerprint in settings and came back
        manager.code.store(BIOMETRIC_SUCCESS, Ordering::SeqCst);
        assert_eq!(checker.check(), CapabilityStatus::Available);
        assert_eq!(manager.queries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parses_status_names() {
        assert_eq!(
            "not_enrolled".parse::<CapabilityStatus>().unwrap(),
            CapabilityStatus::NotEnrolled
        );
        assert_eq!(
            "Hardware-Unavailable".parse::<CapabilityStatus>().unwrap(),
            CapabilityStatus::HardwareUnavailable
        );
        assert!("fingerprint".parse::<CapabilityStatus>().is_err());
    }

    #[test]
    fn status_round_trips_through_platform_code() {
        for status in [
            CapabilityStatus::Available,
            CapabilityStatus::NoHardware,
            CapabilityStatus::HardwareUnavailable,
            CapabilityStatus::NotEnrolled,
            CapabilityStatus::Unknown,
        ] {
            assert_eq!(CapabilityStatus::from_platform_code(status.platform_code()), status);
        }
    }

    #[test]
    fn strength_flags() {
        assert_eq!(AuthenticatorStrength::Strong.platform_flag(), 0x000F);
        assert_eq!(
            AuthenticatorStrength::from_platform_flag(0x000F),
            Some(AuthenticatorStrength::Strong)
        );
        assert_eq!(AuthenticatorStrength::from_platform_flag(0x8000), None);
    }
}
