use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    AuthenticationCallback, Authenticator, AuthenticatorStrength, BiometricManager,
    CapabilityStatus, ChallengeRequest, LaunchError, SettingsLauncher,
};
use crate::BioAuthError;

/// One event the simulated platform reports for a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformEvent {
    Succeeded,
    Failed,
    Error { code: i32, message: String },
}

impl PlatformEvent {
    /// Feed this event to a completion handle, returning whether it resolved the challenge.
    pub fn deliver(&self, callback: &AuthenticationCallback) -> bool {
        match self {
            PlatformEvent::Succeeded => callback.on_authentication_succeeded(),
            PlatformEvent::Failed => callback.on_authentication_failed(),
            PlatformEvent::Error { code, message } => {
                callback.on_authentication_error(*code, message.clone())
            }
        }
    }
}

impl fmt::Display for PlatformEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformEvent::Succeeded => f.write_str("succeeded"),
            PlatformEvent::Failed => f.write_str("failed"),
            PlatformEvent::Error { code, message } => write!(f, "error:{}:{}", code, message),
        }
    }
}

/// Parses `succeeded`, `failed` or `error:<code>[:<message>]`.
impl FromStr for PlatformEvent {
    type Err = BioAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "succeeded" | "success" => return Ok(PlatformEvent::Succeeded),
            "failed" | "failure" => return Ok(PlatformEvent::Failed),
            _ => {}
        }

        let mut parts = trimmed.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(code), message) if kind.eq_ignore_ascii_case("error") => {
                let code = code.trim().parse::<i32>().map_err(|_| {
                    BioAuthError::InvalidInput(format!("invalid error code '{}'", code))
                })?;
                Ok(PlatformEvent::Error {
                    code,
                    message: message.unwrap_or_default().to_string(),
                })
            }
            _ => Err(BioAuthError::InvalidInput(format!(
                "unknown platform event '{}'",
                trimmed
            ))),
        }
    }
}

/// Every call the simulated platform has received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformCalls {
    pub availability_queries: usize,
    pub challenges: Vec<ChallengeRequest>,
    pub enrollment_launches: Vec<AuthenticatorStrength>,
    pub security_settings_launches: usize,
}

struct SimulatedState {
    availability_code: i32,
    events: Vec<PlatformEvent>,
    deferred: bool,
    enrollment_screen: Result<(), LaunchError>,
    security_settings: Result<(), LaunchError>,
    pending: Vec<AuthenticationCallback>,
    calls: PlatformCalls,
}

/// In-process device that implements every platform boundary from a script.
///
/// Challenges either resolve immediately from the scripted events or, when deferred,
/// stay pending until [`SimulatedPlatform::complete_pending`] or
/// [`SimulatedPlatform::abandon_pending`] is called.
pub struct SimulatedPlatform {
    state: Mutex<SimulatedState>,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self {
            state: Mutex::new(SimulatedState {
                availability_code: CapabilityStatus::Available.platform_code(),
                events: vec![PlatformEvent::Succeeded],
                deferred: false,
                enrollment_screen: Ok(()),
                security_settings: Ok(()),
                pending: Vec::new(),
                calls: PlatformCalls::default(),
            }),
        }
    }
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capability(self, status: CapabilityStatus) -> Self {
        self.with_availability_code(status.platform_code())
    }

    pub fn with_availability_code(self, code: i32) -> Self {
        self.lock().availability_code = code;
        self
    }

    /// Events reported, in order, for every challenge.
    pub fn with_events(self, events: Vec<PlatformEvent>) -> Self {
        self.lock().events = events;
        self
    }

    /// Keep challenges pending instead of answering inside `authenticate`.
    pub fn deferred(self) -> Self {
        self.lock().deferred = true;
        self
    }

    pub fn with_enrollment_screen(self, result: Result<(), LaunchError>) -> Self {
        self.lock().enrollment_screen = result;
        self
    }

    pub fn with_security_settings(self, result: Result<(), LaunchError>) -> Self {
        self.lock().security_settings = result;
        self
    }

    /// Change what the device reports, e.g. after the user enrolled.
    pub fn set_capability(&self, status: CapabilityStatus) {
        self.lock().availability_code = status.platform_code();
    }

    pub fn pending_challenges(&self) -> usize {
        self.lock().pending.len()
    }

    /// Deliver `events` to the oldest pending challenge. Returns false if none was pending.
    pub fn complete_pending(&self, events: &[PlatformEvent]) -> bool {
        let callback = {
            let mut state = self.lock();
            if state.pending.is_empty() {
                return false;
            }
            state.pending.remove(0)
        };

        for event in events {
            event.deliver(&callback);
        }
        true
    }

    /// Drop every pending challenge without reporting, as a torn-down screen would.
    pub fn abandon_pending(&self) -> usize {
        let pending = std::mem::take(&mut self.lock().pending);
        let count = pending.len();
        drop(pending);
        count
    }

    pub fn calls(&self) -> PlatformCalls {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BiometricManager for SimulatedPlatform {
    fn can_authenticate(&self, _strength: AuthenticatorStrength) -> i32 {
        let mut state = self.lock();
        state.calls.availability_queries += 1;
        state.availability_code
    }
}

impl Authenticator for SimulatedPlatform {
    fn authenticate(&self, request: &ChallengeRequest, callback: AuthenticationCallback) {
        let events = {
            let mut state = self.lock();
            state.calls.challenges.push(request.clone());
            if state.deferred {
                state.pending.push(callback);
                return;
            }
            state.events.clone()
        };

        // Delivered outside the lock; the continuation may call back into the platform.
        for event in &events {
            event.deliver(&callback);
        }
    }
}

impl SettingsLauncher for SimulatedPlatform {
    fn open_biometric_enrollment(
        &self,
        strength: AuthenticatorStrength,
    ) -> Result<(), LaunchError> {
        let mut state = self.lock();
        state.calls.enrollment_launches.push(strength);
        state.enrollment_screen.clone()
    }

    fn open_security_settings(&self) -> Result<(), LaunchError> {
        let mut state = self.lock();
        state.calls.security_settings_launches += 1;
        state.security_settings.clone()
    }
}
