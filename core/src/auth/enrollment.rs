use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AuthenticatorStrength, LOG_TARGET};

/// Failure to bring up a platform settings screen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    #[error("settings screen not found on this platform")]
    NotFound,

    #[error("{0}")]
    Failed(String),
}

/// Platform settings screens reachable from the app.
pub trait SettingsLauncher: Send + Sync {
    /// Biometric enrollment restricted to the given authenticator class.
    fn open_biometric_enrollment(&self, strength: AuthenticatorStrength)
        -> Result<(), LaunchError>;

    /// General security settings.
    fn open_security_settings(&self) -> Result<(), LaunchError>;
}

/// Which screen, if any, a redirect ended up showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectOutcome {
    EnrollmentOpened,
    SecuritySettingsOpened,
    NothingOpened,
}

/// Sends users without a usable strong biometric to the platform settings.
///
/// Launch failures never reach the caller; they are logged so silent failures stay visible.
#[derive(Clone)]
pub struct EnrollmentRedirector {
    launcher: Arc<dyn SettingsLauncher>,
    strength: AuthenticatorStrength,
}

impl EnrollmentRedirector {
    pub fn new(launcher: Arc<dyn SettingsLauncher>) -> Self {
        Self {
            launcher,
            strength: AuthenticatorStrength::Strong,
        }
    }

    pub fn redirect(&self) -> RedirectOutcome {
        match self.launcher.open_biometric_enrollment(self.strength) {
            Ok(()) => {
                info!(target: LOG_TARGET, strength = ?self.strength, "Opened biometric enrollment");
                return RedirectOutcome::EnrollmentOpened;
            }
            Err(LaunchError::NotFound) => {
                debug!(
                    target: LOG_TARGET,
                    "Biometric enrollment screen not found, falling back to security settings"
                );
            }
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    error = %err,
                    "Biometric enrollment launch failed, falling back to security settings"
                );
            }
        }

        match self.launcher.open_security_settings() {
            Ok(()) => {
                info!(target: LOG_TARGET, "Opened security settings");
                RedirectOutcome::SecuritySettingsOpened
            }
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    error = %err,
                    "Security settings launch failed; user was not redirected"
                );
                RedirectOutcome::NothingOpened
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedLauncher {
        enrollment: Result<(), LaunchError>,
        security: Result<(), LaunchError>,
        log: Mutex<Vec<&'static str>>,
    }

    impl ScriptedLauncher {
        fn new(enrollment: Result<(), LaunchError>, security: Result<(), LaunchError>) -> Arc<Self> {
            Arc::new(Self {
                enrollment,
                security,
                log: Mutex::new(Vec::new()),
            })
        }
    }

    impl SettingsLauncher for ScriptedLauncher {
        fn open_biometric_enrollment(
            &self,
            strength: AuthenticatorStrength,
        ) -> Result<(), LaunchError> {
            assert_eq!(strength, AuthenticatorStrength::Strong);
            self.log.lock().unwrap().push("enroll");
            self.enrollment.clone()
        }

        fn open_security_settings(&self) -> Result<(), LaunchError> {
            self.log.lock().unwrap().push("security");
            self.security.clone()
        }
    }

    #[test]
    fn enrollment_screen_preferred() {
        let launcher = ScriptedLauncher::new(Ok(()), Ok(()));
        let outcome = EnrollmentRedirector::new(launcher.clone()).redirect();

        assert_eq!(outcome, RedirectOutcome::EnrollmentOpened);
        assert_eq!(*launcher.log.lock().unwrap(), vec!["enroll"]);
    }

    #[test]
    fn missing_enrollment_falls_back() {
        let launcher = ScriptedLauncher::new(Err(LaunchError::NotFound), Ok(()));
        let outcome = EnrollmentRedirector::new(launcher.clone()).redirect();

        assert_eq!(outcome, RedirectOutcome::SecuritySettingsOpened);
        assert_eq!(*launcher.log.lock().unwrap(), vec!["enroll", "security"]);
    }

    #[test]
    fn broken_enrollment_also_falls_back() {
        let launcher = ScriptedLauncher::new(
            Err(LaunchError::Failed("activity crashed".to_string())),
            Ok(()),
        );
        let outcome = EnrollmentRedirector::new(launcher).redirect();
        assert_eq!(outcome, RedirectOutcome::SecuritySettingsOpened);
    }

    #[test]
    fn both_failures_are_swallowed() {
        let launcher = ScriptedLauncher::new(Err(LaunchError::NotFound), Err(LaunchError::NotFound));
        let outcome = EnrollmentRedirector::new(launcher.clone()).redirect();

        assert_eq!(outcome, RedirectOutcome::NothingOpened);
        assert_eq!(launcher.log.lock().unwrap().len(), 2);
    }
}
