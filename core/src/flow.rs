//! Top-level login flow: one trigger runs one attempt.
//!
//! ```text
//! Idle -> Checking -> Redirecting ------------------> Idle
//!                  \-> Challenging -> Resolved -----> Idle
//! ```
//!
//! The flow is the only writer of the result text and publishes every write on a
//! `watch` channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::{
    Authenticator, BiometricManager, CapabilityChecker, CapabilityStatus, ChallengeOrchestrator,
    ChallengeOutcome, ChallengeRequest, EnrollmentRedirector, RedirectOutcome, SettingsLauncher,
    LOG_TARGET,
};

/// The user-visible status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticationResultText {
    NotAuthenticated,
    Succeeded,
    Failed,
    Unavailable,
}

impl AuthenticationResultText {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthenticationResultText::NotAuthenticated => "Not Authenticated",
            AuthenticationResultText::Succeeded => "Authentication Succeeded!",
            AuthenticationResultText::Failed => "Authentication Failed!",
            AuthenticationResultText::Unavailable => "Biometric not available or not configured.",
        }
    }

    pub fn from_outcome(outcome: &ChallengeOutcome) -> Self {
        if outcome.is_success() {
            AuthenticationResultText::Succeeded
        } else {
            AuthenticationResultText::Failed
        }
    }
}

impl Default for AuthenticationResultText {
    fn default() -> Self {
        AuthenticationResultText::NotAuthenticated
    }
}

impl fmt::Display for AuthenticationResultText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowPhase {
    Idle,
    Checking,
    Redirecting,
    Challenging { attempt: u64 },
    Resolved,
}

impl FlowPhase {
    fn is_busy(self) -> bool {
        matches!(self, FlowPhase::Checking | FlowPhase::Challenging { .. })
    }
}

/// What a trigger did synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerResult {
    /// Not capable; the user was sent to settings and the result text was set.
    Redirected {
        status: CapabilityStatus,
        redirect: RedirectOutcome,
    },
    /// A challenge was issued; its outcome may already have been applied.
    ChallengeStarted { attempt: u64 },
    /// Another attempt is in flight; nothing happened.
    Busy,
}

struct FlowState {
    phase: FlowPhase,
    attempts: u64,
    last_outcome: Option<ChallengeOutcome>,
}

struct FlowInner {
    checker: CapabilityChecker,
    redirector: EnrollmentRedirector,
    orchestrator: ChallengeOrchestrator,
    request: ChallengeRequest,
    state: Mutex<FlowState>,
    result: watch::Sender<AuthenticationResultText>,
}

impl FlowInner {
    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: FlowPhase) {
        let mut state = self.lock();
        debug!(target: LOG_TARGET, from = ?state.phase, to = ?phase, "Flow transition");
        state.phase = phase;
    }

    fn resolve(&self, attempt: u64, outcome: ChallengeOutcome) {
        let mut state = self.lock();
        if state.phase != (FlowPhase::Challenging { attempt }) {
            debug!(
                target: LOG_TARGET,
                attempt,
                phase = ?state.phase,
                "Dropping outcome for an attempt that is no longer active"
            );
            return;
        }

        let text = AuthenticationResultText::from_outcome(&outcome);
        info!(target: LOG_TARGET, attempt, outcome = %outcome, "Challenge resolved");

        state.phase = FlowPhase::Resolved;
        state.last_outcome = Some(outcome);
        self.result.send_replace(text);
        state.phase = FlowPhase::Idle;
    }
}

/// Drives the capability check, the redirect and the challenge for each trigger.
///
/// Overlapping triggers are rejected with [`TriggerResult::Busy`]. Outcomes arriving
/// after the flow was dropped, or for an attempt that is no longer active, are ignored.
pub struct AuthenticationFlow {
    inner: Arc<FlowInner>,
}

impl AuthenticationFlow {
    pub fn new(
        manager: Arc<dyn BiometricManager>,
        authenticator: Arc<dyn Authenticator>,
        launcher: Arc<dyn SettingsLauncher>,
        request: ChallengeRequest,
    ) -> Self {
        let (result, _) = watch::channel(AuthenticationResultText::NotAuthenticated);
        Self {
            inner: Arc::new(FlowInner {
                checker: CapabilityChecker::new(manager),
                redirector: EnrollmentRedirector::new(launcher),
                orchestrator: ChallengeOrchestrator::new(authenticator),
                request,
                state: Mutex::new(FlowState {
                    phase: FlowPhase::Idle,
                    attempts: 0,
                    last_outcome: None,
                }),
                result,
            }),
        }
    }

    /// Build a flow whose three platform boundaries are served by one object.
    pub fn from_platform<P>(platform: Arc<P>, request: ChallengeRequest) -> Self
    where
        P: BiometricManager + Authenticator + SettingsLauncher + 'static,
    {
        Self::new(platform.clone(), platform.clone(), platform, request)
    }

    pub fn result_text(&self) -> AuthenticationResultText {
        *self.inner.result.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthenticationResultText> {
        self.inner.result.subscribe()
    }

    pub fn phase(&self) -> FlowPhase {
        self.inner.lock().phase
    }

    pub fn last_outcome(&self) -> Option<ChallengeOutcome> {
        self.inner.lock().last_outcome.clone()
    }

    /// Attempts started so far, including redirected ones.
    pub fn attempts(&self) -> u64 {
        self.inner.lock().attempts
    }

    /// Handle one press of the authenticate control.
    pub fn trigger(&self) -> TriggerResult {
        let attempt = {
            let mut state = self.inner.lock();
            if state.phase.is_busy() {
                warn!(
                    target: LOG_TARGET,
                    phase = ?state.phase,
                    "Authentication already in progress; ignoring trigger"
                );
                return TriggerResult::Busy;
            }
            state.attempts += 1;
            state.phase = FlowPhase::Checking;
            state.attempts
        };

        let status = self.inner.checker.check();
        if !status.is_available() {
            self.inner.set_phase(FlowPhase::Redirecting);
            let redirect = self.inner.redirector.redirect();
            self.inner
                .result
                .send_replace(AuthenticationResultText::Unavailable);
            self.inner.set_phase(FlowPhase::Idle);

            info!(target: LOG_TARGET, attempt, %status, ?redirect, "Biometric login unavailable");
            return TriggerResult::Redirected { status, redirect };
        }

        self.inner.set_phase(FlowPhase::Challenging { attempt });

        let flow: Weak<FlowInner> = Arc::downgrade(&self.inner);
        self.inner
            .orchestrator
            .start(self.inner.request.reissue(), move |outcome| match flow.upgrade() {
                Some(inner) => inner.resolve(attempt, outcome),
                None => debug!(
                    target: LOG_TARGET,
                    attempt,
                    "Outcome arrived after the flow was dropped"
                ),
            });

        TriggerResult::ChallengeStarted { attempt }
    }

    /// Run one attempt to completion and return the resulting text.
    ///
    /// A busy flow returns the current text without waiting.
    pub async fn authenticate(&self) -> AuthenticationResultText {
        let mut results = self.subscribe();
        results.borrow_and_update();

        match self.trigger() {
            TriggerResult::Busy => self.result_text(),
            TriggerResult::Redirected { .. } => AuthenticationResultText::Unavailable,
            TriggerResult::ChallengeStarted { .. } => {
                // The sender lives as long as `self`, so this only waits for the write.
                if results.changed().await.is_err() {
                    return self.result_text();
                }
                let text = *results.borrow_and_update();
                text
            }
        }
    }
}

impl fmt::Debug for AuthenticationFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationFlow")
            .field("phase", &self.phase())
            .field("result", &self.result_text())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{error_codes, LaunchError, PlatformEvent, SimulatedPlatform};

    fn flow_for(platform: &Arc<SimulatedPlatform>) -> AuthenticationFlow {
        AuthenticationFlow::from_platform(platform.clone(), ChallengeRequest::default())
    }

    #[test]
    fn result_texts_are_exact() {
        assert_eq!(
            AuthenticationResultText::NotAuthenticated.to_string(),
            "Not Authenticated"
        );
        assert_eq!(
            AuthenticationResultText::Succeeded.to_string(),
            "Authentication Succeeded!"
        );
        assert_eq!(
            AuthenticationResultText::Failed.to_string(),
            "Authentication Failed!"
        );
        assert_eq!(
            AuthenticationResultText::Unavailable.to_string(),
            "Biometric not available or not configured."
        );
    }

    #[test]
    fn every_non_success_outcome_maps_to_failure() {
        for outcome in [
            ChallengeOutcome::Failed,
            ChallengeOutcome::Cancelled,
            ChallengeOutcome::Error {
                code: error_codes::ERROR_LOCKOUT,
                message: "locked".to_string(),
            },
        ] {
            assert_eq!(
                AuthenticationResultText::from_outcome(&outcome),
                AuthenticationResultText::Failed
            );
        }
    }

    #[test]
    fn initial_state() {
        let platform = Arc::new(SimulatedPlatform::new());
        let flow = flow_for(&platform);
        assert_eq!(flow.result_text(), AuthenticationResultText::NotAuthenticated);
        assert_eq!(flow.phase(), FlowPhase::Idle);
        assert_eq!(flow.attempts(), 0);
    }

    #[test]
    fn busy_while_challenging() {
        let platform = Arc::new(SimulatedPlatform::new().deferred());
        let flow = flow_for(&platform);

        assert_eq!(flow.trigger(), TriggerResult::ChallengeStarted { attempt: 1 });
        assert_eq!(flow.phase(), FlowPhase::Challenging { attempt: 1 });
        assert_eq!(flow.trigger(), TriggerResult::Busy);
        assert_eq!(platform.calls().challenges.len(), 1);
        assert_eq!(flow.result_text(), AuthenticationResultText::NotAuthenticated);

        platform.complete_pending(&[PlatformEvent::Succeeded]);
        assert_eq!(flow.phase(), FlowPhase::Idle);
        assert_eq!(flow.trigger(), TriggerResult::ChallengeStarted { attempt: 2 });
    }

    #[test]
    fn outcome_after_drop_is_noop() {
        let platform = Arc::new(SimulatedPlatform::new().deferred());
        let flow = flow_for(&platform);
        flow.trigger();
        drop(flow);

        assert!(platform.complete_pending(&[PlatformEvent::Succeeded]));
    }

    #[test]
    fn abandoned_challenge_reads_as_failure() {
        let platform = Arc::new(SimulatedPlatform::new().deferred());
        let flow = flow_for(&platform);
        flow.trigger();

        assert_eq!(platform.abandon_pending(), 1);
        assert_eq!(flow.result_text(), AuthenticationResultText::Failed);
        assert_eq!(flow.last_outcome(), Some(ChallengeOutcome::Cancelled));
        assert_eq!(flow.phase(), FlowPhase::Idle);
    }

    #[test]
    fn redirect_returns_to_idle() {
        let platform = Arc::new(
            SimulatedPlatform::new()
                .with_capability(CapabilityStatus::NoHardware)
                .with_enrollment_screen(Err(LaunchError::NotFound)),
        );
        let flow = flow_for(&platform);

        assert_eq!(
            flow.trigger(),
            TriggerResult::Redirected {
                status: CapabilityStatus::NoHardware,
                redirect: RedirectOutcome::SecuritySettingsOpened,
            }
        );
        assert_eq!(flow.phase(), FlowPhase::Idle);
        assert_eq!(flow.last_outcome(), None);
    }

    #[tokio::test]
    async fn authenticate_waits_for_deferred_outcome() {
        let platform = Arc::new(SimulatedPlatform::new().deferred());
        let flow = Arc::new(flow_for(&platform));

        let task = tokio::spawn({
            let flow = flow.clone();
            async move { flow.authenticate().await }
        });

        while platform.pending_challenges() == 0 {
            tokio::task::yield_now().await;
        }
        platform.complete_pending(&[PlatformEvent::Error {
            code: error_codes::ERROR_USER_CANCELED,
            message: "User cancelled".to_string(),
        }]);

        assert_eq!(task.await.unwrap(), AuthenticationResultText::Failed);
    }
}
