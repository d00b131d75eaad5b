use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

use super::{error_codes, ChallengeOutcome, ChallengeRequest, LOG_TARGET};

type Continuation = Box<dyn FnOnce(ChallengeOutcome) + Send>;

/// The trusted platform authenticator that presents the challenge UI and performs matching.
pub trait Authenticator: Send + Sync {
    /// Present one challenge. The implementation reports back through `callback`,
    /// synchronously or later from any thread, and may drop it on teardown.
    fn authenticate(&self, request: &ChallengeRequest, callback: AuthenticationCallback);
}

struct CallbackState {
    request_id: Uuid,
    continuation: Option<Continuation>,
    resolved: bool,
    suppressed: u32,
}

impl Drop for CallbackState {
    fn drop(&mut self) {
        // Every handle is gone without a terminal event: the challenge was torn down.
        if let Some(continuation) = self.continuation.take() {
            debug!(
                target: LOG_TARGET,
                request_id = %self.request_id,
                "Challenge abandoned by the platform."
            );
            continuation(ChallengeOutcome::Cancelled);
        }
    }
}

/// Completion handle handed to the platform for one challenge.
///
/// The three entry points match the platform callback shape. Only the first call
/// resolves the challenge; later calls are counted and ignored. Clones share state.
#[derive(Clone)]
pub struct AuthenticationCallback {
    state: Arc<Mutex<CallbackState>>,
}

impl AuthenticationCallback {
    fn new(request_id: Uuid, continuation: Continuation) -> Self {
        Self {
            state: Arc::new(Mutex::new(CallbackState {
                request_id,
                continuation: Some(continuation),
                resolved: false,
                suppressed: 0,
            })),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.lock().request_id
    }

    pub fn is_resolved(&self) -> bool {
        self.lock().resolved
    }

    /// Terminal events ignored because the challenge had already resolved.
    pub fn suppressed_events(&self) -> u32 {
        self.lock().suppressed
    }

    /// Non-retryable termination. Returns whether this call resolved the challenge.
    pub fn on_authentication_error(&self, code: i32, message: impl Into<String>) -> bool {
        let message = message.into();
        self.resolve(ChallengeOutcome::from_platform_error(code, message.clone()), || {
            debug!(
                target: LOG_TARGET,
                code,
                kind = error_codes::describe(code),
                "Error: {}",
                message
            )
        })
    }

    pub fn on_authentication_succeeded(&self) -> bool {
        self.resolve(ChallengeOutcome::Succeeded, || {
            debug!(target: LOG_TARGET, "Authentication succeeded!")
        })
    }

    pub fn on_authentication_failed(&self) -> bool {
        self.resolve(ChallengeOutcome::Failed, || {
            debug!(target: LOG_TARGET, "Authentication failed.")
        })
    }

    fn resolve(&self, outcome: ChallengeOutcome, log_branch: impl FnOnce()) -> bool {
        let continuation = {
            let mut state = self.lock();
            if state.resolved {
                state.suppressed += 1;
                debug!(
                    target: LOG_TARGET,
                    request_id = %state.request_id,
                    suppressed = state.suppressed,
                    "Ignoring {} after the challenge already resolved.",
                    outcome
                );
                return false;
            }
            state.resolved = true;
            state.continuation.take()
        };

        log_branch();

        // The continuation runs without the lock held so it may re-enter the handle.
        match continuation {
            Some(continuation) => {
                continuation(outcome);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CallbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Issues challenges and guarantees at most one outcome per request.
#[derive(Clone)]
pub struct ChallengeOrchestrator {
    authenticator: Arc<dyn Authenticator>,
}

impl ChallengeOrchestrator {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }

    /// Issue one challenge and return immediately.
    ///
    /// `on_outcome` runs exactly once, unless the requester no longer cares and the
    /// platform never reports back at all. Callers must have seen a positive
    /// capability check for this attempt.
    pub fn start<F>(&self, request: ChallengeRequest, on_outcome: F)
    where
        F: FnOnce(ChallengeOutcome) + Send + 'static,
    {
        info!(
            target: LOG_TARGET,
            request_id = %request.id(),
            title = request.title(),
            "Starting biometric challenge"
        );

        let callback = AuthenticationCallback::new(request.id(), Box::new(on_outcome));
        self.authenticator.authenticate(&request, callback);
    }

    /// Issue one challenge and wait for its outcome on a single completion channel.
    ///
    /// A challenge the platform abandons resolves as `Cancelled`.
    pub async fn challenge(&self, request: ChallengeRequest) -> ChallengeOutcome {
        let (tx, rx) = oneshot::channel();
        self.start(request, move |outcome| {
            // Receiver gone means the caller stopped waiting.
            let _ = tx.send(outcome);
        });

        rx.await.unwrap_or(ChallengeOutcome::Cancelled)
    }
}
