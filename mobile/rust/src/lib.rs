//! C ABI for host apps.
//!
//! The host registers its biometric manager, prompt and settings launchers as function
//! pointers, creates a flow, and calls `bioauth_flow_trigger` when the user presses the
//! authenticate control. Platform callback events are forwarded back with the challenge
//! token the host received in its `authenticate` function.

use anyhow::{anyhow, Result};
use bioauth_core::{
    AuthenticationCallback, AuthenticationFlow, Authenticator, AuthenticatorStrength,
    BiometricManager, ChallengeRequest, LaunchError, LoggerBuilder, SettingsLauncher,
    TriggerResult,
};
use libc::{c_char, c_void};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Settings launch succeeded.
pub const BIOAUTH_LAUNCH_OK: i32 = 0;
/// Requested settings screen does not exist on this platform.
pub const BIOAUTH_LAUNCH_NOT_FOUND: i32 = 1;

pub const BIOAUTH_TRIGGER_REDIRECTED: i32 = 0;
pub const BIOAUTH_TRIGGER_CHALLENGE_STARTED: i32 = 1;
pub const BIOAUTH_TRIGGER_BUSY: i32 = 2;
pub const BIOAUTH_INVALID_HANDLE: i32 = -1;

/// Host-side platform hooks. `context` is passed back verbatim to every hook.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BioAuthPlatform {
    pub context: *mut c_void,
    pub can_authenticate: extern "C" fn(context: *mut c_void, authenticators: i32) -> i32,
    /// Present a prompt. Strings are only valid for the duration of the call.
    pub authenticate: extern "C" fn(
        context: *mut c_void,
        token: u64,
        title: *const c_char,
        subtitle: *const c_char,
        negative_button_text: *const c_char,
        authenticators: i32,
    ),
    pub open_biometric_enrollment: extern "C" fn(context: *mut c_void, authenticators: i32) -> i32,
    pub open_security_settings: extern "C" fn(context: *mut c_void) -> i32,
}

struct HostPlatform {
    hooks: BioAuthPlatform,
    next_token: AtomicU64,
    pending: Mutex<HashMap<u64, AuthenticationCallback>>,
}

// SAFETY: the host guarantees its hooks and `context` may be used from any thread.
unsafe impl Send for HostPlatform {}
unsafe impl Sync for HostPlatform {}

impl HostPlatform {
    fn new(hooks: BioAuthPlatform) -> Self {
        Self {
            hooks,
            next_token: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, AuthenticationCallback>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Callback for `token`, or `None` when the token is unknown or already finished.
    fn callback(&self, token: u64) -> Option<AuthenticationCallback> {
        self.pending().get(&token).cloned()
    }

    fn finish(&self, token: u64) {
        // Dropped outside the map lock; an unresolved handle reports cancellation.
        let removed = self.pending().remove(&token);
        drop(removed);
    }
}

fn launch_result(code: i32) -> std::result::Result<(), LaunchError> {
    match code {
        BIOAUTH_LAUNCH_OK => Ok(()),
        BIOAUTH_LAUNCH_NOT_FOUND => Err(LaunchError::NotFound),
        other => Err(LaunchError::Failed(format!("host returned {}", other))),
    }
}

impl BiometricManager for HostPlatform {
    fn can_authenticate(&self, strength: AuthenticatorStrength) -> i32 {
        (self.hooks.can_authenticate)(self.hooks.context, strength.platform_flag())
    }
}

impl Authenticator for HostPlatform {
    fn authenticate(&self, request: &ChallengeRequest, callback: AuthenticationCallback) {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let strings = (
            to_c_string(request.title()),
            request.subtitle().map(to_c_string),
            to_c_string(request.negative_button_text()),
        );
        let (title, subtitle, negative) = match strings {
            (Ok(title), Some(Err(err)), Ok(negative)) => {
                warn!(error = %err, "Dropping subtitle that cannot cross the C boundary");
                (title, None, negative)
            }
            (Ok(title), subtitle, Ok(negative)) => (title, subtitle.and_then(|s| s.ok()), negative),
            _ => {
                warn!("Prompt text cannot cross the C boundary; cancelling challenge");
                drop(callback);
                return;
            }
        };

        self.pending().insert(token, callback);
        debug!(token, request_id = %request.id(), "Handing challenge to host");

        (self.hooks.authenticate)(
            self.hooks.context,
            token,
            title.as_ptr(),
            subtitle.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            negative.as_ptr(),
            request.allowed_authenticators().platform_flag(),
        );
    }
}

impl SettingsLauncher for HostPlatform {
    fn open_biometric_enrollment(
        &self,
        strength: AuthenticatorStrength,
    ) -> std::result::Result<(), LaunchError> {
        launch_result((self.hooks.open_biometric_enrollment)(
            self.hooks.context,
            strength.platform_flag(),
        ))
    }

    fn open_security_settings(&self) -> std::result::Result<(), LaunchError> {
        launch_result((self.hooks.open_security_settings)(self.hooks.context))
    }
}

/// Opaque flow handle owned by the host.
pub struct BioAuthFlow {
    flow: AuthenticationFlow,
    platform: Arc<HostPlatform>,
}

fn to_c_string(value: &str) -> Result<CString> {
    CString::new(value).map_err(|e| anyhow!("interior NUL in '{}': {}", value, e))
}

/// # Safety
/// `ptr` must be null or a valid NUL-terminated string.
unsafe fn read_optional(ptr: *const c_char) -> Result<Option<String>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let value = CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| anyhow!("invalid UTF-8"))?;
    Ok(Some(value.to_string()))
}

/// # Safety
/// Each pointer must be null or a valid NUL-terminated string.
unsafe fn build_request(
    title: *const c_char,
    subtitle: *const c_char,
    negative_button_text: *const c_char,
) -> Result<ChallengeRequest> {
    let defaults = ChallengeRequest::default();
    let mut builder = ChallengeRequest::builder()
        .title(read_optional(title)?.unwrap_or_else(|| defaults.title().to_string()))
        .negative_button_text(
            read_optional(negative_button_text)?
                .unwrap_or_else(|| defaults.negative_button_text().to_string()),
        );
    match read_optional(subtitle)? {
        Some(subtitle) => builder = builder.subtitle(subtitle),
        None => {
            if let Some(default) = defaults.subtitle() {
                builder = builder.subtitle(default)
            }
        }
    }
    Ok(builder.build()?)
}

/// Initialize logging. Returns 0 on success, 1 if a subscriber was already installed.
#[no_mangle]
pub extern "C" fn bioauth_init(verbose: bool) -> i32 {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    match LoggerBuilder::new(level).include_timestamp(false).init() {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Get version string
#[no_mangle]
pub extern "C" fn bioauth_version() -> *mut c_char {
    let version = env!("CARGO_PKG_VERSION");
    match CString::new(version) {
        Ok(c_string) => c_string.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a string allocated by this library
#[no_mangle]
pub extern "C" fn bioauth_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(s);
    }
}

/// Create a flow. Null prompt strings fall back to the default texts.
/// Returns null when a string is not valid UTF-8 or a required text is blank.
///
/// # Safety
/// String arguments must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn bioauth_flow_new(
    platform: BioAuthPlatform,
    title: *const c_char,
    subtitle: *const c_char,
    negative_button_text: *const c_char,
) -> *mut BioAuthFlow {
    let request = match build_request(title, subtitle, negative_button_text) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "Rejecting flow creation");
            return std::ptr::null_mut();
        }
    };

    let host = Arc::new(HostPlatform::new(platform));
    let flow = AuthenticationFlow::from_platform(host.clone(), request);
    Box::into_raw(Box::new(BioAuthFlow {
        flow,
        platform: host,
    }))
}

/// # Safety
/// `flow` must be null or a pointer returned by `bioauth_flow_new` not yet freed.
#[no_mangle]
pub unsafe extern "C" fn bioauth_flow_free(flow: *mut BioAuthFlow) {
    if flow.is_null() {
        return;
    }
    drop(Box::from_raw(flow));
}

/// Handle one press of the authenticate control.
///
/// # Safety
/// `flow` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bioauth_flow_trigger(flow: *const BioAuthFlow) -> i32 {
    let Some(handle) = flow.as_ref() else {
        return BIOAUTH_INVALID_HANDLE;
    };
    match handle.flow.trigger() {
        TriggerResult::Redirected { .. } => BIOAUTH_TRIGGER_REDIRECTED,
        TriggerResult::ChallengeStarted { .. } => BIOAUTH_TRIGGER_CHALLENGE_STARTED,
        TriggerResult::Busy => BIOAUTH_TRIGGER_BUSY,
    }
}

/// Current result text as an owned string; free it with `bioauth_free_string`.
///
/// # Safety
/// `flow` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bioauth_flow_result_text(flow: *const BioAuthFlow) -> *mut c_char {
    let Some(handle) = flow.as_ref() else {
        return std::ptr::null_mut();
    };
    match CString::new(handle.flow.result_text().as_str()) {
        Ok(c_string) => c_string.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Forward the platform's authentication-error callback. Returns true if it resolved
/// the challenge. An error always ends the challenge.
///
/// # Safety
/// `flow` must be null or a live handle; `message` null or a valid string.
#[no_mangle]
pub unsafe extern "C" fn bioauth_on_authentication_error(
    flow: *const BioAuthFlow,
    token: u64,
    code: i32,
    message: *const c_char,
) -> bool {
    let Some(handle) = flow.as_ref() else {
        return false;
    };
    let message = read_optional(message).ok().flatten().unwrap_or_default();
    let resolved = handle
        .platform
        .callback(token)
        .map_or(false, |callback| callback.on_authentication_error(code, message));
    handle.platform.finish(token);
    resolved
}

/// # Safety
/// `flow` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bioauth_on_authentication_succeeded(
    flow: *const BioAuthFlow,
    token: u64,
) -> bool {
    let Some(handle) = flow.as_ref() else {
        return false;
    };
    let resolved = handle
        .platform
        .callback(token)
        .map_or(false, |callback| callback.on_authentication_succeeded());
    handle.platform.finish(token);
    resolved
}

/// A non-matching sample. The prompt may stay open, so the token remains usable
/// until an error, a success, or `bioauth_challenge_dismissed`.
///
/// # Safety
/// `flow` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bioauth_on_authentication_failed(
    flow: *const BioAuthFlow,
    token: u64,
) -> bool {
    let Some(handle) = flow.as_ref() else {
        return false;
    };
    handle
        .platform
        .callback(token)
        .map_or(false, |callback| callback.on_authentication_failed())
}

/// The host tore the prompt down without a terminal event.
///
/// # Safety
/// `flow` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bioauth_challenge_dismissed(flow: *const BioAuthFlow, token: u64) {
    if let Some(handle) = flow.as_ref() {
        handle.platform.finish(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    struct HostState {
        availability: AtomicI32,
        enrollment: AtomicI32,
        security: AtomicI32,
        last_token: AtomicU64,
        last_flags: AtomicI32,
        enrollment_calls: AtomicI32,
        security_calls: AtomicI32,
    }

    impl HostState {
        fn new(availability: i32) -> Box<Self> {
            Box::new(Self {
                availability: AtomicI32::new(availability),
                enrollment: AtomicI32::new(BIOAUTH_LAUNCH_OK),
                security: AtomicI32::new(BIOAUTH_LAUNCH_OK),
                last_token: AtomicU64::new(0),
                last_flags: AtomicI32::new(0),
                enrollment_calls: AtomicI32::new(0),
                security_calls: AtomicI32::new(0),
            })
        }
    }

    fn state<'a>(context: *mut c_void) -> &'a HostState {
        unsafe { &*(context as *const HostState) }
    }

    extern "C" fn can_authenticate(context: *mut c_void, _authenticators: i32) -> i32 {
        state(context).availability.load(Ordering::SeqCst)
    }

    extern "C" fn authenticate(
        context: *mut c_void,
        token: u64,
        title: *const c_char,
        _subtitle: *const c_char,
        _negative_button_text: *const c_char,
        authenticators: i32,
    ) {
        let title = unsafe { CStr::from_ptr(title) };
        assert!(!title.to_bytes().is_empty());
        let host = state(context);
        host.last_token.store(token, Ordering::SeqCst);
        host.last_flags.store(authenticators, Ordering::SeqCst);
    }

    extern "C" fn open_biometric_enrollment(context: *mut c_void, _authenticators: i32) -> i32 {
        let host = state(context);
        host.enrollment_calls.fetch_add(1, Ordering::SeqCst);
        host.enrollment.load(Ordering::SeqCst)
    }

    extern "C" fn open_security_settings(context: *mut c_void) -> i32 {
        let host = state(context);
        host.security_calls.fetch_add(1, Ordering::SeqCst);
        host.security.load(Ordering::SeqCst)
    }

    fn hooks(host: &HostState) -> BioAuthPlatform {
        BioAuthPlatform {
            context: host as *const HostState as *mut c_void,
            can_authenticate,
            authenticate,
            open_biometric_enrollment,
            open_security_settings,
        }
    }

    fn result_text(flow: *const BioAuthFlow) -> String {
        unsafe {
            let raw = bioauth_flow_result_text(flow);
            let text = CStr::from_ptr(raw).to_str().unwrap().to_string();
            bioauth_free_string(raw);
            text
        }
    }

    #[test]
    fn success_through_host_callbacks() {
        let host = HostState::new(0);
        unsafe {
            let flow = bioauth_flow_new(
                hooks(&host),
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null(),
            );
            assert!(!flow.is_null());
            assert_eq!(result_text(flow), "Not Authenticated");

            assert_eq!(bioauth_flow_trigger(flow), BIOAUTH_TRIGGER_CHALLENGE_STARTED);
            assert_eq!(bioauth_flow_trigger(flow), BIOAUTH_TRIGGER_BUSY);
            assert_eq!(
                host.last_flags.load(Ordering::SeqCst),
                AuthenticatorStrength::Strong.platform_flag()
            );

            let token = host.last_token.load(Ordering::SeqCst);
            assert!(bioauth_on_authentication_succeeded(flow, token));
            assert!(!bioauth_on_authentication_succeeded(flow, token));
            assert_eq!(result_text(flow), "Authentication Succeeded!");

            bioauth_flow_free(flow);
        }
    }

    #[test]
    fn failed_sample_then_error_reports_once() {
        let host = HostState::new(0);
        unsafe {
            let flow = bioauth_flow_new(
                hooks(&host),
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null(),
            );
            bioauth_flow_trigger(flow);
            let token = host.last_token.load(Ordering::SeqCst);

            assert!(bioauth_on_authentication_failed(flow, token));
            let message = CString::new("User cancelled").unwrap();
            assert!(!bioauth_on_authentication_error(flow, token, 10, message.as_ptr()));
            assert_eq!(result_text(flow), "Authentication Failed!");

            bioauth_flow_free(flow);
        }
    }

    #[test]
    fn dismissed_prompt_reads_as_failure() {
        let host = HostState::new(0);
        unsafe {
            let flow = bioauth_flow_new(
                hooks(&host),
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null(),
            );
            bioauth_flow_trigger(flow);
            bioauth_challenge_dismissed(flow, host.last_token.load(Ordering::SeqCst));
            assert_eq!(result_text(flow), "Authentication Failed!");
            assert_eq!(bioauth_flow_trigger(flow), BIOAUTH_TRIGGER_CHALLENGE_STARTED);
            bioauth_flow_free(flow);
        }
    }

    #[test]
    fn not_enrolled_falls_back_to_security_settings() {
        let host = HostState::new(11);
        host.enrollment.store(BIOAUTH_LAUNCH_NOT_FOUND, Ordering::SeqCst);
        unsafe {
            let flow = bioauth_flow_new(
                hooks(&host),
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null(),
            );
            assert_eq!(bioauth_flow_trigger(flow), BIOAUTH_TRIGGER_REDIRECTED);
            assert_eq!(host.enrollment_calls.load(Ordering::SeqCst), 1);
            assert_eq!(host.security_calls.load(Ordering::SeqCst), 1);
            assert_eq!(
                result_text(flow),
                "Biometric not available or not configured."
            );
            bioauth_flow_free(flow);
        }
    }

    #[test]
    fn blank_title_is_rejected() {
        let host = HostState::new(0);
        let blank = CString::new("  ").unwrap();
        unsafe {
            let flow = bioauth_flow_new(
                hooks(&host),
                blank.as_ptr(),
                std::ptr::null(),
                std::ptr::null(),
            );
            assert!(flow.is_null());
        }
    }

    #[test]
    fn null_handles_are_tolerated() {
        unsafe {
            assert_eq!(bioauth_flow_trigger(std::ptr::null()), BIOAUTH_INVALID_HANDLE);
            assert!(bioauth_flow_result_text(std::ptr::null()).is_null());
            assert!(!bioauth_on_authentication_succeeded(std::ptr::null(), 1));
            bioauth_challenge_dismissed(std::ptr::null(), 1);
            bioauth_flow_free(std::ptr::null_mut());
        }
    }
}
