use bioauth_core::{CapabilityStatus, LaunchError, PlatformEvent, SimulatedPlatform};
use clap::{Args, ValueEnum};

/// How a simulated settings screen behaves when launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScreenBehavior {
    Present,
    Missing,
    Broken,
}

impl ScreenBehavior {
    fn launch_result(self) -> Result<(), LaunchError> {
        match self {
            ScreenBehavior::Present => Ok(()),
            ScreenBehavior::Missing => Err(LaunchError::NotFound),
            ScreenBehavior::Broken => Err(LaunchError::Failed("activity crashed".to_string())),
        }
    }
}

/// Description of the simulated device.
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Capability the device reports (available, no-hardware, hardware-unavailable, not-enrolled, unknown)
    #[arg(long, default_value = "available")]
    pub capability: CapabilityStatus,

    /// Raw availability code, overriding --capability
    #[arg(long, allow_hyphen_values = true)]
    pub availability_code: Option<i32>,

    /// Platform events for the challenge, in order (succeeded, failed, error:<code>:<message>)
    #[arg(long = "event", default_value = "succeeded")]
    pub events: Vec<PlatformEvent>,

    /// Behavior of the biometric enrollment screen
    #[arg(long, value_enum, default_value_t = ScreenBehavior::Present)]
    pub enrollment_screen: ScreenBehavior,

    /// Behavior of the general security settings screen
    #[arg(long, value_enum, default_value_t = ScreenBehavior::Present)]
    pub security_settings: ScreenBehavior,
}

impl DeviceArgs {
    pub fn build(&self) -> SimulatedPlatform {
        let platform = SimulatedPlatform::new()
            .with_capability(self.capability)
            .with_events(self.events.clone())
            .with_enrollment_screen(self.enrollment_screen.launch_result())
            .with_security_settings(self.security_settings.launch_result());

        match self.availability_code {
            Some(code) => platform.with_availability_code(code),
            None => platform,
        }
    }
}
