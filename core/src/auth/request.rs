use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthenticatorStrength;
use crate::{BioAuthError, BioAuthResult};

pub const DEFAULT_TITLE: &str = "Biometric Authentication";
pub const DEFAULT_SUBTITLE: &str = "Log in using your biometric credentials";
pub const DEFAULT_NEGATIVE_BUTTON: &str = "Cancel";

/// One authentication attempt as presented by the platform authenticator.
///
/// Requests are immutable once built. The allowed authenticators are always the
/// strong biometric class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRequest {
    id: Uuid,
    title: String,
    subtitle: Option<String>,
    negative_button_text: String,
    allowed_authenticators: AuthenticatorStrength,
}

impl ChallengeRequest {
    pub fn builder() -> ChallengeRequestBuilder {
        ChallengeRequestBuilder::default()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn negative_button_text(&self) -> &str {
        &self.negative_button_text
    }

    pub fn allowed_authenticators(&self) -> AuthenticatorStrength {
        self.allowed_authenticators
    }

    /// Same prompt texts under a fresh request id, for the next attempt.
    pub fn reissue(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }
}

impl Default for ChallengeRequest {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: DEFAULT_TITLE.to_string(),
            subtitle: Some(DEFAULT_SUBTITLE.to_string()),
            negative_button_text: DEFAULT_NEGATIVE_BUTTON.to_string(),
            allowed_authenticators: AuthenticatorStrength::Strong,
        }
    }
}

/// Builder mirroring the platform prompt-info builder.
#[derive(Debug, Clone, Default)]
pub struct ChallengeRequestBuilder {
    title: Option<String>,
    subtitle: Option<String>,
    negative_button_text: Option<String>,
}

impl ChallengeRequestBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn negative_button_text(mut self, text: impl Into<String>) -> Self {
        self.negative_button_text = Some(text.into());
        self
    }

    /// Validate and produce the request. Title and cancel label must be non-blank;
    /// a blank subtitle is dropped.
    pub fn build(self) -> BioAuthResult<ChallengeRequest> {
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BioAuthError::InvalidInput("title must not be empty".to_string()))?;

        let negative_button_text = self
            .negative_button_text
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                BioAuthError::InvalidInput("negative button text must not be empty".to_string())
            })?;

        Ok(ChallengeRequest {
            id: Uuid::new_v4(),
            title,
            subtitle: self.subtitle.filter(|s| !s.trim().is_empty()),
            negative_button_text,
            allowed_authenticators: AuthenticatorStrength::Strong,
        })
    }
}
