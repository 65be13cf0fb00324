use crate::error::{ManagementError, ManagementResult};
use secrecy::{ExposeSecret, SecretString};

/// Service principal credentials scoped to one subscription and resource group.
///
/// The application secret is held in a [`SecretString`] so it never shows up
/// in `Debug` output or logs.
#[derive(Clone)]
pub struct Credentials {
    subscription_id: String,
    application_id: String,
    application_secret: SecretString,
    resource_group: String,
}

impl Credentials {
    /// Validate and assemble a credential set.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::Configuration`] when `subscription_id` or
    /// `application_secret` is empty. The subscription is checked first.
    pub fn new(
        subscription_id: impl Into<String>,
        application_id: impl Into<String>,
        application_secret: impl Into<String>,
        resource_group: impl Into<String>,
    ) -> ManagementResult<Self> {
        Self::from_secret(
            subscription_id,
            application_id,
            SecretString::from(application_secret.into()),
            resource_group,
        )
    }

    /// Like [`Credentials::new`], for a secret that is already wrapped.
    ///
    /// # Errors
    ///
    /// Same as [`Credentials::new`].
    pub fn from_secret(
        subscription_id: impl Into<String>,
        application_id: impl Into<String>,
        application_secret: SecretString,
        resource_group: impl Into<String>,
    ) -> ManagementResult<Self> {
        let subscription_id = subscription_id.into();
        if subscription_id.is_empty() {
            return Err(ManagementError::Configuration(
                "subscription ID required".into(),
            ));
        }

        if application_secret.expose_secret().is_empty() {
            return Err(ManagementError::Configuration(
                "application secret required".into(),
            ));
        }

        Ok(Self {
            subscription_id,
            application_id: application_id.into(),
            application_secret,
            resource_group: resource_group.into(),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn application_secret(&self) -> &SecretString {
        &self.application_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("subscription_id", &self.subscription_id)
            .field("application_id", &self.application_id)
            .field("application_secret", &"****")
            .field("resource_group", &self.resource_group)
            .finish()
    }
}
