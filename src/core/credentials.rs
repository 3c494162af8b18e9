//! Resolving per-backend endpoints, models and API keys.
//!
//! Keys are looked up in order: config file, system keyring, environment.
//! Endpoints come from the config file, then the backend's URL environment
//! variable, then the built-in default.

use tracing::{debug, warn};

use crate::core::backends::{BackendSettings, BackendSpec, BUILTIN_BACKENDS};
use crate::core::config::Config;
use crate::core::keyring::{self, KeyringAccessError};
use crate::utils::url::normalize_base_url;

pub trait CredentialSource {
    fn name(&self) -> &'static str;

    /// Whether this source should be asked about `spec` at all.
    fn applies_to(&self, _spec: &BackendSpec) -> bool {
        true
    }

    fn api_key(&self, spec: &BackendSpec) -> Result<Option<String>, KeyringAccessError>;
}

pub struct ConfigCredentials<'a>(pub &'a Config);

impl CredentialSource for ConfigCredentials<'_> {
    fn name(&self) -> &'static str {
        "config"
    }

    fn api_key(&self, spec: &BackendSpec) -> Result<Option<String>, KeyringAccessError> {
        Ok(self.0.backend(spec.id).and_then(|b| b.api_key.clone()))
    }
}

pub struct KeyringCredentials;

impl CredentialSource for KeyringCredentials {
    fn name(&self) -> &'static str {
        "keyring"
    }

    /// Keyless local servers never touch the keyring, so a locked keychain
    /// does not prompt for them.
    fn applies_to(&self, spec: &BackendSpec) -> bool {
        spec.requires_api_key()
    }

    fn api_key(&self, spec: &BackendSpec) -> Result<Option<String>, KeyringAccessError> {
        keyring::get_api_key(spec.id)
    }
}

pub struct EnvCredentials<F>(pub F);

impl<F> CredentialSource for EnvCredentials<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn name(&self) -> &'static str {
        "environment"
    }

    fn api_key(&self, spec: &BackendSpec) -> Result<Option<String>, KeyringAccessError> {
        Ok(spec.api_key_env.and_then(|var| (self.0)(var)))
    }
}

pub fn process_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// The default source chain for `config`.
pub fn default_sources(config: &Config) -> Vec<Box<dyn CredentialSource + '_>> {
    vec![
        Box::new(ConfigCredentials(config)),
        Box::new(KeyringCredentials),
        Box::new(EnvCredentials(process_env)),
    ]
}

fn first_api_key(sources: &[Box<dyn CredentialSource + '_>], spec: &BackendSpec) -> Option<String> {
    for source in sources.iter().filter(|source| source.applies_to(spec)) {
        match source.api_key(spec) {
            Ok(Some(key)) if !key.trim().is_empty() => {
                debug!(backend = spec.id, source = source.name(), "using API key");
                return Some(key.trim().to_string());
            }
            Ok(_) => {}
            Err(err) => warn!(
                backend = spec.id,
                source = source.name(),
                recoverable = err.is_recoverable(),
                error = %err,
                "credential lookup failed"
            ),
        }
    }
    None
}

/// Settings for every built-in backend. Backends whose required key is
/// missing are still returned; the key error surfaces when they are used.
pub fn resolve_backend_settings(
    config: &Config,
    sources: &[Box<dyn CredentialSource + '_>],
    env: impl Fn(&str) -> Option<String>,
) -> Vec<BackendSettings> {
    BUILTIN_BACKENDS
        .iter()
        .map(|spec| {
            let overrides = config.backend(spec.id);
            let base_url = overrides
                .and_then(|b| b.base_url.clone())
                .or_else(|| spec.base_url_env.and_then(&env))
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| spec.base_url.to_string());

            let mut settings =
                BackendSettings::new(spec).with_base_url(normalize_base_url(base_url.trim()));
            if let Some(model) = overrides.and_then(|b| b.model.clone()) {
                settings = settings.with_model(model);
            }
            if let Some(key) = first_api_key(sources, spec) {
                settings = settings.with_api_key(key);
            }
            settings
        })
        .collect()
}
