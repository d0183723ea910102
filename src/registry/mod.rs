//! Registry - the process-wide set of profiles, owned by whoever drives the
//! process lifecycle.
//!
//! `load` builds profiles from configuration, `shutdown` stops and joins
//! every worker, `reload` is a full shutdown followed by a full load.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::broker::Broker;
use crate::config::{BridgeConfig, ConfigError, ProfileSettings};
use crate::filter::{AnyEvent, EventCatalog};
use crate::profile::{Profile, ProfileError};
use crate::publisher::WorkerStats;
use crate::source::EventSource;

/// A profile that could not be brought up.
#[derive(Debug)]
pub struct SkippedProfile {
    /// `None` when the profile had no name
    pub name: Option<String>,
    pub error: ProfileError,
}

/// Result of a load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub started: Vec<String>,
    pub skipped: Vec<SkippedProfile>,
}

/// Named profiles sharing one broker client and one event source.
pub struct Registry<B: Broker + Clone> {
    broker: B,
    source: Option<Arc<dyn EventSource>>,
    catalog: Arc<dyn EventCatalog>,
    profiles: BTreeMap<String, Profile>,
}

impl<B: Broker + Clone> Registry<B> {
    pub fn new(broker: B) -> Self {
        Self {
            broker,
            source: None,
            catalog: Arc::new(AnyEvent),
            profiles: BTreeMap::new(),
        }
    }

    /// Subscribe profiles to `source` according to their event filters.
    pub fn with_source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Validate event filter names against `catalog`.
    pub fn with_catalog(mut self, catalog: Arc<dyn EventCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Start every profile in `config`. Invalid profiles are logged and skipped.
    pub fn load(&mut self, config: &BridgeConfig) -> LoadReport {
        let mut report = LoadReport::default();

        for entry in &config.publishers {
            let name = entry.name().map(String::from);
            let result = entry
                .resolve()
                .map_err(ProfileError::from)
                .and_then(|settings| self.create(settings).map(|p| p.name().to_string()));

            match result {
                Ok(name) => report.started.push(name),
                Err(err) => {
                    error!(
                        profile = name.as_deref().unwrap_or("<unnamed>"),
                        error = %err,
                        "failed to load profile, check configs"
                    );
                    report.skipped.push(SkippedProfile { name, error: err });
                }
            }
        }

        info!(
            started = report.started.len(),
            skipped = report.skipped.len(),
            "profiles loaded"
        );
        report
    }

    /// Read a JSON configuration file and load it.
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<LoadReport, ConfigError> {
        let config = BridgeConfig::from_path(path)?;
        Ok(self.load(&config))
    }

    /// Tear everything down, then load `config` from scratch.
    pub fn reload(&mut self, config: &BridgeConfig) -> LoadReport {
        info!("reloading profiles");
        self.shutdown();
        self.load(config)
    }

    /// Reload from a file. The running profiles are kept if it cannot be read.
    pub fn reload_path(&mut self, path: impl AsRef<Path>) -> Result<LoadReport, ConfigError> {
        let config = BridgeConfig::from_path(path)?;
        Ok(self.reload(&config))
    }

    /// Start a single profile.
    pub fn create(&mut self, settings: ProfileSettings) -> Result<&Profile, ProfileError> {
        if self.profiles.contains_key(&settings.name) {
            return Err(ProfileError::Duplicate {
                profile: settings.name,
            });
        }

        let profile = Profile::start(
            &settings,
            self.broker.clone(),
            self.source.clone(),
            self.catalog.as_ref(),
        )?;
        Ok(self.profiles.entry(settings.name).or_insert(profile))
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Stop and remove one profile.
    pub fn destroy(&mut self, name: &str) -> Option<WorkerStats> {
        self.profiles.remove(name).map(Profile::stop)
    }

    /// Stop every profile, joining each worker. Returns per-profile stats.
    pub fn shutdown(&mut self) -> BTreeMap<String, WorkerStats> {
        let profiles = std::mem::take(&mut self.profiles);
        if !profiles.is_empty() {
            info!(profiles = profiles.len(), "shutting down profiles");
        }
        profiles
            .into_iter()
            .map(|(name, profile)| (name, profile.stop()))
            .collect()
    }
}

impl<B: Broker + Clone> Drop for Registry<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
