// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Domain configuration and named QoS profiles.
//!
//! [`DomainConfig`] carries the defaults a domain applies when entities are
//! created; [`QosLibrary`] holds named profiles, loadable from YAML with the
//! `qos-loaders` feature:
//!
//! ```yaml
//! default_profile: sensor
//! profiles:
//!   sensor:
//!     reliability: RELIABLE
//!     history: { kind: KEEP_LAST, depth: 10 }
//!     ownership: EXCLUSIVE
//!     ownership_strength: 5
//!     time_based_filter: { minimum_separation_ms: 100 }
//!     partition: ["plant.*"]
//!     resource_limits: { max_samples: 1000, max_instances: -1, max_samples_per_instance: 100 }
//!     presentation: { access_scope: GROUP, coherent_access: true }
//! ```

#[cfg(feature = "qos-loaders")]
mod yaml;

#[cfg(feature = "qos-loaders")]
pub use yaml::{YamlLoader, YamlQosDocument, YamlQosProfile};

use crate::dds::{Error, Result};
use crate::qos::QoS;
use std::collections::HashMap;

/// Initial condition arena slots per reader.
pub const DEFAULT_CONDITION_CAPACITY: usize = 4;

/// Named QoS profiles with an optional default.
#[derive(Debug, Clone, Default)]
pub struct QosLibrary {
    profiles: HashMap<String, QoS>,
    default_profile: Option<String>,
}

impl QosLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile. Rejects inconsistent policies.
    pub fn insert(&mut self, name: impl Into<String>, qos: QoS) -> Result<()> {
        let name = name.into();
        qos.validate()
            .map_err(|e| Error::Config(format!("profile '{}': {}", name, e)))?;
        self.profiles.insert(name, qos);
        Ok(())
    }

    pub fn set_default_profile(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !self.profiles.contains_key(&name) {
            return Err(Error::Config(format!("profile '{}' not found", name)));
        }
        self.default_profile = Some(name);
        Ok(())
    }

    pub fn profile(&self, name: &str) -> Result<QoS> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Config(format!("profile '{}' not found", name)))
    }

    /// The default profile, or `QoS::default()` when none is named.
    #[must_use]
    pub fn default_qos(&self) -> QoS {
        self.default_profile
            .as_deref()
            .and_then(|name| self.profiles.get(name))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

/// Defaults a domain applies to the entities it creates.
#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub name: String,
    /// Returned by `Domain::default_writer_qos`.
    pub writer_qos: QoS,
    /// Returned by `Domain::default_reader_qos`.
    pub reader_qos: QoS,
    pub condition_capacity: usize,
    pub profiles: QosLibrary,
}

impl DomainConfig {
    /// Take endpoint defaults from the library's default profile.
    pub fn with_profiles(mut self, profiles: QosLibrary) -> Self {
        self.writer_qos = profiles.default_qos();
        self.reader_qos = profiles.default_qos();
        self.profiles = profiles;
        self
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            writer_qos: QoS::default(),
            reader_qos: QoS::default(),
            condition_capacity: DEFAULT_CONDITION_CAPACITY,
            profiles: QosLibrary::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_lookup() {
        let mut lib = QosLibrary::new();
        lib.insert("fast", QoS::best_effort().keep_last(1)).expect("insert");
        assert_eq!(lib.profile("fast").expect("profile"), QoS::best_effort().keep_last(1));
        assert!(matches!(lib.profile("slow"), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_profile() {
        let mut lib = QosLibrary::new();
        assert_eq!(lib.default_qos(), QoS::default());
        lib.insert("rel", QoS::reliable()).expect("insert");
        lib.set_default_profile("rel").expect("default");
        assert_eq!(lib.default_qos(), QoS::reliable());
        assert!(lib.set_default_profile("missing").is_err());
    }

    #[test]
    fn test_insert_rejects_inconsistent_qos() {
        let mut lib = QosLibrary::new();
        assert!(matches!(
            lib.insert("bad", QoS::default().keep_last(0)),
            Err(Error::Config(_))
        ));
        assert!(lib.is_empty());
    }

    #[test]
    fn test_config_takes_default_profile() {
        let mut lib = QosLibrary::new();
        lib.insert("rel", QoS::reliable().keep_last(3)).expect("insert");
        lib.set_default_profile("rel").expect("default");
        let config = DomainConfig::default().with_profiles(lib);
        assert_eq!(config.reader_qos, QoS::reliable().keep_last(3));
        assert_eq!(config.writer_qos, QoS::reliable().keep_last(3));
    }
}
