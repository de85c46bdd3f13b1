// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML QoS profile loader.

use super::QosLibrary;
use crate::dds::{Error, Result};
use crate::qos::{
    History, Ownership, OwnershipStrength, Partition, Presentation, PresentationAccessScope, QoS,
    Reliability, ResourceLimits, TimeBasedFilter,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// YAML QoS profile loader.
pub struct YamlLoader;

/// Root YAML document structure.
#[derive(Debug, Deserialize)]
pub struct YamlQosDocument {
    #[serde(default)]
    pub profiles: HashMap<String, YamlQosProfile>,
    #[serde(default)]
    pub default_profile: Option<String>,
}

/// A single QoS profile in YAML format.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct YamlQosProfile {
    /// RELIABLE or BEST_EFFORT
    pub reliability: Option<String>,
    pub history: Option<YamlHistory>,
    /// SHARED or EXCLUSIVE
    pub ownership: Option<String>,
    pub ownership_strength: Option<i32>,
    pub presentation: Option<YamlPresentation>,
    pub time_based_filter: Option<YamlTimeBasedFilter>,
    pub partition: Option<Vec<String>>,
    pub resource_limits: Option<YamlResourceLimits>,
}

#[derive(Debug, Deserialize)]
pub struct YamlHistory {
    /// KEEP_LAST or KEEP_ALL
    pub kind: String,
    #[serde(default = "default_history_depth")]
    pub depth: u32,
}

fn default_history_depth() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct YamlPresentation {
    /// INSTANCE, TOPIC, or GROUP
    pub access_scope: String,
    pub coherent_access: bool,
    pub ordered_access: bool,
}

impl Default for YamlPresentation {
    fn default() -> Self {
        Self {
            access_scope: "INSTANCE".to_string(),
            coherent_access: false,
            ordered_access: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct YamlTimeBasedFilter {
    #[serde(default)]
    pub minimum_separation_ms: Option<u64>,
}

/// `-1` means unlimited.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct YamlResourceLimits {
    pub max_samples: i64,
    pub max_instances: i64,
    pub max_samples_per_instance: i64,
}

impl Default for YamlResourceLimits {
    fn default() -> Self {
        Self {
            max_samples: -1,
            max_instances: -1,
            max_samples_per_instance: -1,
        }
    }
}

fn limit(value: i64) -> usize {
    if value < 0 {
        ResourceLimits::UNLIMITED
    } else {
        value as usize
    }
}

impl YamlLoader {
    /// Load a profile library from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<QosLibrary> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        log::debug!("[config] loading QoS profiles from {}", path.display());
        Self::load_from_str(&content)
    }

    /// Parse a profile library from YAML text.
    pub fn load_from_str(content: &str) -> Result<QosLibrary> {
        let doc = Self::parse_yaml(content)?;
        Self::to_library(&doc)
    }

    pub fn parse_yaml(content: &str) -> Result<YamlQosDocument> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse YAML: {}", e)))
    }

    pub fn to_library(doc: &YamlQosDocument) -> Result<QosLibrary> {
        let mut library = QosLibrary::new();
        for (name, profile) in &doc.profiles {
            let qos = Self::profile_to_qos(profile)
                .map_err(|e| Error::Config(format!("profile '{}': {}", name, e)))?;
            library.insert(name.clone(), qos)?;
        }
        if let Some(name) = &doc.default_profile {
            library.set_default_profile(name.clone())?;
        }
        log::debug!("[config] loaded {} QoS profile(s)", library.len());
        Ok(library)
    }

    /// Convert one YAML profile to QoS.
    pub fn profile_to_qos(profile: &YamlQosProfile) -> std::result::Result<QoS, String> {
        let mut qos = QoS::default();

        if let Some(ref rel) = profile.reliability {
            qos.reliability = match rel.to_uppercase().as_str() {
                "RELIABLE" => Reliability::Reliable,
                "BEST_EFFORT" => Reliability::BestEffort,
                other => return Err(format!("invalid reliability: {}", other)),
            };
        }

        if let Some(ref hist) = profile.history {
            qos.history = match hist.kind.to_uppercase().as_str() {
                "KEEP_LAST" => History::KeepLast(hist.depth),
                "KEEP_ALL" => History::KeepAll,
                other => return Err(format!("invalid history kind: {}", other)),
            };
        }

        if let Some(ref own) = profile.ownership {
            qos.ownership = match own.to_uppercase().as_str() {
                "SHARED" => Ownership::shared(),
                "EXCLUSIVE" => Ownership::exclusive(),
                other => return Err(format!("invalid ownership: {}", other)),
            };
        }

        if let Some(strength) = profile.ownership_strength {
            qos.ownership_strength = OwnershipStrength::new(strength);
        }

        if let Some(ref pres) = profile.presentation {
            let access_scope = match pres.access_scope.to_uppercase().as_str() {
                "INSTANCE" => PresentationAccessScope::Instance,
                "TOPIC" => PresentationAccessScope::Topic,
                "GROUP" => PresentationAccessScope::Group,
                other => return Err(format!("invalid presentation access scope: {}", other)),
            };
            qos.presentation =
                Presentation::new(access_scope, pres.coherent_access, pres.ordered_access);
        }

        if let Some(ref tbf) = profile.time_based_filter {
            let min_sep = tbf
                .minimum_separation_ms
                .map(Duration::from_millis)
                .unwrap_or(Duration::ZERO);
            qos.time_based_filter = TimeBasedFilter::new(min_sep);
        }

        if let Some(ref names) = profile.partition {
            if !names.is_empty() {
                qos.partition = Partition::new(names.clone());
            }
        }

        if let Some(ref limits) = profile.resource_limits {
            qos.resource_limits = ResourceLimits {
                max_samples: limit(limits.max_samples),
                max_instances: limit(limits.max_instances),
                max_samples_per_instance: limit(limits.max_samples_per_instance),
            };
        }

        Ok(qos)
    }
}
