// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topics and content-filtered topics.

use super::filter::ContentFilter;
use super::{Error, Result};
use crate::core::instance::InstanceRegistry;
use crate::core::types::{Data, FieldKind, FieldValue, InstanceKey, KeyValue, TypeDescriptor};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct TopicInner {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub key_fields: Vec<String>,
    pub registry: Arc<InstanceRegistry>,
}

impl TopicInner {
    pub fn new(name: &str, descriptor: TypeDescriptor, key_fields: &[&str]) -> Result<Self> {
        for field in key_fields {
            let desc = descriptor.get(field).ok_or_else(|| {
                Error::BadParameter(format!(
                    "key field '{}' is not part of type '{}'",
                    field, descriptor.type_name
                ))
            })?;
            if desc.kind == FieldKind::Float {
                return Err(Error::BadParameter(format!(
                    "key field '{}' is floating point",
                    field
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            descriptor,
            key_fields: key_fields.iter().map(|f| (*f).to_string()).collect(),
            registry: Arc::new(InstanceRegistry::new(name)),
        })
    }

    /// Validate `data` and extract its instance key.
    pub fn key_of(&self, data: &Data) -> Result<InstanceKey> {
        self.descriptor.validate(data)?;
        let values = self
            .key_fields
            .iter()
            .map(|field| {
                let value = data.get(field).ok_or_else(|| {
                    Error::BadParameter(format!("key field '{}' missing from sample", field))
                })?;
                KeyValue::try_from(value)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(InstanceKey::new(values))
    }

    /// A payload holding only the key fields of `key`.
    pub fn key_data(&self, key: &InstanceKey) -> Data {
        let mut data = Data::new();
        for (field, value) in self.key_fields.iter().zip(key.values()) {
            data.set(field.clone(), FieldValue::from(value));
        }
        data
    }
}

/// A named, keyed data channel.
///
/// Cheap to clone; every clone names the same topic and instance registry.
#[derive(Debug, Clone)]
pub struct Topic {
    pub(crate) inner: Arc<TopicInner>,
}

impl Topic {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn type_descriptor(&self) -> &TypeDescriptor {
        &self.inner.descriptor
    }

    #[must_use]
    pub fn key_fields(&self) -> &[String] {
        &self.inner.key_fields
    }

    /// Instances currently tracked by the topic's registry.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.inner.registry.len()
    }
}

/// A topic narrowed by a filter expression, evaluated as samples arrive.
///
/// Readers created on it share the filter's parameter set:
/// [`ContentFilteredTopic::set_expression_parameters`] affects them all.
#[derive(Debug, Clone)]
pub struct ContentFilteredTopic {
    name: String,
    related: Topic,
    filter: ContentFilter,
}

impl ContentFilteredTopic {
    pub(crate) fn new(name: &str, related: &Topic, filter: ContentFilter) -> Self {
        Self {
            name: name.to_string(),
            related: related.clone(),
            filter,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn related_topic(&self) -> &Topic {
        &self.related
    }

    #[must_use]
    pub fn filter_expression(&self) -> &str {
        self.filter.expression()
    }

    #[must_use]
    pub fn expression_parameters(&self) -> Vec<String> {
        self.filter.parameters()
    }

    /// Swap the parameter set atomically. The count must not change.
    pub fn set_expression_parameters(&self, parameters: Vec<String>) -> Result<()> {
        self.filter.set_parameters(parameters)?;
        log::debug!(
            "[domain] {}: filter parameters now {:?}",
            self.name,
            self.filter.parameters()
        );
        Ok(())
    }

    pub(crate) fn filter(&self) -> &ContentFilter {
        &self.filter
    }
}

/// What a reader subscribes to.
#[derive(Debug, Clone)]
pub enum TopicDescription {
    Topic(Topic),
    ContentFiltered(ContentFilteredTopic),
}

impl TopicDescription {
    /// The underlying topic.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        match self {
            TopicDescription::Topic(t) => t,
            TopicDescription::ContentFiltered(cft) => cft.related_topic(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TopicDescription::Topic(t) => t.name(),
            TopicDescription::ContentFiltered(cft) => cft.name(),
        }
    }

    pub(crate) fn content_filter(&self) -> Option<&ContentFilter> {
        match self {
            TopicDescription::Topic(_) => None,
            TopicDescription::ContentFiltered(cft) => Some(cft.filter()),
        }
    }
}

impl From<Topic> for TopicDescription {
    fn from(t: Topic) -> Self {
        TopicDescription::Topic(t)
    }
}

impl From<&Topic> for TopicDescription {
    fn from(t: &Topic) -> Self {
        TopicDescription::Topic(t.clone())
    }
}

impl From<ContentFilteredTopic> for TopicDescription {
    fn from(t: ContentFilteredTopic) -> Self {
        TopicDescription::ContentFiltered(t)
    }
}

impl From<&ContentFilteredTopic> for TopicDescription {
    fn from(t: &ContentFilteredTopic) -> Self {
        TopicDescription::ContentFiltered(t.clone())
    }
}
