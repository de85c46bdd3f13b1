// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime data model: identifiers, timestamps, keys and dynamic payloads.
//!
//! Payloads are field maps described by a [`TypeDescriptor`]. The instance key
//! of a sample is the ordered tuple of its key-field values.

use crate::dds::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source timestamp in nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Timestamp(ms.saturating_mul(1_000_000))
    }

    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000_000))
    }

    /// Wall-clock time (falls back to zero if the clock is before the epoch).
    #[must_use]
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos().min(u128::from(u64::MAX)) as u64)
            .unwrap_or(0);
        Timestamp(nanos)
    }

    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, or `None` if `earlier` is later than `self`.
    #[must_use]
    pub fn duration_since(&self, earlier: Timestamp) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration::from_nanos)
    }
}

/// Identifier of a local or remote DataWriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WriterId(pub u64);

/// Identifier of a local DataReader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReaderId(pub u64);

impl fmt::Display for WriterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Opaque handle to an instance in a topic's registry.
///
/// Handles are allocated in increasing order, so iterating instances by
/// handle is deterministic. [`InstanceHandle::NIL`] never names an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct InstanceHandle(u64);

impl InstanceHandle {
    pub const NIL: InstanceHandle = InstanceHandle(0);

    pub(crate) const fn from_raw(raw: u64) -> Self {
        InstanceHandle(raw)
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_nil(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// Runtime field value, used both in payloads and in filter evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Signed integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Unsigned integer (for sensor_id, etc.)
    Unsigned(u64),
}

impl FieldValue {
    pub fn from_i32(v: i32) -> Self {
        FieldValue::Integer(i64::from(v))
    }

    pub fn from_u32(v: u32) -> Self {
        FieldValue::Unsigned(u64::from(v))
    }

    pub fn from_f64(v: f64) -> Self {
        FieldValue::Float(v)
    }

    pub fn from_string(v: impl Into<String>) -> Self {
        FieldValue::String(v.into())
    }

    /// Kind this value satisfies in a [`TypeDescriptor`].
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Integer(_) => FieldKind::Int,
            FieldValue::Unsigned(_) => FieldKind::UInt,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::String(_) => FieldKind::Str,
            FieldValue::Boolean(_) => FieldKind::Bool,
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::from_i32(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::from_u32(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Unsigned(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(f64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

/// Field type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    UInt,
    Float,
    Str,
    Bool,
}

/// Name and kind of one payload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

/// Type descriptor: field layout of a topic's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub type_name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field (builder style).
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check a payload against this layout.
    ///
    /// Every payload field must be declared with a matching kind. Absent
    /// fields are allowed (key fields are checked separately).
    pub fn validate(&self, data: &Data) -> Result<()> {
        for (name, value) in data.iter() {
            let Some(desc) = self.get(name) else {
                return Err(Error::BadParameter(format!(
                    "field '{}' is not part of type '{}'",
                    name, self.type_name
                )));
            };
            if desc.kind != value.kind() {
                return Err(Error::BadParameter(format!(
                    "field '{}' expects {:?}, got {:?}",
                    name,
                    desc.kind,
                    value.kind()
                )));
            }
        }
        Ok(())
    }
}

/// Dynamic sample payload: named field values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data {
    fields: BTreeMap<String, FieldValue>,
}

impl Data {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field (builder style).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One component of an instance key. Floats cannot be key members.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Int(i64),
    UInt(u64),
    Str(String),
    Bool(bool),
}

impl TryFrom<&FieldValue> for KeyValue {
    type Error = Error;

    fn try_from(value: &FieldValue) -> Result<Self> {
        match value {
            FieldValue::Integer(v) => Ok(KeyValue::Int(*v)),
            FieldValue::Unsigned(v) => Ok(KeyValue::UInt(*v)),
            FieldValue::String(v) => Ok(KeyValue::Str(v.clone())),
            FieldValue::Boolean(v) => Ok(KeyValue::Bool(*v)),
            FieldValue::Float(_) => Err(Error::BadParameter(
                "floating point fields cannot be part of a key".to_string(),
            )),
        }
    }
}

impl From<&KeyValue> for FieldValue {
    fn from(value: &KeyValue) -> Self {
        match value {
            KeyValue::Int(v) => FieldValue::Integer(*v),
            KeyValue::UInt(v) => FieldValue::Unsigned(*v),
            KeyValue::Str(v) => FieldValue::String(v.clone()),
            KeyValue::Bool(v) => FieldValue::Boolean(*v),
        }
    }
}

/// Ordered key-field values identifying an instance within a topic.
///
/// Keyless topics use the empty key, which names their single instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct InstanceKey(Vec<KeyValue>);

impl InstanceKey {
    #[must_use]
    pub fn new(values: Vec<KeyValue>) -> Self {
        InstanceKey(values)
    }

    #[must_use]
    pub fn values(&self) -> &[KeyValue] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<i64> for InstanceKey {
    fn from(v: i64) -> Self {
        InstanceKey(vec![KeyValue::Int(v)])
    }
}

impl From<&str> for InstanceKey {
    fn from(v: &str) -> Self {
        InstanceKey(vec![KeyValue::Str(v.to_string())])
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match v {
                KeyValue::Int(x) => write!(f, "{}", x)?,
                KeyValue::UInt(x) => write!(f, "{}", x)?,
                KeyValue::Str(x) => write!(f, "{:?}", x)?,
                KeyValue::Bool(x) => write!(f, "{}", x)?,
            }
        }
        write!(f, ")")
    }
}
