// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OWNERSHIP QoS policy (DDS v1.4 Sec.2.2.3.11)
//!
//! Controls whether multiple DataWriters can update the same data instance.
//!
//! # QoS Compatibility (Request vs Offered)
//!
//! **Rule:** Writer kind must match Reader kind (exact match required)
//!
//! - Writer SHARED, Reader SHARED -> Compatible \[OK\]
//! - Writer EXCLUSIVE, Reader EXCLUSIVE -> Compatible \[OK\]
//! - Writer SHARED, Reader EXCLUSIVE -> Incompatible \[X\]
//!
//! # Arbitration
//!
//! Under EXCLUSIVE ownership each instance has at most one owner. A writer
//! takes over when it is stronger than the current owner; equal strengths
//! are broken by the lower writer id. An owner that unregisters or disposes
//! gives up ownership, and the next writer to publish claims it.
//!
//! ```
//! use hdds_dcps::qos::ownership::{OwnershipArbiter, OwnershipStrength};
//! use hdds_dcps::WriterId;
//!
//! let mut arbiter = OwnershipArbiter::new();
//! assert!(arbiter.admit(WriterId(1), OwnershipStrength::new(1)));
//! assert!(arbiter.admit(WriterId(2), OwnershipStrength::new(2)));
//! assert!(!arbiter.admit(WriterId(1), OwnershipStrength::new(1)));
//! arbiter.release(WriterId(2));
//! assert!(arbiter.admit(WriterId(1), OwnershipStrength::new(1)));
//! ```

use crate::core::types::WriterId;

/// OWNERSHIP QoS kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnershipKind {
    /// Multiple writers can update the same instance (default)
    ///
    /// All samples from all writers are delivered to readers.
    #[default]
    Shared,

    /// Only the owning writer's samples are delivered
    Exclusive,
}

/// OWNERSHIP QoS policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ownership {
    /// Ownership mode (SHARED or EXCLUSIVE)
    pub kind: OwnershipKind,
}

impl Ownership {
    pub fn new(kind: OwnershipKind) -> Self {
        Self { kind }
    }

    pub fn shared() -> Self {
        Self::new(OwnershipKind::Shared)
    }

    pub fn exclusive() -> Self {
        Self::new(OwnershipKind::Exclusive)
    }

    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.kind == OwnershipKind::Exclusive
    }

    /// Check if offered policy is compatible with requested policy
    pub fn is_compatible_with(&self, requested: &Ownership) -> bool {
        // Kinds must match exactly
        self.kind == requested.kind
    }
}

/// OWNERSHIP_STRENGTH QoS policy (DDS v1.4 Sec.2.2.3.18)
///
/// Higher strength wins. Default is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct OwnershipStrength {
    /// Priority value (higher wins in EXCLUSIVE mode)
    pub value: i32,
}

impl OwnershipStrength {
    pub fn new(value: i32) -> Self {
        Self { value }
    }
}

/// Per-instance ownership state for EXCLUSIVE mode.
///
/// Not synchronized on its own: it is embedded in an instance registry entry
/// and only touched under that entry's lock.
#[derive(Debug, Default, Clone)]
pub struct OwnershipArbiter {
    owner: Option<(WriterId, OwnershipStrength)>,
}

impl OwnershipArbiter {
    pub fn new() -> Self {
        Self { owner: None }
    }

    /// `true` if `(a_id, a)` takes precedence over `(b_id, b)`.
    fn outranks(a_id: WriterId, a: OwnershipStrength, b_id: WriterId, b: OwnershipStrength) -> bool {
        a > b || (a == b && a_id < b_id)
    }

    /// Decide whether a sample from `writer` is accepted, updating the owner.
    pub fn admit(&mut self, writer: WriterId, strength: OwnershipStrength) -> bool {
        match self.owner {
            None => {
                self.owner = Some((writer, strength));
                true
            }
            Some((owner, _)) if owner == writer => {
                // Strength may have changed since the writer took ownership.
                self.owner = Some((writer, strength));
                true
            }
            Some((owner, owner_strength)) => {
                if Self::outranks(writer, strength, owner, owner_strength) {
                    log::debug!(
                        "[ownership] {} (strength {}) takes over from {} (strength {})",
                        writer,
                        strength.value,
                        owner,
                        owner_strength.value
                    );
                    self.owner = Some((writer, strength));
                    true
                } else {
                    false
                }
            }
        }
    }

    /// A newly registered writer claims ownership if it outranks the owner.
    pub fn on_registered(&mut self, writer: WriterId, strength: OwnershipStrength) {
        let claims = match self.owner {
            None => true,
            Some((owner, owner_strength)) => {
                owner != writer && Self::outranks(writer, strength, owner, owner_strength)
            }
        };
        if claims {
            self.owner = Some((writer, strength));
        }
    }

    /// The writer unregistered or disposed; drop ownership if it held it.
    pub fn release(&mut self, writer: WriterId) {
        if matches!(self.owner, Some((owner, _)) if owner == writer) {
            self.owner = None;
        }
    }

    /// Current owner, if any.
    pub fn owner(&self) -> Option<WriterId> {
        self.owner.map(|(w, _)| w)
    }
}
