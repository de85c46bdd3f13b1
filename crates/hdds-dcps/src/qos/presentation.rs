// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PRESENTATION QoS policy (DDS v1.4 Sec.2.2.3.12).
//!
//! Set on publishers (offered) and subscribers (requested).
//!
//! | Scope | Ordering guarantee | Coherent sets span |
//! |-------|--------------------|--------------------|
//! | `Instance` | per-instance FIFO | one instance |
//! | `Topic` | per reader, by write order | one reader |
//! | `Group` | across the subscriber's readers | all readers of the subscriber |

/// PRESENTATION access scope, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PresentationAccessScope {
    #[default]
    Instance = 0,
    Topic = 1,
    Group = 2,
}

/// PRESENTATION QoS policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Presentation {
    pub access_scope: PresentationAccessScope,
    /// Changes made between begin/end coherent markers become visible together.
    pub coherent_access: bool,
    /// Samples are presented in write order within the access scope.
    pub ordered_access: bool,
}

impl Presentation {
    #[must_use]
    pub fn new(
        access_scope: PresentationAccessScope,
        coherent_access: bool,
        ordered_access: bool,
    ) -> Self {
        Self {
            access_scope,
            coherent_access,
            ordered_access,
        }
    }

    #[must_use]
    pub fn instance() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn topic_coherent() -> Self {
        Self::new(PresentationAccessScope::Topic, true, false)
    }

    #[must_use]
    pub fn topic_ordered() -> Self {
        Self::new(PresentationAccessScope::Topic, false, true)
    }

    #[must_use]
    pub fn group_coherent() -> Self {
        Self::new(PresentationAccessScope::Group, true, false)
    }

    #[must_use]
    pub fn group_ordered() -> Self {
        Self::new(PresentationAccessScope::Group, false, true)
    }

    #[must_use]
    pub fn group_coherent_ordered() -> Self {
        Self::new(PresentationAccessScope::Group, true, true)
    }

    /// Offered (publisher) vs requested (subscriber) compatibility.
    #[must_use]
    pub fn is_compatible_with(&self, requested: &Presentation) -> bool {
        self.access_scope >= requested.access_scope
            && (self.coherent_access || !requested.coherent_access)
            && (self.ordered_access || !requested.ordered_access)
    }
}
