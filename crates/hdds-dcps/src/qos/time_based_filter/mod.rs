// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TIME_BASED_FILTER QoS policy (DDS v1.4 Sec.2.2.3.14).
//!
//! Controls the minimum separation between samples of one instance delivered
//! to a `DataReader`. Separation is measured on source timestamps; samples
//! arriving inside the window are discarded, not queued.

mod checker;
mod policy;

pub use checker::TimeBasedFilterChecker;
pub use policy::TimeBasedFilter;
