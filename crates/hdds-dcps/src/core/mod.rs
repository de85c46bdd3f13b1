// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Core Runtime Components
//!
//! Entity-independent building blocks shared by the DCPS layer.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `instance` | Per-topic instance registry: lifecycle, registrations, ownership |
//! | `types` | Identifiers, timestamps, keys and dynamic payloads |
//!
//! ```text
//! +-----------------------------------------------------+
//! |                    DCPS Layer                       |
//! |   (Domain, DataWriter, DataReader, WaitSet, ...)    |
//! +-----------------------------------------------------+
//! |                    Core Layer                       |
//! |  +--------------------------+  +-----------------+  |
//! |  | InstanceRegistry         |  | types           |  |
//! |  | DashMap<Handle, Entry>   |  | Data, Key, Ids  |  |
//! |  +--------------------------+  +-----------------+  |
//! +-----------------------------------------------------+
//! ```

/// Per-topic instance registry (lifecycle state machine + arbitration state).
pub mod instance;
pub mod types;
