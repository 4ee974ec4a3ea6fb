// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! rackd: a control plane for carving a bare-metal datacenter into
//! isolated, project-owned slices
//!
//! The resource graph and its invariants live in `rackd-db`; this crate
//! adds configuration, the driver layer that touches hardware, the
//! background reconciler that converges switch state to the recorded
//! desired state, and the [`app::Controller`] that ties them together.

pub mod app;
pub mod background;
pub mod config;
pub mod drivers;
