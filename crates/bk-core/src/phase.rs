// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fixed-order pipeline phases.

use serde::{Deserialize, Serialize};

/// One entry in the fixed-order pipeline.
///
/// Order here is the canonical order; [`crate::phase::PhaseKind::ALL`]
/// enumerates it once so the pipeline and its tests share one source of
/// truth instead of repeating the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseKind {
    Environment,
    PreCheckout,
    Checkout,
    PostCheckout,
    PreCommand,
    Command,
    PostCommand,
    PreArtifact,
    ArtifactUpload,
    PostArtifact,
    PreExit,
}

impl PhaseKind {
    /// The canonical pipeline order, table.
    pub const ALL: [PhaseKind; 11] = [
        PhaseKind::Environment,
        PhaseKind::PreCheckout,
        PhaseKind::Checkout,
        PhaseKind::PostCheckout,
        PhaseKind::PreCommand,
        PhaseKind::Command,
        PhaseKind::PostCommand,
        PhaseKind::PreArtifact,
        PhaseKind::ArtifactUpload,
        PhaseKind::PostArtifact,
        PhaseKind::PreExit,
    ];

    /// Hook/phase name as it appears in hook directories, e.g. `pre-command`.
    pub fn name(&self) -> &'static str {
        match self {
            PhaseKind::Environment => "environment",
            PhaseKind::PreCheckout => "pre-checkout",
            PhaseKind::Checkout => "checkout",
            PhaseKind::PostCheckout => "post-checkout",
            PhaseKind::PreCommand => "pre-command",
            PhaseKind::Command => "command",
            PhaseKind::PostCommand => "post-command",
            PhaseKind::PreArtifact => "pre-artifact",
            PhaseKind::ArtifactUpload => "artifact-upload",
            PhaseKind::PostArtifact => "post-artifact",
            PhaseKind::PreExit => "pre-exit",
        }
    }

    /// Whether a non-zero exit at this phase aborts subsequent `command`
    /// and `artifact` phases. `pre-exit` has no propagation semantics of
    /// its own since nothing follows it.
    pub fn failure_propagates(&self) -> bool {
        matches!(
            self,
            PhaseKind::Environment | PhaseKind::PreCheckout | PhaseKind::Checkout
        )
    }

    /// `checkout`, `command`, and `artifact-upload` have a built-in default
    /// action; all other phases are pure hook dispatch.
    pub fn has_builtin_default(&self) -> bool {
        matches!(self, PhaseKind::Checkout | PhaseKind::Command | PhaseKind::ArtifactUpload)
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
