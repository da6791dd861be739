// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use derive_more::Display;
use serde::Serialize;

use crate::graph::NodeId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize)]
pub enum Severity {
    #[display(fmt = "info")]
    Info,
    #[display(fmt = "warning")]
    Warning,
    #[display(fmt = "error")]
    Error,
}

/// The category of a problem found while compiling. None of them abort the
/// compilation: the affected branch is dropped from the IR instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, Serialize)]
pub enum DiagnosticKind {
    /// Malformed or incomplete graph
    #[display(fmt = "structural error")]
    Structural,
    /// A pin was reached again while it was being generated
    #[display(fmt = "cycle")]
    Cycle,
    /// An identifier collision was resolved automatically
    #[display(fmt = "collision notice")]
    CollisionNotice,
    #[display(fmt = "unsupported node kind")]
    UnsupportedNodeKind,
    /// A component declaration could not be registered
    #[display(fmt = "fatal component error")]
    FatalComponent,
}

#[derive(Clone, Debug, Display, Serialize)]
#[display(fmt = "{severity} ({kind}): {message}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    /// The node the problem originates from, if any
    pub node: Option<NodeId>,
}

/// Collects the diagnostics of a compilation. Every pushed diagnostic is also
/// mirrored to the log.
#[derive(Default, Debug)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        severity: Severity,
        message: impl Into<String>,
        node: Option<NodeId>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            severity,
            message: message.into(),
            node,
        };
        match severity {
            Severity::Info => log::info!("{diagnostic}"),
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Error => log::error!("{diagnostic}"),
        }
        self.entries.push(diagnostic);
    }

    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, node: NodeId) {
        self.push(kind, Severity::Error, message, Some(node))
    }

    pub fn warning(&mut self, kind: DiagnosticKind, message: impl Into<String>, node: NodeId) {
        self.push(kind, Severity::Warning, message, Some(node))
    }

    pub fn info(&mut self, kind: DiagnosticKind, message: impl Into<String>, node: Option<NodeId>) {
        self.push(kind, Severity::Info, message, node)
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn for_node(&self, node: NodeId) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.node == Some(node))
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
