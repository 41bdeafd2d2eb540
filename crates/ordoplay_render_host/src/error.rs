// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host errors.

use ordoplay_render_graph::{RenderGraphError, RenderGraphRunnerError, SettingsError};

/// Error that stops the host
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Settings file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Settings written by a newer host
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this host reads
        supported: u32,
    },

    /// Bad log filter directive
    #[error("Invalid log directive: {0}")]
    LogDirective(#[from] tracing_subscriber::filter::ParseError),

    /// The frame graph is malformed
    #[error("Frame graph is invalid: {0}")]
    Graph(#[from] RenderGraphError),

    /// A frame failed to run
    #[error(transparent)]
    Runner(#[from] RenderGraphRunnerError),
}
