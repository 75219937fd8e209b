//! Core type definitions for WebPeel
//!
//! This crate contains the primary data structures shared across the
//! WebPeel workspace: request options, fetch and peel results, page
//! metadata, change summaries and the service error type.

pub mod error;
pub mod options;
pub mod result;

pub use error::{validate_url, PeelError};
pub use options::{BrowserAction, ExtractSpec, Location, OutputFormat, PeelOptions};
pub use result::{
    ChangeStatus, ChangeSummary, ContentDiff, DiffKind, DiffLine, FetchMethod, FetchResult,
    ImageInfo, PageMetadata, PeelResult,
};

/// Convenience alias used throughout the workspace.
pub type Result<T, E = PeelError> = std::result::Result<T, E>;
