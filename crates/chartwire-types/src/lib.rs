//! # chartwire-types
//!
//! Core type definitions for the chartwire chart-artifact pipeline.
//!
//! Every other chartwire crate depends on this one. It contains:
//!
//! - **[`error`]** -- per-artifact and request-level error taxonomy
//! - **[`config`]** -- configuration schema with defaults and validation
//! - **[`chart`]** -- chart references and the placeholder token
//! - **[`locator`]** -- parsed object-storage locators
//! - **[`media`]** -- image media-type sniffing
//! - **[`wire`]** -- the JSON contract between producer and consumer

pub mod chart;
pub mod config;
pub mod error;
pub mod locator;
pub mod media;
pub mod wire;

pub use chart::{ChartReference, Placeholder};
pub use error::{ArtifactError, ChartwireError, DecodeError, FetchError, PipelineError, Result};
pub use locator::Locator;
pub use media::ImageKind;
pub use wire::{
    ChartRequest, ExportBundle, ExportEntry, FailedChart, RequestState, Summary, WireResponse,
};
