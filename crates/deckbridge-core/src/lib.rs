//! Core types and shared utilities for the deckbridge relay.
//!
//! This crate provides:
//! - Post and lane identifiers with chronological ordering ([`PostId`], [`LaneKey`])
//! - The destination-ready message model ([`Message`], [`Facet`], [`ContentType`])
//! - Prometheus metrics helpers
//! - Shared error types

mod error;
mod ids;
mod message;
pub mod metrics;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Default cap on the number of processed posts remembered across all lanes.
pub const DEFAULT_MAX_PROCESSED: usize = 500;

/// Size request appended to every normalized image URL.
pub const LARGE_IMAGE_QUERY: &str = "?format=jpg&name=large";

pub use error::{Error, Result};
pub use ids::{LaneKey, PostId};
pub use message::{
    Author, ByteSlice, ContentType, Facet, FacetFeature, FacetKind, LINK_FEATURE_TYPE, Message,
    TAG_FEATURE_TYPE,
};
