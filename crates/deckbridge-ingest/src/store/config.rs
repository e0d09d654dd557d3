//! Lane bindings: which lanes are relayed, and where to.

use std::sync::Arc;

use deckbridge_core::LaneKey;

use super::cache::DocumentCache;
use super::document::{Credentials, LaneBinding};
use crate::Result;

/// Result of [`ConfigStore::add_binding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddBindingOutcome {
    Added,
    AlreadyExists,
}

/// Read access for the pipeline, write access for the admin surface.
#[derive(Clone)]
pub struct ConfigStore {
    cache: Arc<DocumentCache>,
}

impl ConfigStore {
    pub fn new(cache: Arc<DocumentCache>) -> Self {
        Self { cache }
    }

    /// Binding for a lane, enabled or not.
    pub fn binding(&self, lane: &LaneKey) -> Option<LaneBinding> {
        let found = self.cache.get().binding(lane).cloned();
        if let Some(binding) = &found {
            tracing::debug!(lane = %lane, handle = %binding.bluesky.handle, "Lane binding found");
        }
        found
    }

    /// Binding for a lane, only if it is enabled.
    pub fn enabled_binding(&self, lane: &LaneKey) -> Option<LaneBinding> {
        self.binding(lane).filter(LaneBinding::is_enabled)
    }

    pub fn bindings(&self) -> Vec<LaneBinding> {
        self.cache.force_refresh().columns.clone()
    }

    /// Replace all bindings, keeping ledger state.
    pub fn replace_bindings(&self, bindings: Vec<LaneBinding>) -> Result<()> {
        self.cache.update(move |doc| {
            doc.columns = bindings;
            Some(())
        })?;
        Ok(())
    }

    /// Register a new lane binding.
    pub fn add_binding(
        &self,
        heading: &str,
        attribution: &str,
        credentials: Credentials,
    ) -> Result<AddBindingOutcome> {
        let binding = LaneBinding::new(heading, attribution, credentials);
        let added = self.cache.update(move |doc| {
            if doc.binding(&binding.column_key).is_some() {
                return None;
            }
            doc.columns.push(binding);
            Some(())
        })?;

        Ok(match added {
            Some(()) => AddBindingOutcome::Added,
            None => AddBindingOutcome::AlreadyExists,
        })
    }

    /// Toggle a lane. Returns `false` if no such binding exists.
    pub fn set_enabled(&self, lane: &LaneKey, enabled: bool) -> Result<bool> {
        let changed = self.cache.update(|doc| {
            let binding = doc.columns.iter_mut().find(|c| &c.column_key == lane)?;
            binding.enabled = Some(enabled);
            Some(())
        })?;
        Ok(changed.is_some())
    }

    /// Remove all configuration and ledger state.
    pub fn reset(&self) -> Result<()> {
        self.cache.clear()?;
        tracing::info!("Configuration reset");
        Ok(())
    }
}
