//! Id-keyed registry shared by sources and metadata providers.

use std::sync::Arc;

use thiserror::Error;

/// Errors from registering or selecting clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate id: {0}")]
    Duplicate(String),

    #[error("Unknown id: {0}")]
    Unknown(String),
}

/// Clients keyed by id, kept in registration order.
pub struct Registry<C: ?Sized> {
    entries: Vec<(String, Arc<C>)>,
}

impl<C: ?Sized> Default for Registry<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<C: ?Sized> Clone for Registry<C> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<C: ?Sized> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under `id`. Ids must be unique.
    pub fn insert(&mut self, id: impl Into<String>, client: Arc<C>) -> Result<(), RegistryError> {
        let id = id.into();
        if self.contains(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        self.entries.push((id, client));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<C>> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, client)| client.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|(entry_id, _)| entry_id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn all(&self) -> Vec<Arc<C>> {
        self.entries.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a caller's selection.
    ///
    /// `None` selects everything. An explicit list must only name registered
    /// ids; the result keeps registration order and ignores repeats.
    pub fn select(&self, requested: Option<&[String]>) -> Result<Vec<Arc<C>>, RegistryError> {
        let Some(requested) = requested else {
            return Ok(self.all());
        };

        if let Some(unknown) = requested.iter().find(|id| !self.contains(id)) {
            return Err(RegistryError::Unknown(unknown.clone()));
        }

        Ok(self
            .entries
            .iter()
            .filter(|(id, _)| requested.contains(id))
            .map(|(_, c)| c.clone())
            .collect())
    }
}
