use alloc::{collections::BTreeMap, string::String, vec::Vec};

use super::errors::TokenError;
use super::model::{TokenId, TokenSnapshot, TotpConfig};

/// Ordered token collection plus the display-name override map.
///
/// Order is insertion order unless [`TokenStore::reorder`] moves an entry. Every mutation is
/// visible to the next [`TokenStore::list`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStore {
    tokens: Vec<TotpConfig>,
    ids: Vec<TokenId>,
    display_names: BTreeMap<TokenId, String>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a persisted snapshot.
    ///
    /// Duplicate identities keep their first occurrence and overrides for unknown tokens are
    /// discarded.
    pub fn from_snapshot(snapshot: TokenSnapshot) -> Self {
        let mut store = Self::new();
        for token in snapshot.tokens {
            let id = token.id();
            if store.position(&id).is_some() {
                log::warn!("dropping duplicate token {id} from snapshot");
                continue;
            }
            store.ids.push(id);
            store.tokens.push(token);
        }
        for (id, name) in snapshot.display_names {
            if store.position(&id).is_some() {
                store.display_names.insert(id, name);
            }
        }
        store
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        TokenSnapshot {
            tokens: self.tokens.clone(),
            display_names: self.display_names.clone(),
        }
    }

    pub fn list(&self) -> &[TotpConfig] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TotpConfig> {
        self.tokens.get(index)
    }

    /// Identity of the token stored at `index`.
    pub fn id_at(&self, index: usize) -> Option<&TokenId> {
        self.ids.get(index)
    }

    pub fn contains(&self, id: &TokenId) -> bool {
        self.position(id).is_some()
    }

    /// Validate and append a token.
    pub fn add(&mut self, config: TotpConfig) -> Result<TokenId, TokenError> {
        config.validate()?;
        let id = config.id();
        if self.contains(&id) {
            return Err(TokenError::Duplicate);
        }

        self.ids.push(id.clone());
        self.tokens.push(config);
        Ok(id)
    }

    /// Remove a token together with its display-name override.
    pub fn remove(&mut self, id: &TokenId) -> Result<TotpConfig, TokenError> {
        let index = self.position(id).ok_or(TokenError::NotFound)?;
        self.ids.remove(index);
        self.display_names.remove(id);
        Ok(self.tokens.remove(index))
    }

    /// Move the token at `from` so that it ends up at `to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), TokenError> {
        if from >= self.tokens.len() || to >= self.tokens.len() {
            return Err(TokenError::NotFound);
        }
        let token = self.tokens.remove(from);
        let id = self.ids.remove(from);
        self.tokens.insert(to, token);
        self.ids.insert(to, id);
        Ok(())
    }

    pub fn set_display_name(
        &mut self,
        id: &TokenId,
        name: impl Into<String>,
    ) -> Result<(), TokenError> {
        if !self.contains(id) {
            return Err(TokenError::NotFound);
        }
        self.display_names.insert(id.clone(), name.into());
        Ok(())
    }

    /// Drop an override; returns whether one was present.
    pub fn clear_display_name(&mut self, id: &TokenId) -> bool {
        self.display_names.remove(id).is_some()
    }

    /// Override if set and non-blank, otherwise the token's default name.
    pub fn display_name(&self, config: &TotpConfig) -> String {
        self.display_names
            .get(&config.id())
            .filter(|name| !name.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| config.default_display_name())
    }

    /// Same as [`TokenStore::display_name`] for the token at `index`.
    pub fn display_name_at(&self, index: usize) -> Option<String> {
        let token = self.tokens.get(index)?;
        let id = self.ids.get(index)?;
        Some(
            self.display_names
                .get(id)
                .filter(|name| !name.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| token.default_display_name()),
        )
    }

    fn position(&self, id: &TokenId) -> Option<usize> {
        self.ids.iter().position(|existing| existing == id)
    }
}
