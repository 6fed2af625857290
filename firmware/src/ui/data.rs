use alloc::string::String;

use shared::tokens::{TokenId, TokenStore, TotpConfig};

/// Ordered token list the render engine reads from.
pub trait TokenSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn token(&self, index: usize) -> Option<&TotpConfig>;

    /// Identity used to detect that a slot now shows a different token.
    fn token_id(&self, index: usize) -> Option<TokenId>;

    fn display_name(&self, index: usize) -> Option<String>;
}

impl TokenSource for TokenStore {
    fn len(&self) -> usize {
        TokenStore::len(self)
    }

    fn token(&self, index: usize) -> Option<&TotpConfig> {
        self.get(index)
    }

    fn token_id(&self, index: usize) -> Option<TokenId> {
        self.id_at(index).cloned()
    }

    fn display_name(&self, index: usize) -> Option<String> {
        self.display_name_at(index)
    }
}
