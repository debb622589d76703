//! Bounded token history fed to the backend.

use crate::{Position, TokenId};

/// Ordered prompt + generated tokens, bounded by `max_context` at the first
/// decode.
///
/// Truncation happens once, in [`ContextWindow::from_prompt`]: the oldest
/// prompt tokens are dropped and the survivors are renumbered from position
/// `0`. Generated tokens are appended without re-truncating; callers stop
/// when [`exceeds_limit`](Self::exceeds_limit) turns true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    tokens: Vec<TokenId>,
    max_context: usize,
}

impl ContextWindow {
    /// Build a window from a tokenized prompt, keeping the most recent
    /// `max_context` tokens. Returns the window and how many tokens were dropped.
    pub fn from_prompt(mut tokens: Vec<TokenId>, max_context: usize) -> (Self, usize) {
        let dropped = tokens.len().saturating_sub(max_context);
        tokens.drain(..dropped);
        (
            Self {
                tokens,
                max_context,
            },
            dropped,
        )
    }

    /// Append a generated token.
    pub fn append(&mut self, token: TokenId) {
        self.tokens.push(token);
    }

    pub fn as_slice(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn max_context(&self) -> usize {
        self.max_context
    }

    /// Whether the window holds more tokens than the backend context can.
    pub fn exceeds_limit(&self) -> bool {
        self.tokens.len() > self.max_context
    }

    /// Position of the newest token, `None` for an empty window.
    pub fn last_position(&self) -> Option<Position> {
        self.tokens.len().checked_sub(1).map(|p| p as Position)
    }
}
