//! String interning: every name the decoder compares (request names,
//! parameter names, declaration tables) is turned into a [`TokenId`] once.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::error::RibError;

/// Stable identity of an interned string. Id 0 is always the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TokenId(u32);

impl TokenId {
    pub const EMPTY: TokenId = TokenId(0);

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interner owned by one rendering context.
///
/// Tokens are never removed; ids stay valid for the map's lifetime.
#[derive(Debug, Clone)]
pub struct TokenMap {
    names: Vec<Rc<str>>,
    ids: HashMap<Rc<str>, TokenId>,
    limit: u32,
}

impl Default for TokenMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenMap {
    pub fn new() -> Self {
        Self::with_limit(u32::MAX)
    }

    /// Interner refusing to hand out more than `limit` ids (the empty token
    /// included). Exhaustion surfaces as a resource error.
    pub fn with_limit(limit: u32) -> Self {
        let empty: Rc<str> = Rc::from("");
        let mut ids = HashMap::new();
        ids.insert(Rc::clone(&empty), TokenId::EMPTY);
        TokenMap {
            names: vec![empty],
            ids,
            limit: limit.max(1),
        }
    }

    pub fn find_or_create(&mut self, name: &str) -> Result<TokenId, RibError> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        let next = u32::try_from(self.names.len())
            .ok()
            .filter(|n| *n < self.limit)
            .ok_or_else(|| {
                RibError::Resource(format!("token table full while interning '{}'", name))
            })?;
        let id = TokenId(next);
        let name: Rc<str> = Rc::from(name);
        self.names.push(Rc::clone(&name));
        self.ids.insert(name, id);
        Ok(id)
    }

    pub fn find(&self, name: &str) -> Option<TokenId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: TokenId) -> Option<&str> {
        self.names.get(id.0 as usize).map(|n| &**n)
    }

    /// Name of a token known to come from this map; unknown ids render empty.
    pub fn name_or_empty(&self, id: TokenId) -> &str {
        self.name(id).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        // the empty token is always present
        false
    }
}
