//! Number- and name-keyed handle tables of one parse.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::types::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    Object,
    Light,
    Archive,
}

/// How a stream refers to a handle: `ObjectBegin 3` or `ObjectBegin "tree"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum HandleKey {
    Number(i32),
    Name(String),
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKey::Number(n) => write!(f, "{}", n),
            HandleKey::Name(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HandleTables {
    numbers: HashMap<(HandleKind, i32), Handle>,
    names: HashMap<(HandleKind, String), Handle>,
}

impl HandleTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key`; an existing binding is overwritten.
    pub fn bind(&mut self, kind: HandleKind, key: HandleKey, handle: Handle) {
        match key {
            HandleKey::Number(n) => {
                self.numbers.insert((kind, n), handle);
            }
            HandleKey::Name(s) => {
                self.names.insert((kind, s), handle);
            }
        }
    }

    pub fn resolve(&self, kind: HandleKind, key: &HandleKey) -> Option<Handle> {
        match key {
            HandleKey::Number(n) => self.numbers.get(&(kind, *n)).copied(),
            HandleKey::Name(s) => self.names.get(&(kind, s.clone())).copied(),
        }
    }

    pub fn len(&self) -> usize {
        self.numbers.len() + self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.numbers.clear();
        self.names.clear();
    }
}
