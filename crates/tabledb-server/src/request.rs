//! Request context carried through a cascade.

use tabledb_core::Principal;

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Create a row.
    Post,
    /// Delete a row.
    Delete,
}

/// A request against one resource.
///
/// Sub-requests synthesized during a cascade are derived from the request
/// that triggered them and share its principal and language preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Requested operation.
    pub method: Method,
    /// Acting principal.
    pub principal: Principal,
    /// Languages whose translations a delete targets, in preference order.
    pub language_preferences: Vec<String>,
    depth: usize,
}

impl Request {
    /// Create a top-level delete request.
    pub fn delete(principal: Principal) -> Self {
        Self {
            method: Method::Delete,
            principal,
            language_preferences: Vec::new(),
            depth: 0,
        }
    }

    /// Add a preferred language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_preferences.push(language.into());
        self
    }

    /// Nesting level; zero for requests made by callers.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Derive a nested request for a synthesized operation.
    pub fn derive(&self, method: Method) -> Self {
        Self {
            method,
            principal: self.principal.clone(),
            language_preferences: self.language_preferences.clone(),
            depth: self.depth + 1,
        }
    }
}
