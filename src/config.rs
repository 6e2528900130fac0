//! Route configuration.
//!
//! Configuration is an explicit value injected into each route at
//! construction time; there is no process-wide default.

/// Settings shared by every route built against one API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Root URL the route endpoint is appended to.
    pub base_url: String,
}

impl Config {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}
