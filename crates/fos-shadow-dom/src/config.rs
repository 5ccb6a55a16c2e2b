//! Document configuration

/// Document configuration options
#[derive(Debug, Clone)]
pub struct Config {
    /// Dispatch DOM mutation events (DOMNodeInserted and friends).
    /// Events are only built when a listener for the type exists.
    pub mutation_events: bool,

    /// Mark nodes inserted under an attached parent for attachment on the
    /// next style update instead of attaching them immediately
    pub lazy_attach: bool,

    /// Event paths reaching the Document end with a window context
    pub has_window: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mutation_events: true,
            lazy_attach: false,
            has_window: true,
        }
    }
}
