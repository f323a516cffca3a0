use serde::Deserialize;

///
/// CONSTANTS
///

/// Default bound on AND/OR/NOT nesting accepted by the predicate compiler.
pub const DEFAULT_MAX_FILTER_DEPTH: usize = 64;

///
/// ClientConfig
///
/// Runtime policy for one client. Every field has a default, so a partial
/// JSON document is a valid configuration.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Log every compiled command at debug level.
    pub debug: bool,

    /// Reject extensions that redefine an existing client method instead of
    /// letting the later extension win.
    pub strict_extensions: bool,

    /// Maximum AND/OR/NOT nesting depth of a filter.
    pub max_filter_depth: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            debug: false,
            strict_extensions: false,
            max_filter_depth: DEFAULT_MAX_FILTER_DEPTH,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    #[must_use]
    pub const fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    #[must_use]
    pub const fn strict_extensions(mut self) -> Self {
        self.strict_extensions = true;
        self
    }

    #[must_use]
    pub const fn max_filter_depth(mut self, depth: usize) -> Self {
        self.max_filter_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = ClientConfig::from_json(r#"{"debug": true}"#).expect("valid config");

        assert!(config.debug);
        assert!(!config.strict_extensions);
        assert_eq!(config.max_filter_depth, DEFAULT_MAX_FILTER_DEPTH);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ClientConfig::from_json(r#"{"debgu": true}"#).is_err());
    }

    #[test]
    fn builder_methods_compose() {
        let config = ClientConfig::new().strict_extensions().max_filter_depth(4);

        assert!(config.strict_extensions);
        assert_eq!(config.max_filter_depth, 4);
    }
}
