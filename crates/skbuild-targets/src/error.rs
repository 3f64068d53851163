//! Error types for platform and argument configuration.

/// Errors raised while resolving platforms, architectures and GN tables.
///
/// Every variant is a configuration error: it is reported before any
/// external process is spawned.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// The platform name is not one of the supported identifiers.
    #[error("unknown platform: '{name}' (expected one of: {expected})")]
    UnknownPlatform {
        /// The rejected name.
        name: String,
        /// Comma-separated list of accepted names.
        expected: String,
    },

    /// The architecture is not on the platform's allow-list.
    #[error("invalid architecture for {platform}: '{arch}' (allowed: {allowed})")]
    InvalidArch {
        /// Platform the architecture was requested for.
        platform: String,
        /// The rejected architecture.
        arch: String,
        /// Comma-separated allow-list.
        allowed: String,
    },

    /// A configuration value could not be parsed.
    #[error("invalid {field}: '{value}' (expected one of: {expected})")]
    InvalidValue {
        /// Which setting was being parsed.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Accepted values.
        expected: &'static str,
    },

    /// A GN override could not be represented as a GN value.
    #[error("unsupported GN value for '{key}': {detail}")]
    UnsupportedGnValue {
        /// Argument name.
        key: String,
        /// Why the value was rejected.
        detail: String,
    },

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
