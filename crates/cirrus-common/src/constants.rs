//! System-wide constants and default paths.

/// Application name shown in CLI output.
pub const APP_NAME: &str = "cirrus";

/// Stack configuration file read when none is given.
pub const DEFAULT_STACK_FILE: &str = "Cirrus.dev.yaml";

/// State file written after a deployment.
pub const DEFAULT_STATE_FILE: &str = ".cirrus/state.json";

/// Stack name used when the stack file does not declare one.
pub const DEFAULT_STACK_NAME: &str = "dev";

/// Prefix of environment variables that override configuration keys.
pub const ENV_CONFIG_PREFIX: &str = "CIRRUS_CONFIG_";

/// Mapping key marking a configuration value as secret.
pub const SECURE_KEY: &str = "secure";
