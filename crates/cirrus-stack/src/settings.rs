//! Typed settings of the weather service stack.
//!
//! Every setting is read before anything is declared, so a missing key
//! aborts the deployment with no partial graph.

use std::time::Duration;

use cirrus_common::config::Config;
use cirrus_common::error::{CirrusError, Result};
use cirrus_common::secret::Secret;
use cirrus_engine::timeout::parse_duration;

/// Local build context directory.
pub const APP_PATH: &str = "appPath";
/// Prefix of every resource name; also the image name and DNS label.
pub const PREFIX_NAME: &str = "prefixName";
/// Tag of the built image.
pub const IMAGE_TAG: &str = "imageTag";
/// Port the container listens on.
pub const CONTAINER_PORT: &str = "containerPort";
/// Port published on the public IP.
pub const PUBLIC_PORT: &str = "publicPort";
/// CPU cores requested for the container.
pub const CPU: &str = "cpu";
/// Memory in GB requested for the container.
pub const MEMORY: &str = "memory";
/// Weather API key handed to the service.
pub const WEATHER_API_KEY: &str = "weatherApiKey";
/// Optional override of the cache provisioning timeout.
pub const CACHE_TIMEOUT: &str = "cacheTimeout";

/// Every key the stack cannot be declared without.
pub const REQUIRED_KEYS: [&str; 8] = [
    APP_PATH,
    PREFIX_NAME,
    IMAGE_TAG,
    CONTAINER_PORT,
    PUBLIC_PORT,
    CPU,
    MEMORY,
    WEATHER_API_KEY,
];

/// Managed caches take a long time to provision.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Settings of one deployment of the weather service.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSettings {
    /// Project name.
    pub project: String,
    /// Stack name.
    pub stack: String,
    /// Local build context directory.
    pub app_path: String,
    /// Resource name prefix.
    pub prefix_name: String,
    /// Image tag.
    pub image_tag: String,
    /// Container listen port.
    pub container_port: u16,
    /// Published port; always equal to `container_port`.
    pub public_port: u16,
    /// Requested CPU cores.
    pub cpu: f64,
    /// Requested memory in GB.
    pub memory_gb: f64,
    /// Weather API key.
    pub weather_api_key: Secret,
    /// Create/update/delete timeout of the cache.
    pub cache_timeout: Duration,
}

impl StackSettings {
    /// Reads and validates every setting.
    ///
    /// # Errors
    ///
    /// Returns [`CirrusError::MissingConfig`] for an absent key,
    /// [`CirrusError::PortMismatch`] when the two ports differ, and
    /// [`CirrusError::InvalidConfig`] for values that cannot be used.
    pub fn load(config: &Config) -> Result<Self> {
        let settings = Self {
            project: config.project().to_owned(),
            stack: config.stack().to_owned(),
            app_path: config.require(APP_PATH)?,
            prefix_name: config.require(PREFIX_NAME)?,
            image_tag: config.require(IMAGE_TAG)?,
            container_port: config.require_port(CONTAINER_PORT)?,
            public_port: config.require_port(PUBLIC_PORT)?,
            cpu: config.require_number(CPU)?,
            memory_gb: config.require_number(MEMORY)?,
            weather_api_key: config.require_secret(WEATHER_API_KEY)?,
            cache_timeout: config
                .get(CACHE_TIMEOUT)?
                .map(|t| parse_duration(&t))
                .transpose()?
                .unwrap_or(DEFAULT_CACHE_TIMEOUT),
        };
        settings.validate()?;
        tracing::info!(
            project = %settings.project,
            stack = %settings.stack,
            prefix = %settings.prefix_name,
            "stack settings loaded"
        );
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.container_port != self.public_port {
            return Err(CirrusError::PortMismatch {
                container: self.container_port,
                public: self.public_port,
            });
        }
        let valid_prefix = !self.prefix_name.is_empty()
            && !self.prefix_name.starts_with('-')
            && !self.prefix_name.ends_with('-')
            && self
                .prefix_name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_prefix {
            return Err(CirrusError::InvalidConfig {
                key: PREFIX_NAME.into(),
                message: format!(
                    "'{}' must be lower-case letters, digits and inner hyphens; \
                     it names the image and the DNS label",
                    self.prefix_name
                ),
            });
        }
        if self.image_tag.is_empty() || self.image_tag.contains(['/', ':', ' ']) {
            return Err(CirrusError::InvalidConfig {
                key: IMAGE_TAG.into(),
                message: format!("'{}' is not a valid image tag", self.image_tag),
            });
        }
        for (key, value) in [(CPU, self.cpu), (MEMORY, self.memory_gb)] {
            if value <= 0.0 {
                return Err(CirrusError::InvalidConfig {
                    key: key.into(),
                    message: format!("must be greater than zero, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Name of the built image (the resource prefix).
    #[must_use]
    pub fn image_name(&self) -> &str {
        &self.prefix_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new("weather", "dev")
            .with(APP_PATH, "../app")
            .with(PREFIX_NAME, "demo")
            .with(IMAGE_TAG, "v1")
            .with(CONTAINER_PORT, "8080")
            .with(PUBLIC_PORT, "8080")
            .with(CPU, "1")
            .with(MEMORY, "1.5")
            .with_secret(WEATHER_API_KEY, "api-key")
    }

    #[test]
    fn loads_complete_configuration() {
        let settings = StackSettings::load(&config()).expect("load");
        assert_eq!(settings.prefix_name, "demo");
        assert_eq!(settings.container_port, 8080);
        assert!((settings.memory_gb - 1.5).abs() < f64::EPSILON);
        assert_eq!(settings.weather_api_key.expose(), "api-key");
        assert_eq!(settings.cache_timeout, DEFAULT_CACHE_TIMEOUT);
    }

    #[test]
    fn every_required_key_is_enforced() {
        for key in REQUIRED_KEYS {
            let mut config = config();
            config.remove(key);
            let err = StackSettings::load(&config).unwrap_err();
            assert!(
                matches!(err, CirrusError::MissingConfig { key: ref k } if k.ends_with(key)),
                "{key}: got {err}"
            );
        }
    }

    #[test]
    fn unequal_ports_are_rejected() {
        let config = config().with(PUBLIC_PORT, "80");
        let err = StackSettings::load(&config).unwrap_err();
        assert!(
            matches!(err, CirrusError::PortMismatch { container: 8080, public: 80 }),
            "got: {err}"
        );
    }

    #[test]
    fn cache_timeout_can_be_configured() {
        let config = config().with(CACHE_TIMEOUT, "45m");
        let settings = StackSettings::load(&config).expect("load");
        assert_eq!(settings.cache_timeout, Duration::from_secs(45 * 60));

        let bad = config.with(CACHE_TIMEOUT, "forever");
        assert!(StackSettings::load(&bad).is_err());
    }

    #[test]
    fn overflowing_cache_timeout_is_a_config_error() {
        for huge in ["18446744073709551615s1s", "307445734561825861m"] {
            let config = config().with(CACHE_TIMEOUT, huge);
            let err = StackSettings::load(&config).unwrap_err();
            assert!(matches!(err, CirrusError::Config { .. }), "{huge}: {err}");
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (key, value) in [
            (PREFIX_NAME, "Demo"),
            (PREFIX_NAME, "-demo"),
            (PREFIX_NAME, "demo-"),
            (PREFIX_NAME, "demo_app"),
            (IMAGE_TAG, "v1:latest"),
            (CPU, "0"),
            (MEMORY, "-1"),
        ] {
            let config = config().with(key, value);
            assert!(StackSettings::load(&config).is_err(), "accepted {key}={value}");
        }
    }

    #[test]
    fn debug_output_hides_the_api_key() {
        let settings = StackSettings::load(&config()).expect("load");
        assert!(!format!("{settings:?}").contains("api-key"));
    }
}
