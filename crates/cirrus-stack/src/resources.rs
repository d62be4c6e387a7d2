//! The resource nodes of the weather service.
//!
//! Declared in dependency order: resource group, cache (with its key
//! listing), registry (with its credential listing), image, container group.

use cirrus_common::error::Result;
use cirrus_engine::provider::simulated::{
    CONTAINER_GROUP, IMAGE, LIST_REDIS_KEYS, LIST_REGISTRY_CREDENTIALS, REDIS, REGISTRY,
    RESOURCE_GROUP,
};
use cirrus_graph::{CustomTimeouts, DeploymentGraph, Input, ResourceHandle, ResourceOptions};

use crate::settings::StackSettings;

/// Region of the managed cache.
pub const CACHE_LOCATION: &str = "westus3";
/// Dockerfile stage the image is built from.
pub const BUILD_TARGET: &str = "production";
/// CPU architectures the image is built for.
pub const PLATFORMS: [&str; 2] = ["linux/amd64", "linux/arm64"];

/// Declares the resource group every other resource is placed in.
///
/// # Errors
///
/// Returns an error if the name is already declared.
pub fn resource_group(
    graph: &mut DeploymentGraph,
    settings: &StackSettings,
) -> Result<ResourceHandle> {
    graph.register_resource(
        RESOURCE_GROUP,
        &format!("{}-rg", settings.prefix_name),
        Vec::<(String, Input)>::new(),
        ResourceOptions::default(),
    )
}

/// The managed cache and the query listing its access keys.
#[derive(Debug, Clone)]
pub struct Cache {
    /// The cache instance.
    pub instance: ResourceHandle,
    /// The access key listing; resolves only once the instance exists.
    pub keys: ResourceHandle,
}

impl Cache {
    /// `rediss://:<key>@<host>:<sslPort>`, secret because the key is.
    #[must_use]
    pub fn connection_string(&self) -> Input {
        Input::interpolate([
            Input::from("rediss://:"),
            self.keys.get("primaryKey"),
            Input::from("@"),
            self.instance.get("hostName"),
            Input::from(":"),
            self.instance.get("sslPort"),
        ])
    }
}

/// Declares the managed cache and its key listing.
///
/// # Errors
///
/// Returns an error if a name is already declared.
pub fn cache(
    graph: &mut DeploymentGraph,
    settings: &StackSettings,
    group: &ResourceHandle,
) -> Result<Cache> {
    let prefix = &settings.prefix_name;
    let instance = graph.register_resource(
        REDIS,
        &format!("{prefix}-redis"),
        [
            ("name", Input::from(format!("{prefix}-weather-cache"))),
            ("location", Input::from(CACHE_LOCATION)),
            ("resourceGroupName", group.get("name")),
            ("enableNonSslPort", Input::from(true)),
            ("redisVersion", Input::from("Latest")),
            ("minimumTlsVersion", Input::from("1.2")),
            (
                "redisConfiguration",
                Input::object([("maxmemoryPolicy", Input::from("allkeys-lru"))]),
            ),
            (
                "sku",
                Input::object([
                    ("name", Input::from("Basic")),
                    ("family", Input::from("C")),
                    ("capacity", Input::from(0.0)),
                ]),
            ),
        ],
        ResourceOptions {
            custom_timeouts: Some(CustomTimeouts::uniform(settings.cache_timeout)),
            ..ResourceOptions::default()
        },
    )?;

    let keys = graph.invoke(
        LIST_REDIS_KEYS,
        &format!("{prefix}-redis-keys"),
        [
            ("name", instance.get("name")),
            ("resourceGroupName", group.get("name")),
        ],
    )?;
    Ok(Cache { instance, keys })
}

/// The container registry and the query listing its admin credentials.
#[derive(Debug, Clone)]
pub struct Registry {
    /// The registry.
    pub instance: ResourceHandle,
    /// The credential listing; resolves only once the registry exists.
    pub credentials: ResourceHandle,
}

impl Registry {
    /// Registry host images are pushed to and pulled from.
    #[must_use]
    pub fn login_server(&self) -> Input {
        self.instance.get("loginServer")
    }

    /// Admin user name.
    #[must_use]
    pub fn username(&self) -> Input {
        self.credentials.get("username")
    }

    /// First admin password.
    ///
    /// # Errors
    ///
    /// Returns an error if the output path is malformed.
    pub fn password(&self) -> Result<Input> {
        self.credentials.output("passwords[0].value")
    }
}

/// Declares the container registry and its credential listing.
///
/// # Errors
///
/// Returns an error if a name is already declared.
pub fn registry(
    graph: &mut DeploymentGraph,
    settings: &StackSettings,
    group: &ResourceHandle,
) -> Result<Registry> {
    let prefix = &settings.prefix_name;
    let instance = graph.register_resource(
        REGISTRY,
        &format!("{prefix}ACR"),
        [
            ("resourceGroupName", group.get("name")),
            ("adminUserEnabled", Input::from(true)),
            ("sku", Input::object([("name", Input::from("Basic"))])),
        ],
        ResourceOptions::default(),
    )?;

    let credentials = graph.invoke(
        LIST_REGISTRY_CREDENTIALS,
        &format!("{prefix}ACR-credentials"),
        [
            ("resourceGroupName", group.get("name")),
            ("registryName", instance.get("name")),
        ],
    )?;
    Ok(Registry {
        instance,
        credentials,
    })
}

/// Fully qualified tag: `<login server>/<image name>:<tag>`.
#[must_use]
pub fn image_tag(settings: &StackSettings, registry: &Registry) -> Input {
    Input::interpolate([
        registry.login_server(),
        Input::from(format!("/{}:{}", settings.image_name(), settings.image_tag)),
    ])
}

/// Declares the multi-platform image build and push.
///
/// # Errors
///
/// Returns an error if the name is already declared.
pub fn image(
    graph: &mut DeploymentGraph,
    settings: &StackSettings,
    registry: &Registry,
) -> Result<ResourceHandle> {
    let app_path = settings.app_path.trim_end_matches('/');
    graph.register_resource(
        IMAGE,
        &format!("{}-image", settings.prefix_name),
        [
            ("tags", Input::list([image_tag(settings, registry)])),
            ("context", Input::object([("location", Input::from(app_path))])),
            (
                "dockerfile",
                Input::object([("location", Input::from(format!("{app_path}/Dockerfile")))]),
            ),
            ("target", Input::from(BUILD_TARGET)),
            ("platforms", Input::list(PLATFORMS.map(Input::from))),
            ("push", Input::from(true)),
            (
                "registries",
                Input::list([Input::object([
                    ("address", registry.login_server()),
                    ("username", registry.username()),
                    ("password", registry.password()?),
                ])]),
            ),
        ],
        ResourceOptions::default(),
    )
}

/// Declares the public container group running the service.
///
/// # Errors
///
/// Returns an error if the name is already declared.
pub fn container_group(
    graph: &mut DeploymentGraph,
    settings: &StackSettings,
    group: &ResourceHandle,
    registry: &Registry,
    image: &ResourceHandle,
    cache: &Cache,
) -> Result<ResourceHandle> {
    let name = settings.image_name();
    let port = settings.container_port;
    let tcp = |port: u16| {
        Input::object([
            ("port", Input::from(port)),
            ("protocol", Input::from("tcp")),
        ])
    };
    let env = |key: &str, value: Input| {
        Input::object([("name", Input::from(key)), ("value", value)])
    };

    graph.register_resource(
        CONTAINER_GROUP,
        &format!("{}-container-group", settings.prefix_name),
        [
            ("resourceGroupName", group.get("name")),
            ("osType", Input::from("linux")),
            ("restartPolicy", Input::from("always")),
            (
                "imageRegistryCredentials",
                Input::list([Input::object([
                    ("server", registry.login_server()),
                    ("username", registry.username()),
                    ("password", registry.password()?),
                ])]),
            ),
            (
                "containers",
                Input::list([Input::object([
                    ("name", Input::from(name)),
                    ("image", image.get("ref")),
                    ("ports", Input::list([tcp(port)])),
                    (
                        "environmentVariables",
                        Input::list([
                            env("PORT", Input::from(port.to_string())),
                            env("WEATHER_API_KEY", Input::from(settings.weather_api_key.clone())),
                            env("REDIS_URL", cache.connection_string()),
                        ]),
                    ),
                    (
                        "resources",
                        Input::object([(
                            "requests",
                            Input::object([
                                ("cpu", Input::from(settings.cpu)),
                                ("memoryInGB", Input::from(settings.memory_gb)),
                            ]),
                        )]),
                    ),
                ])]),
            ),
            (
                "ipAddress",
                Input::object([
                    ("type", Input::from("Public")),
                    ("dnsNameLabel", Input::from(name)),
                    ("ports", Input::list([tcp(settings.public_port)])),
                ]),
            ),
        ],
        ResourceOptions::default(),
    )
}
