//! Deterministic in-process cloud.
//!
//! Used for previews, local dry runs and tests. Every generated value
//! (auto-names, host names, keys, IP addresses) is derived from the URN, so
//! two runs over the same graph produce the same outputs. Image builds are
//! checked against the local build context the way a real builder would
//! fail on it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use cirrus_common::error::{CirrusError, Result};
use cirrus_common::secret::Secret;
use cirrus_common::value::{Value, format_number};
use sha2::{Digest, Sha256};

use super::{InvokeRequest, Provider, Provisioned, ResourceRequest};

/// Resource group type token.
pub const RESOURCE_GROUP: &str = "azure-native:resources:ResourceGroup";
/// Managed Redis cache type token.
pub const REDIS: &str = "azure-native:redis:Redis";
/// Container registry type token.
pub const REGISTRY: &str = "azure-native:containerregistry:Registry";
/// Container image build type token.
pub const IMAGE: &str = "docker-build:index:Image";
/// Container group type token.
pub const CONTAINER_GROUP: &str = "azure-native:containerinstance:ContainerGroup";
/// Redis access key listing.
pub const LIST_REDIS_KEYS: &str = "azure-native:redis:listRedisKeys";
/// Registry credential listing.
pub const LIST_REGISTRY_CREDENTIALS: &str =
    "azure-native:containerregistry:listRegistryCredentials";

const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";
const DEFAULT_LOCATION: &str = "westus3";

/// A simulated cloud provider.
#[derive(Debug)]
pub struct SimulatedProvider {
    location: String,
    latency: Duration,
    failures: HashMap<String, String>,
    created: Mutex<HashSet<(String, String)>>,
}

impl SimulatedProvider {
    /// Creates a provider placing resources in the default region.
    #[must_use]
    pub fn new() -> Self {
        Self {
            location: DEFAULT_LOCATION.to_owned(),
            latency: Duration::ZERO,
            failures: HashMap::new(),
            created: Mutex::new(HashSet::new()),
        }
    }

    /// Sets the region used when a resource does not name one.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Delays every request by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes every request for a logical name or type token fail.
    #[must_use]
    pub fn fail_on(mut self, name_or_type: impl Into<String>, message: impl Into<String>) -> Self {
        let _ = self.failures.insert(name_or_type.into(), message.into());
        self
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn injected_failure(&self, request: &ResourceRequest) -> Option<CirrusError> {
        self.failures
            .get(&request.name)
            .or_else(|| self.failures.get(&request.type_token))
            .map(|message| CirrusError::provider(request.urn.as_str(), message.clone()))
    }

    fn record(&self, kind: &str, name: &str) {
        let _ = self
            .created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((kind.to_owned(), name.to_owned()));
    }

    fn exists(&self, kind: &str, name: &str) -> bool {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(kind.to_owned(), name.to_owned()))
    }

    fn create_now(&self, request: &ResourceRequest) -> Result<Provisioned> {
        if let Some(err) = self.injected_failure(request) {
            return Err(err);
        }
        let mut outputs = request.inputs.clone();
        let id = match request.type_token.as_str() {
            RESOURCE_GROUP => self.create_resource_group(request, &mut outputs),
            REDIS => self.create_redis(request, &mut outputs)?,
            REGISTRY => self.create_registry(request, &mut outputs)?,
            IMAGE => create_image(request, &mut outputs)?,
            CONTAINER_GROUP => self.create_container_group(request, &mut outputs)?,
            other => {
                return Err(CirrusError::provider(
                    request.urn.as_str(),
                    format!("unsupported resource type '{other}'"),
                ));
            }
        };
        let _ = outputs.insert("id".into(), Value::from(id.clone()));
        tracing::debug!(urn = %request.urn, id = %id, "simulated resource created");
        Ok(Provisioned { id, outputs })
    }

    fn location_of(&self, inputs: &BTreeMap<String, Value>) -> String {
        text(inputs, "location").unwrap_or_else(|| self.location.clone())
    }

    fn create_resource_group(
        &self,
        request: &ResourceRequest,
        outputs: &mut BTreeMap<String, Value>,
    ) -> String {
        let name = auto_name(request, &request.name);
        let _ = outputs.insert("name".into(), Value::from(name.clone()));
        let _ = outputs.insert("location".into(), Value::from(self.location_of(&request.inputs)));
        self.record(RESOURCE_GROUP, &name);
        format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/{name}")
    }

    fn create_redis(
        &self,
        request: &ResourceRequest,
        outputs: &mut BTreeMap<String, Value>,
    ) -> Result<String> {
        let group = self.require_group(request)?;
        let name =
            text(&request.inputs, "name").unwrap_or_else(|| auto_name(request, &request.name));
        let _ = outputs.insert("name".into(), Value::from(name.clone()));
        let _ = outputs.insert("location".into(), Value::from(self.location_of(&request.inputs)));
        let _ = outputs.insert(
            "hostName".into(),
            Value::from(format!("{name}.redis.cache.windows.net")),
        );
        let _ = outputs.insert("port".into(), Value::from(6379_u16));
        let _ = outputs.insert("sslPort".into(), Value::from(6380_u16));
        let _ = outputs.insert("provisioningState".into(), Value::from("Succeeded"));
        self.record(REDIS, &name);
        Ok(format!(
            "/subscriptions/{SUBSCRIPTION}/resourceGroups/{group}/providers/\
             Microsoft.Cache/redis/{name}"
        ))
    }

    fn create_registry(
        &self,
        request: &ResourceRequest,
        outputs: &mut BTreeMap<String, Value>,
    ) -> Result<String> {
        let group = self.require_group(request)?;
        let base: String = request
            .name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        let name = text(&request.inputs, "registryName")
            .unwrap_or_else(|| auto_name(request, &base));
        let _ = outputs.insert("name".into(), Value::from(name.clone()));
        let _ = outputs.insert("location".into(), Value::from(self.location_of(&request.inputs)));
        let _ = outputs.insert(
            "loginServer".into(),
            Value::from(format!("{}.azurecr.io", name.to_lowercase())),
        );
        self.record(REGISTRY, &name);
        Ok(format!(
            "/subscriptions/{SUBSCRIPTION}/resourceGroups/{group}/providers/\
             Microsoft.ContainerRegistry/registries/{name}"
        ))
    }

    fn create_container_group(
        &self,
        request: &ResourceRequest,
        outputs: &mut BTreeMap<String, Value>,
    ) -> Result<String> {
        let urn = request.urn.as_str();
        let group = self.require_group(request)?;
        let inputs = &request.inputs;

        let containers = list(inputs, "containers");
        if containers.is_empty() {
            return Err(CirrusError::provider(
                urn,
                "a container group needs at least one container",
            ));
        }
        let container_ports: HashSet<String> = containers
            .iter()
            .flat_map(|c| list_of(c, "ports"))
            .filter_map(|p| p.get("port").and_then(Value::as_f64).map(format_number))
            .collect();

        let credentials = list(inputs, "imageRegistryCredentials");
        for container in containers {
            let image = container.get("image").and_then(scalar_text).unwrap_or_default();
            check_pull_access(urn, &image, credentials)?;
        }

        let restart = text(inputs, "restartPolicy").unwrap_or_else(|| "always".into());
        if !["always", "onfailure", "never"].contains(&restart.to_lowercase().as_str()) {
            return Err(CirrusError::provider(urn, format!("invalid restart policy '{restart}'")));
        }

        let location = self.location_of(inputs);
        let name = auto_name(request, &request.name);
        if let Some(address) = inputs.get("ipAddress") {
            let published = list_of(address, "ports");
            for port in published {
                let port = port
                    .get("port")
                    .and_then(Value::as_f64)
                    .map(format_number)
                    .unwrap_or_default();
                if !container_ports.contains(&port) {
                    return Err(CirrusError::provider(
                        urn,
                        format!(
                            "public port {port} is not exposed by any container; \
                             container groups do not support port mapping"
                        ),
                    ));
                }
            }
            let digest = digest(&[urn, "ip"]);
            let bytes = digest.as_bytes();
            let ip = format!("20.{}.{}.{}", bytes[0], bytes[1], bytes[2]);
            let label = address.get("dnsNameLabel").and_then(scalar_text);
            let mut resolved = match address {
                Value::Object(map) => map.clone(),
                _ => BTreeMap::new(),
            };
            let _ = resolved.insert("ip".into(), Value::from(ip));
            if let Some(label) = label {
                let _ = resolved.insert(
                    "fqdn".into(),
                    Value::from(format!("{label}.{location}.azurecontainer.io")),
                );
            }
            let _ = outputs.insert("ipAddress".into(), Value::Object(resolved));
        }
        let _ = outputs.insert("name".into(), Value::from(name.clone()));
        let _ = outputs.insert("location".into(), Value::from(location));
        let _ = outputs.insert("provisioningState".into(), Value::from("Succeeded"));
        self.record(CONTAINER_GROUP, &name);
        Ok(format!(
            "/subscriptions/{SUBSCRIPTION}/resourceGroups/{group}/providers/\
             Microsoft.ContainerInstance/containerGroups/{name}"
        ))
    }

    fn require_group(&self, request: &ResourceRequest) -> Result<String> {
        let group = text(&request.inputs, "resourceGroupName").ok_or_else(|| {
            CirrusError::provider(request.urn.as_str(), "resourceGroupName is required")
        })?;
        if !self.exists(RESOURCE_GROUP, &group) {
            return Err(CirrusError::provider(
                request.urn.as_str(),
                format!("resource group '{group}' could not be found"),
            ));
        }
        Ok(group)
    }

    fn invoke_now(&self, request: &InvokeRequest) -> Result<BTreeMap<String, Value>> {
        let urn = request.urn.as_str();
        if let Some(message) = self
            .failures
            .get(request.urn.name())
            .or_else(|| self.failures.get(&request.function))
        {
            return Err(CirrusError::provider(urn, message.clone()));
        }
        match request.function.as_str() {
            LIST_REDIS_KEYS => {
                let name = text(&request.args, "name")
                    .ok_or_else(|| CirrusError::provider(urn, "name is required"))?;
                if !self.exists(REDIS, &name) {
                    return Err(CirrusError::provider(
                        urn,
                        format!("redis cache '{name}' not found"),
                    ));
                }
                Ok(BTreeMap::from([
                    (
                        "primaryKey".to_owned(),
                        Value::from(Secret::new(access_key(&name, "primary"))),
                    ),
                    (
                        "secondaryKey".to_owned(),
                        Value::from(Secret::new(access_key(&name, "secondary"))),
                    ),
                ]))
            }
            LIST_REGISTRY_CREDENTIALS => {
                let name = text(&request.args, "registryName")
                    .ok_or_else(|| CirrusError::provider(urn, "registryName is required"))?;
                if !self.exists(REGISTRY, &name) {
                    return Err(CirrusError::provider(urn, format!("registry '{name}' not found")));
                }
                let password = |slot: &str| {
                    Value::object([
                        ("name", Value::from(slot)),
                        ("value", Value::from(Secret::new(access_key(&name, slot)))),
                    ])
                };
                Ok(BTreeMap::from([
                    ("username".to_owned(), Value::from(name.clone())),
                    (
                        "passwords".to_owned(),
                        Value::List(vec![password("password"), password("password2")]),
                    ),
                ]))
            }
            other => Err(CirrusError::provider(urn, format!("unsupported function '{other}'"))),
        }
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for SimulatedProvider {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn create(
        &self,
        request: &ResourceRequest,
    ) -> impl Future<Output = Result<Provisioned>> + Send {
        async move {
            self.delay().await;
            self.create_now(request)
        }
    }

    fn invoke(
        &self,
        request: &InvokeRequest,
    ) -> impl Future<Output = Result<BTreeMap<String, Value>>> + Send {
        async move {
            self.delay().await;
            self.invoke_now(request)
        }
    }
}

fn create_image(
    request: &ResourceRequest,
    outputs: &mut BTreeMap<String, Value>,
) -> Result<String> {
    let urn = request.urn.as_str();
    let fail = |message: String| CirrusError::Build {
        resource: urn.to_owned(),
        message,
    };
    let inputs = &request.inputs;

    let tags: Vec<String> = list(inputs, "tags").iter().filter_map(scalar_text).collect();
    let tag = tags.first().cloned().ok_or_else(|| fail("at least one tag is required".into()))?;

    let context = inputs
        .get("context")
        .and_then(|c| c.get("location"))
        .and_then(scalar_text)
        .ok_or_else(|| fail("build context location is required".into()))?;
    if !Path::new(&context).is_dir() {
        return Err(fail(format!("build context '{context}' is not a directory")));
    }

    let dockerfile = inputs
        .get("dockerfile")
        .and_then(|d| d.get("location"))
        .and_then(scalar_text)
        .unwrap_or_else(|| format!("{context}/Dockerfile"));
    let contents = std::fs::read_to_string(&dockerfile)
        .map_err(|e| fail(format!("cannot read Dockerfile '{dockerfile}': {e}")))?;

    if let Some(target) = text(inputs, "target") {
        if !has_stage(&contents, &target) {
            return Err(fail(format!("target stage '{target}' not found in '{dockerfile}'")));
        }
    }

    let platforms: Vec<String> = list(inputs, "platforms").iter().filter_map(scalar_text).collect();
    let push = matches!(inputs.get("push"), Some(Value::Bool(true)));
    if push {
        let host = registry_host(&tag)
            .ok_or_else(|| fail(format!("tag '{tag}' does not name a registry to push to")))?;
        let registries = list(inputs, "registries");
        let authorised = registries.iter().any(|r| {
            r.get("address").and_then(scalar_text).as_deref() == Some(host)
                && non_empty(r.get("username"))
                && non_empty(r.get("password"))
        });
        if !authorised {
            return Err(fail(format!(
                "push to '{host}' is not authorized: no credentials for registry"
            )));
        }
    }

    let mut parts: Vec<&str> = vec![contents.as_str()];
    parts.extend(tags.iter().map(String::as_str));
    parts.extend(platforms.iter().map(String::as_str));
    let digest = format!("sha256:{}", digest(&parts));

    let _ = outputs.insert("ref".into(), Value::from(tag));
    let _ = outputs.insert("digest".into(), Value::from(digest.clone()));
    Ok(digest)
}

fn check_pull_access(urn: &str, image: &str, credentials: &[Value]) -> Result<()> {
    let Some(host) = registry_host(image) else {
        return Ok(());
    };
    let allowed = credentials.iter().any(|c| {
        c.get("server").and_then(scalar_text).as_deref() == Some(host)
            && non_empty(c.get("username"))
            && non_empty(c.get("password"))
    });
    if allowed {
        Ok(())
    } else {
        Err(CirrusError::provider(
            urn,
            format!("image '{image}' cannot be pulled: no credentials for '{host}'"),
        ))
    }
}

/// Registry host of an image reference, if it names one.
fn registry_host(image: &str) -> Option<&str> {
    let (host, _) = image.split_once('/')?;
    (host.contains('.') || host.contains(':')).then_some(host)
}

/// Whether the Dockerfile declares `FROM ... AS <target>`.
fn has_stage(dockerfile: &str, target: &str) -> bool {
    dockerfile.lines().any(|line| {
        let words: Vec<&str> = line.split_whitespace().collect();
        words.len() >= 4
            && words[0].eq_ignore_ascii_case("FROM")
            && words[words.len() - 2].eq_ignore_ascii_case("AS")
            && words[words.len() - 1] == target
    })
}

fn text(inputs: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    inputs.get(key).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    value.interpolation_text().map(|(text, _)| text)
}

fn non_empty(value: Option<&Value>) -> bool {
    value.and_then(scalar_text).is_some_and(|s| !s.is_empty())
}

fn list<'a>(inputs: &'a BTreeMap<String, Value>, key: &str) -> &'a [Value] {
    match inputs.get(key) {
        Some(Value::List(items)) => items,
        _ => &[],
    }
}

fn list_of<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    match value.get(key) {
        Some(Value::List(items)) => items,
        _ => &[],
    }
}

fn auto_name(request: &ResourceRequest, base: &str) -> String {
    format!("{base}{}", &digest(&[request.urn.as_str()])[..8])
}

fn access_key(name: &str, slot: &str) -> String {
    digest(&[name, slot, "key"])[..44].to_owned()
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0_u8]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
