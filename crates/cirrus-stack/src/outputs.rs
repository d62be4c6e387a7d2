//! Values exported from the deployment.

use std::collections::BTreeMap;

use cirrus_common::error::Result;
use cirrus_common::value::Value;
use cirrus_graph::{DeploymentGraph, Input, ResourceHandle};

use crate::settings::StackSettings;

/// Export holding the public IP address.
pub const IP: &str = "ip";
/// Export holding the fully qualified host name.
pub const HOSTNAME: &str = "hostname";
/// Export holding `http://<hostname>:<containerPort>`.
pub const URL: &str = "url";

/// Exports the IP, host name and URL of the container group.
///
/// # Errors
///
/// Returns an error if an export name is already taken.
pub fn export_outputs(
    graph: &mut DeploymentGraph,
    settings: &StackSettings,
    container_group: &ResourceHandle,
) -> Result<()> {
    let fqdn = container_group.output("ipAddress.fqdn")?;
    graph.export(IP, container_group.output("ipAddress.ip")?)?;
    graph.export(HOSTNAME, fqdn.clone())?;
    graph.export(
        URL,
        Input::interpolate([
            Input::from("http://"),
            fqdn,
            Input::from(format!(":{}", settings.container_port)),
        ]),
    )?;
    Ok(())
}

/// The resolved public endpoint of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Public IP address.
    pub ip: String,
    /// Fully qualified host name.
    pub hostname: String,
    /// HTTP URL of the service.
    pub url: String,
}

impl Endpoint {
    /// Reads the endpoint from resolved exports.
    #[must_use]
    pub fn from_exports(exports: &BTreeMap<String, Value>) -> Option<Self> {
        let text = |key: &str| exports.get(key).and_then(Value::as_str).map(str::to_owned);
        Some(Self {
            ip: text(IP)?,
            hostname: text(HOSTNAME)?,
            url: text(URL)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_requires_all_three_exports() {
        let mut exports = BTreeMap::from([
            (IP.to_owned(), Value::from("20.1.2.3")),
            (HOSTNAME.to_owned(), Value::from("demo.westus3.azurecontainer.io")),
        ]);
        assert!(Endpoint::from_exports(&exports).is_none());

        let _ = exports.insert(
            URL.to_owned(),
            Value::from("http://demo.westus3.azurecontainer.io:8080"),
        );
        let endpoint = Endpoint::from_exports(&exports).expect("endpoint");
        assert_eq!(endpoint.ip, "20.1.2.3");
        assert!(endpoint.url.starts_with("http://"));
    }
}
