//! Request and response bodies of the Zun container API.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::status::ContainerStatus;

/// Zun sends `null` for many unset fields; treat those as the type's default.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Containers
// =============================================================================

/// One address of a container on a network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, deserialize_with = "null_default")]
    pub preserve_on_delete: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub addr: String,
    #[serde(default, deserialize_with = "null_default")]
    pub port: String,
    #[serde(default, deserialize_with = "null_default")]
    pub version: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub subnet_id: String,
}

/// A container as returned by `GET /containers/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub uuid: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub image: String,
    #[serde(default, deserialize_with = "null_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_default")]
    pub status_detail: String,
    #[serde(default, deserialize_with = "null_default")]
    pub status_reason: String,
    #[serde(default, deserialize_with = "null_default")]
    pub task_state: String,
    #[serde(default, deserialize_with = "null_default")]
    pub addresses: BTreeMap<String, Vec<Address>>,
    #[serde(default, deserialize_with = "null_default")]
    pub links: Vec<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "null_default")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_default")]
    pub image_driver: String,
    #[serde(default, deserialize_with = "null_default")]
    pub security_groups: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub command: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub cpu: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub memory: String,
    #[serde(default, deserialize_with = "null_default")]
    pub workdir: String,
    #[serde(default, deserialize_with = "null_default")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_default")]
    pub restart_policy: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_default")]
    pub interactive: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub tty: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub hostname: String,
    #[serde(default, deserialize_with = "null_default")]
    pub host: String,
    #[serde(default, deserialize_with = "null_default")]
    pub ports: Vec<i64>,
    #[serde(default, deserialize_with = "null_default")]
    pub privileged: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub healthcheck: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_default")]
    pub user_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub project_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub disk: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub registry_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub cpu_policy: String,
    #[serde(default, deserialize_with = "null_default")]
    pub entrypoint: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub runtime: String,
    #[serde(default, deserialize_with = "null_default")]
    pub auto_remove: bool,
}

impl Container {
    pub fn parsed_status(&self) -> ContainerStatus {
        ContainerStatus::from(self.status.as_str())
    }
}

/// Body of `POST /containers` (microversion 1.31, with `registry`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub restart_policy: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tty: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_driver: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nets: Vec<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_remove: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_heal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub hints: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub healthcheck: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub exposed_ports: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

/// How `DELETE /containers/{id}` treats a running container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Fail if the container is running.
    #[default]
    Plain,
    /// Stop the container first.
    Stop,
    /// Delete regardless of state.
    Force,
}

impl DeleteMode {
    pub(crate) fn query(self) -> &'static [(&'static str, &'static str)] {
        match self {
            DeleteMode::Plain => &[],
            DeleteMode::Stop => &[("stop", "True")],
            DeleteMode::Force => &[("force", "True")],
        }
    }
}

// =============================================================================
// Interface attachments
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedIp {
    #[serde(default, deserialize_with = "null_default")]
    pub ip_address: String,
    #[serde(default, deserialize_with = "null_default")]
    pub subnet_id: String,
}

/// A network interface of a container, from `network_list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(default, deserialize_with = "null_default")]
    pub port_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub net_id: String,
    #[serde(default)]
    pub fixed_ip: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub fixed_ips: Vec<FixedIp>,
}

impl Interface {
    /// The address bound to this interface, if the API reported one.
    pub fn primary_fixed_ip(&self) -> Option<&str> {
        self.fixed_ip
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .or_else(|| self.fixed_ips.first().map(|ip| ip.ip_address.as_str()))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct InterfaceList {
    #[serde(default, deserialize_with = "null_default")]
    pub networks: Vec<Interface>,
}

/// Query of `POST /containers/{id}/network_attach`.
///
/// `port` and `network` are mutually exclusive. A `fixed_ip` without a
/// `network` is rejected by the API with 400.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttachOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_ip: Option<String>,
}

/// Query of `POST /containers/{id}/network_detach`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetachOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}
