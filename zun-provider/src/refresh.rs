//! Refresh strategies fed to the poller, one per operation.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::client::ZunClient;
use crate::error::Result;
use crate::id::AttachmentId;
use crate::models::{Container, DetachOpts, Interface};
use crate::poller::{Refresh, Refreshed};
use crate::status::{ContainerStatus, InterfaceStatus};

/// Reports the status of a container.
///
/// What a 404 means depends on the caller: during teardown the container
/// being gone is the goal, during creation it is a failure. The status to
/// report for a missing container is therefore passed in.
pub struct ContainerStatusRefresh {
    client: ZunClient,
    container_id: String,
    not_found: ContainerStatus,
}

impl ContainerStatusRefresh {
    pub fn new(client: ZunClient, container_id: impl Into<String>, not_found: ContainerStatus) -> Self {
        Self {
            client,
            container_id: container_id.into(),
            not_found,
        }
    }
}

#[async_trait]
impl Refresh for ContainerStatusRefresh {
    type Snapshot = Container;
    type Status = ContainerStatus;

    fn resource(&self) -> String {
        format!("container {}", self.container_id)
    }

    async fn refresh(&mut self) -> Result<Refreshed<Container, ContainerStatus>> {
        match self.client.get_container(&self.container_id).await {
            Ok(container) => {
                let status = container.parsed_status();
                Ok(Refreshed::new(container, status))
            }
            Err(e) if e.is_not_found() => Ok(Refreshed::without_snapshot(self.not_found.clone())),
            Err(e) => Err(e),
        }
    }
}

/// Waits for an attached port to show up in the container's network list.
pub struct AttachRefresh {
    client: ZunClient,
    id: AttachmentId,
}

impl AttachRefresh {
    pub fn new(client: ZunClient, id: AttachmentId) -> Self {
        Self { client, id }
    }
}

#[async_trait]
impl Refresh for AttachRefresh {
    type Snapshot = Interface;
    type Status = InterfaceStatus;

    fn resource(&self) -> String {
        format!("interface {}", self.id)
    }

    async fn refresh(&mut self) -> Result<Refreshed<Interface, InterfaceStatus>> {
        match self
            .client
            .get_interface(&self.id.container_id, &self.id.port_id)
            .await
        {
            Ok(iface) => Ok(Refreshed::new(iface, InterfaceStatus::Attached)),
            Err(e) if e.is_not_found() => {
                Ok(Refreshed::without_snapshot(InterfaceStatus::Attaching))
            }
            Err(e) => Err(e),
        }
    }
}

/// Waits for a new interface on `network_id` when the port is chosen by Neutron.
///
/// Ports already present before the attach request are ignored, so attaching a
/// second interface on the same network picks up the new port.
pub struct NetworkAttachRefresh {
    client: ZunClient,
    container_id: String,
    network_id: String,
    known_ports: HashSet<String>,
}

impl NetworkAttachRefresh {
    pub fn new(
        client: ZunClient,
        container_id: impl Into<String>,
        network_id: impl Into<String>,
        known_ports: HashSet<String>,
    ) -> Self {
        Self {
            client,
            container_id: container_id.into(),
            network_id: network_id.into(),
            known_ports,
        }
    }
}

#[async_trait]
impl Refresh for NetworkAttachRefresh {
    type Snapshot = Interface;
    type Status = InterfaceStatus;

    fn resource(&self) -> String {
        format!(
            "interface on network {} of container {}",
            self.network_id, self.container_id
        )
    }

    async fn refresh(&mut self) -> Result<Refreshed<Interface, InterfaceStatus>> {
        let added = self
            .client
            .list_interfaces(&self.container_id)
            .await?
            .into_iter()
            .find(|iface| {
                iface.net_id == self.network_id && !self.known_ports.contains(&iface.port_id)
            });
        Ok(match added {
            Some(iface) => Refreshed::new(iface, InterfaceStatus::Attached),
            None => Refreshed::without_snapshot(InterfaceStatus::Attaching),
        })
    }
}

/// Detaches a port, re-issuing the detach request until the port is gone.
///
/// A 400 from the detach call is taken as "detach already in progress" unless
/// `strict` is set. That also hides genuine bad requests until the poll times
/// out.
pub struct DetachRefresh {
    client: ZunClient,
    id: AttachmentId,
    strict: bool,
}

impl DetachRefresh {
    pub fn new(client: ZunClient, id: AttachmentId, strict: bool) -> Self {
        Self { client, id, strict }
    }
}

#[async_trait]
impl Refresh for DetachRefresh {
    type Snapshot = Interface;
    type Status = InterfaceStatus;

    fn resource(&self) -> String {
        format!("interface {}", self.id)
    }

    async fn refresh(&mut self) -> Result<Refreshed<Interface, InterfaceStatus>> {
        debug!(
            port_id = %self.id.port_id,
            container_id = %self.id.container_id,
            "Attempting to detach interface"
        );

        let iface = match self
            .client
            .get_interface(&self.id.container_id, &self.id.port_id)
            .await
        {
            Ok(iface) => iface,
            Err(e) if e.is_not_found() => {
                return Ok(Refreshed::without_snapshot(InterfaceStatus::Detached));
            }
            Err(e) => return Err(e),
        };

        let opts = DetachOpts {
            port: Some(self.id.port_id.clone()),
            network: None,
        };
        match self.client.detach_interface(&self.id.container_id, &opts).await {
            Ok(()) => {
                debug!(port_id = %self.id.port_id, "Interface is still active");
                Ok(Refreshed::new(iface, InterfaceStatus::Detaching))
            }
            Err(e) if e.is_not_found() => Ok(Refreshed::new(iface, InterfaceStatus::Detached)),
            Err(e) if e.is_bad_request() && !self.strict => {
                warn!(port_id = %self.id.port_id, error = %e, "Detach rejected, waiting for port to go away");
                Ok(Refreshed::new(iface, InterfaceStatus::Detaching))
            }
            Err(e) => Err(e),
        }
    }
}
