//! `openstack_container_interface_attach_v1`: attach a port or network to a container.
//!
//! The resource id is `<container_id>/<port_id>`.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{check_deleted, region, schedule, Resource};
use crate::client::ZunClient;
use crate::config::{PollTuning, ProviderConfig};
use crate::error::{Error, Result};
use crate::id::AttachmentId;
use crate::models::{AttachOpts, Interface};
use crate::refresh::{AttachRefresh, DetachRefresh, NetworkAttachRefresh};
use crate::resource_data::{ResourceData, TimeoutKind};
use crate::status::InterfaceOp;

pub const TYPE_NAME: &str = "openstack_container_interface_attach_v1";

const POLL_DELAY: Duration = Duration::from_secs(5);
const POLL_MIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct InterfaceAttachResource {
    client: ZunClient,
    region: String,
    poll: PollTuning,
    strict_detach: bool,
}

impl InterfaceAttachResource {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: ZunClient::new(config)?,
            region: config.region.clone(),
            poll: config.poll.clone(),
            strict_detach: config.strict_detach,
        })
    }

    fn attach_opts(d: &ResourceData) -> Result<AttachOpts> {
        let port = d.get_str("port_id").map(str::to_string);
        let network = d.get_str("network_id").map(str::to_string);
        if port.is_none() && network.is_none() {
            return Err(Error::Validation(
                "Must set one of network_id and port_id".to_string(),
            ));
        }
        if port.is_some() && network.is_some() {
            return Err(Error::Validation(
                "network_id conflicts with port_id".to_string(),
            ));
        }
        let fixed_ip = d.get_str("fixed_ip").map(str::to_string);
        if port.is_some() && fixed_ip.is_some() {
            return Err(Error::Validation("fixed_ip conflicts with port_id".to_string()));
        }

        Ok(AttachOpts {
            port,
            network,
            fixed_ip,
        })
    }

    /// Wait for the attachment to appear and return the interface backing it.
    async fn wait_attached(
        &self,
        d: &ResourceData,
        container_id: &str,
        opts: &AttachOpts,
        known_ports: HashSet<String>,
    ) -> Result<Option<Interface>> {
        let conf = schedule(
            InterfaceOp::Attach.convergence(),
            d.timeout(TimeoutKind::Create),
            POLL_DELAY,
            POLL_MIN_TIMEOUT,
            &self.poll,
        );

        match (&opts.port, &opts.network) {
            (Some(port_id), _) => {
                let id = AttachmentId::new(container_id, port_id.as_str())?;
                let mut refresh = AttachRefresh::new(self.client.clone(), id);
                conf.wait_for_state(&mut refresh).await
            }
            (None, Some(network_id)) => {
                let mut refresh = NetworkAttachRefresh::new(
                    self.client.clone(),
                    container_id,
                    network_id.as_str(),
                    known_ports,
                );
                conf.wait_for_state(&mut refresh).await
            }
            (None, None) => Err(Error::Validation(
                "Must set one of network_id and port_id".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Resource for InterfaceAttachResource {
    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let container_id = d.require_str("container_id")?.to_string();
        let opts = Self::attach_opts(d)?;
        debug!(?opts, "{} attach options", TYPE_NAME);

        let context = || format!("Error creating {} {}", TYPE_NAME, container_id);

        // Ports present before the request, to recognise the one Neutron allocates.
        let known_ports: HashSet<String> = if opts.port.is_none() {
            self.client
                .list_interfaces(&container_id)
                .await
                .map_err(|e| e.context(context()))?
                .into_iter()
                .map(|iface| iface.port_id)
                .collect()
        } else {
            HashSet::new()
        };

        self.client
            .attach_interface(&container_id, &opts)
            .await
            .map_err(|e| e.context(context()))?;

        let attachment = self
            .wait_attached(d, &container_id, &opts, known_ports)
            .await
            .map_err(|e| e.context(context()))?;

        let port_id = match (&opts.port, attachment) {
            (Some(port_id), _) => port_id.clone(),
            (None, Some(iface)) => iface.port_id,
            (None, None) => {
                return Err(Error::NotFound(format!(
                    "no new interface on container {}",
                    container_id
                ))
                .context(context()));
            }
        };

        let id = AttachmentId::new(container_id, port_id)?;
        info!(id = %id, "Created {}", TYPE_NAME);
        d.set_id(id.to_string());

        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let id: AttachmentId = d.id().parse()?;

        let attachment = match self
            .client
            .get_interface(&id.container_id, &id.port_id)
            .await
        {
            Ok(iface) => iface,
            Err(e) => return check_deleted(d, e, &format!("Error retrieving {}", TYPE_NAME)),
        };
        debug!(id = %id, ?attachment, "Retrieved {}", TYPE_NAME);

        let region = region(d, &self.region);
        d.set("container_id", &id.container_id)?;
        d.set("port_id", &attachment.port_id)?;
        d.set("network_id", &attachment.net_id)?;
        d.set("fixed_ip", attachment.primary_fixed_ip().unwrap_or_default())?;
        d.set("region", region)?;
        Ok(())
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let id: AttachmentId = d.id().parse()?;

        let conf = schedule(
            InterfaceOp::Detach.convergence(),
            d.timeout(TimeoutKind::Delete),
            POLL_DELAY,
            POLL_MIN_TIMEOUT,
            &self.poll,
        );
        let mut refresh = DetachRefresh::new(self.client.clone(), id.clone(), self.strict_detach);
        conf.wait_for_state(&mut refresh)
            .await
            .map_err(|e| e.context(format!("Error detaching {} {}", TYPE_NAME, id)))?;

        info!(id = %id, "Detached {}", TYPE_NAME);
        d.clear_id();
        Ok(())
    }

    async fn import(&self, id: &str) -> Result<ResourceData> {
        let id: AttachmentId = id.parse()?;
        let mut d = ResourceData::with_id(id.to_string());
        self.read(&mut d).await?;
        Ok(d)
    }
}
