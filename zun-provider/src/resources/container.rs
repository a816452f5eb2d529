//! `openstack_container_container_v1`: container lifecycle.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{check_deleted, schedule, Resource};
use crate::client::ZunClient;
use crate::config::{PollTuning, ProviderConfig};
use crate::error::Result;
use crate::models::{Container, CreateOpts, DeleteMode};
use crate::refresh::ContainerStatusRefresh;
use crate::resource_data::{ResourceData, TimeoutKind};
use crate::status::{ContainerOp, ContainerStatus};

pub const TYPE_NAME: &str = "openstack_container_container_v1";

const CREATE_DELAY: Duration = Duration::from_secs(10);
const CREATE_MIN_TIMEOUT: Duration = Duration::from_secs(3);
const DELETE_DELAY: Duration = Duration::from_secs(2);
const DELETE_MIN_TIMEOUT: Duration = Duration::from_secs(3);

pub struct ContainerResource {
    client: ZunClient,
    poll: PollTuning,
    delete_mode: DeleteMode,
}

impl ContainerResource {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: ZunClient::new(config)?,
            poll: config.poll.clone(),
            delete_mode: config.container_delete_mode,
        })
    }

    /// Build the create request from attributes. Booleans are only sent when set.
    fn create_opts(d: &ResourceData) -> Result<CreateOpts> {
        let flag = |key: &str| d.get_bool(key).then_some(true);
        let string = |key: &str| d.get_str(key).map(str::to_string);

        Ok(CreateOpts {
            name: string("name"),
            image: d.require_str("image")?.to_string(),
            command: d.get_or_default("command")?,
            cpu: d.get_as("cpu")?.filter(|cpu: &f64| *cpu != 0.0),
            memory: string("memory"),
            workdir: string("workdir"),
            labels: d.get_or_default("labels")?,
            environment: d.get_or_default("environment")?,
            restart_policy: d.get_or_default("restart_policy")?,
            interactive: flag("interactive"),
            tty: flag("tty"),
            image_driver: string("image_driver"),
            security_groups: d.get_or_default("security_groups")?,
            nets: d.get_or_default("nets")?,
            runtime: string("runtime"),
            hostname: string("hostname"),
            auto_remove: flag("auto_remove"),
            auto_heal: flag("auto_heal"),
            availability_zone: string("availability_zone"),
            hints: d.get_or_default("hints")?,
            mounts: d.get_or_default("mounts")?,
            privileged: flag("privileged"),
            healthcheck: d.get_or_default("healthcheck")?,
            exposed_ports: d.get_or_default("exposed_ports")?,
            host: string("host"),
            entrypoint: d.get_or_default("entrypoint")?,
            registry: string("registry"),
        })
    }

    fn flatten(d: &mut ResourceData, c: &Container) -> Result<()> {
        d.set("addresses", &c.addresses)?;
        d.set("links", &c.links)?;
        d.set("name", &c.name)?;
        d.set("image", &c.image)?;
        d.set("labels", &c.labels)?;
        d.set("image_driver", &c.image_driver)?;
        d.set("security_groups", &c.security_groups)?;
        d.set("command", &c.command)?;
        d.set("cpu", c.cpu)?;
        d.set("memory", &c.memory)?;
        d.set("workdir", &c.workdir)?;
        d.set("environment", &c.environment)?;
        d.set("restart_policy", &c.restart_policy)?;
        d.set("interactive", c.interactive)?;
        d.set("tty", c.tty)?;
        d.set("hostname", &c.hostname)?;
        d.set("status", &c.status)?;
        d.set("status_detail", &c.status_detail)?;
        d.set("host", &c.host)?;
        d.set("task_state", &c.task_state)?;
        d.set("status_reason", &c.status_reason)?;
        d.set("ports", &c.ports)?;
        d.set("privileged", c.privileged)?;
        d.set("healthcheck", &c.healthcheck)?;
        d.set("user_id", &c.user_id)?;
        d.set("project_id", &c.project_id)?;
        d.set("disk", c.disk)?;
        d.set("registry_id", &c.registry_id)?;
        d.set("cpu_policy", &c.cpu_policy)?;
        d.set("entrypoint", &c.entrypoint)?;
        Ok(())
    }
}

#[async_trait]
impl Resource for ContainerResource {
    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let opts = Self::create_opts(d)?;
        debug!(?opts, "{} create options", TYPE_NAME);

        let container = self
            .client
            .create_container(&opts)
            .await
            .map_err(|e| e.context(format!("Error creating {}", TYPE_NAME)))?;
        d.set_id(&container.uuid);

        info!(container_id = %container.uuid, "Waiting for container to become created");

        let conf = schedule(
            ContainerOp::Create.convergence(),
            d.timeout(TimeoutKind::Create),
            CREATE_DELAY,
            CREATE_MIN_TIMEOUT,
            &self.poll,
        );
        let mut refresh = ContainerStatusRefresh::new(
            self.client.clone(),
            &container.uuid,
            ContainerStatus::Deleted,
        );
        conf.wait_for_state(&mut refresh).await.map_err(|e| {
            e.context(format!(
                "Error waiting for container ({}) to become ready",
                container.uuid
            ))
        })?;

        info!(container_id = %container.uuid, "Created {}", TYPE_NAME);
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let container = match self.client.get_container(d.id()).await {
            Ok(c) => c,
            Err(e) => return check_deleted(d, e, &format!("Error retrieving {}", TYPE_NAME)),
        };
        debug!(container_id = %d.id(), status = %container.status, "Retrieved {}", TYPE_NAME);

        Self::flatten(d, &container)
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        if let Err(e) = self.client.delete_container(&id, self.delete_mode).await {
            return check_deleted(d, e, &format!("Error deleting {}", TYPE_NAME));
        }

        info!(container_id = %id, "Waiting for container to be deleted");

        let conf = schedule(
            ContainerOp::Delete.convergence(),
            d.timeout(TimeoutKind::Delete),
            DELETE_DELAY,
            DELETE_MIN_TIMEOUT,
            &self.poll,
        );
        let mut refresh =
            ContainerStatusRefresh::new(self.client.clone(), &id, ContainerStatus::Deleted);
        conf.wait_for_state(&mut refresh)
            .await
            .map_err(|e| e.context(format!("Error deleting {} {}", TYPE_NAME, id)))?;

        d.clear_id();
        Ok(())
    }
}
