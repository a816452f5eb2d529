//! Resource CRUD operations.
//!
//! Each resource kind turns a [`ResourceData`] into API calls, waits for the
//! remote side to converge where needed, and writes the observed state back.

pub mod container;
pub mod interface_attach;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{PollTuning, ProviderConfig};
use crate::error::{Error, Result};
use crate::poller::StateChangeConf;
use crate::resource_data::ResourceData;
use crate::status::Convergence;

pub use container::ContainerResource;
pub use interface_attach::InterfaceAttachResource;

/// Trait for resource kinds.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Create the remote resource and wait until it is usable.
    async fn create(&self, d: &mut ResourceData) -> Result<()>;

    /// Refresh attributes from the API. Clears the id if the resource is gone.
    async fn read(&self, d: &mut ResourceData) -> Result<()>;

    /// Delete the remote resource and wait until it is gone.
    async fn delete(&self, d: &mut ResourceData) -> Result<()>;

    /// Adopt an existing resource by id.
    async fn import(&self, id: &str) -> Result<ResourceData> {
        let mut d = ResourceData::with_id(id);
        self.read(&mut d).await?;
        Ok(d)
    }
}

/// Supported resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Container,
    InterfaceAttach,
}

impl ResourceKind {
    pub fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Container => container::TYPE_NAME,
            ResourceKind::InterfaceAttach => interface_attach::TYPE_NAME,
        }
    }

    pub fn build(self, config: &ProviderConfig) -> Result<Box<dyn Resource>> {
        Ok(match self {
            ResourceKind::Container => Box::new(ContainerResource::new(config)?),
            ResourceKind::InterfaceAttach => Box::new(InterfaceAttachResource::new(config)?),
        })
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            container::TYPE_NAME => Ok(ResourceKind::Container),
            interface_attach::TYPE_NAME => Ok(ResourceKind::InterfaceAttach),
            other => Err(Error::Validation(format!("unknown resource type '{}'", other))),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Treat a not-found error as "resource is gone": clear the id and succeed.
pub(crate) fn check_deleted(d: &mut ResourceData, err: Error, msg: &str) -> Result<()> {
    if err.is_not_found() {
        d.clear_id();
        return Ok(());
    }
    Err(err.context(format!("{} {}", msg, d.id())))
}

/// Region from the resource, falling back to the provider's.
pub(crate) fn region(d: &ResourceData, config_region: &str) -> String {
    d.get_str("region").unwrap_or(config_region).to_string()
}

/// Poll schedule for one operation, with the provider's overrides applied.
pub(crate) fn schedule<S>(
    convergence: Convergence<S>,
    timeout: Duration,
    delay: Duration,
    min_timeout: Duration,
    tuning: &PollTuning,
) -> StateChangeConf<S>
where
    S: Clone + PartialEq + fmt::Display + Send + Sync,
{
    StateChangeConf::new(convergence, timeout)
        .with_delay(tuning.delay.unwrap_or(delay))
        .with_min_timeout(tuning.min_timeout.unwrap_or(min_timeout))
        .with_poll_interval(tuning.interval)
}
