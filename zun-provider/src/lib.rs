//! OpenStack Zun container resources.
//!
//! Implements create/read/delete for containers and network interface
//! attachments against the Zun v1 API. Operations that complete
//! asynchronously on the server side poll the API until the resource
//! converges; see [`poller`].

pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod models;
pub mod poller;
pub mod refresh;
pub mod resource_data;
pub mod resources;
pub mod status;

pub use client::ZunClient;
pub use config::{PollTuning, ProviderConfig};
pub use error::{Error, Result};
pub use id::AttachmentId;
pub use poller::{Refresh, Refreshed, StateChangeConf};
pub use resource_data::{ResourceData, TimeoutKind, Timeouts};
pub use resources::{ContainerResource, InterfaceAttachResource, Resource, ResourceKind};
pub use status::{ContainerStatus, InterfaceStatus};
