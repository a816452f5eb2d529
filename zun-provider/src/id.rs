//! Composite resource identifiers.
//!
//! An interface attachment is addressed by the container it lives on and the
//! Neutron port backing it. The pair is persisted as `<container_id>/<port_id>`
//! and must stay parseable across releases.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const ATTACHMENT_KIND: &str = "openstack_container_interface_attach_v1";

/// Identifier of an interface attachment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentId {
    pub container_id: String,
    pub port_id: String,
}

impl AttachmentId {
    pub fn new(container_id: impl Into<String>, port_id: impl Into<String>) -> Result<Self> {
        let id = Self {
            container_id: container_id.into(),
            port_id: port_id.into(),
        };
        let valid = |segment: &str| !segment.is_empty() && !segment.contains('/');
        if !valid(&id.container_id) || !valid(&id.port_id) {
            return Err(Error::InvalidId {
                kind: ATTACHMENT_KIND,
                id: id.to_string(),
            });
        }
        Ok(id)
    }
}

impl FromStr for AttachmentId {
    type Err = Error;

    /// Segments past the second are ignored.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidId {
            kind: ATTACHMENT_KIND,
            id: s.to_string(),
        };
        let mut parts = s.split('/');
        match (parts.next(), parts.next()) {
            (Some(container_id), Some(port_id)) => {
                Self::new(container_id, port_id).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container_id, self.port_id)
    }
}
