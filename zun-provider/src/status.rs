//! Typed status values and the convergence table for each operation.
//!
//! Zun reports container status as a free-form string. Known values parse into
//! named variants; anything else lands in `Other` and is never pending or
//! target for any operation, so the poller rejects it as unexpected.

use std::fmt;

/// Container status as reported by the Zun API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerStatus {
    Creating,
    Created,
    Running,
    Stopped,
    Paused,
    Restarting,
    Rebuilding,
    Deleting,
    Deleted,
    Error,
    Unknown,
    Other(String),
}

impl ContainerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ContainerStatus::Creating => "Creating",
            ContainerStatus::Created => "Created",
            ContainerStatus::Running => "Running",
            ContainerStatus::Stopped => "Stopped",
            ContainerStatus::Paused => "Paused",
            ContainerStatus::Restarting => "Restarting",
            ContainerStatus::Rebuilding => "Rebuilding",
            ContainerStatus::Deleting => "Deleting",
            ContainerStatus::Deleted => "Deleted",
            ContainerStatus::Error => "Error",
            ContainerStatus::Unknown => "Unknown",
            ContainerStatus::Other(s) => s,
        }
    }
}

impl From<&str> for ContainerStatus {
    fn from(s: &str) -> Self {
        match s {
            "Creating" => ContainerStatus::Creating,
            "Created" => ContainerStatus::Created,
            "Running" => ContainerStatus::Running,
            "Stopped" => ContainerStatus::Stopped,
            "Paused" => ContainerStatus::Paused,
            "Restarting" => ContainerStatus::Restarting,
            "Rebuilding" => ContainerStatus::Rebuilding,
            "Deleting" => ContainerStatus::Deleting,
            "Deleted" => ContainerStatus::Deleted,
            "Error" => ContainerStatus::Error,
            "Unknown" => ContainerStatus::Unknown,
            other => ContainerStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a network interface attachment.
///
/// The API has no status field for interfaces; these values are derived from
/// whether the port shows up in the container's network list and from the
/// outcome of detach requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceStatus {
    Attaching,
    Attached,
    /// Detach requested or still in progress (no status reported yet).
    Detaching,
    Detached,
}

impl fmt::Display for InterfaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InterfaceStatus::Attaching => "ATTACHING",
            InterfaceStatus::Attached => "ATTACHED",
            InterfaceStatus::Detaching => "DETACHING",
            InterfaceStatus::Detached => "DETACHED",
        })
    }
}

/// Pending and target status sets for one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Convergence<S> {
    pub pending: Vec<S>,
    pub target: Vec<S>,
}

/// Container operations that wait for convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerOp {
    Create,
    Delete,
}

impl ContainerOp {
    pub fn convergence(self) -> Convergence<ContainerStatus> {
        use ContainerStatus::*;
        match self {
            ContainerOp::Create => Convergence {
                pending: vec![Creating],
                target: vec![Created],
            },
            // A container that settles in Error has failed to delete.
            ContainerOp::Delete => Convergence {
                pending: vec![
                    Creating, Created, Running, Stopped, Paused, Restarting, Rebuilding,
                    Deleting, Unknown,
                ],
                target: vec![Deleted],
            },
        }
    }
}

/// Interface operations that wait for convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceOp {
    Attach,
    Detach,
}

impl InterfaceOp {
    pub fn convergence(self) -> Convergence<InterfaceStatus> {
        match self {
            InterfaceOp::Attach => Convergence {
                pending: vec![InterfaceStatus::Attaching],
                target: vec![InterfaceStatus::Attached],
            },
            InterfaceOp::Detach => Convergence {
                pending: vec![InterfaceStatus::Detaching],
                target: vec![InterfaceStatus::Detached],
            },
        }
    }
}
