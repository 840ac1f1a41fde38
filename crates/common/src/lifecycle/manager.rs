//! Status and health types shared by long-running components

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::SystemTime;

/// Lifecycle status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerStatus {
    /// Created but not started
    Created,
    /// Start in progress
    Starting,
    /// Running and operational
    Running,
    /// Shutdown in progress
    ShuttingDown,
    /// Shut down; no further work is accepted
    Shutdown,
    /// Start failed or the component hit an unrecoverable error
    Error,
}

impl ManagerStatus {
    fn as_u8(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::ShuttingDown => 3,
            Self::Shutdown => 4,
            Self::Error => 5,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::ShuttingDown,
            4 => Self::Shutdown,
            _ => Self::Error,
        }
    }

    /// Whether the component has begun or finished shutting down
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Shutdown)
    }
}

impl fmt::Display for ManagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::ShuttingDown => write!(f, "Shutting Down"),
            Self::Shutdown => write!(f, "Shutdown"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Lock-free holder for a [`ManagerStatus`]
#[derive(Debug)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new(status: ManagerStatus) -> Self {
        Self(AtomicU8::new(status.as_u8()))
    }

    pub fn get(&self) -> ManagerStatus {
        ManagerStatus::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, status: ManagerStatus) {
        self.0.store(status.as_u8(), Ordering::SeqCst);
    }

    /// Move from `from` to `to`; returns false if the status was not `from`.
    pub fn transition(&self, from: ManagerStatus, to: ManagerStatus) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new(ManagerStatus::Created)
    }
}

/// Health report of a component and its parts
#[derive(Debug, Clone)]
pub struct ManagerHealth {
    /// Overall health status
    pub is_healthy: bool,
    /// Health score from 0.0 (unhealthy) to 1.0 (perfectly healthy)
    pub score: f64,
    /// Optional health message
    pub message: Option<String>,
    /// Individual component health checks
    pub components: Vec<ComponentHealth>,
    /// Timestamp of health check
    pub timestamp: SystemTime,
}

impl ManagerHealth {
    /// Create a healthy status
    pub fn healthy() -> Self {
        Self {
            is_healthy: true,
            score: 1.0,
            message: None,
            components: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// Create an unhealthy status with a message
    pub fn unhealthy<S: Into<String>>(message: S) -> Self {
        Self {
            is_healthy: false,
            score: 0.0,
            message: Some(message.into()),
            components: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// Create a degraded status with a score
    pub fn degraded<S: Into<String>>(score: f64, message: S) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            is_healthy: score > 0.5,
            score,
            message: Some(message.into()),
            components: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// Aggregate component checks; the score is the healthy fraction.
    ///
    /// An empty component list is healthy.
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        if components.is_empty() {
            return Self::healthy();
        }
        let healthy = components.iter().filter(|c| c.is_healthy).count();
        let score = healthy as f64 / components.len() as f64;
        let message = components
            .iter()
            .filter(|c| !c.is_healthy)
            .map(|c| match &c.message {
                Some(message) => format!("{}: {}", c.name, message),
                None => c.name.clone(),
            })
            .collect::<Vec<_>>();

        Self {
            is_healthy: healthy == components.len(),
            score,
            message: if message.is_empty() { None } else { Some(message.join("; ")) },
            components,
            timestamp: SystemTime::now(),
        }
    }

    /// Add a component health check
    pub fn with_component(mut self, component: ComponentHealth) -> Self {
        if !component.is_healthy {
            self.is_healthy = false;
        }
        self.components.push(component);
        self
    }
}

/// Individual component health within a manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentHealth {
    pub name: String,
    pub is_healthy: bool,
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), is_healthy: true, message: None }
    }

    pub fn unhealthy<S: Into<String>, M: Into<String>>(name: S, message: M) -> Self {
        Self { name: name.into(), is_healthy: false, message: Some(message.into()) }
    }
}
