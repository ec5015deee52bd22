//! Hydronet Foundation
//!
//! Identifiers and small value types shared by every hydronet crate.
//! Nothing in here knows how a network is simulated; it only names things.

pub mod deploy;
pub mod ids;
pub mod series;
pub mod window;

pub use deploy::DeployMode;
pub use ids::{Device, DeviceKind, ElementId, NodeId};
pub use series::same_values;
pub use window::IndexWindow;
