//! Fan-out of notifications to the configured channels.
//!
//! The host builds one [`NotificationManager`] at startup. The manager asks the
//! [`ChannelFactories`] for every enabled channel kind, in a fixed priority
//! order, and from then on forwards each message to all of them.
pub mod error;
pub mod manager;
pub mod registry;

pub use error::{BoxError, NotifyError};
pub use manager::{ManagerState, NotificationManager, NotificationManagerBuilder};
pub use registry::{ChannelFactories, ChannelFactory, ChannelFuture};
