pub mod client;
pub mod error;
pub mod format;
pub mod model;
pub mod publisher;
pub mod role;

pub use client::DiscordClient;
pub use error::DiscordError;
pub use publisher::DiscordPublisher;
pub use role::{GradeRoles, RoleChange};
