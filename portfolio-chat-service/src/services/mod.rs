pub mod chat;
pub mod metrics;
pub mod providers;
pub mod resolver;

pub use chat::{ChatError, ChatService, ChatSettings};
pub use resolver::{ModelResolver, ResolverSettings};
