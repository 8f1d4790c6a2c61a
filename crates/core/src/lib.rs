pub mod config;
pub mod error;
pub mod export;
pub mod intent;
pub mod lock;
pub mod models;
pub mod policy;
pub mod prompt;
pub mod reply;
pub mod spatial;

pub use config::{ClassifierKind, Settings};
pub use error::{ConfigError, IntentError, LookupError, PolicyViolation, ProviderError, ValidationError};
pub use intent::{ClassifiedIntent, Intent};
pub use models::*;
pub use policy::MapPolicy;
pub use spatial::MapDefaults;
