//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → GATEWAY_* environment overrides
//!     → command-line flags (main.rs)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, ArtifactConfig, BackendConfig, DispatchConfig, GatewayConfig, HealthCheckConfig,
    ListenerConfig, ObservabilityConfig, PolicyKind, TrackerConfig,
};
pub use validation::{validate_config, ValidationError};
