//! Startup wiring for the `keel` binary: layered settings and the sign-in
//! provider registry built from them.

pub mod providers;
pub mod settings;

pub use providers::{EnabledProvider, ProviderError, enabled_providers};
pub use settings::Settings;
