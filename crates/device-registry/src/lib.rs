//! device-registry: comma-separated registry of telemetry devices
//!
//! A registry lists one device per line as `id,device_address[,device_eui]`, with a
//! header row naming those columns. Fields are split strictly on `,`; there is no
//! quoting or escaping.

mod types;
pub use types::{EnrichmentVariant, RegistryRecord, HEADER_SENTINEL};

mod error;
pub use error::{RegistryError, Result};

mod loader;
pub use loader::{load_registry, open_registry, RegistryReader};
