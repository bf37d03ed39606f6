pub mod fingerprint;
pub mod loader;

pub use fingerprint::{canonical_bytes, fingerprint};
pub use loader::{ArtifactDefinition, Definitions, IndexDefinition, Slot};
