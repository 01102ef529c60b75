//! Web app manifests
//!
//! Manifest-scheme deployments name each partition after the `short_name`
//! of a manifest listed in a shared manifest-list index.

pub mod descriptor;
pub mod registry;

pub use descriptor::{parse_manifest_list, ManifestDescriptor, ManifestIcon};
pub use registry::{EntrySource, Registry, RegistryEntry};
