//! Outrigger core
//!
//! Plugin registry and lifecycle management: installable plugin records,
//! a durably persisted registry under the plugins root, gated
//! install/activate/uninstall transitions, and safe asset path resolution
//! for untrusted consumers.

pub mod assets;
pub mod error;
pub mod fetcher;
pub mod lifecycle;
pub mod manifest;
pub mod paths;
pub mod record;
pub mod registry;
pub mod traits;

pub use assets::AssetGateway;
pub use error::PluginError;
pub use fetcher::DirectoryFetcher;
pub use lifecycle::{InstallOptions, LifecycleEngine};
pub use manifest::PackageManifest;
pub use record::PluginRecord;
pub use registry::{RegistryStore, REGISTRY_FILE_NAME};
pub use traits::{FetchedPackage, InstallConfirmer, PackageFetcher, StaticConfirmer};
