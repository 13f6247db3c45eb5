//! Releases of a package: identity, downloaded archives and their install state.

mod asset;
mod version;

pub use asset::ReleaseAsset;
pub use version::{LATEST, ReleaseVersion};
