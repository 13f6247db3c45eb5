//! Application layer - use cases behind the CLI commands.
//!
//! Each use case borrows the collaborators it needs and turns a package
//! argument into calls on the release and manifest layers.

mod install;
mod list;
mod uninstall;

pub use install::{InstallOutcome, InstallUseCase};
pub use list::ListUseCase;
pub use uninstall::UninstallUseCase;
