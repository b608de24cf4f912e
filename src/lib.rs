//! Client-side state layer for a moddable-game desktop launcher.
//!
//! The embedding application owns the window and an external host process
//! that does all file-system, process, network and version-control work
//! (see [`host::Host`]). This crate owns everything in between: the
//! download-then-extract progress control ([`progress`], [`driver`]), the
//! mod catalog ([`mods`]), profiles ([`profile`]), the release browser
//! ([`releases`]) and the game install flow ([`installer`]).

pub mod driver;
pub mod host;
pub mod installer;
pub mod logger;
pub mod mods;
pub mod profile;
pub mod progress;
pub mod releases;

pub use driver::{DriverCallbacks, ProgressDriver, ProgressMode, ProgressOptions};
pub use host::Host;
pub use installer::GameInstall;
pub use mods::{Mod, ModCatalog, ModInfo};
pub use profile::{Profile, Settings};
pub use progress::{Phase, ProgressContext, ProgressMachine, Visual};
pub use releases::{ReleaseFeed, ReleaseInfo};
