use std::path::Path;

use crate::mods::Mod;

/// Boundary to the external host process that owns every file-system, process
/// and version-control operation.
///
/// The library never touches the disk itself; the embedding application wires
/// this trait to its command transport. Every method returns a human-readable
/// error string, matching what the command layer relays from the host.
pub trait Host: Send + Sync {
    /// Enumerate mods under `source_dir`, marking each as installed when a
    /// link for it exists under `target_dir`.
    fn scan_mods(&self, source_dir: &Path, target_dir: &Path) -> Result<Vec<Mod>, String>;

    /// Install a mod by linking its directory into the game's mods directory.
    fn create_symlink(&self, source: &Path, target: &Path) -> Result<(), String>;

    /// Uninstall a mod by removing its link. The source directory is kept.
    fn remove_symlink(&self, target: &Path) -> Result<(), String>;

    /// Put a mod directory under version control. Begins section tracking.
    fn git_init(&self, target_dir: &Path) -> Result<(), String>;

    fn git_commit_changes(&self, target_dir: &Path) -> Result<(), String>;

    fn git_reset_changes(&self, target_dir: &Path) -> Result<(), String>;

    fn git_list_branches(&self, target_dir: &Path) -> Result<Vec<String>, String>;

    /// Switch `target_dir` to `branch`, creating it first when
    /// `create_if_unexist` is set.
    fn git_checkout(
        &self,
        target_dir: &Path,
        branch: &str,
        create_if_unexist: bool,
    ) -> Result<(), String>;

    /// Reveal a directory in the platform file manager.
    fn open_dir(&self, path: &Path) -> Result<(), String>;
}
