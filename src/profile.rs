use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::host::Host;
use crate::mods::Mod;

/// Application data root, resolved per platform.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cata-launcher")
}

fn profile_dir(dir_name: &str) -> PathBuf {
    app_data_dir().join("profiles").join(dir_name)
}

/// Per-profile user data layout mirrored from the game's own directory names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataPaths {
    pub root: PathBuf,
    pub mods: PathBuf,
    pub config: PathBuf,
    pub font: PathBuf,
    pub save: PathBuf,
    pub sound: PathBuf,
    pub gfx: PathBuf,
}

impl UserDataPaths {
    pub fn new(root: PathBuf) -> Self {
        Self {
            mods: root.join("mods"),
            config: root.join("config"),
            font: root.join("font"),
            save: root.join("save"),
            sound: root.join("sound"),
            gfx: root.join("gfx"),
            root,
        }
    }
}

/// Accepted game executable names per platform build.
pub fn is_game_executable(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(std::ffi::OsStr::to_str),
        Some("cataclysm-tiles.exe" | "Cataclysm.app")
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub game_path: Option<PathBuf>,
    pub profile_path: UserDataPaths,
    /// Snapshot of the catalog as this profile last saw it; branches recorded
    /// here are re-applied when the profile becomes active.
    pub mod_status: Vec<Mod>,
    pub is_active: bool,
}

impl Profile {
    pub fn new(id: String, name: String, game_path: Option<PathBuf>) -> Self {
        let dir_name = format!("{}_{}", name, id);
        Self {
            id,
            name,
            game_path,
            profile_path: UserDataPaths::new(profile_dir(&dir_name)),
            mod_status: Vec::new(),
            is_active: false,
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        let mut default = Profile::new("default".to_string(), "default".to_string(), None);
        default.is_active = true;
        default
    }
}

/// Launcher settings the renderer binds to. Persistence belongs to the host;
/// this is the in-memory truth while the launcher runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub language: String,
    pub mod_data_path: PathBuf,
    pub profiles: Vec<Profile>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "ja".into(),
            mod_data_path: app_data_dir().join("moddata"),
            profiles: vec![Profile::default()],
        }
    }
}

impl Settings {
    pub fn set_language(&mut self, lang: &str) {
        self.language = lang.to_string();
    }

    /// Register a profile and make it active.
    ///
    /// A provided game path must point at a known game executable name.
    pub fn add_profile(&mut self, profile: Profile, host: &dyn Host) -> Result<(), String> {
        if let Some(path) = &profile.game_path {
            if !is_game_executable(path) {
                return Err(format!("invalid game path: {}", path.to_string_lossy()));
            }
        }
        let id = profile.id.clone();
        self.profiles.push(profile);
        self.set_active_profile(&id, host)
    }

    /// Remove a profile. Removing the active one falls back to `default`.
    pub fn remove_profile(&mut self, profile_id: &str, host: &dyn Host) -> Result<(), String> {
        if self.get_active_profile().id == profile_id {
            self.set_active_profile("default", host)?;
        }
        if let Some(index) = self.profiles.iter().position(|p| p.id == profile_id) {
            let removed = self.profiles.remove(index);
            log::debug!("removed profile {} ({})", removed.name, removed.id);
        }
        Ok(())
    }

    /// Rename a profile and/or change its game path. Renaming relocates the
    /// profile's user data root.
    pub fn edit_profile(
        &mut self,
        profile_id: &str,
        name: &str,
        game_path: Option<PathBuf>,
    ) -> Result<(), String> {
        let profile = self
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id)
            .ok_or_else(|| format!("no such profile: {}", profile_id))?;
        if profile.name != name {
            let dir_name = format!("{}_{}", name, profile.id);
            profile.profile_path = UserDataPaths::new(profile_dir(&dir_name));
            profile.name = name.to_string();
        }
        profile.game_path = game_path;
        Ok(())
    }

    /// Activate a profile and re-apply its recorded mod branches.
    ///
    /// A branch that no longer exists is skipped with a debug note rather than
    /// failing the switch; the host may have pruned it since the snapshot.
    pub fn set_active_profile(&mut self, profile_id: &str, host: &dyn Host) -> Result<(), String> {
        self.profiles
            .iter_mut()
            .for_each(|p| p.is_active = p.id == profile_id);
        let target = self.get_active_profile();
        for m in target.mod_status.iter().filter(|m| m.is_installed) {
            if let Some(local_version) = &m.local_version {
                if let Err(e) =
                    host.git_checkout(m.local_path(), &local_version.branch_name, false)
                {
                    log::debug!(
                        "skipping branch {} for {}: {}",
                        local_version.branch_name,
                        m.local_path,
                        e
                    );
                }
            }
        }
        Ok(())
    }

    /// The active profile, or the built-in default when none is flagged.
    pub fn get_active_profile(&self) -> Profile {
        self.profiles
            .iter()
            .find(|p| p.is_active)
            .cloned()
            .unwrap_or_else(|| {
                log::warn!("active profile not found, using default");
                Profile::default()
            })
    }

    /// Record a fresh catalog snapshot on the active profile.
    pub fn update_mod_status(&mut self, mods: &[Mod]) {
        let active_id = self.get_active_profile().id;
        for p in self.profiles.iter_mut() {
            if p.id == active_id {
                p.mod_status = mods.to_vec();
            }
        }
    }

    /// Where the game loads installed mods from for the active profile.
    pub fn game_mod_dir(&self) -> PathBuf {
        self.get_active_profile().profile_path.mods
    }
}
