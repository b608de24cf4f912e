use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::host::Host;

/// Mod metadata fields that may be a single string or a list in the wild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrVec {
    String(String),
    Vec(Vec<String>),
}

impl StringOrVec {
    pub fn joined(&self, sep: &str) -> String {
        match self {
            StringOrVec::String(s) => s.clone(),
            StringOrVec::Vec(v) => v.join(sep),
        }
    }
}

/// Parsed `modinfo.json` entry as the host reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModInfo {
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub ident: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub authors: Option<StringOrVec>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub dependencies: Option<StringOrVec>,
    pub maintainers: Option<StringOrVec>,
    pub version: Option<String>,
}

impl ModInfo {
    /// Display name, falling back through the identifier fields.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .or(self.ident.as_deref())
            .unwrap_or("(unnamed)")
    }
}

/// Version-control state of a mod directory, present once section management
/// has begun.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalVersion {
    pub branch_name: String,
    pub last_commit_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mod {
    pub info: ModInfo,
    pub local_version: Option<LocalVersion>,
    pub is_installed: bool,
    pub local_path: String,
}

impl Mod {
    pub fn local_path(&self) -> &Path {
        Path::new(&self.local_path)
    }

    /// Directory name the install link is created under.
    fn link_name(&self) -> Result<&str, String> {
        self.local_path()
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("mod path has no directory name: {}", self.local_path))
    }
}

/// One column of the catalog grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub id: &'static str,
    pub header: &'static str,
    pub resizable: bool,
}

/// Fixed column set: row index, name, description, section management,
/// install status.
pub fn catalog_columns() -> [ColumnDef; 5] {
    [
        ColumnDef { id: "index", header: "#", resizable: false },
        ColumnDef { id: "name", header: "Name", resizable: true },
        ColumnDef { id: "description", header: "Description", resizable: true },
        ColumnDef { id: "section", header: "Section", resizable: true },
        ColumnDef { id: "status", header: "Status", resizable: false },
    ]
}

/// Client-side state behind the mod grid.
///
/// Holds the scanned rows plus the two directories every action needs: where
/// mod sources live and where the game loads installed mods from. Each in-cell
/// action performs its host call and then re-scans, so the grid always renders
/// host truth rather than an optimistic local edit.
pub struct ModCatalog {
    source_dir: PathBuf,
    target_dir: PathBuf,
    mods: Vec<Mod>,
}

impl ModCatalog {
    pub fn new(source_dir: PathBuf, target_dir: PathBuf) -> Self {
        Self {
            source_dir,
            target_dir,
            mods: Vec::new(),
        }
    }

    pub fn mods(&self) -> &[Mod] {
        &self.mods
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    fn row(&self, row: usize) -> Result<&Mod, String> {
        self.mods
            .get(row)
            .ok_or_else(|| format!("row {} out of range ({} mods)", row, self.mods.len()))
    }

    pub fn refresh(&mut self, host: &dyn Host) -> Result<(), String> {
        self.mods = host.scan_mods(&self.source_dir, &self.target_dir)?;
        log::debug!("scanned {} mods", self.mods.len());
        Ok(())
    }

    /// Install or uninstall the row's mod by creating or removing its link
    /// under the game's mods directory.
    pub fn toggle_installed(&mut self, host: &dyn Host, row: usize) -> Result<(), String> {
        let target = {
            let m = self.row(row)?;
            let link = self.target_dir.join(m.link_name()?);
            if m.is_installed {
                host.remove_symlink(&link)?;
            } else {
                host.create_symlink(m.local_path(), &link)?;
            }
            link
        };
        log::info!("toggled install link {}", target.to_string_lossy());
        self.refresh(host)
    }

    /// Put the row's mod under version control so branch-based sections can be
    /// tracked from then on.
    pub fn start_section_management(&mut self, host: &dyn Host, row: usize) -> Result<(), String> {
        host.git_init(self.row(row)?.local_path())?;
        self.refresh(host)
    }

    pub fn list_branches(&self, host: &dyn Host, row: usize) -> Result<Vec<String>, String> {
        host.git_list_branches(self.row(row)?.local_path())
    }

    pub fn switch_branch(&mut self, host: &dyn Host, row: usize, branch: &str) -> Result<(), String> {
        host.git_checkout(self.row(row)?.local_path(), branch, false)?;
        self.refresh(host)
    }

    pub fn create_branch(&mut self, host: &dyn Host, row: usize, branch: &str) -> Result<(), String> {
        host.git_checkout(self.row(row)?.local_path(), branch, true)?;
        self.refresh(host)
    }

    pub fn commit_changes(&mut self, host: &dyn Host, row: usize) -> Result<(), String> {
        host.git_commit_changes(self.row(row)?.local_path())?;
        self.refresh(host)
    }

    pub fn discard_changes(&mut self, host: &dyn Host, row: usize) -> Result<(), String> {
        host.git_reset_changes(self.row(row)?.local_path())?;
        self.refresh(host)
    }

    /// Reveal the row's directory in the platform file manager.
    pub fn open_locally(&self, host: &dyn Host, row: usize) -> Result<(), String> {
        host.open_dir(self.row(row)?.local_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::RecordingHost;

    fn sample_mod(name: &str, installed: bool) -> Mod {
        Mod {
            info: ModInfo {
                type_name: Some("MOD_INFO".to_string()),
                ident: Some(name.to_lowercase()),
                id: None,
                name: Some(name.to_string()),
                authors: Some(StringOrVec::Vec(vec!["a".into(), "b".into()])),
                description: Some(format!("{} description", name)),
                category: None,
                dependencies: Some(StringOrVec::String("dda".to_string())),
                maintainers: None,
                version: None,
            },
            local_version: None,
            is_installed: installed,
            local_path: format!("/data/moddata/{}", name),
        }
    }

    fn catalog() -> ModCatalog {
        ModCatalog::new(PathBuf::from("/data/moddata"), PathBuf::from("/game/mods"))
    }

    #[test]
    fn refresh_replaces_rows_from_host_scan() {
        let host = RecordingHost::with_mods(vec![sample_mod("Alpha", false), sample_mod("Beta", true)]);
        let mut cat = catalog();
        assert!(cat.is_empty());
        cat.refresh(&host).unwrap();
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.mods()[0].info.display_name(), "Alpha");
        assert_eq!(host.recorded(), ["scan_mods /data/moddata /game/mods"]);
    }

    #[test]
    fn toggle_creates_link_for_uninstalled_mod_then_rescans() {
        let host = RecordingHost::with_mods(vec![sample_mod("Alpha", false)]);
        let mut cat = catalog();
        cat.refresh(&host).unwrap();
        cat.toggle_installed(&host, 0).unwrap();
        assert_eq!(
            host.recorded(),
            [
                "scan_mods /data/moddata /game/mods",
                "create_symlink /data/moddata/Alpha /game/mods/Alpha",
                "scan_mods /data/moddata /game/mods",
            ]
        );
    }

    #[test]
    fn toggle_removes_link_for_installed_mod() {
        let host = RecordingHost::with_mods(vec![sample_mod("Alpha", true)]);
        let mut cat = catalog();
        cat.refresh(&host).unwrap();
        cat.toggle_installed(&host, 0).unwrap();
        assert!(host
            .recorded()
            .contains(&"remove_symlink /game/mods/Alpha".to_string()));
    }

    #[test]
    fn section_management_inits_a_repository() {
        let host = RecordingHost::with_mods(vec![sample_mod("Alpha", false)]);
        let mut cat = catalog();
        cat.refresh(&host).unwrap();
        cat.start_section_management(&host, 0).unwrap();
        assert!(host
            .recorded()
            .contains(&"git_init /data/moddata/Alpha".to_string()));
    }

    #[test]
    fn branch_operations_use_the_create_flag() {
        let host = RecordingHost::with_mods(vec![sample_mod("Alpha", false)]);
        *host.branches.lock().unwrap() = vec!["master".to_string()];
        let mut cat = catalog();
        cat.refresh(&host).unwrap();

        assert_eq!(cat.list_branches(&host, 0).unwrap(), ["master"]);
        cat.create_branch(&host, 0, "spring-build").unwrap();
        cat.switch_branch(&host, 0, "master").unwrap();

        let calls = host.recorded();
        assert!(calls.contains(&"git_checkout /data/moddata/Alpha spring-build create=true".to_string()));
        assert!(calls.contains(&"git_checkout /data/moddata/Alpha master create=false".to_string()));
        assert_eq!(cat.list_branches(&host, 0).unwrap(), ["master", "spring-build"]);
    }

    #[test]
    fn out_of_range_rows_are_reported_not_panicked() {
        let host = RecordingHost::new();
        let mut cat = catalog();
        let err = cat.toggle_installed(&host, 3).unwrap_err();
        assert!(err.contains("row 3 out of range"));
        assert!(host.recorded().is_empty());
    }

    #[test]
    fn host_failures_propagate() {
        let host = RecordingHost::with_mods(vec![sample_mod("Alpha", false)]);
        let mut cat = catalog();
        cat.refresh(&host).unwrap();
        *host.fail_with.lock().unwrap() = Some("permission denied".to_string());
        let err = cat.toggle_installed(&host, 0).unwrap_err();
        assert_eq!(err, "permission denied");
    }

    #[test]
    fn string_or_vec_accepts_both_shapes() {
        let single: StringOrVec = serde_json::from_str("\"Kevin\"").unwrap();
        let many: StringOrVec = serde_json::from_str("[\"Kevin\", \"mlangsdorf\"]").unwrap();
        assert_eq!(single.joined(", "), "Kevin");
        assert_eq!(many.joined(", "), "Kevin, mlangsdorf");
    }

    #[test]
    fn columns_are_stable() {
        let cols = catalog_columns();
        let ids: Vec<&str> = cols.iter().map(|c| c.id).collect();
        assert_eq!(ids, ["index", "name", "description", "section", "status"]);
        assert!(!cols[0].resizable);
        assert!(cols[1].resizable);
    }
}
