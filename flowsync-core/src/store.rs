//! Local file-backed store for projects, flows and release files.
//!
//! # Storage layout
//!
//! ```text
//! ~/.flowsync/
//!   projects/
//!     <project_id>/
//!       project.yaml          (project record incl. mapping, mode 0600)
//!       flows/<flow_id>.json  (one FlowState per flow)
//!       files/<file_id>.yaml  (file metadata)
//!       files/<file_id>.bin   (file payload, stored as-is)
//!       .apply.lock           (present while an apply holds the project)
//! ```
//!
//! # API pattern
//!
//! Every function takes an explicit `home: &Path` and carries the `_at`
//! suffix; [`home`] resolves the default one. Tests always pass a `TempDir`.
//!
//! Writes go to a `.tmp` sibling which is then renamed over the target.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{io_err, StoreError};
use crate::mapping::ProjectMappingState;
use crate::types::{FileId, FileRecord, FlowId, FlowState, Project, ProjectId};

/// Environment variable overriding the home directory used by [`home`].
pub const HOME_ENV: &str = "FLOWSYNC_HOME";

// ---------------------------------------------------------------------------
// 1. Path helpers (pure, no I/O)
// ---------------------------------------------------------------------------

/// `<home>/.flowsync/projects/`
pub fn projects_root_at(home: &Path) -> PathBuf {
    home.join(".flowsync").join("projects")
}

/// `<home>/.flowsync/projects/<project>/`
pub fn project_dir_at(home: &Path, project: &ProjectId) -> PathBuf {
    projects_root_at(home).join(&project.0)
}

/// `<home>/.flowsync/projects/<project>/project.yaml`
pub fn project_path_at(home: &Path, project: &ProjectId) -> PathBuf {
    project_dir_at(home, project).join("project.yaml")
}

/// `<home>/.flowsync/projects/<project>/flows/<flow>.json`
pub fn flow_path_at(home: &Path, project: &ProjectId, flow: &FlowId) -> PathBuf {
    project_dir_at(home, project)
        .join("flows")
        .join(format!("{}.json", flow.0))
}

fn file_meta_path_at(home: &Path, project: &ProjectId, file: &FileId) -> PathBuf {
    project_dir_at(home, project)
        .join("files")
        .join(format!("{}.yaml", file.0))
}

fn file_data_path_at(home: &Path, project: &ProjectId, file: &FileId) -> PathBuf {
    project_dir_at(home, project)
        .join("files")
        .join(format!("{}.bin", file.0))
}

/// `<home>/.flowsync/projects/<project>/.apply.lock`
pub fn lock_path_at(home: &Path, project: &ProjectId) -> PathBuf {
    project_dir_at(home, project).join(".apply.lock")
}

// ---------------------------------------------------------------------------
// 2. Projects
// ---------------------------------------------------------------------------

/// Create the project record for `id`.
///
/// Idempotent: if the project already exists it is loaded and returned
/// unchanged.
pub fn init_project_at(
    home: &Path,
    id: ProjectId,
    display_name: &str,
) -> Result<Project, StoreError> {
    check_segment(&id.0)?;
    if project_path_at(home, &id).exists() {
        return load_project_at(home, &id);
    }
    let project = Project::new(id, display_name);
    save_project_at(home, &project)?;
    Ok(project)
}

/// Load a project record.
///
/// Returns [`StoreError::ProjectNotFound`] if absent and
/// [`StoreError::Parse`] if the YAML is malformed.
pub fn load_project_at(home: &Path, id: &ProjectId) -> Result<Project, StoreError> {
    let path = project_path_at(home, id);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(StoreError::ProjectNotFound { id: id.0.clone() })
        }
        Err(err) => return Err(io_err(&path, err)),
    };
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse {
        path,
        message: e.to_string(),
    })
}

/// Atomically write a project record.
pub fn save_project_at(home: &Path, project: &Project) -> Result<(), StoreError> {
    check_segment(&project.id.0)?;
    let yaml = serde_yaml::to_string(project)?;
    write_atomic(&project_path_at(home, &project.id), yaml.as_bytes())
}

/// Replace the project's mapping wholesale and bump `updated_at`.
pub fn update_mapping_at(
    home: &Path,
    id: &ProjectId,
    mapping: ProjectMappingState,
) -> Result<Project, StoreError> {
    let mut project = load_project_at(home, id)?;
    project.mapping = Some(mapping);
    project.updated_at = Utc::now();
    save_project_at(home, &project)?;
    Ok(project)
}

/// All project ids with a record on disk, sorted.
pub fn list_projects_at(home: &Path) -> Result<Vec<ProjectId>, StoreError> {
    let root = projects_root_at(home);
    if !root.exists() {
        return Ok(vec![]);
    }
    let mut ids: Vec<ProjectId> = std::fs::read_dir(&root)
        .map_err(|e| io_err(&root, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().join("project.yaml").exists())
        .map(|e| ProjectId::from(e.file_name().to_string_lossy().into_owned()))
        .collect();
    ids.sort();
    Ok(ids)
}

// ---------------------------------------------------------------------------
// 3. Flows
// ---------------------------------------------------------------------------

/// All flows of a project, ordered by creation time then id.
pub fn list_flows_at(home: &Path, project: &ProjectId) -> Result<Vec<FlowState>, StoreError> {
    ensure_project(home, project)?;
    let dir = project_dir_at(home, project).join("flows");
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut flows = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        flows.push(read_flow(&path)?);
    }
    flows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(flows)
}

/// Load one flow; `Ok(None)` if it does not exist.
pub fn load_flow_at(
    home: &Path,
    project: &ProjectId,
    flow: &FlowId,
) -> Result<Option<FlowState>, StoreError> {
    ensure_project(home, project)?;
    check_segment(&flow.0)?;
    let path = flow_path_at(home, project, flow);
    if !path.exists() {
        return Ok(None);
    }
    read_flow(&path).map(Some)
}

/// Atomically write a flow into its project.
pub fn save_flow_at(home: &Path, flow: &FlowState) -> Result<(), StoreError> {
    ensure_project(home, &flow.project_id)?;
    check_segment(&flow.id.0)?;
    let json = serde_json::to_vec_pretty(flow)?;
    write_atomic(&flow_path_at(home, &flow.project_id, &flow.id), &json)
}

/// Delete a flow. Returns `false` if it was already absent.
pub fn delete_flow_at(home: &Path, project: &ProjectId, flow: &FlowId) -> Result<bool, StoreError> {
    ensure_project(home, project)?;
    check_segment(&flow.0)?;
    let path = flow_path_at(home, project, flow);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(&path, err)),
    }
}

fn read_flow(path: &Path) -> Result<FlowState, StoreError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// 4. Files
// ---------------------------------------------------------------------------

/// Store a file. The payload is written before its metadata so a reader
/// never sees metadata without data.
pub fn save_file_at(home: &Path, file: &FileRecord) -> Result<(), StoreError> {
    ensure_project(home, &file.project_id)?;
    check_segment(&file.id.0)?;
    write_atomic(&file_data_path_at(home, &file.project_id, &file.id), &file.data)?;
    let yaml = serde_yaml::to_string(file)?;
    write_atomic(
        &file_meta_path_at(home, &file.project_id, &file.id),
        yaml.as_bytes(),
    )
}

/// Load a file with its payload.
pub fn load_file_at(
    home: &Path,
    project: &ProjectId,
    file: &FileId,
) -> Result<FileRecord, StoreError> {
    ensure_project(home, project)?;
    check_segment(&file.0)?;
    let meta_path = file_meta_path_at(home, project, file);
    let meta = match std::fs::read_to_string(&meta_path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(StoreError::FileNotFound {
                project_id: project.0.clone(),
                file_id: file.0.clone(),
            })
        }
        Err(err) => return Err(io_err(&meta_path, err)),
    };
    let mut record: FileRecord = serde_yaml::from_str(&meta).map_err(|e| StoreError::Parse {
        path: meta_path,
        message: e.to_string(),
    })?;
    let data_path = file_data_path_at(home, project, file);
    record.data = std::fs::read(&data_path).map_err(|e| io_err(&data_path, e))?;
    Ok(record)
}

// ---------------------------------------------------------------------------
// 5. Apply lock
// ---------------------------------------------------------------------------

/// Exclusive per-project lock held for the duration of an apply.
///
/// The lock file records the holder's pid and is removed on drop. A process
/// killed while holding it leaves the file behind; [`StoreError::Locked`]
/// names the file so it can be removed by hand.
#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
}

impl ProjectLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Take the apply lock for `project`, failing with [`StoreError::Locked`] if
/// another holder exists.
pub fn lock_project_at(home: &Path, project: &ProjectId) -> Result<ProjectLock, StoreError> {
    ensure_project(home, project)?;
    let path = lock_path_at(home, project);
    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            let lock = ProjectLock { path };
            writeln!(file, "{}", std::process::id()).map_err(|e| io_err(&lock.path, e))?;
            Ok(lock)
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            let holder = std::fs::read_to_string(&path)
                .ok()
                .map(|pid| pid.trim().to_owned())
                .filter(|pid| !pid.is_empty());
            Err(StoreError::Locked { path, holder })
        }
        Err(err) => Err(io_err(&path, err)),
    }
}

// ---------------------------------------------------------------------------
// Home resolution
// ---------------------------------------------------------------------------

/// `$FLOWSYNC_HOME` if set, otherwise the user's home directory.
pub fn home() -> Result<PathBuf, StoreError> {
    if let Some(dir) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn ensure_project(home: &Path, project: &ProjectId) -> Result<(), StoreError> {
    check_segment(&project.0)?;
    if project_path_at(home, project).exists() {
        Ok(())
    } else {
        Err(StoreError::ProjectNotFound {
            id: project.0.clone(),
        })
    }
}

/// Ids become path segments; refuse anything that could escape the store.
fn check_segment(id: &str) -> Result<(), StoreError> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.starts_with('.');
    if bad {
        return Err(StoreError::InvalidId { id: id.to_owned() });
    }
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid store path")));
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
