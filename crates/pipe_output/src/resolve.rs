use std::{
    env,
    ffi::{OsStr, OsString},
    fs as std_fs,
    path::{Path, PathBuf},
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::ResolveError;

const PATH_ENV: &str = "PATH";

/// Resolves `name` the way a shell would locate a command.
///
/// Names containing a path separator are checked directly. Bare names are searched for in each
/// `PATH` entry in order, with an empty entry meaning the current directory. The first regular,
/// executable file wins.
pub fn resolve_executable(name: &str) -> Result<PathBuf, ResolveError> {
    let search_path = env::var_os(PATH_ENV).unwrap_or_default();
    resolve_in(name, &search_path)
}

pub(crate) fn resolve_in(name: &str, search_path: &OsStr) -> Result<PathBuf, ResolveError> {
    if name.is_empty() {
        return Err(ResolveError::EmptyPath);
    }

    if has_separator(name) {
        let path = PathBuf::from(name);
        ensure_executable(&path)?;
        return Ok(path);
    }

    for dir in env::split_paths(search_path) {
        let dir = if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir
        };
        for file_name in candidate_names(name) {
            let candidate = dir.join(file_name);
            if ensure_executable(&candidate).is_ok() {
                return Ok(candidate);
            }
        }
    }

    Err(ResolveError::NotFound {
        name: name.to_string(),
    })
}

fn has_separator(name: &str) -> bool {
    name.contains('/') || name.contains(std::path::MAIN_SEPARATOR)
}

#[cfg(not(windows))]
fn candidate_names(name: &str) -> Vec<OsString> {
    vec![OsString::from(name)]
}

#[cfg(windows)]
fn candidate_names(name: &str) -> Vec<OsString> {
    if Path::new(name).extension().is_some() {
        return vec![OsString::from(name)];
    }
    let exts = env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
    exts.split(';')
        .filter(|ext| !ext.is_empty())
        .map(|ext| OsString::from(format!("{name}{}", ext.to_ascii_lowercase())))
        .collect()
}

fn ensure_executable(path: &Path) -> Result<(), ResolveError> {
    let metadata = std_fs::metadata(path).map_err(|source| ResolveError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(ResolveError::NotFile {
            path: path.to_path_buf(),
        });
    }
    if !is_executable(&metadata) {
        return Err(ResolveError::NotExecutable {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn is_executable(metadata: &std_fs::Metadata) -> bool {
    #[cfg(unix)]
    {
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        // Windows has no executable bits; the PATHEXT match already happened.
        let _ = metadata;
        true
    }
}
