use crate::errors::{FileOperation, IoError};
use miette::Diagnostic;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    #[error("I/O error within plan domain")]
    #[diagnostic(code(temple::plan::io))]
    Io(#[from] IoError),

    #[error("can't proceed, action would overwrite '{path}' and overwrite was not allowed")]
    #[diagnostic(
        code(temple::plan::conflict),
        help("Pass --overwrite to replace existing files in the destination")
    )]
    Conflict { path: PathBuf },

    #[error("'{path}' is not relative to '{dir}'")]
    #[diagnostic(code(temple::plan::strip_prefix))]
    StripPrefix {
        path: PathBuf,
        dir: PathBuf,
        source: std::path::StripPrefixError,
    },
}

/// A template file and the place its rendering goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// The destination already existed when the plan was built.
    pub overwrites: bool,
}

/// The validated list of files to render, computed before anything is written.
///
/// Directories are not part of the plan, the renderer creates them as needed.
#[derive(Debug, Clone)]
pub struct Plan {
    pub destination_root: PathBuf,
    pub entries: Vec<PlanEntry>,
}
impl Plan {
    /// Recursively walks `source_root` and maps every file onto `destination_root`.
    ///
    /// # Errors
    ///
    /// The walk stops at the first problem and no plan is returned:
    ///
    /// - [`PlanError::Conflict`] if a destination exists and `overwrite` is false.
    /// - [`PlanError::Io`] if a directory can't be walked or a destination can't be inspected.
    pub fn build(
        source_root: &Path,
        destination_root: &Path,
        overwrite: bool,
    ) -> Result<Self, PlanError> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(source_root).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(error) => {
                    let path = error.path().unwrap_or(source_root).to_path_buf();

                    Err(IoError::new(FileOperation::Walk, path, error.into()))?
                }
            };

            if !is_template_file(&entry) {
                continue;
            }

            let source = entry.path();
            let relative = source
                .strip_prefix(source_root)
                .map_err(|error| PlanError::StripPrefix {
                    path: source.to_path_buf(),
                    dir: source_root.to_path_buf(),
                    source: error,
                })?;

            let destination = destination_root.join(relative);

            let overwrites = destination_exists(&destination)?;
            if overwrites {
                if !overwrite {
                    return Err(PlanError::Conflict { path: destination });
                }
                log::debug!("will overwrite {:?}", destination);
            }

            entries.push(PlanEntry {
                source: source.to_path_buf(),
                destination,
                overwrites,
            });
        }

        Ok(Self {
            destination_root: destination_root.to_path_buf(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Regular files, and symlinks that resolve to one.
fn is_template_file(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();

    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

fn destination_exists(path: &Path) -> Result<bool, PlanError> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(IoError::new(FileOperation::Stat, path.to_path_buf(), error).into()),
    }
}
