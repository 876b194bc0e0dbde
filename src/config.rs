use crate::vars::{Vars, VarsError};
use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

/// Settings for rendering a single template.
#[derive(Debug, Clone)]
pub struct FileConfig {
    pub vars: Vars,
    /// Read from standard input when `None`.
    pub src: Option<PathBuf>,
    /// Write to standard output when `None`.
    pub dst: Option<PathBuf>,
}

/// Settings for rendering a whole tree of templates.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub vars: Vars,
    pub src: PathBuf,
    pub dst: PathBuf,
    pub overwrite: bool,
    /// Upper bound on files rendered at the same time.
    pub jobs: NonZeroUsize,
    /// Validate and preview the plan without writing anything.
    pub dry_run: bool,
}
impl TreeConfig {
    pub fn new(vars: Vars, src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Self {
        Self {
            vars,
            src: src.into(),
            dst: dst.into(),
            overwrite: false,
            jobs: default_jobs(),
            dry_run: false,
        }
    }
}

/// One job per available processing unit.
pub fn default_jobs() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Builds the variable mapping from `--var` flags and an optional vars file.
pub fn load_vars<S: AsRef<str>>(
    raw_vars: &[S],
    vars_file: Option<&Path>,
) -> Result<Vars, VarsError> {
    let vars = Vars::parse(raw_vars)?;

    match vars_file {
        Some(path) => vars.merge(Vars::from_file(path)?),
        None => Ok(vars),
    }
}
