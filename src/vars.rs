use crate::errors::{FileOperation, IoError};
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tera::Context;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum VarsError {
    #[error("invalid key=value, need 2 parts but has {parts}: --var {raw:?}")]
    #[diagnostic(
        code(temple::vars::format),
        help("Variables are passed as `--var key=value`, with exactly one '='")
    )]
    Format { raw: String, parts: usize },

    #[error("duplicated key: {key:?} already has a value")]
    #[diagnostic(code(temple::vars::duplicate_key))]
    DuplicateKey { key: String },

    #[error("I/O error within vars domain")]
    #[diagnostic(code(temple::vars::io))]
    Io(#[from] IoError),

    #[error("Unable to parse vars file at '{path}': {source}")]
    #[diagnostic(
        code(temple::vars::parse_toml),
        help("A vars file is a toml table of string values, e.g. `name = \"value\"`")
    )]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// The variable mapping handed to every template render.
///
/// Built once per invocation and never mutated afterwards, so it can be
/// shared by reference across concurrent renders.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Vars(pub IndexMap<String, String>);
impl Vars {
    /// Parses a list of `key=value` strings.
    ///
    /// # Errors
    ///
    /// Returns [`VarsError::Format`] when a string does not split into exactly two parts
    /// on `=`, and [`VarsError::DuplicateKey`] when a key is given more than once.
    pub fn parse<S: AsRef<str>>(raw_vars: &[S]) -> Result<Self, VarsError> {
        let mut vars = IndexMap::with_capacity(raw_vars.len());

        for raw in raw_vars {
            let raw = raw.as_ref();
            let parts: Vec<&str> = raw.split('=').collect();

            let [key, value] = parts.as_slice() else {
                return Err(VarsError::Format {
                    raw: raw.to_string(),
                    parts: parts.len(),
                });
            };

            if vars.contains_key(*key) {
                return Err(VarsError::DuplicateKey {
                    key: key.to_string(),
                });
            }

            log::debug!("var {:?}={:?}", key, value);

            vars.insert(key.to_string(), value.to_string());
        }

        Ok(Self(vars))
    }

    /// Loads variables from a toml file whose top level is a table of strings.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VarsError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?;

        let parsed: Vars = toml::from_str(&content).map_err(|error| VarsError::ParseToml {
            path: path.to_path_buf(),
            source: error,
        })?;

        for (key, value) in &parsed.0 {
            log::debug!("var {:?}={:?} (from {})", key, value, path.display());
        }

        Ok(parsed)
    }

    /// Combines two mappings. Keys must not overlap.
    pub fn merge(mut self, other: Vars) -> Result<Self, VarsError> {
        for (key, value) in other.0 {
            if self.0.contains_key(&key) {
                return Err(VarsError::DuplicateKey { key });
            }
            self.0.insert(key, value);
        }

        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Makes a [`Context`] object, hydrated with every variable.
    pub fn to_context(&self) -> Context {
        let mut ctx = Context::new();
        for (key, value) in &self.0 {
            ctx.insert(key, value);
        }

        ctx
    }
}
