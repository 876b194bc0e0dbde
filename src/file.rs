use crate::{
    config::FileConfig,
    errors::{FileOperation, IoError},
    template::{Template, TemplateError},
    vars::Vars,
};
use miette::Diagnostic;
use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::Path,
};
use thiserror::Error;

const STDIN_NAME: &str = "<stdin>";

#[derive(Debug, Error, Diagnostic)]
pub enum FileError {
    #[error("I/O error within file domain")]
    #[diagnostic(code(temple::file::io))]
    Io(#[from] IoError),

    #[error("can't read template from {name}")]
    #[diagnostic(code(temple::file::read))]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("can't write rendered template to {name}")]
    #[diagnostic(code(temple::file::write))]
    Write {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),
}

/// Reads a whole template from `reader`, renders it with `vars` and streams the result into
/// `writer`.
///
/// `name` identifies the template in errors. Input that is not valid UTF-8 is written back
/// untouched. Output is not rolled back on failure.
pub fn render<R: Read, W: Write>(
    mut reader: R,
    name: &str,
    writer: W,
    vars: &Vars,
) -> Result<(), FileError> {
    let mut content = Vec::new();
    reader
        .read_to_end(&mut content)
        .map_err(|error| FileError::Read {
            name: name.to_string(),
            source: error,
        })?;

    let mut writer = BufWriter::new(writer);

    match String::from_utf8(content) {
        Ok(text) => {
            let template = Template::compile(name, &text)?;
            template.render_to(vars, &mut writer)?;
        }
        Err(error) => {
            log::debug!("copying {} verbatim, it is not valid UTF-8", name);
            writer
                .write_all(error.as_bytes())
                .map_err(|error| FileError::Write {
                    name: name.to_string(),
                    source: error,
                })?;
        }
    }

    writer.flush().map_err(|error| FileError::Write {
        name: name.to_string(),
        source: error,
    })?;

    Ok(())
}

fn open_source(path: &Path) -> Result<File, FileError> {
    let file = File::open(path)
        .map_err(|error| IoError::new(FileOperation::Open, path.to_path_buf(), error))?;

    Ok(file)
}

fn open_destination(path: &Path) -> Result<File, FileError> {
    let file = File::create(path)
        .map_err(|error| IoError::new(FileOperation::Open, path.to_path_buf(), error))?;

    Ok(file)
}

/// Renders a single template as described by `config`.
///
/// The template comes from `config.src` or standard input, the output goes to `config.dst`
/// or standard output. Both ends are acquired before the template is parsed.
///
/// # Errors
///
/// Returns a [`FileError`] if:
///
/// - A named source or destination cannot be opened.
/// - The template cannot be read, parsed or rendered.
/// - The rendered output cannot be written.
pub fn render_file(config: &FileConfig) -> Result<(), FileError> {
    let (reader, name): (Box<dyn Read>, String) = match &config.src {
        Some(path) => (
            Box::new(open_source(path)?),
            path.display().to_string(),
        ),
        None => (Box::new(io::stdin().lock()), STDIN_NAME.to_string()),
    };

    match &config.dst {
        Some(path) => {
            log::debug!("rendering {} into {}", name, path.display());
            render(reader, &name, open_destination(path)?, &config.vars)
        }
        None => {
            log::debug!("rendering {} to stdout", name);
            render(reader, &name, io::stdout().lock(), &config.vars)
        }
    }
}
