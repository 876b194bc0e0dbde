use crate::{
    errors::{FileOperation, IoError},
    plan::{Plan, PlanEntry},
    template::{Template, TemplateError},
    transactions::{RollbackOperation, SharedTransaction},
    utils::{dir_builder, topmost_missing, with_mode},
    vars::Vars,
};
use miette::Diagnostic;
use rayon::prelude::*;
use std::{
    fs::{self, File, OpenOptions, Permissions},
    io::{self, BufWriter, Write},
    num::NonZeroUsize,
    path::Path,
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TreeError {
    #[error("I/O error within tree domain")]
    #[diagnostic(code(temple::tree::io))]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("unable to start the render workers")]
    #[diagnostic(code(temple::tree::pool))]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// What gets written for one source file.
enum Body {
    Template(Template),
    /// Not valid UTF-8, written back untouched.
    Verbatim(Vec<u8>),
}

/// Renders every entry of a validated [`Plan`], at most `jobs` files at a time.
///
/// Files are rendered in no particular order. The first failing file stops the pool from
/// starting new files; once the files already in flight are done, everything this call
/// created is removed again and the error is returned. Files that existed before and were
/// overwritten keep their new content.
///
/// Returns the number of rendered files.
///
/// # Errors
///
/// Returns a [`TreeError`] if:
///
/// - A directory cannot be inspected or created.
/// - A template cannot be read, parsed or rendered.
/// - A destination file cannot be opened, written to or closed.
pub fn render(
    plan: &Plan,
    vars: &Vars,
    overwrite: bool,
    jobs: NonZeroUsize,
) -> Result<usize, TreeError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.get())
        .thread_name(|index| format!("temple-render-{index}"))
        .build()?;

    let trx = SharedTransaction::new();

    pool.install(|| {
        plan.entries
            .par_iter()
            .try_for_each(|entry| render_entry(entry, vars, overwrite, &trx))
    })?;

    trx.commit();

    Ok(plan.len())
}

fn render_entry(
    entry: &PlanEntry,
    vars: &Vars,
    overwrite: bool,
    trx: &SharedTransaction,
) -> Result<(), TreeError> {
    let PlanEntry {
        source,
        destination,
        ..
    } = entry;

    log::debug!("rendering {:?}", destination);

    if let (Some(source_dir), Some(destination_dir)) = (source.parent(), destination.parent()) {
        let dir_permissions = permissions_of(source_dir)?;
        ensure_directory(destination_dir, &dir_permissions, trx)?;
    }

    let file_permissions = permissions_of(source)?;
    let content = fs::read(source)
        .map_err(|error| IoError::new(FileOperation::Read, source.to_path_buf(), error))?;

    let body = match String::from_utf8(content) {
        Ok(text) => Body::Template(Template::compile(&source.display().to_string(), &text)?),
        Err(error) => {
            log::debug!("copying {:?} verbatim, it is not valid UTF-8", source);
            Body::Verbatim(error.into_bytes())
        }
    };

    let file = open_destination(destination, &file_permissions, overwrite, trx)?;

    let mut writer = BufWriter::new(file);
    match &body {
        Body::Template(template) => template.render_to(vars, &mut writer)?,
        Body::Verbatim(bytes) => writer.write_all(bytes).map_err(|error| {
            IoError::new(FileOperation::Write, destination.to_path_buf(), error)
        })?,
    }

    let file = writer.into_inner().map_err(|error| {
        IoError::new(
            FileOperation::Close,
            destination.to_path_buf(),
            error.into_error(),
        )
    })?;

    file.set_permissions(file_permissions)
        .map_err(|error| IoError::new(FileOperation::Write, destination.to_path_buf(), error))?;

    Ok(())
}

/// Opens `path` for writing, registering it on the transaction only if this call created it.
///
/// Without `overwrite` the file must not exist. With it, an existing file is truncated.
fn open_destination(
    path: &Path,
    permissions: &Permissions,
    overwrite: bool,
    trx: &SharedTransaction,
) -> Result<File, TreeError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    match with_mode(&mut options, permissions).open(path) {
        Ok(file) => {
            trx.add_operation(RollbackOperation::RemoveFile(path.to_path_buf()));
            Ok(file)
        }
        Err(error) if overwrite && error.kind() == io::ErrorKind::AlreadyExists => {
            log::debug!("truncating existing {:?}", path);
            let mut options = OpenOptions::new();
            options.write(true).truncate(true);

            let file = with_mode(&mut options, permissions)
                .open(path)
                .map_err(|error| IoError::new(FileOperation::Open, path.to_path_buf(), error))?;

            Ok(file)
        }
        Err(error) => Err(IoError::new(FileOperation::Open, path.to_path_buf(), error).into()),
    }
}

fn permissions_of(path: &Path) -> Result<Permissions, TreeError> {
    let metadata = fs::metadata(path)
        .map_err(|error| IoError::new(FileOperation::Stat, path.to_path_buf(), error))?;

    Ok(metadata.permissions())
}

/// Creates `dir` and its missing ancestors with `permissions`, registering the outermost
/// created directory on the transaction.
fn ensure_directory(
    dir: &Path,
    permissions: &Permissions,
    trx: &SharedTransaction,
) -> Result<(), TreeError> {
    match fs::metadata(dir) {
        Ok(_) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            let created = topmost_missing(dir).map(Path::to_path_buf);

            dir_builder(permissions)
                .create(dir)
                .map_err(|error| IoError::new(FileOperation::Mkdir, dir.to_path_buf(), error))?;

            if let Some(created) = created {
                log::debug!("created directory {:?}", created);
                trx.add_operation(RollbackOperation::RemoveDir(created));
            }

            Ok(())
        }
        Err(error) => Err(IoError::new(FileOperation::Stat, dir.to_path_buf(), error).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn jobs(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn files_under(root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_render_mirrors_tree() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(&src.path().join("README.md"), "# {{ name }}\n");
        write(&src.path().join("src/main.rs"), "fn main() {}\n");
        write(&src.path().join("src/bin/{{x}}.rs"), "// {{ name }}\n");
        write(&src.path().join("docs/deep/er/notes.txt"), "{{ name }} notes");

        let vars = Vars::parse(&["name=demo"]).unwrap();
        let plan = Plan::build(src.path(), &dst.path().join("out"), false).unwrap();
        let count = render(&plan, &vars, false, jobs(4)).unwrap();

        let out = dst.path().join("out");
        assert_eq!(count, 4);
        assert_eq!(files_under(&out), files_under(src.path()));
        assert_eq!(fs::read_to_string(out.join("README.md")).unwrap(), "# demo\n");
        assert_eq!(
            fs::read_to_string(out.join("src/main.rs")).unwrap(),
            "fn main() {}\n"
        );
        assert_eq!(
            fs::read_to_string(out.join("src/bin/{{x}}.rs")).unwrap(),
            "// demo\n"
        );
        assert_eq!(
            fs::read_to_string(out.join("docs/deep/er/notes.txt")).unwrap(),
            "demo notes"
        );
    }

    #[test]
    fn test_render_empty_plan() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        let plan = Plan::build(src.path(), dst.path(), false).unwrap();
        let count = render(&plan, &Vars::default(), false, jobs(2)).unwrap();

        assert_eq!(count, 0);
        assert!(files_under(dst.path()).is_empty());
    }

    #[test]
    fn test_render_overwrites_existing() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(&src.path().join("conf/app.toml"), "port = \"{{ port }}\"\n");
        write(
            &dst.path().join("conf/app.toml"),
            "a previous and much longer content\n",
        );

        let vars = Vars::parse(&["port=8080"]).unwrap();
        let plan = Plan::build(src.path(), dst.path(), true).unwrap();
        render(&plan, &vars, true, jobs(1)).unwrap();

        assert_eq!(
            fs::read_to_string(dst.path().join("conf/app.toml")).unwrap(),
            "port = \"8080\"\n"
        );
    }

    #[test]
    fn test_render_fails_if_destination_appeared() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(&src.path().join("a.txt"), "new");

        let plan = Plan::build(src.path(), dst.path(), false).unwrap();
        write(&dst.path().join("a.txt"), "sneaky");

        let err = render(&plan, &Vars::default(), false, jobs(1)).unwrap_err();

        assert!(matches!(
            err,
            TreeError::Io(IoError {
                operation: FileOperation::Open,
                ..
            })
        ));
        assert_eq!(
            fs::read_to_string(dst.path().join("a.txt")).unwrap(),
            "sneaky"
        );
    }

    #[test]
    fn test_render_failure_rolls_back_created_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        for i in 0..16 {
            write(&src.path().join(format!("ok/{i}.txt")), "{{ name }}");
        }
        write(&src.path().join("zz/broken.txt"), "{{ missing }}");
        write(&dst.path().join("keep.txt"), "untouched");

        let vars = Vars::parse(&["name=demo"]).unwrap();
        let plan = Plan::build(src.path(), dst.path(), false).unwrap();
        let err = render(&plan, &vars, false, jobs(4)).unwrap_err();

        assert!(matches!(err, TreeError::Template(TemplateError::Render { .. })));
        assert_eq!(files_under(dst.path()), vec![PathBuf::from("keep.txt")]);
        assert!(!dst.path().join("ok").exists());
        assert!(!dst.path().join("zz").exists());
    }

    #[test]
    fn test_render_parse_error_names_source() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(&src.path().join("bad.txt"), "{% for %}");

        let plan = Plan::build(src.path(), dst.path(), false).unwrap();
        let err = render(&plan, &Vars::default(), false, jobs(1)).unwrap_err();

        let expected = src.path().join("bad.txt").display().to_string();
        assert!(matches!(
            err,
            TreeError::Template(TemplateError::Parse { ref name, .. }) if *name == expected
        ));
    }

    #[test]
    fn test_render_copies_non_utf8_files_verbatim() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let logo = [0x89, 0x50, 0xff, 0xfe, 0x00, 0x0a, b'{', b'{'];
        write(&src.path().join("a.txt"), "{{ name }}");
        fs::create_dir_all(src.path().join("assets")).unwrap();
        fs::write(src.path().join("assets/logo.bin"), logo).unwrap();

        let vars = Vars::parse(&["name=demo"]).unwrap();
        let plan = Plan::build(src.path(), dst.path(), false).unwrap();
        let count = render(&plan, &vars, false, jobs(2)).unwrap();

        assert_eq!(count, 2);
        assert_eq!(fs::read_to_string(dst.path().join("a.txt")).unwrap(), "demo");
        assert_eq!(fs::read(dst.path().join("assets/logo.bin")).unwrap(), logo);
    }

    #[test]
    fn test_rollback_keeps_file_that_appeared_after_planning() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(&src.path().join("a.txt"), "rendered");
        write(&src.path().join("b.txt"), "{{ missing }}");

        let plan = Plan::build(src.path(), dst.path(), true).unwrap();
        write(&dst.path().join("a.txt"), "user data");

        let err = render(&plan, &Vars::default(), true, jobs(1)).unwrap_err();

        assert!(matches!(err, TreeError::Template(TemplateError::Render { .. })));
        assert!(dst.path().join("a.txt").exists());
        assert!(!dst.path().join("b.txt").exists());
    }

    #[test]
    fn test_rollback_removes_files_created_with_overwrite() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write(&src.path().join("a.txt"), "rendered");
        write(&src.path().join("b.txt"), "{{ missing }}");
        write(&dst.path().join("b.txt"), "previous");

        let plan = Plan::build(src.path(), dst.path(), true).unwrap();
        let err = render(&plan, &Vars::default(), true, jobs(1)).unwrap_err();

        assert!(matches!(err, TreeError::Template(TemplateError::Render { .. })));
        assert!(!dst.path().join("a.txt").exists());
        assert!(dst.path().join("b.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_render_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let script = src.path().join("bin/run.sh");
        let secret = src.path().join("secret.txt");
        write(&script, "#!/bin/sh\necho {{ name }}\n");
        write(&secret, "{{ name }}");
        fs::set_permissions(&script, Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(&secret, Permissions::from_mode(0o600)).unwrap();

        let vars = Vars::parse(&["name=demo"]).unwrap();
        let plan = Plan::build(src.path(), dst.path(), false).unwrap();
        render(&plan, &vars, false, jobs(2)).unwrap();

        let mode = |path: PathBuf| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(dst.path().join("bin/run.sh")), 0o755);
        assert_eq!(mode(dst.path().join("secret.txt")), 0o600);
    }
}
