use std::{
    fs::{DirBuilder, OpenOptions, Permissions},
    path::Path,
};

/// Permission bits of `permissions`, without the file type.
#[cfg(unix)]
pub fn mode_bits(permissions: &Permissions) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    permissions.mode() & 0o7777
}

/// Opens files with the given permissions, as far as the platform supports it.
pub fn with_mode<'a>(
    options: &'a mut OpenOptions,
    permissions: &Permissions,
) -> &'a mut OpenOptions {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;

        options.mode(mode_bits(permissions));
    }
    #[cfg(not(unix))]
    let _ = permissions;

    options
}

/// A recursive [`DirBuilder`] creating directories with the given permissions.
///
/// Directories that already exist are not an error, so concurrent jobs may race on shared
/// ancestors.
pub fn dir_builder(permissions: &Permissions) -> DirBuilder {
    let mut builder = DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;

        builder.mode(mode_bits(permissions));
    }
    #[cfg(not(unix))]
    let _ = permissions;

    builder
}

/// The outermost ancestor of `dir` (itself included) that does not exist yet.
///
/// Returns `None` when `dir` already exists.
pub fn topmost_missing(dir: &Path) -> Option<&Path> {
    let mut topmost = None;

    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() || ancestor.exists() {
            break;
        }
        topmost = Some(ancestor);
    }

    topmost
}
