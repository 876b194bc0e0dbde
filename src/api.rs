use crate::{
    config::{FileConfig, TreeConfig},
    file,
    plan::{self, Plan},
    preview, tree, vars,
};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TempleError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Vars(#[from] vars::VarsError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    File(#[from] file::FileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] plan::PlanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Tree(#[from] tree::TreeError),
}

/// Renders a single template from a file or standard input into a file or standard output.
///
/// # Errors
///
/// Returns a [`TempleError`] if:
///
/// - A named source or destination cannot be opened.
/// - The template cannot be read, parsed or rendered.
/// - The rendered output cannot be written.
pub fn render_file(config: &FileConfig) -> Result<(), TempleError> {
    file::render_file(config)?;

    Ok(())
}

/// Walks the source tree and validates every destination, without writing anything.
///
/// # Errors
///
/// Returns a [`TempleError`] if the source tree can't be walked, a destination can't be
/// inspected, or a destination exists and `config.overwrite` is false.
pub fn plan_tree(config: &TreeConfig) -> Result<Plan, TempleError> {
    let plan = Plan::build(&config.src, &config.dst, config.overwrite)?;

    log::debug!(
        "planned {} files from {} into {}",
        plan.len(),
        config.src.display(),
        config.dst.display()
    );

    Ok(plan)
}

/// Renders a whole tree of templates, mirroring `config.src` into `config.dst`.
///
/// The complete plan is validated before the first file is written. With
/// `config.dry_run` the plan is only previewed and nothing is rendered.
///
/// Returns the number of rendered files.
///
/// # Errors
///
/// Returns a [`TempleError`] if:
///
/// - Planning fails (see [`plan_tree`]), in which case nothing has been written.
/// - Any file fails to render, in which case the files created by this call are removed.
pub fn render_tree(config: &TreeConfig) -> Result<usize, TempleError> {
    let plan = plan_tree(config)?;

    if config.dry_run {
        preview::preview_plan(&plan);

        return Ok(0);
    }

    let rendered = tree::render(&plan, &config.vars, config.overwrite, config.jobs)?;

    Ok(rendered)
}
