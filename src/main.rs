use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    ArgMatches, Command,
};
use std::{io::Write, num::NonZeroUsize, path::PathBuf};
use temple::{config, FileConfig, TreeConfig};

fn var_arg() -> Arg {
    Arg::new("var")
        .long("var")
        .value_name("KEY=VALUE")
        .help("key=values to interpolate in the source template")
        .action(ArgAction::Append)
}

fn vars_file_arg() -> Arg {
    Arg::new("vars-file")
        .long("vars-file")
        .value_name("PATH")
        .help("a toml file of string variables, merged with --var")
        .value_parser(value_parser!(PathBuf))
}

// The CLI layer should only parse inputs and forward them to library code.
fn main() -> miette::Result<()> {
    let matches = Command::new(crate_name!())
        .about(crate_description!())
        .author(crate_authors!())
        .version(crate_version!())
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("debug, prints debug information to stderr")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("file")
                .about("render a single file")
                .arg(var_arg())
                .arg(vars_file_arg())
                .arg(
                    Arg::new("src")
                        .long("src")
                        .value_name("PATH")
                        .help("if specified, a source file to read the template from")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("dst")
                        .long("dst")
                        .value_name("PATH")
                        .help("if specified, a destination file to write the rendered template to")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("tree")
                .about("render a tree of files")
                .arg(var_arg())
                .arg(vars_file_arg())
                .arg(
                    Arg::new("src")
                        .long("src")
                        .value_name("PATH")
                        .help("path to a tree where templates are found")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("dst")
                        .long("dst")
                        .value_name("PATH")
                        .help("the root where the rendered tree will be put")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("overwrite")
                        .long("overwrite")
                        .help("if specified, will overwrite existing files in the destination")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_name("N")
                        .help("how many files to render at once [default: number of CPUs]")
                        .value_parser(value_parser!(NonZeroUsize)),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("only show which files would be rendered")
                        .action(ArgAction::SetTrue),
                ),
        )
        .get_matches();

    init_logger(matches.get_flag("debug"));

    match matches.subcommand() {
        Some(("file", args)) => handle_file(args),
        Some(("tree", args)) => handle_tree(args),
        _ => unreachable!(),
    }
}

fn init_logger(is_debug: bool) {
    let level = if is_debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "{}: {}", crate_name!(), record.args()))
        .init();
}

fn load_vars(args: &ArgMatches) -> miette::Result<temple::Vars> {
    let raw_vars: Vec<&String> = args
        .get_many::<String>("var")
        .map(|values| values.collect())
        .unwrap_or_default();

    let vars_file = args.get_one::<PathBuf>("vars-file").map(PathBuf::as_path);

    let vars =
        config::load_vars(&raw_vars, vars_file).map_err(temple::TempleError::from)?;

    Ok(vars)
}

fn handle_file(args: &ArgMatches) -> miette::Result<()> {
    let config = FileConfig {
        vars: load_vars(args)?,
        src: args.get_one::<PathBuf>("src").cloned(),
        dst: args.get_one::<PathBuf>("dst").cloned(),
    };

    temple::render_file(&config)?;

    Ok(())
}

fn handle_tree(args: &ArgMatches) -> miette::Result<()> {
    let src = args.get_one::<PathBuf>("src").expect("src required");
    let dst = args.get_one::<PathBuf>("dst").expect("dst required");

    let mut config = TreeConfig::new(load_vars(args)?, src, dst);
    config.overwrite = args.get_flag("overwrite");
    config.dry_run = args.get_flag("dry-run");
    if let Some(jobs) = args.get_one::<NonZeroUsize>("jobs") {
        config.jobs = *jobs;
    }

    let rendered = temple::render_tree(&config)?;

    log::debug!("rendered {} files", rendered);

    Ok(())
}
