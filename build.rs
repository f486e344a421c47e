// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("freeze-requirements")
        .version(env!("CARGO_PKG_VERSION"))
        .author("freeze-requirements Contributors")
        .about("A tool to freeze pip requirements files")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Show debug logs (RUST_LOG takes precedence)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("freeze")
                .about("Create frozen requirements from one or more requirements files")
                .arg(
                    Arg::new("requirements")
                        .required(true)
                        .num_args(1..)
                        .help("Requirements files"),
                )
                .arg(
                    Arg::new("output_dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .help("Put downloaded python packages and wheels here"),
                )
                .arg(
                    Arg::new("merged")
                        .short('m')
                        .long("merged-requirements")
                        .value_name("FILE")
                        .help("Merge all requirements in FILE (`-` for stdout)"),
                )
                .arg(
                    Arg::new("separate_requirements")
                        .long("separate-requirements")
                        .action(ArgAction::SetTrue)
                        .help("Create separate frozen requirements next to each input requirements file"),
                )
                .arg(
                    Arg::new("separate_requirements_suffix")
                        .long("separate-requirements-suffix")
                        .value_name("SUFFIX")
                        .default_value("-frozen")
                        .help("Suffix inserted before file extensions of separate frozen requirements"),
                )
                .arg(
                    Arg::new("cache_dependencies")
                        .long("cache-dependencies")
                        .action(ArgAction::SetTrue)
                        .help("Use a cache to speed up processing of unchanged requirements files"),
                )
                .arg(
                    Arg::new("pip")
                        .long("pip")
                        .default_value("pip")
                        .help("Path to the pip executable"),
                )
                .arg(
                    Arg::new("python")
                        .long("python")
                        .default_value("python")
                        .help("Path to the python executable used for the setup.py fallback"),
                )
                .arg(
                    Arg::new("build_wheels")
                        .long("build-wheels")
                        .action(ArgAction::SetTrue)
                        .help("Build wheel packages from the requirements"),
                )
                .arg(
                    Arg::new("no_rebuild_wheels")
                        .long("no-rebuild-wheels")
                        .action(ArgAction::SetTrue)
                        .help("Keep wheels already present in the output directory"),
                )
                .arg(
                    Arg::new("exclude")
                        .short('x')
                        .long("exclude")
                        .value_name("PACKAGE")
                        .action(ArgAction::Append)
                        .help("Exclude a package; PACKAGE may also be `req_path:package_name`"),
                )
                .arg(
                    Arg::new("exclude_requirements")
                        .long("exclude-requirements")
                        .value_name("FILE")
                        .action(ArgAction::Append)
                        .help("Exclude packages contained in requirements FILE"),
                )
                .arg(
                    Arg::new("use_ext_wheel")
                        .long("use-ext-wheel")
                        .value_name("PACKAGE")
                        .action(ArgAction::Append)
                        .help("Do not build PACKAGE, but still include it in the frozen output"),
                )
                .arg(
                    Arg::new("output_index_url")
                        .long("output-index-url")
                        .value_name("URL")
                        .help("Add an --index-url in the generated requirements files"),
                )
                .arg(
                    Arg::new("output_find_links")
                        .long("output-find-links")
                        .value_name("URL")
                        .action(ArgAction::Append)
                        .help("Add a --find-links in the generated requirements files"),
                )
                .arg(
                    Arg::new("loose")
                        .long("loose")
                        .value_name("PACKAGE")
                        .action(ArgAction::Append)
                        .help("Do not pin PACKAGE in loose requirements files"),
                )
                .arg(
                    Arg::new("loose_requirements")
                        .long("loose-requirements")
                        .action(ArgAction::SetTrue)
                        .help("Generate loose requirements files"),
                )
                .arg(
                    Arg::new("loose_requirements_suffix")
                        .long("loose-requirements-suffix")
                        .value_name("SUFFIX")
                        .default_value("-loose")
                        .help("Suffix inserted before file extensions of loose requirements"),
                )
                .arg(
                    Arg::new("max_conflict_resolution_iterations")
                        .long("max-conflict-resolution-iterations")
                        .value_name("N")
                        .default_value("10")
                        .help("Number of attempts at resolving versions conflicts"),
                ),
        )
        .subcommand(
            Command::new("cache-infos")
                .about("Print cache information for the given requirements files")
                .arg(
                    Arg::new("requirements")
                        .required(true)
                        .num_args(1..)
                        .help("Requirements files"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("freeze-requirements.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
