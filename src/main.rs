// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use freeze_requirements::cache::{self, DependencyCache};
use freeze_requirements::config::{self, FreezeConfig};
use freeze_requirements::formatter::{
    DEFAULT_LOOSE_SUFFIX, DEFAULT_SEPARATE_SUFFIX, FormatOptions, OutputPlan, OutputTarget,
};
use freeze_requirements::manifest::{self, Exclusions};
use freeze_requirements::packages::{WheelBuilder, canonicalize_name};
use freeze_requirements::repository::{OutputCollector, PackageSink, PipFetcher};
use freeze_requirements::resolver::{DEFAULT_MAX_ATTEMPTS, Resolver};
use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "freeze-requirements")]
#[command(author, version, about = "A tool to freeze pip requirements files", long_about = None)]
struct Cli {
    /// Show debug logs (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create frozen requirements from one or more requirements files
    Freeze(FreezeArgs),
    /// Print cache information for the given requirements files
    CacheInfos {
        /// Requirements files
        #[arg(required = true)]
        requirements: Vec<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

#[derive(clap::Args)]
struct FreezeArgs {
    /// Requirements files
    #[arg(required = true)]
    requirements: Vec<PathBuf>,

    /// Put downloaded python packages and wheels here
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Merge all requirements in FILE (`-` for stdout)
    #[arg(short, long = "merged-requirements", value_name = "FILE")]
    merged: Option<String>,

    /// Create separate frozen requirements next to each input requirements file
    #[arg(long)]
    separate_requirements: bool,

    /// Suffix inserted before file extensions of separate frozen requirements
    #[arg(long, default_value = DEFAULT_SEPARATE_SUFFIX, value_name = "SUFFIX")]
    separate_requirements_suffix: String,

    /// Use a cache to speed up processing of unchanged requirements files
    #[arg(long)]
    cache_dependencies: bool,

    /// Path to the pip executable
    #[arg(long, default_value = "pip")]
    pip: PathBuf,

    /// Path to the python executable used for the setup.py fallback
    #[arg(long, default_value = "python")]
    python: PathBuf,

    /// Build wheel packages from the requirements
    #[arg(long)]
    build_wheels: bool,

    /// Keep wheels already present in the output directory
    #[arg(long)]
    no_rebuild_wheels: bool,

    /// Exclude a package; PACKAGE may also be `req_path:package_name` to
    /// exclude it from a single separate requirements file
    #[arg(short = 'x', long = "exclude", value_name = "PACKAGE")]
    excluded: Vec<String>,

    /// Exclude packages contained in requirements FILE
    #[arg(long, value_name = "FILE")]
    exclude_requirements: Vec<PathBuf>,

    /// Do not build PACKAGE, but still include it in the frozen output
    #[arg(long = "use-ext-wheel", value_name = "PACKAGE")]
    ext_wheels: Vec<String>,

    /// Add an --index-url in the generated requirements files
    #[arg(long, value_name = "URL")]
    output_index_url: Option<String>,

    /// Add a --find-links in the generated requirements files
    #[arg(long, value_name = "URL")]
    output_find_links: Vec<String>,

    /// Do not pin PACKAGE in loose requirements files
    #[arg(long = "loose", value_name = "PACKAGE")]
    loose: Vec<String>,

    /// Generate loose requirements files
    #[arg(long)]
    loose_requirements: bool,

    /// Suffix inserted before file extensions of loose requirements
    #[arg(long, default_value = DEFAULT_LOOSE_SUFFIX, value_name = "SUFFIX")]
    loose_requirements_suffix: String,

    /// Number of attempts at resolving versions conflicts
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_name = "N")]
    max_conflict_resolution_iterations: usize,
}

impl From<FreezeArgs> for FreezeConfig {
    fn from(args: FreezeArgs) -> Self {
        Self {
            requirements: args.requirements,
            output_dir: args.output_dir,
            merged: args.merged,
            separate: args.separate_requirements,
            separate_suffix: args.separate_requirements_suffix,
            cache_dependencies: args.cache_dependencies,
            pip: args.pip,
            python: args.python,
            build_wheels: args.build_wheels,
            rebuild_wheels: !args.no_rebuild_wheels,
            excluded: args.excluded,
            exclude_requirements: args.exclude_requirements,
            ext_wheels: args.ext_wheels,
            index_url: args.output_index_url,
            find_links: args.output_find_links,
            loose: args.loose.iter().map(|name| canonicalize_name(name)).collect(),
            loose_requirements: args.loose_requirements,
            loose_suffix: args.loose_requirements_suffix,
            max_attempts: args.max_conflict_resolution_iterations,
        }
    }
}

/// Global and ext-wheel exclusions plus those read from requirements files
fn build_exclusions(config: &FreezeConfig) -> freeze_requirements::Result<Exclusions> {
    let mut exclusions = Exclusions::new();
    exclusions.extend(&config.excluded);
    exclusions.extend(&config.ext_wheels);
    for path in &config.exclude_requirements {
        exclusions.add_requirements_file(path)?;
    }
    Ok(exclusions)
}

fn build_output_plan(config: &FreezeConfig) -> OutputPlan {
    OutputPlan {
        merged: config.merged.as_deref().map(OutputTarget::parse),
        separate_suffix: config.separate.then(|| config.separate_suffix.clone()),
        loose: config
            .loose_requirements
            .then(|| (config.loose_suffix.clone(), config.loose.clone())),
    }
}

fn freeze(config: FreezeConfig) -> Result<()> {
    config.validate()?;

    let exclusions = build_exclusions(&config)?;
    let ext_wheels: BTreeSet<String> = config
        .ext_wheels
        .iter()
        .map(|name| canonicalize_name(name))
        .collect();
    let prepared = manifest::prepare(&config.requirements, &exclusions, &ext_wheels)?;

    let fetcher = PipFetcher::new(&config.pip);
    let collector = config.output_dir.as_ref().map(|dir| {
        let collector = OutputCollector::new(dir);
        if config.build_wheels {
            collector.with_wheels(
                WheelBuilder::new(&config.pip, &config.python),
                config.rebuild_wheels,
            )
        } else {
            collector
        }
    });

    let mut dependency_cache = if config.cache_dependencies {
        let root = config::cache_root()?;
        debug!("Using dependency cache in {}", root.display());
        Some(DependencyCache::open(&root)?)
    } else {
        None
    };

    let resolution = {
        let mut resolver = Resolver::new(&fetcher)
            .with_policy(config.conflict_policy())
            .with_max_attempts(config.max_attempts)
            .tolerate(exclusions.names().iter().cloned());
        if let Some(collector) = &collector {
            resolver = resolver.with_sink(collector as &dyn PackageSink);
        }
        if let Some(cache) = dependency_cache.as_mut() {
            resolver = resolver.with_cache(cache);
        }
        resolver.resolve(&prepared.manifests)?
    };
    debug!("Resolved in {} attempt(s)", resolution.attempts);

    let options = FormatOptions {
        exclusions,
        index_url: config.index_url.clone(),
        find_links: config.find_links.clone(),
        external_lines: prepared.external_lines.clone(),
    };
    build_output_plan(&config).write_all(&resolution.manifests, &resolution.groups, &options)?;

    if let Some(target) = &config.merged {
        info!("Wrote merged frozen requirements in {}", target);
    }
    Ok(())
}

fn cache_infos(requirements: &[PathBuf]) -> Result<()> {
    let root = config::cache_root()?;
    let cache = DependencyCache::open(&root)?;
    info!("Dependency cache: {}", cache.db_path().display());

    for path in requirements {
        let hash = cache::content_hash(path)?;
        match cache.entry(&hash) {
            Ok(Some(entry)) => println!(
                "{} {} ({} packages, cached {})",
                path.display(),
                entry.hash,
                entry.packages.len(),
                entry.created_at.as_deref().unwrap_or("at an unknown time")
            ),
            Ok(None) => println!("{} not cached", path.display()),
            Err(e) => println!("{} unreadable cache entry: {}", path.display(), e),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Freeze(args) => freeze(args.into()),
        Commands::CacheInfos { requirements } => cache_infos(&requirements),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "freeze-requirements", &mut io::stdout());
            Ok(())
        }
    }
}
