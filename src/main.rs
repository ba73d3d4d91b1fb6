use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use refit::config::{self, RefitConfig, CONFIG_FILE};
use refit::rules::{self, CatalogReport};
use refit::{
    CancelToken, Diagnostic, Driver, Edit, EditResult, RulePattern, RuleRegistry, Severity,
    Verbosity,
};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Extension of compilation units understood by the reference host.
const UNIT_EXTENSION: &str = "sketch";

#[derive(Parser)]
#[command(name = "refit")]
#[command(about = "Template-driven rewriting of typed expressions", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite units and show or write the resulting edits
    Apply {
        #[command(flatten)]
        run: RunArgs,

        /// Write edits back to the units
        #[arg(short, long)]
        write: bool,
    },

    /// Like apply, but exit with status 1 when edits are pending
    Check {
        #[command(flatten)]
        run: RunArgs,
    },

    /// List registered rules
    Rules {
        #[command(flatten)]
        catalogs: CatalogArgs,
    },

    /// Load catalogs and report rules that fail to load
    Validate {
        #[command(flatten)]
        catalogs: CatalogArgs,
    },
}

#[derive(Args)]
struct CatalogArgs {
    /// Rule catalog file or directory of catalogs (repeatable)
    #[arg(short, long = "rules", value_name = "PATH")]
    rules: Vec<PathBuf>,

    /// Also load the built-in catalogs (implied when no --rules is given)
    #[arg(long)]
    builtin: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    catalogs: CatalogArgs,

    /// Engine configuration (defaults to ./refit.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only run rules matching this pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    include: Vec<String>,

    /// Never run rules matching this pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Upper bound on rewrite passes per unit
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,

    /// Print edits as JSON lines
    #[arg(long, conflicts_with = "diff")]
    json: bool,

    /// Units or directories to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Apply { run, write } => cmd_apply(run, write, cli.verbose),
        Commands::Check { run } => cmd_check(run, cli.verbose),
        Commands::Rules { catalogs } => cmd_rules(catalogs),
        Commands::Validate { catalogs } => cmd_validate(catalogs),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("refit={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Catalog files named by `--rules`, directories expanded to their `*.toml`
/// entries in name order.
fn discover_catalog_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(path).max_depth(1) {
                let entry = entry?;
                if entry.file_type().is_file()
                    && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
                {
                    found.push(entry.path().to_path_buf());
                }
            }
            found.sort();
            if found.is_empty() {
                anyhow::bail!("No .toml rule catalogs found in {}", path.display());
            }
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

/// Every requested catalog, built-ins first.
fn load_catalogs(args: &CatalogArgs) -> Result<Vec<CatalogReport>> {
    let mut reports = Vec::new();
    if args.builtin || args.rules.is_empty() {
        reports.extend(rules::load_builtin()?);
    }
    for file in discover_catalog_files(&args.rules)? {
        reports.push(rules::load_from_path(&file)?);
    }
    Ok(reports)
}

fn build_registry(args: &CatalogArgs) -> Result<RuleRegistry> {
    let mut registry = RuleRegistry::new();
    for report in load_catalogs(args)? {
        for error in &report.errors {
            eprintln!("{} {}", "warning:".yellow().bold(), error);
        }
        registry.extend(report.rules);
    }
    Ok(registry)
}

fn load_config(path: Option<&Path>) -> Result<RefitConfig> {
    match path {
        Some(path) => Ok(config::load_from_path(path)?),
        None if Path::new(CONFIG_FILE).is_file() => Ok(config::load_from_path(CONFIG_FILE)?),
        None => Ok(RefitConfig::default()),
    }
}

/// Units named on the command line, directories walked for `*.sketch` files.
fn discover_units(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut units = Vec::new();
    for path in paths {
        if path.is_file() {
            units.push(path.clone());
            continue;
        }
        if !path.exists() {
            anyhow::bail!("No such file or directory: {}", path.display());
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some(UNIT_EXTENSION)
            {
                found.push(entry.path().to_path_buf());
            }
        }
        found.sort();
        units.extend(found);
    }
    Ok(units)
}

/// Helper: Show unified diff between original and rewritten content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (rewritten)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn display_diagnostic(diagnostic: &Diagnostic) {
    let line = diagnostic.to_string();
    match diagnostic.severity {
        Severity::Warning => eprintln!("{}", line.yellow()),
        Severity::Info => eprintln!("{}", line.dimmed()),
    }
}

#[derive(Default)]
struct Totals {
    units: usize,
    rewritten: usize,
    edits: usize,
    failed: usize,
    unconverged: usize,
}

/// Runs the engine over every unit; edits are written only when `write`.
fn run_units(args: &RunArgs, write: bool, verbose: u8) -> Result<Totals> {
    let config = load_config(args.config.as_deref())?;
    let registry = build_registry(&args.catalogs)?;
    let host = config
        .sketch_host()
        .context("failed to build the host library")?;

    let mut options = config.driver_options();
    if !args.include.is_empty() {
        options.filter.include = args.include.iter().map(RulePattern::new).collect();
    }
    if !args.exclude.is_empty() {
        options.filter.exclude = args.exclude.iter().map(RulePattern::new).collect();
    }
    if let Some(max) = args.max_iterations {
        if max == 0 {
            anyhow::bail!("--max-iterations must be at least 1");
        }
        options.max_iterations = max;
    }
    if verbose > 0 {
        options.verbosity = Verbosity::Verbose;
    }
    let driver = Driver::new(&registry, options);
    let cancel = CancelToken::new();

    let mut totals = Totals::default();
    for unit in discover_units(&args.paths)? {
        totals.units += 1;
        let source = fs::read_to_string(&unit)
            .with_context(|| format!("failed to read {}", unit.display()))?;
        let tree = match host.load(&unit, &source) {
            Ok(tree) => tree,
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                totals.failed += 1;
                continue;
            }
        };
        let outcome = driver.run(tree, &cancel)?;
        for diagnostic in &outcome.diagnostics {
            display_diagnostic(diagnostic);
        }
        if !outcome.converged {
            totals.unconverged += 1;
        }
        if outcome.is_unchanged() {
            continue;
        }
        totals.rewritten += 1;
        totals.edits += outcome.edits.len();

        if args.json {
            for edit in &outcome.edits {
                println!("{}", serde_json::to_string(edit)?);
            }
        } else if args.diff {
            display_diff(&unit, &source, &outcome.render(&source)?);
        } else {
            report_edits(&unit, &outcome.edits);
        }

        if write {
            for result in Edit::apply_batch(outcome.edits)? {
                if let EditResult::AlreadyApplied { file } = result {
                    println!("{} {}: already rewritten", "⊙".yellow(), file.display());
                }
            }
        }
    }
    Ok(totals)
}

fn report_edits(unit: &Path, edits: &[Edit]) {
    for edit in edits {
        println!(
            "{} {}:{}: {} {}",
            "✎".cyan(),
            unit.display(),
            edit.byte_start,
            edit.rule.bold(),
            edit.new_text.dimmed()
        );
    }
}

fn print_summary(totals: &Totals, verb: &str) {
    if totals.units == 0 {
        return;
    }
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} unit(s) scanned", totals.units);
    println!(
        "  {} edit(s) {} in {} unit(s)",
        format!("{}", totals.edits).green(),
        verb,
        totals.rewritten
    );
    if totals.unconverged > 0 {
        println!(
            "  {} unit(s) hit the iteration cap",
            format!("{}", totals.unconverged).yellow()
        );
    }
    if totals.failed > 0 {
        println!("  {} failed", format!("{}", totals.failed).red());
    }
}

fn cmd_apply(args: RunArgs, write: bool, verbose: u8) -> Result<()> {
    let quiet = args.json;
    let totals = run_units(&args, write, verbose)?;
    if !quiet {
        print_summary(&totals, if write { "written" } else { "proposed" });
    }
    if totals.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_check(args: RunArgs, verbose: u8) -> Result<()> {
    let quiet = args.json;
    let totals = run_units(&args, false, verbose)?;
    if !quiet {
        print_summary(&totals, "pending");
    }
    if totals.failed > 0 || totals.edits > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_rules(args: CatalogArgs) -> Result<()> {
    let registry = build_registry(&args)?;
    for rule in registry.iter() {
        match &rule.description {
            Some(description) => println!("{}  {}", rule.name.bold(), description.dimmed()),
            None => println!("{}", rule.name.bold()),
        }
    }
    println!();
    println!("{} rule(s)", registry.len());
    Ok(())
}

fn cmd_validate(args: CatalogArgs) -> Result<()> {
    let mut failed = 0;
    for report in load_catalogs(&args)? {
        if report.is_clean() {
            println!(
                "{} {}: {} rule(s)",
                "✓".green(),
                report.name,
                report.rules.len()
            );
            continue;
        }
        println!(
            "{} {}: {} rule(s), {} failed",
            "✗".red(),
            report.name,
            report.rules.len(),
            report.errors.len()
        );
        for error in &report.errors {
            println!("    {}", error);
        }
        failed += report.errors.len();
    }
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
