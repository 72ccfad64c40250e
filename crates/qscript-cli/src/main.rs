//! qscript - Decompile QB script bytecode and compile QBC source back
//!
//! This tool turns `.qb` files into readable `.q` source text and compiles
//! `.q` source text into `.qb` files, one file at a time or for a whole
//! directory tree.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser};
use qscript_core::{
    qb_key_string, qs_key, CompileJob, DecompileJob, GameTarget, Job, JobOptions, KeyRegistry,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Decompile QB script bytecode to QBC source and compile it back
#[derive(Parser, Debug)]
#[command(name = "qscript")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Output directory (defaults to the directory of each input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Game the files belong to
    #[arg(long, default_value = "ghwt", env = "QSCRIPT_GAME")]
    game: GameTarget,

    /// Additional key bank files of `0xHHHHHHHH "literal"` lines
    #[arg(long = "key-bank", value_name = "FILE")]
    key_banks: Vec<PathBuf>,

    /// Dry run - don't write files, just show what would be produced
    #[arg(long)]
    dry_run: bool,

    /// Overwrite existing files without prompting
    #[arg(long)]
    force: bool,

    /// Print decompiled text to stdout instead of writing `.q` files
    #[arg(long)]
    stdout: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single `.qb` or `.q` file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of `.qb` and `.q` files to process
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Print the QBKey and QS key of a literal
    #[arg(long, value_name = "TEXT")]
    hash: Option<String>,
}

/// What to do with an input file, picked by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// `.qb` -> `.q`
    Decompile,
    /// `.q` -> `.qb`
    Compile,
}

impl Direction {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "qb" => Some(Self::Decompile),
            "q" => Some(Self::Compile),
            _ => None,
        }
    }

    fn output_extension(self) -> &'static str {
        match self {
            Self::Decompile => "q",
            Self::Compile => "qb",
        }
    }
}

#[derive(Debug, Default)]
struct RunStats {
    processed: usize,
    written: usize,
    failed: usize,
}

impl RunStats {
    fn print_summary(&self) {
        info!(
            "Summary: {} processed, {} written, {} failed",
            self.processed, self.written, self.failed
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    if let Some(ref text) = cli.input.hash {
        println!("{}", hash_report(text));
        return Ok(());
    }

    let mut registry = load_registry(&cli.key_banks)?;

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file, &mut registry)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory, &mut registry)
    } else {
        bail!("One of --file, --directory or --hash must be specified")
    }
}

/// Format the keys of a literal for `--hash`
fn hash_report(text: &str) -> String {
    format!(
        "{}\t{}\nqs:\t0x{:08X}",
        qb_key_string(text),
        text,
        qs_key(text)
    )
}

/// Build the key registry from the bundled bank plus any extra bank files
fn load_registry(banks: &[PathBuf]) -> Result<KeyRegistry> {
    let mut registry = KeyRegistry::with_bundled_bank();
    debug!("Bundled key bank holds {} keys", registry.len());

    for bank in banks {
        let added = registry
            .register_file(bank)
            .with_context(|| format!("Failed to load key bank: {}", bank.display()))?;
        info!("Loaded {} keys from {}", added, bank.display());
    }

    Ok(registry)
}

/// Process a single `.qb` or `.q` file
fn process_single_file(cli: &Cli, file: &Path, registry: &mut KeyRegistry) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }
    let Some(direction) = Direction::from_path(file) else {
        bail!("Expected a .qb or .q file: {}", file.display());
    };

    let mut stats = RunStats::default();
    process_file(cli, file, direction, registry, &mut stats)?;

    if !cli.dry_run && !cli.stdout {
        stats.print_summary();
    }

    Ok(())
}

/// Process a directory of `.qb` and `.q` files recursively
fn process_directory(cli: &Cli, directory: &Path, registry: &mut KeyRegistry) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    // Collect first so outputs written into the tree are not picked up again
    let mut inputs = Vec::new();
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        match Direction::from_path(path) {
            Some(direction) => inputs.push((path.to_path_buf(), direction)),
            None => trace!("Skipping: {}", path.display()),
        }
    }

    let mut stats = RunStats::default();
    for (path, direction) in inputs {
        if let Err(e) = process_file(cli, &path, direction, registry, &mut stats) {
            // Log error but continue with other files
            warn!("Error processing {}: {:#}", path.display(), e);
        }
    }

    info!("Processed {} files", stats.processed);

    if !cli.dry_run && !cli.stdout {
        stats.print_summary();
    }

    Ok(())
}

/// Where the result for `input` goes
fn output_path_for(input: &Path, output_dir: Option<&Path>, direction: Direction) -> PathBuf {
    let file_name = input
        .with_extension(direction.output_extension())
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_default();
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_extension(direction.output_extension()),
    }
}

/// Run one job and write its result
fn process_file(
    cli: &Cli,
    path: &Path,
    direction: Direction,
    registry: &mut KeyRegistry,
    stats: &mut RunStats,
) -> Result<()> {
    stats.processed += 1;
    debug!("Processing {:?}: {}", direction, path.display());

    let options = JobOptions::new()
        .debug(cli.verbose >= 2)
        .target_game(cli.game)
        .write_text(!cli.dry_run && !cli.stdout);

    let result = match direction {
        Direction::Decompile => {
            let mut job = DecompileJob::from_path(path, options.clone())
                .with_context(|| format!("Failed to open input file: {}", path.display()))?;
            job.run(registry).map(|text| text.clone().into_bytes())
        }
        Direction::Compile => {
            let mut job = CompileJob::from_path(path, options.clone())
                .with_context(|| format!("Failed to open input file: {}", path.display()))?;
            job.run(registry).cloned()
        }
    };
    let content = match result {
        Ok(content) => content,
        Err(e) => {
            stats.failed += 1;
            return Err(e).with_context(|| format!("Failed to process {}", path.display()));
        }
    };

    if cli.stdout {
        let mut out = std::io::stdout().lock();
        out.write_all(&content)
            .context("Failed to write to stdout")?;
        return Ok(());
    }

    let output_path = output_path_for(path, cli.output.as_deref(), direction);
    if !options.write_text {
        println!("Would write: {} ({} bytes)", output_path.display(), content.len());
        return Ok(());
    }

    match write_output_file(&output_path, &content, cli.force) {
        Ok(()) => {
            println!("Wrote {}", output_path.display());
            stats.written += 1;
        }
        Err(e) => {
            error!("Failed to write {}: {:#}", output_path.display(), e);
            stats.failed += 1;
        }
    }

    Ok(())
}

/// Write an output file, creating parent directories
fn write_output_file(output_path: &Path, content: &[u8], force: bool) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    let mut file = fs::File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["qscript"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_direction_from_extension() {
        assert_eq!(
            Direction::from_path(Path::new("a/guitar.qb")),
            Some(Direction::Decompile)
        );
        assert_eq!(
            Direction::from_path(Path::new("guitar.Q")),
            Some(Direction::Compile)
        );
        assert_eq!(Direction::from_path(Path::new("guitar.txt")), None);
        assert_eq!(Direction::from_path(Path::new("guitar")), None);
    }

    #[test]
    fn test_output_path_for() {
        assert_eq!(
            output_path_for(Path::new("in/guitar.qb"), None, Direction::Decompile),
            PathBuf::from("in/guitar.q")
        );
        assert_eq!(
            output_path_for(
                Path::new("in/guitar.q"),
                Some(Path::new("out")),
                Direction::Compile
            ),
            PathBuf::from("out/guitar.qb")
        );
    }

    #[test]
    fn test_hash_report() {
        let report = hash_report("GetTrueElapsedTime");
        assert!(report.starts_with("0x28DDB24A\tGetTrueElapsedTime\n"));
        assert!(report.contains("qs:\t0x"));
    }

    #[test]
    fn test_compile_then_decompile_files() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("answer.q");
        fs::write(&source, "answer = 42\n").unwrap();

        let out = temp_dir.path().join("out");
        let out_arg = out.to_string_lossy().into_owned();
        let args = cli(&["--file", "unused", "-o", out_arg.as_str()]);
        let mut registry = KeyRegistry::new();
        let mut stats = RunStats::default();

        process_file(&args, &source, Direction::Compile, &mut registry, &mut stats).unwrap();
        let compiled = out.join("answer.qb");
        assert!(compiled.exists());

        process_file(&args, &compiled, Direction::Decompile, &mut registry, &mut stats).unwrap();
        let text = fs::read_to_string(out.join("answer.q")).unwrap();
        assert_eq!(text, "answer = 42\n");
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.written, 2);
    }

    #[test]
    fn test_existing_output_needs_force() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("answer.q");
        fs::write(&source, "answer = 42\n").unwrap();
        fs::write(temp_dir.path().join("answer.qb"), b"old").unwrap();

        let mut registry = KeyRegistry::new();
        let mut stats = RunStats::default();
        let args = cli(&["--file", "unused"]);
        process_file(&args, &source, Direction::Compile, &mut registry, &mut stats).unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(fs::read(temp_dir.path().join("answer.qb")).unwrap(), b"old");

        let args = cli(&["--file", "unused", "--force"]);
        process_file(&args, &source, Direction::Compile, &mut registry, &mut stats).unwrap();
        assert_eq!(stats.written, 1);
        assert_ne!(fs::read(temp_dir.path().join("answer.qb")).unwrap(), b"old");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("answer.q");
        fs::write(&source, "answer = 42\n").unwrap();

        let args = cli(&["--file", "unused", "--dry-run"]);
        let mut registry = KeyRegistry::new();
        let mut stats = RunStats::default();
        process_file(&args, &source, Direction::Compile, &mut registry, &mut stats).unwrap();

        assert!(!temp_dir.path().join("answer.qb").exists());
        assert_eq!(stats.written, 0);
    }

    #[test]
    fn test_failed_job_is_counted() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("broken.q");
        fs::write(&source, "script a\n").unwrap();

        let args = cli(&["--file", "unused"]);
        let mut registry = KeyRegistry::new();
        let mut stats = RunStats::default();
        let err = process_file(&args, &source, Direction::Compile, &mut registry, &mut stats)
            .unwrap_err();

        assert!(format!("{:#}", err).contains("broken.q"));
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_game_flag() {
        assert_eq!(cli(&["--hash", "x"]).game, GameTarget::Ghwt);
        assert_eq!(cli(&["--hash", "x", "--game", "gh3"]).game, GameTarget::Gh3);
        assert!(Cli::try_parse_from(["qscript", "--hash", "x", "--game", "gh2"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
