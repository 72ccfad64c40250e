//! Compile and decompile jobs.
//!
//! A job bundles one input (source text or QB bytes), the options it runs
//! with, and its result. Failing a job records a reason and stops it; the job
//! can be inspected afterwards with [`Job::failed`] and [`Job::abort_reason`].

use crate::compile::Encoder;
use crate::decompile::{Decompiler, DecompilerConfig};
use crate::error::{Error, Result};
use crate::key::KeyRegistry;
use crate::lexer::tokenize;
use crate::opcode::Opcode;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, error};

/// Reason recorded when a job is failed without one
const DEFAULT_FAIL_REASON: &str = "Job failed with no provided reason.";

/// Game a job reads or writes files for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameTarget {
    /// Guitar Hero: World Tour (and GH4 era titles)
    #[default]
    Ghwt,
    /// Guitar Hero III
    Gh3,
    /// Guitar Hero 5 era titles
    Gh6,
    /// Tony Hawk's American Wasteland
    Thaw,
    /// Tony Hawk's Underground 2
    Thug2,
    /// Tony Hawk's Underground
    Thug1,
    /// Tony Hawk's Pro Skater 4
    Thps4,
}

impl GameTarget {
    /// All targets
    pub const ALL: [GameTarget; 7] = [
        Self::Ghwt,
        Self::Gh3,
        Self::Gh6,
        Self::Thaw,
        Self::Thug2,
        Self::Thug1,
        Self::Thps4,
    ];

    /// Short lowercase name used on the command line
    pub fn name(self) -> &'static str {
        match self {
            Self::Ghwt => "ghwt",
            Self::Gh3 => "gh3",
            Self::Gh6 => "gh6",
            Self::Thaw => "thaw",
            Self::Thug2 => "thug2",
            Self::Thug1 => "thug1",
            Self::Thps4 => "thps4",
        }
    }

    /// Returns true if QB files can be compiled for this target
    pub fn supports_compile(self) -> bool {
        matches!(self, Self::Ghwt | Self::Gh3 | Self::Gh6 | Self::Thaw)
    }

    /// Script token used for `qs(...)` localized strings
    pub fn qs_opcode(self) -> Opcode {
        match self {
            Self::Gh3 | Self::Thaw => Opcode::LocalString,
            _ => Opcode::StringQs,
        }
    }
}

impl fmt::Display for GameTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GameTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower == "gh4" {
            return Ok(Self::Ghwt);
        }
        Self::ALL
            .into_iter()
            .find(|target| target.name() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|t| t.name()).collect();
                format!("unknown game '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// Options shared by every job kind
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Log extra detail while the job runs
    pub debug: bool,
    /// Game the job targets
    pub target_game: GameTarget,
    /// Write results to disk (as opposed to only producing them in memory)
    pub write_text: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            debug: false,
            target_game: GameTarget::default(),
            write_text: true,
        }
    }
}

impl JobOptions {
    /// Creates options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables debug logging
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the target game
    pub fn target_game(mut self, target: GameTarget) -> Self {
        self.target_game = target;
        self
    }

    /// Sets whether results are written to disk
    pub fn write_text(mut self, write: bool) -> Self {
        self.write_text = write;
        self
    }
}

/// Abort bookkeeping shared by the job kinds
#[derive(Debug, Clone, Default)]
struct JobState {
    abort_reason: Option<String>,
}

impl JobState {
    fn fail(&mut self, file_name: &str, reason: &str) {
        let reason = if reason.is_empty() {
            DEFAULT_FAIL_REASON
        } else {
            reason
        };
        error!("{}: {}", file_name, reason);
        self.abort_reason = Some(reason.to_string());
    }

    fn check(&self) -> Result<()> {
        match &self.abort_reason {
            Some(reason) => Err(Error::job_aborted(reason.clone())),
            None => Ok(()),
        }
    }
}

/// A unit of compile or decompile work
pub trait Job {
    /// What the job consumes
    type Input;
    /// What the job produces
    type Output;

    /// Name of the file the job works on, without directories
    fn file_name(&self) -> &str;

    /// The job's input
    fn input(&self) -> &Self::Input;

    /// The job's output, once it has run successfully
    fn output(&self) -> Option<&Self::Output>;

    /// The options the job runs with
    fn options(&self) -> &JobOptions;

    /// Run the job. A job that has already failed returns [`Error::JobAborted`].
    fn run(&mut self, registry: &mut KeyRegistry) -> Result<&Self::Output>;

    /// Stop the job with a reason. An empty reason records a default one.
    fn fail(&mut self, reason: &str);

    /// Returns true once the job has been failed
    fn failed(&self) -> bool {
        self.abort_reason().is_some()
    }

    /// Why the job was failed, if it was
    fn abort_reason(&self) -> Option<&str>;
}

/// Name of the final path component
fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Compiles QBC source text into QB bytes
#[derive(Debug, Clone)]
pub struct CompileJob {
    file_name: String,
    input: String,
    output: Option<Vec<u8>>,
    options: JobOptions,
    state: JobState,
}

impl CompileJob {
    /// Creates a job for a `.q` file on disk
    pub fn from_path(path: impl AsRef<Path>, options: JobOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::source_not_found(path));
        }
        let input = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Ok(Self::from_source(file_name_of(path), input, options))
    }

    /// Creates a job for in-memory source text
    pub fn from_source(
        file_name: impl Into<String>,
        source: impl Into<String>,
        options: JobOptions,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            input: source.into(),
            output: None,
            options,
            state: JobState::default(),
        }
    }

    fn compile(&self, registry: &mut KeyRegistry) -> Result<Vec<u8>> {
        let target = self.options.target_game;
        if !target.supports_compile() {
            return Err(Error::compile(format!("compiling for {target} is not supported")));
        }

        let tokens = tokenize(&self.input)?;
        if self.options.debug {
            for token in &tokens {
                debug!("{:>6}: {:?}", token.offset, token.kind);
            }
        }

        Encoder::new(registry, &self.file_name)
            .target(target)
            .encode(&tokens)
    }
}

impl Job for CompileJob {
    type Input = String;
    type Output = Vec<u8>;

    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn input(&self) -> &String {
        &self.input
    }

    fn output(&self) -> Option<&Vec<u8>> {
        self.output.as_ref()
    }

    fn options(&self) -> &JobOptions {
        &self.options
    }

    fn run(&mut self, registry: &mut KeyRegistry) -> Result<&Vec<u8>> {
        self.state.check()?;
        debug!("Compiling {} for {}", self.file_name, self.options.target_game);

        match self.compile(registry) {
            Ok(bytes) => Ok(self.output.insert(bytes)),
            Err(e) => {
                self.fail(&e.to_string());
                Err(e)
            }
        }
    }

    fn fail(&mut self, reason: &str) {
        self.state.fail(&self.file_name, reason);
    }

    fn abort_reason(&self) -> Option<&str> {
        self.state.abort_reason.as_deref()
    }
}

/// Decompiles QB bytes into QBC source text
#[derive(Debug, Clone)]
pub struct DecompileJob {
    file_name: String,
    input: Vec<u8>,
    output: Option<String>,
    options: JobOptions,
    config: DecompilerConfig,
    state: JobState,
}

impl DecompileJob {
    /// Creates a job for a `.qb` file on disk
    pub fn from_path(path: impl AsRef<Path>, options: JobOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::source_not_found(path));
        }
        let input = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        Ok(Self::from_bytes(file_name_of(path), input, options))
    }

    /// Creates a job for in-memory QB bytes
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>, options: JobOptions) -> Self {
        Self {
            file_name: file_name.into(),
            input: bytes,
            output: None,
            options,
            config: DecompilerConfig::default(),
            state: JobState::default(),
        }
    }

    /// Replaces the decompiler configuration
    pub fn with_config(mut self, config: DecompilerConfig) -> Self {
        self.config = config;
        self
    }
}

impl Job for DecompileJob {
    type Input = Vec<u8>;
    type Output = String;

    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn input(&self) -> &Vec<u8> {
        &self.input
    }

    fn output(&self) -> Option<&String> {
        self.output.as_ref()
    }

    fn options(&self) -> &JobOptions {
        &self.options
    }

    fn run(&mut self, registry: &mut KeyRegistry) -> Result<&String> {
        self.state.check()?;
        debug!("Decompiling {} ({} bytes)", self.file_name, self.input.len());

        let result = Decompiler::with_config(registry, self.config.clone())
            .decompile(self.input.as_slice());
        match result {
            Ok(text) => Ok(self.output.insert(text)),
            Err(e) => {
                self.fail(&e.to_string());
                Err(e)
            }
        }
    }

    fn fail(&mut self, reason: &str) {
        self.state.fail(&self.file_name, reason);
    }

    fn abort_reason(&self) -> Option<&str> {
        self.state.abort_reason.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_game_target_parsing() {
        assert_eq!("GHWT".parse::<GameTarget>(), Ok(GameTarget::Ghwt));
        assert_eq!("gh4".parse::<GameTarget>(), Ok(GameTarget::Ghwt));
        assert_eq!("thaw".parse::<GameTarget>(), Ok(GameTarget::Thaw));
        assert!("gh2".parse::<GameTarget>().is_err());
        assert_eq!(GameTarget::Thug2.to_string(), "thug2");
    }

    #[test]
    fn test_compile_support() {
        assert!(GameTarget::Ghwt.supports_compile());
        assert!(GameTarget::Gh3.supports_compile());
        assert!(!GameTarget::Thps4.supports_compile());
        assert_eq!(GameTarget::Gh3.qs_opcode(), Opcode::LocalString);
        assert_eq!(GameTarget::Gh6.qs_opcode(), Opcode::StringQs);
    }

    #[test]
    fn test_job_options_builder() {
        let options = JobOptions::new()
            .debug(true)
            .target_game(GameTarget::Gh3)
            .write_text(false);
        assert!(options.debug);
        assert_eq!(options.target_game, GameTarget::Gh3);
        assert!(!options.write_text);
        assert!(JobOptions::default().write_text);
    }

    #[test]
    fn test_compile_job_round_trip() {
        let mut registry = KeyRegistry::new();
        let mut compile = CompileJob::from_source("test.q", "answer = 42\n", JobOptions::new());
        let bytes = compile.run(&mut registry).unwrap().clone();
        assert!(!compile.failed());

        let mut decompile = DecompileJob::from_bytes("test.qb", bytes, JobOptions::new());
        assert_eq!(decompile.run(&mut registry).unwrap(), "answer = 42\n");
        assert_eq!(decompile.output().map(String::as_str), Some("answer = 42\n"));
    }

    #[test]
    fn test_lexer_failure_aborts_job() {
        let mut registry = KeyRegistry::new();
        let mut job = CompileJob::from_source("bad.q", "x = <abc\n", JobOptions::new());

        let err = job.run(&mut registry).unwrap_err();
        assert!(matches!(err, Error::Lex { .. }));
        assert!(job.failed());
        assert!(job.abort_reason().unwrap().contains("QBC LEXER FAIL"));
        assert!(job.output().is_none());

        // A failed job stays failed
        assert!(matches!(job.run(&mut registry), Err(Error::JobAborted(_))));
    }

    #[test]
    fn test_unsupported_compile_target() {
        let mut registry = KeyRegistry::new();
        let options = JobOptions::new().target_game(GameTarget::Thps4);
        let mut job = CompileJob::from_source("test.q", "answer = 1", options);
        assert!(matches!(job.run(&mut registry), Err(Error::Compile(_))));
        assert!(job.failed());
    }

    #[test]
    fn test_fail_without_reason() {
        let mut job = DecompileJob::from_bytes("test.qb", Vec::new(), JobOptions::new());
        assert!(!job.failed());
        job.fail("");
        assert_eq!(job.abort_reason(), Some(DEFAULT_FAIL_REASON));
    }

    #[test]
    fn test_decompile_job_reports_format_errors() {
        let mut registry = KeyRegistry::new();
        let mut bytes = vec![0u8; 28];
        bytes.extend([0x00, 0x20, 99, 0x00]);

        let mut job = DecompileJob::from_bytes("test.qb", bytes, JobOptions::new());
        assert!(matches!(
            job.run(&mut registry),
            Err(Error::UnknownItemType { tag: 99, .. })
        ));
        assert!(job.abort_reason().unwrap().contains("0x63"));
    }

    #[test]
    fn test_jobs_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.q");
        std::fs::write(&path, "answer = 7\n").unwrap();

        let job = CompileJob::from_path(&path, JobOptions::new()).unwrap();
        assert_eq!(job.file_name(), "test.q");
        assert_eq!(job.input(), "answer = 7\n");

        let missing = DecompileJob::from_path(dir.path().join("missing.qb"), JobOptions::new());
        assert!(matches!(missing, Err(Error::SourceNotFound { .. })));
    }
}
