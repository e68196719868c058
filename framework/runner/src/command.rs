//! Typed construction of the load generator's command line.
//!
//! Arguments are kept as an ordered list of tokens from start to finish and handed to the OS
//! without a shell, so values containing spaces or quotes need no escaping.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A program and its arguments, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// The value following the first occurrence of `flag`, if any.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn to_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// Space-joined form used when echoing the command into a log.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How hard one load generator run pushes on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProfile {
    pub users: u32,
    pub spawn_rate: u32,
    pub qps: u32,
    pub run_time: Duration,
    pub max_tokens: u32,
}

impl LoadProfile {
    /// A single synthetic user at one query per second, whatever the main load is doing.
    pub fn probe(run_time: Duration, max_tokens: u32) -> Self {
        Self {
            users: 1,
            spawn_rate: 1,
            qps: 1,
            run_time,
            max_tokens,
        }
    }
}

/// The parts of the load generator invocation that stay fixed for a whole sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadGenerator {
    pub program: PathBuf,
    pub locustfile: String,
    pub host: String,
    pub provider: String,
    pub model: String,
    pub tokenizer: String,
}

impl LoadGenerator {
    /// Headless run against the backend with the given profile, followed by `extra_flags`.
    pub fn command(&self, profile: &LoadProfile, extra_flags: &[String]) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(["-f", self.locustfile.as_str(), "--headless"])
            .args(["-H", self.host.as_str()])
            .args(["--provider", self.provider.as_str()])
            .args(["--model", self.model.as_str()])
            .args(["--tokenizer", self.tokenizer.as_str()])
            .arg("-u")
            .arg(profile.users.to_string())
            .arg("-r")
            .arg(profile.spawn_rate.to_string())
            .arg("--qps")
            .arg(profile.qps.to_string())
            .arg("-t")
            .arg(format!("{}s", profile.run_time.as_secs()))
            .arg("--max-tokens")
            .arg(profile.max_tokens.to_string())
            .args(extra_flags.iter().cloned())
    }
}
