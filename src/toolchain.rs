//! Native build tool execution (`./configure`, `make`).

use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use mockall::automock;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};
use tokio::process::Command;

use crate::error::{Error, Result};

/// One toolchain step: a program, its arguments and the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
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

    /// Short label used in progress lines and errors, e.g. `make altinstall`.
    pub fn step(&self) -> String {
        match self.args.first() {
            Some(first) if !first.starts_with('-') && !first.contains('=') => {
                format!("{} {}", self.program, first)
            }
            _ => self.program.clone(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Structured result of a finished toolchain step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, or None when the process was killed by a signal.
    pub status: Option<i32>,
    /// Interleaved stdout and stderr lines.
    pub output: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn describe_status(&self) -> String {
        match self.status {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Run one step to completion. A nonzero exit is reported in [`ToolOutput`],
    /// not as an error; only failing to start the program is an error.
    ///
    /// Dropping the returned future kills the child process.
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// [`Toolchain`] backed by real child processes.
#[derive(Debug, Clone, Default)]
pub struct NativeToolchain {
    /// Echo output lines to stderr as they arrive.
    pub verbose: bool,
}

impl NativeToolchain {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn record(&self, output: &mut String, line: String) {
        if self.verbose {
            eprintln!("{}", line);
        }
        output.push_str(&line);
        output.push('\n');
    }
}

#[async_trait]
impl Toolchain for NativeToolchain {
    #[tracing::instrument(skip(self), fields(step = %invocation.step()))]
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        debug!("Running {} in {:?}", invocation, invocation.cwd);

        let spawn_failed = |e: std::io::Error| Error::BuildFailed {
            step: invocation.step(),
            status: format!("could not be started: {}", e),
            output: String::new(),
        };

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_failed)?;

        let start = Instant::now();
        let mut output = String::new();
        let mut stdout = child.stdout.take().map(|s| BufReader::new(s).split(b'\n'));
        let mut stderr = child.stderr.take().map(|s| BufReader::new(s).split(b'\n'));

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                line = next_line(&mut stdout), if stdout.is_some() => match line {
                    Some(line) => self.record(&mut output, line),
                    None => stdout = None,
                },
                line = next_line(&mut stderr), if stderr.is_some() => match line {
                    Some(line) => self.record(&mut output, line),
                    None => stderr = None,
                },
            }
        }

        let status = child.wait().await.map_err(spawn_failed)?;
        debug!(
            "{} finished with {:?} after {}ms",
            invocation.step(),
            status.code(),
            start.elapsed().as_millis()
        );

        Ok(ToolOutput {
            status: status.code(),
            output,
        })
    }
}

/// Next line of a captured stream, lossily decoded; read errors end the stream.
async fn next_line<R>(lines: &mut Option<Split<BufReader<R>>>) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    match lines {
        Some(lines) => lines
            .next_segment()
            .await
            .ok()
            .flatten()
            .map(|bytes| String::from_utf8_lossy(&bytes).trim_end_matches('\r').to_string()),
        None => None,
    }
}
