//! Runs the external documentation tool for the default html build.

use std::fmt;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use log::{debug, info, warn};
use tokio::process::Command;

use crate::config::BuildConfig;
use crate::error::{BuildError, Result};

/// Builder name handed to the tool with `-b`.
pub const BUILDER: &str = "html";

/// Exit code reported when the user interrupts the build (128 + SIGINT).
pub const INTERRUPTED_CODE: i32 = 130;

/// Arguments for the tool, in order: builder, doctree cache, paper flag,
/// extra options, source directory, output directory.
pub fn build_args(config: &BuildConfig) -> Vec<String> {
    let mut args = vec![
        "-b".to_string(),
        BUILDER.to_string(),
        "-d".to_string(),
        config.doctree_dir().to_string_lossy().into_owned(),
    ];

    if let Some(paper) = config.paper_size() {
        args.extend(paper.flag());
    }

    args.extend(config.sphinx_opts_tokens());
    args.push(config.source_dir.to_string_lossy().into_owned());
    args.push(config.output_dir.to_string_lossy().into_owned());
    args
}

/// Line printed once the tool has finished successfully.
pub fn success_message(config: &BuildConfig) -> String {
    format!(
        "Build finished. HTML pages are in {}.",
        config.output_dir.display()
    )
}

/// A fully resolved invocation of the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn from_config(config: &BuildConfig) -> Result<Self> {
        let mut tokens = config.sphinx_build_tokens().into_iter();
        let program = tokens.next().ok_or_else(|| BuildError::Launch {
            program: config.sphinx_build.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "no build tool configured"),
        })?;

        let mut args: Vec<String> = tokens.collect();
        args.extend(build_args(config));
        Ok(Self { program, args })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(token: &str) -> String {
    if !token.is_empty() && !token.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        return token.to_string();
    }
    format!("'{}'", token.replace('\'', "'\\''"))
}

/// Exit code for a finished child. A child killed by a signal reports
/// 128 + signal number, as a shell would.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Run the html build once and report completion on `out`.
///
/// The tool inherits stdin, stdout and stderr, so its diagnostics pass
/// through untouched. The completion message is written only after the tool
/// exits with status 0. A Ctrl-C while the tool runs stops the child and
/// fails with [`INTERRUPTED_CODE`].
pub async fn run_default_build<W: Write>(config: &BuildConfig, out: &mut W) -> Result<ExitStatus> {
    let command_line = CommandLine::from_config(config)?;
    debug!("Running: {}", command_line);

    let start_time = Instant::now();
    let mut child = Command::new(&command_line.program)
        .args(&command_line.args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| BuildError::Launch {
            program: command_line.program.clone(),
            source,
        })?;

    let status = tokio::select! {
        status = child.wait() => status?,
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                warn!("Interrupted, stopping {}", command_line.program);
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill {}: {}", command_line.program, e);
                }
                return Err(BuildError::BuildToolFailure { code: INTERRUPTED_CODE });
            }
            Err(e) => {
                warn!("Cannot listen for Ctrl-C: {}", e);
                child.wait().await?
            }
        },
    };

    if !status.success() {
        let code = exit_code(status);
        debug!("{} exited with {}", command_line.program, code);
        return Err(BuildError::BuildToolFailure { code });
    }

    writeln!(out, "{}", success_message(config))?;
    info!("Build completed in {:?}", start_time.elapsed());
    Ok(status)
}

/// Absolute, lexically normalized form of `path`. Symlinks are resolved for
/// the longest prefix that exists, so existing and not-yet-created paths
/// compare consistently.
fn resolve(path: &Path) -> io::Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in std::path::absolute(path)?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    for ancestor in normalized.ancestors() {
        if let Ok(canonical) = ancestor.canonicalize() {
            let rest = normalized.strip_prefix(ancestor).unwrap_or(Path::new(""));
            return Ok(canonical.join(rest));
        }
    }
    Ok(normalized)
}

/// Remove the build directory (doctree cache and any other intermediate
/// output). The final output directory is left alone.
///
/// Refuses when the build directory is, or contains, the working directory,
/// the source directory or the output directory.
pub async fn clean(config: &BuildConfig) -> Result<()> {
    let build_dir = &config.build_dir;
    let resolved = resolve(build_dir)?;
    let protected = [
        std::env::current_dir()?,
        config.source_dir.clone(),
        config.output_dir.clone(),
    ];
    for path in &protected {
        if resolve(path)?.starts_with(&resolved) {
            return Err(BuildError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "refusing to clean {}: it contains {}",
                    build_dir.display(),
                    path.display()
                ),
            )));
        }
    }

    if build_dir.exists() {
        info!("Removing {}", build_dir.display());
        tokio::fs::remove_dir_all(build_dir).await?;
    } else {
        debug!("Nothing to clean at {}", build_dir.display());
    }
    Ok(())
}
