use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::context::BuildContext;
use crate::env::BuildEnv;
use crate::error::{BuildError, Result};

/// Diagnostics the toolchain prints on success that are not worth surfacing.
const BENIGN_DIAGNOSTICS: &[&str] = &["Converted build"];

fn is_benign(line: &str) -> bool {
    BENIGN_DIAGNOSTICS.iter().any(|marker| line.contains(marker))
}

/// One external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub label: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(label: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        ToolCommand {
            label: label.into(),
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

    fn tool_name(&self) -> String {
        self.program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Runs `command` in `cwd`, registering the child with the build's process
/// registry for as long as it lives.
///
/// Output on stderr is logged as warnings. A non-zero exit is an error unless
/// everything the tool printed is a known benign diagnostic.
pub fn run_tool(ctx: &BuildContext, command: &ToolCommand, cwd: &Path, env: &BuildEnv) -> Result<()> {
    ctx.token().check()?;
    debug!("{} {}", command.program.display(), command.args.join(" "));

    let child = Command::new(&command.program)
        .args(&command.args)
        .current_dir(cwd)
        .envs(env.vars())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BuildError::io(format!("failed to start {}", command.program.display()), e))?;

    let pid = child.id();
    track(ctx, pid);
    let output = child.wait_with_output();
    ctx.processes().unregister(pid);
    let output = output.map_err(|e| BuildError::io(format!("failed to wait for {}", command.tool_name()), e))?;

    // Anything a killed tool produced is meaningless once the build is cancelled.
    ctx.token().check()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        debug!("{}: {}", command.tool_name(), line);
    }

    let mut diagnostics: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    if !output.status.success() {
        // lcc reports compiler errors on stdout.
        diagnostics.extend(stdout.lines().filter(|l| !l.trim().is_empty()));
    }
    let (benign, serious): (Vec<&str>, Vec<&str>) =
        diagnostics.into_iter().partition(|line| is_benign(line));
    for line in &benign {
        debug!("{}: {}", command.tool_name(), line);
    }

    let only_benign = serious.is_empty() && !benign.is_empty();
    if !output.status.success() && !only_benign {
        return Err(BuildError::ToolFailed {
            tool: command.tool_name(),
            status: output.status.to_string(),
            output: serious.join("\n"),
        });
    }
    for line in serious {
        warn!("{}: {}", command.tool_name(), line);
    }
    Ok(())
}

/// Registers a freshly spawned child. A cancel that raced the spawn has
/// already swept the registry, so the child's tree is terminated here.
fn track(ctx: &BuildContext, pid: u32) {
    ctx.processes().register(pid);
    if ctx.token().is_cancelled() {
        let signalled = ctx.processes().terminate_tree(pid);
        debug!("build cancelled while starting process {}, {} signalled", pid, signalled);
    }
}
