use crate::{
    config::{CommandSpec, Limits},
    errors::{AppError, ErrorRecord},
    mcp::{
        registry::Tool,
        types::{Args, Content, InputSchema, ParamSpec, ToolResult},
    },
    tools::substitute,
};
use async_trait::async_trait;
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Instant,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    time::{timeout, Duration},
};
use tracing::debug;

/// Passes arguments through to an external program declared in config.
pub struct CommandTool {
    spec: CommandSpec,
    root: PathBuf,
    timeout_s: u64,
    max_output_bytes: usize,
}

impl CommandTool {
    pub fn new(spec: CommandSpec, root: &Path, limits: &Limits) -> Self {
        let timeout_s = spec
            .timeout_s
            .map(|t| t.min(limits.exec_timeout_s))
            .unwrap_or(limits.exec_timeout_s);
        Self { spec, root: root.to_path_buf(), timeout_s, max_output_bytes: limits.max_output_kb * 1024 }
    }

    /// Argument vector for one call: templated tokens first, then flags in
    /// declaration order.
    pub fn expand_args(&self, args: &Args) -> Vec<String> {
        let mut argv = Vec::new();
        for token in &self.spec.args {
            if let Some(values) = whole_placeholder(token).and_then(|k| args.get(k)).and_then(Value::as_array) {
                argv.extend(values.iter().map(stringify));
                continue;
            }
            let rendered = substitute(token, |k| args.get(k).filter(|v| !v.is_null()).map(stringify));
            if let Some(rendered) = rendered {
                argv.push(rendered);
            }
        }
        for param in &self.spec.params {
            let (Some(flag), Some(value)) = (&param.flag, args.get(&param.name)) else { continue };
            match value {
                Value::Bool(true) => argv.push(flag.clone()),
                Value::Bool(false) | Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        argv.push(flag.clone());
                        argv.push(stringify(item));
                    }
                }
                other => {
                    argv.push(flag.clone());
                    argv.push(stringify(other));
                }
            }
        }
        argv
    }

    fn resolve_program(&self) -> Result<PathBuf, ErrorRecord> {
        let program = &self.spec.program;
        let resolved = if program.contains('/') {
            let p = Path::new(program);
            let p = if p.is_absolute() { p.to_path_buf() } else { self.root.join(p) };
            p.is_file().then_some(p).ok_or(())
        } else {
            which::which(program).map_err(|_| ())
        };
        resolved.map_err(|_| ErrorRecord::execution(format!("command not found: {program}")))
    }
}

fn whole_placeholder(token: &str) -> Option<&str> {
    token.strip_prefix("{{")?.strip_suffix("}}").map(str::trim)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reads to EOF but keeps at most `max` bytes, so a chatty child never
/// blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, max: usize) -> std::io::Result<(Vec<u8>, bool)> {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = max.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..n.min(room)]);
        truncated |= n > room;
    }
    Ok((kept, truncated))
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::from_params(
            self.spec
                .params
                .iter()
                .map(|p| ParamSpec {
                    name: p.name.clone(),
                    kind: p.kind,
                    required: p.required,
                    description: p.description.clone(),
                })
                .collect(),
        )
    }

    async fn call(&self, args: Args) -> Result<ToolResult, AppError> {
        let program = self.resolve_program()?;
        let argv = self.expand_args(&args);
        debug!(tool = %self.spec.name, program = %program.display(), args = ?argv, "spawning");

        let mut command = Command::new(&program);
        command.args(&argv);
        command.current_dir(&self.root);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        let start = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| ErrorRecord::execution(format!("failed to spawn {}: {e}", self.spec.program)))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow::anyhow!("stdout not captured"))?;
        let stderr = child.stderr.take().ok_or_else(|| anyhow::anyhow!("stderr not captured"))?;

        let max = self.max_output_bytes;
        let run = async {
            let (out, err) = tokio::join!(read_capped(stdout, max), read_capped(stderr, max));
            let (out, out_truncated) = out?;
            let (err, err_truncated) = err?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err, out_truncated || err_truncated))
        };

        let (status, out, err, truncated) = match timeout(Duration::from_secs(self.timeout_s), run).await {
            Ok(done) => done.map_err(anyhow::Error::from)?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(ErrorRecord::execution(format!(
                    "{} timed out after {}s",
                    self.spec.name, self.timeout_s
                ))
                .with_detail("timedOut", true)
                .into());
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&out).into_owned();
        let stderr = String::from_utf8_lossy(&err).into_owned();
        debug!(tool = %self.spec.name, exit_code = ?status.code(), duration_ms, truncated, "finished");

        let succeeded = status.code().is_some_and(|c| self.spec.success_codes.contains(&c));
        if !succeeded {
            let message = match status.code() {
                Some(code) => format!("{} exited with status {code}", self.spec.program),
                None => format!("{} terminated by signal", self.spec.program),
            };
            return Err(ErrorRecord::execution(message)
                .with_detail("exitCode", status.code())
                .with_detail("stderr", stderr)
                .with_detail("durationMs", duration_ms)
                .into());
        }

        let mut result = ToolResult::text(stdout);
        if !stderr.is_empty() {
            result = result.with(Content::text(stderr));
        }
        if truncated {
            result = result.with(Content::text(format!("[output truncated at {} KiB]", max / 1024)));
        }
        Ok(result)
    }
}
