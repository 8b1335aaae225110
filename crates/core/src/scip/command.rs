use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::{BuildTool, CommandSpec, IndexTool};
use crate::error::{Result, ShenmaError};
use crate::logging::IndexLog;

/// A command with every placeholder substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    pub base: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
}

impl fmt::Display for RenderedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl RenderedCommand {
    /// Environment entries split on the first `=`. Entries without one are skipped.
    fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().filter_map(|e| e.split_once('='))
    }
}

/// Replaces every occurrence of every placeholder key in `input`.
/// Tokens without an entry in the map are left untouched.
pub fn replace_placeholders(input: &str, placeholders: &BTreeMap<String, String>) -> String {
    let mut out = input.to_string();
    for (key, value) in placeholders {
        if !key.is_empty() && out.contains(key.as_str()) {
            out = out.replace(key.as_str(), value);
        }
    }
    out
}

pub fn render_command(spec: &CommandSpec, placeholders: &BTreeMap<String, String>) -> RenderedCommand {
    RenderedCommand {
        base: replace_placeholders(&spec.base, placeholders),
        args: spec
            .args
            .iter()
            .map(|a| replace_placeholders(a, placeholders))
            .collect(),
        env: spec
            .env
            .iter()
            .map(|e| replace_placeholders(e, placeholders))
            .collect(),
    }
}

/// Runs the build commands and then the index commands of one codebase,
/// sequentially, collecting every failure.
pub struct CommandExecutor {
    work_dir: PathBuf,
    build_commands: Vec<RenderedCommand>,
    index_commands: Vec<RenderedCommand>,
    log: IndexLog,
    closed: AtomicBool,
}

impl CommandExecutor {
    pub fn new(
        work_dir: &Path,
        index_tool: &IndexTool,
        build_tool: Option<&BuildTool>,
        placeholders: &BTreeMap<String, String>,
        log: IndexLog,
    ) -> Result<Self> {
        if work_dir.as_os_str().is_empty() {
            return Err(ShenmaError::Config("working dir is required".into()));
        }
        if index_tool.commands.is_empty() {
            return Err(ShenmaError::Config("index commands are required".into()));
        }

        let build_commands = build_tool
            .map(|tool| {
                tool.build_commands
                    .iter()
                    .map(|c| render_command(c, placeholders))
                    .collect()
            })
            .unwrap_or_default();
        let index_commands = index_tool
            .commands
            .iter()
            .map(|c| render_command(c, placeholders))
            .collect();

        Ok(Self {
            work_dir: work_dir.to_path_buf(),
            build_commands,
            index_commands,
            log,
            closed: AtomicBool::new(false),
        })
    }

    pub fn build_commands(&self) -> &[RenderedCommand] {
        &self.build_commands
    }

    pub fn index_commands(&self) -> &[RenderedCommand] {
        &self.index_commands
    }

    /// Runs all build commands, then all index commands. A failing command
    /// does not stop the ones after it; failures are joined into one error.
    pub fn execute(&self) -> Result<()> {
        let started = Instant::now();
        let mut errors = Vec::new();

        for (stage, commands) in [("build", &self.build_commands), ("index", &self.index_commands)] {
            for cmd in commands {
                if let Err(e) = self.run_one(stage, cmd) {
                    errors.push(e);
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis();
        match ShenmaError::join(errors) {
            None => {
                info!(work_dir = %self.work_dir.display(), elapsed_ms, "index commands succeeded");
                self.log
                    .info(format!("all commands succeeded, total cost {elapsed_ms} ms"));
                Ok(())
            }
            Some(err) => {
                error!(work_dir = %self.work_dir.display(), elapsed_ms, "index commands failed: {err}");
                self.log
                    .info(format!("commands failed, total cost {elapsed_ms} ms: {err}"));
                Err(err)
            }
        }
    }

    fn run_one(&self, stage: &str, cmd: &RenderedCommand) -> Result<()> {
        let started = Instant::now();
        info!(work_dir = %self.work_dir.display(), stage, command = %cmd, "start command");
        self.log.info(format!("[{stage}] start: {cmd}"));

        let result = self.spawn_and_wait(cmd);
        let elapsed_ms = started.elapsed().as_millis();
        match &result {
            Ok(()) => {
                info!(stage, command = %cmd, elapsed_ms, "command succeeded");
                self.log
                    .info(format!("[{stage}] success: {cmd}, cost {elapsed_ms} ms"));
            }
            Err(e) => {
                error!(stage, command = %cmd, elapsed_ms, "command failed: {e}");
                self.log
                    .info(format!("[{stage}] failed: {cmd}, cost {elapsed_ms} ms, err: {e}"));
            }
        }
        result
    }

    fn spawn_and_wait(&self, cmd: &RenderedCommand) -> Result<()> {
        let mut child = Command::new(&cmd.base)
            .args(&cmd.args)
            .envs(cmd.env_pairs())
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ShenmaError::Command(format!("failed to start `{cmd}`: {e}")))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        std::thread::scope(|scope| {
            if let Some(out) = stdout {
                let log = self.log.clone();
                scope.spawn(move || copy_into(out, log));
            }
            if let Some(err) = stderr {
                let log = self.log.clone();
                scope.spawn(move || copy_into(err, log));
            }
        });

        let status = child
            .wait()
            .map_err(|e| ShenmaError::Command(format!("failed to wait for `{cmd}`: {e}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(ShenmaError::Command(format!("`{cmd}` exited with {status}")))
        }
    }

    /// Flushes the command log. Safe to call any number of times.
    pub fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.log.flush() {
                warn!(work_dir = %self.work_dir.display(), "failed to flush index log: {e}");
            }
        }
        Ok(())
    }
}

fn copy_into(mut source: impl Read, log: IndexLog) {
    let mut buf = [0u8; 8192];
    loop {
        match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if log.write_raw(&buf[..n]).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn shell(script: &str) -> CommandSpec {
        CommandSpec {
            base: "sh".into(),
            args: vec!["-c".into(), script.into()],
            env: vec![],
        }
    }

    #[test]
    fn placeholders_are_replaced_in_every_field() {
        let spec = CommandSpec {
            base: "${BASE}".into(),
            args: vec!["${ARG1}".into(), "${ARG2}-${ARG1}".into(), "${MISSING}".into()],
            env: vec!["${E}=v".into()],
        };
        let placeholders: BTreeMap<String, String> = [
            ("${BASE}", "scip-go"),
            ("${ARG1}", "one"),
            ("${ARG2}", "two"),
            ("${E}", "GOFLAGS"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let rendered = render_command(&spec, &placeholders);
        assert_eq!(rendered.base, "scip-go");
        assert_eq!(rendered.args, vec!["one", "two-one", "${MISSING}"]);
        assert_eq!(rendered.env, vec!["GOFLAGS=v"]);
    }

    /// Counts flushes and fails every one of them.
    #[derive(Clone, Default)]
    struct BrokenFlush(Arc<Mutex<usize>>);

    impl std::io::Write for BrokenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            *self.0.lock().unwrap() += 1;
            Err(std::io::Error::other("disk full"))
        }
    }

    #[test]
    fn close_flushes_once_and_tolerates_flush_errors() {
        let index = IndexTool {
            name: "scip-go".into(),
            commands: vec![shell("true")],
        };
        let flushes = BrokenFlush::default();
        let log = IndexLog::from_writer(Box::new(flushes.clone()));
        let executor =
            CommandExecutor::new(Path::new("/tmp"), &index, None, &BTreeMap::new(), log).unwrap();

        assert!(executor.close().is_ok());
        assert!(executor.close().is_ok());
        assert_eq!(*flushes.0.lock().unwrap(), 1);
    }

    #[test]
    fn construction_requires_work_dir_and_index_commands() {
        let index = IndexTool {
            name: "scip-go".into(),
            commands: vec![shell("true")],
        };
        let err = CommandExecutor::new(Path::new(""), &index, None, &BTreeMap::new(), IndexLog::stdout())
            .err()
            .unwrap();
        assert!(err.to_string().contains("working dir is required"));

        let empty = IndexTool {
            name: "scip-go".into(),
            commands: vec![],
        };
        let err = CommandExecutor::new(Path::new("/tmp"), &empty, None, &BTreeMap::new(), IndexLog::stdout())
            .err()
            .unwrap();
        assert!(err.to_string().contains("index commands are required"));
    }

    #[test]
    fn failing_build_does_not_stop_index() {
        let dir = tempdir().unwrap();
        let build = BuildTool {
            name: "make".into(),
            detection_files: vec![],
            priority: 0,
            build_commands: vec![shell("echo build >> order.txt; exit 3")],
        };
        let index = IndexTool {
            name: "indexer".into(),
            commands: vec![shell("echo index >> order.txt; echo __out__")],
        };
        let mut placeholders = BTreeMap::new();
        placeholders.insert("__out__".to_string(), "rendered-output".to_string());
        let captured = Captured::default();
        let executor = CommandExecutor::new(
            dir.path(),
            &index,
            Some(&build),
            &placeholders,
            IndexLog::from_writer(Box::new(captured.clone())),
        )
        .unwrap();

        let err = executor.execute().unwrap_err();
        assert!(matches!(err, ShenmaError::Command(_)));
        assert_eq!(
            fs::read_to_string(dir.path().join("order.txt")).unwrap(),
            "build\nindex\n"
        );

        let log = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("rendered-output"));
        assert!(log.contains("[build] failed"));
        assert!(log.contains("[index] success"));

        executor.close().unwrap();
        executor.close().unwrap();
    }

    #[test]
    fn all_succeeding_commands_return_ok() {
        let dir = tempdir().unwrap();
        let index = IndexTool {
            name: "indexer".into(),
            commands: vec![CommandSpec {
                base: "sh".into(),
                args: vec!["-c".into(), "test \"$MODE\" = fast".into()],
                env: vec!["MODE=fast".into()],
            }],
        };
        let executor =
            CommandExecutor::new(dir.path(), &index, None, &BTreeMap::new(), IndexLog::stdout()).unwrap();
        assert!(executor.build_commands().is_empty());
        executor.execute().unwrap();
    }
}
