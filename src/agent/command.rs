//! Subprocess agents.
//!
//! Each attempt renders a prompt from the agent persona and the bound task,
//! writes it to `<runs>/<run_id>/<task>/prompt.md` and runs the profile's
//! command. Stdout is the result; stderr goes to `attempt-<n>.stderr.log`
//! beside the prompt. The child is killed when the attempt times out or the
//! call is cancelled.

use crate::agent::capability::{AgentCapability, AgentFault, AgentRequest};
use crate::agent::binding::resolve_agent;
use crate::agent::config::AgentsConfig;
use crate::agent::prompt::render_prompt;
use crate::template::{Template, TemplateError, vars};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Maximum stderr characters quoted in a fault message.
const STDERR_TAIL_CHARS: usize = 2000;

/// Runs agents as configured CLI commands.
#[derive(Debug, Clone)]
pub struct CommandCapability {
    config: AgentsConfig,
    runs_dir: PathBuf,
    working_dir: PathBuf,
}

impl CommandCapability {
    /// `runs_dir` receives per-run prompt and log files; commands run in
    /// `working_dir`.
    pub fn new(config: AgentsConfig, runs_dir: PathBuf, working_dir: PathBuf) -> Self {
        Self {
            config,
            runs_dir,
            working_dir,
        }
    }

    /// Directory holding the files of one task in one run.
    pub fn task_dir(&self, run_id: &str, task: &str) -> PathBuf {
        self.runs_dir.join(run_id).join(task)
    }
}

#[async_trait]
impl AgentCapability for CommandCapability {
    async fn run(&self, request: AgentRequest<'_>) -> Result<String, AgentFault> {
        let binding = resolve_agent(request.task, request.agent, &self.config)
            .map_err(|e| AgentFault::Unavailable(e.to_string()))?;
        let profile = binding.profile;

        let prompt =
            render_prompt(&self.config, profile, &request).map_err(AgentFault::Unavailable)?;

        let task_dir = self.task_dir(request.run_id, request.task);
        tokio::fs::create_dir_all(&task_dir).await.map_err(|e| {
            AgentFault::Unavailable(format!(
                "failed to create agent directory '{}': {}",
                task_dir.display(),
                e
            ))
        })?;

        let prompt_path = task_dir.join("prompt.md");
        tokio::fs::write(&prompt_path, &prompt).await.map_err(|e| {
            AgentFault::Unavailable(format!(
                "failed to write prompt '{}': {}",
                prompt_path.display(),
                e
            ))
        })?;

        let command_template = Template::parse(&profile.command)
            .map_err(|e| AgentFault::Unavailable(format!("agent command: {}", e)))?;
        let prompt_on_stdin = !command_template.placeholders().contains(&"prompt_file");

        let attempt = request.attempt.to_string();
        let prompt_file = prompt_path.display().to_string();
        let variables = vars([
            ("prompt_file", prompt_file.as_str()),
            ("task", request.task),
            ("agent", binding.agent_id),
            ("run_id", request.run_id),
            ("attempt", attempt.as_str()),
        ]);
        let command_str = command_template
            .render_with(|name| variables.get(name).map(String::as_str))
            .map_err(|e| match e {
                TemplateError::UndefinedVariable { name, .. } => AgentFault::Unavailable(format!(
                    "agent '{}' command references undefined variable '{}'\n\
                     Available variables: agent, attempt, prompt_file, run_id, task",
                    binding.agent_id, name
                )),
                other => AgentFault::Unavailable(other.to_string()),
            })?;

        let args = shell_words::split(&command_str).map_err(|e| {
            AgentFault::Unavailable(format!(
                "failed to parse agent command '{}': {}",
                command_str, e
            ))
        })?;
        let Some((program, cmd_args)) = args.split_first() else {
            return Err(AgentFault::Unavailable(format!(
                "agent command is empty after parsing: '{}'",
                command_str
            )));
        };

        let mut command = Command::new(program);
        command
            .args(cmd_args)
            .current_dir(&self.working_dir)
            .envs(&profile.environment)
            .stdin(if prompt_on_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            task = %request.task,
            agent = %binding.agent_id,
            attempt = request.attempt,
            command = %command_str,
            "spawning agent"
        );

        let mut child = command.spawn().map_err(|e| {
            AgentFault::Unavailable(format!(
                "failed to execute agent command '{}': {} (is it installed and in PATH?)",
                program, e
            ))
        })?;

        if prompt_on_stdin && let Some(mut stdin) = child.stdin.take() {
            // Feed stdin while stdout is being drained.
            let task = request.task.to_string();
            let bytes = prompt.into_bytes();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&bytes).await {
                    debug!(task = %task, error = %e, "agent closed stdin early");
                }
            });
        }

        let timeout = Duration::from_secs(profile.effective_timeout(&self.config.defaults));
        let output = tokio::select! {
            _ = request.cancel.cancelled() => return Err(AgentFault::Cancelled),
            waited = tokio::time::timeout(timeout, child.wait_with_output()) => match waited {
                Err(_) => return Err(AgentFault::Timeout(timeout)),
                Ok(Err(e)) => {
                    return Err(AgentFault::Unavailable(format!(
                        "failed to wait for agent '{}': {}",
                        binding.agent_id, e
                    )));
                }
                Ok(Ok(output)) => output,
            },
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr_path = task_dir.join(format!("attempt-{}.stderr.log", request.attempt));
        write_log(&stderr_path, &stderr).await;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(AgentFault::Unavailable(format!(
                "agent '{}' exited with {}{}",
                binding.agent_id,
                code,
                stderr_tail(&stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        write_log(&task_dir.join(format!("attempt-{}.output.md", request.attempt)), &stdout).await;
        Ok(stdout)
    }
}

async fn write_log(path: &Path, content: &str) {
    if let Err(e) = tokio::fs::write(path, content).await {
        warn!(path = %path.display(), error = %e, "failed to write agent log");
    }
}

/// Last part of stderr, formatted for an error message.
fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        format!(":\n{}", trimmed)
    } else {
        let tail: String = trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect();
        format!(":\n...[truncated]\n{}", tail)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::agent::TaskResult;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn capability(temp: &TempDir, command: &str, timeout: u64) -> CommandCapability {
        let yaml = format!(
            "agents:\n  writer:\n    role: Writer\n    command: '{}'\n    timeout_seconds: {}\n    default: true\n",
            command, timeout
        );
        let config = AgentsConfig::from_yaml(&yaml).unwrap();
        CommandCapability::new(config, temp.path().join("runs"), temp.path().to_path_buf())
    }

    fn request<'a>(
        context: &'a [Arc<TaskResult>],
        cancel: &'a CancellationToken,
    ) -> AgentRequest<'a> {
        AgentRequest {
            run_id: "run-1",
            task: "create_content",
            agent: None,
            instruction: "Write a post",
            description: "Write a post",
            expected_output: "A post",
            context,
            attempt: 1,
            cancel,
        }
    }

    #[tokio::test]
    async fn test_prompt_on_stdin_and_stdout_as_result() {
        let temp = TempDir::new().unwrap();
        let cap = capability(&temp, "cat", 10);
        let cancel = CancellationToken::new();

        let output = cap.run(request(&[], &cancel)).await.unwrap();
        assert!(output.starts_with("You are Writer."));
        assert!(output.contains("Write a post"));

        let task_dir = cap.task_dir("run-1", "create_content");
        assert!(task_dir.join("prompt.md").exists());
        assert!(task_dir.join("attempt-1.stderr.log").exists());
    }

    #[tokio::test]
    async fn test_prompt_file_placeholder() {
        let temp = TempDir::new().unwrap();
        let cap = capability(&temp, "sh -c \"wc -l < {prompt_file} >/dev/null && echo {task}\"", 10);
        let cancel = CancellationToken::new();

        let output = cap.run(request(&[], &cancel)).await.unwrap();
        assert_eq!(output.trim(), "create_content");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_unavailable_with_stderr() {
        let temp = TempDir::new().unwrap();
        let cap = capability(&temp, "sh -c \"echo quota exceeded >&2; exit 3\"", 10);
        let cancel = CancellationToken::new();

        match cap.run(request(&[], &cancel)).await {
            Err(AgentFault::Unavailable(msg)) => {
                assert!(msg.contains("exited with 3"));
                assert!(msg.contains("quota exceeded"));
            }
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let cap = capability(&temp, "postcrew-no-such-agent-binary", 10);
        let cancel = CancellationToken::new();

        let err = cap.run(request(&[], &cancel)).await.unwrap_err();
        assert!(matches!(err, AgentFault::Unavailable(msg) if msg.contains("in PATH")));
    }

    #[tokio::test]
    async fn test_timeout_kills_agent() {
        let temp = TempDir::new().unwrap();
        let cap = capability(&temp, "sleep 30", 1);
        let cancel = CancellationToken::new();

        let err = cap.run(request(&[], &cancel)).await.unwrap_err();
        assert_eq!(err, AgentFault::Timeout(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_cancel_stops_agent() {
        let temp = TempDir::new().unwrap();
        let cap = capability(&temp, "sleep 30", 60);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = cap.run(request(&[], &cancel)).await.unwrap_err();
        assert_eq!(err, AgentFault::Cancelled);
    }

    #[tokio::test]
    async fn test_undefined_command_variable() {
        let temp = TempDir::new().unwrap();
        let cap = capability(&temp, "echo {worktree}", 10);
        let cancel = CancellationToken::new();

        let err = cap.run(request(&[], &cancel)).await.unwrap_err();
        assert!(matches!(err, AgentFault::Unavailable(msg) if msg.contains("'worktree'")));
    }

    #[test]
    fn test_stderr_tail_truncates() {
        assert_eq!(stderr_tail("  \n"), "");
        let long = "x".repeat(STDERR_TAIL_CHARS + 10);
        let tail = stderr_tail(&long);
        assert!(tail.starts_with(":\n...[truncated]\n"));
        assert_eq!(tail.matches('x').count(), STDERR_TAIL_CHARS);
    }
}
