//! Engine tests driven by a scripted capability.

use super::*;
use crate::agent::AgentFault;
use crate::catalog::TemplateStore;
use crate::contract::ContractViolation;
use crate::error::PostcrewError;
use crate::events::{EventAction, EventJournal};
use crate::template::ParameterSet;
use crate::test_support::ScriptedCapability;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const RESEARCH: &str = "\
# Remote Work Productivity

## Key Insights
- Hybrid schedules raise output by 13% (Stanford)
- Async-first teams ship faster (GitLab)
- Meeting-free days cut context switching
- Home offices need ergonomic budgets
- Managers measure outcomes, not hours
";

fn post(words: usize) -> String {
    let body = vec!["productivity"; words].join(" ");
    format!("{}\n\n#RemoteWork #Productivity #FutureOfWork", body)
}

fn daily_summary() -> String {
    (1..=5)
        .map(|i| {
            format!(
                "{i}. Story {i}\n   Headline: Story {i}\n   Summary: Something happened.\n   Why it matters: It moves markets.\n"
            )
        })
        .collect()
}

fn leads() -> String {
    (1..=3)
        .map(|i| format!("- Lead {i}\n  Name: Person {i}\n  Company: Acme {i}\n  Reason: Asked about pricing\n"))
        .collect()
}

fn topic() -> ParameterSet {
    ParameterSet::new().with("topic", "remote work productivity")
}

fn engine(capability: Arc<ScriptedCapability>, settings: EngineSettings) -> WorkflowEngine {
    let store = Arc::new(TemplateStore::builtin().unwrap());
    WorkflowEngine::new(store, capability).with_settings(settings)
}

fn settings(max_retries: u32, concurrency_limit: usize) -> EngineSettings {
    EngineSettings {
        retry: RetryPolicy {
            max_retries,
            backoff_initial: Duration::from_millis(10),
            backoff_max: Duration::from_millis(40),
        },
        concurrency_limit,
        preflight: true,
    }
}

#[tokio::test]
async fn test_research_flows_into_content() {
    let capability = Arc::new(
        ScriptedCapability::new()
            .reply("research_topic", RESEARCH)
            .reply("create_content", post(200)),
    );
    let engine = engine(Arc::clone(&capability), settings(2, 2));

    let run = engine
        .run_workflow(&["research_topic", "create_content"], &topic())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.is_completed());

    let calls = capability.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].task, "research_topic");
    assert!(calls[0].instruction.contains("'remote work productivity'"));
    assert!(!calls[0].instruction.contains("{topic}"));

    assert_eq!(calls[1].task, "create_content");
    assert!(calls[1].instruction.contains("Hybrid schedules raise output"));
    assert!(calls[1].instruction.contains("professional tone"));
    assert_eq!(calls[1].context, vec!["research_topic"]);

    let content = run.node("create_content").unwrap();
    assert_eq!(content.status, NodeStatus::Completed);
    let words = content.word_count.unwrap();
    assert!((150..=300).contains(&words));
    assert_eq!(content.hashtags.len(), 3);
    assert_eq!(content.retries, 0);

    let research = run.node("research_topic").unwrap();
    assert_eq!(research.items.len(), 5);
    assert_eq!(research.output.as_deref(), Some(RESEARCH));
}

#[tokio::test]
async fn test_independent_tasks_complete_in_reverse_order() {
    let capability = Arc::new(
        ScriptedCapability::new()
            .reply("daily_summary", daily_summary())
            .reply("find_leads", leads())
            .delay("daily_summary", Duration::from_millis(50))
            .delay("find_leads", Duration::from_millis(50)),
    );
    let engine = engine(Arc::clone(&capability), settings(0, 2));

    let run = engine
        .run_workflow(&["find_leads", "daily_summary"], &ParameterSet::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.nodes[0].task, "find_leads");
    assert_eq!(run.nodes[1].task, "daily_summary");
    assert_eq!(run.node("find_leads").unwrap().items.len(), 3);
    assert_eq!(capability.peak_concurrency(), 2);
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let capability = Arc::new(
        ScriptedCapability::new()
            .reply("daily_summary", daily_summary())
            .reply("find_leads", leads())
            .delay("daily_summary", Duration::from_millis(20))
            .delay("find_leads", Duration::from_millis(20)),
    );
    let engine = engine(Arc::clone(&capability), settings(0, 1));

    let run = engine
        .run_workflow(&["daily_summary", "find_leads"], &ParameterSet::new())
        .await
        .unwrap();

    assert!(run.is_completed());
    assert_eq!(capability.peak_concurrency(), 1);
}

#[tokio::test]
async fn test_content_waits_for_validated_research() {
    let capability = Arc::new(
        ScriptedCapability::new()
            .reply("research_topic", "Some thoughts, no insights section.")
            .reply("research_topic", RESEARCH)
            .reply("create_content", post(180)),
    );
    let engine = engine(Arc::clone(&capability), settings(2, 2));

    let run = engine
        .run_workflow(&["create_content", "research_topic"], &topic())
        .await
        .unwrap();
    assert!(run.is_completed());

    let calls = capability.calls();
    let tasks: Vec<&str> = calls.iter().map(|c| c.task.as_str()).collect();
    assert_eq!(tasks, vec!["research_topic", "research_topic", "create_content"]);
    assert!(calls[2].instruction.contains("Hybrid schedules"));
    assert!(!calls[2].instruction.contains("no insights section"));

    let research = run.node("research_topic").unwrap();
    assert_eq!(research.attempts, 2);
    assert_eq!(research.retries, 1);
}

#[tokio::test]
async fn test_contract_violation_retried_exactly_max_retries() {
    let capability = Arc::new(ScriptedCapability::new().reply("create_content", post(40)));
    let store = Arc::new(
        TemplateStore::from_yaml(
            "create_content:\n  description: \"Write about {topic}\"\n  expected_output: \"150-300 words\"\n  contract:\n    word_count: { min: 150, max: 300 }\n",
        )
        .unwrap(),
    );
    let engine = WorkflowEngine::new(store, capability.clone()).with_settings(settings(2, 2));

    let run = engine.run_workflow(&["create_content"], &topic()).await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(capability.calls_for("create_content").len(), 3);

    let node = run.node("create_content").unwrap();
    assert_eq!(node.status, NodeStatus::Failed);
    assert_eq!(node.attempts, 3);
    assert_eq!(node.retries, 2);
    assert!(node.output.is_none());
    match &node.cause {
        Some(FailureCause::ContractViolation { violations }) => {
            assert!(matches!(
                violations[0],
                ContractViolation::WordCount { observed: 40, .. }
            ));
        }
        other => panic!("expected contract violation, got {:?}", other),
    }

    let attempts: Vec<u32> = capability.calls().iter().map(|c| c.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_failure_propagates_to_dependents_only() {
    let capability = Arc::new(
        ScriptedCapability::new()
            .fault("research_topic", AgentFault::Unavailable("connection refused".into()))
            .reply("daily_summary", daily_summary()),
    );
    let engine = engine(Arc::clone(&capability), settings(1, 2));

    let run = engine
        .run_workflow(&["research_topic", "create_content", "daily_summary"], &topic())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.failed_nodes().count(), 2);

    let research = run.node("research_topic").unwrap();
    assert_eq!(research.retries, 1);
    assert!(matches!(
        &research.cause,
        Some(FailureCause::AgentUnavailable { message }) if message.contains("connection refused")
    ));

    let content = run.node("create_content").unwrap();
    assert_eq!(
        content.cause,
        Some(FailureCause::DependencyFailed {
            dependency: "research_topic".to_string()
        })
    );
    assert_eq!(content.attempts, 0);
    assert!(capability.calls_for("create_content").is_empty());

    assert!(run.node("daily_summary").unwrap().is_completed());
}

#[tokio::test(start_paused = true)]
async fn test_agent_fault_backs_off_then_succeeds() {
    let capability = Arc::new(
        ScriptedCapability::new()
            .fault("find_leads", AgentFault::Timeout(Duration::from_secs(30)))
            .reply("find_leads", leads()),
    );
    let engine = engine(Arc::clone(&capability), EngineSettings::default());

    let started = tokio::time::Instant::now();
    let run = engine
        .run_workflow(&["find_leads"], &ParameterSet::new())
        .await
        .unwrap();

    assert!(run.is_completed());
    let node = run.node("find_leads").unwrap();
    assert_eq!(node.attempts, 2);
    assert_eq!(node.retries, 1);
    assert!(started.elapsed() >= RetryPolicy::default().backoff_initial);
}

#[tokio::test]
async fn test_preflight_reports_every_missing_parameter() {
    let capability = Arc::new(ScriptedCapability::new());
    let engine = engine(Arc::clone(&capability), settings(2, 2));

    let err = engine
        .run_workflow(&["research_topic", "create_content"], &ParameterSet::new())
        .await
        .unwrap_err();

    match err {
        PostcrewError::MissingParameters(missing) => {
            let tasks: Vec<&str> = missing.iter().map(|m| m.task.as_str()).collect();
            assert_eq!(tasks, vec!["research_topic", "create_content"]);
            assert!(missing.iter().all(|m| m.placeholder == "topic"));
        }
        other => panic!("expected MissingParameters, got {:?}", other),
    }
    assert!(capability.calls().is_empty());
}

#[tokio::test]
async fn test_unbound_placeholder_fails_node_without_retry() {
    let capability = Arc::new(ScriptedCapability::new().reply("daily_summary", daily_summary()));
    let mut settings = settings(2, 2);
    settings.preflight = false;
    let engine = engine(Arc::clone(&capability), settings);

    let run = engine
        .run_workflow(&["research_topic", "create_content", "daily_summary"], &ParameterSet::new())
        .await
        .unwrap();

    let research = run.node("research_topic").unwrap();
    assert_eq!(
        research.cause,
        Some(FailureCause::UnboundPlaceholder {
            placeholder: "topic".to_string()
        })
    );
    assert_eq!(research.attempts, 0);
    assert!(matches!(
        run.node("create_content").unwrap().cause,
        Some(FailureCause::DependencyFailed { .. })
    ));
    assert!(run.node("daily_summary").unwrap().is_completed());
    assert_eq!(capability.calls().len(), 1);
}

#[tokio::test]
async fn test_caller_errors_are_reported_before_any_node_starts() {
    let capability = Arc::new(ScriptedCapability::new().reply("create_content", post(200)));
    let engine = engine(Arc::clone(&capability), settings(2, 2));

    let err = engine
        .run_workflow(&["create_content"], &topic())
        .await
        .unwrap_err();
    assert!(matches!(err, PostcrewError::UserError(_)));

    let err = engine
        .run_workflow(&["research_topic", "publish"], &topic())
        .await
        .unwrap_err();
    assert!(matches!(err, PostcrewError::NotFound(name) if name == "publish"));

    assert!(capability.calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_fails_remaining_nodes() {
    let capability = Arc::new(
        ScriptedCapability::new()
            .reply("research_topic", RESEARCH)
            .delay("research_topic", Duration::from_secs(60)),
    );
    let engine = engine(Arc::clone(&capability), settings(2, 2));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let run = engine
        .run_workflow_with_cancel(&["research_topic", "create_content"], &topic(), cancel)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Cancelled);
    for node in &run.nodes {
        assert_eq!(node.status, NodeStatus::Failed);
        assert_eq!(node.cause, Some(FailureCause::Cancelled));
        assert!(node.output.is_none());
    }
    assert!(capability.calls_for("create_content").is_empty());
}

#[tokio::test]
async fn test_cancellation_reaches_independent_branch() {
    let capability = Arc::new(
        ScriptedCapability::new()
            .reply("research_topic", RESEARCH)
            .reply("daily_summary", daily_summary())
            .delay("research_topic", Duration::from_secs(60))
            .delay("daily_summary", Duration::from_secs(60)),
    );
    // One permit: one of the two ready nodes runs, the other waits for it.
    let engine = engine(Arc::clone(&capability), settings(2, 1));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let run = engine
        .run_workflow_with_cancel(
            &["research_topic", "create_content", "daily_summary"],
            &topic(),
            cancel,
        )
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Cancelled);
    for task in ["research_topic", "create_content", "daily_summary"] {
        let node = run.node(task).unwrap();
        assert_eq!(node.status, NodeStatus::Failed, "{}", task);
        assert_eq!(node.cause, Some(FailureCause::Cancelled), "{}", task);
        assert!(node.output.is_none());
    }

    assert_eq!(capability.calls().len(), 1);
    assert_eq!(run.nodes.iter().map(|n| n.attempts).sum::<u32>(), 1);
    assert_eq!(run.node("create_content").unwrap().attempts, 0);
}

#[tokio::test]
async fn test_failure_propagates_through_chain() {
    let store = Arc::new(
        TemplateStore::from_yaml(
            "a:\n  description: a\n  expected_output: a\n\
             b:\n  depends_on: [a]\n  description: b\n  expected_output: b\n\
             c:\n  depends_on: [b]\n  description: c\n  expected_output: c\n",
        )
        .unwrap(),
    );
    let capability = Arc::new(
        ScriptedCapability::new().fault("a", AgentFault::Unavailable("down".into())),
    );
    let engine =
        WorkflowEngine::new(store, capability.clone()).with_settings(settings(0, 2));

    let run = engine
        .run_workflow(&["c", "b", "a"], &ParameterSet::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.node("b").unwrap().cause,
        Some(FailureCause::DependencyFailed {
            dependency: "a".to_string()
        })
    );
    assert_eq!(
        run.node("c").unwrap().cause,
        Some(FailureCause::DependencyFailed {
            dependency: "b".to_string()
        })
    );
    assert_eq!(capability.calls().len(), 1);
}

#[tokio::test]
async fn test_journal_records_run_lifecycle() {
    let temp = TempDir::new().unwrap();
    let journal = Arc::new(EventJournal::new(temp.path().join("events.ndjson")));
    let capability = Arc::new(
        ScriptedCapability::new()
            .reply("find_leads", "not a list")
            .reply("find_leads", leads()),
    );
    let engine = engine(Arc::clone(&capability), settings(2, 2)).with_journal(Arc::clone(&journal));

    let run = engine
        .run_workflow(&["find_leads"], &ParameterSet::new())
        .await
        .unwrap();

    let events = journal.read_all().unwrap();
    assert!(events.iter().all(|e| e.run_id == run.run_id));
    let actions: Vec<EventAction> = events.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            EventAction::RunStarted,
            EventAction::NodeBound,
            EventAction::AttemptStarted,
            EventAction::ContractViolation,
            EventAction::AttemptStarted,
            EventAction::NodeCompleted,
            EventAction::RunFinished,
        ]
    );
}

#[test]
fn test_dry_run_binds_with_upstream_stand_ins() {
    let engine = engine(Arc::new(ScriptedCapability::new()), settings(2, 2));

    let bound = engine
        .dry_run(&["research_topic", "create_content"], &topic())
        .unwrap();

    assert_eq!(bound.len(), 2);
    assert!(bound[1].description.contains("<output of research_topic>"));
    assert!(bound[1].description.contains("'remote work productivity'"));

    let err = engine.dry_run(&["research_topic"], &ParameterSet::new()).unwrap_err();
    assert!(matches!(err, PostcrewError::MissingParameters(_)));
}

#[test]
fn test_run_serializes_to_json() {
    let run = WorkflowRun {
        run_id: "r".to_string(),
        started_at: chrono::Utc::now(),
        finished_at: chrono::Utc::now(),
        status: RunStatus::Failed,
        parameters: topic(),
        nodes: vec![],
    };
    let json: serde_json::Value = serde_json::from_str(&run.to_json().unwrap()).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["parameters"]["topic"], "remote work productivity");
}
