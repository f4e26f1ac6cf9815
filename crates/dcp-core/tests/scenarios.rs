//! End-to-end scenarios through the public engine surface: a scripted
//! host, real transcripts, and the full transform pipeline.

use async_trait::async_trait;
use dcp_core::config::PruningSummary;
use dcp_core::tools::{CompressTool, PruneTool, Tool, ToolContext};
use dcp_core::{DcpConfig, Engine};
use dcp_host::message::StepStartPart;
use dcp_host::{
    HostClient, HostResult, MessageInfo, MessageWithParts, Part, Role, Session, TextPart, Toast,
    ToolPart, ToolState,
};
use dcp_storage::MemoryStorage;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Scripted host recording prompts and serving a fixed transcript.
#[derive(Clone, Default)]
struct ScriptedHost {
    messages: Arc<Mutex<Vec<MessageWithParts>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedHost {
    fn set_messages(&self, messages: &[MessageWithParts]) {
        *self.messages.lock().unwrap() = messages.to_vec();
    }

    fn prompt_containing(&self, needle: &str) -> bool {
        self.prompts.lock().unwrap().iter().any(|p| p.contains(needle))
    }
}

#[async_trait]
impl HostClient for ScriptedHost {
    async fn session_get(&self, session_id: &str) -> HostResult<Session> {
        Ok(Session {
            id: session_id.to_string(),
            parent_id: None,
            title: String::new(),
        })
    }

    async fn session_messages(&self, _: &str) -> HostResult<Vec<MessageWithParts>> {
        Ok(self.messages.lock().unwrap().clone())
    }

    async fn session_prompt(&self, _: &str, text: &str, _: bool) -> HostResult<()> {
        self.prompts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn show_toast(&self, _: Toast) -> HostResult<()> {
        Ok(())
    }
}

fn user(session_id: &str, text: &str) -> MessageWithParts {
    let mut msg = MessageWithParts::new(MessageInfo::new(Role::User, session_id));
    let id = msg.info.id.clone();
    msg.parts.push(Part::Text(TextPart::new(id, text)));
    msg
}

fn tool_call(
    session_id: &str,
    call_id: &str,
    tool: &str,
    input: Value,
    state_kind: &str,
    payload: &str,
) -> MessageWithParts {
    let mut msg = MessageWithParts::new(MessageInfo::new(Role::Assistant, session_id));
    let id = msg.info.id.clone();
    let state = match state_kind {
        "error" => ToolState::Error {
            input,
            error: payload.into(),
        },
        _ => ToolState::Completed {
            input,
            output: payload.into(),
        },
    };
    msg.parts.push(Part::Tool(ToolPart::new(id, call_id, tool, state)));
    msg
}

fn with_step_starts(session_id: &str, count: usize) -> MessageWithParts {
    let mut msg = MessageWithParts::new(MessageInfo::new(Role::Assistant, session_id));
    let id = msg.info.id.clone();
    for i in 0..count {
        msg.parts.push(Part::StepStart(StepStartPart {
            id: format!("prt_step{i}"),
            message_id: id.clone(),
        }));
    }
    msg
}

fn engine(config: DcpConfig, host: &ScriptedHost) -> Arc<Engine> {
    Arc::new(Engine::new(
        config,
        Arc::new(MemoryStorage::new()),
        Arc::new(host.clone()),
    ))
}

fn detailed_config() -> DcpConfig {
    let mut config = DcpConfig::default();
    config.pruning_summary = PruningSummary::Detailed;
    config
}

// S1: duplicate reads are deduplicated and reported.
#[tokio::test]
async fn s1_duplicate_reads_dedup() {
    let host = ScriptedHost::default();
    let engine = engine(detailed_config(), &host);

    let mut messages = vec![
        user("ses_a", "look at /x twice"),
        tool_call("ses_a", "call_A", "read", json!({"filePath": "/x"}), "ok", "v1"),
        tool_call("ses_a", "call_B", "read", json!({"filePath": "/x"}), "ok", "v2"),
    ];
    host.set_messages(&messages);
    engine.on_messages_transform(&mut messages).await;

    let handle = engine.ensure_initialized("ses_a").await;
    let state = handle.lock().await;
    assert!(state.is_pruned("call_a"));
    assert!(!state.is_pruned("call_b"));
    drop(state);

    assert!(host.prompt_containing("read (1 duplicate): /x (1× duplicate)"));

    // The duplicate's output is redacted in the transformed stream.
    let redacted = messages
        .iter()
        .flat_map(|m| m.tool_parts())
        .find(|t| t.call_id == "call_A")
        .unwrap();
    assert!(redacted.state.output().unwrap().starts_with("[Output removed"));
}

// S2: a write superseded by a later read loses its input content only.
#[tokio::test]
async fn s2_superseded_write_input_redacted() {
    let host = ScriptedHost::default();
    let engine = engine(DcpConfig::default(), &host);

    let original = vec![
        user("ses_a", "write then read"),
        tool_call(
            "ses_a",
            "call_W",
            "write",
            json!({"filePath": "/x", "content": "the whole file body"}),
            "ok",
            "wrote /x",
        ),
        tool_call("ses_a", "call_R", "read", json!({"filePath": "/x"}), "ok", "the whole file body"),
    ];
    host.set_messages(&original);

    let mut first = original.clone();
    engine.on_messages_transform(&mut first).await;

    // Next turn: the host hands a fresh copy; redaction must re-apply.
    let mut second = original.clone();
    engine.on_messages_transform(&mut second).await;

    let write = second
        .iter()
        .flat_map(|m| m.tool_parts())
        .find(|t| t.call_id == "call_W")
        .unwrap();
    assert!(write.state.input()["content"]
        .as_str()
        .unwrap()
        .starts_with("[content removed"));
    assert_eq!(write.state.input()["filePath"], "/x");
    assert_eq!(write.state.output(), Some("wrote /x"));
}

// S3: an errored bash call past the turn threshold has its input purged
// but keeps the error text.
#[tokio::test]
async fn s3_stale_error_input_purged() {
    let host = ScriptedHost::default();
    let engine = engine(DcpConfig::default(), &host);

    // Turn 5: the bash call errors.
    let error_call = tool_call(
        "ses_a",
        "call_E",
        "bash",
        json!({"command": "npm test"}),
        "error",
        "exit code 1",
    );
    let mut turn5 = vec![
        user("ses_a", "run the tests"),
        with_step_starts("ses_a", 5),
        error_call.clone(),
    ];
    host.set_messages(&turn5);
    engine.on_messages_transform(&mut turn5).await;

    // Turn 12: well past purgeErrors.turns = 3.
    let mut turn12 = vec![
        user("ses_a", "run the tests"),
        with_step_starts("ses_a", 12),
        error_call,
    ];
    engine.on_messages_transform(&mut turn12).await;

    let bash = turn12
        .iter()
        .flat_map(|m| m.tool_parts())
        .find(|t| t.call_id == "call_E")
        .unwrap();
    assert!(bash.state.input()["command"]
        .as_str()
        .unwrap()
        .starts_with("[Input removed"));
    assert_eq!(bash.state.error(), Some("exit code 1"));
}

// S4: compress collects every message and tool call in range.
#[tokio::test]
async fn s4_compress_range_counts() {
    let host = ScriptedHost::default();
    let engine = engine(DcpConfig::default(), &host);

    // 8 messages in range: start user, 5 single-tool messages, one
    // message packing 7 tool calls, end user. 12 tool calls total.
    let mut messages = vec![user("ses_a", "Phase A begin")];
    for i in 0..5 {
        messages.push(tool_call(
            "ses_a",
            &format!("call_{i}"),
            "bash",
            json!({"command": format!("step {i}")}),
            "ok",
            "done",
        ));
    }
    let mut packed = MessageWithParts::new(MessageInfo::new(Role::Assistant, "ses_a"));
    let packed_id = packed.info.id.clone();
    for i in 5..12 {
        packed.parts.push(Part::Tool(ToolPart::new(
            packed_id.clone(),
            format!("call_{i}"),
            "bash",
            ToolState::Completed {
                input: json!({"command": format!("step {i}")}),
                output: "done".into(),
            },
        )));
    }
    messages.push(packed);
    messages.push(user("ses_a", "Phase A end"));
    assert_eq!(messages.len(), 8);

    host.set_messages(&messages);
    let mut prepared = messages.clone();
    engine.on_messages_transform(&mut prepared).await;

    // Every command differs, so the strategies mark nothing here.
    let tool = CompressTool::new(engine.clone());
    tool.execute(
        json!({
            "topic": "Phase A",
            "content": {
                "startString": "Phase A begin",
                "endString": "Phase A end",
                "summary": "Phase A: ran 12 setup steps."
            }
        }),
        &ToolContext {
            session_id: "ses_a".into(),
        },
    )
    .await
    .unwrap();

    let handle = engine.ensure_initialized("ses_a").await;
    let state = handle.lock().await;
    assert_eq!(state.prune.message_ids.len(), 8);
    assert_eq!(state.prune.tool_ids.len(), 12);
    assert_eq!(state.compress_summaries.len(), 1);
    assert_eq!(
        state.compress_summaries[0].anchor_message_id,
        messages[0].info.id
    );
}

// S5: right after a successful prune, the injector emits the cooldown
// instead of the manifest.
#[tokio::test]
async fn s5_cooldown_after_prune() {
    let host = ScriptedHost::default();
    let engine = engine(DcpConfig::default(), &host);

    let messages = vec![
        user("ses_a", "inspect"),
        tool_call("ses_a", "call_A", "read", json!({"filePath": "/x"}), "ok", "v1"),
        tool_call("ses_a", "call_B", "read", json!({"filePath": "/y"}), "ok", "v2"),
    ];
    host.set_messages(&messages);
    let mut prepared = messages.clone();
    engine.on_messages_transform(&mut prepared).await;

    let tool = PruneTool::new(engine.clone());
    tool.execute(
        json!({"ids": ["0"]}),
        &ToolContext {
            session_id: "ses_a".into(),
        },
    )
    .await
    .unwrap();

    let mut next_turn = messages.clone();
    engine.on_messages_transform(&mut next_turn).await;

    let injected = next_turn.last().unwrap().text();
    assert!(injected.contains("<context-info>Context management was just performed."));
    assert!(!injected.contains("<prunable-tools>"));
}

// S6: concurrent sessions keep disjoint prune state.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s6_concurrent_sessions_disjoint() {
    let host = ScriptedHost::default();
    let engine = engine(DcpConfig::default(), &host);

    let mut tasks = Vec::new();
    for session in ["ses_a", "ses_b"] {
        let engine = engine.clone();
        let session = session.to_string();
        tasks.push(tokio::spawn(async move {
            for round in 0..20 {
                let mut messages = vec![
                    user(&session, "go"),
                    tool_call(
                        &session,
                        &format!("call_{session}_{round}"),
                        "read",
                        json!({"filePath": format!("/{session}/{round}")}),
                        "ok",
                        "content",
                    ),
                    tool_call(
                        &session,
                        &format!("call_{session}_{round}_dup"),
                        "read",
                        json!({"filePath": format!("/{session}/{round}")}),
                        "ok",
                        "content",
                    ),
                ];
                engine.on_messages_transform(&mut messages).await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let handle_a = engine.ensure_initialized("ses_a").await;
    let handle_b = engine.ensure_initialized("ses_b").await;
    let state_a = handle_a.lock().await;
    let state_b = handle_b.lock().await;

    assert!(!state_a.prune.tool_ids.is_empty());
    assert!(!state_b.prune.tool_ids.is_empty());
    assert!(state_a.prune.tool_ids.iter().all(|id| id.contains("ses_a")));
    assert!(state_b.prune.tool_ids.iter().all(|id| id.contains("ses_b")));
}

// Property 3: a newer host compaction clears all engine caches.
#[tokio::test]
async fn compaction_clears_everything() {
    let host = ScriptedHost::default();
    let engine = engine(DcpConfig::default(), &host);

    let mut messages = vec![
        user("ses_a", "inspect"),
        tool_call("ses_a", "call_A", "read", json!({"filePath": "/x"}), "ok", "v1"),
        tool_call("ses_a", "call_B", "read", json!({"filePath": "/x"}), "ok", "v2"),
    ];
    host.set_messages(&messages);
    engine.on_messages_transform(&mut messages).await;

    {
        let handle = engine.ensure_initialized("ses_a").await;
        assert!(!handle.lock().await.prune.tool_ids.is_empty());
    }

    // MessageInfo::new stamps the current time, which is newer than the
    // engine's initial last_compaction of zero.
    let mut summary = MessageWithParts::new(MessageInfo::new(Role::Assistant, "ses_a"));
    summary.info.summary = Some(true);
    let mut with_compaction = vec![user("ses_a", "continue"), summary];
    engine.on_messages_transform(&mut with_compaction).await;

    let handle = engine.ensure_initialized("ses_a").await;
    let state = handle.lock().await;
    assert!(state.prune.tool_ids.is_empty());
    assert!(state.prune.message_ids.is_empty());
    assert!(state.compress_summaries.is_empty());
    assert_eq!(state.nudge_counter, 0);
}
