use std::sync::Arc;

use ao_domain::stream::StreamChunk;
use ao_orchestrator::Orchestrator;
use ao_policy::approval::ApprovalStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Drive one interactive session from stdin/stdout. Each line is sent
/// as a user turn; `approve <id>` / `deny <id>` resolve a pending
/// confirmation printed by a prior turn; `exit` / `quit` ends the loop.
pub async fn run(orchestrator: Orchestrator, approvals: Arc<ApprovalStore>, session_id: String) -> anyhow::Result<()> {
    println!("session {session_id} ready. Type a message, or `exit` to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        use std::io::Write;
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        if let Some(id) = line.strip_prefix("approve ") {
            resolve_approval(&approvals, id.trim(), true);
            continue;
        }
        if let Some(id) = line.strip_prefix("deny ") {
            resolve_approval(&approvals, id.trim(), false);
            continue;
        }

        let cancel = CancellationToken::new();
        let mut rx = orchestrator.turn(session_id.clone(), line, cancel);

        while let Some(chunk) = rx.recv().await {
            print_chunk(&approvals, chunk);
        }
    }

    Ok(())
}

fn resolve_approval(approvals: &ApprovalStore, id: &str, approve: bool) {
    let Ok(uuid) = id.parse() else {
        println!("not a valid approval id: {id}");
        return;
    };
    let resolved = if approve { approvals.approve(&uuid) } else { approvals.deny(&uuid, None) };
    if !resolved {
        println!("no pending approval with id {id} (already resolved or expired)");
    }
}

fn print_chunk(approvals: &ApprovalStore, chunk: StreamChunk) {
    match chunk {
        StreamChunk::TextDelta { text } => print!("{text}"),
        StreamChunk::ToolCallStarted { call_id, tool_name } => println!("\n[tool call {call_id}: {tool_name}]"),
        StreamChunk::ToolCallArgumentsDelta { .. } => {}
        StreamChunk::ToolCallCompleted { .. } => {}
        StreamChunk::PolicyDecision(decision) => {
            println!("[policy {}: {} — {}]", decision.tool_name, decision.decision, decision.reason);
            if decision.decision == "confirm" {
                for pending in approvals.list_pending() {
                    if pending.call_id == decision.call_id {
                        println!("  awaiting operator: `approve {}` or `deny {}`", pending.id, pending.id);
                    }
                }
            }
        }
        StreamChunk::ToolResult { call_id, status, output } => println!("[tool result {call_id}: {status}] {output}"),
        StreamChunk::TurnComplete => println!(),
        StreamChunk::Error { message } => println!("\n[error] {message}"),
    }
}
