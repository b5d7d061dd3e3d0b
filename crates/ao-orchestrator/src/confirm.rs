use std::sync::Arc;

use ao_policy::approval::{ApprovalDecision, ApprovalStore, PendingApproval};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Approved,
    Denied,
    TimedOut,
}

/// Register a pending approval and wait for an operator to resolve it
/// through the shared [`ApprovalStore`] (e.g. a CLI `approve`/`deny`
/// command, or an HTTP endpoint backed by the same store).
///
/// A timeout is treated the same as an explicit denial: the call
/// proceeds as `deny`, never as `allow`.
pub async fn await_confirmation(
    approvals: &Arc<ApprovalStore>,
    session_id: &str,
    call_id: &str,
    tool_name: &str,
) -> ConfirmOutcome {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let id = Uuid::new_v4();
    let pending = PendingApproval {
        id,
        call_id: call_id.to_string(),
        tool_name: tool_name.to_string(),
        session_id: session_id.to_string(),
        created_at: chrono::Utc::now(),
        respond: tx,
    };
    approvals.insert(pending);

    match tokio::time::timeout(approvals.timeout(), rx).await {
        Ok(Ok(ApprovalDecision::Approved)) => ConfirmOutcome::Approved,
        Ok(Ok(ApprovalDecision::Denied { .. })) => ConfirmOutcome::Denied,
        Ok(Err(_)) => ConfirmOutcome::Denied,
        Err(_) => {
            approvals.remove_expired(&id);
            ConfirmOutcome::TimedOut
        }
    }
}
