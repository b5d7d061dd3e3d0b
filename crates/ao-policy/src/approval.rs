//! Human-in-the-loop confirmation for tool calls the policy engine
//! marks `confirm`. A timeout or an explicit denial is treated the
//! same as a policy `deny`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug)]
pub enum ApprovalDecision {
    Approved,
    Denied { reason: Option<String> },
}

pub struct PendingApproval {
    pub id: Uuid,
    pub call_id: String,
    pub tool_name: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub respond: oneshot::Sender<ApprovalDecision>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalInfo {
    pub id: Uuid,
    pub call_id: String,
    pub tool_name: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&PendingApproval> for ApprovalInfo {
    fn from(p: &PendingApproval) -> Self {
        Self {
            id: p.id,
            call_id: p.call_id.clone(),
            tool_name: p.tool_name.clone(),
            session_id: p.session_id.clone(),
            created_at: p.created_at,
        }
    }
}

/// Thread-safe store for pending tool-call confirmations.
pub struct ApprovalStore {
    pending: RwLock<HashMap<Uuid, PendingApproval>>,
    timeout: Duration,
}

impl ApprovalStore {
    pub fn new(timeout: Duration) -> Self {
        Self { pending: RwLock::new(HashMap::new()), timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn insert(&self, approval: PendingApproval) -> ApprovalInfo {
        let info = ApprovalInfo::from(&approval);
        self.pending.write().insert(approval.id, approval);
        info
    }

    pub fn approve(&self, id: &Uuid) -> bool {
        if let Some(pending) = self.pending.write().remove(id) {
            let _ = pending.respond.send(ApprovalDecision::Approved);
            return true;
        }
        false
    }

    pub fn deny(&self, id: &Uuid, reason: Option<String>) -> bool {
        if let Some(pending) = self.pending.write().remove(id) {
            let _ = pending.respond.send(ApprovalDecision::Denied { reason });
            return true;
        }
        false
    }

    pub fn remove_expired(&self, id: &Uuid) {
        self.pending.write().remove(id);
    }

    pub fn list_pending(&self) -> Vec<ApprovalInfo> {
        self.pending.read().values().map(ApprovalInfo::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> ApprovalStore {
        ApprovalStore::new(Duration::from_secs(300))
    }

    fn make_pending() -> (PendingApproval, oneshot::Receiver<ApprovalDecision>) {
        let (tx, rx) = oneshot::channel();
        let pending = PendingApproval {
            id: Uuid::new_v4(),
            call_id: "c1".into(),
            tool_name: "run_shell".into(),
            session_id: "s1".into(),
            created_at: Utc::now(),
            respond: tx,
        };
        (pending, rx)
    }

    #[test]
    fn insert_and_list() {
        let store = make_store();
        let (pending, _rx) = make_pending();
        let id = pending.id;
        store.insert(pending);
        let list = store.list_pending();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
    }

    #[tokio::test]
    async fn approve_resolves_channel() {
        let store = make_store();
        let (pending, rx) = make_pending();
        let id = pending.id;
        store.insert(pending);
        assert!(store.approve(&id));
        assert!(matches!(rx.await.unwrap(), ApprovalDecision::Approved));
        assert!(store.list_pending().is_empty());
    }

    #[tokio::test]
    async fn deny_resolves_channel_with_reason() {
        let store = make_store();
        let (pending, rx) = make_pending();
        let id = pending.id;
        store.insert(pending);
        assert!(store.deny(&id, Some("too dangerous".into())));
        match rx.await.unwrap() {
            ApprovalDecision::Denied { reason } => assert_eq!(reason.as_deref(), Some("too dangerous")),
            _ => panic!("expected Denied"),
        }
    }

    #[test]
    fn approve_nonexistent_returns_false() {
        assert!(!make_store().approve(&Uuid::new_v4()));
    }

    #[test]
    fn remove_expired_clears_entry() {
        let store = make_store();
        let (pending, _rx) = make_pending();
        let id = pending.id;
        store.insert(pending);
        store.remove_expired(&id);
        assert!(store.list_pending().is_empty());
    }
}
