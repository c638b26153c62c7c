use serde::{Deserialize, Serialize};

use crate::document::DocumentRef;

/// Per-document dispatch state
///
/// `Pending → Assigned → Done | Failed`. An unavailable processor sends an
/// assigned document back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Pending,
    Assigned,
    Done,
    Failed,
}

impl DocumentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Dispatch bookkeeping for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatus {
    pub reference: DocumentRef,
    pub state: DocumentState,
    /// Number of processing calls made for this document
    pub attempts: u32,
    /// Processor of the last attempt
    pub processor: Option<String>,
    /// Error of the last failed attempt
    pub error: Option<String>,
    /// Topics reported by the processor on success
    pub topics: Vec<String>,
}

impl DocumentStatus {
    pub fn pending(reference: DocumentRef) -> Self {
        Self {
            reference,
            state: DocumentState::Pending,
            attempts: 0,
            processor: None,
            error: None,
            topics: Vec::new(),
        }
    }
}

/// Phase of the queue's dispatch loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "message")]
pub enum DispatchPhase {
    Idle,
    Running,
    Finished,
    Failed(String),
}

/// Snapshot returned to the orchestrator when it polls the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub phase: DispatchPhase,
    /// Documents in registration order
    pub documents: Vec<DocumentStatus>,
    pub processors: usize,
}

impl QueueStatus {
    /// Whether every document reached `Done` or `Failed`
    pub fn all_terminal(&self) -> bool {
        self.documents.iter().all(|d| d.state.is_terminal())
    }

    pub fn count(&self, state: DocumentState) -> usize {
        self.documents.iter().filter(|d| d.state == state).count()
    }
}

/// Result of one `dispatch()` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub processed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!DocumentState::Pending.is_terminal());
        assert!(!DocumentState::Assigned.is_terminal());
        assert!(DocumentState::Done.is_terminal());
        assert!(DocumentState::Failed.is_terminal());
    }

    #[test]
    fn test_all_terminal() {
        let mut done = DocumentStatus::pending("a.md".into());
        done.state = DocumentState::Done;
        let pending = DocumentStatus::pending("b.md".into());

        let status = QueueStatus {
            phase: DispatchPhase::Running,
            documents: vec![done.clone(), pending],
            processors: 1,
        };
        assert!(!status.all_terminal());
        assert_eq!(status.count(DocumentState::Done), 1);

        let status = QueueStatus {
            phase: DispatchPhase::Finished,
            documents: vec![done],
            processors: 1,
        };
        assert!(status.all_terminal());
    }
}
