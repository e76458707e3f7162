use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditContext, AuditSink};
use crate::domain::path::{OwnerId, PathEntry, RecordId};
use crate::domain::tree::{DecisionTree, Node, NodeId, StructuralError, TreeId};
use crate::errors::{ApplicationError, DomainError};
use crate::store::{StoreError, TreeStore};
use crate::traversal::engine::{Choice, TransitionOutcome, TraversalEngine, TraversalError};
use crate::traversal::recorder::PathRecorder;

/// One user's walk through a tree: the engine, the path taken so far and
/// whether a result has been reached.
#[derive(Clone, Debug)]
pub struct Session {
    id: String,
    engine: TraversalEngine,
    path: PathRecorder,
    complete: bool,
}

impl Session {
    pub fn start(tree: Arc<DecisionTree>) -> Result<Self, StructuralError> {
        let engine = TraversalEngine::new(tree)?;
        let complete = engine.is_terminal();
        let session =
            Self { id: Uuid::new_v4().to_string(), engine, path: PathRecorder::new(), complete };
        debug!(
            event_name = "session.started",
            session_id = %session.id,
            tree_id = %session.tree().id,
            "traversal session started"
        );
        Ok(session)
    }

    /// Fetches `tree_id` from the store, validates it and starts a session.
    pub async fn open<S>(store: &S, tree_id: &TreeId) -> Result<Self, ApplicationError>
    where
        S: TreeStore + ?Sized,
    {
        let tree = store.fetch_tree(tree_id).await?;
        let session = Self::start(Arc::new(tree)).map_err(DomainError::from)?;
        info!(
            event_name = "session.opened",
            session_id = %session.id,
            tree_id = %tree_id,
            "decision tree fetched and validated"
        );
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tree(&self) -> &DecisionTree {
        self.engine.tree()
    }

    pub fn current_id(&self) -> &NodeId {
        self.engine.current_id()
    }

    pub fn current_node(&self) -> Result<&Node, TraversalError> {
        self.engine.current_node()
    }

    pub fn path(&self) -> &[PathEntry] {
        self.path.entries()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// 1-based number of the question currently on screen.
    pub fn question_number(&self) -> usize {
        self.path.len() + 1
    }

    /// Prompt and chosen label for every answered question, in order.
    pub fn history(&self) -> Vec<(&str, &str)> {
        self.path
            .entries()
            .iter()
            .map(|entry| {
                let prompt = match self.tree().node(&entry.node_id) {
                    Some(Node::Question(question)) => question.prompt.as_str(),
                    _ => entry.node_id.0.as_str(),
                };
                (prompt, entry.chosen_label.as_str())
            })
            .collect()
    }

    pub fn choose(&mut self, choice: &Choice) -> Result<&Node, TraversalError> {
        let outcome = self.engine.apply(choice)?;
        self.advance(outcome)
    }

    pub fn choose_with_audit<S>(
        &mut self,
        choice: &Choice,
        sink: &S,
        correlation_id: &str,
    ) -> Result<&Node, TraversalError>
    where
        S: AuditSink,
    {
        let audit = AuditContext::new(
            Some(self.tree().id.clone()),
            Some(self.id.clone()),
            correlation_id,
            "traversal-session",
        );
        let outcome = self.engine.apply_with_audit(choice, sink, &audit)?;
        self.advance(outcome)
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.path.clear();
        self.complete = self.engine.is_terminal();
        debug!(event_name = "session.reset", session_id = %self.id, "traversal session reset");
    }

    /// Sends the path to the store. Session state is left untouched whether or
    /// not the store accepts it.
    pub async fn submit<S>(&self, store: &S, owner_id: &OwnerId) -> Result<RecordId, StoreError>
    where
        S: TreeStore + ?Sized,
    {
        self.path.submit(store, owner_id, &self.tree().id).await
    }

    fn advance(&mut self, outcome: TransitionOutcome) -> Result<&Node, TraversalError> {
        debug!(
            event_name = "session.choice_applied",
            session_id = %self.id,
            from = %outcome.from,
            to = %outcome.to,
            "choice applied"
        );
        self.complete = outcome.terminal;
        self.path.record(outcome.from, outcome.label);
        self.engine.current_node()
    }
}
