use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::tree::{DecisionTree, Node, NodeId, StructuralError, TreeOption};

/// How a caller refers to one option of the current question.
///
/// Index is the primary key. A label only resolves when exactly one option on
/// the node carries it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Choice {
    Index(usize),
    Label(String),
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Label(label) => write!(f, "`{label}`"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: NodeId,
    pub label: String,
    pub to: NodeId,
    pub terminal: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TraversalError {
    #[error("current node `{0}` is not part of the tree")]
    UnknownNode(NodeId),
    #[error("node `{node}` is a result; no further choices are accepted")]
    InvalidTransition { node: NodeId },
    #[error("choice {choice} does not match any option of node `{node}`")]
    UnknownOption { node: NodeId, choice: Choice },
    #[error("label `{label}` matches more than one option of node `{node}`")]
    AmbiguousOption { node: NodeId, label: String },
}

/// Walks one validated tree from its root towards a result.
///
/// The engine only moves when [`TraversalEngine::apply`] (or `choose`) is
/// called. Rejected choices never change the current node.
#[derive(Clone, Debug)]
pub struct TraversalEngine {
    tree: Arc<DecisionTree>,
    current: NodeId,
}

impl TraversalEngine {
    pub fn new(tree: Arc<DecisionTree>) -> Result<Self, StructuralError> {
        tree.validate()?;
        let current = tree.root.clone();
        Ok(Self { tree, current })
    }

    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    pub fn current_id(&self) -> &NodeId {
        &self.current
    }

    pub fn current_node(&self) -> Result<&Node, TraversalError> {
        self.tree
            .node(&self.current)
            .ok_or_else(|| TraversalError::UnknownNode(self.current.clone()))
    }

    pub fn is_terminal(&self) -> bool {
        self.current_node().map(Node::is_terminal).unwrap_or(false)
    }

    pub fn is_at_root(&self) -> bool {
        self.current == self.tree.root
    }

    /// Finds the option of the current question that `choice` refers to.
    pub fn resolve(&self, choice: &Choice) -> Result<&TreeOption, TraversalError> {
        let question = match self.current_node()? {
            Node::Question(question) => question,
            Node::Result(result) => {
                return Err(TraversalError::InvalidTransition { node: result.id.clone() });
            }
        };

        match choice {
            Choice::Index(index) => question.options.get(*index).ok_or_else(|| {
                TraversalError::UnknownOption { node: question.id.clone(), choice: choice.clone() }
            }),
            Choice::Label(label) => {
                let mut matches = question.options.iter().filter(|option| &option.label == label);
                match (matches.next(), matches.next()) {
                    (Some(option), None) => Ok(option),
                    (Some(_), Some(_)) => Err(TraversalError::AmbiguousOption {
                        node: question.id.clone(),
                        label: label.clone(),
                    }),
                    (None, _) => Err(TraversalError::UnknownOption {
                        node: question.id.clone(),
                        choice: choice.clone(),
                    }),
                }
            }
        }
    }

    pub fn apply(&mut self, choice: &Choice) -> Result<TransitionOutcome, TraversalError> {
        let option = self.resolve(choice)?;
        let label = option.label.clone();
        let to = option.target.clone();

        let terminal =
            self.tree.node(&to).map(Node::is_terminal).ok_or_else(|| {
                TraversalError::UnknownNode(to.clone())
            })?;

        let from = std::mem::replace(&mut self.current, to.clone());
        Ok(TransitionOutcome { from, label, to, terminal })
    }

    /// Applies `choice` and returns the node it led to.
    pub fn choose(&mut self, choice: &Choice) -> Result<&Node, TraversalError> {
        self.apply(choice)?;
        self.current_node()
    }

    pub fn apply_with_audit<S>(
        &mut self,
        choice: &Choice,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, TraversalError>
    where
        S: AuditSink,
    {
        let at = self.current.clone();
        let result = self.apply(choice);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "traversal.choice_applied",
                        AuditCategory::Traversal,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.0.clone())
                    .with_metadata("to", outcome.to.0.clone())
                    .with_metadata("label", outcome.label.clone())
                    .with_metadata("terminal", outcome.terminal.to_string()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "traversal.choice_rejected",
                        AuditCategory::Traversal,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("at", at.0)
                    .with_metadata("choice", choice.to_string())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    pub fn reset(&mut self) {
        self.current = self.tree.root.clone();
    }
}
