pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod store;
pub mod traversal;

pub use domain::path::{OwnerId, PathEntry, PathRecord, PathSubmission, RecordId};
pub use domain::tree::{
    DecisionTree, Node, NodeId, QuestionNode, ResultNode, StructuralError, TreeId, TreeOption,
    Verdict,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use store::{StoreError, TreeStore};
pub use traversal::{
    Choice, PathRecorder, Session, TransitionOutcome, TraversalEngine, TraversalError,
};
