use thiserror::Error;

use crate::domain::tree::StructuralError;
use crate::store::StoreError;
use crate::traversal::TraversalError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Traversal(#[from] TraversalError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "That choice is not available here. Pick one of the listed options."
            }
            Self::NotFound { .. } => "The requested decision tree does not exist.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::NotFound { .. } => "not_found",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Traversal(TraversalError::UnknownNode(node))) => {
                Self::Internal {
                    message: format!("traversal reached unknown node `{node}`"),
                    correlation_id: unassigned(),
                }
            }
            ApplicationError::Domain(DomainError::Traversal(error)) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Domain(DomainError::Structural(error)) => Self::Internal {
                message: format!("decision tree is malformed: {error}"),
                correlation_id: unassigned(),
            },
            ApplicationError::Store(error @ StoreError::NotFound(_)) => {
                Self::NotFound { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Store(StoreError::Decode(detail)) => Self::Internal {
                message: format!("stored decision tree is malformed: {detail}"),
                correlation_id: unassigned(),
            },
            ApplicationError::Store(error) => Self::ServiceUnavailable {
                message: error.to_string(),
                correlation_id: unassigned(),
            },
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::tree::{NodeId, StructuralError, TreeId};
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::store::StoreError;
    use crate::traversal::{Choice, TraversalError};

    #[test]
    fn rejected_choice_maps_to_bad_request() {
        let interface = ApplicationError::from(DomainError::from(TraversalError::UnknownOption {
            node: NodeId::from("q1"),
            choice: Choice::Index(7),
        }))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "That choice is not available here. Pick one of the listed options."
        );
    }

    #[test]
    fn unknown_node_is_an_internal_defect() {
        let interface = ApplicationError::from(DomainError::from(TraversalError::UnknownNode(
            NodeId::from("ghost"),
        )))
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.error_class(), "internal");
    }

    #[test]
    fn malformed_tree_is_internal() {
        let interface = ApplicationError::from(DomainError::from(StructuralError::MissingRoot {
            root: NodeId::from("q0"),
        }))
        .into_interface("req-3");

        assert!(matches!(
            interface,
            InterfaceError::Internal { ref message, .. } if message.contains("q0")
        ));
    }

    #[test]
    fn missing_tree_maps_to_not_found() {
        let interface = ApplicationError::from(StoreError::NotFound(TreeId::from("nope")))
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::NotFound { .. }));
        assert_eq!(interface.user_message(), "The requested decision tree does not exist.");
    }

    #[test]
    fn undecodable_stored_tree_is_internal_not_retryable() {
        let interface =
            ApplicationError::from(StoreError::Decode("missing field `text`".to_owned()))
                .into_interface("req-6");

        assert!(matches!(
            interface,
            InterfaceError::Internal { ref message, .. } if message.contains("missing field")
        ));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn failed_submission_maps_to_service_unavailable() {
        let interface =
            ApplicationError::from(StoreError::Submit("database lock timeout".to_owned()))
                .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }
}
