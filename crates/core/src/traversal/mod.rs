pub mod engine;
pub mod recorder;
pub mod session;

pub use engine::{Choice, TransitionOutcome, TraversalEngine, TraversalError};
pub use recorder::PathRecorder;
pub use session::Session;
