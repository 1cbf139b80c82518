//! Error types for backend graph operations.

use thiserror::Error;

use crate::node::{NodeId, NodeKind, ParamKind};

/// Errors that can occur during backend graph operations.
///
/// None of these are fatal to the engine: call sites that expect them
/// (stopping an oscillator twice, touching a node that was already released)
/// log and move on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The node id was never issued by this backend.
    #[error("{0} not found")]
    NodeNotFound(NodeId),

    /// The node was released and can no longer be used.
    #[error("{0} was already released")]
    NodeReleased(NodeId),

    /// The node kind does not expose the requested parameter.
    #[error("{node} ({kind:?}) has no {param:?} parameter")]
    NoSuchParam {
        /// Node that was addressed
        node: NodeId,
        /// Kind of that node
        kind: NodeKind,
        /// Parameter that was requested
        param: ParamKind,
    },

    /// The operation only applies to another kind of node.
    #[error("{node} is a {actual:?} node, expected {expected:?}")]
    WrongNodeKind {
        /// Node that was addressed
        node: NodeId,
        /// Kind the operation requires
        expected: NodeKind,
        /// Kind the node actually has
        actual: NodeKind,
    },

    /// The node is not in a state that allows the operation
    /// (e.g. stopping an oscillator that already ended).
    #[error("invalid state for {node}: {reason}")]
    InvalidState {
        /// Node that was addressed
        node: NodeId,
        /// Human-readable reason
        reason: &'static str,
    },

    /// A clock or event time moved backwards.
    #[error("time {requested} is earlier than current time {current}")]
    NonMonotonicTime {
        /// Time that was requested
        requested: f64,
        /// Current backend time
        current: f64,
    },
}
