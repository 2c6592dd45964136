//! Error types for diagram construction and layout.

use thiserror::Error;

use crate::ir::LevelId;

/// Failures raised by the level/link store and the layout pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagramError {
    /// A link referenced a level that has not been added yet.
    #[error("invalid level id {id} for linking (diagram has {level_count} levels)")]
    InvalidReference { id: LevelId, level_count: usize },

    /// Layout needs at least one level to derive columns and the energy range.
    #[error("cannot lay out an empty diagram: add at least one level")]
    EmptyDiagram,
}
