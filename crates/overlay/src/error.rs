use std::fmt;

use crate::backend::ShaderStage;

/// Failure taxonomy for the overlay render component.
///
/// Every variant is surfaced synchronously to the caller of the operation
/// that failed. Nothing in this crate logs an error and carries on.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// The platform could not provide a drawing context; the overlay must not render.
    #[error("drawing context unavailable: {0}")]
    ContextUnavailable(String),
    /// One shader stage failed to compile. Carries the driver's compiler log.
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    /// Both stages compiled but the program failed to link.
    #[error("shader program failed to link: {log}")]
    ShaderLink { log: String },
    /// The program has no active uniform or attribute with this name.
    #[error("program has no input named `{name}`")]
    UnknownInput { name: String },
    /// A value of the wrong shape was written to a slot.
    #[error("input `{name}` is a {found} slot, not a {expected} slot")]
    SlotTypeMismatch {
        name: String,
        expected: SlotKind,
        found: SlotKind,
    },
    /// The graphics context was lost while drawing. Only a full re-mount recovers.
    #[error("graphics context lost")]
    ContextLost,
    /// The backend refused to allocate a GL object.
    #[error("failed to allocate {what}: {reason}")]
    ResourceAllocation { what: &'static str, reason: String },
    /// `start` was called on a driver that already left the idle state.
    #[error("render loop already {0}; create a new driver to restart")]
    DriverStopped(&'static str),
}

impl OverlayError {
    /// Whether the overlay can continue rendering after this error.
    ///
    /// Every variant ends the current mount; `ContextLost` is the only one a
    /// caller may recover from, and only by mounting a fresh overlay.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OverlayError::ContextLost)
    }

    pub(crate) fn allocation(what: &'static str, reason: impl Into<String>) -> Self {
        OverlayError::ResourceAllocation {
            what,
            reason: reason.into(),
        }
    }
}

/// Shape of a named program input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// `uniform float`
    Scalar,
    /// `uniform vec2`
    Vec2,
    /// Per-vertex `attribute` input.
    Attribute,
    /// Any other uniform type, keyed by its GL type enum.
    Other(u32),
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Scalar => f.write_str("scalar"),
            SlotKind::Vec2 => f.write_str("vec2"),
            SlotKind::Attribute => f.write_str("attribute"),
            SlotKind::Other(ty) => write!(f, "gl type {ty:#06x}"),
        }
    }
}
