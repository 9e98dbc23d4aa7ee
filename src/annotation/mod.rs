//! Prompt annotations and their SVG overlay.

mod overlay;
mod session;

pub use overlay::overlay_svg;
pub use session::{
    Annotation, AnnotationKind, AnnotationSession, Geometry, Marker, PromptLabel,
};
