//! Point and rectangle prompt annotations on one slice.
//!
//! Points commit on a single click. Rectangles take two clicks: the first
//! anchors a corner, cursor moves preview the box, the second click commits
//! it. Committed annotations are deduplicated by kind and coordinates.

use std::collections::HashSet;

use crate::error::{Result, ViewerError};
use crate::view::{CoordMode, CoordResolver};

// ============================================================================
// Annotation types
// ============================================================================

/// Geometry mode of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    Point,
    Rect,
}

impl AnnotationKind {
    /// Entity name used in dedup keys and worker messages.
    pub fn entity(&self) -> &'static str {
        match self {
            AnnotationKind::Point => "pt",
            AnnotationKind::Rect => "rect",
        }
    }
}

/// Whether a prompt marks the object or its surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PromptLabel {
    Background = 0,
    #[default]
    Foreground = 1,
}

impl PromptLabel {
    pub fn toggled(self) -> Self {
        match self {
            PromptLabel::Background => PromptLabel::Foreground,
            PromptLabel::Foreground => PromptLabel::Background,
        }
    }

    /// Numeric label sent to the model.
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// Slice-pixel coordinates of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Geometry {
    Point { x: u32, y: u32 },
    /// Normalized: `(x1, y1)` is the top-left corner
    Rect { x1: u32, y1: u32, x2: u32, y2: u32 },
}

impl Geometry {
    /// Rectangle spanning two arbitrary corners.
    pub fn rect_from_corners(a: (u32, u32), b: (u32, u32)) -> Self {
        Geometry::Rect {
            x1: a.0.min(b.0),
            y1: a.1.min(b.1),
            x2: a.0.max(b.0),
            y2: a.1.max(b.1),
        }
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            Geometry::Point { .. } => AnnotationKind::Point,
            Geometry::Rect { .. } => AnnotationKind::Rect,
        }
    }

    /// Coordinates in `[x, y]` or `[x1, y1, x2, y2]` order.
    pub fn values(&self) -> Vec<u32> {
        match *self {
            Geometry::Point { x, y } => vec![x, y],
            Geometry::Rect { x1, y1, x2, y2 } => vec![x1, y1, x2, y2],
        }
    }
}

/// Visual element of an annotation, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Marker {
    Circle { cx: f64, cy: f64 },
    Rect { x: f64, y: f64, width: f64, height: f64 },
}

impl Marker {
    fn rect_from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Marker::Rect {
            x: a.0.min(b.0),
            y: a.1.min(b.1),
            width: (a.0 - b.0).abs(),
            height: (a.1 - b.1).abs(),
        }
    }
}

/// One prompt annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub geometry: Geometry,
    pub label: PromptLabel,
    /// False only for a rectangle whose second corner is not placed yet
    pub committed: bool,
    pub marker: Marker,
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        self.geometry.kind()
    }

    /// Dedup key, e.g. `pt,3,4` or `rect,1,2,5,6`.
    pub fn dedup_key(&self) -> String {
        let mut key = self.kind().entity().to_string();
        for value in self.geometry.values() {
            key.push(',');
            key.push_str(&value.to_string());
        }
        key
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum DrawState {
    Idle,
    DrawingRect {
        anchor: (u32, u32),
        anchor_canvas: (f64, f64),
    },
}

/// Ordered annotations of one segmentation run.
#[derive(Debug, Clone)]
pub struct AnnotationSession {
    annotations: Vec<Annotation>,
    keys: HashSet<String>,
    label: PromptLabel,
    state: DrawState,
}

impl Default for AnnotationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationSession {
    pub fn new() -> Self {
        Self {
            annotations: Vec::new(),
            keys: HashSet::new(),
            label: PromptLabel::default(),
            state: DrawState::Idle,
        }
    }

    /// Label applied to the next annotation created.
    pub fn label(&self) -> PromptLabel {
        self.label
    }

    /// Whether a rectangle is anchored and awaiting its second corner.
    pub fn is_drawing(&self) -> bool {
        matches!(self.state, DrawState::DrawingRect { .. })
    }

    /// Flip between foreground and background prompts.
    pub fn toggle_label(&mut self) -> PromptLabel {
        self.label = self.label.toggled();
        log::debug!("Prompt label set to {:?}", self.label);
        self.label
    }

    fn resolve_strict(
        resolver: &impl CoordResolver,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<(u32, u32)> {
        resolver
            .pixel_to_voxel(offset_x, offset_y, CoordMode::Strict)
            .map(|(x, y)| (x as u32, y as u32))
            .ok_or_else(|| ViewerError::out_of_bounds(offset_x, offset_y))
    }

    /// Remember a committed annotation, rejecting duplicates.
    fn register(&mut self, annotation: &Annotation) -> Result<()> {
        let key = annotation.dedup_key();
        if !self.keys.insert(key.clone()) {
            log::info!("Duplicate annotation rejected: [{}]", key);
            return Err(ViewerError::duplicate(key));
        }
        Ok(())
    }

    /// Place and commit a point at a canvas offset.
    pub fn start_point(
        &mut self,
        resolver: &impl CoordResolver,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<&Annotation> {
        if self.is_drawing() {
            return Err(ViewerError::AnnotationInProgress);
        }
        let (x, y) = Self::resolve_strict(resolver, offset_x, offset_y)?;

        let annotation = Annotation {
            geometry: Geometry::Point { x, y },
            label: self.label,
            committed: true,
            marker: Marker::Circle {
                cx: offset_x,
                cy: offset_y,
            },
        };
        self.register(&annotation)?;
        self.annotations.push(annotation);
        Ok(&self.annotations[self.annotations.len() - 1])
    }

    /// Anchor the first corner of a rectangle.
    pub fn start_rect(
        &mut self,
        resolver: &impl CoordResolver,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<()> {
        if self.is_drawing() {
            return Err(ViewerError::AnnotationInProgress);
        }
        let anchor = Self::resolve_strict(resolver, offset_x, offset_y)?;
        let anchor_canvas = (offset_x, offset_y);

        self.annotations.push(Annotation {
            geometry: Geometry::rect_from_corners(anchor, anchor),
            label: self.label,
            committed: false,
            marker: Marker::rect_from_corners(anchor_canvas, anchor_canvas),
        });
        self.state = DrawState::DrawingRect {
            anchor,
            anchor_canvas,
        };
        Ok(())
    }

    /// Live-preview the rectangle under the cursor.
    ///
    /// The cursor is clamped to the slice, so dragging past an edge pins
    /// the preview to that edge. Returns the previewed geometry.
    pub fn update_rect_drag(
        &mut self,
        resolver: &impl CoordResolver,
        offset_x: f64,
        offset_y: f64,
    ) -> Option<Geometry> {
        let DrawState::DrawingRect {
            anchor,
            anchor_canvas,
        } = self.state
        else {
            return None;
        };
        let (x, y) = resolver.pixel_to_voxel(offset_x, offset_y, CoordMode::Clamped)?;
        let geometry = Geometry::rect_from_corners(anchor, (x as u32, y as u32));

        let pending = self.annotations.last_mut()?;
        pending.geometry = geometry;
        pending.marker = Marker::rect_from_corners(anchor_canvas, (offset_x, offset_y));
        Some(geometry)
    }

    /// Place the second corner and commit the rectangle.
    ///
    /// An off-image corner is rejected and the rectangle stays anchored. A
    /// duplicate rectangle is rolled back and the session returns to idle.
    pub fn commit_rect(
        &mut self,
        resolver: &impl CoordResolver,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<&Annotation> {
        let DrawState::DrawingRect {
            anchor,
            anchor_canvas,
        } = self.state
        else {
            return Err(ViewerError::NoPendingRectangle);
        };
        let corner = Self::resolve_strict(resolver, offset_x, offset_y)?;
        self.state = DrawState::Idle;

        let Some(mut pending) = self.annotations.pop() else {
            return Err(ViewerError::NoPendingRectangle);
        };
        pending.geometry = Geometry::rect_from_corners(anchor, corner);
        pending.marker = Marker::rect_from_corners(anchor_canvas, (offset_x, offset_y));
        pending.committed = true;

        self.register(&pending)?;
        self.annotations.push(pending);
        Ok(&self.annotations[self.annotations.len() - 1])
    }

    /// Drop an anchored rectangle without committing it.
    pub fn cancel_rect(&mut self) {
        if self.is_drawing() {
            self.annotations.pop();
            self.state = DrawState::Idle;
        }
    }

    /// Remove the most recent annotation, anchored or committed.
    pub fn undo_last(&mut self) -> Option<Annotation> {
        let removed = self.annotations.pop()?;
        if removed.committed {
            self.keys.remove(&removed.dedup_key());
        } else {
            self.state = DrawState::Idle;
        }
        Some(removed)
    }

    /// Remove every annotation and return to idle.
    pub fn reset(&mut self) {
        self.annotations.clear();
        self.keys.clear();
        self.state = DrawState::Idle;
    }

    /// Committed annotations in creation order.
    pub fn committed_annotations(&self) -> Vec<&Annotation> {
        self.annotations.iter().filter(|a| a.committed).collect()
    }

    /// Every annotation including an anchored rectangle.
    pub fn all_annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}
