use serde::{Serialize, Deserialize};

use crate::catalog::Placement;

/// Smallest extent (in percentage points) a committed box must exceed.
pub const MIN_SELECTION_EXTENT: f32 = 5.0;

/// Rectangle in percentages of the displayed image's bounding box.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct SelectionBox {
    pub start_x: f32,
    pub start_y: f32,
    pub end_x: f32,
    pub end_y: f32,
}

impl SelectionBox {
    pub fn point(x: f32, y: f32) -> Self {
        Self { start_x: x, start_y: y, end_x: x, end_y: y }
    }

    /// Reorders corners so start <= end on both axes.
    pub fn normalized(self) -> Self {
        Self {
            start_x: self.start_x.min(self.end_x),
            start_y: self.start_y.min(self.end_y),
            end_x: self.start_x.max(self.end_x),
            end_y: self.start_y.max(self.end_y),
        }
    }

    pub fn width(&self) -> f32 { self.end_x - self.start_x }
    pub fn height(&self) -> f32 { self.end_y - self.start_y }

    /// Normalized box, or `None` when it is too small to be intentional.
    pub fn committed(self) -> Option<Self> {
        let b = self.normalized();
        (b.width() > MIN_SELECTION_EXTENT && b.height() > MIN_SELECTION_EXTENT).then_some(b)
    }
}

/// On-screen bounding box of the image container, in pointer units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ContainerRect {
    fn to_percent(&self, x: f32, y: f32) -> (f32, f32) {
        let px = if self.width > 0.0 { (x - self.left) / self.width * 100.0 } else { 0.0 };
        let py = if self.height > 0.0 { (y - self.top) / self.height * 100.0 } else { 0.0 };
        (px, py)
    }
}

/// Pointer-driven selection of a custom placement region.
#[derive(Debug, Clone, Default)]
pub struct SelectionTool {
    placement: Placement,
    committed: Option<SelectionBox>,
    pending: Option<SelectionBox>,
}

impl SelectionTool {
    pub fn placement(&self) -> Placement { self.placement }

    pub fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
        if placement != Placement::Custom {
            self.committed = None;
            self.pending = None;
        }
    }

    pub fn is_selecting(&self) -> bool { self.pending.is_some() }

    pub fn selection(&self) -> Option<SelectionBox> { self.committed }

    /// What should be drawn right now: the in-progress box while dragging.
    pub fn active(&self) -> Option<SelectionBox> {
        self.pending.or(self.committed)
    }

    /// Pointer down. The origin is stored unclamped.
    pub fn begin(&mut self, rect: &ContainerRect, x: f32, y: f32) {
        if self.placement != Placement::Custom {
            return;
        }
        let (px, py) = rect.to_percent(x, y);
        self.pending = Some(SelectionBox::point(px, py));
    }

    pub fn update(&mut self, rect: &ContainerRect, x: f32, y: f32) {
        let Some(pending) = self.pending.as_mut() else { return };
        let (px, py) = rect.to_percent(x, y);
        pending.end_x = px.clamp(0.0, 100.0);
        pending.end_y = py.clamp(0.0, 100.0);
    }

    /// Pointer up. Returns the newly committed box, if it was large enough.
    pub fn commit(&mut self) -> Option<SelectionBox> {
        let committed = self.pending.take()?.committed()?;
        self.committed = Some(committed);
        Some(committed)
    }

    pub fn clear(&mut self) {
        self.committed = None;
        self.pending = None;
    }
}
