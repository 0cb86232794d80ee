//! Editable state for one photo, with undo/redo and the simulate action.

use std::time::{Duration, Instant};

use image::DynamicImage;
use tracing::info;

use crate::catalog::{enrich_prompt, Placement, DEFAULT_STYLE};
use crate::compositor::{BakedImage, ImageCompositor};
use crate::error::InkError;
use crate::history::EditHistory;
use crate::models::{Adjustments, EditSnapshot, TattooSimulation, SCALE_STEP};
use crate::orchestrator::Orchestrator;
use crate::selection::{SelectionBox, SelectionTool};

/// Quiet period before a prompt/style edit is recorded.
pub const DEBOUNCE: Duration = Duration::from_millis(800);
/// After undo/redo, edits in this window do not arm the debounce.
pub const RESTORE_SUPPRESSION: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
pub struct EditSession {
    compositor: ImageCompositor,
    selection: SelectionTool,
    history: EditHistory,
    prompt: String,
    style: String,
    adjustments: Adjustments,
    debounce_deadline: Option<Instant>,
    suppress_until: Option<Instant>,
}

impl EditSession {
    pub fn new() -> Self {
        Self { style: DEFAULT_STYLE.to_string(), ..Self::default() }
    }

    /// Starts over with a new photo and default settings.
    pub fn load_image(&mut self, image: DynamicImage) {
        self.compositor.set_source(image);
        let initial = EditSnapshot::initial();
        self.prompt = initial.prompt.clone();
        self.style = initial.style.clone();
        self.adjustments = initial.adjustments;
        self.history.reset(initial);
        self.selection = SelectionTool::default();
        self.debounce_deadline = None;
        self.suppress_until = None;
    }

    pub fn has_image(&self) -> bool { self.compositor.has_source() }
    pub fn prompt(&self) -> &str { &self.prompt }
    pub fn style(&self) -> &str { &self.style }
    pub fn adjustments(&self) -> Adjustments { self.adjustments }
    pub fn history(&self) -> &EditHistory { &self.history }
    pub fn selection(&self) -> &SelectionTool { &self.selection }
    pub fn selection_mut(&mut self) -> &mut SelectionTool { &mut self.selection }
    pub fn placement(&self) -> Placement { self.selection.placement() }

    pub fn set_placement(&mut self, placement: Placement) {
        self.selection.set_placement(placement);
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>, now: Instant) {
        self.prompt = prompt.into();
        self.arm_debounce(now);
    }

    pub fn set_style(&mut self, style: impl Into<String>, now: Instant) {
        self.style = style.into();
        self.arm_debounce(now);
    }

    fn arm_debounce(&mut self, now: Instant) {
        if !self.has_image() || self.suppress_until.is_some_and(|until| now < until) {
            return;
        }
        self.debounce_deadline = Some(now + DEBOUNCE);
    }

    pub fn has_pending_edit(&self) -> bool { self.debounce_deadline.is_some() }

    /// Fires the debounce if its deadline has passed. Returns true when a
    /// snapshot was recorded.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.debounce_deadline.is_some_and(|deadline| now >= deadline) {
            return false;
        }
        self.debounce_deadline = None;
        let changed = self
            .history
            .current()
            .is_some_and(|last| last.prompt != self.prompt || last.style != self.style);
        if changed {
            self.push_current();
        }
        changed
    }

    pub fn rotate(&mut self) {
        self.adjustments.rotation = self.adjustments.rotation.next();
        self.push_current();
    }

    pub fn scale_up(&mut self) {
        self.adjustments.scale = Adjustments::clamp_scale(self.adjustments.scale + SCALE_STEP);
        self.push_current();
    }

    pub fn scale_down(&mut self) {
        self.adjustments.scale = Adjustments::clamp_scale(self.adjustments.scale - SCALE_STEP);
        self.push_current();
    }

    pub fn set_brightness(&mut self, percent: u16) {
        self.adjustments.brightness = Adjustments::clamp_filter(percent);
    }

    pub fn set_contrast(&mut self, percent: u16) {
        self.adjustments.contrast = Adjustments::clamp_filter(percent);
    }

    pub fn set_sharpen(&mut self, sharpen: bool) {
        self.adjustments.sharpen = sharpen;
    }

    pub fn reset_filters(&mut self) {
        self.adjustments.brightness = 100;
        self.adjustments.contrast = 100;
        self.adjustments.sharpen = false;
    }

    pub fn undo(&mut self, now: Instant) -> bool {
        let Some(snap) = self.history.undo().cloned() else { return false };
        self.restore(&snap, now);
        true
    }

    pub fn redo(&mut self, now: Instant) -> bool {
        let Some(snap) = self.history.redo().cloned() else { return false };
        self.restore(&snap, now);
        true
    }

    fn restore(&mut self, snap: &EditSnapshot, now: Instant) {
        self.prompt = snap.prompt.clone();
        self.style = snap.style.clone();
        self.adjustments = snap.adjustments;
        self.debounce_deadline = None;
        self.suppress_until = Some(now + RESTORE_SUPPRESSION);
    }

    /// Records the live state, carrying the latest result forward.
    fn push_current(&mut self) {
        let (result, analysis) = self
            .history
            .current()
            .map(|s| (s.result_image_url.clone(), s.analysis.clone()))
            .unwrap_or_default();
        let snap = EditSnapshot::new(self.prompt.clone(), self.style.clone(), self.adjustments).with_result(result, analysis);
        self.history.push(snap);
    }

    pub fn bake(&self) -> Result<BakedImage, InkError> {
        self.compositor.bake(&self.adjustments)
    }

    /// Bakes the photo, generates the mockup and critique, and records the
    /// outcome. A failed generation leaves the history untouched.
    pub async fn simulate(&mut self, orchestrator: &Orchestrator) -> Result<TattooSimulation, InkError> {
        if !self.has_image() {
            return Err(InkError::InvalidRequest("upload a photo first".into()));
        }
        if self.prompt.trim().is_empty() {
            return Err(InkError::InvalidRequest("describe the tattoo concept first".into()));
        }
        if !orchestrator.is_configured() {
            return Err(InkError::MissingCredential);
        }

        let baked = self.bake()?;
        let selection: Option<SelectionBox> = match self.placement() {
            Placement::Custom => self.selection.selection(),
            _ => None,
        };
        let enriched = enrich_prompt(&self.prompt, self.placement(), selection.is_some());

        let result = orchestrator
            .generate_tattoo_mockup(&baked, &enriched, &self.style, selection.as_ref())
            .await?;

        let snap = EditSnapshot::new(self.prompt.clone(), self.style.clone(), self.adjustments)
            .with_result(Some(result.result_image_url.clone()), Some(result.analysis.clone()));
        self.history.push(snap);
        info!("📝 Recorded simulation as history entry {}", self.history.index());

        Ok(TattooSimulation::from_result(baked.data_uri, &self.prompt, &self.style, &result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rotation, MAX_SCALE, MIN_FILTER_PERCENT};
    use image::RgbaImage;
    use pretty_assertions::assert_eq;

    fn loaded() -> EditSession {
        let mut s = EditSession::new();
        s.load_image(DynamicImage::ImageRgba8(RgbaImage::new(8, 6)));
        s
    }

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    #[test]
    fn load_starts_with_single_default_snapshot() {
        let s = loaded();
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.style(), DEFAULT_STYLE);
        assert_eq!(s.adjustments(), Adjustments::default());
        assert_eq!(s.placement(), Placement::Full);
    }

    #[test]
    fn rapid_typing_records_one_snapshot() {
        let mut s = loaded();
        let t0 = Instant::now();
        s.set_prompt("a", t0);
        s.set_prompt("a ro", t0 + ms(300));
        s.set_prompt("a rose", t0 + ms(600));
        assert!(!s.tick(t0 + ms(1000)));
        assert!(s.tick(t0 + ms(1400)));
        assert!(!s.tick(t0 + ms(5000)));
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.history().current().unwrap().prompt, "a rose");
    }

    #[test]
    fn settled_edit_matching_current_is_not_recorded() {
        let mut s = loaded();
        let t0 = Instant::now();
        s.set_prompt("x", t0);
        s.set_prompt("", t0 + ms(100));
        assert!(!s.tick(t0 + ms(2000)));
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn debounced_push_carries_geometry_forward() {
        let mut s = loaded();
        s.rotate();
        s.scale_up();
        let t0 = Instant::now();
        s.set_style("Fineline", t0);
        assert!(s.tick(t0 + DEBOUNCE));
        let top = s.history().current().unwrap();
        assert_eq!(top.style, "Fineline");
        assert_eq!(top.adjustments.rotation, Rotation::Quarter);
        assert!((top.adjustments.scale - 1.1).abs() < 1e-6);
    }

    #[test]
    fn undo_restores_fields_without_recording() {
        let mut s = loaded();
        s.rotate();
        let t0 = Instant::now();
        s.set_prompt("wolf", t0);
        s.tick(t0 + DEBOUNCE);
        assert_eq!(s.history().len(), 3);

        let t1 = t0 + ms(2000);
        assert!(s.undo(t1));
        assert_eq!(s.prompt(), "");
        assert_eq!(s.adjustments().rotation, Rotation::Quarter);

        // Field echo right after the jump must not arm the debounce.
        s.set_prompt("", t1 + ms(10));
        assert!(!s.has_pending_edit());
        assert_eq!(s.history().len(), 3);

        assert!(s.redo(t1 + ms(100)));
        assert_eq!(s.prompt(), "wolf");
        assert!(!s.redo(t1 + ms(200)));
    }

    #[test]
    fn undo_clears_pending_debounce() {
        let mut s = loaded();
        s.rotate();
        let t0 = Instant::now();
        s.set_prompt("half typed", t0);
        assert!(s.undo(t0 + ms(100)));
        assert!(!s.tick(t0 + ms(5000)));
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn scale_and_filters_are_bounded() {
        let mut s = loaded();
        for _ in 0..40 {
            s.scale_up();
        }
        assert_eq!(s.adjustments().scale, MAX_SCALE);
        s.set_brightness(5);
        assert_eq!(s.adjustments().brightness, MIN_FILTER_PERCENT);
        s.reset_filters();
        assert_eq!((s.adjustments().brightness, s.adjustments().contrast, s.adjustments().sharpen), (100, 100, false));
    }

    #[test]
    fn edits_before_any_photo_are_ignored() {
        let mut s = EditSession::new();
        let t0 = Instant::now();
        s.set_prompt("rose", t0);
        assert!(!s.tick(t0 + ms(1000)));
        assert!(s.history().is_empty());
        assert!(s.bake().unwrap().is_empty());
    }
}
