use crate::models::EditSnapshot;

/// Linear undo/redo log. Pushing after an undo drops the redo branch.
#[derive(Debug, Clone, Default)]
pub struct EditHistory {
    entries: Vec<EditSnapshot>,
    index: usize,
}

impl EditHistory {
    pub fn new() -> Self { Self::default() }

    /// Discards everything and starts over from `initial`.
    pub fn reset(&mut self, initial: EditSnapshot) {
        self.entries = vec![initial];
        self.index = 0;
    }

    pub fn push(&mut self, snapshot: EditSnapshot) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(snapshot);
        self.index = self.entries.len() - 1;
    }

    pub fn undo(&mut self) -> Option<&EditSnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index)
    }

    pub fn redo(&mut self) -> Option<&EditSnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index)
    }

    pub fn current(&self) -> Option<&EditSnapshot> { self.entries.get(self.index) }

    pub fn can_undo(&self) -> bool { self.index > 0 }

    pub fn can_redo(&self) -> bool { self.index + 1 < self.entries.len() }

    pub fn index(&self) -> usize { self.index }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn entries(&self) -> &[EditSnapshot] { &self.entries }
}
