//! Annotation store
//!
//! Ordered collection of annotations across all pages. Insertion order is paint
//! order: later entries draw on top and win hit tests. All mutation goes through
//! [`AnnotationStore::update`] or the structural operations here, which enforce the
//! lock flag, refresh `modified_at`, and record a single-step undo entry.

use crate::annotation::{Annotation, AnnotationId};
use crate::error::{AnnotationError, AnnotationResult};
use tracing::debug;

/// The one operation that [`AnnotationStore::undo`] can revert
#[derive(Debug, Clone)]
enum UndoEntry {
    Added(AnnotationId),
    /// Removed annotations with their former indices, ascending
    Removed(Vec<(usize, Annotation)>),
    /// State before an in-place edit
    Modified(Annotation),
    /// Id order before a z-order change
    Reordered(Vec<AnnotationId>),
}

#[derive(Debug, Clone)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    selected: Option<AnnotationId>,
    /// 1-based page currently displayed
    current_page: u32,
    undo: Option<UndoEntry>,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self { annotations: Vec::new(), selected: None, current_page: 1, undo: None }
    }

    /// Replace every annotation, as after loading a document. Clears selection and undo.
    pub fn replace_all(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
        self.selected = None;
        self.undo = None;
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Every annotation in paint order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Annotation> {
        self.annotations.iter()
    }

    /// Annotations on `page` in paint order, bottom first
    pub fn page_annotations(&self, page: u32) -> impl DoubleEndedIterator<Item = &Annotation> {
        self.annotations.iter().filter(move |annotation| annotation.page() == page)
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.id() == id)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.index_of(id).is_some()
    }

    fn index_of(&self, id: AnnotationId) -> Option<usize> {
        self.annotations.iter().position(|annotation| annotation.id() == id)
    }

    fn require(&self, id: AnnotationId) -> AnnotationResult<usize> {
        self.index_of(id).ok_or(AnnotationError::NotFound(id))
    }

    fn require_unlocked(&self, id: AnnotationId) -> AnnotationResult<usize> {
        let index = self.require(id)?;
        if self.annotations[index].is_locked() {
            return Err(AnnotationError::Locked(id));
        }
        Ok(index)
    }

    /// Append an annotation on top of its page
    pub fn add(&mut self, annotation: Annotation) -> AnnotationId {
        let id = annotation.id();
        debug!(%id, kind = %annotation.annotation_type(), page = annotation.page(), "annotation added");
        self.annotations.push(annotation);
        self.undo = Some(UndoEntry::Added(id));
        id
    }

    /// Apply an edit to one annotation.
    ///
    /// Rejected for locked annotations. Geometry left invalid by `edit` is rolled back
    /// and reported; bounding boxes are raised to the variant floor.
    pub fn update<F, R>(&mut self, id: AnnotationId, edit: F) -> AnnotationResult<R>
    where
        F: FnOnce(&mut Annotation) -> R,
    {
        let index = self.require_unlocked(id)?;
        let before = self.annotations[index].clone();
        let result = self.apply_edit(index, before.clone(), edit)?;
        self.undo = Some(UndoEntry::Modified(before));
        Ok(result)
    }

    /// Record the current state of `id` as the undo point for a multi-frame edit
    pub(crate) fn checkpoint(&mut self, id: AnnotationId) -> AnnotationResult<()> {
        let index = self.require_unlocked(id)?;
        self.undo = Some(UndoEntry::Modified(self.annotations[index].clone()));
        Ok(())
    }

    /// Edit without replacing the undo entry, for drag frames after [`Self::checkpoint`]
    pub(crate) fn update_untracked<F, R>(&mut self, id: AnnotationId, edit: F) -> AnnotationResult<R>
    where
        F: FnOnce(&mut Annotation) -> R,
    {
        let index = self.require_unlocked(id)?;
        let before = self.annotations[index].clone();
        self.apply_edit(index, before, edit)
    }

    fn apply_edit<F, R>(&mut self, index: usize, before: Annotation, edit: F) -> AnnotationResult<R>
    where
        F: FnOnce(&mut Annotation) -> R,
    {
        let annotation = &mut self.annotations[index];
        let result = edit(annotation);

        if let Err(err) = annotation.kind().validate() {
            *annotation = before;
            return Err(err);
        }
        annotation.kind_mut().clamp_to_min_size();
        annotation.metadata_mut().touch();
        Ok(result)
    }

    /// Lock or unlock. Always permitted, since unlocking is the only way out of a lock.
    pub fn set_locked(&mut self, id: AnnotationId, locked: bool) -> AnnotationResult<()> {
        let index = self.require(id)?;
        let annotation = &mut self.annotations[index];
        if annotation.is_locked() == locked {
            return Ok(());
        }
        let before = annotation.clone();
        annotation.flags_mut().locked = locked;
        annotation.metadata_mut().touch();
        self.undo = Some(UndoEntry::Modified(before));
        Ok(())
    }

    pub fn remove(&mut self, id: AnnotationId) -> AnnotationResult<Annotation> {
        let index = self.require_unlocked(id)?;
        let removed = self.annotations.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.undo = Some(UndoEntry::Removed(vec![(index, removed.clone())]));
        debug!(%id, "annotation removed");
        Ok(removed)
    }

    /// Remove every unlocked annotation on `page`. Returns how many were removed.
    pub fn clear_page(&mut self, page: u32) -> usize {
        self.remove_where(|annotation| annotation.page() == page)
    }

    /// Remove every unlocked annotation on every page
    pub fn clear_all(&mut self) -> usize {
        self.remove_where(|_| true)
    }

    fn remove_where<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&Annotation) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.annotations.len());

        for (index, annotation) in std::mem::take(&mut self.annotations).into_iter().enumerate() {
            if !annotation.is_locked() && predicate(&annotation) {
                removed.push((index, annotation));
            } else {
                kept.push(annotation);
            }
        }
        self.annotations = kept;

        if let Some(selected) = self.selected {
            if !self.contains(selected) {
                self.selected = None;
            }
        }

        let count = removed.len();
        if count > 0 {
            self.undo = Some(UndoEntry::Removed(removed));
        }
        count
    }

    /// Copy `id` with a new identity, offset by (dx, dy), on top of the same page
    pub fn duplicate(&mut self, id: AnnotationId, dx: f32, dy: f32) -> AnnotationResult<AnnotationId> {
        let index = self.require(id)?;
        let source = &self.annotations[index];
        let mut copy = source.duplicate_to(source.page());
        copy.kind_mut().translate(dx, dy);
        Ok(self.add(copy))
    }

    pub fn bring_to_front(&mut self, id: AnnotationId) -> AnnotationResult<()> {
        self.reorder(id, |store, index| {
            let annotation = store.annotations.remove(index);
            store.annotations.push(annotation);
        })
    }

    pub fn send_to_back(&mut self, id: AnnotationId) -> AnnotationResult<()> {
        self.reorder(id, |store, index| {
            let annotation = store.annotations.remove(index);
            store.annotations.insert(0, annotation);
        })
    }

    /// Swap with the next annotation above it on the same page
    pub fn bring_forward(&mut self, id: AnnotationId) -> AnnotationResult<()> {
        self.reorder(id, |store, index| {
            let page = store.annotations[index].page();
            if let Some(offset) =
                store.annotations[index + 1..].iter().position(|other| other.page() == page)
            {
                let annotation = store.annotations.remove(index);
                store.annotations.insert(index + offset + 1, annotation);
            }
        })
    }

    /// Swap with the next annotation below it on the same page
    pub fn send_backward(&mut self, id: AnnotationId) -> AnnotationResult<()> {
        self.reorder(id, |store, index| {
            let page = store.annotations[index].page();
            if let Some(target) = store.annotations[..index].iter().rposition(|other| other.page() == page)
            {
                let annotation = store.annotations.remove(index);
                store.annotations.insert(target, annotation);
            }
        })
    }

    fn reorder<F>(&mut self, id: AnnotationId, apply: F) -> AnnotationResult<()>
    where
        F: FnOnce(&mut Self, usize),
    {
        let index = self.require_unlocked(id)?;
        let order = self.annotations.iter().map(Annotation::id).collect();
        apply(self, index);
        self.undo = Some(UndoEntry::Reordered(order));
        Ok(())
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Change the displayed page, dropping a selection that lives elsewhere
    pub fn set_current_page(&mut self, page: u32) {
        self.current_page = page.max(1);
        if self.selected().is_some_and(|annotation| annotation.page() != self.current_page) {
            self.selected = None;
        }
    }

    /// Select an annotation on the displayed page
    pub fn select(&mut self, id: AnnotationId) -> AnnotationResult<()> {
        let index = self.require(id)?;
        let page = self.annotations[index].page();
        if page != self.current_page {
            return Err(AnnotationError::NotOnCurrentPage { id, page });
        }
        self.selected = Some(id);
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn selected_id(&self) -> Option<AnnotationId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Annotation> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn can_undo(&self) -> bool {
        self.undo.is_some()
    }

    /// Revert the most recent operation. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo.take() else {
            return false;
        };

        match entry {
            UndoEntry::Added(id) => {
                if let Some(index) = self.index_of(id) {
                    self.annotations.remove(index);
                }
            }
            UndoEntry::Removed(removed) => {
                for (index, annotation) in removed {
                    let index = index.min(self.annotations.len());
                    self.annotations.insert(index, annotation);
                }
            }
            UndoEntry::Modified(previous) => {
                if let Some(index) = self.index_of(previous.id()) {
                    self.annotations[index] = previous;
                }
            }
            UndoEntry::Reordered(order) => {
                self.annotations.sort_by_key(|annotation| {
                    order.iter().position(|id| *id == annotation.id()).unwrap_or(usize::MAX)
                });
            }
        }

        if let Some(selected) = self.selected {
            if !self.contains(selected) {
                self.selected = None;
            }
        }
        true
    }
}
