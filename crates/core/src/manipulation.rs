//! Annotation manipulation handles and operations
//!
//! Provides handles for moving, resizing, and rotating the selected annotation.
//! A drag never accumulates: every pointer move recomputes the geometry from the
//! snapshot taken at pointer-down plus the total pointer delta, so ending a drag at
//! any moment leaves a consistent annotation behind.

use crate::annotation::{Annotation, AnnotationId, AnnotationKind, MIN_SHAPE_SIZE};
use crate::error::{AnnotationError, AnnotationResult};
use crate::geometry::{rotate_point, Point, Rect};
use crate::hit_test::HitThresholds;
use crate::snapping::{rotation_from_pointer, snap_segment, SnapConfig};
use crate::store::AnnotationStore;
use tracing::trace;

/// Distance of the rotation handle above the top edge
pub const ROTATION_HANDLE_OFFSET: f32 = 30.0;

/// Type of manipulation handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleType {
    /// Corner handles for resizing both dimensions
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,

    /// Edge handles for resizing in one dimension
    Top,
    Bottom,
    Left,
    Right,

    /// Line endpoints
    Start,
    End,

    /// Callout leader points
    ArrowTip,
    Knee,

    /// Rotation handle above the annotation
    Rotate,
}

impl HandleType {
    fn moves_left(self) -> bool {
        matches!(self, HandleType::TopLeft | HandleType::BottomLeft | HandleType::Left)
    }

    fn moves_right(self) -> bool {
        matches!(self, HandleType::TopRight | HandleType::BottomRight | HandleType::Right)
    }

    fn moves_top(self) -> bool {
        matches!(self, HandleType::TopLeft | HandleType::TopRight | HandleType::Top)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, HandleType::BottomLeft | HandleType::BottomRight | HandleType::Bottom)
    }

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            HandleType::TopLeft | HandleType::TopRight | HandleType::BottomLeft | HandleType::BottomRight
        )
    }
}

/// Manipulation handle with position and type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManipulationHandle {
    pub handle_type: HandleType,
    /// Position in user space
    pub position: Point,
    /// Handle edge length in user space
    pub size: f32,
}

impl ManipulationHandle {
    pub fn new(handle_type: HandleType, position: Point, size: f32) -> Self {
        Self { handle_type, position, size }
    }

    /// Check if a point hits this handle
    pub fn hit_test(&self, point: &Point, tolerance: f32) -> bool {
        point.distance_to(&self.position) <= self.size / 2.0 + tolerance
    }
}

fn box_handles(rect: &Rect) -> [(HandleType, Point); 8] {
    let center = rect.center();
    [
        (HandleType::TopLeft, Point::new(rect.x, rect.y)),
        (HandleType::Top, Point::new(center.x, rect.y)),
        (HandleType::TopRight, Point::new(rect.right(), rect.y)),
        (HandleType::Right, Point::new(rect.right(), center.y)),
        (HandleType::BottomRight, Point::new(rect.right(), rect.bottom())),
        (HandleType::Bottom, Point::new(center.x, rect.bottom())),
        (HandleType::BottomLeft, Point::new(rect.x, rect.bottom())),
        (HandleType::Left, Point::new(rect.x, center.y)),
    ]
}

fn corner_handles(rect: &Rect) -> [(HandleType, Point); 4] {
    [
        (HandleType::TopLeft, Point::new(rect.x, rect.y)),
        (HandleType::TopRight, Point::new(rect.right(), rect.y)),
        (HandleType::BottomRight, Point::new(rect.right(), rect.bottom())),
        (HandleType::BottomLeft, Point::new(rect.x, rect.bottom())),
    ]
}

/// Generate manipulation handles for an annotation
///
/// Later handles take precedence in [`handle_at`], so the special handles
/// (rotation, leader points) are pushed last.
pub fn generate_handles(annotation: &Annotation, handle_size: f32) -> Vec<ManipulationHandle> {
    let mut handles: Vec<(HandleType, Point)> = Vec::new();

    match annotation.kind() {
        AnnotationKind::Line { start, end } => {
            handles.push((HandleType::Start, *start));
            handles.push((HandleType::End, *end));
        }

        AnnotationKind::Highlight { rect, .. }
        | AnnotationKind::Box { rect }
        | AnnotationKind::Circle { rect } => handles.extend(box_handles(rect)),

        AnnotationKind::TextBox(text_box) => handles.extend(box_handles(&text_box.rect)),

        AnnotationKind::Callout(callout) => {
            handles.extend(box_handles(&callout.text_box.rect));
            handles.push((HandleType::Knee, callout.knee));
            handles.push((HandleType::ArrowTip, callout.arrow_tip));
        }

        AnnotationKind::Comment { rect, rotation, .. } => {
            handles.extend(rotated_box_handles(rect, *rotation));
        }

        AnnotationKind::Image(image) => {
            handles.extend(rotated_box_handles(&image.rect, image.rotation));
        }

        AnnotationKind::Draw { .. }
        | AnnotationKind::Polyline { .. }
        | AnnotationKind::Polygon { .. } => handles.extend(corner_handles(&annotation.bounds())),

        // Text runs are only moved
        AnnotationKind::Text { .. } => {}
    }

    handles
        .into_iter()
        .map(|(handle_type, position)| ManipulationHandle::new(handle_type, position, handle_size))
        .collect()
}

fn rotated_box_handles(rect: &Rect, rotation: f32) -> Vec<(HandleType, Point)> {
    let center = rect.center();
    let rotate_handle = (HandleType::Rotate, Point::new(center.x, rect.y - ROTATION_HANDLE_OFFSET));

    box_handles(rect)
        .into_iter()
        .chain(std::iter::once(rotate_handle))
        .map(|(handle_type, position)| (handle_type, rotate_point(&position, &center, rotation)))
        .collect()
}

/// The handle of `annotation` under `point`, if any
pub fn handle_at(annotation: &Annotation, point: &Point, handle_size: f32) -> Option<HandleType> {
    generate_handles(annotation, handle_size)
        .iter()
        .rev()
        .find(|handle| handle.hit_test(point, handle_size / 2.0))
        .map(|handle| handle.handle_type)
}

/// Options that shape how drags are turned into geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditOptions {
    pub snap: SnapConfig,
    /// Keep image aspect ratio while resizing
    pub lock_image_aspect: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self { snap: SnapConfig::default(), lock_image_aspect: true }
    }
}

/// Modifier keys held during a drag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Snap line angles and rotation to their configured steps, lock image aspect
    pub shift: bool,
}

/// An in-progress drag on one annotation
#[derive(Debug, Clone, PartialEq)]
pub struct ManipulationState {
    pub annotation_id: AnnotationId,
    /// Handle being dragged, `None` when moving the whole annotation
    pub handle: Option<HandleType>,
    /// Geometry before the drag started
    pub original: AnnotationKind,
    pub drag_start: Point,
    pub current_position: Point,
}

impl ManipulationState {
    pub fn new(
        annotation_id: AnnotationId,
        handle: Option<HandleType>,
        original: AnnotationKind,
        drag_start: Point,
    ) -> Self {
        Self { annotation_id, handle, original, drag_start, current_position: drag_start }
    }

    /// Total pointer movement since the drag started
    pub fn delta(&self) -> (f32, f32) {
        (self.current_position.x - self.drag_start.x, self.current_position.y - self.drag_start.y)
    }

    /// Geometry for the current pointer position, computed from the original snapshot
    pub fn calculate_new_kind(&self, options: &EditOptions, modifiers: Modifiers) -> AnnotationKind {
        let (dx, dy) = self.delta();
        let mut kind = self.original.clone();

        match self.handle {
            None => kind.translate(dx, dy),
            Some(HandleType::Rotate) => {
                let center = self.original.bounds().center();
                let snap = modifiers.shift.then_some(options.snap.rotation_step);
                let angle = rotation_from_pointer(&center, &self.current_position, snap);
                match &mut kind {
                    AnnotationKind::Comment { rotation, .. } => *rotation = angle,
                    AnnotationKind::Image(image) => image.rotation = angle,
                    _ => {}
                }
            }
            Some(handle @ (HandleType::Start | HandleType::End)) => {
                if let AnnotationKind::Line { start, end } = &mut kind {
                    let (moving, fixed) =
                        if handle == HandleType::Start { (start, *end) } else { (end, *start) };
                    let raw = moving.offset(dx, dy);
                    *moving = if modifiers.shift {
                        snap_segment(&fixed, &raw, options.snap.line_angle_step)
                    } else {
                        raw
                    };
                }
            }
            Some(HandleType::ArrowTip) => {
                if let AnnotationKind::Callout(callout) = &mut kind {
                    callout.arrow_tip = callout.arrow_tip.offset(dx, dy);
                }
            }
            Some(HandleType::Knee) => {
                if let AnnotationKind::Callout(callout) = &mut kind {
                    callout.knee = callout.knee.offset(dx, dy);
                    callout.attach_arm();
                }
            }
            Some(handle) => {
                // Shift locks the image aspect even when the configuration leaves it free
                let options = EditOptions { lock_image_aspect: options.lock_image_aspect || modifiers.shift, ..*options };
                resize_kind(&mut kind, handle, dx, dy, &options)
            }
        }

        kind
    }
}

/// Resize an edge or corner of `original`, anchoring the opposite side and enforcing the floor
pub fn resize_rect(original: &Rect, handle: HandleType, dx: f32, dy: f32, min_w: f32, min_h: f32) -> Rect {
    let mut left = original.x;
    let mut right = original.right();
    let mut top = original.y;
    let mut bottom = original.bottom();

    if handle.moves_left() {
        left = (left + dx).min(right - min_w);
    }
    if handle.moves_right() {
        right = (right + dx).max(left + min_w);
    }
    if handle.moves_top() {
        top = (top + dy).min(bottom - min_h);
    }
    if handle.moves_bottom() {
        bottom = (bottom + dy).max(top + min_h);
    }

    Rect::new(left, top, right - left, bottom - top)
}

/// Adjust a resized rect so width/height equals `ratio`, anchored like the handle
fn lock_aspect(original: &Rect, resized: &Rect, handle: HandleType, ratio: f32, min: f32) -> Rect {
    let width_driven = match handle {
        HandleType::Left | HandleType::Right => true,
        HandleType::Top | HandleType::Bottom => false,
        _ => {
            let width_change = (resized.width / original.width.max(f32::EPSILON) - 1.0).abs();
            let height_change = (resized.height / original.height.max(f32::EPSILON) - 1.0).abs();
            width_change >= height_change
        }
    };

    let (mut width, mut height) = if width_driven {
        (resized.width, resized.width / ratio)
    } else {
        (resized.height * ratio, resized.height)
    };
    if width < min {
        width = min;
        height = width / ratio;
    }
    if height < min {
        height = min;
        width = height * ratio;
    }

    let x = if handle.moves_left() {
        original.right() - width
    } else if matches!(handle, HandleType::Top | HandleType::Bottom) {
        original.center().x - width / 2.0
    } else {
        original.x
    };
    let y = if handle.moves_top() {
        original.bottom() - height
    } else if matches!(handle, HandleType::Left | HandleType::Right) {
        original.center().y - height / 2.0
    } else {
        original.y
    };

    Rect::new(x, y, width, height)
}

/// Express a screen-space delta in the frame of a shape rotated by `rotation`
fn local_delta(dx: f32, dy: f32, rotation: f32) -> (f32, f32) {
    if rotation == 0.0 {
        return (dx, dy);
    }
    let local = rotate_point(&Point::new(dx, dy), &Point::default(), -rotation);
    (local.x, local.y)
}

fn resize_kind(kind: &mut AnnotationKind, handle: HandleType, dx: f32, dy: f32, options: &EditOptions) {
    let (min_w, min_h) = kind.min_size().unwrap_or((MIN_SHAPE_SIZE, MIN_SHAPE_SIZE));

    match kind {
        AnnotationKind::Box { rect } | AnnotationKind::Circle { rect } => {
            *rect = resize_rect(rect, handle, dx, dy, min_w, min_h);
        }
        AnnotationKind::Highlight { rect, segments } => {
            let resized = resize_rect(rect, handle, dx, dy, min_w, min_h);
            for segment in segments.iter_mut() {
                *segment = rect.map_rect(segment, &resized);
            }
            *rect = resized;
        }
        AnnotationKind::Comment { rect, rotation, .. } => {
            let (ldx, ldy) = local_delta(dx, dy, *rotation);
            *rect = resize_rect(rect, handle, ldx, ldy, min_w, min_h);
        }
        AnnotationKind::TextBox(text_box) => {
            text_box.rect = resize_rect(&text_box.rect, handle, dx, dy, min_w, min_h);
        }
        AnnotationKind::Callout(callout) => {
            callout.text_box.rect = resize_rect(&callout.text_box.rect, handle, dx, dy, min_w, min_h);
            callout.attach_arm();
        }
        AnnotationKind::Image(image) => {
            let (ldx, ldy) = local_delta(dx, dy, image.rotation);
            let resized = resize_rect(&image.rect, handle, ldx, ldy, min_w, min_h);
            image.rect = if options.lock_image_aspect {
                lock_aspect(&image.rect, &resized, handle, image.aspect_ratio(), min_w)
            } else {
                resized
            };
        }
        AnnotationKind::Draw { .. }
        | AnnotationKind::Polyline { .. }
        | AnnotationKind::Polygon { .. } => {
            let from = kind.bounds();
            // Flat strokes stay flat instead of being inflated to the floor
            let to = resize_rect(
                &from,
                handle,
                dx,
                dy,
                from.width.min(MIN_SHAPE_SIZE),
                from.height.min(MIN_SHAPE_SIZE),
            );
            let rescale = |point: &mut Point| *point = from.map_point(point, &to);
            match kind {
                AnnotationKind::Draw { strokes } => strokes.iter_mut().flatten().for_each(rescale),
                AnnotationKind::Polyline { points } | AnnotationKind::Polygon { points, .. } => {
                    points.iter_mut().for_each(rescale)
                }
                _ => {}
            }
        }
        AnnotationKind::Line { .. } | AnnotationKind::Text { .. } => {}
    }
}

/// Drag state of the handle editor
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditorState {
    #[default]
    Idle,
    /// Dragging a resize, endpoint, leader, or rotation handle
    DraggingHandle(ManipulationState),
    /// Dragging the annotation body
    Moving(ManipulationState),
}

/// Interactive move/resize/rotate controller for the selected annotation
#[derive(Debug, Clone)]
pub struct HandleEditor {
    state: EditorState,
    handle_size: f32,
    options: EditOptions,
}

impl HandleEditor {
    pub fn new(handle_size: f32, options: EditOptions) -> Self {
        Self { state: EditorState::Idle, handle_size, options }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, EditorState::Idle)
    }

    pub fn handle_size(&self) -> f32 {
        self.handle_size
    }

    pub fn options(&self) -> &EditOptions {
        &self.options
    }

    /// Start a drag on the selected annotation if `point` is on one of its handles or its body.
    ///
    /// Returns `Ok(false)` when nothing is selected or the point misses it.
    pub fn begin(
        &mut self,
        store: &mut AnnotationStore,
        point: Point,
        thresholds: &HitThresholds,
    ) -> AnnotationResult<bool> {
        let Some(selected) = store.selected() else {
            return Ok(false);
        };

        let handle = handle_at(selected, &point, self.handle_size);
        if handle.is_none() && !selected.hit_test(&point, thresholds) {
            return Ok(false);
        }

        let id = selected.id();
        if selected.is_locked() {
            return Err(AnnotationError::Locked(id));
        }

        let state = ManipulationState::new(id, handle, selected.kind().clone(), point);
        store.checkpoint(id)?;
        trace!(%id, ?handle, "drag started");

        self.state = match handle {
            Some(_) => EditorState::DraggingHandle(state),
            None => EditorState::Moving(state),
        };
        Ok(true)
    }

    /// Apply the drag for a new pointer position. Returns `Ok(false)` when idle.
    pub fn drag(
        &mut self,
        store: &mut AnnotationStore,
        point: Point,
        modifiers: Modifiers,
    ) -> AnnotationResult<bool> {
        let state = match &mut self.state {
            EditorState::Idle => return Ok(false),
            EditorState::DraggingHandle(state) | EditorState::Moving(state) => state,
        };

        state.current_position = point;
        let kind = state.calculate_new_kind(&self.options, modifiers);
        store.update_untracked(state.annotation_id, |annotation| *annotation.kind_mut() = kind)?;
        Ok(true)
    }

    /// Finish the drag, keeping the current geometry
    pub fn end(&mut self) -> Option<AnnotationId> {
        match std::mem::take(&mut self.state) {
            EditorState::Idle => None,
            EditorState::DraggingHandle(state) | EditorState::Moving(state) => {
                trace!(id = %state.annotation_id, "drag finished");
                Some(state.annotation_id)
            }
        }
    }

    /// Abort the drag and put the pre-drag geometry back
    pub fn cancel(&mut self, store: &mut AnnotationStore) -> AnnotationResult<()> {
        match std::mem::take(&mut self.state) {
            EditorState::Idle => Ok(()),
            EditorState::DraggingHandle(state) | EditorState::Moving(state) => store
                .update_untracked(state.annotation_id, |annotation| {
                    *annotation.kind_mut() = state.original
                }),
        }
    }
}

/// Translate an annotation by (dx, dy)
pub fn move_by(store: &mut AnnotationStore, id: AnnotationId, dx: f32, dy: f32) -> AnnotationResult<()> {
    store.update(id, |annotation| annotation.kind_mut().translate(dx, dy))
}

/// Resize an annotation as if `handle` had been dragged by (dx, dy)
pub fn resize_by(
    store: &mut AnnotationStore,
    id: AnnotationId,
    handle: HandleType,
    dx: f32,
    dy: f32,
    options: &EditOptions,
) -> AnnotationResult<()> {
    store.update(id, |annotation| {
        let mut state =
            ManipulationState::new(id, Some(handle), annotation.kind().clone(), Point::default());
        state.current_position = Point::new(dx, dy);
        *annotation.kind_mut() = state.calculate_new_kind(options, Modifiers::default());
    })
}

/// Set the rotation of a comment or image
pub fn set_rotation(store: &mut AnnotationStore, id: AnnotationId, degrees: f32) -> AnnotationResult<()> {
    let rotatable = store.get(id).ok_or(AnnotationError::NotFound(id))?.kind().rotation().is_some();
    if !rotatable {
        return Err(AnnotationError::InvalidGeometry("only comments and images rotate".to_owned()));
    }

    let degrees = crate::geometry::normalize_degrees(degrees);
    store.update(id, |annotation| match annotation.kind_mut() {
        AnnotationKind::Comment { rotation, .. } => *rotation = degrees,
        AnnotationKind::Image(image) => image.rotation = degrees,
        _ => {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Callout, FontStyle, ImageShape, TextBox, MIN_IMAGE_SIZE};
    use crate::images::ImageKey;

    const EPS: f32 = 1e-3;

    fn editor() -> HandleEditor {
        HandleEditor::new(8.0, EditOptions::default())
    }

    fn selected(store: &mut AnnotationStore, kind: AnnotationKind) -> AnnotationId {
        let id = store.add(Annotation::new(1, kind).expect("valid annotation"));
        store.select(id).expect("selectable");
        id
    }

    fn rect_of(store: &AnnotationStore, id: AnnotationId) -> Rect {
        *store.get(id).and_then(|a| a.kind().rect()).expect("bounding-box variant")
    }

    #[test]
    fn test_handle_counts_per_variant() {
        let boxed = Annotation::new(1, AnnotationKind::Box { rect: Rect::new(0.0, 0.0, 50.0, 50.0) })
            .expect("valid");
        assert_eq!(generate_handles(&boxed, 8.0).len(), 8);

        let line = Annotation::new(
            1,
            AnnotationKind::Line { start: Point::new(0.0, 0.0), end: Point::new(10.0, 10.0) },
        )
        .expect("valid");
        assert_eq!(generate_handles(&line, 8.0).len(), 2);

        let comment = Annotation::new(
            1,
            AnnotationKind::Comment { rect: Rect::new(0.0, 0.0, 24.0, 24.0), text: String::new(), rotation: 0.0 },
        )
        .expect("valid");
        let handles = generate_handles(&comment, 8.0);
        assert_eq!(handles.len(), 9);
        assert!(handles.iter().any(|h| h.handle_type == HandleType::Rotate));

        let ink = Annotation::new(
            1,
            AnnotationKind::Draw { strokes: vec![vec![Point::new(0.0, 0.0), Point::new(40.0, 30.0)]] },
        )
        .expect("valid");
        assert_eq!(generate_handles(&ink, 8.0).len(), 4);
    }

    #[test]
    fn test_resize_bottom_right() {
        let mut store = AnnotationStore::new();
        let id = selected(&mut store, AnnotationKind::Box { rect: Rect::new(10.0, 10.0, 100.0, 50.0) });
        let mut editor = editor();

        assert!(editor.begin(&mut store, Point::new(110.0, 60.0), &HitThresholds::default()).expect("begin"));
        assert!(matches!(editor.state(), EditorState::DraggingHandle(s) if s.handle == Some(HandleType::BottomRight)));

        // Intermediate frames do not accumulate
        editor.drag(&mut store, Point::new(150.0, 90.0), Modifiers::default()).expect("drag");
        editor.drag(&mut store, Point::new(130.0, 70.0), Modifiers::default()).expect("drag");
        assert_eq!(editor.end(), Some(id));

        assert_eq!(rect_of(&store, id), Rect::new(10.0, 10.0, 120.0, 60.0));
    }

    #[test]
    fn test_resize_clamps_to_floor_and_anchors_opposite_edge() {
        let rect = Rect::new(10.0, 10.0, 100.0, 50.0);
        let resized = resize_rect(&rect, HandleType::TopLeft, 500.0, 500.0, 10.0, 10.0);

        assert_eq!(resized, Rect::new(100.0, 50.0, 10.0, 10.0));
    }

    #[test]
    fn test_move_translates_from_snapshot() {
        let mut store = AnnotationStore::new();
        let id = selected(&mut store, AnnotationKind::Box { rect: Rect::new(10.0, 10.0, 100.0, 50.0) });
        let mut editor = editor();

        // Border of an unfilled box, away from the handles
        assert!(editor.begin(&mut store, Point::new(35.0, 10.0), &HitThresholds::default()).expect("begin"));
        assert!(matches!(editor.state(), EditorState::Moving(_)));
        editor.drag(&mut store, Point::new(45.0, 30.0), Modifiers::default()).expect("drag");
        editor.end();

        assert_eq!(rect_of(&store, id), Rect::new(20.0, 30.0, 100.0, 50.0));
    }

    #[test]
    fn test_begin_rejects_locked_annotation() {
        let mut store = AnnotationStore::new();
        let id = selected(&mut store, AnnotationKind::Box { rect: Rect::new(10.0, 10.0, 100.0, 50.0) });
        store.set_locked(id, true).expect("lock");
        let mut editor = editor();

        let err = editor.begin(&mut store, Point::new(110.0, 60.0), &HitThresholds::default());
        assert_eq!(err, Err(AnnotationError::Locked(id)));
        assert!(editor.is_idle());
        assert_eq!(move_by(&mut store, id, 5.0, 5.0), Err(AnnotationError::Locked(id)));
        assert_eq!(rect_of(&store, id), Rect::new(10.0, 10.0, 100.0, 50.0));
    }

    #[test]
    fn test_line_endpoint_angle_snap() {
        let mut store = AnnotationStore::new();
        let id = selected(
            &mut store,
            AnnotationKind::Line { start: Point::new(100.0, 150.0), end: Point::new(200.0, 200.0) },
        );
        let options = EditOptions { snap: SnapConfig { line_angle_step: 30.0, ..SnapConfig::default() }, ..EditOptions::default() };
        let mut editor = HandleEditor::new(8.0, options);

        assert!(editor.begin(&mut store, Point::new(100.0, 150.0), &HitThresholds::default()).expect("begin"));
        editor.drag(&mut store, Point::new(90.0, 155.0), Modifiers { shift: true }).expect("drag");
        editor.end();

        let AnnotationKind::Line { start, end } = store.get(id).expect("present").kind().clone() else {
            panic!("line expected");
        };
        assert_eq!(end, Point::new(200.0, 200.0));

        let raw_len = Point::new(90.0, 155.0).distance_to(&end);
        assert!((start.distance_to(&end) - raw_len).abs() < EPS);
        let angle = (start.y - end.y).atan2(start.x - end.x).to_degrees();
        assert!((angle / 30.0 - (angle / 30.0).round()).abs() < EPS);
    }

    #[test]
    fn test_rotate_handle_snaps() {
        let mut store = AnnotationStore::new();
        let id = selected(
            &mut store,
            AnnotationKind::Comment { rect: Rect::new(100.0, 100.0, 24.0, 24.0), text: "n".into(), rotation: 0.0 },
        );
        let mut editor = editor();

        let rotate = Point::new(112.0, 100.0 - ROTATION_HANDLE_OFFSET);
        assert!(editor.begin(&mut store, rotate, &HitThresholds::default()).expect("begin"));
        editor.drag(&mut store, Point::new(200.0, 105.0), Modifiers { shift: true }).expect("drag");
        editor.end();

        assert_eq!(store.get(id).and_then(|a| a.kind().rotation()), Some(90.0));
    }

    #[test]
    fn test_freehand_resize_scales_points() {
        let mut store = AnnotationStore::new();
        let id = selected(
            &mut store,
            AnnotationKind::Draw {
                strokes: vec![vec![Point::new(0.0, 0.0), Point::new(50.0, 25.0), Point::new(100.0, 50.0)]],
            },
        );

        resize_by(&mut store, id, HandleType::BottomRight, 100.0, 50.0, &EditOptions::default())
            .expect("resize");

        let AnnotationKind::Draw { strokes } = store.get(id).expect("present").kind() else {
            panic!("draw expected");
        };
        assert_eq!(strokes[0][1], Point::new(100.0, 50.0));
        assert_eq!(strokes[0][2], Point::new(200.0, 100.0));
    }

    #[test]
    fn test_image_resize_keeps_aspect_and_floor() {
        let mut store = AnnotationStore::new();
        let id = selected(
            &mut store,
            AnnotationKind::Image(ImageShape {
                rect: Rect::new(0.0, 0.0, 200.0, 100.0),
                rotation: 0.0,
                flip_horizontal: false,
                flip_vertical: false,
                image: ImageKey::new(),
                natural_width: 400.0,
                natural_height: 200.0,
            }),
        );
        let options = EditOptions::default();

        resize_by(&mut store, id, HandleType::Right, 100.0, 0.0, &options).expect("resize");
        let rect = rect_of(&store, id);
        assert!((rect.width - 300.0).abs() < EPS);
        assert!((rect.height - 150.0).abs() < EPS);

        resize_by(&mut store, id, HandleType::BottomRight, -1000.0, -1000.0, &options).expect("resize");
        let rect = rect_of(&store, id);
        assert!(rect.height >= MIN_IMAGE_SIZE - EPS);
        assert!((rect.width / rect.height - 2.0).abs() < EPS);
    }

    #[test]
    fn test_shift_locks_aspect_when_unlocked_by_config() {
        let original = AnnotationKind::Image(ImageShape {
            rect: Rect::new(0.0, 0.0, 200.0, 100.0),
            rotation: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
            image: ImageKey::new(),
            natural_width: 400.0,
            natural_height: 200.0,
        });
        let mut state =
            ManipulationState::new(AnnotationId::new_v4(), Some(HandleType::Right), original, Point::new(200.0, 50.0));
        state.current_position = Point::new(300.0, 50.0);
        let options = EditOptions { lock_image_aspect: false, ..EditOptions::default() };

        let free = state.calculate_new_kind(&options, Modifiers::default());
        assert_eq!(free.rect().map(|r| r.height), Some(100.0));

        let locked = state.calculate_new_kind(&options, Modifiers { shift: true });
        let rect = locked.rect().copied().expect("image rect");
        assert!((rect.width - 300.0).abs() < EPS);
        assert!((rect.height - 150.0).abs() < EPS);
    }

    #[test]
    fn test_callout_knee_drag_reattaches_arm() {
        let mut store = AnnotationStore::new();
        let text_box = TextBox {
            rect: Rect::new(100.0, 100.0, 150.0, 60.0),
            text: "see here".into(),
            font: FontStyle::default(),
        };
        let id = selected(&mut store, AnnotationKind::Callout(Callout::new(text_box, Point::new(20.0, 130.0))));
        let mut editor = editor();

        // Knee starts 30pt left of the box's left edge midpoint
        assert!(editor.begin(&mut store, Point::new(70.0, 130.0), &HitThresholds::default()).expect("begin"));
        editor.drag(&mut store, Point::new(175.0, 260.0), Modifiers::default()).expect("drag");
        editor.end();

        let AnnotationKind::Callout(callout) = store.get(id).expect("present").kind() else {
            panic!("callout expected");
        };
        assert_eq!(callout.knee, Point::new(175.0, 260.0));
        assert_eq!(callout.arm_origin, Point::new(175.0, 160.0));
        assert_eq!(callout.arrow_tip, Point::new(20.0, 130.0));
    }

    #[test]
    fn test_cancel_restores_original() {
        let mut store = AnnotationStore::new();
        let id = selected(&mut store, AnnotationKind::Circle { rect: Rect::new(10.0, 10.0, 100.0, 50.0) });
        let mut editor = editor();

        editor.begin(&mut store, Point::new(110.0, 60.0), &HitThresholds::default()).expect("begin");
        editor.drag(&mut store, Point::new(300.0, 300.0), Modifiers::default()).expect("drag");
        editor.cancel(&mut store).expect("cancel");

        assert_eq!(rect_of(&store, id), Rect::new(10.0, 10.0, 100.0, 50.0));
        assert!(editor.is_idle());
    }

    #[test]
    fn test_drag_is_undoable_as_one_step() {
        let mut store = AnnotationStore::new();
        let id = selected(&mut store, AnnotationKind::Box { rect: Rect::new(10.0, 10.0, 100.0, 50.0) });
        let mut editor = editor();

        editor.begin(&mut store, Point::new(110.0, 60.0), &HitThresholds::default()).expect("begin");
        editor.drag(&mut store, Point::new(120.0, 70.0), Modifiers::default()).expect("drag");
        editor.drag(&mut store, Point::new(140.0, 90.0), Modifiers::default()).expect("drag");
        editor.end();

        assert!(store.undo());
        assert_eq!(rect_of(&store, id), Rect::new(10.0, 10.0, 100.0, 50.0));
    }

    #[test]
    fn test_set_rotation_only_for_rotatable_variants() {
        let mut store = AnnotationStore::new();
        let boxed = selected(&mut store, AnnotationKind::Box { rect: Rect::new(0.0, 0.0, 20.0, 20.0) });
        assert!(matches!(set_rotation(&mut store, boxed, 45.0), Err(AnnotationError::InvalidGeometry(_))));
    }
}
