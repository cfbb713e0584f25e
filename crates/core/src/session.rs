//! Editor session
//!
//! Turns pointer events in device space into store operations. The session owns
//! the transient drawing state (active tool, in-progress gesture, drag state,
//! clipboard) while the store and image store are passed in on every call.

use crate::annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationMetadata, AnnotationStyle, AnnotationType,
    BorderStyle, Callout, Color, FontStyle, ImageShape, TextBox, MIN_CALLOUT_HEIGHT,
    MIN_CALLOUT_WIDTH,
};
use crate::clipboard::Clipboard;
use crate::config::EditorConfig;
use crate::error::{AnnotationError, AnnotationResult, CodecError};
use crate::geometry::{Point, Rect};
use crate::hit_test::find_at;
use crate::images::{ImageKey, ImageStore};
use crate::manipulation::{HandleEditor, Modifiers};
use crate::snapping::snap_segment;
use crate::store::AnnotationStore;
use crate::transform::CoordinateTransform;
use pdf_engine::PageSize;
use tracing::debug;

/// Gestures smaller than this on both axes are treated as clicks
const MIN_GESTURE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Highlight,
    Draw,
    Line,
    Circle,
    Box,
    Polyline,
    Polygon,
    Cloud,
    Comment,
    Text,
    TextBox,
    Callout,
    Image,
}

/// Style applied to newly created annotations
#[derive(Debug, Clone, PartialEq)]
pub struct ToolStyle {
    /// `None` picks the default color of the created variant
    pub stroke_color: Option<Color>,
    pub fill_color: Option<Color>,
    pub line_width: f32,
    pub opacity: f32,
    pub border_style: BorderStyle,
    pub font: FontStyle,
}

impl Default for ToolStyle {
    fn default() -> Self {
        Self {
            stroke_color: None,
            fill_color: None,
            line_width: 2.0,
            opacity: 1.0,
            border_style: BorderStyle::Solid,
            font: FontStyle::default(),
        }
    }
}

impl ToolStyle {
    pub fn style_for(&self, annotation_type: AnnotationType) -> AnnotationStyle {
        let fillable = matches!(
            annotation_type,
            AnnotationType::Box
                | AnnotationType::Circle
                | AnnotationType::Polygon
                | AnnotationType::TextBox
                | AnnotationType::Callout
        );
        AnnotationStyle::new(self.stroke_color.unwrap_or_else(|| annotation_type.default_color()))
            .with_fill(if fillable { self.fill_color } else { None })
            .with_line_width(self.line_width)
            .with_opacity(self.opacity)
            .with_border_style(self.border_style)
    }
}

/// In-progress drawing gesture, in user space
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Press-drag-release tools
    Drag { start: Point, current: Point },
    Freehand { points: Vec<Point> },
    /// Click-per-vertex tools, finished by double-click or Escape
    Vertices { points: Vec<Point> },
}

/// What a pointer event did, for the UI to react to
#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    None,
    Created(AnnotationId),
    /// Selection changed; `None` means cleared
    Selected(Option<AnnotationId>),
    Edited(AnnotationId),
    /// The UI should prompt for text, then call [`EditorSession::commit_text`]
    TextRequested { page: u32, point: Point, tool: Tool },
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    config: EditorConfig,
    transform: CoordinateTransform,
    tool: Tool,
    style: ToolStyle,
    gesture: Gesture,
    editor: HandleEditor,
    clipboard: Clipboard,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            transform: CoordinateTransform::new(config.default_scale),
            editor: HandleEditor::new(config.handle_size, config.edit_options()),
            tool: Tool::default(),
            style: ToolStyle::default(),
            gesture: Gesture::Idle,
            clipboard: Clipboard::new(),
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switch tools, abandoning any unfinished gesture
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        self.gesture = Gesture::Idle;
        self.editor.end();
    }

    pub fn style(&self) -> &ToolStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut ToolStyle {
        &mut self.style
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn handle_editor(&self) -> &HandleEditor {
        &self.editor
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn pointer_down(
        &mut self,
        store: &mut AnnotationStore,
        device: Point,
    ) -> AnnotationResult<PointerOutcome> {
        let point = self.transform.device_to_user(device);
        let page = store.current_page();

        match self.tool {
            Tool::Select => {
                if self.begin_drag(store, point)? {
                    return Ok(PointerOutcome::None);
                }
                match find_at(store, page, &point, &self.config.hit).map(Annotation::id) {
                    Some(id) => {
                        store.select(id)?;
                        self.begin_drag(store, point)?;
                        Ok(PointerOutcome::Selected(Some(id)))
                    }
                    None => {
                        let had_selection = store.selected_id().is_some();
                        store.deselect();
                        Ok(if had_selection { PointerOutcome::Selected(None) } else { PointerOutcome::None })
                    }
                }
            }
            Tool::Highlight | Tool::Box | Tool::Circle | Tool::TextBox | Tool::Line | Tool::Callout => {
                self.gesture = Gesture::Drag { start: point, current: point };
                Ok(PointerOutcome::None)
            }
            Tool::Draw => {
                self.gesture = Gesture::Freehand { points: vec![point] };
                Ok(PointerOutcome::None)
            }
            Tool::Polyline | Tool::Polygon | Tool::Cloud => {
                match &mut self.gesture {
                    Gesture::Vertices { points } => {
                        // The second press of a double-click lands on the last vertex
                        let duplicate = points
                            .last()
                            .is_some_and(|last| last.distance_to(&point) < MIN_GESTURE);
                        if !duplicate {
                            points.push(point);
                        }
                    }
                    other => *other = Gesture::Vertices { points: vec![point] },
                }
                Ok(PointerOutcome::None)
            }
            Tool::Comment | Tool::Text => Ok(PointerOutcome::TextRequested { page, point, tool: self.tool }),
            Tool::Image => Ok(PointerOutcome::None),
        }
    }

    /// Start a handle-editor drag; a locked selection stays selected but does not move
    fn begin_drag(&mut self, store: &mut AnnotationStore, point: Point) -> AnnotationResult<bool> {
        match self.editor.begin(store, point, &self.config.hit) {
            Err(AnnotationError::Locked(id)) => {
                debug!(%id, "drag on locked annotation ignored");
                Ok(true)
            }
            other => other,
        }
    }

    pub fn pointer_move(
        &mut self,
        store: &mut AnnotationStore,
        device: Point,
        modifiers: Modifiers,
    ) -> AnnotationResult<PointerOutcome> {
        let point = self.transform.device_to_user(device);

        if !self.editor.is_idle() {
            self.editor.drag(store, point, modifiers)?;
            return Ok(store.selected_id().map_or(PointerOutcome::None, PointerOutcome::Edited));
        }

        match &mut self.gesture {
            Gesture::Drag { current, .. } => *current = point,
            Gesture::Freehand { points } => {
                if points.last() != Some(&point) {
                    points.push(point);
                }
            }
            Gesture::Idle | Gesture::Vertices { .. } => {}
        }
        Ok(PointerOutcome::None)
    }

    pub fn pointer_up(
        &mut self,
        store: &mut AnnotationStore,
        device: Point,
        modifiers: Modifiers,
    ) -> AnnotationResult<PointerOutcome> {
        let point = self.transform.device_to_user(device);

        if !self.editor.is_idle() {
            self.editor.drag(store, point, modifiers)?;
            return Ok(self.editor.end().map_or(PointerOutcome::None, PointerOutcome::Edited));
        }

        match std::mem::take(&mut self.gesture) {
            Gesture::Drag { start, .. } => {
                let (dx, dy) = (point.x - start.x, point.y - start.y);
                if dx.abs() < MIN_GESTURE && dy.abs() < MIN_GESTURE {
                    return Ok(PointerOutcome::None);
                }
                let kind = self.drag_kind(start, point, modifiers);
                self.create(store, kind)
            }
            Gesture::Freehand { mut points } => {
                if points.last() != Some(&point) {
                    points.push(point);
                }
                if points.len() < 2 {
                    return Ok(PointerOutcome::None);
                }
                self.create(store, AnnotationKind::Draw { strokes: vec![points] })
            }
            // Vertex tools keep collecting until double-click or Escape
            vertices @ Gesture::Vertices { .. } => {
                self.gesture = vertices;
                Ok(PointerOutcome::None)
            }
            Gesture::Idle => Ok(PointerOutcome::None),
        }
    }

    fn drag_kind(&self, start: Point, end: Point, modifiers: Modifiers) -> AnnotationKind {
        let rect = Rect::from_corners(start, end);
        match self.tool {
            Tool::Highlight => AnnotationKind::Highlight { rect, segments: Vec::new() },
            Tool::Circle => AnnotationKind::Circle { rect },
            Tool::TextBox => AnnotationKind::TextBox(TextBox {
                rect,
                text: String::new(),
                font: self.style.font.clone(),
            }),
            Tool::Line => {
                let end = if modifiers.shift {
                    snap_segment(&start, &end, self.config.snap.line_angle_step)
                } else {
                    end
                };
                AnnotationKind::Line { start, end }
            }
            Tool::Callout => {
                let text_box = TextBox {
                    rect: Rect::new(
                        end.x,
                        end.y,
                        self.config.callout_width.max(MIN_CALLOUT_WIDTH),
                        self.config.callout_height.max(MIN_CALLOUT_HEIGHT),
                    ),
                    text: String::new(),
                    font: self.style.font.clone(),
                };
                AnnotationKind::Callout(Callout::new(text_box, start))
            }
            _ => AnnotationKind::Box { rect },
        }
    }

    /// Finish a polyline, polygon, or cloud
    pub fn double_click(&mut self, store: &mut AnnotationStore) -> AnnotationResult<PointerOutcome> {
        match std::mem::take(&mut self.gesture) {
            Gesture::Vertices { points } => self.finish_vertices(store, points),
            other => {
                self.gesture = other;
                Ok(PointerOutcome::None)
            }
        }
    }

    /// Finish a vertex gesture that has enough points, otherwise cancel whatever is in progress
    pub fn escape(&mut self, store: &mut AnnotationStore) -> AnnotationResult<PointerOutcome> {
        if !self.editor.is_idle() {
            self.editor.cancel(store)?;
            return Ok(PointerOutcome::None);
        }
        match std::mem::take(&mut self.gesture) {
            Gesture::Vertices { points } => self.finish_vertices(store, points),
            _ => Ok(PointerOutcome::None),
        }
    }

    fn finish_vertices(
        &mut self,
        store: &mut AnnotationStore,
        points: Vec<Point>,
    ) -> AnnotationResult<PointerOutcome> {
        let kind = match self.tool {
            Tool::Polyline if points.len() >= 2 => AnnotationKind::Polyline { points },
            Tool::Polygon if points.len() >= 3 => AnnotationKind::Polygon { points, cloud: false },
            Tool::Cloud if points.len() >= 3 => AnnotationKind::Polygon { points, cloud: true },
            _ => return Ok(PointerOutcome::None),
        };
        self.create(store, kind)
    }

    /// Place a comment or text run once the UI has collected its text
    pub fn commit_text(
        &mut self,
        store: &mut AnnotationStore,
        page: u32,
        point: Point,
        tool: Tool,
        text: &str,
    ) -> AnnotationResult<PointerOutcome> {
        let kind = match tool {
            Tool::Comment => AnnotationKind::Comment {
                rect: Rect::new(point.x, point.y, self.config.comment_size, self.config.comment_size),
                text: text.to_owned(),
                rotation: 0.0,
            },
            Tool::Text if !text.trim().is_empty() => AnnotationKind::Text {
                origin: point,
                text: text.to_owned(),
                font_size: self.style.font.size,
            },
            _ => return Ok(PointerOutcome::None),
        };
        self.create_on(store, page, kind)
    }

    /// Place an image at its natural size with its top-left corner at `at` (user space)
    pub fn insert_image(
        &mut self,
        store: &mut AnnotationStore,
        images: &ImageStore,
        key: ImageKey,
        at: Point,
    ) -> Result<AnnotationId, CodecError> {
        let pixels = images.get(&key).ok_or(CodecError::MissingImage(key))?;
        let (width, height) = (pixels.width() as f32, pixels.height() as f32);

        let kind = AnnotationKind::Image(ImageShape {
            rect: Rect::new(at.x, at.y, width, height),
            rotation: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
            image: key,
            natural_width: width,
            natural_height: height,
        });
        let page = store.current_page();
        match self.create_on(store, page, kind) {
            Ok(PointerOutcome::Created(id)) => Ok(id),
            Ok(_) => Err(CodecError::InvalidImage("image was not placed".to_owned())),
            Err(err) => Err(CodecError::InvalidImage(err.to_string())),
        }
    }

    fn create(&mut self, store: &mut AnnotationStore, kind: AnnotationKind) -> AnnotationResult<PointerOutcome> {
        let page = store.current_page();
        self.create_on(store, page, kind)
    }

    fn create_on(
        &mut self,
        store: &mut AnnotationStore,
        page: u32,
        kind: AnnotationKind,
    ) -> AnnotationResult<PointerOutcome> {
        let annotation_type = kind.annotation_type();
        let annotation = Annotation::new(page, kind)?
            .with_style(self.style.style_for(annotation_type))
            .with_metadata(AnnotationMetadata::new(self.config.default_author.clone()));
        Ok(PointerOutcome::Created(store.add(annotation)))
    }

    /// Change the displayed page, dropping unfinished gestures
    pub fn set_page(&mut self, store: &mut AnnotationStore, page: u32) {
        self.gesture = Gesture::Idle;
        self.editor.end();
        store.set_current_page(page);
    }

    pub fn zoom_in(&mut self) {
        self.transform.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.transform.zoom_out();
    }

    pub fn wheel_zoom(&mut self, direction: f32) {
        self.transform.wheel_zoom(direction);
    }

    pub fn actual_size(&mut self) {
        self.transform.actual_size();
    }

    pub fn fit_page(&mut self, container_width: f32, container_height: f32, page: &PageSize) {
        self.transform.fit_page(container_width, container_height, page);
    }

    pub fn fit_width(&mut self, container_width: f32, page: &PageSize) {
        self.transform.fit_width(container_width, page.width_pt);
    }

    /// Copy the selection. Returns `false` when nothing is selected.
    pub fn copy_selected(&mut self, store: &AnnotationStore) -> bool {
        match store.selected() {
            Some(annotation) => {
                self.clipboard.copy(annotation);
                true
            }
            None => false,
        }
    }

    /// Paste onto the displayed page and select the copy
    pub fn paste(&mut self, store: &mut AnnotationStore, images: &mut ImageStore) -> Option<AnnotationId> {
        let page = store.current_page();
        let id = self.clipboard.paste(store, images, page, self.config.paste_offset)?;
        store.select(id).ok()?;
        Some(id)
    }

    pub fn delete_selected(&mut self, store: &mut AnnotationStore) -> AnnotationResult<Option<Annotation>> {
        match store.selected_id() {
            Some(id) => store.remove(id).map(Some),
            None => Ok(None),
        }
    }

    pub fn duplicate_selected(&mut self, store: &mut AnnotationStore) -> AnnotationResult<Option<AnnotationId>> {
        let Some(id) = store.selected_id() else {
            return Ok(None);
        };
        let offset = self.config.paste_offset;
        let copy = store.duplicate(id, offset, offset)?;
        store.select(copy)?;
        Ok(Some(copy))
    }

    pub fn undo(&mut self, store: &mut AnnotationStore) -> bool {
        self.gesture = Gesture::Idle;
        self.editor.end();
        store.undo()
    }
}
