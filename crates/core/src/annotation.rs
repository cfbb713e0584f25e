//! Annotation data model
//!
//! An annotation is a closed set of variants (`AnnotationKind`) composed with shared
//! style, metadata, and flags. All geometry is stored in unscaled user space with a
//! top-left origin; conversion to the native bottom-left space happens only in the
//! interchange codec.

use crate::error::{AnnotationError, AnnotationResult};
use crate::geometry::{bounding_box, Point, Rect};
use crate::images::ImageKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an annotation
///
/// Generated using UUID v4 and written to the native object's `/NM` entry so it
/// survives a save/load cycle.
pub type AnnotationId = uuid::Uuid;

/// Minimum width and height for generic bounding-box shapes
pub const MIN_SHAPE_SIZE: f32 = 10.0;
/// Minimum width and height for images
pub const MIN_IMAGE_SIZE: f32 = 20.0;
pub const MIN_CALLOUT_WIDTH: f32 = 50.0;
pub const MIN_CALLOUT_HEIGHT: f32 = 30.0;
/// Sticky notes are placed as a fixed-size icon
pub const DEFAULT_COMMENT_SIZE: f32 = 24.0;

/// Average glyph advance as a fraction of the font size, for text extents
pub const TEXT_CHAR_WIDTH: f32 = 0.6;
pub const TEXT_LINE_HEIGHT: f32 = 1.2;

/// Opaque RGB color, 8 bits per channel
///
/// Serialized as a `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0 };
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255 };
    pub const YELLOW: Color = Color { r: 255, g: 255, b: 0 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from components in `[0, 1]`, clamping out-of-range input
    pub fn from_normalized(r: f32, g: f32, b: f32) -> Self {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self { r: channel(r), g: channel(g), b: channel(b) }
    }

    /// Convert to normalized RGB values (0.0 to 1.0)
    pub fn to_normalized(&self) -> [f32; 3] {
        [self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0]
    }

    /// Parse `#rrggbb` or `rrggbb`
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#').unwrap_or(value);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self { r: channel(0..2)?, g: channel(2..4)?, b: channel(4..6)? })
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color `{value}`"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Stroke pattern for outlines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl BorderStyle {
    /// Dash array (on, off) in points, `None` for solid strokes
    pub fn dash_pattern(&self) -> Option<[f32; 2]> {
        match self {
            BorderStyle::Solid => None,
            BorderStyle::Dashed => Some([3.0, 3.0]),
            BorderStyle::Dotted => Some([1.0, 2.0]),
        }
    }
}

/// Visual styling shared by every variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StyleFields")]
pub struct AnnotationStyle {
    pub stroke_color: Color,
    /// `None` means no fill
    pub fill_color: Option<Color>,
    line_width: f32,
    pub border_style: BorderStyle,
    opacity: f32,
}

impl AnnotationStyle {
    pub fn new(stroke_color: Color) -> Self {
        Self { stroke_color, ..Self::default() }
    }

    pub fn with_fill(mut self, fill: Option<Color>) -> Self {
        self.fill_color = fill;
        self
    }

    pub fn with_line_width(mut self, width: f32) -> Self {
        self.set_line_width(width);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.set_opacity(opacity);
        self
    }

    pub fn with_border_style(mut self, border_style: BorderStyle) -> Self {
        self.border_style = border_style;
        self
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.line_width = if width.is_finite() { width.max(0.0) } else { 0.0 };
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 };
    }

    pub fn is_filled(&self) -> bool {
        self.fill_color.is_some()
    }
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            stroke_color: Color::RED,
            fill_color: None,
            line_width: 2.0,
            border_style: BorderStyle::Solid,
            opacity: 1.0,
        }
    }
}

/// Serialized style fields; converting re-applies the setter clamps
#[derive(Deserialize)]
#[serde(default)]
struct StyleFields {
    stroke_color: Color,
    fill_color: Option<Color>,
    line_width: f32,
    border_style: BorderStyle,
    opacity: f32,
}

impl Default for StyleFields {
    fn default() -> Self {
        let style = AnnotationStyle::default();
        Self {
            stroke_color: style.stroke_color,
            fill_color: style.fill_color,
            line_width: style.line_width,
            border_style: style.border_style,
            opacity: style.opacity,
        }
    }
}

impl From<StyleFields> for AnnotationStyle {
    fn from(fields: StyleFields) -> Self {
        AnnotationStyle::new(fields.stroke_color)
            .with_fill(fields.fill_color)
            .with_border_style(fields.border_style)
            .with_line_width(fields.line_width)
            .with_opacity(fields.opacity)
    }
}

/// Authoring metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationMetadata {
    pub author: String,
    #[serde(default)]
    pub subject: String,
    /// Free-form note for variants without their own text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl AnnotationMetadata {
    pub fn new(author: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            author: author.into(),
            subject: String::new(),
            contents: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Restore stored timestamps, keeping `modified >= created`
    pub fn with_timestamps(mut self, created: DateTime<Utc>, modified: DateTime<Utc>) -> Self {
        self.created_at = created;
        self.modified_at = modified.max(created);
        self
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Update modification timestamp
    pub fn touch(&mut self) {
        self.modified_at = Utc::now().max(self.modified_at).max(self.created_at);
    }
}

impl Default for AnnotationMetadata {
    fn default() -> Self {
        Self::new("Unknown")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationFlags {
    /// Suppresses every mutation except unlocking
    pub locked: bool,
    pub printable: bool,
    pub read_only: bool,
    /// Review mark toggled by the user
    pub marked: bool,
}

impl Default for AnnotationFlags {
    fn default() -> Self {
        Self { locked: false, printable: true, read_only: false, marked: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontStyle {
    pub family: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub align: TextAlign,
    /// Line height as a multiple of the font size
    pub line_spacing: f32,
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            family: "Helvetica".to_owned(),
            size: 12.0,
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            align: TextAlign::Left,
            line_spacing: TEXT_LINE_HEIGHT,
        }
    }
}

/// Free-text box content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub rect: Rect,
    pub text: String,
    #[serde(default)]
    pub font: FontStyle,
}

/// Text box with a two-segment leader line: box edge, knee, arrow tip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callout {
    pub text_box: TextBox,
    pub arrow_tip: Point,
    pub knee: Point,
    pub arm_origin: Point,
}

impl Callout {
    /// Distance from the arm origin to the knee for newly placed callouts
    pub const DEFAULT_ARM_LENGTH: f32 = 30.0;

    /// Build a callout whose leader runs from the box edge facing `arrow_tip`
    pub fn new(text_box: TextBox, arrow_tip: Point) -> Self {
        let rect = text_box.rect;
        let toward_left = arrow_tip.x < rect.center().x;
        let arm_origin = if toward_left {
            Point::new(rect.x, rect.center().y)
        } else {
            Point::new(rect.right(), rect.center().y)
        };
        let arm = if toward_left { -Self::DEFAULT_ARM_LENGTH } else { Self::DEFAULT_ARM_LENGTH };
        let knee = arm_origin.offset(arm, 0.0);
        Self { text_box, arrow_tip, knee, arm_origin }
    }

    /// Re-attach the arm origin to the midpoint of the box side nearest the knee
    pub fn attach_arm(&mut self) {
        let rect = self.text_box.rect;
        let center = rect.center();
        let candidates = [
            Point::new(rect.x, center.y),
            Point::new(rect.right(), center.y),
            Point::new(center.x, rect.y),
            Point::new(center.x, rect.bottom()),
        ];
        let knee = self.knee;
        self.arm_origin = candidates
            .into_iter()
            .min_by(|a, b| a.distance_to(&knee).total_cmp(&b.distance_to(&knee)))
            .unwrap_or(self.arm_origin);
    }

    /// Points of the leader polyline from box edge to arrow tip
    pub fn leader(&self) -> [Point; 3] {
        [self.arm_origin, self.knee, self.arrow_tip]
    }
}

/// Placed raster image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageShape {
    pub rect: Rect,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub flip_horizontal: bool,
    #[serde(default)]
    pub flip_vertical: bool,
    pub image: ImageKey,
    pub natural_width: f32,
    pub natural_height: f32,
}

impl ImageShape {
    /// Width over height of the source pixels
    pub fn aspect_ratio(&self) -> f32 {
        if self.natural_height > 0.0 {
            self.natural_width / self.natural_height
        } else {
            1.0
        }
    }
}

/// Variant-specific geometry and content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Text highlight; `segments` holds per-line rectangles, empty means `rect` alone
    Highlight {
        rect: Rect,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        segments: Vec<Rect>,
    },
    Box {
        rect: Rect,
    },
    /// Ellipse inscribed in `rect`
    Circle {
        rect: Rect,
    },
    Line {
        start: Point,
        end: Point,
    },
    /// Freehand ink, one point list per stroke
    Draw {
        strokes: Vec<Vec<Point>>,
    },
    Polyline {
        points: Vec<Point>,
    },
    Polygon {
        points: Vec<Point>,
        #[serde(default)]
        cloud: bool,
    },
    /// Sticky note icon
    Comment {
        rect: Rect,
        text: String,
        #[serde(default)]
        rotation: f32,
    },
    /// Single text run anchored at its baseline origin
    Text {
        origin: Point,
        text: String,
        font_size: f32,
    },
    TextBox(TextBox),
    Callout(Callout),
    Image(ImageShape),
}

/// Variant tag without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    Highlight,
    Box,
    Circle,
    Line,
    Draw,
    Polyline,
    Polygon,
    Comment,
    Text,
    TextBox,
    Callout,
    Image,
}

impl AnnotationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationType::Highlight => "highlight",
            AnnotationType::Box => "box",
            AnnotationType::Circle => "circle",
            AnnotationType::Line => "line",
            AnnotationType::Draw => "draw",
            AnnotationType::Polyline => "polyline",
            AnnotationType::Polygon => "polygon",
            AnnotationType::Comment => "comment",
            AnnotationType::Text => "text",
            AnnotationType::TextBox => "textbox",
            AnnotationType::Callout => "callout",
            AnnotationType::Image => "image",
        }
    }

    /// Default stroke color when none is specified
    pub fn default_color(&self) -> Color {
        match self {
            AnnotationType::Highlight | AnnotationType::Comment => Color::YELLOW,
            AnnotationType::Text | AnnotationType::TextBox | AnnotationType::Callout => Color::BLACK,
            _ => Color::RED,
        }
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AnnotationKind {
    pub fn annotation_type(&self) -> AnnotationType {
        match self {
            AnnotationKind::Highlight { .. } => AnnotationType::Highlight,
            AnnotationKind::Box { .. } => AnnotationType::Box,
            AnnotationKind::Circle { .. } => AnnotationType::Circle,
            AnnotationKind::Line { .. } => AnnotationType::Line,
            AnnotationKind::Draw { .. } => AnnotationType::Draw,
            AnnotationKind::Polyline { .. } => AnnotationType::Polyline,
            AnnotationKind::Polygon { .. } => AnnotationType::Polygon,
            AnnotationKind::Comment { .. } => AnnotationType::Comment,
            AnnotationKind::Text { .. } => AnnotationType::Text,
            AnnotationKind::TextBox(_) => AnnotationType::TextBox,
            AnnotationKind::Callout(_) => AnnotationType::Callout,
            AnnotationKind::Image(_) => AnnotationType::Image,
        }
    }

    /// The stored rectangle for bounding-box variants
    pub fn rect(&self) -> Option<&Rect> {
        match self {
            AnnotationKind::Highlight { rect, .. }
            | AnnotationKind::Box { rect }
            | AnnotationKind::Circle { rect }
            | AnnotationKind::Comment { rect, .. } => Some(rect),
            AnnotationKind::TextBox(text_box) => Some(&text_box.rect),
            AnnotationKind::Callout(callout) => Some(&callout.text_box.rect),
            AnnotationKind::Image(image) => Some(&image.rect),
            AnnotationKind::Line { .. }
            | AnnotationKind::Draw { .. }
            | AnnotationKind::Polyline { .. }
            | AnnotationKind::Polygon { .. }
            | AnnotationKind::Text { .. } => None,
        }
    }

    /// Minimum (width, height) for bounding-box variants
    pub fn min_size(&self) -> Option<(f32, f32)> {
        match self {
            AnnotationKind::Image(_) => Some((MIN_IMAGE_SIZE, MIN_IMAGE_SIZE)),
            AnnotationKind::Callout(_) => Some((MIN_CALLOUT_WIDTH, MIN_CALLOUT_HEIGHT)),
            other => other.rect().map(|_| (MIN_SHAPE_SIZE, MIN_SHAPE_SIZE)),
        }
    }

    /// Visual extent in user space, ignoring stroke width and rotation
    pub fn bounds(&self) -> Rect {
        match self {
            AnnotationKind::Line { start, end } => Rect::from_corners(*start, *end),
            AnnotationKind::Draw { strokes } => {
                bounding_box(strokes.iter().flatten()).unwrap_or_default()
            }
            AnnotationKind::Polyline { points } | AnnotationKind::Polygon { points, .. } => {
                bounding_box(points.iter()).unwrap_or_default()
            }
            AnnotationKind::Text { origin, text, font_size } => {
                text_extent(*origin, text, *font_size)
            }
            AnnotationKind::Callout(callout) => callout
                .leader()
                .iter()
                .fold(callout.text_box.rect, |acc, p| acc.union(&Rect::new(p.x, p.y, 0.0, 0.0))),
            other => other.rect().copied().unwrap_or_default(),
        }
    }

    /// Text content for text-bearing variants
    pub fn text(&self) -> Option<&str> {
        match self {
            AnnotationKind::Comment { text, .. } | AnnotationKind::Text { text, .. } => Some(text),
            AnnotationKind::TextBox(text_box) => Some(&text_box.text),
            AnnotationKind::Callout(callout) => Some(&callout.text_box.text),
            _ => None,
        }
    }

    /// Rotation in degrees for the variants that carry one
    pub fn rotation(&self) -> Option<f32> {
        match self {
            AnnotationKind::Comment { rotation, .. } => Some(*rotation),
            AnnotationKind::Image(image) => Some(image.rotation),
            _ => None,
        }
    }

    /// Offset every coordinate field by (dx, dy)
    pub fn translate(&mut self, dx: f32, dy: f32) {
        match self {
            AnnotationKind::Highlight { rect, segments } => {
                *rect = rect.translate(dx, dy);
                for segment in segments {
                    *segment = segment.translate(dx, dy);
                }
            }
            AnnotationKind::Box { rect }
            | AnnotationKind::Circle { rect }
            | AnnotationKind::Comment { rect, .. } => *rect = rect.translate(dx, dy),
            AnnotationKind::Line { start, end } => {
                *start = start.offset(dx, dy);
                *end = end.offset(dx, dy);
            }
            AnnotationKind::Draw { strokes } => {
                for point in strokes.iter_mut().flatten() {
                    *point = point.offset(dx, dy);
                }
            }
            AnnotationKind::Polyline { points } | AnnotationKind::Polygon { points, .. } => {
                for point in points {
                    *point = point.offset(dx, dy);
                }
            }
            AnnotationKind::Text { origin, .. } => *origin = origin.offset(dx, dy),
            AnnotationKind::TextBox(text_box) => text_box.rect = text_box.rect.translate(dx, dy),
            AnnotationKind::Callout(callout) => {
                callout.text_box.rect = callout.text_box.rect.translate(dx, dy);
                callout.arrow_tip = callout.arrow_tip.offset(dx, dy);
                callout.knee = callout.knee.offset(dx, dy);
                callout.arm_origin = callout.arm_origin.offset(dx, dy);
            }
            AnnotationKind::Image(image) => image.rect = image.rect.translate(dx, dy),
        }
    }

    /// Raise width and height of bounding-box variants to their floor, keeping the top-left corner
    pub fn clamp_to_min_size(&mut self) {
        let Some((min_w, min_h)) = self.min_size() else {
            return;
        };
        let rect = match self {
            AnnotationKind::Highlight { rect, .. }
            | AnnotationKind::Box { rect }
            | AnnotationKind::Circle { rect }
            | AnnotationKind::Comment { rect, .. } => rect,
            AnnotationKind::TextBox(text_box) => &mut text_box.rect,
            AnnotationKind::Callout(callout) => &mut callout.text_box.rect,
            AnnotationKind::Image(image) => &mut image.rect,
            _ => return,
        };
        rect.width = rect.width.max(min_w);
        rect.height = rect.height.max(min_h);
    }

    /// Check vertex counts and sizes that every variant must satisfy
    pub fn validate(&self) -> AnnotationResult<()> {
        let invalid = |msg: &str| Err(AnnotationError::InvalidGeometry(msg.to_owned()));
        match self {
            AnnotationKind::Draw { strokes } => {
                if strokes.is_empty() || strokes.iter().any(|stroke| stroke.len() < 2) {
                    return invalid("freehand strokes need at least two points each");
                }
            }
            AnnotationKind::Polyline { points } if points.len() < 2 => {
                return invalid("polyline needs at least two points");
            }
            AnnotationKind::Polygon { points, .. } if points.len() < 3 => {
                return invalid("polygon needs at least three points");
            }
            AnnotationKind::Text { font_size, .. } if *font_size <= 0.0 => {
                return invalid("font size must be positive");
            }
            AnnotationKind::Image(image)
                if image.natural_width <= 0.0 || image.natural_height <= 0.0 =>
            {
                return invalid("image natural size must be positive");
            }
            _ => {}
        }

        let finite = |p: &Point| p.x.is_finite() && p.y.is_finite();
        let bounds = self.bounds();
        if !finite(&bounds.top_left()) || !finite(&bounds.bottom_right()) {
            return invalid("coordinates must be finite");
        }
        Ok(())
    }
}

/// Estimated extent of a text run anchored at its first baseline
pub fn text_extent(origin: Point, text: &str, font_size: f32) -> Rect {
    let lines = text.lines().count().max(1);
    let longest = text.lines().map(|line| line.chars().count()).max().unwrap_or(0);
    let width = (longest as f32 * font_size * TEXT_CHAR_WIDTH).max(font_size);
    let height = font_size + (lines - 1) as f32 * font_size * TEXT_LINE_HEIGHT;
    Rect::new(origin.x, origin.y - font_size, width, height)
}

/// A single annotation on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    id: AnnotationId,
    /// 1-based page number
    page: u32,
    kind: AnnotationKind,
    style: AnnotationStyle,
    metadata: AnnotationMetadata,
    #[serde(default)]
    flags: AnnotationFlags,
}

impl Annotation {
    /// Create a new annotation with a fresh id and the variant's default color.
    ///
    /// Bounding-box geometry is raised to the variant floor.
    pub fn new(page: u32, mut kind: AnnotationKind) -> AnnotationResult<Self> {
        kind.validate()?;
        kind.clamp_to_min_size();
        let style = AnnotationStyle::new(kind.annotation_type().default_color());

        Ok(Self {
            id: AnnotationId::new_v4(),
            page: page.max(1),
            kind,
            style,
            metadata: AnnotationMetadata::default(),
            flags: AnnotationFlags::default(),
        })
    }

    /// Check an annotation that did not come through [`Annotation::new`], e.g. deserialized
    pub fn validate(&self) -> AnnotationResult<()> {
        if self.page == 0 {
            return Err(AnnotationError::InvalidGeometry("page numbers start at 1".to_owned()));
        }
        self.kind.validate()
    }

    pub fn with_id(mut self, id: AnnotationId) -> Self {
        self.id = id;
        self
    }

    pub fn with_style(mut self, style: AnnotationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_metadata(mut self, metadata: AnnotationMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_flags(mut self, flags: AnnotationFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn annotation_type(&self) -> AnnotationType {
        self.kind.annotation_type()
    }

    pub fn kind(&self) -> &AnnotationKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut AnnotationKind {
        &mut self.kind
    }

    /// Replace the geometry wholesale, enforcing the variant floor
    pub fn set_kind(&mut self, mut kind: AnnotationKind) -> AnnotationResult<()> {
        kind.validate()?;
        kind.clamp_to_min_size();
        self.kind = kind;
        Ok(())
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut AnnotationStyle {
        &mut self.style
    }

    pub fn metadata(&self) -> &AnnotationMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut AnnotationMetadata {
        &mut self.metadata
    }

    pub fn flags(&self) -> &AnnotationFlags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut AnnotationFlags {
        &mut self.flags
    }

    pub fn is_locked(&self) -> bool {
        self.flags.locked
    }

    pub fn bounds(&self) -> Rect {
        self.kind.bounds()
    }

    /// Deep copy with a new id and fresh timestamps, placed on `page` and unlocked
    pub fn duplicate_to(&self, page: u32) -> Self {
        let now = Utc::now();
        let mut copy = self.clone();
        copy.id = AnnotationId::new_v4();
        copy.page = page.max(1);
        copy.metadata = copy.metadata.with_timestamps(now, now);
        copy.flags.locked = false;
        copy
    }
}
