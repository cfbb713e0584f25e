//! Native annotation encoding
//!
//! Converts annotations into standard PDF annotation dictionaries, with
//! appearance streams for the vector variants so that viewers which do not
//! synthesize appearances still draw them.

use crate::annotation::{
    Annotation, AnnotationKind, AnnotationStyle, Callout, Color, FontStyle, ImageShape, TextAlign,
    TextBox,
};
use crate::error::CodecError;
use crate::geometry::{bounding_box, rotate_point, Point, Rect};
use crate::images::ImageStore;
use crate::native::{
    color_object, format_pdf_date, has_rect_differences, name, reals, text_string, FLAG_LOCKED,
    FLAG_PRINT, FLAG_READ_ONLY,
};
use crate::transform::PageSpace;
use lopdf::{Dictionary, Object, ObjectId, Stream};
use std::fmt::Write as FmtWrite;

/// Control-point factor for drawing a quarter ellipse with one cubic Bezier
const KAPPA: f32 = 0.552_284_8;

/// Encode `annotation` as a native dictionary.
///
/// Auxiliary objects (appearance streams, image XObjects) are registered through
/// `add_object`; the returned dictionary references them.
pub fn encode<F>(
    annotation: &Annotation,
    page: &PageSpace,
    images: &ImageStore,
    mut add_object: F,
) -> Result<Dictionary, CodecError>
where
    F: FnMut(Object) -> ObjectId,
{
    let style = annotation.style();
    let kind = annotation.kind();
    let mut dict = Dictionary::new();
    dict.set("Type", name("Annot"));

    let half = if is_stroked(kind) { style.line_width() / 2.0 } else { 0.0 };

    // `inner` is the geometric extent, `outer` becomes /Rect
    let (subtype, inner, outer) = match kind {
        AnnotationKind::Highlight { rect, segments } => {
            let quads: Vec<f32> = quad_rects(rect, segments)
                .iter()
                .flat_map(|quad| quad_points(page, quad))
                .collect();
            dict.set("QuadPoints", reals(quads));
            ("Highlight", *rect, *rect)
        }
        AnnotationKind::Box { rect } => ("Square", *rect, rect.expand(half)),
        AnnotationKind::Circle { rect } => ("Circle", *rect, rect.expand(half)),
        AnnotationKind::Line { start, end } => {
            let (a, b) = (page.user_to_native(*start), page.user_to_native(*end));
            dict.set("L", reals([a.x, a.y, b.x, b.y]));
            let bounds = kind.bounds();
            ("Line", bounds, bounds.expand(half))
        }
        AnnotationKind::Draw { strokes } => {
            let ink = strokes.iter().map(|stroke| native_points(page, stroke)).collect();
            dict.set("InkList", Object::Array(ink));
            let bounds = kind.bounds();
            ("Ink", bounds, bounds.expand(half))
        }
        AnnotationKind::Polyline { points } => {
            dict.set("Vertices", native_points(page, points));
            let bounds = kind.bounds();
            ("PolyLine", bounds, bounds.expand(half))
        }
        AnnotationKind::Polygon { points, cloud } => {
            dict.set("Vertices", native_points(page, points));
            if *cloud {
                let mut effect = Dictionary::new();
                effect.set("S", name("C"));
                effect.set("I", Object::Integer(1));
                dict.set("BE", Object::Dictionary(effect));
            }
            let bounds = kind.bounds();
            ("Polygon", bounds, bounds.expand(half))
        }
        AnnotationKind::Comment { rect, .. } => {
            dict.set("Name", name("Comment"));
            dict.set("Open", Object::Boolean(false));
            ("Text", *rect, *rect)
        }
        AnnotationKind::Text { font_size, .. } => {
            dict.set("IT", name("FreeTextTypeWriter"));
            let font = FontStyle { size: *font_size, ..FontStyle::default() };
            dict.set("DA", Object::string_literal(default_appearance(&font, style.stroke_color)));
            let bounds = kind.bounds();
            ("FreeText", bounds, bounds)
        }
        AnnotationKind::TextBox(text_box) => {
            set_text_box_keys(&mut dict, text_box, style.stroke_color);
            ("FreeText", text_box.rect, text_box.rect.expand(half))
        }
        AnnotationKind::Callout(callout) => {
            set_text_box_keys(&mut dict, &callout.text_box, style.stroke_color);
            dict.set("IT", name("FreeTextCallout"));
            dict.set("CL", callout_line(page, callout));
            ("FreeText", callout.text_box.rect, kind.bounds().expand(half))
        }
        AnnotationKind::Image(image) => {
            let outer = rotated_bounds(&image.rect, image.rotation);
            let appearance = image_appearance(image, images, &mut add_object)?;
            dict.set("AP", appearance_dictionary(appearance));
            ("Stamp", outer, outer)
        }
    };

    dict.set("Subtype", name(subtype));
    let outer_native = page.rect_to_native(&outer);
    dict.set("Rect", reals(outer_native));

    let inner_native = page.rect_to_native(&inner);
    let differences = [
        inner_native[0] - outer_native[0],
        outer_native[3] - inner_native[3],
        outer_native[2] - inner_native[2],
        inner_native[1] - outer_native[1],
    ];
    if has_rect_differences(subtype.as_bytes()) && differences.iter().any(|d| *d > f32::EPSILON) {
        dict.set("RD", reals(differences.map(|d| d.max(0.0))));
    }

    set_common_keys(&mut dict, annotation);

    if let Some(content) = vector_appearance(kind, style, page)? {
        let id = add_object(Object::Stream(appearance_form(
            outer_native,
            content,
            style.opacity(),
            matches!(kind, AnnotationKind::Highlight { .. }),
        )));
        dict.set("AP", appearance_dictionary(id));
    }

    Ok(dict)
}

/// Variants whose `/Rect` grows by half the border width
fn is_stroked(kind: &AnnotationKind) -> bool {
    !matches!(
        kind,
        AnnotationKind::Highlight { .. }
            | AnnotationKind::Comment { .. }
            | AnnotationKind::Text { .. }
            | AnnotationKind::Image(_)
    )
}

fn set_common_keys(dict: &mut Dictionary, annotation: &Annotation) {
    let style = annotation.style();
    let metadata = annotation.metadata();

    dict.set("C", color_object(style.stroke_color));
    if let Some(fill) = style.fill_color {
        dict.set("IC", color_object(fill));
    }

    let mut border = Dictionary::new();
    border.set("W", Object::Real(style.line_width()));
    match style.border_style.dash_pattern() {
        Some(dash) => {
            border.set("S", name("D"));
            border.set("D", reals(dash));
        }
        None => border.set("S", name("S")),
    }
    dict.set("BS", Object::Dictionary(border));
    dict.set("CA", Object::Real(style.opacity()));

    dict.set("T", text_string(&metadata.author));
    if !metadata.subject.is_empty() {
        dict.set("Subj", text_string(&metadata.subject));
    }
    if let Some(contents) = annotation.kind().text().or(metadata.contents.as_deref()) {
        dict.set("Contents", text_string(contents));
    }
    dict.set("M", Object::string_literal(format_pdf_date(metadata.modified_at())));
    dict.set("CreationDate", Object::string_literal(format_pdf_date(metadata.created_at())));
    dict.set("NM", Object::string_literal(annotation.id().to_string()));

    let flags = annotation.flags();
    let mut bits = FLAG_PRINT;
    if flags.read_only {
        bits |= FLAG_READ_ONLY;
    }
    if flags.locked {
        bits |= FLAG_LOCKED;
    }
    dict.set("F", Object::Integer(bits));
}

fn quad_rects(rect: &Rect, segments: &[Rect]) -> Vec<Rect> {
    if segments.is_empty() {
        vec![*rect]
    } else {
        segments.to_vec()
    }
}

/// Quad corners in the conventional order: upper-left, upper-right, lower-left, lower-right
fn quad_points(page: &PageSpace, rect: &Rect) -> [f32; 8] {
    let [llx, lly, urx, ury] = page.rect_to_native(rect);
    [llx, ury, urx, ury, llx, lly, urx, lly]
}

fn native_points(page: &PageSpace, points: &[Point]) -> Object {
    reals(points.iter().flat_map(|point| {
        let native = page.user_to_native(*point);
        [native.x, native.y]
    }))
}

fn callout_line(page: &PageSpace, callout: &Callout) -> Object {
    let [arm, knee, tip] = callout.leader().map(|point| page.user_to_native(point));
    reals([tip.x, tip.y, knee.x, knee.y, arm.x, arm.y])
}

/// Resource name of the standard font closest to `family`
pub(crate) fn font_resource(family: &str) -> &'static str {
    let family = family.to_ascii_lowercase();
    if family.contains("times") {
        "TiRo"
    } else if family.contains("courier") {
        "Cour"
    } else {
        "Helv"
    }
}

fn default_appearance(font: &FontStyle, color: Color) -> String {
    let [r, g, b] = color.to_normalized();
    format!("/{} {} Tf {} {} {} rg", font_resource(&font.family), font.size, r, g, b)
}

/// CSS-like default style string carrying what `/DA` cannot
fn default_style(font: &FontStyle, color: Color) -> String {
    let mut parts = vec![format!(
        "font: {}{}{}pt {}",
        if font.italic { "italic " } else { "" },
        if font.bold { "bold " } else { "" },
        font.size,
        font.family
    )];
    let decorations: Vec<&str> = [(font.underline, "underline"), (font.strikethrough, "line-through")]
        .into_iter()
        .filter_map(|(on, value)| on.then_some(value))
        .collect();
    if !decorations.is_empty() {
        parts.push(format!("text-decoration: {}", decorations.join(" ")));
    }
    parts.push(format!("line-height: {}", font.line_spacing));
    parts.push(format!("color: {}", color.to_hex()));
    parts.join("; ")
}

fn set_text_box_keys(dict: &mut Dictionary, text_box: &TextBox, color: Color) {
    let font = &text_box.font;
    dict.set("DA", Object::string_literal(default_appearance(font, color)));
    dict.set("DS", Object::string_literal(default_style(font, color)));
    let quadding = match font.align {
        TextAlign::Left | TextAlign::Justify => 0,
        TextAlign::Center => 1,
        TextAlign::Right => 2,
    };
    dict.set("Q", Object::Integer(quadding));
}

/// Axis-aligned bounds of `rect` rotated about its centre
fn rotated_bounds(rect: &Rect, rotation: f32) -> Rect {
    if rotation == 0.0 {
        return *rect;
    }
    let center = rect.center();
    let corners = [
        rect.top_left(),
        Point::new(rect.right(), rect.y),
        rect.bottom_right(),
        Point::new(rect.x, rect.bottom()),
    ]
    .map(|corner| rotate_point(&corner, &center, rotation));
    bounding_box(corners.iter()).unwrap_or(*rect)
}

fn appearance_dictionary(normal: ObjectId) -> Object {
    let mut appearance = Dictionary::new();
    appearance.set("N", Object::Reference(normal));
    Object::Dictionary(appearance)
}

fn appearance_form(bbox: [f32; 4], content: String, opacity: f32, multiply: bool) -> Stream {
    let mut resources = Dictionary::new();
    if opacity < 1.0 || multiply {
        let mut state = Dictionary::new();
        state.set("Type", name("ExtGState"));
        state.set("CA", Object::Real(opacity));
        state.set("ca", Object::Real(opacity));
        if multiply {
            state.set("BM", name("Multiply"));
        }
        let mut states = Dictionary::new();
        states.set("GS0", Object::Dictionary(state));
        resources.set("ExtGState", Object::Dictionary(states));
    }

    let mut form = Dictionary::new();
    form.set("Type", name("XObject"));
    form.set("Subtype", name("Form"));
    form.set("BBox", reals(bbox));
    form.set("Resources", Object::Dictionary(resources));
    Stream::new(form, content.into_bytes())
}

/// Content stream drawing a vector variant in page space, or `None` for variants
/// whose appearance is left to the viewer
fn vector_appearance(
    kind: &AnnotationKind,
    style: &AnnotationStyle,
    page: &PageSpace,
) -> Result<Option<String>, CodecError> {
    let mut stream = String::new();
    let [r, g, b] = style.stroke_color.to_normalized();

    if style.opacity() < 1.0 || matches!(kind, AnnotationKind::Highlight { .. }) {
        writeln!(&mut stream, "/GS0 gs")?;
    }

    if let AnnotationKind::Highlight { rect, segments } = kind {
        writeln!(&mut stream, "{} {} {} rg", r, g, b)?;
        for quad in quad_rects(rect, segments) {
            let [llx, lly, urx, ury] = page.rect_to_native(&quad);
            writeln!(&mut stream, "{} {} {} {} re f", llx, lly, urx - llx, ury - lly)?;
        }
        return Ok(Some(stream));
    }

    writeln!(&mut stream, "{} {} {} RG", r, g, b)?;
    writeln!(&mut stream, "{} w", style.line_width())?;
    if let Some([on, off]) = style.border_style.dash_pattern() {
        writeln!(&mut stream, "[{} {}] 0 d", on, off)?;
    }
    let paint = match style.fill_color {
        Some(fill) => {
            let [fr, fg, fb] = fill.to_normalized();
            writeln!(&mut stream, "{} {} {} rg", fr, fg, fb)?;
            "B"
        }
        None => "S",
    };

    match kind {
        AnnotationKind::Box { rect } => {
            let [llx, lly, urx, ury] = page.rect_to_native(rect);
            writeln!(&mut stream, "{} {} {} {} re {}", llx, lly, urx - llx, ury - lly, paint)?;
        }
        AnnotationKind::Circle { rect } => {
            let [llx, lly, urx, ury] = page.rect_to_native(rect);
            write_ellipse(&mut stream, llx, lly, urx, ury)?;
            writeln!(&mut stream, "{}", paint)?;
        }
        AnnotationKind::Line { start, end } => {
            write_path(&mut stream, page, &[*start, *end])?;
            writeln!(&mut stream, "S")?;
        }
        AnnotationKind::Draw { strokes } => {
            writeln!(&mut stream, "1 J 1 j")?;
            for stroke in strokes {
                write_path(&mut stream, page, stroke)?;
                writeln!(&mut stream, "S")?;
            }
        }
        AnnotationKind::Polyline { points } => {
            write_path(&mut stream, page, points)?;
            writeln!(&mut stream, "S")?;
        }
        AnnotationKind::Polygon { points, .. } => {
            write_path(&mut stream, page, points)?;
            writeln!(&mut stream, "h {}", paint)?;
        }
        _ => return Ok(None),
    }

    Ok(Some(stream))
}

fn write_path(stream: &mut String, page: &PageSpace, points: &[Point]) -> Result<(), CodecError> {
    for (index, point) in points.iter().enumerate() {
        let native = page.user_to_native(*point);
        let op = if index == 0 { "m" } else { "l" };
        writeln!(stream, "{} {} {}", native.x, native.y, op)?;
    }
    Ok(())
}

fn write_ellipse(stream: &mut String, llx: f32, lly: f32, urx: f32, ury: f32) -> Result<(), CodecError> {
    let (cx, cy) = ((llx + urx) / 2.0, (lly + ury) / 2.0);
    let (rx, ry) = ((urx - llx) / 2.0, (ury - lly) / 2.0);
    let (kx, ky) = (rx * KAPPA, ry * KAPPA);

    writeln!(stream, "{} {} m", cx + rx, cy)?;
    writeln!(stream, "{} {} {} {} {} {} c", cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry)?;
    writeln!(stream, "{} {} {} {} {} {} c", cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy)?;
    writeln!(stream, "{} {} {} {} {} {} c", cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry)?;
    writeln!(stream, "{} {} {} {} {} {} c", cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy)?;
    Ok(())
}

/// Register the image pixels and a form drawing them; returns the form id
fn image_appearance<F>(image: &ImageShape, images: &ImageStore, add_object: &mut F) -> Result<ObjectId, CodecError>
where
    F: FnMut(Object) -> ObjectId,
{
    let pixels = images.get(&image.image).ok_or(CodecError::MissingImage(image.image))?;
    let (width, height) = pixels.dimensions();
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidImage(format!("image {} has no pixels", image.image)));
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    let mut alpha = Vec::with_capacity(width as usize * height as usize);
    for pixel in pixels.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let image_dict = |color_space: &str| {
        let mut dict = Dictionary::new();
        dict.set("Type", name("XObject"));
        dict.set("Subtype", name("Image"));
        dict.set("Width", Object::Integer(i64::from(width)));
        dict.set("Height", Object::Integer(i64::from(height)));
        dict.set("ColorSpace", name(color_space));
        dict.set("BitsPerComponent", Object::Integer(8));
        dict
    };

    let mut color = image_dict("DeviceRGB");
    if alpha.iter().any(|a| *a != u8::MAX) {
        let mask = add_object(Object::Stream(Stream::new(image_dict("DeviceGray"), alpha)));
        color.set("SMask", Object::Reference(mask));
    }
    let image_id = add_object(Object::Stream(Stream::new(color, rgb)));

    let (w, h) = (image.rect.width, image.rect.height);
    let mut content = String::new();
    let (sx, tx) = if image.flip_horizontal { (-w, w) } else { (w, 0.0) };
    let (sy, ty) = if image.flip_vertical { (-h, h) } else { (h, 0.0) };
    writeln!(&mut content, "q {} 0 0 {} {} {} cm /Im0 Do Q", sx, sy, tx, ty)?;

    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    // Screen-clockwise rotation is negative in the Y-up form space
    let (sin, cos) = image.rotation.to_radians().sin_cos();
    let mut form = Dictionary::new();
    form.set("Type", name("XObject"));
    form.set("Subtype", name("Form"));
    form.set("BBox", reals([0.0, 0.0, w, h]));
    form.set("Matrix", reals([cos, -sin, sin, cos, 0.0, 0.0]));
    form.set("Resources", Object::Dictionary(resources));

    Ok(add_object(Object::Stream(Stream::new(form, content.into_bytes()))))
}
