//! Annotation import from native PDF dictionaries
//!
//! Reads existing page annotations and converts them to the application's
//! annotation model. Unsupported subtypes and malformed objects are skipped
//! individually; they never abort the import of a page.

use crate::annotation::{
    Annotation, AnnotationFlags, AnnotationId, AnnotationKind, AnnotationMetadata,
    AnnotationStyle, AnnotationType, BorderStyle, Callout, Color, FontStyle, ImageShape,
    TextAlign, TextBox,
};
use crate::geometry::{normalize_degrees, Point, Rect};
use crate::images::{ImageKey, ImageStore};
use crate::native::{
    color_from_components, get, get_color, get_date, get_name, get_number, get_numbers, get_text,
    has_rect_differences, numbers, resolve, FLAG_LOCKED, FLAG_PRINT, FLAG_READ_ONLY,
};
use crate::transform::PageSpace;
use chrono::Utc;
use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::{Dictionary, Document, ObjectId, Stream};
use pdf_engine::NativeAnnotation;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Statistics about imported annotations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Total annotations found in the document
    pub total_found: usize,
    /// Annotations successfully imported
    pub imported: usize,
    /// Skipped because the subtype has no counterpart (links, widgets, popups, ...)
    pub skipped_unsupported: usize,
    /// Skipped because required geometry was missing or invalid
    pub skipped_malformed: usize,
    /// Count of found annotations by native subtype
    pub by_type: BTreeMap<String, usize>,
}

impl ImportStats {
    pub fn merge(&mut self, other: &ImportStats) {
        self.total_found += other.total_found;
        self.imported += other.imported;
        self.skipped_unsupported += other.skipped_unsupported;
        self.skipped_malformed += other.skipped_malformed;
        for (subtype, count) in &other.by_type {
            *self.by_type.entry(subtype.clone()).or_insert(0) += count;
        }
    }
}

/// Why a native annotation was not imported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeSkip {
    Unsupported,
    Malformed(&'static str),
}

type DecodeResult<T> = Result<T, DecodeSkip>;

fn malformed<T>(reason: &'static str) -> DecodeResult<T> {
    Err(DecodeSkip::Malformed(reason))
}

/// Decode one native annotation dictionary into an annotation on `page_number` (1-based)
pub fn decode(
    document: &Document,
    dict: &Dictionary,
    page_number: u32,
    page: &PageSpace,
    images: &mut ImageStore,
) -> DecodeResult<Annotation> {
    let subtype = get_name(document, dict, b"Subtype").ok_or(DecodeSkip::Malformed("missing /Subtype"))?;
    if !matches!(
        subtype,
        b"Highlight"
            | b"Square"
            | b"Circle"
            | b"Line"
            | b"Ink"
            | b"PolyLine"
            | b"Polygon"
            | b"Text"
            | b"FreeText"
            | b"Stamp"
    ) {
        return Err(DecodeSkip::Unsupported);
    }

    let outer = match get_numbers(document, dict, b"Rect").as_deref() {
        Some([a, b, c, d, ..]) => page.rect_from_native([*a, *b, *c, *d]),
        _ => return malformed("missing or short /Rect"),
    };
    let inner = if has_rect_differences(subtype) {
        inset_by_differences(document, dict, &outer)
    } else {
        outer
    };

    let appearance = get_text(document, dict, b"DA").map(|da| DefaultAppearance::parse(&da)).unwrap_or_default();
    let contents = get_text(document, dict, b"Contents");

    let kind = match subtype {
        b"Highlight" => decode_highlight(document, dict, page, &inner)?,
        b"Square" => AnnotationKind::Box { rect: inner },
        b"Circle" => AnnotationKind::Circle { rect: inner },
        b"Line" => match get_numbers(document, dict, b"L").as_deref() {
            Some([x1, y1, x2, y2, ..]) => AnnotationKind::Line {
                start: page.native_to_user(Point::new(*x1, *y1)),
                end: page.native_to_user(Point::new(*x2, *y2)),
            },
            _ => return malformed("missing or short /L"),
        },
        b"Ink" => decode_ink(document, dict, page)?,
        b"PolyLine" => {
            let points = vertices(document, dict, page);
            if points.len() < 2 {
                return malformed("polyline needs two vertices");
            }
            AnnotationKind::Polyline { points }
        }
        b"Polygon" => {
            let points = vertices(document, dict, page);
            if points.len() < 3 {
                return malformed("polygon needs three vertices");
            }
            let cloud = get(document, dict, b"BE")
                .and_then(|effect| effect.as_dict().ok())
                .and_then(|effect| get_name(document, effect, b"S"))
                == Some(b"C".as_slice());
            AnnotationKind::Polygon { points, cloud }
        }
        b"Text" => AnnotationKind::Comment { rect: inner, text: contents.clone().unwrap_or_default(), rotation: 0.0 },
        b"FreeText" => decode_free_text(document, dict, page, &inner, &appearance, contents.clone())?,
        b"Stamp" => decode_stamp(document, dict, &outer, images)?,
        _ => return Err(DecodeSkip::Unsupported),
    };

    let annotation_type = kind.annotation_type();
    let style = decode_style(document, dict, annotation_type, &appearance);
    let metadata = decode_metadata(document, dict, &kind, contents);
    let flags = decode_flags(document, dict);
    let id = get_text(document, dict, b"NM")
        .and_then(|nm| AnnotationId::parse_str(nm.trim()).ok())
        .unwrap_or_else(AnnotationId::new_v4);

    let annotation = Annotation::new(page_number, kind)
        .map_err(|_| DecodeSkip::Malformed("invalid geometry"))?
        .with_id(id)
        .with_style(style)
        .with_metadata(metadata)
        .with_flags(flags);
    Ok(annotation)
}

/// Decode every annotation of one page, updating `stats`.
///
/// Returns the imported annotations with the object ids they came from.
pub fn import_page(
    document: &Document,
    natives: &[NativeAnnotation],
    page_number: u32,
    page: &PageSpace,
    images: &mut ImageStore,
    stats: &mut ImportStats,
) -> Vec<(Option<ObjectId>, Annotation)> {
    let mut imported = Vec::new();

    for native in natives {
        stats.total_found += 1;
        let subtype = get_name(document, &native.dictionary, b"Subtype")
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .unwrap_or_else(|| "Unknown".to_string());
        *stats.by_type.entry(subtype.clone()).or_insert(0) += 1;

        match decode(document, &native.dictionary, page_number, page, images) {
            Ok(annotation) => {
                stats.imported += 1;
                imported.push((native.object_id, annotation));
            }
            Err(DecodeSkip::Unsupported) => {
                stats.skipped_unsupported += 1;
                debug!(page = page_number, %subtype, "skipping unsupported annotation");
            }
            Err(DecodeSkip::Malformed(reason)) => {
                stats.skipped_malformed += 1;
                warn!(page = page_number, %subtype, reason, object = ?native.object_id, "skipping malformed annotation");
            }
        }
    }

    imported
}

/// Apply `/RD` insets to the outer rectangle; falls back to `outer` if they do not fit
fn inset_by_differences(document: &Document, dict: &Dictionary, outer: &Rect) -> Rect {
    let Some([left, top, right, bottom]) = get_numbers(document, dict, b"RD")
        .and_then(|values| <[f32; 4]>::try_from(values).ok())
    else {
        return *outer;
    };
    let inner = Rect::new(
        outer.x + left,
        outer.y + top,
        outer.width - left - right,
        outer.height - top - bottom,
    );
    if inner.width >= 0.0 && inner.height >= 0.0 {
        inner
    } else {
        *outer
    }
}

fn decode_highlight(
    document: &Document,
    dict: &Dictionary,
    page: &PageSpace,
    inner: &Rect,
) -> DecodeResult<AnnotationKind> {
    let Some(quads) = get_numbers(document, dict, b"QuadPoints") else {
        return Ok(AnnotationKind::Highlight { rect: *inner, segments: Vec::new() });
    };
    if quads.is_empty() || quads.len() % 8 != 0 {
        return malformed("/QuadPoints length is not a multiple of 8");
    }

    let mut segments: Vec<Rect> = quads
        .chunks_exact(8)
        .map(|quad| {
            let xs = [quad[0], quad[2], quad[4], quad[6]];
            let ys = [quad[1], quad[3], quad[5], quad[7]];
            let min = |values: [f32; 4]| values.into_iter().fold(f32::INFINITY, f32::min);
            let max = |values: [f32; 4]| values.into_iter().fold(f32::NEG_INFINITY, f32::max);
            page.rect_from_native([min(xs), min(ys), max(xs), max(ys)])
        })
        .collect();

    let rect = segments.iter().skip(1).fold(segments[0], |acc, segment| acc.union(segment));
    if segments.len() == 1 {
        segments.clear();
    }
    Ok(AnnotationKind::Highlight { rect, segments })
}

fn point_pairs(values: &[f32], page: &PageSpace) -> Vec<Point> {
    values
        .chunks_exact(2)
        .map(|pair| page.native_to_user(Point::new(pair[0], pair[1])))
        .collect()
}

fn vertices(document: &Document, dict: &Dictionary, page: &PageSpace) -> Vec<Point> {
    get_numbers(document, dict, b"Vertices")
        .map(|values| point_pairs(&values, page))
        .unwrap_or_default()
}

fn decode_ink(document: &Document, dict: &Dictionary, page: &PageSpace) -> DecodeResult<AnnotationKind> {
    let Some(list) = get(document, dict, b"InkList").and_then(|list| list.as_array().ok()) else {
        return malformed("missing /InkList");
    };

    let strokes: Vec<Vec<Point>> = list
        .iter()
        .filter_map(|stroke| numbers(document, stroke))
        .map(|values| point_pairs(&values, page))
        .filter(|stroke| stroke.len() >= 2)
        .collect();

    if strokes.is_empty() {
        return malformed("no ink stroke with two points");
    }
    Ok(AnnotationKind::Draw { strokes })
}

/// Font name, size, and color from a `/DA` string
#[derive(Debug, Clone, Default, PartialEq)]
struct DefaultAppearance {
    font: Option<String>,
    size: Option<f32>,
    color: Option<Color>,
}

impl DefaultAppearance {
    fn parse(da: &str) -> Self {
        let tokens: Vec<&str> = da.split_whitespace().collect();
        let operands = |end: usize, count: usize| -> Option<Vec<f32>> {
            let start = end.checked_sub(count)?;
            tokens[start..end].iter().map(|token| token.parse().ok()).collect()
        };

        let mut appearance = Self::default();
        for (index, token) in tokens.iter().enumerate() {
            match *token {
                "Tf" if index >= 2 => {
                    appearance.font = tokens[index - 2].strip_prefix('/').map(str::to_owned);
                    appearance.size = tokens[index - 1].parse().ok();
                }
                "rg" => appearance.color = operands(index, 3).and_then(|c| color_from_components(&c)),
                "g" => appearance.color = operands(index, 1).and_then(|c| color_from_components(&c)),
                "k" => appearance.color = operands(index, 4).and_then(|c| color_from_components(&c)),
                _ => {}
            }
        }
        appearance
    }

    fn family(&self) -> &'static str {
        match self.font.as_deref() {
            Some("TiRo") => "Times-Roman",
            Some("Cour") => "Courier",
            _ => "Helvetica",
        }
    }
}

/// Font style from `/DA`, `/DS`, and `/Q`
fn decode_font(document: &Document, dict: &Dictionary, appearance: &DefaultAppearance) -> FontStyle {
    let mut font = FontStyle { family: appearance.family().to_owned(), ..FontStyle::default() };
    if let Some(size) = appearance.size.filter(|size| *size > 0.0) {
        font.size = size;
    }

    if let Some(style) = get_text(document, dict, b"DS") {
        for declaration in style.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match property.trim() {
                "font" => {
                    font.bold = value.contains("bold");
                    font.italic = value.contains("italic");
                }
                "font-weight" => font.bold = value == "bold" || value.parse::<u32>().is_ok_and(|w| w >= 600),
                "font-style" => font.italic = value == "italic",
                "text-decoration" => {
                    font.underline = value.contains("underline");
                    font.strikethrough = value.contains("line-through");
                }
                "line-height" => {
                    if let Ok(spacing) = value.parse::<f32>() {
                        font.line_spacing = spacing;
                    }
                }
                _ => {}
            }
        }
    }

    font.align = match get_number(document, dict, b"Q").map(|q| q as i64) {
        Some(1) => TextAlign::Center,
        Some(2) => TextAlign::Right,
        _ => TextAlign::Left,
    };
    font
}

fn decode_free_text(
    document: &Document,
    dict: &Dictionary,
    page: &PageSpace,
    inner: &Rect,
    appearance: &DefaultAppearance,
    contents: Option<String>,
) -> DecodeResult<AnnotationKind> {
    let text = contents.unwrap_or_default();
    let intent = get_name(document, dict, b"IT");

    if intent == Some(b"FreeTextTypeWriter".as_slice()) {
        let font_size = appearance.size.filter(|size| *size > 0.0).unwrap_or(FontStyle::default().size);
        return Ok(AnnotationKind::Text { origin: Point::new(inner.x, inner.y + font_size), text, font_size });
    }

    let font = decode_font(document, dict, appearance);
    let text_box = TextBox { rect: *inner, text, font };

    let leader = get_numbers(document, dict, b"CL");
    if intent != Some(b"FreeTextCallout".as_slice()) && leader.is_none() {
        return Ok(AnnotationKind::TextBox(text_box));
    }

    let points = leader.map(|values| point_pairs(&values, page)).unwrap_or_default();
    let callout = match points.as_slice() {
        [tip, knee, arm] => Callout { text_box, arrow_tip: *tip, knee: *knee, arm_origin: *arm },
        [tip, arm] => Callout { text_box, arrow_tip: *tip, knee: *arm, arm_origin: *arm },
        _ => return malformed("callout /CL needs 4 or 6 numbers"),
    };
    Ok(AnnotationKind::Callout(callout))
}

fn decode_stamp(
    document: &Document,
    dict: &Dictionary,
    outer: &Rect,
    images: &mut ImageStore,
) -> DecodeResult<AnnotationKind> {
    // Stamps without a raster appearance (vector "Approved" stamps and the like) have no counterpart
    let form = get(document, dict, b"AP")
        .and_then(|ap| ap.as_dict().ok())
        .and_then(|ap| get(document, ap, b"N"))
        .and_then(|normal| normal.as_stream().ok())
        .ok_or(DecodeSkip::Unsupported)?;

    let (width, height) = match get_numbers(document, &form.dict, b"BBox").as_deref() {
        Some([x1, y1, x2, y2]) => ((x2 - x1).abs(), (y2 - y1).abs()),
        _ => return malformed("stamp appearance without /BBox"),
    };
    let rotation = match get_numbers(document, &form.dict, b"Matrix").as_deref() {
        Some([a, b, ..]) => normalize_degrees((-b).atan2(*a).to_degrees()),
        _ => 0.0,
    };

    let pixels = get(document, &form.dict, b"Resources")
        .and_then(|resources| resources.as_dict().ok())
        .and_then(|resources| get(document, resources, b"XObject"))
        .and_then(|xobjects| xobjects.as_dict().ok())
        .and_then(|xobjects| {
            xobjects
                .iter()
                .filter_map(|(_, object)| resolve(document, object).as_stream().ok())
                .find(|stream| get_name(document, &stream.dict, b"Subtype") == Some(b"Image".as_slice()))
        })
        .and_then(|stream| decode_image_stream(document, stream))
        .ok_or(DecodeSkip::Unsupported)?;

    let (natural_width, natural_height) = (pixels.width() as f32, pixels.height() as f32);
    let key: ImageKey = images.insert(pixels);
    let center = outer.center();

    Ok(AnnotationKind::Image(ImageShape {
        rect: Rect::new(center.x - width / 2.0, center.y - height / 2.0, width, height),
        rotation,
        flip_horizontal: false,
        flip_vertical: false,
        image: key,
        natural_width,
        natural_height,
    }))
}

/// Raw samples of an image stream, undoing any standard filter
fn stream_samples(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

/// Decode an 8-bit gray or RGB image XObject (or a JPEG one), applying its soft mask
fn decode_image_stream(document: &Document, stream: &Stream) -> Option<RgbaImage> {
    if get_name(document, &stream.dict, b"Filter") == Some(b"DCTDecode".as_slice()) {
        return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .ok()
            .map(|decoded| decoded.to_rgba8());
    }

    let width = get_number(document, &stream.dict, b"Width")? as u32;
    let height = get_number(document, &stream.dict, b"Height")? as u32;
    if width == 0 || height == 0 || get_number(document, &stream.dict, b"BitsPerComponent")? as u32 != 8 {
        return None;
    }
    let channels = match get_name(document, &stream.dict, b"ColorSpace")? {
        b"DeviceRGB" => 3,
        b"DeviceGray" => 1,
        _ => return None,
    };

    let samples = stream_samples(stream)?;
    let pixel_count = width as usize * height as usize;
    if samples.len() < pixel_count * channels {
        return None;
    }

    let alpha = get(document, &stream.dict, b"SMask")
        .and_then(|mask| mask.as_stream().ok())
        .and_then(stream_samples)
        .filter(|mask| mask.len() >= pixel_count);

    Some(RgbaImage::from_fn(width, height, |x, y| {
        let index = y as usize * width as usize + x as usize;
        let a = alpha.as_ref().map_or(u8::MAX, |mask| mask[index]);
        match channels {
            3 => {
                let base = index * 3;
                Rgba([samples[base], samples[base + 1], samples[base + 2], a])
            }
            _ => Rgba([samples[index], samples[index], samples[index], a]),
        }
    }))
}

fn decode_style(
    document: &Document,
    dict: &Dictionary,
    annotation_type: AnnotationType,
    appearance: &DefaultAppearance,
) -> AnnotationStyle {
    let stroke = get_color(document, dict, b"C")
        .or(appearance.color)
        .unwrap_or_else(|| annotation_type.default_color());

    let border = get(document, dict, b"BS").and_then(|bs| bs.as_dict().ok());
    let width = border
        .and_then(|bs| get_number(document, bs, b"W"))
        .or_else(|| get_numbers(document, dict, b"Border").and_then(|values| values.get(2).copied()))
        .unwrap_or(1.0);

    let border_style = match border.and_then(|bs| get_name(document, bs, b"S")) {
        Some(b"D") => {
            let dash = border.and_then(|bs| get_numbers(document, bs, b"D")).unwrap_or_default();
            match dash.first() {
                Some(on) if *on <= 1.0 => BorderStyle::Dotted,
                _ => BorderStyle::Dashed,
            }
        }
        _ => BorderStyle::Solid,
    };

    AnnotationStyle::new(stroke)
        .with_fill(get_color(document, dict, b"IC"))
        .with_line_width(width)
        .with_opacity(get_number(document, dict, b"CA").unwrap_or(1.0))
        .with_border_style(border_style)
}

fn decode_metadata(
    document: &Document,
    dict: &Dictionary,
    kind: &AnnotationKind,
    contents: Option<String>,
) -> AnnotationMetadata {
    let mut metadata = AnnotationMetadata::new(
        get_text(document, dict, b"T").filter(|author| !author.is_empty()).unwrap_or_else(|| "Unknown".to_owned()),
    );
    metadata.subject = get_text(document, dict, b"Subj").unwrap_or_default();
    // Text-bearing variants keep /Contents as their text
    if kind.text().is_none() {
        metadata.contents = contents;
    }

    let modified = get_date(document, dict, b"M");
    let created = get_date(document, dict, b"CreationDate").or(modified).unwrap_or_else(Utc::now);
    metadata.with_timestamps(created, modified.unwrap_or(created))
}

fn decode_flags(document: &Document, dict: &Dictionary) -> AnnotationFlags {
    let Some(bits) = get_number(document, dict, b"F").map(|bits| bits as i64) else {
        return AnnotationFlags::default();
    };
    AnnotationFlags {
        locked: bits & FLAG_LOCKED != 0,
        printable: bits & FLAG_PRINT != 0,
        read_only: bits & FLAG_READ_ONLY != 0,
        marked: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationMetadata, DEFAULT_COMMENT_SIZE};
    use crate::annotation_export::encode;
    use crate::native::reals;
    use lopdf::{dictionary, Object};

    const EPS: f32 = 1e-3;

    fn assert_rect_close(actual: Rect, expected: Rect) {
        let close = |a: f32, b: f32| (a - b).abs() < EPS;
        assert!(
            close(actual.x, expected.x)
                && close(actual.y, expected.y)
                && close(actual.width, expected.width)
                && close(actual.height, expected.height),
            "{:?} vs {:?}",
            actual,
            expected
        );
    }

    fn decode_letter(dict: &Dictionary) -> DecodeResult<Annotation> {
        let document = Document::with_version("1.5");
        decode(&document, dict, 1, &PageSpace::default(), &mut ImageStore::new())
    }

    /// Encode then decode through a scratch document
    fn round_trip(annotation: &Annotation, images: &mut ImageStore) -> Annotation {
        let mut document = Document::with_version("1.5");
        let page = PageSpace::default();
        let dict = encode(annotation, &page, images, |object| document.add_object(object)).expect("encodes");
        decode(&document, &dict, annotation.page(), &page, images).expect("decodes")
    }

    fn styled(kind: AnnotationKind) -> Annotation {
        let mut metadata = AnnotationMetadata::new("Reviewer");
        metadata.subject = "Check".to_owned();
        Annotation::new(1, kind)
            .expect("valid")
            .with_style(
                AnnotationStyle::new(Color::new(10, 120, 200))
                    .with_fill(Some(Color::new(250, 240, 10)))
                    .with_line_width(3.0)
                    .with_opacity(0.6)
                    .with_border_style(BorderStyle::Dashed),
            )
            .with_metadata(metadata)
    }

    #[test]
    fn test_highlight_quad_maps_to_user_space() {
        let dict = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
            "Rect" => reals([72.0, 700.0, 272.0, 720.0]),
            "QuadPoints" => reals([72.0, 720.0, 272.0, 720.0, 72.0, 700.0, 272.0, 700.0]),
        };

        let annotation = decode_letter(&dict).expect("decodes");
        let AnnotationKind::Highlight { rect, segments } = annotation.kind() else {
            panic!("highlight expected");
        };
        assert_rect_close(*rect, Rect::new(72.0, 72.0, 200.0, 20.0));
        assert!(segments.is_empty());
        assert_eq!(annotation.style().stroke_color, Color::YELLOW);
        assert_eq!(annotation.metadata().author, "Unknown");
        assert_eq!(annotation.style().line_width(), 1.0);
    }

    #[test]
    fn test_skips_unsupported_and_malformed() {
        let link = dictionary! { "Subtype" => "Link", "Rect" => reals([0.0, 0.0, 10.0, 10.0]) };
        assert_eq!(decode_letter(&link), Err(DecodeSkip::Unsupported));

        let bad_quads = dictionary! {
            "Subtype" => "Highlight",
            "Rect" => reals([0.0, 0.0, 10.0, 10.0]),
            "QuadPoints" => reals([0.0; 7]),
        };
        assert!(matches!(decode_letter(&bad_quads), Err(DecodeSkip::Malformed(_))));

        let short_ink = dictionary! {
            "Subtype" => "Ink",
            "Rect" => reals([0.0, 0.0, 10.0, 10.0]),
            "InkList" => vec![reals([1.0, 1.0])],
        };
        assert!(matches!(decode_letter(&short_ink), Err(DecodeSkip::Malformed(_))));

        let no_rect = dictionary! { "Subtype" => "Square" };
        assert!(matches!(decode_letter(&no_rect), Err(DecodeSkip::Malformed(_))));

        let line_without_l = dictionary! { "Subtype" => "Line", "Rect" => reals([0.0, 0.0, 10.0, 10.0]) };
        assert!(matches!(decode_letter(&line_without_l), Err(DecodeSkip::Malformed(_))));
    }

    #[test]
    fn test_color_variants_and_flags() {
        let dict = dictionary! {
            "Subtype" => "Square",
            "Rect" => reals([0.0, 0.0, 50.0, 50.0]),
            "C" => reals([0.0, 0.0, 0.0, 1.0]),
            "IC" => reals([255.0, 0.0, 0.0]),
            "F" => 4 | 128,
        };

        let annotation = decode_letter(&dict).expect("decodes");
        assert_eq!(annotation.style().stroke_color, Color::BLACK);
        assert_eq!(annotation.style().fill_color, Some(Color::RED));
        assert!(annotation.is_locked());
        assert!(annotation.flags().printable);
    }

    #[test]
    fn test_shape_round_trips_preserve_representable_fields() {
        let mut images = ImageStore::new();
        let kinds = vec![
            AnnotationKind::Box { rect: Rect::new(10.0, 10.0, 100.0, 50.0) },
            AnnotationKind::Circle { rect: Rect::new(200.0, 300.0, 40.0, 80.0) },
            AnnotationKind::Highlight {
                rect: Rect::new(72.0, 100.0, 300.0, 30.0),
                segments: vec![Rect::new(72.0, 100.0, 300.0, 14.0), Rect::new(72.0, 116.0, 120.0, 14.0)],
            },
            AnnotationKind::Polygon {
                points: vec![Point::new(50.0, 50.0), Point::new(150.0, 60.0), Point::new(90.0, 140.0)],
                cloud: true,
            },
            AnnotationKind::Comment { rect: Rect::new(300.0, 40.0, 24.0, 24.0), text: "Größe?".into(), rotation: 0.0 },
        ];

        for kind in kinds {
            let original = styled(kind);
            let decoded = round_trip(&original, &mut images);

            assert_eq!(decoded.id(), original.id());
            assert_eq!(decoded.annotation_type(), original.annotation_type());
            assert_rect_close(decoded.bounds(), original.bounds());
            assert_eq!(decoded.style().stroke_color, original.style().stroke_color);
            assert_eq!(decoded.style().fill_color, original.style().fill_color);
            assert!((decoded.style().opacity() - 0.6).abs() < EPS);
            assert!((decoded.style().line_width() - 3.0).abs() < EPS);
            assert_eq!(decoded.style().border_style, BorderStyle::Dashed);
            assert_eq!(decoded.metadata().author, "Reviewer");
            assert_eq!(decoded.metadata().subject, "Check");
            assert_eq!(decoded.kind().text(), original.kind().text());
        }
    }

    #[test]
    fn test_geometry_round_trips() {
        let mut images = ImageStore::new();

        let line = styled(AnnotationKind::Line { start: Point::new(10.0, 20.0), end: Point::new(200.0, 120.0) });
        assert_eq!(round_trip(&line, &mut images).kind(), line.kind());

        let ink = styled(AnnotationKind::Draw {
            strokes: vec![
                vec![Point::new(0.0, 0.0), Point::new(10.0, 12.0)],
                vec![Point::new(30.0, 30.0), Point::new(40.0, 42.0), Point::new(50.0, 30.0)],
            ],
        });
        assert_eq!(round_trip(&ink, &mut images).kind(), ink.kind());

        let text = styled(AnnotationKind::Text { origin: Point::new(40.0, 100.0), text: "typed".into(), font_size: 14.0 });
        assert_eq!(round_trip(&text, &mut images).kind(), text.kind());
    }

    #[test]
    fn test_text_box_font_round_trip() {
        let font = FontStyle {
            family: "Courier".into(),
            size: 16.0,
            bold: true,
            italic: true,
            underline: true,
            strikethrough: false,
            align: TextAlign::Center,
            line_spacing: 1.5,
        };
        let original = styled(AnnotationKind::TextBox(TextBox {
            rect: Rect::new(100.0, 100.0, 200.0, 80.0),
            text: "Summary".into(),
            font: font.clone(),
        }));

        let decoded = round_trip(&original, &mut ImageStore::new());
        let AnnotationKind::TextBox(text_box) = decoded.kind() else {
            panic!("text box expected");
        };
        assert_eq!(text_box.font, font);
        assert_rect_close(text_box.rect, Rect::new(100.0, 100.0, 200.0, 80.0));
    }

    #[test]
    fn test_callout_round_trip() {
        let text_box = TextBox {
            rect: Rect::new(100.0, 100.0, 150.0, 60.0),
            text: "look".into(),
            font: FontStyle::default(),
        };
        let original = styled(AnnotationKind::Callout(Callout::new(text_box, Point::new(20.0, 300.0))));

        let decoded = round_trip(&original, &mut ImageStore::new());
        let (AnnotationKind::Callout(got), AnnotationKind::Callout(want)) = (decoded.kind(), original.kind()) else {
            panic!("callout expected");
        };
        assert_rect_close(got.text_box.rect, want.text_box.rect);
        assert_eq!(got.arrow_tip, want.arrow_tip);
        assert_eq!(got.knee, want.knee);
        assert_eq!(got.arm_origin, want.arm_origin);
    }

    #[test]
    fn test_image_round_trip_keeps_pixels_and_rotation() {
        let mut images = ImageStore::new();
        let mut pixels = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        pixels.put_pixel(2, 1, Rgba([200, 100, 50, 40]));
        let key = images.insert(pixels.clone());

        let original = Annotation::new(
            1,
            AnnotationKind::Image(ImageShape {
                rect: Rect::new(50.0, 60.0, 90.0, 60.0),
                rotation: 30.0,
                flip_horizontal: false,
                flip_vertical: false,
                image: key,
                natural_width: 3.0,
                natural_height: 2.0,
            }),
        )
        .expect("valid");

        let decoded = round_trip(&original, &mut images);
        let AnnotationKind::Image(shape) = decoded.kind() else {
            panic!("image expected");
        };
        assert_rect_close(shape.rect, Rect::new(50.0, 60.0, 90.0, 60.0));
        assert!((shape.rotation - 30.0).abs() < 0.01);
        assert_ne!(shape.image, key);
        assert_eq!(images.get(&shape.image).map(|stored| stored.as_ref()), Some(&pixels));
    }

    #[test]
    fn test_import_page_counts() {
        let document = Document::with_version("1.5");
        let natives = vec![
            NativeAnnotation {
                object_id: Some((7, 0)),
                dictionary: dictionary! {
                    "Subtype" => "Text",
                    "Rect" => reals([100.0, 700.0, 124.0, 724.0]),
                    "Contents" => Object::string_literal("hello"),
                },
            },
            NativeAnnotation { object_id: None, dictionary: dictionary! { "Subtype" => "Link" } },
            NativeAnnotation {
                object_id: Some((9, 0)),
                dictionary: dictionary! { "Subtype" => "Polygon", "Rect" => reals([0.0, 0.0, 1.0, 1.0]) },
            },
        ];

        let mut stats = ImportStats::default();
        let imported = import_page(&document, &natives, 2, &PageSpace::default(), &mut ImageStore::new(), &mut stats);

        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].0, Some((7, 0)));
        assert_eq!(imported[0].1.page(), 2);
        assert_eq!(imported[0].1.bounds(), Rect::new(100.0, 68.0, DEFAULT_COMMENT_SIZE, DEFAULT_COMMENT_SIZE));
        assert_eq!(stats.total_found, 3);
        assert_eq!(stats.imported, 1);
        assert_eq!(stats.skipped_unsupported, 1);
        assert_eq!(stats.skipped_malformed, 1);
        assert_eq!(stats.by_type.get("Link"), Some(&1));
    }
}
