//! Helpers for reading and writing native annotation dictionaries

use crate::annotation::Color;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lopdf::{Dictionary, Document, Object, StringFormat};

/// Annotation `/F` bits
pub const FLAG_PRINT: i64 = 4;
pub const FLAG_READ_ONLY: i64 = 64;
pub const FLAG_LOCKED: i64 = 128;

/// Subtypes that define `/RD` (rectangle differences)
pub(crate) fn has_rect_differences(subtype: &[u8]) -> bool {
    matches!(subtype, b"Square" | b"Circle" | b"FreeText" | b"Caret")
}

pub(crate) fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

pub(crate) fn reals<I>(values: I) -> Object
where
    I: IntoIterator<Item = f32>,
{
    Object::Array(values.into_iter().map(Object::Real).collect())
}

/// Text string, UTF-16BE with a byte order mark when it is not plain ASCII
pub(crate) fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

pub(crate) fn decode_text(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> =
            utf16.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
        return Some(String::from_utf16_lossy(&units));
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return Some(String::from_utf8_lossy(utf8).into_owned());
    }
    // PDFDocEncoding agrees with Latin-1 for printable text
    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Follow a reference if `object` is one
pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        other => other,
    }
}

pub(crate) fn get<'a>(document: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|object| resolve(document, object))
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

/// Every element of a numeric array, or `None` if any element is not a number
pub(crate) fn numbers(document: &Document, object: &Object) -> Option<Vec<f32>> {
    let array = resolve(document, object).as_array().ok()?;
    array.iter().map(|item| number(resolve(document, item))).collect()
}

pub(crate) fn get_number(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    get(document, dict, key).and_then(number)
}

pub(crate) fn get_numbers(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<Vec<f32>> {
    get(document, dict, key).and_then(|object| numbers(document, object))
}

pub(crate) fn get_name<'a>(document: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    get(document, dict, key).and_then(|object| object.as_name().ok())
}

pub(crate) fn get_text(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    get(document, dict, key).and_then(decode_text)
}

pub(crate) fn color_object(color: Color) -> Object {
    reals(color.to_normalized())
}

/// Interpret a gray, RGB, or CMYK component array. Arrays with any value above 1 are 0-255.
pub(crate) fn color_from_components(values: &[f32]) -> Option<Color> {
    if values.is_empty() {
        return None;
    }
    let scale = if values.iter().any(|v| *v > 1.0) { 255.0 } else { 1.0 };
    let c: Vec<f32> = values.iter().map(|v| (v / scale).clamp(0.0, 1.0)).collect();

    match c.as_slice() {
        [gray] => Some(Color::from_normalized(*gray, *gray, *gray)),
        [r, g, b] => Some(Color::from_normalized(*r, *g, *b)),
        [cyan, magenta, yellow, black] => Some(Color::from_normalized(
            (1.0 - cyan) * (1.0 - black),
            (1.0 - magenta) * (1.0 - black),
            (1.0 - yellow) * (1.0 - black),
        )),
        _ => None,
    }
}

pub(crate) fn get_color(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<Color> {
    get_numbers(document, dict, key).and_then(|values| color_from_components(&values))
}

pub fn format_pdf_date(date: DateTime<Utc>) -> String {
    date.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

/// Parse `D:YYYYMMDDHHmmSSOHH'mm'`; every field after the year is optional
pub fn parse_pdf_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let value = value.strip_prefix("D:").unwrap_or(value);
    let digits_end = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let (digits, zone) = value.split_at(digits_end);
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(4, 2, 1)?, field(6, 2, 1)?)?.and_hms_opt(
        field(8, 2, 0)?,
        field(10, 2, 0)?,
        field(12, 2, 0)?,
    )?;

    let offset_seconds = match zone.chars().next() {
        Some(sign @ ('+' | '-')) => {
            let parts: Vec<&str> = zone[1..].split('\'').filter(|part| !part.is_empty()).collect();
            let hours: i32 = parts.first().and_then(|h| h.parse().ok()).unwrap_or(0);
            let minutes: i32 = parts.get(1).and_then(|m| m.parse().ok()).unwrap_or(0);
            let seconds = hours * 3600 + minutes * 60;
            if sign == '-' {
                -seconds
            } else {
                seconds
            }
        }
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_seconds)?;
    offset.from_local_datetime(&naive).single().map(|date| date.with_timezone(&Utc))
}

pub(crate) fn get_date(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<DateTime<Utc>> {
    get_text(document, dict, key).and_then(|text| parse_pdf_date(&text))
}
