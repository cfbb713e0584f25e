use image::{ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Maximum depth followed when resolving inherited page attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Page geometry in default user space, taken from the page's MediaBox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
    /// Lower-left corner of the MediaBox. Zero for most documents.
    pub origin_x: f32,
    pub origin_y: f32,
    /// Page `/Rotate` value in degrees, normalized to 0, 90, 180 or 270.
    pub rotation: i32,
}

impl PageSize {
    pub const LETTER: PageSize =
        PageSize { width_pt: 612.0, height_pt: 792.0, origin_x: 0.0, origin_y: 0.0, rotation: 0 };

    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt, ..Self::LETTER }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
    pub clip: Option<ClipRect>,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0, clip: None }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// An annotation dictionary found in a page's `/Annots` array.
#[derive(Debug, Clone)]
pub struct NativeAnnotation {
    /// Indirect object id, or `None` for dictionaries stored inline in the array.
    pub object_id: Option<ObjectId>,
    pub dictionary: Dictionary,
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Document collaborator used by the annotation layer.
///
/// Page indices are 0-based throughout.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn page_annotations(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<NativeAnnotation>, PdfEngineError>;
    /// Register `object` in the document and return its id.
    fn add_object(
        &mut self,
        handle: DocumentHandle,
        object: Object,
    ) -> Result<ObjectId, PdfEngineError>;
    /// Register `annotation` and append a reference to the page's `/Annots`,
    /// creating the array when the page has none.
    fn append_annotation(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        annotation: Dictionary,
    ) -> Result<ObjectId, PdfEngineError>;
    /// Drop references to `ids` from the page's `/Annots`. Returns how many were removed.
    fn remove_annotations(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        ids: &[ObjectId],
    ) -> Result<usize, PdfEngineError>;
    fn save_to_bytes(&mut self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    document: Document,
    page_ids: Vec<ObjectId>,
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the parsed document, for resolving indirect objects.
    pub fn document(&self, handle: DocumentHandle) -> Result<&Document, PdfEngineError> {
        Ok(&self.record(handle)?.document)
    }

    pub fn document_mut(&mut self, handle: DocumentHandle) -> Result<&mut Document, PdfEngineError> {
        Ok(&mut self.record_mut(handle)?.document)
    }

    /// Copy of the current document state, restorable with [`LopdfEngine::restore`].
    pub fn snapshot(&self, handle: DocumentHandle) -> Result<Document, PdfEngineError> {
        Ok(self.record(handle)?.document.clone())
    }

    pub fn restore(&mut self, handle: DocumentHandle, document: Document) -> Result<(), PdfEngineError> {
        self.record_mut(handle)?.document = document;
        Ok(())
    }

    fn parse(bytes: &[u8]) -> Result<DocumentRecord, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let document = Document::load_mem(bytes)?;
        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();

        if page_ids.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        let page_sizes = page_ids.iter().map(|id| Self::read_page_size(&document, *id)).collect();

        Ok(DocumentRecord { document, page_ids, page_sizes })
    }

    fn read_page_size(document: &Document, page_id: ObjectId) -> PageSize {
        let mut size = inherited_attribute(document, page_id, b"MediaBox")
            .and_then(|obj| obj.as_array().ok())
            .and_then(|array| {
                if array.len() != 4 {
                    return None;
                }
                let x0 = array[0].as_float().ok()?;
                let y0 = array[1].as_float().ok()?;
                let x1 = array[2].as_float().ok()?;
                let y1 = array[3].as_float().ok()?;
                Some(PageSize {
                    width_pt: (x1 - x0).abs(),
                    height_pt: (y1 - y0).abs(),
                    origin_x: x0.min(x1),
                    origin_y: y0.min(y1),
                    rotation: 0,
                })
            })
            .unwrap_or_else(|| {
                warn!(?page_id, "page has no usable MediaBox, assuming US Letter");
                PageSize::LETTER
            });

        size.rotation = inherited_attribute(document, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .map(|degrees| (degrees.rem_euclid(360) / 90 * 90) as i32)
            .unwrap_or(0);

        size
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn record_mut(&mut self, handle: DocumentHandle) -> Result<&mut DocumentRecord, PdfEngineError> {
        self.docs.get_mut(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn page_id(record: &DocumentRecord, page_index: u32) -> Result<ObjectId, PdfEngineError> {
        record.page_ids.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_ids.len() as u32,
        })
    }
}

/// Look up a page attribute, walking `/Parent` links for inheritable keys.
fn inherited_attribute<'a>(
    document: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = current.get(key) {
            return document.dereference(value).ok().map(|(_, object)| object);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = document.get_dictionary(parent).ok()?;
    }
    None
}

/// Mutable access to a page's `/Annots` array, following an indirect array
/// and creating a direct one when missing.
fn annots_mut(document: &mut Document, page_id: ObjectId) -> Result<&mut Vec<Object>, PdfEngineError> {
    let existing = document.get_dictionary(page_id)?.get(b"Annots").ok().cloned();

    match existing {
        Some(Object::Reference(array_id)) => Ok(document.get_object_mut(array_id)?.as_array_mut()?),
        Some(Object::Array(_)) => {
            Ok(document.get_dictionary_mut(page_id)?.get_mut(b"Annots")?.as_array_mut()?)
        }
        _ => {
            let page = document.get_dictionary_mut(page_id)?;
            page.set("Annots", Object::Array(Vec::new()));
            Ok(page.get_mut(b"Annots")?.as_array_mut()?)
        }
    }
}

impl PdfEngine for LopdfEngine {
    #[instrument(skip_all)]
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let record = Self::parse(&bytes)?;
        debug!(pages = record.page_ids.len(), bytes = bytes.len(), "PDF loaded");

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, record);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let mut width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let mut height = (page_size.height_pt * scale).round().max(1.0) as u32;

        if let Some(clip) = request.clip {
            width = (clip.width * scale).round().max(1.0) as u32;
            height = (clip.height * scale).round().max(1.0) as u32;
        }

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn page_annotations(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<NativeAnnotation>, PdfEngineError> {
        let record = self.record(handle)?;
        let document = &record.document;
        let page_id = Self::page_id(record, page_index)?;

        let Some(annots) = document.get_dictionary(page_id)?.get(b"Annots").ok() else {
            return Ok(Vec::new());
        };
        let (_, annots) = document.dereference(annots)?;
        let Ok(entries) = annots.as_array() else {
            warn!(page_index, "page /Annots is not an array, ignoring");
            return Ok(Vec::new());
        };

        let mut found = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                Object::Reference(id) => match document.get_dictionary(*id) {
                    Ok(dictionary) => found.push(NativeAnnotation {
                        object_id: Some(*id),
                        dictionary: dictionary.clone(),
                    }),
                    Err(err) => debug!(?id, %err, "skipping unresolvable annotation reference"),
                },
                Object::Dictionary(dictionary) => {
                    found.push(NativeAnnotation { object_id: None, dictionary: dictionary.clone() })
                }
                _ => debug!(page_index, "skipping non-dictionary /Annots entry"),
            }
        }

        Ok(found)
    }

    fn add_object(
        &mut self,
        handle: DocumentHandle,
        object: Object,
    ) -> Result<ObjectId, PdfEngineError> {
        Ok(self.record_mut(handle)?.document.add_object(object))
    }

    fn append_annotation(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        mut annotation: Dictionary,
    ) -> Result<ObjectId, PdfEngineError> {
        let record = self.record_mut(handle)?;
        let page_id = Self::page_id(record, page_index)?;

        annotation.set("P", Object::Reference(page_id));
        let annotation_id = record.document.add_object(Object::Dictionary(annotation));
        annots_mut(&mut record.document, page_id)?.push(Object::Reference(annotation_id));

        Ok(annotation_id)
    }

    fn remove_annotations(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        ids: &[ObjectId],
    ) -> Result<usize, PdfEngineError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let record = self.record_mut(handle)?;
        let page_id = Self::page_id(record, page_index)?;
        let annots = annots_mut(&mut record.document, page_id)?;

        let before = annots.len();
        annots.retain(|entry| !matches!(entry, Object::Reference(id) if ids.contains(id)));
        let removed = before - annots.len();

        for id in ids {
            record.document.objects.remove(id);
        }

        Ok(removed)
    }

    #[instrument(skip(self))]
    fn save_to_bytes(&mut self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError> {
        let document = &mut self.record_mut(handle)?.document;
        let pruned = document.prune_objects();
        let mut buffer = Vec::new();
        document.save_to(&mut buffer)?;
        debug!(bytes = buffer.len(), pruned = pruned.len(), "PDF serialized");
        Ok(buffer)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, StringFormat};

    fn sample_pdf_bytes(media_box: [i64; 4], rotate: Option<i64>, with_annot: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        };
        if let Some(rotate) = rotate {
            page.set("Rotate", rotate);
        }
        if with_annot {
            let link = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Link",
                "Rect" => vec![Object::Integer(10), Object::Integer(10), Object::Integer(50), Object::Integer(50)],
                "Contents" => Object::String(b"link".to_vec(), StringFormat::Literal),
            });
            page.set("Annots", vec![Object::Reference(link)]);
        }
        let page_id = doc.add_object(page);

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => media_box.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture should serialize");
        bytes
    }

    fn open(bytes: Vec<u8>) -> (LopdfEngine, DocumentHandle) {
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(bytes)).expect("open should succeed");
        (engine, handle)
    }

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let (engine, handle) = open(sample_pdf_bytes([0, 0, 612, 792], None, false));

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 1);
    }

    #[test]
    fn page_size_uses_inherited_media_box_with_origin() {
        let (engine, handle) = open(sample_pdf_bytes([0, 100, 400, 700], Some(450), false));

        let size = engine.page_size(handle, 0).expect("size should resolve");
        assert_eq!(size.width_pt, 400.0);
        assert_eq!(size.height_pt, 600.0);
        assert_eq!(size.origin_y, 100.0);
        assert_eq!(size.rotation, 90);
    }

    #[test]
    fn render_page_scales_canvas() {
        let (engine, handle) = open(sample_pdf_bytes([0, 0, 612, 792], None, false));

        let image = engine
            .render_page(handle, RenderRequest { page_index: 0, scale: 0.5, clip: None })
            .expect("page should render");

        assert_eq!(image.width(), 306);
        assert_eq!(image.height(), 396);
    }

    #[test]
    fn append_creates_annots_array_and_round_trips() {
        let (mut engine, handle) = open(sample_pdf_bytes([0, 0, 612, 792], None, false));

        let annot = dictionary! { "Type" => "Annot", "Subtype" => "Square" };
        let id = engine.append_annotation(handle, 0, annot).expect("append should succeed");

        let found = engine.page_annotations(handle, 0).expect("annotations should list");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].object_id, Some(id));

        let bytes = engine.save_to_bytes(handle).expect("save should succeed");
        let (reopened, handle) = open(bytes);
        let found = reopened.page_annotations(handle, 0).expect("annotations should list");
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].dictionary.get(b"Subtype").and_then(Object::as_name).ok(),
            Some(&b"Square"[..])
        );
    }

    #[test]
    fn remove_annotations_keeps_unlisted_entries() {
        let (mut engine, handle) = open(sample_pdf_bytes([0, 0, 612, 792], None, true));

        let added = engine
            .append_annotation(handle, 0, dictionary! { "Subtype" => "Circle" })
            .expect("append should succeed");
        let removed = engine.remove_annotations(handle, 0, &[added]).expect("remove should succeed");

        assert_eq!(removed, 1);
        let remaining = engine.page_annotations(handle, 0).expect("annotations should list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(
            remaining[0].dictionary.get(b"Subtype").and_then(Object::as_name).ok(),
            Some(&b"Link"[..])
        );
    }

    #[test]
    fn snapshot_restore_discards_changes() {
        let (mut engine, handle) = open(sample_pdf_bytes([0, 0, 612, 792], None, false));

        let snapshot = engine.snapshot(handle).expect("snapshot should succeed");
        engine
            .append_annotation(handle, 0, dictionary! { "Subtype" => "Ink" })
            .expect("append should succeed");
        engine.restore(handle, snapshot).expect("restore should succeed");

        assert!(engine.page_annotations(handle, 0).expect("list").is_empty());
    }

    #[test]
    fn invalid_bytes_fail_to_parse() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"not a pdf".to_vec()))
            .expect_err("garbage should not parse");

        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn encrypted_marker_is_rejected() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"%PDF-1.4\n/Encrypt 5 0 R".to_vec()))
            .expect_err("encrypted marker should be rejected");

        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }

    #[test]
    fn page_index_out_of_range_is_reported() {
        let (engine, handle) = open(sample_pdf_bytes([0, 0, 612, 792], None, false));

        let err = engine.page_annotations(handle, 3).expect_err("page 3 does not exist");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 3, page_count: 1 }));
    }
}
