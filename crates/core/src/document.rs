//! Document load and save
//!
//! Ties the PDF engine, the interchange codec, and the annotation store together.
//! Annotations imported from the file, or written by a previous save, are
//! *managed*: saving replaces them with the current store contents. Everything
//! else in `/Annots` (links, form widgets, unknown subtypes) is left untouched.

use crate::annotation::Annotation;
use crate::annotation_export::encode;
use crate::annotation_import::{import_page, ImportStats};
use crate::config::EditorConfig;
use crate::error::DocumentError;
use crate::images::ImageStore;
use crate::native::get_name;
use crate::session::EditorSession;
use crate::store::AnnotationStore;
use crate::transform::PageSpace;
use lopdf::{Object, ObjectId};
use pdf_engine::{DocumentHandle, LopdfEngine, OpenSource, PageSize, PdfEngine};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Admits one document load or save at a time
#[derive(Debug, Clone, Default)]
pub struct IoGate {
    busy: Arc<AtomicBool>,
}

impl IoGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the gate until the returned guard is dropped
    pub fn try_acquire(&self) -> Result<IoGuard, DocumentError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DocumentError::Busy)?;
        Ok(IoGuard { busy: Arc::clone(&self.busy) })
    }
}

/// Held while a load or save is in flight
#[derive(Debug)]
pub struct IoGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for IoGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// An open PDF with its editable annotations
pub struct AnnotatedDocument {
    engine: LopdfEngine,
    handle: DocumentHandle,
    pages: Vec<PageSize>,
    store: AnnotationStore,
    images: ImageStore,
    /// Managed annotation object ids per 0-based page index
    managed: BTreeMap<u32, Vec<ObjectId>>,
    stats: ImportStats,
    config: EditorConfig,
}

impl AnnotatedDocument {
    /// Parse `bytes` and import every page's annotations into a fresh store
    #[instrument(skip(bytes, gate, config), fields(bytes = bytes.len()))]
    pub fn open(bytes: Vec<u8>, gate: &IoGate, config: &EditorConfig) -> Result<Self, DocumentError> {
        let _guard = gate.try_acquire()?;

        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(bytes)).map_err(DocumentError::Load)?;
        let page_count = engine.page_count(handle).map_err(DocumentError::Load)?;

        let mut pages = Vec::with_capacity(page_count as usize);
        let mut images = ImageStore::new();
        let mut stats = ImportStats::default();
        let mut managed = BTreeMap::new();
        let mut annotations = Vec::new();

        for page_index in 0..page_count {
            let size = engine.page_size(handle, page_index).map_err(DocumentError::Load)?;
            let natives = engine.page_annotations(handle, page_index).map_err(DocumentError::Load)?;
            let document = engine.document(handle).map_err(DocumentError::Load)?;

            // Inline dictionaries cannot be removed by reference on save, so they stay unmanaged
            let (referenced, inline): (Vec<_>, Vec<_>) =
                natives.into_iter().partition(|native| native.object_id.is_some());
            if !inline.is_empty() {
                debug!(page_index, count = inline.len(), "leaving inline annotation dictionaries unmanaged");
            }

            let imported = import_page(
                document,
                &referenced,
                page_index + 1,
                &PageSpace::from(size),
                &mut images,
                &mut stats,
            );
            let ids: Vec<ObjectId> = imported.iter().filter_map(|(id, _)| *id).collect();
            if !ids.is_empty() {
                managed.insert(page_index, ids);
            }
            annotations.extend(imported.into_iter().map(|(_, annotation)| annotation));
            pages.push(size);
        }

        let mut store = AnnotationStore::new();
        store.replace_all(annotations);

        info!(
            pages = page_count,
            found = stats.total_found,
            imported = stats.imported,
            unsupported = stats.skipped_unsupported,
            malformed = stats.skipped_malformed,
            "document opened"
        );

        Ok(Self { engine, handle, pages, store, images, managed, stats, config: config.clone() })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Size of a 1-based page
    pub fn page_size(&self, page: u32) -> Option<PageSize> {
        page.checked_sub(1).and_then(|index| self.pages.get(index as usize)).copied()
    }

    pub fn pages(&self) -> &[PageSize] {
        &self.pages
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AnnotationStore {
        &mut self.store
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageStore {
        &mut self.images
    }

    /// Store and image store together, for editing calls that need both
    pub fn parts_mut(&mut self) -> (&mut AnnotationStore, &mut ImageStore) {
        (&mut self.store, &mut self.images)
    }

    pub fn import_stats(&self) -> &ImportStats {
        &self.stats
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// A new editing session using this document's configuration
    pub fn session(&self) -> EditorSession {
        EditorSession::new(self.config.clone())
    }

    /// Replace every annotation, as when applying an exported annotation set
    pub fn replace_annotations(&mut self, annotations: Vec<Annotation>) {
        self.store.replace_all(annotations);
    }

    /// Write the store back into the document and serialize it.
    ///
    /// The engine document is restored on failure; the store is never modified.
    #[instrument(skip(self, gate), fields(annotations = self.store.len()))]
    pub fn save(&mut self, gate: &IoGate) -> Result<Vec<u8>, DocumentError> {
        let _guard = gate.try_acquire()?;

        let snapshot = self.engine.snapshot(self.handle).map_err(DocumentError::Save)?;
        match self.write_annotations() {
            Ok((bytes, managed)) => {
                self.managed = managed;
                info!(bytes = bytes.len(), "document saved");
                Ok(bytes)
            }
            Err(err) => {
                self.engine.restore(self.handle, snapshot).map_err(DocumentError::Save)?;
                Err(err)
            }
        }
    }

    fn write_annotations(&mut self) -> Result<(Vec<u8>, BTreeMap<u32, Vec<ObjectId>>), DocumentError> {
        for (page_index, ids) in &self.managed {
            let mut stale: HashSet<ObjectId> = ids.iter().copied().collect();
            let document = self.engine.document(self.handle).map_err(DocumentError::Save)?;
            let natives = self.engine.page_annotations(self.handle, *page_index).map_err(DocumentError::Save)?;

            // Popups parented to a managed annotation go with it
            let popups: Vec<ObjectId> = natives
                .iter()
                .filter(|native| get_name(document, &native.dictionary, b"Subtype") == Some(b"Popup".as_slice()))
                .filter(|native| {
                    matches!(native.dictionary.get(b"Parent"), Ok(Object::Reference(parent)) if stale.contains(parent))
                })
                .filter_map(|native| native.object_id)
                .collect();
            stale.extend(popups);

            let stale: Vec<ObjectId> = stale.into_iter().collect();
            let removed = self
                .engine
                .remove_annotations(self.handle, *page_index, &stale)
                .map_err(DocumentError::Save)?;
            debug!(page_index, removed, "removed managed annotations");
        }

        let mut managed: BTreeMap<u32, Vec<ObjectId>> = BTreeMap::new();
        for annotation in self.store.iter() {
            // Reported with the annotation's 1-based page
            let target = annotation
                .page()
                .checked_sub(1)
                .and_then(|index| self.pages.get(index as usize).map(|size| (index, size)));
            let Some((page_index, size)) = target else {
                return Err(DocumentError::Save(pdf_engine::PdfEngineError::PageOutOfRange {
                    page: annotation.page(),
                    page_count: self.pages.len() as u32,
                }));
            };

            let (engine, handle) = (&mut self.engine, self.handle);
            let mut add_error = None;
            let dictionary = encode(annotation, &PageSpace::from(*size), &self.images, |object| {
                match engine.add_object(handle, object) {
                    Ok(id) => id,
                    Err(err) => {
                        add_error.get_or_insert(err);
                        (0, 0)
                    }
                }
            })
            .map_err(|source| DocumentError::Encode { id: annotation.id(), source })?;
            if let Some(err) = add_error {
                return Err(DocumentError::Save(err));
            }

            let id = engine.append_annotation(handle, page_index, dictionary).map_err(DocumentError::Save)?;
            managed.entry(page_index).or_default().push(id);
        }

        let bytes = self.engine.save_to_bytes(self.handle).map_err(DocumentError::Save)?;
        Ok((bytes, managed))
    }
}

impl Drop for AnnotatedDocument {
    fn drop(&mut self) {
        if let Err(err) = self.engine.close(self.handle) {
            debug!(%err, "failed to close document handle");
        }
    }
}
