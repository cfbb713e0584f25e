//! Annotation-set JSON
//!
//! Interchange format for exporting and re-applying a document's annotations.
//! Image annotations carry only their image keys; pixel data stays in the PDF.

use crate::annotation::{Annotation, AnnotationId};
use crate::error::AnnotationError;
use serde::{Deserialize, Serialize};

/// Format version written by [`to_json`]
pub const ANNOTATION_SET_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("invalid annotation set JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported annotation set version {found} (expected {ANNOTATION_SET_VERSION})")]
    UnsupportedVersion { found: u32 },
    #[error("annotation {id} is invalid")]
    InvalidAnnotation {
        id: AnnotationId,
        #[source]
        source: AnnotationError,
    },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Versioned list of annotations in paint order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSet {
    pub version: u32,
    pub annotations: Vec<Annotation>,
}

impl AnnotationSet {
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self { version: ANNOTATION_SET_VERSION, annotations }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Annotations on one 1-based page
    pub fn for_page(&self, page: u32) -> AnnotationSet {
        AnnotationSet::new(self.annotations.iter().filter(|a| a.page() == page).cloned().collect())
    }
}

/// Serialize `annotations` as a pretty-printed annotation set
pub fn to_json<'a, I>(annotations: I) -> PersistenceResult<String>
where
    I: IntoIterator<Item = &'a Annotation>,
{
    let set = AnnotationSet::new(annotations.into_iter().cloned().collect());
    Ok(serde_json::to_string_pretty(&set)?)
}

/// Parse an annotation set, rejecting unknown versions and annotations that break model invariants.
///
/// Style values outside their ranges are clamped rather than rejected.
pub fn from_json(json: &str) -> PersistenceResult<AnnotationSet> {
    let set: AnnotationSet = serde_json::from_str(json)?;
    if set.version != ANNOTATION_SET_VERSION {
        return Err(PersistenceError::UnsupportedVersion { found: set.version });
    }
    for annotation in &set.annotations {
        annotation
            .validate()
            .map_err(|source| PersistenceError::InvalidAnnotation { id: annotation.id(), source })?;
    }
    Ok(set)
}
