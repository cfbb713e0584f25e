//! Error types shared across the annotation layer

use crate::annotation::AnnotationId;
use crate::images::ImageKey;

/// Failures of store and editing operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnnotationError {
    #[error("annotation {0} is locked")]
    Locked(AnnotationId),
    #[error("annotation {0} not found")]
    NotFound(AnnotationId),
    #[error("annotation {id} is on page {page}, not the displayed page")]
    NotOnCurrentPage { id: AnnotationId, page: u32 },
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}

/// Failures while encoding annotations into native objects
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("image {0} is not present in the image store")]
    MissingImage(ImageKey),
    #[error("invalid image data: {0}")]
    InvalidImage(String),
    #[error("failed to build appearance stream: {0}")]
    Appearance(#[from] std::fmt::Error),
}

/// Failures of whole-document load and save
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to load document: {0}")]
    Load(#[source] pdf_engine::PdfEngineError),
    #[error("failed to save document: {0}")]
    Save(#[source] pdf_engine::PdfEngineError),
    #[error("failed to encode annotation {id}: {source}")]
    Encode {
        id: AnnotationId,
        #[source]
        source: CodecError,
    },
    #[error("another load or save is already in progress")]
    Busy,
}

pub type AnnotationResult<T> = Result<T, AnnotationError>;
