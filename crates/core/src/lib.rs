//! PDF Annotator Core Library
//!
//! Annotation model, geometry, editing, and the native PDF interchange codec.

pub mod annotation;
pub mod annotation_export;
pub mod annotation_import;
pub mod clipboard;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod images;
pub mod manipulation;
mod native;
pub mod persistence;
pub mod session;
pub mod snapping;
pub mod store;
pub mod transform;

pub use annotation::{
    Annotation, AnnotationFlags, AnnotationId, AnnotationKind, AnnotationMetadata,
    AnnotationStyle, AnnotationType, BorderStyle, Callout, Color, FontStyle, ImageShape,
    TextAlign, TextBox,
};
pub use annotation_export::encode;
pub use annotation_import::{decode, import_page, DecodeSkip, ImportStats};
pub use clipboard::Clipboard;
pub use config::{ConfigError, EditorConfig};
pub use document::{AnnotatedDocument, IoGate, IoGuard};
pub use error::{AnnotationError, AnnotationResult, CodecError, DocumentError};
pub use geometry::{Point, Rect};
pub use hit_test::{find_at, HitThresholds};
pub use images::{ImageKey, ImageStore};
pub use manipulation::{
    generate_handles, handle_at, EditOptions, EditorState, HandleEditor, HandleType,
    ManipulationHandle, ManipulationState, Modifiers,
};
pub use native::{format_pdf_date, parse_pdf_date};
pub use persistence::{from_json, to_json, AnnotationSet, PersistenceError};
pub use session::{EditorSession, Gesture, PointerOutcome, Tool, ToolStyle};
pub use snapping::SnapConfig;
pub use store::AnnotationStore;
pub use transform::{CoordinateTransform, PageSpace};
