//! Copy/paste of a single annotation

use crate::annotation::{Annotation, AnnotationId, AnnotationKind};
use crate::images::ImageStore;
use crate::store::AnnotationStore;
use tracing::{debug, warn};

/// Holds one deep-copied annotation and counts pastes for cascading offsets
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    content: Option<Annotation>,
    paste_count: u32,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy(&mut self, annotation: &Annotation) {
        self.content = Some(annotation.clone());
        self.paste_count = 0;
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn clear(&mut self) {
        self.content = None;
        self.paste_count = 0;
    }

    /// Insert a fresh copy onto `page`. The n-th paste is shifted by `offset * n` on both axes.
    ///
    /// Image copies get their own pixel entry so that later edits or removals stay independent.
    pub fn paste(
        &mut self,
        store: &mut AnnotationStore,
        images: &mut ImageStore,
        page: u32,
        offset: f32,
    ) -> Option<AnnotationId> {
        let source = self.content.as_ref()?;
        self.paste_count += 1;

        let shift = offset * self.paste_count as f32;
        let mut copy = source.duplicate_to(page);
        copy.kind_mut().translate(shift, shift);

        if let AnnotationKind::Image(image) = copy.kind_mut() {
            match images.duplicate(&image.image) {
                Some(key) => image.image = key,
                None => warn!(key = %image.image, "pasted image has no pixel data"),
            }
        }

        let id = store.add(copy);
        debug!(%id, paste = self.paste_count, "annotation pasted");
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::ImageShape;
    use crate::geometry::Rect;
    use image::RgbaImage;

    fn boxed(page: u32) -> Annotation {
        Annotation::new(page, AnnotationKind::Box { rect: Rect::new(10.0, 10.0, 100.0, 50.0) })
            .expect("valid box")
    }

    #[test]
    fn test_paste_cascades_offset() {
        let mut store = AnnotationStore::new();
        let mut images = ImageStore::new();
        let mut clipboard = Clipboard::new();
        let original = boxed(1);
        clipboard.copy(&original);

        let first = clipboard.paste(&mut store, &mut images, 1, 10.0).expect("content");
        let second = clipboard.paste(&mut store, &mut images, 1, 10.0).expect("content");

        assert_ne!(first, original.id());
        assert_eq!(store.get(first).map(|a| a.bounds()), Some(Rect::new(20.0, 20.0, 100.0, 50.0)));
        assert_eq!(store.get(second).map(|a| a.bounds()), Some(Rect::new(30.0, 30.0, 100.0, 50.0)));
    }

    #[test]
    fn test_paste_to_other_page_unlocks() {
        let mut store = AnnotationStore::new();
        let mut images = ImageStore::new();
        let mut clipboard = Clipboard::new();
        let mut original = boxed(1);
        original.flags_mut().locked = true;
        clipboard.copy(&original);

        let id = clipboard.paste(&mut store, &mut images, 3, 0.0).expect("content");
        let pasted = store.get(id).expect("present");
        assert_eq!(pasted.page(), 3);
        assert!(!pasted.is_locked());
    }

    #[test]
    fn test_empty_clipboard_pastes_nothing() {
        let mut clipboard = Clipboard::new();
        let mut store = AnnotationStore::new();
        assert!(clipboard.paste(&mut store, &mut ImageStore::new(), 1, 10.0).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_image_paste_gets_own_pixels() {
        let mut store = AnnotationStore::new();
        let mut images = ImageStore::new();
        let key = images.insert(RgbaImage::new(4, 2));
        let original = Annotation::new(
            1,
            AnnotationKind::Image(ImageShape {
                rect: Rect::new(0.0, 0.0, 40.0, 20.0),
                rotation: 0.0,
                flip_horizontal: false,
                flip_vertical: false,
                image: key,
                natural_width: 4.0,
                natural_height: 2.0,
            }),
        )
        .expect("valid image");

        let mut clipboard = Clipboard::new();
        clipboard.copy(&original);
        let id = clipboard.paste(&mut store, &mut images, 1, 10.0).expect("content");

        let AnnotationKind::Image(pasted) = store.get(id).expect("present").kind() else {
            panic!("image expected");
        };
        assert_ne!(pasted.image, key);
        assert_eq!(images.len(), 2);
    }
}
