use crate::error::{Error, Result};
use crate::gl::{ExternalImage, ImageImporter, TextureId};

use super::{CameraBuffer, Plane};

/// Owner of at most one imported image.
///
/// `replace` always releases the previous image before importing the next,
/// so a feed never holds two live images for the same plane.
#[derive(Debug, Default)]
pub struct ImageSlot {
    image: Option<ExternalImage>,
}

impl ImageSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(
        &mut self,
        importer: &dyn ImageImporter,
        buffer: &CameraBuffer,
        plane: Plane,
        texture: TextureId,
    ) -> Result<ExternalImage> {
        self.release(importer);
        let image = importer.import(buffer, plane, texture).map_err(Error::ImageImport)?;
        self.image = Some(image);
        Ok(image)
    }

    pub fn release(&mut self, importer: &dyn ImageImporter) {
        if let Some(image) = self.image.take() {
            importer.release(image);
        }
    }

    #[inline]
    pub fn image(&self) -> Option<ExternalImage> {
        self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{Gl, HeadlessGl};

    #[test]
    fn replace_keeps_one_live_image() {
        let gl = HeadlessGl::new(4, 4);
        let tex = gl.create_texture().unwrap();
        let buf = CameraBuffer::new(0, 4, 4);
        let mut slot = ImageSlot::new();

        let first = slot.replace(&gl, &buf, Plane::Y, tex).unwrap();
        let second = slot.replace(&gl, &buf, Plane::Y, tex).unwrap();
        assert_ne!(first, second);
        assert_eq!(gl.live_objects().images, 1);

        slot.release(&gl);
        slot.release(&gl);
        assert_eq!(gl.live_objects().images, 0);
        assert!(slot.image().is_none());
    }

    #[test]
    fn failed_import_leaves_slot_empty() {
        let gl = HeadlessGl::new(4, 4);
        let tex = gl.create_texture().unwrap();
        let buf = CameraBuffer::new(0, 4, 4);
        let mut slot = ImageSlot::new();
        slot.replace(&gl, &buf, Plane::Y, tex).unwrap();

        gl.delete_texture(tex);
        assert!(matches!(slot.replace(&gl, &buf, Plane::Y, tex), Err(Error::ImageImport(_))));
        assert!(slot.image().is_none());
        assert_eq!(gl.live_objects().images, 0);
    }
}
