//! Stamping object types from the per-type bitmaps.

use crate::error::LabelError;
use crate::index::Index;
use crate::object::ObjectType;

impl Index {
    /// Label every object with its type using the loaded bitmap.
    ///
    /// Each object must be claimed by exactly one of the four type bitmaps.
    /// On error no object is relabelled. Calling this again after success
    /// is a no-op.
    pub fn label_object_types(&mut self) -> Result<(), LabelError> {
        if self.labelled {
            return Ok(());
        }
        let bitmap = self.bitmap.as_ref().ok_or(LabelError::NoBitmap)?;
        let n = self.objects.len();

        let mut labels = vec![ObjectType::Unknown; n];
        for object_type in ObjectType::BITMAP_ORDER {
            let Some(type_bitmap) = bitmap.type_bitmap(object_type) else {
                continue;
            };
            type_bitmap.scan(|bit| {
                let position = bit as usize;
                let slot = labels
                    .get_mut(position)
                    .ok_or(LabelError::PositionOutOfRange {
                        object_type,
                        position,
                        objects: n,
                    })?;
                if slot.is_known() {
                    return Err(LabelError::ConflictingTypeLabel {
                        position,
                        previous: *slot,
                        new: object_type,
                    });
                }
                *slot = object_type;
                Ok(())
            })?;
        }

        if let Some(position) = labels.iter().position(|t| !t.is_known()) {
            return Err(LabelError::UnlabeledObject(position));
        }

        for (pack_pos, object_type) in labels.into_iter().enumerate() {
            self.objects[self.packfile_order[pack_pos]].obj_type = object_type;
        }
        self.labelled = true;
        Ok(())
    }
}
