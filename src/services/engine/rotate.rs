use super::{inherited_attribute, page_id};
use crate::error::{PdfWizardError, Result};
use crate::types::RotateDefinition;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

/// Applies each definition in list order. Pages covered by several
/// definitions accumulate their rotations.
pub(crate) fn apply_rotations(doc: &mut Document, definitions: &[RotateDefinition]) -> Result<()> {
    for definition in definitions {
        let degrees = definition.rotation.degrees() as i64;
        for page in definition.start_page..=definition.end_page {
            let id = page_id(doc, page)?;
            rotate_page(doc, id, degrees)?;
        }
        debug!(
            "Rotated pages {}-{} by {} degrees",
            definition.start_page, definition.end_page, degrees
        );
    }
    Ok(())
}

/// Current `/Rotate` of a page, normalised to `0..360`.
pub(crate) fn effective_rotation(doc: &Document, page: ObjectId) -> i64 {
    inherited_attribute(doc, page, b"Rotate")
        .and_then(|value| value.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360)
}

fn rotate_page(doc: &mut Document, page: ObjectId, degrees: i64) -> Result<()> {
    let current = effective_rotation(doc, page);
    let dict = doc.get_dictionary_mut(page).map_err(|e| PdfWizardError::Execution {
        reason: format!("page object {:?} is not a dictionary: {}", page, e),
    })?;
    dict.set("Rotate", Object::Integer((current + degrees).rem_euclid(360)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::build_test_pdf;
    use super::*;
    use crate::types::RotationAngle;

    fn definition(start: u32, end: u32, rotation: RotationAngle) -> RotateDefinition {
        RotateDefinition {
            id: 1,
            start_page: start,
            end_page: end,
            rotation,
        }
    }

    fn rotations(doc: &Document) -> Vec<i64> {
        doc.get_pages()
            .values()
            .map(|id| effective_rotation(doc, *id))
            .collect()
    }

    #[test]
    fn test_rotations_apply_to_listed_pages_only() {
        let mut doc = build_test_pdf(4);
        apply_rotations(
            &mut doc,
            &[
                definition(1, 2, RotationAngle::Clockwise90),
                definition(4, 4, RotationAngle::Half),
            ],
        )
        .unwrap();
        assert_eq!(rotations(&doc), vec![90, 90, 0, 180]);
    }

    #[test]
    fn test_overlapping_rotations_accumulate_in_order() {
        let mut doc = build_test_pdf(3);
        apply_rotations(
            &mut doc,
            &[
                definition(1, 3, RotationAngle::CounterClockwise90),
                definition(2, 2, RotationAngle::Half),
            ],
        )
        .unwrap();
        assert_eq!(rotations(&doc), vec![270, 90, 270]);
    }

    #[test]
    fn test_inherited_rotation_is_respected() {
        let mut doc = build_test_pdf(2);
        let pages_id = doc
            .catalog()
            .unwrap()
            .get(b"Pages")
            .unwrap()
            .as_reference()
            .unwrap();
        doc.get_dictionary_mut(pages_id)
            .unwrap()
            .set("Rotate", Object::Integer(90));

        apply_rotations(&mut doc, &[definition(1, 1, RotationAngle::Clockwise90)]).unwrap();
        assert_eq!(rotations(&doc), vec![180, 90]);
    }

    #[test]
    fn test_missing_page_fails() {
        let mut doc = build_test_pdf(2);
        assert!(apply_rotations(&mut doc, &[definition(1, 3, RotationAngle::Half)]).is_err());
    }
}
