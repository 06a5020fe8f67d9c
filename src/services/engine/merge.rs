use super::inherited_attribute;
use crate::error::{PdfWizardError, Result};
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Page attributes that may be inherited from the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Concatenates documents in order.
///
/// The first document is the base. Objects of every following document are
/// imported with their ids shifted past the current maximum, then all pages
/// are hung directly under the base's page tree root.
pub(crate) fn merge_documents(documents: Vec<Document>) -> Result<Document> {
    let mut documents = documents.into_iter();
    let mut dest = documents
        .next()
        .ok_or_else(|| PdfWizardError::invalid("no documents to merge"))?;

    let mut page_refs = flatten_pages(&mut dest);
    let mut max_id = dest.max_id;

    for mut source in documents {
        let source_pages = flatten_pages(&mut source);
        let offset = max_id;

        let remapped: BTreeMap<ObjectId, Object> = source
            .objects
            .into_iter()
            .map(|(id, object)| ((id.0 + offset, id.1), remap_refs(object, offset)))
            .collect();
        dest.objects.extend(remapped);

        page_refs.extend(source_pages.into_iter().map(|id| (id.0 + offset, id.1)));
        max_id = (source.max_id + offset).max(max_id);
    }

    dest.max_id = max_id;
    update_page_tree(&mut dest, &page_refs)?;
    dest.prune_objects();
    dest.compress();
    Ok(dest)
}

/// Copies inherited attributes onto every page so the page no longer
/// depends on its original ancestors.
fn flatten_pages(doc: &mut Document) -> Vec<ObjectId> {
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for &page in &pages {
        let inherited: Vec<(&[u8], Object)> = INHERITABLE
            .iter()
            .filter_map(|key| inherited_attribute(doc, page, key).map(|value| (*key, value)))
            .collect();
        if let Ok(dict) = doc.get_dictionary_mut(page) {
            for (key, value) in inherited {
                if !dict.has(key) {
                    dict.set(key.to_vec(), value);
                }
            }
        }
    }
    pages
}

fn remap_refs(object: Object, offset: u32) -> Object {
    match object {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(items) => {
            Object::Array(items.into_iter().map(|o| remap_refs(o, offset)).collect())
        }
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<()> {
    let pages_id = doc
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| PdfWizardError::Merge {
            reason: format!("base document has no page tree: {}", e),
        })?;

    for &page in page_refs {
        if let Ok(dict) = doc.get_dictionary_mut(page) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    let pages = doc
        .get_dictionary_mut(pages_id)
        .map_err(|e| PdfWizardError::Merge {
            reason: format!("invalid pages dictionary: {}", e),
        })?;
    pages.set(
        "Kids",
        Object::Array(page_refs.iter().map(|&id| Object::Reference(id)).collect()),
    );
    pages.set("Count", Object::Integer(page_refs.len() as i64));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::build_test_pdf;
    use super::*;

    fn page_text(doc: &Document, page: u32) -> String {
        let id = doc.get_pages()[&page];
        String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned()
    }

    #[test]
    fn test_merge_keeps_input_order() {
        let merged = merge_documents(vec![build_test_pdf(2), build_test_pdf(3)]).unwrap();
        assert_eq!(merged.get_pages().len(), 5);
        assert!(page_text(&merged, 2).contains("Page 2"));
        assert!(page_text(&merged, 3).contains("Page 1"));
        assert!(page_text(&merged, 5).contains("Page 3"));
    }

    #[test]
    fn test_merged_pages_carry_inherited_attributes() {
        let merged = merge_documents(vec![build_test_pdf(1), build_test_pdf(1)]).unwrap();
        for (_, id) in merged.get_pages() {
            let page = merged.get_dictionary(id).unwrap();
            assert!(page.has(b"MediaBox"));
            assert!(page.has(b"Resources"));
        }
    }

    #[test]
    fn test_merge_single_document() {
        let merged = merge_documents(vec![build_test_pdf(4)]).unwrap();
        assert_eq!(merged.get_pages().len(), 4);
    }

    #[test]
    fn test_merge_nothing() {
        assert!(merge_documents(Vec::new()).is_err());
    }
}
