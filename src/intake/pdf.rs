//! Plain text extraction from PDF uploads

use crate::error::{IntakeError, Result};
use lopdf::Document;
use tracing::warn;

/// Returned when a readable PDF carries no extractable text
pub const NO_TEXT: &str = "No text extracted";

/// Extract the text of every page, one page per line block.
///
/// Pages whose text cannot be decoded are skipped; a document that cannot be
/// parsed at all is rejected as invalid input.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| IntakeError::InvalidInput(format!("Unreadable PDF: {e}")))?;

    let mut text = String::new();
    for page in doc.get_pages().keys() {
        match doc.extract_text(&[*page]) {
            Ok(page_text) if !page_text.trim().is_empty() => {
                text.push_str(page_text.trim_end());
                text.push('\n');
            }
            Ok(_) => {}
            Err(e) => warn!(page = *page, error = %e, "Skipping page without extractable text"),
        }
    }

    let text = text.trim();
    Ok(if text.is_empty() {
        NO_TEXT.to_string()
    } else {
        text.to_string()
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Single-page document; `None` gives a page with an empty content stream.
    pub(crate) fn one_page_pdf(text: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let operations = match text {
            Some(text) => vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
            None => Vec::new(),
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extracts_page_text() {
        let text = extract_text(&one_page_pdf(Some("INVOICE 42 TOTAL 1500"))).unwrap();
        assert!(text.contains("INVOICE 42 TOTAL 1500"), "{text:?}");
        assert_eq!(text, text.trim());
    }

    #[test]
    fn test_page_without_text() {
        assert_eq!(extract_text(&one_page_pdf(None)).unwrap(), NO_TEXT);
    }

    #[test]
    fn test_garbage_is_invalid_input() {
        let err = extract_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, IntakeError::InvalidInput(_)));
    }
}
