use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use crate::processor::ExtractError;

/// Concatenates the text of every page, in page order, with no separator.
///
/// Pages without a recoverable text layer (scanned pages, unusual font
/// encodings) contribute nothing instead of failing the whole document.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let document = Document::load(path)?;
    if document.is_encrypted() {
        return Err(ExtractError::Encrypted);
    }

    let pages = document.get_pages();
    let mut text = String::new();
    let mut empty_pages = 0;

    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => {
                let page_text = page_text.trim_end_matches(|c: char| c == '\r' || c == '\n');
                if page_text.is_empty() {
                    empty_pages += 1;
                }
                text.push_str(page_text);
            }
            Err(e) => {
                empty_pages += 1;
                warn!(page = page_number, error = %e, "No text recovered from PDF page");
            }
        }
    }

    if empty_pages > 0 {
        warn!(
            page_count = pages.len(),
            empty_pages, "PDF pages without a text layer are not OCR'd"
        );
    }
    debug!(page_count = pages.len(), text_length = text.len(), "Extracted PDF text");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_text_to_pdf;
    use lopdf::{
        content::{Content, Operation},
        dictionary, Object, Stream,
    };

    /// One page per entry, each holding a single line of Helvetica text.
    fn write_pages(path: &Path, pages: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page_text in pages {
            let mut operations = Vec::new();
            if !page_text.is_empty() {
                operations = vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*page_text)]),
                    Operation::new("ET", vec![]),
                ];
            }
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_pages_are_concatenated_without_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.pdf");
        write_pages(&path, &["A", "B"]);

        assert_eq!(extract_text(&path).unwrap(), "AB");
    }

    #[test]
    fn test_page_without_text_contributes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanned.pdf");
        write_pages(&path, &["first", "", "third"]);

        assert_eq!(extract_text(&path).unwrap(), "firstthird");
    }

    #[test]
    fn test_corrupt_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.pdf");
        std::fs::write(&path, b"%PDF-1.4\nthis is not really a pdf").unwrap();

        assert!(matches!(extract_text(&path), Err(ExtractError::Pdf(_))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_text(&dir.path().join("absent.pdf")).is_err());
    }

    #[test]
    fn test_rendered_text_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.pdf");
        let original = "Invoice 2024-17\nTotal due: 1,250.00 EUR\n\nThank you for your business.";
        render_text_to_pdf(original, &path).unwrap();

        let extracted = extract_text(&path).unwrap();
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&extracted), normalize(original));
    }

    #[test]
    fn test_wrapped_text_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.pdf");
        let original = "lorem ipsum dolor sit amet ".repeat(40);
        render_text_to_pdf(&original, &path).unwrap();

        let extracted = extract_text(&path).unwrap();
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&extracted), normalize(&original));
    }
}
