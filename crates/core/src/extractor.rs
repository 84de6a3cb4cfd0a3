use crate::error::IngestError;
use crate::models::MimeKind;
use crate::traits::TextExtractor;
use lopdf::Document;

/// Separates the text of consecutive PDF pages.
pub const PAGE_BOUNDARY: char = '\u{000c}';

const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, IngestError> {
        let text = std::str::from_utf8(bytes).map_err(|error| {
            IngestError::CorruptDocument(format!(
                "invalid utf-8 after byte {}",
                error.valid_up_to()
            ))
        })?;

        Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text).to_string())
    }
}

#[derive(Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document = match Document::load_mem(bytes) {
            Ok(document) => document,
            Err(error) if declares_encryption(bytes) => {
                return Err(IngestError::UnsupportedFormat(format!(
                    "encrypted pdf is not supported: {error}"
                )))
            }
            Err(error) => return Err(IngestError::CorruptDocument(error.to_string())),
        };

        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(IngestError::UnsupportedFormat(
                "encrypted pdf is not supported".to_string(),
            ));
        }

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::CorruptDocument(error.to_string()))?;

            pages.push(PageText {
                number: page_no,
                text: text.trim().to_string(),
            });
        }

        if pages.iter().all(|page| page.text.is_empty()) {
            return Err(IngestError::CorruptDocument(
                "pdf had no readable page text".to_string(),
            ));
        }

        Ok(pages)
    }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, IngestError> {
        let pages = self.extract_pages(bytes)?;
        let separator = PAGE_BOUNDARY.to_string();
        Ok(pages
            .into_iter()
            .map(|page| page.text)
            .collect::<Vec<_>>()
            .join(&separator))
    }
}

impl MimeKind {
    pub fn extractor(&self) -> &'static (dyn TextExtractor + Sync) {
        match self {
            Self::Pdf => &PdfExtractor,
            Self::Text => &PlainTextExtractor,
        }
    }
}

pub fn extract(bytes: &[u8], kind: MimeKind) -> Result<String, IngestError> {
    kind.extractor().extract(bytes)
}

fn declares_encryption(bytes: &[u8]) -> bool {
    bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{image_only_pdf, pdf_with_pages};

    #[test]
    fn text_is_decoded_as_utf8() {
        let text = extract("the quick brown fox".as_bytes(), MimeKind::Text).unwrap();
        assert_eq!(text, "the quick brown fox");
    }

    #[test]
    fn text_drops_byte_order_mark() {
        let text = extract("\u{feff}café".as_bytes(), MimeKind::Text).unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn invalid_utf8_is_corrupt() {
        let result = extract(&[0x66, 0x6f, 0xff, 0xfe], MimeKind::Text);
        assert!(matches!(result, Err(IngestError::CorruptDocument(_))));
    }

    #[test]
    fn garbage_pdf_is_corrupt() {
        let result = extract(b"%PDF-1.4\n%broken", MimeKind::Pdf);
        assert!(matches!(result, Err(IngestError::CorruptDocument(_))));
    }

    #[test]
    fn encrypted_pdf_is_unsupported() {
        let bytes = b"%PDF-1.4\ntrailer\n<< /Root 1 0 R /Encrypt 5 0 R >>\n%%EOF";
        let result = extract(bytes, MimeKind::Pdf);
        assert!(matches!(result, Err(IngestError::UnsupportedFormat(_))));
    }

    #[test]
    fn image_only_pdf_is_corrupt() {
        let result = extract(&image_only_pdf(), MimeKind::Pdf);
        assert!(matches!(result, Err(IngestError::CorruptDocument(_))));
    }

    #[test]
    fn pdf_pages_are_joined_with_boundary_marker() {
        let bytes = pdf_with_pages(&["fox jumps over", "the lazy dog"]);
        let text = extract(&bytes, MimeKind::Pdf).unwrap();

        let pages: Vec<&str> = text.split(PAGE_BOUNDARY).collect();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("fox jumps over"));
        assert!(pages[1].contains("the lazy dog"));
    }
}
