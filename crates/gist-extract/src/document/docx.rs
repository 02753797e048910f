//! DOCX raw text.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{ExtractError, ExtractResult};

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract paragraph text from a DOCX archive.
///
/// Tabs and line breaks inside runs are kept; each paragraph ends with a
/// newline. Legacy binary `.doc` files fail here with a diagnostic.
pub(super) fn extract_docx(bytes: &[u8]) -> ExtractResult<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::word_processor(format!("not a DOCX archive: {}", e), bytes))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| ExtractError::word_processor(format!("{} missing", DOCUMENT_PART), bytes))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::word_processor(format!("unreadable {}: {}", DOCUMENT_PART, e), bytes))?;

    let text = document_text(&xml)
        .map_err(|e| ExtractError::word_processor(format!("XML parsing error: {}", e), bytes))?;

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ExtractError::empty_content("DOCX contains no text"));
    }
    Ok(text)
}

fn document_text(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text = false;
    // Tab stop definitions share the `tab` element name
    let mut in_tab_stops = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tabs" => in_tab_stops = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"tabs" => in_tab_stops = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" if !in_tab_stops => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_text => {
                let decoded = e.decode().unwrap_or_default();
                text.push_str(&decoded);
            }
            Event::GeneralRef(e) if in_text => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else if let Ok(name) = e.decode() {
                    if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(&name) {
                        text.push_str(resolved);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
pub(crate) mod test_docx {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    /// Minimal DOCX archive with `body` as the `<w:body>` content.
    pub fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );

        let mut buffer = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buffer));
            let options = SimpleFileOptions::default();
            writer.start_file("[Content_Types].xml", options).unwrap();
            writer
                .write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
                .unwrap();
            writer.start_file("word/document.xml", options).unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buffer
    }
}
