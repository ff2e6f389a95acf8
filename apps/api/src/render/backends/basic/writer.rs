//! Serializes laid-out pages to PDF with `lopdf`.
//!
//! Uses the standard Helvetica faces so no font program is embedded, and
//! writes no timestamps: identical input gives byte-identical output.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::layout::{Page, PageGeometry};
use super::metrics::{HELVETICA, HELVETICA_BOLD};

const REGULAR_FONT: &str = "F1";
const BOLD_FONT: &str = "F2";
const PRODUCER: &str = "vitae basic renderer";

pub fn write_pdf(pages: &[Page], geometry: &PageGeometry, title: Option<&str>) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(font_dictionary(HELVETICA.base_font));
    let bold_id = doc.add_object(font_dictionary(HELVETICA_BOLD.base_font));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR_FONT => regular_id,
            BOLD_FONT => bold_id,
        },
    });

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = page_content(page);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), geometry.width.into(), geometry.height.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::from(*id)).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Producer" => Object::String(win_ansi_bytes(PRODUCER), StringFormat::Literal),
    };
    if let Some(title) = title {
        info.set("Title", Object::String(win_ansi_bytes(title), StringFormat::Hexadecimal));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn font_dictionary(base_font: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn page_content(page: &Page) -> Content {
    let mut operations = Vec::new();
    for line in &page.lines {
        if line.runs.is_empty() {
            continue;
        }
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
        let mut current_font: Option<&str> = None;
        for run in &line.runs {
            let font = if run.bold { BOLD_FONT } else { REGULAR_FONT };
            if current_font != Some(font) {
                operations.push(Operation::new("Tf", vec![font.into(), line.size.into()]));
                current_font = Some(font);
            }
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi_bytes(&run.text), StringFormat::Hexadecimal)],
            ));
        }
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }
}

/// Encodes text for a WinAnsiEncoding font. Characters outside the code page
/// become `?`.
pub fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\t' | '\n' | '\r' => b' ',
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::basic::layout::{PlacedLine, TextRun};

    fn page(text: &str, bold: bool) -> Page {
        Page {
            lines: vec![PlacedLine {
                x: 54.0,
                y: 760.0,
                size: 10.0,
                runs: vec![TextRun {
                    text: text.to_string(),
                    bold,
                }],
            }],
        }
    }

    #[test]
    fn test_output_is_a_pdf_with_expected_page_count() {
        let pages = vec![page("first", false), page("second", true)];
        let bytes = write_pdf(&pages, &PageGeometry::A4, Some("Jane Doe")).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_text_is_extractable() {
        let bytes = write_pdf(&[page("Hello (world) \\ done", false)], &PageGeometry::A4, None).unwrap();
        let text = pdf_extract::extract_text_from_mem(&bytes).unwrap();
        assert!(text.contains("Hello (world)"), "{text}");
    }

    #[test]
    fn test_output_is_deterministic() {
        let pages = vec![page("same input", false)];
        let a = write_pdf(&pages, &PageGeometry::A4, Some("t")).unwrap();
        let b = write_pdf(&pages, &PageGeometry::A4, Some("t")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(win_ansi_bytes("Aé"), vec![b'A', 0xE9]);
        assert_eq!(win_ansi_bytes("– • ’"), vec![0x96, b' ', 0x95, b' ', 0x92]);
        assert_eq!(win_ansi_bytes("日本"), b"??".to_vec());
    }
}
