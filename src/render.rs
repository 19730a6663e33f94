//! Renders a block of text into a fresh PDF: A4 portrait, Helvetica-Bold
//! 12pt, one multi-line cell with automatic page breaks.

use std::path::{Path, PathBuf};

use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, ObjectId, Stream,
};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_FILE_NAME: &str = "result.pdf";

const PT_PER_MM: f32 = 72.0 / 25.4;
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
/// Left, top and right page margin.
const MARGIN_MM: f32 = 10.0;
/// Bottom margin that triggers a page break.
const BREAK_MARGIN_MM: f32 = 15.0;
const CELL_PADDING_MM: f32 = 1.0;
const LINE_HEIGHT_MM: f32 = 10.0;
const FONT_SIZE_PT: f32 = 12.0;
const FONT_SIZE_MM: f32 = FONT_SIZE_PT / PT_PER_MM;
const TEXT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM - 2.0 * CELL_PADDING_MM;

/// Helvetica-Bold advance widths for bytes 32..=126, in 1/1000 em.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, //
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, //
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, //
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];
const DEFAULT_GLYPH_WIDTH: u16 = 556;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to encode PDF content: {0}")]
    Encode(#[from] lopdf::Error),
    #[error("failed to write PDF: {0}")]
    Io(#[from] std::io::Error),
}

/// A line positioned in PDF user space (points, origin bottom-left).
#[derive(Debug)]
struct PlacedLine {
    x: f32,
    y: f32,
    text: Vec<u8>,
}

/// Writes `text` to `path` as a PDF and returns the path written.
pub fn render_text_to_pdf(text: &str, path: &Path) -> Result<PathBuf, RenderError> {
    let pages = layout(wrap_lines(text));
    let mut document = build_document(&pages)?;
    document.save(path)?;

    debug!(path = %path.display(), page_count = pages.len(), "Rendered PDF");
    Ok(path.to_path_buf())
}

fn glyph_width(byte: u8) -> u16 {
    match byte {
        32..=126 => HELVETICA_BOLD_WIDTHS[usize::from(byte - 32)],
        _ => DEFAULT_GLYPH_WIDTH,
    }
}

/// Width of an encoded string in millimetres.
fn text_width(bytes: &[u8]) -> f32 {
    let units: u32 = bytes.iter().map(|&b| u32::from(glyph_width(b))).sum();
    units as f32 * FONT_SIZE_MM / 1000.0
}

/// Single-byte WinAnsi encoding; anything outside Latin-1 becomes `?`.
fn encode_latin1(line: &str) -> Vec<u8> {
    line.chars()
        .filter(|&c| c != '\r')
        .map(|c| match c {
            '\t' => b' ',
            c if matches!(u32::from(c), 0x20..=0x7E | 0xA0..=0xFF) => u32::from(c) as u8,
            _ => b'?',
        })
        .collect()
}

fn wrap_lines(text: &str) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        wrap_paragraph(&encode_latin1(paragraph), TEXT_WIDTH_MM, &mut lines);
    }
    lines
}

fn wrap_paragraph(paragraph: &[u8], max_width: f32, lines: &mut Vec<Vec<u8>>) {
    let mut line: Vec<u8> = Vec::new();
    for word in paragraph.split(|&b| b == b' ') {
        let mut candidate = line.clone();
        if !candidate.is_empty() {
            candidate.push(b' ');
        }
        candidate.extend_from_slice(word);
        if text_width(&candidate) <= max_width {
            line = candidate;
            continue;
        }

        if !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        let mut rest = word;
        while text_width(rest) > max_width {
            let split = fitting_prefix(rest, max_width);
            lines.push(rest[..split].to_vec());
            rest = &rest[split..];
        }
        line = rest.to_vec();
    }
    lines.push(line);
}

/// Length of the longest prefix that fits, never less than one byte.
fn fitting_prefix(bytes: &[u8], max_width: f32) -> usize {
    let mut width = 0.0;
    for (i, &b) in bytes.iter().enumerate() {
        width += f32::from(glyph_width(b)) * FONT_SIZE_MM / 1000.0;
        if width > max_width {
            return i.max(1);
        }
    }
    bytes.len()
}

fn layout(lines: Vec<Vec<u8>>) -> Vec<Vec<PlacedLine>> {
    let mut pages = Vec::new();
    let mut current = Vec::new();
    let mut y = MARGIN_MM;

    for text in lines {
        if y + LINE_HEIGHT_MM > PAGE_HEIGHT_MM - BREAK_MARGIN_MM {
            pages.push(std::mem::take(&mut current));
            y = MARGIN_MM;
        }
        if !text.is_empty() {
            let baseline = y + 0.5 * LINE_HEIGHT_MM + 0.3 * FONT_SIZE_MM;
            current.push(PlacedLine {
                x: (MARGIN_MM + CELL_PADDING_MM) * PT_PER_MM,
                y: (PAGE_HEIGHT_MM - baseline) * PT_PER_MM,
                text,
            });
        }
        y += LINE_HEIGHT_MM;
    }
    pages.push(current);
    pages
}

fn build_document(pages: &[Vec<PlacedLine>]) -> Result<Document, RenderError> {
    let mut doc = Document::with_version("1.3");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for lines in pages {
        let page_id = add_page(&mut doc, pages_id, resources_id, lines)?;
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH_MM * PT_PER_MM),
                Object::Real(PAGE_HEIGHT_MM * PT_PER_MM),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    lines: &[PlacedLine],
) -> Result<ObjectId, RenderError> {
    let mut operations = Vec::with_capacity(lines.len() * 5);
    for line in lines {
        // One text object per line so readers see a break between lines.
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec!["F1".into(), Object::Real(FONT_SIZE_PT)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::Real(line.x), Object::Real(line.y)],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.text.clone())],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    }))
}
