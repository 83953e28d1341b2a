//! Structured document readers: PDF, OOXML (docx/xlsx/pptx) and zip listings.
//!
//! Each reader is bounded (pages, paragraphs, rows, slides, entries) and
//! returns whatever text it found; callers substitute stubs for empty output.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use thiserror::Error;
use xml::reader::{EventReader, XmlEvent};
use zip::ZipArchive;

#[derive(Error, Debug)]
pub(crate) enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] xml::reader::Error),

    #[error("PDF error: {0}")]
    Pdf(String),
}

type Result<T> = std::result::Result<T, ExtractError>;

fn open_zip(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

// ─── PDF ─────────────────────────────────────────────────────────────

/// Text of the first `max_pages` pages. Stops at the first page that fails,
/// which also covers documents shorter than `max_pages`.
pub(crate) fn pdf_text(path: &Path, max_pages: usize) -> Result<String> {
    let mut doc = pdf_oxide::PdfDocument::open(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let mut text = String::new();
    for page in 0..max_pages {
        match doc.extract_text(page) {
            Ok(page_text) => {
                if !page_text.trim().is_empty() {
                    text.push_str(&page_text);
                    text.push('\n');
                }
            }
            Err(e) => {
                if page == 0 {
                    return Err(ExtractError::Pdf(e.to_string()));
                }
                break;
            }
        }
    }
    Ok(text)
}

// ─── Word ────────────────────────────────────────────────────────────

/// Paragraph text from `word/document.xml`, first `max_paragraphs` paragraphs.
pub(crate) fn docx_text(path: &Path, max_paragraphs: usize) -> Result<String> {
    let mut archive = open_zip(path)?;
    let part = archive.by_name("word/document.xml")?;
    let mut text = String::new();
    let mut paragraphs = 0usize;
    let mut in_text = false;

    for event in EventReader::new(BufReader::new(part)) {
        match event? {
            XmlEvent::StartElement { name, .. } if name.local_name == "t" => in_text = true,
            XmlEvent::EndElement { name } if name.local_name == "t" => in_text = false,
            XmlEvent::EndElement { name } if name.local_name == "p" => {
                text.push('\n');
                paragraphs += 1;
                if paragraphs >= max_paragraphs {
                    break;
                }
            }
            XmlEvent::Characters(s) | XmlEvent::CData(s) if in_text => text.push_str(&s),
            XmlEvent::Whitespace(s) if in_text => text.push_str(&s),
            _ => {}
        }
    }
    Ok(text)
}

// ─── Excel ───────────────────────────────────────────────────────────

fn shared_strings<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
    let part = match archive.by_name("xl/sharedStrings.xml") {
        Ok(p) => p,
        Err(zip::result::ZipError::FileNotFound) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    for event in EventReader::new(BufReader::new(part)) {
        match event? {
            XmlEvent::StartElement { name, .. } if name.local_name == "si" => current.clear(),
            XmlEvent::EndElement { name } if name.local_name == "si" => {
                strings.push(std::mem::take(&mut current));
            }
            XmlEvent::StartElement { name, .. } if name.local_name == "t" => in_text = true,
            XmlEvent::EndElement { name } if name.local_name == "t" => in_text = false,
            XmlEvent::Characters(s) | XmlEvent::CData(s) if in_text => current.push_str(&s),
            _ => {}
        }
    }
    Ok(strings)
}

/// String cells from the first `max_sheets` sheets, first `max_rows` rows each.
/// Numeric cells are skipped.
pub(crate) fn xlsx_text(path: &Path, max_sheets: usize, max_rows: usize) -> Result<String> {
    let mut archive = open_zip(path)?;
    let shared = shared_strings(&mut archive)?;
    let mut text = String::new();

    for sheet in 1..=max_sheets {
        let part = match archive.by_name(&format!("xl/worksheets/sheet{}.xml", sheet)) {
            Ok(p) => p,
            Err(zip::result::ZipError::FileNotFound) => break,
            Err(e) => return Err(e.into()),
        };

        let mut rows = 0usize;
        let mut cell_type = String::new();
        let mut in_value = false;
        let mut in_inline = false;

        for event in EventReader::new(BufReader::new(part)) {
            match event? {
                XmlEvent::StartElement { name, .. } if name.local_name == "row" => {
                    if rows >= max_rows {
                        break;
                    }
                    rows += 1;
                }
                XmlEvent::StartElement { name, attributes, .. } if name.local_name == "c" => {
                    cell_type = attributes
                        .iter()
                        .find(|a| a.name.local_name == "t")
                        .map(|a| a.value.clone())
                        .unwrap_or_default();
                }
                XmlEvent::StartElement { name, .. } if name.local_name == "v" => in_value = true,
                XmlEvent::EndElement { name } if name.local_name == "v" => in_value = false,
                XmlEvent::StartElement { name, .. } if name.local_name == "t" => in_inline = true,
                XmlEvent::EndElement { name } if name.local_name == "t" => in_inline = false,
                XmlEvent::Characters(s) => {
                    if in_value && cell_type == "s" {
                        if let Some(value) = s.trim().parse::<usize>().ok().and_then(|i| shared.get(i)) {
                            text.push_str(value);
                            text.push(' ');
                        }
                    } else if (in_value && cell_type == "str") || (in_inline && cell_type == "inlineStr") {
                        text.push_str(&s);
                        text.push(' ');
                    }
                }
                _ => {}
            }
        }
        text.push('\n');
    }
    Ok(text)
}

// ─── PowerPoint ──────────────────────────────────────────────────────

/// Slide number from `ppt/slides/slideN.xml`.
fn slide_number(name: &str) -> Option<usize> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// Text runs of the first `max_slides` slides, in slide order.
pub(crate) fn pptx_text(path: &Path, max_slides: usize) -> Result<String> {
    let mut archive = open_zip(path)?;
    let mut slides: Vec<(usize, String)> = archive
        .file_names()
        .filter_map(|n| slide_number(n).map(|num| (num, n.to_string())))
        .collect();
    slides.sort();
    slides.truncate(max_slides);

    let mut text = String::new();
    for (_, name) in slides {
        let part = archive.by_name(&name)?;
        let mut in_text = false;
        for event in EventReader::new(BufReader::new(part)) {
            match event? {
                XmlEvent::StartElement { name, .. } if name.local_name == "t" => in_text = true,
                XmlEvent::EndElement { name } if name.local_name == "t" => in_text = false,
                XmlEvent::EndElement { name } if name.local_name == "p" => text.push('\n'),
                XmlEvent::Characters(s) | XmlEvent::CData(s) if in_text => text.push_str(&s),
                _ => {}
            }
        }
    }
    Ok(text)
}

// ─── Archives ────────────────────────────────────────────────────────

/// Names of the first `max_entries` entries of a zip archive.
pub(crate) fn zip_listing(path: &Path, max_entries: usize) -> Result<String> {
    let archive = open_zip(path)?;
    let names: Vec<&str> = archive.file_names().take(max_entries).collect();
    Ok(format!("Archive contents: {}", names.join(" ")))
}
