//! Flat text extraction from uploaded documents.
//!
//! [`extract_text`] never fails: a malformed file degrades to an empty string
//! and an unsupported extension to a placeholder naming the file.

use calamine::Reader;
use log::{debug, info};
use quick_xml::events::Event;
use std::fmt;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::error::{InsightsError, Result};
use crate::outcome::Outcome;
use crate::utils::truncate_chars;
use crate::workbook::{open_workbook, range_to_grid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Pdf,
    Docx,
    Spreadsheet,
    Unsupported,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match extension.as_deref() {
            Some("txt") | Some("csv") => DocumentKind::PlainText,
            Some("pdf") => DocumentKind::Pdf,
            Some("docx") => DocumentKind::Docx,
            Some("xlsx") => DocumentKind::Spreadsheet,
            _ => DocumentKind::Unsupported,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::PlainText => "text",
            DocumentKind::Pdf => "PDF",
            DocumentKind::Docx => "DOCX",
            DocumentKind::Spreadsheet => "spreadsheet",
            DocumentKind::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Extracts a document's text, reporting failures as a degraded outcome
/// whose value is `""`.
pub fn extract_document(path: &Path) -> Outcome<String> {
    let kind = DocumentKind::from_path(path);
    let result = match kind {
        DocumentKind::PlainText => std::fs::read_to_string(path).map_err(InsightsError::from),
        DocumentKind::Pdf => extract_pdf_text(path),
        DocumentKind::Docx => extract_docx_text(path),
        DocumentKind::Spreadsheet => extract_spreadsheet_text(path),
        DocumentKind::Unsupported => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Outcome::Ok(format!("[File type {} is not supported]", name));
        }
    };

    match result {
        Ok(text) => {
            debug!(
                "Extracted {} characters of {} text from '{}'",
                text.chars().count(),
                kind,
                path.display()
            );
            Outcome::Ok(text)
        }
        Err(e) => Outcome::degraded(
            String::new(),
            format!("{} extraction of '{}' failed: {}", kind, path.display(), e),
        ),
    }
}

pub fn extract_text(path: &Path) -> String {
    extract_document(path).into_value()
}

/// Page texts joined by newlines. The PDF parser can panic on corrupt input,
/// so the call is isolated with `catch_unwind`.
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_by_pages(path))
        .map_err(|_| InsightsError::Pdf("parser panicked on malformed input".to_string()))?
        .map_err(|e| InsightsError::Pdf(e.to_string()))?;
    Ok(join_pages(&pages))
}

fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|page| page.trim_end_matches('\n'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Non-blank paragraphs of `word/document.xml`, one per line.
pub fn extract_docx_text(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;
    paragraphs_from_document_xml(&xml).map(|paragraphs| paragraphs.join("\n"))
}

fn paragraphs_from_document_xml(xml: &str) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                b"tab" => current.push('\t'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !current.trim().is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

/// Every sheet as a `--- Sheet: <name> ---` marker followed by its rows,
/// cells tab-separated.
pub fn extract_spreadsheet_text(path: &Path) -> Result<String> {
    let mut workbook = open_workbook(path)?;
    let mut text = String::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        text.push_str(&format!("--- Sheet: {} ---\n", name));
        for row in range_to_grid(&range) {
            text.push_str(&row.join("\t"));
            text.push('\n');
        }
    }
    Ok(text)
}

/// Resolves a plain file name inside `uploads_dir`. Names with directory
/// parts, `..` or a root are rejected.
fn upload_path(uploads_dir: &Path, name: &str) -> Option<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(file)), None) => Some(uploads_dir.join(file)),
        _ => None,
    }
}

/// Text of every uploaded file that exists in `uploads_dir`, each prefixed
/// with `Content of <name>:` and cut to `char_budget` characters, joined by
/// blank lines. Missing files are skipped.
pub fn collect_uploaded_texts<S: AsRef<str>>(
    uploads_dir: &Path,
    file_names: &[S],
    char_budget: usize,
) -> String {
    let mut sections = Vec::new();
    for name in file_names {
        let name = name.as_ref();
        if name.trim().is_empty() {
            continue;
        }
        let Some(path) = upload_path(uploads_dir, name) else {
            debug!("Uploaded file name '{}' leaves the uploads directory, skipping", name);
            continue;
        };
        if !path.exists() {
            debug!("Uploaded file '{}' not found, skipping", path.display());
            continue;
        }
        let text = extract_text(&path);
        sections.push(format!(
            "Content of {}:\n{}",
            name,
            truncate_chars(&text, char_budget)
        ));
    }
    info!("Collected text from {} uploaded document(s)", sections.len());
    sections.join("\n\n")
}
