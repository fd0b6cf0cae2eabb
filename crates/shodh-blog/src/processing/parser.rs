use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::Path;

use crate::types::{Document, DocumentFormat};

/// Format-specific loader. Each variant only ever reads its own format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentLoader {
    Pdf,
    Text,
    Csv,
    Docx,
}

impl DocumentLoader {
    pub fn for_format(format: DocumentFormat) -> Self {
        match format {
            DocumentFormat::PDF => Self::Pdf,
            DocumentFormat::TXT => Self::Text,
            DocumentFormat::CSV => Self::Csv,
            DocumentFormat::DOCX => Self::Docx,
        }
    }

    pub fn format(&self) -> DocumentFormat {
        match self {
            Self::Pdf => DocumentFormat::PDF,
            Self::Text => DocumentFormat::TXT,
            Self::Csv => DocumentFormat::CSV,
            Self::Docx => DocumentFormat::DOCX,
        }
    }

    /// Load `path`, attributing every document to `source` (the uploaded file name).
    pub fn load(&self, path: &Path, source: &str) -> Result<Vec<Document>> {
        match self {
            Self::Pdf => load_pdf(path, source),
            Self::Text => load_text(path, source),
            Self::Csv => load_csv(path, source),
            Self::Docx => load_docx(path, source),
        }
    }
}

fn load_pdf(path: &Path, source: &str) -> Result<Vec<Document>> {
    // Per-page extraction through lopdf first so page numbers survive.
    let mut docs = Vec::new();
    match lopdf::Document::load(path) {
        Ok(pdf) => {
            for page_number in pdf.get_pages().keys() {
                let text = match pdf.extract_text(&[*page_number]) {
                    Ok(t) => clean_pdf_text(&t),
                    Err(e) => {
                        tracing::debug!(page = page_number, error = %e, "lopdf page extraction failed");
                        continue;
                    }
                };
                if text.is_empty() {
                    continue;
                }
                docs.push(
                    Document::new(text, source, DocumentFormat::PDF)
                        .with_position("page", *page_number as usize),
                );
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "lopdf could not open PDF, trying pdf-extract");
        }
    }

    if !docs.is_empty() {
        return Ok(docs);
    }

    // Whole-document fallback.
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read PDF: {}", path.display()))?;
    // pdf-extract panics on some malformed font tables.
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
        .map_err(|_| anyhow!("PDF text extraction aborted on malformed input"))?
        .map_err(|e| anyhow!("PDF text extraction failed: {}", e))?;
    let cleaned = clean_pdf_text(&text);
    if cleaned.is_empty() {
        return Err(anyhow!("PDF contains no extractable text"));
    }
    Ok(vec![Document::new(cleaned, source, DocumentFormat::PDF)])
}

fn clean_pdf_text(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn load_text(path: &Path, source: &str) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file: {}", path.display()))?;
    Ok(vec![Document::new(content, source, DocumentFormat::TXT)])
}

fn load_csv(path: &Path, source: &str) -> Result<Vec<Document>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV: {}", path.display()))?;
    let headers = reader
        .headers()
        .context("Failed to read CSV header row")?
        .clone();

    let mut docs = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record at row {}", row))?;
        let content = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| format!("{}: {}", h.trim(), v.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        docs.push(Document::new(content, source, DocumentFormat::CSV).with_position("row", row));
    }

    Ok(docs)
}

fn load_docx(path: &Path, source: &str) -> Result<Vec<Document>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open DOCX: {}", path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read DOCX as ZIP: {}", path.display()))?;

    let mut xml_content = String::new();
    archive
        .by_name("word/document.xml")
        .context("DOCX missing word/document.xml")?
        .read_to_string(&mut xml_content)
        .context("Failed to read document.xml from DOCX")?;

    Ok(vec![Document::new(
        extract_docx_text(&xml_content),
        source,
        DocumentFormat::DOCX,
    )])
}

/// Collect `<w:t>` runs per `<w:p>` paragraph, one paragraph per line.
fn extract_docx_text(xml: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut rest = xml;

    while let Some(p_start) = find_tag(rest, "<w:p") {
        let after = &rest[p_start..];
        if after.starts_with("<w:p/>") {
            rest = &after[6..];
            continue;
        }
        let p_end = after.find("</w:p>").map(|e| e + 6).unwrap_or(after.len());
        let paragraph = &after[..p_end];

        let mut text = String::new();
        let mut runs = paragraph;
        while let Some(t_start) = find_tag(runs, "<w:t") {
            let tag = &runs[t_start..];
            let Some(open_end) = tag.find('>') else { break };
            let body = &tag[open_end + 1..];
            if tag[..open_end].ends_with('/') {
                runs = body;
                continue;
            }
            let Some(close) = body.find("</w:t>") else { break };
            text.push_str(&unescape_xml(&body[..close]));
            runs = &body[close + 6..];
        }

        if !text.is_empty() {
            paragraphs.push(text);
        }
        rest = &after[p_end..];
    }

    paragraphs.join("\n")
}

/// Find `tag` only where it is a complete element name (`<w:p>` or `<w:p ...>`, not `<w:pPr>`).
fn find_tag(haystack: &str, tag: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = haystack[offset..].find(tag) {
        let abs = offset + pos;
        match haystack[abs + tag.len()..].chars().next() {
            Some('>') | Some(' ') | Some('/') => return Some(abs),
            _ => offset = abs + tag.len(),
        }
    }
    None
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
