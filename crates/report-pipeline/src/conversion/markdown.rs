//! Turns extracted page text into structured markdown
//!
//! Lines are classified as headings, table rows or paragraph text. Images are
//! never embedded; each one becomes [`IMAGE_PLACEHOLDER`].

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker written wherever the source page carried an image
pub const IMAGE_PLACEHOLDER: &str = "<!-- image -->";

static COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}|\t+").unwrap());
static SECTION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(item\s+\d+[a-z]?\.?|part\s+[ivx]+\.?)(\s|$)").unwrap());
static NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*\.?\s+[A-Z]").unwrap());
static MARKDOWN_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());

/// Text and image count of one PDF page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    pub text: String,
    pub images: usize,
}

/// Normalise characters that PDF fonts commonly emit
pub fn clean_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "*")
        .replace('\u{2026}', "...")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
}

/// Replace inline markdown images with the placeholder
pub fn replace_images(markdown: &str) -> String {
    MARKDOWN_IMAGE
        .replace_all(markdown, IMAGE_PLACEHOLDER)
        .into_owned()
}

#[derive(Debug, PartialEq)]
enum Line<'a> {
    Blank,
    Heading(usize, &'a str),
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if line.len() <= 80 && !line.ends_with('.') || SECTION_HEADING.is_match(line) {
        if SECTION_HEADING.is_match(line) || is_all_caps(line) {
            return Line::Heading(2, line);
        }
        if line.len() <= 60 && NUMBERED_HEADING.is_match(line) {
            return Line::Heading(3, line);
        }
    }
    Line::Text(line)
}

fn is_all_caps(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
}

fn columns(line: &str) -> Vec<String> {
    COLUMN_GAP
        .split(line.trim())
        .filter(|cell| !cell.is_empty())
        .map(|cell| cell.replace('|', "\\|"))
        .collect()
}

fn push_table(out: &mut Vec<String>, rows: &[Vec<String>]) {
    let header = &rows[0];
    out.push(format!("| {} |", header.join(" | ")));
    out.push(format!("|{}", "---|".repeat(header.len())));
    for row in &rows[1..] {
        out.push(format!("| {} |", row.join(" | ")));
    }
}

fn flush_paragraph(out: &mut Vec<String>, paragraph: &mut Vec<&str>) {
    if !paragraph.is_empty() {
        out.push(paragraph.join(" "));
        paragraph.clear();
    }
}

/// Render one page of extracted text
pub fn render_page(page: &PageText, detect_tables: bool) -> String {
    let cleaned = clean_text(&page.text);
    let lines: Vec<&str> = cleaned.lines().collect();
    let mut blocks: Vec<String> = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        if detect_tables {
            let first = columns(lines[i]);
            if first.len() >= 2 {
                let mut rows = vec![first];
                let mut j = i + 1;
                while j < lines.len() {
                    let row = columns(lines[j]);
                    if row.len() != rows[0].len() {
                        break;
                    }
                    rows.push(row);
                    j += 1;
                }
                if rows.len() >= 2 {
                    flush_paragraph(&mut blocks, &mut paragraph);
                    let mut table = Vec::new();
                    push_table(&mut table, &rows);
                    blocks.push(table.join("\n"));
                    i = j;
                    continue;
                }
            }
        }

        match classify(lines[i]) {
            Line::Blank => flush_paragraph(&mut blocks, &mut paragraph),
            Line::Heading(level, text) => {
                flush_paragraph(&mut blocks, &mut paragraph);
                blocks.push(format!("{} {}", "#".repeat(level), text));
            }
            Line::Text(text) => paragraph.push(text),
        }
        i += 1;
    }
    flush_paragraph(&mut blocks, &mut paragraph);

    for _ in 0..page.images {
        blocks.push(IMAGE_PLACEHOLDER.to_string());
    }

    blocks.join("\n\n")
}

/// Render a whole document, pages in order
pub fn render_document(pages: &[PageText], detect_tables: bool) -> String {
    let rendered: Vec<String> = pages
        .iter()
        .map(|page| render_page(page, detect_tables))
        .filter(|page| !page.is_empty())
        .collect();

    let mut markdown = rendered.join("\n\n");
    markdown.push('\n');
    markdown
}
