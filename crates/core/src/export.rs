use std::{fs, path::Path};

use crate::{
    error::{KonspektError, Result},
    format::format_section,
    types::{HistoryEntry, Section},
};

/// A4 height divided by width.
const A4_RATIO: f64 = 297.0 / 210.0;
const PAGE_BREAK: char = '\u{0C}';

pub trait ExportRenderer {
    /// Render `section` of `entry` into a paginated document at `path`,
    /// returning the number of pages written.
    fn export(&self, entry: &HistoryEntry, section: Section, path: &Path) -> Result<usize>;
}

/// Plain-text pages with A4 proportions, separated by form feeds
pub struct TextExporter {
    page_width: usize,
}

impl Default for TextExporter {
    fn default() -> Self {
        Self { page_width: 80 }
    }
}

impl TextExporter {
    pub fn new(page_width: usize) -> Self {
        Self {
            page_width: page_width.max(20),
        }
    }

    pub fn page_height(&self) -> usize {
        (self.page_width as f64 * A4_RATIO).round() as usize
    }

    pub fn render(&self, entry: &HistoryEntry, section: Section) -> Vec<String> {
        let document = format!(
            "{}\n\n{}",
            entry.filename,
            format_section(&entry.materials, section)
        );
        let lines: Vec<String> = document
            .lines()
            .flat_map(|line| wrap(line, self.page_width))
            .collect();
        paginate(&lines, self.page_height())
    }
}

impl ExportRenderer for TextExporter {
    fn export(&self, entry: &HistoryEntry, section: Section, path: &Path) -> Result<usize> {
        let pages = self.render(entry, section);
        let mut document = pages.join(&format!("{PAGE_BREAK}\n"));
        document.push('\n');

        fs::write(path, document).map_err(|e| KonspektError::Export {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::info!(path = %path.display(), pages = pages.len(), %section, "section exported");
        Ok(pages.len())
    }
}

/// Tile lines across pages of `page_height` lines
pub fn paginate(lines: &[String], page_height: usize) -> Vec<String> {
    if lines.is_empty() {
        return vec![String::new()];
    }
    lines
        .chunks(page_height.max(1))
        .map(|page| page.join("\n"))
        .collect()
}

/// Greedy word wrap; words longer than `width` are split.
fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }

    let mut wrapped = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                wrapped.push(std::mem::take(&mut current));
            }
            wrapped.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width {
            wrapped.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        wrapped.push(current);
    }
    wrapped
}
