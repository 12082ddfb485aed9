use std::path::{Path, PathBuf};

use console::style;
use konspekt_core::{
    Section, StudyMaterials, format_section_body,
    markdown::{Block, Span, parse_notes},
};

/// What the terminal is currently showing.
#[derive(Default)]
pub struct ViewState {
    pub active: Section,
    pub selected_file: Option<PathBuf>,
}

impl ViewState {
    pub fn select_file(&mut self, path: &Path) {
        self.selected_file = Some(path.to_path_buf());
    }

    pub fn show(&mut self, section: Section) {
        self.active = section;
    }

    /// A finished run always opens on the default section.
    pub fn reset(&mut self) {
        self.active = Section::default();
    }

    pub fn render(&self, materials: &StudyMaterials) -> String {
        let mut output = String::new();
        if let Some(name) = self.selected_file.as_deref().and_then(Path::file_name) {
            output.push_str(&format!("{}\n", style(name.to_string_lossy()).dim()));
        }
        output.push_str(&self.tabs());
        output.push_str("\n\n");
        output.push_str(&format!(
            "{}\n\n",
            style(self.active.title()).cyan().bold()
        ));
        output.push_str(&render_body(materials, self.active));
        output.push('\n');
        output
    }

    fn tabs(&self) -> String {
        Section::ALL
            .iter()
            .map(|section| {
                if *section == self.active {
                    style(section.slug()).cyan().bold().underlined().to_string()
                } else {
                    style(section.slug()).dim().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}

fn render_body(materials: &StudyMaterials, section: Section) -> String {
    match section {
        Section::DetailedNotes if !materials.detailed_notes.trim().is_empty() => {
            render_notes(&parse_notes(&materials.detailed_notes))
        }
        _ => format_section_body(materials, section),
    }
}

fn render_spans(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Span::Plain(text) => text.clone(),
            Span::Bold(text) => style(text).bold().to_string(),
            Span::Italic(text) => style(text).italic().to_string(),
            Span::Code(text) => style(text).yellow().to_string(),
        })
        .collect()
}

fn render_notes(blocks: &[Block]) -> String {
    let mut output = String::new();
    for block in blocks {
        match block {
            Block::Heading { level: 1, spans } => {
                output.push_str(&format!("\n{}\n", style(render_spans(spans)).cyan().bold()))
            }
            Block::Heading { spans, .. } => {
                output.push_str(&format!("\n{}\n", style(render_spans(spans)).bold()))
            }
            Block::Bullet { depth, spans } => output.push_str(&format!(
                "  {}{} {}\n",
                "  ".repeat(*depth),
                style("•").dim(),
                render_spans(spans)
            )),
            Block::Numbered {
                depth,
                number,
                spans,
            } => output.push_str(&format!(
                "  {}{} {}\n",
                "  ".repeat(*depth),
                style(format!("{number}.")).dim(),
                render_spans(spans)
            )),
            Block::Code { text, .. } => {
                for line in text.lines() {
                    output.push_str(&format!("    {}\n", style(line).yellow()));
                }
            }
            Block::Paragraph(spans) => output.push_str(&format!("{}\n", render_spans(spans))),
            Block::Rule => output.push_str(&format!("{}\n", style("─".repeat(60)).dim())),
        }
    }
    output.trim_start().to_string()
}
