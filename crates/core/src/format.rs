use chrono::{DateTime, Local, TimeZone};

use crate::{
    markdown::{parse_notes, render_plain},
    types::{HistoryEntry, Section, StudyMaterials},
};

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bulleted(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("• {}", item.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format one section of a record as readable text, without a title
pub fn format_section_body(materials: &StudyMaterials, section: Section) -> String {
    let body = match section {
        Section::Summary => materials.summary.trim().to_string(),
        Section::KeySections => bulleted(&materials.key_sections),
        Section::Formulas => bulleted(&materials.formulas),
        Section::Glossary => materials
            .glossary
            .iter()
            .map(|entry| format!("{}: {}", entry.term.trim(), entry.definition.trim()))
            .collect::<Vec<_>>()
            .join("\n"),
        Section::ExamQuestions => numbered(&materials.exam_questions),
        Section::DetailedNotes => render_plain(&parse_notes(&materials.detailed_notes))
            .trim_end()
            .to_string(),
        Section::Transcript => materials.transcript.trim().to_string(),
    };

    if body.is_empty() {
        "(none)".to_string()
    } else {
        body
    }
}

pub fn format_section(materials: &StudyMaterials, section: Section) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", section.title()));
    output.push_str(&format_section_body(materials, section));
    output.push('\n');
    output
}

/// History ids are creation times in epoch milliseconds.
pub fn created_at(entry_id: u64) -> Option<DateTime<Local>> {
    let millis = i64::try_from(entry_id).ok()?;
    Local.timestamp_millis_opt(millis).single()
}

/// One-line description of a history entry
pub fn format_history_line(entry: &HistoryEntry) -> String {
    let m = &entry.materials;
    let date = created_at(entry.id)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown date".to_string());
    format!(
        "{}  {}  {}  ({} key sections, {} formulas, {} glossary terms, {} questions)",
        entry.id,
        date,
        entry.filename,
        m.key_sections.len(),
        m.formulas.len(),
        m.glossary.len(),
        m.exam_questions.len()
    )
}
