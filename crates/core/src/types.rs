use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A media file read into memory, ready to be sent inline to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMedia {
    pub filename: String,
    pub payload: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
}

/// Output of the structured stage, before the transcript and notes are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredNotes {
    pub summary: String,
    pub key_sections: Vec<String>,
    pub formulas: Vec<String>,
    pub glossary: Vec<GlossaryEntry>,
    pub exam_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyMaterials {
    pub transcript: String,
    pub summary: String,
    pub key_sections: Vec<String>,
    pub formulas: Vec<String>,
    pub glossary: Vec<GlossaryEntry>,
    pub exam_questions: Vec<String>,
    pub detailed_notes: String,
}

impl StudyMaterials {
    pub fn assemble(transcript: String, notes: StructuredNotes, detailed_notes: String) -> Self {
        Self {
            transcript,
            summary: notes.summary,
            key_sections: notes.key_sections,
            formulas: notes.formulas,
            glossary: notes.glossary,
            exam_questions: notes.exam_questions,
            detailed_notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub filename: String,
    pub materials: StudyMaterials,
}

/// One displayable part of a [`StudyMaterials`] record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Section {
    #[default]
    Summary,
    KeySections,
    Formulas,
    Glossary,
    ExamQuestions,
    DetailedNotes,
    Transcript,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Summary,
        Section::KeySections,
        Section::Formulas,
        Section::Glossary,
        Section::ExamQuestions,
        Section::DetailedNotes,
        Section::Transcript,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Section::Summary => "summary",
            Section::KeySections => "key-sections",
            Section::Formulas => "formulas",
            Section::Glossary => "glossary",
            Section::ExamQuestions => "exam-questions",
            Section::DetailedNotes => "detailed-notes",
            Section::Transcript => "transcript",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::Summary => "Summary",
            Section::KeySections => "Key sections",
            Section::Formulas => "Formulas",
            Section::Glossary => "Glossary",
            Section::ExamQuestions => "Exam questions",
            Section::DetailedNotes => "Detailed notes",
            Section::Transcript => "Transcript",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Section::ALL
            .into_iter()
            .find(|section| section.slug() == wanted)
            .ok_or_else(|| format!("unknown section '{s}'"))
    }
}
