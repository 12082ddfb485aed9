pub static TRANSCRIPTION_INSTRUCTIONS: &str = r#"
  You are transcribing a recorded university lecture.

  TASK:
  - Produce a complete, verbatim transcript of everything the lecturer says
  - Keep mathematical expressions readable (e.g. "F = m*a", "x^2 + y^2 = r^2")
  - Break the text into paragraphs at natural pauses or topic changes

  RULES:
  - Output ONLY the transcript text, no headings or commentary
  - If the recording contains no intelligible speech, output nothing
"#;

static STUDY_GUIDE_INSTRUCTIONS: &str = r#"
  You are a teaching assistant preparing a study guide from a lecture transcript.

  OUTPUT: Return ONLY valid JSON:
  {
    "summary": "1-2 paragraph synthesis of the lecture",
    "keySections": ["Main topic 1 with a one-sentence explanation", "..."],
    "formulas": ["Every formula or equation stated in the lecture, one per item"],
    "glossary": [{"term": "Term", "definition": "Concise definition"}],
    "examQuestions": ["Question a student should be able to answer", "..."]
  }

  RULES:
  - keySections: 4-8 items in lecture order
  - formulas: empty array if the lecture states none
  - glossary: 5-15 domain terms actually used in the lecture
  - examQuestions: 5-10 questions mixing recall and application
  - Output ONLY the JSON, nothing else
"#;

static DETAILED_NOTES_INSTRUCTIONS: &str = r#"
  You are an expert note-taker. Write detailed study notes for the lecture below.

  RULES:
  - Synthesize and explain; do not reformat the transcript sentence by sentence
  - Organise the notes under # and ## headings that follow the lecture's structure
  - Use - bullets for lists (indent two spaces to nest) and 1. for ordered steps
  - Mark key terms with **bold**
  - Write formulas as `inline code`, and worked examples as fenced code blocks
"#;

/// Prompt for the structured study-guide stage
pub fn study_guide_prompt(transcript: &str) -> String {
    format!("{STUDY_GUIDE_INSTRUCTIONS}\nTRANSCRIPT:\n\n{transcript}")
}

/// Prompt for the free-form detailed notes stage
pub fn detailed_notes_prompt(transcript: &str) -> String {
    format!("{DETAILED_NOTES_INSTRUCTIONS}\nTRANSCRIPT:\n\n{transcript}")
}
