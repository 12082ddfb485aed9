//! Document tree for the detailed notes.
//!
//! The backend writes CommonMark; `pulldown_cmark` events are folded into a
//! flat list of blocks that both the plain-text renderer and the terminal
//! view walk.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Plain(String),
    Bold(String),
    Italic(String),
    Code(String),
}

impl Span {
    pub fn text(&self) -> &str {
        match self {
            Span::Plain(text) | Span::Bold(text) | Span::Italic(text) | Span::Code(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    /// `depth` is 0 for top-level list items.
    Bullet { depth: usize, spans: Vec<Span> },
    Numbered { depth: usize, number: u64, spans: Vec<Span> },
    Paragraph(Vec<Span>),
    Code { language: Option<String>, text: String },
    Rule,
}

pub fn parse_notes(text: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut builder = TreeBuilder::default();
    for event in Parser::new_ext(text, options) {
        builder.push(event);
    }
    builder.finish()
}

struct ListItem {
    depth: usize,
    number: Option<u64>,
}

#[derive(Default)]
struct TreeBuilder {
    blocks: Vec<Block>,
    spans: Vec<Span>,
    strong: usize,
    emphasis: usize,
    /// Next number of every open list, `None` for bullet lists.
    lists: Vec<Option<u64>>,
    item: Option<ListItem>,
    heading: Option<u8>,
    code: Option<(Option<String>, String)>,
}

impl TreeBuilder {
    fn push(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match &mut self.code {
                Some((_, code)) => code.push_str(&text),
                None => self.push_text(&text),
            },
            Event::Code(text) => self.spans.push(Span::Code(text.to_string())),
            Event::Html(html) => self.push_text(&html),
            Event::SoftBreak | Event::HardBreak => self.push_text(" "),
            Event::Rule => {
                self.flush();
                self.blocks.push(Block::Rule);
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading(level, _, _) => {
                self.flush();
                self.heading = Some(heading_level(level));
            }
            Tag::List(start) => {
                // text gathered so far belongs to the parent item
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let number = match self.lists.last_mut() {
                    Some(Some(next)) => {
                        let number = *next;
                        *next += 1;
                        Some(number)
                    }
                    _ => None,
                };
                self.item = Some(ListItem {
                    depth: self.lists.len().saturating_sub(1),
                    number,
                });
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.trim().is_empty() => {
                        Some(lang.trim().to_string())
                    }
                    _ => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::Strong => self.strong += 1,
            Tag::Emphasis => self.emphasis += 1,
            _ => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph | Tag::Heading(..) => self.flush(),
            Tag::Item => {
                self.flush();
                self.item = None;
            }
            Tag::List(_) => {
                self.lists.pop();
            }
            Tag::CodeBlock(_) => {
                if let Some((language, text)) = self.code.take() {
                    self.blocks.push(Block::Code {
                        language,
                        text: text.trim_end_matches('\n').to_string(),
                    });
                }
            }
            Tag::Strong => self.strong = self.strong.saturating_sub(1),
            Tag::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        let span = if self.strong > 0 {
            Span::Bold(text.to_string())
        } else if self.emphasis > 0 {
            Span::Italic(text.to_string())
        } else {
            Span::Plain(text.to_string())
        };

        let merged = match (self.spans.last_mut(), &span) {
            (Some(Span::Plain(last)), Span::Plain(next))
            | (Some(Span::Bold(last)), Span::Bold(next))
            | (Some(Span::Italic(last)), Span::Italic(next)) => {
                last.push_str(next);
                true
            }
            _ => false,
        };
        if !merged {
            self.spans.push(span);
        }
    }

    /// Close the pending inline run as a heading, list item or paragraph.
    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);

        let block = if let Some(level) = self.heading.take() {
            Block::Heading { level, spans }
        } else if let Some(item) = self.item.take() {
            match item.number {
                Some(number) => Block::Numbered {
                    depth: item.depth,
                    number,
                    spans,
                },
                None => Block::Bullet {
                    depth: item.depth,
                    spans,
                },
            }
        } else {
            Block::Paragraph(spans)
        };
        self.blocks.push(block);
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

pub fn spans_text(spans: &[Span]) -> String {
    spans.iter().map(Span::text).collect()
}

/// Render a parsed document as plain text
pub fn render_plain(blocks: &[Block]) -> String {
    let mut output = String::new();
    let mut previous_was_item = false;

    for block in blocks {
        let is_item = matches!(block, Block::Bullet { .. } | Block::Numbered { .. });
        if !output.is_empty() && !(is_item && previous_was_item) {
            output.push('\n');
        }

        match block {
            Block::Heading { level, spans } => {
                let text = spans_text(spans);
                output.push_str(&text);
                output.push('\n');
                match level {
                    1 => output.push_str(&"=".repeat(text.chars().count())),
                    2 => output.push_str(&"-".repeat(text.chars().count())),
                    _ => {}
                }
                if *level <= 2 {
                    output.push('\n');
                }
            }
            Block::Bullet { depth, spans } => {
                output.push_str(&format!("{}• {}\n", "  ".repeat(*depth), spans_text(spans)))
            }
            Block::Numbered {
                depth,
                number,
                spans,
            } => output.push_str(&format!(
                "{}{}. {}\n",
                "  ".repeat(*depth),
                number,
                spans_text(spans)
            )),
            Block::Paragraph(spans) => {
                output.push_str(&spans_text(spans));
                output.push('\n');
            }
            Block::Code { text, .. } => {
                for line in text.lines() {
                    output.push_str("    ");
                    output.push_str(line);
                    output.push('\n');
                }
            }
            Block::Rule => output.push_str(&format!("{}\n", "─".repeat(40))),
        }

        previous_was_item = is_item;
    }

    output
}
