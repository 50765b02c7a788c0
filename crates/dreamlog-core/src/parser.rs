use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ParserConfig;

/// A field the analysis reply can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Title,
    Categories,
    Moods,
    Interpretation,
    Narrative,
    Visual,
}

impl Section {
    const COUNT: usize = 6;

    /// Recognized labels, matched case-insensitively.
    const LABELS: &'static [(&'static str, Section)] = &[
        ("BAŞLIK", Section::Title),
        ("TITLE", Section::Title),
        ("SEMBOLLER", Section::Categories),
        ("SYMBOLS", Section::Categories),
        ("CATEGORIES", Section::Categories),
        ("DUYGULAR", Section::Moods),
        ("EMOTIONS", Section::Moods),
        ("MOODS", Section::Moods),
        ("FAL", Section::Interpretation),
        ("FORTUNE", Section::Interpretation),
        ("INTERPRETATION", Section::Interpretation),
        ("AÇIKLAMA", Section::Narrative),
        ("DESCRIPTION", Section::Narrative),
        ("NARRATIVE", Section::Narrative),
        ("GÖRSEL", Section::Visual),
        ("VISUAL PROMPT", Section::Visual),
        ("VISUAL", Section::Visual),
    ];

    fn index(self) -> usize {
        match self {
            Section::Title => 0,
            Section::Categories => 1,
            Section::Moods => 2,
            Section::Interpretation => 3,
            Section::Narrative => 4,
            Section::Visual => 5,
        }
    }

    /// Multi-line sections keep capturing until a blank line or the next label.
    fn is_multiline(self) -> bool {
        matches!(self, Section::Narrative | Section::Visual)
    }

    fn from_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_uppercase();
        Self::LABELS
            .iter()
            .find(|(name, _)| *name == upper)
            .map(|(_, section)| *section)
    }
}

/// Structured result of parsing one analysis reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAnalysis {
    pub title: String,
    pub categories: Vec<String>,
    pub moods: Vec<String>,
    pub interpretation: String,
    /// Improved dream text. Empty when the reply had none.
    pub narrative: String,
    /// Scene description for image generation. Empty when the reply had none.
    pub visual: String,
    /// Number of distinct sections found in the reply.
    pub sections_found: usize,
}

impl ParsedAnalysis {
    /// The narrative, or `original` when the reply carried none.
    pub fn narrative_or<'a>(&'a self, original: &'a str) -> &'a str {
        if self.narrative.is_empty() {
            original
        } else {
            &self.narrative
        }
    }
}

static THINK_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").ok());
static FENCE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*```[^\n]*$").ok());
static LINK_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]\n]*)\]\([^)\n]*\)").ok());
static HEADING_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)#{1,6}[ \t]*").ok());
static LEADING_UNDERSCORE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)(^|\s)_+").ok());
static LIST_MARKER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-+•]|\d+[.)])\s+").ok());
static TRAILING_UNDERSCORE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)_+(\s|$|[.,;:!?)])").ok());

fn replace(re: &LazyLock<Option<Regex>>, text: &str, with: &str) -> String {
    match re.as_ref() {
        Some(re) => re.replace_all(text, with).into_owned(),
        None => text.to_string(),
    }
}

/// One sanitizing pass. Only ever removes characters.
fn sanitize_pass(text: &str) -> String {
    let text = replace(&FENCE_RE, text, "");
    let text = replace(&LINK_RE, &text, "$1");
    let text = replace(&HEADING_RE, &text, "$1");
    let text = text.replace(['*', '`'], "").replace("__", "");
    let text = replace(&LEADING_UNDERSCORE_RE, &text, "$1");
    replace(&TRAILING_UNDERSCORE_RE, &text, "$1")
}

/// Strip markdown artifacts (emphasis, headings, inline code, code fences,
/// links) from model output, keeping link text.
///
/// The pass is repeated until the text stops changing, so
/// `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(text: &str) -> String {
    let mut current = sanitize_pass(text);
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Remove `<think>…</think>` blocks emitted by reasoning models.
pub fn strip_reasoning(text: &str) -> String {
    replace(&THINK_RE, text, "")
}

/// Split `LABEL: rest` into its section and the rest of the line. A leading
/// bullet or number (`- `, `2. `, `3) `) before the label is ignored.
fn split_label(line: &str) -> Option<(Section, &str)> {
    let (head, rest) = line.split_once(':')?;
    let head = replace(&LIST_MARKER_RE, head, "");
    let section = Section::from_label(&head)?;
    Some((section, rest.trim()))
}

/// First sentence of `input`, cut at `.`, `!`, `?` or a newline and limited
/// to `max_chars` characters.
fn first_sentence(input: &str, max_chars: usize) -> String {
    let sentence = input
        .split(['.', '!', '?', '\n'])
        .next()
        .unwrap_or_default()
        .trim();
    sentence
        .chars()
        .take(max_chars)
        .collect::<String>()
        .trim_end()
        .to_string()
}

fn split_list(text: &str, max: usize) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .take(max)
        .map(String::from)
        .collect()
}

/// Section currently being captured and its lines so far.
struct Capture {
    section: Section,
    lines: Vec<String>,
}

/// Extracts labeled fields from a language model's dream analysis.
///
/// The model is asked to answer in `LABEL: value` sections. Replies are
/// unreliable: sections go missing, arrive out of order, or come wrapped in
/// markdown or list markers. Parsing never fails; every field has a fallback.
#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    config: ParserConfig,
}

impl ResponseParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a raw analysis reply. `original_input` is the user's own text,
    /// used for the title fallback.
    pub fn parse(&self, raw: &str, original_input: &str) -> ParsedAnalysis {
        let text = sanitize(&strip_reasoning(raw));
        let captured = Self::capture_sections(&text);
        let sections_found = captured.iter().filter(|c| c.is_some()).count();

        if sections_found == 0 {
            debug!(
                reply_len = raw.len(),
                "no labeled sections in analysis reply, using fallbacks"
            );
        }

        let [title, categories, moods, interpretation, narrative, visual] = captured;

        let title = title.unwrap_or_else(|| {
            let fallback = first_sentence(original_input, self.config.title_max_chars);
            if fallback.is_empty() {
                self.config.untitled_title.clone()
            } else {
                fallback
            }
        });

        ParsedAnalysis {
            title,
            categories: categories
                .map(|c| split_list(&c, self.config.max_tags))
                .unwrap_or_default(),
            moods: moods
                .map(|m| split_list(&m, self.config.max_tags))
                .unwrap_or_default(),
            interpretation: interpretation
                .unwrap_or_else(|| self.config.fallback_interpretation.clone()),
            narrative: narrative.unwrap_or_default(),
            visual: visual.unwrap_or_default(),
            sections_found,
        }
    }

    /// Run the line state machine, returning the first non-empty capture of
    /// each section.
    fn capture_sections(text: &str) -> [Option<String>; Section::COUNT] {
        let mut captured: [Option<String>; Section::COUNT] = Default::default();
        let mut current: Option<Capture> = None;

        fn flush(current: &mut Option<Capture>, captured: &mut [Option<String>; Section::COUNT]) {
            let Some(capture) = current.take() else {
                return;
            };
            let value = capture.lines.join("\n").trim().to_string();
            let slot = &mut captured[capture.section.index()];
            if !value.is_empty() && slot.is_none() {
                *slot = Some(value);
            }
        }

        for line in text.lines() {
            if let Some((section, rest)) = split_label(line) {
                flush(&mut current, &mut captured);
                let mut capture = Capture {
                    section,
                    lines: Vec::new(),
                };
                if !rest.is_empty() {
                    capture.lines.push(rest.to_string());
                }
                let complete = !section.is_multiline() && !capture.lines.is_empty();
                current = Some(capture);
                if complete {
                    flush(&mut current, &mut captured);
                }
                continue;
            }

            let Some(capture) = current.as_mut() else {
                continue;
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                // A blank line ends a multi-line section once it has content.
                if capture.section.is_multiline() && !capture.lines.is_empty() {
                    flush(&mut current, &mut captured);
                }
                continue;
            }

            capture.lines.push(trimmed.to_string());
            if !capture.section.is_multiline() {
                flush(&mut current, &mut captured);
            }
        }

        flush(&mut current, &mut captured);
        captured
    }
}
