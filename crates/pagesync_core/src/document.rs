//! Typed model of a storage-format page body.
//!
//! A body is an ordered sequence of blocks: paragraph-equivalent
//! containers whose inline content may carry `<br/>` soft breaks, and
//! raw pass-through markup that is never inspected or rewritten. Each
//! parsed paragraph keeps its original outer markup, so untouched
//! blocks re-serialize byte-for-byte; only edited paragraphs are
//! rebuilt.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    open_tag: String,
    lines: Vec<String>,
    source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub(crate) blocks: Vec<Block>,
}

const SOFT_BREAKS: [&str; 3] = ["<br />", "<br/>", "<br>"];

impl Paragraph {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            open_tag: "<p>".to_string(),
            lines: vec![text.into()],
            source: None,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Visible text of one line, inline markup stripped.
    pub fn line_text(&self, index: usize) -> String {
        self.lines
            .get(index)
            .map(|line| strip_markup(line).trim().to_string())
            .unwrap_or_default()
    }

    /// Visible text of the whole paragraph, lines joined with a space.
    pub fn text(&self) -> String {
        let joined = self
            .lines
            .iter()
            .map(|line| strip_markup(line))
            .collect::<Vec<_>>()
            .join(" ");
        joined.trim().to_string()
    }

    /// Replace one line. The paragraph is rebuilt on render from then on.
    pub fn set_line(&mut self, index: usize, line: String) {
        if let Some(slot) = self.lines.get_mut(index) {
            *slot = line;
            self.source = None;
        }
    }

    /// Replace the whole content with a single line.
    pub fn set_text(&mut self, text: String) {
        self.lines = vec![text];
        self.source = None;
    }

    pub fn is_blank(&self) -> bool {
        self.lines
            .iter()
            .all(|line| strip_markup(line).trim().is_empty())
    }

    fn render(&self) -> String {
        match &self.source {
            Some(source) => source.clone(),
            None => format!("{}{}</p>", self.open_tag, self.lines.join("<br/>")),
        }
    }
}

impl Document {
    /// Parse a storage-format fragment. Total over arbitrary input:
    /// anything that does not scan as a paragraph becomes pass-through
    /// markup, so a malformed body still round-trips unchanged.
    pub fn parse(body: &str) -> Self {
        let mut blocks = Vec::new();
        let mut rest = body;
        loop {
            let Some(start) = find_paragraph_open(rest) else {
                if !rest.is_empty() {
                    blocks.push(Block::Other(rest.to_string()));
                }
                break;
            };
            if start > 0 {
                blocks.push(Block::Other(rest[..start].to_string()));
            }
            let tail = &rest[start..];
            let open_end = tail.find('>');
            let close = tail.find("</p>");
            match (open_end, close) {
                (Some(open_end), Some(close)) if open_end < close => {
                    blocks.push(Block::Paragraph(Paragraph {
                        open_tag: tail[..=open_end].to_string(),
                        lines: split_soft_breaks(&tail[open_end + 1..close]),
                        source: Some(tail[..close + 4].to_string()),
                    }));
                    rest = &tail[close + 4..];
                }
                _ => {
                    blocks.push(Block::Other(tail.to_string()));
                    break;
                }
            }
        }
        Self { blocks }
    }

    pub fn render(&self) -> String {
        let mut output = String::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(paragraph) => output.push_str(&paragraph.render()),
                Block::Other(raw) => output.push_str(raw),
            }
        }
        output
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn paragraph(&self, index: usize) -> Option<&Paragraph> {
        match self.blocks.get(index) {
            Some(Block::Paragraph(paragraph)) => Some(paragraph),
            _ => None,
        }
    }

    pub fn insert_paragraph(&mut self, index: usize, paragraph: Paragraph) {
        let index = index.min(self.blocks.len());
        self.blocks.insert(index, Block::Paragraph(paragraph));
    }

    pub fn push_paragraph(&mut self, paragraph: Paragraph) {
        self.blocks.push(Block::Paragraph(paragraph));
    }

    pub fn remove_block(&mut self, index: usize) {
        if index < self.blocks.len() {
            self.blocks.remove(index);
        }
    }
}

/// Remove tag markup, keeping only character content.
pub fn strip_markup(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => output.push(ch),
            _ => {}
        }
    }
    output
}

fn find_paragraph_open(content: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(found) = content[offset..].find("<p") {
        let idx = offset + found;
        match content[idx + 2..].chars().next() {
            Some('>') => return Some(idx),
            Some(ch) if ch.is_whitespace() => return Some(idx),
            _ => offset = idx + 2,
        }
    }
    None
}

fn split_soft_breaks(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = content;
    while let Some((idx, len)) = next_soft_break(rest) {
        lines.push(rest[..idx].to_string());
        rest = &rest[idx + len..];
    }
    lines.push(rest.to_string());
    lines
}

fn next_soft_break(content: &str) -> Option<(usize, usize)> {
    SOFT_BREAKS
        .iter()
        .filter_map(|tag| content.find(tag).map(|idx| (idx, tag.len())))
        .min_by_key(|(idx, _)| *idx)
}
