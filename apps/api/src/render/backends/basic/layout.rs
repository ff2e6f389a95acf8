//! Greedy line breaking and pagination for parsed blocks.

use super::html::{Block, BlockKind};
use super::metrics::font_for;

/// Page size and margins in PDF points.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageGeometry {
    /// A4 with 0.75in margins, matching the external engines.
    pub const A4: PageGeometry = PageGeometry {
        width: 595.28,
        height: 841.89,
        margin: 54.0,
    };

    fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
}

/// One line of text with its baseline origin.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<PlacedLine>,
}

struct BlockStyle {
    size: f32,
    space_before: f32,
    indent: f32,
    bullet: bool,
}

const LINE_HEIGHT: f32 = 1.35;
const BULLET: &str = "•";

fn style(kind: BlockKind) -> BlockStyle {
    match kind {
        BlockKind::Heading(1) => BlockStyle {
            size: 20.0,
            space_before: 0.0,
            indent: 0.0,
            bullet: false,
        },
        BlockKind::Heading(2) => BlockStyle {
            size: 13.0,
            space_before: 10.0,
            indent: 0.0,
            bullet: false,
        },
        BlockKind::Heading(_) => BlockStyle {
            size: 11.0,
            space_before: 6.0,
            indent: 0.0,
            bullet: false,
        },
        BlockKind::Paragraph => BlockStyle {
            size: 10.0,
            space_before: 2.0,
            indent: 0.0,
            bullet: false,
        },
        BlockKind::ListItem => BlockStyle {
            size: 10.0,
            space_before: 1.0,
            indent: 12.0,
            bullet: true,
        },
    }
}

/// A word may carry several runs when a bold boundary falls inside it,
/// e.g. `<b>Acme</b>,`.
struct Word {
    pieces: Vec<TextRun>,
}

impl Word {
    fn width(&self, size: f32) -> f32 {
        self.pieces
            .iter()
            .map(|p| font_for(p.bold).measure_pt(&p.text, size))
            .sum()
    }
}

fn words(block: &Block) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    let mut glue = false;
    for span in &block.spans {
        let leading_space = span.text.starts_with(' ');
        for (i, piece) in span.text.split(' ').filter(|p| !p.is_empty()).enumerate() {
            let run = TextRun {
                text: piece.to_string(),
                bold: span.bold,
            };
            match words.last_mut() {
                Some(word) if i == 0 && glue && !leading_space => word.pieces.push(run),
                _ => words.push(Word { pieces: vec![run] }),
            }
        }
        glue = !span.text.ends_with(' ');
    }
    words
}

/// Appends `word` to a line's runs, merging with the previous run when the
/// face matches.
fn push_word(runs: &mut Vec<TextRun>, word: &Word, with_space: bool) {
    for (i, piece) in word.pieces.iter().enumerate() {
        let mut text = String::new();
        if i == 0 && with_space {
            text.push(' ');
        }
        text.push_str(&piece.text);
        match runs.last_mut() {
            Some(last) if last.bold == piece.bold => last.text.push_str(&text),
            _ => runs.push(TextRun {
                text,
                bold: piece.bold,
            }),
        }
    }
}

fn runs_width(runs: &[TextRun], size: f32) -> f32 {
    runs.iter()
        .map(|r| font_for(r.bold).measure_pt(&r.text, size))
        .sum()
}

/// Splits a word that cannot fit on any line at character boundaries.
fn break_word(word: &Word, size: f32, width: f32) -> Vec<Vec<TextRun>> {
    let mut lines = Vec::new();
    let mut runs: Vec<TextRun> = Vec::new();
    let mut used = 0.0f32;

    for piece in &word.pieces {
        let font = font_for(piece.bold);
        for c in piece.text.chars() {
            let mut buf = [0u8; 4];
            let char_width = font.measure_pt(c.encode_utf8(&mut buf), size);
            if used + char_width > width && !runs.is_empty() {
                lines.push(std::mem::take(&mut runs));
                used = 0.0;
            }
            match runs.last_mut() {
                Some(last) if last.bold == piece.bold => last.text.push(c),
                _ => runs.push(TextRun {
                    text: c.to_string(),
                    bold: piece.bold,
                }),
            }
            used += char_width;
        }
    }
    if !runs.is_empty() {
        lines.push(runs);
    }
    lines
}

/// Breaks `words` into lines no wider than `width`. A word wider than a whole
/// line is split across lines.
fn wrap(words: &[Word], size: f32, width: f32) -> Vec<Vec<TextRun>> {
    let mut lines = Vec::new();
    let mut runs: Vec<TextRun> = Vec::new();
    let mut used = 0.0f32;

    for word in words {
        let word_width = word.width(size);
        if word_width > width {
            if !runs.is_empty() {
                lines.push(std::mem::take(&mut runs));
            }
            let mut fragments = break_word(word, size, width);
            if let Some(last) = fragments.pop() {
                lines.extend(fragments);
                used = runs_width(&last, size);
                runs = last;
            }
            continue;
        }
        if runs.is_empty() {
            push_word(&mut runs, word, false);
            used = word_width;
            continue;
        }
        let bold = runs.last().is_some_and(|r| r.bold);
        let space = font_for(bold).space_width * size;
        if used + space + word_width <= width {
            push_word(&mut runs, word, true);
            used += space + word_width;
        } else {
            lines.push(std::mem::take(&mut runs));
            push_word(&mut runs, word, false);
            used = word_width;
        }
    }
    if !runs.is_empty() {
        lines.push(runs);
    }
    lines
}

/// Lays out every block top to bottom, starting a new page whenever the next
/// baseline would fall into the bottom margin. Always returns at least one page.
pub fn layout(blocks: &[Block], geometry: &PageGeometry) -> Vec<Page> {
    let mut pages = Vec::new();
    let mut page = Page::default();
    let top = geometry.height - geometry.margin;
    let mut cursor = top;

    for block in blocks {
        let style = style(block.kind);
        let bullet_width = if style.bullet {
            font_for(false).measure_pt(BULLET, style.size) + font_for(false).space_width * style.size
        } else {
            0.0
        };
        let text_x = geometry.margin + style.indent + bullet_width;
        let available = geometry.content_width() - style.indent - bullet_width;

        if cursor < top {
            cursor -= style.space_before;
        }

        for (line_no, runs) in wrap(&words(block), style.size, available).into_iter().enumerate() {
            let mut baseline = cursor - style.size;
            if baseline < geometry.margin {
                pages.push(std::mem::take(&mut page));
                cursor = top;
                baseline = cursor - style.size;
            }

            if style.bullet && line_no == 0 {
                page.lines.push(PlacedLine {
                    x: geometry.margin + style.indent,
                    y: baseline,
                    size: style.size,
                    runs: vec![TextRun {
                        text: BULLET.to_string(),
                        bold: false,
                    }],
                });
            }
            page.lines.push(PlacedLine {
                x: text_x,
                y: baseline,
                size: style.size,
                runs,
            });
            cursor -= style.size * LINE_HEIGHT;
        }
    }

    pages.push(page);
    pages
}
