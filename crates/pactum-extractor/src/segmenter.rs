//! Segmentation of document elements into size-bounded chunks
//!
//! Elements are packed greedily in reading order. Prose may be split on word
//! boundaries and carries a small overlap into the next chunk; tables are
//! never split mid-row and never repeated as overlap.

use pactum_domain::{DocumentElement, TableMeta};
use std::mem;
use tracing::{debug, warn};

/// Position of a chunk within a split table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartMarker {
    /// One-based part number
    pub part: usize,
    /// Total number of parts
    pub of: usize,
}

/// A bounded, order-preserving slice of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Text sent to the reasoning service
    pub text: String,

    /// Set when the chunk is one part of a split table
    pub part: Option<PartMarker>,

    /// Whether any table content is in the chunk
    pub has_table: bool,
}

impl Chunk {
    fn prose(text: String) -> Self {
        Self {
            text,
            part: None,
            has_table: false,
        }
    }

    /// Character length of the chunk text
    pub fn size(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    size: usize,
    is_table: bool,
}

impl Fragment {
    fn new(text: impl Into<String>, is_table: bool) -> Self {
        let text = text.into();
        let size = text.chars().count();
        Self {
            text,
            size,
            is_table,
        }
    }
}

// Size of fragments joined with a single newline
fn joined_size(fragments: &[Fragment]) -> usize {
    fragments.iter().map(|f| f.size).sum::<usize>() + fragments.len().saturating_sub(1)
}

#[derive(Debug, Default)]
struct Buffer {
    fragments: Vec<Fragment>,
    size: usize,
}

impl Buffer {
    fn size_with(&self, extra: usize) -> usize {
        if self.fragments.is_empty() {
            extra
        } else {
            self.size + 1 + extra
        }
    }

    fn push(&mut self, fragment: Fragment) {
        self.size = self.size_with(fragment.size);
        self.fragments.push(fragment);
    }

    fn has_table(&self) -> bool {
        self.fragments.iter().any(|f| f.is_table)
    }

    fn take(&mut self) -> Vec<Fragment> {
        self.size = 0;
        mem::take(&mut self.fragments)
    }
}

/// Splits documents into chunks that fit the reasoning service's context
///
/// # Examples
///
/// ```
/// use pactum_domain::DocumentElement;
/// use pactum_extractor::Segmenter;
///
/// let elements = vec![
///     DocumentElement::text("Договор оказания услуг."),
///     DocumentElement::text("Цена договора 10 000 рублей."),
/// ];
/// let chunks = Segmenter::new(1000, 1500, 200).segment(&elements);
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].text, "Договор оказания услуг.\nЦена договора 10 000 рублей.");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    max_chunk_size: usize,
    max_table_chunk_size: usize,
    overlap_size: usize,
}

impl Segmenter {
    /// Create a segmenter; sizes are in characters
    ///
    /// Budgets below one character are raised to one.
    pub fn new(max_chunk_size: usize, max_table_chunk_size: usize, overlap_size: usize) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
            max_table_chunk_size: max_table_chunk_size.max(1),
            overlap_size,
        }
    }

    /// Budget that applies to a chunk
    pub fn budget_for(&self, chunk: &Chunk) -> usize {
        if chunk.has_table {
            self.max_table_chunk_size
        } else {
            self.max_chunk_size
        }
    }

    /// Segment elements into chunks, preserving reading order
    ///
    /// An empty element list yields a single empty chunk.
    pub fn segment(&self, elements: &[DocumentElement]) -> Vec<Chunk> {
        let total = elements.iter().map(DocumentElement::size).sum::<usize>()
            + elements.len().saturating_sub(1);

        if total <= self.max_chunk_size {
            let text = elements
                .iter()
                .map(|e| e.content.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            return vec![Chunk {
                text,
                part: None,
                has_table: elements.iter().any(DocumentElement::is_table),
            }];
        }

        let mut chunks = Vec::new();
        let mut buffer = Buffer::default();

        for element in elements {
            let size = element.size();

            if element.is_table() {
                if size > self.max_table_chunk_size {
                    self.flush(&mut buffer, &mut chunks);
                    chunks.extend(self.split_table(element));
                } else {
                    if buffer.size_with(size) > self.max_table_chunk_size {
                        self.flush(&mut buffer, &mut chunks);
                    }
                    buffer.push(Fragment::new(element.content.as_str(), true));
                }
                continue;
            }

            let budget = if buffer.has_table() {
                self.max_table_chunk_size
            } else {
                self.max_chunk_size
            };

            if size > self.max_chunk_size {
                self.flush(&mut buffer, &mut chunks);
                let mut pieces = self.split_text(&element.content);
                if let Some(last) = pieces.pop() {
                    chunks.extend(pieces.into_iter().map(Chunk::prose));
                    buffer.push(Fragment::new(last, false));
                }
            } else if buffer.size_with(size) <= budget {
                buffer.push(Fragment::new(element.content.as_str(), false));
            } else {
                let flushed = self.flush(&mut buffer, &mut chunks);
                let mut carry = overlap_tail(&flushed, self.overlap_size);
                while !carry.is_empty() && joined_size(&carry) + 1 + size > self.max_chunk_size {
                    carry.remove(0);
                }
                for fragment in carry {
                    buffer.push(fragment);
                }
                buffer.push(Fragment::new(element.content.as_str(), false));
            }
        }

        self.flush(&mut buffer, &mut chunks);

        debug!(
            "Segmented {} elements ({} chars) into {} chunks",
            elements.len(),
            total,
            chunks.len()
        );
        chunks
    }

    fn flush(&self, buffer: &mut Buffer, chunks: &mut Vec<Chunk>) -> Vec<Fragment> {
        let fragments = buffer.take();
        if !fragments.is_empty() {
            chunks.push(Chunk {
                text: fragments
                    .iter()
                    .map(|f| f.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
                part: None,
                has_table: fragments.iter().any(|f| f.is_table),
            });
        }
        fragments
    }

    /// Split prose on word boundaries into pieces of at most `max_chunk_size`
    ///
    /// Each piece after the first starts with the trailing words of the
    /// previous one, up to `overlap_size` characters.
    fn split_text(&self, content: &str) -> Vec<String> {
        let max = self.max_chunk_size;
        let words: Vec<(String, usize)> = content
            .split_whitespace()
            .flat_map(|word| hard_split(word, max))
            .map(|word| {
                let size = word.chars().count();
                (word, size)
            })
            .collect();

        let mut pieces = Vec::new();
        let mut current: Vec<(String, usize)> = Vec::new();
        let mut current_size = 0;

        for (word, size) in words {
            let candidate = if current.is_empty() {
                size
            } else {
                current_size + 1 + size
            };
            if candidate <= max {
                current.push((word, size));
                current_size = candidate;
                continue;
            }

            pieces.push(join_words(&current));

            let mut carry = trailing_words(&current, self.overlap_size);
            while !carry.is_empty() && words_size(&carry) + 1 + size > max {
                carry.remove(0);
            }
            current = carry;
            current_size = words_size(&current);
            current_size = if current.is_empty() {
                size
            } else {
                current_size + 1 + size
            };
            current.push((word, size));
        }

        if !current.is_empty() {
            pieces.push(join_words(&current));
        }
        pieces
    }

    /// Split an oversized table into parts that each repeat the title and header
    fn split_table(&self, element: &DocumentElement) -> Vec<Chunk> {
        let layout = TableLayout::parse(&element.content, element.table_meta);

        if layout.rows.is_empty() {
            warn!(
                "Table of {} chars has no data rows to split on, keeping it whole",
                element.size()
            );
            return vec![Chunk {
                text: element.content.clone(),
                part: None,
                has_table: true,
            }];
        }

        // Reserve room for the widest possible "(part N of M)" suffix
        let bound = layout.rows.len();
        let head_size = layout.render(&[], bound, bound).chars().count();
        let budget = self.max_table_chunk_size;

        let head_over = head_size > budget;
        if head_over {
            warn!(
                "Table title and header of {} chars exceed the table budget of {}, emitting one row per part",
                head_size, budget
            );
        }

        let mut groups: Vec<Vec<&str>> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_size = head_size;

        for row in &layout.rows {
            let row_size = row.chars().count();
            if !current.is_empty() && current_size + 1 + row_size > budget {
                groups.push(mem::take(&mut current));
                current_size = head_size;
            }
            if current.is_empty() && !head_over && head_size + 1 + row_size > budget {
                warn!(
                    "Table row of {} chars exceeds the table budget of {}, emitting it alone",
                    row_size, budget
                );
            }
            current.push(row.as_str());
            current_size += 1 + row_size;
        }
        if !current.is_empty() {
            groups.push(current);
        }

        let total = groups.len();
        debug!(
            "Split table of {} rows into {} parts",
            layout.rows.len(),
            total
        );

        groups
            .iter()
            .enumerate()
            .map(|(i, rows)| Chunk {
                text: layout.render(rows, i + 1, total),
                part: Some(PartMarker {
                    part: i + 1,
                    of: total,
                }),
                has_table: true,
            })
            .collect()
    }
}

/// Segment elements and return only the chunk texts
pub fn segment(
    elements: &[DocumentElement],
    max_chunk_size: usize,
    max_table_chunk_size: usize,
    overlap_size: usize,
) -> Vec<String> {
    Segmenter::new(max_chunk_size, max_table_chunk_size, overlap_size)
        .segment(elements)
        .into_iter()
        .map(|chunk| chunk.text)
        .collect()
}

// Trailing prose fragments whose joined size stays within the overlap
fn overlap_tail(fragments: &[Fragment], overlap: usize) -> Vec<Fragment> {
    let mut tail = Vec::new();
    let mut size = 0;
    for fragment in fragments.iter().rev() {
        if fragment.is_table {
            break;
        }
        let next = if tail.is_empty() {
            fragment.size
        } else {
            size + 1 + fragment.size
        };
        if next > overlap {
            break;
        }
        size = next;
        tail.push(fragment.clone());
    }
    tail.reverse();
    tail
}

fn hard_split(word: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

fn words_size(words: &[(String, usize)]) -> usize {
    words.iter().map(|(_, size)| size).sum::<usize>() + words.len().saturating_sub(1)
}

fn join_words(words: &[(String, usize)]) -> String {
    words
        .iter()
        .map(|(word, _)| word.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn trailing_words(words: &[(String, usize)], overlap: usize) -> Vec<(String, usize)> {
    let mut tail = Vec::new();
    let mut size = 0;
    for (word, word_size) in words.iter().rev() {
        let next = if tail.is_empty() {
            *word_size
        } else {
            size + 1 + word_size
        };
        if next > overlap {
            break;
        }
        size = next;
        tail.push((word.clone(), *word_size));
    }
    tail.reverse();
    tail
}

/// A markdown table broken into the pieces each part repeats
#[derive(Debug)]
struct TableLayout {
    /// Lines above the grid; the first one carries the part suffix
    preamble: Vec<String>,
    header: Option<String>,
    separator: Option<String>,
    rows: Vec<String>,
}

impl TableLayout {
    fn parse(content: &str, meta: Option<TableMeta>) -> Self {
        let lines: Vec<&str> = content.lines().collect();
        let header_idx = lines.iter().position(|l| l.trim_start().starts_with('|'));

        let default_title = match meta {
            Some(meta) => format!("## Table {}", meta.index + 1),
            None => "## Table".to_string(),
        };

        let Some(header_idx) = header_idx else {
            // No markdown grid: first line is the title, the rest are rows
            let mut non_empty = lines.iter().filter(|l| !l.trim().is_empty());
            let title = non_empty
                .next()
                .map(|l| l.to_string())
                .unwrap_or(default_title);
            return Self {
                preamble: vec![title],
                header: None,
                separator: None,
                rows: non_empty.map(|l| l.to_string()).collect(),
            };
        };

        let above = &lines[..header_idx];
        let first = above.iter().position(|l| !l.trim().is_empty());
        let last = above.iter().rposition(|l| !l.trim().is_empty());
        let preamble = match (first, last) {
            (Some(first), Some(last)) => above[first..=last]
                .iter()
                .map(|l| l.to_string())
                .collect(),
            _ => vec![default_title],
        };

        let header = Some(lines[header_idx].to_string());
        let mut rest = lines[header_idx + 1..].iter().peekable();
        let separator = rest
            .next_if(|l| is_separator_row(l))
            .map(|l| l.to_string());
        let rows = rest
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.to_string())
            .collect();

        Self {
            preamble,
            header,
            separator,
            rows,
        }
    }

    fn render(&self, rows: &[&str], part: usize, of: usize) -> String {
        let mut lines = Vec::with_capacity(self.preamble.len() + rows.len() + 3);
        for (i, line) in self.preamble.iter().enumerate() {
            if i == 0 {
                lines.push(format!("{} (part {} of {})", line, part, of));
            } else {
                lines.push(line.clone());
            }
        }
        lines.push(String::new());
        lines.extend(self.header.iter().cloned());
        lines.extend(self.separator.iter().cloned());
        lines.extend(rows.iter().map(|r| r.to_string()));
        lines.join("\n")
    }
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}
