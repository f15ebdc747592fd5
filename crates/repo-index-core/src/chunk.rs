//! Structure-aware, token-budgeted chunker.
//!
//! Turns one file's text into an ordered list of [`Chunk`]s. Structure comes
//! from a pluggable [`SpanProvider`]; the chunker itself never parses a
//! language, so any parser (or none, see [`NoStructure`]) can drive it.
//!
//! # Algorithm
//!
//! 1. Clamp spans to the file and expand each start upward over leading
//!    comment/attribute lines (stopping at a blank line).
//! 2. The header region (everything before the first span, or the whole file
//!    when there are no spans) becomes the file-summary chunk(s), capped at
//!    `file_summary_max_chars` whole lines.
//! 3. Every span, and every run of lines covered by neither the header nor a
//!    span, is windowed: lines are accumulated until the estimated token cost
//!    would exceed `max_tokens_per_chunk`, then the window is emitted and the
//!    cursor steps back `overlap_lines` (but always strictly forward).
//! 4. A single line over budget is cut into character slices of roughly
//!    `3 × max_tokens` characters, preferring a whitespace or punctuation
//!    boundary within the last 80 characters of each slice.
//!
//! Nested spans each produce their own chunks; the duplicated coverage is
//! intended.
//!
//! # Example
//!
//! ```rust
//! use repo_index_core::chunk::{Chunker, ChunkerConfig};
//! use repo_index_core::models::Span;
//!
//! let text = "use std::io;\n\n/// Adds.\nfn add() {}\n";
//! let spans = vec![Span::new("add", "method", 4, 4)];
//! let chunks = Chunker::new(ChunkerConfig::default()).chunk("/p/lib.rs", text, &spans);
//! assert_eq!(chunks[0].kind, "file");
//! assert_eq!(chunks[1].symbol.as_deref(), Some("add"));
//! assert_eq!(chunks[1].start_line, 3);
//! ```

use sha2::{Digest, Sha256};

use crate::models::{Chunk, Span};

/// Kind assigned to header and gap chunks.
pub const FILE_KIND: &str = "file";

/// How far back from a slice's hard end to look for a soft break.
const SOFT_BREAK_SCAN: usize = 80;

/// Floor for the slice width, so tiny budgets still make progress in
/// reasonably sized pieces.
const MIN_SLICE_CHARS: usize = 64;

/// Source of structural spans for a file. Implementations must be pure.
pub trait SpanProvider: Send + Sync {
    /// Ordered spans for `text`; `path` is a hint for language selection.
    fn spans(&self, path: &str, text: &str) -> Vec<Span>;
}

/// Provider for files with no known structure: the whole file is windowed as
/// summary plus gap chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStructure;

impl SpanProvider for NoStructure {
    fn spans(&self, _path: &str, _text: &str) -> Vec<Span> {
        Vec::new()
    }
}

/// Chunking limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub max_tokens_per_chunk: usize,
    pub overlap_lines: usize,
    pub file_summary_max_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: 6500,
            overlap_lines: 6,
            file_summary_max_chars: 32767,
        }
    }
}

/// Rough token cost of one line: `max(bytes / 4, words) + 1`.
pub fn estimate_line_tokens(line: &str) -> usize {
    let by_bytes = line.len() / 4;
    let by_words = line.split_whitespace().count();
    by_bytes.max(by_words) + 1
}

/// A region of the file to be windowed, 1-based inclusive.
struct Region<'a> {
    start: usize,
    end: usize,
    kind: &'a str,
    symbol: Option<&'a str>,
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(mut config: ChunkerConfig) -> Self {
        config.max_tokens_per_chunk = config.max_tokens_per_chunk.max(1);
        Self { config }
    }

    /// Chunk `text` using spans from `provider`.
    pub fn chunk_with(&self, path: &str, text: &str, provider: &dyn SpanProvider) -> Vec<Chunk> {
        let spans = provider.spans(path, text);
        self.chunk(path, text, &spans)
    }

    /// Chunk `text` using an explicit span list. Spans need not be sorted or
    /// in range; out-of-range lines are clamped and empty spans dropped.
    pub fn chunk(&self, path: &str, text: &str, spans: &[Span]) -> Vec<Chunk> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }
        let line_count = lines.len();

        let mut spans: Vec<Region<'_>> = spans
            .iter()
            .filter_map(|s| {
                let start = s.start_line.max(1);
                let end = s.end_line.min(line_count);
                if start > end {
                    return None;
                }
                Some(Region {
                    start: expand_leading_trivia(&lines, start),
                    end,
                    kind: s.kind.as_str(),
                    symbol: Some(s.name.as_str()).filter(|n| !n.trim().is_empty()),
                })
            })
            .collect();
        spans.sort_by_key(|r| r.start);

        let header_end = spans.first().map_or(line_count, |r| r.start - 1);
        let header_end = self.cap_header(&lines, header_end);

        let mut covered = vec![false; line_count + 1];
        for line in 1..=header_end {
            covered[line] = true;
        }
        for region in &spans {
            for line in region.start..=region.end {
                covered[line] = true;
            }
        }

        let mut body: Vec<Region<'_>> = spans;
        let mut line = 1;
        while line <= line_count {
            if covered[line] {
                line += 1;
                continue;
            }
            let start = line;
            while line <= line_count && !covered[line] {
                line += 1;
            }
            body.push(Region {
                start,
                end: line - 1,
                kind: FILE_KIND,
                symbol: None,
            });
        }
        body.sort_by_key(|r| r.start);

        let mut out = Vec::new();
        if header_end > 0 {
            let header = Region {
                start: 1,
                end: header_end,
                kind: FILE_KIND,
                symbol: file_name(path),
            };
            self.window(path, &lines, &header, &mut out);
        }
        for region in &body {
            self.window(path, &lines, region, &mut out);
        }
        for (i, chunk) in out.iter_mut().enumerate() {
            chunk.chunk_index = i;
        }
        out
    }

    /// Last header line that keeps the summary within the character ceiling.
    fn cap_header(&self, lines: &[&str], header_end: usize) -> usize {
        let mut chars = 0usize;
        for (i, line) in lines.iter().take(header_end).enumerate() {
            chars += line.chars().count() + 1;
            if chars > self.config.file_summary_max_chars {
                return i;
            }
        }
        header_end
    }

    fn window(&self, path: &str, lines: &[&str], region: &Region<'_>, out: &mut Vec<Chunk>) {
        let max_tokens = self.config.max_tokens_per_chunk;
        let mut cursor = region.start;
        // exclusive end of the furthest window emitted so far
        let mut emitted_to = region.start;

        while cursor <= region.end {
            let line = lines[cursor - 1];
            if estimate_line_tokens(line) > max_tokens {
                for slice in slice_line(line, self.slice_chars()) {
                    out.push(make_chunk(path, slice.to_string(), cursor, cursor, region));
                }
                cursor += 1;
                emitted_to = emitted_to.max(cursor);
                continue;
            }

            let mut total = 0usize;
            let mut local_end = cursor;
            while local_end <= region.end {
                let cost = estimate_line_tokens(lines[local_end - 1]);
                if total + cost > max_tokens {
                    break;
                }
                total += cost;
                local_end += 1;
            }

            if local_end > emitted_to {
                let text = lines[cursor - 1..local_end - 1].join("\n");
                let mut chunk = make_chunk(path, text, cursor, local_end - 1, region);
                chunk.estimated_tokens = total;
                out.push(chunk);
                emitted_to = local_end;
            }
            if local_end > region.end {
                break;
            }

            let next = local_end.saturating_sub(self.config.overlap_lines);
            cursor = if next <= cursor { local_end } else { next };
        }
    }

    fn slice_chars(&self) -> usize {
        self.config
            .max_tokens_per_chunk
            .saturating_mul(3)
            .max(MIN_SLICE_CHARS)
    }
}

/// Walk upward from `start` over comment and attribute lines.
fn expand_leading_trivia(lines: &[&str], start: usize) -> usize {
    let mut first = start;
    while first > 1 && is_leading_trivia(lines[first - 2]) {
        first -= 1;
    }
    first
}

fn is_leading_trivia(line: &str) -> bool {
    let t = line.trim();
    if t.is_empty() {
        return false;
    }
    const PREFIXES: [&str; 7] = ["//", "#", "/*", "*", "--", "@", "'''"];
    PREFIXES.iter().any(|p| t.starts_with(p)) || (t.starts_with('[') && t.ends_with(']'))
}

/// Cut `line` into pieces of at most `width` characters whose concatenation
/// is exactly `line`.
fn slice_line(line: &str, width: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = line;
    while !rest.is_empty() {
        let Some((hard_cut, _)) = rest.char_indices().nth(width) else {
            out.push(rest);
            break;
        };
        let cut = soft_break(&rest[..hard_cut]).unwrap_or(hard_cut);
        out.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    out
}

/// Byte offset just past the last break character within the final
/// [`SOFT_BREAK_SCAN`] characters of `head`.
fn soft_break(head: &str) -> Option<usize> {
    head.char_indices()
        .rev()
        .take(SOFT_BREAK_SCAN)
        .find(|(_, c)| c.is_whitespace() || matches!(c, ',' | ';' | ')' | ']' | '}'))
        .map(|(i, c)| i + c.len_utf8())
}

fn file_name(path: &str) -> Option<&str> {
    path.rsplit(|c| c == '/' || c == '\\').next().filter(|n| !n.is_empty())
}

fn make_chunk(
    path: &str,
    text: String,
    start_line: usize,
    end_line: usize,
    region: &Region<'_>,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    let estimated_tokens = estimate_line_tokens(&text);
    Chunk {
        text,
        path: path.to_string(),
        start_line,
        end_line,
        kind: region.kind.to_string(),
        symbol: region.symbol.map(str::to_string),
        estimated_tokens,
        chunk_index: 0,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunker(max_tokens: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            max_tokens_per_chunk: max_tokens,
            overlap_lines: overlap,
            file_summary_max_chars: 32767,
        })
    }

    fn numbered(n: usize) -> String {
        (1..=n)
            .map(|i| format!("line {}", i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn assert_covers(chunks: &[Chunk], line_count: usize) {
        let mut seen = vec![false; line_count + 1];
        for c in chunks {
            assert!(c.start_line >= 1);
            assert!(c.start_line <= c.end_line, "{:?}", c);
            assert!(c.end_line <= line_count);
            for l in c.start_line..=c.end_line {
                seen[l] = true;
            }
        }
        for (l, hit) in seen.iter().enumerate().skip(1) {
            assert!(hit, "line {} not covered", l);
        }
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunker(100, 2).chunk("/p/a", "", &[]).is_empty());
    }

    #[test]
    fn estimate_uses_bytes_or_words() {
        assert_eq!(estimate_line_tokens(""), 1);
        assert_eq!(estimate_line_tokens("a b c d e"), 6);
        assert_eq!(estimate_line_tokens(&"x".repeat(40)), 11);
    }

    #[test]
    fn small_file_without_spans_is_one_summary_chunk() {
        let text = "fn main() {\n    println!(\"hi\");\n}\n";
        let chunks = chunker(6500, 6).chunk("/p/src/main.rs", text, &[]);
        assert_eq!(chunks.len(), 1);
        let c = &chunks[0];
        assert_eq!((c.start_line, c.end_line), (1, 3));
        assert_eq!(c.kind, FILE_KIND);
        assert_eq!(c.symbol.as_deref(), Some("main.rs"));
        assert_eq!(c.text, "fn main() {\n    println!(\"hi\");\n}");
        assert_eq!(c.hash.len(), 64);
    }

    #[test]
    fn windows_overlap_and_cover_every_line() {
        let text = numbered(50);
        // "line N" costs 3 tokens, so 4 lines per window
        let chunks = chunker(12, 1).chunk("/p/a.txt", &text, &[]);
        assert_covers(&chunks, 50);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 4));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (4, 7));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
        }
    }

    #[test]
    fn terminates_when_overlap_exceeds_window() {
        let text = numbered(200);
        let chunks = chunker(6, 1000).chunk("/p/a.txt", &text, &[]);
        assert_covers(&chunks, 200);
        assert!(chunks.len() <= 200, "got {} chunks", chunks.len());
        for pair in chunks.windows(2) {
            assert!(pair[1].start_line > pair[0].start_line);
        }
    }

    #[test]
    fn terminates_with_tiny_budget() {
        let text = numbered(30);
        let chunks = chunker(0, 5).chunk("/p/a.txt", &text, &[]);
        assert_covers(&chunks, 30);
        // every line is over budget and fits in one slice
        assert_eq!(chunks.len(), 30);
        assert!(chunks.iter().all(|c| c.start_line == c.end_line));
    }

    #[test]
    fn oversized_line_slices_reconstruct_exactly() {
        let long: String = (0..400)
            .map(|i| format!("tok{}, ", i))
            .collect::<String>();
        let text = format!("short\n{}\nafter", long);
        let chunks = chunker(20, 0).chunk("/p/a.min.js", &text, &[]);
        assert_covers(&chunks, 3);

        let slices: Vec<&Chunk> = chunks.iter().filter(|c| c.start_line == 2).collect();
        assert!(slices.len() > 1);
        assert!(slices.iter().all(|c| c.end_line == 2));
        let rebuilt: String = slices.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, long);
        for s in &slices {
            assert!(s.text.chars().count() <= 64);
        }
    }

    #[test]
    fn slicing_respects_char_boundaries() {
        let line = "é".repeat(500);
        let pieces = slice_line(&line, 64);
        assert_eq!(pieces.concat(), line);
        assert!(pieces.iter().all(|p| p.chars().count() <= 64));
    }

    #[test]
    fn soft_break_prefers_punctuation() {
        let line = format!("{};{}", "a".repeat(60), "b".repeat(60));
        let pieces = slice_line(&line, 64);
        assert_eq!(pieces[0], format!("{};", "a".repeat(60)));
        assert_eq!(pieces.concat(), line);
    }

    #[test]
    fn spans_expand_over_leading_trivia() {
        let text = "use a;\n\n/// Docs.\n#[inline]\nfn f() {\n}\n";
        let spans = vec![Span::new("f", "method", 5, 6)];
        let chunks = chunker(6500, 0).chunk("/p/lib.rs", text, &spans);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, FILE_KIND);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 2));
        assert_eq!(chunks[1].kind, "method");
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (3, 6));
        assert!(chunks[1].text.starts_with("/// Docs."));
    }

    #[test]
    fn nested_spans_each_produce_chunks_in_order() {
        let text = "header\nstruct S {\n  a\n}\nimpl S {\n  fn m() {}\n}\ntrailer";
        let spans = vec![
            Span::new("S", "type", 5, 7),
            Span::new("m", "method", 6, 6),
            Span::new("S", "type", 2, 4),
        ];
        let chunks = chunker(6500, 0).chunk("/p/s.rs", text, &spans);
        let got: Vec<(usize, usize, &str)> = chunks
            .iter()
            .map(|c| (c.start_line, c.end_line, c.kind.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (1, 1, "file"),
                (2, 4, "type"),
                (5, 7, "type"),
                (6, 6, "method"),
                (8, 8, "file"),
            ]
        );
        assert_covers(&chunks, 8);
    }

    #[test]
    fn out_of_range_spans_are_clamped_or_dropped() {
        let text = numbered(5);
        let spans = vec![
            Span::new("x", "type", 0, 99),
            Span::new("gone", "type", 10, 12),
            Span::new("bad", "type", 4, 2),
        ];
        let chunks = chunker(6500, 0).chunk("/p/a", &text, &spans);
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 5));
        assert_eq!(chunks[0].symbol.as_deref(), Some("x"));
    }

    #[test]
    fn summary_is_capped_and_rest_is_gap_covered() {
        let text = numbered(20);
        let chunker = Chunker::new(ChunkerConfig {
            max_tokens_per_chunk: 6500,
            overlap_lines: 0,
            file_summary_max_chars: 30,
        });
        let chunks = chunker.chunk("/p/a", &text, &[]);
        assert_eq!(chunks[0].end_line, 4);
        assert_eq!(chunks[0].symbol.as_deref(), Some("a"));
        assert_eq!(chunks[1].symbol, None);
        assert_covers(&chunks, 20);
    }

    #[test]
    fn chunk_with_uses_provider() {
        struct Fixed;
        impl SpanProvider for Fixed {
            fn spans(&self, _path: &str, _text: &str) -> Vec<Span> {
                vec![Span::new("b", "field", 2, 2)]
            }
        }
        let chunks = chunker(6500, 0).chunk_with("/p/a", "a\nb\nc", &Fixed);
        let kinds: Vec<&str> = chunks.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["file", "field", "file"]);

        let plain = chunker(6500, 0).chunk_with("/p/a", "a\nb\nc", &NoStructure);
        assert_eq!(plain.len(), 1);
    }
}
