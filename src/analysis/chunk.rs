//! Token-bounded chunk building
//!
//! Files are packed greedily, in order, into chunks that fit a token budget.
//! A file too large for any chunk is split by lines into numbered parts.

use super::digest::FileRecord;
use super::tokens::{estimate_tokens, estimate_tokens_from_chars};
use tracing::{debug, info};

/// Rule printed under every file header inside a chunk.
pub const CHUNK_RULE: &str = "====================";

/// What a chunk carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkKind {
    /// One or more whole files.
    Files { paths: Vec<String> },
    /// One numbered part (1-based) of a file that exceeded the budget.
    Part { path: String, part: usize },
}

/// One batch of text sent to the model during the map phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Tokens accounted for this chunk while packing.
    pub tokens: usize,
    pub kind: ChunkKind,
}

const FILE_JOINER: &str = "\n\n";

fn render_file(file: &FileRecord) -> String {
    format!("File: {}\n{}\n{}", file.path, CHUNK_RULE, file.content)
}

fn part_header(path: &str, part: usize) -> String {
    format!("File: {} (Part {})\n{}\n", path, part, CHUNK_RULE)
}

/// Rendered files waiting to be emitted as one chunk.
///
/// Accounting runs on the character count of the joined text, so the
/// estimate for a flushed chunk equals `estimate_tokens(&chunk.text)`.
#[derive(Default)]
struct FileBuffer {
    entries: Vec<String>,
    paths: Vec<String>,
    chars: usize,
}

impl FileBuffer {
    /// Characters the buffer would hold after appending `rendered`.
    fn chars_with(&self, rendered: &str) -> usize {
        let joiner = if self.entries.is_empty() {
            0
        } else {
            FILE_JOINER.len()
        };
        self.chars + joiner + rendered.chars().count()
    }

    fn push(&mut self, path: &str, rendered: String) {
        self.chars = self.chars_with(&rendered);
        self.entries.push(rendered);
        self.paths.push(path.to_string());
    }

    fn flush_into(&mut self, chunks: &mut Vec<Chunk>) {
        if self.entries.is_empty() {
            return;
        }
        let buffer = std::mem::take(self);
        chunks.push(Chunk {
            text: buffer.entries.join(FILE_JOINER),
            tokens: estimate_tokens_from_chars(buffer.chars),
            kind: ChunkKind::Files {
                paths: buffer.paths,
            },
        });
    }
}

/// Split an oversized file into line-bounded parts.
///
/// A single line larger than the whole budget still gets a part of its own;
/// lines are never broken.
fn split_file(file: &FileRecord, max_tokens: usize, chunks: &mut Vec<Chunk>) {
    info!(
        "File '{}' is too large ({} tokens), splitting into parts",
        file.path, file.tokens
    );

    let mut part = 1;
    let mut header = part_header(&file.path, part);
    let mut header_tokens = estimate_tokens(&header);
    let mut lines: Vec<&str> = Vec::new();
    let mut part_tokens = 0;

    for line in file.content.split('\n') {
        // +1 for the newline
        let line_tokens = estimate_tokens(line) + 1;

        if !lines.is_empty() && part_tokens + line_tokens + header_tokens > max_tokens {
            chunks.push(Chunk {
                text: format!("{}{}", header, lines.join("\n")),
                tokens: header_tokens + part_tokens,
                kind: ChunkKind::Part {
                    path: file.path.clone(),
                    part,
                },
            });

            part += 1;
            header = part_header(&file.path, part);
            header_tokens = estimate_tokens(&header);
            lines.clear();
            part_tokens = 0;
        }

        lines.push(line);
        part_tokens += line_tokens;
    }

    if !lines.is_empty() {
        chunks.push(Chunk {
            text: format!("{}{}", header, lines.join("\n")),
            tokens: header_tokens + part_tokens,
            kind: ChunkKind::Part {
                path: file.path.clone(),
                part,
            },
        });
    }
}

/// Group `files` into chunks of at most `max_tokens` estimated tokens.
///
/// First-fit in input order: a file that does not fit closes the current
/// chunk. Leftover small chunks are not re-packed.
pub fn build_chunks(files: &[FileRecord], max_tokens: usize) -> Vec<Chunk> {
    let max_tokens = max_tokens.max(1);
    let mut chunks = Vec::new();
    let mut buffer = FileBuffer::default();

    for file in files {
        let rendered = render_file(file);

        if estimate_tokens_from_chars(buffer.chars_with(&rendered)) <= max_tokens {
            buffer.push(&file.path, rendered);
            continue;
        }

        buffer.flush_into(&mut chunks);

        if estimate_tokens(&rendered) > max_tokens {
            split_file(file, max_tokens, &mut chunks);
        } else {
            buffer.push(&file.path, rendered);
        }
    }

    buffer.flush_into(&mut chunks);

    debug!(
        "Chunk sizes (tokens): {:?}",
        chunks.iter().map(|c| c.tokens).collect::<Vec<_>>()
    );
    info!("Created {} chunks from {} files", chunks.len(), files.len());
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Strip chunk headers back off, returning (path, content) pieces in order.
    fn deheader(chunk: &Chunk) -> Vec<(String, String)> {
        match &chunk.kind {
            ChunkKind::Part { path, part } => {
                let header = part_header(path, *part);
                let body = chunk.text.strip_prefix(&header).expect("part header");
                vec![(path.clone(), body.to_string())]
            }
            ChunkKind::Files { paths } => {
                let mut out = Vec::new();
                let mut rest = chunk.text.as_str();
                for (i, path) in paths.iter().enumerate() {
                    let header = format!("File: {}\n{}\n", path, CHUNK_RULE);
                    rest = rest.strip_prefix(&header).expect("file header");
                    let end = match paths.get(i + 1) {
                        Some(next) => rest
                            .find(&format!("\n\nFile: {}\n{}\n", next, CHUNK_RULE))
                            .expect("next header"),
                        None => rest.len(),
                    };
                    out.push((path.clone(), rest[..end].to_string()));
                    rest = rest[end..].trim_start_matches("\n\n");
                }
                out
            }
        }
    }

    fn file_with_tokens(path: &str, tokens: usize) -> FileRecord {
        let file = FileRecord::new(path, "x".repeat(tokens * 4));
        assert_eq!(file.tokens, tokens);
        file
    }

    #[test]
    fn test_two_files_over_budget_go_to_separate_chunks() {
        // Each renders to 72 chars (18 tokens), together 146 chars (36 tokens)
        let files = vec![file_with_tokens("a.py", 10), file_with_tokens("b.py", 10)];

        let chunks = build_chunks(&files, 25);
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].kind,
            ChunkKind::Files {
                paths: vec!["a.py".to_string()]
            }
        );
        assert_eq!(
            chunks[1].kind,
            ChunkKind::Files {
                paths: vec!["b.py".to_string()]
            }
        );
        assert!(chunks[0].text.starts_with("File: a.py\n===================="));
    }

    #[test]
    fn test_small_files_share_a_chunk() {
        let files = vec![
            file_with_tokens("a.py", 3),
            file_with_tokens("b.py", 3),
            file_with_tokens("c.py", 3),
        ];

        let chunks = build_chunks(&files, 40);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].tokens, 34);
        assert_eq!(chunks[0].tokens, estimate_tokens(&chunks[0].text));
        assert!(chunks[0].text.contains("\n\nFile: b.py\n"));
    }

    #[test]
    fn test_exact_fit_stays_in_chunk() {
        // 52 + 2 + 52 chars once rendered and joined
        let files = vec![file_with_tokens("a.py", 5), file_with_tokens("b.py", 5)];

        assert_eq!(build_chunks(&files, 26).len(), 1);
        assert_eq!(build_chunks(&files, 25).len(), 2);
    }

    #[test]
    fn test_headers_count_against_the_budget() {
        let files: Vec<FileRecord> = (0..500)
            .map(|i| FileRecord::new(format!("pkg/module_{}/__init__.py", i), ""))
            .collect();

        let chunks = build_chunks(&files, 100);
        assert!(chunks.len() > 1);

        let mut paths = Vec::new();
        for chunk in &chunks {
            let ChunkKind::Files { paths: chunk_paths } = &chunk.kind else {
                panic!("expected a files chunk, got {:?}", chunk.kind);
            };
            assert!(estimate_tokens(&chunk.text) <= 100, "{}", chunk.text);
            assert_eq!(chunk.tokens, estimate_tokens(&chunk.text));
            paths.extend(chunk_paths.iter().cloned());
        }
        let expected: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_packed_chunks_stay_within_budget() {
        let files: Vec<FileRecord> = (0..60)
            .map(|i| FileRecord::new(format!("src/f{}.rs", i), "x".repeat(i * 7 % 90)))
            .collect();

        for max in [40, 64, 150] {
            for chunk in build_chunks(&files, max) {
                if matches!(chunk.kind, ChunkKind::Files { .. }) {
                    assert!(estimate_tokens(&chunk.text) <= max);
                }
            }
        }
    }

    #[test]
    fn test_oversized_file_is_split_into_numbered_parts() {
        let content: Vec<String> = (0..50).map(|i| format!("line {:02}", i)).collect();
        let file = FileRecord::new("big.py", content.join("\n"));
        assert!(file.tokens > 10);

        let chunks = build_chunks(std::slice::from_ref(&file), 10);
        assert!(chunks.len() > 1);

        let mut recovered = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            match &chunk.kind {
                ChunkKind::Part { path, part } => {
                    assert_eq!(path, "big.py");
                    assert_eq!(*part, i + 1);
                    assert!(chunk
                        .text
                        .starts_with(&format!("File: big.py (Part {})\n", i + 1)));
                }
                other => panic!("expected a part chunk, got {:?}", other),
            }
            for (_, body) in deheader(chunk) {
                recovered.extend(body.lines().map(str::to_string));
            }
        }
        assert_eq!(recovered, content);
    }

    #[test]
    fn test_parts_respect_budget_when_lines_fit() {
        let content: Vec<String> = (0..200).map(|i| format!("value = {}", i)).collect();
        let file = FileRecord::new("data.py", content.join("\n"));

        let chunks = build_chunks(&[file], 60);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.tokens <= 60, "chunk over budget: {}", chunk.tokens);
        }
    }

    #[test]
    fn test_unsplittable_line_gets_its_own_part() {
        let long_line = "y".repeat(400);
        let file = FileRecord::new("min.js", format!("a\n{}\nb", long_line));

        let chunks = build_chunks(&[file], 30);
        let bodies: Vec<String> = chunks
            .iter()
            .flat_map(deheader)
            .map(|(_, body)| body)
            .collect();
        assert_eq!(bodies, vec!["a".to_string(), long_line, "b".to_string()]);
        assert!(chunks[1].tokens > 30);
    }

    #[test]
    fn test_split_file_flushes_pending_buffer_first() {
        let big: Vec<String> = (0..40).map(|i| format!("row {}", i)).collect();
        let files = vec![
            file_with_tokens("small.py", 2),
            FileRecord::new("big.py", big.join("\n")),
            file_with_tokens("after.py", 2),
        ];

        let chunks = build_chunks(&files, 20);
        assert_eq!(
            chunks.first().map(|c| &c.kind),
            Some(&ChunkKind::Files {
                paths: vec!["small.py".to_string()]
            })
        );
        assert_eq!(
            chunks.last().map(|c| &c.kind),
            Some(&ChunkKind::Files {
                paths: vec!["after.py".to_string()]
            })
        );
        assert!(chunks[1..chunks.len() - 1]
            .iter()
            .all(|c| matches!(c.kind, ChunkKind::Part { .. })));
    }

    #[test]
    fn test_round_trip_preserves_content_and_order() {
        let files = vec![
            FileRecord::new("one.rs", "fn one() {}\n// trailing"),
            FileRecord::new("empty.rs", ""),
            FileRecord::new(
                "two.rs",
                (0..30)
                    .map(|i| format!("let v{} = {};", i, i))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            FileRecord::new("three.rs", "fn three() {}"),
        ];

        let chunks = build_chunks(&files, 25);

        let mut rebuilt: Vec<(String, String)> = Vec::new();
        for (path, body) in chunks.iter().flat_map(deheader) {
            match rebuilt.last_mut() {
                Some((last, content)) if *last == path => {
                    content.push('\n');
                    content.push_str(&body);
                }
                _ => rebuilt.push((path, body)),
            }
        }

        let expected: Vec<(String, String)> = files
            .iter()
            .map(|f| (f.path.clone(), f.content.clone()))
            .collect();
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn test_split_keeps_carriage_returns() {
        let content: String = (0..40).map(|i| format!("row {}\r\n", i)).collect();
        let file = FileRecord::new("win.txt", content.clone());

        let chunks = build_chunks(std::slice::from_ref(&file), 20);
        assert!(chunks.len() > 1);

        let rejoined = chunks
            .iter()
            .flat_map(deheader)
            .map(|(_, body)| body)
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(rejoined, content);
    }

    #[test]
    fn test_zero_budget_is_treated_as_one() {
        let files = vec![FileRecord::new("a.txt", "aaaa\nbbbb")];
        let chunks = build_chunks(&files, 0);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_no_files_no_chunks() {
        assert!(build_chunks(&[], 100).is_empty());
    }
}
