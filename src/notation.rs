//! # Notation Locator
//!
//! Best-effort mapping from analysis findings back to the notation source.
//!
//! Parses the LilyPond-style source once: voice+section declarations
//! (`bassA = ... {`) delimit spans via nested-brace tracking, and the
//! `\key` / `\transpose` directives yield the written mode and the
//! sounding-to-written transposition offset.
//!
//! The time-to-line mapping is fundamentally heuristic: the piece is split
//! into two time-based halves (section A first, B second) and a fractional
//! position within a half is linearly interpolated to a line inside the
//! matching span. There is no real time-to-source correspondence; treat
//! every location as approximate. Locator failure never affects core
//! findings, it only removes location annotations.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::score::{Mode, Voice};

/// The two repeated strains of a shape-note tune.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    A,
    B,
}

impl Section {
    pub fn letter(self) -> char {
        match self {
            Section::A => 'A',
            Section::B => 'B',
        }
    }
}

/// One voice/section's notated content with its line range (1-based).
#[derive(Debug, Clone)]
pub struct SectionSpan {
    pub voice: Voice,
    pub section: Section,
    pub start_line: usize,
    pub end_line: usize,
    pub lines: Vec<String>,
}

/// A detected `\transpose FROM TO` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct TransposeDirective {
    pub from: String,
    pub to: String,
    /// Written-to-sounding shift the notation applies, in (−6, +6].
    pub written_to_sounding: i8,
    /// The reverse shift used by analysis: sounding MIDI to written pitch.
    pub sounding_to_written: i8,
}

/// An approximate source location for one (voice, offset) query.
#[derive(Debug, Clone)]
pub struct SourceLocation {
    pub voice: Voice,
    pub section: Section,
    pub start_line: usize,
    pub end_line: usize,
    pub estimated_line: usize,
    pub measure: u32,
    pub beat: u32,
    pub progress: f64,
}

impl SourceLocation {
    /// Span key as it appears in the source, e.g. "bassA".
    pub fn section_key(&self) -> String {
        format!("{}{}", self.voice.name(), self.section.letter())
    }
}

/// Parsed notation source: spans, directives, and the raw lines for
/// context extraction.
#[derive(Debug, Default)]
pub struct NotationSource {
    lines: Vec<String>,
    spans: HashMap<(Voice, Section), SectionSpan>,
    /// Name the source was loaded from, for location messages.
    pub source_name: Option<String>,
    /// Declared written key, if a `\key` directive was found.
    pub declared_key: Option<(String, Mode)>,
    /// First `\transpose` directive, if any.
    pub transpose: Option<TransposeDirective>,
}

/// Solmization note names to semitones, `s` = sharp, `b` = flat.
fn solmization_semitone(name: &str) -> Option<i16> {
    let semitone = match name {
        "do" => 0,
        "dos" => 1,
        "dob" => 11,
        "re" => 2,
        "res" => 3,
        "reb" => 1,
        "mi" => 4,
        "mis" => 5,
        "mib" => 3,
        "fa" => 5,
        "fas" => 6,
        "fab" => 4,
        "sol" => 7,
        "sols" => 8,
        "solb" => 6,
        "la" => 9,
        "las" => 10,
        "lab" => 8,
        "si" => 11,
        "sis" => 0,
        "sib" => 10,
        _ => return None,
    };
    Some(semitone)
}

/// Normalize a raw semitone difference to the nearest direction, (−6, +6].
fn normalize_semitones(raw: i16) -> i8 {
    if raw > 6 {
        (raw - 12) as i8
    } else if raw < -6 {
        (raw + 12) as i8
    } else {
        raw as i8
    }
}

impl NotationSource {
    /// Read and parse a notation source file.
    pub fn load(path: &Path) -> io::Result<NotationSource> {
        let text = fs::read_to_string(path)?;
        let mut source = NotationSource::parse(&text);
        source.source_name = Some(path.display().to_string());
        Ok(source)
    }

    /// Parse notation source text. Never fails: unrecognized content is
    /// simply not indexed.
    pub fn parse(text: &str) -> NotationSource {
        let lines: Vec<String> = text.lines().map(|l| l.trim_end().to_string()).collect();
        let mut source = NotationSource {
            lines,
            ..NotationSource::default()
        };
        source.scan_spans();
        source.scan_directives();
        source
    }

    /// Sounding-to-written offset; zero when no transposition is declared.
    pub fn transpose_offset(&self) -> i8 {
        self.transpose
            .as_ref()
            .map(|t| t.sounding_to_written)
            .unwrap_or(0)
    }

    /// Whether any voice/section spans were found.
    pub fn has_spans(&self) -> bool {
        !self.spans.is_empty()
    }

    fn scan_spans(&mut self) {
        let mut line_idx = 0;
        while line_idx < self.lines.len() {
            if let Some((voice, section)) = parse_span_declaration(&self.lines[line_idx]) {
                if let Some(span) = self.collect_span(voice, section, line_idx) {
                    self.spans.insert((voice, section), span);
                }
            }
            line_idx += 1;
        }
    }

    /// Accumulate lines from the declaration onward, tracking nested brace
    /// depth; the span closes when depth returns to zero after opening.
    fn collect_span(
        &self,
        voice: Voice,
        section: Section,
        decl_idx: usize,
    ) -> Option<SectionSpan> {
        let mut content = Vec::new();
        let mut depth = 0i32;
        let mut opened = false;

        for (idx, line) in self.lines.iter().enumerate().skip(decl_idx) {
            content.push(line.clone());
            for ch in line.chars() {
                match ch {
                    '{' => {
                        depth += 1;
                        opened = true;
                    }
                    '}' => {
                        depth -= 1;
                        if opened && depth == 0 {
                            return Some(SectionSpan {
                                voice,
                                section,
                                start_line: decl_idx + 1,
                                end_line: idx + 1,
                                lines: content,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        None
    }

    fn scan_directives(&mut self) {
        let mut declared_key = None;
        let mut transpose = None;
        for line in &self.lines {
            if declared_key.is_none() {
                if let Some(key) = parse_key_directive(line) {
                    declared_key = Some(key);
                    continue;
                }
            }
            if transpose.is_none() {
                if let Some((from, to)) = parse_transpose_directive(line) {
                    let (Some(from_st), Some(to_st)) =
                        (solmization_semitone(&from), solmization_semitone(&to))
                    else {
                        continue;
                    };
                    let written_to_sounding = normalize_semitones(to_st - from_st);
                    transpose = Some(TransposeDirective {
                        from,
                        to,
                        written_to_sounding,
                        sounding_to_written: -written_to_sounding,
                    });
                }
            }
        }
        self.declared_key = declared_key;
        self.transpose = transpose;
    }

    /// Map a (voice, offset) pair to an approximate source line.
    ///
    /// Section A is the first half of the piece, B the second; the position
    /// within the half interpolates linearly into the span's lines, clamped
    /// to stay above the closing brace.
    pub fn locate(
        &self,
        voice: Voice,
        offset: f64,
        total_duration: f64,
        measure: u32,
        beat: u32,
    ) -> Option<SourceLocation> {
        if self.spans.is_empty() {
            return None;
        }
        let midpoint = total_duration / 2.0;
        let section = if offset < midpoint {
            Section::A
        } else {
            Section::B
        };
        let span = self.spans.get(&(voice, section))?;

        let progress = match section {
            Section::A => {
                if midpoint > 0.0 {
                    offset / midpoint
                } else {
                    0.0
                }
            }
            Section::B => {
                let section_duration = (total_duration - midpoint).max(1.0);
                (offset - midpoint) / section_duration
            }
        };

        let content_lines = span.lines.len();
        let line_offset = (progress * content_lines.saturating_sub(2).max(1) as f64) as usize;
        let estimated_line = (span.start_line + line_offset + 1).min(span.end_line - 1);

        Some(SourceLocation {
            voice,
            section,
            start_line: span.start_line,
            end_line: span.end_line,
            estimated_line,
            measure,
            beat,
            progress,
        })
    }

    /// Source lines around the estimated location, arrow-marked.
    pub fn context(&self, location: &SourceLocation, context_lines: usize) -> Vec<String> {
        let estimated = location.estimated_line;
        let start = estimated.saturating_sub(context_lines + 1);
        let end = (estimated + context_lines).min(self.lines.len());
        (start..end)
            .map(|idx| {
                let marker = if idx + 1 == estimated { "→ " } else { "  " };
                format!("{}Line {}: {}", marker, idx + 1, self.lines[idx])
            })
            .collect()
    }
}

/// Parse a `<voice><A|B> = ... {` declaration anchored at line start.
fn parse_span_declaration(line: &str) -> Option<(Voice, Section)> {
    let trimmed = line.trim_start();
    let voice = ["treble", "alto", "tenor", "bass"]
        .iter()
        .find(|name| trimmed.starts_with(**name))?;
    let rest = &trimmed[voice.len()..];
    let mut chars = rest.chars();
    let section = match chars.next() {
        Some('A') => Section::A,
        Some('B') => Section::B,
        _ => return None,
    };
    let after = chars.as_str().trim_start();
    if !after.starts_with('=') {
        return None;
    }
    Voice::from_name(voice).map(|v| (v, section))
}

/// Parse a `\key NOTE \major|\minor` directive anywhere in a line.
fn parse_key_directive(line: &str) -> Option<(String, Mode)> {
    let idx = line.find("\\key")?;
    let rest = &line[idx + "\\key".len()..];
    let mut tokens = rest.split_whitespace();
    let note = tokens.next()?;
    solmization_semitone(note)?;
    let mode = match tokens.next()? {
        "\\major" => Mode::Major,
        "\\minor" => Mode::Minor,
        _ => return None,
    };
    Some((note.to_string(), mode))
}

/// Parse a `\transpose FROM TO {` directive anywhere in a line.
fn parse_transpose_directive(line: &str) -> Option<(String, String)> {
    let idx = line.find("\\transpose")?;
    let rest = &line[idx + "\\transpose".len()..];
    if !rest.contains('{') {
        return None;
    }
    let mut tokens = rest.split_whitespace();
    let from = tokens.next()?.trim_end_matches('{');
    let to = tokens.next().unwrap_or("").trim_end_matches('{');
    if from.is_empty() || to.is_empty() {
        return None;
    }
    Some((from.to_string(), to.to_string()))
}
