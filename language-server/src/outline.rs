use crate::reference::{scan, RefKind};
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

static DIVIDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*//+=====+\s*(SCRIPTS|FUNCTIONS|ACTIONS)\s*=====+//+\s*$")
        .expect("divider pattern")
});

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?i:(Script|Function|Action))\s+(\d+):\s*$").expect("header pattern")
});

/// Header prefix alone; trailing text is allowed. Decides which line a
/// find-references pass treats as the declaration.
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?i:(Script|Function|Action))\s+(\d+):").expect("declaration pattern")
});

static TERMINATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:End|Return|Jump\b|UseScript#\d+)\b").expect("terminator pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub kind: RefKind,
    pub id: u32,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDivider {
    pub label: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    Divider(SectionDivider),
    Header(SectionHeader),
    Terminator,
    Content,
}

pub fn parse_header(line: &str) -> Option<(RefKind, u32)> {
    let caps = HEADER.captures(line)?;
    let kind = RefKind::from_keyword_ignore_case(caps.get(1)?.as_str())?;
    let id = caps.get(2)?.as_str().parse().ok()?;
    Some((kind, id))
}

fn declares(line: &str, kind: RefKind, id: u32) -> bool {
    let Some(caps) = DECLARATION.captures(line) else {
        return false;
    };
    let declared_kind = caps
        .get(1)
        .and_then(|m| RefKind::from_keyword_ignore_case(m.as_str()));
    let declared_id = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
    declared_kind == Some(kind) && declared_id == Some(id)
}

pub fn classify_line(line: &str, line_number: usize) -> LineClass {
    if let Some(caps) = DIVIDER.captures(line) {
        let label = caps
            .get(1)
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_default();
        return LineClass::Divider(SectionDivider {
            label,
            line: line_number,
        });
    }
    if let Some((kind, id)) = parse_header(line) {
        return LineClass::Header(SectionHeader {
            kind,
            id,
            line: line_number,
        });
    }
    if TERMINATOR.is_match(line) {
        return LineClass::Terminator;
    }
    LineClass::Content
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineKind {
    Section(String),
    Header(SectionHeader),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub kind: OutlineKind,
    pub extent: (usize, usize),
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn label(&self) -> String {
        match &self.kind {
            OutlineKind::Section(label) => label.clone(),
            OutlineKind::Header(header) => {
                let keyword = header.kind.keyword();
                format!("[{}] {} {}", &keyword[..1], keyword, header.id)
            }
        }
    }

    pub fn header(&self) -> Option<&SectionHeader> {
        match &self.kind {
            OutlineKind::Header(header) => Some(header),
            OutlineKind::Section(_) => None,
        }
    }
}

pub fn build_outline(lines: &[&str]) -> Vec<OutlineNode> {
    if lines.is_empty() {
        return Vec::new();
    }

    let classes: Vec<LineClass> = lines
        .iter()
        .enumerate()
        .map(|(n, line)| classify_line(line, n))
        .collect();
    let last_line = lines.len() - 1;

    let dividers: Vec<&SectionDivider> = classes
        .iter()
        .filter_map(|class| match class {
            LineClass::Divider(divider) => Some(divider),
            _ => None,
        })
        .collect();

    let first_divider = dividers.first().map(|d| d.line);
    let mut outline = Vec::new();

    let preamble_end = match first_divider {
        Some(0) => None,
        Some(line) => Some(line - 1),
        None => Some(last_line),
    };
    if let Some(end) = preamble_end {
        outline.extend(header_nodes(&classes, 0, end));
    }

    for (idx, divider) in dividers.iter().enumerate() {
        let end = dividers
            .get(idx + 1)
            .map(|next| next.line - 1)
            .unwrap_or(last_line);
        outline.push(OutlineNode {
            kind: OutlineKind::Section(divider.label.clone()),
            extent: (divider.line, end),
            children: header_nodes(&classes, divider.line + 1, end),
        });
    }

    outline
}

fn header_nodes(classes: &[LineClass], start: usize, end: usize) -> Vec<OutlineNode> {
    let mut nodes = Vec::new();
    if start > end {
        return nodes;
    }

    for line in start..=end {
        let LineClass::Header(header) = &classes[line] else {
            continue;
        };

        let mut block_end = end;
        for next in (line + 1)..=end {
            match &classes[next] {
                LineClass::Terminator => {
                    block_end = next;
                    break;
                }
                LineClass::Header(_) => {
                    block_end = next - 1;
                    break;
                }
                _ => {}
            }
        }

        nodes.push(OutlineNode {
            kind: OutlineKind::Header(*header),
            extent: (line, block_end),
            children: Vec::new(),
        });
    }

    nodes
}

pub fn headers(lines: &[&str]) -> Vec<SectionHeader> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(n, line)| {
            parse_header(line).map(|(kind, id)| SectionHeader { kind, id, line: n })
        })
        .collect()
}

pub fn find_header(lines: &[&str], kind: RefKind, id: u32) -> Option<usize> {
    lines
        .iter()
        .position(|line| parse_header(line) == Some((kind, id)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSite {
    pub line: usize,
    pub columns: Range<usize>,
}

/// All uses of `Kind#id`, in document order. The line declaring `Kind id:`
/// is skipped outright, whatever else it contains.
pub fn find_references(lines: &[&str], kind: RefKind, id: u32) -> Vec<ReferenceSite> {
    let mut sites = Vec::new();
    for (n, line) in lines.iter().enumerate() {
        if declares(line, kind, id) {
            continue;
        }
        sites.extend(
            scan(line)
                .filter(|token| token.kind == kind && token.id == id)
                .map(|token| ReferenceSite {
                    line: n,
                    columns: token.span,
                }),
        );
    }
    sites
}

pub fn references_by_target(lines: &[&str]) -> HashMap<(RefKind, u32), Vec<ReferenceSite>> {
    let mut sites: HashMap<(RefKind, u32), Vec<ReferenceSite>> = HashMap::new();
    for (n, line) in lines.iter().enumerate() {
        for token in scan(line) {
            if declares(line, token.kind, token.id) {
                continue;
            }
            sites
                .entry((token.kind, token.id))
                .or_default()
                .push(ReferenceSite {
                    line: n,
                    columns: token.span,
                });
        }
    }
    sites
}
