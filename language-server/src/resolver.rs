use crate::error::{SiblingError, Unresolved};
use crate::outline::find_header;
use crate::reference::{RefKind, ReferenceToken};
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

static SPLIT_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})_(script|action|func)\b").expect("split file name pattern")
});

pub fn split_prefix(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    SPLIT_FILE_NAME
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn sibling_file_name(prefix: &str, kind: RefKind) -> String {
    format!("{}_{}.{}", prefix, kind.file_stem(), kind.file_extension())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveMode {
    SameDocument,
    CrossFile { prefix: String },
}

impl ResolveMode {
    pub fn for_document(path: Option<&Path>) -> Self {
        match path.and_then(split_prefix) {
            Some(prefix) => ResolveMode::CrossFile { prefix },
            None => ResolveMode::SameDocument,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLocation {
    SameDocument { line: usize },
    File { path: PathBuf, line: Option<usize> },
}

pub struct ResolveContext<'a> {
    pub document_path: Option<&'a Path>,
    pub lines: &'a [&'a str],
    pub workspace_root: Option<&'a Path>,
}

impl ResolveContext<'_> {
    pub fn mode(&self) -> ResolveMode {
        ResolveMode::for_document(self.document_path)
    }

    fn sibling_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(root) = self.workspace_root {
            dirs.push(root.to_path_buf());
        }
        if let Some(parent) = self.document_path.and_then(Path::parent) {
            if !dirs.iter().any(|dir| dir == parent) {
                dirs.push(parent.to_path_buf());
            }
        }
        dirs
    }
}

pub fn resolve<F>(
    token: &ReferenceToken,
    ctx: &ResolveContext<'_>,
    read_text: F,
) -> Result<ResolvedLocation, Unresolved>
where
    F: Fn(&Path) -> Option<String>,
{
    match ctx.mode() {
        ResolveMode::SameDocument => find_header(ctx.lines, token.kind, token.id)
            .map(|line| ResolvedLocation::SameDocument { line })
            .ok_or_else(|| Unresolved::NoHeader(token.label())),
        ResolveMode::CrossFile { prefix } => resolve_sibling(token, ctx, &prefix, read_text),
    }
}

/// Resolves a batch of tokens against one context. Each sibling file is read
/// at most once, and tokens that do not resolve are dropped.
pub fn resolve_all<T, F>(
    tokens: Vec<(T, ReferenceToken)>,
    ctx: &ResolveContext<'_>,
    read_text: F,
) -> Vec<(T, ReferenceToken, ResolvedLocation)>
where
    F: Fn(&Path) -> Option<String>,
{
    let cache: RefCell<HashMap<PathBuf, Option<String>>> = RefCell::default();
    let cached = |path: &Path| {
        cache
            .borrow_mut()
            .entry(path.to_path_buf())
            .or_insert_with(|| read_text(path))
            .clone()
    };

    tokens
        .into_iter()
        .filter_map(|(key, token)| {
            let resolved = resolve(&token, ctx, &cached).ok()?;
            Some((key, token, resolved))
        })
        .collect()
}

fn resolve_sibling<F>(
    token: &ReferenceToken,
    ctx: &ResolveContext<'_>,
    prefix: &str,
    read_text: F,
) -> Result<ResolvedLocation, Unresolved>
where
    F: Fn(&Path) -> Option<String>,
{
    let name = sibling_file_name(prefix, token.kind);
    let dirs = ctx.sibling_dirs();
    if dirs.is_empty() {
        return Err(Unresolved::MissingFile(PathBuf::from(name)));
    }

    let Some(path) = dirs
        .iter()
        .map(|dir| dir.join(&name))
        .find(|candidate| candidate.is_file())
    else {
        return Err(Unresolved::MissingFile(dirs[0].join(&name)));
    };

    let line = read_text(&path).and_then(|text| {
        let lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
        find_header(&lines, token.kind, token.id)
    });

    Ok(ResolvedLocation::File { path, line })
}

pub fn find_siblings(root: &Path, prefix: &str) -> Result<Vec<PathBuf>, SiblingError> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) if source.depth() == 0 => {
                return Err(SiblingError::Walk {
                    root: root.to_path_buf(),
                    source,
                });
            }
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if split_prefix(&path).as_deref() == Some(prefix) {
            found.push(path);
        }
    }

    found.sort_by_key(|path| (sibling_rank(path), path.clone()));
    Ok(found)
}

fn sibling_rank(path: &Path) -> u8 {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if name.contains("_script") {
        0
    } else if name.contains("_func") {
        1
    } else {
        2
    }
}
