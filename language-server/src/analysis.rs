use crate::backend::Backend;
use crate::catalog::{Category, CommandCatalog};
use crate::completion::category_for;
use crate::database::{candidate_paths, describe_source, detect_rom_info, RomInfo};
use crate::error::{SiblingError, Unresolved};
use crate::reference::ReferenceToken;
use crate::resolver::{
    find_siblings, resolve, resolve_all, split_prefix, ResolveContext, ResolvedLocation,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_lsp::lsp_types::{
    InitializeParams, Location, MessageType, Position, Range, ShowDocumentParams, Url,
};

impl Backend {
    pub(crate) fn update_workspace_roots(&self, params: &InitializeParams) {
        let mut roots = self.workspace_roots.write();
        roots.clear();

        if let Some(root_uri) = params.root_uri.as_ref() {
            if let Ok(path) = root_uri.to_file_path() {
                if !roots.iter().any(|existing| existing == &path) {
                    roots.push(path);
                }
            }
        }

        #[allow(deprecated)]
        if let Some(root_path) = params.root_path.as_ref() {
            if !root_path.is_empty() {
                let path = PathBuf::from(root_path);
                if !roots.iter().any(|existing| existing == &path) {
                    roots.push(path);
                }
            }
        }

        if let Some(folders) = params.workspace_folders.as_ref() {
            for folder in folders {
                if let Ok(path) = folder.uri.to_file_path() {
                    if !roots.iter().any(|existing| existing == &path) {
                        roots.push(path);
                    }
                }
            }
        }
    }

    pub(crate) fn workspace_root_for(&self, path: Option<&Path>) -> Option<PathBuf> {
        let roots = self.workspace_roots.read();
        if let Some(path) = path {
            if let Some(root) = roots.iter().find(|root| path.starts_with(root)) {
                return Some(root.clone());
            }
        }
        roots.first().cloned()
    }

    pub(crate) fn line_at(&self, uri: &Url, position: Position) -> Option<(String, usize)> {
        let doc = self.documents.get(uri.as_str())?;
        let line = doc.line(position.line as usize)?.to_string();
        let column = doc.byte_column(position)?;
        Some((line, column))
    }

    pub(crate) fn document_category(&self, uri: &Url) -> Category {
        let language_id = self
            .documents
            .get(uri.as_str())
            .and_then(|doc| doc.language_id().map(str::to_string));
        let path = uri.to_file_path().ok();
        let extension = path
            .as_deref()
            .and_then(Path::extension)
            .and_then(|ext| ext.to_str());
        category_for(language_id.as_deref(), extension)
    }

    pub(crate) async fn catalog_for_document(&self, uri: &Url) -> Arc<CommandCatalog> {
        let rom = match self.documents.get(uri.as_str()) {
            Some(doc) => detect_rom_info(&doc.lines()),
            None => RomInfo::default(),
        };
        let candidates = {
            let settings = self.settings.read();
            candidate_paths(&settings, settings.databases.selected.as_deref(), &rom)
        };

        if candidates.is_empty() {
            return self
                .catalogs
                .current()
                .unwrap_or_else(|| Arc::new(CommandCatalog::empty()));
        }

        let outcome = self.catalogs.catalog_for(&candidates);
        if let Some(err) = &outcome.error {
            self.client
                .show_message(MessageType::WARNING, format!("DSPRE: {}", err))
                .await;
            self.client
                .log_message(
                    MessageType::WARNING,
                    format!(
                        "Using an empty command database; last source tried was {}",
                        err.path().display()
                    ),
                )
                .await;
        } else if outcome.reloaded {
            self.client
                .log_message(
                    MessageType::INFO,
                    format!(
                        "Loaded command database {} ({} entries)",
                        describe_source(&outcome.catalog),
                        outcome.catalog.len()
                    ),
                )
                .await;
            if outcome.catalog.skipped() > 0 {
                self.client
                    .log_message(
                        MessageType::WARNING,
                        format!(
                            "Skipped {} unreadable entries in {}",
                            outcome.catalog.skipped(),
                            describe_source(&outcome.catalog)
                        ),
                    )
                    .await;
            }
        }
        outcome.catalog
    }

    pub(crate) fn read_text(&self, path: &Path) -> Option<String> {
        if let Ok(uri) = Url::from_file_path(path) {
            if let Some(doc) = self.documents.get(uri.as_str()) {
                return Some(doc.text().to_string());
            }
        }
        std::fs::read_to_string(path).ok()
    }

    fn with_resolve_context<R>(&self, uri: &Url, f: impl FnOnce(&ResolveContext<'_>) -> R) -> R {
        let text = self
            .documents
            .get(uri.as_str())
            .map(|doc| doc.text().to_string())
            .unwrap_or_default();
        let lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();

        let document_path = uri.to_file_path().ok();
        let workspace_root = self.workspace_root_for(document_path.as_deref());
        let ctx = ResolveContext {
            document_path: document_path.as_deref(),
            lines: &lines,
            workspace_root: workspace_root.as_deref(),
        };
        f(&ctx)
    }

    pub(crate) fn resolve_token(
        &self,
        uri: &Url,
        token: &ReferenceToken,
    ) -> Result<ResolvedLocation, Unresolved> {
        self.with_resolve_context(uri, |ctx| resolve(token, ctx, |path| self.read_text(path)))
    }

    pub(crate) fn resolve_tokens(
        &self,
        uri: &Url,
        tokens: Vec<(usize, ReferenceToken)>,
    ) -> Vec<(usize, ReferenceToken, ResolvedLocation)> {
        self.with_resolve_context(uri, |ctx| {
            resolve_all(tokens, ctx, |path| self.read_text(path))
        })
    }

    pub(crate) fn location_for(&self, uri: &Url, resolved: &ResolvedLocation) -> Option<Location> {
        let (target, line) = match resolved {
            ResolvedLocation::SameDocument { line } => (uri.clone(), *line),
            ResolvedLocation::File { path, line } => {
                (Url::from_file_path(path).ok()?, line.unwrap_or(0))
            }
        };
        let start = Position {
            line: line as u32,
            character: 0,
        };
        Some(Location {
            uri: target,
            range: Range { start, end: start },
        })
    }

    pub(crate) async fn open_siblings(&self, uri: &Url) {
        if !self.settings.read().auto_open_siblings {
            return;
        }
        let Ok(path) = uri.to_file_path() else {
            return;
        };
        let Some(prefix) = split_prefix(&path) else {
            return;
        };
        if !self.opened_prefixes.insert(prefix.clone()) {
            return;
        }

        let files = match self.sibling_files(&path, &prefix) {
            Ok(files) => files,
            Err(err) => {
                self.client
                    .show_message(MessageType::ERROR, err.to_string())
                    .await;
                return;
            }
        };
        if files.is_empty() {
            self.client
                .show_message(MessageType::INFO, "No matching files found.")
                .await;
            return;
        }

        for file in files {
            if file == path {
                continue;
            }
            let Ok(target) = Url::from_file_path(&file) else {
                continue;
            };
            if self.documents.contains_key(target.as_str()) {
                continue;
            }
            let params = ShowDocumentParams {
                uri: target.clone(),
                external: Some(false),
                take_focus: Some(false),
                selection: None,
            };
            if let Err(err) = self.client.show_document(params).await {
                self.client
                    .log_message(
                        MessageType::WARNING,
                        format!("Could not open {}: {}", target, err),
                    )
                    .await;
            }
        }
    }

    fn sibling_files(&self, path: &Path, prefix: &str) -> Result<Vec<PathBuf>, SiblingError> {
        let root = self
            .workspace_root_for(Some(path))
            .ok_or(SiblingError::NoWorkspace)?;
        find_siblings(&root, prefix)
    }

    pub(crate) fn release_prefix(&self, uri: &Url) {
        let Some(prefix) = uri.to_file_path().ok().and_then(|path| split_prefix(&path)) else {
            return;
        };
        let still_open = self.documents.iter().any(|entry| {
            Url::parse(entry.key())
                .ok()
                .and_then(|uri| uri.to_file_path().ok())
                .and_then(|path| split_prefix(&path))
                .as_deref()
                == Some(prefix.as_str())
        });
        if !still_open {
            self.opened_prefixes.remove(&prefix);
        }
    }
}

pub(crate) fn reference_count_title(count: usize) -> String {
    if count == 1 {
        "1 reference".to_string()
    } else {
        format!("{} references", count)
    }
}

pub(crate) fn link_target(uri: &Url, resolved: &ResolvedLocation) -> Option<Url> {
    match resolved {
        ResolvedLocation::SameDocument { line } => {
            let mut target = uri.clone();
            target.set_fragment(Some(&format!("L{}", line + 1)));
            Some(target)
        }
        ResolvedLocation::File { path, .. } => Url::from_file_path(path).ok(),
    }
}
