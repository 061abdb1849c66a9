use crate::analysis::{link_target, reference_count_title};
use crate::completion::{completion_items, in_first_token, signature_help};
use crate::config::ServerConfig;
use crate::database::{describe_source, CatalogStore};
use crate::hover::{format_command_hover, format_number_hover, format_reference_hover};
use crate::outline::{
    build_outline, find_header, find_references, headers, parse_header, references_by_target,
    OutlineKind, OutlineNode,
};
use crate::reference::{scan, token_at, word_at, NumberLiteral, RefKind, ReferenceToken};
use crate::text::{Document, DocumentStore};
use dashmap::DashSet;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

pub(crate) const SELECT_DATABASE: &str = "dspre.selectDatabase";
pub(crate) const LIST_DATABASES: &str = "dspre.listDatabases";
pub(crate) const RELOAD_DATABASE: &str = "dspre.reloadDatabase";
pub(crate) const TOGGLE_AUTO_OPEN: &str = "dspre.toggleAutoOpen";

const SHOW_REFERENCES: &str = "editor.action.showReferences";

pub struct Backend {
    pub(crate) client: Client,
    pub(crate) documents: Arc<DocumentStore>,
    pub(crate) workspace_roots: Arc<RwLock<Vec<PathBuf>>>,
    pub(crate) settings: Arc<RwLock<ServerConfig>>,
    pub(crate) catalogs: Arc<CatalogStore>,
    pub(crate) opened_prefixes: Arc<DashSet<String>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(DocumentStore::default()),
            workspace_roots: Arc::new(RwLock::new(Vec::new())),
            settings: Arc::new(RwLock::new(ServerConfig::default())),
            catalogs: Arc::new(CatalogStore::default()),
            opened_prefixes: Arc::new(DashSet::new()),
        }
    }

    fn snapshot(&self, uri: &Url) -> Option<Document> {
        self.documents.get(uri.as_str()).map(|doc| doc.clone())
    }

    fn target_at(&self, uri: &Url, position: Position) -> Option<(RefKind, u32)> {
        let (line, column) = self.line_at(uri, position)?;
        if let Some(token) = token_at(&line, column) {
            return Some((token.kind, token.id));
        }
        parse_header(&line)
    }

    fn symbol_for(doc: &Document, node: &OutlineNode) -> DocumentSymbol {
        let (kind, selection_line) = match &node.kind {
            OutlineKind::Section(_) => (SymbolKind::NAMESPACE, node.extent.0),
            OutlineKind::Header(header) => {
                let kind = match header.kind {
                    RefKind::Script => SymbolKind::MODULE,
                    RefKind::Function => SymbolKind::FUNCTION,
                    RefKind::Action => SymbolKind::EVENT,
                };
                (kind, header.line)
            }
        };
        let children: Vec<DocumentSymbol> = node
            .children
            .iter()
            .map(|child| Self::symbol_for(doc, child))
            .collect();

        #[allow(deprecated)]
        let symbol = DocumentSymbol {
            name: node.label(),
            detail: None,
            kind,
            tags: None,
            deprecated: None,
            range: doc.line_range(node.extent.0, node.extent.1),
            selection_range: doc.line_range(selection_line, selection_line),
            children: (!children.is_empty()).then_some(children),
        };
        symbol
    }

    async fn select_database(&self, selection: Option<String>) -> Value {
        {
            let mut settings = self.settings.write();
            settings.databases.selected = selection.clone();
        }
        self.catalogs.invalidate();

        let message = match &selection {
            Some(selected) => format!("Command database set to {}", selected),
            None => "Command database follows the ROM header again".to_string(),
        };
        self.client.show_message(MessageType::INFO, message).await;
        json!({ "selected": selection })
    }

    fn list_databases(&self) -> Value {
        let settings = self.settings.read();
        let active = self.catalogs.current().map(|catalog| {
            json!({
                "source": catalog.source(),
                "name": describe_source(&catalog),
                "entries": catalog.len(),
            })
        });
        json!({
            "directory": settings.database_directory(),
            "sources": settings.databases.sources,
            "selected": settings.databases.selected,
            "active": active,
        })
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.update_workspace_roots(&params);
        if let Some(config) = ServerConfig::from_settings(params.initialization_options.as_ref()) {
            *self.settings.write() = config;
        }

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "dspre-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![" ".to_string(), "\t".to_string()]),
                    ..Default::default()
                }),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec![" ".to_string(), ",".to_string()]),
                    retrigger_characters: None,
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                document_symbol_provider: Some(OneOf::Left(true)),
                document_link_provider: Some(DocumentLinkOptions {
                    resolve_provider: Some(false),
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                code_lens_provider: Some(CodeLensOptions {
                    resolve_provider: Some(false),
                }),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![
                        SELECT_DATABASE.to_string(),
                        LIST_DATABASES.to_string(),
                        RELOAD_DATABASE.to_string(),
                        TOGGLE_AUTO_OPEN.to_string(),
                    ],
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "DSPRE LSP server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let document =
            Document::new(params.text_document.text).with_language(params.text_document.language_id);
        self.documents.insert(uri.to_string(), document);

        self.client
            .log_message(MessageType::INFO, format!("Opened document: {}", uri))
            .await;

        self.open_siblings(&uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;

        if let Some(change) = params.content_changes.into_iter().last() {
            let language_id = self
                .documents
                .get(uri.as_str())
                .and_then(|doc| doc.language_id().map(str::to_string));
            let mut document = Document::new(change.text);
            if let Some(language_id) = language_id {
                document = document.with_language(language_id);
            }
            self.documents.insert(uri.to_string(), document);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.remove(uri.as_str());
        self.release_prefix(&uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let Some(config) = ServerConfig::from_settings(Some(&params.settings)) else {
            self.client
                .log_message(MessageType::WARNING, "Ignoring unreadable DSPRE settings")
                .await;
            return;
        };
        {
            let mut settings = self.settings.write();
            let next = config.keeping_selection(&settings);
            *settings = next;
        }
        self.catalogs.invalidate();
        self.client
            .log_message(MessageType::INFO, "DSPRE settings updated")
            .await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some((line, column)) = self.line_at(&uri, position) else {
            return Ok(None);
        };

        let value = if let Some(token) = token_at(&line, column) {
            match self.resolve_token(&uri, &token) {
                Ok(resolved) => format_reference_hover(&token, &resolved),
                Err(_) => return Ok(None),
            }
        } else {
            let Some((word, _)) = word_at(&line, column) else {
                return Ok(None);
            };
            let catalog = self.catalog_for_document(&uri).await;
            if let Some(number) = NumberLiteral::classify(word) {
                format_number_hover(number, word, catalog.find_by_opcode(word))
            } else {
                match catalog.find_by_name(word) {
                    Some(entry) => format_command_hover(entry),
                    None => return Ok(None),
                }
            }
        };

        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            }),
            range: None,
        }))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some((line, column)) = self.line_at(&uri, position) else {
            return Ok(None);
        };
        let Some(token) = token_at(&line, column) else {
            return Ok(None);
        };

        Ok(self
            .resolve_token(&uri, &token)
            .ok()
            .and_then(|resolved| self.location_for(&uri, &resolved))
            .map(GotoDefinitionResponse::Scalar))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let Some((kind, id)) = self.target_at(&uri, position) else {
            return Ok(None);
        };
        let Some(doc) = self.snapshot(&uri) else {
            return Ok(None);
        };
        let lines = doc.lines();

        let mut locations = Vec::new();
        if params.context.include_declaration {
            if let Some(line) = find_header(&lines, kind, id) {
                locations.push(Location {
                    uri: uri.clone(),
                    range: doc.line_range(line, line),
                });
            }
        }
        for site in find_references(&lines, kind, id) {
            locations.push(Location {
                uri: uri.clone(),
                range: doc.span(site.line, site.columns.start, site.columns.end),
            });
        }

        Ok(Some(locations))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let Some((line, column)) = self.line_at(&uri, position) else {
            return Ok(None);
        };
        if !in_first_token(&line, column) {
            return Ok(None);
        }

        let catalog = self.catalog_for_document(&uri).await;
        let style = self.settings.read().completions.style;
        let items = completion_items(&catalog, self.document_category(&uri), style);
        if items.is_empty() {
            return Ok(None);
        }

        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some((line, column)) = self.line_at(&uri, position) else {
            return Ok(None);
        };
        let catalog = self.catalog_for_document(&uri).await;
        Ok(signature_help(&catalog, &line, column))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(doc) = self.snapshot(&params.text_document.uri) else {
            return Ok(None);
        };
        let outline = build_outline(&doc.lines());
        let symbols = outline
            .iter()
            .map(|node| Self::symbol_for(&doc, node))
            .collect();

        Ok(Some(DocumentSymbolResponse::Nested(symbols)))
    }

    async fn document_link(&self, params: DocumentLinkParams) -> Result<Option<Vec<DocumentLink>>> {
        let uri = params.text_document.uri;
        let Some(doc) = self.snapshot(&uri) else {
            return Ok(None);
        };

        let tokens: Vec<(usize, ReferenceToken)> = doc
            .lines()
            .into_iter()
            .enumerate()
            .flat_map(|(n, line)| scan(line).map(move |token| (n, token)))
            .collect();

        let mut links = Vec::new();
        for (n, token, resolved) in self.resolve_tokens(&uri, tokens) {
            let Some(target) = link_target(&uri, &resolved) else {
                continue;
            };
            links.push(DocumentLink {
                range: doc.span(n, token.span.start, token.span.end),
                target: Some(target),
                tooltip: Some(format!("Go to {}", token.kind.keyword())),
                data: None,
            });
        }

        Ok(Some(links))
    }

    async fn code_lens(&self, params: CodeLensParams) -> Result<Option<Vec<CodeLens>>> {
        let uri = params.text_document.uri;
        let Some(doc) = self.snapshot(&uri) else {
            return Ok(None);
        };
        let lines = doc.lines();

        let sites = references_by_target(&lines);
        let mut lenses = Vec::new();
        for header in headers(&lines) {
            let locations: Vec<Location> = sites
                .get(&(header.kind, header.id))
                .into_iter()
                .flatten()
                .map(|site| Location {
                    uri: uri.clone(),
                    range: doc.span(site.line, site.columns.start, site.columns.end),
                })
                .collect();
            let range = doc.line_range(header.line, header.line);

            lenses.push(CodeLens {
                range,
                command: Some(Command {
                    title: reference_count_title(locations.len()),
                    command: SHOW_REFERENCES.to_string(),
                    arguments: Some(vec![json!(uri), json!(range.start), json!(locations)]),
                }),
                data: None,
            });
        }

        Ok(Some(lenses))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        match params.command.as_str() {
            SELECT_DATABASE => {
                let selection = params
                    .arguments
                    .first()
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                Ok(Some(self.select_database(selection).await))
            }
            LIST_DATABASES => Ok(Some(self.list_databases())),
            RELOAD_DATABASE => {
                self.catalogs.invalidate();
                self.client
                    .log_message(MessageType::INFO, "Command database will reload on next use")
                    .await;
                Ok(None)
            }
            TOGGLE_AUTO_OPEN => {
                let enabled = {
                    let mut settings = self.settings.write();
                    settings.auto_open_siblings = !settings.auto_open_siblings;
                    settings.auto_open_siblings
                };
                let state = if enabled { "on" } else { "off" };
                self.client
                    .show_message(MessageType::INFO, format!("Auto-open sibling files: {}", state))
                    .await;
                Ok(Some(Value::Bool(enabled)))
            }
            other => Err(Error::invalid_params(format!("unknown command: {}", other))),
        }
    }
}
