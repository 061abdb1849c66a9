mod analysis;
mod backend;
mod catalog;
mod completion;
mod config;
mod database;
mod error;
mod hover;
mod outline;
mod reference;
mod resolver;
mod text;

use backend::Backend;
use tower_lsp::{LspService, Server};

#[tokio::main]
async fn main() {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
