use std::collections::HashMap;

use lsp_types::Url;

/// The latest known text of every document the client has open, keyed by URI.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: HashMap<Url, String>,
}

impl DocumentStore {
    pub fn new() -> Self {
        DocumentStore::default()
    }

    pub fn open(&mut self, uri: Url, text: String) {
        self.documents.insert(uri, text);
    }

    /// Replace the stored text wholesale — the glue only ever requests full-document
    /// sync (`TextDocumentSyncKind::FULL`), so there is no incremental patching here.
    pub fn update(&mut self, uri: &Url, text: String) {
        self.documents.insert(uri.clone(), text);
    }

    pub fn close(&mut self, uri: &Url) {
        self.documents.remove(uri);
    }

    pub fn get(&self, uri: &Url) -> Option<&str> {
        self.documents.get(uri).map(String::as_str)
    }
}
