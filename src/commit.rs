//! Document committing: rewrites each document and hands the new text to the
//! host's main or test source sink.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use serde::Serialize;
use tracing::{error, info};

use crate::{
    config::ToolConfig,
    rewrite::{rewrite_module, SiteConfigs},
    rewrite_err,
    syntax::{parse_module, Annotation, SyntaxTree},
    RewriteError,
};

/// Identifies a document within the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which sink a document is committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceSet {
    Main,
    Test,
}

/// The build context that owns documents and persists rewritten text.
pub trait SourceHost {
    /// The parsed tree of a document, if the host knows it.
    fn syntax_tree(&self, id: &DocumentId) -> Option<&SyntaxTree>;

    /// True for main-module documents, false for test documents.
    fn is_main_document(&self, id: &DocumentId) -> bool;

    fn commit_main_source(&mut self, id: &DocumentId, text: String);

    fn commit_test_source(&mut self, id: &DocumentId, text: String);
}

// ============================================================================
// SOURCE MODIFIER
// ============================================================================

/// Outcome of [`SourceModifier::modify`].
#[derive(Debug, Default)]
pub struct ModifyReport {
    pub committed: Vec<(DocumentId, SourceSet)>,
    pub failed: Vec<(DocumentId, RewriteError)>,
}

impl ModifyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Rewrites annotation sites across documents.
#[derive(Debug, Clone, Default)]
pub struct SourceModifier {
    documents: BTreeMap<DocumentId, SiteConfigs>,
}

impl SourceModifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a site of a document.
    pub fn add_site(&mut self, id: &DocumentId, annotation: &Arc<Annotation>, config: ToolConfig) {
        self.documents
            .entry(id.clone())
            .or_default()
            .insert(annotation, config);
    }

    /// Replaces all sites of a document.
    pub fn set_document(&mut self, id: DocumentId, sites: SiteConfigs) {
        self.documents.insert(id, sites);
    }

    /// Rewrites and commits every document.
    ///
    /// A document whose rewrite fails is not committed; the others still are.
    pub fn modify<H: SourceHost + ?Sized>(&self, host: &mut H) -> ModifyReport {
        let mut report = ModifyReport::default();
        for (id, sites) in &self.documents {
            match modify_document(host, id, sites) {
                Ok(set) => report.committed.push((id.clone(), set)),
                Err(e) => {
                    error!(document = %id, error = %e, "document left unmodified");
                    report.failed.push((id.clone(), e));
                }
            }
        }
        report
    }
}

fn modify_document<H: SourceHost + ?Sized>(
    host: &mut H,
    id: &DocumentId,
    sites: &SiteConfigs,
) -> Result<SourceSet, RewriteError> {
    let tree = host
        .syntax_tree(id)
        .ok_or_else(|| rewrite_err!(Document, format!("no syntax tree for document `{id}`")))?;
    let root = rewrite_module(tree, sites)?;
    let text = tree.modify_with(root).text();

    let set = if host.is_main_document(id) {
        host.commit_main_source(id, text);
        SourceSet::Main
    } else {
        host.commit_test_source(id, text);
        SourceSet::Test
    };
    info!(document = %id, sites = sites.len(), ?set, "committed rewritten source");
    Ok(set)
}

// ============================================================================
// IN-MEMORY HOST
// ============================================================================

/// A host that keeps documents and commits in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    trees: BTreeMap<DocumentId, SyntaxTree>,
    test_documents: BTreeSet<DocumentId>,
    main_commits: BTreeMap<DocumentId, String>,
    test_commits: BTreeMap<DocumentId, String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and registers a main-module document.
    pub fn add_document(&mut self, id: &DocumentId, text: &str) -> Result<&SyntaxTree, RewriteError> {
        self.insert(id, text, SourceSet::Main)
    }

    /// Parses and registers a test document.
    pub fn add_test_document(
        &mut self,
        id: &DocumentId,
        text: &str,
    ) -> Result<&SyntaxTree, RewriteError> {
        self.insert(id, text, SourceSet::Test)
    }

    fn insert(
        &mut self,
        id: &DocumentId,
        text: &str,
        set: SourceSet,
    ) -> Result<&SyntaxTree, RewriteError> {
        let tree = parse_module(id.as_str(), text)?;
        if set == SourceSet::Test {
            self.test_documents.insert(id.clone());
        } else {
            self.test_documents.remove(id);
        }
        self.trees.insert(id.clone(), tree);
        self.trees
            .get(id)
            .ok_or_else(|| rewrite_err!(Internal, format!("document `{id}` vanished")))
    }

    /// The committed text of a document, from either sink.
    pub fn committed(&self, id: &DocumentId) -> Option<&str> {
        self.main_commits
            .get(id)
            .or_else(|| self.test_commits.get(id))
            .map(String::as_str)
    }

    pub fn main_commits(&self) -> &BTreeMap<DocumentId, String> {
        &self.main_commits
    }

    pub fn test_commits(&self) -> &BTreeMap<DocumentId, String> {
        &self.test_commits
    }
}

impl SourceHost for MemoryHost {
    fn syntax_tree(&self, id: &DocumentId) -> Option<&SyntaxTree> {
        self.trees.get(id)
    }

    fn is_main_document(&self, id: &DocumentId) -> bool {
        self.trees.contains_key(id) && !self.test_documents.contains(id)
    }

    fn commit_main_source(&mut self, id: &DocumentId, text: String) {
        self.main_commits.insert(id.clone(), text);
    }

    fn commit_test_source(&mut self, id: &DocumentId, text: String) {
        self.test_commits.insert(id.clone(), text);
    }
}
