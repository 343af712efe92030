// tests/commit_tests.rs

mod common;

use std::collections::BTreeMap;

use annotweave::{
    commit::{MemoryHost, SourceSet},
    rewrite::annotation_sites,
    syntax::{parse_module, SyntaxTree},
    DocumentId, ErrorKind, SourceHost, SourceModifier, ToolConfig,
};
use common::{sum_tool, tool, CALCULATOR};

/// Registers every `ai:Tool` site of the document with `config`.
fn add_sites(
    modifier: &mut SourceModifier,
    host: &MemoryHost,
    id: &DocumentId,
    config: &ToolConfig,
) {
    let tree = host.syntax_tree(id).unwrap();
    for site in annotation_sites(tree.root(), "ai:Tool") {
        modifier.add_site(id, &site.annotation, config.clone());
    }
}

#[test]
fn test_documents_are_routed_by_source_set() {
    let mut host = MemoryHost::new();
    let main = DocumentId::new("main.bal");
    let test = DocumentId::new("tests/main_test.bal");
    host.add_document(&main, "@ai:Tool\nfunction sum() {}\n").unwrap();
    host.add_test_document(&test, "@ai:Tool {}\nfunction sum() {}\n").unwrap();

    let mut modifier = SourceModifier::new();
    add_sites(&mut modifier, &host, &main, &sum_tool());
    add_sites(&mut modifier, &host, &test, &sum_tool());

    let report = modifier.modify(&mut host);
    assert!(report.is_success());
    assert_eq!(
        report.committed,
        vec![(main.clone(), SourceSet::Main), (test.clone(), SourceSet::Test)]
    );
    assert!(host.main_commits().contains_key(&main));
    assert!(host.test_commits().contains_key(&test));
    assert!(!host.main_commits().contains_key(&test));
    assert_eq!(
        host.committed(&test),
        Some("@ai:Tool {name:\"sum\",description:\"adds\",parameters:{}}\nfunction sum() {}\n")
    );
}

#[test]
fn test_failing_document_is_not_committed() {
    let mut host = MemoryHost::new();
    let good = DocumentId::new("good.bal");
    let bad = DocumentId::new("bad.bal");
    host.add_document(&good, CALCULATOR).unwrap();
    host.add_document(&bad, CALCULATOR).unwrap();

    let mut modifier = SourceModifier::new();
    add_sites(&mut modifier, &host, &good, &sum_tool());
    add_sites(&mut modifier, &host, &bad, &tool("\"sum\"", None, "{type: "));

    let report = modifier.modify(&mut host);
    assert!(!report.is_success());
    assert_eq!(report.committed, vec![(good.clone(), SourceSet::Main)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, bad);
    assert_eq!(report.failed[0].1.kind(), ErrorKind::MalformedConfigValue);
    assert!(host.committed(&bad).is_none());
    assert!(host.committed(&good).is_some());
}

#[test]
fn test_unknown_document_reports_document_error() {
    let mut host = MemoryHost::new();
    let tree = parse_module("elsewhere.bal", "@ai:Tool\nfunction f() {}\n").unwrap();
    let (_, annotation) = tree.root().function_annotations().next().unwrap();

    let mut modifier = SourceModifier::new();
    let id = DocumentId::new("elsewhere.bal");
    modifier.add_site(&id, annotation, sum_tool());

    let report = modifier.modify(&mut host);
    assert!(report.committed.is_empty());
    assert_eq!(report.failed[0].1.kind(), ErrorKind::Document);
}

#[test]
fn test_site_registered_under_other_document_fails_it() {
    let mut host = MemoryHost::new();
    let a = DocumentId::new("a.bal");
    let b = DocumentId::new("b.bal");
    host.add_document(&a, "@ai:Tool {secret: 1}\nfunction a() {}\n").unwrap();
    host.add_document(&b, "@ai:Tool\nfunction b() {}\n").unwrap();

    let site_from_a = annotation_sites(host.syntax_tree(&a).unwrap().root(), "ai:Tool")
        .remove(0)
        .annotation;
    let mut modifier = SourceModifier::new();
    modifier.add_site(&b, &site_from_a, tool("\"b\"", None, "{}"));

    let report = modifier.modify(&mut host);
    assert!(report.committed.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, b);
    assert_eq!(report.failed[0].1.kind(), ErrorKind::Document);
    assert!(host.committed(&b).is_none());
}

/// A host that records commits in order, as a build tool would.
#[derive(Default)]
struct RecordingHost {
    trees: BTreeMap<DocumentId, SyntaxTree>,
    commits: Vec<(SourceSet, DocumentId, String)>,
}

impl SourceHost for RecordingHost {
    fn syntax_tree(&self, id: &DocumentId) -> Option<&SyntaxTree> {
        self.trees.get(id)
    }

    fn is_main_document(&self, id: &DocumentId) -> bool {
        !id.as_str().starts_with("tests/")
    }

    fn commit_main_source(&mut self, id: &DocumentId, text: String) {
        self.commits.push((SourceSet::Main, id.clone(), text));
    }

    fn commit_test_source(&mut self, id: &DocumentId, text: String) {
        self.commits.push((SourceSet::Test, id.clone(), text));
    }
}

#[test]
fn test_custom_host_receives_rewritten_text() {
    let id = DocumentId::new("tests/calc_test.bal");
    let tree = parse_module(id.as_str(), CALCULATOR).unwrap();
    let sites = annotation_sites(tree.root(), "ai:Tool");

    let mut modifier = SourceModifier::new();
    for site in &sites {
        let config = tool(&format!("\"{}\"", site.function_name), None, "{}");
        modifier.add_site(&id, &site.annotation, config);
    }

    let mut host = RecordingHost::default();
    host.trees.insert(id.clone(), tree);
    let report = modifier.modify(&mut host);
    assert!(report.is_success());

    assert_eq!(host.commits.len(), 1);
    let (set, committed_id, text) = &host.commits[0];
    assert_eq!(*set, SourceSet::Test);
    assert_eq!(committed_id, &id);
    assert!(text.contains("@ai:Tool {name:\"sum\",description:\"sum\",parameters:{}}\nisolated function sum"));
    assert!(text.contains("    description:\"mult\",\n"));
    assert!(text.contains("@ai:Tool {name:\"ping\",description:\"ping\",parameters:{}}\nfunction ping"));
}
