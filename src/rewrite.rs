//! Annotation rewriting for one document.
//!
//! A document's sites are collected in [`SiteConfigs`]. [`rewrite_module`]
//! computes a replacement for every site and rebuilds the module root in a
//! single pass. Any failing site fails the whole document.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{
    config::ToolConfig,
    diagnostics::SourceArc,
    rewrite_err,
    syntax::{Annotation, ModulePart, NodeId, SyntaxTree},
    RewriteError,
};

pub mod annotation;
pub mod merge;
pub mod rebuild;
pub mod synth;

pub use annotation::{rewrite_annotation, SiteShape};
pub use merge::merge_fields;
pub use rebuild::{rebuild, Replacements};
pub use synth::{
    synthesize_field, synthesize_literal, synthesize_mapping, DESCRIPTION_FIELD, NAME_FIELD,
    PARAMETERS_FIELD, RESERVED_FIELDS,
};

// ============================================================================
// SITES
// ============================================================================

/// An annotation attached to a named function definition.
#[derive(Debug, Clone)]
pub struct AnnotationSite {
    pub function_name: String,
    pub annotation: Arc<Annotation>,
}

/// Finds every function annotation whose reference is written as `reference`.
pub fn annotation_sites(root: &ModulePart, reference: &str) -> Vec<AnnotationSite> {
    root.function_annotations()
        .filter(|(_, annotation)| annotation.reference.name() == reference)
        .map(|(function, annotation)| AnnotationSite {
            function_name: function.name.text().to_string(),
            annotation: Arc::clone(annotation),
        })
        .collect()
}

/// Annotation sites of one document and the configuration for each.
#[derive(Debug, Clone, Default)]
pub struct SiteConfigs {
    sites: BTreeMap<NodeId, (Arc<Annotation>, ToolConfig)>,
}

impl SiteConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a site; a second config for the same annotation replaces the first.
    pub fn insert(&mut self, annotation: &Arc<Annotation>, config: ToolConfig) {
        self.sites
            .insert(annotation.id, (Arc::clone(annotation), config));
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Sites in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<Annotation>, &ToolConfig)> + '_ {
        self.sites.values().map(|(annotation, config)| (annotation, config))
    }
}

// ============================================================================
// REWRITING
// ============================================================================

/// Computes the replacement mapping, failing on the first bad site.
pub fn compute_replacements(sites: &SiteConfigs) -> Result<Replacements, RewriteError> {
    compute(sites, None)
}

fn compute(sites: &SiteConfigs, source: Option<&SourceArc>) -> Result<Replacements, RewriteError> {
    let mut replacements = Replacements::new();
    for (annotation, config) in sites.iter() {
        let replacement = rewrite_annotation(annotation, config).map_err(|e| match source {
            Some(source) => e.in_source(source, annotation.span),
            None => e,
        })?;
        replacements.insert(replacement);
    }
    Ok(replacements)
}

/// Rewrites every site of `tree` and returns the new module root.
///
/// Every site must be an annotation node of `tree` itself; a site taken from
/// another document or an earlier parse fails the document.
pub fn rewrite_module(tree: &SyntaxTree, sites: &SiteConfigs) -> Result<ModulePart, RewriteError> {
    check_sites_belong(tree, sites)?;
    let replacements = compute(sites, Some(tree.named_source()))?;
    let (root, applied) = rebuild::rebuild_tracked(tree.root(), &replacements);

    for id in replacements.ids().filter(|id| !applied.contains(id)) {
        warn!(
            document = tree.name(),
            annotation = %id,
            "annotation is not attached to a function definition; replacement not applied"
        );
    }
    debug!(document = tree.name(), sites = sites.len(), applied = applied.len(), "rewrote module");
    Ok(root)
}

fn check_sites_belong(tree: &SyntaxTree, sites: &SiteConfigs) -> Result<(), RewriteError> {
    let nodes: HashSet<NodeId> = tree.root().annotations().map(|a| a.id).collect();
    match sites.iter().find(|(annotation, _)| !nodes.contains(&annotation.id)) {
        Some((annotation, _)) => Err(rewrite_err!(
            Document,
            format!(
                "annotation {} `@{}` is not a node of document `{}`",
                annotation.id,
                annotation.reference.name(),
                tree.name()
            )
        )
        .with_help("collect annotation sites from the syntax tree being rewritten")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{syntax::parse_module, ErrorKind};

    const SOURCE: &str = "\
@ai:Tool
function sum(int a, int b) returns int {
    return a + b;
}

@display {label: \"x\"}
@ai:Tool {...base}
isolated function broken() {}

@ai:Tool {}
public function ping() returns string => \"pong\";
";

    #[test]
    fn test_finds_sites_by_reference() {
        let tree = parse_module("m.bal", SOURCE).unwrap();
        let names: Vec<_> = annotation_sites(tree.root(), "ai:Tool")
            .into_iter()
            .map(|site| site.function_name)
            .collect();
        assert_eq!(names, vec!["sum", "broken", "ping"]);
        assert_eq!(annotation_sites(tree.root(), "display").len(), 1);
    }

    #[test]
    fn test_failing_site_points_into_document() {
        let tree = parse_module("m.bal", SOURCE).unwrap();
        let mut sites = SiteConfigs::new();
        for site in annotation_sites(tree.root(), "ai:Tool") {
            sites.insert(&site.annotation, ToolConfig::new("\"t\"", None, "{}"));
        }
        let err = rewrite_module(&tree, &sites).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSiteShape);
        let broken = &annotation_sites(tree.root(), "ai:Tool")[1];
        assert_eq!(err.context().span, broken.annotation.span);
    }

    #[test]
    fn test_site_from_earlier_parse_is_rejected() {
        let text = "@ai:Tool\nfunction sum() {}\n";
        let stale = parse_module("m.bal", text).unwrap();
        let fresh = parse_module("m.bal", "@ai:Tool {x: 1}\nfunction sum() {}\n").unwrap();

        let mut sites = SiteConfigs::new();
        for site in annotation_sites(stale.root(), "ai:Tool") {
            sites.insert(&site.annotation, ToolConfig::new("\"t\"", None, "{}"));
        }
        let err = rewrite_module(&fresh, &sites).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Document);
        assert!(rewrite_module(&stale, &sites).is_ok());
    }
}
