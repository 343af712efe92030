//! Tree rebuilding: substitutes replacement annotations by node identity.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::syntax::{Annotation, FunctionDefinition, Member, Metadata, ModulePart, NodeId};

/// Replacement annotations keyed by the id of the node they replace.
#[derive(Debug, Clone, Default)]
pub struct Replacements {
    map: HashMap<NodeId, Arc<Annotation>>,
}

impl Replacements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `replacement` for the annotation with the same id.
    pub fn insert(&mut self, replacement: Annotation) {
        self.map.insert(replacement.id, Arc::new(replacement));
    }

    pub fn get(&self, id: NodeId) -> Option<&Arc<Annotation>> {
        self.map.get(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.map.keys().copied()
    }
}

/// Rebuilds the module root with every mapped annotation replaced.
///
/// Members without a replaced annotation are shared with `root`.
pub fn rebuild(root: &ModulePart, replacements: &Replacements) -> ModulePart {
    rebuild_tracked(root, replacements).0
}

/// Like [`rebuild`], also returning the ids that were actually replaced.
pub(crate) fn rebuild_tracked(
    root: &ModulePart,
    replacements: &Replacements,
) -> (ModulePart, HashSet<NodeId>) {
    let mut applied = HashSet::new();
    if replacements.is_empty() {
        return (root.clone(), applied);
    }

    let mut members = root.members().clone();
    for (index, member) in root.members().iter().enumerate() {
        let Member::Function(function) = member else {
            continue;
        };
        if let Some(function) = rebuild_function(function, replacements, &mut applied) {
            members.set(index, Member::Function(Arc::new(function)));
        }
    }
    (root.with_members(members), applied)
}

fn rebuild_function(
    function: &FunctionDefinition,
    replacements: &Replacements,
    applied: &mut HashSet<NodeId>,
) -> Option<FunctionDefinition> {
    let metadata = function.metadata.as_ref()?;
    let mut changed = false;

    let annotations = metadata
        .annotations
        .iter()
        .map(|annotation| match replacements.get(annotation.id) {
            Some(replacement) => {
                changed = true;
                applied.insert(annotation.id);
                Arc::clone(replacement)
            }
            None => Arc::clone(annotation),
        })
        .collect();

    changed.then(|| function.with_metadata(Metadata { annotations }))
}
