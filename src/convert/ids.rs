//! Identifier normalization: fresh globally-unique identifiers for every
//! node, with cross-reference remapping and duplicate detection.
//!
//! Three full tree passes in strict order. Pass 1 builds the complete
//! replacement map; passes 2 and 3 rewrite single- and multi-reference
//! fields through it. The passes must not interleave: resolving references
//! against a half-built map would make the result depend on tree order.

use std::collections::{HashMap, HashSet};

use crate::model::{ModelNode, NodeType, Value};
use crate::util::IdGenerator;

/// Assign fresh identifiers throughout every tree in `roots` and rewrite
/// every reference field, sharing one replacement space so references may
/// cross tree boundaries. `seed` carries externally supplied old→new
/// mappings (from the bibliography-parsing phase). Returns human-readable
/// warnings for duplicate identifiers; unresolved references are left
/// unchanged and produce no warning (documented limitation).
pub fn normalize_ids(
    roots: &mut [ModelNode],
    seed: HashMap<String, String>,
    idgen: &mut IdGenerator,
) -> Vec<String> {
    let mut warnings = Vec::new();

    let mut replacements = seed;
    let mut taken: HashSet<String> = replacements
        .iter()
        .flat_map(|(old, new)| [old.clone(), new.clone()])
        .collect();

    // Pass 1: assign fresh identifiers, record old -> new
    for root in roots.iter_mut() {
        root.visit_mut(&mut |node| {
            // Comment nodes are never referenced externally; they always get
            // a fresh random identifier with no replacement bookkeeping.
            if node.node_type == NodeType::Comment {
                node.id = idgen.generate(node.node_type.name());
                return;
            }

            let old = std::mem::take(&mut node.id);
            if !old.is_empty() && taken.contains(&old) {
                warnings.push(format!(
                    "duplicate identifier '{}' on {} node; keeping first assignment",
                    old,
                    node.node_type.name()
                ));
                node.id = old;
                return;
            }

            let fresh = idgen.generate(node.node_type.name());
            if !old.is_empty() {
                taken.insert(old.clone());
                taken.insert(fresh.clone());
                replacements.insert(old, fresh.clone());
            }
            node.id = fresh;
        });
    }

    // Pass 2: rewrite single-reference fields
    for root in roots.iter_mut() {
        root.visit_mut(&mut |node| {
            for value in node.attrs.values_mut() {
                if let Value::Ref(rid) = value
                    && let Some(new) = replacements.get(rid)
                {
                    *rid = new.clone();
                }
            }
        });
    }

    // Pass 3: rewrite multi-reference fields, entry by entry
    for root in roots.iter_mut() {
        root.visit_mut(&mut |node| {
            for value in node.attrs.values_mut() {
                if let Value::RefList(rids) = value {
                    for rid in rids {
                        if let Some(new) = replacements.get(rid) {
                            *rid = new.clone();
                        }
                    }
                }
            }
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeType;

    fn paragraph(id: &str) -> ModelNode {
        ModelNode::with_id(NodeType::Paragraph, id)
    }

    #[test]
    fn test_fresh_ids_and_reference_rewrite() {
        let mut root = ModelNode::with_id(NodeType::Body, "");
        let mut fig = ModelNode::with_id(NodeType::Figure, "f1");
        fig.set_str("label", "Figure 1");
        let mut cite = ModelNode::new(NodeType::Citation);
        cite.set_refs("targets", vec!["f1".to_string()]);
        let mut p = paragraph("p1");
        p.children.push(cite);
        root.children.push(fig);
        root.children.push(p);

        let mut idgen = IdGenerator::with_seed(9);
        let warnings = normalize_ids(std::slice::from_mut(&mut root), HashMap::new(), &mut idgen);

        assert!(warnings.is_empty());
        let fig_id = root.children[0].id.clone();
        assert!(fig_id.starts_with("figure-"));
        assert_eq!(
            root.children[1].children[0].attrs.get("targets"),
            Some(&Value::RefList(vec![fig_id]))
        );
    }

    #[test]
    fn test_unresolved_reference_left_unchanged() {
        let mut root = ModelNode::new(NodeType::Body);
        let mut cite = ModelNode::new(NodeType::Citation);
        cite.set_refs("targets", vec!["missing".to_string()]);
        cite.set_ref("single", "also-missing");
        root.children.push(cite);

        let mut idgen = IdGenerator::with_seed(9);
        normalize_ids(std::slice::from_mut(&mut root), HashMap::new(), &mut idgen);

        let cite = &root.children[0];
        assert_eq!(
            cite.attrs.get("targets"),
            Some(&Value::RefList(vec!["missing".to_string()]))
        );
        assert_eq!(
            cite.attrs.get("single"),
            Some(&Value::Ref("also-missing".to_string()))
        );
    }

    #[test]
    fn test_duplicate_ids_warned_once_per_repeat() {
        let mut root = ModelNode::new(NodeType::Body);
        root.children.push(paragraph("dup"));
        root.children.push(paragraph("dup"));
        root.children.push(paragraph("dup"));
        root.children.push(paragraph("unique"));

        let mut idgen = IdGenerator::with_seed(3);
        let warnings = normalize_ids(std::slice::from_mut(&mut root), HashMap::new(), &mut idgen);

        // Two genuine repeats of "dup"
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("dup"));

        // The first occurrence got a mapping; repeats kept their source id
        assert!(root.children[0].id.starts_with("paragraph-"));
        assert_eq!(root.children[1].id, "dup");
        assert_eq!(root.children[2].id, "dup");
        assert!(root.children[3].id.starts_with("paragraph-"));
    }

    #[test]
    fn test_seed_map_resolves_bibliography_refs() {
        let mut root = ModelNode::new(NodeType::Body);
        let mut cite = ModelNode::new(NodeType::Citation);
        cite.set_refs("targets", vec!["r1".to_string()]);
        root.children.push(cite);

        let mut seed = HashMap::new();
        seed.insert("r1".to_string(), "reference-cafe0001".to_string());

        let mut idgen = IdGenerator::with_seed(3);
        normalize_ids(std::slice::from_mut(&mut root), seed, &mut idgen);

        assert_eq!(
            root.children[0].attrs.get("targets"),
            Some(&Value::RefList(vec!["reference-cafe0001".to_string()]))
        );
    }

    #[test]
    fn test_id_colliding_with_seed_value_is_duplicate() {
        // A source id that equals a value already in the seed map must not
        // be double-mapped
        let mut root = ModelNode::new(NodeType::Body);
        root.children.push(paragraph("reference-cafe0001"));

        let mut seed = HashMap::new();
        seed.insert("r1".to_string(), "reference-cafe0001".to_string());

        let mut idgen = IdGenerator::with_seed(3);
        let warnings = normalize_ids(std::slice::from_mut(&mut root), seed, &mut idgen);

        assert_eq!(warnings.len(), 1);
        assert_eq!(root.children[0].id, "reference-cafe0001");
    }

    #[test]
    fn test_all_ids_unique_after_normalization() {
        let mut root = ModelNode::new(NodeType::Body);
        for i in 0..50 {
            root.children.push(paragraph(&format!("p{}", i)));
        }

        let mut idgen = IdGenerator::with_seed(11);
        let warnings = normalize_ids(std::slice::from_mut(&mut root), HashMap::new(), &mut idgen);
        assert!(warnings.is_empty());

        let mut seen = HashSet::new();
        root.visit(&mut |node| {
            assert!(seen.insert(node.id.clone()), "shared id {}", node.id);
        });
    }
}

#[cfg(test)]
mod props {
    use proptest::prelude::*;

    use super::*;
    use crate::model::NodeType;

    proptest! {
        /// Distinct source identifiers always come out distinct, and every
        /// warning corresponds to a genuinely repeated source id.
        #[test]
        fn prop_normalized_ids_unique(ids in proptest::collection::vec("[a-z]{1,4}", 1..40), seed in any::<u64>()) {
            let mut root = ModelNode::new(NodeType::Body);
            for id in &ids {
                root.children.push(ModelNode::with_id(NodeType::Paragraph, id.clone()));
            }

            let mut idgen = IdGenerator::with_seed(seed);
            let warnings = normalize_ids(std::slice::from_mut(&mut root), HashMap::new(), &mut idgen);

            let mut distinct = HashSet::new();
            let repeats = ids.iter().filter(|id| !distinct.insert(id.as_str())).count();
            prop_assert_eq!(warnings.len(), repeats);

            let mut seen = HashSet::new();
            for child in &root.children {
                if child.id.starts_with("paragraph-") {
                    prop_assert!(seen.insert(child.id.clone()));
                }
            }
        }
    }
}
