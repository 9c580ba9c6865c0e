//! Schema loading: turns a RELAX NG simple-syntax XML document into a [`Grammar`] of patterns
//! interned into a [`SimContext`]'s pattern arena.
//!
//! Datatype and text-content validation are out of scope, so `data`, `value`, and `list` all
//! load as plain `Text`; `mixed(p)` still loads faithfully as `Interleave(Text, p)`, since that
//! is just how mixed content is defined in terms of the rest of the algebra.
//!
//! An `element` construct is only allowed to sit directly at the body of a `define` or `start`.
//! Anywhere else it is hoisted into a synthetic `define` (named `__anonN`) and replaced with a
//! `Ref` to it, so the table builder always finds an `Element` node directly behind every `Ref`
//! used as a child transition.

use std::collections::BTreeMap;

use roxmltree::{Document, Node};

use crate::errors::{Result, RngError, RngErrorKind};
use crate::ids::PatternId;
use crate::pattern::{PatternKind, Patterns};
use crate::simulate::SimContext;
use crate::tables::Grammar;

const RNG_NS: &str = "http://relaxng.org/ns/structure/1.0";

/// Parse `xml` as a RELAX NG simple-syntax schema.
pub fn load(ctx: &mut SimContext, xml: &str) -> Result<Grammar> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    let mut defines = BTreeMap::new();
    let mut anon = 0usize;
    let start = match root.tag_name().name() {
        "grammar" => load_grammar(ctx, root, &mut defines, &mut anon)?,
        _ => load_pattern(ctx, root, &mut defines, &mut anon, true)?,
    };
    Ok(Grammar { defines, start })
}

fn check_ns(node: Node) -> Result<()> {
    match node.tag_name().namespace() {
        Some(ns) if ns == RNG_NS => Ok(()),
        _ => Err(RngError::new(RngErrorKind::SchemaWrongNamespace(
            node.tag_name().name().to_string(),
        ))),
    }
}

fn element_children(node: Node) -> impl Iterator<Item = Node> {
    node.children().filter(|n| n.is_element())
}

fn missing(tag: &str) -> RngError {
    RngError::new(RngErrorKind::SchemaUnknownElement(tag.to_string()))
}

fn load_grammar(
    ctx: &mut SimContext,
    node: Node,
    defines: &mut BTreeMap<String, PatternId>,
    anon: &mut usize,
) -> Result<PatternId> {
    check_ns(node)?;
    let mut start = None;
    for child in element_children(node) {
        check_ns(child)?;
        match child.tag_name().name() {
            "start" => {
                let body = element_children(child).next().ok_or_else(|| missing("start"))?;
                start = Some(load_pattern(ctx, body, defines, anon, true)?);
            }
            "define" => load_define(ctx, child, defines, anon)?,
            other => return Err(missing(other)),
        }
    }
    start.ok_or_else(|| missing("start"))
}

fn load_define(
    ctx: &mut SimContext,
    node: Node,
    defines: &mut BTreeMap<String, PatternId>,
    anon: &mut usize,
) -> Result<()> {
    let name = node.attribute("name").ok_or_else(|| missing("define"))?.to_string();
    let body_node = element_children(node).next().ok_or_else(|| missing("define"))?;
    let body = load_pattern(ctx, body_node, defines, anon, true)?;
    defines.insert(name, body);
    Ok(())
}

/// Resolve an `except` child of an `anyName`/`nsName` node, if present, into `Not(x)` `And`-ed
/// onto `base`, per distilled §6 ("`except` under a name-class is `Not(x)`"). Returns `base`
/// unchanged when there is no `except` child.
fn apply_except(ctx: &mut SimContext, node: Node, base: PatternId) -> Result<PatternId> {
    let Some(except) = element_children(node).find(|c| c.tag_name().name() == "except") else {
        return Ok(base);
    };
    let excluded_node = element_children(except)
        .next()
        .ok_or_else(|| missing("except"))?;
    let excluded = load_name_class_node(ctx, excluded_node)?;
    let not_excluded = ctx.patterns.not(excluded);
    Ok(ctx.patterns.and(base, not_excluded))
}

/// Interpret a single name-class node (`name`, `anyName`, or `nsName`, with an optional nested
/// `except`) as a pattern. Shared between `load_name_class`'s nested-child form and `except`'s own
/// recursive resolution, since an `except` target is itself a name class of the same shape.
fn load_name_class_node(ctx: &mut SimContext, node: Node) -> Result<PatternId> {
    match node.tag_name().name() {
        "name" => {
            let ns = node.attribute("ns").unwrap_or_default();
            let ns_name = ctx.patterns.ns_name(ns);
            let ln_name = ctx.patterns.ln_name(node.text().unwrap_or_default());
            Ok(ctx.patterns.group(ns_name, ln_name))
        }
        "anyName" => {
            let any = ctx.patterns.any_name();
            apply_except(ctx, node, any)
        }
        "nsName" => {
            let ns = node.attribute("ns").unwrap_or_default();
            let base = ctx.patterns.ns_name(ns);
            apply_except(ctx, node, base)
        }
        other => Err(RngError::new(RngErrorKind::AttrNameClassUnsupported(
            other.to_string(),
        ))),
    }
}

/// Resolve an `element`/`attribute` node's name class, either from a `name` attribute (the
/// common simple-syntax shorthand) or from a leading `<name>`/`<anyName>`/`<nsName>` child.
/// Returns the name class pattern plus the node's remaining, non-name-class children.
///
/// A concrete name -- whether given as the `name="..."` shorthand or as a nested `<name>`
/// child -- loads as `Group(NsName(ns), LnName(local))`, exactly the desugaring distilled §6
/// specifies; `ns` defaults to `""` when no `ns` attribute is present. This is what lets the
/// table builder's namespace-aware `(ns, local)` cross product (see `tables::build_tables`)
/// see a real namespace instead of always matching the default one. An `anyName`/`nsName` child
/// may itself carry a nested `except`, resolved by `apply_except` into `And(base, Not(excluded))`.
fn load_name_class<'a, 'input>(
    ctx: &mut SimContext,
    node: Node<'a, 'input>,
    tag: &str,
) -> Result<(PatternId, Vec<Node<'a, 'input>>)> {
    if let Some(name) = node.attribute("name") {
        let ns = node.attribute("ns").unwrap_or_default();
        let ns_name = ctx.patterns.ns_name(ns);
        let ln_name = ctx.patterns.ln_name(name);
        let nc = ctx.patterns.group(ns_name, ln_name);
        return Ok((nc, element_children(node).collect()));
    }
    let mut children = element_children(node);
    let first = children.next().ok_or_else(|| {
        RngError::new(RngErrorKind::AttrNameClassUnsupported(tag.to_string()))
    })?;
    let nc = load_name_class_node(ctx, first)?;
    Ok((nc, children.collect()))
}

fn load_element(
    ctx: &mut SimContext,
    node: Node,
    defines: &mut BTreeMap<String, PatternId>,
    anon: &mut usize,
    top: bool,
) -> Result<PatternId> {
    let (name_class, body_children) = load_name_class(ctx, node, "element")?;
    let body = load_sequence(ctx, &body_children, defines, anon)?;
    let element_pat = ctx.patterns.element(name_class, body);
    if top {
        return Ok(element_pat);
    }
    let synth = format!("__anon{anon}");
    *anon += 1;
    defines.insert(synth.clone(), element_pat);
    Ok(ctx.patterns.reference(synth))
}

fn load_attribute(ctx: &mut SimContext, node: Node) -> Result<PatternId> {
    let (name_class, _value_children) = load_name_class(ctx, node, "attribute")?;
    match ctx.patterns.kind(name_class).clone() {
        PatternKind::Group(ns_id, local_id) => {
            match (ctx.patterns.kind(ns_id).clone(), ctx.patterns.kind(local_id).clone()) {
                (PatternKind::NsName(ns), PatternKind::LnName(local)) => {
                    Ok(ctx.patterns.attribute(ns, local))
                }
                _ => Err(RngError::new(RngErrorKind::AttrNameClassUnsupported(
                    "attribute name class must be a single name".to_string(),
                ))),
            }
        }
        _ => Err(RngError::new(RngErrorKind::AttrNameClassUnsupported(
            "attribute name class must be a single name".to_string(),
        ))),
    }
}

fn load_sequence(
    ctx: &mut SimContext,
    nodes: &[Node],
    defines: &mut BTreeMap<String, PatternId>,
    anon: &mut usize,
) -> Result<PatternId> {
    let mut acc = ctx.patterns.empty();
    for node in nodes {
        let pat = load_pattern(ctx, *node, defines, anon, false)?;
        acc = ctx.patterns.group(acc, pat);
    }
    Ok(acc)
}

fn load_single_child(
    ctx: &mut SimContext,
    node: Node,
    defines: &mut BTreeMap<String, PatternId>,
    anon: &mut usize,
) -> Result<PatternId> {
    let child = element_children(node)
        .next()
        .ok_or_else(|| missing(node.tag_name().name()))?;
    load_pattern(ctx, child, defines, anon, false)
}

fn load_fold(
    ctx: &mut SimContext,
    node: Node,
    defines: &mut BTreeMap<String, PatternId>,
    anon: &mut usize,
    op: fn(&mut Patterns, PatternId, PatternId) -> PatternId,
) -> Result<PatternId> {
    let mut children = element_children(node);
    let first = children.next().ok_or_else(|| missing(node.tag_name().name()))?;
    let mut acc = load_pattern(ctx, first, defines, anon, false)?;
    for child in children {
        let pat = load_pattern(ctx, child, defines, anon, false)?;
        acc = op(&mut ctx.patterns, acc, pat);
    }
    Ok(acc)
}

fn load_pattern(
    ctx: &mut SimContext,
    node: Node,
    defines: &mut BTreeMap<String, PatternId>,
    anon: &mut usize,
    top: bool,
) -> Result<PatternId> {
    check_ns(node)?;
    match node.tag_name().name() {
        "element" => load_element(ctx, node, defines, anon, top),
        "attribute" => load_attribute(ctx, node),
        "ref" => {
            let name = node.attribute("name").ok_or_else(|| missing("ref"))?;
            Ok(ctx.patterns.reference(name))
        }
        "empty" => Ok(ctx.patterns.empty()),
        "text" => Ok(ctx.patterns.text()),
        "notAllowed" => Ok(ctx.patterns.not_allowed()),
        "data" | "value" | "list" => Ok(ctx.patterns.text()),
        "mixed" => {
            let inner = load_single_child(ctx, node, defines, anon)?;
            let text = ctx.patterns.text();
            Ok(ctx.patterns.interleave(text, inner))
        }
        "optional" => {
            let inner = load_single_child(ctx, node, defines, anon)?;
            Ok(ctx.patterns.optional(inner))
        }
        "zeroOrMore" => {
            let inner = load_single_child(ctx, node, defines, anon)?;
            let rep = ctx.patterns.one_or_more(inner);
            Ok(ctx.patterns.optional(rep))
        }
        "oneOrMore" => {
            let inner = load_single_child(ctx, node, defines, anon)?;
            Ok(ctx.patterns.one_or_more(inner))
        }
        "choice" => load_fold(ctx, node, defines, anon, Patterns::choice),
        "group" => load_fold(ctx, node, defines, anon, Patterns::group),
        "interleave" => load_fold(ctx, node, defines, anon, Patterns::interleave),
        other => Err(missing(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_load_bare_element() {
        init();
        let mut ctx = SimContext::new();
        let xml = r#"<element name="root" xmlns="http://relaxng.org/ns/structure/1.0">
            <attribute name="id"><text/></attribute>
        </element>"#;
        let grammar = load(&mut ctx, xml).unwrap();
        assert!(matches!(
            ctx.patterns.kind(grammar.start),
            PatternKind::Element(..)
        ));
    }

    #[test]
    fn test_load_grammar_with_define_and_ref() {
        init();
        let xml = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
            <start><ref name="Root"/></start>
            <define name="Root">
                <element name="root">
                    <optional><ref name="Root"/></optional>
                </element>
            </define>
        </grammar>"#;
        let mut ctx = SimContext::new();
        let grammar = load(&mut ctx, xml).unwrap();
        assert!(matches!(ctx.patterns.kind(grammar.start), PatternKind::Ref(name) if name == "Root"));
        assert!(grammar.defines.contains_key("Root"));
    }

    #[test]
    fn test_nested_element_is_hoisted() {
        init();
        let xml = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
            <start>
                <element name="root">
                    <element name="child"><empty/></element>
                </element>
            </start>
        </grammar>"#;
        let mut ctx = SimContext::new();
        let grammar = load(&mut ctx, xml).unwrap();
        // One synthetic define was created for the nested <element name="child">.
        assert!(grammar.defines.contains_key("__anon0"));
        let hoisted = grammar.defines["__anon0"];
        assert!(matches!(ctx.patterns.kind(hoisted), PatternKind::Element(..)));
    }

    #[test]
    fn test_wrong_namespace_is_rejected() {
        init();
        let mut ctx = SimContext::new();
        let xml = r#"<element name="root" xmlns="urn:not-relaxng"><empty/></element>"#;
        let err = load(&mut ctx, xml).unwrap_err();
        assert!(matches!(*err.source, RngErrorKind::SchemaWrongNamespace(_)));
    }

    #[test]
    fn test_attribute_wildcard_name_class_is_rejected() {
        init();
        let mut ctx = SimContext::new();
        let xml = r#"<element name="root" xmlns="http://relaxng.org/ns/structure/1.0">
            <attribute><anyName/></attribute>
        </element>"#;
        let err = load(&mut ctx, xml).unwrap_err();
        assert!(matches!(
            *err.source,
            RngErrorKind::AttrNameClassUnsupported(_)
        ));
    }

    #[test]
    fn test_any_name_except_excludes_named_element() {
        init();
        let mut ctx = SimContext::new();
        let xml = r#"<element xmlns="http://relaxng.org/ns/structure/1.0">
            <anyName><except><name>excluded</name></except></anyName>
            <empty/>
        </element>"#;
        let grammar = load(&mut ctx, xml).unwrap();
        let nc = match ctx.patterns.kind(grammar.start) {
            PatternKind::Element(nc, _) => *nc,
            other => panic!("expected an element pattern, got {other:?}"),
        };
        assert!(matches!(ctx.patterns.kind(nc), PatternKind::And(..)));

        let ns = ctx.patterns.ns_name("");
        let after_ns = crate::derive::deriv(&mut ctx.patterns, nc, ns).unwrap();

        let excluded_ln = ctx.patterns.ln_name("excluded");
        let after_excluded = crate::derive::deriv(&mut ctx.patterns, after_ns, excluded_ln).unwrap();
        assert!(!ctx.patterns.nullable(after_excluded));

        let other_ln = ctx.patterns.ln_name("other");
        let after_other = crate::derive::deriv(&mut ctx.patterns, after_ns, other_ln).unwrap();
        assert!(ctx.patterns.nullable(after_other));
    }
}
