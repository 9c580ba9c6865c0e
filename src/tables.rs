//! Global table construction.
//!
//! For every concrete `(namespace, local name)` pair that appears anywhere in the schema's
//! element name classes, unions the content models of every `define` whose name class accepts
//! that pair, simulates each union exactly once, assigns dense ids, and rewrites the per-element
//! `Ref`-keyed child transitions into the state-id-keyed `ChildElems` the JSON tables actually
//! consume.
//!
//! `ChildElems` is keyed by the *child's own dense state id*, stringified -- not by the child's
//! tag name. A parent state's `ChildStates` map (built by the simulator) says "a `Ref(d)` leaf
//! here leads to state `s`"; but a validator encountering a child element doesn't know which
//! `define` it is matching until it has already simulated the child and landed in some final
//! state. That final state's `NullableDefines` says which `define`s the child counts as, so this
//! builder inverts `NullableDefines` into `DefNull` (define name -> set of state ids that make it
//! nullable) and uses it to rewrite every `(d, s)` child transition into one `ChildElems` entry
//! per state id in `DefNull[d]`. This is the design's central trick; see `DESIGN.md`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::derive::deriv;
use crate::errors::{Result, RngError, RngErrorKind};
use crate::ids::{PatternId, SimStateId};
use crate::pattern::PatternKind;
use crate::simulate::SimContext;

/// A loaded grammar: every named `define`'s body, and the pattern the grammar's `start`
/// resolves to.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    /// `define` name -> body pattern.
    pub defines: BTreeMap<String, PatternId>,
    /// The pattern the grammar's `start` element resolves to.
    pub start: PatternId,
}

/// One compiled state, ready for JSON serialization.
///
/// Shaped to match the specified output exactly: `Attributes`, `ChildElems`, `IsNullable`, and
/// nothing else. `NullableDefines` is an internal detail of [`crate::simulate::SimState`] used
/// while building `ChildElems`'s state-id keys (see the module doc comment); it is not part of
/// the compiled table itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateTable {
    /// Attribute local name -> next state id. Namespaces are not distinguished here, see
    /// `DESIGN.md`.
    #[serde(rename = "Attributes")]
    pub attributes: BTreeMap<String, usize>,
    /// The completed child's own dense state id, stringified -> next state id. Not keyed by the
    /// child's tag name; see the module doc comment.
    #[serde(rename = "ChildElems")]
    pub child_elems: BTreeMap<String, usize>,
    /// Whether this state accepts an element with no further content.
    #[serde(rename = "IsNullable")]
    pub is_nullable: bool,
}

/// The compiled output: the element name lookup, and the dense state table it indexes into.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Tables {
    /// Namespace -> local name -> the dense id of the state an element of that qualified name
    /// starts in.
    #[serde(rename = "NameMap")]
    pub name_map: BTreeMap<String, BTreeMap<String, usize>>,
    /// Dense states. Index 0 is a reserved sentinel with no transitions, so a lookup that
    /// resolves to 0 reads as "no match" without a separate `Option` wrapper.
    #[serde(rename = "States")]
    pub states: Vec<StateTable>,
}

/// Collect every concrete `NsName`/`LnName` token appearing anywhere in a name-class subtree.
/// These are the schema's namespaces `N` and localnames `L` of §4.4 step 1 -- `AnyName`
/// contributes no concrete token of its own (it matches whatever `N`/`L` already contain).
fn collect_name_class_tokens(
    pats: &crate::pattern::Patterns,
    nc: PatternId,
    namespaces: &mut BTreeSet<String>,
    localnames: &mut BTreeSet<String>,
) {
    match pats.kind(nc) {
        PatternKind::NsName(ns) => {
            namespaces.insert(ns.clone());
        }
        PatternKind::LnName(name) => {
            localnames.insert(name.clone());
        }
        PatternKind::Choice(a, b) | PatternKind::Group(a, b) | PatternKind::Interleave(a, b) | PatternKind::And(a, b) => {
            let (a, b) = (*a, *b);
            collect_name_class_tokens(pats, a, namespaces, localnames);
            collect_name_class_tokens(pats, b, namespaces, localnames);
        }
        PatternKind::Not(x) => {
            let x = *x;
            collect_name_class_tokens(pats, x, namespaces, localnames);
        }
        _ => {}
    }
}

/// Compile `grammar` into dense lookup tables.
///
/// Follows §4.4 verbatim: enumerate the schema's namespaces `N` and localnames `L`, then for
/// every `(ns, ln) ∈ N × L` ask each element-producing define whether its name class accepts
/// that qualified name -- by deriving the name class against the `NsName(ns)` leaf and then the
/// `LnName(ln)` leaf and checking whether the result is nullable -- union the bodies of every
/// define that does, and simulate that union once.
pub fn build_tables(grammar: &Grammar, ctx: &mut SimContext) -> Result<Tables> {
    // Every element-producing define, plus (if the schema is a single bare `<element>` with no
    // `<grammar>` wrapper) a synthetic entry for `start` itself -- `start` otherwise resolves to
    // a `Ref` into `grammar.defines` already and contributes nothing new here. A BTreeMap, not a
    // HashMap: the order candidates are visited in below determines which dense id each state
    // gets, so a fixed (lexicographic) visitation order is what makes two compiles of the same
    // schema produce byte-identical output (SPEC_FULL.md's idempotence property).
    let mut elements: Vec<(String, PatternId, PatternId)> = grammar
        .defines
        .iter()
        .filter_map(|(name, &body)| match ctx.patterns.kind(body) {
            PatternKind::Element(nc, content) => Some((name.clone(), *nc, *content)),
            _ => None,
        })
        .collect();
    if let PatternKind::Element(nc, content) = ctx.patterns.kind(grammar.start) {
        elements.push(("__start".to_string(), *nc, *content));
    }

    let mut namespaces = BTreeSet::new();
    let mut localnames = BTreeSet::new();
    for (_, nc, _) in &elements {
        collect_name_class_tokens(&ctx.patterns, *nc, &mut namespaces, &mut localnames);
    }
    debug!(
        "{} element-producing defines, {} namespaces x {} localnames to cross",
        elements.len(),
        namespaces.len(),
        localnames.len()
    );

    let mut name_map: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for ns in &namespaces {
        for ln in &localnames {
            let ns_leaf = ctx.patterns.ns_name(ns.clone());
            let ln_leaf = ctx.patterns.ln_name(ln.clone());

            let mut matches: Vec<(String, PatternId)> = Vec::new();
            for (name, nc, content) in &elements {
                let after_ns = deriv(&mut ctx.patterns, *nc, ns_leaf)?;
                let after_ln = deriv(&mut ctx.patterns, after_ns, ln_leaf)?;
                if ctx.patterns.nullable(after_ln) {
                    matches.push((name.clone(), *content));
                }
            }
            if matches.is_empty() {
                continue;
            }

            // Wrap each matching define's content in `Define(name, content)` before unioning --
            // per §4.4 this is what lets the simulator's `NullableDefines` later attribute "this
            // state satisfies define d" to the specific define, rather than losing that
            // provenance in the union.
            let mut union = ctx.patterns.not_allowed();
            for (name, content) in matches {
                let defined = ctx.patterns.define(name, content);
                union = ctx.patterns.choice(union, defined);
            }

            let sim_id = ctx.simulate(union)?;
            name_map
                .entry(ns.clone())
                .or_default()
                .insert(ln.clone(), dense_id(sim_id));
        }
    }

    // DefNull[d] = the set of dense state ids whose NullableDefines contains d. Built once, over
    // every state discovered by every per-name-class simulation above -- a define can become
    // nullable in states reached from more than one element's content model.
    let mut def_null: HashMap<String, BTreeSet<usize>> = HashMap::new();
    for (index, sim_state) in ctx.states.iter().enumerate() {
        let dense = index + 1;
        for name in &sim_state.nullable_defines {
            def_null.entry(name.clone()).or_default().insert(dense);
        }
    }

    let mut states = vec![StateTable::default()];
    for sim_state in &ctx.states {
        let mut attributes = BTreeMap::new();
        for (leaf, next) in &sim_state.attr_states {
            let PatternKind::Attribute(ns, local) = ctx.patterns.kind(*leaf).clone() else {
                return Err(RngError::new(RngErrorKind::InternalInvariantViolated(
                    "attr_states keyed by a non-attribute leaf".to_string(),
                )));
            };
            let key = if ns.is_empty() {
                local
            } else {
                format!("{{{ns}}}{local}")
            };
            attributes.insert(key, dense_id(*next));
        }

        let mut child_elems = BTreeMap::new();
        for (leaf, next) in &sim_state.child_states {
            let PatternKind::Ref(name) = ctx.patterns.kind(*leaf).clone() else {
                return Err(RngError::new(RngErrorKind::InternalInvariantViolated(
                    "child_states keyed by a non-ref leaf".to_string(),
                )));
            };
            if !grammar.defines.contains_key(&name) {
                return Err(RngError::new(RngErrorKind::UndefinedReference(name)));
            }
            let next_dense = dense_id(*next);
            // A define that is never nullable anywhere can never be the define a child
            // "completes" as, so it contributes no ChildElems entry (e.g. an element-producing
            // define whose own content model never permits ending the element).
            let Some(state_ids) = def_null.get(&name) else {
                continue;
            };
            for &state_id in state_ids {
                let key = state_id.to_string();
                if let Some(&existing) = child_elems.get(&key) {
                    if existing != next_dense {
                        return Err(RngError::new(RngErrorKind::AmbiguousChildTransition(
                            name.clone(),
                            existing,
                            next_dense,
                        )));
                    }
                } else {
                    child_elems.insert(key, next_dense);
                }
            }
        }

        states.push(StateTable {
            attributes,
            child_elems,
            is_nullable: sim_state.is_nullable,
        });
    }

    Ok(Tables { name_map, states })
}

fn dense_id(id: SimStateId) -> usize {
    id.as_usize() + 1
}
