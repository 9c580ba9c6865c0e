//! Per-element state machine construction.
//!
//! Given the union content pattern for a `(namespace, local name)` pair, [`SimContext::simulate`]
//! runs a subset-construction-style BFS over pattern derivatives until no new states appear,
//! producing the attribute and child-element transition tables consumed by the table builder.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::trace;

use crate::derive::deriv;
use crate::errors::{Result, RngError, RngErrorKind};
use crate::ids::{PatternId, SimStateId};
use crate::pattern::{PatternKind, Patterns};

/// One state of the per-element DFA.
#[derive(Debug, Clone, Default)]
pub struct SimState {
    /// Transitions keyed by the attribute leaf pattern that triggers them.
    pub attr_states: BTreeMap<PatternId, SimStateId>,
    /// Transitions keyed by the child-element leaf pattern (a `Ref`) that triggers them.
    pub child_states: BTreeMap<PatternId, SimStateId>,
    /// Names of `define`s whose body is nullable in this state.
    pub nullable_defines: BTreeSet<String>,
    /// Whether the content pattern backing this state accepts empty content.
    pub is_nullable: bool,
}

/// State shared across every per-element simulation run during one compile: the pattern arena,
/// the map from derived pattern to the state representing it, and the states themselves.
///
/// This is deliberately not reset between elements. Two different elements whose content models
/// derive down to the same pattern end up pointing at the same [`SimState`], so the table builder
/// only ever sees each distinct reachable pattern once.
#[derive(Debug, Default)]
pub struct SimContext {
    /// The hash-cons table patterns are built and derived in.
    pub patterns: Patterns,
    pattern_to_state: HashMap<PatternId, SimStateId>,
    /// States discovered so far, indexed by `SimStateId`.
    pub states: Vec<SimState>,
}

impl SimContext {
    /// Create an empty, shared simulation context.
    pub fn new() -> Self {
        Self::default()
    }

    fn state_for(
        &mut self,
        pattern: PatternId,
        worklist: &mut Vec<(PatternId, SimStateId)>,
    ) -> SimStateId {
        if let Some(&id) = self.pattern_to_state.get(&pattern) {
            return id;
        }
        let id = SimStateId::new(self.states.len());
        self.states.push(SimState {
            is_nullable: self.patterns.nullable(pattern),
            ..SimState::default()
        });
        self.pattern_to_state.insert(pattern, id);
        worklist.push((pattern, id));
        trace!("new state {id} for pattern {pattern}");
        id
    }

    /// Run (or resume) the BFS for `start`, returning its state id. Safe to call repeatedly
    /// across elements: a pattern already mapped to a state from a prior call is not
    /// reprocessed, it just contributes its existing state id.
    pub fn simulate(&mut self, start: PatternId) -> Result<SimStateId> {
        // Fixed for the whole BFS, per spec.md §4.3/§9: every state discovered while exploring
        // `start` derives against *this* leaf set, not its own. Recomputing per-state would miss
        // transitions that only a different branch of `start` introduces (see DESIGN.md).
        let mut leaves = Vec::new();
        collect_leaves(&self.patterns, start, &mut leaves);

        let mut worklist = Vec::new();
        let start_id = self.state_for(start, &mut worklist);
        while let Some((pattern, state_id)) = worklist.pop() {
            let mut nullable_defines = BTreeSet::new();
            collect_nullable_defines(&self.patterns, pattern, &mut nullable_defines);

            let mut attr_states = BTreeMap::new();
            let mut child_states = BTreeMap::new();
            for &leaf in &leaves {
                let next = deriv(&mut self.patterns, pattern, leaf)?;
                if matches!(self.patterns.kind(next), PatternKind::NotAllowed) {
                    continue;
                }
                let next_id = self.state_for(next, &mut worklist);
                match self.patterns.kind(leaf) {
                    PatternKind::Attribute(..) => {
                        attr_states.insert(leaf, next_id);
                    }
                    PatternKind::Ref(_) => {
                        child_states.insert(leaf, next_id);
                    }
                    other => {
                        return Err(RngError::new(RngErrorKind::InternalInvariantViolated(
                            format!("collect_leaves yielded a non-leaf kind: {other:?}"),
                        )))
                    }
                }
            }

            let state = &mut self.states[state_id];
            state.attr_states = attr_states;
            state.child_states = child_states;
            state.nullable_defines = nullable_defines;
        }
        trace!("simulate({start}) -> state {start_id}, {} states total", self.states.len());
        Ok(start_id)
    }
}

/// Collect the distinct `Attribute` and `Ref` leaves reachable from `p`. Name-class patterns
/// (`AnyName`/`NsName`/`LnName`) are never themselves leaves of a content pattern, and an
/// `Element` body is never reached without going through the `Ref` standing for it.
fn collect_leaves(pats: &Patterns, p: PatternId, out: &mut Vec<PatternId>) {
    use PatternKind::*;
    match pats.kind(p) {
        NotAllowed | Empty | Text | AnyName | NsName(_) | LnName(_) => {}
        Ref(_) | Attribute(..) => {
            if !out.contains(&p) {
                out.push(p);
            }
        }
        OneOrMore(x) => collect_leaves(pats, *x, out),
        Choice(a, b) | Group(a, b) | Interleave(a, b) | And(a, b) => {
            let (a, b) = (*a, *b);
            collect_leaves(pats, a, out);
            collect_leaves(pats, b, out);
        }
        Define(_, body) => collect_leaves(pats, *body, out),
        Not(x) => collect_leaves(pats, *x, out),
        Element(..) => {}
    }
}

/// Collect the names of `define`s reachable from `p` whose body is currently nullable.
fn collect_nullable_defines(pats: &Patterns, p: PatternId, out: &mut BTreeSet<String>) {
    use PatternKind::*;
    match pats.kind(p) {
        NotAllowed | Empty | Text | Ref(_) | Attribute(..) | AnyName | NsName(_) | LnName(_) => {}
        OneOrMore(x) => collect_nullable_defines(pats, *x, out),
        Choice(a, b) | Group(a, b) | Interleave(a, b) | And(a, b) => {
            let (a, b) = (*a, *b);
            collect_nullable_defines(pats, a, out);
            collect_nullable_defines(pats, b, out);
        }
        Define(name, body) => {
            let (name, body) = (name.clone(), *body);
            if pats.nullable(body) {
                out.insert(name);
            }
            collect_nullable_defines(pats, body, out);
        }
        Not(x) => collect_nullable_defines(pats, *x, out),
        Element(..) => {}
    }
}
