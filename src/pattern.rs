//! This module contains the pattern algebra.
//! Patterns are nodes of a hash-consed DAG: two constructor calls that are algebraically
//! equivalent under the normal-form rules below return the same [`PatternId`]. Canonicalization
//! is syntactic, not semantic -- see the smart constructors for the identities that are applied.

use std::collections::HashMap;

use crate::ids::PatternId;

/// The kind of a pattern node, together with its children. This is also the hash-cons key: two
/// nodes with equal kinds (and hence equal children, by induction) share one [`PatternId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PatternKind {
    NotAllowed,
    Empty,
    Text,
    Ref(String),
    Attribute(String, String),
    OneOrMore(PatternId),
    Choice(PatternId, PatternId),
    Group(PatternId, PatternId),
    Interleave(PatternId, PatternId),
    Element(PatternId, PatternId),
    Define(String, PatternId),
    And(PatternId, PatternId),
    Not(PatternId),
    AnyName,
    NsName(String),
    LnName(String),
}

#[derive(Debug, Clone)]
pub(crate) struct PatternNode {
    pub(crate) kind: PatternKind,
    pub(crate) nullable: bool,
}

/// The hash-cons table for patterns, and the home of the algebra's smart constructors.
///
/// Patterns accumulate monotonically for the lifetime of one compile; nothing is ever removed.
/// A caller compiling multiple schemas in parallel must use one `Patterns` table per schema.
#[derive(Debug, Default)]
pub struct Patterns {
    nodes: Vec<PatternNode>,
    interner: HashMap<PatternKind, PatternId>,
}

impl Patterns {
    /// Create an empty pattern table.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn kind(&self, id: PatternId) -> &PatternKind {
        &self.nodes[id].kind
    }

    /// Get the nullability of a pattern. Computed once, at construction time.
    pub fn nullable(&self, id: PatternId) -> bool {
        self.nodes[id].nullable
    }

    fn intern(&mut self, kind: PatternKind) -> PatternId {
        if let Some(&id) = self.interner.get(&kind) {
            return id;
        }
        let nullable = self.compute_nullable(&kind);
        let id = PatternId::new(self.nodes.len());
        self.nodes.push(PatternNode {
            kind: kind.clone(),
            nullable,
        });
        self.interner.insert(kind, id);
        id
    }

    fn compute_nullable(&self, kind: &PatternKind) -> bool {
        use PatternKind::*;
        match kind {
            NotAllowed => false,
            Empty | Text => true,
            Ref(_) => false,
            Attribute(..) => false,
            OneOrMore(x) => self.nullable(*x),
            Choice(a, b) => self.nullable(*a) || self.nullable(*b),
            Group(a, b) | Interleave(a, b) => self.nullable(*a) && self.nullable(*b),
            Element(_, body) => self.nullable(*body),
            Define(_, x) => self.nullable(*x),
            And(a, b) => self.nullable(*a) && self.nullable(*b),
            Not(x) => !self.nullable(*x),
            AnyName => true,
            NsName(_) => false,
            LnName(_) => false,
        }
    }

    fn is_not_allowed(&self, id: PatternId) -> bool {
        matches!(self.kind(id), PatternKind::NotAllowed)
    }

    fn is_empty(&self, id: PatternId) -> bool {
        matches!(self.kind(id), PatternKind::Empty)
    }

    // --- Leaves and other zero-ary constructors ---

    /// The pattern that matches nothing.
    pub fn not_allowed(&mut self) -> PatternId {
        self.intern(PatternKind::NotAllowed)
    }

    /// The pattern that matches only empty content.
    pub fn empty(&mut self) -> PatternId {
        self.intern(PatternKind::Empty)
    }

    /// The pattern that matches character data.
    pub fn text(&mut self) -> PatternId {
        self.intern(PatternKind::Text)
    }

    /// A name class matching any element or attribute name.
    pub fn any_name(&mut self) -> PatternId {
        self.intern(PatternKind::AnyName)
    }

    /// A name class matching any local name within namespace `ns`.
    pub fn ns_name(&mut self, ns: impl Into<String>) -> PatternId {
        self.intern(PatternKind::NsName(ns.into()))
    }

    /// A name class matching exactly the local name `local`.
    pub fn ln_name(&mut self, local: impl Into<String>) -> PatternId {
        self.intern(PatternKind::LnName(local.into()))
    }

    /// A reference to a named `define`.
    pub fn reference(&mut self, name: impl Into<String>) -> PatternId {
        self.intern(PatternKind::Ref(name.into()))
    }

    /// An attribute with the exact namespace and local name given.
    pub fn attribute(&mut self, ns: impl Into<String>, local: impl Into<String>) -> PatternId {
        self.intern(PatternKind::Attribute(ns.into(), local.into()))
    }

    // --- Structural constructors ---

    /// One or more repetitions of `x`.
    pub fn one_or_more(&mut self, x: PatternId) -> PatternId {
        self.intern(PatternKind::OneOrMore(x))
    }

    /// An element with the given name class and content pattern.
    pub fn element(&mut self, name_class: PatternId, body: PatternId) -> PatternId {
        self.intern(PatternKind::Element(name_class, body))
    }

    /// A named pattern definition.
    pub fn define(&mut self, name: impl Into<String>, body: PatternId) -> PatternId {
        self.intern(PatternKind::Define(name.into(), body))
    }

    /// The complement of `x`: matches whatever `x` does not.
    pub fn not(&mut self, x: PatternId) -> PatternId {
        self.intern(PatternKind::Not(x))
    }

    /// `Choice(Empty, x)`. Not a primitive kind, just a convenience.
    pub fn optional(&mut self, x: PatternId) -> PatternId {
        let empty = self.empty();
        self.choice(empty, x)
    }

    /// `NA ∨ x = x`; right-associates; duplicates are scanned off the right spine.
    pub fn choice(&mut self, a: PatternId, b: PatternId) -> PatternId {
        if self.is_not_allowed(a) {
            return b;
        }
        if self.is_not_allowed(b) {
            return a;
        }
        let mut spine = Vec::new();
        self.collect_choice_spine(a, &mut spine);
        self.collect_choice_spine(b, &mut spine);
        self.build_choice_spine(spine)
    }

    fn collect_choice_spine(&self, id: PatternId, out: &mut Vec<PatternId>) {
        match self.kind(id) {
            PatternKind::Choice(a, b) => {
                let (a, b) = (*a, *b);
                self.collect_choice_spine(a, out);
                self.collect_choice_spine(b, out);
            }
            PatternKind::NotAllowed => {}
            _ => out.push(id),
        }
    }

    fn build_choice_spine(&mut self, spine: Vec<PatternId>) -> PatternId {
        let mut deduped: Vec<PatternId> = Vec::with_capacity(spine.len());
        for id in spine {
            if !deduped.contains(&id) {
                deduped.push(id);
            }
        }
        let mut acc = self.not_allowed();
        for id in deduped.into_iter().rev() {
            acc = self.intern(PatternKind::Choice(id, acc));
        }
        acc
    }

    /// Absorbs `NotAllowed`; `Empty` is the unit; right-associates. Unlike `choice`, sequence
    /// order is meaningful so no duplicate elimination happens here.
    pub fn group(&mut self, a: PatternId, b: PatternId) -> PatternId {
        if self.is_not_allowed(a) || self.is_not_allowed(b) {
            return self.not_allowed();
        }
        if self.is_empty(a) {
            return b;
        }
        if self.is_empty(b) {
            return a;
        }
        if let PatternKind::Group(a1, a2) = *self.kind(a) {
            let inner = self.group(a2, b);
            return self.group(a1, inner);
        }
        self.intern(PatternKind::Group(a, b))
    }

    /// Same normal form as `group`, for the unordered-attribute-consuming pattern kind.
    pub fn interleave(&mut self, a: PatternId, b: PatternId) -> PatternId {
        if self.is_not_allowed(a) || self.is_not_allowed(b) {
            return self.not_allowed();
        }
        if self.is_empty(a) {
            return b;
        }
        if self.is_empty(b) {
            return a;
        }
        if let PatternKind::Interleave(a1, a2) = *self.kind(a) {
            let inner = self.interleave(a2, b);
            return self.interleave(a1, inner);
        }
        self.intern(PatternKind::Interleave(a, b))
    }

    /// Short-circuits to `NotAllowed` if either side is `NotAllowed`; right-associates.
    pub fn and(&mut self, a: PatternId, b: PatternId) -> PatternId {
        if self.is_not_allowed(a) || self.is_not_allowed(b) {
            return self.not_allowed();
        }
        if let PatternKind::And(a1, a2) = *self.kind(a) {
            let inner = self.and(a2, b);
            return self.and(a1, inner);
        }
        self.intern(PatternKind::And(a, b))
    }
}
