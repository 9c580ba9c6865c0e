#![forbid(missing_docs)]
//! # rngtables
//! Compiles a RELAX NG simple-syntax schema into the pair of JSON lookup tables (`NameMap` and
//! `States`) a fast approximate validator indexes into, instead of walking the grammar directly.
//!
//! The pipeline is: parse the schema into a hash-consed pattern algebra ([`pattern`]), run a
//! Brzozowski-style derivative engine over it ([`derive`]) to build one DFA-like state per
//! distinct element ([`simulate`]), then union and renumber those states into the dense tables
//! ([`tables`]) that get serialized to JSON.
//!
//! Validating documents against the compiled tables, and datatype/text-content validation, are
//! both out of scope for this crate -- it only produces the tables.

/// Newtype ids for the pattern arena and the per-compile state table.
mod ids;
pub use ids::{PatternId, SimStateId};

/// The hash-consed pattern algebra and its smart constructors.
pub mod pattern;

/// The Brzozowski-style derivative engine over the pattern algebra.
mod derive;

/// Per-element state machine construction.
pub mod simulate;

/// Global table construction: per-element unions, dense ids, and JSON output types.
pub mod tables;

/// Schema loading from RELAX NG simple-syntax XML.
pub mod loader;

/// Error types.
pub mod errors;

/// Optional graphviz export of compiled tables, enabled by the `dot` feature.
#[cfg(feature = "dot")]
pub mod dot;

pub use errors::{Result, RngError, RngErrorKind};
pub use tables::Tables;

use simulate::SimContext;

/// Compile a RELAX NG simple-syntax schema document into its lookup tables.
///
/// This is the crate's single entry point: it owns a fresh [`SimContext`] for the lifetime of
/// the compile, so two calls never share pattern or state identity with each other.
pub fn compile(xml: &str) -> Result<Tables> {
    let mut ctx = SimContext::new();
    let grammar = loader::load(&mut ctx, xml)?;
    tables::build_tables(&grammar, &mut ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_compile_end_to_end() {
        init();
        let xml = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
            <start><ref name="Doc"/></start>
            <define name="Doc">
                <element name="doc">
                    <attribute name="version"><text/></attribute>
                    <zeroOrMore>
                        <element name="item"><text/></element>
                    </zeroOrMore>
                </element>
            </define>
        </grammar>"#;
        let tables = compile(xml).unwrap();
        assert!(tables.name_map[""].contains_key("doc"));
        let doc_state = tables.name_map[""]["doc"];
        assert_eq!(tables.states[doc_state].attributes.len(), 1);
        let after_version = tables.states[doc_state].attributes["version"];
        // ChildElems is keyed by the completed child's own state id, not its tag name; "item" is
        // immediately nullable (its content is just text), so its start state is that key.
        let item_key = tables.name_map[""]["item"].to_string();
        assert!(tables.states[after_version].child_elems.contains_key(&item_key));
    }

    #[test]
    fn test_compile_rejects_malformed_xml() {
        init();
        let err = compile("not xml").unwrap_err();
        assert!(matches!(*err.source, RngErrorKind::Xml(_)));
    }
}
