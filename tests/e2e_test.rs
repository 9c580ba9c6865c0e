// Test complete flow of the library: schema file in, tables JSON out.

use std::io::Write;

use rngtables::compile;

#[test]
fn e2e_test() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut schema_file = tempfile::Builder::new().suffix(".rng").tempfile().unwrap();
    write!(
        schema_file,
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
            <start><ref name="Doc"/></start>
            <define name="Doc">
                <element name="doc">
                    <attribute name="version"><text/></attribute>
                    <oneOrMore>
                        <choice>
                            <ref name="Item"/>
                            <ref name="Note"/>
                        </choice>
                    </oneOrMore>
                </element>
            </define>
            <define name="Item">
                <element name="item">
                    <optional><attribute name="id"><text/></attribute></optional>
                    <empty/>
                </element>
            </define>
            <define name="Note">
                <element name="note"><text/></element>
            </define>
        </grammar>"#
    )
    .unwrap();

    let xml = std::fs::read_to_string(schema_file.path()).unwrap();
    let tables = compile(&xml).unwrap();

    let json = serde_json::to_string_pretty(&tables).unwrap();
    println!("{json}");

    let mut out_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    out_file.write_all(json.as_bytes()).unwrap();

    let reread: rngtables::Tables =
        serde_json::from_str(&std::fs::read_to_string(out_file.path()).unwrap()).unwrap();

    // "doc" requires its version attribute before any child is recognized (the loader emits
    // attribute-then-content as an ordered Group), so children only appear past that transition.
    let doc_state = reread.name_map[""]["doc"];
    assert!(!reread.states[doc_state].attributes.is_empty());
    let after_version = reread.states[doc_state].attributes["version"];

    // ChildElems is keyed by the *completed child's own state id*, stringified, not by tag name
    // -- both "item" and "note" are immediately nullable (their content is optional/text), so
    // their own start states are exactly the completion states that key into this table.
    let item_key = reread.name_map[""]["item"].to_string();
    let note_key = reread.name_map[""]["note"].to_string();
    assert!(reread.states[after_version].child_elems.contains_key(&item_key));
    assert!(reread.states[after_version].child_elems.contains_key(&note_key));

    let loop_state = reread.states[after_version].child_elems[&item_key];
    assert_eq!(reread.states[after_version].child_elems[&note_key], loop_state);
    assert!(reread.states[loop_state].is_nullable);
    // oneOrMore loops back: the post-child state accepts further items/notes the same way.
    assert_eq!(reread.states[loop_state].child_elems[&item_key], loop_state);
    assert_eq!(reread.states[loop_state].child_elems[&note_key], loop_state);

    // Recompiling the same schema twice yields byte-identical output (canonical key order).
    let tables_again = compile(&xml).unwrap();
    let json_again = serde_json::to_string_pretty(&tables_again).unwrap();
    assert_eq!(json, json_again);
}

#[test]
fn e2e_rejects_unsupported_attribute_name_class() {
    let _ = env_logger::builder().is_test(true).try_init();

    let xml = r#"<element name="root" xmlns="http://relaxng.org/ns/structure/1.0">
        <attribute><anyName/></attribute>
    </element>"#;

    let err = compile(xml).unwrap_err();
    assert!(matches!(
        *err.source,
        rngtables::RngErrorKind::AttrNameClassUnsupported(_)
    ));
}
