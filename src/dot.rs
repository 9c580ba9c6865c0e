//! Optional debug export: render a compiled table's states as a graphviz digraph.

use std::collections::BTreeSet;
use std::io::Write;

use dot_writer::{Attributes, Color, DotWriter, RankDirection, Shape};

use crate::tables::Tables;

/// Render `tables` to `output` as a graphviz `digraph`, for inspecting a compiled schema by eye.
///
/// States are named `node_{index}` in table order, mirroring how they are auto-numbered as they
/// are written, so edges can reference a target before that target's node is emitted.
pub fn render_to<W: Write>(tables: &Tables, output: &mut W) {
    let mut writer = DotWriter::from(output);
    writer.set_pretty_print(true);
    let mut digraph = writer.digraph();
    digraph
        .set_label("rngtables")
        .set_rank_direction(RankDirection::LeftRight);

    let entry_states: BTreeSet<usize> = tables
        .name_map
        .values()
        .flat_map(|by_local| by_local.values().copied())
        .collect();

    for (index, state) in tables.states.iter().enumerate() {
        let mut node = digraph.node_auto();
        node.set_label(&format!("{index}"));
        if index == 0 {
            node.set_shape(Shape::Square).set_color(Color::Grey);
        } else if entry_states.contains(&index) {
            node.set_shape(Shape::Circle)
                .set_color(Color::Blue)
                .set_pen_width(2.0);
        }
        if state.is_nullable {
            node.set_color(Color::Green);
        }
    }

    for (ns, by_local) in &tables.name_map {
        for (local, &start) in by_local {
            let label = if ns.is_empty() {
                local.clone()
            } else {
                format!("{{{ns}}}{local}")
            };
            digraph
                .edge("node_0", format!("node_{start}"))
                .attributes()
                .set_label(&label);
        }
    }

    for (index, state) in tables.states.iter().enumerate() {
        for (attr, &next) in &state.attributes {
            digraph
                .edge(format!("node_{index}"), format!("node_{next}"))
                .attributes()
                .set_label(&format!("@{attr}"));
        }
        for (name, &next) in &state.child_elems {
            digraph
                .edge(format!("node_{index}"), format!("node_{next}"))
                .attributes()
                .set_label(name);
        }
    }
}
