//! Serializes a stylesheet tree back to CSS text

use super::ast::{NodeId, NodeKind, Stylesheet};

const INDENT: &str = "  ";

pub fn to_css(sheet: &Stylesheet) -> String {
    let mut output = String::new();
    for (index, child) in sheet.children(sheet.root()).iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        write_node(sheet, *child, 0, &mut output);
    }
    output
}

fn write_node(sheet: &Stylesheet, id: NodeId, depth: usize, output: &mut String) {
    let indent = INDENT.repeat(depth);
    match sheet.kind(id) {
        NodeKind::Root => write_children(sheet, id, depth, output),
        NodeKind::Rule { selector } => {
            output.push_str(&format!("{}{} {{\n", indent, selector));
            write_children(sheet, id, depth + 1, output);
            output.push_str(&format!("{}}}\n", indent));
        }
        NodeKind::AtRule {
            name,
            params,
            has_block,
        } => {
            output.push_str(&indent);
            output.push('@');
            output.push_str(name);
            if !params.is_empty() {
                output.push(' ');
                output.push_str(params);
            }
            if *has_block {
                output.push_str(" {\n");
                write_children(sheet, id, depth + 1, output);
                output.push_str(&format!("{}}}\n", indent));
            } else {
                output.push_str(";\n");
            }
        }
        NodeKind::Declaration {
            property,
            value,
            important,
        } => {
            let important = if *important { " !important" } else { "" };
            output.push_str(&format!("{}{}: {}{};\n", indent, property, value, important));
        }
        NodeKind::Comment { text } => {
            output.push_str(&format!("{}/*{}*/\n", indent, text));
        }
    }
}

fn write_children(sheet: &Stylesheet, id: NodeId, depth: usize, output: &mut String) {
    for child in sheet.children(id) {
        write_node(sheet, *child, depth, output);
    }
}
