//! Text and JSON rendering of a [`RenderableTree`].

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::results::{RenderableTree, Totals, FAIL_SYMBOL, PASS_SYMBOL, ROOT_LABEL};
use crate::tree::{Arena, ROOT_ID};

/// `Total: 🟢 p/t 🔴 f/t`, omitting a side that is zero.
pub fn totals_line(totals: &Totals) -> String {
    let total = totals.total();
    let mut parts = Vec::new();
    if totals.passed > 0 {
        parts.push(format!("{PASS_SYMBOL} {}/{total}", totals.passed));
    }
    if totals.failed > 0 {
        parts.push(format!("{FAIL_SYMBOL} {}/{total}", totals.failed));
    }
    if parts.is_empty() {
        return "Total: 0".to_string();
    }
    format!("Total: {}", parts.join(" "))
}

fn draw(tree: &Arena<String>, id: &Uuid, prefix: &str, out: &mut String) {
    let children = tree.children(id);
    for (index, child) in children.iter().enumerate() {
        let last = index + 1 == children.len();
        let label = tree.get(child).map(String::as_str).unwrap_or_default();
        out.push_str(prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(label);
        out.push('\n');
        let nested = format!("{prefix}{}", if last { "    " } else { "│   " });
        draw(tree, child, &nested, out);
    }
}

/// Plain hierarchical text, followed by error lines (verbose) and totals.
pub fn render_text(result: &RenderableTree, verbose: bool) -> String {
    let mut out = String::new();
    out.push_str(result.tree.root().map(String::as_str).unwrap_or(ROOT_LABEL));
    out.push('\n');
    draw(&result.tree, &ROOT_ID, "", &mut out);

    if verbose && !result.exceptions.is_empty() {
        out.push('\n');
        for exception in &result.exceptions {
            out.push_str(exception);
            out.push('\n');
        }
    }

    out.push('\n');
    out.push_str(&totals_line(&result.totals));
    out.push('\n');
    out
}

fn node_json(tree: &Arena<String>, id: &Uuid) -> Value {
    let label = tree.get(id).cloned().unwrap_or_default();
    let children: Vec<Value> = tree
        .children(id)
        .iter()
        .map(|child| node_json(tree, child))
        .collect();

    let mut body = Map::new();
    if !children.is_empty() {
        body.insert("children".to_string(), Value::Array(children));
    }
    let mut node = Map::new();
    node.insert(label, Value::Object(body));
    Value::Object(node)
}

/// The structured document: the hierarchy, totals and (verbose) exceptions.
pub fn render_json(result: &RenderableTree, verbose: bool) -> Value {
    let children: Vec<Value> = result
        .tree
        .children(&ROOT_ID)
        .iter()
        .map(|child| node_json(&result.tree, child))
        .collect();
    let root = result.tree.root().cloned().unwrap_or_else(|| ROOT_LABEL.to_string());

    let mut document = Map::new();
    document.insert(root, json!({ "children": children }));
    document.insert("passed".to_string(), json!(result.totals.passed));
    document.insert("failed".to_string(), json!(result.totals.failed));
    if verbose {
        document.insert("exceptions".to_string(), json!(result.exceptions));
    }
    Value::Object(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RenderableTree {
        let mut tree = Arena::new(ROOT_LABEL.to_string());
        let (group, probe, builtin, root_probe) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        tree.insert(group, ROOT_ID, "RuleSet - cos".to_string()).unwrap();
        tree.insert(probe, group, "🔴 nested.py".to_string()).unwrap();
        tree.insert(builtin, group, "🟢 rules.yaml:applications".to_string())
            .unwrap();
        tree.insert(root_probe, ROOT_ID, "🟢 root.py".to_string())
            .unwrap();
        RenderableTree {
            tree,
            totals: Totals {
                passed: 2,
                failed: 1,
            },
            exceptions: vec!["nested.py (bundle): boom".to_string()],
        }
    }

    #[test]
    fn test_totals_line_omits_zero_side() {
        assert_eq!(
            totals_line(&Totals {
                passed: 2,
                failed: 0
            }),
            "Total: 🟢 2/2"
        );
        assert_eq!(
            totals_line(&Totals {
                passed: 0,
                failed: 1
            }),
            "Total: 🔴 1/1"
        );
        assert_eq!(totals_line(&Totals::default()), "Total: 0");
    }

    #[test]
    fn test_render_text_tree() {
        let text = render_text(&sample(), false);
        let expected = "Results\n\
                        ├── RuleSet - cos\n\
                        │   ├── 🔴 nested.py\n\
                        │   └── 🟢 rules.yaml:applications\n\
                        └── 🟢 root.py\n\
                        \n\
                        Total: 🟢 2/3 🔴 1/3\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_text_verbose_lists_errors() {
        let text = render_text(&sample(), true);
        assert!(text.contains("\nnested.py (bundle): boom\n"));
    }

    #[test]
    fn test_render_json_document() {
        let document = render_json(&sample(), false);
        assert_eq!(
            document,
            json!({
                "Results": {
                    "children": [
                        { "RuleSet - cos": { "children": [
                            { "🔴 nested.py": {} },
                            { "🟢 rules.yaml:applications": {} }
                        ] } },
                        { "🟢 root.py": {} }
                    ]
                },
                "passed": 2,
                "failed": 1
            })
        );
    }

    #[test]
    fn test_render_json_verbose_exceptions() {
        let document = render_json(&sample(), true);
        assert_eq!(document["exceptions"], json!(["nested.py (bundle): boom"]));
    }
}
