//! Indented text trees used by every error report.

/// One node of an indented report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Forest {
    /// A (possibly multi-line) text block at the current depth.
    Leaf(String),
    /// Children rendered one level deeper.
    Node(Vec<Forest>),
}

impl Forest {
    pub fn leaf(text: impl Into<String>) -> Self {
        Self::Leaf(text.into())
    }

    pub fn node(children: impl IntoIterator<Item = Forest>) -> Self {
        Self::Node(children.into_iter().collect())
    }
}

const INDENT: usize = 2;

/// Renders `forest`, indenting each line by two spaces per depth.
///
/// Multi-line leaves keep their relative layout; their trailing blank
/// lines are dropped.
pub fn indent_forest(forest: &[Forest]) -> String {
    let mut lines = Vec::new();
    collect_lines(forest, 0, &mut lines);
    lines.join("\n")
}

fn collect_lines(forest: &[Forest], depth: usize, lines: &mut Vec<String>) {
    let pad = " ".repeat(depth * INDENT);
    for item in forest {
        match item {
            Forest::Leaf(text) => {
                let body = text.trim_end_matches(['\n', ' ']);
                for line in body.split('\n') {
                    lines.push(format!("{pad}{line}"));
                }
            }
            Forest::Node(children) => collect_lines(children, depth + 1, lines),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{indent_forest, Forest};

    #[test]
    fn nested_nodes_are_indented_two_spaces_per_level() {
        let forest = vec![
            Forest::leaf("Node:"),
            Forest::node([
                Forest::leaf("'id':"),
                Forest::node([Forest::leaf("first\nsecond\n\n")]),
            ]),
        ];
        assert_eq!(
            indent_forest(&forest),
            "Node:\n  'id':\n    first\n    second"
        );
    }
}
