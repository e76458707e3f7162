use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TreeId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TreeId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// The recommendation carried by a terminal node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Escalate,
    Handle,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Escalate => "escalate",
            Self::Handle => "handle",
        }
    }
}

/// One selectable answer on a question, pointing at the node it leads to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeOption {
    #[serde(rename = "text")]
    pub label: String,
    #[serde(rename = "next_node_id")]
    pub target: NodeId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionNode {
    pub id: NodeId,
    #[serde(rename = "text")]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default)]
    pub options: Vec<TreeOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultNode {
    pub id: NodeId,
    #[serde(rename = "text", default)]
    pub summary: String,
    #[serde(rename = "result")]
    pub verdict: Verdict,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// A step in a decision tree. Questions branch, results terminate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Question(QuestionNode),
    Result(ResultNode),
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Self::Question(question) => &question.id,
            Self::Result(result) => &result.id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    pub fn as_question(&self) -> Option<&QuestionNode> {
        match self {
            Self::Question(question) => Some(question),
            Self::Result(_) => None,
        }
    }

    pub fn as_result(&self) -> Option<&ResultNode> {
        match self {
            Self::Result(result) => Some(result),
            Self::Question(_) => None,
        }
    }
}

/// A complete question/result graph for one decision scenario.
///
/// Options refer to their targets by id, so the node map is the only owner of
/// node data. Trees obtained from outside the process are not trusted to be
/// well formed; call [`DecisionTree::validate`] before walking one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionTree {
    #[serde(rename = "tree_id")]
    pub id: TreeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(rename = "root_node_id")]
    pub root: NodeId,
    pub nodes: BTreeMap<NodeId, Node>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StructuralError {
    #[error("root node `{root}` does not exist in the tree")]
    MissingRoot { root: NodeId },
    #[error("option `{label}` on node `{node}` points at missing node `{target}`")]
    DanglingReference { node: NodeId, label: String, target: NodeId },
    #[error("question node `{node}` has no options")]
    EmptyOptions { node: NodeId },
    #[error("node stored under key `{key}` declares id `{id}`")]
    MismatchedNodeId { key: NodeId, id: NodeId },
    #[error("node `{node}` can be reached again from itself")]
    Cycle { node: NodeId },
}

impl DecisionTree {
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn root_node(&self) -> Option<&Node> {
        self.nodes.get(&self.root)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), StructuralError> {
        if !self.nodes.contains_key(&self.root) {
            return Err(StructuralError::MissingRoot { root: self.root.clone() });
        }

        for (key, node) in &self.nodes {
            if node.id() != key {
                return Err(StructuralError::MismatchedNodeId {
                    key: key.clone(),
                    id: node.id().clone(),
                });
            }

            let Node::Question(question) = node else {
                continue;
            };
            if question.options.is_empty() {
                return Err(StructuralError::EmptyOptions { node: key.clone() });
            }
            if let Some(option) =
                question.options.iter().find(|option| !self.nodes.contains_key(&option.target))
            {
                return Err(StructuralError::DanglingReference {
                    node: key.clone(),
                    label: option.label.clone(),
                    target: option.target.clone(),
                });
            }
        }

        self.detect_cycle()
    }

    /// Largest number of questions answered on any route from the root to a
    /// result. Only meaningful on a validated tree.
    pub fn depth(&self) -> usize {
        let mut memo = HashMap::new();
        let mut visiting = HashSet::new();
        self.depth_from(&self.root, &mut memo, &mut visiting)
    }

    fn depth_from<'a>(
        &'a self,
        id: &'a NodeId,
        memo: &mut HashMap<&'a NodeId, usize>,
        visiting: &mut HashSet<&'a NodeId>,
    ) -> usize {
        if let Some(depth) = memo.get(id) {
            return *depth;
        }
        if !visiting.insert(id) {
            return 0;
        }

        let depth = match self.nodes.get(id) {
            Some(Node::Question(question)) => {
                let deepest = question
                    .options
                    .iter()
                    .map(|option| self.depth_from(&option.target, memo, visiting))
                    .max()
                    .unwrap_or(0);
                deepest + 1
            }
            _ => 0,
        };

        visiting.remove(id);
        memo.insert(id, depth);
        depth
    }

    fn detect_cycle(&self) -> Result<(), StructuralError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            OnPath,
            Done,
        }

        let mut marks: HashMap<&NodeId, Mark> = HashMap::new();
        let mut stack: Vec<(&NodeId, bool)> = vec![(&self.root, false)];

        while let Some((id, leaving)) = stack.pop() {
            if leaving {
                marks.insert(id, Mark::Done);
                continue;
            }

            match marks.get(id) {
                Some(Mark::Done) => continue,
                Some(Mark::OnPath) => return Err(StructuralError::Cycle { node: id.clone() }),
                None => {}
            }

            marks.insert(id, Mark::OnPath);
            stack.push((id, true));
            if let Some(Node::Question(question)) = self.nodes.get(id) {
                for option in &question.options {
                    if marks.get(&option.target) == Some(&Mark::OnPath) {
                        return Err(StructuralError::Cycle { node: option.target.clone() });
                    }
                    stack.push((&option.target, false));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DecisionTree, Node, NodeId, QuestionNode, ResultNode, StructuralError, TreeId, TreeOption,
        Verdict,
    };

    fn question(id: &str, options: &[(&str, &str)]) -> Node {
        Node::Question(QuestionNode {
            id: NodeId::from(id),
            prompt: format!("prompt for {id}"),
            help_text: None,
            options: options
                .iter()
                .map(|(label, target)| TreeOption {
                    label: (*label).to_owned(),
                    target: NodeId::from(*target),
                })
                .collect(),
        })
    }

    fn result(id: &str, verdict: Verdict) -> Node {
        Node::Result(ResultNode {
            id: NodeId::from(id),
            summary: String::new(),
            verdict,
            title: format!("title for {id}"),
            description: String::new(),
            next_steps: vec!["follow up".to_owned()],
        })
    }

    fn tree(root: &str, nodes: Vec<Node>) -> DecisionTree {
        DecisionTree {
            id: TreeId::from("t-1"),
            name: "Test tree".to_owned(),
            description: String::new(),
            version: "1.0".to_owned(),
            root: NodeId::from(root),
            nodes: nodes.into_iter().map(|node| (node.id().clone(), node)).collect(),
        }
    }

    fn two_leaf_tree() -> DecisionTree {
        tree(
            "q1",
            vec![
                question("q1", &[("A", "r1"), ("B", "r2")]),
                result("r1", Verdict::Escalate),
                result("r2", Verdict::Handle),
            ],
        )
    }

    #[test]
    fn accepts_well_formed_tree() {
        assert_eq!(two_leaf_tree().validate(), Ok(()));
    }

    #[test]
    fn rejects_missing_root() {
        let mut tree = two_leaf_tree();
        tree.root = NodeId::from("nowhere");

        assert_eq!(
            tree.validate(),
            Err(StructuralError::MissingRoot { root: NodeId::from("nowhere") })
        );
    }

    #[test]
    fn rejects_dangling_option_target() {
        let tree = tree(
            "q1",
            vec![question("q1", &[("A", "r1"), ("B", "ghost")]), result("r1", Verdict::Handle)],
        );

        assert_eq!(
            tree.validate(),
            Err(StructuralError::DanglingReference {
                node: NodeId::from("q1"),
                label: "B".to_owned(),
                target: NodeId::from("ghost"),
            })
        );
    }

    #[test]
    fn rejects_question_without_options() {
        let tree = tree("q1", vec![question("q1", &[])]);

        assert_eq!(
            tree.validate(),
            Err(StructuralError::EmptyOptions { node: NodeId::from("q1") })
        );
    }

    #[test]
    fn rejects_node_stored_under_foreign_key() {
        let mut tree = two_leaf_tree();
        let node = result("r9", Verdict::Handle);
        tree.nodes.insert(NodeId::from("r3"), node);

        assert!(matches!(tree.validate(), Err(StructuralError::MismatchedNodeId { .. })));
    }

    #[test]
    fn rejects_cycle_reachable_from_root() {
        let tree = tree(
            "q1",
            vec![
                question("q1", &[("next", "q2")]),
                question("q2", &[("back", "q1"), ("done", "r1")]),
                result("r1", Verdict::Escalate),
            ],
        );

        assert_eq!(tree.validate(), Err(StructuralError::Cycle { node: NodeId::from("q1") }));
    }

    #[test]
    fn shared_targets_are_not_cycles() {
        let tree = tree(
            "q1",
            vec![
                question("q1", &[("a", "q2"), ("b", "q3")]),
                question("q2", &[("x", "r1")]),
                question("q3", &[("y", "q2"), ("z", "r1")]),
                result("r1", Verdict::Handle),
            ],
        );

        assert_eq!(tree.validate(), Ok(()));
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn depth_counts_questions_on_longest_route() {
        assert_eq!(two_leaf_tree().depth(), 1);

        let single_result = tree("r1", vec![result("r1", Verdict::Handle)]);
        assert_eq!(single_result.validate(), Ok(()));
        assert_eq!(single_result.depth(), 0);
    }

    #[test]
    fn parses_document_shape_used_by_the_store() {
        let raw = r#"{
            "tree_id": "demo",
            "name": "Demo",
            "description": "demo tree",
            "version": "1.0",
            "root_node_id": "q1",
            "nodes": {
                "q1": {
                    "id": "q1",
                    "type": "question",
                    "text": "Is it on fire?",
                    "help_text": "Literal fire only",
                    "options": [
                        { "text": "Yes", "next_node_id": "r1" },
                        { "text": "No", "next_node_id": "r2" }
                    ]
                },
                "r1": {
                    "id": "r1",
                    "type": "result",
                    "text": "Escalate now.",
                    "result": "escalate",
                    "title": "Escalate",
                    "description": "Fire is a management problem.",
                    "next_steps": ["Call the fire brigade"]
                },
                "r2": {
                    "id": "r2",
                    "type": "result",
                    "result": "handle",
                    "title": "Handle",
                    "description": "No fire, no escalation."
                }
            }
        }"#;

        let tree = DecisionTree::from_json(raw).expect("parse tree document");
        assert_eq!(tree.validate(), Ok(()));

        let q1 = tree.node(&NodeId::from("q1")).and_then(Node::as_question).expect("q1 question");
        assert_eq!(q1.help_text.as_deref(), Some("Literal fire only"));
        assert_eq!(q1.options[1].target, NodeId::from("r2"));

        let r2 = tree.node(&NodeId::from("r2")).and_then(Node::as_result).expect("r2 result");
        assert_eq!(r2.verdict, Verdict::Handle);
        assert!(r2.next_steps.is_empty());
        assert!(r2.summary.is_empty());

        let reencoded = serde_json::to_value(&tree).expect("encode tree");
        assert_eq!(reencoded["nodes"]["q1"]["type"], "question");
        assert_eq!(reencoded["nodes"]["r1"]["result"], "escalate");
        assert_eq!(reencoded["root_node_id"], "q1");
    }
}
