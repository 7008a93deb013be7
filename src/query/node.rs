//! Query results

use std::borrow::Cow;
use std::fmt;

use crate::value::Value;

/// One step from a parent value to a child value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    Key(String),
    Index(usize),
}

/// A value matched by a query, and where it was found
#[derive(Debug, Clone)]
pub struct QueryNode<'v> {
    pub value: Cow<'v, Value>,
    pub location: Vec<PathElement>,
}

impl<'v> QueryNode<'v> {
    pub fn new(value: Cow<'v, Value>, location: Vec<PathElement>) -> Self {
        Self { value, location }
    }

    pub(crate) fn child(&self, value: Cow<'v, Value>, element: PathElement) -> QueryNode<'v> {
        let mut location = self.location.clone();
        location.push(element);
        QueryNode { value, location }
    }

    /// Normalized path, like `$['users'][0]['name']`
    pub fn path(&self) -> String {
        let mut path = String::from("$");
        for element in &self.location {
            match element {
                PathElement::Key(key) => {
                    path.push_str("['");
                    for c in key.chars() {
                        match c {
                            '\'' => path.push_str("\\'"),
                            '\\' => path.push_str("\\\\"),
                            _ => path.push(c),
                        }
                    }
                    path.push_str("']");
                }
                PathElement::Index(i) => path.push_str(&format!("[{}]", i)),
            }
        }
        path
    }

    pub fn into_value(self) -> Value {
        self.value.into_owned()
    }
}

/// Ordered result of resolving a query
#[derive(Debug, Clone, Default)]
pub struct NodeList<'v> {
    nodes: Vec<QueryNode<'v>>,
}

impl<'v> NodeList<'v> {
    pub fn new(nodes: Vec<QueryNode<'v>>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryNode<'v>> {
        self.nodes.iter()
    }

    pub fn first(&self) -> Option<&QueryNode<'v>> {
        self.nodes.first()
    }

    pub fn values(&self) -> Vec<&Value> {
        self.nodes.iter().map(|n| n.value.as_ref()).collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.path()).collect()
    }

    pub fn into_nodes(self) -> Vec<QueryNode<'v>> {
        self.nodes
    }

    /// Collapse to a single owned value: nothing for no match, the value for
    /// one match and an array for several
    pub fn into_value(self) -> Option<Value> {
        let mut nodes = self.nodes;
        match nodes.len() {
            0 => None,
            1 => nodes.pop().map(QueryNode::into_value),
            _ => Some(Value::Array(
                nodes.into_iter().map(QueryNode::into_value).collect(),
            )),
        }
    }
}

impl<'v> IntoIterator for NodeList<'v> {
    type Item = QueryNode<'v>;
    type IntoIter = std::vec::IntoIter<QueryNode<'v>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl fmt::Display for NodeList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.paths().join(", "))
    }
}
