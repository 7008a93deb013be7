//! JSONPath-style queries
//!
//! Every variable reference in a template (`user.name`, `items[0]`,
//! `products[?@.price < 10]`) compiles to a [`Query`]. Queries resolve
//! against either a plain [`Value`] or a [`Scope`], which is how a render
//! context exposes its chain of namespaces without merging them.

mod filter;
mod functions;
mod node;
mod parser;

use std::borrow::Cow;
use std::fmt;

use crate::error::{ErrorDetail, LiquidError, Span};
use crate::value::{range_items, Value, MAX_RANGE_ITEMS};

pub use filter::{ComparisonOperator, FilterExpression, LogicalOperator};
pub use functions::{function_extension, ExpressionType, FilterValue, FunctionExtension};
pub use node::{NodeList, PathElement, QueryNode};
pub use parser::QueryParser;
pub(crate) use parser::is_name_first;

pub const MAX_INT_INDEX: i64 = (1 << 53) - 1;
pub const MIN_INT_INDEX: i64 = -((1 << 53) - 1);
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 100;

/// A mapping-like query root that is not itself a [`Value`]
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<&Value>;

    /// Every visible name, highest priority first, without duplicates
    fn entries(&self) -> Vec<(&str, &Value)>;
}

/// A compiled query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Child { selectors: Vec<Selector>, span: Span },
    Recursive { selectors: Vec<Selector>, span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Name(String),
    Index(i64),
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    Wildcard,
    Filter(Box<FilterExpression>),
    SingularQuery(Box<Query>),
}

impl Segment {
    pub fn selectors(&self) -> &[Selector] {
        match self {
            Segment::Child { selectors, .. } | Segment::Recursive { selectors, .. } => selectors,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Segment::Child { span, .. } | Segment::Recursive { span, .. } => *span,
        }
    }
}

impl Query {
    /// Parse a standalone query like `a.b[0]` or `$..price`
    pub fn parse(source: &str) -> Result<Query, LiquidError> {
        QueryParser::new(source, 0).parse_complete()
    }

    /// A query selecting a single top-level name
    pub fn from_name(name: &str) -> Query {
        Query {
            segments: vec![Segment::Child {
                selectors: vec![Selector::Name(name.to_string())],
                span: Span::default(),
            }],
        }
    }

    /// Resolve this query against `root`
    pub fn find<'v>(&self, root: &'v Value) -> Result<NodeList<'v>, LiquidError> {
        self.find_with_depth(root, DEFAULT_MAX_RECURSION_DEPTH)
    }

    pub fn find_with_depth<'v>(
        &self,
        root: &'v Value,
        max_depth: usize,
    ) -> Result<NodeList<'v>, LiquidError> {
        let resolver = Resolver {
            root: Root::Value(root),
            max_depth,
        };
        let start = Candidate::Node(QueryNode::new(Cow::Borrowed(root), Vec::new()));
        self.resolve_from(start, &resolver)
    }

    /// Resolve this query against a chain of namespaces
    pub fn find_in_scope<'v>(
        &self,
        scope: &'v dyn Scope,
        max_depth: usize,
    ) -> Result<NodeList<'v>, LiquidError> {
        let resolver = Resolver {
            root: Root::Scope(scope),
            max_depth,
        };
        self.resolve_from(Candidate::Scope(scope), &resolver)
    }

    pub(crate) fn resolve_from<'v>(
        &self,
        start: Candidate<'v>,
        resolver: &Resolver<'v>,
    ) -> Result<NodeList<'v>, LiquidError> {
        let mut candidates = vec![start];
        for segment in &self.segments {
            candidates = resolver.segment(segment, candidates)?;
            if candidates.is_empty() {
                break;
            }
        }

        Ok(NodeList::new(
            candidates
                .into_iter()
                .filter_map(|c| match c {
                    Candidate::Node(node) => Some(node),
                    Candidate::Scope(_) => None,
                })
                .collect(),
        ))
    }

    /// True if this query can match at most one node
    pub fn is_singular(&self) -> bool {
        self.segments.iter().all(|segment| match segment {
            Segment::Child { selectors, .. } => {
                selectors.len() == 1
                    && matches!(selectors[0], Selector::Name(_) | Selector::Index(_))
            }
            Segment::Recursive { .. } => false,
        })
    }

    /// The name of a query made of a single name selector, like `foo`
    pub fn as_word(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Child { selectors, .. }] => match selectors.as_slice() {
                [Selector::Name(name)] => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Name selectors only, like `block.super`
    pub fn as_names(&self) -> Option<Vec<&str>> {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Child { selectors, .. } => match selectors.as_slice() {
                    [Selector::Name(name)] => Some(name.as_str()),
                    _ => None,
                },
                Segment::Recursive { .. } => None,
            })
            .collect()
    }
}

// ============================================================================
// Resolution
// ============================================================================

#[derive(Clone, Copy)]
pub(crate) enum Root<'v> {
    Scope(&'v dyn Scope),
    Value(&'v Value),
}

/// A node under consideration, or the virtual root of a scope chain
#[derive(Clone)]
pub(crate) enum Candidate<'v> {
    Scope(&'v dyn Scope),
    Node(QueryNode<'v>),
}

pub(crate) struct Resolver<'v> {
    root: Root<'v>,
    max_depth: usize,
}

impl<'v> Resolver<'v> {
    pub(crate) fn root_candidate(&self) -> Candidate<'v> {
        match self.root {
            Root::Scope(scope) => Candidate::Scope(scope),
            Root::Value(value) => Candidate::Node(QueryNode::new(Cow::Borrowed(value), Vec::new())),
        }
    }

    fn segment(
        &self,
        segment: &Segment,
        candidates: Vec<Candidate<'v>>,
    ) -> Result<Vec<Candidate<'v>>, LiquidError> {
        let mut out = Vec::new();
        match segment {
            Segment::Child { selectors, span } => {
                for candidate in &candidates {
                    for selector in selectors {
                        self.select(selector, candidate, *span, &mut out)?;
                    }
                }
            }
            Segment::Recursive { selectors, span } => {
                for candidate in candidates {
                    let mut visited = Vec::new();
                    self.descend(candidate, 1, *span, &mut visited)?;
                    for node in &visited {
                        for selector in selectors {
                            self.select(selector, node, *span, &mut out)?;
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Depth-first, pre-order traversal of containers
    fn descend(
        &self,
        candidate: Candidate<'v>,
        depth: usize,
        span: Span,
        out: &mut Vec<Candidate<'v>>,
    ) -> Result<(), LiquidError> {
        if depth > self.max_depth {
            return Err(LiquidError::QueryRecursion(ErrorDetail::new(
                "recursion limit exceeded",
                Some(span),
            )));
        }

        let children = children(&candidate).map_err(|e| e.or_span(span))?;
        out.push(candidate);

        for child in children {
            if child.value.is_container() {
                self.descend(Candidate::Node(child), depth + 1, span, out)?;
            }
        }
        Ok(())
    }

    fn select(
        &self,
        selector: &Selector,
        candidate: &Candidate<'v>,
        span: Span,
        out: &mut Vec<Candidate<'v>>,
    ) -> Result<(), LiquidError> {
        match selector {
            Selector::Name(name) => {
                if let Some(node) = select_name(candidate, name) {
                    out.push(Candidate::Node(node));
                }
            }
            Selector::Index(index) => {
                if let Some(node) = select_index(candidate, *index) {
                    out.push(Candidate::Node(node));
                }
            }
            Selector::Slice { start, stop, step } => {
                if let Candidate::Node(node) = candidate {
                    if let Value::Range(first, last) = node.value.as_ref() {
                        let bounds = (*start, *stop, *step);
                        return select_range_slice(node, *first, *last, bounds, span, out);
                    }
                    let items = array_children(node)?;
                    for i in slice_indices(items.len() as i128, *start, *stop, *step) {
                        out.push(Candidate::Node(items[i as usize].clone()));
                    }
                }
            }
            Selector::Wildcard => {
                let children = children(candidate).map_err(|e| e.or_span(span))?;
                out.extend(children.into_iter().map(Candidate::Node));
            }
            Selector::Filter(expression) => {
                for child in children(candidate).map_err(|e| e.or_span(span))? {
                    if expression.is_satisfied(self, &child)? {
                        out.push(Candidate::Node(child));
                    }
                }
            }
            Selector::SingularQuery(query) => {
                let nodes = query.resolve_from(self.root_candidate(), self)?;
                if nodes.len() > 1 {
                    return Err(LiquidError::type_error(
                        format!("expected a singular query, '{}' found {} nodes", query, nodes.len()),
                        span,
                    ));
                }
                let node = match nodes.first() {
                    Some(key) => match key.value.as_ref() {
                        Value::Int(i) => select_index(candidate, *i),
                        other => other.as_str().and_then(|name| select_name(candidate, name)),
                    },
                    None => None,
                };
                if let Some(node) = node {
                    out.push(Candidate::Node(node));
                }
            }
        }
        Ok(())
    }
}

fn children<'v>(candidate: &Candidate<'v>) -> Result<Vec<QueryNode<'v>>, LiquidError> {
    Ok(match candidate {
        Candidate::Scope(scope) => scope
            .entries()
            .into_iter()
            .map(|(k, v)| QueryNode::new(Cow::Borrowed(v), vec![PathElement::Key(k.to_string())]))
            .collect(),
        Candidate::Node(node) => match node.value.as_ref() {
            Value::Object(_) => lift(node, |value| match value {
                Value::Object(map) => map
                    .iter()
                    .map(|(k, v)| (v, PathElement::Key(k.clone())))
                    .collect(),
                _ => Vec::new(),
            }),
            _ => array_children(node)?,
        },
    })
}

fn array_children<'v>(node: &QueryNode<'v>) -> Result<Vec<QueryNode<'v>>, LiquidError> {
    Ok(match node.value.as_ref() {
        Value::Array(_) => lift(node, |value| match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (v, PathElement::Index(i)))
                .collect(),
            _ => Vec::new(),
        }),
        Value::Range(start, stop) => range_items(*start, *stop)?
            .into_iter()
            .enumerate()
            .map(|(i, n)| node.child(Cow::Owned(n), PathElement::Index(i)))
            .collect(),
        _ => Vec::new(),
    })
}

/// Slice a range without expanding it
fn select_range_slice<'v>(
    node: &QueryNode<'v>,
    first: i64,
    last: i64,
    (start, stop, step): (Option<i64>, Option<i64>, Option<i64>),
    span: Span,
    out: &mut Vec<Candidate<'v>>,
) -> Result<(), LiquidError> {
    for (count, i) in slice_indices(range_span(first, last), start, stop, step).enumerate() {
        if count >= MAX_RANGE_ITEMS {
            return Err(LiquidError::type_error(
                format!(
                    "slice of range {}..{} selects more than {} items",
                    first, last, MAX_RANGE_ITEMS
                ),
                span,
            ));
        }
        // first + i never passes last
        let n = Value::Int((first as i128 + i) as i64);
        let index = usize::try_from(i).unwrap_or(usize::MAX);
        out.push(Candidate::Node(node.child(Cow::Owned(n), PathElement::Index(index))));
    }
    Ok(())
}

/// Exact number of integers in an inclusive range
fn range_span(first: i64, last: i64) -> i128 {
    (last as i128 - first as i128 + 1).max(0)
}

/// Map child references of a node's value to child nodes, borrowing when the
/// parent is borrowed
fn lift<'v, F>(node: &QueryNode<'v>, f: F) -> Vec<QueryNode<'v>>
where
    F: for<'a> Fn(&'a Value) -> Vec<(&'a Value, PathElement)>,
{
    match &node.value {
        Cow::Borrowed(value) => f(*value)
            .into_iter()
            .map(|(v, p)| node.child(Cow::Borrowed(v), p))
            .collect(),
        Cow::Owned(value) => f(value)
            .into_iter()
            .map(|(v, p)| node.child(Cow::Owned(v.clone()), p))
            .collect(),
    }
}

fn select_name<'v>(candidate: &Candidate<'v>, name: &str) -> Option<QueryNode<'v>> {
    let node = match candidate {
        Candidate::Scope(scope) => {
            return scope.lookup(name).map(|v| {
                QueryNode::new(Cow::Borrowed(v), vec![PathElement::Key(name.to_string())])
            })
        }
        Candidate::Node(node) => node,
    };

    let key = PathElement::Key(name.to_string());
    let found = match &node.value {
        Cow::Borrowed(value) => match *value {
            Value::Object(map) => map.get(name).map(Cow::Borrowed),
            _ => None,
        },
        Cow::Owned(value) => match value {
            Value::Object(map) => map.get(name).cloned().map(Cow::Owned),
            _ => None,
        },
    };

    if let Some(value) = found {
        return Some(node.child(value, key));
    }

    // Liquid's special properties, used when the key itself is missing
    match (name, node.value.as_ref()) {
        ("size", value) => value
            .size()
            .map(|n| node.child(Cow::Owned(Value::from(n)), key)),
        ("first", Value::Array(_) | Value::Range(..)) => select_index(candidate, 0),
        ("last", Value::Array(_) | Value::Range(..)) => select_index(candidate, -1),
        _ => None,
    }
}

fn select_index<'v>(candidate: &Candidate<'v>, index: i64) -> Option<QueryNode<'v>> {
    let node = match candidate {
        Candidate::Node(node) => node,
        Candidate::Scope(_) => return None,
    };

    let len = match node.value.as_ref() {
        Value::Array(items) => items.len() as i128,
        Value::Range(start, stop) => range_span(*start, *stop),
        _ => return None,
    };
    let normalized = if index < 0 { len + index as i128 } else { index as i128 };
    if normalized < 0 || normalized >= len {
        return None;
    }
    let i = usize::try_from(normalized).unwrap_or(usize::MAX);
    // Inside the range, so the sum fits
    let nth = |start: i64| Value::Int((start as i128 + normalized) as i64);

    let child = match &node.value {
        Cow::Borrowed(value) => match *value {
            Value::Array(items) => Cow::Borrowed(&items[i]),
            Value::Range(start, _) => Cow::Owned(nth(*start)),
            _ => return None,
        },
        Cow::Owned(value) => match value {
            Value::Array(items) => Cow::Owned(items[i].clone()),
            Value::Range(start, _) => Cow::Owned(nth(*start)),
            _ => return None,
        },
    };
    Some(node.child(child, PathElement::Index(i)))
}

/// Indices selected by a slice over a sequence of `len` items, in order
pub(crate) fn slice_indices(
    len: i128,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> impl Iterator<Item = i128> {
    let step = step.unwrap_or(1) as i128;
    let normalize = |i: i64| if i >= 0 { i as i128 } else { len + i as i128 };

    // Indices run from `first` while strictly between `low` and `high`
    let (first, low, high) = if step == 0 || len <= 0 {
        (0, 0, 0)
    } else if step > 0 {
        let lower = normalize(start.unwrap_or(0)).clamp(0, len);
        let upper = stop.map(normalize).unwrap_or(len).clamp(0, len);
        (lower, lower - 1, upper)
    } else {
        let upper = start.map(normalize).unwrap_or(len - 1).clamp(-1, len - 1);
        let lower = match stop {
            Some(stop) => normalize(stop).clamp(-1, len - 1),
            None => -1,
        };
        (upper, lower, upper + 1)
    };

    std::iter::successors(Some(first), move |i| i.checked_add(step))
        .take_while(move |i| low < *i && *i < high)
}

// ============================================================================
// Display
// ============================================================================

fn is_shorthand_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-') && !name.ends_with('-')
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            _ => write!(f, "{}", c)?,
        }
    }
    f.write_str("'")
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Name(name) => write_string_literal(f, name),
            Selector::Index(i) => write!(f, "{}", i),
            Selector::Slice { start, stop, step } => {
                if let Some(start) = start {
                    write!(f, "{}", start)?;
                }
                f.write_str(":")?;
                if let Some(stop) = stop {
                    write!(f, "{}", stop)?;
                }
                if let Some(step) = step {
                    write!(f, ":{}", step)?;
                }
                Ok(())
            }
            Selector::Wildcard => f.write_str("*"),
            Selector::Filter(expression) => write!(f, "?{}", expression),
            Selector::SingularQuery(query) => write!(f, "{}", query),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            let selectors = segment.selectors();
            if let Segment::Recursive { .. } = segment {
                f.write_str("..")?;
            }
            match selectors {
                [Selector::Name(name)] if is_shorthand_name(name) => {
                    if i > 0 && matches!(segment, Segment::Child { .. }) {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                [Selector::Wildcard] if matches!(segment, Segment::Recursive { .. }) => {
                    f.write_str("*")?;
                }
                _ => {
                    f.write_str("[")?;
                    for (j, selector) in selectors.iter().enumerate() {
                        if j > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", selector)?;
                    }
                    f.write_str("]")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(json: serde_json::Value) -> Value {
        Value::from_json(&json)
    }

    fn find(query: &str, data: &Value) -> Vec<Value> {
        Query::parse(query)
            .unwrap()
            .find(data)
            .unwrap()
            .into_iter()
            .map(QueryNode::into_value)
            .collect()
    }

    #[test]
    fn test_name_and_index() {
        let data = value(json!({"a": {"b": [1, 2, 3]}}));
        assert_eq!(find("a.b[0]", &data), vec![Value::Int(1)]);
        assert_eq!(find("a.b[-1]", &data), vec![Value::Int(3)]);
        assert_eq!(find("a['b'][1]", &data), vec![Value::Int(2)]);
        assert!(find("a.c", &data).is_empty());
        assert!(find("a.b[5]", &data).is_empty());
    }

    #[test]
    fn test_slices() {
        let data = value(json!({"x": [0, 1, 2, 3, 4, 5]}));
        let ints = |v: Vec<i64>| v.into_iter().map(Value::Int).collect::<Vec<_>>();
        assert_eq!(find("x[1:3]", &data), ints(vec![1, 2]));
        assert_eq!(find("x[::2]", &data), ints(vec![0, 2, 4]));
        assert_eq!(find("x[::-1]", &data), ints(vec![5, 4, 3, 2, 1, 0]));
        assert_eq!(find("x[-2:]", &data), ints(vec![4, 5]));
        assert_eq!(find("x[4:1:-2]", &data), ints(vec![4, 2]));
        assert!(find("x[::0]", &data).is_empty());
        assert_eq!(find("x[-100:2]", &data), ints(vec![0, 1]));
    }

    #[test]
    fn test_wildcard_and_recursive_descent() {
        let data = value(json!({"a": {"price": 1, "b": {"price": 2}}, "c": [{"price": 3}]}));
        assert_eq!(
            find("$..price", &data),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        assert_eq!(find("a.*", &data).len(), 2);
    }

    #[test]
    fn test_recursion_limit() {
        let mut data = json!(1);
        for _ in 0..10 {
            data = json!({ "a": data });
        }
        let data = value(data);
        let query = Query::parse("$..a").unwrap();
        assert!(query.find_with_depth(&data, 20).is_ok());
        let err = query.find_with_depth(&data, 5).unwrap_err();
        assert!(matches!(err, LiquidError::QueryRecursion(_)));
    }

    #[test]
    fn test_filter_selector() {
        let data = value(json!({"products": [
            {"title": "a", "price": 5},
            {"title": "b", "price": 15},
            {"title": "c"}
        ]}));
        let titles: Vec<Value> = find("products[?@.price < 10].title", &data);
        assert_eq!(titles, vec![Value::from("a")]);
        assert_eq!(find("products[?@.price].title", &data).len(), 2);
        assert_eq!(find("products[?!@.price].title", &data), vec![Value::from("c")]);
        assert_eq!(
            find("products[?@.price > $.products[0].price].title", &data),
            vec![Value::from("b")]
        );
    }

    #[test]
    fn test_filter_functions() {
        let data = value(json!({"users": [
            {"name": "Sue", "tags": ["a", "b"]},
            {"name": "Bob", "tags": []},
            {"name": "Bart", "tags": ["c"]}
        ]}));
        assert_eq!(find("users[?length(@.tags) > 1].name", &data), vec![Value::from("Sue")]);
        assert_eq!(find("users[?count(@.tags[*]) == 1].name", &data), vec![Value::from("Bart")]);
        assert_eq!(find("users[?match(@.name, 'B.*')].name", &data).len(), 2);
        assert_eq!(find("users[?search(@.name, 'u')].name", &data), vec![Value::from("Sue")]);
        assert_eq!(find("users[?value(@.tags[0]) == 'c'].name", &data), vec![Value::from("Bart")]);
    }

    #[test]
    fn test_singular_query_selector() {
        let data = value(json!({"key": "b", "i": 1, "m": {"b": "B"}, "list": ["x", "y"]}));
        assert_eq!(find("m[key]", &data), vec![Value::from("B")]);
        assert_eq!(find("list[i]", &data), vec![Value::from("y")]);
        assert!(find("m[nosuchthing]", &data).is_empty());

        let data = value(json!({"m": {"a": 1}, "keys": ["a", "b"]}));
        let err = Query::parse("m[keys[*]]").unwrap().find(&data);
        assert!(err.is_err());
    }

    #[test]
    fn test_liquid_size_first_last() {
        let data = value(json!({"a": [1, 2, 3], "s": "hello", "o": {"size": 99}}));
        assert_eq!(find("a.size", &data), vec![Value::Int(3)]);
        assert_eq!(find("a.first", &data), vec![Value::Int(1)]);
        assert_eq!(find("a.last", &data), vec![Value::Int(3)]);
        assert_eq!(find("s.size", &data), vec![Value::Int(5)]);
        assert_eq!(find("o.size", &data), vec![Value::Int(99)]);
    }

    #[test]
    fn test_wide_ranges() {
        let data = Value::Range(i64::MIN, i64::MAX);
        assert_eq!(find("size", &data), vec![Value::Int(i64::MAX)]);
        assert_eq!(find("first", &data), vec![Value::Int(i64::MIN)]);
        assert_eq!(find("last", &data), vec![Value::Int(i64::MAX)]);
        assert_eq!(find("[1]", &data), vec![Value::Int(i64::MIN + 1)]);
        assert_eq!(
            find("[:3]", &data),
            vec![Value::Int(i64::MIN), Value::Int(i64::MIN + 1), Value::Int(i64::MIN + 2)]
        );
        assert_eq!(
            find("[-2:]", &Value::Range(0, i64::MAX)),
            vec![Value::Int(i64::MAX - 1), Value::Int(i64::MAX)]
        );
        assert_eq!(find("[::4503599627370496]", &Value::Range(0, i64::MAX)).len(), 2048);

        for query in ["[*]", "[:]", "$..*"] {
            let err = Query::parse(query).unwrap().find(&data).unwrap_err();
            assert!(matches!(err, LiquidError::Type(_)), "{}", query);
        }
    }

    #[test]
    fn test_find_is_deterministic_and_pure() {
        let data = value(json!({"a": [{"b": 1}, {"b": 2}], "c": {"b": 3}}));
        let before = data.clone();
        let query = Query::parse("$..b").unwrap();
        let first: Vec<String> = query.find(&data).unwrap().paths();
        let second: Vec<String> = query.find(&data).unwrap().paths();
        assert_eq!(first, second);
        assert_eq!(first, vec!["$['a'][0]['b']", "$['a'][1]['b']", "$['c']['b']"]);
        assert_eq!(data, before);
    }

    #[test]
    fn test_display() {
        assert_eq!(Query::parse("a.b[0]").unwrap().to_string(), "a.b[0]");
        assert_eq!(Query::parse("a['b c']").unwrap().to_string(), "a['b c']");
        assert_eq!(Query::parse("a..b").unwrap().to_string(), "a..b");
    }

    #[test]
    fn test_is_singular_and_as_word() {
        assert!(Query::parse("a.b[0]").unwrap().is_singular());
        assert!(!Query::parse("a[*]").unwrap().is_singular());
        assert_eq!(Query::parse("foo").unwrap().as_word(), Some("foo"));
        assert_eq!(Query::parse("foo.bar").unwrap().as_word(), None);
        assert_eq!(
            Query::parse("block.super").unwrap().as_names(),
            Some(vec!["block", "super"])
        );
    }
}
