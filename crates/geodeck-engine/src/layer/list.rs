use std::rc::Rc;

use super::layer::{Layer, LayerRef};

/// Entry of a layer list as supplied by the host.
#[derive(Clone)]
pub enum LayerNode {
    Layer(LayerRef),
    /// Nested list, flattened in place.
    Group(Vec<LayerNode>),
    /// Placeholder for a conditionally omitted layer; dropped.
    Empty,
}

impl LayerNode {
    pub fn layer<L: Layer>(layer: L) -> Self {
        LayerNode::Layer(Rc::new(layer))
    }

    /// `Some(layer)` or `Empty`.
    pub fn optional(layer: Option<LayerRef>) -> Self {
        layer.map_or(LayerNode::Empty, LayerNode::Layer)
    }

    fn flatten_into(&self, out: &mut Vec<LayerRef>) {
        match self {
            LayerNode::Layer(layer) => out.push(Rc::clone(layer)),
            LayerNode::Group(nodes) => {
                for node in nodes {
                    node.flatten_into(out);
                }
            }
            LayerNode::Empty => {}
        }
    }
}

impl From<LayerRef> for LayerNode {
    fn from(layer: LayerRef) -> Self {
        LayerNode::Layer(layer)
    }
}

impl From<Vec<LayerNode>> for LayerNode {
    fn from(nodes: Vec<LayerNode>) -> Self {
        LayerNode::Group(nodes)
    }
}

/// Flattens nodes depth-first, dropping empty entries.
pub(crate) fn flatten(nodes: &[LayerNode]) -> Vec<LayerRef> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        node.flatten_into(&mut out);
    }
    out
}

/// Reference-counted layer list.
///
/// Clones share identity: handing the same list to the manager twice is a
/// no-op. Build a new list (or [`shallow_copy`](Self::shallow_copy)) to force
/// reconciliation.
#[derive(Clone)]
pub struct LayerList(Rc<Vec<LayerNode>>);

impl LayerList {
    pub fn new(nodes: Vec<LayerNode>) -> Self {
        Self(Rc::new(nodes))
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Same layers, new identity.
    pub fn shallow_copy(&self) -> Self {
        Self::new(self.0.as_ref().clone())
    }

    #[inline]
    pub fn same(&self, other: &LayerList) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn nodes(&self) -> &[LayerNode] {
        &self.0
    }

    pub fn flatten(&self) -> Vec<LayerRef> {
        flatten(&self.0)
    }
}

impl Default for LayerList {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<LayerRef> for LayerList {
    fn from_iter<I: IntoIterator<Item = LayerRef>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(LayerNode::Layer).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::testing::TestLayer;

    #[test]
    fn flatten_drops_empty_and_keeps_order() {
        let list = LayerList::new(vec![
            LayerNode::layer(TestLayer::new("a")),
            LayerNode::Empty,
            LayerNode::Group(vec![
                LayerNode::layer(TestLayer::new("b")),
                LayerNode::Group(vec![LayerNode::layer(TestLayer::new("c"))]),
            ]),
            LayerNode::optional(None),
        ]);
        let ids: Vec<String> = list.flatten().iter().map(|l| l.id().to_string()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn clones_share_identity_copies_do_not() {
        let list = LayerList::new(vec![LayerNode::layer(TestLayer::new("a"))]);
        assert!(list.same(&list.clone()));
        assert!(!list.same(&list.shallow_copy()));
    }
}
