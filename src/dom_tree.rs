use markup5ever::Attribute;
use markup5ever::QualName;
use std::fmt::Debug;
use tendril::StrTendril;

/// Alias for `NodeRef`.
pub type Node<'a> = NodeRef<'a, NodeData>;

/// A node id that identifies a node in the tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    value: usize,
}

impl NodeId {
    pub(crate) fn new(value: usize) -> Self {
        NodeId { value }
    }
}

/// The different kinds of nodes in the DOM.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// The `Tree` itself - the root node of an HTML tree.
    Document,

    /// A `DOCTYPE` with name, public id, and system id.
    Doctype {
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    },

    /// A text node.
    Text { contents: StrTendril },

    /// A comment.
    Comment { contents: StrTendril },

    /// An element with attributes.
    Element(Element),

    /// A Processing instruction.
    ProcessingInstruction {
        target: StrTendril,
        contents: StrTendril,
    },
}

/// An element with a tag name and its attributes in source order.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: QualName,
    pub attrs: Vec<Attribute>,

    /// Whether the node is a HTML integration point
    /// [mathml annotation xml integration point](https://html.spec.whatwg.org/multipage/#mathml-annotation-xml-integration-point)
    pub mathml_annotation_xml_integration_point: bool,
}

impl Element {
    pub fn new(
        name: QualName,
        attrs: Vec<Attribute>,
        mathml_annotation_xml_integration_point: bool,
    ) -> Element {
        Element {
            name,
            attrs,
            mathml_annotation_xml_integration_point,
        }
    }

    /// Gets the first attribute with the given local name.
    pub fn attr(&self, name: &str) -> Option<&StrTendril> {
        self.attrs
            .iter()
            .find(|attr| &*attr.name.local == name)
            .map(|attr| &attr.value)
    }
}

#[derive(Debug, Clone)]
pub struct InnerNode<T> {
    pub(crate) parent: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub data: T,
}

impl<T> InnerNode<T> {
    fn new(data: T) -> Self {
        InnerNode {
            parent: None,
            prev_sibling: None,
            next_sibling: None,
            first_child: None,
            last_child: None,
            data,
        }
    }
}

/// An arena that owns every node of a document. Relationships between nodes
/// are stored as ids, so detaching a subtree never frees its slots.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    nodes: Vec<InnerNode<T>>,
}

impl<T: Debug> Tree<T> {
    /// Creates a new tree with the given root.
    pub fn new(root: T) -> Self {
        Tree {
            nodes: vec![InnerNode::new(root)],
        }
    }

    /// Gets the id of the root node.
    pub fn root_id(&self) -> NodeId {
        NodeId::new(0)
    }

    /// Gets the root node.
    pub fn root(&self) -> NodeRef<'_, T> {
        NodeRef::new(self.root_id(), self)
    }

    /// Gets a handle to the node with the given id.
    pub fn get(&self, id: &NodeId) -> Option<NodeRef<'_, T>> {
        self.nodes.get(id.value).map(|_| NodeRef::new(*id, self))
    }

    /// Gets a handle to the node with the given id without checking it exists.
    pub fn get_unchecked(&self, id: &NodeId) -> NodeRef<'_, T> {
        NodeRef::new(*id, self)
    }

    /// Returns the number of allocated nodes, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn node(&self, id: &NodeId) -> &InnerNode<T> {
        &self.nodes[id.value]
    }

    pub(crate) fn node_mut(&mut self, id: &NodeId) -> &mut InnerNode<T> {
        &mut self.nodes[id.value]
    }

    /// Allocates a detached node.
    pub fn create_node(&mut self, data: T) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(InnerNode::new(data));
        id
    }

    pub fn parent_of(&self, id: &NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn last_child_of(&self, id: &NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    pub fn prev_sibling_of(&self, id: &NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Appends `child` as the last child of `parent`. The child is detached
    /// from its current position first.
    pub fn append_child_of(&mut self, parent: &NodeId, child: &NodeId) {
        self.remove_from_parent(child);

        let last_child = self.node(parent).last_child;
        {
            let child_node = self.node_mut(child);
            child_node.parent = Some(*parent);
            child_node.prev_sibling = last_child;
        }

        match last_child {
            Some(last) => self.node_mut(&last).next_sibling = Some(*child),
            None => self.node_mut(parent).first_child = Some(*child),
        }

        self.node_mut(parent).last_child = Some(*child);
    }

    /// Creates a node from `data` and appends it as the last child of `parent`.
    pub fn append_child_data_of(&mut self, parent: &NodeId, data: T) -> NodeId {
        let id = self.create_node(data);
        self.append_child_of(parent, &id);
        id
    }

    /// Inserts `new_sibling` immediately before `sibling`.
    pub fn append_prev_sibling_of(&mut self, sibling: &NodeId, new_sibling: &NodeId) {
        self.remove_from_parent(new_sibling);

        let parent = self.node(sibling).parent;
        let prev = self.node(sibling).prev_sibling;
        {
            let new_node = self.node_mut(new_sibling);
            new_node.parent = parent;
            new_node.prev_sibling = prev;
            new_node.next_sibling = Some(*sibling);
        }
        self.node_mut(sibling).prev_sibling = Some(*new_sibling);

        match prev {
            Some(prev) => self.node_mut(&prev).next_sibling = Some(*new_sibling),
            None => {
                if let Some(parent) = parent {
                    self.node_mut(&parent).first_child = Some(*new_sibling);
                }
            }
        }
    }

    /// Detaches the node, and with it the whole subtree it roots, from its parent.
    pub fn remove_from_parent(&mut self, id: &NodeId) {
        let (parent, prev, next) = {
            let node = self.node(id);
            (node.parent, node.prev_sibling, node.next_sibling)
        };

        if let Some(parent) = parent {
            let parent_node = self.node_mut(&parent);
            if parent_node.first_child == Some(*id) {
                parent_node.first_child = next;
            }
            if parent_node.last_child == Some(*id) {
                parent_node.last_child = prev;
            }
        }

        if let Some(prev) = prev {
            self.node_mut(&prev).next_sibling = next;
        }
        if let Some(next) = next {
            self.node_mut(&next).prev_sibling = prev;
        }

        let node = self.node_mut(id);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// Moves every child of `id` to the end of `new_parent`'s children, or
    /// detaches them when there is no new parent.
    pub fn reparent_children_of(&mut self, id: &NodeId, new_parent: Option<NodeId>) {
        let mut child = self.node(id).first_child;
        while let Some(current) = child {
            child = self.node(&current).next_sibling;
            match new_parent {
                Some(ref parent) => self.append_child_of(parent, &current),
                None => self.remove_from_parent(&current),
            }
        }
    }
}

/// A borrowed handle to a node of a `Tree`.
pub struct NodeRef<'a, T> {
    pub id: NodeId,
    pub tree: &'a Tree<T>,
}

impl<'a, T> Clone for NodeRef<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for NodeRef<'a, T> {}

impl<'a, T> PartialEq for NodeRef<'a, T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.tree, other.tree)
    }
}

impl<'a, T> Eq for NodeRef<'a, T> {}

impl<'a, T: Debug> Debug for NodeRef<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("data", self.data())
            .finish()
    }
}

impl<'a, T: Debug> NodeRef<'a, T> {
    pub fn new(id: NodeId, tree: &'a Tree<T>) -> Self {
        Self { id, tree }
    }

    fn inner(&self) -> &'a InnerNode<T> {
        self.tree.node(&self.id)
    }

    fn at(&self, id: Option<NodeId>) -> Option<Self> {
        id.map(|id| NodeRef::new(id, self.tree))
    }

    /// Gets the payload of the node.
    pub fn data(&self) -> &'a T {
        &self.inner().data
    }

    pub fn parent(&self) -> Option<Self> {
        self.at(self.inner().parent)
    }

    pub fn first_child(&self) -> Option<Self> {
        self.at(self.inner().first_child)
    }

    pub fn last_child(&self) -> Option<Self> {
        self.at(self.inner().last_child)
    }

    pub fn next_sibling(&self) -> Option<Self> {
        self.at(self.inner().next_sibling)
    }

    pub fn prev_sibling(&self) -> Option<Self> {
        self.at(self.inner().prev_sibling)
    }

    /// Gets the children of the node, in document order.
    pub fn children(&self) -> Vec<Self> {
        let mut children = vec![];
        let mut child = self.first_child();
        while let Some(node) = child {
            child = node.next_sibling();
            children.push(node);
        }
        children
    }

    /// Iterates over every node below this one in pre-order, excluding the
    /// node itself.
    pub fn descendants(&self) -> Descendants<'a, T> {
        Descendants {
            root: *self,
            next: self.first_child(),
        }
    }
}

/// Pre-order iterator returned by `NodeRef::descendants`.
pub struct Descendants<'a, T> {
    root: NodeRef<'a, T>,
    next: Option<NodeRef<'a, T>>,
}

impl<'a, T: Debug> Iterator for Descendants<'a, T> {
    type Item = NodeRef<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        self.next = current.first_child().or_else(|| {
            let mut node = current;
            loop {
                if node.id == self.root.id {
                    return None;
                }
                if let Some(sibling) = node.next_sibling() {
                    return Some(sibling);
                }
                node = node.parent()?;
            }
        });

        Some(current)
    }
}

impl<'a> Node<'a> {
    pub fn is_document(&self) -> bool {
        matches!(self.data(), NodeData::Document)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data(), NodeData::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data(), NodeData::Text { .. })
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.data(), NodeData::Comment { .. })
    }

    /// Gets the element data if this node is an element.
    pub fn element(&self) -> Option<&'a Element> {
        match self.data() {
            NodeData::Element(ref e) => Some(e),
            _ => None,
        }
    }

    /// Gets the local tag name of an element node.
    pub fn tag_name(&self) -> Option<&'a str> {
        self.element().map(|e| &*e.name.local)
    }

    /// Whether this node is an element with the given tag name.
    pub fn has_tag(&self, name: &str) -> bool {
        self.tag_name() == Some(name)
    }

    /// Gets the attributes of an element node, empty for other nodes.
    pub fn attrs(&self) -> &'a [Attribute] {
        match self.element() {
            Some(e) => &e.attrs,
            None => &[],
        }
    }

    /// Gets the specified attribute's value, first occurrence first.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element()
            .and_then(|e| e.attr(name))
            .map(|value| &**value)
    }

    /// Gets the child elements of the node.
    pub fn element_children(&self) -> Vec<Self> {
        self.children()
            .into_iter()
            .filter(|child| child.is_element())
            .collect()
    }

    /// Gets the first element following this node among its siblings.
    pub fn next_element_sibling(&self) -> Option<Self> {
        let mut sibling = self.next_sibling();
        while let Some(node) = sibling {
            if node.is_element() {
                return Some(node);
            }
            sibling = node.next_sibling();
        }
        None
    }

    /// Gets the text payload of a text or comment node.
    pub fn contents(&self) -> Option<&'a StrTendril> {
        match self.data() {
            NodeData::Text { ref contents } | NodeData::Comment { ref contents } => Some(contents),
            _ => None,
        }
    }

    /// Gets the combined text content of the node and its descendants.
    pub fn text(&self) -> StrTendril {
        let mut text = StrTendril::new();
        if let NodeData::Text { ref contents } = self.data() {
            text.push_tendril(contents);
        }
        for node in self.descendants() {
            if let NodeData::Text { ref contents } = node.data() {
                text.push_tendril(contents);
            }
        }
        text
    }
}

/// Appends `text` to `node` if it is a text node. Returns whether it did.
pub(crate) fn append_to_existing_text(node: &mut InnerNode<NodeData>, text: &str) -> bool {
    match node.data {
        NodeData::Text { ref mut contents } => {
            contents.push_slice(text);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(contents: &str) -> NodeData {
        NodeData::Text {
            contents: StrTendril::from(contents),
        }
    }

    fn contents_of(tree: &Tree<NodeData>, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|id| tree.get_unchecked(id).contents().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_append_and_navigate() {
        let mut tree = Tree::new(NodeData::Document);
        let root = tree.root_id();
        let a = tree.append_child_data_of(&root, text("a"));
        let b = tree.append_child_data_of(&root, text("b"));

        let root = tree.root();
        assert_eq!(root.first_child().map(|n| n.id), Some(a));
        assert_eq!(root.last_child().map(|n| n.id), Some(b));
        assert_eq!(tree.get_unchecked(&a).next_sibling().map(|n| n.id), Some(b));
        assert_eq!(tree.get_unchecked(&b).prev_sibling().map(|n| n.id), Some(a));
        assert_eq!(tree.get_unchecked(&b).parent().map(|n| n.id), Some(root.id));
    }

    #[test]
    fn test_prev_sibling_insert() {
        let mut tree = Tree::new(NodeData::Document);
        let root = tree.root_id();
        let b = tree.append_child_data_of(&root, text("b"));
        let a = tree.create_node(text("a"));
        tree.append_prev_sibling_of(&b, &a);

        let ids: Vec<NodeId> = tree.root().children().iter().map(|n| n.id).collect();
        assert_eq!(contents_of(&tree, &ids), vec!["a", "b"]);
    }

    #[test]
    fn test_remove_from_parent_middle() {
        let mut tree = Tree::new(NodeData::Document);
        let root = tree.root_id();
        tree.append_child_data_of(&root, text("a"));
        let b = tree.append_child_data_of(&root, text("b"));
        tree.append_child_data_of(&root, text("c"));

        tree.remove_from_parent(&b);

        let ids: Vec<NodeId> = tree.root().children().iter().map(|n| n.id).collect();
        assert_eq!(contents_of(&tree, &ids), vec!["a", "c"]);
        assert!(tree.get_unchecked(&b).parent().is_none());
    }

    #[test]
    fn test_descendants_preorder() {
        let mut tree = Tree::new(NodeData::Document);
        let root = tree.root_id();
        let x = tree.append_child_data_of(&root, NodeData::Document);
        tree.append_child_data_of(&x, text("1"));
        tree.append_child_data_of(&x, text("2"));
        tree.append_child_data_of(&root, text("3"));

        let seen: Vec<String> = tree
            .root()
            .descendants()
            .filter_map(|n| n.contents().map(|c| c.to_string()))
            .collect();
        assert_eq!(seen, vec!["1", "2", "3"]);

        let inner: Vec<String> = tree
            .get_unchecked(&x)
            .descendants()
            .filter_map(|n| n.contents().map(|c| c.to_string()))
            .collect();
        assert_eq!(inner, vec!["1", "2"]);
    }

    #[test]
    fn test_reparent_children() {
        let mut tree = Tree::new(NodeData::Document);
        let root = tree.root_id();
        let x = tree.append_child_data_of(&root, NodeData::Document);
        let y = tree.append_child_data_of(&root, NodeData::Document);
        tree.append_child_data_of(&x, text("1"));
        tree.append_child_data_of(&x, text("2"));

        tree.reparent_children_of(&x, Some(y));

        assert!(tree.get_unchecked(&x).first_child().is_none());
        assert_eq!(tree.get_unchecked(&y).text().to_string(), "12");
    }
}
