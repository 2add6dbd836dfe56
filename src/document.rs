use crate::dom_tree::append_to_existing_text;
use crate::dom_tree::Element;
use crate::dom_tree::Node;
use crate::dom_tree::NodeData;
use crate::dom_tree::NodeId;
use crate::dom_tree::Tree;
use crate::error::{Error, Result};
use encoding_rs::Encoding;
use html5ever::parse_document;
use lazy_static::lazy_static;
use markup5ever::interface::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use markup5ever::Attribute;
use markup5ever::ExpandedName;
use markup5ever::QualName;
use regex::bytes::Regex;
use std::borrow::Cow;
use std::collections::HashSet;
use tendril::StrTendril;
use tendril::TendrilSink;
use tracing::{debug, trace};

lazy_static! {
    static ref RE_META_CHARSET: Regex =
        Regex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#).unwrap();
}

/// Number of leading bytes searched for a `<meta>` charset declaration.
const META_PRESCAN_LEN: usize = 1024;

/// Document represents a parsed HTML document.
pub struct Document {
    /// The document's dom tree.
    pub(crate) tree: Tree<NodeData>,

    /// Errors that occurred during parsing.
    pub errors: Vec<Cow<'static, str>>,

    /// The document's quirks mode.
    pub quirks_mode: QuirksMode,
}

impl Default for Document {
    fn default() -> Document {
        Self {
            tree: Tree::new(NodeData::Document),
            errors: vec![],
            quirks_mode: QuirksMode::NoQuirks,
        }
    }
}

impl From<&str> for Document {
    fn from(html: &str) -> Document {
        Document::parse(StrTendril::from(html))
    }
}

impl From<String> for Document {
    fn from(html: String) -> Document {
        Document::parse(StrTendril::from(html))
    }
}

impl From<&String> for Document {
    fn from(html: &String) -> Document {
        Document::from(html.as_str())
    }
}

impl Document {
    fn parse(html: StrTendril) -> Document {
        let document = parse_document(Document::default(), Default::default()).one(html);
        debug!(
            nodes = document.tree.len(),
            errors = document.errors.len(),
            "parsed html document"
        );
        document
    }

    /// Decodes raw bytes and parses them. `charset` overrides any encoding
    /// declared by the input itself, byte order marks included.
    pub fn from_bytes(bytes: &[u8], charset: Option<&str>) -> Result<Document> {
        let (html, had_errors) = match charset {
            Some(label) => {
                let encoding = Encoding::for_label(label.trim().as_bytes())
                    .ok_or_else(|| Error::UnknownCharset(label.to_string()))?;
                debug!(encoding = encoding.name(), "decoding input");
                encoding.decode_without_bom_handling(bytes)
            }
            None => {
                let encoding = sniff_encoding(bytes);
                debug!(encoding = encoding.name(), "decoding input");
                // A byte order mark wins over a declared encoding.
                let (html, _, had_errors) = encoding.decode(bytes);
                (html, had_errors)
            }
        };
        if had_errors {
            debug!("input contained malformed byte sequences");
        }

        Ok(Document::parse(StrTendril::from(&*html)))
    }

    /// Return the underlying root document node.
    pub fn root(&self) -> Node<'_> {
        self.tree.root()
    }

    /// Gets a handle to the node with the given id.
    pub fn node(&self, id: &NodeId) -> Node<'_> {
        self.tree.get_unchecked(id)
    }

    /// Detaches from the tree every node whose id is in `matches`, together
    /// with its subtree. Nodes that are not matches themselves are kept and
    /// only searched for matching descendants.
    pub fn remove_matches(&mut self, matches: &HashSet<NodeId>) {
        let mut remove = vec![];
        let mut stack = vec![self.tree.root_id()];

        while let Some(id) = stack.pop() {
            for child in self.tree.get_unchecked(&id).children() {
                if matches.contains(&child.id) {
                    remove.push(child.id);
                } else {
                    stack.push(child.id);
                }
            }
        }

        debug!(removed = remove.len(), "pruned matched subtrees");
        for id in remove {
            self.tree.remove_from_parent(&id);
        }
    }
}

/// Picks the encoding declared by a `<meta>` tag near the start of the
/// input, falling back to UTF-8.
fn sniff_encoding(bytes: &[u8]) -> &'static Encoding {
    let head = &bytes[..bytes.len().min(META_PRESCAN_LEN)];
    RE_META_CHARSET
        .captures(head)
        .and_then(|caps| caps.get(1))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .map(|encoding| {
            // A UTF-16 declaration in ASCII-compatible bytes means UTF-8.
            if encoding == encoding_rs::UTF_16LE || encoding == encoding_rs::UTF_16BE {
                encoding_rs::UTF_8
            } else {
                encoding
            }
        })
        .unwrap_or(encoding_rs::UTF_8)
}

impl TreeSink for Document {
    // The overall result of parsing.
    type Output = Self;

    // Consume this sink and return the overall result of parsing.
    fn finish(self) -> Self {
        self
    }

    // Handle is a reference to a DOM node. The tree builder requires that a `Handle` implements `Clone` to get
    // another reference to the same node.
    type Handle = NodeId;

    // Signal a parse error.
    fn parse_error(&mut self, msg: Cow<'static, str>) {
        trace!(%msg, "html parse error");
        self.errors.push(msg);
    }

    // Get a handle to the `Document` node.
    fn get_document(&mut self) -> NodeId {
        self.tree.root_id()
    }

    // Template contents are kept as ordinary children of the template
    // element, so they take part in selection like any other subtree.
    fn get_template_contents(&mut self, target: &NodeId) -> NodeId {
        *target
    }

    // Set the document's quirks mode.
    fn set_quirks_mode(&mut self, mode: QuirksMode) {
        self.quirks_mode = mode;
    }

    // Do two handles refer to the same node?.
    fn same_node(&self, x: &NodeId, y: &NodeId) -> bool {
        *x == *y
    }

    // What is the name of the element?
    // Should never be called on a non-element node; Feel free to `panic!`.
    fn elem_name<'a>(&'a self, target: &'a NodeId) -> ExpandedName<'a> {
        match self.tree.node(target).data {
            NodeData::Element(Element { ref name, .. }) => name.expanded(),
            _ => panic!("not an element!"),
        }
    }

    // Create an element.
    fn create_element(
        &mut self,
        name: QualName,
        attrs: Vec<Attribute>,
        flags: ElementFlags,
    ) -> NodeId {
        self.tree.create_node(NodeData::Element(Element::new(
            name,
            attrs,
            flags.mathml_annotation_xml_integration_point,
        )))
    }

    // Create a comment node.
    fn create_comment(&mut self, text: StrTendril) -> NodeId {
        self.tree.create_node(NodeData::Comment { contents: text })
    }

    // Create a Processing Instruction node.
    fn create_pi(&mut self, target: StrTendril, data: StrTendril) -> NodeId {
        self.tree.create_node(NodeData::ProcessingInstruction {
            target,
            contents: data,
        })
    }

    // Append a node as the last child of the given node. If this would produce adjacent slbling text nodes, it
    // should concatenate the text instead.
    // The child node will not already have a parent.
    fn append(&mut self, parent: &NodeId, child: NodeOrText<NodeId>) {
        match child {
            NodeOrText::AppendNode(node_id) => self.tree.append_child_of(parent, &node_id),
            NodeOrText::AppendText(text) => {
                if let Some(last_child) = self.tree.last_child_of(parent) {
                    if append_to_existing_text(self.tree.node_mut(&last_child), &text) {
                        return;
                    }
                }

                self.tree
                    .append_child_data_of(parent, NodeData::Text { contents: text });
            }
        }
    }

    // Append a node as the sibling immediately before the given node.
    // The tree builder promises that `sibling` is not a text node. However its old previous sibling, which would
    // become the new node's previs sibling, could be a text node. If the new node is also a text node, the two
    // should be merged, as in the behavior of `append`.
    fn append_before_sibling(&mut self, sibling: &NodeId, child: NodeOrText<NodeId>) {
        match child {
            NodeOrText::AppendText(text) => {
                if let Some(prev_sibling) = self.tree.prev_sibling_of(sibling) {
                    if append_to_existing_text(self.tree.node_mut(&prev_sibling), &text) {
                        return;
                    }
                }

                let id = self.tree.create_node(NodeData::Text { contents: text });
                self.tree.append_prev_sibling_of(sibling, &id);
            }

            // Any other kind of node.
            NodeOrText::AppendNode(id) => self.tree.append_prev_sibling_of(sibling, &id),
        };
    }

    // When the insertion point is decided by the existence of a parent node of the element, we consider both
    // possibilities and send the element which will be used if a parent node exists, along with the element to be
    // used if there isn't one.
    fn append_based_on_parent_node(
        &mut self,
        element: &NodeId,
        prev_element: &NodeId,
        child: NodeOrText<NodeId>,
    ) {
        let has_parent = self.tree.parent_of(element).is_some();

        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    // Append a `DOCTYPE` element to the `Document` node.
    fn append_doctype_to_document(
        &mut self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        let root = self.tree.root_id();
        self.tree.append_child_data_of(
            &root,
            NodeData::Doctype {
                name,
                public_id,
                system_id,
            },
        );
    }

    // Add each attribute to the given element, if no attribute with that name already exists. The tree builder
    // promises this will never be called with something else than an element.
    fn add_attrs_if_missing(&mut self, target: &NodeId, attrs: Vec<Attribute>) {
        let existing = if let NodeData::Element(Element { ref mut attrs, .. }) =
            self.tree.node_mut(target).data
        {
            attrs
        } else {
            panic!("not an element")
        };

        let existing_names = existing
            .iter()
            .map(|e| e.name.clone())
            .collect::<HashSet<_>>();
        existing.extend(
            attrs
                .into_iter()
                .filter(|attr| !existing_names.contains(&attr.name)),
        );
    }

    // Detach the given node from its parent.
    fn remove_from_parent(&mut self, target: &NodeId) {
        self.tree.remove_from_parent(target);
    }

    // Remove all the children from node and append them to new_parent.
    fn reparent_children(&mut self, node: &NodeId, new_parent: &NodeId) {
        self.tree.reparent_children_of(node, Some(*new_parent));
    }
}
