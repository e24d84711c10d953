use crate::document::{Document, Node};
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct ElementData {
    full_name: String,
    attributes: Vec<(String, String)>, // source order, xmlns declarations included
    parent: Option<Element>,
    children: Vec<Node>,
}

/// Represents an Xml Element.
///
/// This struct only contains a unique usize id and implements trait `Copy`.
/// So you do not need to bother with having a reference.
///
/// Because the actual data of the element is stored in [`Document`],
/// most methods takes `&Document` or `&mut Document` as its first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Element {
    id: usize,
}

impl Element {
    /// Create a new empty element with name.
    pub fn new<S: Into<String>>(document: &mut Document, name: S) -> Element {
        Self::with_data(document, name.into(), Vec::new())
    }

    pub(crate) fn with_data(
        document: &mut Document,
        full_name: String,
        attributes: Vec<(String, String)>,
    ) -> Element {
        let elem = Element {
            id: document.store.len(),
        };
        document.store.push(ElementData {
            full_name,
            attributes,
            parent: None,
            children: Vec::new(),
        });
        elem
    }

    pub(crate) fn container() -> (Element, ElementData) {
        let elem_data = ElementData {
            full_name: String::new(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
        };
        (Element { id: 0 }, elem_data)
    }

    /// The container holds the root element and the nodes around it.
    pub fn is_container(&self) -> bool {
        self.id == 0
    }

    pub fn separate_prefix_name(full_name: &str) -> (&str, &str) {
        match full_name.split_once(':') {
            Some((prefix, name)) => (prefix, name),
            None => ("", full_name),
        }
    }

    /// Deep copy `element` of `source` into `document`.
    ///
    /// The copy has no parent.
    pub fn import(document: &mut Document, source: &Document, element: Element) -> Element {
        let copy = Element::with_data(
            document,
            element.full_name(source).to_string(),
            element.attributes(source).to_vec(),
        );
        for node in element.children(source) {
            let node = match node {
                Node::Element(child) => Node::Element(Element::import(document, source, *child)),
                other => other.clone(),
            };
            copy.adopt(document, node);
        }
        copy
    }
}

impl Element {
    fn data<'a>(&self, document: &'a Document) -> &'a ElementData {
        &document.store[self.id]
    }

    fn mut_data<'a>(&self, document: &'a mut Document) -> &'a mut ElementData {
        &mut document.store[self.id]
    }

    /// Get raw name of element, including its namespace prefix.
    pub fn full_name<'a>(&self, document: &'a Document) -> &'a str {
        &self.data(document).full_name
    }

    /// Get prefix and name of element.
    ///
    /// `<prefix:name` -> `("prefix", "name")`
    pub fn prefix_name<'a>(&self, document: &'a Document) -> (&'a str, &'a str) {
        Self::separate_prefix_name(self.full_name(document))
    }

    pub fn prefix<'a>(&self, document: &'a Document) -> &'a str {
        self.prefix_name(document).0
    }

    pub fn name<'a>(&self, document: &'a Document) -> &'a str {
        self.prefix_name(document).1
    }

    /// Get attributes of element in the order they were written.
    ///
    /// Namespace declarations (`xmlns`, `xmlns:prefix`) are kept among them.
    pub fn attributes<'a>(&self, document: &'a Document) -> &'a [(String, String)] {
        &self.data(document).attributes
    }

    pub fn attribute<'a>(&self, document: &'a Document, name: &str) -> Option<&'a str> {
        self.attributes(document)
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the value in place if the attribute exists, appends it otherwise.
    pub fn set_attribute<S, T>(&self, document: &mut Document, name: S, value: T)
    where
        S: Into<String>,
        T: Into<String>,
    {
        let name = name.into();
        let value = value.into();
        let attributes = &mut self.mut_data(document).attributes;
        match attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(attr) => attr.1 = value,
            None => attributes.push((name, value)),
        }
    }

    /// Gets the namespace of this element.
    pub fn namespace<'a>(&self, document: &'a Document) -> Option<&'a str> {
        self.namespace_for_prefix(document, self.prefix(document))
    }

    /// Get namespace value given prefix, looking up the ancestors.
    pub fn namespace_for_prefix<'a>(
        &self,
        document: &'a Document,
        prefix: &str,
    ) -> Option<&'a str> {
        if prefix == "xml" {
            return Some("http://www.w3.org/XML/1998/namespace");
        }
        let key = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", prefix)
        };
        let mut elem = *self;
        loop {
            if let Some(value) = elem.attribute(document, &key) {
                return Some(value);
            }
            elem = elem.parent(document)?;
        }
    }

    pub fn parent(&self, document: &Document) -> Option<Element> {
        self.data(document).parent
    }

    pub fn has_parent(&self, document: &Document) -> bool {
        self.parent(document).is_some()
    }

    pub fn children<'a>(&self, document: &'a Document) -> &'a Vec<Node> {
        &self.data(document).children
    }

    pub(crate) fn mut_children<'a>(&self, document: &'a mut Document) -> &'a mut Vec<Node> {
        &mut self.mut_data(document).children
    }

    pub fn has_children(&self, document: &Document) -> bool {
        !self.children(document).is_empty()
    }

    pub fn child_elements(&self, document: &Document) -> Vec<Element> {
        self.children(document)
            .iter()
            .filter_map(|node| node.as_element())
            .collect()
    }

    /// First child element whose full name is `name`.
    pub fn find(&self, document: &Document, name: &str) -> Option<Element> {
        self.children(document)
            .iter()
            .filter_map(|node| node.as_element())
            .find(|elem| elem.full_name(document) == name)
    }

    /// All child elements whose full name is `name`, in document order.
    pub fn find_all(&self, document: &Document, name: &str) -> Vec<Element> {
        self.children(document)
            .iter()
            .filter_map(|node| node.as_element())
            .filter(|elem| elem.full_name(document) == name)
            .collect()
    }

    pub(crate) fn build_text_content(&self, document: &Document, buf: &mut String) {
        for node in self.children(document) {
            node.build_text_content(document, buf);
        }
    }

    /// Concatenated text and CDATA of all descendants.
    pub fn text_content(&self, document: &Document) -> String {
        let mut buf = String::new();
        self.build_text_content(document, &mut buf);
        buf
    }

    /// Replaces every child with a single text node.
    pub fn set_text_content<S: Into<String>>(&self, document: &mut Document, text: S) {
        let children = std::mem::take(self.mut_children(document));
        for node in children {
            if let Node::Element(elem) = node {
                elem.mut_data(document).parent = None;
            }
        }
        self.mut_children(document).push(Node::Text(text.into()));
    }

    // Caller guarantees the element in `node` is parentless.
    fn adopt(&self, document: &mut Document, node: Node) {
        if let Node::Element(elem) = node {
            elem.mut_data(document).parent = Some(*self);
        }
        self.mut_children(document).push(node);
    }

    fn check_movable(&self, document: &Document, node: &Node) -> Result<()> {
        if let Node::Element(elem) = node {
            if elem.is_container() {
                return Err(Error::ContainerCannotMove);
            }
            if elem.has_parent(document) {
                return Err(Error::HasAParent);
            }
        }
        Ok(())
    }

    /// Equivalent to `vec.push()`.
    ///
    /// # Errors
    ///
    /// - [`Error::HasAParent`]: If node is an element, it must not have a parent.
    /// Call `elem.detach()` before.
    pub fn push_child(&self, document: &mut Document, node: Node) -> Result<()> {
        self.check_movable(document, &node)?;
        self.adopt(document, node);
        Ok(())
    }

    /// Equivalent to `vec.insert()`.
    ///
    /// # Panics
    ///
    /// Panics if `index > children.len()`.
    pub fn insert_child(&self, document: &mut Document, index: usize, node: Node) -> Result<()> {
        self.check_movable(document, &node)?;
        if let Node::Element(elem) = node {
            elem.mut_data(document).parent = Some(*self);
        }
        self.mut_children(document).insert(index, node);
        Ok(())
    }

    /// Insert `node` right before the child element `reference`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: `reference` is not a child of this element.
    pub fn insert_before(
        &self,
        document: &mut Document,
        reference: Element,
        node: Node,
    ) -> Result<()> {
        let index = self.position(document, reference).ok_or(Error::NotFound)?;
        self.insert_child(document, index, node)
    }

    fn position(&self, document: &Document, element: Element) -> Option<usize> {
        self.children(document)
            .iter()
            .position(|node| node.as_element() == Some(element))
    }

    /// Equivalent to `vec.remove()`.
    ///
    /// # Panics
    ///
    /// Panics if index is out of bounds.
    pub fn remove_child(&self, document: &mut Document, index: usize) -> Node {
        let node = self.mut_children(document).remove(index);
        if let Node::Element(elem) = node {
            elem.mut_data(document).parent = None;
        }
        node
    }

    /// Remove child element by value.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: Element was not found among its children.
    pub fn remove_child_elem(&self, document: &mut Document, element: Element) -> Result<()> {
        let index = self.position(document, element).ok_or(Error::NotFound)?;
        self.remove_child(document, index);
        Ok(())
    }

    pub fn detach(&self, document: &mut Document) -> Result<()> {
        if self.is_container() {
            return Err(Error::ContainerCannotMove);
        }
        match self.parent(document) {
            Some(parent) => parent.remove_child_elem(document, *self),
            None => Ok(()),
        }
    }
}
