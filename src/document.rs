use crate::element::{Element, ElementData};
use crate::error::Result;
use crate::parser::{DocumentParser, ReadOptions};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    CData(String),
    PI(String),
    DocType(String),
}

impl Node {
    pub fn as_element(&self) -> Option<Element> {
        match self {
            Self::Element(elem) => Some(*elem),
            _ => None,
        }
    }

    pub(crate) fn build_text_content(&self, document: &Document, buf: &mut String) {
        match self {
            Node::Element(elem) => elem.build_text_content(document, buf),
            Node::Text(text) => buf.push_str(text),
            Node::CData(text) => buf.push_str(text),
            _ => {}
        }
    }

    pub(crate) fn is_blank_text(&self) -> bool {
        match self {
            Node::Text(text) => text.chars().all(char::is_whitespace),
            _ => false,
        }
    }
}

/// Options when writing xml.
///
/// Output is always UTF-8. `encoding_label` is only the label put in the declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Spaces per nesting level. `0` disables pretty printing.
    pub indent_size: usize,
    pub xml_declaration: bool,
    pub encoding_label: String,
}

impl Default for WriteOptions {
    fn default() -> WriteOptions {
        WriteOptions {
            indent_size: 2,
            xml_declaration: true,
            encoding_label: "UTF-8".to_string(),
        }
    }
}

/// Represents a XML document.
///
/// Use [`Document::parse_str()`], [`Document::parse_reader()`] or
/// [`Document::parse_file()`] to parse xml.
///
/// # Examples
/// ```
/// use rssadd::Document;
///
/// let mut doc = Document::parse_str(r#"<?xml version="1.0" encoding="UTF-8"?>
/// <rss version="2.0">
///     <channel>
///         <title>Lewis Carol</title>
///     </channel>
/// </rss>
/// "#).unwrap();
/// let title = doc
///   .root_element()
///   .unwrap()
///   .find(&doc, "channel")
///   .unwrap()
///   .find(&doc, "title")
///   .unwrap();
/// title.set_text_content(&mut doc, "Lewis Carroll");
/// let xml = doc.write_str().unwrap();
/// assert!(xml.contains("<title>Lewis Carroll</title>"));
/// ```
#[derive(Debug)]
pub struct Document {
    pub(crate) store: Vec<ElementData>,
    container: Element,

    pub(crate) version: String,
    pub(crate) encoding: Option<String>,
    pub(crate) standalone: bool,
}

impl Document {
    /// Create a blank new xml document.
    pub fn new() -> Document {
        let (container, container_data) = Element::container();
        Document {
            store: vec![container_data],
            container,
            version: "1.0".to_string(),
            encoding: None,
            standalone: false,
        }
    }

    /// The container holds the root element along with top-level
    /// comments, processing instructions and doctype.
    pub fn container(&self) -> Element {
        self.container
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 1
    }

    /// Get first element of document.
    pub fn root_element(&self) -> Option<Element> {
        self.container
            .children(self)
            .iter()
            .find_map(|node| node.as_element())
    }

    pub fn root_nodes(&self) -> &Vec<Node> {
        self.container.children(self)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Encoding declared by the parsed source, if any.
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn standalone(&self) -> bool {
        self.standalone
    }
}

impl Default for Document {
    fn default() -> Document {
        Document::new()
    }
}

// Read
impl Document {
    pub fn parse_str(str: &str) -> Result<Document> {
        Self::parse_str_with_opts(str, ReadOptions::default())
    }

    pub fn parse_str_with_opts(str: &str, opts: ReadOptions) -> Result<Document> {
        DocumentParser::parse_reader(str.as_bytes(), opts)
    }

    /// Parses xml from reader. The encoding is detected from the BOM and the declaration.
    ///
    /// # Errors
    ///
    /// - [`Error::CannotDecode`]: Could not decode XML.
    /// - [`Error::MalformedXML`]: Could not read XML.
    /// - [`Error::Io`]: IO Error
    ///
    /// [`Error::CannotDecode`]: crate::Error::CannotDecode
    /// [`Error::MalformedXML`]: crate::Error::MalformedXML
    /// [`Error::Io`]: crate::Error::Io
    pub fn parse_reader<R: Read>(reader: R) -> Result<Document> {
        DocumentParser::parse_reader(reader, ReadOptions::default())
    }

    pub fn parse_reader_with_opts<R: Read>(reader: R, opts: ReadOptions) -> Result<Document> {
        DocumentParser::parse_reader(reader, opts)
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Document> {
        Self::parse_file_with_opts(path, ReadOptions::default())
    }

    pub fn parse_file_with_opts<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<Document> {
        let file = File::open(path)?;
        DocumentParser::parse_reader(file, opts)
    }
}

impl FromStr for Document {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Document> {
        Document::parse_str(s)
    }
}

// Write
impl Document {
    /// Writes document as xml string.
    pub fn write_str(&self) -> Result<String> {
        let mut buf: Vec<u8> = Vec::with_capacity(200);
        self.write(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Write document to writer. Will be written in UTF-8.
    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        self.write_with_opts(writer, &WriteOptions::default())
    }

    /// Write the whole document: declaration, top-level nodes and the root element.
    pub fn write_with_opts(&self, writer: &mut impl Write, opts: &WriteOptions) -> Result<()> {
        let container = self.container();
        self.write_tree(writer, container.children(self), self.standalone, opts)
    }

    /// Write `element` and its descendants only, as if it were the root.
    pub fn write_subtree(
        &self,
        writer: &mut impl Write,
        element: Element,
        opts: &WriteOptions,
    ) -> Result<()> {
        self.write_tree(writer, &[Node::Element(element)], false, opts)
    }

    fn write_tree<W: Write>(
        &self,
        writer: &mut W,
        nodes: &[Node],
        standalone: bool,
        opts: &WriteOptions,
    ) -> Result<()> {
        let mut xml_writer = if opts.indent_size > 0 {
            Writer::new_with_indent(&mut *writer, b' ', opts.indent_size)
        } else {
            Writer::new(&mut *writer)
        };
        if opts.xml_declaration {
            self.write_decl(&mut xml_writer, standalone, opts)?;
        }
        self.write_nodes(&mut xml_writer, nodes)?;
        if opts.indent_size > 0 {
            xml_writer.into_inner().write_all(b"\n")?;
        }
        Ok(())
    }

    fn write_decl(
        &self,
        writer: &mut Writer<impl Write>,
        standalone: bool,
        opts: &WriteOptions,
    ) -> Result<()> {
        let standalone = match standalone {
            true => Some("yes".as_bytes()),
            false => None,
        };
        writer.write_event(Event::Decl(BytesDecl::new(
            self.version.as_bytes(),
            Some(opts.encoding_label.as_bytes()),
            standalone,
        )))?;
        Ok(())
    }

    fn write_nodes(&self, writer: &mut Writer<impl Write>, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            match node {
                Node::Element(eid) => self.write_element(writer, *eid)?,
                Node::Text(text) => {
                    writer.write_event(Event::Text(BytesText::from_plain_str(text)))?
                }
                // DocType, Comment, CData, and PI content is kept as read.
                Node::DocType(text) => {
                    writer.write_event(Event::DocType(BytesText::from_escaped_str(text)))?
                }
                Node::Comment(text) => {
                    writer.write_event(Event::Comment(BytesText::from_escaped_str(text)))?
                }
                Node::CData(text) => {
                    writer.write_event(Event::CData(BytesText::from_escaped_str(text)))?
                }
                Node::PI(text) => {
                    writer.write_event(Event::PI(BytesText::from_escaped_str(text)))?
                }
            };
        }
        Ok(())
    }

    fn write_element(&self, writer: &mut Writer<impl Write>, element: Element) -> Result<()> {
        let name_bytes = element.full_name(self).as_bytes();
        let mut start = BytesStart::borrowed_name(name_bytes);
        for (key, val) in element.attributes(self) {
            // values are stored unescaped, the `&str` pair escapes them
            start.push_attribute((key.as_str(), val.as_str()));
        }
        if element.has_children(self) {
            writer.write_event(Event::Start(start))?;
            self.write_nodes(writer, element.children(self))?;
            writer.write_event(Event::End(BytesEnd::borrowed(name_bytes)))?;
        } else {
            writer.write_event(Event::Empty(start))?;
        }
        Ok(())
    }
}
