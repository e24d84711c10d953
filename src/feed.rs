//! Insert items into an RSS 2.0 feed and cap the number of items it keeps.

use crate::document::{Document, Node, WriteOptions};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::parser::ReadOptions;
use crate::source::{file_path, Source, SourceType, Target};
use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

/// `strftime` format of `<pubDate>`, e.g. `Wed, 12 Jun 2024 09:30:00 +0000`.
pub const PUBDATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Feed used when no source is given.
pub const FEED_EMPTY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss xmlns:atom="http://www.w3.org/2005/Atom" version="2.0">
  <channel>
      <title> </title>
      <link> </link>
      <description> </description>
  </channel>
</rss>"#;

/// One child element of a new item, or the item itself.
#[derive(Debug)]
pub enum Fragment {
    /// Exactly one element in xml, e.g. `<title>Hello</title>`.
    Xml(String),
    /// A parsed tree. Its root element is copied.
    Tree(Document),
}

impl Fragment {
    /// Copy the fragment's element into `document`, without a parent.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedXML`]: the xml is not exactly one element.
    /// - [`Error::TypeMismatch`]: the tree has no root element.
    pub fn import_into(&self, document: &mut Document) -> Result<Element> {
        match self {
            Fragment::Xml(xml) => {
                let parsed = Document::parse_str_with_opts(xml, ReadOptions::feed())?;
                let root = parsed.root_element().ok_or_else(|| {
                    Error::MalformedXML(format!("Fragment has no element: {:?}", xml))
                })?;
                Ok(Element::import(document, &parsed, root))
            }
            Fragment::Tree(tree) => {
                let root = tree.root_element().ok_or_else(|| {
                    Error::TypeMismatch("fragment tree without a root element".to_string())
                })?;
                Ok(Element::import(document, tree, root))
            }
        }
    }
}

impl From<&str> for Fragment {
    fn from(xml: &str) -> Fragment {
        Fragment::Xml(xml.to_string())
    }
}

impl From<String> for Fragment {
    fn from(xml: String) -> Fragment {
        Fragment::Xml(xml)
    }
}

impl From<Document> for Fragment {
    fn from(tree: Document) -> Fragment {
        Fragment::Tree(tree)
    }
}

/// What [`add_item`] and [`add_element`] hand back, depending on the target.
#[derive(Debug)]
pub enum Output {
    /// Root of the tree given as source, mutated in place.
    Root(Element),
    /// Feed read from bytes, text or a file, as a tree.
    Document(Document),
    /// Serialized feed.
    Bytes(Vec<u8>),
    /// Path the feed was written to.
    Written(PathBuf),
}

impl Output {
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Output::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Build an `<item>` from `fragments`, in order.
///
/// A `<pubDate>` with the current local time is appended unless a fragment provides one.
/// The item is the root element of the returned document.
pub fn build_item(fragments: &[Fragment]) -> Result<Document> {
    let mut document = Document::new();
    let container = document.container();
    let item = Element::new(&mut document, "item");
    container.push_child(&mut document, Node::Element(item))?;
    for fragment in fragments {
        let child = fragment.import_into(&mut document)?;
        item.push_child(&mut document, Node::Element(child))?;
    }
    if item.find(&document, "pubDate").is_none() {
        let pub_date = Element::new(&mut document, "pubDate");
        pub_date.set_text_content(&mut document, Local::now().format(PUBDATE_FORMAT).to_string());
        item.push_child(&mut document, Node::Element(pub_date))?;
    }
    Ok(document)
}

/// Build an item from `fragments` and add it to the feed. See [`add_element`].
///
/// # Examples
/// ```
/// use rssadd::{add_item, Fragment};
///
/// let fragments = vec![Fragment::from("<title>Hello</title>")];
/// let feed = add_item(None, None, &fragments, None).unwrap().into_bytes().unwrap();
/// let feed = String::from_utf8(feed).unwrap();
/// assert!(feed.contains("<title>Hello</title>"));
/// assert!(feed.contains("<pubDate>"));
/// ```
pub fn add_item(
    from: Option<Source>,
    to: Option<Target>,
    fragments: &[Fragment],
    max_items: Option<usize>,
) -> Result<Output> {
    let item = build_item(fragments)?;
    add_element(from, to, Some(Fragment::Tree(item)), max_items)
}

enum Loaded<'a> {
    Borrowed(&'a mut Document),
    Owned(Document),
}

impl<'a> Loaded<'a> {
    fn load(source: Source<'a>, source_type: SourceType) -> Result<Loaded<'a>> {
        let opts = ReadOptions::feed();
        let loaded = match (source_type, source) {
            (SourceType::Element, Source::Tree(document)) => Loaded::Borrowed(document),
            (SourceType::String, Source::Bytes(bytes)) => {
                Loaded::Owned(Document::parse_reader_with_opts(bytes, opts)?)
            }
            (SourceType::String, Source::Text(text)) => {
                Loaded::Owned(Document::parse_str_with_opts(text, opts)?)
            }
            (SourceType::File, Source::Text(text)) => {
                Loaded::Owned(Document::parse_file_with_opts(file_path(text)?, opts)?)
            }
            (SourceType::File, Source::Path(path)) => {
                Loaded::Owned(Document::parse_file_with_opts(path, opts)?)
            }
            (source_type, source) => {
                return Err(Error::TypeMismatch(format!(
                    "{} source can't be read as {:?}",
                    source.kind(),
                    source_type
                )))
            }
        };
        Ok(loaded)
    }

    fn document(&self) -> &Document {
        match self {
            Loaded::Borrowed(document) => &**document,
            Loaded::Owned(document) => document,
        }
    }

    fn document_mut(&mut self) -> &mut Document {
        match self {
            Loaded::Borrowed(document) => &mut **document,
            Loaded::Owned(document) => document,
        }
    }
}

/// Add `element` as the first item of the feed's channel, then drop items from
/// the end until at most `max_items` remain.
///
/// - `from`: feed to read. [`FEED_EMPTY`] when `None`.
/// - `to`: [`Target::Tree`] hands the tree back, [`Target::Path`] writes the
///   feed to a file, `None` returns the serialized feed.
/// - `element`: the item to insert. Nothing is inserted when `None`, but
///   `max_items` still applies.
///
/// A tree given as source is changed in place, even if writing fails afterwards.
///
/// # Errors
///
/// - [`Error::TypeMismatch`]: a tree source or the element has no root element.
/// - [`Error::MalformedXML`], [`Error::CannotDecode`]: the feed or the element doesn't parse.
/// - [`Error::MissingChannel`]: the feed root has no `<channel>`.
/// - [`Error::UnsupportedScheme`]: the source is a URL other than `file:`.
/// - [`Error::Io`]: the source or target file can't be read or written.
pub fn add_element(
    from: Option<Source>,
    to: Option<Target>,
    element: Option<Fragment>,
    max_items: Option<usize>,
) -> Result<Output> {
    let from = from.unwrap_or(Source::Bytes(FEED_EMPTY.as_bytes()));
    let from_type = SourceType::from_source(&from)?;
    let to_type = SourceType::from_target(to.as_ref());
    debug!(?from_type, ?to_type, "adding element to feed");

    let mut loaded = Loaded::load(from, from_type)?;
    let document = loaded.document_mut();
    let root = document
        .root_element()
        .ok_or_else(|| Error::MalformedXML("Feed has no root element".to_string()))?;
    let channel = root.find(document, "channel").ok_or(Error::MissingChannel)?;

    if let Some(element) = element {
        let item = element.import_into(document)?;
        insert_item(document, channel, item)?;
    }
    if let Some(max_items) = max_items {
        let removed = truncate_items(document, channel, max_items)?;
        debug!(max_items, removed, "truncated feed");
    }

    match (to_type, to) {
        (SourceType::Element, _) => match loaded {
            Loaded::Borrowed(_) => Ok(Output::Root(root)),
            Loaded::Owned(document) => Ok(Output::Document(document)),
        },
        (SourceType::String, _) => {
            let opts = WriteOptions {
                encoding_label: "utf-8".to_string(),
                ..WriteOptions::default()
            };
            let mut buf = Vec::with_capacity(1024);
            loaded.document().write_subtree(&mut buf, root, &opts)?;
            Ok(Output::Bytes(buf))
        }
        (SourceType::File, Some(Target::Path(path))) => {
            let mut writer = BufWriter::new(File::create(path)?);
            loaded
                .document()
                .write_with_opts(&mut writer, &WriteOptions::default())?;
            writer.flush()?;
            debug!(path = %path.display(), "wrote feed");
            Ok(Output::Written(path.to_path_buf()))
        }
        (to_type, _) => Err(Error::TypeMismatch(format!(
            "Unexpected value for target type {:?}",
            to_type
        ))),
    }
}

/// New items go before the first existing one.
///
/// Blank text left in a channel without child elements (`<channel>\n</channel>`,
/// or the empty text marker of `<channel></channel>`) is dropped first.
fn insert_item(document: &mut Document, channel: Element, item: Element) -> Result<()> {
    channel
        .mut_children(document)
        .retain(|node| !node.is_blank_text());
    match channel.find(document, "item") {
        Some(first) => channel.insert_before(document, first, Node::Element(item)),
        None => channel.push_child(document, Node::Element(item)),
    }
}

/// Remove trailing items until at most `max_items` are left. Returns how many were removed.
fn truncate_items(document: &mut Document, channel: Element, max_items: usize) -> Result<usize> {
    let items = channel.find_all(document, "item");
    let mut removed = 0;
    for item in items.iter().skip(max_items).rev() {
        channel.remove_child_elem(document, *item)?;
        removed += 1;
    }
    Ok(removed)
}
