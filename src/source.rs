//! Tell apart the shapes a feed can be read from or written to.
//!
//! Classification happens once, at the boundary. The rest of the crate
//! branches on the resulting [`SourceType`] instead of looking at the value again.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::parser::ReadOptions;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Where a feed is read from.
#[derive(Debug)]
pub enum Source<'a> {
    /// A live tree. It is mutated in place.
    Tree(&'a mut Document),
    /// Serialized feed. Never taken for a path.
    Bytes(&'a [u8]),
    /// A path, a URL or a serialized feed. See [`SourceType::from_text`].
    Text(&'a str),
    /// A path, taken as is.
    Path(&'a Path),
}

impl<'a> Source<'a> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Source::Tree(_) => "tree",
            Source::Bytes(_) => "bytes",
            Source::Text(_) => "text",
            Source::Path(_) => "path",
        }
    }
}

impl<'a> From<&'a mut Document> for Source<'a> {
    fn from(document: &'a mut Document) -> Source<'a> {
        Source::Tree(document)
    }
}

impl<'a> From<&'a [u8]> for Source<'a> {
    fn from(bytes: &'a [u8]) -> Source<'a> {
        Source::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for Source<'a> {
    fn from(text: &'a str) -> Source<'a> {
        Source::Text(text)
    }
}

impl<'a> From<&'a Path> for Source<'a> {
    fn from(path: &'a Path) -> Source<'a> {
        Source::Path(path)
    }
}

/// Where a feed is written to. No target means "return the serialized feed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// Hand back the tree.
    Tree,
    /// Write to this file.
    Path(&'a Path),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(path: &'a str) -> Target<'a> {
        Target::Path(Path::new(path))
    }
}

impl<'a> From<&'a Path> for Target<'a> {
    fn from(path: &'a Path) -> Target<'a> {
        Target::Path(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Element,
    String,
    File,
}

impl SourceType {
    /// Classify where a feed is read from.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeMismatch`]: the tree has no root element.
    pub fn from_source(source: &Source) -> Result<SourceType> {
        let source_type = match source {
            Source::Tree(document) => {
                if document.root_element().is_none() {
                    return Err(Error::TypeMismatch(
                        "tree without a root element".to_string(),
                    ));
                }
                SourceType::Element
            }
            Source::Bytes(_) => SourceType::String,
            Source::Text(text) => SourceType::from_text(text),
            Source::Path(_) => SourceType::File,
        };
        debug!(kind = source.kind(), ?source_type, "classified source");
        Ok(source_type)
    }

    /// Best-effort guess whether `text` names a file or holds the feed itself.
    ///
    /// A URL with a scheme, an existing path, or text lacking `<` or `>` is a file.
    /// Text that parses as XML is a string. Anything else is a string if it
    /// starts with `<` or spans several lines. That last rule is only a guess.
    ///
    /// Deciding on a string parses the whole text, and [`add_element`] parses it
    /// again to load it. Pass large feeds as [`Source::Bytes`] or [`Source::Path`],
    /// which are classified without parsing.
    ///
    /// [`add_element`]: crate::add_element
    pub fn from_text(text: &str) -> SourceType {
        if Url::parse(text).is_ok() {
            return SourceType::File;
        }
        if Path::new(text).exists() {
            return SourceType::File;
        }
        if !text.contains('<') || !text.contains('>') {
            return SourceType::File;
        }
        let parsed = Document::parse_str_with_opts(text, ReadOptions::feed());
        if matches!(parsed, Ok(ref document) if document.root_element().is_some()) {
            return SourceType::String;
        }
        if text.trim_start().starts_with('<') || text.contains(|c: char| c == '\n' || c == '\r') {
            SourceType::String
        } else {
            SourceType::File
        }
    }

    /// Classify where a feed is written to.
    pub fn from_target(target: Option<&Target>) -> SourceType {
        match target {
            Some(Target::Tree) => SourceType::Element,
            Some(Target::Path(_)) => SourceType::File,
            None => SourceType::String,
        }
    }
}

/// Local path for a text source classified as [`SourceType::File`].
///
/// Existing paths win over URL parsing, so `C:\feed.xml` is not read as a URL.
///
/// # Errors
///
/// - [`Error::UnsupportedScheme`]: the URL is not a local `file:` URL.
pub(crate) fn file_path(text: &str) -> Result<PathBuf> {
    let path = Path::new(text);
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    match Url::parse(text) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|_| Error::UnsupportedScheme(url.to_string())),
        Ok(url) => Err(Error::UnsupportedScheme(url.scheme().to_string())),
        Err(_) => Ok(path.to_path_buf()),
    }
}
