//! Add items to an RSS 2.0 feed.
//!
//! The feed can be read from a parsed [`Document`], from bytes or text, or
//! from a file, and handed back in any of these shapes. See [`add_item`] and
//! [`add_element`].
//!
//! ```no_run
//! use rssadd::{add_item, Fragment, Source, Target};
//!
//! let fragments = vec![
//!     Fragment::from("<title>Release 1.2</title>"),
//!     Fragment::from("<link>https://example.com/1.2</link>"),
//! ];
//! add_item(
//!     Some(Source::from("feed.xml")),
//!     Some(Target::from("feed.xml")),
//!     &fragments,
//!     Some(20),
//! )
//! .unwrap();
//! ```

mod document;
mod element;
mod error;
mod feed;
mod parser;
mod source;

pub use crate::document::{Document, Node, WriteOptions};
pub use crate::element::Element;
pub use crate::error::{Error, Result};
pub use crate::feed::{
    add_element, add_item, build_item, Fragment, Output, FEED_EMPTY, PUBDATE_FORMAT,
};
pub use crate::parser::ReadOptions;
pub use crate::source::{Source, SourceType, Target};
