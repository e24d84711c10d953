use crate::document::{Document, Node};
use crate::element::Element;
use crate::error::{Error, Result};
use encoding_rs::Decoder;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::Reader;
use std::io::{BufRead, Read};
use tracing::trace;

/// Transcodes a feed to UTF-8 while quick-xml reads it.
///
/// Feeds declared as `ISO-8859-1`, `windows-1252` or `UTF-16` are decoded
/// here, so the tree only ever holds UTF-8. Without a decoder bytes pass
/// through untouched, which is the case for UTF-8 feeds.
pub(crate) struct DecodeReader<R: Read> {
    decoder: Option<Decoder>,
    inner: R,
    undecoded: [u8; 4096],
    undecoded_pos: usize,
    undecoded_cap: usize,
    // carries a character split across two reads
    remaining: [u8; 32],
    decoded: [u8; 12288],
    decoded_pos: usize,
    decoded_cap: usize,
    done: bool,
}

impl<R: Read> DecodeReader<R> {
    pub(crate) fn new(reader: R, decoder: Option<Decoder>) -> DecodeReader<R> {
        DecodeReader {
            decoder,
            inner: reader,
            undecoded: [0; 4096],
            undecoded_pos: 0,
            undecoded_cap: 0,
            remaining: [0; 32],
            decoded: [0; 12288],
            decoded_pos: 0,
            decoded_cap: 0,
            done: false,
        }
    }

    /// Switch decoding once the declaration names the feed's encoding.
    pub(crate) fn set_decoder(&mut self, dec: Option<Decoder>) {
        self.decoder = dec;
        self.done = false;
    }

    fn fill_buf_decode(&mut self) -> std::io::Result<&[u8]> {
        if self.decoded_pos >= self.decoded_cap {
            debug_assert!(self.decoded_pos == self.decoded_cap);
            if self.done {
                return Ok(&[]);
            }
            let remaining = self.undecoded_cap - self.undecoded_pos;
            if remaining <= 32 {
                // keep the tail of a partial character for the next read
                self.remaining[..remaining]
                    .copy_from_slice(&self.undecoded[self.undecoded_pos..self.undecoded_cap]);
                self.undecoded[..remaining].copy_from_slice(&self.remaining[..remaining]);
                let read = self.inner.read(&mut self.undecoded[remaining..])?;
                self.done = read == 0;
                self.undecoded_pos = 0;
                self.undecoded_cap = remaining + read;
            }

            let decoder = match self.decoder.as_mut() {
                Some(decoder) => decoder,
                None => return Ok(&[]),
            };
            let (_res, read, written, _replaced) = decoder.decode_to_utf8(
                &self.undecoded[self.undecoded_pos..self.undecoded_cap],
                &mut self.decoded,
                self.done,
            );
            self.undecoded_pos += read;
            self.decoded_cap = written;
            self.decoded_pos = 0;
        }
        Ok(&self.decoded[self.decoded_pos..self.decoded_cap])
    }

    fn fill_buf_without_decode(&mut self) -> std::io::Result<&[u8]> {
        if self.undecoded_pos >= self.undecoded_cap {
            debug_assert!(self.undecoded_pos == self.undecoded_cap);
            self.undecoded_cap = self.inner.read(&mut self.undecoded)?;
            self.undecoded_pos = 0;
        }
        Ok(&self.undecoded[self.undecoded_pos..self.undecoded_cap])
    }
}

impl<R: Read> Read for DecodeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let available = self.fill_buf()?;
        let amt = std::cmp::min(available.len(), buf.len());
        buf[..amt].copy_from_slice(&available[..amt]);
        self.consume(amt);
        Ok(amt)
    }
}

impl<R: Read> BufRead for DecodeReader<R> {
    // The decoder is set after the declaration is read, see `set_decoder`.
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match &self.decoder {
            Some(_) => self.fill_buf_decode(),
            None => self.fill_buf_without_decode(),
        }
    }
    fn consume(&mut self, amt: usize) {
        match &self.decoder {
            Some(_) => {
                self.decoded_pos = std::cmp::min(self.decoded_pos + amt, self.decoded_cap);
            }
            None => {
                self.undecoded_pos = std::cmp::min(self.undecoded_pos + amt, self.undecoded_cap);
            }
        }
    }
}

/// Options when parsing xml.
///
/// `empty_text_node`: `<tag></tag>` will have a `Node::Text("")` as its children, while `<tag />` won't.
///
/// `require_decl`: Fail with [`Error::MalformedXML`] if the document doesn't start with an XML declaration.
///
/// `remove_blank_text`: Drop whitespace-only text nodes of elements that have child elements.
/// Whitespace-only text of leaf elements (`<title> </title>`) is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    pub empty_text_node: bool,
    pub require_decl: bool,
    pub remove_blank_text: bool,
}

impl Default for ReadOptions {
    fn default() -> ReadOptions {
        ReadOptions {
            empty_text_node: true,
            require_decl: true,
            remove_blank_text: true,
        }
    }
}

impl ReadOptions {
    /// Options for feeds and item fragments, which may come without a declaration.
    pub fn feed() -> ReadOptions {
        ReadOptions {
            require_decl: false,
            ..ReadOptions::default()
        }
    }
}

// Initial encoding guess and the length of the BOM to skip.
fn sniff_encoding(bytes: &[u8]) -> (Option<&'static Encoding>, usize) {
    match bytes {
        [0xfe, 0xff, ..] => (Some(UTF_16BE), 2),
        [0xff, 0xfe, ..] => (Some(UTF_16LE), 2),
        [0xef, 0xbb, 0xbf, ..] => (None, 3),
        [0x00, 0x3c, 0x00, 0x3f, ..] => (Some(UTF_16BE), 0),
        [0x3c, 0x00, 0x3f, 0x00, ..] => (Some(UTF_16LE), 0),
        _ => (None, 0),
    }
}

pub(crate) struct DocumentParser {
    document: Document,
    read_opts: ReadOptions,
    encoding: Option<String>,
    element_stack: Vec<Element>,
}

impl DocumentParser {
    pub(crate) fn parse_reader<R: Read>(reader: R, opts: ReadOptions) -> Result<Document> {
        let document = Document::new();
        let container = document.container();
        let mut parser = DocumentParser {
            document,
            read_opts: opts,
            encoding: None,
            element_stack: vec![container],
        };
        parser.parse_start(reader)?;
        Ok(parser.document)
    }

    fn handle_decl(&mut self, ev: &BytesDecl) -> Result<()> {
        self.document.version = String::from_utf8(ev.version()?.to_vec())?;
        self.encoding = match ev.encoding() {
            Some(res) => Some(String::from_utf8(res?.to_vec())?),
            None => None,
        };
        self.document.encoding = self.encoding.clone();
        self.document.standalone = match ev.standalone() {
            Some(res) => {
                let val = std::str::from_utf8(&*res?)?.to_lowercase();
                if val == "yes" {
                    true
                } else if val == "no" {
                    false
                } else {
                    return Err(Error::MalformedXML(
                        "Standalone Document Declaration has non boolean value".to_string(),
                    ));
                }
            }
            None => false,
        };
        Ok(())
    }

    fn current(&self) -> Element {
        // The container is never popped, so the stack is never empty.
        self.element_stack[self.element_stack.len() - 1]
    }

    fn at_top_level(&self) -> bool {
        self.element_stack.len() == 1
    }

    fn handle_bytes_start(&mut self, ev: &BytesStart) -> Result<Element> {
        if self.at_top_level() && self.document.root_element().is_some() {
            return Err(Error::MalformedXML(
                "Extra content at the end of the document".to_string(),
            ));
        }
        let full_name = String::from_utf8(ev.name().to_vec())?;
        let mut attributes = Vec::new();
        for attr in ev.attributes() {
            let attr = attr?;
            let key = String::from_utf8(attr.key.to_vec())?;
            let value = String::from_utf8(attr.unescaped_value()?.to_vec())?;
            attributes.push((key, value));
        }
        let element = Element::with_data(&mut self.document, full_name, attributes);
        let parent = self.current();
        parent.push_child(&mut self.document, Node::Element(element))?;
        Ok(element)
    }

    fn push_raw(&mut self, ev: &BytesText, wrap: fn(String) -> Node) -> Result<()> {
        let content = String::from_utf8(ev.to_vec())?;
        let parent = self.current();
        parent.push_child(&mut self.document, wrap(content))
    }

    fn finish_element(&mut self, elem: Element) {
        let doc = &mut self.document;
        if self.read_opts.remove_blank_text && !elem.child_elements(doc).is_empty() {
            elem.mut_children(doc).retain(|node| !node.is_blank_text());
        }
        if self.read_opts.empty_text_node && !elem.has_children(doc) {
            // distinguish <tag></tag> and <tag />
            elem.mut_children(doc).push(Node::Text(String::new()));
        }
    }

    // Look at the document decl and figure out the document encoding
    fn parse_start<B: Read>(&mut self, reader: B) -> Result<()> {
        let mut bufreader = DecodeReader::new(reader, None);

        let (init_encoding, bom_len) = sniff_encoding(bufreader.fill_buf()?);
        bufreader.consume(bom_len);
        bufreader.set_decoder(init_encoding.map(|e| e.new_decoder_without_bom_handling()));
        let mut xmlreader = Reader::from_reader(bufreader);
        let mut lead = Vec::new();
        let mut buf = Vec::with_capacity(150);
        // Without text trimming, quick-xml reports an empty text before the first `<`.
        let event = match xmlreader.read_event(&mut lead)? {
            Event::Text(ev) if ev.is_empty() => xmlreader.read_event(&mut buf)?,
            event => event,
        };
        trace!(event = ?event, "first event");
        if let Event::Decl(ev) = event {
            self.handle_decl(&ev)?;
            if let Some(encoding_str) = &self.encoding {
                let encoding =
                    Encoding::for_label(encoding_str.as_bytes()).ok_or(Error::CannotDecode)?;
                let encoding = if encoding == UTF_8 {
                    None
                } else {
                    Some(encoding)
                };
                // Encoding::for_label("UTF-16") defaults to UTF-16 LE, even though it could be UTF-16 BE
                if encoding != init_encoding
                    && !(encoding == Some(UTF_16LE) && init_encoding == Some(UTF_16BE))
                {
                    let mut decode_reader = xmlreader.into_underlying_reader();
                    decode_reader
                        .set_decoder(encoding.map(|e| e.new_decoder_without_bom_handling()));
                    xmlreader = Reader::from_reader(decode_reader);
                }
            }
        } else if self.read_opts.require_decl {
            return Err(Error::MalformedXML(
                "Didn't find XML Declaration at the start of file".to_string(),
            ));
        } else if self.handle_event(event)? {
            return Ok(());
        }
        self.parse_content(xmlreader)
    }

    // Returns if document parsing is finished.
    fn handle_event(&mut self, event: Event) -> Result<bool> {
        match event {
            Event::Start(ref ev) => {
                let element = self.handle_bytes_start(ev)?;
                self.element_stack.push(element);
            }
            Event::End(_) => {
                // quick-xml checks if tag names match for us
                if self.at_top_level() {
                    return Err(Error::MalformedXML(
                        "Closing tag without an opening tag".to_string(),
                    ));
                }
                if let Some(elem) = self.element_stack.pop() {
                    self.finish_element(elem);
                }
            }
            Event::Empty(ref ev) => {
                self.handle_bytes_start(ev)?;
            }
            Event::Text(ev) => {
                let content = String::from_utf8(ev.unescaped()?.to_vec())?;
                if content.is_empty() {
                    return Ok(false);
                }
                if self.at_top_level() {
                    if !content.chars().all(char::is_whitespace) {
                        return Err(Error::MalformedXML(
                            "Text outside of the root element".to_string(),
                        ));
                    }
                } else {
                    let parent = self.current();
                    parent.push_child(&mut self.document, Node::Text(content))?;
                }
            }
            // DocType, Comment, CData, and PI content is kept as read.
            Event::DocType(ev) => self.push_raw(&ev, Node::DocType)?,
            Event::Comment(ev) => self.push_raw(&ev, Node::Comment)?,
            Event::CData(ev) => self.push_raw(&ev, Node::CData)?,
            Event::PI(ev) => self.push_raw(&ev, Node::PI)?,
            Event::Decl(_) => {
                return Err(Error::MalformedXML(
                    "XML declaration allowed only at the start of the document".to_string(),
                ));
            }
            Event::Eof => {
                if let Some(unclosed) = self.element_stack.get(1) {
                    return Err(Error::MalformedXML(format!(
                        "Unclosed tag <{}>",
                        unclosed.full_name(&self.document)
                    )));
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn parse_content<B: BufRead>(&mut self, mut reader: Reader<B>) -> Result<()> {
        let mut buf = Vec::with_capacity(200); // reduce time increasing capacity at start.
        loop {
            let ev = reader.read_event(&mut buf)?;
            trace!(event = ?ev);
            if self.handle_event(ev)? {
                return Ok(());
            }
            buf.clear();
        }
    }
}
