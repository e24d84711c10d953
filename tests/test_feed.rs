use chrono::DateTime;
use pretty_assertions::assert_eq;
use rssadd::{
    add_element, add_item, Document, Element, Error, Fragment, Node, Output, ReadOptions, Source,
    Target, PUBDATE_FORMAT,
};
use std::fmt::Write;
use std::path::Path;

const FEED_EMPTY_ADDED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss xmlns:atom="http://www.w3.org/2005/Atom" version="2.0">
  <channel>
    <title> </title>
    <link> </link>
    <description> </description>
    <item>
      <title>testtitle</title>
      <description>testdescription</description>
      <pubDate>{pubdate}</pubDate>
    </item>
  </channel>
</rss>
"#;

const FEED_EXISTING: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<rss xmlns:atom="http://www.w3.org/2005/Atom" version="2.0">
  <channel>
    <title>testtitle</title>
    <link>testlink</link>
    <description>testdescription</description>
  </channel>
</rss>
"#;

const FEED_EXISTING_ADDED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss xmlns:atom="http://www.w3.org/2005/Atom" version="2.0">
  <channel>
    <title>testtitle</title>
    <link>testlink</link>
    <description>testdescription</description>
    <item>
      <title>testtitle</title>
      <description>testdescription</description>
      <pubDate>{pubdate}</pubDate>
    </item>
  </channel>
</rss>
"#;

const TAGS: [&str; 2] = [
    "<title>testtitle</title>",
    "<description>testdescription</description>",
];

fn tags() -> Vec<Fragment> {
    TAGS.iter().map(|tag| Fragment::from(*tag)).collect()
}

fn to_string(output: Output) -> String {
    String::from_utf8(output.into_bytes().expect("serialized feed")).unwrap()
}

fn channel(document: &Document) -> Element {
    document
        .root_element()
        .unwrap()
        .find(document, "channel")
        .unwrap()
}

// The injected date is whatever the clock said, so read it back from the output.
fn with_pubdate(template: &str, actual: &str) -> String {
    let start = actual.find("<pubDate>").expect("pubDate") + "<pubDate>".len();
    let end = actual.find("</pubDate>").expect("pubDate");
    let pubdate = &actual[start..end];
    assert!(
        DateTime::parse_from_str(pubdate, PUBDATE_FORMAT).is_ok(),
        "bad pubDate {:?}",
        pubdate
    );
    template.replace("{pubdate}", pubdate)
}

fn render(document: &Document) -> String {
    let mut buf = String::new();
    render_nodes(document, document.root_nodes(), 0, &mut buf);
    buf
}

fn render_nodes(doc: &Document, nodes: &[Node], depth: usize, buf: &mut String) {
    let indent = " ".repeat(depth * 2);
    for node in nodes {
        match node {
            Node::Element(elem) => {
                writeln!(buf, "{}- {} {:?}", indent, elem.full_name(doc), elem.attributes(doc))
                    .unwrap();
                render_nodes(doc, elem.children(doc), depth + 1, buf);
            }
            other => writeln!(buf, "{}- {:?}", indent, other).unwrap(),
        }
    }
}

#[test]
fn test_success_default_to_str() {
    let actual = to_string(add_item(None, None, &tags(), None).unwrap());
    assert_eq!(actual, with_pubdate(FEED_EMPTY_ADDED, &actual));
}

#[test]
fn test_success_str_to_str() {
    let actual = to_string(
        add_item(
            Some(Source::Text(FEED_EXISTING)),
            None,
            &tags(),
            None,
        )
        .unwrap(),
    );
    assert_eq!(actual, with_pubdate(FEED_EXISTING_ADDED, &actual));
}

#[test]
fn test_success_bytes_to_str() {
    let actual = to_string(
        add_item(
            Some(Source::Bytes(FEED_EXISTING.as_bytes())),
            None,
            &tags(),
            None,
        )
        .unwrap(),
    );
    assert_eq!(actual, with_pubdate(FEED_EXISTING_ADDED, &actual));
}

#[test]
fn test_success_file_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let from = dir.path().join("from.xml");
    let to = dir.path().join("to.xml");
    std::fs::write(&from, FEED_EXISTING).unwrap();

    let output = add_item(
        Some(Source::Text(from.to_str().unwrap())),
        Some(Target::Path(&to)),
        &tags(),
        None,
    )
    .unwrap();
    assert!(matches!(output, Output::Written(ref path) if path == &to));

    let actual = std::fs::read_to_string(&to).unwrap();
    // files get the upper case label
    let expected = FEED_EXISTING_ADDED.replace("encoding=\"utf-8\"", "encoding=\"UTF-8\"");
    assert_eq!(actual, with_pubdate(&expected, &actual));
}

#[test]
fn test_success_file_url() {
    let dir = tempfile::tempdir().unwrap();
    let from = dir.path().join("feed.xml");
    std::fs::write(&from, FEED_EXISTING).unwrap();
    let url = url::Url::from_file_path(&from).unwrap().to_string();

    let actual = to_string(add_item(Some(Source::Text(&url)), None, &tags(), None).unwrap());
    assert_eq!(actual, with_pubdate(FEED_EXISTING_ADDED, &actual));
}

#[test]
fn test_file_keeps_top_level_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let from = dir.path().join("feed.xml");
    std::fs::write(
        &from,
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <?xml-stylesheet href=\"rss.xsl\" type=\"text/xsl\"?>\n\
         <rss version=\"2.0\"><channel><title>t</title></channel></rss>\n",
    )
    .unwrap();

    add_item(
        Some(Source::Path(&from)),
        Some(Target::Path(&from)),
        &[Fragment::from("<title>n</title>"), Fragment::from("<pubDate>p</pubDate>")],
        None,
    )
    .unwrap();
    assert_eq!(
        std::fs::read_to_string(&from).unwrap(),
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<?xml-stylesheet href="rss.xsl" type="text/xsl"?>
<rss version="2.0">
  <channel>
    <title>t</title>
    <item>
      <title>n</title>
      <pubDate>p</pubDate>
    </item>
  </channel>
</rss>
"#
    );
}

#[test]
fn test_file_round_trip_matches_tree() {
    let dir = tempfile::tempdir().unwrap();
    let from = dir.path().join("from.xml");
    let to = dir.path().join("to.xml");
    std::fs::write(&from, FEED_EXISTING).unwrap();
    let fragments = [
        Fragment::from("<title>n</title>"),
        Fragment::from("<pubDate>fixed</pubDate>"),
    ];

    add_item(
        Some(Source::Path(&from)),
        Some(Target::Path(&to)),
        &fragments,
        Some(1),
    )
    .unwrap();
    let written = Document::parse_file_with_opts(&to, ReadOptions::feed()).unwrap();

    let in_memory = match add_item(
        Some(Source::Path(&from)),
        Some(Target::Tree),
        &fragments,
        Some(1),
    )
    .unwrap()
    {
        Output::Document(document) => document,
        other => panic!("unexpected output {:?}", other),
    };
    assert_eq!(render(&written), render(&in_memory));
}

#[test]
fn test_success_element_to_element() {
    let mut doc = Document::new();
    let container = doc.container();
    let root = Element::new(&mut doc, "rss");
    let channel = Element::new(&mut doc, "channel");
    let item = Element::new(&mut doc, "item");
    let title = Element::new(&mut doc, "title");
    title.set_text_content(&mut doc, "testtitle");
    item.push_child(&mut doc, Node::Element(title)).unwrap();
    channel.push_child(&mut doc, Node::Element(item)).unwrap();
    root.push_child(&mut doc, Node::Element(channel)).unwrap();
    container.push_child(&mut doc, Node::Element(root)).unwrap();

    let mut added = Document::new();
    let added_container = added.container();
    let added_title = Element::new(&mut added, "title");
    added_title.set_text_content(&mut added, "testtitle");
    added_container
        .push_child(&mut added, Node::Element(added_title))
        .unwrap();

    let output = add_item(
        Some(Source::Tree(&mut doc)),
        Some(Target::Tree),
        &[Fragment::Tree(added)],
        None,
    )
    .unwrap();
    assert!(matches!(output, Output::Root(r) if r == root));

    let items = channel.find_all(&doc, "item");
    assert_eq!(items.len(), 2);
    for item in items {
        assert_eq!(
            item.find(&doc, "title").unwrap().text_content(&doc),
            "testtitle"
        );
    }
}

#[test]
fn test_success_custom_pubdate() {
    let mut fragments = tags();
    fragments.push(Fragment::from("<pubDate>testpubdate</pubDate>"));
    let actual = to_string(add_item(None, None, &fragments, None).unwrap());
    assert_eq!(actual, FEED_EMPTY_ADDED.replace("{pubdate}", "testpubdate"));
}

#[test]
fn test_first_item_children_equal_fragments() {
    let fragments = [
        Fragment::from("<link>l</link>"),
        Fragment::from("<title lang=\"en\">t</title>"),
        Fragment::from("<guid isPermaLink=\"false\">g</guid>"),
    ];
    let output = add_item(
        Some(Source::Text(FEED_EXISTING)),
        Some(Target::Tree),
        &fragments,
        None,
    )
    .unwrap();
    let doc = match output {
        Output::Document(doc) => doc,
        other => panic!("unexpected output {:?}", other),
    };
    let item = channel(&doc).find(&doc, "item").unwrap();
    let names: Vec<&str> = item
        .child_elements(&doc)
        .iter()
        .map(|e| e.full_name(&doc))
        .collect();
    assert_eq!(names, vec!["link", "title", "guid", "pubDate"]);
    let title = item.find(&doc, "title").unwrap();
    assert_eq!(title.attribute(&doc, "lang"), Some("en"));
}

#[test]
fn test_insertion_order_and_truncation() {
    let feed = "<rss version=\"2.0\"><channel><title>c</title>\
                <item><title>i0</title></item>\
                <item><title>i1</title></item>\
                <item><title>i2</title></item>\
                </channel></rss>";
    let titles = |max_items: Option<usize>| -> Vec<String> {
        let output = add_item(
            Some(Source::Text(feed)),
            Some(Target::Tree),
            &[Fragment::from("<title>n</title>")],
            max_items,
        )
        .unwrap();
        let doc = match output {
            Output::Document(doc) => doc,
            other => panic!("unexpected output {:?}", other),
        };
        channel(&doc)
            .find_all(&doc, "item")
            .iter()
            .map(|item| item.find(&doc, "title").unwrap().text_content(&doc))
            .collect()
    };
    assert_eq!(titles(None), vec!["n", "i0", "i1", "i2"]);
    assert_eq!(titles(Some(2)), vec!["n", "i0"]);
    assert_eq!(titles(Some(10)), vec!["n", "i0", "i1", "i2"]);
    assert!(titles(Some(0)).is_empty());
}

#[test]
fn test_add_element_without_element_truncates() {
    let feed = "<rss><channel><item><title>i0</title></item><item><title>i1</title></item>\
                <item><title>i2</title></item></channel></rss>";
    let actual = to_string(add_element(Some(Source::Text(feed)), None, None, Some(2)).unwrap());
    assert_eq!(
        actual,
        r#"<?xml version="1.0" encoding="utf-8"?>
<rss>
  <channel>
    <item>
      <title>i0</title>
    </item>
    <item>
      <title>i1</title>
    </item>
  </channel>
</rss>
"#
    );
}

#[test]
fn test_add_prebuilt_element() {
    let actual = to_string(
        add_element(
            Some(Source::Text(FEED_EXISTING)),
            None,
            Some(Fragment::from("<item><title>prebuilt</title></item>")),
            None,
        )
        .unwrap(),
    );
    assert!(actual.contains("<item>\n      <title>prebuilt</title>\n    </item>"));
    // no date is added to a prebuilt item
    assert!(!actual.contains("pubDate"));
}

#[test]
fn test_round_trip_is_stable() {
    let first = to_string(
        add_item(
            None,
            None,
            &[Fragment::from("<title>&lt;b&gt; &amp; co</title>")],
            None,
        )
        .unwrap(),
    );
    let second = to_string(add_element(Some(Source::Text(&first)), None, None, None).unwrap());
    let third = to_string(
        add_element(Some(Source::Bytes(second.as_bytes())), None, None, None).unwrap(),
    );
    assert_eq!(first, second);
    assert_eq!(second, third);
    assert!(first.contains("<title>&lt;b&gt; &amp; co</title>"));
}

#[test]
fn test_fail_unknown_from() {
    let mut empty = Document::new();
    let result = add_item(Some(Source::Tree(&mut empty)), None, &tags(), None);
    assert!(matches!(result, Err(Error::TypeMismatch(_))));
}

#[test]
fn test_fail_unknown_tag() {
    let result = add_item(None, None, &[Fragment::Tree(Document::new())], None);
    assert!(matches!(result, Err(Error::TypeMismatch(_))));
}

#[test]
fn test_fail_malformed() {
    let result = add_item(Some(Source::Bytes(b"<rss><channel></rss>")), None, &tags(), None);
    assert!(matches!(result, Err(Error::MalformedXML(_))));
    let result = add_item(None, None, &[Fragment::from("<title>t</titel>")], None);
    assert!(matches!(result, Err(Error::MalformedXML(_))));
}

#[test]
fn test_fail_missing_file() {
    let result = add_item(
        Some(Source::Path(Path::new("does/not/exist.xml"))),
        None,
        &tags(),
        None,
    );
    assert!(matches!(result, Err(Error::Io(_))));
    let result = add_item(Some(Source::Text("does/not/exist.xml")), None, &tags(), None);
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_fail_remote_url() {
    let result = add_item(
        Some(Source::Text("https://example.com/feed.xml")),
        None,
        &tags(),
        None,
    );
    assert!(matches!(result, Err(Error::UnsupportedScheme(_))));
}

const FEED_ESCAPED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss xmlns:atom="http://www.w3.org/2005/Atom" version="2.0">
  <channel>
    <title>&quot;Q&quot; &amp; A</title>
    <atom:link href="https://example.com/rss?lang=en&amp;page=1" rel="self"/>
    <item>
      <title>new</title>
      <pubDate>p</pubDate>
    </item>
    <item>
      <enclosure url="https://x/a?b=1&amp;c=2" title="&quot;q&quot; &lt;&gt;"/>
    </item>
  </channel>
</rss>
"#;

fn new_item() -> Vec<Fragment> {
    vec![
        Fragment::from("<title>new</title>"),
        Fragment::from("<pubDate>p</pubDate>"),
    ]
}

#[test]
fn test_escaped_attributes_to_str() {
    let feed = r#"<rss xmlns:atom="http://www.w3.org/2005/Atom" version="2.0"><channel>
<title>"Q" &amp; A</title>
<atom:link href="https://example.com/rss?lang=en&amp;page=1" rel="self"/>
<item><enclosure url="https://x/a?b=1&amp;c=2" title='"q" &lt;&gt;'/></item>
</channel></rss>"#;
    let actual = to_string(add_item(Some(Source::Text(feed)), None, &new_item(), None).unwrap());
    assert_eq!(actual, FEED_ESCAPED);

    // the output is a valid feed again
    let again = to_string(add_element(Some(Source::Text(&actual)), None, None, None).unwrap());
    assert_eq!(again, actual);
}

#[test]
fn test_escaped_attributes_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feed.xml");
    let existing = FEED_ESCAPED.replace(
        "    <item>\n      <title>new</title>\n      <pubDate>p</pubDate>\n    </item>\n",
        "",
    );
    std::fs::write(&path, existing).unwrap();

    add_item(Some(Source::Path(&path)), Some(Target::Path(&path)), &new_item(), None).unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        FEED_ESCAPED.replace("encoding=\"utf-8\"", "encoding=\"UTF-8\"")
    );
    let doc = Document::parse_file_with_opts(&path, ReadOptions::feed()).unwrap();
    let enclosure = channel(&doc)
        .find_all(&doc, "item")[1]
        .find(&doc, "enclosure")
        .unwrap();
    assert_eq!(enclosure.attribute(&doc, "url"), Some("https://x/a?b=1&c=2"));
}

const FEED_ONE_ITEM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0">
  <channel>
    <item>
      <title>new</title>
      <pubDate>p</pubDate>
    </item>
  </channel>
</rss>
"#;

#[test]
fn test_empty_and_blank_channel_to_str() {
    for feed in &[
        "<rss version=\"2.0\"><channel></channel></rss>",
        "<rss version=\"2.0\">\n  <channel>\n  </channel>\n</rss>",
    ] {
        let actual = to_string(add_item(Some(Source::Text(feed)), None, &new_item(), None).unwrap());
        assert_eq!(actual, FEED_ONE_ITEM);

        let again = to_string(add_element(Some(Source::Text(&actual)), None, None, None).unwrap());
        assert_eq!(again, actual);
    }
}

#[test]
fn test_empty_and_blank_channel_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feed.xml");
    let expected = FEED_ONE_ITEM.replace("encoding=\"utf-8\"", "encoding=\"UTF-8\"");
    for feed in &[
        "<rss version=\"2.0\"><channel></channel></rss>",
        "<rss version=\"2.0\">\n  <channel>\n  </channel>\n</rss>",
    ] {
        std::fs::write(&path, feed).unwrap();
        add_item(Some(Source::Path(&path)), Some(Target::Path(&path)), &new_item(), None).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);

        add_element(Some(Source::Path(&path)), Some(Target::Path(&path)), None, None).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
    }
}
