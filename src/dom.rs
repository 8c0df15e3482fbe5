// src/dom.rs
use anyhow::Context;
use memmap2::Mmap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs::File;
use std::path::Path;

pub const HP_NS: &str = "http://www.hancom.co.kr/hwpml/2011/paragraph";
pub const HC_NS: &str = "http://www.hancom.co.kr/hwpml/2010/component";

/// Prefix → URI pairs that must be declared on the section root before
/// serialization. Held by the assembler instead of any process-wide registry
/// so two assemblies in one process cannot leak declarations into each other.
#[derive(Debug, Clone)]
pub struct NamespaceSet {
    pairs: Vec<(String, String)>,
}

impl Default for NamespaceSet {
    fn default() -> Self {
        Self {
            pairs: vec![
                ("hp".to_string(), HP_NS.to_string()),
                ("hc".to_string(), HC_NS.to_string()),
            ],
        }
    }
}

impl NamespaceSet {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Injects any missing `xmlns:prefix` declaration on the root element.
    pub fn ensure_declared(&self, root: &mut XmlElement) {
        for (prefix, uri) in &self.pairs {
            let key = format!("xmlns:{}", prefix);
            if root.attr(&key).is_none() {
                root.set_attr(&key, uri);
            }
        }
    }
}

/// One entry in an element's ordered content. Text and comments are kept in
/// place between child elements so mixed content (e.g. `hp:t` text around an
/// inline `hp:tab`) survives a round-trip in reading order.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    Comment(String),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    /// True for an element node with the given local name.
    pub fn is_named(&self, local: &str) -> bool {
        self.as_element().map_or(false, |el| el.local_name() == local)
    }
}

/// Owned, ordered XML node. Tag names keep the prefix as written in the
/// source document (e.g. `hp:p`); lookups go through `local_name` so the
/// search logic matches regardless of prefix spelling.
///
/// `Clone` is the isolation primitive: template fragments are shared
/// read-only and every consumer clones before mutating.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value.to_string();
        } else {
            self.attrs.push((key.to_string(), value.to_string()));
        }
    }

    /// Direct child elements, skipping interleaved text and comments.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// Concatenated direct text content, in document order, with any inline
    /// child elements passed over.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all direct text content with a single leading text node,
    /// leaving child elements (and their positions relative to each other)
    /// alone.
    pub fn set_text(&mut self, text: &str) {
        self.children.retain(|node| !matches!(node, XmlNode::Text(_)));
        self.children.insert(0, XmlNode::Text(text.to_string()));
    }

    pub fn push_element(&mut self, el: XmlElement) {
        self.children.push(XmlNode::Element(el));
    }

    /// All descendant elements (excluding self) in document order.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        fn walk<'a>(el: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
            for child in el.child_elements() {
                out.push(child);
                walk(child, out);
            }
        }
        walk(self, &mut out);
        out
    }

    /// All descendant elements with the given local name, in document order.
    pub fn find_all(&self, local: &str) -> Vec<&XmlElement> {
        self.descendants()
            .into_iter()
            .filter(|el| el.local_name() == local)
            .collect()
    }

    pub fn find_first(&self, local: &str) -> Option<&XmlElement> {
        fn walk<'a>(el: &'a XmlElement, local: &str) -> Option<&'a XmlElement> {
            for child in el.child_elements() {
                if child.local_name() == local {
                    return Some(child);
                }
                if let Some(found) = walk(child, local) {
                    return Some(found);
                }
            }
            None
        }
        walk(self, local)
    }

    /// Content-index path to the nth descendant element (document order)
    /// with the given local name. Mutable lookups compute the path immutably
    /// and then walk it with `node_at_path_mut`, which keeps the borrow
    /// checker out of the recursion. Every index on a returned path
    /// addresses an element node.
    pub fn nth_descendant_path(&self, local: &str, nth: usize) -> Option<Vec<usize>> {
        fn walk(
            el: &XmlElement,
            local: &str,
            nth: usize,
            seen: &mut usize,
            path: &mut Vec<usize>,
        ) -> bool {
            for (i, node) in el.children.iter().enumerate() {
                let Some(child) = node.as_element() else {
                    continue;
                };
                path.push(i);
                if child.local_name() == local {
                    if *seen == nth {
                        return true;
                    }
                    *seen += 1;
                }
                if walk(child, local, nth, seen, path) {
                    return true;
                }
                path.pop();
            }
            false
        }
        let mut path = Vec::new();
        let mut seen = 0;
        if walk(self, local, nth, &mut seen, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    /// Content-index path to the first descendant element matching the
    /// predicate.
    pub fn find_path<F: Fn(&XmlElement) -> bool + Copy>(&self, pred: F) -> Option<Vec<usize>> {
        fn walk<F: Fn(&XmlElement) -> bool + Copy>(
            el: &XmlElement,
            pred: F,
            path: &mut Vec<usize>,
        ) -> bool {
            for (i, node) in el.children.iter().enumerate() {
                let Some(child) = node.as_element() else {
                    continue;
                };
                path.push(i);
                if pred(child) || walk(child, pred, path) {
                    return true;
                }
                path.pop();
            }
            false
        }
        let mut path = Vec::new();
        if walk(self, pred, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    /// Walk a path produced by `nth_descendant_path`/`find_path`. Panics if
    /// an index addresses a text or comment node; paths from those methods
    /// never do.
    pub fn node_at_path_mut(&mut self, path: &[usize]) -> &mut XmlElement {
        let mut node = self;
        for &idx in path {
            node = match &mut node.children[idx] {
                XmlNode::Element(el) => el,
                _ => panic!("content path addresses a non-element node"),
            };
        }
        node
    }

    pub fn descendant_mut(&mut self, local: &str, nth: usize) -> Option<&mut XmlElement> {
        let path = self.nth_descendant_path(local, nth)?;
        Some(self.node_at_path_mut(&path))
    }

    pub fn find_first_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.descendant_mut(local, 0)
    }
}

/// Parse a complete XML document string into an owned tree.
pub fn parse_str(xml: &str) -> anyhow::Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let el = element_from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.push_element(el),
                    None => root = Some(el),
                }
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let value = text.unescape()?.into_owned();
                    // Skip indentation runs between elements; keep real
                    // content, including text on either side of an inline
                    // child, in place.
                    if !value.trim().is_empty() || top.children.is_empty() {
                        top.children.push(XmlNode::Text(value));
                    }
                }
            }
            Event::Comment(comment) => {
                let value = String::from_utf8_lossy(comment.as_ref()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlNode::Comment(value));
                }
            }
            Event::End(_) => {
                let el = stack.pop().context("unbalanced end tag")?;
                match stack.last_mut() {
                    Some(parent) => parent.push_element(el),
                    None => root = Some(el),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.context("document has no root element")
}

fn element_from_start(start: &BytesStart) -> anyhow::Result<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut el = XmlElement::new(&name);
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        el.attrs.push((key, value));
    }
    Ok(el)
}

/// Parse a section XML file. Large files (> 10MB) are memory-mapped before
/// parsing; smaller files go through a plain read.
pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<XmlElement> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;

    let xml = if metadata.len() > 10 * 1024 * 1024 {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        String::from_utf8(mmap.to_vec())
            .with_context(|| format!("{} is not valid UTF-8", path.display()))?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };

    parse_str(&xml).with_context(|| format!("failed to parse {}", path.display()))
}

/// Serialize a tree to UTF-8 bytes with an XML declaration, declaring the
/// given namespaces on the root first.
pub fn serialize_document(root: &XmlElement, namespaces: &NamespaceSet) -> anyhow::Result<Vec<u8>> {
    let mut declared = root.clone();
    namespaces.ensure_declared(&mut declared);

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, &declared)?;
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &XmlElement) -> anyhow::Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (k, v) in &el.attrs {
        start.push_attribute((k.as_str(), v.as_str()));
    }

    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for node in &el.children {
        match node {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            XmlNode::Comment(comment) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}
