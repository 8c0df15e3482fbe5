// src/lineseg.rs
//
// HWPX stores pre-computed visual line breaks per paragraph in
// hp:linesegarray. Text substitution changes paragraph lengths, so the
// stored segmentation goes stale; stale metadata renders wrong without
// crashing. This pass throws the old arrays away and rebuilds them from the
// current text at a fixed character width. It runs exactly once, after all
// content has been appended.
use crate::dom::{XmlElement, XmlNode};

pub const DEFAULT_MAX_WIDTH: usize = 75;

const LINESEG_TAG: &str = "hp:lineseg";
const LINESEG_ARRAY_TAG: &str = "hp:linesegarray";

/// Attribute template used when a paragraph carries no previous lineseg to
/// copy geometry from.
const DEFAULT_LINESEG_ATTRS: &[(&str, &str)] = &[
    ("textpos", "0"),
    ("vertpos", "0"),
    ("vertsize", "1000"),
    ("textheight", "1000"),
    ("baseline", "850"),
    ("spacing", "600"),
    ("horzpos", "0"),
    ("horzsize", "42520"),
    ("flags", "393216"),
];

/// Regenerate line-segment metadata for every paragraph in the tree.
/// Idempotent: a second run over an unchanged tree reproduces the same
/// attributes byte for byte.
pub fn recompute_line_segments(root: &mut XmlElement, max_width: usize) {
    let max_width = max_width.max(1);
    walk(root, max_width);
}

fn walk(el: &mut XmlElement, max_width: usize) {
    if el.local_name() == "p" {
        rebuild_paragraph(el, max_width);
    }
    for node in &mut el.children {
        if let XmlNode::Element(child) = node {
            walk(child, max_width);
        }
    }
}

fn rebuild_paragraph(p: &mut XmlElement, max_width: usize) {
    let chars = own_text_len(p);
    let lines = (chars / max_width + usize::from(chars % max_width != 0)).max(1);

    let prototype = p
        .find_first("linesegarray")
        .and_then(|array| array.child_elements().next())
        .map(|seg| seg.attrs.clone())
        .unwrap_or_else(|| {
            DEFAULT_LINESEG_ATTRS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        });

    let base_vertpos = attr_u64(&prototype, "vertpos").unwrap_or(0);
    let textheight = attr_u64(&prototype, "textheight").unwrap_or(1000);

    let mut array = XmlElement::new(LINESEG_ARRAY_TAG);
    for line in 0..lines {
        let mut seg = XmlElement::new(LINESEG_TAG);
        seg.attrs = prototype.clone();
        seg.set_attr("textpos", &(line * max_width).to_string());
        seg.set_attr("vertpos", &(base_vertpos + line as u64 * textheight).to_string());
        array.push_element(seg);
    }

    p.children.retain(|node| !node.is_named("linesegarray"));
    p.push_element(array);
}

/// Character count of the paragraph's own text nodes. Paragraphs nested in
/// table cells own their segmentation, so their subtrees are skipped here
/// and rebuilt on their own visit.
fn own_text_len(p: &XmlElement) -> usize {
    fn walk(el: &XmlElement, acc: &mut usize) {
        for child in el.child_elements() {
            if child.local_name() == "p" {
                continue;
            }
            if child.local_name() == "t" {
                *acc += child.text_content().chars().count();
            }
            walk(child, acc);
        }
    }
    let mut acc = 0;
    walk(p, &mut acc);
    acc
}

fn attr_u64(attrs: &[(String, String)], key: &str) -> Option<u64> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_str;

    fn para_with_text(len: usize) -> XmlElement {
        let text: String = "가".repeat(len);
        parse_str(&format!(
            r#"<hp:p paraPrIDRef="11"><hp:run><hp:t>{}</hp:t></hp:run><hp:linesegarray><hp:lineseg textpos="0" vertpos="3200" vertsize="1000" textheight="1000" baseline="850" spacing="600" horzpos="0" horzsize="42520" flags="393216"/></hp:linesegarray></hp:p>"#,
            text
        ))
        .unwrap()
    }

    fn segments(p: &XmlElement) -> Vec<&XmlElement> {
        p.find_first("linesegarray").unwrap().child_elements().collect()
    }

    #[test]
    fn short_paragraph_gets_one_segment() {
        let mut p = para_with_text(10);
        recompute_line_segments(&mut p, 75);
        let segs = segments(&p);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].attr("textpos"), Some("0"));
        assert_eq!(segs[0].attr("vertpos"), Some("3200"));
    }

    #[test]
    fn long_paragraph_breaks_at_width() {
        // 160 chars at width 75 → 3 lines.
        let mut p = para_with_text(160);
        recompute_line_segments(&mut p, 75);
        let segs = segments(&p);
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[1].attr("textpos"), Some("75"));
        assert_eq!(segs[2].attr("textpos"), Some("150"));
        assert_eq!(segs[1].attr("vertpos"), Some("4200"));
        assert_eq!(segs[2].attr("vertpos"), Some("5200"));
        // Geometry carried over from the previous segmentation.
        assert_eq!(segs[0].attr("horzsize"), Some("42520"));
    }

    #[test]
    fn exact_multiple_of_width_has_no_trailing_segment() {
        let mut p = para_with_text(150);
        recompute_line_segments(&mut p, 75);
        assert_eq!(segments(&p).len(), 2);
    }

    #[test]
    fn empty_paragraph_keeps_a_single_segment() {
        let mut p = parse_str(r#"<hp:p paraPrIDRef="11"><hp:run/></hp:p>"#).unwrap();
        recompute_line_segments(&mut p, 75);
        let segs = segments(&p);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].attr("vertsize"), Some("1000"));
    }

    #[test]
    fn recomputation_is_idempotent() {
        let mut p = para_with_text(160);
        recompute_line_segments(&mut p, 75);
        let first = p.clone();
        recompute_line_segments(&mut p, 75);
        assert_eq!(p, first);
    }

    #[test]
    fn nested_cell_paragraphs_are_segmented_independently() {
        let mut root = parse_str(
            r#"<hs:sec><hp:p paraPrIDRef="7"><hp:tbl><hp:tr><hp:tc><hp:subList><hp:p><hp:run><hp:t>셀 내용</hp:t></hp:run></hp:p></hp:subList></hp:tc></hp:tr></hp:tbl></hp:p></hs:sec>"#,
        )
        .unwrap();
        recompute_line_segments(&mut root, 75);
        // Outer paragraph and the nested cell paragraph each get an array.
        assert_eq!(root.find_all("linesegarray").len(), 2);
    }
}
