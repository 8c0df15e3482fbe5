// src/template_extractor.rs
use crate::dom::XmlElement;
use log::{debug, info, warn};
use std::collections::HashMap;

/// Marker substring that identifies the canonical topic template among
/// several paragraphs sharing one paraPrIDRef.
const TOPIC_MARKER: &str = "TOPIC";

/// All paragraphs with the given paraPrIDRef, in document order.
pub fn paragraphs_with_ref<'a>(root: &'a XmlElement, para_id: &str) -> Vec<&'a XmlElement> {
    root.descendants()
        .into_iter()
        .filter(|el| el.local_name() == "p" && el.attr("paraPrIDRef") == Some(para_id))
        .collect()
}

/// Extract one deep-copied template fragment per identifier.
///
/// Disambiguation is two-tier: a candidate whose second table cell carries
/// the TOPIC marker wins (first such match in document order); with no
/// marker match the first candidate is the fallback. Identifiers with zero
/// candidates are simply absent from the result — callers treat absence as
/// "no such template", never as an error.
pub fn extract(root: &XmlElement, para_ids: &[&str]) -> HashMap<String, XmlElement> {
    let mut templates = HashMap::new();

    for &pid in para_ids {
        let candidates = paragraphs_with_ref(root, pid);
        debug!("paraPrIDRef={} candidates: {}", pid, candidates.len());

        let mut chosen: Option<&XmlElement> = None;
        for candidate in &candidates {
            if has_topic_marker(candidate) {
                chosen = Some(candidate);
                info!("paraPrIDRef={} resolved by TOPIC marker", pid);
                break;
            }
        }

        match chosen.or_else(|| candidates.first().copied()) {
            Some(template) => {
                if chosen.is_none() {
                    debug!("paraPrIDRef={} using first candidate as fallback", pid);
                }
                templates.insert(pid.to_string(), template.clone());
            }
            None => warn!("paraPrIDRef={} has no candidates, template unavailable", pid),
        }
    }

    templates
}

/// True when the candidate's second table cell (cells flattened across rows,
/// in document order) holds a text node containing the TOPIC marker.
/// A missing second cell or missing text node just fails the test.
fn has_topic_marker(candidate: &XmlElement) -> bool {
    let cells = candidate.find_all("tc");
    let Some(second) = cells.get(1) else {
        debug!("candidate has fewer than two table cells");
        return false;
    };
    match second.find_first("t") {
        Some(t) => {
            let text = t.text_content();
            if text.is_empty() {
                debug!("second cell text node is empty");
                return false;
            }
            text.to_uppercase().contains(TOPIC_MARKER)
        }
        None => {
            debug!("second cell has no text node");
            false
        }
    }
}

/// First paragraph with the given paraPrIDRef whose table carries at least
/// one data row. Used as the table-block stamp; a fresh deep copy per use.
pub fn find_table_paragraph(root: &XmlElement, para_id: &str) -> Option<XmlElement> {
    paragraphs_with_ref(root, para_id)
        .into_iter()
        .find(|p| {
            p.find_first("tbl")
                .map(|tbl| tbl.find_first("tr").is_some())
                .unwrap_or(false)
        })
        .cloned()
}

/// Row sub-template: the first `tr` under the table paragraph's table.
pub fn find_row_template(root: &XmlElement, para_id: &str) -> Option<XmlElement> {
    find_table_paragraph(root, para_id)
        .as_ref()
        .and_then(|p| p.find_first("tr"))
        .cloned()
}

/// Cell sub-template: the first `tc` under the table paragraph's table.
pub fn find_cell_template(root: &XmlElement, para_id: &str) -> Option<XmlElement> {
    find_table_paragraph(root, para_id)
        .as_ref()
        .and_then(|p| p.find_first("tc"))
        .cloned()
}

/// First paragraph with the given paraPrIDRef containing a picture.
pub fn find_picture_paragraph(root: &XmlElement, para_id: &str) -> Option<XmlElement> {
    paragraphs_with_ref(root, para_id)
        .into_iter()
        .find(|p| p.find_first("pic").is_some() || p.find_first("img").is_some())
        .cloned()
}
