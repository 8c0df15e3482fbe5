// src/fragment_cloner.rs
//
// Every operation here clones the template first and mutates only the clone.
// Templates are stamped an unbounded number of times, so the shared fragment
// must come out of each call untouched. Missing target slots are logged and
// the clone is returned as-is; a lost decorative element is recoverable, a
// crashed batch run is not.
use crate::dom::XmlElement;
use log::warn;

/// Clone a plain paragraph template and replace its first text node.
pub fn clone_para(template: &XmlElement, new_text: &str) -> XmlElement {
    let mut p = template.clone();
    match p.find_first_mut("t") {
        Some(t) => t.set_text(new_text.trim()),
        None => warn!("paragraph template has no text node, returning unmodified copy"),
    }
    p
}

/// Clone a topic template (a paragraph wrapping a two-cell table row) and
/// write the topic label into the second cell's text node.
pub fn clone_topic_para(template: &XmlElement, topic_text: &str) -> XmlElement {
    let mut p = template.clone();
    let cell_count = p.find_all("tc").len();
    if cell_count < 2 {
        warn!("topic template has {} table cells, expected at least 2", cell_count);
        return p;
    }
    let Some(second) = p.descendant_mut("tc", 1) else {
        return p;
    };
    match second.find_first_mut("t") {
        Some(t) => t.set_text(topic_text.trim()),
        None => warn!("topic template second cell has no text node"),
    }
    p
}

/// In-place text substitution on the first paragraph carrying the given
/// paraPrIDRef. Used for the retained title anchor, which stays attached to
/// the tree instead of being cloned.
pub fn update_text_only(root: &mut XmlElement, para_id: &str, new_text: &str) {
    let path = root.find_path(|el| {
        el.local_name() == "p" && el.attr("paraPrIDRef") == Some(para_id)
    });
    let Some(path) = path else {
        warn!("no paragraph with paraPrIDRef={} to update", para_id);
        return;
    };
    let para = root.node_at_path_mut(&path);
    match para.find_first_mut("t") {
        Some(t) => t.set_text(new_text.trim()),
        None => warn!("paragraph paraPrIDRef={} has no text node", para_id),
    }
}

/// Clone a table paragraph template and rebuild its table from the payload
/// grid: the template's own placeholder rows are discarded after their
/// structure has been harvested into `row_template`/`cell_template`, one row
/// clone per payload row, one cell clone per column. Cell addresses and the
/// table's row/column counts are rewritten so the nesting stays valid.
pub fn fill_table_paragraph(
    template: &XmlElement,
    rows: &[Vec<String>],
    caption: &str,
    row_template: &XmlElement,
    cell_template: &XmlElement,
) -> XmlElement {
    let mut p = template.clone();

    let Some(tbl) = p.find_first_mut("tbl") else {
        warn!("table template has no tbl node, returning unmodified copy");
        return p;
    };

    set_caption(tbl, caption);

    // Placeholder rows out, payload rows in.
    tbl.children.retain(|node| !node.is_named("tr"));

    let col_count = rows.first().map(|row| row.len()).unwrap_or(0);
    for (row_idx, row) in rows.iter().enumerate() {
        let mut tr = row_template.clone();
        tr.children.retain(|node| !node.is_named("tc"));

        for (col_idx, value) in row.iter().enumerate() {
            let mut tc = cell_template.clone();
            match tc.find_first_mut("t") {
                Some(t) => t.set_text(value.trim()),
                None => warn!(
                    "cell template has no text node (row {}, col {})",
                    row_idx, col_idx
                ),
            }
            if let Some(addr) = tc.find_first_mut("cellAddr") {
                addr.set_attr("colAddr", &col_idx.to_string());
                addr.set_attr("rowAddr", &row_idx.to_string());
            }
            tr.push_element(tc);
        }
        tbl.push_element(tr);
    }

    tbl.set_attr("rowCnt", &rows.len().to_string());
    tbl.set_attr("colCnt", &col_count.to_string());

    p
}

/// Clone a picture paragraph template, pointing its image reference at the
/// payload filename and writing the caption. The filename is not checked
/// against the package's media resources; packaging owns that.
pub fn fill_picture_paragraph(template: &XmlElement, filename: &str, caption: &str) -> XmlElement {
    let mut p = template.clone();

    match p.find_first_mut("img") {
        Some(img) => img.set_attr("binaryItemIDRef", filename),
        None => warn!("picture template has no img node, returning unmodified copy"),
    }

    if let Some(pic) = p.find_first_mut("pic") {
        set_caption(pic, caption);
    } else if let Some(tbl) = p.find_first_mut("tbl") {
        set_caption(tbl, caption);
    } else {
        warn!("picture template has no caption holder");
    }

    p
}

fn set_caption(holder: &mut XmlElement, caption: &str) {
    let slot = holder
        .find_first_mut("caption")
        .and_then(|cap| cap.find_first_mut("t"));
    match slot {
        Some(t) => t.set_text(caption.trim()),
        None => warn!("no caption slot found"),
    }
}
