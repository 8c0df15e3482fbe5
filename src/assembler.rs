// src/assembler.rs
use crate::dom::{self, NamespaceSet, XmlElement};
use crate::fragment_cloner::{
    clone_para, clone_topic_para, fill_picture_paragraph, fill_table_paragraph, update_text_only,
};
use crate::lineseg::{self, recompute_line_segments};
use crate::report_model::Report;
use crate::template_extractor::{
    extract, find_cell_template, find_picture_paragraph, find_row_template, find_table_paragraph,
    paragraphs_with_ref,
};
use anyhow::Context;
use log::{debug, info, warn};
use std::path::Path;

pub const TITLE_PARA_ID: &str = "4";
pub const TOPIC_PARA_ID: &str = "2";
pub const SUB_TITLE_PARA_ID: &str = "6";
pub const DETAIL_PARA_ID: &str = "11";
pub const BLOCK_PARA_ID: &str = "7";

/// Governs whether table and/or image blocks are emitted. The two axes are
/// gated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ContentMode {
    None,
    Tables,
    Images,
    TablesImages,
}

impl ContentMode {
    pub fn includes_tables(self) -> bool {
        matches!(self, ContentMode::Tables | ContentMode::TablesImages)
    }

    pub fn includes_images(self) -> bool {
        matches!(self, ContentMode::Images | ContentMode::TablesImages)
    }
}

pub struct ReportAssembler {
    namespaces: NamespaceSet,
    max_width: usize,
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new(NamespaceSet::default(), lineseg::DEFAULT_MAX_WIDTH)
    }
}

impl ReportAssembler {
    pub fn new(namespaces: NamespaceSet, max_width: usize) -> Self {
        Self { namespaces, max_width }
    }

    /// Full assembly pass over a loaded section tree: extract templates,
    /// strip boilerplate, substitute the title, fold the payload in order,
    /// recompute line segments once.
    ///
    /// The payload is assumed validated; template and substructure misses
    /// degrade to skipped content rather than aborting the run.
    pub fn assemble(
        &self,
        section: &mut XmlElement,
        report: &Report,
        mode: ContentMode,
    ) -> anyhow::Result<()> {
        let template_ids = [
            TITLE_PARA_ID,
            TOPIC_PARA_ID,
            SUB_TITLE_PARA_ID,
            DETAIL_PARA_ID,
            BLOCK_PARA_ID,
        ];
        // Template harvesting has to see the full document, so it runs
        // before the boilerplate strip.
        let templates = extract(section, &template_ids);
        let table_paragraph = find_table_paragraph(section, BLOCK_PARA_ID);
        let row_template = find_row_template(section, BLOCK_PARA_ID);
        let cell_template = find_cell_template(section, BLOCK_PARA_ID);
        let picture_paragraph = find_picture_paragraph(section, BLOCK_PARA_ID);
        info!("extracted {} paragraph templates", templates.len());

        strip_boilerplate(section);
        update_text_only(section, TITLE_PARA_ID, &report.title);

        for topic in &report.topics {
            if let Some(topic_tpl) = templates.get(TOPIC_PARA_ID) {
                section.push_element(clone_topic_para(topic_tpl, &topic.topic));
            }

            for main in &topic.main_points {
                if let Some(sub_tpl) = templates.get(SUB_TITLE_PARA_ID) {
                    section.push_element(clone_para(sub_tpl, &main.sub_title));
                }

                for detail in &main.details {
                    if let Some(detail_tpl) = templates.get(DETAIL_PARA_ID) {
                        section.push_element(clone_para(detail_tpl, &detail.content));
                    }
                }

                if mode.includes_tables() {
                    for block in main.tables.as_deref().unwrap_or_default() {
                        match (&table_paragraph, &row_template, &cell_template) {
                            (Some(tpl), Some(row), Some(cell)) => {
                                section.push_element(fill_table_paragraph(
                                    tpl,
                                    &block.table,
                                    &block.caption,
                                    row,
                                    cell,
                                ));
                            }
                            _ => warn!("table templates unavailable, skipping table block"),
                        }
                    }
                }

                if mode.includes_images() {
                    for image in main.images.as_deref().unwrap_or_default() {
                        match &picture_paragraph {
                            Some(tpl) => {
                                section.push_element(fill_picture_paragraph(
                                    tpl,
                                    &image.filename,
                                    &image.caption,
                                ));
                            }
                            None => warn!("picture template unavailable, skipping image block"),
                        }
                    }
                }
            }
        }

        // Attribute-only pass; interleaving it with appends would just redo
        // the same work after every later append.
        recompute_line_segments(section, self.max_width);
        Ok(())
    }

    /// Load a section XML file, assemble into it, and write it back.
    pub fn assemble_section_file<P: AsRef<Path>>(
        &self,
        section_path: P,
        report: &Report,
        mode: ContentMode,
    ) -> anyhow::Result<()> {
        let section_path = section_path.as_ref();
        let mut section = dom::parse_file(section_path)?;
        self.assemble(&mut section, report, mode)?;
        let bytes = dom::serialize_document(&section, &self.namespaces)?;
        std::fs::write(section_path, bytes)
            .with_context(|| format!("failed to write {}", section_path.display()))?;
        info!("assembled section written to {}", section_path.display());
        Ok(())
    }
}

/// Drop every top-level block of the section except those containing (or
/// being) a title paragraph. One-way filter; runs before any append so that
/// exactly one structural anchor survives from the template document. If
/// several blocks qualify, the first in document order receives the title
/// text later — `update_text_only` targets the first match.
fn strip_boilerplate(section: &mut XmlElement) {
    let before = section.children.len();
    section.children.retain(|node| match node.as_element() {
        Some(child) => {
            let is_title =
                child.local_name() == "p" && child.attr("paraPrIDRef") == Some(TITLE_PARA_ID);
            is_title || !paragraphs_with_ref(child, TITLE_PARA_ID).is_empty()
        }
        None => false,
    });
    debug!(
        "boilerplate strip: kept {} of {} top-level blocks",
        section.children.len(),
        before
    );
}
