// src/report_model.rs
use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::Path;

/// Structured report payload produced by the upstream extraction service.
/// Loaded once, validated once, never mutated during assembly.
#[derive(Debug, Clone, Deserialize)]
pub struct Report {
    pub title: String,
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Topic {
    pub topic: String,
    pub main_points: Vec<MainPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainPoint {
    pub sub_title: String,
    #[serde(default)]
    pub details: Vec<Detail>,
    #[serde(default)]
    pub tables: Option<Vec<TableBlock>>,
    #[serde(default)]
    pub images: Option<Vec<ImageBlock>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Detail {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableBlock {
    pub caption: String,
    pub table: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageBlock {
    pub filename: String,
    pub caption: String,
}

impl Report {
    /// Precondition check run before any output is touched. A payload that
    /// fails here aborts the whole run; assembly never starts on a partial
    /// or malformed report.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.title.trim().is_empty() {
            bail!("report title is empty");
        }
        for (ti, topic) in self.topics.iter().enumerate() {
            if topic.topic.trim().is_empty() {
                bail!("topic {} has an empty label", ti + 1);
            }
            for (mi, main) in topic.main_points.iter().enumerate() {
                if main.sub_title.trim().is_empty() {
                    bail!("topic {} main point {} has an empty sub_title", ti + 1, mi + 1);
                }
            }
        }
        Ok(())
    }
}

pub fn load_report<P: AsRef<Path>>(path: P) -> anyhow::Result<Report> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read report payload {}", path.display()))?;
    let report: Report = serde_json::from_str(&raw)
        .with_context(|| format!("report payload {} is not valid JSON", path.display()))?;
    report
        .validate()
        .with_context(|| format!("report payload {} failed validation", path.display()))?;
    Ok(report)
}
