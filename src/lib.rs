pub mod assembler;
pub mod dom;
pub mod fragment_cloner;
pub mod lineseg;
pub mod packager;
pub mod report_model;
pub mod template_extractor;

pub use assembler::{ContentMode, ReportAssembler};
pub use dom::{NamespaceSet, XmlElement};
pub use report_model::{load_report, Report};
