pub mod classify;
pub mod directory;
pub mod engine;
pub mod export;
pub mod fetch;
pub mod graph;
pub mod rank;
pub mod report;
pub mod severity;
pub mod snapshot;

pub mod prelude {
    pub use crate::classify::{ActivityPolicy, ClassificationResult, Status};
    pub use crate::directory::DirectoryObject;
    pub use crate::engine::{Engine, Report, ReportKind};
    pub use crate::severity::Severity;
}
