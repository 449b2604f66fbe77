pub mod stub;
pub mod tract;

pub use stub::StubClassifier;
pub use tract::TractClassifier;
