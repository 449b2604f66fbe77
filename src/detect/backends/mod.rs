pub mod stub;
pub mod tract;

pub use stub::StubDetector;
pub use tract::TractDetector;
