//! Ethnia - ethnicity analysis service.
//!
//! This crate serves a single analysis endpoint: it accepts an uploaded
//! image, finds persons in it with a pretrained object detector, runs a
//! pretrained CNN over each person crop, and reports the 7-way ethnicity
//! probability vector plus templated description text per person.
//!
//! # Architecture
//!
//! Request flow, in data order:
//!
//! 1. `api`: multipart upload parsing and HTTP plumbing
//! 2. `ingest`: in-memory decode of the upload to RGB8
//! 3. `detect`: detector backend + shared post-processing
//!    (confidence filter, denormalize, NMS, clamp, crop)
//! 4. `classify`: classifier backend + the 7-label output contract
//! 5. `analyze`: pipeline ownership and response assembly
//!
//! Both models load exactly once at startup and are reused by every
//! request. Backends selected by a `stub://` model path are synthetic and
//! deterministic; tests use them to run the full pipeline without model
//! files on disk.

pub mod analyze;
pub mod api;
pub mod classify;
pub mod config;
pub mod detect;
pub mod ingest;

pub use analyze::{AnalysisEngine, AnalysisReport, PersonResult};
pub use classify::{ClassifierBackend, Ethnicity, ProbabilityVector, DETAIL_THRESHOLD};
pub use config::ServiceConfig;
pub use detect::{Detection, DetectorBackend, PersonBox, RawDetection};
