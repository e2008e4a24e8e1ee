//! Log in to an online course platform, walk its course outlines and
//! download the lecture videos, resuming from a ledger on the next run.

pub mod api;
pub mod application;
pub mod domain;
pub mod logging;
pub mod utils;

pub use api::{ApiClient, ApiConfig};
pub use application::{DownloadEngine, DownloadLedger, LectureFetcher, Session};
pub use domain::{AppError, BatchOutcome, BatchState, Course, Lecture, MediaKind, SessionEvent};
