pub mod error;
pub mod model;

pub use error::AppError;
pub use model::{
    BatchOutcome, BatchState, Course, Lecture, LectureLink, MediaKind, Outline, Section,
    SessionEvent, Subsection,
};
