use std::path::PathBuf;

/// A lecture link as it appears in a course outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureLink {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subsection {
    pub name: String,
    pub lectures: Vec<LectureLink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub subsections: Vec<Subsection>,
}

/// Section → subsection → lecture hierarchy, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    pub sections: Vec<Section>,
}

impl Outline {
    pub fn lecture_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|section| &section.subsections)
            .map(|subsection| subsection.lectures.len())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub course_key: String,
    pub name: String,
    pub university: String,
    pub date: String,
    pub url: String,
    /// `None` until the course page has been fetched.
    pub outline: Option<Outline>,
}

impl Course {
    pub fn new(course_key: String, name: String, university: String, date: String, url: String) -> Self {
        Self {
            course_key,
            name,
            university,
            date,
            url,
            outline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Problem,
    Other,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lecture {
    pub url: String,
    pub title: String,
    pub media_kind: MediaKind,
    pub download_url: Option<String>,
    /// Resolved through a hosted video platform rather than a direct file.
    pub is_streamed_video: bool,
    pub downloaded: bool,
    pub destination_path: Option<PathBuf>,
    /// 1-based place within its subsection, used to number the file.
    pub position: Option<usize>,
}

impl Lecture {
    /// Unresolved lecture as produced by outline extraction.
    pub fn stub(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            media_kind: MediaKind::Unknown,
            download_url: None,
            is_streamed_video: false,
            downloaded: false,
            destination_path: None,
            position: None,
        }
    }

    /// File name without extension, before sanitization.
    pub fn file_stem(&self) -> String {
        match self.position {
            Some(position) => format!("{}. {}", position, self.title),
            None => self.title.clone(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.media_kind == MediaKind::Video
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    Cancelled,
    Failed,
}

impl BatchOutcome {
    pub fn is_success(self) -> bool {
        self == BatchOutcome::Completed
    }
}

impl From<BatchOutcome> for BatchState {
    fn from(outcome: BatchOutcome) -> Self {
        match outcome {
            BatchOutcome::Completed => BatchState::Completed,
            BatchOutcome::Cancelled => BatchState::Cancelled,
            BatchOutcome::Failed => BatchState::Failed,
        }
    }
}

/// Notifications pushed to whoever drives the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Authenticated(bool),
    OutlinesRetrieved(bool),
    /// Fraction of lectures processed (0.0 to 1.0); never decreases within a
    /// batch, retries included
    Progress(f32),
    BatchFinished(BatchOutcome),
    CourseSelectionRequired,
    DestinationRequired,
}
