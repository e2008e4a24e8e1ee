use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{outline, ApiClient, ApiConfig, AuthStatus};
use crate::domain::{
    AppError, BatchOutcome, BatchState, Course, Lecture, LectureLink, Outline, SessionEvent,
};

use super::download_engine::{DownloadEngine, LectureFetcher};
use super::ledger::DownloadLedger;
use super::resolver::{LectureResolver, ResolveError};

/// Attempts per batch before giving up
pub const RETRY_LIMIT: u32 = 5;

#[derive(Debug, Clone)]
pub struct SessionState {
    pub selected_courses: HashSet<String>,
    pub try_count: u32,
    pub batch: BatchState,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            selected_courses: HashSet::new(),
            try_count: 0,
            batch: BatchState::Idle,
        }
    }
}

enum AttemptEnd {
    Finished,
    Cancelled,
}

/// Where a lecture sits in the batch.
struct Slot<'a> {
    course: &'a Course,
    section: &'a str,
    subsection: &'a str,
    directory: PathBuf,
    position: usize,
}

/// Drives login, outline retrieval and download batches for one user.
pub struct Session {
    api_client: ApiClient,
    resolver: LectureResolver,
    fetcher: Arc<dyn LectureFetcher>,
    courses: Vec<Course>,
    lectures: HashMap<String, Lecture>,
    state: SessionState,
    retry_limit: u32,
    events: UnboundedSender<SessionEvent>,
}

impl Session {
    pub fn new(config: ApiConfig) -> Result<(Self, UnboundedReceiver<SessionEvent>), AppError> {
        let api_client = ApiClient::new(config)?;
        let (events, receiver) = mpsc::unbounded_channel();

        let session = Self {
            resolver: LectureResolver::new(api_client.clone()),
            fetcher: Arc::new(DownloadEngine::new(api_client.clone())),
            api_client,
            courses: Vec::new(),
            lectures: HashMap::new(),
            state: SessionState::default(),
            retry_limit: RETRY_LIMIT,
            events,
        };
        Ok((session, receiver))
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn LectureFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit.max(1);
        self
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn course(&self, course_key: &str) -> Option<&Course> {
        self.courses.iter().find(|course| course.course_key == course_key)
    }

    pub fn lecture(&self, url: &str) -> Option<&Lecture> {
        self.lectures.get(url)
    }

    pub fn selected_courses(&self) -> &HashSet<String> {
        &self.state.selected_courses
    }

    pub fn batch_state(&self) -> BatchState {
        self.state.batch
    }

    pub fn try_count(&self) -> u32 {
        self.state.try_count
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Authenticate, then load the course catalog from the dashboard.
    pub async fn login(&mut self, username: &str, password: &str) -> bool {
        let successful = match self.api_client.authenticate(username, password).await {
            AuthStatus::Authenticated(_) => match self.load_catalog().await {
                Ok(count) => {
                    info!(courses = count, "course catalog loaded");
                    true
                }
                Err(e) => {
                    error!(error = %e, "could not load course catalog");
                    false
                }
            },
            AuthStatus::Unauthenticated => {
                warn!(error = %AppError::AuthFailure, "login unsuccessful");
                false
            }
        };

        self.emit(SessionEvent::Authenticated(successful));
        successful
    }

    async fn load_catalog(&mut self) -> Result<usize, AppError> {
        let html = self.api_client.fetch_dashboard().await?;
        self.courses = outline::list_courses(&html, &self.api_client.config().urls.base_url);
        Ok(self.courses.len())
    }

    /// Fetch and attach outlines; stops at the first course page that fails.
    /// Outlines fetched before the failure are kept.
    pub async fn retrieve_selected_outlines(&mut self, selected: &HashSet<String>) -> bool {
        if selected.is_empty() {
            self.emit(SessionEvent::CourseSelectionRequired);
            return false;
        }
        self.state.selected_courses = selected.clone();

        let successful = match self.catalog_order(selected) {
            Ok(keys) => {
                let mut successful = true;
                for key in &keys {
                    if let Err(e) = self.retrieve_outline(key).await {
                        error!(course = %key, error = %e, "outline retrieval failed");
                        successful = false;
                        break;
                    }
                }
                successful
            }
            Err(e) => {
                error!(error = %e, "outline retrieval failed");
                false
            }
        };

        self.emit(SessionEvent::OutlinesRetrieved(successful));
        successful
    }

    /// Selected keys in catalog order; an unknown key is an error.
    fn catalog_order(&self, selected: &HashSet<String>) -> Result<Vec<String>, AppError> {
        if let Some(unknown) = selected.iter().find(|key| self.course(key).is_none()) {
            return Err(AppError::CourseNotFound(unknown.clone()));
        }
        Ok(self
            .courses
            .iter()
            .filter(|course| selected.contains(&course.course_key))
            .map(|course| course.course_key.clone())
            .collect())
    }

    fn course_index(&self, course_key: &str) -> Result<usize, AppError> {
        self.courses
            .iter()
            .position(|course| course.course_key == course_key)
            .ok_or_else(|| AppError::CourseNotFound(course_key.to_string()))
    }

    async fn retrieve_outline(&mut self, course_key: &str) -> Result<(), AppError> {
        let index = self.course_index(course_key)?;
        let url = self.courses[index].url.clone();

        let html = self
            .api_client
            .fetch_page(&url)
            .await?
            .ok_or_else(|| AppError::Api(format!("course page {} unavailable", url)))?;
        let outline = outline::list_outline(&html, &self.api_client.config().urls.base_url);

        info!(
            course = course_key,
            sections = outline.sections.len(),
            lectures = outline.lecture_count(),
            "outline retrieved"
        );
        self.courses[index].outline = Some(outline);
        Ok(())
    }

    async fn ensure_outline(&mut self, course_key: &str) -> Result<(), AppError> {
        let index = self.course_index(course_key)?;
        if self.courses[index].outline.is_none() {
            self.retrieve_outline(course_key).await?;
        }
        Ok(())
    }

    /// Download every video lecture of the selected courses into `root_folder`.
    ///
    /// Each attempt walks the whole selection from the start; the ledger makes
    /// already finished lectures cheap to skip. `cancel` is polled after every
    /// lecture, so the lecture in flight always completes first.
    pub async fn download_selected(
        &mut self,
        selected: &HashSet<String>,
        root_folder: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, AppError> {
        if selected.is_empty() {
            self.emit(SessionEvent::CourseSelectionRequired);
            return Err(AppError::NoCourseSelected);
        }
        let Some(root) = root_folder.filter(|root| !root.as_os_str().is_empty()) else {
            self.emit(SessionEvent::DestinationRequired);
            return Err(AppError::NoDestination);
        };
        let keys = self.catalog_order(selected)?;

        self.state.selected_courses = selected.clone();
        self.state.try_count = 0;
        self.state.batch = BatchState::Running;
        info!(courses = keys.len(), root = %root.display(), "download batch started");

        let ledger = DownloadLedger::new(root);
        let outcome = self.run_batch(&keys, root, &ledger, cancel).await;

        self.state.batch = outcome.into();
        self.emit(SessionEvent::BatchFinished(outcome));
        Ok(outcome)
    }

    async fn run_batch(
        &mut self,
        keys: &[String],
        root: &Path,
        ledger: &DownloadLedger,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut last_error = None;
        let mut high_water = 0.0f32;

        while self.state.try_count < self.retry_limit {
            if cancel.is_cancelled() {
                info!(error = %AppError::BatchInterrupted, "cancelled before attempt");
                return BatchOutcome::Cancelled;
            }
            self.state.try_count += 1;

            match self.run_attempt(keys, root, ledger, cancel, &mut high_water).await {
                Ok(AttemptEnd::Finished) => {
                    info!(attempt = self.state.try_count, "download batch completed");
                    return BatchOutcome::Completed;
                }
                Ok(AttemptEnd::Cancelled) => {
                    info!(error = %AppError::BatchInterrupted, "download batch cancelled");
                    return BatchOutcome::Cancelled;
                }
                Err(e) => {
                    warn!(
                        attempt = self.state.try_count,
                        limit = self.retry_limit,
                        error = %e,
                        "download attempt failed, restarting batch"
                    );
                    last_error = Some(e);
                }
            }
        }

        let exhausted = AppError::BatchExhausted {
            attempts: self.state.try_count,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        };
        error!(error = %exhausted, "download batch failed");
        BatchOutcome::Failed
    }

    async fn run_attempt(
        &mut self,
        keys: &[String],
        root: &Path,
        ledger: &DownloadLedger,
        cancel: &CancellationToken,
        high_water: &mut f32,
    ) -> Result<AttemptEnd, AppError> {
        for key in keys {
            self.ensure_outline(key).await?;
        }

        let courses: Vec<Course> = keys
            .iter()
            .filter_map(|key| self.course(key).cloned())
            .collect();
        let total: usize = courses
            .iter()
            .filter_map(|course| course.outline.as_ref())
            .map(Outline::lecture_count)
            .sum();
        let mut completed = 0usize;

        for course in &courses {
            let Some(outline) = course.outline.as_ref() else {
                continue;
            };
            let course_dir = root.join(&course.name);

            for (section_index, section) in outline.sections.iter().enumerate() {
                let section_dir = course_dir.join(format!("{}. {}", section_index + 1, section.name));

                for (subsection_index, subsection) in section.subsections.iter().enumerate() {
                    let directory =
                        section_dir.join(format!("{}. {}", subsection_index + 1, subsection.name));

                    for (lecture_index, link) in subsection.lectures.iter().enumerate() {
                        let slot = Slot {
                            course,
                            section: &section.name,
                            subsection: &subsection.name,
                            directory: directory.clone(),
                            position: lecture_index + 1,
                        };
                        self.process_lecture(link, &slot, ledger).await?;

                        completed += 1;
                        self.report_progress(completed as f32 / total as f32, high_water);

                        if cancel.is_cancelled() {
                            return Ok(AttemptEnd::Cancelled);
                        }
                    }
                }
            }
        }

        if total == 0 {
            self.report_progress(1.0, high_water);
        }
        Ok(AttemptEnd::Finished)
    }

    /// A retried attempt walks lectures that were already counted, so the
    /// reported fraction holds at the best value seen in this batch.
    fn report_progress(&self, fraction: f32, high_water: &mut f32) {
        *high_water = high_water.max(fraction);
        self.emit(SessionEvent::Progress(*high_water));
    }

    /// Resolve, consult the ledger, transfer and record one lecture.
    ///
    /// Only unexpected failures (transport errors while resolving, ledger I/O)
    /// are returned; everything else is logged and skipped.
    async fn process_lecture(
        &mut self,
        link: &LectureLink,
        slot: &Slot<'_>,
        ledger: &DownloadLedger,
    ) -> Result<(), AppError> {
        let Some(mut lecture) = self.resolve_cached(link).await? else {
            return Ok(());
        };
        if !lecture.is_video() {
            debug!(url = %lecture.url, kind = ?lecture.media_kind, "not a video, skipping");
            return Ok(());
        }

        // A cached lecture may come from a batch into another root folder.
        lecture.downloaded = false;
        lecture.destination_path = Some(slot.directory.clone());
        lecture.position = Some(slot.position);

        let course_key = slot.course.course_key.as_str();
        if ledger
            .is_downloaded(course_key, slot.section, slot.subsection, &lecture.url)
            .await?
        {
            debug!(url = %lecture.url, "already downloaded");
            lecture.downloaded = true;
            self.lectures.insert(lecture.url.clone(), lecture);
            return Ok(());
        }

        if self.fetcher.fetch(&lecture).await {
            lecture.downloaded = true;
            ledger
                .record(course_key, slot.section, slot.subsection, slot.course, &lecture)
                .await?;
            info!(title = %lecture.title, "lecture downloaded");
        } else {
            warn!(
                error = %AppError::TransferFailure(lecture.url.clone()),
                "lecture left for the next attempt"
            );
        }

        self.lectures.insert(lecture.url.clone(), lecture);
        Ok(())
    }

    async fn resolve_cached(&mut self, link: &LectureLink) -> Result<Option<Lecture>, AppError> {
        if let Some(lecture) = self.lectures.get(&link.url) {
            return Ok(Some(lecture.clone()));
        }

        match self.resolver.resolve(link).await {
            Ok(lecture) => {
                self.lectures.insert(lecture.url.clone(), lecture.clone());
                Ok(Some(lecture))
            }
            Err(ResolveError::NotFound(reason)) => {
                warn!(error = %AppError::ResolutionFailure(reason), "skipping lecture");
                Ok(None)
            }
            Err(ResolveError::Api(e)) => Err(e.into()),
        }
    }
}
