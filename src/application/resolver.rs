use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::debug;

use crate::api::{ApiClient, ApiError};
use crate::domain::{Lecture, LectureLink, MediaKind};

const MARKER_SELECTOR: &str = "#sequence-list .nav-item.active";
const DOWNLOAD_LINK_SELECTOR: &str = "a.video-download-button[href]";

const VIDEO_CLASS: &str = "seq_video";
const PROBLEM_CLASS: &str = "seq_problem";

const STREAM_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

#[derive(Error, Debug)]
pub enum ResolveError {
    /// Page or marker absent, or a video without any usable source.
    #[error("lecture not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Turns an outline link into a classified lecture with a download URL.
#[derive(Clone)]
pub struct LectureResolver {
    client: ApiClient,
}

impl LectureResolver {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, link: &LectureLink) -> Result<Lecture, ResolveError> {
        let html = self
            .client
            .fetch_page(&link.url)
            .await?
            .ok_or_else(|| ResolveError::NotFound(format!("{} returned no page", link.url)))?;

        let lecture = classify(Lecture::stub(&link.url, &link.title), &html)?;
        debug!(
            url = %lecture.url,
            kind = ?lecture.media_kind,
            streamed = lecture.is_streamed_video,
            "lecture resolved"
        );
        Ok(lecture)
    }
}

/// Classify a lecture page. Checked in order: video, problem, anything else.
pub fn classify(mut lecture: Lecture, html: &str) -> Result<Lecture, ResolveError> {
    let document = Html::parse_document(html);
    let marker_selector = Selector::parse(MARKER_SELECTOR)
        .map_err(|e| ResolveError::NotFound(format!("marker selector: {:?}", e)))?;

    let marker = document
        .select(&marker_selector)
        .next()
        .ok_or_else(|| ResolveError::NotFound(format!("{} has no marker node", lecture.url)))?;
    let classes: Vec<&str> = marker.value().classes().collect();

    if classes.contains(&VIDEO_CLASS) {
        lecture.media_kind = MediaKind::Video;
        if let Some(url) = direct_download_link(&document) {
            lecture.download_url = Some(url);
        } else if let Some(id) = extract_stream_id(html) {
            lecture.download_url = Some(format!("{}{}", STREAM_URL_PREFIX, id));
            lecture.is_streamed_video = true;
        } else {
            return Err(ResolveError::NotFound(format!(
                "{} is a video without a download source",
                lecture.url
            )));
        }
    } else if classes.contains(&PROBLEM_CLASS) {
        lecture.media_kind = MediaKind::Problem;
    } else {
        lecture.media_kind = MediaKind::Other;
    }

    Ok(lecture)
}

fn direct_download_link(document: &Html) -> Option<String> {
    let selector = Selector::parse(DOWNLOAD_LINK_SELECTOR).ok()?;
    document
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string)
}

/// Hosted-video id from an embedded stream descriptor like `"streams": "1.00:<id>"`,
/// which may appear JSON- or HTML-escaped inside the page.
fn extract_stream_id(html: &str) -> Option<String> {
    let re = Regex::new(r"streams.{0,24}?1\.00:([0-9A-Za-z_-]{11})").ok()?;
    re.captures(html).map(|caps| caps[1].to_string())
}
