//! Catalog and outline extraction from the site's HTML.
//!
//! Entries missing a required field are skipped with a debug log; a partial
//! result is never an error.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::domain::{AppError, Course, LectureLink, Outline, Section, Subsection};
use crate::utils::{absolute_url, display_date, normalize_text};

struct CourseSelectors {
    course: Selector,
    title_link: Selector,
    university: Selector,
    date: Selector,
}

impl CourseSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            course: Selector::parse("article.course").ok()?,
            title_link: Selector::parse("h3.course-title a").ok()?,
            university: Selector::parse(".info-university").ok()?,
            date: Selector::parse(".info-date-block").ok()?,
        })
    }
}

struct OutlineSelectors {
    section: Selector,
    section_title: Selector,
    subsection: Selector,
    subsection_title: Selector,
    lecture_link: Selector,
    lecture_title: Selector,
}

impl OutlineSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            section: Selector::parse("li.outline-item.section").ok()?,
            section_title: Selector::parse(".section-title").ok()?,
            subsection: Selector::parse("li.subsection").ok()?,
            subsection_title: Selector::parse(".subsection-title").ok()?,
            lecture_link: Selector::parse("li.vertical a[href]").ok()?,
            lecture_title: Selector::parse(".vertical-title").ok()?,
        })
    }
}

fn required<T>(value: Option<T>, field: &str) -> Option<T> {
    if value.is_none() {
        debug!(error = %AppError::ExtractionGap(field.to_string()), "skipping entry");
    }
    value
}

fn text_of(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<String>())
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(text_of)
        .filter(|text| !text.is_empty())
}

/// Courses listed on the dashboard, in page order. A key listed twice keeps
/// its first entry.
pub fn list_courses(html: &str, base_url: &str) -> Vec<Course> {
    let Some(selectors) = CourseSelectors::new() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    document
        .select(&selectors.course)
        .filter_map(|article| parse_course(article, &selectors, base_url))
        .filter(|course| {
            let fresh = seen.insert(course.course_key.clone());
            if !fresh {
                debug!(course = %course.course_key, "duplicate course entry skipped");
            }
            fresh
        })
        .collect()
}

fn parse_course(article: ElementRef<'_>, selectors: &CourseSelectors, base_url: &str) -> Option<Course> {
    let link = required(article.select(&selectors.title_link).next(), "course link")?;
    let course_key = required(link.value().attr("data-course-key"), "course key")?;
    let href = required(link.value().attr("href"), "course href")?;
    let url = required(absolute_url(base_url, href), "course url")?;

    let university = required(article.select(&selectors.university).next(), "university")?;
    let university = text_of(university)
        .trim_end_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string();

    let date = required(article.select(&selectors.date).next(), "date")?;
    let date = display_date(date.value().attr("data-datetime"), &text_of(date));

    Some(Course::new(
        course_key.to_string(),
        text_of(link),
        university,
        date,
        url,
    ))
}

/// Section → subsection → lecture tree of a course page.
pub fn list_outline(html: &str, base_url: &str) -> Outline {
    let Some(selectors) = OutlineSelectors::new() else {
        return Outline::default();
    };
    let document = Html::parse_document(html);

    let sections = document
        .select(&selectors.section)
        .filter_map(|section| {
            let name = required(first_text(section, &selectors.section_title), "section title")?;
            let subsections = section
                .select(&selectors.subsection)
                .filter_map(|subsection| parse_subsection(subsection, &selectors, base_url))
                .collect();
            Some(Section { name, subsections })
        })
        .collect();

    Outline { sections }
}

fn parse_subsection(
    subsection: ElementRef<'_>,
    selectors: &OutlineSelectors,
    base_url: &str,
) -> Option<Subsection> {
    let name = required(
        first_text(subsection, &selectors.subsection_title),
        "subsection title",
    )?;

    let mut seen = HashSet::new();
    let lectures = subsection
        .select(&selectors.lecture_link)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let url = required(absolute_url(base_url, href), "lecture url")?;
            let title = first_text(link, &selectors.lecture_title).unwrap_or_else(|| text_of(link));
            let title = required(Some(title).filter(|t| !t.is_empty()), "lecture title")?;
            Some(LectureLink { url, title })
        })
        .filter(|lecture| seen.insert(lecture.url.clone()))
        .collect();

    Some(Subsection { name, lectures })
}
