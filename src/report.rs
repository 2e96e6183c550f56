//! Human-facing status lines and portal links.
//!
//! Rendering depends on an explicit [`RenderMode`]: markdown for rich
//! viewers, plain text for terminals. Links point at the platform portal,
//! whose origin is taken from the configured API URL.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::Url;
use thiserror::Error;

use crate::platform::{WorkRequirement, WorkerPool};

/// Output flavour for report lines.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RenderMode {
    /// Plain text suitable for a terminal.
    #[default]
    Console,
    /// Markdown links and images.
    Markdown,
}

/// Errors raised while building a report.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ReportError {
    /// The platform URL could not be parsed.
    #[error("invalid platform URL {url}: {message}")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// Parser message.
        message: String,
    },
}

/// Platform entity kinds that have a portal page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityKind {
    /// A worker pool provisioned from a template.
    ProvisionedWorkerPool,
    /// A worker pool of externally managed workers.
    ConfiguredWorkerPool,
    /// A work requirement.
    WorkRequirement,
    /// A compute requirement.
    ComputeRequirement,
}

impl EntityKind {
    /// Portal route segment for the entity.
    #[must_use]
    pub const fn route(self) -> &'static str {
        match self {
            Self::ProvisionedWorkerPool | Self::ConfiguredWorkerPool => "workers",
            Self::WorkRequirement => "work",
            Self::ComputeRequirement => "compute",
        }
    }

    /// Platform type name of the entity.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::ProvisionedWorkerPool => "ProvisionedWorkerPool",
            Self::ConfiguredWorkerPool => "ConfiguredWorkerPool",
            Self::WorkRequirement => "WorkRequirement",
            Self::ComputeRequirement => "ComputeRequirement",
        }
    }
}

/// Something that can be linked in the portal.
pub trait Entity {
    /// Kind of the entity.
    fn kind(&self) -> EntityKind;
    /// Platform identifier of the entity.
    fn entity_id(&self) -> &str;
}

impl Entity for WorkerPool {
    fn kind(&self) -> EntityKind {
        EntityKind::ProvisionedWorkerPool
    }

    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl Entity for WorkRequirement {
    fn kind(&self) -> EntityKind {
        EntityKind::WorkRequirement
    }

    fn entity_id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

/// Splits `CamelCase` into space separated words, keeping acronyms whole.
///
/// Characters before the first capital and non-letters are dropped.
#[must_use]
pub fn camel_case_split(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (index, ch) in chars.iter().copied().enumerate() {
        if !ch.is_alphabetic() {
            flush_word(&mut words, &mut current);
            continue;
        }
        if ch.is_uppercase() {
            let previous = index.checked_sub(1).and_then(|prev| chars.get(prev)).copied();
            let next = chars.get(index + 1).copied();
            let after_lower = previous.is_some_and(char::is_lowercase);
            let acronym_end = previous.is_some_and(char::is_uppercase)
                && next.is_some_and(char::is_lowercase);
            if after_lower || acronym_end {
                flush_word(&mut words, &mut current);
            }
            current.push(ch);
        } else if !current.is_empty() {
            current.push(ch);
        }
    }
    flush_word(&mut words, &mut current);
    words.join(" ")
}

fn flush_word(words: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

/// Percent-encodes `value` as a single path segment (`/` becomes `%2F`).
#[must_use]
pub fn encode_segment(value: &str) -> String {
    let Ok(mut scratch) = Url::parse("http://segment.invalid/") else {
        return value.to_owned();
    };
    if let Ok(mut segments) = scratch.path_segments_mut() {
        segments.clear().push(value);
    }
    scratch.path().trim_start_matches('/').to_owned()
}

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Writes report lines and renders portal links.
#[derive(Clone)]
pub struct RunReport {
    mode: RenderMode,
    origin: String,
    sink: Sink,
}

impl std::fmt::Debug for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunReport")
            .field("mode", &self.mode)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl RunReport {
    /// Creates a report writing to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::InvalidUrl`] when `platform_url` does not parse
    /// or has no host.
    pub fn new(
        mode: RenderMode,
        platform_url: &str,
        sink: impl Write + Send + 'static,
    ) -> Result<Self, ReportError> {
        let url = Url::parse(platform_url).map_err(|err| ReportError::InvalidUrl {
            url: platform_url.to_owned(),
            message: err.to_string(),
        })?;
        if url.host_str().is_none() {
            return Err(ReportError::InvalidUrl {
                url: platform_url.to_owned(),
                message: String::from("missing host"),
            });
        }
        Ok(Self {
            mode,
            origin: url.origin().ascii_serialization(),
            sink: Arc::new(Mutex::new(Box::new(sink))),
        })
    }

    /// Creates a report writing to standard output.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::InvalidUrl`] when `platform_url` is invalid.
    pub fn stdout(mode: RenderMode, platform_url: &str) -> Result<Self, ReportError> {
        Self::new(mode, platform_url, io::stdout())
    }

    /// Rendering mode in use.
    #[must_use]
    pub const fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Writes the parts joined by spaces as one line.
    pub fn line(&self, parts: &[&str]) {
        let text = parts.join(" ");
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(sink, "{text}").ok();
        sink.flush().ok();
    }

    /// Renders a portal link; `suffix` is appended after the origin and `/`.
    #[must_use]
    pub fn link(&self, suffix: &str, text: Option<&str>) -> String {
        let url = format!("{}/{suffix}", self.origin);
        let label = text.unwrap_or(&url);
        match self.mode {
            RenderMode::Markdown => format!("[{label}]({url})"),
            RenderMode::Console if label == url => url.clone(),
            RenderMode::Console => format!("{label} ({url})"),
        }
    }

    /// Renders a local image reference.
    #[must_use]
    pub fn image(&self, path: &str, text: Option<&str>) -> String {
        let label = text.unwrap_or(path);
        match self.mode {
            RenderMode::Markdown => format!("![{label}]({path})"),
            RenderMode::Console if label == path => path.to_owned(),
            RenderMode::Console => format!("{label} available at: {path}"),
        }
    }

    /// Renders a link to an entity's portal page, labelled by its type.
    #[must_use]
    pub fn link_entity(&self, entity: &impl Entity) -> String {
        let kind = entity.kind();
        let label = camel_case_split(kind.type_name()).to_uppercase();
        self.link(
            &format!("#/{}/{}", kind.route(), entity.entity_id()),
            Some(&label),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CapturedOutput;
    use rstest::{fixture, rstest};

    struct Pool;

    impl Entity for Pool {
        fn kind(&self) -> EntityKind {
            EntityKind::ProvisionedWorkerPool
        }

        fn entity_id(&self) -> &str {
            "pool-1"
        }
    }

    const URL: &str = "https://portal.yellowdog.co/api";

    #[fixture]
    fn console() -> RunReport {
        RunReport::new(RenderMode::Console, URL, io::sink()).expect("report")
    }

    #[fixture]
    fn markdown() -> RunReport {
        RunReport::new(RenderMode::Markdown, URL, io::sink()).expect("report")
    }

    #[rstest]
    #[case("ProvisionedWorkerPool", "Provisioned Worker Pool")]
    #[case("WorkRequirement", "Work Requirement")]
    #[case("HTTPServer", "HTTP Server")]
    #[case("ID", "ID")]
    #[case("lowerStart", "Start")]
    fn camel_case_is_split_into_words(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(camel_case_split(input), expected);
    }

    #[rstest]
    fn console_link_without_text_is_bare_url(console: RunReport) {
        assert_eq!(console.link("", None), "https://portal.yellowdog.co/");
    }

    #[rstest]
    fn console_link_with_text_appends_url(console: RunReport) {
        assert_eq!(
            console.link("#/work/wr-1", Some("Output")),
            "Output (https://portal.yellowdog.co/#/work/wr-1)"
        );
    }

    #[rstest]
    fn markdown_link_uses_brackets(markdown: RunReport) {
        assert_eq!(
            markdown.link("#/work/wr-1", Some("Output")),
            "[Output](https://portal.yellowdog.co/#/work/wr-1)"
        );
    }

    #[rstest]
    fn entity_links_use_route_and_upper_label(console: RunReport, markdown: RunReport) {
        assert_eq!(
            console.link_entity(&Pool),
            "PROVISIONED WORKER POOL (https://portal.yellowdog.co/#/workers/pool-1)"
        );
        assert_eq!(
            markdown.link_entity(&Pool),
            "[PROVISIONED WORKER POOL](https://portal.yellowdog.co/#/workers/pool-1)"
        );
    }

    #[rstest]
    fn images_render_per_mode(console: RunReport, markdown: RunReport) {
        assert_eq!(console.image("/out/a.jpg", None), "/out/a.jpg");
        assert_eq!(
            console.image("/out/a.jpg", Some("The final picture")),
            "The final picture available at: /out/a.jpg"
        );
        assert_eq!(
            markdown.image("/out/a.jpg", Some("The final picture")),
            "![The final picture](/out/a.jpg)"
        );
    }

    #[test]
    fn lines_are_joined_with_spaces() {
        let captured = CapturedOutput::default();
        let report = RunReport::new(RenderMode::Console, URL, captured.clone()).expect("report");
        report.line(&["Added", "WORK REQUIREMENT"]);
        assert_eq!(captured.text(), "Added WORK REQUIREMENT\n");
    }

    #[test]
    fn port_is_kept_in_origin() {
        let report =
            RunReport::new(RenderMode::Console, "http://localhost:8080/api", io::sink())
                .expect("report");
        assert_eq!(report.link("x", None), "http://localhost:8080/x");
    }

    #[rstest]
    #[case("not a url")]
    #[case("data:text/plain,hello")]
    fn invalid_urls_are_rejected(#[case] url: &str) {
        assert!(RunReport::new(RenderMode::Console, url, io::sink()).is_err());
    }

    #[test]
    fn segments_encode_slashes() {
        assert_eq!(
            encode_segment("wr/ImageMontage/MontageImage/montage a.jpg"),
            "wr%2FImageMontage%2FMontageImage%2Fmontage%20a.jpg"
        );
    }
}
