const DEFAULT_TARGET_URL: &str = "https://the-internet.herokuapp.com/challenging_dom";

#[derive(Debug, Parser, Clone)]
#[command(
    name = "domprobe",
    version,
    about = "Crawl a page's links, click each one, and report pass/fail timings"
)]
struct Cli {
    #[arg(value_name = "URL", default_value = DEFAULT_TARGET_URL)]
    url: String,

    #[arg(long, value_enum, default_value_t = DriverArg::Cdp)]
    driver: DriverArg,

    #[arg(long, value_name = "URL", default_value = "http://localhost:4444")]
    webdriver_url: String,

    #[arg(long, value_enum, default_value_t = BrowserArg::Chrome)]
    webdriver_browser: BrowserArg,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    headless: bool,

    #[arg(long, value_name = "MS", default_value_t = 5000)]
    click_timeout_ms: u64,

    #[arg(long, value_name = "TEXT", default_value = "Test Interaction")]
    probe_text: String,

    #[arg(long, value_name = "FILE", default_value = "reports/results.json")]
    json_report: String,

    #[arg(long, value_name = "FILE", default_value = "reports/results.html")]
    html_report: String,

    #[arg(long, value_name = "FILE")]
    csv_report: Option<String>,

    #[arg(long, value_name = "DIR", default_value = "reports/screenshots")]
    screenshot_dir: String,

    #[arg(long, default_value_t = false)]
    no_chart: bool,
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
enum DriverArg {
    Webdriver,
    Cdp,
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
enum BrowserArg {
    Chrome,
    Firefox,
    Edge,
    Safari,
}

/// One anchor as seen at enumeration time. Re-lookup during the crawl goes
/// by `url` first, then by exact `name` match.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkDescriptor {
    name: String,
    url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum LinkStatus {
    Passed,
    Failed,
}

impl LinkStatus {
    fn label(self) -> &'static str {
        match self {
            LinkStatus::Passed => "passed",
            LinkStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct TestResult {
    name: String,
    url: String,
    status: LinkStatus,
    duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SuiteReport {
    #[serde(rename = "totalDuration")]
    total_duration: f64,
    results: Vec<TestResult>,
}

#[derive(Debug)]
enum CrawlEvent {
    Status(String),
    Error(String),
    Link(TestResult),
    TotalDuration(f64),
    Fatal(String),
    Finished,
}

/// Turns the raw output of the in-page enumeration script into descriptors.
/// Entries with an empty name or url never make it into the sequence.
fn parse_link_entries(value: &Value) -> Vec<LinkDescriptor> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let name = entry.get("name").and_then(Value::as_str)?.trim();
                    let url = entry.get("url").and_then(Value::as_str)?.trim();
                    if name.is_empty() || url.is_empty() {
                        return None;
                    }
                    Some(LinkDescriptor {
                        name: name.to_string(),
                        url: url.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn sanitize_artifact_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

fn screenshot_path(dir: &str, link_name: &str) -> PathBuf {
    Path::new(dir).join(format!("error_{}.png", sanitize_artifact_name(link_name)))
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "..."
}

#[cfg(test)]
mod link_entry_tests {
    use super::*;

    #[test]
    fn keeps_document_order() {
        let raw = json!([
            { "name": "Alpha", "url": "/a" },
            { "name": "Beta", "url": "/b" },
            { "name": "Gamma", "url": "/c" }
        ]);
        let links = parse_link_entries(&raw);
        let names = links.iter().map(|l| l.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["Alpha", "Beta", "Gamma"]);
    }

    #[test]
    fn drops_entries_with_empty_fields() {
        let raw = json!([
            { "name": "", "url": "/a" },
            { "name": "Kept", "url": "/b" },
            { "name": "No Href", "url": "" },
            { "name": "   ", "url": "/c" }
        ]);
        let links = parse_link_entries(&raw);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name, "Kept");
        assert_eq!(links[0].url, "/b");
    }

    #[test]
    fn trims_whitespace_around_fields() {
        let raw = json!([{ "name": "  Edit  ", "url": " #edit " }]);
        let links = parse_link_entries(&raw);
        assert_eq!(links[0].name, "Edit");
        assert_eq!(links[0].url, "#edit");
    }

    #[test]
    fn tolerates_malformed_payloads() {
        assert!(parse_link_entries(&json!(null)).is_empty());
        assert!(parse_link_entries(&json!({ "name": "x" })).is_empty());
        assert!(parse_link_entries(&json!([{ "name": 7, "url": "/a" }])).is_empty());
    }

    #[test]
    fn screenshot_names_are_sanitized() {
        assert_eq!(sanitize_artifact_name("Fork me on GitHub!"), "Fork_me_on_GitHub_");
        let path = screenshot_path("reports/screenshots", "Bad Link #3");
        assert_eq!(
            path,
            Path::new("reports/screenshots").join("error_Bad_Link__3.png")
        );
    }

    #[test]
    fn truncation_appends_ellipsis_only_past_limit() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdefgh", 4), "abcd...");
    }
}
