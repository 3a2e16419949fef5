fn send_status(tx: &UnboundedSender<CrawlEvent>, message: impl Into<String>) {
    let _ = tx.send(CrawlEvent::Status(message.into()));
}

/// Runs a fallible best-effort action: failures are logged and discarded,
/// never escalated. Probe interactions, screenshots, and report writes all
/// route through here so the swallowing stays in one place.
fn best_effort<T: Default>(label: &str, outcome: Result<T, String>) -> T {
    match outcome {
        Ok(value) => value,
        Err(err) => {
            eprintln!("{label} skipped: {err}");
            T::default()
        }
    }
}

async fn run_crawler(cli: Cli, tx: UnboundedSender<CrawlEvent>) {
    let session = match cli.driver {
        DriverArg::Webdriver => {
            send_status(&tx, format!("connecting to webdriver at {}", cli.webdriver_url));
            match WebDriverSession::connect(&cli.webdriver_url, cli.webdriver_browser, cli.headless)
                .await
            {
                Ok(session) => BrowserSession::WebDriver(session),
                Err(err) => {
                    let _ = tx.send(CrawlEvent::Fatal(err.to_string()));
                    let _ = tx.send(CrawlEvent::Finished);
                    return;
                }
            }
        }
        DriverArg::Cdp => {
            send_status(&tx, "launching browser over cdp");
            match CdpSession::launch(cli.headless).await {
                Ok(session) => BrowserSession::Cdp(session),
                Err(err) => {
                    let _ = tx.send(CrawlEvent::Fatal(err.to_string()));
                    let _ = tx.send(CrawlEvent::Finished);
                    return;
                }
            }
        }
    };

    let page = TargetPage::new(session, cli.url.clone());
    crawl_pass(&page, &cli, &tx).await;
    page.close().await;
    let _ = tx.send(CrawlEvent::Finished);
}

/// One full traversal: open the target, snapshot its links, then walk the
/// snapshot strictly in order. A link failure is recorded and the walk
/// continues; only the opening navigation can end the pass early.
async fn crawl_pass(page: &TargetPage, cli: &Cli, tx: &UnboundedSender<CrawlEvent>) {
    let mut suite_watch = StopWatch::default();
    suite_watch.start();

    if let Err(err) = page.open().await {
        let _ = tx.send(CrawlEvent::Fatal(err.to_string()));
        return;
    }
    send_status(tx, format!("opened {}", page.target()));

    let links = match page.links().await {
        Ok(links) => links,
        Err(err) => {
            let _ = tx.send(CrawlEvent::Fatal(err.to_string()));
            return;
        }
    };
    send_status(tx, format!("detected {} links", links.len()));

    let mut link_watch = StopWatch::default();
    for link in &links {
        link_watch.reset();
        link_watch.start();
        send_status(tx, format!("interacting with: {} ({})", link.name, link.url));

        let outcome = process_link(page, link, cli, tx).await;
        link_watch.stop();

        let result = match outcome {
            Ok(()) => TestResult {
                name: link.name.clone(),
                url: link.url.clone(),
                status: LinkStatus::Passed,
                duration: link_watch.duration_ms(),
                error: None,
            },
            Err(err) => {
                let _ = tx.send(CrawlEvent::Error(format!(
                    "error interacting with {}: {err}",
                    link.name
                )));
                capture_failure_screenshot(page, link, &cli.screenshot_dir, tx).await;
                TestResult {
                    name: link.name.clone(),
                    url: link.url.clone(),
                    status: LinkStatus::Failed,
                    duration: link_watch.duration_ms(),
                    error: Some(err.to_string()),
                }
            }
        };
        let _ = tx.send(CrawlEvent::Link(result));

        restore_target(page, tx).await;
    }

    suite_watch.stop();
    let _ = tx.send(CrawlEvent::TotalDuration(suite_watch.duration_ms()));
}

/// Locate-and-click under a bounded wait, then shallow probes on whatever
/// the click left us on. Probe failures never flip the link's outcome.
async fn process_link(
    page: &TargetPage,
    link: &LinkDescriptor,
    cli: &Cli,
    tx: &UnboundedSender<CrawlEvent>,
) -> Result<(), DriverError> {
    let click_timeout = Duration::from_millis(cli.click_timeout_ms.max(1));
    tokio::time::timeout(click_timeout, page.click_link(link))
        .await
        .map_err(|_| {
            DriverError::InteractionTimeout(format!(
                "click on '{}' exceeded {}ms",
                link.name, cli.click_timeout_ms
            ))
        })??;

    let filled = best_effort(
        "input probe",
        page.fill_first_input(&cli.probe_text)
            .await
            .map_err(|e| e.to_string()),
    );
    if filled {
        send_status(tx, "filled first visible input");
    }

    let buttons = best_effort(
        "button probe",
        page.visible_button_count()
            .await
            .map_err(|e| e.to_string()),
    );
    if buttons > 0 {
        send_status(tx, format!("observed {buttons} visible buttons"));
    }

    Ok(())
}

async fn capture_failure_screenshot(
    page: &TargetPage,
    link: &LinkDescriptor,
    dir: &str,
    tx: &UnboundedSender<CrawlEvent>,
) {
    let path = screenshot_path(dir, &link.name);
    let outcome: Result<bool, String> = async {
        let png = page.screenshot_png().await.map_err(|e| e.to_string())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        fs::write(&path, png).map_err(|e| e.to_string())?;
        Ok(true)
    }
    .await;
    if best_effort("screenshot", outcome) {
        send_status(tx, format!("screenshot saved: {}", path.display()));
    }
}

/// The recovery leg of every iteration: step back if the click moved us off
/// the target page, and reopen the target outright when stepping back does
/// not get us home. Never attributed to the link's recorded outcome.
async fn restore_target(page: &TargetPage, tx: &UnboundedSender<CrawlEvent>) {
    let current = match page.current_url().await {
        Ok(current) => current,
        Err(err) => {
            send_status(tx, format!("current url check failed: {err}"));
            String::new()
        }
    };
    if same_page(&current, page.target()) {
        return;
    }

    match page.back().await {
        Ok(()) => {
            if let Ok(now) = page.current_url().await
                && same_page(&now, page.target())
            {
                return;
            }
        }
        Err(err) => send_status(tx, format!("navigate back failed: {err}")),
    }
    if let Err(err) = page.open().await {
        send_status(tx, format!("target reopen failed: {err}"));
    }
}

#[cfg(test)]
mod crawl_tests {
    use super::*;
    use std::collections::HashMap;

    const TARGET: &str = "https://the-internet.herokuapp.com/challenging_dom";

    fn link(name: &str, url: &str) -> LinkDescriptor {
        LinkDescriptor {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    fn test_cli(screenshot_dir: &str) -> Cli {
        let mut cli = Cli::parse_from(["domprobe"]);
        cli.screenshot_dir = screenshot_dir.to_string();
        cli
    }

    async fn drive(stub: StubSession, cli: &Cli) -> (TargetPage, Vec<CrawlEvent>) {
        let page = TargetPage::new(BrowserSession::Stub(stub), TARGET.to_string());
        let (tx, mut rx) = mpsc::unbounded_channel::<CrawlEvent>();
        crawl_pass(&page, cli, &tx).await;
        drop(tx);
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (page, events)
    }

    fn results_of(events: &[CrawlEvent]) -> Vec<&TestResult> {
        events
            .iter()
            .filter_map(|event| match event {
                CrawlEvent::Link(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    fn total_of(events: &[CrawlEvent]) -> Option<f64> {
        events.iter().find_map(|event| match event {
            CrawlEvent::TotalDuration(ms) => Some(*ms),
            _ => None,
        })
    }

    #[tokio::test]
    async fn every_link_yields_exactly_one_result_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let cli = test_cli(&dir.path().to_string_lossy());
        let stub = StubSession {
            links: vec![link("A", "/a"), link("B", "/b"), link("C", "/c")],
            ..StubSession::default()
        };

        let (_page, events) = drive(stub, &cli).await;
        let results = results_of(&events);
        assert_eq!(results.len(), 3);
        let names = results.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["A", "B", "C"]);
        assert!(results.iter().all(|r| r.status == LinkStatus::Passed));
        assert!(results.iter().all(|r| r.duration >= 0.0));

        let total = total_of(&events).unwrap();
        for result in &results {
            assert!(total >= result.duration);
        }
    }

    #[tokio::test]
    async fn a_failing_click_is_recorded_and_the_walk_continues() {
        let dir = tempfile::tempdir().unwrap();
        let cli = test_cli(&dir.path().to_string_lossy());
        let mut fail_click = HashMap::new();
        fail_click.insert(
            "/b".to_string(),
            DriverError::InteractionTimeout("click on 'B' exceeded 5000ms".to_string()),
        );
        let stub = StubSession {
            links: vec![link("A", "/a"), link("B", "/b")],
            fail_click,
            screenshot: Some(vec![0x89, b'P', b'N', b'G']),
            ..StubSession::default()
        };

        let (_page, events) = drive(stub, &cli).await;
        let results = results_of(&events);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, LinkStatus::Passed);
        assert!(results[0].error.is_none());
        assert_eq!(results[1].status, LinkStatus::Failed);
        let error = results[1].error.as_deref().unwrap();
        assert!(!error.is_empty());
        assert!(error.contains("interaction timeout"));

        // Screenshot artifact for the failed link only.
        assert!(dir.path().join("error_B.png").exists());
        assert!(!dir.path().join("error_A.png").exists());
    }

    #[tokio::test]
    async fn element_not_found_is_a_failed_result_not_an_abort() {
        let dir = tempfile::tempdir().unwrap();
        let cli = test_cli(&dir.path().to_string_lossy());
        let mut fail_click = HashMap::new();
        fail_click.insert(
            "/a".to_string(),
            DriverError::ElementNotFound("no visible anchor with href '/a'".to_string()),
        );
        let stub = StubSession {
            links: vec![link("A", "/a"), link("B", "/b")],
            fail_click,
            ..StubSession::default()
        };

        let (_page, events) = drive(stub, &cli).await;
        let results = results_of(&events);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, LinkStatus::Failed);
        assert!(results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("element not found"));
        assert_eq!(results[1].status, LinkStatus::Passed);
    }

    #[tokio::test]
    async fn leaving_the_target_is_recovered_by_going_back() {
        let dir = tempfile::tempdir().unwrap();
        let cli = test_cli(&dir.path().to_string_lossy());
        let stub = StubSession {
            links: vec![link("A", "/a")],
            click_moves_to: Some("https://the-internet.herokuapp.com/other".to_string()),
            ..StubSession::default()
        };

        let (page, events) = drive(stub, &cli).await;
        let results = results_of(&events);
        assert_eq!(results[0].status, LinkStatus::Passed);
        if let BrowserSession::Stub(stub) = &page.session {
            let history = stub.history();
            assert!(history.contains(&"back".to_string()));
            // A successful back is enough; no second open of the target.
            assert_eq!(
                history.iter().filter(|e| *e == &format!("open:{TARGET}")).count(),
                1
            );
        } else {
            unreachable!("stub session expected");
        }
    }

    #[tokio::test]
    async fn a_failing_back_falls_back_to_reopening_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let cli = test_cli(&dir.path().to_string_lossy());
        let stub = StubSession {
            links: vec![link("A", "/a")],
            click_moves_to: Some("https://the-internet.herokuapp.com/other".to_string()),
            back_fails: true,
            ..StubSession::default()
        };

        let (page, events) = drive(stub, &cli).await;
        assert_eq!(results_of(&events)[0].status, LinkStatus::Passed);
        if let BrowserSession::Stub(stub) = &page.session {
            let history = stub.history();
            assert_eq!(
                history.iter().filter(|e| *e == &format!("open:{TARGET}")).count(),
                2
            );
        } else {
            unreachable!("stub session expected");
        }
    }

    #[tokio::test]
    async fn screenshot_failure_never_escalates() {
        let dir = tempfile::tempdir().unwrap();
        let cli = test_cli(&dir.path().to_string_lossy());
        let mut fail_click = HashMap::new();
        fail_click.insert(
            "/a".to_string(),
            DriverError::Protocol("click rejected".to_string()),
        );
        let stub = StubSession {
            links: vec![link("A", "/a"), link("B", "/b")],
            fail_click,
            screenshot: None,
            ..StubSession::default()
        };

        let (_page, events) = drive(stub, &cli).await;
        let results = results_of(&events);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].status, LinkStatus::Passed);
        assert!(!dir.path().join("error_A.png").exists());
    }

    #[tokio::test]
    async fn fatal_open_failure_produces_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let cli = test_cli(&dir.path().to_string_lossy());
        let stub = StubSession {
            links: vec![link("A", "/a")],
            open_fails: true,
            ..StubSession::default()
        };

        let (_page, events) = drive(stub, &cli).await;
        assert!(results_of(&events).is_empty());
        assert!(total_of(&events).is_none());
        assert!(events.iter().any(|event| matches!(
            event,
            CrawlEvent::Fatal(message) if message.contains("navigation error")
        )));
    }
}
