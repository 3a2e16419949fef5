pub async fn run() -> io::Result<()> {
    let cli = Cli::parse();
    let (tx, mut rx) = mpsc::unbounded_channel::<CrawlEvent>();
    let crawl_handle = tokio::spawn(run_crawler(cli.clone(), tx));

    let mut sink = ResultSink::default();
    let fatal = consume_events(&mut rx, &mut sink).await;

    if let Err(e) = crawl_handle.await {
        eprintln!("crawler task join error: {e}");
    }

    // Startup failures terminate without partial reports; per-link failures
    // are report content, not a process outcome.
    if let Some(message) = fatal {
        return Err(io::Error::other(message));
    }

    sink.print_summary();
    if !cli.no_chart {
        sink.print_ascii_chart();
    }

    if best_effort(
        "json report",
        sink.write_report(&cli.json_report)
            .map(|_| true)
            .map_err(|e| e.to_string()),
    ) {
        eprintln!("json report saved to {}", cli.json_report);
    }
    if best_effort(
        "html report",
        sink.write_html_report(&cli.html_report)
            .map(|_| true)
            .map_err(|e| e.to_string()),
    ) {
        eprintln!("html report saved to {}", cli.html_report);
    }
    if let Some(csv_path) = &cli.csv_report {
        if best_effort(
            "csv report",
            sink.write_csv_report(csv_path)
                .map(|_| true)
                .map_err(|e| e.to_string()),
        ) {
            eprintln!("csv report saved to {csv_path}");
        }
    }

    Ok(())
}

/// Drains crawler events into the sink until the crawler reports finished.
/// Returns the fatal-startup message, if one arrived.
async fn consume_events(
    rx: &mut UnboundedReceiver<CrawlEvent>,
    sink: &mut ResultSink,
) -> Option<String> {
    let mut fatal = None;
    while let Some(event) = rx.recv().await {
        match event {
            CrawlEvent::Status(message) => eprintln!("{message}"),
            CrawlEvent::Error(err) => eprintln!("{err}"),
            CrawlEvent::Link(result) => sink.log_result(result),
            CrawlEvent::TotalDuration(ms) => sink.set_total_duration(ms),
            CrawlEvent::Fatal(message) => fatal = Some(message),
            CrawlEvent::Finished => break,
        }
    }
    fatal
}

#[cfg(test)]
mod runtime_tests {
    use super::*;

    #[tokio::test]
    async fn events_accumulate_until_finished() {
        let (tx, mut rx) = mpsc::unbounded_channel::<CrawlEvent>();
        let _ = tx.send(CrawlEvent::Status("opened target".to_string()));
        let _ = tx.send(CrawlEvent::Link(TestResult {
            name: "Edit".to_string(),
            url: "#edit".to_string(),
            status: LinkStatus::Passed,
            duration: 12.0,
            error: None,
        }));
        let _ = tx.send(CrawlEvent::TotalDuration(40.0));
        let _ = tx.send(CrawlEvent::Finished);

        let mut sink = ResultSink::default();
        let fatal = consume_events(&mut rx, &mut sink).await;
        assert!(fatal.is_none());
        let report = sink.report();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.total_duration, 40.0);
    }

    #[tokio::test]
    async fn fatal_messages_survive_to_the_caller() {
        let (tx, mut rx) = mpsc::unbounded_channel::<CrawlEvent>();
        let _ = tx.send(CrawlEvent::Fatal("session error: no browser".to_string()));
        let _ = tx.send(CrawlEvent::Finished);

        let mut sink = ResultSink::default();
        let fatal = consume_events(&mut rx, &mut sink).await;
        assert_eq!(fatal.as_deref(), Some("session error: no browser"));
        assert!(sink.report().results.is_empty());
    }
}
