const CHART_MAX_WIDTH: usize = 50;

const CSV_RESULT_HEADERS: [&str; 5] = ["name", "url", "status", "duration_ms", "error"];

/// Collects per-link outcomes in processing order and renders every report
/// surface from that single sequence. The runtime loop is the only writer.
#[derive(Debug, Default)]
struct ResultSink {
    results: Vec<TestResult>,
    total_duration_ms: f64,
}

impl ResultSink {
    fn log_result(&mut self, result: TestResult) {
        self.results.push(result);
    }

    fn set_total_duration(&mut self, ms: f64) {
        self.total_duration_ms = ms;
    }

    fn report(&self) -> SuiteReport {
        SuiteReport {
            total_duration: self.total_duration_ms,
            results: self.results.clone(),
        }
    }

    fn summary_table(&self, color: bool) -> String {
        let name_width = self
            .results
            .iter()
            .map(|r| r.name.chars().count())
            .max()
            .unwrap_or(0)
            .clamp(4, 32);

        let mut out = String::from("--- crawl summary ---\n");
        out.push_str(&format!(
            "{:<name_width$}  {:<7}  {:>13}  {}\n",
            "Name", "Status", "Duration (ms)", "Error"
        ));
        for result in &self.results {
            let status_cell = format!("{:<7}", result.status.label());
            let status_cell = if color {
                match result.status {
                    LinkStatus::Passed => status_cell.green().to_string(),
                    LinkStatus::Failed => status_cell.red().to_string(),
                }
            } else {
                status_cell
            };
            out.push_str(&format!(
                "{:<name_width$}  {}  {:>13.2}  {}\n",
                result.name,
                status_cell,
                result.duration,
                result.error.as_deref().unwrap_or("-")
            ));
        }
        out.push_str(&format!("total duration: {:.2} ms", self.total_duration_ms));
        out
    }

    fn print_summary(&self) {
        println!("\n{}", self.summary_table(true));
    }

    fn ascii_chart(&self) -> String {
        let mut out = String::from("--- duration chart ---");
        if self.results.is_empty() {
            return out;
        }
        let max_duration = self
            .results
            .iter()
            .map(|r| r.duration)
            .fold(0.0_f64, f64::max);
        for result in &self.results {
            let bar = "█".repeat(bar_width(result.duration, max_duration));
            out.push_str(&format!(
                "\n{:<20} | {} ({:.2} ms)",
                result.name, bar, result.duration
            ));
        }
        out
    }

    fn print_ascii_chart(&self) {
        println!("\n{}", self.ascii_chart());
    }

    fn render_json(&self) -> String {
        let mut body = serde_json::to_string_pretty(&self.report())
            .unwrap_or_else(|_| String::from("{}"));
        body.push('\n');
        body
    }

    fn write_report(&self, path: &str) -> io::Result<()> {
        ensure_parent_dir(path)?;
        fs::write(path, self.render_json())
    }

    fn write_html_report(&self, path: &str) -> io::Result<()> {
        ensure_parent_dir(path)?;
        fs::write(path, self.render_html())
    }

    fn write_csv_report(&self, path: &str) -> io::Result<()> {
        ensure_parent_dir(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(CSV_RESULT_HEADERS)?;
        for result in &self.results {
            writer.write_record([
                result.name.clone(),
                result.url.clone(),
                result.status.label().to_string(),
                format!("{:.2}", result.duration),
                result.error.clone().unwrap_or_default(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    fn render_html(&self) -> String {
        let mut rows = String::new();
        for result in &self.results {
            rows.push_str(&format!(
                "      <tr>\n        <td>{name}</td>\n        <td><a href=\"{url}\" target=\"_blank\">{url}</a></td>\n        <td class=\"{class}\">{status}</td>\n        <td>{duration:.2}</td>\n        <td>{error}</td>\n      </tr>\n",
                name = html_escape(&result.name),
                url = html_escape(&result.url),
                class = result.status.label(),
                status = result.status.label().to_uppercase(),
                duration = result.duration,
                error = html_escape(result.error.as_deref().unwrap_or("-")),
            ));
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Crawl Report</title>
  <style>
    body {{ font-family: Arial, sans-serif; margin: 20px; background-color: #f4f4f9; }}
    h1 {{ color: #333; }}
    .summary {{ background: #fff; padding: 15px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); margin-bottom: 20px; }}
    table {{ width: 100%; border-collapse: collapse; background: #fff; box-shadow: 0 2px 4px rgba(0,0,0,0.1); border-radius: 8px; overflow: hidden; }}
    th, td {{ padding: 12px; text-align: left; border-bottom: 1px solid #ddd; }}
    th {{ background-color: #36454f; color: white; }}
    tr:hover {{ background-color: #f1f1f1; }}
    .passed {{ color: green; font-weight: bold; }}
    .failed {{ color: red; font-weight: bold; }}
  </style>
</head>
<body>
  <h1>Crawl Report</h1>
  <div class="summary">
    <h2>Summary</h2>
    <p><strong>Total Duration:</strong> {total:.2} ms</p>
    <p><strong>Links Processed:</strong> {count}</p>
    <p><strong>Generated:</strong> {generated}</p>
  </div>

  <h2>Results</h2>
  <table>
    <thead>
      <tr>
        <th>Name</th>
        <th>URL</th>
        <th>Status</th>
        <th>Duration (ms)</th>
        <th>Error</th>
      </tr>
    </thead>
    <tbody>
{rows}    </tbody>
  </table>
</body>
</html>
"#,
            total = self.total_duration_ms,
            count = self.results.len(),
            generated = Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            rows = rows,
        )
    }
}

fn bar_width(duration_ms: f64, max_duration_ms: f64) -> usize {
    let denominator = if max_duration_ms > 0.0 {
        max_duration_ms
    } else {
        1.0
    };
    ((duration_ms * CHART_MAX_WIDTH as f64) / denominator).floor() as usize
}

fn ensure_parent_dir(path: &str) -> io::Result<()> {
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
