/// Chrome launched and driven directly over the DevTools protocol. No
/// external driver server; the browser lives and dies with the session.
struct CdpSession {
    browser: Browser,
    page: Page,
}

impl CdpSession {
    async fn launch(headless: bool) -> Result<Self, DriverError> {
        let profile_dir = std::env::temp_dir().join(format!(
            "domprobe-cdp-session-{}-{}",
            std::process::id(),
            Utc::now().timestamp_millis()
        ));
        let mut builder = BrowserConfig::builder()
            .window_size(1280, 1024)
            .user_data_dir(&profile_dir)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-dev-shm-usage");
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| DriverError::Session(format!("browser config build failed: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Session(format!("browser launch failed: {e}")))?;
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    let rendered = format!("{err:?}");
                    // CDP event variants we never asked for show up as
                    // deserialization noise; only surface real errors.
                    if !rendered.contains("data did not match any variant") {
                        eprintln!("cdp handler error: {err}");
                    }
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Session(format!("page create failed: {e}")))?;
        Ok(Self { browser, page })
    }

    async fn evaluate(&self, label: &str, expression: String) -> Result<Value, String> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| format!("{label} evaluate failed: {e}"))?;
        result
            .into_value::<Value>()
            .map_err(|e| format!("{label} result decode failed: {e}"))
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(format!("goto '{url}' failed: {e}")))?;
        // Late render work settles out of band; a missed deadline here is
        // not a load failure.
        let _ = tokio::time::timeout(Duration::from_secs(5), self.page.wait_for_navigation()).await;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.page
            .url()
            .await
            .map_err(|e| DriverError::Protocol(format!("current url failed: {e}")))
            .map(|url| url.unwrap_or_default())
    }

    async fn back(&self) -> Result<(), DriverError> {
        self.evaluate(
            "history back",
            "() => { window.history.back(); return true; }".to_string(),
        )
        .await
        .map_err(DriverError::Protocol)?;
        let _ = tokio::time::timeout(Duration::from_secs(5), self.page.wait_for_navigation()).await;
        Ok(())
    }

    async fn enumerate_links(&self) -> Result<Vec<LinkDescriptor>, DriverError> {
        let value = self
            .evaluate(
                "enumerate links",
                format!("() => {{ return {LINK_ENUM_EXPR}; }}"),
            )
            .await
            .map_err(DriverError::Protocol)?;
        Ok(parse_link_entries(&value))
    }

    async fn click_link(&self, link: &LinkDescriptor) -> Result<(), DriverError> {
        let url_literal = Value::String(link.url.clone()).to_string();
        let name_literal = Value::String(link.name.clone()).to_string();
        let script = format!(
            "() => {{\
                const visible = el => el.getClientRects().length > 0;\
                const anchors = Array.from(document.querySelectorAll('a[href]'));\
                let target = anchors.find(el => el.getAttribute('href') === {url_literal} && visible(el));\
                if (!target) {{\
                    target = anchors.find(el => (el.textContent || '').trim() === {name_literal} && visible(el));\
                }}\
                if (!target) {{ return false; }}\
                target.click();\
                return true;\
            }}"
        );
        let clicked = self
            .evaluate("click link", script)
            .await
            .map_err(DriverError::Protocol)?;
        if !clicked.as_bool().unwrap_or(false) {
            return Err(DriverError::ElementNotFound(format!(
                "no visible anchor with href '{}' or text '{}'",
                link.url, link.name
            )));
        }
        // Give a click that triggers navigation a moment to land.
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn fill_first_input(&self, text: &str) -> Result<bool, DriverError> {
        let text_literal = Value::String(text.to_string()).to_string();
        let script = format!(
            "() => {{\
                const visible = el => el.getClientRects().length > 0;\
                const input = Array.from(document.querySelectorAll('input')).find(visible);\
                if (!input) {{ return false; }}\
                input.focus();\
                input.value = {text_literal};\
                input.dispatchEvent(new Event('input', {{ bubbles: true }}));\
                input.dispatchEvent(new Event('change', {{ bubbles: true }}));\
                return true;\
            }}"
        );
        let filled = self
            .evaluate("input probe", script)
            .await
            .map_err(DriverError::Protocol)?;
        Ok(filled.as_bool().unwrap_or(false))
    }

    async fn visible_button_count(&self) -> Result<usize, DriverError> {
        let value = self
            .evaluate(
                "button probe",
                "() => Array.from(document.querySelectorAll('button'))\
                    .filter(el => el.getClientRects().length > 0).length"
                    .to_string(),
            )
            .await
            .map_err(DriverError::Protocol)?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| DriverError::Protocol(format!("screenshot failed: {e}")))
    }

    async fn close(mut self) {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
    }
}
