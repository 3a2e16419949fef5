const WEBDRIVER_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// W3C WebDriver session against a running driver server (chromedriver,
/// geckodriver, selenium). Commands are plain HTTP + JSON; helpers return
/// `Result<_, String>` and the public surface maps into the error taxonomy.
struct WebDriverSession {
    client: reqwest::Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverSession {
    async fn connect(
        endpoint: &str,
        browser: BrowserArg,
        headless: bool,
    ) -> Result<Self, DriverError> {
        if !webdriver_reachable(endpoint) {
            return Err(DriverError::Session(format!(
                "webdriver endpoint {endpoint} is not reachable"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(40))
            .build()
            .map_err(|e| DriverError::Session(format!("webdriver client build failed: {e}")))?;
        let session_id = webdriver_create_session(&client, endpoint, browser, headless)
            .await
            .map_err(DriverError::Session)?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            session_id,
        })
    }

    async fn command(
        &self,
        label: &str,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, String> {
        let command_endpoint = format!("{}/session/{}/{}", self.endpoint, self.session_id, path);
        let mut request = self.client.request(method, command_endpoint);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let res = request
            .send()
            .await
            .map_err(|e| format!("{label} request failed: {e}"))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| format!("{label} response read failed: {e}"))?;
        let value: Value = serde_json::from_str(&body).unwrap_or_default();
        if let Some(err) = value.pointer("/value/error").and_then(|v| v.as_str()) {
            let message = value
                .pointer("/value/message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown webdriver error");
            return Err(format!("{err}: {message}"));
        }
        if !status.is_success() {
            return Err(format!(
                "{label} HTTP {}: {}",
                status.as_u16(),
                truncate_for_log(&body, 240)
            ));
        }
        Ok(value)
    }

    async fn execute_sync(&self, label: &str, script: String) -> Result<Value, String> {
        self.command(
            label,
            reqwest::Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
        .await
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.command(
            "navigate",
            reqwest::Method::POST,
            "url",
            Some(json!({ "url": url })),
        )
        .await
        .map(|_| ())
        .map_err(DriverError::Navigation)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let value = self
            .command("current url", reqwest::Method::GET, "url", None)
            .await
            .map_err(DriverError::Protocol)?;
        Ok(value
            .pointer("/value")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    async fn back(&self) -> Result<(), DriverError> {
        self.command("back", reqwest::Method::POST, "back", Some(json!({})))
            .await
            .map(|_| ())
            .map_err(DriverError::Protocol)
    }

    async fn enumerate_links(&self) -> Result<Vec<LinkDescriptor>, DriverError> {
        let value = self
            .execute_sync("enumerate links", format!("return {LINK_ENUM_EXPR};"))
            .await
            .map_err(DriverError::Protocol)?;
        Ok(parse_link_entries(value.pointer("/value").unwrap_or(&Value::Null)))
    }

    async fn find_elements(&self, using: &str, selector: &str) -> Result<Vec<String>, String> {
        let value = self
            .command(
                "find elements",
                reqwest::Method::POST,
                "elements",
                Some(json!({ "using": using, "value": selector })),
            )
            .await?;
        Ok(value
            .pointer("/value")
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        entry
                            .get(WEBDRIVER_ELEMENT_KEY)
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string())
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default())
    }

    async fn element_displayed(&self, element_id: &str) -> bool {
        self.command(
            "element displayed",
            reqwest::Method::GET,
            &format!("element/{element_id}/displayed"),
            None,
        )
        .await
        .ok()
        .and_then(|value| value.pointer("/value").and_then(|v| v.as_bool()))
        .unwrap_or(false)
    }

    async fn element_click(&self, element_id: &str) -> Result<(), String> {
        self.command(
            "element click",
            reqwest::Method::POST,
            &format!("element/{element_id}/click"),
            Some(json!({})),
        )
        .await
        .map(|_| ())
    }

    async fn element_send_keys(&self, element_id: &str, text: &str) -> Result<(), String> {
        self.command(
            "element send keys",
            reqwest::Method::POST,
            &format!("element/{element_id}/value"),
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    async fn click_link(&self, link: &LinkDescriptor) -> Result<(), DriverError> {
        let selector = format!("a[href=\"{}\"]", link.url.replace('"', "\\\""));
        let by_href = self
            .find_elements("css selector", &selector)
            .await
            .unwrap_or_default();
        for element_id in &by_href {
            if self.element_displayed(element_id).await {
                return self
                    .element_click(element_id)
                    .await
                    .map_err(DriverError::Protocol);
            }
        }
        // href lookup came up empty or stale; fall back to exact link text.
        let by_text = self
            .find_elements("link text", &link.name)
            .await
            .unwrap_or_default();
        match by_text.first() {
            Some(element_id) => self
                .element_click(element_id)
                .await
                .map_err(DriverError::Protocol),
            None => Err(DriverError::ElementNotFound(format!(
                "no visible anchor with href '{}' or text '{}'",
                link.url, link.name
            ))),
        }
    }

    async fn fill_first_input(&self, text: &str) -> Result<bool, DriverError> {
        let inputs = self
            .find_elements("css selector", "input")
            .await
            .map_err(DriverError::Protocol)?;
        for element_id in &inputs {
            if self.element_displayed(element_id).await {
                self.element_send_keys(element_id, text)
                    .await
                    .map_err(DriverError::Protocol)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn visible_button_count(&self) -> Result<usize, DriverError> {
        let buttons = self
            .find_elements("css selector", "button")
            .await
            .map_err(DriverError::Protocol)?;
        let mut visible = 0;
        for element_id in &buttons {
            if self.element_displayed(element_id).await {
                visible += 1;
            }
        }
        Ok(visible)
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
        let value = self
            .command("screenshot", reqwest::Method::GET, "screenshot", None)
            .await
            .map_err(DriverError::Protocol)?;
        let encoded = value
            .pointer("/value")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DriverError::Protocol("screenshot payload missing".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| DriverError::Protocol(format!("screenshot decode failed: {e}")))
    }

    async fn close(self) {
        let delete_endpoint = format!("{}/session/{}", self.endpoint, self.session_id);
        let _ = self.client.delete(delete_endpoint).send().await;
    }
}

async fn webdriver_create_session(
    client: &reqwest::Client,
    endpoint: &str,
    browser: BrowserArg,
    headless: bool,
) -> Result<String, String> {
    let base = endpoint.trim_end_matches('/');
    let session_endpoint = format!("{base}/session");
    let caps = webdriver_capabilities(browser, headless);
    let res = client
        .post(&session_endpoint)
        .json(&caps)
        .send()
        .await
        .map_err(|e| format!("session create request failed: {e}"))?;
    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| format!("session create response read failed: {e}"))?;
    if !status.is_success() {
        return Err(format!(
            "session create HTTP {}: {}",
            status.as_u16(),
            truncate_for_log(&body, 260)
        ));
    }
    let value: Value =
        serde_json::from_str(&body).map_err(|e| format!("session create parse failed: {e}"))?;
    if let Some(err) = value.pointer("/value/error").and_then(|v| v.as_str()) {
        let message = value
            .pointer("/value/message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown webdriver error");
        return Err(format!("{err}: {message}"));
    }
    value
        .pointer("/value/sessionId")
        .and_then(|v| v.as_str())
        .or_else(|| value.pointer("/sessionId").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .ok_or_else(|| {
            format!(
                "session id missing in response: {}",
                truncate_for_log(&body, 220)
            )
        })
}

fn webdriver_capabilities(browser: BrowserArg, headless: bool) -> Value {
    match browser {
        BrowserArg::Firefox => {
            let mut args = Vec::<String>::new();
            if headless {
                args.push("-headless".to_string());
            }
            json!({
                "capabilities": {
                    "alwaysMatch": {
                        "browserName": "firefox",
                        "acceptInsecureCerts": true,
                        "moz:firefoxOptions": { "args": args }
                    }
                }
            })
        }
        BrowserArg::Edge => {
            let mut args = Vec::<String>::new();
            if headless {
                args.push("--headless=new".to_string());
            }
            json!({
                "capabilities": {
                    "alwaysMatch": {
                        "browserName": "MicrosoftEdge",
                        "acceptInsecureCerts": true,
                        "ms:edgeOptions": { "args": args }
                    }
                }
            })
        }
        BrowserArg::Safari => json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "safari",
                    "acceptInsecureCerts": true
                }
            }
        }),
        BrowserArg::Chrome => {
            let mut args = Vec::<String>::new();
            let profile_dir = std::env::temp_dir().join(format!(
                "domprobe-chrome-profile-{}-{}",
                std::process::id(),
                Utc::now().timestamp_millis()
            ));
            let _ = fs::create_dir_all(&profile_dir);
            args.push(format!("--user-data-dir={}", profile_dir.display()));
            if headless {
                args.push("--headless=new".to_string());
            }
            args.push("--window-size=1280,1024".to_string());
            args.push("--disable-gpu".to_string());
            args.push("--disable-dev-shm-usage".to_string());
            args.push("--no-first-run".to_string());
            args.push("--no-default-browser-check".to_string());
            if !cfg!(target_os = "macos") {
                args.push("--no-sandbox".to_string());
            }
            json!({
                "capabilities": {
                    "alwaysMatch": {
                        "browserName": "chrome",
                        "acceptInsecureCerts": true,
                        "goog:chromeOptions": { "args": args }
                    }
                }
            })
        }
    }
}

fn webdriver_reachable(endpoint: &str) -> bool {
    let parsed = match Url::parse(endpoint) {
        Ok(u) => u,
        Err(_) => return false,
    };
    let host = match parsed.host_str() {
        Some(h) => h,
        None => return false,
    };
    let port = parsed.port_or_known_default().unwrap_or(4444);
    let Ok(addrs) = (host, port).to_socket_addrs() else {
        return false;
    };
    addrs
        .into_iter()
        .any(|addr| TcpStream::connect_timeout(&addr, Duration::from_secs(2)).is_ok())
}

#[cfg(test)]
mod webdriver_payload_tests {
    use super::*;

    #[test]
    fn chrome_capabilities_carry_headless_switch() {
        let caps = webdriver_capabilities(BrowserArg::Chrome, true);
        let args = caps
            .pointer("/capabilities/alwaysMatch/goog:chromeOptions/args")
            .and_then(|v| v.as_array())
            .unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));

        let caps = webdriver_capabilities(BrowserArg::Chrome, false);
        let args = caps
            .pointer("/capabilities/alwaysMatch/goog:chromeOptions/args")
            .and_then(|v| v.as_array())
            .unwrap();
        assert!(!args.iter().any(|a| a == "--headless=new"));
    }

    #[test]
    fn firefox_capabilities_name_the_browser() {
        let caps = webdriver_capabilities(BrowserArg::Firefox, true);
        assert_eq!(
            caps.pointer("/capabilities/alwaysMatch/browserName"),
            Some(&json!("firefox"))
        );
    }

    #[test]
    fn unreachable_endpoints_are_rejected_up_front() {
        assert!(!webdriver_reachable("not a url"));
        assert!(!webdriver_reachable("http://"));
    }
}
