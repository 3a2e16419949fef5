const LINK_ENUM_EXPR: &str = "Array.from(document.querySelectorAll('a[href]'))\
    .filter(el => el.getClientRects().length > 0)\
    .map(el => ({ name: (el.textContent || '').trim(), url: el.getAttribute('href') || '' }))\
    .filter(entry => entry.name && entry.url)";

#[derive(Debug, Clone)]
enum DriverError {
    Session(String),
    Navigation(String),
    ElementNotFound(String),
    InteractionTimeout(String),
    Protocol(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Session(msg) => write!(f, "session error: {msg}"),
            DriverError::Navigation(msg) => write!(f, "navigation error: {msg}"),
            DriverError::ElementNotFound(msg) => write!(f, "element not found: {msg}"),
            DriverError::InteractionTimeout(msg) => write!(f, "interaction timeout: {msg}"),
            DriverError::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

/// One live browser, reached either through a WebDriver server or through a
/// locally launched Chrome over CDP. Every page operation the crawl needs
/// goes through here, so the two backends stay interchangeable.
enum BrowserSession {
    WebDriver(WebDriverSession),
    Cdp(CdpSession),
    #[cfg(test)]
    Stub(StubSession),
}

impl BrowserSession {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        match self {
            BrowserSession::WebDriver(session) => session.navigate(url).await,
            BrowserSession::Cdp(session) => session.navigate(url).await,
            #[cfg(test)]
            BrowserSession::Stub(session) => session.navigate(url),
        }
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        match self {
            BrowserSession::WebDriver(session) => session.current_url().await,
            BrowserSession::Cdp(session) => session.current_url().await,
            #[cfg(test)]
            BrowserSession::Stub(session) => session.current_url(),
        }
    }

    async fn back(&self) -> Result<(), DriverError> {
        match self {
            BrowserSession::WebDriver(session) => session.back().await,
            BrowserSession::Cdp(session) => session.back().await,
            #[cfg(test)]
            BrowserSession::Stub(session) => session.back(),
        }
    }

    async fn enumerate_links(&self) -> Result<Vec<LinkDescriptor>, DriverError> {
        match self {
            BrowserSession::WebDriver(session) => session.enumerate_links().await,
            BrowserSession::Cdp(session) => session.enumerate_links().await,
            #[cfg(test)]
            BrowserSession::Stub(session) => session.enumerate_links(),
        }
    }

    async fn click_link(&self, link: &LinkDescriptor) -> Result<(), DriverError> {
        match self {
            BrowserSession::WebDriver(session) => session.click_link(link).await,
            BrowserSession::Cdp(session) => session.click_link(link).await,
            #[cfg(test)]
            BrowserSession::Stub(session) => session.click_link(link),
        }
    }

    async fn fill_first_input(&self, text: &str) -> Result<bool, DriverError> {
        match self {
            BrowserSession::WebDriver(session) => session.fill_first_input(text).await,
            BrowserSession::Cdp(session) => session.fill_first_input(text).await,
            #[cfg(test)]
            BrowserSession::Stub(session) => session.fill_first_input(text),
        }
    }

    async fn visible_button_count(&self) -> Result<usize, DriverError> {
        match self {
            BrowserSession::WebDriver(session) => session.visible_button_count().await,
            BrowserSession::Cdp(session) => session.visible_button_count().await,
            #[cfg(test)]
            BrowserSession::Stub(session) => session.visible_button_count(),
        }
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
        match self {
            BrowserSession::WebDriver(session) => session.screenshot_png().await,
            BrowserSession::Cdp(session) => session.screenshot_png().await,
            #[cfg(test)]
            BrowserSession::Stub(session) => session.screenshot_png(),
        }
    }

    async fn close(self) {
        match self {
            BrowserSession::WebDriver(session) => session.close().await,
            BrowserSession::Cdp(session) => session.close().await,
            #[cfg(test)]
            BrowserSession::Stub(_) => {}
        }
    }
}

/// Scripted in-memory session for exercising the crawl loop without a
/// browser. Mutexes keep the session usable through shared references the
/// same way the real backends are.
#[cfg(test)]
#[derive(Default)]
struct StubSession {
    links: Vec<LinkDescriptor>,
    fail_click: std::collections::HashMap<String, DriverError>,
    click_moves_to: Option<String>,
    open_fails: bool,
    back_fails: bool,
    has_input: bool,
    button_count: usize,
    screenshot: Option<Vec<u8>>,
    home: std::sync::Mutex<Option<String>>,
    current: std::sync::Mutex<String>,
    nav_log: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl StubSession {
    fn navigate(&self, url: &str) -> Result<(), DriverError> {
        if self.open_fails {
            return Err(DriverError::Navigation(format!("goto '{url}' failed: refused")));
        }
        let mut home = self.home.lock().unwrap();
        if home.is_none() {
            *home = Some(url.to_string());
        }
        *self.current.lock().unwrap() = url.to_string();
        self.nav_log.lock().unwrap().push(format!("open:{url}"));
        Ok(())
    }

    fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.current.lock().unwrap().clone())
    }

    fn back(&self) -> Result<(), DriverError> {
        self.nav_log.lock().unwrap().push("back".to_string());
        if self.back_fails {
            return Err(DriverError::Protocol("history traversal rejected".to_string()));
        }
        if let Some(home) = self.home.lock().unwrap().clone() {
            *self.current.lock().unwrap() = home;
        }
        Ok(())
    }

    fn enumerate_links(&self) -> Result<Vec<LinkDescriptor>, DriverError> {
        Ok(self.links.clone())
    }

    fn click_link(&self, link: &LinkDescriptor) -> Result<(), DriverError> {
        self.nav_log
            .lock()
            .unwrap()
            .push(format!("click:{}", link.url));
        if let Some(err) = self.fail_click.get(&link.url) {
            return Err(err.clone());
        }
        if let Some(to) = &self.click_moves_to {
            *self.current.lock().unwrap() = to.clone();
        }
        Ok(())
    }

    fn fill_first_input(&self, _text: &str) -> Result<bool, DriverError> {
        Ok(self.has_input)
    }

    fn visible_button_count(&self) -> Result<usize, DriverError> {
        Ok(self.button_count)
    }

    fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
        self.screenshot
            .clone()
            .ok_or_else(|| DriverError::Protocol("screenshot unavailable".to_string()))
    }

    fn history(&self) -> Vec<String> {
        self.nav_log.lock().unwrap().clone()
    }
}
