/// Page object for the crawl target. Owns the browser session for one pass
/// and funnels every page operation through it; the caller decides when the
/// session is released.
struct TargetPage {
    session: BrowserSession,
    target_url: String,
}

impl TargetPage {
    fn new(session: BrowserSession, target_url: String) -> Self {
        Self {
            session,
            target_url,
        }
    }

    fn target(&self) -> &str {
        &self.target_url
    }

    async fn open(&self) -> Result<(), DriverError> {
        self.session.navigate(&self.target_url).await
    }

    /// Snapshot of the visible anchors, taken once per pass. Deliberately not
    /// re-scanned per iteration; stale descriptors fall back to text lookup.
    async fn links(&self) -> Result<Vec<LinkDescriptor>, DriverError> {
        self.session.enumerate_links().await
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.session.current_url().await
    }

    async fn back(&self) -> Result<(), DriverError> {
        self.session.back().await
    }

    async fn click_link(&self, link: &LinkDescriptor) -> Result<(), DriverError> {
        self.session.click_link(link).await
    }

    async fn fill_first_input(&self, text: &str) -> Result<bool, DriverError> {
        self.session.fill_first_input(text).await
    }

    async fn visible_button_count(&self) -> Result<usize, DriverError> {
        self.session.visible_button_count().await
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
        self.session.screenshot_png().await
    }

    async fn close(self) {
        self.session.close().await;
    }
}

fn same_page(current: &str, target: &str) -> bool {
    match (Url::parse(current), Url::parse(target)) {
        (Ok(current), Ok(target)) => current == target,
        _ => current == target,
    }
}
