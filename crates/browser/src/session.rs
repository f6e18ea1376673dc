//! Chromium session management over CDP.
//!
//! A [`Session`] owns one browser process plus the event handler task that
//! pumps its CDP messages. Each [`Session::visit`] opens a fresh page with
//! the session's identity (user agent, headers, cookies) applied before
//! navigation, and hands back a [`PageVisit`] that must be closed when the
//! caller is done with the rendered markup.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, Headers, SetCookiesParams, SetExtraHttpHeadersParams, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::ReloadParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use coralingest_shared::{CoralIngestError, Result};

use crate::cookies::Cookie;
use crate::headers;

/// How often element waits poll the page.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Session identity and launch options.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Run without a visible browser window.
    pub headless: bool,
    /// Timeout covering navigation plus the page's own redirects.
    pub nav_timeout: Duration,
    /// User agent presented to the site.
    pub user_agent: String,
    /// Accept-Language presented to the site.
    pub accept_language: String,
    /// Extra HTTP headers applied to every request the page makes.
    pub headers: Vec<(String, String)>,
    /// Cookies installed before the first navigation of each page.
    pub cookies: Vec<Cookie>,
    /// Persistent profile directory; session state survives across runs.
    pub profile_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            nav_timeout: Duration::from_secs(20),
            user_agent: headers::USER_AGENT.to_string(),
            accept_language: headers::ACCEPT_LANGUAGE.to_string(),
            headers: headers::default_headers(),
            cookies: Vec::new(),
            profile_dir: None,
        }
    }
}

/// A running browser process and its CDP event pump.
pub struct Session {
    browser: Browser,
    handler_task: JoinHandle<()>,
    config: SessionConfig,
}

impl Session {
    /// Launch a browser process with the given identity.
    #[instrument(skip(config), fields(headless = config.headless))]
    pub async fn launch(config: SessionConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(1366, 900)
            .arg("--disable-extensions")
            .arg("--disable-notifications")
            .arg("--lang=tr-TR");

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &config.profile_dir {
            builder = builder.user_data_dir(dir);
        }

        let browser_config = builder
            .build()
            .map_err(CoralIngestError::Navigation)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CoralIngestError::Navigation(format!("browser launch failed: {e}")))?;

        // Pump CDP events until the browser goes away. Individual handler
        // errors are logged and tolerated.
        let handler_task = tokio::spawn(async move {
            let mut errors: u32 = 0;
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    errors += 1;
                    debug!(%e, errors, "browser handler event error");
                }
            }
            debug!(errors, "browser handler stream ended");
        });

        Ok(Self {
            browser,
            handler_task,
            config,
        })
    }

    /// Open a new page, apply the session identity, and navigate to `url`.
    #[instrument(skip(self))]
    pub async fn visit(&self, url: &str) -> Result<PageVisit> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CoralIngestError::Navigation(format!("new page failed: {e}")))?;

        self.apply_identity(&page).await?;

        let nav = async {
            page.goto(url)
                .await
                .map_err(|e| CoralIngestError::Navigation(format!("goto {url} failed: {e}")))?;
            page.wait_for_navigation().await.map_err(|e| {
                CoralIngestError::Navigation(format!("navigation to {url} did not settle: {e}"))
            })?;
            Ok::<_, CoralIngestError>(())
        };

        match tokio::time::timeout(self.config.nav_timeout, nav).await {
            Ok(result) => result?,
            Err(_) => {
                // Close the half-loaded page before reporting the timeout.
                let _ = page.close().await;
                return Err(CoralIngestError::Navigation(format!(
                    "navigation to {url} timed out after {:?}",
                    self.config.nav_timeout
                )));
            }
        }

        Ok(PageVisit {
            page,
            url: url.to_string(),
        })
    }

    /// Install user agent, extra headers, and cookies on a fresh page.
    async fn apply_identity(&self, page: &Page) -> Result<()> {
        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(&self.config.user_agent)
            .accept_language(&self.config.accept_language)
            .build()
            .map_err(CoralIngestError::Navigation)?;
        page.execute(ua)
            .await
            .map_err(|e| CoralIngestError::Navigation(format!("set user agent failed: {e}")))?;

        if !self.config.headers.is_empty() {
            let mut map = serde_json::Map::new();
            for (name, value) in &self.config.headers {
                map.insert(name.clone(), serde_json::Value::String(value.clone()));
            }
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(map),
            )))
            .await
            .map_err(|e| CoralIngestError::Navigation(format!("set headers failed: {e}")))?;
        }

        if !self.config.cookies.is_empty() {
            let params: Vec<CookieParam> = self
                .config
                .cookies
                .iter()
                .filter_map(|c| match cookie_param(c) {
                    Ok(param) => Some(param),
                    Err(e) => {
                        warn!(cookie = %c.name, %e, "skipping unbuildable cookie");
                        None
                    }
                })
                .collect();
            page.execute(SetCookiesParams::new(params))
                .await
                .map_err(|e| CoralIngestError::Navigation(format!("set cookies failed: {e}")))?;
        }

        Ok(())
    }

    /// Close the browser and stop the event pump.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(%e, "browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

fn cookie_param(cookie: &Cookie) -> std::result::Result<CookieParam, String> {
    let mut builder = CookieParam::builder()
        .name(&cookie.name)
        .value(&cookie.value)
        .domain(&cookie.domain)
        .path(&cookie.path)
        .secure(cookie.secure);
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires as f64));
    }
    builder.build()
}

/// One open page on a [`Session`], positioned at a listing URL.
pub struct PageVisit {
    page: Page,
    url: String,
}

impl PageVisit {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Poll for an element until it appears or the timeout lapses.
    ///
    /// A missing element is not an error; extraction proceeds on whatever
    /// rendered, and the detector decides whether the page is usable.
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(selector, ?timeout, "element wait timed out");
                return false;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Serialized markup of the rendered document.
    pub async fn html(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| CoralIngestError::Navigation(format!("page content failed: {e}")))
    }

    /// Reload in place and wait for the navigation to settle.
    pub async fn reload(&self, timeout: Duration) -> Result<()> {
        let nav = async {
            self.page
                .execute(ReloadParams::default())
                .await
                .map_err(|e| CoralIngestError::Navigation(format!("reload failed: {e}")))?;
            self.page.wait_for_navigation().await.map_err(|e| {
                CoralIngestError::Navigation(format!("reload did not settle: {e}"))
            })?;
            Ok::<_, CoralIngestError>(())
        };

        tokio::time::timeout(timeout, nav)
            .await
            .map_err(|_| {
                CoralIngestError::Navigation(format!("reload timed out after {timeout:?}"))
            })?
    }

    /// Close the page tab. Failures are logged, not propagated.
    pub async fn close(self) {
        if let Err(e) = self.page.close().await {
            warn!(url = %self.url, %e, "page close failed");
        }
    }
}
