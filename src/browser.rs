use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::time::{Duration, Instant};
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tokio::runtime::Runtime;

use crate::config::Config;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A single WebDriver-controlled browser tab.
///
/// WebDriver calls are async; this wrapper owns a runtime and blocks on each
/// call so the rest of the program stays sequential. Every wait is bounded by
/// `wait`.
pub struct Browser {
    rt: Runtime,
    driver: WebDriver,
    wait: Duration,
}

impl Browser {
    pub fn launch(config: &Config) -> Result<Self> {
        let rt = Runtime::new().context("Failed to start async runtime")?;
        let driver = rt.block_on(async {
            let mut caps = DesiredCapabilities::chrome();
            if config.headless {
                caps.set_headless()?;
            }
            caps.add_arg("--window-size=1366,1024")?;
            let driver = WebDriver::new(config.webdriver_url.as_str(), caps).await?;
            let limit = page_load_timeout(config.wait_timeout);
            driver.set_page_load_timeout(limit).await?;
            driver.set_script_timeout(limit).await?;
            Ok::<_, WebDriverError>(driver)
        });
        let driver = driver.with_context(|| {
            format!(
                "Failed to start a browser session. Is chromedriver running at {}?",
                config.webdriver_url
            )
        })?;
        Ok(Self {
            rt,
            driver,
            wait: config.wait_timeout,
        })
    }

    pub fn goto(&self, url: &str) -> Result<()> {
        self.rt
            .block_on(self.driver.goto(url))
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.wait_ready();
        Ok(())
    }

    /// Polls `document.readyState` until complete or the wait runs out.
    /// Timing out is not an error: the caller's next lookup decides.
    pub fn wait_ready(&self) {
        let deadline = Instant::now() + self.wait;
        self.rt.block_on(async {
            while Instant::now() < deadline {
                if let Ok(ret) = self.driver.execute("return document.readyState", vec![]).await {
                    if ret.json().as_str() == Some("complete") {
                        return;
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            tracing::debug!("page did not reach readyState=complete in time");
        });
    }

    pub fn current_url(&self) -> Result<String> {
        let url = self.rt.block_on(self.driver.current_url())?;
        Ok(url.to_string())
    }

    pub fn source(&self) -> Result<String> {
        Ok(self.rt.block_on(self.driver.source())?)
    }

    pub fn body_text(&self) -> Result<String> {
        self.rt.block_on(async {
            let body = self.driver.find(By::Tag("body")).await?;
            Ok::<_, anyhow::Error>(body.text().await?)
        })
    }

    /// First element matching `by`, waiting up to the configured timeout.
    pub fn wait_for(&self, by: By) -> Option<WebElement> {
        self.rt
            .block_on(self.driver.query(by).wait(self.wait, POLL_INTERVAL).first_opt())
            .ok()
            .flatten()
    }

    /// First element matching `by` right now, without waiting.
    pub fn find_now(&self, by: By) -> Option<WebElement> {
        self.rt.block_on(self.driver.find(by)).ok()
    }

    pub fn is_visible(&self, by: By) -> bool {
        match self.find_now(by) {
            Some(element) => self.rt.block_on(element.is_displayed()).unwrap_or(false),
            None => false,
        }
    }

    /// Whether a visible element directly holds `text`.
    pub fn has_text(&self, text: &str) -> bool {
        self.is_visible(By::XPath(own_text_xpath(text)))
    }

    /// Polls until one of `texts` is shown or the wait runs out.
    pub fn wait_for_any_text(&self, texts: &[&str]) -> bool {
        let deadline = Instant::now() + self.wait;
        loop {
            if texts.iter().any(|t| self.has_text(t)) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn click(&self, element: &WebElement) -> Result<()> {
        self.rt.block_on(element.click())?;
        self.wait_ready();
        Ok(())
    }

    /// Clicks the first `tag` element containing `text`. Ok(false) when absent.
    pub fn click_text(&self, tag: &str, text: &str) -> Result<bool> {
        match self.find_now(By::XPath(text_xpath(tag, text))) {
            Some(element) => {
                self.click(&element)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replaces the value of the first input matching `selector`.
    /// Ok(false) when nothing matches.
    pub fn fill(&self, selector: &str, value: &str) -> Result<bool> {
        let Some(element) = self.find_now(By::Css(selector)) else {
            return Ok(false);
        };
        self.rt.block_on(async {
            element.clear().await?;
            element.send_keys(value).await
        })?;
        Ok(true)
    }

    /// Picks the option whose visible text is `label` in the first matching select.
    pub fn select_label(&self, selector: &str, label: &str) -> Result<bool> {
        let Some(select) = self.find_now(By::Css(selector)) else {
            return Ok(false);
        };
        let xpath = format!(".//option[normalize-space(.)={}]", xpath_literal(label));
        self.choose_option(&select, xpath)
    }

    /// Picks the option with `value` in the first matching select.
    pub fn select_value(&self, selector: &str, value: &str) -> Result<bool> {
        let Some(select) = self.find_now(By::Css(selector)) else {
            return Ok(false);
        };
        let xpath = format!(".//option[@value={}]", xpath_literal(value));
        self.choose_option(&select, xpath)
    }

    fn choose_option(&self, select: &WebElement, xpath: String) -> Result<bool> {
        self.rt.block_on(async {
            match select.find(By::XPath(xpath)).await {
                Ok(option) => {
                    option.click().await?;
                    Ok::<_, anyhow::Error>(true)
                }
                Err(_) => Ok(false),
            }
        })
    }

    /// Sets a file input to `path`.
    pub fn upload(&self, input: &WebElement, path: &Path) -> Result<()> {
        let absolute = std::fs::canonicalize(path)
            .with_context(|| format!("Upload file not found: {}", path.display()))?;
        let absolute = absolute
            .to_str()
            .ok_or_else(|| anyhow!("Upload path is not valid UTF-8: {}", absolute.display()))?
            .to_string();
        self.rt.block_on(input.send_keys(absolute))?;
        Ok(())
    }

    pub fn screenshot(&self, path: &Path) -> Result<()> {
        self.rt
            .block_on(self.driver.screenshot(path))
            .with_context(|| format!("Failed to save screenshot {}", path.display()))
    }

    pub fn quit(self) -> Result<()> {
        let Browser { rt, driver, .. } = self;
        rt.block_on(driver.quit())?;
        Ok(())
    }
}

/// Longest a navigation may take before `goto` gives up with an error.
pub fn page_load_timeout(wait: Duration) -> Duration {
    (wait * 3).max(Duration::from_secs(5))
}

/// XPath matching `tag` elements whose normalized text contains `text`.
pub fn text_xpath(tag: &str, text: &str) -> String {
    format!("//{}[contains(normalize-space(.), {})]", tag, xpath_literal(text))
}

/// XPath matching any element with a text node of its own containing `text`.
pub fn own_text_xpath(text: &str) -> String {
    format!("//*[text()[contains(normalize-space(.), {})]]", xpath_literal(text))
}

/// Quotes a string for use inside an XPath expression.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xpath_literal_quoting() {
        assert_eq!(xpath_literal("Logout"), "'Logout'");
        assert_eq!(xpath_literal("Don't"), "\"Don't\"");
        assert_eq!(
            xpath_literal("a'b\"c"),
            "concat('a', \"'\", 'b\"c')"
        );
    }

    #[test]
    fn test_text_xpath() {
        assert_eq!(
            text_xpath("a", "Apply for this Job"),
            "//a[contains(normalize-space(.), 'Apply for this Job')]"
        );
    }

    #[test]
    fn test_page_load_timeout() {
        assert_eq!(page_load_timeout(Duration::from_secs(10)), Duration::from_secs(30));
        assert_eq!(page_load_timeout(Duration::from_secs(1)), Duration::from_secs(5));
    }

    #[test]
    fn test_own_text_xpath() {
        assert_eq!(
            own_text_xpath("Logout"),
            "//*[text()[contains(normalize-space(.), 'Logout')]]"
        );
    }

    #[test]
    #[ignore] // needs chromedriver on WEBDRIVER_URL
    fn test_launch_and_navigate() {
        let config = crate::config::Config::from_env().expect("config");
        let browser = Browser::launch(&config).expect("browser");
        browser.goto("https://example.com").expect("goto");
        assert!(browser.has_text("Example Domain"));
        browser.quit().expect("quit");
    }
}
