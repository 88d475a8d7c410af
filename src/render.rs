//! Print-to-PDF rendering of public talk pages.
//!
//! # Architecture
//!
//! - [`Renderer`]: core trait, print one URL to one PDF file
//! - [`ChromeRenderer`]: headless Chromium over CDP, one browser per run
//! - [`BoundedRenderer`]: decorator adding a concurrency bound and an
//!   optional per-render timeout to any [`Renderer`]
//!
//! The browser is launched on the first render and reused for every later
//! one, each render getting its own tab. It is torn down by
//! [`Renderer::close`] when the pipeline shuts down.
//!
//! Tabs are held by a [`TabGuard`]. A render dropped mid-await (the
//! [`BoundedRenderer`] timeout does exactly that) still closes its tab, in a
//! background task, so the shared browser does not collect hung pages.

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::PipelineError;
use crate::utils::{is_nonempty_file, write_atomically};

/// 40px at the 96 dpi CDP assumes, in inches.
const PAGE_MARGIN_INCHES: f64 = 40.0 / 96.0;

/// Something that can print a web page to a PDF file.
pub trait Renderer {
    /// Print `url` to `dest`. On success `dest` exists and is non-empty.
    async fn render(&self, url: &str, dest: &Path) -> Result<(), PipelineError>;

    /// Release engine resources. Called once at the end of a run.
    async fn close(self)
    where
        Self: Sized,
    {
    }
}

struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// A browser tab that can be closed without anyone awaiting it.
trait Tab: Send + 'static {
    fn release(self) -> impl Future<Output = ()> + Send + 'static;
}

impl Tab for Page {
    fn release(self) -> impl Future<Output = ()> + Send + 'static {
        async move {
            if let Err(e) = self.close().await {
                debug!(error = %e, "Failed to close tab");
            }
        }
    }
}

/// Owns a tab until [`TabGuard::close`], or closes it in the background
/// when dropped first.
struct TabGuard<T: Tab> {
    tab: Option<T>,
}

impl<T: Tab> TabGuard<T> {
    fn new(tab: T) -> Self {
        Self { tab: Some(tab) }
    }

    async fn close(mut self) {
        if let Some(tab) = self.tab.take() {
            tab.release().await;
        }
    }
}

impl<T: Tab> Drop for TabGuard<T> {
    fn drop(&mut self) {
        let Some(tab) = self.tab.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Render abandoned; closing its tab in the background");
                handle.spawn(tab.release());
            }
            Err(_) => warn!("No runtime to close an abandoned tab"),
        }
    }
}

/// Headless Chromium renderer sharing one browser across all renders.
#[derive(Default)]
pub struct ChromeRenderer {
    session: OnceCell<BrowserSession>,
}

impl fmt::Debug for ChromeRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromeRenderer")
            .field("launched", &self.session.initialized())
            .finish()
    }
}

impl ChromeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    async fn browser(&self) -> Result<&Browser, PipelineError> {
        let session = self.session.get_or_try_init(launch).await?;
        Ok(&session.browser)
    }
}

async fn launch() -> Result<BrowserSession, PipelineError> {
    let config = BrowserConfig::builder()
        .build()
        .map_err(PipelineError::RenderCrash)?;
    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| PipelineError::RenderCrash(e.to_string()))?;

    // The CDP connection only makes progress while its handler is polled
    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!(error = %e, "Browser handler event error");
            }
        }
    });
    info!("Launched headless browser");
    Ok(BrowserSession { browser, handler })
}

fn print_params() -> PrintToPdfParams {
    PrintToPdfParams {
        display_header_footer: Some(true),
        margin_top: Some(PAGE_MARGIN_INCHES),
        margin_bottom: Some(PAGE_MARGIN_INCHES),
        ..Default::default()
    }
}

impl Renderer for ChromeRenderer {
    #[instrument(level = "info", skip(self, dest), fields(dest = %dest.display()))]
    async fn render(&self, url: &str, dest: &Path) -> Result<(), PipelineError> {
        let crash = |e: chromiumoxide::error::CdpError| PipelineError::RenderCrash(e.to_string());

        let browser = self.browser().await?;
        let page = browser.new_page("about:blank").await.map_err(crash)?;
        let tab = TabGuard::new(page.clone());
        let printed = match page.goto(url).await {
            Ok(_) => page.pdf(print_params()).await,
            Err(e) => Err(e),
        };
        tab.close().await;
        let bytes = printed.map_err(crash)?;

        write_atomically(dest, &bytes)
            .await
            .map_err(|e| PipelineError::acquisition(dest.display().to_string(), e))?;
        if !is_nonempty_file(dest).await {
            return Err(PipelineError::acquisition(
                dest.display().to_string(),
                "renderer produced an empty file",
            ));
        }
        Ok(())
    }

    async fn close(self) {
        if let Some(mut session) = self.session.into_inner() {
            if let Err(e) = session.browser.close().await {
                warn!(error = %e, "Failed to close browser cleanly");
            }
            if let Err(e) = session.browser.wait().await {
                warn!(error = %e, "Failed to reap browser process");
            }
            session.handler.abort();
            info!("Closed headless browser");
        }
    }
}

/// Wrapper that bounds how many renders run at once and how long each may take.
pub struct BoundedRenderer<R> {
    inner: R,
    permits: Semaphore,
    timeout: Option<Duration>,
}

impl<R> BoundedRenderer<R> {
    pub fn new(inner: R, concurrency: usize, timeout: Option<Duration>) -> Self {
        Self {
            inner,
            permits: Semaphore::new(concurrency.max(1)),
            timeout,
        }
    }
}

impl<R> fmt::Debug for BoundedRenderer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedRenderer")
            .field("available", &self.permits.available_permits())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<R: Renderer> Renderer for BoundedRenderer<R> {
    async fn render(&self, url: &str, dest: &Path) -> Result<(), PipelineError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| PipelineError::RenderCrash(e.to_string()))?;

        let t0 = Instant::now();
        let res = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.render(url, dest))
                .await
                .unwrap_or(Err(PipelineError::RenderTimeout(limit))),
            None => self.inner.render(url, dest).await,
        };
        debug!(%url, elapsed_ms = t0.elapsed().as_millis() as u64, ok = res.is_ok(), "Render finished");
        res
    }

    async fn close(self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes a fixed body and counts calls. `fail` makes every call crash.
    #[derive(Debug, Default)]
    pub struct FakeRenderer {
        pub calls: AtomicUsize,
        pub fail: bool,
        pub delay: Option<Duration>,
    }

    impl FakeRenderer {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Renderer for FakeRenderer {
        async fn render(&self, _url: &str, dest: &Path) -> Result<(), PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(PipelineError::RenderCrash("fake crash".into()));
            }
            write_atomically(dest, b"%PDF-fake")
                .await
                .map_err(|e| PipelineError::acquisition(dest.display().to_string(), e))
        }
    }

    impl Renderer for &FakeRenderer {
        async fn render(&self, url: &str, dest: &Path) -> Result<(), PipelineError> {
            (**self).render(url, dest).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeRenderer;
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FakeTab {
        closed: Arc<AtomicBool>,
    }

    impl Tab for FakeTab {
        fn release(self) -> impl Future<Output = ()> + Send + 'static {
            async move { self.closed.store(true, Ordering::SeqCst) }
        }
    }

    /// Opens a tab, then hangs for `delay` the way a stuck page load does.
    struct TabRenderer {
        closed: Arc<AtomicBool>,
        delay: Duration,
    }

    impl Renderer for TabRenderer {
        async fn render(&self, _url: &str, dest: &Path) -> Result<(), PipelineError> {
            let tab = TabGuard::new(FakeTab {
                closed: self.closed.clone(),
            });
            tokio::time::sleep(self.delay).await;
            tab.close().await;
            write_atomically(dest, b"%PDF-tab")
                .await
                .map_err(|e| PipelineError::acquisition(dest.display().to_string(), e))
        }
    }

    #[tokio::test]
    async fn test_timed_out_render_closes_its_tab() {
        let dir = tempfile::tempdir().unwrap();
        let closed = Arc::new(AtomicBool::new(false));
        let bounded = BoundedRenderer::new(
            TabRenderer {
                closed: closed.clone(),
                delay: Duration::from_secs(5),
            },
            1,
            Some(Duration::from_millis(20)),
        );

        let err = bounded
            .render("http://x", &dir.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RenderTimeout(_)));

        // The close runs on a spawned task
        for _ in 0..50 {
            if closed.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_finished_render_closes_its_tab() {
        let dir = tempfile::tempdir().unwrap();
        let closed = Arc::new(AtomicBool::new(false));
        let renderer = TabRenderer {
            closed: closed.clone(),
            delay: Duration::from_millis(1),
        };

        renderer.render("http://x", &dir.path().join("out.pdf")).await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropped_guard_closes_tab() {
        let tab = FakeTab::default();
        let closed = tab.closed.clone();
        drop(TabGuard::new(tab));
        for _ in 0..50 {
            if closed.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_print_params() {
        let params = print_params();
        assert_eq!(params.display_header_footer, Some(true));
        let top = params.margin_top.unwrap();
        assert!((top - 0.4166).abs() < 0.001);
        assert_eq!(params.margin_top, params.margin_bottom);
    }

    #[tokio::test]
    async fn test_bounded_renderer_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeRenderer {
            delay: Some(Duration::from_millis(500)),
            ..FakeRenderer::default()
        };
        let bounded = BoundedRenderer::new(&fake, 1, Some(Duration::from_millis(20)));
        let err = bounded
            .render("http://x", &dir.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RenderTimeout(_)));
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_bounded_renderer_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeRenderer::default();
        let bounded = BoundedRenderer::new(&fake, 2, None);
        let dest = dir.path().join("out.pdf");
        bounded.render("http://x", &dest).await.unwrap();
        assert!(is_nonempty_file(&dest).await);
    }

    #[tokio::test]
    async fn test_bounded_renderer_limits_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeRenderer {
            delay: Some(Duration::from_millis(50)),
            ..FakeRenderer::default()
        };
        let bounded = BoundedRenderer::new(&fake, 1, None);
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");

        let t0 = Instant::now();
        let (ra, rb) = tokio::join!(bounded.render("http://a", &a), bounded.render("http://b", &b));
        ra.unwrap();
        rb.unwrap();
        assert!(t0.elapsed() >= Duration::from_millis(100));
        assert_eq!(fake.calls(), 2);
    }
}
