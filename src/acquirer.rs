//! Local materialization of talk PDFs.
//!
//! For each talk:
//!
//! 1. If an artifact URL is known and downloads are enabled, use the cached
//!    file under `talk_pdfs/` or download it there.
//! 2. Only if that produced nothing and print fallback is enabled, use the
//!    cached print under `talk_prints/` or render the public page there.
//!
//! A non-empty file at the target path is always taken as valid, so re-runs
//! touch neither the network nor the renderer for talks already on disk.
//! Every target path is derived from the talk alone, which keeps concurrent
//! workers from ever writing the same file.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::api::ContentApi;
use crate::config::RunConfig;
use crate::error::{Outcome, PipelineError};
use crate::models::Item;
use crate::render::Renderer;
use crate::utils::{ensure_writable_dir, is_nonempty_file, write_atomically};

/// Downloads or renders one talk at a time; share it across workers by reference.
#[derive(Debug)]
pub struct Acquirer<R> {
    api: ContentApi,
    renderer: R,
    pdfs_dir: PathBuf,
    prints_dir: PathBuf,
    download_timeout: Duration,
    download_enabled: bool,
    render_enabled: bool,
}

impl<R: Renderer> Acquirer<R> {
    pub fn new(api: ContentApi, renderer: R, config: &RunConfig) -> Self {
        Self {
            api,
            renderer,
            pdfs_dir: config.talk_pdfs_dir(),
            prints_dir: config.talk_prints_dir(),
            download_timeout: config.download_timeout(),
            download_enabled: config.download_talk_pdfs,
            render_enabled: config.download_talk_prints,
        }
    }

    /// Create `talk_pdfs/` and `talk_prints/` if absent.
    pub async fn prepare_dirs(&self) -> Result<(), PipelineError> {
        ensure_writable_dir(&self.pdfs_dir).await?;
        ensure_writable_dir(&self.prints_dir).await
    }

    /// `talk_pdfs/` plus the URL's path, e.g. `talk_pdfs/bc/content/x.pdf`.
    pub fn download_path(&self, url: &str) -> Result<PathBuf, PipelineError> {
        let parsed = Url::parse(url).map_err(|e| PipelineError::acquisition(url, e))?;
        let relative = Path::new(parsed.path().trim_start_matches('/'));

        let mut path = self.pdfs_dir.clone();
        let mut segments = 0;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    segments += 1;
                }
                _ => return Err(PipelineError::acquisition(url, "unsafe path segment")),
            }
        }
        if segments == 0 || parsed.path().ends_with('/') {
            return Err(PipelineError::acquisition(url, "URL has no file name"));
        }
        Ok(path)
    }

    /// `talk_prints/{date}-{slug}.pdf`.
    pub fn render_path(&self, item: &Item) -> PathBuf {
        let slug = match item.slug() {
            "" => "talk",
            s => s,
        };
        self.prints_dir.join(format!("{}-{}.pdf", item.date, slug))
    }

    /// Materialize `item` locally.
    ///
    /// Downloads the artifact when one is known and downloads are enabled.
    /// Prints the public page only when that left no file and printing is
    /// enabled. Existing non-empty files are reused without any request.
    ///
    /// # Arguments
    ///
    /// * `item` - The talk, with `artifact_url` already resolved
    ///
    /// # Returns
    ///
    /// The same item with `local_artifact_path` and `local_render_path` set
    /// to whatever succeeded. Failures are logged and leave the path `None`.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let item = acquirer.acquire(item).await;
    /// if let Some(path) = item.resolved_path() {
    ///     println!("{}", path.display());
    /// }
    /// ```
    #[instrument(level = "info", skip_all, fields(uri = %item.canonical_uri))]
    pub async fn acquire(&self, mut item: Item) -> Item {
        item.local_artifact_path = None;
        item.local_render_path = None;

        if self.download_enabled {
            if let Some(url) = item.artifact_url.as_deref() {
                item.local_artifact_path = self.download(url).await.ok();
            }
        }

        if item.local_artifact_path.is_none() && self.render_enabled {
            item.local_render_path = self.render(&item).await.ok();
        }

        match item.resolved_path() {
            Some(path) => debug!(path = %path.display(), "Talk acquired"),
            None => debug!("Talk has no local file"),
        }
        item
    }

    async fn download(&self, url: &str) -> Outcome<PathBuf> {
        let path = match self.download_path(url) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Cannot place download");
                return Outcome::Failed(e);
            }
        };

        if is_nonempty_file(&path).await {
            debug!(path = %path.display(), "Already downloaded");
            return Outcome::Found(path);
        }

        debug!(path = %path.display(), %url, "Downloading");
        let res = match self.api.get_bytes(url, self.download_timeout).await {
            Ok(bytes) if bytes.is_empty() => Err(PipelineError::acquisition(url, "empty body")),
            Ok(bytes) => write_atomically(&path, &bytes)
                .await
                .map_err(|e| PipelineError::acquisition(path.display().to_string(), e)),
            Err(e) => Err(PipelineError::acquisition(url, e)),
        };

        match res {
            Ok(()) => {
                info!(path = %path.display(), "Downloaded talk PDF");
                Outcome::Found(path)
            }
            Err(e) => {
                warn!(error = %e, "Error downloading talk");
                Outcome::Failed(e)
            }
        }
    }

    async fn render(&self, item: &Item) -> Outcome<PathBuf> {
        let path = self.render_path(item);
        if is_nonempty_file(&path).await {
            debug!(path = %path.display(), "Already printed");
            return Outcome::Found(path);
        }

        debug!(path = %path.display(), url = %item.public_url, "Printing to PDF");
        match self.renderer.render(&item.public_url, &path).await {
            Ok(()) => {
                info!(path = %path.display(), "Printed talk page");
                Outcome::Found(path)
            }
            Err(e) => {
                let e = e.into_acquisition(path.display().to_string());
                warn!(url = %item.public_url, error = %e, "Error printing talk PDF");
                Outcome::Failed(e)
            }
        }
    }

    /// Give the renderer back so the caller can close it.
    pub fn into_renderer(self) -> R {
        self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::config_for;
    use crate::models::{Period, fixtures};
    use crate::render::test_support::FakeRenderer;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        server: MockServer,
        dir: tempfile::TempDir,
        fake: FakeRenderer,
    }

    impl Harness {
        async fn new() -> Self {
            Self {
                server: MockServer::start().await,
                dir: tempfile::tempdir().unwrap(),
                fake: FakeRenderer::default(),
            }
        }

        fn acquirer(&self, download: bool, render: bool) -> Acquirer<&FakeRenderer> {
            let config = RunConfig {
                download_dir: self.dir.path().to_path_buf(),
                download_talk_pdfs: download,
                download_talk_prints: render,
                ..config_for(&self.server)
            };
            Acquirer::new(ContentApi::new(&config).unwrap(), &self.fake, &config)
        }

        fn item(&self, artifact: Option<&str>) -> Item {
            let mut item = fixtures::item(
                Period::new(2023, 4).unwrap(),
                "/general-conference/2023/04/11jones",
            );
            item.public_url = format!("{}/study/general-conference/2023/04/11jones", self.server.uri());
            item.artifact_url = artifact.map(|p| format!("{}{}", self.server.uri(), p));
            item
        }
    }

    #[tokio::test]
    async fn test_download_success() {
        let h = Harness::new().await;
        Mock::given(method("GET"))
            .and(path("/bc/content/11jones.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
            .expect(1)
            .mount(&h.server)
            .await;

        let acquirer = h.acquirer(true, true);
        let item = acquirer.acquire(h.item(Some("/bc/content/11jones.pdf"))).await;

        let expected = h.dir.path().join("talk_pdfs/bc/content/11jones.pdf");
        assert_eq!(item.local_artifact_path.as_deref(), Some(expected.as_path()));
        assert_eq!(item.local_render_path, None);
        assert_eq!(item.resolved_path(), Some(expected.as_path()));
        assert_eq!(std::fs::read(&expected).unwrap(), b"%PDF-1.7");
        assert_eq!(h.fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_acquire_is_a_cache_hit() {
        let h = Harness::new().await;
        Mock::given(method("GET"))
            .and(path("/bc/content/11jones.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
            .expect(1)
            .mount(&h.server)
            .await;

        let acquirer = h.acquirer(true, true);
        let first = acquirer.acquire(h.item(Some("/bc/content/11jones.pdf"))).await;
        let second = acquirer.acquire(first.clone()).await;

        assert_eq!(first.resolved_path(), second.resolved_path());
        assert!(second.resolved_path().is_some());
        assert_eq!(h.server.received_requests().await.unwrap().len(), 1);
        assert_eq!(h.fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_existing_print_skips_renderer() {
        let h = Harness::new().await;
        let acquirer = h.acquirer(false, true);
        let item = h.item(None);
        let target = acquirer.render_path(&item);
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, b"%PDF-cached").unwrap();

        let first = acquirer.acquire(item).await;
        let second = acquirer.acquire(first.clone()).await;
        assert_eq!(first.resolved_path(), Some(target.as_path()));
        assert_eq!(second.resolved_path(), Some(target.as_path()));
        assert_eq!(h.fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_render_when_download_disabled() {
        let h = Harness::new().await;
        let acquirer = h.acquirer(false, true);
        let item = acquirer.acquire(h.item(None)).await;

        let expected = h.dir.path().join("talk_prints/2023-04-01-11jones.pdf");
        assert_eq!(item.local_artifact_path, None);
        assert_eq!(item.resolved_path(), Some(expected.as_path()));
        assert_eq!(h.fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_disabled_leaves_nothing() {
        let h = Harness::new().await;
        let acquirer = h.acquirer(false, false);
        let item = acquirer.acquire(h.item(Some("/bc/x.pdf"))).await;
        assert_eq!(item.resolved_path(), None);
        assert_eq!(h.fake.calls(), 0);
        assert!(h.server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_download_falls_back_to_render() {
        let h = Harness::new().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&h.server)
            .await;

        let acquirer = h.acquirer(true, true);
        let item = acquirer.acquire(h.item(Some("/bc/gone.pdf"))).await;
        assert_eq!(item.local_artifact_path, None);
        assert!(item.local_render_path.is_some());
        assert_eq!(item.resolved_path(), item.local_render_path.as_deref());
        assert!(!h.dir.path().join("talk_pdfs/bc/gone.pdf").exists());
    }

    #[tokio::test]
    async fn test_failed_render_is_not_fatal() {
        let mut h = Harness::new().await;
        h.fake.fail = true;
        let acquirer = h.acquirer(true, true);
        let item = acquirer.acquire(h.item(None)).await;
        assert_eq!(item.resolved_path(), None);
        assert_eq!(h.fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_cache_file_is_refetched() {
        let h = Harness::new().await;
        Mock::given(method("GET"))
            .and(path("/bc/x.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .expect(1)
            .mount(&h.server)
            .await;

        let target = h.dir.path().join("talk_pdfs/bc/x.pdf");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, b"").unwrap();

        let item = h.acquirer(true, false).acquire(h.item(Some("/bc/x.pdf"))).await;
        assert_eq!(item.local_artifact_path.as_deref(), Some(target.as_path()));
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn test_download_path_rules() {
        let h = Harness::new().await;
        let acquirer = h.acquirer(true, false);
        let pdfs = h.dir.path().join("talk_pdfs");

        assert_eq!(
            acquirer.download_path("https://cdn.example/a/../b.pdf").unwrap(),
            pdfs.join("b.pdf")
        );
        assert_eq!(
            acquirer.download_path("https://cdn.example/x/y.pdf?download=true").unwrap(),
            pdfs.join("x/y.pdf")
        );
        assert!(acquirer.download_path("https://cdn.example/").is_err());
        assert!(acquirer.download_path("https://cdn.example/dir/").is_err());
        assert!(acquirer.download_path("not a url").is_err());
    }

    #[tokio::test]
    async fn test_prepare_dirs_is_idempotent() {
        let h = Harness::new().await;
        let acquirer = h.acquirer(true, true);
        acquirer.prepare_dirs().await.unwrap();
        acquirer.prepare_dirs().await.unwrap();
        assert!(h.dir.path().join("talk_pdfs").is_dir());
        assert!(h.dir.path().join("talk_prints").is_dir());
    }
}
