//! Table-of-contents flattening.
//!
//! Talks appear in two shapes depending on the era of the document:
//!
//! ```text
//! toc.entries[].section.entries[].content   grouped under a session
//! toc.entries[].content                     ungrouped
//! ```
//!
//! Both shapes are walked and concatenated, grouped talks first, each in
//! document order. Entries without a URI are dropped with a warning; a
//! handful of them show up in most older documents.

use tracing::{debug, warn};

use crate::api::ContentApi;
use crate::error::PipelineError;
use crate::models::{CollectionDocument, EntryContent, Item, UNGROUPED_SESSION};

/// Flatten one collection document into talk items. No I/O.
///
/// Session-grouped talks come first, then talks outside any session, each
/// in document order. An entry without a usable URI is logged as a
/// [`PipelineError::MalformedItem`] and dropped; its neighbours are kept.
///
/// # Arguments
///
/// * `document` - The fetched table of contents and the period it belongs to
/// * `urls` - Supplies the content and study base URLs
///
/// # Returns
///
/// One [`Item`] per retained entry, with the artifact and local path fields
/// still empty.
///
/// # Examples
///
/// ```ignore
/// let items = extract(&doc, &api);
/// assert!(items.iter().all(|i| !i.canonical_uri.is_empty()));
/// ```
pub fn extract(document: &CollectionDocument, urls: &ContentApi) -> Vec<Item> {
    let toc = &document.toc;
    let conference_pdf_url = toc
        .pdf_downloads
        .iter()
        .find_map(|d| non_blank(d.source.as_deref()));

    let builder = ItemBuilder {
        document,
        urls,
        conference_pdf_url,
    };

    let mut items = Vec::new();
    let mut index = 0usize;

    for entry in &toc.entries {
        let Some(section) = &entry.section else {
            continue;
        };
        let session = non_blank(section.title.as_deref()).unwrap_or_else(|| UNGROUPED_SESSION.to_string());
        for sub in &section.entries {
            index += 1;
            builder.push(&mut items, sub.content.as_ref(), &session, index);
        }
    }

    for entry in &toc.entries {
        match (&entry.content, &entry.section) {
            // Session wrappers were handled above
            (None, Some(_)) => continue,
            (content, _) => {
                index += 1;
                builder.push(&mut items, content.as_ref(), UNGROUPED_SESSION, index);
            }
        }
    }

    debug!(period = %document.period, count = items.len(), "Extracted talks");
    items
}

struct ItemBuilder<'a> {
    document: &'a CollectionDocument,
    urls: &'a ContentApi,
    conference_pdf_url: Option<String>,
}

impl ItemBuilder<'_> {
    fn push(&self, items: &mut Vec<Item>, content: Option<&EntryContent>, session: &str, index: usize) {
        let period = self.document.period;
        let Some(uri) = content.and_then(|c| non_blank(c.uri.as_deref())) else {
            let e = PipelineError::MalformedItem {
                period,
                session: session.to_string(),
                index,
            };
            warn!(error = %e, "Dropping TOC entry");
            return;
        };

        let toc = &self.document.toc;
        items.push(Item {
            period,
            date: period.conference_date(),
            conference: period.conference_name(),
            category: toc.category.clone(),
            collection_title: toc.title.clone(),
            session: session.to_string(),
            title: content.and_then(|c| c.title.clone()),
            speaker: content.and_then(|c| non_blank(c.subtitle.as_deref())),
            content_url: self.urls.content_url(&uri),
            public_url: self.urls.study_url(&uri),
            canonical_uri: uri,
            conference_pdf_url: self.conference_pdf_url.clone(),
            artifact_url: None,
            local_artifact_path: None,
            local_render_path: None,
        });
    }
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
