//! Cursor-advancing pagination over the export list endpoint.
//!
//! The list endpoint returns at most a page of descriptors per call. A full
//! page means more may follow, so the cursor moves to the `Stop` of the last
//! descriptor and the list is requested again. The loop stops on a short
//! page, when the cursor passes the requested end, or when the provider
//! hands back a cursor that does not move forward.

use crate::config::Config;
use crate::enrich::RawEventRecord;
use crate::error::{Error, Result};
use crate::fetch::source::ExportSource;
use crate::fetch::types::{ExportDescriptor, PAGE_SIZE};
use crate::observe::PipelineObserver;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};

/// What the page loop does after a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
    /// Request another page at this cursor.
    Advance(i64),
    /// The page was short; nothing more to list.
    LastPage,
    /// The next cursor would pass the requested end.
    PastEnd(i64),
    /// The provider returned a full page whose last `Stop` does not move
    /// the cursor forward.
    Stalled(i64),
}

impl NextPage {
    /// Cursor for the following request, if any.
    pub fn cursor(self) -> Option<i64> {
        match self {
            NextPage::Advance(cursor) => Some(cursor),
            _ => None,
        }
    }
}

/// Decide how the loop continues after listing `page` at `cursor`.
pub fn next_page(
    cursor: i64,
    page: &[ExportDescriptor],
    page_size: usize,
    end: Option<i64>,
) -> NextPage {
    if page.len() < page_size {
        return NextPage::LastPage;
    }
    let Some(last) = page.last() else {
        return NextPage::LastPage;
    };

    let next = last.stop;
    if next <= cursor {
        return NextPage::Stalled(next);
    }
    match end {
        Some(end) if next > end => NextPage::PastEnd(next),
        _ => NextPage::Advance(next),
    }
}

/// One list page together with the decision it led to.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPage {
    /// Cursor the page was requested at
    pub cursor: i64,
    pub descriptors: Vec<ExportDescriptor>,
    pub next: NextPage,
}

/// Fetch tuning taken from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub page_size: usize,
    pub max_concurrent_exports: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            max_concurrent_exports: 8,
        }
    }
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.page_size.max(1),
            max_concurrent_exports: config.max_concurrent_exports.max(1),
        }
    }
}

/// Lazily list pages starting at `start`.
///
/// Each item is requested only once the previous one has been consumed.
/// The stream ends after the page whose [`NextPage`] is not `Advance`, and
/// ends with an error if a list call fails.
pub fn pages<'a, S>(
    source: &'a S,
    start: i64,
    end: Option<i64>,
    page_size: usize,
) -> impl Stream<Item = Result<ExportPage>> + Send + 'a
where
    S: ExportSource + ?Sized,
{
    stream::try_unfold(Some(start), move |cursor| async move {
        let Some(cursor) = cursor else {
            return Ok(None);
        };

        let descriptors = source
            .list(cursor)
            .await
            .map_err(|e| Error::List { cursor, source: e })?;
        let next = next_page(cursor, &descriptors, page_size, end);

        let page = ExportPage {
            cursor,
            descriptors,
            next,
        };
        Ok(Some((page, next.cursor())))
    })
}

/// Retrieve every record in `[start, end)` from `source`.
///
/// An empty listing returns an empty vector without any body calls. Bodies
/// are fetched concurrently up to `options.max_concurrent_exports` and
/// concatenated in descriptor order. Any failed call aborts the fetch.
pub async fn fetch_records<S>(
    source: &S,
    options: &FetchOptions,
    start: i64,
    end: Option<i64>,
    observer: &dyn PipelineObserver,
) -> Result<Vec<RawEventRecord>>
where
    S: ExportSource + ?Sized,
{
    observer.on_fetch_start(start, end);

    let mut descriptors = Vec::new();
    let mut listing = std::pin::pin!(pages(source, start, end, options.page_size));
    while let Some(page) = listing.try_next().await? {
        observer.on_page(&page);
        descriptors.extend(page.descriptors);
    }

    if descriptors.is_empty() {
        observer.on_empty(start, end);
        return Ok(Vec::new());
    }

    observer.on_exports_start(descriptors.len());
    let batches: Vec<Vec<RawEventRecord>> = stream::iter(descriptors.iter())
        .map(|descriptor| async move {
            let records = source.get(&descriptor.id).await.map_err(|e| Error::Export {
                id: descriptor.id.clone(),
                source: e,
            })?;
            observer.on_export(descriptor, records.len());
            Ok::<_, Error>(records)
        })
        .buffered(options.max_concurrent_exports.max(1))
        .try_collect()
        .await?;

    Ok(batches.into_iter().flatten().collect())
}
