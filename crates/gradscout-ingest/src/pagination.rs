//! Sequential pagination of a subject's listing
//!
//! A [`PageIterator`] is finite and not restartable. It ends on the first
//! empty page, the first upstream error (logged, never raised) or when the
//! configured page limit is reached. Failed requests are not retried.

use crate::types::{Page, Subject};
use crate::upstream::ListingSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a subject's pagination ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// `page` came back empty
    Exhausted { page: u32 },
    /// Requesting `page` failed
    Failed { page: u32, error: String },
    /// Every page up to the configured ceiling was served
    PageLimit,
}

/// Lazy sequence of pages for one subject
pub struct PageIterator<'a, S: ?Sized> {
    source: &'a S,
    subject: Arc<Subject>,
    page_size: u32,
    next_page: u32,
    end_page: u32,
    delay: Option<Duration>,
    yielded: u32,
    termination: Option<Termination>,
}

impl<'a, S: ListingSource + ?Sized> PageIterator<'a, S> {
    /// Iterate pages `first_page .. first_page + max_pages`
    pub fn new(
        source: &'a S,
        subject: Arc<Subject>,
        page_size: u32,
        first_page: u32,
        max_pages: u32,
    ) -> Self {
        Self {
            source,
            subject,
            page_size,
            next_page: first_page,
            end_page: first_page.saturating_add(max_pages),
            delay: None,
            yielded: 0,
            termination: None,
        }
    }

    /// Pause between successful page requests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = (!delay.is_zero()).then_some(delay);
        self
    }

    /// Fetch the next non-empty page, or `None` once pagination ended
    pub async fn next(&mut self) -> Option<Page> {
        if self.termination.is_some() {
            return None;
        }

        if self.next_page >= self.end_page {
            debug!(subject_id = self.subject.id, "Page limit reached");
            self.termination = Some(Termination::PageLimit);
            return None;
        }

        if let (Some(delay), true) = (self.delay, self.yielded > 0) {
            tokio::time::sleep(delay).await;
        }

        let number = self.next_page;
        match self
            .source
            .fetch_page(&self.subject, number, self.page_size)
            .await
        {
            Ok(items) if items.is_empty() => {
                info!(subject_id = self.subject.id, page = number, "No more results");
                self.termination = Some(Termination::Exhausted { page: number });
                None
            },
            Ok(items) => {
                self.next_page += 1;
                self.yielded += 1;
                Some(Page {
                    subject: Arc::clone(&self.subject),
                    number,
                    items,
                })
            },
            Err(e) => {
                warn!(
                    subject_id = self.subject.id,
                    page = number,
                    error = %e,
                    "Page request failed, stopping pagination for subject"
                );
                self.termination = Some(Termination::Failed {
                    page: number,
                    error: e.to_string(),
                });
                None
            },
        }
    }

    /// Set once the sequence has ended
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Number of non-empty pages yielded so far
    pub fn pages_yielded(&self) -> u32 {
        self.yielded
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::{IngestError, Result};
    use crate::types::Item;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Serves `pages[n]` for page `n`; pages past the end are empty
    struct FakeListing {
        pages: Vec<Result<usize>>,
        requested: Mutex<Vec<(u32, Instant)>>,
    }

    impl FakeListing {
        fn new(pages: Vec<Result<usize>>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested_pages(&self) -> Vec<u32> {
            self.requested.lock().unwrap().iter().map(|(p, _)| *p).collect()
        }
    }

    #[async_trait]
    impl ListingSource for FakeListing {
        async fn fetch_page(&self, _subject: &Subject, page: u32, _size: u32) -> Result<Vec<Item>> {
            self.requested.lock().unwrap().push((page, Instant::now()));
            match self.pages.get(page as usize) {
                Some(Ok(n)) => Ok((0..*n)
                    .map(|i| json!({"username": format!("u{}", i)}).as_object().unwrap().clone())
                    .collect()),
                Some(Err(e)) => Err(IngestError::transient(e.to_string())),
                None => Ok(Vec::new()),
            }
        }
    }

    fn subject() -> Arc<Subject> {
        Arc::new(Subject::new(5, "X"))
    }

    #[tokio::test]
    async fn test_stops_on_first_empty_page() {
        let source = FakeListing::new(vec![Ok(3), Ok(0), Ok(4)]);
        let mut pages = PageIterator::new(&source, subject(), 9, 0, 31);

        let first = pages.next().await.unwrap();
        assert_eq!(first.number, 0);
        assert_eq!(first.len(), 3);
        assert!(pages.next().await.is_none());
        assert!(pages.next().await.is_none());

        assert_eq!(source.requested_pages(), vec![0, 1]);
        assert_eq!(pages.termination(), Some(&Termination::Exhausted { page: 1 }));
        assert_eq!(pages.pages_yielded(), 1);
    }

    #[tokio::test]
    async fn test_error_ends_pagination_without_retry() {
        let source = FakeListing::new(vec![
            Ok(2),
            Err(IngestError::transient("connection reset")),
            Ok(2),
        ]);
        let mut pages = PageIterator::new(&source, subject(), 9, 0, 31);

        assert!(pages.next().await.is_some());
        assert!(pages.next().await.is_none());
        assert_eq!(source.requested_pages(), vec![0, 1]);
        assert!(matches!(
            pages.termination(),
            Some(Termination::Failed { page: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_page_limit_bounds_requests() {
        let source = FakeListing::new((0..10).map(|_| Ok(1)).collect());
        let mut pages = PageIterator::new(&source, subject(), 9, 0, 3);

        let mut count = 0;
        while pages.next().await.is_some() {
            count += 1;
        }

        assert_eq!(count, 3);
        assert_eq!(source.requested_pages(), vec![0, 1, 2]);
        assert_eq!(pages.termination(), Some(&Termination::PageLimit));
    }

    #[tokio::test]
    async fn test_first_page_offset() {
        let source = FakeListing::new(vec![Ok(1), Ok(1), Ok(0)]);
        let mut pages = PageIterator::new(&source, subject(), 9, 1, 31);

        assert_eq!(pages.next().await.unwrap().number, 1);
        assert!(pages.next().await.is_none());
        assert_eq!(source.requested_pages(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_successful_pages() {
        let source = FakeListing::new(vec![Ok(1), Ok(1), Ok(0)]);
        let mut pages =
            PageIterator::new(&source, subject(), 9, 0, 31).with_delay(Duration::from_millis(500));

        while pages.next().await.is_some() {}

        let times: Vec<Instant> = source.requested.lock().unwrap().iter().map(|(_, t)| *t).collect();
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_millis(500));
        assert!(times[2] - times[1] >= Duration::from_millis(500));
    }
}
