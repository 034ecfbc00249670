//! Subject-by-subject extraction runs
//!
//! Subjects are processed in input order and pages in page order. Within a
//! page, the fan-out batch is drained completely before the next page is
//! requested, and rows are written as their tasks complete. A subject that
//! fails only stops itself; the run always flushes what it produced.

use crate::config::{PaginationConfig, TaskFailurePolicy};
use crate::detail::DetailFetcher;
use crate::error::{IngestError, Result};
use crate::executor::FanOutExecutor;
use crate::pagination::{PageIterator, Termination};
use crate::progress::subject_progress;
use crate::projector::{ApplicationRow, RecordProjector};
use crate::sink::CsvSink;
use crate::types::{FetchTask, Subject};
use crate::upstream::{DetailSource, ListingSource};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// How a subject's processing ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectStop {
    Pagination(Termination),
    /// Tasks on `page` failed under the abort-subject policy
    TaskFailure { page: u32, failed: usize },
}

impl SubjectStop {
    /// Whether the subject ended because something went wrong
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Pagination(Termination::Failed { .. }) | Self::TaskFailure { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct SubjectReport {
    pub subject_id: i64,
    pub pages: u32,
    pub rows: usize,
    pub failed_tasks: usize,
    pub stop: SubjectStop,
}

/// Totals for one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub subjects: Vec<SubjectReport>,
    pub rows: usize,
    /// Outbound detail requests, retries included
    pub detail_requests: usize,
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            subjects: Vec::new(),
            rows: 0,
            detail_requests: 0,
        }
    }

    pub fn pages(&self) -> u32 {
        self.subjects.iter().map(|s| s.pages).sum()
    }

    pub fn failed_tasks(&self) -> usize {
        self.subjects.iter().map(|s| s.failed_tasks).sum()
    }

    pub fn failed_subjects(&self) -> usize {
        self.subjects.iter().filter(|s| s.stop.is_failure()).count()
    }
}

/// Paginate, fan out detail fetches and write one row per application
pub struct ProfilePipeline<L, D> {
    listing: L,
    details: Arc<DetailFetcher<D>>,
    executor: FanOutExecutor,
    projector: RecordProjector,
    pagination: PaginationConfig,
    show_progress: bool,
}

impl<L, D> ProfilePipeline<L, D>
where
    L: ListingSource,
    D: DetailSource + 'static,
{
    pub fn new(listing: L, details: DetailFetcher<D>, pagination: PaginationConfig) -> Self {
        Self {
            listing,
            details: Arc::new(details),
            executor: FanOutExecutor::new(pagination.max_workers),
            projector: RecordProjector::new(),
            pagination,
            show_progress: false,
        }
    }

    pub fn with_projector(mut self, projector: RecordProjector) -> Self {
        self.projector = projector;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Process every subject in order; only sink failures abort the run
    pub async fn run<W: Write>(
        &self,
        subjects: &[Subject],
        sink: &mut CsvSink<W>,
    ) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("profiles_run", run_id = %run_id);

        async {
            info!(
                subjects = subjects.len(),
                max_workers = self.executor.max_workers(),
                "Starting profile extraction"
            );
            let progress = subject_progress(subjects.len(), self.show_progress);
            let mut summary = RunSummary::new(run_id);

            for subject in subjects {
                progress.set_message(subject.to_string());
                let report = self.run_subject(subject, sink).await?;
                summary.rows += report.rows;
                summary.subjects.push(report);
                progress.inc(1);
            }

            sink.flush()?;
            progress.finish_and_clear();
            summary.detail_requests = self.details.upstream_calls();

            info!(
                rows = summary.rows,
                pages = summary.pages(),
                failed_subjects = summary.failed_subjects(),
                detail_requests = summary.detail_requests,
                "Profile extraction complete"
            );
            Ok::<_, IngestError>(summary)
        }
        .instrument(span)
        .await
    }

    async fn run_subject<W: Write>(
        &self,
        subject: &Subject,
        sink: &mut CsvSink<W>,
    ) -> Result<SubjectReport> {
        info!(subject_id = subject.id, name = %subject.name, "Processing subject");

        let mut pages = PageIterator::new(
            &self.listing,
            Arc::new(subject.clone()),
            self.pagination.page_size,
            self.pagination.first_page,
            self.pagination.max_pages,
        );
        let mut rows = 0;
        let mut failed_tasks = 0;
        let mut task_stop = None;

        while let Some(page) = pages.next().await {
            let tasks = FetchTask::from_page(&page);
            let fetcher = Arc::clone(&self.details);
            let projector = self.projector;

            let mut completions = self.executor.map_unordered(tasks, move |task: FetchTask| {
                let fetcher = Arc::clone(&fetcher);
                async move {
                    let record = fetcher.fetch(&task.detail_key).await?;
                    Ok::<_, IngestError>(projector.project(&record, &task))
                }
            });

            let mut page_failures = 0;
            while let Some(result) = completions.next().await {
                match result {
                    Ok(row) => {
                        sink.write(&row)?;
                        rows += 1;
                    },
                    Err(e) => {
                        warn!(
                            subject_id = subject.id,
                            page = page.number,
                            error = %e,
                            "Task failed"
                        );
                        page_failures += 1;
                    },
                }
            }

            info!(
                subject_id = subject.id,
                page = page.number,
                profiles = page.len(),
                tasks = completions.submitted(),
                failed = page_failures,
                "Page done"
            );

            failed_tasks += page_failures;
            if page_failures > 0
                && self.pagination.task_failure_policy == TaskFailurePolicy::AbortSubject
            {
                warn!(
                    subject_id = subject.id,
                    page = page.number,
                    "Stopping subject after task failures"
                );
                task_stop = Some(SubjectStop::TaskFailure {
                    page: page.number,
                    failed: page_failures,
                });
                break;
            }
        }

        let stop = task_stop
            .or_else(|| pages.termination().cloned().map(SubjectStop::Pagination))
            .unwrap_or(SubjectStop::Pagination(Termination::PageLimit));

        Ok(SubjectReport {
            subject_id: subject.id,
            pages: pages.pages_yielded(),
            rows,
            failed_tasks,
            stop,
        })
    }
}

/// Paginate only, writing `student_id, university_id, university_name`
pub struct ApplicationPipeline<L> {
    listing: L,
    pagination: PaginationConfig,
    show_progress: bool,
}

impl<L: ListingSource> ApplicationPipeline<L> {
    pub fn new(listing: L, pagination: PaginationConfig) -> Self {
        Self {
            listing,
            pagination,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn run<W: Write>(
        &self,
        subjects: &[Subject],
        sink: &mut CsvSink<W>,
    ) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("applications_run", run_id = %run_id);

        async {
            info!(subjects = subjects.len(), "Starting application extraction");
            let progress = subject_progress(subjects.len(), self.show_progress);
            let delay = self.pagination.page_delay();
            let mut summary = RunSummary::new(run_id);

            for subject in subjects {
                progress.set_message(subject.to_string());
                info!(subject_id = subject.id, name = %subject.name, "Processing subject");

                let mut pages = PageIterator::new(
                    &self.listing,
                    Arc::new(subject.clone()),
                    self.pagination.page_size,
                    self.pagination.first_page,
                    self.pagination.max_pages,
                )
                .with_delay(delay);

                let mut rows = 0;
                while let Some(page) = pages.next().await {
                    for row in ApplicationRow::from_page(&page) {
                        sink.write(&row)?;
                        rows += 1;
                    }
                    info!(
                        subject_id = subject.id,
                        page = page.number,
                        profiles = page.len(),
                        "Page done"
                    );
                }

                summary.rows += rows;
                summary.subjects.push(SubjectReport {
                    subject_id: subject.id,
                    pages: pages.pages_yielded(),
                    rows,
                    failed_tasks: 0,
                    stop: SubjectStop::Pagination(
                        pages.termination().cloned().unwrap_or(Termination::PageLimit),
                    ),
                });
                progress.inc(1);
            }

            sink.flush()?;
            progress.finish_and_clear();
            info!(rows = summary.rows, pages = summary.pages(), "Application extraction complete");
            Ok::<_, IngestError>(summary)
        }
        .instrument(span)
        .await
    }
}
