//! Batch orchestration.
//!
//! Hook mode renames the files of one item, bulk mode a page of items
//! ordered by update time. Both share a single index connection. A failure
//! on one file is logged and the run goes on; only metadata service and
//! configuration failures stop it, and only between items.

use crate::core::duplicate::DuplicateResolver;
use crate::core::executor::TransactionalRenamer;
use crate::core::extractor::{resolve_studio_chain, FieldExtractor};
use crate::core::indexer::IndexStore;
use crate::core::planner::RenamePlanner;
use crate::core::selector::TemplateSelector;
use crate::models::config::{Config, SortDirection};
use crate::models::record::{MetadataRecord, StudioRef};
use crate::models::template::TemplateOption;
use crate::services::graphql::MetadataService;
use crate::services::lock::FileLockInspector;
use crate::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileOutcome {
    Renamed { clean_tag_ids: Vec<String> },
    Unchanged,
    DryRun,
}

/// Counters for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemReport {
    pub renamed: usize,
    pub unchanged: usize,
    pub dry_run: usize,
    pub failed: usize,
    /// Item left alone (not organized).
    pub skipped: bool,
}

/// Counters for a bulk run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub items: usize,
    pub skipped_items: usize,
    pub failed_items: usize,
    pub renamed: usize,
    pub unchanged: usize,
    pub dry_run: usize,
    pub failed_files: usize,
}

impl BatchSummary {
    fn add(&mut self, report: &ItemReport) {
        if report.skipped {
            self.skipped_items += 1;
        }
        if report.failed > 0 {
            self.failed_items += 1;
        }
        self.renamed += report.renamed;
        self.unchanged += report.unchanged;
        self.dry_run += report.dry_run;
        self.failed_files += report.failed;
    }
}

/// Fraction of a batch done, `1.0` for an empty batch.
pub fn progress_fraction(completed: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        completed as f64 / total as f64
    }
}

/// Runs the rename pipeline over items.
pub struct BatchOrchestrator<'a> {
    config: &'a Config,
    service: &'a dyn MetadataService,
    selector: TemplateSelector<'a>,
    extractor: FieldExtractor<'a>,
    planner: RenamePlanner<'a>,
    renamer: TransactionalRenamer<'a>,
    dry_run_file: Option<PathBuf>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        config: &'a Config,
        service: &'a dyn MetadataService,
        inspector: &'a dyn FileLockInspector,
    ) -> Result<Self> {
        let dry_run_file = config.general.dry_run_file();
        if let Some(ref path) = dry_run_file {
            if config.general.dry_run && !config.general.dry_run_append && path.exists() {
                std::fs::File::create(path)?;
                tracing::debug!("Dry-run file truncated ({})", path.display());
            }
        }

        Ok(Self {
            config,
            service,
            selector: TemplateSelector::new(config),
            extractor: FieldExtractor::new(config),
            planner: RenamePlanner::new(config)?,
            renamer: TransactionalRenamer::new(config, inspector),
            dry_run_file,
        })
    }

    /// Use a custom renamer, e.g. one with a different move function.
    pub fn with_renamer(mut self, renamer: TransactionalRenamer<'a>) -> Self {
        self.renamer = renamer;
        self
    }

    /// Hook mode: process one item by id.
    pub fn run_hook(&self, item_id: &str, index: &mut dyn IndexStore) -> Result<ItemReport> {
        let record = self
            .service
            .find_item(item_id)?
            .ok_or_else(|| crate::Error::other(format!("item {} not found", item_id)))?;
        self.process_item(&record, index)
    }

    /// Bulk mode: process a page of items, calling `progress` with
    /// `(completed, total)` after each one.
    pub fn run_bulk<F>(
        &self,
        limit: Option<u32>,
        direction: SortDirection,
        index: &mut dyn IndexStore,
        mut progress: F,
    ) -> Result<BatchSummary>
    where
        F: FnMut(usize, usize),
    {
        let per_page = limit.unwrap_or(self.config.general.batch_size);
        let items = self.service.find_items(per_page, direction)?;
        let total = items.len();
        tracing::info!("Processing {} items ({})", total, direction.as_str());

        let mut summary = BatchSummary::default();
        for (n, record) in items.iter().enumerate() {
            summary.items += 1;
            match self.process_item(record, index) {
                Ok(report) => summary.add(&report),
                Err(e) if e.is_fatal() => {
                    tracing::error!("[{}] Aborting the batch: {}", record.id, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("[{}] {}", record.id, e);
                    summary.failed_items += 1;
                }
            }
            progress(n + 1, total);
            tracing::debug!("Progress: {:.3}", progress_fraction(n + 1, total));
        }
        Ok(summary)
    }

    /// Process every file of one item.
    pub fn process_item(&self, record: &MetadataRecord, index: &mut dyn IndexStore) -> Result<ItemReport> {
        let mut report = ItemReport::default();
        if self.selector.skips(record) {
            tracing::debug!("[{}] Item ignored (not organized)", record.id);
            report.skipped = true;
            return Ok(report);
        }
        if record.files.is_empty() {
            tracing::warn!("[{}] Item has no file", record.id);
            return Ok(report);
        }

        let chain = resolve_studio_chain(record, self.service)?;
        let mut clean_tag_ids: Vec<String> = Vec::new();

        for (file_index, file) in record.files.iter().enumerate() {
            match self.process_file(record, &file.path, file_index, &chain, index) {
                Ok(FileOutcome::Renamed { clean_tag_ids: ids }) => {
                    report.renamed += 1;
                    for id in ids {
                        if !clean_tag_ids.contains(&id) {
                            clean_tag_ids.push(id);
                        }
                    }
                }
                Ok(FileOutcome::Unchanged) => report.unchanged += 1,
                Ok(FileOutcome::DryRun) => report.dry_run += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    if matches!(e, crate::Error::RollbackFailure { .. }) {
                        tracing::error!("[CRITICAL] [{}] {}", record.id, e);
                    } else {
                        tracing::error!("[{}] {}", record.id, e);
                    }
                    report.failed += 1;
                }
            }
        }

        if report.failed == 0 && report.renamed > 0 && !clean_tag_ids.is_empty() {
            tracing::info!("[{}] Removing tags {:?}", record.id, clean_tag_ids);
            self.service
                .remove_tags(std::slice::from_ref(&record.id), &clean_tag_ids)?;
        }
        Ok(report)
    }

    fn process_file(
        &self,
        record: &MetadataRecord,
        file_path: &Path,
        file_index: usize,
        chain: &[StudioRef],
        index: &mut dyn IndexStore,
    ) -> Result<FileOutcome> {
        let template = self.selector.select(record, file_path, chain)?;
        let option_dry_run = template.has_option(TemplateOption::DryRun);
        if option_dry_run && !self.config.general.dry_run {
            tracing::info!("Dry-Run on (activate by option)");
        }
        let dry_run = self.config.general.dry_run || option_dry_run;

        let fields = self.extractor.extract(record, file_path, &template, chain);
        tracing::debug!("[{}] Fields: {:?}", record.id, fields);

        let mut planned = match self.planner.plan(&template, fields, file_path, file_index) {
            Ok(planned) => planned,
            Err(e) => return self.fail(&record.id, dry_run, e),
        };
        let resolver = DuplicateResolver::new(self.service, &self.planner);
        if let Err(e) = resolver.resolve(&record.id, &template, &mut planned) {
            return self.fail(&record.id, dry_run, e);
        }

        let intent = &planned.intent;
        if intent.is_noop() {
            tracing::info!("Everything is ok. ({})", intent.current_filename());
            return Ok(FileOutcome::Unchanged);
        }
        if intent.current_directory() != intent.final_directory.as_path() {
            tracing::info!("File will be moved to another directory");
            tracing::debug!("[OLD path] {}", intent.current_path.display());
            tracing::debug!("[NEW path] {}", intent.final_path().display());
        }
        if intent.current_filename() != intent.final_filename {
            tracing::info!("The filename will be changed");
            tracing::debug!("[OLD filename] {}", intent.current_filename());
            tracing::debug!("[NEW filename] {}", intent.final_filename);
        }

        if dry_run {
            self.record_dry_run(&format!(
                "{}|{}|{}",
                record.id,
                intent.current_path.display(),
                intent.final_path().display()
            ))?;
            return Ok(FileOutcome::DryRun);
        }

        self.renamer.commit(&record.id, intent, index)?;
        let clean_tag_ids = if template.has_option(TemplateOption::CleanTag) {
            template.clean_tag_ids.clone()
        } else {
            Vec::new()
        };
        Ok(FileOutcome::Renamed { clean_tag_ids })
    }

    /// Surface a planning error, noting length overruns in the dry-run file.
    fn fail(&self, item_id: &str, dry_run: bool, e: crate::Error) -> Result<FileOutcome> {
        if let crate::Error::Length { ref path, .. } = e {
            if dry_run {
                self.record_dry_run(&format!("[LENGTH LIMIT] {}|{}", item_id, path))?;
            }
        }
        Err(e)
    }

    fn record_dry_run(&self, line: &str) -> Result<()> {
        tracing::info!("[DRY-RUN] {}", line);
        let Some(ref path) = self.dry_run_file else {
            return Ok(());
        };
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
