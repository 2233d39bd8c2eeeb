use crate::{
    archive::{ArchiveOutcome, Archiver},
    config::Config,
    convert::Converter,
    document::Document,
    error::PipelineError,
    latex, materialize,
    ocr::OcrProvider,
    report::{BatchReport, DocumentReport, FailureReport, WarningKind, WarningReport},
    scanner::scan_pdfs,
    util::{ensure_dir, hash_file, now_rfc3339},
};
use anyhow::Result;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{error, info, warn};

pub struct Pipeline<O: OcrProvider, C: Converter> {
    cfg: Config,
    ocr: O,
    converter: C,
    archiver: Archiver,
}

struct Processed {
    report: DocumentReport,
    warning: Option<WarningReport>,
}

impl<O: OcrProvider, C: Converter> Pipeline<O, C> {
    pub fn new(cfg: &Config, ocr: O, converter: C) -> Self {
        Self {
            cfg: cfg.clone(),
            archiver: Archiver::new(&cfg.paths.done_dir, cfg.archive.on_collision),
            ocr,
            converter,
        }
    }

    /// Processes every PDF in the intake directory, one at a time.
    ///
    /// Per-document failures land in the report; only an unreadable intake
    /// or unwritable output roots fail the batch itself.
    pub fn run_batch(&self) -> Result<BatchReport> {
        let paths = &self.cfg.paths;
        ensure_dir(&paths.ocr_output_dir)?;
        ensure_dir(&paths.latex_output_dir)?;
        ensure_dir(&paths.done_dir)?;

        let mut report = BatchReport {
            started: now_rfc3339(),
            ..Default::default()
        };

        let pdfs = scan_pdfs(&paths.input_dir)?;
        if pdfs.is_empty() {
            info!("no PDFs to process in {}", paths.input_dir.display());
        } else {
            info!("found {} PDF(s) in {}", pdfs.len(), paths.input_dir.display());
        }

        let mut claimed: HashSet<String> = HashSet::new();
        for path in pdfs {
            let mut doc = Document::new(path);

            if !claimed.insert(doc.base_name().to_string()) {
                warn!(
                    "{} shares base name '{}' with an earlier document; leaving it for the next run",
                    doc.file_name(),
                    doc.base_name()
                );
                report.warnings.push(WarningReport {
                    document: doc.file_name(),
                    kind: WarningKind::DuplicateBaseName,
                    message: format!(
                        "base name '{}' already processed in this batch",
                        doc.base_name()
                    ),
                });
                continue;
            }

            if let Some(taken) = self.archiver.blocked(doc.source()) {
                warn!(
                    "{} is already archived; leaving {} in intake",
                    taken.display(),
                    doc.file_name()
                );
                report.skipped += 1;
                report.warnings.push(WarningReport {
                    document: doc.file_name(),
                    kind: WarningKind::ArchiveCollision,
                    message: format!("{} existed; source left in intake", taken.display()),
                });
                continue;
            }

            match self.process(&mut doc) {
                Ok(done) => {
                    report.succeeded += 1;
                    report.documents.push(done.report);
                    report.warnings.extend(done.warning);
                }
                Err(err) => {
                    let stage = doc.fail();
                    error!("{} failed at {:?}: {}", doc.file_name(), stage, err);
                    report.failed += 1;
                    report.failures.push(FailureReport {
                        document: doc.file_name(),
                        stage,
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        }

        report.finished = now_rfc3339();
        info!(
            "batch done: {} succeeded, {} failed, {} skipped",
            report.succeeded, report.failed, report.skipped
        );
        Ok(report)
    }

    /// Drives one document from `Pending` to `Archived`. On error the
    /// document's state still names the stage that was running.
    fn process(&self, doc: &mut Document) -> Result<Processed, PipelineError> {
        let started = Instant::now();
        let paths = &self.cfg.paths;
        info!("processing {}", doc.file_name());

        let input_sha256 = match hash_file(doc.source()) {
            Ok(h) => Some(h),
            Err(e) => {
                warn!("could not hash {}: {e}", doc.source().display());
                None
            }
        };

        doc.advance();
        let result = self.ocr.process(doc.source())?;
        doc.advance();

        doc.advance();
        let staging_dir = paths.ocr_output_dir.join(doc.base_name());
        let staged = materialize::materialize(&self.cfg, &result, &staging_dir)?;
        doc.advance();

        doc.advance();
        let output_dir = paths.latex_output_dir.join(doc.base_name());
        let tex = latex::render(
            &self.cfg,
            &self.converter,
            &staged,
            &output_dir,
            doc.base_name(),
        )?;
        doc.advance();

        let outcome = self.archiver.archive(doc.source())?;
        let (archived_as, warning) = match &outcome {
            ArchiveOutcome::Moved { to } => (Some(to.clone()), None),
            ArchiveOutcome::Renamed { to, taken } => (
                Some(to.clone()),
                Some(format!(
                    "{} existed; archived as {}",
                    taken.display(),
                    to.display()
                )),
            ),
            ArchiveOutcome::Skipped { taken } => (
                None,
                Some(format!(
                    "{} existed; source left in intake",
                    taken.display()
                )),
            ),
        };
        if archived_as.is_some() {
            doc.advance();
        }

        info!(
            "done {} in {:?}",
            doc.file_name(),
            started.elapsed()
        );

        Ok(Processed {
            report: DocumentReport {
                document: doc.file_name(),
                base_name: doc.base_name().to_string(),
                input_sha256,
                pages: result.pages.len(),
                images: staged.images.len(),
                markdown: staged.markdown_path,
                tex: tex.tex_path,
                archived_as,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
            warning: warning.map(|message| WarningReport {
                document: doc.file_name(),
                kind: WarningKind::ArchiveCollision,
                message,
            }),
        })
    }
}
