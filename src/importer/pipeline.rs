use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tokio_util::sync::CancellationToken;

use crate::importer::{
    Columns, CsvReader, ImportConfig, ImportError, ImportStats, ImportSummary, RowParser,
};
use crate::storage::{Chunk, ChunkRepository};

/// Imports `config.file_path` into `repo`, blocking until every worker is done.
///
/// Row-level insert failures are counted in `stats` and do not stop the run.
/// A parse error stops reading; rows already queued are still written before
/// the error is returned.
pub fn run_import<R>(
    repo: &R,
    config: &ImportConfig,
    stats: &ImportStats,
    cancel: &CancellationToken,
) -> Result<(), ImportError>
where
    R: ChunkRepository + ?Sized,
{
    config.validate()?;

    let file = File::open(&config.file_path).map_err(|e| ImportError::Open {
        path: config.file_path.clone(),
        source: e,
    })?;
    let mut reader = CsvReader::new(BufReader::new(file));
    let header = reader.read_record()?.ok_or(ImportError::MissingHeader)?;
    let columns = Columns::from_header(&header)?;
    let parser = RowParser::new(config.dimension);
    let batch_size = config.batch_size.max(1);

    thread::scope(|scope| {
        let (tx, rx) = crossbeam_channel::bounded::<Chunk>(config.workers * 2);

        for worker in 0..config.workers {
            let rx = rx.clone();
            thread::Builder::new()
                .name(format!("import-worker-{worker}"))
                .spawn_scoped(scope, move || insert_worker(repo, rx, stats, batch_size))?;
        }
        drop(rx);

        let mut feed = Feed {
            reader: &mut reader,
            columns: &columns,
            parser: &parser,
            stats,
            limit: config.limit,
            cancel,
        };
        feed.run(tx)
    })
}

struct Feed<'a, B> {
    reader: &'a mut CsvReader<B>,
    columns: &'a Columns,
    parser: &'a RowParser,
    stats: &'a ImportStats,
    limit: usize,
    cancel: &'a CancellationToken,
}

impl<B: BufRead> Feed<'_, B> {
    /// Parses rows and queues them until EOF, `limit` or the first error.
    ///
    /// Dropping `tx` on return lets the workers drain and exit.
    fn run(&mut self, tx: Sender<Chunk>) -> Result<(), ImportError> {
        let mut parsed: u64 = 0;
        loop {
            if self.limit > 0 && parsed >= self.limit as u64 {
                return Ok(());
            }
            if self.cancel.is_cancelled() {
                return Err(ImportError::Cancelled { rows: parsed });
            }

            let Some(record) = self.reader.read_record()? else {
                return Ok(());
            };
            let chunk = self
                .parser
                .parse_row(&record, self.columns)
                .map_err(|source| ImportError::Row {
                    row: parsed + 1,
                    line: self.reader.record_line(),
                    source,
                })?;

            self.stats.add_read(1);
            if tx.send(chunk).is_err() {
                return Ok(());
            }
            parsed += 1;
        }
    }
}

fn insert_worker<R>(repo: &R, rx: Receiver<Chunk>, stats: &ImportStats, batch_size: usize)
where
    R: ChunkRepository + ?Sized,
{
    let mut batch = Vec::with_capacity(batch_size);
    for chunk in rx {
        batch.push(chunk);
        if batch.len() >= batch_size {
            flush(repo, &mut batch, stats);
        }
    }
    flush(repo, &mut batch, stats);
}

fn flush<R>(repo: &R, batch: &mut Vec<Chunk>, stats: &ImportStats)
where
    R: ChunkRepository + ?Sized,
{
    if batch.is_empty() {
        return;
    }

    let size = batch.len() as u64;
    match repo.insert_batch(std::mem::take(batch)) {
        Ok(inserted) => {
            stats.add_inserted(inserted);
            stats.add_duplicates(size.saturating_sub(inserted));
        }
        Err(e) => {
            tracing::warn!(rows = size, error = %e, "insert batch failed");
            stats.add_failed(size);
        }
    }
}

/// Runs [`run_import`] on a blocking thread, logging progress every
/// `progress_interval` and a summary at the end.
pub async fn exec_import<R>(
    repo: Arc<R>,
    config: ImportConfig,
    progress_interval: Duration,
    cancel: CancellationToken,
) -> Result<ImportSummary, ImportError>
where
    R: ChunkRepository + ?Sized + 'static,
{
    tracing::info!(
        file = %config.file_path.display(),
        workers = config.workers,
        batch_size = config.batch_size,
        limit = config.limit,
        "import started"
    );

    let start = Instant::now();
    let stats = Arc::new(ImportStats::new());
    let task_stats = Arc::clone(&stats);
    let mut task = tokio::task::spawn_blocking(move || {
        run_import(repo.as_ref(), &config, &task_stats, &cancel)
    });

    let mut ticker = tokio::time::interval(progress_interval.max(Duration::from_millis(10)));
    ticker.tick().await;
    let joined = loop {
        tokio::select! {
            joined = &mut task => break joined,
            _ = ticker.tick() => {
                let progress = stats.snapshot();
                tracing::info!(
                    read = progress.read,
                    inserted = progress.inserted,
                    duplicates = progress.duplicates,
                    failed = progress.failed,
                    "import progress"
                );
            }
        }
    };

    let result = joined
        .map_err(|e| ImportError::Task(e.to_string()))
        .and_then(|result| result);
    let duration = start.elapsed();
    let totals = stats.snapshot();

    if let Err(e) = &result {
        tracing::error!(duration = ?duration, error = %e, "import failed");
    }
    tracing::info!(
        duration = ?duration,
        read = totals.read,
        inserted = totals.inserted,
        duplicates = totals.duplicates,
        failed = totals.failed,
        "import finished"
    );

    result.map(|()| totals)
}
