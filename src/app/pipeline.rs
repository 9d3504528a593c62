//! Shared "fit pipeline" logic used by `etm fit` and `etm synth --fit`.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! series fetch -> event collection -> per-component grid search -> residuals
//!
//! The callers then only decide where the results go (sinks).

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use crate::app::progress::BarObserver;
use crate::data::{EventCatalog, FileProvider, NglClient, Region, SeriesProvider, StaticCatalog, UsgsCatalog};
use crate::domain::{Event, StationFit};
use crate::error::AppError;
use crate::fit::{CancelToken, GridObserver, NoopObserver, StationFitPlan, fit_station};
use crate::io::{IngestedSeries, filter_events};
use crate::report::{SampleResidual, station_residuals};

/// Where the station series comes from.
#[derive(Debug, Clone)]
pub enum SeriesSource {
    /// Download from the NGL archive.
    Remote { station: String },
    /// Read a local tenv3 file.
    File { station: String, path: PathBuf },
}

impl SeriesSource {
    pub fn station(&self) -> &str {
        match self {
            SeriesSource::Remote { station } | SeriesSource::File { station, .. } => station,
        }
    }
}

/// USGS catalog query settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsgsQuery {
    pub min_magnitude: f64,
    pub radius_km: f64,
}

/// Where events come from. All sources are merged.
#[derive(Debug, Clone, Default)]
pub struct EventSources {
    pub listed: Vec<Event>,
    pub csv: Option<PathBuf>,
    pub usgs: Option<UsgsQuery>,
}

/// Everything needed for a single fit run.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub source: SeriesSource,
    pub events: EventSources,
    pub plan: StationFitPlan,
    pub threads: Option<usize>,
    pub time_limit: Option<Duration>,
    pub progress: bool,
}

/// All computed outputs of a single fit run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedSeries,
    pub fit: StationFit,
    pub residuals: Vec<SampleResidual>,
    /// Events discarded because they fall outside the series span.
    pub dropped_events: usize,
}

/// Execute the full pipeline against the configured provider and catalogs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let provider: Box<dyn SeriesProvider> = match &config.source {
        SeriesSource::Remote { .. } => Box::new(NglClient::from_env()?),
        SeriesSource::File { path, .. } => Box::new(FileProvider::new(path)),
    };
    let catalogs = build_catalogs(&config.events)?;

    let observer: Box<dyn GridObserver> = if config.progress {
        Box::new(BarObserver::new())
    } else {
        Box::new(NoopObserver)
    };

    run_fit_with(config, provider.as_ref(), &catalogs, observer.as_ref())
}

/// Execute the pipeline with explicit collaborators.
pub fn run_fit_with(
    config: &FitConfig,
    provider: &dyn SeriesProvider,
    catalogs: &[(Box<dyn EventCatalog>, Option<f64>)],
    observer: &dyn GridObserver,
) -> Result<RunOutput, AppError> {
    // 1) Series.
    let ingest = provider.fetch(config.source.station())?;
    let series = &ingest.series;
    log::info!(
        "{}: {} samples over [{:.4}, {:.4}]",
        series.station,
        series.total_samples(),
        series.span.start,
        series.span.end
    );

    // 2) Events.
    let mut events = Vec::new();
    for (catalog, radius_km) in catalogs {
        let region = radius_km.map(|radius_km| Region {
            latitude: series.reference.latitude,
            longitude: series.reference.longitude,
            radius_km,
        });
        events.extend(catalog.events(&series.span, region.as_ref())?);
    }
    let events = dedupe_events(events);
    let filtered = filter_events(&events, &series.span);
    if filtered.dropped > 0 {
        log::warn!("{} events outside the series span were ignored", filtered.dropped);
    }

    // 3) Fit.
    let cancel = CancelToken::new();
    let _deadline = config.time_limit.map(|limit| spawn_deadline(cancel.clone(), limit));

    let fit = match config.threads {
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| AppError::new(2, format!("Failed to build thread pool: {e}")))?;
            pool.install(|| fit_station(series, &filtered.kept, &config.plan, &cancel, observer))?
        }
        None => fit_station(series, &filtered.kept, &config.plan, &cancel, observer)?,
    };
    if fit.is_partial() {
        log::warn!("time limit reached: results are based on a partial grid search");
    }

    // 4) Residuals.
    let residuals = station_residuals(series, &fit)?;

    Ok(RunOutput {
        dropped_events: filtered.dropped,
        ingest,
        fit,
        residuals,
    })
}

/// Catalogs for the configured sources, each with the search radius to use
/// (`None` for sources without locations).
pub fn build_catalogs(sources: &EventSources) -> Result<Vec<(Box<dyn EventCatalog>, Option<f64>)>, AppError> {
    let mut catalogs: Vec<(Box<dyn EventCatalog>, Option<f64>)> = Vec::new();
    if !sources.listed.is_empty() {
        catalogs.push((Box::new(StaticCatalog::new(sources.listed.clone())), None));
    }
    if let Some(path) = &sources.csv {
        catalogs.push((Box::new(StaticCatalog::from_csv(path)?), None));
    }
    if let Some(query) = sources.usgs {
        catalogs.push((
            Box::new(UsgsCatalog::from_env(query.min_magnitude)?),
            Some(query.radius_km),
        ));
    }
    Ok(catalogs)
}

/// Drop repeated ids (first occurrence wins) and order by epoch.
fn dedupe_events(events: Vec<Event>) -> Vec<Event> {
    let mut out: Vec<Event> = Vec::with_capacity(events.len());
    for e in events {
        if out.iter().any(|seen| seen.id == e.id) {
            log::debug!("duplicate event id {} ignored", e.id);
            continue;
        }
        out.push(e);
    }
    out.sort_by(|a, b| a.epoch.total_cmp(&b.epoch).then_with(|| a.id.cmp(&b.id)));
    out
}

/// Cancel `token` after `limit` unless the returned sender is dropped first.
fn spawn_deadline(token: CancelToken, limit: Duration) -> mpsc::Sender<()> {
    let (tx, rx) = mpsc::channel::<()>();
    std::thread::spawn(move || {
        if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(limit) {
            log::warn!("time limit of {:.1}s reached, cancelling grid search", limit.as_secs_f64());
            token.cancel();
        }
    });
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticConfig, generate, write_tenv3};
    use crate::domain::{Component, GridSpec};
    use crate::fit::{OptimizeOptions, Parallelism};

    fn synthetic_file(dir: &tempfile::TempDir) -> (PathBuf, SyntheticConfig) {
        let mut synth = SyntheticConfig::demo();
        synth.start = chrono::NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        synth.end = chrono::NaiveDate::from_ymd_opt(2012, 12, 31).unwrap();
        synth.cadence_days = 4;
        synth.events.truncate(1);
        let rows = generate(&synth).unwrap();
        let path = dir.path().join("J299.tenv3");
        std::fs::write(&path, write_tenv3(&rows)).unwrap();
        (path, synth)
    }

    fn config(path: PathBuf) -> FitConfig {
        FitConfig {
            source: SeriesSource::File {
                station: "J299".to_string(),
                path,
            },
            events: EventSources::default(),
            plan: StationFitPlan {
                grid: GridSpec::new("t_relax", vec![50.0, 320.2, 1000.0]).unwrap(),
                options: OptimizeOptions {
                    parallelism: Parallelism::Sequential,
                    ..OptimizeOptions::default()
                },
                components: Component::ALL.to_vec(),
            },
            threads: Some(2),
            time_limit: None,
            progress: false,
        }
    }

    #[test]
    fn recovers_synthetic_trajectory_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let (path, synth) = synthetic_file(&dir);
        let tohoku = synth.events[0].event.clone();
        let provider = FileProvider::new(path.clone());
        let mut cfg = config(path);
        cfg.events.listed = vec![tohoku.clone(), tohoku, Event::new("future", 2030.0)];

        let catalogs = build_catalogs(&cfg.events).unwrap();
        let out = run_fit_with(&cfg, &provider, &catalogs, &NoopObserver).unwrap();

        assert_eq!(out.fit.events.len(), 1);
        assert_eq!(out.dropped_events, 1);
        assert_eq!(out.fit.fits.len(), 3);
        let east = out.fit.component(Component::East).unwrap();
        assert_eq!(east.params.relaxation_constants(), vec![320.2]);
        assert!((east.params.rate - 0.0066).abs() < 2e-3);
        assert!((east.params.events[0].offset - 2.10).abs() < 0.02);
        assert_eq!(out.residuals.len(), out.ingest.series.total_samples());
    }

    #[test]
    fn dedupe_keeps_first_and_sorts() {
        let mut a = Event::new("a", 2012.0);
        a.label = Some("first".to_string());
        let mut dup = Event::new("a", 2011.0);
        dup.label = Some("second".to_string());
        let out = dedupe_events(vec![a, Event::new("b", 2010.0), dup]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "b");
        assert_eq!(out[1].label.as_deref(), Some("first"));
    }

    #[test]
    fn missing_input_file_is_a_usage_error() {
        let cfg = config(PathBuf::from("/nonexistent/J299.tenv3"));
        assert_eq!(run_fit(&cfg).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn deadline_cancels_token() {
        let token = CancelToken::new();
        let _tx = spawn_deadline(token.clone(), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(200));
        assert!(token.is_cancelled());

        let token = CancelToken::new();
        let tx = spawn_deadline(token.clone(), Duration::from_millis(100));
        drop(tx);
        std::thread::sleep(Duration::from_millis(250));
        assert!(!token.is_cancelled());
    }
}
