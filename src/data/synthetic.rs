//! Synthetic station series generation.
//!
//! Produces `tenv3` rows from a known trajectory plus Gaussian noise, so the
//! whole pipeline (parse → ingest → fit) can be exercised offline. The demo
//! configuration mimics a station near the 2011 Tohoku rupture.

use chrono::{Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::tenv3::{Reading, Tenv3Record, split_metres};
use crate::domain::{
    Component, Coordinate, DecayKind, Event, EventTerms, ParameterVector, decimal_year,
    decimal_year_from_date,
};
use crate::error::AppError;
use crate::models::TrajectoryModel;

/// An event with its true per-component response (m), ENU order.
#[derive(Debug, Clone)]
pub struct SyntheticEvent {
    pub event: Event,
    pub offsets: [f64; 3],
    pub amplitudes: [f64; 3],
    /// Relaxation time constant (days).
    pub t_relax: f64,
}

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub station: String,
    pub reference: Coordinate,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cadence_days: i64,
    /// Secular rates (m/yr), ENU order.
    pub rates: [f64; 3],
    pub events: Vec<SyntheticEvent>,
    pub decay: DecayKind,
    /// Noise standard deviation (m), ENU order. Also written as the reported sigma.
    pub noise: [f64; 3],
    /// Probability that a day is missing.
    pub gap_probability: f64,
    pub seed: u64,
}

impl SyntheticConfig {
    /// Station J299-like series, 2008–2016, with the 2011 Tohoku and 2013
    /// Honshu events and a 320.2 day logarithmic relaxation.
    pub fn demo() -> Self {
        let tohoku = event_at("tohoku-2011", (2011, 3, 11), (5, 46, 24), 9.1, "Tohoku 2011 (Mw 9.1)");
        let honshu = event_at("honshu-2013", (2013, 10, 25), (17, 10, 18), 7.1, "Honshu 2013 (Mw 7.1)");

        let mut reference = Coordinate::new(38.30, 141.50);
        reference.height = Some(74.0);

        Self {
            station: "J299".to_string(),
            reference,
            start: NaiveDate::from_ymd_opt(2008, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap_or(NaiveDate::MIN),
            cadence_days: 1,
            rates: [0.0066, -0.0083, -0.002],
            events: vec![
                SyntheticEvent {
                    event: tohoku,
                    offsets: [2.10, -0.95, -0.42],
                    amplitudes: [0.28, -0.09, 0.04],
                    t_relax: 320.2,
                },
                SyntheticEvent {
                    event: honshu,
                    offsets: [0.004, -0.003, 0.0],
                    amplitudes: [0.002, -0.001, 0.0],
                    t_relax: 320.2,
                },
            ],
            decay: DecayKind::Logarithmic,
            noise: [0.0015, 0.0015, 0.005],
            gap_probability: 0.02,
            seed: 2011,
        }
    }

    /// True parameters of one component, for comparison against a fit.
    pub fn truth(&self, component: Component) -> ParameterVector {
        let i = component.index();
        let mut params = ParameterVector::secular(0.0, self.rates[i]);
        params.events = self
            .events
            .iter()
            .map(|e| EventTerms {
                event: e.event.clone(),
                offset: e.offsets[i],
                amplitude: e.amplitudes[i],
                t_relax: e.t_relax,
            })
            .collect();
        params
    }
}

fn event_at(id: &str, ymd: (i32, u32, u32), hms: (u32, u32, u32), magnitude: f64, label: &str) -> Event {
    let epoch = NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2)
        .and_then(|d| d.and_hms_opt(hms.0, hms.1, hms.2))
        .map(decimal_year)
        .unwrap_or(ymd.0 as f64);
    let mut event = Event::new(id, epoch);
    event.magnitude = Some(magnitude);
    event.label = Some(label.to_string());
    event
}

/// Generate daily `tenv3` rows (at noon) for the configured trajectory.
pub fn generate(config: &SyntheticConfig) -> Result<Vec<Tenv3Record>, AppError> {
    if config.end < config.start {
        return Err(AppError::new(2, "Synthetic end date must not precede start date."));
    }
    if config.cadence_days <= 0 {
        return Err(AppError::new(2, "Synthetic cadence must be >= 1 day."));
    }
    if !(0.0..1.0).contains(&config.gap_probability) {
        return Err(AppError::new(2, "Gap probability must be in [0, 1)."));
    }
    if config.noise.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return Err(AppError::new(2, "Synthetic noise sigma must be finite and > 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let t0 = decimal_year_from_date(config.start);
    let model = TrajectoryModel::new(t0, config.decay);
    let truth = Component::ALL.map(|c| config.truth(c));

    let mut records = Vec::new();
    let mut date = config.start;
    while date <= config.end {
        // Draw for every day so the noise sequence does not depend on the gaps.
        let z = [normal.sample(&mut rng), normal.sample(&mut rng), normal.sample(&mut rng)];
        let missing = config.gap_probability > 0.0 && rng.gen_bool(config.gap_probability);

        if !missing {
            let epoch = date
                .and_hms_opt(12, 0, 0)
                .map(decimal_year)
                .unwrap_or_else(|| decimal_year_from_date(date));
            let reading = |c: Component| {
                let i = c.index();
                let value = model.evaluate(&truth[i], epoch) + config.noise[i] * z[i];
                let (integer, fraction) = split_metres(value);
                Reading {
                    integer,
                    fraction,
                    sigma: config.noise[i],
                }
            };
            records.push(Tenv3Record {
                station: config.station.clone(),
                date,
                epoch,
                east: reading(Component::East),
                north: reading(Component::North),
                up: reading(Component::Up),
                latitude: config.reference.latitude,
                longitude: config.reference.longitude,
                height: config.reference.height.unwrap_or(0.0),
            });
        }

        date = match date.checked_add_signed(Duration::days(config.cadence_days)) {
            Some(next) => next,
            None => break,
        };
    }

    log::info!(
        "generated {} synthetic rows for {} ({}..{})",
        records.len(),
        config.station,
        config.start,
        config.end
    );
    Ok(records)
}
