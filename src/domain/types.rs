//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{FitError, InvalidSample, InvalidSampleReason};

/// Local East-North-Up displacement component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    East,
    North,
    Up,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::East, Component::North, Component::Up];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Component::East => "East",
            Component::North => "North",
            Component::Up => "Vertical",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Component::East => 0,
            Component::North => 1,
            Component::Up => 2,
        }
    }
}

/// Which component(s) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ComponentSpec {
    All,
    East,
    North,
    Up,
}

impl ComponentSpec {
    pub fn components(self) -> Vec<Component> {
        match self {
            ComponentSpec::All => Component::ALL.to_vec(),
            ComponentSpec::East => vec![Component::East],
            ComponentSpec::North => vec![Component::North],
            ComponentSpec::Up => vec![Component::Up],
        }
    }
}

/// Functional form of the post-seismic relaxation term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum DecayKind {
    /// `ln(1 + Δt/T)`.
    #[serde(rename = "log")]
    #[value(name = "log")]
    Logarithmic,
    /// `1 - exp(-Δt/T)`.
    #[serde(rename = "exp")]
    #[value(name = "exp")]
    Exponential,
}

impl DecayKind {
    pub fn display_name(self) -> &'static str {
        match self {
            DecayKind::Logarithmic => "logarithmic",
            DecayKind::Exponential => "exponential",
        }
    }
}

/// How observations are weighted in the least-squares objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightMode {
    /// Weight each sample by `1/σ²`.
    Sigma,
    /// Ordinary least squares.
    Uniform,
}

/// How relaxation time constants are shared between events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RelaxationMode {
    /// One `T_relax` for every event (grid size = number of candidates).
    Shared,
    /// Independent `T_relax` per event (cross product of the candidates).
    PerEvent,
}

/// Spacing of generated grid candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GridSpacing {
    Linear,
    Log,
}

/// One displacement observation.
///
/// Fields are private so that every `Sample` in the program has passed
/// validation: finite epoch and value, and `sigma > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    epoch: f64,
    value: f64,
    sigma: f64,
}

impl Sample {
    pub fn new(epoch: f64, value: f64, sigma: f64) -> Result<Self, InvalidSample> {
        let reason = if !epoch.is_finite() {
            Some(InvalidSampleReason::NonFiniteEpoch)
        } else if !value.is_finite() {
            Some(InvalidSampleReason::NonFiniteValue)
        } else if !(sigma.is_finite() && sigma > 0.0) {
            Some(InvalidSampleReason::NonPositiveSigma)
        } else {
            None
        };
        match reason {
            Some(reason) => Err(InvalidSample { epoch, reason }),
            None => Ok(Self { epoch, value, sigma }),
        }
    }

    /// Decimal year.
    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    /// Displacement in metres.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// One-sigma uncertainty in metres.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

/// A discrete event (earthquake) that may cause an offset and relaxation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// Decimal year.
    pub epoch: f64,
    #[serde(default)]
    pub magnitude: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

impl Event {
    pub fn new(id: impl Into<String>, epoch: f64) -> Self {
        Self {
            id: id.into(),
            epoch,
            magnitude: None,
            label: None,
        }
    }
}

/// Geographic reference position of a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub height: Option<f64>,
}

impl Coordinate {
    /// Build a coordinate, wrapping longitude into `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        let mut longitude = longitude;
        if longitude < -180.0 {
            longitude += 360.0;
        } else if longitude > 180.0 {
            longitude -= 360.0;
        }
        Self {
            latitude,
            longitude,
            height: None,
        }
    }
}

/// Closed epoch interval `[start, end]` in decimal years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn contains(&self, epoch: f64) -> bool {
        epoch >= self.start && epoch <= self.end
    }

    /// Span of the given samples, or `None` when there are none.
    pub fn of_samples<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Option<Self> {
        let mut start = f64::INFINITY;
        let mut end = f64::NEG_INFINITY;
        for s in samples {
            start = start.min(s.epoch());
            end = end.max(s.epoch());
        }
        if start.is_finite() && end.is_finite() {
            Some(Self { start, end })
        } else {
            None
        }
    }
}

/// All three components of one station, ordered ascending by epoch.
#[derive(Debug, Clone)]
pub struct StationSeries {
    pub station: String,
    pub reference: Coordinate,
    pub span: TimeSpan,
    pub east: Vec<Sample>,
    pub north: Vec<Sample>,
    pub up: Vec<Sample>,
}

impl StationSeries {
    /// Assemble a series; sorts each component and computes the span.
    ///
    /// Returns `None` when every component is empty.
    pub fn new(
        station: impl Into<String>,
        reference: Coordinate,
        components: [Vec<Sample>; 3],
    ) -> Option<Self> {
        let [mut east, mut north, mut up] = components;
        for samples in [&mut east, &mut north, &mut up] {
            samples.sort_by(|a, b| a.epoch().total_cmp(&b.epoch()));
        }
        let span = TimeSpan::of_samples(east.iter().chain(north.iter()).chain(up.iter()))?;
        Some(Self {
            station: station.into(),
            reference,
            span,
            east,
            north,
            up,
        })
    }

    pub fn component(&self, component: Component) -> &[Sample] {
        match component {
            Component::East => &self.east,
            Component::North => &self.north,
            Component::Up => &self.up,
        }
    }

    pub fn total_samples(&self) -> usize {
        self.east.len() + self.north.len() + self.up.len()
    }
}

/// Candidate values for one nonlinear parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    parameter: String,
    values: Vec<f64>,
}

impl GridSpec {
    /// Build a grid; every candidate must be finite and strictly positive.
    ///
    /// An empty grid is accepted here and rejected by the optimizer, which
    /// reports it as an underdetermined run.
    pub fn new(parameter: impl Into<String>, values: Vec<f64>) -> Result<Self, FitError> {
        let parameter = parameter.into();
        if let Some(bad) = values.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
            return Err(FitError::InvalidGrid {
                parameter,
                reason: format!("candidate {bad} must be finite and > 0"),
            });
        }
        Ok(Self { parameter, values })
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fitted terms attached to one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTerms {
    pub event: Event,
    /// Co-seismic step (m).
    pub offset: f64,
    /// Relaxation amplitude (m).
    pub amplitude: f64,
    /// Relaxation time constant (days).
    pub t_relax: f64,
}

/// Annual and semi-annual sinusoid coefficients (m).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SeasonalTerms {
    pub annual_sin: f64,
    pub annual_cos: f64,
    pub semiannual_sin: f64,
    pub semiannual_cos: f64,
}

/// Parameters of the trajectory model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterVector {
    /// Position at the reference epoch `t0` (m).
    pub intercept: f64,
    /// Secular rate (m/yr).
    pub rate: f64,
    pub events: Vec<EventTerms>,
    #[serde(default)]
    pub seasonal: Option<SeasonalTerms>,
}

impl ParameterVector {
    /// A purely secular trajectory.
    pub fn secular(intercept: f64, rate: f64) -> Self {
        Self {
            intercept,
            rate,
            events: Vec::new(),
            seasonal: None,
        }
    }

    /// All parameters as `(name, value)` pairs, in a stable order.
    pub fn named(&self) -> Vec<(String, f64)> {
        let mut out = vec![
            ("intercept".to_string(), self.intercept),
            ("rate".to_string(), self.rate),
        ];
        for term in &self.events {
            let id = &term.event.id;
            out.push((format!("offset[{id}]"), term.offset));
            out.push((format!("amplitude[{id}]"), term.amplitude));
            out.push((format!("t_relax[{id}]"), term.t_relax));
        }
        if let Some(s) = &self.seasonal {
            out.push(("annual_sin".to_string(), s.annual_sin));
            out.push(("annual_cos".to_string(), s.annual_cos));
            out.push(("semiannual_sin".to_string(), s.semiannual_sin));
            out.push(("semiannual_cos".to_string(), s.semiannual_cos));
        }
        out
    }

    /// Look up a parameter by the names produced by [`ParameterVector::named`].
    pub fn get(&self, name: &str) -> Option<f64> {
        self.named()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Relaxation constants, one per event (days).
    pub fn relaxation_constants(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.t_relax).collect()
    }
}

/// Outcome of a single grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridPointStatus {
    Evaluated,
    /// The weighted least-squares system was singular.
    Singular,
    /// Skipped because the run was cancelled first.
    NotEvaluated,
}

/// One row of the per-grid-point residual table.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    /// Position in the candidate enumeration.
    pub index: usize,
    /// Relaxation constants of this candidate (days). One entry in shared
    /// mode, one per event in per-event mode.
    pub t_relax: Vec<f64>,
    /// Weighted SSE, `+∞` for singular or skipped points.
    pub residual: f64,
    pub status: GridPointStatus,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub n: usize,
    /// Free linear parameters plus searched relaxation constants.
    pub n_params: usize,
    /// Weighted residual sum of squares (the optimized objective).
    pub sse: f64,
    /// Unweighted root-mean-square residual (m).
    pub rmse: f64,
    /// Weighted root-mean-square residual (m).
    pub wrms: f64,
    /// `sse / (n - n_params)` when defined.
    pub chi2_reduced: Option<f64>,
}

/// Result of one optimizer invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub params: ParameterVector,
    /// Weighted residual sum of squares of the selected candidate.
    pub residual: f64,
    pub grid: Vec<GridPoint>,
    /// Index of the selected point in `grid`.
    pub selected: usize,
    pub quality: FitQuality,
    /// Reference epoch of the secular term.
    pub t0: f64,
    pub decay: DecayKind,
    pub weighting: WeightMode,
    /// `true` when the search was cancelled before every point ran.
    pub partial: bool,
}

impl FitResult {
    /// Number of grid points that actually produced a solution.
    pub fn evaluated(&self) -> usize {
        self.grid
            .iter()
            .filter(|p| p.status == GridPointStatus::Evaluated)
            .count()
    }
}

/// Fit of a single ENU component.
#[derive(Debug, Clone)]
pub struct ComponentFit {
    pub component: Component,
    pub result: FitResult,
}

/// Fits for all requested components of a station.
#[derive(Debug, Clone)]
pub struct StationFit {
    pub station: String,
    /// Events that contributed terms (inside the series span).
    pub events: Vec<Event>,
    pub fits: Vec<ComponentFit>,
    /// Components that could not be fitted and why.
    pub skipped: Vec<(Component, FitError)>,
}

impl StationFit {
    pub fn component(&self, component: Component) -> Option<&FitResult> {
        self.fits
            .iter()
            .find(|f| f.component == component)
            .map(|f| &f.result)
    }

    pub fn is_partial(&self) -> bool {
        self.fits.iter().any(|f| f.result.partial)
    }
}

/// A saved fit file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub station: String,
    pub reference: Coordinate,
    pub span: TimeSpan,
    pub decay: DecayKind,
    pub weighting: WeightMode,
    pub events: Vec<Event>,
    pub components: Vec<ComponentFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentFile {
    pub component: Component,
    pub t0: f64,
    pub partial: bool,
    pub params: ParameterVector,
    pub named: Vec<NamedValue>,
    pub quality: FitQuality,
    pub grid: Vec<GridRow>,
    pub curve: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
}

/// Serialized grid row; `residual` is `None` where the in-memory value is `+∞`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRow {
    pub t_relax: Vec<f64>,
    pub residual: Option<f64>,
    pub status: GridPointStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub epochs: Vec<f64>,
    pub values: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rejects_bad_readings() {
        assert!(Sample::new(2010.0, 0.1, 0.002).is_ok());
        let err = Sample::new(2010.0, f64::NAN, 0.002).unwrap_err();
        assert_eq!(err.reason, InvalidSampleReason::NonFiniteValue);
        let err = Sample::new(2010.0, 0.1, 0.0).unwrap_err();
        assert_eq!(err.reason, InvalidSampleReason::NonPositiveSigma);
        let err = Sample::new(f64::INFINITY, 0.1, 0.002).unwrap_err();
        assert_eq!(err.reason, InvalidSampleReason::NonFiniteEpoch);
    }

    #[test]
    fn grid_rejects_non_positive_candidates() {
        assert!(GridSpec::new("t_relax", vec![10.0, 50.0]).is_ok());
        assert!(GridSpec::new("t_relax", vec![10.0, 0.0]).is_err());
        assert!(GridSpec::new("t_relax", vec![-5.0]).is_err());
        assert!(GridSpec::new("t_relax", vec![]).unwrap().is_empty());
    }

    #[test]
    fn coordinate_wraps_longitude() {
        assert!((Coordinate::new(38.0, -218.5).longitude - 141.5).abs() < 1e-12);
        assert!((Coordinate::new(38.0, 200.0).longitude + 160.0).abs() < 1e-12);
    }

    #[test]
    fn station_series_sorts_components_and_spans_all() {
        let s = |t: f64| Sample::new(t, 0.0, 0.001).unwrap();
        let series = StationSeries::new(
            "TEST",
            Coordinate::new(0.0, 0.0),
            [vec![s(2012.0), s(2010.0)], vec![s(2011.0)], vec![]],
        )
        .unwrap();
        assert_eq!(series.east[0].epoch(), 2010.0);
        assert_eq!(series.span, TimeSpan { start: 2010.0, end: 2012.0 });
        assert!(StationSeries::new("X", Coordinate::new(0.0, 0.0), [vec![], vec![], vec![]]).is_none());
    }

    #[test]
    fn named_parameters_include_event_terms() {
        let mut p = ParameterVector::secular(0.1, 0.01);
        p.events.push(EventTerms {
            event: Event::new("tohoku", 2011.19),
            offset: 0.05,
            amplitude: 0.02,
            t_relax: 50.0,
        });
        assert_eq!(p.get("rate"), Some(0.01));
        assert_eq!(p.get("t_relax[tohoku]"), Some(50.0));
        assert_eq!(p.get("annual_sin"), None);
        assert_eq!(p.named().len(), 5);
    }
}
