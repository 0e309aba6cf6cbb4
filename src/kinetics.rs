//! DNA-PAINT blinking kinetics.
//!
//! A binding site alternates between dark (unbound) and bright (bound,
//! emitting) periods with exponentially distributed durations. This module
//! draws such a trace long enough to cover the whole movie and turns every
//! bright period into per-frame detected photon counts, honouring a
//! per-site photon budget after which the label is considered bleached.

use rand::Rng;
use rand_distr::{Distribution, Exp1, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ensure_non_negative, ensure_positive, Result, SimulationError};
use crate::noise::poisson_draw;

/// Smallest event trace ever drawn, so that very long dark times still
/// produce a usable number of candidate events.
const MIN_TRACE_EVENTS: usize = 40;

/// Number of times the trace allocation is doubled before giving up.
const MAX_TRACE_ATTEMPTS: usize = 16;

/// Largest trace allocation, in events.
const MAX_TRACE_EVENTS: usize = 1 << 28;

/// Parameters of the blinking process for one binding site.
#[derive(Debug, Clone, PartialEq)]
pub struct KineticsParams {
    /// Mean dark time, same unit as `time`
    pub meandark: f64,
    /// Mean bright time, same unit as `time`
    pub meanbright: f64,
    /// Number of frames in the movie
    pub frames: usize,
    /// Exposure time per frame
    pub time: f64,
    /// Mean photons emitted per unit time while bright
    pub photonrate: f64,
    /// Standard deviation of the photon rate between binding events
    pub photonratestd: f64,
    /// Photons a site can emit before it bleaches
    pub photonbudget: u64,
    /// Draw independent dark times instead of modelling blocked binding
    pub simple: bool,
}

impl KineticsParams {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("frames", self.frames as f64)?;
        ensure_positive("time", self.time)?;
        ensure_positive("meandark", self.meandark)?;
        ensure_positive("meanbright", self.meanbright)?;
        ensure_positive("photonbudget", self.photonbudget as f64)?;
        ensure_non_negative("photonrate", self.photonrate)?;
        ensure_non_negative("photonratestd", self.photonratestd)?;
        Ok(())
    }

    /// Total integration time of the movie.
    pub fn movie_duration(&self) -> f64 {
        self.frames as f64 * self.time
    }

    /// Copy with `meandark` and `meanbright` rounded to whole time units.
    ///
    /// Fails with the unrounded value when a mean rounds to zero.
    pub fn with_rounded_means(&self) -> Result<Self> {
        for (name, value) in [("meandark", self.meandark), ("meanbright", self.meanbright)] {
            if !(value.round() >= 1.0) {
                return Err(SimulationError::InvalidParameter {
                    name,
                    value,
                    requirement: "at least 0.5 so it rounds to a whole time unit",
                });
            }
        }
        Ok(Self {
            meandark: self.meandark.round(),
            meanbright: self.meanbright.round(),
            ..self.clone()
        })
    }

    /// Number of dark/bright candidates to draw on the first attempt.
    fn estimated_trace_len(&self) -> Result<usize> {
        let cycle = self.meandark + self.meanbright;
        let events = 4.0 * (self.movie_duration() / cycle).ceil();
        if !(events <= MAX_TRACE_EVENTS as f64) {
            return Err(SimulationError::InvalidParameter {
                name: "meandark + meanbright",
                value: cycle,
                requirement: "long enough for a bounded number of binding cycles per movie",
            });
        }
        Ok((events as usize).max(MIN_TRACE_EVENTS))
    }
}

/// Summary of the simulated blinking of one site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotKinetics {
    /// Bright events completed before the end of the movie. A bright event
    /// still running at the end is not counted but its photons are, so
    /// `localizations` can include frames from one extra event.
    pub on_events: usize,
    /// Frames with at least one detected photon
    pub localizations: usize,
    /// Mean of the drawn dark times
    pub mean_dark: f64,
    /// Mean of the drawn bright times
    pub mean_bright: f64,
}

/// Output of [`paintgen`] for one site.
#[derive(Debug, Clone, PartialEq)]
pub struct BlinkTrace {
    /// Detected photons in each frame, exactly `frames` long
    pub photons: Vec<u32>,
    /// Interleaved `dark, bright, dark, ...` durations up to and including the
    /// event that crosses the end of the movie
    pub events: Vec<f64>,
    pub kinetics: SpotKinetics,
}

impl BlinkTrace {
    pub fn total_photons(&self) -> u64 {
        self.photons.iter().map(|&p| u64::from(p)).sum()
    }
}

/// Generate the blinking trace of one binding site and the photons it
/// contributes to every frame.
pub fn paintgen<R: Rng + ?Sized>(params: &KineticsParams, rng: &mut R) -> Result<BlinkTrace> {
    params.validate()?;
    let duration = params.movie_duration();
    let mut trace_len = params.estimated_trace_len()?;

    for attempt in 1..=MAX_TRACE_ATTEMPTS {
        let durations = if params.simple {
            Some(simple_durations(params, trace_len, rng))
        } else {
            blocked_durations(params, trace_len, rng)
        };

        if let Some((dark, bright)) = durations {
            let events = interleave(&dark, &bright);
            let eventsum = cumulative(&events);
            if let Some(maxloc) = covering_index(&eventsum, duration) {
                let photons = distribute_bright_events(params, &eventsum, maxloc, rng)?;
                let localizations = photons.iter().filter(|&&p| p > 0).count();
                let on_events = maxloc / 2;
                let kinetics = if on_events > 0 {
                    SpotKinetics {
                        on_events,
                        localizations,
                        mean_dark: mean(&dark),
                        mean_bright: mean(&bright),
                    }
                } else {
                    SpotKinetics {
                        on_events: 0,
                        localizations,
                        mean_dark: 0.0,
                        mean_bright: 0.0,
                    }
                };
                debug!(
                    attempt,
                    on_events,
                    localizations,
                    events = maxloc + 1,
                    "generated blinking trace"
                );
                return Ok(BlinkTrace {
                    photons,
                    events: events[..=maxloc].to_vec(),
                    kinetics,
                });
            }
        }

        warn!(
            attempt,
            trace_len,
            duration,
            "event trace does not cover the movie, enlarging allocation"
        );
        trace_len = match trace_len.checked_mul(2) {
            Some(len) if len <= MAX_TRACE_EVENTS => len,
            _ => return Err(SimulationError::DegenerateTrace { attempts: attempt }),
        };
    }

    Err(SimulationError::DegenerateTrace {
        attempts: MAX_TRACE_ATTEMPTS,
    })
}

fn draw_exponential<R: Rng + ?Sized>(mean: f64, count: usize, rng: &mut R) -> Vec<f64> {
    (0..count)
        .map(|_| {
            let unit: f64 = Exp1.sample(rng);
            mean * unit
        })
        .collect()
}

/// Independent dark and bright durations.
fn simple_durations<R: Rng + ?Sized>(
    params: &KineticsParams,
    count: usize,
    rng: &mut R,
) -> (Vec<f64>, Vec<f64>) {
    let dark = draw_exponential(params.meandark, count, rng);
    let bright = draw_exponential(params.meanbright, count, rng);
    (dark, bright)
}

/// Dark and bright durations where a site that is already occupied cannot
/// be bound again.
///
/// Each bright time is carved out of the following dark time. When the
/// bright time is longer, the binding attempts it swallowed are skipped by
/// advancing through the dark pool until the remaining dark time is positive.
/// Returns `None` when the dark pool alone does not cover the movie.
fn blocked_durations<R: Rng + ?Sized>(
    params: &KineticsParams,
    count: usize,
    rng: &mut R,
) -> Option<(Vec<f64>, Vec<f64>)> {
    let mut dark_pool = draw_exponential(params.meandark, count, rng);
    let bright_pool = draw_exponential(params.meanbright, count, rng);

    let duration = params.movie_duration();
    let mut darksum = 0.0;
    let used = dark_pool.iter().position(|&d| {
        darksum += d;
        darksum > duration
    })? + 1;

    let mut dark = Vec::with_capacity(used);
    let mut bright = Vec::with_capacity(used);
    dark.push(dark_pool[0]);
    bright.push(bright_pool[0]);

    let mut cursor = 1;
    for &bright_time in &bright_pool[1..used] {
        bright.push(bright_time);

        let mut dark_time = dark_pool[cursor] - bright_time;
        cursor += 1;
        while dark_time < 0.0 {
            if cursor == dark_pool.len() {
                debug!(pool = dark_pool.len(), "dark pool exhausted, drawing more");
                let extra = draw_exponential(params.meandark, dark_pool.len(), rng);
                dark_pool.extend(extra);
            }
            dark_time += dark_pool[cursor];
            cursor += 1;
        }
        dark.push(dark_time);
    }

    Some((dark, bright))
}

/// `[d0, b0, d1, b1, ...]`
fn interleave(dark: &[f64], bright: &[f64]) -> Vec<f64> {
    dark.iter()
        .zip(bright)
        .flat_map(|(&d, &b)| [d, b])
        .collect()
}

fn cumulative(events: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    events
        .iter()
        .map(|&e| {
            total += e;
            total
        })
        .collect()
}

/// First index whose cumulative time exceeds `duration`.
fn covering_index(eventsum: &[f64], duration: f64) -> Option<usize> {
    eventsum.iter().position(|&t| t > duration)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Turn the bright events up to `maxloc` into per-frame photon counts.
///
/// Bright events sit at odd indices of the trace; event `i` starts at
/// `eventsum[i - 1]` and ends at `eventsum[i]`.
fn distribute_bright_events<R: Rng + ?Sized>(
    params: &KineticsParams,
    eventsum: &[f64],
    maxloc: usize,
    rng: &mut R,
) -> Result<Vec<u32>> {
    let time = params.time;
    let frames = params.frames;
    let rate = Normal::new(params.photonrate, params.photonratestd)
        .map_err(SimulationError::distribution)?;

    let mut photons = vec![0u32; frames];
    let mut remaining = params.photonbudget;

    for i in (1..=maxloc).step_by(2) {
        if remaining == 0 {
            debug!(event = i / 2, "photon budget exhausted, site bleached");
            break;
        }

        // Photons in one full frame for this binding event
        let per_frame = (rate.sample(rng) * time).round().max(0.0);

        let start = eventsum[i - 1];
        let end = eventsum[i];
        let first = (start / time).floor() as usize;
        if first >= frames {
            break;
        }

        let mut span = ((end - first as f64 * time) / time).ceil() as usize;
        if per_frame * span as f64 > remaining as f64 {
            span = (remaining as f64 / per_frame).ceil() as usize;
        }
        // Frames past the end of the movie are never recorded.
        let span = span.min(frames - first);

        let mut counts: Vec<u64> = (0..span)
            .map(|offset| {
                let expected = if span > 1 && offset > 0 && offset < span - 1 {
                    per_frame
                } else {
                    frame_overlap(first + offset, start, end, time) * per_frame
                };
                poisson_draw(expected, rng)
            })
            .collect();

        let total: u64 = counts.iter().sum();
        if total > remaining {
            // Clip from the last touched frame backwards, never below zero.
            let mut excess = total - remaining;
            for count in counts.iter_mut().rev() {
                let cut = excess.min(*count);
                *count -= cut;
                excess -= cut;
                if excess == 0 {
                    break;
                }
            }
        }
        remaining -= counts.iter().sum::<u64>();

        for (slot, &count) in photons[first..].iter_mut().zip(&counts) {
            *slot = slot.saturating_add(u32::try_from(count).unwrap_or(u32::MAX));
        }
    }

    Ok(photons)
}

/// Fraction of frame `frame` covered by the interval `[start, end)`.
fn frame_overlap(frame: usize, start: f64, end: f64, time: f64) -> f64 {
    let lo = (frame as f64 * time).max(start);
    let hi = ((frame + 1) as f64 * time).min(end);
    ((hi - lo) / time).max(0.0)
}
