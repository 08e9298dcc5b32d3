//! Candidate quality scoring
//!
//! Pure heuristic over recording metadata. The absolute value is
//! meaningless; only relative order matters, and ties keep the original
//! list order (stable sort).

use crate::models::Recording;

const RATING_WEIGHT: f64 = 0.4;
const POPULARITY_WEIGHT: f64 = 0.3;

/// Downloads at which the popularity component saturates (log10 = 4).
const POPULARITY_SATURATION_LOG: f64 = 4.0;

/// Ideal loop duration window, seconds.
const IDEAL_DURATION: (f64, f64) = (30.0, 120.0);
/// Acceptable loop duration window, seconds.
const ACCEPTABLE_DURATION: (f64, f64) = (15.0, 240.0);

const LOOPABLE_HINTS: &[&str] = &["loop", "ambient"];
const MUSIC_HINTS: &[&str] = &["music", "song", "track"];
const MELODY_HINTS: &[&str] = &["melody", "beat", "chord"];

/// Quality score for one candidate. Pure, deterministic, no I/O.
pub fn score(rec: &Recording) -> f64 {
    let mut total = (rec.avg_rating / 5.0) * RATING_WEIGHT;

    // Logarithmic popularity, saturating at 10,000 downloads. Zero
    // downloads contributes nothing rather than negative infinity.
    if rec.num_downloads > 0 {
        let pop = ((rec.num_downloads as f64).log10() / POPULARITY_SATURATION_LOG).min(1.0);
        total += pop * POPULARITY_WEIGHT;
    }

    // Duration fit for seamless looping
    if rec.duration >= IDEAL_DURATION.0 && rec.duration <= IDEAL_DURATION.1 {
        total += 0.2;
    } else if rec.duration >= ACCEPTABLE_DURATION.0 && rec.duration <= ACCEPTABLE_DURATION.1 {
        total += 0.1;
    }

    // Title heuristics: field recordings over musical works
    let name = rec.name.to_lowercase();
    if LOOPABLE_HINTS.iter().any(|h| name.contains(h)) {
        total += 0.1;
    }
    if MUSIC_HINTS.iter().any(|h| name.contains(h)) {
        total -= 0.3;
    }
    if MELODY_HINTS.iter().any(|h| name.contains(h)) {
        total -= 0.2;
    }

    total
}

/// Score and sort candidates best-first. The sort is stable, so equal
/// scores keep the collaborator's original ranking.
pub fn rank(candidates: Vec<Recording>) -> Vec<(f64, Recording)> {
    let mut scored: Vec<(f64, Recording)> =
        candidates.into_iter().map(|rec| (score(&rec), rec)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
}
