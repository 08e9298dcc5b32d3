//! Deterministic prompt-to-tags rules
//!
//! The lowest resolver tier: pure keyword matching over a normalized
//! prompt. Identical input always yields identical tags and scale, which
//! is what makes this tier a safe landing spot when the language model is
//! unavailable, times out, or returns garbage.

use std::collections::HashSet;

/// Phrases matched as substrings of the normalized prompt (multi-word).
const RAIN_LIGHT: &[&str] = &["light rain", "drizzle", "drizzly", "mist", "sprinkle", "misting"];
const RAIN_HEAVY: &[&str] = &[
    "heavy rain",
    "downpour",
    "storm",
    "rainstorm",
    "monsoon",
    "pouring",
    "thunderstorm",
    "rain",
];

/// Word classes matched against the token set.
const WIND_WORDS: &[&str] = &["wind", "breeze", "breezy", "gust", "gusty", "blustery"];
const CITY_WORDS: &[&str] = &[
    "city", "urban", "downtown", "street", "avenue", "alley", "plaza", "market", "cafe",
    "restaurant", "subway", "metro",
];
const FOOTSTEP_WORDS: &[&str] = &[
    "footsteps",
    "walking",
    "footstep",
    "steps",
    "alley",
    "cobble",
    "cobblestone",
    "stone",
    "pavement",
    "sidewalk",
    "street",
];
const VEHICLE_2W: &[&str] = &["motorcycle", "scooter", "moped"];
const BIRD_WORDS: &[&str] = &[
    "birds", "sparrow", "seagull", "gull", "songbird", "tweeting", "chirp", "chirping",
];
const INSECT_WORDS: &[&str] = &[
    "insects", "cricket", "crickets", "cicada", "cicadas", "katydid", "bugs",
];
const NEON_WORDS: &[&str] = &["neon", "buzz", "hum", "humming", "electric", "fluorescent"];
const VINYL_WORDS: &[&str] = &["vinyl", "record", "turntable", "lofi"];
const COASTAL_WORDS: &[&str] = &["coast", "coastal", "beach", "sea", "ocean", "shore", "harbor", "pier", "waves"];
const TRANSIT_WORDS: &[&str] = &["subway", "metro", "train", "tram", "station", "platform"];

const RURAL_WORDS: &[&str] = &[
    "rural", "field", "farm", "forest", "woods", "park", "meadow", "countryside",
];
const NIGHT_WORDS: &[&str] = &["night", "midnight", "evening", "dusk", "twilight"];

const QUIET_WORDS: &[&str] = &[
    "quiet", "calm", "soft", "gentle", "peaceful", "serene", "subtle", "low",
];
const BUSY_WORDS: &[&str] = &[
    "busy", "crowded", "bustling", "noisy", "loud", "hectic", "packed", "traffic", "market",
];

/// Canonical priority order for the final tag list.
const CANONICAL_ORDER: &[&str] = &[
    "roomtone",
    "rain",
    "light_rain",
    "wind",
    "waves",
    "seagulls",
    "distant_chatter",
    "footsteps_stone",
    "subway",
    "birds",
    "insects",
    "motorcycle",
    "neon_buzz",
    "vinyl_crackle",
];

const MAX_TAGS: usize = 5;

/// Deterministic analysis of one prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct RulesAnalysis {
    pub tags: Vec<String>,
    pub gain_scale: f64,
}

/// Curated base-gain prior for a tag, 0.40 for anything unlisted.
pub fn gain_for_tag(tag: &str) -> f64 {
    match tag {
        "roomtone" => 0.40,
        "light_rain" => 0.45,
        "rain" => 0.50,
        "wind" => 0.45,
        "waves" => 0.42,
        "seagulls" => 0.35,
        "vinyl_crackle" => 0.30,
        "distant_chatter" => 0.35,
        "footsteps_stone" => 0.35,
        "subway" => 0.33,
        "motorcycle" => 0.32,
        "birds" => 0.40,
        "insects" => 0.38,
        "neon_buzz" => 0.28,
        _ => 0.40,
    }
}

/// Normalize: lowercase, fold `_`/`-` to spaces, strip punctuation,
/// collapse runs of whitespace.
fn normalize(s: &str) -> String {
    let folded: String = s
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '_' | '-' => ' ',
            c if c.is_alphanumeric() || c.is_whitespace() => c,
            _ => ' ',
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn tokens_have_any(tokens: &HashSet<&str>, needles: &[&str]) -> bool {
    needles.iter().any(|n| tokens.contains(n))
}

/// Map a prompt to a capped, canonically ordered tag list plus a global
/// intensity scale. Pure and deterministic.
pub fn map_prompt_to_tags(prompt: &str) -> RulesAnalysis {
    let p = normalize(prompt);
    let tokens: HashSet<&str> = p.split(' ').filter(|t| !t.is_empty()).collect();

    let mut chosen: Vec<&str> = vec!["roomtone"];

    // Rain intensity. The bare word "rain" is a heavy keyword, so the heavy
    // check runs on the prompt with light-rain phrases removed; otherwise
    // "light rain" would register as heavy too.
    let mentions_light = has_any(&p, RAIN_LIGHT);
    let mut heavy_haystack = p.clone();
    for phrase in RAIN_LIGHT {
        heavy_haystack = heavy_haystack.replace(phrase, " ");
    }
    let mentions_heavy = has_any(&heavy_haystack, RAIN_HEAVY);
    if mentions_light && !mentions_heavy {
        chosen.push("light_rain");
    }
    if mentions_heavy {
        chosen.push("rain");
    }

    if tokens_have_any(&tokens, WIND_WORDS) {
        chosen.push("wind");
    }

    // Urban textures
    if tokens_have_any(&tokens, CITY_WORDS) {
        chosen.push("distant_chatter");
        if tokens_have_any(&tokens, NEON_WORDS) || tokens_have_any(&tokens, NIGHT_WORDS) {
            chosen.push("neon_buzz");
        }
        if tokens_have_any(&tokens, VEHICLE_2W) {
            chosen.push("motorcycle");
        }
    }

    if tokens_have_any(&tokens, FOOTSTEP_WORDS) {
        chosen.push("footsteps_stone");
    }

    // Coastal and transit context
    if tokens_have_any(&tokens, COASTAL_WORDS) {
        chosen.push("waves");
        chosen.push("seagulls");
    }
    if tokens_have_any(&tokens, TRANSIT_WORDS) {
        chosen.push("subway");
    }

    // Rural and natural ambience
    let ruralish = tokens_have_any(&tokens, RURAL_WORDS);
    let nightish = tokens_have_any(&tokens, NIGHT_WORDS);
    if ruralish || tokens_have_any(&tokens, BIRD_WORDS) {
        chosen.push("birds");
    }
    if ruralish || nightish || tokens_have_any(&tokens, INSECT_WORDS) {
        chosen.push("insects");
    }

    if tokens_have_any(&tokens, VINYL_WORDS) {
        chosen.push("vinyl_crackle");
    }

    if tokens_have_any(&tokens, VEHICLE_2W) {
        chosen.push("motorcycle");
    }

    // Canonical order, dedup, cap
    let chosen: HashSet<&str> = chosen.into_iter().collect();
    let tags: Vec<String> = CANONICAL_ORDER
        .iter()
        .filter(|t| chosen.contains(**t))
        .take(MAX_TAGS)
        .map(|t| t.to_string())
        .collect();

    // Intensity: busy words win over quiet words when both appear
    let mut gain_scale = 1.0;
    if tokens_have_any(&tokens, QUIET_WORDS) {
        gain_scale = 0.7;
    }
    if tokens_have_any(&tokens, BUSY_WORDS) {
        gain_scale = 1.2;
    }

    RulesAnalysis { tags, gain_scale }
}
