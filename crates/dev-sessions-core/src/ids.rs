//! Human-memorable session identifiers and their tmux counterparts.
//!
//! Ids are short `<callsign>-<post>` slugs. The tmux session name is the
//! id with a fixed prefix, so the mapping is injective and reversible.

use rand::Rng;

/// Prefix that turns a session id into its tmux session name.
pub const REMOTE_NAME_PREFIX: &str = "dev-";

/// Tmux session name for a session id: `"riven-ops"` -> `"dev-riven-ops"`.
#[must_use]
pub fn to_remote_name(id: &str) -> String {
    format!("{REMOTE_NAME_PREFIX}{id}")
}

/// Recover a session id from a tmux session name.
///
/// Returns `None` when the name lacks the expected prefix, i.e. the tmux
/// session was not created by this gateway.
#[must_use]
pub fn from_remote_name(remote_name: &str) -> Option<&str> {
    remote_name.strip_prefix(REMOTE_NAME_PREFIX)
}

/// Source of candidate session ids.
///
/// Candidates are not guaranteed unique; the store's uniqueness
/// constraint is the final arbiter and callers retry on collision.
pub trait IdGenerator: Send + Sync {
    /// Produce one candidate id.
    fn generate(&self) -> String;
}

const CALLSIGNS: &[&str] = &[
    "ahri", "akali", "ashe", "azir", "bard", "brand", "braum", "corki", "darius", "diana",
    "draven", "ekko", "elise", "ezreal", "fiora", "fizz", "galio", "garen", "gnar", "graves",
    "irelia", "ivern", "janna", "jax", "jayce", "jhin", "jinx", "karma", "kayle", "kennen",
    "kled", "leona", "lucian", "lulu", "lux", "nami", "neeko", "olaf", "ornn", "poppy",
    "pyke", "quinn", "rakan", "riven", "senna", "sett", "shen", "sona", "swain", "sylas",
    "talon", "taric", "teemo", "thresh", "twitch", "urgot", "varus", "vayne", "viktor", "xayah",
    "yasuo", "yone", "zeri", "zoe",
];

const POSTS: &[&str] = &["top", "jg", "mid", "adc", "sup"];

/// Default generator: random `<callsign>-<post>` slugs from fixed lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlugGenerator;

impl IdGenerator for SlugGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let callsign = CALLSIGNS[rng.gen_range(0..CALLSIGNS.len())];
        let post = POSTS[rng.gen_range(0..POSTS.len())];
        format!("{callsign}-{post}")
    }
}
