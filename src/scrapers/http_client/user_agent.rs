//! User agent rotation.

use rand::seq::SliceRandom;

/// Real browser user agents used when no pool is configured.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.212 Safari/537.36",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    // Chrome on Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.131 Safari/537.36",
];

/// Pick a user agent at random from `pool`, or from the built-in list when
/// `pool` is empty.
pub fn pick_user_agent(pool: &[String]) -> &str {
    let mut rng = rand::thread_rng();
    match pool.choose(&mut rng) {
        Some(ua) => ua.as_str(),
        None => DEFAULT_USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(DEFAULT_USER_AGENTS[0]),
    }
}
