//! Synthetic access log generation
//!
//! Produces w3c-style request lines with weighted random paths, user agents
//! and response codes. Client addresses come from a pool of sessions, each
//! reused for a bounded number of requests, so traffic looks bursty per IP.

use chrono::{DateTime, Local};
use rand::Rng;
use std::collections::HashMap;

const EXTENSIONS: &[(&str, u32)] = &[("html", 70), ("png", 15), ("gif", 10), ("css", 5)];

const RESPONSE_CODES: &[(u16, u32)] = &[(200, 86), (302, 6), (404, 5), (503, 3)];

const USER_AGENTS: &[(&str, u32)] = &[
    (
        "Mozilla/5.0 (compatible; MSIE 10.0; Windows NT 6.2; Win64; x64; Trident/6.0)",
        12,
    ),
    (
        "Mozilla/5.0 (compatible; MSIE 9.0; Windows NT 6.1; Trident/5.0)",
        12,
    ),
    (
        "Mozilla/5.0 (iPhone; CPU iPhone OS 8_1 like Mac OS X) AppleWebKit/600.1.4 (KHTML, like Gecko) Version/8.0 Mobile/12B410 Safari/600.1.4",
        12,
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.9; rv:23.0) Gecko/20100101 Firefox/23.0",
        12,
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_9_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/29.0.1547.57 Safari/537.36",
        12,
    ),
];

const PATHS: &[(&str, u32)] = &[
    ("/articles/bosun/", 5),
    ("/articles/datapower-static-routes/", 5),
    ("/articles/google-code-jam/", 5),
    ("/articles/chess-board-in-objective-c/", 10),
    ("/articles/array-processing-in-ruby/", 8),
    ("/tags/datapower/", 10),
    ("/tags/open-source/", 10),
    ("/tags/ruby/", 5),
    ("/tags/python/", 10),
];

const FILES: &[(&str, u32)] = &[("header", 5), ("list", 4), ("item", 3)];

/// Common log timestamp, e.g. `24/Feb/2016:21:41:00 +0100`
pub const LOG_TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

fn pick_weighted<T: Copy, R: Rng>(rng: &mut R, table: &[(T, u32)]) -> T {
    let total: u32 = table.iter().map(|(_, weight)| weight).sum();
    let mut roll = rng.random_range(0..total);
    for (value, weight) in table {
        if roll < *weight {
            return *value;
        }
        roll -= weight;
    }
    table[0].0
}

/// Pool of client addresses, each retired after `session_length` requests
pub struct IpPool {
    session_count: usize,
    session_length: u32,
    sessions: HashMap<String, u32>,
}

impl IpPool {
    pub fn new(session_count: usize, session_length: u32) -> Self {
        Self {
            session_count: session_count.max(1),
            session_length: session_length.max(1),
            sessions: HashMap::new(),
        }
    }

    pub fn next_ip<R: Rng>(&mut self, rng: &mut R) -> String {
        let limit = self.session_length;
        self.sessions.retain(|_, used| *used < limit);
        while self.sessions.len() < self.session_count {
            self.sessions.insert(random_ip(rng), 0);
        }

        let idx = rng.random_range(0..self.sessions.len());
        // The pool was refilled above, so the index is in range
        let (ip, used) = self
            .sessions
            .iter_mut()
            .nth(idx)
            .expect("session pool is not empty");
        *used += 1;
        ip.clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn random_ip<R: Rng>(rng: &mut R) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.random_range(1..=223u8),
        rng.random_range(0..255u8),
        rng.random_range(0..255u8),
        rng.random_range(0..255u8)
    )
}

pub struct LogGenerator {
    ips: IpPool,
}

impl LogGenerator {
    pub fn new(ips: IpPool) -> Self {
        Self { ips }
    }

    /// One access log line, without the trailing newline
    pub fn line<R: Rng>(&mut self, rng: &mut R, at: DateTime<Local>) -> String {
        let ip = self.ips.next_ip(rng);
        let user_agent = pick_weighted(rng, USER_AGENTS);
        let path = pick_weighted(rng, PATHS);
        let file = pick_weighted(rng, FILES);
        let ext = pick_weighted(rng, EXTENSIONS);
        let status = pick_weighted(rng, RESPONSE_CODES);
        let size = rng.random_range(192..192 + 2048);

        format!(
            "{} \"{}\" - [{}] \"GET {}{}.{} HTTP/1.1\" {} {}",
            ip,
            user_agent,
            at.format(LOG_TIMESTAMP_FORMAT),
            path,
            file,
            ext,
            status,
            size
        )
    }
}

impl Default for LogGenerator {
    fn default() -> Self {
        Self::new(IpPool::new(100, 10))
    }
}
