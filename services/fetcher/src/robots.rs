//! Minimal robots.txt evaluation with a per-origin cache.
//!
//! robots.txt is fetched once per `scheme://host` and cached for the
//! process lifetime.  A non-200 response or any fetch error yields a
//! permissive policy.  Evaluation follows the common longest-match rule
//! over the `*` group and the crawler's own user-agent group; on equal
//! length, Allow wins.

use std::collections::HashMap;

use tracing::{debug, warn};
use url::Url;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Allow(String),
    Disallow(String),
}

/// Parsed rules applying to this crawler.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    rules: Vec<Rule>,
}

impl RobotsPolicy {
    /// A policy that allows everything.
    pub fn permissive() -> Self {
        RobotsPolicy::default()
    }

    /// Parse robots.txt, keeping the rule groups addressed to `*` or to
    /// this crawler (group token matched case-insensitively as a substring
    /// of `agent_token`).
    pub fn parse(text: &str, agent_token: &str) -> Self {
        let token = agent_token.to_ascii_lowercase();
        let mut rules = Vec::new();
        let mut group_applies = false;
        let mut in_agent_lines = false;

        for line in text.lines() {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    // A run of User-agent lines opens a fresh group.
                    if !in_agent_lines {
                        group_applies = false;
                        in_agent_lines = true;
                    }
                    // A group matches when its token is a substring of our
                    // user agent (so `tunecrawler` matches `tunecrawler/1.0`).
                    let agent = value.to_ascii_lowercase();
                    if agent == "*" || (!agent.is_empty() && token.contains(&agent)) {
                        group_applies = true;
                    }
                }
                "allow" if group_applies => {
                    in_agent_lines = false;
                    if !value.is_empty() {
                        rules.push(Rule::Allow(value.to_owned()));
                    }
                }
                "disallow" if group_applies => {
                    in_agent_lines = false;
                    // An empty Disallow allows everything.
                    if !value.is_empty() {
                        rules.push(Rule::Disallow(value.to_owned()));
                    }
                }
                _ => {
                    in_agent_lines = false;
                }
            }
        }
        RobotsPolicy { rules }
    }

    /// Whether the given path may be fetched.
    pub fn allows(&self, path: &str) -> bool {
        let mut best_len = 0usize;
        let mut allowed = true;
        for rule in &self.rules {
            let (prefix, verdict) = match rule {
                Rule::Allow(p) => (p, true),
                Rule::Disallow(p) => (p, false),
            };
            if !path.starts_with(prefix.as_str()) {
                continue;
            }
            // Longest match wins; Allow beats Disallow on a tie.
            if prefix.len() > best_len || (prefix.len() == best_len && verdict) {
                best_len = prefix.len();
                allowed = verdict;
            }
        }
        allowed
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Per-origin robots policies, fetched lazily and kept for the process
/// lifetime.
pub struct RobotsCache {
    agent_token: String,
    policies: HashMap<String, RobotsPolicy>,
}

impl RobotsCache {
    pub fn new(agent_token: &str) -> Self {
        RobotsCache {
            agent_token: agent_token.to_owned(),
            policies: HashMap::new(),
        }
    }

    /// Whether `url` may be fetched, consulting (and filling) the cache.
    pub async fn can_fetch(&mut self, http: &reqwest::Client, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return true;
        };
        let origin = format!("{}://{}", url.scheme(), host);
        if !self.policies.contains_key(&origin) {
            let policy = fetch_policy(http, &origin, &self.agent_token).await;
            self.policies.insert(origin.clone(), policy);
        }
        let path = if url.path().is_empty() { "/" } else { url.path() };
        self.policies[&origin].allows(path)
    }
}

async fn fetch_policy(http: &reqwest::Client, origin: &str, agent_token: &str) -> RobotsPolicy {
    let robots_url = format!("{origin}/robots.txt");
    match http.get(&robots_url).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(text) => {
                debug!(origin, "robots.txt loaded");
                RobotsPolicy::parse(&text, agent_token)
            }
            Err(e) => {
                warn!(origin, error = %e, "robots.txt body unreadable, allowing all");
                RobotsPolicy::permissive()
            }
        },
        Ok(response) => {
            debug!(origin, status = %response.status(), "no robots.txt, allowing all");
            RobotsPolicy::permissive()
        }
        Err(e) => {
            warn!(origin, error = %e, "robots.txt fetch failed, allowing all");
            RobotsPolicy::permissive()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_allows_everything() {
        let policy = RobotsPolicy::permissive();
        assert!(policy.allows("/"));
        assert!(policy.allows("/secret"));
    }

    #[test]
    fn wildcard_group_disallow_applies() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /private/\n", "tunecrawler");
        assert!(!policy.allows("/private/page.html"));
        assert!(policy.allows("/public/page.html"));
    }

    #[test]
    fn own_agent_group_overrides_nothing_when_absent() {
        let text = "User-agent: googlebot\nDisallow: /\n";
        let policy = RobotsPolicy::parse(text, "tunecrawler");
        assert!(policy.allows("/anything"));
    }

    #[test]
    fn own_agent_group_is_honored() {
        let text = "User-agent: tunecrawler\nDisallow: /tunes/\n";
        let policy = RobotsPolicy::parse(text, "tunecrawler");
        assert!(!policy.allows("/tunes/x.abc"));
    }

    #[test]
    fn longest_match_wins_and_allow_beats_on_tie() {
        let text = "User-agent: *\nDisallow: /a/\nAllow: /a/b/\n";
        let policy = RobotsPolicy::parse(text, "tunecrawler");
        assert!(!policy.allows("/a/x"));
        assert!(policy.allows("/a/b/x"));

        let tie = "User-agent: *\nDisallow: /a/\nAllow: /a/\n";
        let policy = RobotsPolicy::parse(tie, "tunecrawler");
        assert!(policy.allows("/a/x"));
    }

    #[test]
    fn empty_disallow_means_allow_all() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow:\n", "tunecrawler");
        assert!(policy.allows("/anything"));
    }

    #[test]
    fn stacked_agent_lines_share_one_group() {
        let text = "User-agent: googlebot\nUser-agent: *\nDisallow: /x/\n\n\
                    User-agent: bingbot\nDisallow: /\n";
        let policy = RobotsPolicy::parse(text, "tunecrawler");
        assert!(!policy.allows("/x/page"));
        assert!(policy.allows("/y/page"));
    }

    #[test]
    fn comments_are_ignored() {
        let text = "# block the vault\nUser-agent: * # everyone\nDisallow: /vault/ # keep out\n";
        let policy = RobotsPolicy::parse(text, "tunecrawler");
        assert!(!policy.allows("/vault/x"));
    }
}
