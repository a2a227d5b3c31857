//! Robots.txt parsing
//!
//! Thin wrapper around the robotstxt crate, plus `Crawl-delay` extraction
//! which that crate does not surface.

use robotstxt::DefaultMatcher;

/// Parsed robots rules for one origin
///
/// An empty or unfetchable robots.txt is represented by the permissive
/// sentinel from [`ParsedRobots::allow_all`]; robots fetch failures must
/// never block crawling.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content
    content: String,
    /// True for the permissive sentinel
    allow_all: bool,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// The permissive sentinel: everything allowed, no crawl delay
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks whether a URL is allowed for the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Returns the `Crawl-delay` in seconds for the given user agent
    ///
    /// A delay declared for the specific agent wins over one declared for
    /// `*`. Returns None when no applicable delay is present.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all || self.content.is_empty() {
            return None;
        }

        let agent_lower = user_agent.to_lowercase();
        let mut group_agents: Vec<String> = Vec::new();
        let mut reading_agents = false;
        let mut specific: Option<f64> = None;
        let mut wildcard: Option<f64> = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                // Consecutive User-agent lines form one group; a group ends
                // at the first non-agent directive.
                if !reading_agents {
                    group_agents.clear();
                }
                group_agents.push(value.to_lowercase());
                reading_agents = true;
                continue;
            }

            reading_agents = false;
            if key == "crawl-delay" {
                if let Ok(delay) = value.parse::<f64>() {
                    if group_agents.iter().any(|a| a != "*" && agent_lower.contains(a.as_str())) {
                        specific = Some(delay);
                    } else if group_agents.iter().any(|a| a == "*") {
                        wildcard = Some(delay);
                    }
                }
            }
        }

        specific.or(wildcard)
    }
}
