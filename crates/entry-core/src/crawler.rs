//! Crawler detection from the User-Agent header.

/// Lowercase user-agent fragments that identify automated clients.
pub const DEFAULT_CRAWLER_PATTERNS: &[&str] = &[
    "bot",
    "crawler",
    "crawling",
    "spider",
    "slurp",
    "archiver",
    "facebookexternalhit",
    "embedly",
    "quora link preview",
    "vkshare",
    "w3c_validator",
    "whatsapp",
    "lighthouse",
    "headlesschrome",
    "phantomjs",
    "feedfetcher",
    "mediapartners-google",
    "ia_archiver",
    "curl/",
    "wget/",
    "python-requests",
    "go-http-client",
    "okhttp",
];

/// Fragments that contain a crawler pattern but belong to real browsers.
const FALSE_POSITIVES: &[&str] = &["cubot"];

/// Classifies user agents as crawlers.
#[derive(Debug, Clone)]
pub struct CrawlerDetector {
    patterns: Vec<String>,
}

impl CrawlerDetector {
    /// Create a detector with the default pattern list.
    pub fn new() -> Self {
        Self {
            patterns: DEFAULT_CRAWLER_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    /// Add a pattern (matched case-insensitively).
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into().to_lowercase();
        if !pattern.is_empty() {
            self.patterns.push(pattern);
        }
        self
    }

    /// Add several patterns.
    pub fn with_patterns<I, S>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        patterns.into_iter().fold(self, |d, p| d.with_pattern(p))
    }

    /// Check whether a user agent belongs to a crawler.
    pub fn is_crawler(&self, user_agent: &str) -> bool {
        let mut ua = user_agent.trim().to_lowercase();
        if ua.is_empty() {
            return false;
        }

        for fp in FALSE_POSITIVES {
            ua = ua.replace(fp, "");
        }

        self.patterns.iter().any(|p| ua.contains(p.as_str()))
    }

    /// Check an optional user agent; a missing header is never a crawler.
    pub fn is_crawler_opt(&self, user_agent: Option<&str>) -> bool {
        user_agent.is_some_and(|ua| self.is_crawler(ua))
    }

    /// Configured patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for CrawlerDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_search_engines() {
        let detector = CrawlerDetector::new();

        assert!(detector.is_crawler(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
        ));
        assert!(detector.is_crawler(
            "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)"
        ));
        assert!(detector.is_crawler("Mozilla/5.0 (compatible; Yahoo! Slurp)"));
        assert!(detector.is_crawler("facebookexternalhit/1.1"));
    }

    #[test]
    fn test_browsers_are_not_crawlers() {
        let detector = CrawlerDetector::new();

        assert!(!detector.is_crawler(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        ));
        assert!(!detector.is_crawler(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15"
        ));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(CrawlerDetector::new().is_crawler("SOME-SPIDER/1.0"));
    }

    #[test]
    fn test_cubot_handset_is_not_a_crawler() {
        let detector = CrawlerDetector::new();

        assert!(!detector.is_crawler(
            "Mozilla/5.0 (Linux; Android 10; CUBOT X30) AppleWebKit/537.36 Mobile Safari/537.36"
        ));
    }

    #[test]
    fn test_empty_or_missing_user_agent() {
        let detector = CrawlerDetector::new();

        assert!(!detector.is_crawler(""));
        assert!(!detector.is_crawler("   "));
        assert!(!detector.is_crawler_opt(None));
        assert!(detector.is_crawler_opt(Some("Googlebot")));
    }

    #[test]
    fn test_extra_patterns() {
        let detector = CrawlerDetector::new().with_patterns(["Acme-Fetcher", ""]);

        assert!(detector.is_crawler("acme-fetcher/3.2"));
        assert_eq!(
            detector.patterns().len(),
            DEFAULT_CRAWLER_PATTERNS.len() + 1
        );
    }
}
