//! Anti-detection configuration for the stealth tier.

use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

/// Realistic desktop user agents rotated per stealth render.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36 Edg/122.0.2365.92",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
];

/// Common desktop viewports; exact 1920x1080 on every request is itself a
/// fingerprint.
const VIEWPORTS: &[(u32, u32)] = &[
    (1920, 1080),
    (1536, 864),
    (1440, 900),
    (1366, 768),
    (1680, 1050),
];

/// Per-render stealth parameters.
#[derive(Debug, Clone)]
pub struct StealthProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub languages: Vec<String>,
}

impl StealthProfile {
    /// A randomized but internally consistent profile.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let user_agent = USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(USER_AGENTS[0])
            .to_string();
        let viewport = VIEWPORTS.choose(&mut rng).copied().unwrap_or((1920, 1080));
        Self {
            user_agent,
            viewport,
            languages: vec!["en-US".to_string(), "en".to_string()],
        }
    }

    /// Script injected before any page script runs: masks the webdriver
    /// flag and restores the property shapes headless Chrome leaves bare.
    pub fn evasion_script(&self) -> String {
        format!(
            r#"
Object.defineProperty(navigator, 'webdriver', {{ get: () => undefined }});
Object.defineProperty(navigator, 'languages', {{ get: () => {languages} }});
Object.defineProperty(navigator, 'plugins', {{ get: () => [1, 2, 3, 4, 5] }});
window.chrome = window.chrome || {{ runtime: {{}} }};
const origQuery = window.navigator.permissions.query;
window.navigator.permissions.query = (parameters) => (
  parameters.name === 'notifications'
    ? Promise.resolve({{ state: Notification.permission }})
    : origQuery(parameters)
);
"#,
            languages = serde_json::to_string(&self.languages).unwrap_or_else(|_| "[\"en-US\"]".into()),
        )
    }

    /// Short randomized pause between browser steps.
    pub fn human_delay() -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(120..450))
    }
}
