//! Client device classification from the `User-Agent` header.
//!
//! Classification is a single pass over an ordered rule table. Bot signatures
//! come first so a crawler that advertises a mobile browser engine is still a
//! bot; consoles and tablets come before phones because their user agents
//! routinely contain `mobile` as well.

use std::fmt;
use std::str::FromStr;

/// Coarse class of the requesting client.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum DeviceType {
    #[default]
    Pc,
    Mobile,
    Tablet,
    Bot,
    Console,
}

impl DeviceType {
    /// Returns the lowercase name (e.g. `"mobile"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bot     => "bot",
            Self::Console => "console",
            Self::Mobile  => "mobile",
            Self::Pc      => "pc",
            Self::Tablet  => "tablet",
        }
    }

    /// Classifies a user agent. `mobile_hint` is the `Sec-CH-UA-Mobile: ?1`
    /// client hint and only applies when no rule matches.
    pub fn classify(user_agent: &str, mobile_hint: bool) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        RULES
            .iter()
            .find(|rule| rule.matches(&ua))
            .map(|rule| rule.device)
            .unwrap_or(if mobile_hint { Self::Mobile } else { Self::Pc })
    }
}

/// Parses a lowercase device name (e.g. `"tablet"`).
impl FromStr for DeviceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bot"     => Ok(Self::Bot),
            "console" => Ok(Self::Console),
            "mobile"  => Ok(Self::Mobile),
            "pc"      => Ok(Self::Pc),
            "tablet"  => Ok(Self::Tablet),
            _         => Err(()),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Rule table ────────────────────────────────────────────────────────────────

struct Rule {
    needle: &'static str,
    unless: Option<&'static str>,
    device: DeviceType,
}

impl Rule {
    fn matches(&self, ua: &str) -> bool {
        ua.contains(self.needle) && !self.unless.is_some_and(|u| ua.contains(u))
    }
}

const fn rule(needle: &'static str, device: DeviceType) -> Rule {
    Rule { needle, unless: None, device }
}

const fn rule_unless(needle: &'static str, unless: &'static str, device: DeviceType) -> Rule {
    Rule { needle, unless: Some(unless), device }
}

/// Evaluated top to bottom; needles are lowercase.
static RULES: &[Rule] = &[
    // Crawlers and link previewers ────────────────────────────────────────────
    // A bare "bot" also hits brands like Cubot, so it needs a delimiter.
    rule("bot/",                DeviceType::Bot),
    rule("bot;",                DeviceType::Bot),
    rule("bot)",                DeviceType::Bot),
    rule("bot-",                DeviceType::Bot),
    rule("bot+",                DeviceType::Bot),
    rule("bot@",                DeviceType::Bot),
    rule("bot.html",            DeviceType::Bot),
    rule("googlebot",           DeviceType::Bot),
    rule("bingbot",             DeviceType::Bot),
    rule("yandexbot",           DeviceType::Bot),
    rule("duckduckbot",         DeviceType::Bot),
    rule("applebot",            DeviceType::Bot),
    rule("robot",               DeviceType::Bot),
    rule("crawl",               DeviceType::Bot),
    rule("spider",              DeviceType::Bot),
    rule("slurp",               DeviceType::Bot),
    rule("mediapartners",       DeviceType::Bot),
    rule("facebookexternalhit", DeviceType::Bot),
    rule("bingpreview",         DeviceType::Bot),
    rule("headlesschrome",      DeviceType::Bot),
    rule("lighthouse",          DeviceType::Bot),
    // Consoles ────────────────────────────────────────────────────────────────
    rule("playstation",         DeviceType::Console),
    rule("xbox",                DeviceType::Console),
    rule("nintendo",            DeviceType::Console),
    rule("ouya",                DeviceType::Console),
    // Tablets ─────────────────────────────────────────────────────────────────
    rule("ipad",                DeviceType::Tablet),
    rule("tablet",              DeviceType::Tablet),
    rule("kindle",              DeviceType::Tablet),
    rule("silk/",               DeviceType::Tablet),
    rule("playbook",            DeviceType::Tablet),
    rule_unless("android", "mobile", DeviceType::Tablet),
    // Phones ──────────────────────────────────────────────────────────────────
    rule("iphone",              DeviceType::Mobile),
    rule("ipod",                DeviceType::Mobile),
    rule("android",             DeviceType::Mobile),
    rule("windows phone",       DeviceType::Mobile),
    rule("iemobile",            DeviceType::Mobile),
    rule("blackberry",          DeviceType::Mobile),
    rule("opera mini",          DeviceType::Mobile),
    rule("mobile",              DeviceType::Mobile),
];
