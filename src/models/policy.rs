use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Port classification used by tiered selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortClass {
    /// Common web-facing ports, admitted without limit
    Good,
    /// Higher-risk ports, admitted only for high-priority countries
    Sensitive,
    /// Everything else
    Risky,
}

impl PortClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortClass::Good => "good",
            PortClass::Sensitive => "sensitive",
            PortClass::Risky => "risky",
        }
    }
}

impl std::fmt::Display for PortClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-descriptor admission toggles for a health-check pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CheckPolicy {
    /// Drop descriptors whose host/port cannot be parsed (otherwise keep them)
    pub strict_parse: bool,
    /// Only a TCP connect counts (otherwise a ping may rescue a failed TCP check)
    pub tcp_only: bool,
}

impl CheckPolicy {
    /// Keep unparseable descriptors and accept ping as a fallback
    pub fn soft() -> Self {
        Self {
            strict_parse: false,
            tcp_only: false,
        }
    }

    /// Require a parseable descriptor and a successful TCP connect
    pub fn strict() -> Self {
        Self {
            strict_parse: true,
            tcp_only: true,
        }
    }

    pub fn label(&self) -> &'static str {
        match (self.strict_parse, self.tcp_only) {
            (false, false) => "soft",
            (true, true) => "strict",
            (true, false) => "strict-parse",
            (false, true) => "tcp-only",
        }
    }
}

/// Per-country quota caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
    /// Sensitive-port descriptors per high-priority country
    pub sensitive_per_country: u32,
    /// Risky-port descriptors per high-priority country
    pub risky_high_priority: u32,
    /// Risky-port descriptors per other country
    pub risky_other: u32,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            sensitive_per_country: 3,
            risky_high_priority: 5,
            risky_other: 2,
        }
    }
}

/// Tables driving the tiered selection engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    pub good_ports: BTreeSet<u16>,
    pub sensitive_ports: BTreeSet<u16>,
    /// Upper-case two-letter country codes
    pub high_priority_countries: BTreeSet<String>,
    pub quotas: QuotaSettings,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            good_ports: [80, 443, 8443, 8080, 2053, 2083, 2087, 2095, 2096]
                .into_iter()
                .collect(),
            sensitive_ports: [990, 12000].into_iter().collect(),
            high_priority_countries: [
                "US", "GB", "DE", "NL", "CA", "FR", "JP", "SG", "KR", "AU", "SE",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            quotas: QuotaSettings::default(),
        }
    }
}

impl SelectionPolicy {
    /// Classify a port. Good takes precedence if a port sits in both tables.
    pub fn classify_port(&self, port: u16) -> PortClass {
        if self.good_ports.contains(&port) {
            PortClass::Good
        } else if self.sensitive_ports.contains(&port) {
            PortClass::Sensitive
        } else {
            PortClass::Risky
        }
    }

    pub fn is_high_priority(&self, country_code: &str) -> bool {
        self.high_priority_countries.contains(country_code)
    }

    /// Cap for risky-port descriptors of a country with the given priority
    pub fn risky_cap(&self, high_priority: bool) -> u32 {
        if high_priority {
            self.quotas.risky_high_priority
        } else {
            self.quotas.risky_other
        }
    }

    /// Normalize country codes to upper case so lookups match annotations
    pub fn normalized(mut self) -> Self {
        self.high_priority_countries = self
            .high_priority_countries
            .into_iter()
            .map(|cc| cc.trim().to_ascii_uppercase())
            .filter(|cc| !cc.is_empty())
            .collect();
        self
    }
}
