use std::collections::HashMap;

use crate::models::PortClass;

/// Per-country quota consumption for a single selection pass
///
/// Counters only ever increase and never pass the cap they were consumed
/// against. Good-port admissions are uncapped and are not tracked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaLedger {
    risky: HashMap<String, u32>,
    sensitive: HashMap<String, u32>,
}

impl QuotaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, class: PortClass) -> Option<&HashMap<String, u32>> {
        match class {
            PortClass::Good => None,
            PortClass::Sensitive => Some(&self.sensitive),
            PortClass::Risky => Some(&self.risky),
        }
    }

    /// Slots of `class` already used by `country`
    pub fn used(&self, class: PortClass, country: &str) -> u32 {
        self.counters(class)
            .and_then(|counters| counters.get(country).copied())
            .unwrap_or(0)
    }

    /// Take one slot of `class` for `country` if fewer than `cap` are used
    pub fn try_consume(&mut self, class: PortClass, country: &str, cap: u32) -> bool {
        let counters = match class {
            PortClass::Good => return true,
            PortClass::Sensitive => &mut self.sensitive,
            PortClass::Risky => &mut self.risky,
        };

        // Avoid allocating a key for countries that can never be admitted
        if cap == 0 {
            return false;
        }

        let used = counters.entry(country.to_string()).or_insert(0);
        if *used >= cap {
            return false;
        }
        *used += 1;
        true
    }

    /// Number of countries that consumed at least one slot of `class`
    pub fn countries(&self, class: PortClass) -> usize {
        self.counters(class).map_or(0, HashMap::len)
    }
}
