//! Tiered selection of the restrictive descriptor set
//!
//! A single greedy pass over the alive list. Good ports are admitted
//! freely; sensitive and risky ports draw on per-country quotas, and the
//! first descriptor in input order to reach a quota wins the slot.

mod quota;

pub use quota::QuotaLedger;

use tracing::{debug, info, instrument};

use crate::models::{Descriptor, PortClass, SelectionPolicy};

/// Why a descriptor was left out of the restrictive set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No host/port to classify
    Unparseable,
    /// Sensitive port from a country outside the high-priority set
    LowPrioritySensitive,
    /// The country's quota for this port class is used up
    QuotaExhausted(PortClass),
}

/// Decision for a single descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted(PortClass),
    Rejected(Rejection),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

/// Result of a selection pass
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Admitted descriptors in input order
    pub selected: Vec<Descriptor>,
    pub ledger: QuotaLedger,
    pub rejected: usize,
}

/// Quota-based selector over a fixed policy
#[derive(Debug, Clone, Default)]
pub struct TieredSelector {
    policy: SelectionPolicy,
}

impl TieredSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Decide one descriptor, consuming quota from `ledger` on admission
    pub fn admit(&self, ledger: &mut QuotaLedger, descriptor: &Descriptor) -> Admission {
        let Some(endpoint) = descriptor.endpoint() else {
            return Admission::Rejected(Rejection::Unparseable);
        };

        let country = descriptor.country_code();
        let high_priority = self.policy.is_high_priority(country);
        let class = self.policy.classify_port(endpoint.port);

        let cap = match class {
            PortClass::Good => return Admission::Admitted(class),
            PortClass::Sensitive if !high_priority => {
                return Admission::Rejected(Rejection::LowPrioritySensitive)
            }
            PortClass::Sensitive => self.policy.quotas.sensitive_per_country,
            PortClass::Risky => self.policy.risky_cap(high_priority),
        };

        if ledger.try_consume(class, country, cap) {
            Admission::Admitted(class)
        } else {
            Admission::Rejected(Rejection::QuotaExhausted(class))
        }
    }

    /// Select the restrictive subset of `alive`, preserving its order
    #[instrument(skip_all, fields(total = alive.len()))]
    pub fn select(&self, alive: &[Descriptor]) -> Selection {
        let mut selection = Selection::default();

        for descriptor in alive {
            match self.admit(&mut selection.ledger, descriptor) {
                Admission::Admitted(_) => selection.selected.push(descriptor.clone()),
                Admission::Rejected(reason) => {
                    debug!("Rejected {:?}: {}", reason, descriptor);
                    selection.rejected += 1;
                }
            }
        }

        info!(
            "Selected {} of {} descriptors (countries on risky quota: {}, on sensitive quota: {})",
            selection.selected.len(),
            alive.len(),
            selection.ledger.countries(PortClass::Risky),
            selection.ledger.countries(PortClass::Sensitive),
        );

        selection
    }
}
