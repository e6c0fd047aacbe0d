use crate::core::{Outcome, SkipReason};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct ReconcileMetrics {
    reconciles: Family<ResultLabels, Counter>,
    skips: Family<SkipLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ResultLabels {
    result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SkipLabels {
    reason: &'static str,
}

// === impl ReconcileMetrics ===

impl ReconcileMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::default();
        reg.register(
            "reconciles",
            "Count of SQLInstance reconciliations by result",
            reconciles.clone(),
        );

        let skips = Family::default();
        reg.register(
            "skips",
            "Count of SQLInstances skipped because they are not ready or not eligible",
            skips.clone(),
        );

        Self { reconciles, skips }
    }

    pub(crate) fn applied(&self, outcome: Outcome) {
        self.inc(outcome.as_str());
    }

    pub(crate) fn skipped(&self, reason: &SkipReason) {
        self.inc("skipped");
        self.skips
            .get_or_create(&SkipLabels {
                reason: reason.as_str(),
            })
            .inc();
    }

    pub(crate) fn failed(&self) {
        self.inc("failed");
    }

    fn inc(&self, result: &'static str) {
        self.reconciles
            .get_or_create(&ResultLabels { result })
            .inc();
    }
}
