use std::sync::RwLock;

use crate::models::{ConsultationType, PricingTable};

/// Fee lookup over a runtime-swappable table: the administrator can replace
/// the table without a restart, and tests inject fixtures. Resolution never
/// fails; it falls through to the default consultation price.
pub struct PricingResolver {
    table: RwLock<PricingTable>,
}

impl PricingResolver {
    pub fn new(table: PricingTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// Precedence: pain-type treatment price, then consultation-type price,
    /// then the regular consultation price.
    pub fn consultation_fee(
        &self,
        pain_type: Option<&str>,
        consultation_type: Option<ConsultationType>,
    ) -> i64 {
        let table = self.table.read().unwrap();

        if let Some(pain_type) = pain_type {
            if let Some(&fee) = table.treatments.get(pain_type) {
                return fee;
            }
        }

        match consultation_type {
            Some(ConsultationType::FollowUp) => table.consultation.follow_up,
            Some(ConsultationType::Emergency) => table.consultation.emergency,
            Some(ConsultationType::Regular) | None => table.consultation.regular,
        }
    }

    pub fn currency(&self) -> String {
        self.table.read().unwrap().currency.clone()
    }

    pub fn snapshot(&self) -> PricingTable {
        self.table.read().unwrap().clone()
    }

    pub fn replace(&self, table: PricingTable) {
        *self.table.write().unwrap() = table;
    }
}
