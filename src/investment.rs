/// Unit costs of the objective composition. Hardening is priced per line,
/// generation per kW of sited capacity, shedding per kW of curtailed load.
/// The switching penalty is a small weight on every energized line that
/// breaks degeneracy between equally cheap topologies.
#[derive(Debug, Clone)]
pub struct Costs {
    pub hardening_per_line: f64,
    pub generator_per_kw: f64,
    pub generator_capacity_kw: f64,
    pub shedding_per_kw: f64,
    pub switching_penalty: f64,
}

impl Costs {
    pub fn new(
        hardening_per_line: f64,
        generator_per_kw: f64,
        generator_capacity_kw: f64,
        shedding_per_kw: f64,
        switching_penalty: f64,
    ) -> Self {
        Self {
            hardening_per_line,
            generator_per_kw,
            generator_capacity_kw,
            shedding_per_kw,
            switching_penalty,
        }
    }

    /// Reference-study pricing: $400/line hardened, $1.5/kW of generation
    /// at 100 kW units, $14/kW shed, 0.01 switching weight.
    pub fn reference() -> Self {
        Self::new(400.0, 1.5, 100.0, 14.0, 0.01)
    }

    /// Capital cost of siting one generator unit.
    pub fn generator_unit_cost(&self) -> f64 {
        self.generator_per_kw * self.generator_capacity_kw
    }

    pub fn investment_cost(&self, plan: &InvestmentPlan) -> f64 {
        self.hardening_per_line * plan.hardened.len() as f64
            + self.generator_unit_cost() * plan.generator_sites.len() as f64
    }
}

/// First-stage budgets: how many lines may be hardened and how many
/// generator units may be sited.
#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    pub hardening: usize,
    pub generators: usize,
}

impl Budgets {
    pub fn new(hardening: usize, generators: usize) -> Self {
        Self {
            hardening,
            generators,
        }
    }
}

/// A first-stage decision: which lines to harden and where to site
/// generators. Pure data; sets are kept sorted so plans compare by value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvestmentPlan {
    pub hardened: Vec<usize>,
    pub generator_sites: Vec<usize>,
}

impl InvestmentPlan {
    pub fn new(
        mut hardened: Vec<usize>,
        mut generator_sites: Vec<usize>,
    ) -> Self {
        hardened.sort_unstable();
        generator_sites.sort_unstable();
        Self {
            hardened,
            generator_sites,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_hardened(&self, line_id: usize) -> bool {
        self.hardened.binary_search(&line_id).is_ok()
    }

    pub fn has_generator(&self, node_id: usize) -> bool {
        self.generator_sites.binary_search(&node_id).is_ok()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_investment_cost_of_reference_plan() {
        let costs = Costs::reference();
        let plan = InvestmentPlan::new(vec![2], vec![9]);
        // one hardened line plus one 100 kW generator
        assert_eq!(costs.investment_cost(&plan), 400.0 + 150.0);
        assert_eq!(costs.generator_unit_cost(), 150.0);
    }

    #[test]
    fn test_plans_compare_regardless_of_input_order() {
        let a = InvestmentPlan::new(vec![11, 2], vec![9, 4]);
        let b = InvestmentPlan::new(vec![2, 11], vec![4, 9]);
        assert_eq!(a, b);
        assert!(a.is_hardened(11));
        assert!(!a.is_hardened(3));
        assert!(a.has_generator(4));
    }

    #[test]
    fn test_empty_plan_costs_nothing() {
        let costs = Costs::reference();
        assert_eq!(costs.investment_cost(&InvestmentPlan::empty()), 0.0);
    }
}
