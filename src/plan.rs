//! Content-mix accounting and generation planning.

use crate::stock::Stock;
use postcrew_core::{Category, CtaType};
use std::cmp::Ordering;

/// One slot of a generation plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanSlot {
    pub category: Category,
    pub cta_type: CtaType,
}

/// `target - current` share per category, largest deficit first.
///
/// The current share is measured over unused stock only; with no unused stock
/// every current share is zero. Ties keep the order of `targets`.
pub fn mix_deficit(targets: &[(Category, f64)], stock: &Stock) -> Vec<(Category, f64)> {
    let counts = stock.unused_counts();
    let total = stock.unused_total();

    let mut deficits: Vec<(Category, f64)> = targets
        .iter()
        .map(|&(category, target)| {
            let current = if total == 0 {
                0.0
            } else {
                counts.get(&category).copied().unwrap_or(0) as f64 / total as f64
            };
            (category, target - current)
        })
        .collect();
    // sort_by is stable
    deficits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    deficits
}

/// Round-robin over the deficit order. The first `round(n * soft_fraction)`
/// slots get a soft CTA, the rest hard.
pub fn build_generation_plan(
    deficits: &[(Category, f64)],
    n: usize,
    soft_fraction: f64,
) -> Vec<PlanSlot> {
    let order: Vec<Category> = if deficits.is_empty() {
        Category::ALL.to_vec()
    } else {
        deficits.iter().map(|(c, _)| *c).collect()
    };
    let soft = soft_count(n, soft_fraction);

    (0..n)
        .map(|i| PlanSlot {
            category: order[i % order.len()],
            cta_type: if i < soft { CtaType::Soft } else { CtaType::Hard },
        })
        .collect()
}

fn soft_count(n: usize, soft_fraction: f64) -> usize {
    let fraction = soft_fraction.clamp(0.0, 1.0);
    ((n as f64 * fraction).round() as usize).min(n)
}
