//! Per-order ingredient requirement accounting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cafeops_core::IngredientId;

use crate::stock::covers;

/// Total quantity of each ingredient an order needs.
///
/// Iterates in ascending ingredient id so that stock rows are always
/// decremented in the same order, whichever order the lines arrived in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngredientRequirements(BTreeMap<IngredientId, f64>);

impl IngredientRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `quantity` of an ingredient.
    pub fn add(&mut self, ingredient_id: &IngredientId, quantity: f64) {
        *self.0.entry(ingredient_id.clone()).or_insert(0.0) += quantity;
    }

    pub fn get(&self, ingredient_id: &IngredientId) -> Option<f64> {
        self.0.get(ingredient_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IngredientId, f64)> {
        self.0.iter().map(|(id, qty)| (id, *qty))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// An ingredient whose stock cannot cover what an order needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortfall {
    pub ingredient_id: IngredientId,
    pub required: f64,
    pub available: f64,
}

impl Shortfall {
    /// `Some` when `available` does not cover `required`.
    pub fn check(ingredient_id: &IngredientId, required: f64, available: f64) -> Option<Self> {
        if covers(available, required) {
            None
        } else {
            Some(Self {
                ingredient_id: ingredient_id.clone(),
                required,
                available,
            })
        }
    }
}

impl core::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "ingredient '{}' requires {} but only {} is available",
            self.ingredient_id, self.required, self.available
        )
    }
}
