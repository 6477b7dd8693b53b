use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cafeops_core::{DomainError, DomainResult, IngredientId, MenuItemId};

/// Ingredient usage for one unit of a menu item.
///
/// Keyed by ingredient id; iteration order is the id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe(BTreeMap<IngredientId, f64>);

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the per-unit quantity of an ingredient.
    pub fn with(mut self, ingredient_id: IngredientId, quantity_per_unit: f64) -> DomainResult<Self> {
        if !quantity_per_unit.is_finite() || quantity_per_unit < 0.0 {
            return Err(DomainError::validation(format!(
                "recipe quantity for '{ingredient_id}' must be a non-negative number"
            )));
        }
        self.0.insert(ingredient_id, quantity_per_unit);
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IngredientId, f64)> {
        self.0.iter().map(|(id, qty)| (id, *qty))
    }

    /// Ingredient quantities needed for `units` servings, skipping ingredients
    /// the recipe lists with a zero quantity.
    pub fn scaled(&self, units: f64) -> impl Iterator<Item = (&IngredientId, f64)> {
        self.iter()
            .filter(|(_, per_unit)| *per_unit > 0.0)
            .map(move |(id, per_unit)| (id, per_unit * units))
    }
}

/// A sellable menu item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    /// Unit price. Always positive.
    pub price: f64,
    pub recipe: Recipe,
}

impl MenuItem {
    pub fn new(
        id: MenuItemId,
        name: impl Into<String>,
        price: f64,
        recipe: Recipe,
    ) -> DomainResult<Self> {
        if !price.is_finite() || price <= 0.0 {
            return Err(DomainError::validation("price must be greater than 0"));
        }
        Ok(Self {
            id,
            name: name.into(),
            price,
            recipe,
        })
    }

    /// Extended price of `quantity` units at the current catalog price.
    pub fn line_total(&self, quantity: i64) -> f64 {
        self.price * quantity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ingredient(id: &str) -> IngredientId {
        IngredientId::parse(id).unwrap()
    }

    fn latte() -> MenuItem {
        let recipe = Recipe::new()
            .with(ingredient("espresso_beans"), 18.0)
            .unwrap()
            .with(ingredient("milk"), 200.0)
            .unwrap();
        MenuItem::new(MenuItemId::parse("latte").unwrap(), "Latte", 3.5, recipe).unwrap()
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let id = MenuItemId::parse("free").unwrap();
        let err = MenuItem::new(id.clone(), "Free", 0.0, Recipe::new()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(MenuItem::new(id, "Nan", f64::NAN, Recipe::new()).is_err());
    }

    #[test]
    fn negative_recipe_quantity_is_rejected() {
        let err = Recipe::new().with(ingredient("milk"), -1.0).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("milk") => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn scaled_multiplies_and_skips_zero_entries() {
        let recipe = Recipe::new()
            .with(ingredient("milk"), 200.0)
            .unwrap()
            .with(ingredient("garnish"), 0.0)
            .unwrap();

        let scaled: Vec<_> = recipe.scaled(3.0).map(|(id, q)| (id.as_str().to_string(), q)).collect();
        assert_eq!(scaled, vec![("milk".to_string(), 600.0)]);
    }

    #[test]
    fn recipe_iterates_in_ingredient_order() {
        let item = latte();
        let ids: Vec<_> = item.recipe.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["espresso_beans", "milk"]);
    }

    #[test]
    fn line_total_is_price_times_quantity() {
        assert_eq!(latte().line_total(4), 14.0);
    }

    #[test]
    fn recipe_serializes_as_a_plain_map() {
        let json = serde_json::to_value(&latte().recipe).unwrap();
        assert_eq!(json["milk"], 200.0);
        assert_eq!(json["espresso_beans"], 18.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: scaling by `n` equals `n` times the per-unit quantity.
        #[test]
        fn scaling_is_linear(per_unit in 0.001f64..500.0, units in 1i64..50) {
            let recipe = Recipe::new().with(ingredient("milk"), per_unit).unwrap();
            let (_, scaled) = recipe.scaled(units as f64).next().unwrap();
            prop_assert_eq!(scaled, per_unit * units as f64);
        }
    }
}
