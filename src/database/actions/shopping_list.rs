use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    schema::{RecipeIngredient, ShoppingListItem, Uuid},
    SHOPPING_LIST_HEADER,
};

/// Every ingredient line of every recipe in the user's cart, joined to the
/// catalogue for names and units.
pub async fn list_cart_ingredients(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredient>, Error> {
    let rows: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
            i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM shopping_cart sc
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

/// Groups ingredient lines by (name, measurement unit) and sums the
/// amounts. Output is sorted by name then unit, so the result does not
/// depend on the order the cart rows came in.
pub fn aggregate_shopping_list(rows: Vec<RecipeIngredient>) -> Vec<ShoppingListItem> {
    let mut totals: HashMap<(String, String), f64> = HashMap::new();
    rows.into_iter().for_each(|row| {
        let key = (row.name, row.measurement_unit);
        match totals.get_mut(&key) {
            Some(total) => *total += row.amount,
            None => {
                totals.insert(key, row.amount);
            }
        }
    });

    let mut items: Vec<ShoppingListItem> = totals
        .into_iter()
        .map(|((name, measurement_unit), total_amount)| ShoppingListItem {
            name,
            measurement_unit,
            total_amount,
        })
        .collect();

    items.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.measurement_unit.cmp(&b.measurement_unit))
    });

    items
}

/// Renders the plain-text report served as the shopping-list download. An
/// empty cart yields the header only.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut report = format!("{SHOPPING_LIST_HEADER}\n\n");
    for item in items {
        report += &format!(
            "{} ({}) - {}\n",
            item.name, item.measurement_unit, item.total_amount
        );
    }

    report
}

pub async fn build_shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, Error> {
    let rows = list_cart_ingredients(user_id, pool).await?;

    Ok(aggregate_shopping_list(rows))
}

pub async fn export_shopping_list(user_id: Uuid, pool: &Pool<Postgres>) -> Result<String, Error> {
    let items = build_shopping_list(user_id, pool).await?;

    Ok(render_shopping_list(&items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(recipe_id: Uuid, ingredient_id: Uuid, name: &str, unit: &str, amount: f64) -> RecipeIngredient {
        RecipeIngredient {
            recipe_id,
            ingredient_id,
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    fn cart() -> Vec<RecipeIngredient> {
        vec![
            row(1, 1, "Flour", "g", 200.0),
            row(1, 2, "Sugar", "g", 50.0),
            row(2, 1, "Flour", "g", 100.0),
            row(2, 3, "Egg", "pcs", 2.0),
        ]
    }

    #[test]
    fn sums_amounts_per_name_and_unit() {
        let items = aggregate_shopping_list(cart());

        assert_eq!(items.len(), 3);
        assert_eq!(
            items[0],
            ShoppingListItem {
                name: String::from("Egg"),
                measurement_unit: String::from("pcs"),
                total_amount: 2.0
            }
        );
        assert_eq!(items[1].name, "Flour");
        assert_eq!(items[1].total_amount, 300.0);
        assert_eq!(items[2].name, "Sugar");
        assert_eq!(items[2].total_amount, 50.0);
    }

    #[test]
    fn aggregation_is_order_independent() {
        let mut reversed = cart();
        reversed.reverse();

        assert_eq!(aggregate_shopping_list(cart()), aggregate_shopping_list(reversed));
    }

    #[test]
    fn same_name_different_unit_stays_separate() {
        let items = aggregate_shopping_list(vec![
            row(1, 1, "Milk", "ml", 200.0),
            row(2, 4, "Milk", "l", 1.0),
        ]);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].measurement_unit, "l");
        assert_eq!(items[1].measurement_unit, "ml");
    }

    #[test]
    fn fractional_amounts_accumulate() {
        let items = aggregate_shopping_list(vec![
            row(1, 5, "Vanilla", "g", 0.01),
            row(2, 5, "Vanilla", "g", 0.02),
        ]);

        assert_eq!(items.len(), 1);
        assert!((items[0].total_amount - 0.03).abs() < 1e-9);
    }

    #[test]
    fn report_lines_follow_the_fixed_format() {
        let report = render_shopping_list(&aggregate_shopping_list(cart()));

        let mut lines = report.lines();
        assert_eq!(lines.next(), Some(SHOPPING_LIST_HEADER));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("Egg (pcs) - 2"));
        assert_eq!(lines.next(), Some("Flour (g) - 300"));
        assert_eq!(lines.next(), Some("Sugar (g) - 50"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_cart_renders_header_only() {
        let report = render_shopping_list(&[]);
        assert_eq!(report, format!("{SHOPPING_LIST_HEADER}\n\n"));
    }
}
