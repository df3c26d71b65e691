use std::collections::HashSet;

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::permissions::ActionType,
    error::{Error, QueryError},
    jwt::SessionData,
    pagination::PageContext,
    schema::{Recipe, RecipeDraft, RecipeIngredient, RecipeIngredientInput, RecipeRow, Uuid},
    RECIPE_COUNT_PER_PAGE, RECIPE_NAME_MAX_LEN,
};

use super::{resolve_ingredients, resolve_tags};

fn ensure_unique_ingredients(ingredients: &[RecipeIngredientInput]) -> Result<(), Error> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    for part in ingredients {
        if !seen.insert(part.id) {
            return Err(Error::validation("Ingredients must be unique"));
        }
    }

    Ok(())
}

fn ensure_positive_amounts(ingredients: &[RecipeIngredientInput]) -> Result<(), Error> {
    for part in ingredients {
        if !(part.amount > 0.0) {
            return Err(Error::validation(
                "Ingredient amount must be greater than zero",
            ));
        }
    }

    Ok(())
}

fn ensure_unique_tags(tags: &[Uuid]) -> Result<(), Error> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    for tag in tags {
        if !seen.insert(*tag) {
            return Err(Error::validation("Tags must be unique"));
        }
    }

    Ok(())
}

fn ensure_cooking_time(cooking_time: i32) -> Result<(), Error> {
    if cooking_time <= 0 {
        return Err(Error::validation(
            "Cooking time must be a positive number of minutes",
        ));
    }

    Ok(())
}

fn ensure_name(name: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::validation("Recipe name must not be empty"));
    }
    if name.chars().count() > RECIPE_NAME_MAX_LEN {
        return Err(Error::validation("Recipe name is too long"));
    }

    Ok(())
}

/// The store-independent part of recipe validation. `upsert_recipe` runs
/// the same checks interleaved with the catalogue existence lookups.
pub fn validate_draft(draft: &RecipeDraft) -> Result<(), Error> {
    if draft.ingredients.is_empty() {
        return Err(Error::validation("At least one ingredient is required"));
    }
    ensure_unique_ingredients(&draft.ingredients)?;
    ensure_positive_amounts(&draft.ingredients)?;
    if draft.tags.is_empty() {
        return Err(Error::validation("At least one tag is required"));
    }
    ensure_unique_tags(&draft.tags)?;
    ensure_cooking_time(draft.cooking_time)?;
    ensure_name(&draft.name)?;

    Ok(())
}

/// Creates a recipe, or replaces an existing one when `recipe_id` is given.
/// Tag and ingredient associations are cleared and re-inserted from the
/// draft, never diffed, and the whole write is one transaction. The author
/// is fixed at creation and never updated.
pub async fn upsert_recipe(
    recipe_id: Option<Uuid>,
    author_id: Uuid,
    draft: &RecipeDraft,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    if draft.ingredients.is_empty() {
        return Err(Error::validation("At least one ingredient is required"));
    }

    let ingredient_ids: Vec<Uuid> = draft.ingredients.iter().map(|part| part.id).collect();
    let known = resolve_ingredients(&ingredient_ids, pool).await?;
    let known_ids: HashSet<Uuid> = known.iter().map(|i| i.id).collect();
    if ingredient_ids.iter().any(|id| !known_ids.contains(id)) {
        return Err(Error::NotFound("ingredient"));
    }

    ensure_unique_ingredients(&draft.ingredients)?;
    ensure_positive_amounts(&draft.ingredients)?;

    if draft.tags.is_empty() {
        return Err(Error::validation("At least one tag is required"));
    }
    ensure_unique_tags(&draft.tags)?;
    ensure_cooking_time(draft.cooking_time)?;
    ensure_name(&draft.name)?;

    let known_tags = resolve_tags(&draft.tags, pool).await?;
    if known_tags.len() != draft.tags.len() {
        return Err(Error::NotFound("tag"));
    }

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    let recipe: Recipe = match recipe_id {
        Some(id) => {
            let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM recipes WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tr)
                .await
                .map_err(|e| QueryError::from(e).into())?;
            if existing.is_none() {
                return Err(Error::NotFound("recipe"));
            }

            sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tr)
                .await
                .map_err(|e| QueryError::from(e).into())?;

            sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tr)
                .await
                .map_err(|e| QueryError::from(e).into())?;

            sqlx::query_as(
                "
                UPDATE recipes SET name = $1, image = $2, text = $3, cooking_time = $4
                WHERE id = $5
                RETURNING *
            ",
            )
            .bind(&draft.name)
            .bind(&draft.image)
            .bind(&draft.text)
            .bind(draft.cooking_time)
            .bind(id)
            .fetch_one(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?
        }
        None => sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, image, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        ",
        )
        .bind(author_id)
        .bind(&draft.name)
        .bind(&draft.image)
        .bind(&draft.text)
        .bind(draft.cooking_time)
        .fetch_one(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?,
    };

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(draft.ingredients.iter(), |mut b, part| {
        b.push_bind(recipe.id).push_bind(part.id).push_bind(part.amount);
    });
    query_builder
        .build()
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(draft.tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe.id).push_bind(tag_id);
    });
    query_builder
        .build()
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    log::debug!(
        "recipe {} saved with {} ingredients and {} tags",
        recipe.id,
        draft.ingredients.len(),
        draft.tags.len()
    );

    Ok(recipe)
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Fetches a recipe for mutation: the session must be allowed to manage its
/// own recipes, and must either own this one or hold the manage-all
/// capability.
pub async fn get_recipe_mut(
    id: Uuid,
    session: SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(Error::unauthorized(
                        "You don't have permission to perform this action",
                    ))
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(Error::NotFound("recipe")),
    }
}

/// Deletes a recipe together with its association and membership rows.
/// ATTENTION: DOES NOT CHECK FOR OWNERSHIP BY ITSELF
pub async fn delete_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<(), Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    for table in [
        "recipe_ingredients",
        "recipe_tags",
        "favorites",
        "shopping_cart",
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = $1"))
            .bind(id)
            .execute(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    }

    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(Error::NotFound("recipe"));
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}

/// Paginated recipe listing, newest first. All filters are optional and
/// combine with AND.
pub async fn fetch_recipes(
    author: Option<Uuid>,
    tag_slug: Option<&str>,
    favorited_by: Option<Uuid>,
    in_cart_of: Option<Uuid>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "
        SELECT r.id, r.author_id, r.name, r.image, r.cooking_time, COUNT(*) OVER() AS count
        FROM recipes r
        WHERE true
    ",
    );

    if let Some(author) = author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }
    if let Some(slug) = tag_slug {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ",
            )
            .push_bind(slug.to_owned())
            .push(")");
    }
    if let Some(user_id) = favorited_by {
        query_builder
            .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(user_id) = in_cart_of {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ",
            )
            .push_bind(user_id)
            .push(")");
    }

    query_builder
        .push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(RECIPE_COUNT_PER_PAGE)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<RecipeRow> = query_builder
        .build_query_as()
        .fetch_all(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.get(0).map(|r| r.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, RECIPE_COUNT_PER_PAGE, offset);

    Ok(page)
}

pub async fn list_recipe_ingredients(
    pool: &Pool<Postgres>,
    recipe_id: Uuid,
) -> Result<Vec<RecipeIngredient>, Error> {
    let rows: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
            i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(id: Uuid, amount: f64) -> RecipeIngredientInput {
        RecipeIngredientInput { id, amount }
    }

    fn draft() -> RecipeDraft {
        RecipeDraft {
            name: String::from("Pancakes"),
            text: String::from("Mix and fry."),
            image: String::from("recipes/pancakes.png"),
            cooking_time: 25,
            tags: vec![1, 2],
            ingredients: vec![part(1, 200.0), part(2, 50.0)],
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert!(validate_draft(&draft()).is_ok());
    }

    #[test]
    fn empty_ingredient_list_fails() {
        let mut draft = draft();
        draft.ingredients.clear();
        assert!(matches!(
            validate_draft(&draft),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn duplicate_ingredient_fails_regardless_of_amounts() {
        let mut draft = draft();
        draft.ingredients = vec![part(1, 200.0), part(1, 50.0)];
        assert!(matches!(validate_draft(&draft), Err(Error::Validation(_))));

        draft.ingredients = vec![part(1, 1.0), part(1, 1.0)];
        assert!(matches!(validate_draft(&draft), Err(Error::Validation(_))));
    }

    #[test]
    fn amount_must_be_strictly_positive() {
        let mut draft = draft();
        draft.ingredients = vec![part(1, 0.0)];
        assert!(validate_draft(&draft).is_err());

        draft.ingredients = vec![part(1, -3.5)];
        assert!(validate_draft(&draft).is_err());

        draft.ingredients = vec![part(1, 0.01)];
        assert!(validate_draft(&draft).is_ok());
    }

    #[test]
    fn nan_amount_is_rejected() {
        let mut draft = draft();
        draft.ingredients = vec![part(1, f64::NAN)];
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn empty_and_duplicate_tags_fail() {
        let mut draft = draft();
        draft.tags.clear();
        assert!(validate_draft(&draft).is_err());

        draft.tags = vec![3, 3];
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn cooking_time_must_be_positive() {
        let mut draft = draft();
        draft.cooking_time = 0;
        assert!(validate_draft(&draft).is_err());

        draft.cooking_time = -10;
        assert!(validate_draft(&draft).is_err());

        draft.cooking_time = 1;
        assert!(validate_draft(&draft).is_ok());
    }

    #[test]
    fn name_limits() {
        let mut draft = draft();
        draft.name = String::from("   ");
        assert!(validate_draft(&draft).is_err());

        draft.name = "x".repeat(RECIPE_NAME_MAX_LEN + 1);
        assert!(validate_draft(&draft).is_err());

        draft.name = "x".repeat(RECIPE_NAME_MAX_LEN);
        assert!(validate_draft(&draft).is_ok());
    }
}
