use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    pagination::PageContext,
    schema::{MembershipKind, RecipeRow, RecipeSummary, Uuid},
    RECIPE_COUNT_PER_PAGE,
};

async fn get_recipe_summary(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeSummary>, Error> {
    let row: Option<RecipeSummary> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(&*pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Adds or removes a (user, recipe) membership row. Adding an existing
/// membership is a conflict; removing a missing one is a no-op. The unique
/// (user_id, recipe_id) constraint on both membership tables is what makes
/// the add direction race-safe.
///
/// Returns the cropped recipe projection on add, nothing on remove.
pub async fn toggle_membership(
    kind: MembershipKind,
    user_id: Uuid,
    recipe_id: Uuid,
    add: bool,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeSummary>, Error> {
    let summary = match get_recipe_summary(recipe_id, pool).await? {
        Some(summary) => summary,
        None => return Err(Error::NotFound("recipe")),
    };

    let table = kind.table();

    if add {
        let result = sqlx::query(&format!(
            "INSERT INTO {table} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *;"
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

        if result.rows_affected() <= 0 {
            return Err(Error::conflict(&format!(
                "Recipe is already in {}",
                kind.label()
            )));
        }

        return Ok(Some(summary));
    }

    sqlx::query(&format!(
        "DELETE FROM {table} WHERE user_id = $1 AND recipe_id = $2"
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(None)
}

pub async fn is_member(
    kind: MembershipKind,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE recipe_id = $1 AND user_id = $2",
        kind.table()
    ))
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

/// Paginated listing of a user's favorites or cart, newest recipe first.
pub async fn fetch_memberships(
    kind: MembershipKind,
    user_id: Uuid,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let rows: Vec<RecipeRow> = sqlx::query_as(&format!(
        "
        SELECT r.id, r.author_id, r.name, r.image, r.cooking_time, COUNT(*) OVER() AS count
        FROM {} m
        INNER JOIN recipes r ON r.id = m.recipe_id
        WHERE m.user_id = $1
        ORDER BY r.id DESC
        LIMIT $2 OFFSET $3
    ",
        kind.table()
    ))
    .bind(user_id)
    .bind(RECIPE_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.get(0).map(|r| r.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, RECIPE_COUNT_PER_PAGE, offset);

    Ok(page)
}
