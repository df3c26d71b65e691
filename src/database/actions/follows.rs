use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    pagination::PageContext,
    schema::{AuthorRow, RecipeSummary, Uuid},
    USER_COUNT_PER_PAGE,
};

use super::get_user_by_id;

/// Self-follows are rejected unconditionally, before any store lookup.
pub fn ensure_not_self(follower_id: Uuid, author_id: Uuid) -> Result<(), Error> {
    if follower_id == author_id {
        return Err(Error::validation("You cannot follow yourself"));
    }

    Ok(())
}

pub async fn follow_author(
    follower_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    ensure_not_self(follower_id, author_id)?;

    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(Error::NotFound("user"));
    }

    let result = sqlx::query(
        "INSERT INTO follows (follower_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *;",
    )
    .bind(follower_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(Error::conflict("You are already following this author"));
    }

    Ok(())
}

pub async fn unfollow_author(
    follower_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(Error::NotFound("user"));
    }

    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND author_id = $2")
        .bind(follower_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(Error::conflict("You are not following this author"));
    }

    Ok(())
}

pub async fn is_following(
    follower_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> =
        sqlx::query_as("SELECT author_id FROM follows WHERE follower_id = $1 AND author_id = $2")
            .bind(follower_id)
            .bind(author_id)
            .fetch_optional(&*pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

/// Paginated listing of the authors a user follows, each with their total
/// recipe count.
pub async fn fetch_subscriptions(
    follower_id: Uuid,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<AuthorRow>, Error> {
    let rows: Vec<AuthorRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.follower_id = $1
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(follower_id)
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.get(0).map(|a| a.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, USER_COUNT_PER_PAGE, offset);

    Ok(page)
}

/// Cropped recipes of a followed author, newest first. `limit` caps the
/// list when given.
pub async fn list_author_recipes(
    author_id: Uuid,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeSummary>, Error> {
    let rows: Vec<RecipeSummary> = sqlx::query_as(
        "
        SELECT id, name, image, cooking_time
        FROM recipes
        WHERE author_id = $1
        ORDER BY id DESC
        LIMIT $2
    ",
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_follow_is_always_invalid() {
        assert!(matches!(
            ensure_not_self(7, 7),
            Err(Error::Validation(_))
        ));
        assert!(ensure_not_self(7, 8).is_ok());
    }
}
