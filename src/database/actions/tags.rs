use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    schema::{Tag, Uuid},
    TAG_COLOR_LEN, TAG_NAME_MAX_LEN, TAG_SLUG_MAX_LEN,
};

fn ensure_tag_fields(name: &str, color: &str, slug: &str) -> Result<(), Error> {
    if name.trim().is_empty() || name.chars().count() > TAG_NAME_MAX_LEN {
        return Err(Error::validation("Invalid tag name"));
    }
    if slug.is_empty()
        || slug.len() > TAG_SLUG_MAX_LEN
        || !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::validation("Invalid tag slug"));
    }
    // Hex color of the form #a1b2c3.
    if color.len() != TAG_COLOR_LEN
        || !color.starts_with('#')
        || !color[1..].chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(Error::validation("Invalid tag color"));
    }

    Ok(())
}

/// Creates a tag. Name, color and slug are all unique; a clash on any of
/// them is a conflict.
pub async fn create_tag(
    name: &str,
    color: &str,
    slug: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    ensure_tag_fields(name, color, slug)?;

    let result = sqlx::query_as(
        "
        INSERT INTO tags (name, color, slug)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING RETURNING id
    ",
    )
    .bind(name)
    .bind(color)
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    match result {
        Some((id,)) => Ok(id),
        None => Err(Error::conflict("Tag with this name, color or slug already exists")),
    }
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn find_tag(slug: &str, pool: &Pool<Postgres>) -> Result<Option<Uuid>, Error> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row.map(|tag| tag.0))
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(list)
}

pub async fn list_recipe_tags(pool: &Pool<Postgres>, recipe_id: Uuid) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(list)
}

/// Batch lookup used by recipe validation, mirroring `resolve_ingredients`.
pub async fn resolve_tags(ids: &[Uuid], pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_field_limits() {
        assert!(ensure_tag_fields("Breakfast", "#e26c2d", "breakfast").is_ok());
        assert!(ensure_tag_fields("", "#e26c2d", "breakfast").is_err());
        assert!(ensure_tag_fields("Breakfast", "#e26c2d", "no spaces here").is_err());
        assert!(ensure_tag_fields("Breakfast", "e26c2d", "breakfast").is_err());
        assert!(ensure_tag_fields("Breakfast", "#e26c2", "breakfast").is_err());
        assert!(ensure_tag_fields("Breakfast", "#e26c2g", "breakfast").is_err());
    }
}
