use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    schema::{Ingredient, Uuid},
    INGREDIENT_COUNT_PER_PAGE, INGREDIENT_NAME_MAX_LEN, MEASUREMENT_UNIT_MAX_LEN,
};

fn ensure_catalogue_entry(name: &str, measurement_unit: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::validation("Ingredient name must not be empty"));
    }
    if name.chars().count() > INGREDIENT_NAME_MAX_LEN {
        return Err(Error::validation("Ingredient name is too long"));
    }
    if measurement_unit.trim().is_empty() {
        return Err(Error::validation("Measurement unit must not be empty"));
    }
    if measurement_unit.chars().count() > MEASUREMENT_UNIT_MAX_LEN {
        return Err(Error::validation("Measurement unit is too long"));
    }

    Ok(())
}

/// Prefix search over the ingredient catalogue, alphabetical, capped at one
/// page. An empty search term lists from the top of the catalogue.
pub async fn list_ingredients(
    search: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = sqlx::query_as(
        "SELECT * FROM ingredients WHERE name ILIKE $1 || '%' ORDER BY name LIMIT $2",
    )
    .bind(search)
    .bind(INGREDIENT_COUNT_PER_PAGE)
    .fetch_all(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn find_ingredient(name: &str, pool: &Pool<Postgres>) -> Result<Option<Uuid>, Error> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM ingredients WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(&*pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    Ok(row.map(|r| r.0))
}

pub async fn create_ingredient(
    name: &str,
    measurement_unit: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    ensure_catalogue_entry(name, measurement_unit)?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        RETURNING id
    ",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(id.0)
}

/// Batch lookup used by recipe validation: returns the catalogue rows for
/// the requested ids. A shorter result than the (deduplicated) input means
/// at least one id does not exist.
pub async fn resolve_ingredients(
    ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = ANY($1)")
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
    fn catalogue_entry_limits() {
        assert!(ensure_catalogue_entry("Flour", "g").is_ok());
        assert!(ensure_catalogue_entry("  ", "g").is_err());
        assert!(ensure_catalogue_entry("Flour", "").is_err());
        assert!(ensure_catalogue_entry(&"x".repeat(INGREDIENT_NAME_MAX_LEN + 1), "g").is_err());
        assert!(ensure_catalogue_entry("Flour", &"x".repeat(MEASUREMENT_UNIT_MAX_LEN + 1)).is_err());
    }
}
