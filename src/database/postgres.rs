use async_trait::async_trait;
use log::info;
use sqlx::{postgres::PgPoolOptions, PgConnection, Pool, Postgres, QueryBuilder};

use super::{
    error::{Error, QueryError},
    schema::{
        Composition, Id, Ingredient, LinkKind, LinkRecord, NewUser, Recipe, RecipeFilter,
        RecipePart, Subscription, Tag, User,
    },
    store::Store,
};

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Reports a row that vanished between the caller's lookup and the insert
/// as `NotFound` instead of a storage failure.
fn missing_reference(e: sqlx::Error, info: &str) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
            Error::not_found(info)
        }
        _ => QueryError::from(e).into(),
    }
}

/// PostgreSQL backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(QueryError::from)?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| QueryError::from(sqlx::Error::Migrate(Box::new(e))))?;
        info!("Database migrations applied");

        Ok(())
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

/// Writes both association sets of a freshly inserted recipe.
async fn insert_associations(
    conn: &mut PgConnection,
    recipe_id: Id,
    composition: &Composition,
) -> Result<(), Error> {
    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::int4[])")
        .bind(recipe_id)
        .bind(&composition.tag_ids)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let (ingredient_ids, amounts): (Vec<Id>, Vec<i32>) = composition
        .ingredients
        .iter()
        .map(|item| (item.id, item.amount))
        .unzip();

    sqlx::query(
        "
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, t.ingredient_id, t.amount
        FROM UNNEST($2::int4[], $3::int4[]) AS t (ingredient_id, amount)
    ",
    )
    .bind(recipe_id)
    .bind(ingredient_ids)
    .bind(amounts)
    .execute(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    Ok(())
}

/// Makes the stored association sets equal to the composition's. Must run
/// inside the transaction that also updates the recipe row.
async fn reconcile_associations(
    conn: &mut PgConnection,
    recipe_id: Id,
    composition: &Composition,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    insert_associations(conn, recipe_id, composition).await
}

fn push_recipe_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter) {
    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }

    for (enabled, kind) in [
        (filter.is_favorited, LinkKind::Favorite),
        (filter.is_in_shopping_cart, LinkKind::ShoppingCart),
    ] {
        if !enabled {
            continue;
        }
        match filter.viewer {
            Some(viewer) => {
                query
                    .push(format!(
                        " AND EXISTS (SELECT 1 FROM {} l WHERE l.recipe_id = r.id AND l.user_id = ",
                        kind.table()
                    ))
                    .push_bind(viewer)
                    .push(")");
            }
            None => {
                query.push(" AND FALSE");
            }
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: &NewUser) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as(
            "
            INSERT INTO users (username, email, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING RETURNING *
        ",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn fetch_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), Error> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        let rows: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY id LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok((rows, total.0))
    }

    async fn create_tag(&self, name: &str, slug: &str) -> Result<Option<Tag>, Error> {
        let row: Option<Tag> = sqlx::query_as(
            "INSERT INTO tags (name, slug) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *",
        )
        .bind(name)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, Error> {
        let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn find_tags(&self, ids: &[Id]) -> Result<Vec<Tag>, Error> {
        let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = ANY($1) ORDER BY name")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Option<Ingredient>, Error> {
        let row: Option<Ingredient> = sqlx::query_as(
            "
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING RETURNING *
        ",
        )
        .bind(name)
        .bind(measurement_unit)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, Error> {
        let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn list_ingredients(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>, Error> {
        let rows: Vec<Ingredient> = sqlx::query_as(
            "
            SELECT * FROM ingredients
            WHERE $1::text IS NULL OR starts_with(LOWER(name), LOWER($1))
            ORDER BY name, measurement_unit
        ",
        )
        .bind(name_prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn find_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, Error> {
        let rows: Vec<Ingredient> =
            sqlx::query_as("SELECT * FROM ingredients WHERE id = ANY($1) ORDER BY name")
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn insert_recipe(
        &self,
        author_id: Id,
        composition: &Composition,
    ) -> Result<Recipe, Error> {
        let mut tr = self
            .pool
            .begin()
            .await
            .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

        let recipe: Recipe = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, text, cooking_time, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        ",
        )
        .bind(author_id)
        .bind(&composition.fields.name)
        .bind(&composition.fields.text)
        .bind(composition.fields.cooking_time)
        .bind(&composition.fields.image)
        .fetch_one(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        insert_associations(&mut tr, recipe.id, composition).await?;

        tr.commit()
            .await
            .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

        Ok(recipe)
    }

    async fn replace_recipe(
        &self,
        recipe_id: Id,
        composition: &Composition,
    ) -> Result<Option<Recipe>, Error> {
        let mut tr = self
            .pool
            .begin()
            .await
            .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

        let recipe: Option<Recipe> = sqlx::query_as(
            "
            UPDATE recipes SET name = $1, text = $2, cooking_time = $3, image = $4
            WHERE id = $5
            RETURNING *
        ",
        )
        .bind(&composition.fields.name)
        .bind(&composition.fields.text)
        .bind(composition.fields.cooking_time)
        .bind(&composition.fields.image)
        .bind(recipe_id)
        .fetch_optional(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        let Some(recipe) = recipe else {
            tr.rollback().await.map_err(QueryError::from)?;
            return Ok(None);
        };

        reconcile_associations(&mut tr, recipe.id, composition).await?;

        tr.commit()
            .await
            .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

        Ok(Some(recipe))
    }

    async fn delete_recipe(&self, recipe_id: Id) -> Result<bool, Error> {
        // association and link rows go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .execute(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_recipe(&self, recipe_id: Id) -> Result<Option<Recipe>, Error> {
        let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, Error> {
        let rows: Vec<Tag> = sqlx::query_as(
            "
            SELECT t.*
            FROM recipe_tags rt
            INNER JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = $1
            ORDER BY t.name
        ",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn list_recipe_parts(&self, recipe_id: Id) -> Result<Vec<RecipePart>, Error> {
        let rows: Vec<RecipePart> = sqlx::query_as(
            "
            SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
                i.measurement_unit AS measurement_unit, ri.amount AS amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = $1
            ORDER BY i.name
        ",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn fetch_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), Error> {
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
        push_recipe_filter(&mut count_query, filter);
        let total: (i64,) = count_query
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        let mut query = QueryBuilder::new("SELECT r.* FROM recipes r WHERE TRUE");
        push_recipe_filter(&mut query, filter);
        query
            .push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows: Vec<Recipe> = query
            .build_query_as::<Recipe>()
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok((rows, total.0))
    }

    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, Error> {
        // LIMIT NULL is LIMIT ALL
        let rows: Vec<Recipe> = sqlx::query_as(
            "SELECT * FROM recipes WHERE author_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(author_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(count.0)
    }

    async fn insert_link(
        &self,
        kind: LinkKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<Option<LinkRecord>, Error> {
        let mut tr = self
            .pool
            .begin()
            .await
            .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

        let existing: Option<(Id,)> = sqlx::query_as(&format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = $2",
            kind.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .fetch_optional(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        if existing.is_some() {
            tr.rollback().await.map_err(QueryError::from)?;
            return Ok(None);
        }

        // a concurrent insert of the same pair loses on the primary key
        let inserted: Option<(Id, Id)> = sqlx::query_as(&format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING user_id, recipe_id",
            kind.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .fetch_optional(&mut *tr)
        .await
        .map_err(|e| missing_reference(e, "No recipe exists with specified id"))?;

        tr.commit()
            .await
            .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

        Ok(inserted.map(|(user_id, recipe_id)| LinkRecord {
            kind,
            user_id,
            recipe_id,
        }))
    }

    async fn delete_link(
        &self,
        kind: LinkKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<u64, Error> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            kind.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(result.rows_affected())
    }

    async fn link_exists(
        &self,
        kind: LinkKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, Error> {
        let row: Option<(Id,)> = sqlx::query_as(&format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = $2",
            kind.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(row.is_some())
    }

    async fn list_linked_recipes(&self, kind: LinkKind, user_id: Id) -> Result<Vec<Id>, Error> {
        let rows: Vec<(Id,)> = sqlx::query_as(&format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 ORDER BY recipe_id",
            kind.table()
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn list_cart_parts(&self, user_id: Id) -> Result<Vec<RecipePart>, Error> {
        let rows: Vec<RecipePart> = sqlx::query_as(
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
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn insert_subscription(
        &self,
        user_id: Id,
        author_id: Id,
    ) -> Result<Option<Subscription>, Error> {
        let mut tr = self
            .pool
            .begin()
            .await
            .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

        let existing: Option<Subscription> =
            sqlx::query_as("SELECT * FROM subscriptions WHERE user_id = $1 AND author_id = $2")
                .bind(user_id)
                .bind(author_id)
                .fetch_optional(&mut *tr)
                .await
                .map_err(QueryError::from)?;

        if existing.is_some() {
            tr.rollback().await.map_err(QueryError::from)?;
            return Ok(None);
        }

        let inserted: Option<Subscription> = sqlx::query_as(
            "
            INSERT INTO subscriptions (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING RETURNING *
        ",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(&mut *tr)
        .await
        .map_err(|e| missing_reference(e, "No user exists with specified id"))?;

        tr.commit()
            .await
            .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

        Ok(inserted)
    }

    async fn delete_subscription(&self, user_id: Id, author_id: Id) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(result.rows_affected())
    }

    async fn subscription_exists(&self, user_id: Id, author_id: Id) -> Result<bool, Error> {
        let row: Option<Subscription> =
            sqlx::query_as("SELECT * FROM subscriptions WHERE user_id = $1 AND author_id = $2")
                .bind(user_id)
                .bind(author_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(QueryError::from)?;

        Ok(row.is_some())
    }

    async fn fetch_subscribed_authors(
        &self,
        user_id: Id,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), Error> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        let rows: Vec<User> = sqlx::query_as(
            "
            SELECT u.*
            FROM subscriptions s
            INNER JOIN users u ON u.id = s.author_id
            WHERE s.user_id = $1
            ORDER BY u.username
            LIMIT $2 OFFSET $3
        ",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok((rows, total.0))
    }

    async fn save_short_link(&self, code: &str, recipe_id: Id) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO recipe_short_links (code, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(code)
        .bind(recipe_id)
        .execute(&self.pool)
        .await
        .map_err(|e| missing_reference(e, "No recipe exists with specified id"))?;

        Ok(())
    }

    async fn find_short_link(&self, code: &str) -> Result<Option<Id>, Error> {
        let row: Option<(Id,)> =
            sqlx::query_as("SELECT recipe_id FROM recipe_short_links WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await
                .map_err(QueryError::from)?;

        Ok(row.map(|(recipe_id,)| recipe_id))
    }
}
