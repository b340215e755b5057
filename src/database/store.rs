//! Persistence collaborator used by every action.
//!
//! Implementations must run each multi-row write as one atomic unit and keep
//! the unique constraints of the schema as the final guard against
//! duplicates, whatever checks the caller already made.

use async_trait::async_trait;

use super::{
    error::Error,
    schema::{
        Composition, Id, Ingredient, LinkKind, LinkRecord, NewUser, Recipe, RecipeFilter,
        RecipePart, Subscription, Tag, User,
    },
};

#[async_trait]
pub trait Store: Send + Sync {
    /// `None` when the username or email is already taken.
    async fn create_user(&self, user: &NewUser) -> Result<Option<User>, Error>;
    async fn get_user(&self, id: Id) -> Result<Option<User>, Error>;
    /// One page of users ordered by id, with the total count.
    async fn fetch_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), Error>;

    /// `None` when the name or slug is already taken.
    async fn create_tag(&self, name: &str, slug: &str) -> Result<Option<Tag>, Error>;
    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, Error>;
    async fn list_tags(&self) -> Result<Vec<Tag>, Error>;
    /// Tags among `ids` that exist.
    async fn find_tags(&self, ids: &[Id]) -> Result<Vec<Tag>, Error>;

    /// `None` when the (name, measurement unit) pair already exists.
    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Option<Ingredient>, Error>;
    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, Error>;
    /// Case-insensitive name prefix match, ordered by name.
    async fn list_ingredients(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>, Error>;
    /// Ingredients among `ids` that exist.
    async fn find_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, Error>;

    /// Inserts the recipe and all its association rows atomically.
    async fn insert_recipe(&self, author_id: Id, composition: &Composition)
        -> Result<Recipe, Error>;
    /// Overwrites the recipe fields and replaces both association sets
    /// atomically. `None` when the recipe does not exist.
    async fn replace_recipe(
        &self,
        recipe_id: Id,
        composition: &Composition,
    ) -> Result<Option<Recipe>, Error>;
    /// Deletes the recipe with its association and link rows.
    async fn delete_recipe(&self, recipe_id: Id) -> Result<bool, Error>;
    async fn get_recipe(&self, recipe_id: Id) -> Result<Option<Recipe>, Error>;
    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, Error>;
    async fn list_recipe_parts(&self, recipe_id: Id) -> Result<Vec<RecipePart>, Error>;
    /// One page of recipes newest first, with the total matching count.
    async fn fetch_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), Error>;
    /// Recipes of an author newest first, at most `limit` when given.
    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, Error>;
    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, Error>;

    /// Checks for an existing link and inserts inside one transaction.
    /// `None` when the link already exists, `NotFound` when the recipe is gone.
    async fn insert_link(
        &self,
        kind: LinkKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<Option<LinkRecord>, Error>;
    /// Number of rows deleted.
    async fn delete_link(&self, kind: LinkKind, user_id: Id, recipe_id: Id)
        -> Result<u64, Error>;
    async fn link_exists(&self, kind: LinkKind, user_id: Id, recipe_id: Id)
        -> Result<bool, Error>;
    async fn list_linked_recipes(&self, kind: LinkKind, user_id: Id) -> Result<Vec<Id>, Error>;
    /// Ingredient rows of every recipe in the user's shopping cart.
    async fn list_cart_parts(&self, user_id: Id) -> Result<Vec<RecipePart>, Error>;

    /// `None` when the subscription already exists, `NotFound` when the author
    /// is gone.
    async fn insert_subscription(
        &self,
        user_id: Id,
        author_id: Id,
    ) -> Result<Option<Subscription>, Error>;
    async fn delete_subscription(&self, user_id: Id, author_id: Id) -> Result<u64, Error>;
    async fn subscription_exists(&self, user_id: Id, author_id: Id) -> Result<bool, Error>;
    /// Authors the user subscribes to ordered by username, with the total count.
    async fn fetch_subscribed_authors(
        &self,
        user_id: Id,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), Error>;

    /// Stores `code` for the recipe unless it is already stored.
    async fn save_short_link(&self, code: &str, recipe_id: Id) -> Result<(), Error>;
    async fn find_short_link(&self, code: &str) -> Result<Option<Id>, Error>;
}
