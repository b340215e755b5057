use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    error::Error,
    schema::{
        Composition, Id, Ingredient, LinkKind, LinkRecord, NewUser, Recipe, RecipeFilter,
        RecipePart, Subscription, Tag, User,
    },
    store::Store,
};

#[derive(Default)]
struct Tables {
    sequence: Id,
    users: Vec<User>,
    tags: Vec<Tag>,
    ingredients: Vec<Ingredient>,
    recipes: Vec<Recipe>,
    recipe_tags: BTreeSet<(Id, Id)>,
    // (recipe_id, ingredient_id, amount)
    recipe_ingredients: Vec<(Id, Id, i32)>,
    favorites: BTreeSet<(Id, Id)>,
    shopping_cart: BTreeSet<(Id, Id)>,
    // (user_id, author_id)
    subscriptions: BTreeSet<(Id, Id)>,
    short_links: BTreeMap<String, Id>,
}

impl Tables {
    fn next_id(&mut self) -> Id {
        self.sequence += 1;
        self.sequence
    }

    fn links(&self, kind: LinkKind) -> &BTreeSet<(Id, Id)> {
        match kind {
            LinkKind::Favorite => &self.favorites,
            LinkKind::ShoppingCart => &self.shopping_cart,
        }
    }

    fn links_mut(&mut self, kind: LinkKind) -> &mut BTreeSet<(Id, Id)> {
        match kind {
            LinkKind::Favorite => &mut self.favorites,
            LinkKind::ShoppingCart => &mut self.shopping_cart,
        }
    }

    fn write_associations(&mut self, recipe_id: Id, composition: &Composition) {
        self.recipe_tags
            .extend(composition.tag_ids.iter().map(|tag_id| (recipe_id, *tag_id)));
        self.recipe_ingredients.extend(
            composition
                .ingredients
                .iter()
                .map(|item| (recipe_id, item.id, item.amount)),
        );
    }

    fn clear_associations(&mut self, recipe_id: Id) {
        self.recipe_tags.retain(|(recipe, _)| *recipe != recipe_id);
        self.recipe_ingredients
            .retain(|(recipe, _, _)| *recipe != recipe_id);
    }

    fn parts_of(&self, recipe_id: Id) -> Vec<RecipePart> {
        let mut parts: Vec<RecipePart> = self
            .recipe_ingredients
            .iter()
            .filter(|(recipe, _, _)| *recipe == recipe_id)
            .filter_map(|(recipe, ingredient_id, amount)| {
                self.ingredients
                    .iter()
                    .find(|ingredient| ingredient.id == *ingredient_id)
                    .map(|ingredient| RecipePart {
                        recipe_id: *recipe,
                        ingredient_id: ingredient.id,
                        name: ingredient.name.to_owned(),
                        measurement_unit: ingredient.measurement_unit.to_owned(),
                        amount: *amount,
                    })
            })
            .collect();
        parts.sort_by(|a, b| a.name.cmp(&b.name));
        parts
    }

    fn matches(&self, recipe: &Recipe, filter: &RecipeFilter) -> bool {
        if filter.author.is_some_and(|author| author != recipe.author_id) {
            return false;
        }

        if !filter.tags.is_empty() {
            let tagged = self.recipe_tags.iter().any(|(recipe_id, tag_id)| {
                *recipe_id == recipe.id
                    && self
                        .tags
                        .iter()
                        .any(|tag| tag.id == *tag_id && filter.tags.contains(&tag.slug))
            });
            if !tagged {
                return false;
            }
        }

        for (enabled, kind) in [
            (filter.is_favorited, LinkKind::Favorite),
            (filter.is_in_shopping_cart, LinkKind::ShoppingCart),
        ] {
            if !enabled {
                continue;
            }
            match filter.viewer {
                Some(viewer) if self.links(kind).contains(&(viewer, recipe.id)) => {}
                _ => return false,
            }
        }

        true
    }

    /// Recipes newest first, ids breaking ties.
    fn sorted_recipes<'a>(&'a self, keep: impl Fn(&Recipe) -> bool) -> Vec<&'a Recipe> {
        let mut recipes: Vec<&Recipe> = self.recipes.iter().filter(|r| keep(r)).collect();
        recipes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        recipes
    }
}

/// In-process store. Every operation holds the table lock for its whole
/// duration, which makes each one atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<Option<User>, Error> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Ok(None);
        }

        let row = User {
            id: tables.next_id(),
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
        };
        tables.users.push(row.clone());

        Ok(Some(row))
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn fetch_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), Error> {
        let tables = self.tables.read().await;
        let mut users: Vec<&User> = tables.users.iter().collect();
        users.sort_by_key(|u| u.id);
        let total = users.len() as i64;
        let rows = users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((rows, total))
    }

    async fn create_tag(&self, name: &str, slug: &str) -> Result<Option<Tag>, Error> {
        let mut tables = self.tables.write().await;
        if tables.tags.iter().any(|t| t.name == name || t.slug == slug) {
            return Ok(None);
        }

        let row = Tag {
            id: tables.next_id(),
            name: name.to_owned(),
            slug: slug.to_owned(),
        };
        tables.tags.push(row.clone());

        Ok(Some(row))
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, Error> {
        let tables = self.tables.read().await;
        Ok(tables.tags.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        let tables = self.tables.read().await;
        let mut rows = tables.tags.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn find_tags(&self, ids: &[Id]) -> Result<Vec<Tag>, Error> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Tag> = tables
            .tags
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Option<Ingredient>, Error> {
        let mut tables = self.tables.write().await;
        if tables
            .ingredients
            .iter()
            .any(|i| i.name == name && i.measurement_unit == measurement_unit)
        {
            return Ok(None);
        }

        let row = Ingredient {
            id: tables.next_id(),
            name: name.to_owned(),
            measurement_unit: measurement_unit.to_owned(),
        };
        tables.ingredients.push(row.clone());

        Ok(Some(row))
    }

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, Error> {
        let tables = self.tables.read().await;
        Ok(tables.ingredients.iter().find(|i| i.id == id).cloned())
    }

    async fn list_ingredients(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>, Error> {
        let tables = self.tables.read().await;
        let prefix = name_prefix.map(str::to_lowercase);
        let mut rows: Vec<Ingredient> = tables
            .ingredients
            .iter()
            .filter(|i| match &prefix {
                Some(prefix) => i.name.to_lowercase().starts_with(prefix.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(a.measurement_unit.cmp(&b.measurement_unit))
        });
        Ok(rows)
    }

    async fn find_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, Error> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Ingredient> = tables
            .ingredients
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn insert_recipe(
        &self,
        author_id: Id,
        composition: &Composition,
    ) -> Result<Recipe, Error> {
        let mut tables = self.tables.write().await;
        let recipe = Recipe {
            id: tables.next_id(),
            author_id,
            name: composition.fields.name.to_owned(),
            text: composition.fields.text.to_owned(),
            cooking_time: composition.fields.cooking_time,
            image: composition.fields.image.to_owned(),
            created_at: Utc::now(),
        };
        tables.recipes.push(recipe.clone());
        tables.write_associations(recipe.id, composition);

        Ok(recipe)
    }

    async fn replace_recipe(
        &self,
        recipe_id: Id,
        composition: &Composition,
    ) -> Result<Option<Recipe>, Error> {
        let mut tables = self.tables.write().await;
        let Some(recipe) = tables.recipes.iter_mut().find(|r| r.id == recipe_id) else {
            return Ok(None);
        };

        recipe.name = composition.fields.name.to_owned();
        recipe.text = composition.fields.text.to_owned();
        recipe.cooking_time = composition.fields.cooking_time;
        recipe.image = composition.fields.image.to_owned();
        let recipe = recipe.clone();

        tables.clear_associations(recipe_id);
        tables.write_associations(recipe_id, composition);

        Ok(Some(recipe))
    }

    async fn delete_recipe(&self, recipe_id: Id) -> Result<bool, Error> {
        let mut tables = self.tables.write().await;
        let before = tables.recipes.len();
        tables.recipes.retain(|r| r.id != recipe_id);
        if tables.recipes.len() == before {
            return Ok(false);
        }

        tables.clear_associations(recipe_id);
        tables.favorites.retain(|(_, recipe)| *recipe != recipe_id);
        tables.shopping_cart.retain(|(_, recipe)| *recipe != recipe_id);
        tables.short_links.retain(|_, recipe| *recipe != recipe_id);

        Ok(true)
    }

    async fn get_recipe(&self, recipe_id: Id) -> Result<Option<Recipe>, Error> {
        let tables = self.tables.read().await;
        Ok(tables.recipes.iter().find(|r| r.id == recipe_id).cloned())
    }

    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, Error> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Tag> = tables
            .tags
            .iter()
            .filter(|tag| tables.recipe_tags.contains(&(recipe_id, tag.id)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn list_recipe_parts(&self, recipe_id: Id) -> Result<Vec<RecipePart>, Error> {
        let tables = self.tables.read().await;
        Ok(tables.parts_of(recipe_id))
    }

    async fn fetch_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), Error> {
        let tables = self.tables.read().await;
        let matching = tables.sorted_recipes(|recipe| tables.matches(recipe, filter));
        let total = matching.len() as i64;
        let rows = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((rows, total))
    }

    async fn list_author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, Error> {
        let tables = self.tables.read().await;
        let recipes = tables.sorted_recipes(|recipe| recipe.author_id == author_id);
        let take = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);

        Ok(recipes.into_iter().take(take).cloned().collect())
    }

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipes
            .iter()
            .filter(|r| r.author_id == author_id)
            .count() as i64)
    }

    async fn insert_link(
        &self,
        kind: LinkKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<Option<LinkRecord>, Error> {
        let mut tables = self.tables.write().await;
        if !tables.recipes.iter().any(|r| r.id == recipe_id) {
            return Err(Error::not_found("No recipe exists with specified id"));
        }
        if !tables.links_mut(kind).insert((user_id, recipe_id)) {
            return Ok(None);
        }

        Ok(Some(LinkRecord {
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
        let mut tables = self.tables.write().await;
        Ok(tables.links_mut(kind).remove(&(user_id, recipe_id)) as u64)
    }

    async fn link_exists(
        &self,
        kind: LinkKind,
        user_id: Id,
        recipe_id: Id,
    ) -> Result<bool, Error> {
        let tables = self.tables.read().await;
        Ok(tables.links(kind).contains(&(user_id, recipe_id)))
    }

    async fn list_linked_recipes(&self, kind: LinkKind, user_id: Id) -> Result<Vec<Id>, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .links(kind)
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, recipe)| *recipe)
            .collect())
    }

    async fn list_cart_parts(&self, user_id: Id) -> Result<Vec<RecipePart>, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .shopping_cart
            .iter()
            .filter(|(user, _)| *user == user_id)
            .flat_map(|(_, recipe)| tables.parts_of(*recipe))
            .collect())
    }

    async fn insert_subscription(
        &self,
        user_id: Id,
        author_id: Id,
    ) -> Result<Option<Subscription>, Error> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == author_id)
            || !tables.users.iter().any(|u| u.id == user_id)
        {
            return Err(Error::not_found("No user exists with specified id"));
        }
        if !tables.subscriptions.insert((user_id, author_id)) {
            return Ok(None);
        }

        Ok(Some(Subscription { user_id, author_id }))
    }

    async fn delete_subscription(&self, user_id: Id, author_id: Id) -> Result<u64, Error> {
        let mut tables = self.tables.write().await;
        Ok(tables.subscriptions.remove(&(user_id, author_id)) as u64)
    }

    async fn subscription_exists(&self, user_id: Id, author_id: Id) -> Result<bool, Error> {
        let tables = self.tables.read().await;
        Ok(tables.subscriptions.contains(&(user_id, author_id)))
    }

    async fn fetch_subscribed_authors(
        &self,
        user_id: Id,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), Error> {
        let tables = self.tables.read().await;
        let mut authors: Vec<&User> = tables
            .users
            .iter()
            .filter(|author| tables.subscriptions.contains(&(user_id, author.id)))
            .collect();
        authors.sort_by(|a, b| a.username.cmp(&b.username));
        let total = authors.len() as i64;
        let rows = authors
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((rows, total))
    }

    async fn save_short_link(&self, code: &str, recipe_id: Id) -> Result<(), Error> {
        let mut tables = self.tables.write().await;
        if !tables.recipes.iter().any(|r| r.id == recipe_id) {
            return Err(Error::not_found("No recipe exists with specified id"));
        }
        tables
            .short_links
            .entry(code.to_string())
            .or_insert(recipe_id);

        Ok(())
    }

    async fn find_short_link(&self, code: &str) -> Result<Option<Id>, Error> {
        let tables = self.tables.read().await;
        Ok(tables.short_links.get(code).copied())
    }
}
