use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = i32;

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

/// One ingredient row of a recipe, joined with the ingredient it points at.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct RecipePart {
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecipeFields {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
}

/// Body of a recipe create or update request.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipePayload {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<Id>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
}

impl RecipePayload {
    pub fn into_parts(self) -> (RecipeFields, Vec<Id>, Vec<IngredientAmount>) {
        let fields = RecipeFields {
            name: self.name,
            text: self.text,
            cooking_time: self.cooking_time,
            image: self.image,
        };

        (fields, self.tags, self.ingredients)
    }
}

/// A validated recipe together with its full association sets. Only the
/// recipe composer builds these, so a store may write one without checking it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub fields: RecipeFields,
    pub tag_ids: Vec<Id>,
    pub ingredients: Vec<IngredientAmount>,
}

/// The two user/recipe link tables. They share one shape and differ only in
/// which table holds the rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Favorite,
    ShoppingCart,
}

impl LinkKind {
    pub fn table(&self) -> &'static str {
        match self {
            LinkKind::Favorite => "favorites",
            LinkKind::ShoppingCart => "shopping_cart",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LinkKind::Favorite => "favorites",
            LinkKind::ShoppingCart => "the shopping cart",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    pub kind: LinkKind,
    pub user_id: Id,
    pub recipe_id: Id,
}

#[derive(sqlx::FromRow, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub user_id: Id,
    pub author_id: Id,
}

/// Recipe list filters. The link filters only apply to a known viewer; for an
/// anonymous viewer they match nothing.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub viewer: Option<Id>,
}
