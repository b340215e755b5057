use crate::{
    error::Error,
    pagination::{Page, PageRequest},
    schema::Id,
    store::Store,
    views::{AuthorView, RecipeShort, UserView},
};

/// Cap on the recipe preview of each subscribed author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeLimit {
    Unbounded,
    AtMost(i64),
}

impl RecipeLimit {
    /// Missing, empty and non-positive values leave the preview uncapped.
    pub fn parse(value: Option<&str>) -> Result<Self, Error> {
        let value = match value.map(str::trim) {
            None | Some("") => return Ok(Self::Unbounded),
            Some(value) => value,
        };

        match value.parse::<i64>() {
            Ok(limit) if limit > 0 => Ok(Self::AtMost(limit)),
            Ok(_) => Ok(Self::Unbounded),
            Err(_) => Err(Error::validation("recipes_limit must be a number")),
        }
    }

    pub fn as_option(&self) -> Option<i64> {
        match self {
            RecipeLimit::Unbounded => None,
            RecipeLimit::AtMost(limit) => Some(*limit),
        }
    }
}

/// Authors `user_id` subscribes to, each with its newest recipes.
pub async fn list_subscriptions<S: Store + ?Sized>(
    store: &S,
    user_id: Id,
    recipes_limit: RecipeLimit,
    page: PageRequest,
) -> Result<Page<AuthorView>, Error> {
    let (authors, total) = store
        .fetch_subscribed_authors(user_id, page.limit, page.offset())
        .await?;

    let mut views = Vec::with_capacity(authors.len());
    for author in authors {
        let recipes = store
            .list_author_recipes(author.id, recipes_limit.as_option())
            .await?
            .into_iter()
            .map(RecipeShort::from)
            .collect();
        let recipes_count = store.count_author_recipes(author.id).await?;

        views.push(AuthorView {
            author: UserView::new(author, true),
            recipes,
            recipes_count,
        });
    }

    Ok(Page::from_rows(views, total, page))
}
