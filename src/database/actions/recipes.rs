use std::collections::HashSet;

use log::{info, warn};

use super::users::get_user_profile;
use crate::{
    constants::{MAX_AMOUNT, MAX_COOKING_TIME, MIN_AMOUNT, MIN_COOKING_TIME, NAME_MAX_LENGTH},
    error::Error,
    pagination::{Page, PageRequest},
    schema::{
        Composition, Id, IngredientAmount, LinkKind, Recipe, RecipeFields, RecipeFilter,
    },
    store::Store,
    views::{RecipeIngredientView, RecipeShort, RecipeView},
};

fn validate_fields(fields: &RecipeFields) -> Result<(), Error> {
    let name = fields.name.trim();
    if name.is_empty() || name.chars().count() > NAME_MAX_LENGTH {
        return Err(Error::validation(format!(
            "Recipe name must be between 1 and {NAME_MAX_LENGTH} characters"
        )));
    }
    if fields.text.trim().is_empty() {
        return Err(Error::validation("Recipe text can't be empty"));
    }
    if !(MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(&fields.cooking_time) {
        return Err(Error::validation(format!(
            "Cooking time must be between {MIN_COOKING_TIME} and {MAX_COOKING_TIME}"
        )));
    }
    if fields.image.trim().is_empty() {
        return Err(Error::validation("Recipe image is required"));
    }

    Ok(())
}

/// Tags are a set: repeated ids collapse into one, first occurrence wins.
fn validate_tags(tag_ids: Vec<Id>) -> Result<Vec<Id>, Error> {
    if tag_ids.is_empty() {
        return Err(Error::validation("Recipe must have at least one tag"));
    }

    let mut seen = HashSet::new();
    Ok(tag_ids.into_iter().filter(|id| seen.insert(*id)).collect())
}

fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), Error> {
    if ingredients.is_empty() {
        return Err(Error::validation("Recipe must have at least one ingredient"));
    }

    let mut seen = HashSet::new();
    for item in ingredients {
        if !seen.insert(item.id) {
            return Err(Error::validation(format!(
                "Ingredient {} is listed more than once",
                item.id
            )));
        }
        if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&item.amount) {
            return Err(Error::validation(format!(
                "Amount of ingredient {} must be between {MIN_AMOUNT} and {MAX_AMOUNT}",
                item.id
            )));
        }
    }

    Ok(())
}

/// Validates a recipe with its association sets against the stored
/// reference data.
pub async fn compose<S: Store + ?Sized>(
    store: &S,
    fields: RecipeFields,
    tag_ids: Vec<Id>,
    ingredients: Vec<IngredientAmount>,
) -> Result<Composition, Error> {
    validate_fields(&fields)?;
    let tag_ids = validate_tags(tag_ids)?;
    validate_ingredients(&ingredients)?;

    let known_tags = store.find_tags(&tag_ids).await?;
    if let Some(missing) = tag_ids
        .iter()
        .find(|id| !known_tags.iter().any(|tag| tag.id == **id))
    {
        return Err(Error::validation(format!("Tag {missing} does not exist")));
    }

    let ingredient_ids: Vec<Id> = ingredients.iter().map(|item| item.id).collect();
    let known_ingredients = store.find_ingredients(&ingredient_ids).await?;
    if let Some(missing) = ingredient_ids
        .iter()
        .find(|id| !known_ingredients.iter().any(|ingredient| ingredient.id == **id))
    {
        return Err(Error::validation(format!(
            "Ingredient {missing} does not exist"
        )));
    }

    Ok(Composition {
        fields: RecipeFields {
            name: fields.name.trim().to_owned(),
            ..fields
        },
        tag_ids,
        ingredients,
    })
}

pub async fn find_recipe<S: Store + ?Sized>(store: &S, recipe_id: Id) -> Result<Recipe, Error> {
    store
        .get_recipe(recipe_id)
        .await?
        .ok_or_else(|| Error::not_found("No recipe exists with specified id"))
}

fn authorize(recipe: &Recipe, caller_id: Id) -> Result<(), Error> {
    if recipe.author_id != caller_id {
        warn!(
            "User {caller_id} tried to modify recipe {} of user {}",
            recipe.id, recipe.author_id
        );
        return Err(Error::Forbidden);
    }

    Ok(())
}

pub async fn create_recipe<S: Store + ?Sized>(
    store: &S,
    author_id: Id,
    fields: RecipeFields,
    tag_ids: Vec<Id>,
    ingredients: Vec<IngredientAmount>,
) -> Result<Recipe, Error> {
    let composition = compose(store, fields, tag_ids, ingredients).await?;
    let recipe = store.insert_recipe(author_id, &composition).await?;
    info!("User {author_id} created recipe {}", recipe.id);

    Ok(recipe)
}

/// Overwrites the recipe and replaces its tag and ingredient sets. Nothing is
/// written unless the caller is the author and the input is valid.
pub async fn update_recipe<S: Store + ?Sized>(
    store: &S,
    recipe_id: Id,
    caller_id: Id,
    fields: RecipeFields,
    tag_ids: Vec<Id>,
    ingredients: Vec<IngredientAmount>,
) -> Result<Recipe, Error> {
    let recipe = find_recipe(store, recipe_id).await?;
    authorize(&recipe, caller_id)?;

    let composition = compose(store, fields, tag_ids, ingredients).await?;
    let recipe = store
        .replace_recipe(recipe_id, &composition)
        .await?
        .ok_or_else(|| Error::not_found("No recipe exists with specified id"))?;
    info!("User {caller_id} updated recipe {recipe_id}");

    Ok(recipe)
}

pub async fn delete_recipe<S: Store + ?Sized>(
    store: &S,
    recipe_id: Id,
    caller_id: Id,
) -> Result<(), Error> {
    let recipe = find_recipe(store, recipe_id).await?;
    authorize(&recipe, caller_id)?;

    if !store.delete_recipe(recipe_id).await? {
        return Err(Error::not_found("No recipe exists with specified id"));
    }
    info!("User {caller_id} deleted recipe {recipe_id}");

    Ok(())
}

async fn build_recipe_view<S: Store + ?Sized>(
    store: &S,
    recipe: Recipe,
    viewer: Option<Id>,
) -> Result<RecipeView, Error> {
    let tags = store.list_recipe_tags(recipe.id).await?;
    let ingredients = store
        .list_recipe_parts(recipe.id)
        .await?
        .into_iter()
        .map(RecipeIngredientView::from)
        .collect();
    let author = get_user_profile(store, recipe.author_id, viewer).await?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            store
                .link_exists(LinkKind::Favorite, viewer, recipe.id)
                .await?,
            store
                .link_exists(LinkKind::ShoppingCart, viewer, recipe.id)
                .await?,
        ),
        None => (false, false),
    };

    Ok(RecipeView {
        id: recipe.id,
        tags,
        author,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn get_recipe<S: Store + ?Sized>(
    store: &S,
    recipe_id: Id,
    viewer: Option<Id>,
) -> Result<RecipeView, Error> {
    let recipe = find_recipe(store, recipe_id).await?;
    build_recipe_view(store, recipe, viewer).await
}

pub async fn get_recipe_short<S: Store + ?Sized>(
    store: &S,
    recipe_id: Id,
) -> Result<RecipeShort, Error> {
    Ok(find_recipe(store, recipe_id).await?.into())
}

pub async fn fetch_recipes<S: Store + ?Sized>(
    store: &S,
    filter: &RecipeFilter,
    page: PageRequest,
) -> Result<Page<RecipeView>, Error> {
    let (rows, total) = store
        .fetch_recipes(filter, page.limit, page.offset())
        .await?;

    let mut views = Vec::with_capacity(rows.len());
    for recipe in rows {
        views.push(build_recipe_view(store, recipe, filter.viewer).await?);
    }

    Ok(Page::from_rows(views, total, page))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::actions::fixtures::{amounts, fields, fixture, Fixture};

    async fn pancakes(fx: &Fixture) -> Recipe {
        create_recipe(
            &fx.store,
            fx.alice.id,
            fields("Pancakes"),
            vec![fx.breakfast.id],
            amounts(&[(fx.flour.id, 200), (fx.milk.id, 300), (fx.salt.id, 2)]),
        )
        .await
        .unwrap()
    }

    fn stored_sets(view: &RecipeView) -> (BTreeSet<Id>, BTreeSet<(Id, i32)>) {
        (
            view.tags.iter().map(|tag| tag.id).collect(),
            view.ingredients
                .iter()
                .map(|ingredient| (ingredient.id, ingredient.amount))
                .collect(),
        )
    }

    #[tokio::test]
    async fn created_recipe_reads_back_its_sets() {
        let fx = fixture().await;

        let recipe = pancakes(&fx).await;
        let view = get_recipe(&fx.store, recipe.id, None).await.unwrap();

        let (tags, ingredients) = stored_sets(&view);
        assert_eq!(tags, BTreeSet::from([fx.breakfast.id]));
        assert_eq!(
            ingredients,
            BTreeSet::from([(fx.flour.id, 200), (fx.milk.id, 300), (fx.salt.id, 2)])
        );
        assert_eq!(view.author.id, fx.alice.id);
        assert_eq!(view.name, "Pancakes");
    }

    #[tokio::test]
    async fn duplicate_ingredient_is_named_in_the_error() {
        let fx = fixture().await;

        let result = create_recipe(
            &fx.store,
            fx.alice.id,
            fields("Salty"),
            vec![fx.lunch.id],
            amounts(&[(fx.salt.id, 1), (fx.flour.id, 5), (fx.salt.id, 2)]),
        )
        .await;

        match result {
            Err(Error::Validation(info)) => assert!(info.contains(&fx.salt.id.to_string())),
            other => panic!("unexpected result: {other:?}"),
        }
        let (rows, _) = fx
            .store
            .fetch_recipes(&RecipeFilter::default(), 10, 0)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn empty_sets_and_bad_amounts_are_rejected() {
        let fx = fixture().await;
        let cases = [
            (vec![], amounts(&[(fx.salt.id, 1)])),
            (vec![fx.lunch.id], amounts(&[])),
            (vec![fx.lunch.id], amounts(&[(fx.salt.id, 0)])),
            (vec![fx.lunch.id], amounts(&[(fx.salt.id, MAX_AMOUNT + 1)])),
            (vec![9999], amounts(&[(fx.salt.id, 1)])),
            (vec![fx.lunch.id], amounts(&[(9999, 1)])),
        ];

        for (tags, ingredients) in cases {
            let result =
                create_recipe(&fx.store, fx.alice.id, fields("Soup"), tags, ingredients).await;
            assert!(matches!(result, Err(Error::Validation(_))));
        }
    }

    #[tokio::test]
    async fn repeated_tags_collapse() {
        let fx = fixture().await;

        let recipe = create_recipe(
            &fx.store,
            fx.alice.id,
            fields("Toast"),
            vec![fx.breakfast.id, fx.breakfast.id],
            amounts(&[(fx.flour.id, 50)]),
        )
        .await
        .unwrap();

        let tags = fx.store.list_recipe_tags(recipe.id).await.unwrap();
        assert_eq!(tags, vec![fx.breakfast.clone()]);
    }

    #[tokio::test]
    async fn update_replaces_all_associations() {
        let fx = fixture().await;
        let recipe = pancakes(&fx).await;

        let updated = update_recipe(
            &fx.store,
            recipe.id,
            fx.alice.id,
            fields("Flatbread"),
            vec![fx.lunch.id],
            amounts(&[(fx.flour.id, 250), (fx.salt.id, 3)]),
        )
        .await
        .unwrap();

        let view = get_recipe(&fx.store, recipe.id, None).await.unwrap();
        let (tags, ingredients) = stored_sets(&view);
        assert_eq!(updated.name, "Flatbread");
        assert_eq!(tags, BTreeSet::from([fx.lunch.id]));
        assert_eq!(
            ingredients,
            BTreeSet::from([(fx.flour.id, 250), (fx.salt.id, 3)])
        );
    }

    #[tokio::test]
    async fn update_twice_stores_the_same_sets() {
        let fx = fixture().await;
        let recipe = pancakes(&fx).await;
        let apply = || {
            update_recipe(
                &fx.store,
                recipe.id,
                fx.alice.id,
                fields("Crepes"),
                vec![fx.breakfast.id, fx.lunch.id],
                amounts(&[(fx.milk.id, 500), (fx.flour.id, 100)]),
            )
        };

        apply().await.unwrap();
        let once = get_recipe(&fx.store, recipe.id, None).await.unwrap();
        apply().await.unwrap();
        let twice = get_recipe(&fx.store, recipe.id, None).await.unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn non_author_update_is_forbidden_and_changes_nothing() {
        let fx = fixture().await;
        let recipe = pancakes(&fx).await;
        let before = get_recipe(&fx.store, recipe.id, None).await.unwrap();

        let result = update_recipe(
            &fx.store,
            recipe.id,
            fx.bob.id,
            fields("Hijacked"),
            vec![fx.lunch.id],
            amounts(&[(fx.salt.id, 1)]),
        )
        .await;

        assert!(matches!(result, Err(Error::Forbidden)));
        let after = get_recipe(&fx.store, recipe.id, None).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn delete_checks_author_and_cascades() {
        let fx = fixture().await;
        let recipe = pancakes(&fx).await;
        fx.store
            .insert_link(LinkKind::Favorite, fx.bob.id, recipe.id)
            .await
            .unwrap();

        assert!(matches!(
            delete_recipe(&fx.store, recipe.id, fx.bob.id).await,
            Err(Error::Forbidden)
        ));
        delete_recipe(&fx.store, recipe.id, fx.alice.id)
            .await
            .unwrap();

        assert!(matches!(
            get_recipe(&fx.store, recipe.id, None).await,
            Err(Error::NotFound(_))
        ));
        assert!(fx.store.list_recipe_parts(recipe.id).await.unwrap().is_empty());
        assert!(fx
            .store
            .list_linked_recipes(LinkKind::Favorite, fx.bob.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn listing_applies_filters_and_viewer_flags() {
        let fx = fixture().await;
        let first = pancakes(&fx).await;
        let second = create_recipe(
            &fx.store,
            fx.bob.id,
            fields("Salad"),
            vec![fx.lunch.id],
            amounts(&[(fx.salt.id, 1)]),
        )
        .await
        .unwrap();
        fx.store
            .insert_link(LinkKind::Favorite, fx.alice.id, second.id)
            .await
            .unwrap();

        let everything = fetch_recipes(
            &fx.store,
            &RecipeFilter {
                viewer: Some(fx.alice.id),
                ..RecipeFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
        let by_tag = fetch_recipes(
            &fx.store,
            &RecipeFilter {
                tags: vec![String::from("breakfast")],
                ..RecipeFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
        let favorited = fetch_recipes(
            &fx.store,
            &RecipeFilter {
                is_favorited: true,
                viewer: Some(fx.alice.id),
                ..RecipeFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
        let anonymous_favorites = fetch_recipes(
            &fx.store,
            &RecipeFilter {
                is_favorited: true,
                ..RecipeFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();

        assert_eq!(everything.count, 2);
        // newest first
        assert_eq!(everything.results[0].id, second.id);
        assert!(everything.results[0].is_favorited);
        assert!(!everything.results[1].is_favorited);
        assert_eq!(by_tag.results.len(), 1);
        assert_eq!(by_tag.results[0].id, first.id);
        assert_eq!(favorited.results.len(), 1);
        assert_eq!(favorited.results[0].id, second.id);
        assert_eq!(anonymous_favorites.count, 0);
    }
}
