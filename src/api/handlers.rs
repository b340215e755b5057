use std::sync::Arc;

use serde::Serialize;
use warp::{
    http::{header, StatusCode, Uri},
    reject::Rejection,
    reply::{self, Reply, Response},
};

use crate::{
    authentication::jwt::Session,
    constants::SHOPPING_LIST_FILENAME,
    database::{
        actions::{
            associations, ingredients,
            recipes::{self, get_recipe_short},
            shopping_list, short_links,
            subscriptions::{self, RecipeLimit},
            tags, users,
        },
        error::Error,
        form::{Form, FormData},
        pagination::PageRequest,
        schema::{Id, LinkKind, NewUser, RecipeFilter, RecipePayload},
        store::Store,
        views::{ShoppingList, UserView},
    },
};

type HandlerResult = Result<Response, Rejection>;

fn created<T: Serialize>(body: &T) -> Response {
    reply::with_status(reply::json(body), StatusCode::CREATED).into_response()
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub async fn list_tags<S: Store>(store: Arc<S>) -> HandlerResult {
    let tags = tags::list_tags(store.as_ref()).await?;
    Ok(reply::json(&tags).into_response())
}

pub async fn get_tag<S: Store>(id: Id, store: Arc<S>) -> HandlerResult {
    let tag = tags::get_tag(store.as_ref(), id).await?;
    Ok(reply::json(&tag).into_response())
}

pub async fn list_ingredients<S: Store>(query: FormData, store: Arc<S>) -> HandlerResult {
    let form = Form::from_data(query);
    let rows = ingredients::list_ingredients(store.as_ref(), form.get_str("name")).await?;
    Ok(reply::json(&rows).into_response())
}

pub async fn get_ingredient<S: Store>(id: Id, store: Arc<S>) -> HandlerResult {
    let ingredient = ingredients::get_ingredient(store.as_ref(), id).await?;
    Ok(reply::json(&ingredient).into_response())
}

fn recipe_filter(form: &Form, viewer: Option<Id>) -> Result<RecipeFilter, Error> {
    Ok(RecipeFilter {
        author: form.get_number("author")?,
        tags: form.get_all("tags"),
        is_favorited: form.get_flag("is_favorited")?,
        is_in_shopping_cart: form.get_flag("is_in_shopping_cart")?,
        viewer,
    })
}

pub async fn list_recipes<S: Store>(
    query: FormData,
    session: Option<Session>,
    store: Arc<S>,
) -> HandlerResult {
    let form = Form::from_data(query);
    let filter = recipe_filter(&form, session.map(|s| s.user_id))?;
    let page = PageRequest::from_form(&form)?;

    let recipes = recipes::fetch_recipes(store.as_ref(), &filter, page).await?;
    Ok(reply::json(&recipes).into_response())
}

pub async fn get_recipe<S: Store>(
    id: Id,
    session: Option<Session>,
    store: Arc<S>,
) -> HandlerResult {
    let recipe = recipes::get_recipe(store.as_ref(), id, session.map(|s| s.user_id)).await?;
    Ok(reply::json(&recipe).into_response())
}

pub async fn create_recipe<S: Store>(
    session: Session,
    payload: RecipePayload,
    store: Arc<S>,
) -> HandlerResult {
    let (fields, tag_ids, ingredients) = payload.into_parts();
    let recipe = recipes::create_recipe(
        store.as_ref(),
        session.user_id,
        fields,
        tag_ids,
        ingredients,
    )
    .await?;

    let view = recipes::get_recipe(store.as_ref(), recipe.id, Some(session.user_id)).await?;
    Ok(created(&view))
}

pub async fn update_recipe<S: Store>(
    id: Id,
    session: Session,
    payload: RecipePayload,
    store: Arc<S>,
) -> HandlerResult {
    let (fields, tag_ids, ingredients) = payload.into_parts();
    recipes::update_recipe(
        store.as_ref(),
        id,
        session.user_id,
        fields,
        tag_ids,
        ingredients,
    )
    .await?;

    let view = recipes::get_recipe(store.as_ref(), id, Some(session.user_id)).await?;
    Ok(reply::json(&view).into_response())
}

pub async fn delete_recipe<S: Store>(
    id: Id,
    session: Session,
    store: Arc<S>,
) -> HandlerResult {
    recipes::delete_recipe(store.as_ref(), id, session.user_id).await?;
    Ok(no_content())
}

pub async fn add_link<S: Store>(
    kind: LinkKind,
    id: Id,
    session: Session,
    store: Arc<S>,
) -> HandlerResult {
    associations::link(store.as_ref(), kind, session.user_id, id).await?;
    let recipe = get_recipe_short(store.as_ref(), id).await?;
    Ok(created(&recipe))
}

pub async fn remove_link<S: Store>(
    kind: LinkKind,
    id: Id,
    session: Session,
    store: Arc<S>,
) -> HandlerResult {
    associations::unlink(store.as_ref(), kind, session.user_id, id).await?;
    Ok(no_content())
}

#[derive(Serialize)]
struct ShortLink {
    #[serde(rename = "short-link")]
    short_link: String,
}

pub async fn get_link<S: Store>(id: Id, store: Arc<S>) -> HandlerResult {
    let short_link = short_links::get_short_link(store.as_ref(), id).await?;
    Ok(created(&ShortLink { short_link }))
}

/// Redirects to the page of the recipe behind `code`.
pub async fn follow_short_link<S: Store>(code: String, store: Arc<S>) -> HandlerResult {
    let id = short_links::resolve_short_link(store.as_ref(), &code).await?;
    let location: Uri = format!("/recipes/{id}/")
        .parse()
        .map_err(|_e| Error::not_found("Short link does not exist"))?;

    Ok(warp::redirect::found(location).into_response())
}

pub async fn download_shopping_cart<S: Store>(
    session: Session,
    store: Arc<S>,
) -> HandlerResult {
    let list = shopping_list::build_shopping_list(store.as_ref(), session.user_id).await?;
    let lines = match list {
        ShoppingList::Empty => return Err(Error::not_found("Shopping cart is empty").into()),
        ShoppingList::Report(lines) => lines,
    };

    // a String body is served as text/plain
    let reply = reply::with_header(
        shopping_list::render(&lines),
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );
    Ok(reply.into_response())
}

pub async fn list_users<S: Store>(
    query: FormData,
    session: Option<Session>,
    store: Arc<S>,
) -> HandlerResult {
    let form = Form::from_data(query);
    let page = PageRequest::from_form(&form)?;

    let users = users::fetch_users(store.as_ref(), session.map(|s| s.user_id), page).await?;
    Ok(reply::json(&users).into_response())
}

pub async fn register_user<S: Store>(payload: NewUser, store: Arc<S>) -> HandlerResult {
    let user = users::register_user(store.as_ref(), payload).await?;
    Ok(created(&UserView::new(user, false)))
}

pub async fn get_me<S: Store>(session: Session, store: Arc<S>) -> HandlerResult {
    let user = users::get_user(store.as_ref(), session.user_id).await?;
    Ok(reply::json(&UserView::new(user, false)).into_response())
}

pub async fn get_user<S: Store>(
    id: Id,
    session: Option<Session>,
    store: Arc<S>,
) -> HandlerResult {
    let profile =
        users::get_user_profile(store.as_ref(), id, session.map(|s| s.user_id)).await?;
    Ok(reply::json(&profile).into_response())
}

pub async fn list_subscriptions<S: Store>(
    query: FormData,
    session: Session,
    store: Arc<S>,
) -> HandlerResult {
    let form = Form::from_data(query);
    let recipes_limit = RecipeLimit::parse(form.get_str("recipes_limit"))?;
    let page = PageRequest::from_form(&form)?;

    let authors =
        subscriptions::list_subscriptions(store.as_ref(), session.user_id, recipes_limit, page)
            .await?;
    Ok(reply::json(&authors).into_response())
}

pub async fn subscribe<S: Store>(id: Id, session: Session, store: Arc<S>) -> HandlerResult {
    associations::subscribe(store.as_ref(), session.user_id, id).await?;
    let author = users::get_user_profile(store.as_ref(), id, Some(session.user_id)).await?;
    Ok(created(&author))
}

pub async fn unsubscribe<S: Store>(id: Id, session: Session, store: Arc<S>) -> HandlerResult {
    associations::unsubscribe(store.as_ref(), session.user_id, id).await?;
    Ok(no_content())
}
