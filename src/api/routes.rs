use std::{convert::Infallible, sync::Arc};

use serde::de::DeserializeOwned;
use warp::{reject::Rejection, reply::Response, Filter};

use super::{handlers, rejection::handle_rejection};
use crate::{
    authentication::middleware::{with_possible_session, with_session},
    database::{
        form::FormData,
        schema::{Id, LinkKind, NewUser, RecipePayload},
        store::Store,
    },
};

const BODY_LIMIT: u64 = 1024 * 1024 * 16;

fn with_store<S: Store + 'static>(
    store: Arc<S>,
) -> impl Filter<Extract = (Arc<S>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(BODY_LIMIT).and(warp::body::json())
}

fn query() -> impl Filter<Extract = (FormData,), Error = Rejection> + Clone {
    warp::query::<FormData>()
}

fn tag_routes<S: Store + 'static>(
    store: Arc<S>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(handlers::list_tags::<S>);
    let get = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_store(store))
        .and_then(handlers::get_tag::<S>);

    list.or(get).unify()
}

fn ingredient_routes<S: Store + 'static>(
    store: Arc<S>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(query())
        .and(with_store(store.clone()))
        .and_then(handlers::list_ingredients::<S>);
    let get = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_store(store))
        .and_then(handlers::get_ingredient::<S>);

    list.or(get).unify()
}

/// `POST` and `DELETE` on `recipes/{id}/{segment}` for one link table.
fn link_routes<S: Store + 'static>(
    kind: LinkKind,
    segment: &'static str,
    store: Arc<S>,
    secret: Arc<str>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let path = warp::path("recipes")
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end());

    let add = warp::any()
        .map(move || kind)
        .and(path.clone())
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_store(store.clone()))
        .and_then(handlers::add_link::<S>);
    let remove = warp::any()
        .map(move || kind)
        .and(path)
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_store(store))
        .and_then(handlers::remove_link::<S>);

    add.or(remove).unify()
}

fn recipe_routes<S: Store + 'static>(
    store: Arc<S>,
    secret: Arc<str>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_store(store.clone()))
        .and_then(handlers::download_shopping_cart::<S>);
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(query())
        .and(with_possible_session(secret.clone()))
        .and(with_store(store.clone()))
        .and_then(handlers::list_recipes::<S>);
    let get = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_store(store.clone()))
        .and_then(handlers::get_recipe::<S>);
    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body::<RecipePayload>())
        .and(with_store(store.clone()))
        .and_then(handlers::create_recipe::<S>);
    let update = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_session(secret.clone()))
        .and(json_body::<RecipePayload>())
        .and(with_store(store.clone()))
        .and_then(handlers::update_recipe::<S>);
    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session(secret.clone()))
        .and(with_store(store.clone()))
        .and_then(handlers::delete_recipe::<S>);
    let get_link = warp::path!("recipes" / Id / "get-link")
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(handlers::get_link::<S>);

    download
        .or(list)
        .unify()
        .or(get)
        .unify()
        .or(create)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(get_link)
        .unify()
        .or(link_routes(
            LinkKind::Favorite,
            "favorite",
            store.clone(),
            secret.clone(),
        ))
        .unify()
        .or(link_routes(
            LinkKind::ShoppingCart,
            "shopping_cart",
            store,
            secret,
        ))
        .unify()
}

fn user_routes<S: Store + 'static>(
    store: Arc<S>,
    secret: Arc<str>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("users")
        .and(warp::get())
        .and(query())
        .and(with_possible_session(secret.clone()))
        .and(with_store(store.clone()))
        .and_then(handlers::list_users::<S>);
    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body::<NewUser>())
        .and(with_store(store.clone()))
        .and_then(handlers::register_user::<S>);
    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_store(store.clone()))
        .and_then(handlers::get_me::<S>);
    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(query())
        .and(with_session(secret.clone()))
        .and(with_store(store.clone()))
        .and_then(handlers::list_subscriptions::<S>);
    let get = warp::path!("users" / Id)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_store(store.clone()))
        .and_then(handlers::get_user::<S>);
    let subscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_store(store.clone()))
        .and_then(handlers::subscribe::<S>);
    let unsubscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_store(store))
        .and_then(handlers::unsubscribe::<S>);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(subscriptions)
        .unify()
        .or(get)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
}

/// `/s/{code}` redirects to the recipe page.
fn short_link_routes<S: Store + 'static>(
    store: Arc<S>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("s" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(handlers::follow_short_link::<S>)
}

/// Every endpoint under `/api` plus the short link redirects, with
/// rejections rendered as JSON.
pub fn routes<S: Store + 'static>(
    store: Arc<S>,
    secret: &str,
) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
    let secret: Arc<str> = Arc::from(secret);

    let api = tag_routes(store.clone())
        .or(ingredient_routes(store.clone()))
        .unify()
        .or(recipe_routes(store.clone(), secret.clone()))
        .unify()
        .or(user_routes(store.clone(), secret))
        .unify();

    warp::path("api")
        .and(api)
        .or(short_link_routes(store))
        .unify()
        .recover(handle_rejection)
        .unify()
}
