use log::info;

use super::{recipes::find_recipe, users::get_user};
use crate::{
    error::Error,
    schema::{Id, LinkKind, LinkRecord, Subscription},
    store::Store,
};

/// Adds `recipe_id` to the favorites or shopping cart of `user_id`.
pub async fn link<S: Store + ?Sized>(
    store: &S,
    kind: LinkKind,
    user_id: Id,
    recipe_id: Id,
) -> Result<LinkRecord, Error> {
    find_recipe(store, recipe_id).await?;

    match store.insert_link(kind, user_id, recipe_id).await? {
        Some(record) => {
            info!("User {user_id} added recipe {recipe_id} to {}", kind.label());
            Ok(record)
        }
        None => Err(Error::Duplicate(format!(
            "Recipe is already in {}",
            kind.label()
        ))),
    }
}

/// Removing a link that does not exist is an error, not a no-op.
pub async fn unlink<S: Store + ?Sized>(
    store: &S,
    kind: LinkKind,
    user_id: Id,
    recipe_id: Id,
) -> Result<(), Error> {
    if store.delete_link(kind, user_id, recipe_id).await? == 0 {
        return Err(Error::not_found(format!(
            "Recipe is not in {}",
            kind.label()
        )));
    }
    info!(
        "User {user_id} removed recipe {recipe_id} from {}",
        kind.label()
    );

    Ok(())
}

pub async fn is_linked<S: Store + ?Sized>(
    store: &S,
    kind: LinkKind,
    user_id: Id,
    recipe_id: Id,
) -> Result<bool, Error> {
    store.link_exists(kind, user_id, recipe_id).await
}

pub async fn subscribe<S: Store + ?Sized>(
    store: &S,
    user_id: Id,
    author_id: Id,
) -> Result<Subscription, Error> {
    if user_id == author_id {
        return Err(Error::SelfReference);
    }
    get_user(store, author_id).await?;

    match store.insert_subscription(user_id, author_id).await? {
        Some(subscription) => {
            info!("User {user_id} subscribed to {author_id}");
            Ok(subscription)
        }
        None => Err(Error::Duplicate(String::from(
            "You are already subscribed to this user",
        ))),
    }
}

pub async fn unsubscribe<S: Store + ?Sized>(
    store: &S,
    user_id: Id,
    author_id: Id,
) -> Result<(), Error> {
    if store.delete_subscription(user_id, author_id).await? == 0 {
        return Err(Error::not_found("You are not subscribed to this user"));
    }
    info!("User {user_id} unsubscribed from {author_id}");

    Ok(())
}

pub async fn is_subscribed<S: Store + ?Sized>(
    store: &S,
    user_id: Id,
    author_id: Id,
) -> Result<bool, Error> {
    store.subscription_exists(user_id, author_id).await
}
