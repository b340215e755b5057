use log::info;

use crate::{
    constants::BANNED_USERNAMES,
    error::Error,
    pagination::{Page, PageRequest},
    schema::{Id, NewUser, User},
    store::Store,
    views::UserView,
};

const USERNAME_MAX_LENGTH: usize = 150;

fn validate_username(username: &str) -> Result<(), Error> {
    if username.is_empty() || username.chars().count() > USERNAME_MAX_LENGTH {
        return Err(Error::validation(format!(
            "Username must be between 1 and {USERNAME_MAX_LENGTH} characters"
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(Error::validation(
            "Username may contain only letters, digits and @/./+/-/_ characters",
        ));
    }

    if BANNED_USERNAMES.contains(&username.to_lowercase().as_str()) {
        return Err(Error::validation(format!(
            "Username {username} is not allowed"
        )));
    }

    Ok(())
}

/// Stores a new user account. Credentials are managed elsewhere.
pub async fn register_user<S: Store + ?Sized>(store: &S, user: NewUser) -> Result<User, Error> {
    validate_username(&user.username)?;

    let (local, domain) = user.email.split_once('@').unwrap_or(("", ""));
    if local.is_empty() || domain.is_empty() {
        return Err(Error::validation("Enter a valid email address"));
    }
    if user.first_name.trim().is_empty() || user.last_name.trim().is_empty() {
        return Err(Error::validation("First and last name are required"));
    }

    match store.create_user(&user).await? {
        Some(user) => {
            info!("Registered user {} ({})", user.username, user.id);
            Ok(user)
        }
        None => Err(Error::Duplicate(String::from(
            "A user with that username or email already exists",
        ))),
    }
}

pub async fn get_user<S: Store + ?Sized>(store: &S, id: Id) -> Result<User, Error> {
    store
        .get_user(id)
        .await?
        .ok_or_else(|| Error::not_found("No user exists with specified id"))
}

/// Public profile of `id` as seen by `viewer`.
pub async fn get_user_profile<S: Store + ?Sized>(
    store: &S,
    id: Id,
    viewer: Option<Id>,
) -> Result<UserView, Error> {
    let user = get_user(store, id).await?;
    let is_subscribed = match viewer {
        Some(viewer) => store.subscription_exists(viewer, id).await?,
        None => false,
    };

    Ok(UserView::new(user, is_subscribed))
}

pub async fn fetch_users<S: Store + ?Sized>(
    store: &S,
    viewer: Option<Id>,
    page: PageRequest,
) -> Result<Page<UserView>, Error> {
    let (users, total) = store.fetch_users(page.limit, page.offset()).await?;

    let mut views = Vec::with_capacity(users.len());
    for user in users {
        let is_subscribed = match viewer {
            Some(viewer) => store.subscription_exists(viewer, user.id).await?,
            None => false,
        };
        views.push(UserView::new(user, is_subscribed));
    }

    Ok(Page::from_rows(views, total, page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::fixtures::{fixture, new_user};

    #[tokio::test]
    async fn me_is_not_a_valid_username() {
        let fx = fixture().await;

        let result = register_user(&fx.store, new_user("Me")).await;

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn taken_username_is_a_duplicate() {
        let fx = fixture().await;

        let result = register_user(&fx.store, new_user("alice")).await;

        assert!(matches!(result, Err(Error::Duplicate(_))));
    }

    #[tokio::test]
    async fn profile_reports_subscription_of_viewer() {
        let fx = fixture().await;
        fx.store
            .insert_subscription(fx.bob.id, fx.alice.id)
            .await
            .unwrap();

        let seen_by_bob = get_user_profile(&fx.store, fx.alice.id, Some(fx.bob.id))
            .await
            .unwrap();
        let anonymous = get_user_profile(&fx.store, fx.alice.id, None)
            .await
            .unwrap();

        assert!(seen_by_bob.is_subscribed);
        assert!(!anonymous.is_subscribed);
        assert_eq!(anonymous.username, "alice");
    }

    #[tokio::test]
    async fn users_are_paged_by_id() {
        let fx = fixture().await;
        let carol = register_user(&fx.store, new_user("carol")).await.unwrap();
        fx.store
            .insert_subscription(fx.bob.id, carol.id)
            .await
            .unwrap();

        let first = fetch_users(&fx.store, Some(fx.bob.id), PageRequest { limit: 2, page: 1 })
            .await
            .unwrap();
        let second = fetch_users(&fx.store, Some(fx.bob.id), PageRequest { limit: 2, page: 2 })
            .await
            .unwrap();

        assert_eq!(first.count, 3);
        assert_eq!(first.next, Some(2));
        assert_eq!(
            first
                .results
                .iter()
                .map(|u| u.username.as_str())
                .collect::<Vec<_>>(),
            vec!["alice", "bob"]
        );
        assert_eq!(second.results.len(), 1);
        assert_eq!(second.results[0].username, "carol");
        assert!(second.results[0].is_subscribed);
        assert_eq!(second.previous, Some(1));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let fx = fixture().await;

        assert!(matches!(
            get_user(&fx.store, 9999).await,
            Err(Error::NotFound(_))
        ));
    }
}
