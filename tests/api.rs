use std::sync::Arc;

use foodgram_sdk::{
    actions::{ingredients::create_ingredient, tags::create_tag, users::register_user},
    jwt::generate_session,
    memory::MemoryStore,
    routes::routes,
    schema::{Id, Ingredient, NewUser, Tag, User},
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use warp::http::StatusCode;

const SECRET: &str = "test-secret";

struct App {
    store: Arc<MemoryStore>,
    alice: User,
    bob: User,
    breakfast: Tag,
    salt: Ingredient,
    flour: Ingredient,
}

impl App {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let alice = register_user(store.as_ref(), user("alice")).await.unwrap();
        let bob = register_user(store.as_ref(), user("bob")).await.unwrap();
        let breakfast = create_tag(store.as_ref(), "Breakfast", "breakfast")
            .await
            .unwrap();
        let salt = create_ingredient(store.as_ref(), "Salt", "g").await.unwrap();
        let flour = create_ingredient(store.as_ref(), "Flour", "g").await.unwrap();

        Self {
            store,
            alice,
            bob,
            breakfast,
            salt,
            flour,
        }
    }

    fn token(&self, user: &User) -> String {
        format!("Token {}", generate_session(user, SECRET).unwrap())
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        user: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut request = warp::test::request().method(method).path(path);
        if let Some(user) = user {
            request = request.header("authorization", self.token(user));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.reply(&routes(self.store.clone(), SECRET)).await;
        (response.status(), response.body().to_vec())
    }

    async fn json(
        &self,
        method: &str,
        path: &str,
        user: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, body) = self.send(method, path, user, body).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn create_recipe(&self, author: &User, name: &str, salt: i32) -> Id {
        let (status, body) = self
            .json(
                "POST",
                "/api/recipes",
                Some(author),
                Some(self.payload(name, salt)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap() as Id
    }

    fn payload(&self, name: &str, salt: i32) -> Value {
        json!({
            "ingredients": [
                {"id": self.salt.id, "amount": salt},
                {"id": self.flour.id, "amount": 100}
            ],
            "tags": [self.breakfast.id],
            "name": name,
            "text": "Mix and bake",
            "cooking_time": 20,
            "image": "media/recipe.png"
        })
    }
}

fn user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        first_name: username.to_string(),
        last_name: String::from("Tester"),
    }
}

#[tokio::test]
async fn created_recipe_is_readable_by_anyone() {
    let app = App::new().await;
    let id = app.create_recipe(&app.alice, "Bread", 5).await;

    let (status, body) = app
        .json("GET", &format!("/api/recipes/{id}"), None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Bread");
    assert_eq!(body["author"]["username"], "alice");
    assert_eq!(body["tags"][0]["slug"], "breakfast");
    assert_eq!(body["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(body["is_favorited"], false);
}

#[tokio::test]
async fn writing_requires_a_session() {
    let app = App::new().await;

    let (status, body) = app
        .json("POST", "/api/recipes", None, Some(app.payload("Bread", 1)))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn invalid_recipe_is_a_bad_request() {
    let app = App::new().await;
    let mut payload = app.payload("Bread", 1);
    payload["ingredients"] = json!([
        {"id": app.salt.id, "amount": 1},
        {"id": app.salt.id, "amount": 2}
    ]);

    let (status, body) = app
        .json("POST", "/api/recipes", Some(&app.alice), Some(payload))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains(&app.salt.id.to_string()));
}

#[tokio::test]
async fn only_the_author_may_change_a_recipe() {
    let app = App::new().await;
    let id = app.create_recipe(&app.alice, "Bread", 5).await;
    let path = format!("/api/recipes/{id}");

    let (patch, _) = app
        .json(
            "PATCH",
            &path,
            Some(&app.bob),
            Some(app.payload("Stolen", 1)),
        )
        .await;
    let (delete, _) = app.json("DELETE", &path, Some(&app.bob), None).await;
    let (_, body) = app.json("GET", &path, None, None).await;

    assert_eq!(patch, StatusCode::FORBIDDEN);
    assert_eq!(delete, StatusCode::FORBIDDEN);
    assert_eq!(body["name"], "Bread");

    let (status, _) = app.json("DELETE", &path, Some(&app.alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.json("GET", &path, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorite_links_are_strict() {
    let app = App::new().await;
    let id = app.create_recipe(&app.alice, "Bread", 5).await;
    let path = format!("/api/recipes/{id}/favorite");

    let (first, body) = app.json("POST", &path, Some(&app.bob), None).await;
    let (second, _) = app.json("POST", &path, Some(&app.bob), None).await;
    let (removed, _) = app.json("DELETE", &path, Some(&app.bob), None).await;
    let (again, _) = app.json("DELETE", &path, Some(&app.bob), None).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(body["id"], json!(id));
    assert_eq!(second, StatusCode::BAD_REQUEST);
    assert_eq!(removed, StatusCode::NO_CONTENT);
    assert_eq!(again, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shopping_cart_download_sums_ingredients() {
    let app = App::new().await;
    let bread = app.create_recipe(&app.alice, "Bread", 5).await;
    let buns = app.create_recipe(&app.alice, "Buns", 3).await;

    let (empty, _) = app
        .send(
            "GET",
            "/api/recipes/download_shopping_cart",
            Some(&app.bob),
            None,
        )
        .await;
    assert_eq!(empty, StatusCode::NOT_FOUND);

    for id in [bread, buns] {
        let (status, _) = app
            .json(
                "POST",
                &format!("/api/recipes/{id}/shopping_cart"),
                Some(&app.bob),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let response = warp::test::request()
        .method("GET")
        .path("/api/recipes/download_shopping_cart")
        .header("authorization", app.token(&app.bob))
        .reply(&routes(app.store.clone(), SECRET))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"shopping_cart.txt\""
    );
    assert_eq!(
        String::from_utf8(response.body().to_vec()).unwrap(),
        "Shopping list:\nFlour - 200 g\nSalt - 8 g\n"
    );
}

#[tokio::test]
async fn subscriptions_preview_is_capped() {
    let app = App::new().await;
    for n in 0..4 {
        app.create_recipe(&app.alice, &format!("Dish {n}"), 1).await;
    }

    let (own, _) = app
        .json(
            "POST",
            &format!("/api/users/{}/subscribe", app.bob.id),
            Some(&app.bob),
            None,
        )
        .await;
    let (status, author) = app
        .json(
            "POST",
            &format!("/api/users/{}/subscribe", app.alice.id),
            Some(&app.bob),
            None,
        )
        .await;
    let (_, page) = app
        .json(
            "GET",
            "/api/users/subscriptions?recipes_limit=2",
            Some(&app.bob),
            None,
        )
        .await;
    let (invalid, _) = app
        .json(
            "GET",
            "/api/users/subscriptions?recipes_limit=abc",
            Some(&app.bob),
            None,
        )
        .await;

    assert_eq!(own, StatusCode::BAD_REQUEST);
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(author["is_subscribed"], true);
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["username"], "alice");
    assert_eq!(page["results"][0]["recipes"].as_array().unwrap().len(), 2);
    assert_eq!(page["results"][0]["recipes_count"], 4);
    assert_eq!(invalid, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recipe_list_filters_by_tag_and_viewer() {
    let app = App::new().await;
    let lunch = create_tag(app.store.as_ref(), "Lunch", "lunch").await.unwrap();
    let bread = app.create_recipe(&app.alice, "Bread", 5).await;
    let mut soup = app.payload("Soup", 2);
    soup["tags"] = json!([lunch.id]);
    let (status, _) = app
        .json("POST", "/api/recipes", Some(&app.bob), Some(soup))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    app.json(
        "POST",
        &format!("/api/recipes/{bread}/favorite"),
        Some(&app.bob),
        None,
    )
    .await;

    let (_, by_tag) = app
        .json("GET", "/api/recipes?tags=lunch", None, None)
        .await;
    let (_, favorites) = app
        .json(
            "GET",
            "/api/recipes?is_favorited=1",
            Some(&app.bob),
            None,
        )
        .await;
    let (bad_flag, _) = app
        .json("GET", "/api/recipes?is_favorited=maybe", None, None)
        .await;

    assert_eq!(by_tag["count"], 1);
    assert_eq!(by_tag["results"][0]["name"], "Soup");
    assert_eq!(favorites["count"], 1);
    assert_eq!(favorites["results"][0]["id"], json!(bread));
    assert_eq!(favorites["results"][0]["is_favorited"], true);
    assert_eq!(bad_flag, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn paging_parameters_are_bounded() {
    let app = App::new().await;
    app.create_recipe(&app.alice, "Bread", 5).await;

    let (far, body) = app
        .json("GET", &format!("/api/recipes?page={}", i64::MAX), None, None)
        .await;
    let (wide, page) = app
        .json(
            "GET",
            &format!("/api/recipes?limit={}&page=2", i64::MAX),
            None,
            None,
        )
        .await;

    assert_eq!(far, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
    assert_eq!(wide, StatusCode::OK);
    assert_eq!(page["count"], 1);
    assert_eq!(page["next"], Value::Null);
    assert_eq!(page["previous"], 1);
}

#[tokio::test]
async fn short_link_redirects_to_the_recipe() {
    let app = App::new().await;
    let id = app.create_recipe(&app.alice, "Bread", 5).await;

    let (status, body) = app
        .json("GET", &format!("/api/recipes/{id}/get-link"), None, None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let link = body["short-link"].as_str().unwrap().to_string();
    assert!(link.starts_with("/s/"), "{link}");

    let response = warp::test::request()
        .method("GET")
        .path(&link)
        .reply(&routes(app.store.clone(), SECRET))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], format!("/recipes/{id}/"));

    let (unknown, _) = app.json("GET", "/s/zzzzz/", None, None).await;
    let (missing_recipe, _) = app
        .json("GET", "/api/recipes/9999/get-link", None, None)
        .await;
    assert_eq!(unknown, StatusCode::NOT_FOUND);
    assert_eq!(missing_recipe, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_list_is_paginated() {
    let app = App::new().await;
    app.json(
        "POST",
        &format!("/api/users/{}/subscribe", app.alice.id),
        Some(&app.bob),
        None,
    )
    .await;

    let (status, page) = app
        .json("GET", "/api/users?limit=1", Some(&app.bob), None)
        .await;
    let (_, anonymous) = app.json("GET", "/api/users", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2);
    assert_eq!(page["next"], 2);
    assert_eq!(page["results"][0]["username"], "alice");
    assert_eq!(page["results"][0]["is_subscribed"], true);
    assert_eq!(anonymous["results"].as_array().unwrap().len(), 2);
    assert_eq!(anonymous["results"][0]["is_subscribed"], false);
}

#[tokio::test]
async fn me_and_unknown_paths() {
    let app = App::new().await;

    let (status, me) = app.json("GET", "/api/users/me", Some(&app.alice), None).await;
    let (anonymous, _) = app.json("GET", "/api/users/me", None, None).await;
    let (missing, body) = app.json("GET", "/api/nothing", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "alice@example.com");
    assert_eq!(anonymous, StatusCode::UNAUTHORIZED);
    assert_eq!(missing, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
}
