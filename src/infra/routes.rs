use mongodb::bson::oid::ObjectId;
use rocket::{delete, get, post, put};
use rocket::{http::Status, serde::json::Json, State};
use serde::Deserialize;
use tracing::error;

use super::{
    Comment, FavoriteRecipe, Identity, NewProfile, ProfileUpdate, Recipe, RecipeDraft, StoreError,
    Tag, User,
};
use crate::recipes::{
    ProfileChange, RatingSummary, Reaction, ReactionSummary, RecipeService, ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct RatingBody {
    pub rating: i64,
}

fn parse_id(id: &str) -> Result<ObjectId, Status> {
    ObjectId::parse_str(id).map_err(|_| Status::BadRequest)
}

fn status_of(err: ServiceError) -> Status {
    match err {
        ServiceError::Invalid(_) => Status::BadRequest,
        ServiceError::RecipeNotFound(_)
        | ServiceError::CommentNotFound(_)
        | ServiceError::FavoriteNotFound(_)
        | ServiceError::UserNotFound(_)
        | ServiceError::Store(StoreError::NotFound(..)) => Status::NotFound,
        ServiceError::Forbidden(_) => Status::Forbidden,
        ServiceError::AlreadyRegistered(_)
        | ServiceError::Contended(..)
        | ServiceError::Store(StoreError::Conflict(..)) => Status::Conflict,
        ServiceError::Store(e) => {
            error!(error = %e, "store failure");
            Status::InternalServerError
        }
    }
}

#[get("/recipes?<search>&<tags>")]
pub fn get_feed(
    service: &State<RecipeService>,
    _identity: Identity,
    search: Option<String>,
    tags: Vec<String>,
) -> Result<Json<Vec<Recipe>>, Status> {
    let tags = tags
        .iter()
        .map(|t| t.parse::<Tag>())
        .collect::<Result<Vec<Tag>, _>>()
        .map_err(|_| Status::BadRequest)?;
    match service.feed(search.as_deref(), &tags) {
        Ok(recipes) => Ok(Json(recipes)),
        Err(e) => Err(status_of(e)),
    }
}

#[get("/recipes/mine")]
pub fn get_my_recipes(
    service: &State<RecipeService>,
    identity: Identity,
) -> Result<Json<Vec<Recipe>>, Status> {
    service
        .recipes_by_author(&identity.email)
        .map(Json)
        .map_err(status_of)
}

#[get("/recipes/<id>")]
pub fn get_recipe(
    service: &State<RecipeService>,
    _identity: Identity,
    id: &str,
) -> Result<Json<Recipe>, Status> {
    let id = parse_id(id)?;
    service.recipe(&id).map(Json).map_err(status_of)
}

#[post("/recipes", data = "<draft>")]
pub fn post_recipe(
    service: &State<RecipeService>,
    identity: Identity,
    draft: Json<RecipeDraft>,
) -> Result<Json<Recipe>, Status> {
    service
        .create_recipe(&identity, draft.into_inner())
        .map(Json)
        .map_err(status_of)
}

#[put("/recipes/<id>", data = "<draft>")]
pub fn put_recipe(
    service: &State<RecipeService>,
    identity: Identity,
    id: &str,
    draft: Json<RecipeDraft>,
) -> Result<Json<Recipe>, Status> {
    let id = parse_id(id)?;
    service
        .edit_recipe(&identity, &id, draft.into_inner())
        .map(Json)
        .map_err(status_of)
}

#[post("/recipes/<id>/share")]
pub fn post_share(
    service: &State<RecipeService>,
    identity: Identity,
    id: &str,
) -> Result<Json<bool>, Status> {
    let id = parse_id(id)?;
    service.toggle_share(&identity, &id).map(Json).map_err(status_of)
}

#[delete("/recipes/<id>")]
pub fn delete_recipe(
    service: &State<RecipeService>,
    identity: Identity,
    id: &str,
) -> Result<Status, Status> {
    let id = parse_id(id)?;
    match service.delete_recipe(&identity, &id) {
        Ok(()) => Ok(Status::NoContent),
        Err(e) => Err(status_of(e)),
    }
}

#[post("/recipes/<id>/comments", data = "<body>")]
pub fn post_comment(
    service: &State<RecipeService>,
    identity: Identity,
    id: &str,
    body: Json<CommentBody>,
) -> Result<Json<Comment>, Status> {
    let id = parse_id(id)?;
    service
        .add_comment(&identity, &id, &body.comment)
        .map(Json)
        .map_err(status_of)
}

#[delete("/recipes/<id>/comments/<comment_id>")]
pub fn delete_comment(
    service: &State<RecipeService>,
    identity: Identity,
    id: &str,
    comment_id: &str,
) -> Result<Status, Status> {
    let id = parse_id(id)?;
    let comment_id = parse_id(comment_id)?;
    match service.delete_comment(&identity, &id, &comment_id) {
        Ok(()) => Ok(Status::NoContent),
        Err(e) => Err(status_of(e)),
    }
}

fn react(
    service: &RecipeService,
    identity: &Identity,
    id: &str,
    comment_id: &str,
    action: Reaction,
) -> Result<Json<ReactionSummary>, Status> {
    let id = parse_id(id)?;
    let comment_id = parse_id(comment_id)?;
    let comment = service
        .react(identity, &id, &comment_id, action)
        .map_err(status_of)?;
    Ok(Json(ReactionSummary::of(&comment, &identity.email)))
}

#[post("/recipes/<id>/comments/<comment_id>/like")]
pub fn post_like(
    service: &State<RecipeService>,
    identity: Identity,
    id: &str,
    comment_id: &str,
) -> Result<Json<ReactionSummary>, Status> {
    react(service, &identity, id, comment_id, Reaction::Like)
}

#[post("/recipes/<id>/comments/<comment_id>/dislike")]
pub fn post_dislike(
    service: &State<RecipeService>,
    identity: Identity,
    id: &str,
    comment_id: &str,
) -> Result<Json<ReactionSummary>, Status> {
    react(service, &identity, id, comment_id, Reaction::Dislike)
}

#[put("/recipes/<id>/rating", data = "<body>")]
pub fn put_rating(
    service: &State<RecipeService>,
    identity: Identity,
    id: &str,
    body: Json<RatingBody>,
) -> Result<Json<RatingSummary>, Status> {
    let id = parse_id(id)?;
    service
        .rate(&identity, &id, body.rating)
        .map(Json)
        .map_err(status_of)
}

#[get("/favorites")]
pub fn get_favorites(
    service: &State<RecipeService>,
    identity: Identity,
) -> Result<Json<Vec<FavoriteRecipe>>, Status> {
    service.favorites(&identity).map(Json).map_err(status_of)
}

#[post("/favorites/<recipe_id>")]
pub fn post_favorite(
    service: &State<RecipeService>,
    identity: Identity,
    recipe_id: &str,
) -> Result<Json<FavoriteRecipe>, Status> {
    let recipe_id = parse_id(recipe_id)?;
    service
        .save_favorite(&identity, &recipe_id)
        .map(Json)
        .map_err(status_of)
}

#[delete("/favorites/<id>")]
pub fn delete_favorite(
    service: &State<RecipeService>,
    identity: Identity,
    id: &str,
) -> Result<Status, Status> {
    let id = parse_id(id)?;
    match service.remove_favorite(&identity, &id) {
        Ok(()) => Ok(Status::NoContent),
        Err(e) => Err(status_of(e)),
    }
}

#[post("/users", data = "<profile>")]
pub fn post_user(
    service: &State<RecipeService>,
    identity: Identity,
    profile: Json<NewProfile>,
) -> Result<Json<User>, Status> {
    service
        .register_profile(&identity.email, profile.into_inner())
        .map(Json)
        .map_err(status_of)
}

#[get("/users/me")]
pub fn get_me(service: &State<RecipeService>, identity: Identity) -> Result<Json<User>, Status> {
    service.profile(&identity.email).map(Json).map_err(status_of)
}

#[put("/users/me", data = "<update>")]
pub fn put_me(
    service: &State<RecipeService>,
    identity: Identity,
    update: Json<ProfileUpdate>,
) -> Result<Json<ProfileChange>, Status> {
    service
        .update_profile(&identity, update.into_inner())
        .map(Json)
        .map_err(status_of)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::http::{ContentType, Header};
    use rocket::local::blocking::Client;
    use rocket::serde::json::{json, Value};

    use crate::build_rocket;
    use crate::infra::{InMemoryStore, WriteMode, IDENTITY_HEADER};
    use crate::recipes::RecipeService;

    const COOK: &str = "cook@example.com";
    const GUEST: &str = "guest@example.com";

    fn client() -> Client {
        let store = Arc::new(InMemoryStore::new());
        let service = RecipeService::new(store, WriteMode::CompareAndSwap, 3);
        Client::tracked(build_rocket(service)).unwrap()
    }

    fn who(email: &str) -> Header<'static> {
        Header::new(IDENTITY_HEADER, email.to_string())
    }

    fn oid(value: &Value) -> String {
        value["$oid"].as_str().unwrap().to_string()
    }

    fn create_shared(client: &Client, title: &str, tags: &[&str]) -> String {
        let body = json!({
            "title": title,
            "ingredients": [{ "quantity": "1", "measurement": "Cup", "name": "rice" }],
            "instructions": "Steam it",
            "tags": tags,
        });
        let response = client
            .post("/recipes")
            .header(ContentType::JSON)
            .header(who(COOK))
            .body(body.to_string())
            .dispatch();
        assert_eq!(response.status(), rocket::http::Status::Ok);
        let recipe: Value = response.into_json().unwrap();
        let id = oid(&recipe["_id"]);
        let response = client
            .post(format!("/recipes/{id}/share"))
            .header(who(COOK))
            .dispatch();
        assert_eq!(response.into_json::<bool>(), Some(true));
        id
    }

    #[test]
    fn test_missing_identity_is_unauthorized() {
        let client = client();
        let response = client.get("/recipes").dispatch();
        assert_eq!(response.status(), rocket::http::Status::Unauthorized);
    }

    #[test]
    fn test_invalid_id_is_bad_request() {
        let client = client();
        let response = client.get("/recipes/not-an-id").header(who(COOK)).dispatch();
        assert_eq!(response.status(), rocket::http::Status::BadRequest);
    }

    #[test]
    fn test_unknown_recipe_is_not_found() {
        let client = client();
        let response = client
            .get("/recipes/637be8b4942c929a6d8710c9")
            .header(who(COOK))
            .dispatch();
        assert_eq!(response.status(), rocket::http::Status::NotFound);
    }

    #[test]
    fn test_feed_search_and_tags() {
        let client = client();
        create_shared(&client, "Fried Rice", &["Vegan"]);
        create_shared(&client, "Rice Pudding", &["Vegetarian", "Gluten Free"]);

        let all: Value = client
            .get("/recipes")
            .header(who(GUEST))
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(all.as_array().unwrap().len(), 2);

        let filtered: Value = client
            .get("/recipes?search=rice&tags=Gluten%20Free")
            .header(who(GUEST))
            .dispatch()
            .into_json()
            .unwrap();
        let filtered = filtered.as_array().unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["title"], "Rice Pudding");

        let response = client.get("/recipes?tags=Paleo").header(who(GUEST)).dispatch();
        assert_eq!(response.status(), rocket::http::Status::BadRequest);
    }

    #[test]
    fn test_comment_reactions_over_http() {
        let client = client();
        let id = create_shared(&client, "Congee", &[]);

        let comment: Value = client
            .post(format!("/recipes/{id}/comments"))
            .header(ContentType::JSON)
            .header(who(COOK))
            .body(json!({ "comment": "add ginger" }).to_string())
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(comment["comment"], "add ginger");
        let comment_id = oid(&comment["id"]);

        let liked: Value = client
            .post(format!("/recipes/{id}/comments/{comment_id}/like"))
            .header(who(GUEST))
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(liked["likes"], 1);
        assert_eq!(liked["state"], "liked");

        let swapped: Value = client
            .post(format!("/recipes/{id}/comments/{comment_id}/dislike"))
            .header(who(GUEST))
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(swapped["likes"], 0);
        assert_eq!(swapped["dislikes"], 1);
        assert_eq!(swapped["state"], "disliked");

        let response = client
            .delete(format!("/recipes/{id}/comments/{comment_id}"))
            .header(who(GUEST))
            .dispatch();
        assert_eq!(response.status(), rocket::http::Status::Forbidden);
        let response = client
            .delete(format!("/recipes/{id}/comments/{comment_id}"))
            .header(who(COOK))
            .dispatch();
        assert_eq!(response.status(), rocket::http::Status::NoContent);
    }

    #[test]
    fn test_rating_over_http() {
        let client = client();
        let id = create_shared(&client, "Risotto", &[]);

        for (user, rating) in [(COOK, 2), (GUEST, 5)] {
            let response = client
                .put(format!("/recipes/{id}/rating"))
                .header(ContentType::JSON)
                .header(who(user))
                .body(json!({ "rating": rating }).to_string())
                .dispatch();
            assert_eq!(response.status(), rocket::http::Status::Ok);
        }
        let summary: Value = client
            .put(format!("/recipes/{id}/rating"))
            .header(ContentType::JSON)
            .header(who(GUEST))
            .body(json!({ "rating": 4 }).to_string())
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(summary["average"], 3.0);
        assert_eq!(summary["count"], 2);

        let response = client
            .put(format!("/recipes/{id}/rating"))
            .header(ContentType::JSON)
            .header(who(GUEST))
            .body(json!({ "rating": 0 }).to_string())
            .dispatch();
        assert_eq!(response.status(), rocket::http::Status::BadRequest);
    }

    #[test]
    fn test_profile_and_favorites_over_http() {
        let client = client();
        let response = client
            .post("/users")
            .header(ContentType::JSON)
            .header(who(GUEST))
            .body(json!({ "nickname": "gourmet" }).to_string())
            .dispatch();
        assert_eq!(response.status(), rocket::http::Status::Ok);
        let response = client
            .post("/users")
            .header(ContentType::JSON)
            .header(who(GUEST))
            .body("{}")
            .dispatch();
        assert_eq!(response.status(), rocket::http::Status::Conflict);

        let id = create_shared(&client, "Paella", &[]);
        let favorite: Value = client
            .post(format!("/favorites/{id}"))
            .header(who(GUEST))
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(favorite["recipe"]["title"], "Paella");
        let favorite_id = oid(&favorite["_id"]);

        let favorites: Value = client
            .get("/favorites")
            .header(who(GUEST))
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(favorites.as_array().unwrap().len(), 1);

        let response = client
            .delete(format!("/favorites/{favorite_id}"))
            .header(who(GUEST))
            .dispatch();
        assert_eq!(response.status(), rocket::http::Status::NoContent);

        let me: Value = client
            .get("/users/me")
            .header(who(GUEST))
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(me["nickname"], "gourmet");
    }
}
