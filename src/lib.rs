//! Backend for the recipe sharing app.
//!
//! Recipes, their comments, like/dislike reactions, star ratings and
//! favorites live in a document store ([`infra::DocumentStore`]). The
//! reducers in [`recipes`] compute every change; [`recipes::RecipeService`]
//! reads, applies and writes whole documents back.

pub mod infra;
pub mod recipes;

use infra::routes::*;
use recipes::RecipeService;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{routes, Build, Request, Response, Rocket};

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Attaching CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PUT, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

pub fn build_rocket(service: RecipeService) -> Rocket<Build> {
    rocket::build()
        .manage(service)
        .mount(
            "/",
            routes![
                get_feed,
                get_my_recipes,
                get_recipe,
                post_recipe,
                put_recipe,
                post_share,
                delete_recipe,
                post_comment,
                delete_comment,
                post_like,
                post_dislike,
                put_rating,
                get_favorites,
                post_favorite,
                delete_favorite,
                post_user,
                get_me,
                put_me
            ],
        )
        .attach(CORS)
}
