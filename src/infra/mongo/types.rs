use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::recipes::ValidationError;

pub const RECIPES: &str = "recipes";
pub const USERS: &str = "users";
pub const FAVORITES: &str = "favorite-recipes";

pub const DEFAULT_RECIPE_IMAGE: &str = "https://www.greatwall.lk/assets/image/default.png";
pub const DEFAULT_AVATAR: &str = "../assets/chef.png";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Recipe {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "_rev", default)]
    pub revision: i64,
    /// Author email.
    pub email: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: String,
    pub image: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Recipe {
    /// Name shown next to the recipe: the author's nickname, else their email.
    pub fn author_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.email)
    }

    pub fn comment(&self, id: &ObjectId) -> Option<&Comment> {
        self.comments.iter().find(|c| &c.id == id)
    }

    pub fn comment_mut(&mut self, id: &ObjectId) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| &c.id == id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Ingredient {
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub measurement: Option<Measurement>,
    #[serde(default)]
    pub name: String,
}

impl Ingredient {
    pub fn is_complete(&self) -> bool {
        !self.quantity.trim().is_empty()
            && self.measurement.is_some()
            && !self.name.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum Measurement {
    Teaspoon,
    Tablespoon,
    Cup,
    #[serde(rename = "Fluid Ounce")]
    FluidOunce,
    Pint,
    Quart,
    Gallon,
    Milliliter,
    Liter,
    Gram,
    Kilogram,
    Piece,
    #[serde(rename = "")]
    Unitless,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum Tag {
    Vegan,
    Vegetarian,
    Kosher,
    Halal,
    #[serde(rename = "Gluten Free")]
    GlutenFree,
}

impl Tag {
    pub fn label(&self) -> &'static str {
        match self {
            Tag::Vegan => "Vegan",
            Tag::Vegetarian => "Vegetarian",
            Tag::Kosher => "Kosher",
            Tag::Halal => "Halal",
            Tag::GlutenFree => "Gluten Free",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tag {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Tag::Vegan, Tag::Vegetarian, Tag::Kosher, Tag::Halal, Tag::GlutenFree]
            .into_iter()
            .find(|tag| tag.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownTag(s.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Rating {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub rating: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Comment {
    // comments written before ids existed decode with a fresh one; the
    // service writes it back before handing the recipe out
    #[serde(default = "ObjectId::new")]
    pub id: ObjectId,
    pub author: Author,
    pub comment: String,
    #[serde(default)]
    pub likes: BTreeSet<String>,
    #[serde(default)]
    pub dislikes: BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Author {
    pub email: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Author {
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.email)
    }
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Author {
            email: user.email.clone(),
            nickname: user.nickname.clone(),
            image: Some(user.image.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "_rev", default)]
    pub revision: i64,
    pub email: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default = "default_avatar")]
    pub image: String,
}

fn default_avatar() -> String {
    DEFAULT_AVATAR.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FavoriteRecipe {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "_rev", default)]
    pub revision: i64,
    /// Email of the user who saved the recipe.
    pub email: String,
    pub recipe_id: ObjectId,
    /// Copy of the recipe taken when it was saved.
    pub recipe: Recipe,
}

/// Recipe fields supplied by the author on creation and edit.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RecipeDraft {
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NewProfile {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}
