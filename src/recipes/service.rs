//! Store I/O around the recipe reducers.
//!
//! Every recipe mutation reads the whole document, applies a reducer and
//! writes the whole document back with the configured [`WriteMode`]. Under
//! compare-and-swap a concurrent writer makes the write fail with a conflict;
//! the read-modify-write is then replayed on the fresh document, at most
//! `conflict_retries` more times. Other store failures are not retried.

use std::sync::Arc;

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::rating::{aggregate, RatingSummary, Score};
use super::reaction::Reaction;
use super::validation::{validate_comment, validate_draft, ValidationError};
use crate::infra::{
    decode, encode, Author, Comment, DocumentStore, FavoriteRecipe, Identity, NewProfile,
    ProfileUpdate, Recipe, RecipeDraft, StoreError, Tag, User, WriteMode, DEFAULT_AVATAR,
    DEFAULT_RECIPE_IMAGE, FAVORITES, ID, RECIPES, USERS,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("recipe {0} not found")]
    RecipeNotFound(ObjectId),
    #[error("comment {0} not found")]
    CommentNotFound(ObjectId),
    #[error("favorite {0} not found")]
    FavoriteNotFound(ObjectId),
    #[error("no profile for {0}")]
    UserNotFound(String),
    #[error("{0} already has a profile")]
    AlreadyRegistered(String),
    #[error("{0} does not own this document")]
    Forbidden(String),
    #[error("recipe {0} kept changing, gave up after {1} attempts")]
    Contended(ObjectId, u32),
}

/// Result of a profile change and its propagation into recipes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileChange {
    pub user: User,
    pub recipes_updated: usize,
    pub recipes_failed: usize,
}

pub struct RecipeService {
    store: Arc<dyn DocumentStore>,
    write_mode: WriteMode,
    conflict_retries: u32,
}

impl RecipeService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        write_mode: WriteMode,
        conflict_retries: u32,
    ) -> Self {
        RecipeService {
            store,
            write_mode,
            conflict_retries,
        }
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    pub fn recipe(&self, id: &ObjectId) -> Result<Recipe, ServiceError> {
        match self.store.get(RECIPES, id)? {
            Some(record) => self.read_recipe(record),
            None => Err(ServiceError::RecipeNotFound(*id)),
        }
    }

    fn recipes_where(&self, filter: Document) -> Result<Vec<Recipe>, ServiceError> {
        self.store
            .query(RECIPES, filter)?
            .into_iter()
            .map(|record| self.read_recipe(record))
            .collect()
    }

    /// Decodes a recipe for a caller. Comments stored without an id are
    /// given one on decode, so such a recipe is written back first and the
    /// ids a caller sees stay valid for later reactions and deletions.
    fn read_recipe(&self, record: Document) -> Result<Recipe, ServiceError> {
        match record.get_object_id(ID) {
            Ok(id) if lacks_comment_ids(&record) => {
                debug!(%id, "assigning ids to legacy comments");
                let (recipe, ()) = self.modify_recipe(&id, |_| Ok(()))?;
                Ok(recipe)
            }
            _ => Ok(decode(record)?),
        }
    }

    fn load(&self, id: &ObjectId) -> Result<Recipe, ServiceError> {
        match self.store.get(RECIPES, id)? {
            Some(record) => Ok(decode(record)?),
            None => Err(ServiceError::RecipeNotFound(*id)),
        }
    }

    /// Read-modify-write of one recipe. `reducer` may run more than once.
    fn modify_recipe<R>(
        &self,
        id: &ObjectId,
        mut reducer: impl FnMut(&mut Recipe) -> Result<R, ServiceError>,
    ) -> Result<(Recipe, R), ServiceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut recipe = self.load(id)?;
            let output = reducer(&mut recipe)?;
            match self.store.set(RECIPES, id, encode(&recipe)?, self.write_mode) {
                Ok(()) => {
                    recipe.revision += 1;
                    return Ok((recipe, output));
                }
                Err(StoreError::Conflict(..)) if attempt <= self.conflict_retries => {
                    debug!(%id, attempt, "recipe changed underneath, retrying");
                }
                Err(StoreError::Conflict(..)) => {
                    return Err(ServiceError::Contended(*id, attempt))
                }
                Err(StoreError::NotFound(..)) => return Err(ServiceError::RecipeNotFound(*id)),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn owned_by(recipe: &Recipe, actor: &Identity) -> Result<(), ServiceError> {
        if recipe.email == actor.email {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(actor.email.clone()))
        }
    }

    fn find_profile(&self, email: &str) -> Result<Option<User>, ServiceError> {
        match self.store.query(USERS, doc! {"email": email})?.into_iter().next() {
            Some(record) => Ok(Some(decode(record)?)),
            None => Ok(None),
        }
    }

    pub fn create_recipe(
        &self,
        actor: &Identity,
        draft: RecipeDraft,
    ) -> Result<Recipe, ServiceError> {
        validate_draft(&draft)?;
        let nickname = self.find_profile(&actor.email)?.and_then(|u| u.nickname);
        let mut recipe = Recipe {
            id: None,
            revision: 0,
            email: actor.email.clone(),
            nickname,
            title: draft.title.trim().to_string(),
            ingredients: draft.ingredients,
            instructions: draft.instructions,
            image: draft.image.unwrap_or_else(|| DEFAULT_RECIPE_IMAGE.to_string()),
            tags: draft.tags,
            shared: false,
            ratings: vec![],
            comments: vec![],
        };
        let id = self.store.add(RECIPES, encode(&recipe)?)?;
        info!(%id, author = %actor.email, "recipe created");
        recipe.id = Some(id);
        Ok(recipe)
    }

    /// Shared recipes whose title contains `search` and that carry every tag.
    pub fn feed(&self, search: Option<&str>, tags: &[Tag]) -> Result<Vec<Recipe>, ServiceError> {
        let needle = search.map(|s| s.trim().to_lowercase()).unwrap_or_default();
        let recipes = self
            .recipes_where(doc! {"shared": true})?
            .into_iter()
            .filter(|r| r.title.to_lowercase().contains(&needle))
            .filter(|r| tags.iter().all(|tag| r.tags.contains(tag)))
            .collect();
        Ok(recipes)
    }

    pub fn recipes_by_author(&self, email: &str) -> Result<Vec<Recipe>, ServiceError> {
        self.recipes_where(doc! {"email": email})
    }

    pub fn edit_recipe(
        &self,
        actor: &Identity,
        id: &ObjectId,
        draft: RecipeDraft,
    ) -> Result<Recipe, ServiceError> {
        validate_draft(&draft)?;
        let nickname = self.find_profile(&actor.email)?.and_then(|u| u.nickname);
        let (recipe, ()) = self.modify_recipe(id, |recipe| {
            Self::owned_by(recipe, actor)?;
            recipe.title = draft.title.trim().to_string();
            recipe.ingredients = draft.ingredients.clone();
            recipe.instructions = draft.instructions.clone();
            recipe.image = draft
                .image
                .clone()
                .unwrap_or_else(|| DEFAULT_RECIPE_IMAGE.to_string());
            recipe.tags = draft.tags.clone();
            recipe.nickname = nickname.clone();
            Ok(())
        })?;
        Ok(recipe)
    }

    /// Flips whether the recipe appears in the feed; returns the new flag.
    pub fn toggle_share(&self, actor: &Identity, id: &ObjectId) -> Result<bool, ServiceError> {
        let (_, shared) = self.modify_recipe(id, |recipe| {
            Self::owned_by(recipe, actor)?;
            recipe.shared = !recipe.shared;
            Ok(recipe.shared)
        })?;
        debug!(%id, shared, "share toggled");
        Ok(shared)
    }

    pub fn delete_recipe(&self, actor: &Identity, id: &ObjectId) -> Result<(), ServiceError> {
        let recipe = self.recipe(id)?;
        Self::owned_by(&recipe, actor)?;
        match self.store.delete(RECIPES, id) {
            Ok(()) => {
                info!(%id, "recipe deleted");
                Ok(())
            }
            Err(StoreError::NotFound(..)) => Err(ServiceError::RecipeNotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn add_comment(
        &self,
        actor: &Identity,
        id: &ObjectId,
        text: &str,
    ) -> Result<Comment, ServiceError> {
        let text = validate_comment(text)?;
        let author = match self.find_profile(&actor.email)? {
            Some(user) => Author::from(&user),
            None => {
                debug!(email = %actor.email, "commenting without a profile");
                Author {
                    email: actor.email.clone(),
                    nickname: None,
                    image: None,
                }
            }
        };
        let comment = Comment {
            id: ObjectId::new(),
            author,
            comment: text.to_string(),
            likes: Default::default(),
            dislikes: Default::default(),
        };
        self.modify_recipe(id, |recipe| {
            recipe.comments.push(comment.clone());
            Ok(())
        })?;
        Ok(comment)
    }

    pub fn delete_comment(
        &self,
        actor: &Identity,
        id: &ObjectId,
        comment_id: &ObjectId,
    ) -> Result<(), ServiceError> {
        self.modify_recipe(id, |recipe| {
            let index = recipe
                .comments
                .iter()
                .position(|c| &c.id == comment_id)
                .ok_or(ServiceError::CommentNotFound(*comment_id))?;
            if recipe.comments[index].author.email != actor.email {
                return Err(ServiceError::Forbidden(actor.email.clone()));
            }
            recipe.comments.remove(index);
            Ok(())
        })?;
        Ok(())
    }

    /// Applies a like or dislike and returns the comment as persisted.
    pub fn react(
        &self,
        actor: &Identity,
        id: &ObjectId,
        comment_id: &ObjectId,
        action: Reaction,
    ) -> Result<Comment, ServiceError> {
        let (_, comment) = self.modify_recipe(id, |recipe| {
            let comment = recipe
                .comment_mut(comment_id)
                .ok_or(ServiceError::CommentNotFound(*comment_id))?;
            comment.react(&actor.email, action);
            Ok(comment.clone())
        })?;
        debug!(
            %id,
            %comment_id,
            ?action,
            likes = comment.likes.len(),
            dislikes = comment.dislikes.len(),
            "reaction stored"
        );
        Ok(comment)
    }

    pub fn rate(
        &self,
        actor: &Identity,
        id: &ObjectId,
        value: i64,
    ) -> Result<RatingSummary, ServiceError> {
        let score = Score::new(value)?;
        let (_, summary) = self.modify_recipe(id, |recipe| {
            let (ratings, average) = aggregate(&recipe.ratings, &actor.email, score);
            recipe.ratings = ratings;
            Ok(RatingSummary {
                average,
                count: recipe.ratings.len(),
                rating: Some(score.get()),
            })
        })?;
        Ok(summary)
    }

    /// Saves a copy of the recipe for `actor`. Saving twice returns the
    /// first copy.
    pub fn save_favorite(
        &self,
        actor: &Identity,
        recipe_id: &ObjectId,
    ) -> Result<FavoriteRecipe, ServiceError> {
        let filter = doc! {"email": actor.email.as_str(), "recipe_id": *recipe_id};
        if let Some(existing) = self.store.query(FAVORITES, filter)?.into_iter().next() {
            return Ok(decode(existing)?);
        }
        let recipe = self.recipe(recipe_id)?;
        let mut favorite = FavoriteRecipe {
            id: None,
            revision: 0,
            email: actor.email.clone(),
            recipe_id: *recipe_id,
            recipe,
        };
        favorite.id = Some(self.store.add(FAVORITES, encode(&favorite)?)?);
        Ok(favorite)
    }

    pub fn favorites(&self, actor: &Identity) -> Result<Vec<FavoriteRecipe>, ServiceError> {
        self.store
            .query(FAVORITES, doc! {"email": actor.email.as_str()})?
            .into_iter()
            .map(|record| decode(record).map_err(ServiceError::from))
            .collect()
    }

    pub fn remove_favorite(
        &self,
        actor: &Identity,
        favorite_id: &ObjectId,
    ) -> Result<(), ServiceError> {
        let favorite: FavoriteRecipe = match self.store.get(FAVORITES, favorite_id)? {
            Some(record) => decode(record)?,
            None => return Err(ServiceError::FavoriteNotFound(*favorite_id)),
        };
        if favorite.email != actor.email {
            return Err(ServiceError::Forbidden(actor.email.clone()));
        }
        self.store.delete(FAVORITES, favorite_id)?;
        Ok(())
    }

    pub fn register_profile(&self, email: &str, profile: NewProfile) -> Result<User, ServiceError> {
        if self.find_profile(email)?.is_some() {
            return Err(ServiceError::AlreadyRegistered(email.to_string()));
        }
        let mut user = User {
            id: None,
            revision: 0,
            email: email.to_string(),
            nickname: profile.nickname.filter(|n| !n.trim().is_empty()),
            image: profile.image.unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
        };
        user.id = Some(self.store.add(USERS, encode(&user)?)?);
        info!(email, "profile registered");
        Ok(user)
    }

    pub fn profile(&self, email: &str) -> Result<User, ServiceError> {
        self.find_profile(email)?
            .ok_or_else(|| ServiceError::UserNotFound(email.to_string()))
    }

    /// Updates the actor's profile, then copies the new nickname and avatar
    /// into the recipes they wrote and the comments they left. A recipe that
    /// cannot be rewritten is logged and skipped.
    pub fn update_profile(
        &self,
        actor: &Identity,
        update: ProfileUpdate,
    ) -> Result<ProfileChange, ServiceError> {
        let mut user = self.profile(&actor.email)?;
        let user_id = user.id.ok_or(StoreError::MissingId())?;

        let mut patch = Document::new();
        if let Some(nickname) = update.nickname {
            user.nickname = Some(nickname).filter(|n| !n.trim().is_empty());
            patch.insert("nickname", user.nickname.clone());
        }
        if let Some(image) = update.image {
            user.image = image;
            patch.insert("image", user.image.clone());
        }
        if patch.is_empty() {
            return Ok(ProfileChange {
                user,
                recipes_updated: 0,
                recipes_failed: 0,
            });
        }
        self.store.update(USERS, &user_id, patch)?;
        user.revision += 1;

        let author = Author::from(&user);
        let mut change = ProfileChange {
            user,
            recipes_updated: 0,
            recipes_failed: 0,
        };
        let mut touched = Vec::new();
        for record in self.store.query(RECIPES, doc! {})? {
            let record_id = record.get_object_id(ID).ok();
            match decode::<Recipe>(record) {
                Ok(r) if r.email == actor.email
                    || r.comments.iter().any(|c| c.author.email == actor.email) =>
                {
                    touched.extend(r.id);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(id = ?record_id, error = %e, "skipping unreadable recipe");
                    change.recipes_failed += 1;
                }
            }
        }

        for id in touched {
            let result = self.modify_recipe(&id, |recipe| {
                if recipe.email == actor.email {
                    recipe.nickname = author.nickname.clone();
                }
                let own = |c: &&mut Comment| c.author.email == actor.email;
                for comment in recipe.comments.iter_mut().filter(own) {
                    comment.author = author.clone();
                }
                Ok(())
            });
            match result {
                Ok(_) => change.recipes_updated += 1,
                Err(e) => {
                    warn!(%id, error = %e, "could not propagate profile change");
                    change.recipes_failed += 1;
                }
            }
        }
        info!(
            email = %actor.email,
            updated = change.recipes_updated,
            failed = change.recipes_failed,
            "profile updated"
        );
        Ok(change)
    }
}

fn lacks_comment_ids(record: &Document) -> bool {
    match record.get_array("comments") {
        Ok(comments) => comments
            .iter()
            .any(|c| matches!(c, Bson::Document(comment) if !comment.contains_key("id"))),
        Err(_) => false,
    }
}
