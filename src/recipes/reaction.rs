//! Like/dislike reconciliation for comments.
//!
//! A user is in at most one of a comment's `likes` and `dislikes` sets.
//! Their state is derived from membership on every call, never stored:
//!
//! | state      | like                   | dislike                |
//! |------------|------------------------|------------------------|
//! | `none`     | add to likes           | add to dislikes        |
//! | `liked`    | remove from likes      | move likes → dislikes  |
//! | `disliked` | move dislikes → likes  | remove from dislikes   |

use std::collections::BTreeSet;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::infra::Comment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionState {
    None,
    Liked,
    Disliked,
}

impl ReactionState {
    /// A user found in both sets reads as `Liked`.
    pub fn of(likes: &BTreeSet<String>, dislikes: &BTreeSet<String>, user: &str) -> Self {
        if likes.contains(user) {
            ReactionState::Liked
        } else if dislikes.contains(user) {
            ReactionState::Disliked
        } else {
            ReactionState::None
        }
    }
}

/// Next `(likes, dislikes)` after `user` presses `action`.
///
/// The user is taken out of both sets before the new membership is decided,
/// so the result never holds them twice even if the input did.
pub fn reconcile(
    likes: &BTreeSet<String>,
    dislikes: &BTreeSet<String>,
    user: &str,
    action: Reaction,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let state = ReactionState::of(likes, dislikes, user);
    let mut likes = likes.clone();
    let mut dislikes = dislikes.clone();
    likes.remove(user);
    dislikes.remove(user);

    match (state, action) {
        (ReactionState::Liked, Reaction::Like) | (ReactionState::Disliked, Reaction::Dislike) => {}
        (_, Reaction::Like) => {
            likes.insert(user.to_string());
        }
        (_, Reaction::Dislike) => {
            dislikes.insert(user.to_string());
        }
    }
    (likes, dislikes)
}

impl Comment {
    pub fn reaction_of(&self, user: &str) -> ReactionState {
        ReactionState::of(&self.likes, &self.dislikes, user)
    }

    /// Applies `action` for `user` and returns their new state.
    pub fn react(&mut self, user: &str, action: Reaction) -> ReactionState {
        let (likes, dislikes) = reconcile(&self.likes, &self.dislikes, user, action);
        self.likes = likes;
        self.dislikes = dislikes;
        self.reaction_of(user)
    }
}

/// What a client needs to draw the thumbs of one comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub comment_id: ObjectId,
    pub likes: usize,
    pub dislikes: usize,
    pub state: ReactionState,
}

impl ReactionSummary {
    pub fn of(comment: &Comment, user: &str) -> Self {
        ReactionSummary {
            comment_id: comment.id,
            likes: comment.likes.len(),
            dislikes: comment.dislikes.len(),
            state: comment.reaction_of(user),
        }
    }
}
