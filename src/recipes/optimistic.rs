//! Client-side view state around a store write.
//!
//! `begin` shows the predicted value while the write is in flight. `settle`
//! either adopts what the store answered or, on failure, logs the error and
//! falls back to the value from before the action. Failures are not
//! returned; the caller only learns whether the action stuck.

use std::fmt::Display;

use tracing::warn;

use super::reaction::{Reaction, ReactionState, ReactionSummary};
use crate::infra::Comment;

#[derive(Debug, Clone, PartialEq)]
pub struct Optimistic<T> {
    confirmed: T,
    pending: Option<T>,
}

impl<T> Optimistic<T> {
    pub fn new(value: T) -> Self {
        Optimistic {
            confirmed: value,
            pending: None,
        }
    }

    /// The value to display: the in-flight prediction if any.
    pub fn current(&self) -> &T {
        self.pending.as_ref().unwrap_or(&self.confirmed)
    }

    /// Last value the store acknowledged.
    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn begin(&mut self, predicted: T) {
        self.pending = Some(predicted);
    }

    /// Returns `true` when the write went through.
    pub fn settle<E: Display>(&mut self, result: Result<T, E>) -> bool {
        self.pending = None;
        match result {
            Ok(value) => {
                self.confirmed = value;
                true
            }
            Err(e) => {
                warn!(error = %e, "write failed, rolling back");
                false
            }
        }
    }
}

/// One comment as seen by one user, with their thumbs up/down in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentView {
    user: String,
    comment: Optimistic<Comment>,
}

impl CommentView {
    pub fn new(comment: Comment, user: impl Into<String>) -> Self {
        CommentView {
            user: user.into(),
            comment: Optimistic::new(comment),
        }
    }

    /// Predicts the outcome of `action` locally until it is settled.
    pub fn press(&mut self, action: Reaction) {
        let mut predicted = self.comment.confirmed().clone();
        predicted.react(&self.user, action);
        self.comment.begin(predicted);
    }

    pub fn settle<E: Display>(&mut self, result: Result<Comment, E>) -> bool {
        self.comment.settle(result)
    }

    pub fn is_pending(&self) -> bool {
        self.comment.is_pending()
    }

    pub fn state(&self) -> ReactionState {
        self.comment.current().reaction_of(&self.user)
    }

    pub fn summary(&self) -> ReactionSummary {
        ReactionSummary::of(self.comment.current(), &self.user)
    }

    pub fn comment(&self) -> &Comment {
        self.comment.current()
    }
}
