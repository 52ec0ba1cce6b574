//! Recipe domain: pure reducers for reactions and ratings, validation, and
//! the service that runs them against the document store.

pub mod optimistic;
pub mod rating;
pub mod reaction;
pub mod service;
pub mod validation;

pub use optimistic::{CommentView, Optimistic};
pub use rating::{aggregate, average, RatingSummary, Score};
pub use reaction::{reconcile, Reaction, ReactionState, ReactionSummary};
pub use service::{ProfileChange, RecipeService, ServiceError};
pub use validation::ValidationError;
