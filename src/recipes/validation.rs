use thiserror::Error;

use crate::infra::{Ingredient, RecipeDraft};

pub const MAX_TITLE_LEN: usize = 40;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("you forgot to enter a title")]
    EmptyTitle(),
    #[error("title has {0} characters, expected at most 40")]
    TitleTooLong(usize),
    #[error("a recipe must have ingredients")]
    NoIngredients(),
    #[error("ingredient {0} is missing its quantity, measurement or name")]
    IncompleteIngredient(usize),
    #[error("you did not give instructions")]
    EmptyInstructions(),
    #[error("comment is empty")]
    EmptyComment(),
    #[error("rating {0} out of range, expected between 1 and 5")]
    ScoreOutOfRange(i64),
    #[error("unknown tag {0}")]
    UnknownTag(String),
}

pub fn validate_draft(draft: &RecipeDraft) -> Result<(), ValidationError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle());
    }
    let len = title.chars().count();
    if len > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong(len));
    }
    validate_ingredients(&draft.ingredients)?;
    if draft.instructions.trim().is_empty() {
        return Err(ValidationError::EmptyInstructions());
    }
    Ok(())
}

pub fn validate_ingredients(ingredients: &[Ingredient]) -> Result<(), ValidationError> {
    if ingredients.is_empty() {
        return Err(ValidationError::NoIngredients());
    }
    match ingredients.iter().position(|i| !i.is_complete()) {
        Some(index) => Err(ValidationError::IncompleteIngredient(index)),
        None => Ok(()),
    }
}

/// Trimmed comment text, rejected when blank.
pub fn validate_comment(text: &str) -> Result<&str, ValidationError> {
    match text.trim() {
        "" => Err(ValidationError::EmptyComment()),
        trimmed => Ok(trimmed),
    }
}
