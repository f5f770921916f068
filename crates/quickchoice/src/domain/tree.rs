//! Lookup and mutation walks over the choice tree.
//!
//! Every walk is depth-first and pre-order: a `Multi` container is visited
//! before its children, and children keep their configured order. Walks use an
//! explicit stack so user-authored nesting never grows the call stack.

use std::collections::HashSet;

use crate::domain::errors::ChoiceError;
use crate::domain::model::Choice;

/// Key used to find a choice in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceLookup<'a> {
    Id(&'a str),
    /// Names are not unique; the first match in tree order wins.
    Name(&'a str),
}

impl ChoiceLookup<'_> {
    fn matches(&self, choice: &Choice) -> bool {
        match self {
            ChoiceLookup::Id(id) => choice.id() == *id,
            ChoiceLookup::Name(name) => choice.name == *name,
        }
    }

    fn key(&self) -> &str {
        match self {
            ChoiceLookup::Id(key) | ChoiceLookup::Name(key) => key,
        }
    }
}

/// Pre-order iterator over a forest of choices.
pub struct Walk<'a> {
    stack: Vec<&'a Choice>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Choice;

    fn next(&mut self) -> Option<Self::Item> {
        let choice = self.stack.pop()?;
        self.stack.extend(choice.children().iter().rev());
        Some(choice)
    }
}

/// Walk every choice under `roots` in depth-first pre-order.
pub fn walk(roots: &[Choice]) -> Walk<'_> {
    Walk {
        stack: roots.iter().rev().collect(),
    }
}

/// All choices in depth-first order, containers before their children.
pub fn flatten(roots: &[Choice]) -> Vec<&Choice> {
    walk(roots).collect()
}

/// Find the first choice matching `lookup` in tree order.
pub fn find_choice<'a>(roots: &'a [Choice], lookup: ChoiceLookup<'_>) -> Result<&'a Choice, ChoiceError> {
    walk(roots)
        .find(|choice| lookup.matches(choice))
        .ok_or_else(|| ChoiceError::not_found("choice", lookup.key()))
}

pub fn find_choice_mut<'a>(
    roots: &'a mut [Choice],
    lookup: ChoiceLookup<'_>,
) -> Result<&'a mut Choice, ChoiceError> {
    let mut stack: Vec<&'a mut Choice> = roots.iter_mut().rev().collect();
    while let Some(choice) = stack.pop() {
        if lookup.matches(choice) {
            return Ok(choice);
        }
        if let Some(children) = choice.children_mut() {
            stack.extend(children.iter_mut().rev());
        }
    }
    Err(ChoiceError::not_found("choice", lookup.key()))
}

/// Append `choice` at the root or under the `Multi` container with id `parent`.
///
/// Fails when any id in the inserted subtree already exists in the tree.
pub fn insert_choice(
    roots: &mut Vec<Choice>,
    parent: Option<&str>,
    choice: Choice,
) -> Result<(), ChoiceError> {
    for incoming in walk(std::slice::from_ref(&choice)) {
        if walk(roots.as_slice()).any(|existing| existing.id() == incoming.id()) {
            return Err(ChoiceError::invalid(format!(
                "choice id '{}' is already in use",
                incoming.id()
            )));
        }
    }

    match parent {
        None => roots.push(choice),
        Some(parent_id) => {
            let container = find_choice_mut(roots, ChoiceLookup::Id(parent_id))?;
            let children = container.children_mut().ok_or_else(|| {
                ChoiceError::invalid(format!("choice '{parent_id}' cannot hold children"))
            })?;
            children.push(choice);
        }
    }
    Ok(())
}

/// Fail with `InvalidArgument` naming the first id that appears twice anywhere under `roots`.
pub fn validate_unique_ids(roots: &[Choice]) -> Result<(), ChoiceError> {
    let mut seen = HashSet::new();
    match walk(roots).find(|choice| !seen.insert(choice.id())) {
        Some(repeat) => Err(ChoiceError::invalid(format!(
            "choice id '{}' is used more than once",
            repeat.id()
        ))),
        None => Ok(()),
    }
}

/// Detach the choice with `id` (and its subtree) from anywhere in the tree.
pub fn remove_choice(roots: &mut Vec<Choice>, id: &str) -> Result<Choice, ChoiceError> {
    let mut pending: Vec<&mut Vec<Choice>> = vec![roots];
    while let Some(level) = pending.pop() {
        if let Some(position) = level.iter().position(|choice| choice.id() == id) {
            return Ok(level.remove(position));
        }
        pending.extend(level.iter_mut().filter_map(Choice::children_mut));
    }
    Err(ChoiceError::not_found("choice", id))
}
