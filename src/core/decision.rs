use crate::core::duplicate::SimilarityGroup;
use crate::core::image::ImageRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Reviewer referred to member {index}, group has {len} members")]
    UnknownMember { index: usize, len: usize },

    #[error("Refusing to remove every member of the group")]
    NoSurvivor,

    #[error("Interactive mode needs a reviewer, none was provided")]
    NoReviewer,

    #[error("Reviewer failed: {0}")]
    Reviewer(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepRule {
    #[default]
    KeepLarger,
    KeepSmaller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    Automatic(KeepRule),
    Interactive,
}

impl Default for ReviewMode {
    fn default() -> Self {
        ReviewMode::Automatic(KeepRule::default())
    }
}

/// A reviewer's answer for one group. Indices refer to `SimilarityGroup::members`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
    Remove(Vec<usize>),
    KeepAll,
    Skip,
    Abort,
}

/// External collaborator that shows a group to a person and reports their choice.
pub trait Reviewer {
    fn review(&mut self, group: &SimilarityGroup) -> std::io::Result<Review>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub keep: Vec<ImageRecord>,
    pub remove: Vec<ImageRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Remove(Decision),
    KeepAll,
    Skip,
    Abort,
}

/// Decide which members of `group` to remove. Automatic mode never consults `reviewer`.
pub fn decide<'r>(
    group: &SimilarityGroup,
    mode: ReviewMode,
    reviewer: Option<&mut (dyn Reviewer + 'r)>,
) -> Result<Outcome, DecisionError> {
    if !group.is_actionable() {
        return Ok(Outcome::KeepAll);
    }

    match mode {
        ReviewMode::Automatic(rule) => Ok(Outcome::Remove(decide_by_size(group, rule))),
        ReviewMode::Interactive => {
            let Some(reviewer) = reviewer else {
                return Err(DecisionError::NoReviewer);
            };
            match reviewer.review(group).map_err(DecisionError::Reviewer)? {
                Review::Remove(indices) => partition(group, &indices).map(Outcome::Remove),
                Review::KeepAll => Ok(Outcome::KeepAll),
                Review::Skip => Ok(Outcome::Skip),
                Review::Abort => Ok(Outcome::Abort),
            }
        }
    }
}

/// Keep the largest (or smallest) file; equal sizes keep the first seen.
pub fn decide_by_size(group: &SimilarityGroup, rule: KeepRule) -> Decision {
    let mut best = 0;
    for (index, member) in group.members.iter().enumerate().skip(1) {
        let current = group.members[best].size_bytes;
        let better = match rule {
            KeepRule::KeepLarger => member.size_bytes > current,
            KeepRule::KeepSmaller => member.size_bytes < current,
        };
        if better {
            best = index;
        }
    }

    let keep = vec![group.members[best].clone()];
    let remove = group
        .members
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != best)
        .map(|(_, member)| member.clone())
        .collect();
    Decision { keep, remove }
}

fn partition(group: &SimilarityGroup, indices: &[usize]) -> Result<Decision, DecisionError> {
    let len = group.members.len();
    if let Some(&index) = indices.iter().find(|&&index| index >= len) {
        return Err(DecisionError::UnknownMember { index, len });
    }

    let (remove, keep): (Vec<_>, Vec<_>) = group
        .members
        .iter()
        .enumerate()
        .partition(|(index, _)| indices.contains(index));

    if keep.is_empty() {
        return Err(DecisionError::NoSurvivor);
    }

    let strip = |items: Vec<(usize, &ImageRecord)>| -> Vec<ImageRecord> {
        items.into_iter().map(|(_, member)| member.clone()).collect()
    };
    Ok(Decision {
        keep: strip(keep),
        remove: strip(remove),
    })
}
