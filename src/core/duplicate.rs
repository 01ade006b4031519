// Similarity grouping over perceptual fingerprints.
//
// Linkage is first-match-to-any-member: a record joins the first group (in
// creation order) holding any member within the threshold. Failing that it
// pairs with the earliest ungrouped record within the threshold, or stays
// ungrouped. One left-to-right pass, O(N^2) comparisons.
//
// Raising the threshold never adds blocks, but it can pull a record into an
// older group and leave its former partner ungrouped.

use crate::core::image::ImageRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityGroup {
    /// Members in discovery order.
    pub members: Vec<ImageRecord>,
}

impl SimilarityGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Only groups with two or more members have anything to remove.
    pub fn is_actionable(&self) -> bool {
        self.members.len() > 1
    }

    pub fn first(&self) -> Option<&ImageRecord> {
        self.members.first()
    }

    fn links(&self, record: &ImageRecord, threshold: u32) -> bool {
        self.members
            .iter()
            .any(|member| member.distance(record) <= threshold)
    }
}

/// A partition of the input: every record is in exactly one group or in `ungrouped`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouping {
    pub groups: Vec<SimilarityGroup>,
    pub ungrouped: Vec<ImageRecord>,
}

impl Grouping {
    pub fn grouped_count(&self) -> usize {
        self.groups.iter().map(SimilarityGroup::len).sum()
    }

    /// Groups plus singletons.
    pub fn block_count(&self) -> usize {
        self.groups.len() + self.ungrouped.len()
    }
}

pub struct DuplicateDetector {
    pub threshold: u32,
}

impl DuplicateDetector {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn group(&self, records: Vec<ImageRecord>) -> Grouping {
        let mut groups: Vec<SimilarityGroup> = Vec::new();
        // Ungrouped records in discovery order; `None` once claimed by a group.
        let mut pending: Vec<Option<ImageRecord>> = Vec::new();

        for record in records {
            if let Some(group) = groups
                .iter_mut()
                .find(|group| group.links(&record, self.threshold))
            {
                log::debug!(
                    "{} joins group starting at {}",
                    record.path.display(),
                    group.members[0].path.display()
                );
                group.members.push(record);
                continue;
            }

            let partner = pending.iter_mut().find(|slot| {
                slot.as_ref()
                    .is_some_and(|other| other.distance(&record) <= self.threshold)
            });

            match partner.and_then(Option::take) {
                Some(first) => {
                    log::debug!(
                        "New group: {} and {}",
                        first.path.display(),
                        record.path.display()
                    );
                    groups.push(SimilarityGroup {
                        members: vec![first, record],
                    });
                }
                None => pending.push(Some(record)),
            }
        }

        Grouping {
            groups,
            ungrouped: pending.into_iter().flatten().collect(),
        }
    }
}
