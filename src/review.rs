use crate::core::decision::{Review, Reviewer};
use crate::core::duplicate::SimilarityGroup;
use crate::core::image::{format_size, image_dimensions};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{MultiSelect, Select};
use std::io;

/// Terminal reviewer: lists each group and asks which files to remove.
pub struct TerminalReviewer {
    theme: ColorfulTheme,
}

impl TerminalReviewer {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    fn choose_removals(&self, group: &SimilarityGroup) -> io::Result<Option<Vec<usize>>> {
        let paths: Vec<String> = group
            .members
            .iter()
            .map(|member| member.path.display().to_string())
            .collect();

        loop {
            let picked = MultiSelect::with_theme(&self.theme)
                .with_prompt("Select files to remove (space toggles, enter confirms)")
                .items(&paths)
                .interact_opt()
                .map_err(io::Error::other)?;

            match picked {
                None => return Ok(None),
                Some(picked) if picked.len() == paths.len() => {
                    println!("   ⚠️  At least one file has to stay.");
                }
                Some(picked) => return Ok(Some(picked)),
            }
        }
    }
}

impl Default for TerminalReviewer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    KeepOnly(usize),
    ChooseRemovals,
    KeepAll,
    Skip,
    Abort,
}

fn menu(group: &SimilarityGroup) -> Vec<(String, MenuChoice)> {
    let mut items: Vec<(String, MenuChoice)> = group
        .members
        .iter()
        .enumerate()
        .map(|(i, member)| {
            (
                format!("Keep only [{}] {}", i, member.filename()),
                MenuChoice::KeepOnly(i),
            )
        })
        .collect();
    items.push(("Choose files to remove…".to_string(), MenuChoice::ChooseRemovals));
    items.push(("Keep all".to_string(), MenuChoice::KeepAll));
    items.push(("Skip this group".to_string(), MenuChoice::Skip));
    items.push(("Abort (leave everything else untouched)".to_string(), MenuChoice::Abort));
    items
}

fn describe(group: &SimilarityGroup) -> Vec<String> {
    let Some(first) = group.first() else {
        return Vec::new();
    };
    group
        .members
        .iter()
        .enumerate()
        .map(|(i, member)| {
            let dimensions = image_dimensions(&member.path)
                .map(|(w, h)| format!("{}×{}", w, h))
                .unwrap_or_else(|| "?×?".to_string());
            format!(
                "   [{}] {}  ({}, {}, distance {})",
                i,
                member.path.display(),
                format_size(member.size_bytes),
                dimensions,
                first.distance(member)
            )
        })
        .collect()
}

fn keep_only(index: usize, len: usize) -> Review {
    Review::Remove((0..len).filter(|&i| i != index).collect())
}

impl Reviewer for TerminalReviewer {
    fn review(&mut self, group: &SimilarityGroup) -> io::Result<Review> {
        for line in describe(group) {
            println!("{}", line);
        }

        let items = menu(group);
        let labels: Vec<&str> = items.iter().map(|(label, _)| label.as_str()).collect();

        loop {
            let selection = Select::with_theme(&self.theme)
                .with_prompt("What should happen to this group?")
                .items(&labels)
                .default(0)
                .interact_opt()
                .map_err(io::Error::other)?;

            let Some(selection) = selection else {
                return Ok(Review::Skip);
            };

            return Ok(match items[selection].1 {
                MenuChoice::KeepOnly(index) => keep_only(index, group.len()),
                MenuChoice::ChooseRemovals => match self.choose_removals(group)? {
                    Some(indices) if indices.is_empty() => Review::KeepAll,
                    Some(indices) => Review::Remove(indices),
                    None => continue,
                },
                MenuChoice::KeepAll => Review::KeepAll,
                MenuChoice::Skip => Review::Skip,
                MenuChoice::Abort => Review::Abort,
            });
        }
    }
}
