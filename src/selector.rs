//! Fair question selection across sections
//!
//! Given the selected section keys and the asked-exclusion set, the
//! selector draws a shuffled stack per section and round-robins across
//! the stacks (in a shuffled section order) until the requested count is
//! reached or every stack runs dry. Round-robin drawing guarantees
//! approximately even coverage across sections instead of exhausting one
//! section first.

use std::collections::{HashMap, HashSet};

use crate::bank::{QuestionBank, QuestionId};

/// Selects up to `desired_count` question ids from the given sections
///
/// Questions present in `asked` are excluded. The result may be shorter
/// than `desired_count` when not enough unused questions exist; callers
/// must treat a short or empty result as "not enough questions". The
/// result never contains duplicates.
///
/// Randomness comes entirely from `rng`, so a seeded
/// [`fastrand::Rng`] makes the selection deterministic in tests.
pub fn select(
    bank: &impl QuestionBank,
    section_keys: &[String],
    desired_count: usize,
    asked: &HashSet<QuestionId>,
    rng: &mut fastrand::Rng,
) -> Vec<QuestionId> {
    let mut stacks: HashMap<&str, Vec<QuestionId>> = section_keys
        .iter()
        .map(|key| {
            let mut ids: Vec<QuestionId> = bank
                .question_ids(key)
                .into_iter()
                .filter(|id| !asked.contains(id))
                .collect();
            rng.shuffle(&mut ids);
            (key.as_str(), ids)
        })
        .collect();

    let mut order: Vec<&str> = section_keys.iter().map(String::as_str).collect();
    rng.shuffle(&mut order);

    let mut chosen = Vec::with_capacity(desired_count);
    let mut seen = HashSet::with_capacity(desired_count);

    while chosen.len() < desired_count {
        let mut progressed = false;
        for key in &order {
            if chosen.len() >= desired_count {
                break;
            }
            if let Some(id) = stacks.get_mut(key).and_then(Vec::pop) {
                // Sections cannot contain duplicate ids by construction,
                // but the id format is a cross-layer contract: dedup anyway.
                if seen.insert(id.clone()) {
                    chosen.push(id);
                }
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    chosen
}
