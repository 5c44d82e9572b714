//! Quiz model and the predecessor-chain helpers.
//!
//! Quizzes within a deck are ordered by a singly linked `previous` reference
//! instead of a sequence index: `previous == 0` means "no predecessor". The
//! repository validates the chain at write time; presentation code walks it
//! with [`order_chain`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A single quiz item belonging to a deck.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub deck_id: i64,
    pub subject: String,
    /// Id of the predecessor quiz in the same deck, 0 for none.
    pub previous: i64,
    pub created_at: String,
}

/// Check the chain invariants over the live quizzes of one deck:
/// every non-zero `previous` references a quiz in the set, no two quizzes
/// claim the same non-zero `previous`, and every walk terminates at a root
/// within the deck's quiz count.
pub fn validate_chain(quizzes: &[Quiz]) -> Result<(), AppError> {
    let ids: HashSet<i64> = quizzes.iter().map(|q| q.id).collect();
    let mut claimed = HashSet::new();

    for quiz in quizzes {
        if quiz.previous == 0 {
            continue;
        }
        if !ids.contains(&quiz.previous) {
            return Err(AppError::Validation(format!(
                "quiz {} references missing predecessor {}",
                quiz.id, quiz.previous
            )));
        }
        if !claimed.insert(quiz.previous) {
            return Err(AppError::Validation(format!(
                "quiz chain forks at predecessor {}",
                quiz.previous
            )));
        }
    }

    let by_id: HashMap<i64, &Quiz> = quizzes.iter().map(|q| (q.id, q)).collect();
    for quiz in quizzes {
        let mut current = quiz;
        let mut steps = 0;
        while current.previous != 0 {
            steps += 1;
            if steps > quizzes.len() {
                return Err(AppError::Validation(format!(
                    "quiz chain cycle detected at quiz {}",
                    quiz.id
                )));
            }
            current = by_id[&current.previous];
        }
    }

    Ok(())
}

/// Order quizzes by walking successor links from each root (`previous == 0`).
/// Storage order breaks ties between parallel chains; quizzes left unreached
/// by any walk keep their storage position at the end.
pub fn order_chain(quizzes: &[Quiz]) -> Vec<Quiz> {
    let successors: HashMap<i64, &Quiz> = quizzes
        .iter()
        .filter(|q| q.previous != 0)
        .map(|q| (q.previous, q))
        .collect();

    let mut ordered = Vec::with_capacity(quizzes.len());
    let mut seen = HashSet::new();

    for root in quizzes.iter().filter(|q| q.previous == 0) {
        let mut current = root;
        loop {
            if !seen.insert(current.id) {
                break;
            }
            ordered.push(current.clone());
            match successors.get(&current.id) {
                Some(next) => current = next,
                None => break,
            }
        }
    }

    for quiz in quizzes {
        if seen.insert(quiz.id) {
            ordered.push(quiz.clone());
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(id: i64, previous: i64) -> Quiz {
        Quiz {
            id,
            deck_id: 1,
            subject: format!("q{}", id),
            previous,
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_linear_chain() {
        let quizzes = vec![quiz(1, 0), quiz(2, 1), quiz(3, 2)];
        assert!(validate_chain(&quizzes).is_ok());
    }

    #[test]
    fn test_validate_rejects_fork() {
        let quizzes = vec![quiz(1, 0), quiz(2, 1), quiz(3, 1)];
        assert!(validate_chain(&quizzes).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_predecessor() {
        let quizzes = vec![quiz(1, 0), quiz(2, 9)];
        assert!(validate_chain(&quizzes).is_err());
    }

    #[test]
    fn test_order_follows_links_not_storage() {
        let quizzes = vec![quiz(3, 2), quiz(1, 0), quiz(2, 1)];
        let ordered = order_chain(&quizzes);
        let ids: Vec<i64> = ordered.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_order_keeps_parallel_chains() {
        let quizzes = vec![quiz(1, 0), quiz(4, 0), quiz(2, 1)];
        let ordered = order_chain(&quizzes);
        let ids: Vec<i64> = ordered.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }
}
