//! Candidate selection
//!
//! Reviewers are picked uniformly at random from the eligible population so
//! that review load spreads across the team. Callers must not rely on which
//! eligible users come back, only on the size and the exclusions.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::User;

/// Pick up to `count` eligible users from `population`.
///
/// A user is eligible when it is active, belongs to `team_id` and is not in
/// `exclude_ids`. The result has exactly `min(count, eligible)` distinct users.
pub fn select_candidates<R: Rng + ?Sized>(
    population: &[User],
    team_id: i64,
    exclude_ids: &[String],
    count: usize,
    rng: &mut R,
) -> Vec<User> {
    let excluded: HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    let mut eligible: Vec<&User> = population
        .iter()
        .filter(|u| u.is_active && u.team_id == Some(team_id))
        .filter(|u| !excluded.contains(u.id.as_str()))
        .filter(|u| seen.insert(u.id.as_str()))
        .collect();

    eligible.shuffle(rng);
    eligible.into_iter().take(count).cloned().collect()
}

/// Shuffle `ids` and keep the first `count`. Returns `None` when there are fewer than `count`.
pub fn draw_ids<R: Rng + ?Sized>(
    mut ids: Vec<String>,
    count: usize,
    rng: &mut R,
) -> Option<Vec<String>> {
    if ids.len() < count {
        return None;
    }
    ids.shuffle(rng);
    ids.truncate(count);
    Some(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn team(size: usize, team_id: i64) -> Vec<User> {
        (0..size)
            .map(|i| User::new(format!("u{}", i), format!("User {}", i), Some(team_id)))
            .collect()
    }

    #[test]
    fn test_selection_size_and_exclusions_hold_for_all_populations() {
        for size in 0..8 {
            for count in 0..4 {
                for seed in 0..25 {
                    let mut rng = StdRng::seed_from_u64(seed);
                    let population = team(size, 1);
                    let exclude = vec!["u0".to_string(), "u3".to_string()];
                    let eligible = population
                        .iter()
                        .filter(|u| !exclude.contains(&u.id))
                        .count();

                    let picked = select_candidates(&population, 1, &exclude, count, &mut rng);

                    assert_eq!(picked.len(), count.min(eligible));
                    assert!(picked.iter().all(|u| !exclude.contains(&u.id)));

                    let unique: HashSet<_> = picked.iter().map(|u| &u.id).collect();
                    assert_eq!(unique.len(), picked.len());
                }
            }
        }
    }

    #[test]
    fn test_skips_inactive_and_other_teams() {
        let mut population = team(3, 1);
        population[1].is_active = false;
        population.push(User::new("x1", "Outsider", Some(2)));
        population.push(User::new("x2", "Loner", None));

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = select_candidates(&population, 1, &[], 5, &mut rng);
            let ids: HashSet<_> = picked.iter().map(|u| u.id.as_str()).collect();
            assert_eq!(ids, HashSet::from(["u0", "u2"]));
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let population = team(6, 1);
        let a = select_candidates(&population, 1, &[], 2, &mut StdRng::seed_from_u64(7));
        let b = select_candidates(&population, 1, &[], 2, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_selection_reaches_every_eligible_user() {
        let population = team(4, 1);
        let mut rng = StdRng::seed_from_u64(1);
        let mut hits = HashSet::new();

        for _ in 0..200 {
            for u in select_candidates(&population, 1, &["u0".to_string()], 1, &mut rng) {
                hits.insert(u.id);
            }
        }

        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_draw_ids() {
        let mut rng = StdRng::seed_from_u64(3);
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let drawn = draw_ids(ids.clone(), 2, &mut rng).unwrap();
        assert_eq!(drawn.len(), 2);
        assert!(drawn.iter().all(|id| ids.contains(id)));
        assert_ne!(drawn[0], drawn[1]);

        assert!(draw_ids(ids, 4, &mut rng).is_none());
        assert_eq!(draw_ids(Vec::new(), 0, &mut rng), Some(Vec::new()));
    }
}
