//! Secret role assignment at the start of play

use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Player, Role};

/// Cosmetic labels handed to bystanders, each used at most once per game
pub const NICKNAMES: [&str; 15] = [
    "Village Headman",
    "Wise Farmer",
    "Village Fool",
    "Baker",
    "Blacksmith",
    "Night Watchman",
    "Old Herbalist",
    "Tavern Keeper",
    "Shepherd",
    "Miller",
    "Town Crier",
    "Fisherman",
    "Gravedigger",
    "Weaver",
    "Traveling Merchant",
];

/// Number of predators for a group of `players`
pub fn predator_count(players: usize) -> usize {
    match players {
        0..=6 => 1,
        7..=12 => 2,
        _ => 3,
    }
}

pub fn has_hunter(players: usize) -> bool {
    players >= 10
}

/// Full role multiset for `players` participants, in construction order
pub fn build_roles(players: usize) -> Vec<Role> {
    let mut roles = Vec::with_capacity(players);

    roles.extend(std::iter::repeat(Role::Predator).take(predator_count(players)));
    roles.push(Role::Protector);
    if has_hunter(players) {
        roles.push(Role::Hunter);
    }

    let bystanders = players.saturating_sub(roles.len());
    roles.extend(std::iter::repeat(Role::Bystander).take(bystanders));
    roles
}

/// Hands every player exactly one role.
///
/// Player order and role order are shuffled independently before being
/// zipped, so the outcome depends on neither join order nor the order in
/// which `build_roles` lists roles. Bystanders then draw nicknames from
/// `NICKNAMES` without replacement until the pool runs dry.
///
/// Callers must supply at least `shared::MIN_PLAYERS` players.
pub fn assign_roles(players: &mut [Player], rng: &mut impl Rng) {
    let mut order: Vec<usize> = (0..players.len()).collect();
    order.shuffle(rng);

    let mut roles = build_roles(players.len());
    roles.shuffle(rng);

    let mut nicknames: Vec<&str> = NICKNAMES.to_vec();
    nicknames.shuffle(rng);

    for (index, role) in order.into_iter().zip(roles) {
        let player = &mut players[index];
        player.role = Some(role);
        player.nickname = match role {
            Role::Bystander => nicknames.pop().map(str::to_string),
            _ => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::Faction;
    use std::collections::{HashMap, HashSet};

    fn make_players(count: usize) -> Vec<Player> {
        (0..count)
            .map(|i| Player::new(i as i64 + 1, format!("Player{}", i + 1)))
            .collect()
    }

    fn count_roles(players: &[Player]) -> HashMap<Role, usize> {
        let mut counts = HashMap::new();
        for player in players {
            if let Some(role) = player.role {
                *counts.entry(role).or_insert(0) += 1;
            }
        }
        counts
    }

    #[test]
    fn test_predator_tiers() {
        assert_eq!(predator_count(5), 1);
        assert_eq!(predator_count(6), 1);
        assert_eq!(predator_count(7), 2);
        assert_eq!(predator_count(12), 2);
        assert_eq!(predator_count(13), 3);
        assert_eq!(predator_count(20), 3);
    }

    #[test]
    fn test_role_counts_for_all_group_sizes() {
        let mut rng = StdRng::seed_from_u64(7);

        for n in 5..=20 {
            let mut players = make_players(n);
            assign_roles(&mut players, &mut rng);

            assert!(players.iter().all(|p| p.role.is_some()), "n = {}", n);

            let counts = count_roles(&players);
            let predators = counts.get(&Role::Predator).copied().unwrap_or(0);
            let protectors = counts.get(&Role::Protector).copied().unwrap_or(0);
            let hunters = counts.get(&Role::Hunter).copied().unwrap_or(0);
            let bystanders = counts.get(&Role::Bystander).copied().unwrap_or(0);

            assert_eq!(predators, predator_count(n), "n = {}", n);
            assert_eq!(protectors, 1, "n = {}", n);
            assert_eq!(hunters, usize::from(n >= 10), "n = {}", n);
            assert_eq!(predators + protectors + hunters + bystanders, n);

            let faction_a = players
                .iter()
                .filter(|p| p.faction() == Some(Faction::Predators))
                .count();
            assert_eq!(faction_a, predator_count(n), "n = {}", n);
        }
    }

    #[test]
    fn test_only_bystanders_get_nicknames() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut players = make_players(12);
        assign_roles(&mut players, &mut rng);

        for player in &players {
            match player.role {
                Some(Role::Bystander) => assert!(player.nickname.is_some()),
                _ => assert!(player.nickname.is_none()),
            }
        }
    }

    #[test]
    fn test_nicknames_drawn_without_replacement() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut players = make_players(20);
        assign_roles(&mut players, &mut rng);

        let nicknames: Vec<&String> = players.iter().filter_map(|p| p.nickname.as_ref()).collect();
        let unique: HashSet<&String> = nicknames.iter().copied().collect();
        assert_eq!(nicknames.len(), unique.len());
        assert!(nicknames.len() <= NICKNAMES.len());
    }

    #[test]
    fn test_assignment_varies_with_seed() {
        // Different seeds should not always put the predator on the same player
        let mut predator_seats = HashSet::new();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut players = make_players(6);
            assign_roles(&mut players, &mut rng);

            let seat = players
                .iter()
                .position(|p| p.role == Some(Role::Predator))
                .unwrap();
            predator_seats.insert(seat);
        }
        assert!(predator_seats.len() > 1);
    }
}
