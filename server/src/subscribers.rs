//! Relay-side bookkeeping of connected players
//!
//! This module tracks every terminal client talking to the relay:
//! - Which player each address speaks for
//! - Which groups a player has asked to hear announcements from
//! - When the player was last heard from, so silent clients can be dropped
//! - How many clients the relay is willing to serve at once
//!
//! The game itself never sees addresses; it only names players and groups,
//! and the relay resolves those names through the `SubscriberManager`.

use log::info;
use shared::{GroupId, PlayerId};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Clients silent for longer than this are considered gone
pub const SUBSCRIBER_TIMEOUT: Duration = Duration::from_secs(30);

/// A connected player and the groups they follow
#[derive(Debug)]
pub struct Subscriber {
    /// Player identity announced in the client's hello
    pub player_id: PlayerId,
    /// Display name used when the player joins a game
    pub name: String,
    /// Where announcements for this player are sent
    pub addr: SocketAddr,
    /// Last time any packet arrived from this player
    pub last_seen: Instant,
    /// Groups whose public announcements this player receives
    pub groups: HashSet<GroupId>,
}

impl Subscriber {
    pub fn new(player_id: PlayerId, name: String, addr: SocketAddr) -> Self {
        Self {
            player_id,
            name,
            addr,
            last_seen: Instant::now(),
            groups: HashSet::new(),
        }
    }

    /// Returns true if nothing was heard from this player within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Registry of connected players with a capacity limit
///
/// A player reconnecting from a new address replaces their old entry, so
/// one player id maps to exactly one address at any time.
pub struct SubscriberManager {
    subscribers: HashMap<PlayerId, Subscriber>,
    max_subscribers: usize,
}

impl SubscriberManager {
    pub fn new(max_subscribers: usize) -> Self {
        Self {
            subscribers: HashMap::new(),
            max_subscribers,
        }
    }

    /// Registers a player at `addr`
    ///
    /// Returns false when the relay is full. A known player is updated in
    /// place and keeps their group subscriptions; this never counts against
    /// capacity.
    pub fn add_subscriber(&mut self, player_id: PlayerId, name: &str, addr: SocketAddr) -> bool {
        if let Some(existing) = self.subscribers.get_mut(&player_id) {
            existing.addr = addr;
            existing.name = name.to_string();
            existing.last_seen = Instant::now();
            return true;
        }

        if self.subscribers.len() >= self.max_subscribers {
            return false;
        }

        info!("Player {} ({}) connected from {}", player_id, name, addr);
        self.subscribers
            .insert(player_id, Subscriber::new(player_id, name.to_string(), addr));
        true
    }

    /// Forgets a player. Returns false if they were not connected.
    pub fn remove_subscriber(&mut self, player_id: &PlayerId) -> bool {
        if let Some(subscriber) = self.subscribers.remove(player_id) {
            info!("Player {} disconnected", subscriber.player_id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&Subscriber> {
        self.subscribers.get(player_id)
    }

    /// Finds the player speaking from `addr`
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.subscribers
            .values()
            .find(|subscriber| subscriber.addr == addr)
            .map(|subscriber| subscriber.player_id)
    }

    pub fn touch(&mut self, player_id: PlayerId) {
        if let Some(subscriber) = self.subscribers.get_mut(&player_id) {
            subscriber.last_seen = Instant::now();
        }
    }

    /// Starts forwarding a group's announcements to the player
    pub fn subscribe(&mut self, player_id: PlayerId, group_id: GroupId) -> bool {
        match self.subscribers.get_mut(&player_id) {
            Some(subscriber) => {
                subscriber.groups.insert(group_id);
                true
            }
            None => false,
        }
    }

    /// Address for a private announcement
    pub fn addr_of(&self, player_id: PlayerId) -> Option<SocketAddr> {
        self.subscribers.get(&player_id).map(|s| s.addr)
    }

    /// Addresses of everyone following `group_id`
    pub fn group_addrs(&self, group_id: GroupId) -> Vec<(PlayerId, SocketAddr)> {
        self.subscribers
            .values()
            .filter(|s| s.groups.contains(&group_id))
            .map(|s| (s.player_id, s.addr))
            .collect()
    }

    /// Removes players silent for longer than `timeout` and returns their ids
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<PlayerId> {
        let timed_out: Vec<PlayerId> = self
            .subscribers
            .values()
            .filter(|s| s.is_timed_out(timeout))
            .map(|s| s.player_id)
            .collect();

        for player_id in &timed_out {
            self.remove_subscriber(player_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_subscriber_timeout() {
        let mut subscriber = Subscriber::new(1, "Ada".to_string(), test_addr());
        assert!(!subscriber.is_timed_out(Duration::from_secs(1)));

        subscriber.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(subscriber.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_subscriber_capacity() {
        let mut manager = SubscriberManager::new(1);

        assert!(manager.add_subscriber(1, "Ada", test_addr()));
        assert!(!manager.add_subscriber(2, "Bo", test_addr2()));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_reconnect_updates_address_and_keeps_groups() {
        let mut manager = SubscriberManager::new(1);
        manager.add_subscriber(1, "Ada", test_addr());
        manager.subscribe(1, -10);

        // Full relay, but a known player may always come back
        assert!(manager.add_subscriber(1, "Ada", test_addr2()));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.addr_of(1), Some(test_addr2()));
        assert_eq!(manager.group_addrs(-10), vec![(1, test_addr2())]);
    }

    #[test]
    fn test_remove_subscriber() {
        let mut manager = SubscriberManager::new(2);
        manager.add_subscriber(1, "Ada", test_addr());

        assert!(manager.remove_subscriber(&1));
        assert!(!manager.remove_subscriber(&1));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_by_addr() {
        let mut manager = SubscriberManager::new(2);
        manager.add_subscriber(1, "Ada", test_addr());
        manager.add_subscriber(2, "Bo", test_addr2());

        assert_eq!(manager.find_by_addr(test_addr2()), Some(2));
        let unknown: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_by_addr(unknown), None);
    }

    #[test]
    fn test_group_routing() {
        let mut manager = SubscriberManager::new(3);
        manager.add_subscriber(1, "Ada", test_addr());
        manager.add_subscriber(2, "Bo", test_addr2());

        assert!(manager.subscribe(1, -10));
        assert!(!manager.subscribe(99, -10));

        assert_eq!(manager.group_addrs(-10), vec![(1, test_addr())]);
        assert!(manager.group_addrs(-20).is_empty());
    }

    #[test]
    fn test_check_timeouts_removes_silent_players() {
        let mut manager = SubscriberManager::new(2);
        manager.add_subscriber(1, "Ada", test_addr());
        manager.add_subscriber(2, "Bo", test_addr2());

        manager.subscribers.get_mut(&1).unwrap().last_seen =
            Instant::now() - Duration::from_secs(60);

        let timed_out = manager.check_timeouts(SUBSCRIBER_TIMEOUT);
        assert_eq!(timed_out, vec![1]);
        assert_eq!(manager.len(), 1);
        assert!(manager.get(&2).is_some());
    }
}
