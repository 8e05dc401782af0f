//! End-to-end flow through the public API: bind a source, replay its
//! retroactive snapshot out of order, keep ingesting live notifications,
//! and check the listener-visible event stream and tree snapshots.

use async_trait::async_trait;
use roster_core::source::SourceError;
use roster_core::{
    ChangeIngester, ContactEvent, ContactEventKind, ContactListener, GroupEvent, GroupEventKind,
    GroupId, GroupListener, ListChange, RemoteBuddy, RemoteGroup, RosterConfig, RosterMirror,
    RosterSource, ScreenName, SyncPhase,
};
use std::sync::{Arc, Mutex};

/// Source double: replays a scripted snapshot during `start` and accepts
/// every forwarded request without echoing it back
struct ScriptedSource {
    snapshot: Mutex<Vec<ListChange>>,
}

impl ScriptedSource {
    fn new(snapshot: Vec<ListChange>) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(snapshot),
        })
    }
}

#[async_trait]
impl RosterSource for ScriptedSource {
    async fn start(&self, ingester: Arc<ChangeIngester>) -> Result<(), SourceError> {
        let snapshot: Vec<ListChange> = self.snapshot.lock().unwrap().drain(..).collect();
        for change in snapshot {
            ingester.apply(change).await;
        }
        Ok(())
    }

    async fn add_buddy(
        &self,
        _group: GroupId,
        _screen_name: &ScreenName,
    ) -> Result<(), SourceError> {
        Ok(())
    }

    async fn create_group(&self, _name: &str) -> Result<(), SourceError> {
        Ok(())
    }

    async fn delete_group(&self, _group: GroupId) -> Result<(), SourceError> {
        Ok(())
    }

    async fn rename_group(&self, _group: GroupId, _new_name: &str) -> Result<(), SourceError> {
        Ok(())
    }

    async fn move_buddy(
        &self,
        _screen_name: &ScreenName,
        _new_parent: GroupId,
    ) -> Result<(), SourceError> {
        Ok(())
    }

    async fn track_buddy(&self, _screen_name: &ScreenName) -> Result<(), SourceError> {
        Ok(())
    }

    async fn untrack_buddy(&self, _screen_name: &ScreenName) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Records both event streams with their sequence numbers
#[derive(Default)]
struct EventLog {
    group_events: Mutex<Vec<GroupEvent>>,
    contact_events: Mutex<Vec<ContactEvent>>,
}

impl GroupListener for EventLog {
    fn handle(&self, event: &GroupEvent) -> anyhow::Result<()> {
        self.group_events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

impl ContactListener for EventLog {
    fn handle(&self, event: &ContactEvent) -> anyhow::Result<()> {
        self.contact_events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn buddy_order(names: &[&str]) -> Vec<ScreenName> {
    names.iter().map(|n| ScreenName::new(n)).collect()
}

fn scrambled_snapshot() -> Vec<ListChange> {
    // server list: Friends [alice, bob], Work [carol] - announced with
    // Work first and Friends' buddies reversed
    vec![
        ListChange::GroupAdded {
            group: RemoteGroup {
                id: GroupId(2),
                name: "Work".to_string(),
            },
            global_order: vec![GroupId(1), GroupId(2)],
            buddies: vec![],
        },
        ListChange::BuddyAdded {
            group: GroupId(2),
            global_order: buddy_order(&["carol"]),
            buddy: RemoteBuddy::new("carol", None),
        },
        ListChange::GroupAdded {
            group: RemoteGroup {
                id: GroupId(1),
                name: "Friends".to_string(),
            },
            global_order: vec![GroupId(1), GroupId(2)],
            buddies: vec![],
        },
        ListChange::BuddyAdded {
            group: GroupId(1),
            global_order: buddy_order(&["alice", "bob"]),
            buddy: RemoteBuddy::new("bob", None),
        },
        ListChange::BuddyAdded {
            group: GroupId(1),
            global_order: buddy_order(&["alice", "bob"]),
            buddy: RemoteBuddy::new("alice", Some("Alice")),
        },
    ]
}

#[tokio::test]
async fn test_scrambled_snapshot_converges_to_server_order() {
    let mirror = RosterMirror::new(RosterConfig::default());
    let log = Arc::new(EventLog::default());
    mirror.subscribe_group_listener(log.clone());
    mirror.subscribe_contact_listener(log.clone());

    mirror
        .initialize(ScriptedSource::new(scrambled_snapshot()))
        .await
        .unwrap();
    assert_eq!(mirror.phase(), SyncPhase::Live);

    // local order matches the declared server order despite arrival order
    let snapshot = mirror.root_snapshot().await;
    let group_order: Vec<GroupId> = snapshot.iter().map(|g| g.id).collect();
    assert_eq!(group_order, vec![GroupId(1), GroupId(2)]);

    let friends: Vec<&str> = snapshot[0]
        .contacts()
        .iter()
        .map(|c| c.screen_name.as_str())
        .collect();
    assert_eq!(friends, vec!["alice", "bob"]);
    assert_eq!(snapshot[0].contacts()[0].display_name, "Alice");

    // one event per distinct change, sequence strictly increasing
    let group_events = log.group_events.lock().unwrap();
    let contact_events = log.contact_events.lock().unwrap();
    assert_eq!(group_events.len(), 2);
    assert_eq!(contact_events.len(), 3);
    let mut seqs: Vec<u64> = group_events
        .iter()
        .map(|e| e.seq)
        .chain(contact_events.iter().map(|e| e.seq))
        .collect();
    seqs.sort_unstable();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_live_changes_after_snapshot() {
    let mirror = RosterMirror::new(RosterConfig::default());
    let log = Arc::new(EventLog::default());
    mirror.subscribe_group_listener(log.clone());
    mirror.subscribe_contact_listener(log.clone());

    mirror
        .initialize(ScriptedSource::new(scrambled_snapshot()))
        .await
        .unwrap();
    let ingester = mirror.ingester();

    // spurious rename first, then a real one
    ingester
        .apply(ListChange::GroupRenamed {
            id: GroupId(1),
            new_name: "Friends".to_string(),
        })
        .await;
    ingester
        .apply(ListChange::GroupRenamed {
            id: GroupId(1),
            new_name: "Buddies".to_string(),
        })
        .await;

    let renames: Vec<(String, String)> = log
        .group_events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match &e.kind {
            GroupEventKind::Renamed {
                old_name, new_name, ..
            } => Some((old_name.clone(), new_name.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        renames,
        vec![("Friends".to_string(), "Buddies".to_string())]
    );
    assert_eq!(mirror.find_group(GroupId(1)).await.unwrap().name, "Buddies");

    // removing the group covers its contacts with a single event
    ingester.apply(ListChange::GroupRemoved { id: GroupId(1) }).await;
    assert!(mirror.find_group(GroupId(1)).await.is_none());
    assert!(mirror
        .find_contact(&ScreenName::new("alice"))
        .await
        .is_none());
    let last = log.group_events.lock().unwrap().last().cloned().unwrap();
    assert!(matches!(
        last.kind,
        GroupEventKind::Removed { ref group } if group.contact_count() == 2
    ));
}

#[tokio::test]
async fn test_duplicate_notifications_are_deduplicated() {
    let mirror = RosterMirror::new(RosterConfig::default());
    let log = Arc::new(EventLog::default());
    mirror.subscribe_contact_listener(log.clone());

    mirror
        .initialize(ScriptedSource::new(scrambled_snapshot()))
        .await
        .unwrap();
    let ingester = mirror.ingester();

    let before = log.contact_events.lock().unwrap().len();

    // the source re-announces carol ("Carol " normalizes to it) and
    // re-reports a removal for someone already gone
    ingester
        .apply(ListChange::BuddyAdded {
            group: GroupId(2),
            global_order: buddy_order(&["carol"]),
            buddy: RemoteBuddy::new("Carol ", None),
        })
        .await;
    ingester
        .apply(ListChange::BuddyRemoved {
            group: GroupId(2),
            screen_name: ScreenName::new("ghost"),
        })
        .await;

    assert_eq!(log.contact_events.lock().unwrap().len(), before);
    let (owner, _) = mirror
        .find_contact(&ScreenName::new("carol"))
        .await
        .unwrap();
    assert_eq!(owner, GroupId(2));
}

#[tokio::test]
async fn test_shortcut_confirmation_arrives_off_the_call_path() {
    let mirror = RosterMirror::new(RosterConfig::default());
    let log = Arc::new(EventLog::default());
    mirror.subscribe_contact_listener(log.clone());

    mirror
        .initialize(ScriptedSource::new(scrambled_snapshot()))
        .await
        .unwrap();

    let before = log.contact_events.lock().unwrap().len();
    mirror.request_add_contact("Alice").await.unwrap();
    // not yet delivered on the caller's path; shutdown drains the queue
    mirror.shutdown().await;

    let contact_events = log.contact_events.lock().unwrap();
    assert_eq!(contact_events.len(), before + 1);
    assert!(matches!(
        &contact_events.last().unwrap().kind,
        ContactEventKind::Created { group, contact, .. }
            if *group == GroupId(1) && contact.screen_name == ScreenName::new("alice")
    ));
}

#[tokio::test]
async fn test_reorders_flow_end_to_end() {
    let mirror = RosterMirror::new(RosterConfig::default());
    let log = Arc::new(EventLog::default());
    mirror.subscribe_group_listener(log.clone());
    mirror.subscribe_contact_listener(log.clone());

    mirror
        .initialize(ScriptedSource::new(scrambled_snapshot()))
        .await
        .unwrap();
    let ingester = mirror.ingester();

    ingester
        .apply(ListChange::GroupsReordered {
            new_order: vec![GroupId(2), GroupId(1)],
        })
        .await;
    ingester
        .apply(ListChange::BuddiesReordered {
            group: GroupId(1),
            new_order: buddy_order(&["bob", "alice"]),
        })
        .await;

    let snapshot = mirror.root_snapshot().await;
    let group_order: Vec<GroupId> = snapshot.iter().map(|g| g.id).collect();
    assert_eq!(group_order, vec![GroupId(2), GroupId(1)]);
    let friends: Vec<&str> = snapshot[1]
        .contacts()
        .iter()
        .map(|c| c.screen_name.as_str())
        .collect();
    assert_eq!(friends, vec!["bob", "alice"]);

    assert!(matches!(
        log.group_events.lock().unwrap().last().unwrap().kind,
        GroupEventKind::Reordered { ref order } if order == &[GroupId(2), GroupId(1)]
    ));
    assert!(matches!(
        log.contact_events.lock().unwrap().last().unwrap().kind,
        ContactEventKind::Reordered { group, .. } if group == GroupId(1)
    ));
}
