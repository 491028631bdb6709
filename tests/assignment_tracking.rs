use proptest::prelude::*;
use rustmq_seek::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const WORKERS: usize = 3;
const PARTITIONS: u32 = 6;

#[derive(Debug, Clone)]
enum Event {
    Assign(usize, Vec<u32>),
    Revoke(usize, Vec<u32>),
}

fn event() -> impl Strategy<Value = Event> {
    let partitions = prop::collection::vec(0..PARTITIONS, 0..4);
    prop_oneof![
        (0..WORKERS, partitions.clone()).prop_map(|(w, p)| Event::Assign(w, p)),
        (0..WORKERS, partitions).prop_map(|(w, p)| Event::Revoke(w, p)),
    ]
}

fn tp(partition: u32) -> TopicPartition {
    TopicPartition::new("orders", partition)
}

async fn run(events: Vec<Event>) -> std::result::Result<(), TestCaseError> {
    let mut config = ContainerConfig::new("orders-group");
    config.client_id = Some("orders".to_string());
    config.concurrency = WORKERS;
    let container = ListenerContainer::builder()
        .config(config)
        .listener(Arc::new(NoopSeekAware))
        .build()
        .unwrap();
    let mut workers = container.create_workers(|_| MemoryBroker::new());
    for worker in workers.iter_mut() {
        worker.start();
    }

    // partition -> owning worker index
    let mut model: BTreeMap<u32, usize> = BTreeMap::new();

    for event in events {
        match event {
            Event::Assign(w, partitions) => {
                let mut fresh = HashMap::new();
                for p in partitions {
                    match model.get(&p) {
                        Some(&owner) if owner == w => {}
                        Some(&owner) => {
                            workers[owner].partitions_revoked(&[tp(p)]).await.unwrap();
                            model.insert(p, w);
                            fresh.insert(tp(p), 0);
                        }
                        None => {
                            model.insert(p, w);
                            fresh.insert(tp(p), 0);
                        }
                    }
                }
                workers[w].partitions_assigned(fresh).await.unwrap();
            }
            Event::Revoke(w, partitions) => {
                let revoked: Vec<_> = partitions
                    .into_iter()
                    .filter(|p| model.get(p) == Some(&w))
                    .collect();
                for p in &revoked {
                    model.remove(p);
                }
                let revoked: Vec<_> = revoked.into_iter().map(tp).collect();
                workers[w].partitions_revoked(&revoked).await.unwrap();
            }
        }

        let tracker = container.tracker();
        let expected: Vec<_> = model.keys().map(|p| tp(*p)).collect();
        prop_assert_eq!(tracker.assigned_partitions(), expected);

        for (p, owner) in &model {
            let handle = tracker.handle_for(&tp(*p)).unwrap();
            prop_assert_eq!(handle.worker(), workers[*owner].id());
            prop_assert!(handle.is_valid_for(&tp(*p)));
            prop_assert!(workers[*owner].owns(&tp(*p)));
        }
        for (index, worker) in workers.iter().enumerate() {
            let owned: Vec<_> = model
                .iter()
                .filter(|(_, owner)| **owner == index)
                .map(|(p, _)| tp(*p))
                .collect();
            prop_assert_eq!(worker.assigned_partitions(), owned.clone());
            prop_assert_eq!(tracker.partitions_for(worker.id()), owned);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn tracker_matches_current_assignment(events in prop::collection::vec(event(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        runtime.block_on(run(events))?;
    }
}
