use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{EventEnvelope, EventStore, FeedPosition, InMemoryEventStore, Version};

fn make_event(aggregate_id: &AggregateId, version: i64) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id.clone())
        .aggregate_type("Product")
        .event_type("InventoryAdded")
        .version(Version::new(version))
        .payload_raw(serde_json::json!({
            "type": "InventoryAdded",
            "data": { "product_id": aggregate_id.to_string(), "quantity": 1 }
        }))
        .build()
        .unwrap()
}

fn bench_append_single_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_single_event", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let id = AggregateId::generate();
                store
                    .append(&id, Version::initial(), vec![make_event(&id, 1)])
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_append_batch_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_batch_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let id = AggregateId::generate();
                let events: Vec<EventEnvelope> = (1..=10).map(|v| make_event(&id, v)).collect();
                store.append(&id, Version::initial(), events).await.unwrap();
            });
        });
    });
}

fn bench_read_stream_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let id = AggregateId::generate();
    rt.block_on(async {
        let events: Vec<EventEnvelope> = (1..=100).map(|v| make_event(&id, v)).collect();
        store.append(&id, Version::initial(), events).await.unwrap();
    });

    c.bench_function("event_store/read_stream_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.read_stream(&id).await.unwrap();
            });
        });
    });
}

fn bench_read_all_from(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(async {
        for _ in 0..100 {
            let id = AggregateId::generate();
            store
                .append(&id, Version::initial(), vec![make_event(&id, 1)])
                .await
                .unwrap();
        }
    });

    c.bench_function("event_store/read_all_from_batch_50", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.read_all_from(FeedPosition::new(25, 25), 50).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_append_single_event,
    bench_append_batch_10,
    bench_read_stream_100,
    bench_read_all_from
);
criterion_main!(benches);
