//! Performance benchmarks for a3s-device
//!
//! Run with: cargo bench

use a3s_device::phone;
use a3s_device::{
    ContactResolver, ContactRow, ContactSource, DeviceConfig, MemoryGateway, PickerResult,
    Session,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize (formatted)", |b| {
        b.iter(|| phone::normalize("+1 (555) 123-4567").unwrap());
    });

    c.bench_function("normalize (digits)", |b| {
        b.iter(|| phone::normalize("5551234567").unwrap());
    });
}

fn bench_resolver(c: &mut Criterion) {
    let config = DeviceConfig::default();
    let resolver = ContactResolver::new(config.device_fields, &config.chat_app);

    let device = PickerResult::row(ContactRow::from_pairs([
        ("display_name", "Ada Lovelace"),
        ("number", "+1 555 0100"),
    ]));
    c.bench_function("resolve device row", |b| {
        b.iter(|| resolver.resolve(ContactSource::Device, &device));
    });

    let identifier = PickerResult::row(ContactRow::from_pairs([
        ("_id", "42"),
        ("status", "Available"),
        ("wa_name", "Grace"),
        ("jid", "4915112345678@s.whatsapp.net"),
    ]));
    c.bench_function("resolve chat-app identifier row", |b| {
        b.iter(|| resolver.resolve(ContactSource::ChatApp, &identifier));
    });

    // Worst case: every matcher scans every field before falling back
    let unusable = PickerResult::row(ContactRow::from_pairs(
        (0..20).map(|i| (format!("field_{}", i), format!("value {}", i))),
    ));
    c.bench_function("resolve chat-app fallback row", |b| {
        b.iter(|| resolver.resolve(ContactSource::ChatApp, &unusable));
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("dispatch + settle (dialer)", |b| {
        b.to_async(&rt).iter(|| async {
            let session = Session::new(Arc::new(MemoryGateway::new()), DeviceConfig::default());
            session.call(
                "Device.OpenDialer",
                serde_json::json!({"phone": "+1 (555) 123-4567"}),
            );
            session.settle().await;
        });
    });

    let mut group = c.benchmark_group("dispatch_throughput");
    for count in [10, 100] {
        group.bench_function(format!("{} whatsapp requests", count), |b| {
            b.to_async(&rt).iter(|| async {
                let session = Session::new(
                    Arc::new(MemoryGateway::new().with_chat_app("whatsapp")),
                    DeviceConfig::default(),
                );
                for i in 0..count {
                    session.call(
                        "Device.OpenWhatsApp",
                        serde_json::json!({"phone": format!("+1555000{:04}", i), "message": "hi"}),
                    );
                }
                session.settle().await;
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_normalize, bench_resolver, bench_dispatch);
criterion_main!(benches);
