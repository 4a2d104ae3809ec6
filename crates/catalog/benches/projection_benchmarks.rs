use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use storefront_catalog::projection::{self, SortKey};
use storefront_catalog::{CatalogQuery, CatalogSnapshot, CatalogStore, SnapshotSource};
use storefront_core::Product;

fn catalog(n: usize) -> Vec<Product> {
    (0..n)
        .map(|i| {
            let category = ["phones", "cases", "chargers", "audio"][i % 4];
            Product::new(format!("p{i}"), format!("Product {i}"), (i % 97) as f64 * 10.0)
                .with_brand(if i % 2 == 0 { "Acme" } else { "Globex" })
                .with_category(category)
                .trending(i % 11 == 0)
        })
        .collect()
}

fn bench_listing_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing_query");
    for size in [100usize, 1_000, 10_000] {
        let products = catalog(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &products, |b, products| {
            let query = CatalogQuery::default()
                .category("phones")
                .term("acme")
                .sort(SortKey::PriceDesc)
                .page(2);
            b.iter(|| black_box(query.run(black_box(products)).items.len()));
        });
    }
    group.finish();
}

fn bench_trending(c: &mut Criterion) {
    let products = catalog(10_000);
    c.bench_function("trending_8_of_10000", |b| {
        b.iter(|| black_box(projection::trending(black_box(&products), 8).len()))
    });
}

/// The dedupe check every reload goes through when nothing changed.
fn bench_unchanged_replace(c: &mut Criterion) {
    let store = CatalogStore::new();
    store.replace(CatalogSnapshot::candidate(catalog(5_000), SnapshotSource::Remote));
    let same = catalog(5_000);

    c.bench_function("replace_unchanged_5000", |b| {
        b.iter(|| {
            let candidate = CatalogSnapshot::candidate(same.clone(), SnapshotSource::Remote);
            black_box(store.replace(candidate))
        })
    });
}

criterion_group!(benches, bench_listing_query, bench_trending, bench_unchanged_replace);
criterion_main!(benches);
