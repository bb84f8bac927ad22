//! Benchmarks for page tree lookups
//!
//! Run with: `cargo bench -p pagespace-core`
//!
//! A site of 10 sections with 20 pages each (and 5 subpages under every
//! page) is built once; the benchmarks then measure the hot read paths:
//! - Slug resolution of a leaf page
//! - Listing the children of a section
//! - Materializing the whole tree

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pagespace_core::{
    DefinedPageType, EngineCollaborators, EngineConfig, PageEngine, PageTypeRegistry,
};
use tempfile::TempDir;
use tokio::runtime::Runtime;

const SECTIONS: usize = 10;
const PAGES_PER_SECTION: usize = 20;
const SUBPAGES_PER_PAGE: usize = 5;

/// Open an engine on a fresh database and fill it with the benchmark site
async fn setup_site() -> (PageEngine, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::default().with_database_path(temp_dir.path().join("bench.db"));
    let page_types = PageTypeRegistry::new()
        .with(DefinedPageType::named("basic"))
        .unwrap();
    let engine = PageEngine::open(config, EngineCollaborators::new(page_types))
        .await
        .unwrap();

    let writer = engine.writer();
    let home = writer.create("basic", "Home", None).await.unwrap();
    for s in 0..SECTIONS {
        let section = writer
            .create("basic", &format!("Section {}", s), Some(home.id))
            .await
            .unwrap();
        for p in 0..PAGES_PER_SECTION {
            let page = writer
                .create("basic", &format!("Page {} {}", s, p), Some(section.id))
                .await
                .unwrap();
            for c in 0..SUBPAGES_PER_PAGE {
                writer
                    .create("basic", &format!("Sub {} {} {}", s, p, c), Some(page.id))
                    .await
                    .unwrap();
            }
        }
    }

    (engine, temp_dir)
}

fn bench_tree_queries(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (engine, _temp) = rt.block_on(setup_site());
    let loader = engine.loader().clone();

    let leaf_slug = "/section-5/page-5-10/sub-5-10-3";
    assert!(rt
        .block_on(loader.get_by_slug(leaf_slug, false))
        .unwrap()
        .is_some());

    c.bench_function("get_by_slug_leaf", |b| {
        b.iter(|| {
            rt.block_on(async {
                let page = loader.get_by_slug(black_box(leaf_slug), false).await.unwrap();
                black_box(page);
            })
        })
    });

    let section = rt
        .block_on(loader.get_by_slug("/section-5", false))
        .unwrap()
        .unwrap();
    c.bench_function("get_children_section", |b| {
        b.iter(|| {
            rt.block_on(async {
                let children = loader.get_children(Some(&section)).await.unwrap();
                black_box(children);
            })
        })
    });

    let mut group = c.benchmark_group("full_tree");
    group.sample_size(10);
    group.bench_function("get_all", |b| {
        b.iter(|| {
            rt.block_on(async {
                let pages = loader.get_all().await.unwrap();
                black_box(pages);
            })
        })
    });
    group.finish();
}

criterion_group!(benches, bench_tree_queries);
criterion_main!(benches);
