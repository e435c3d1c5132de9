// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic redisvl usage example.
//!
//! Demonstrates:
//! 1. Declaring an index schema from a JSON source
//! 2. Rendering the FT.CREATE payload
//! 3. Loading and fetching documents
//! 4. Compiling and running filter, vector, range and count queries
//! 5. Displaying metrics
//!
//! Runs against an in-memory transport by default. Set `REDIS_URL` to a
//! Redis Stack instance to run the same flow against a real server:
//! ```bash
//! docker run -d -p 6379:6379 redis/redis-stack-server
//! REDIS_URL=redis://localhost:6379 cargo run --example basic_usage
//! ```

use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;

use redisvl::schema::IndexSchema;
use redisvl::search::{FilterExpression, GeoUnit, SearchQuery};
use redisvl::transport::MemoryTransport;
use redisvl::{SearchConfig, SearchIndex};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║              redisvl: Basic Usage Example                     ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Declare the schema
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Loading schema...");
    let schema = IndexSchema::from_json_value(json!({
        "index": {"name": "user_index", "prefix": "user", "storage_type": "hash"},
        "fields": {
            "tag": [{"name": "user"}, {"name": "credit_score"}],
            "text": [{"name": "job"}],
            "numeric": [{"name": "age", "sortable": true}],
            "geo": [{"name": "location"}],
            "vector": [{
                "name": "user_embedding",
                "dims": 3,
                "algorithm": "hnsw",
                "distance_metric": "cosine",
                "datatype": "float32"
            }]
        }
    }))?;
    println!("   └─ {} fields, keys look like {}", schema.fields().len(), schema.key("42"));

    // ─────────────────────────────────────────────────────────────────────────
    // 2. FT.CREATE payload
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🏗️  FT.CREATE payload:");
    println!("   └─ FT.CREATE {}", schema.to_index_definition().to_ft_create_args().join(" "));

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Bind to a transport and load documents
    // ─────────────────────────────────────────────────────────────────────────
    let config = SearchConfig {
        redis_url: std::env::var("REDIS_URL").ok(),
        ..Default::default()
    };
    let index = if config.redis_url.is_some() {
        println!("\n🚀 Connecting to Redis...");
        SearchIndex::connect(schema, config).await?
    } else {
        println!("\n🚀 Using in-memory transport (set REDIS_URL for a real server)");
        SearchIndex::new(schema, Arc::new(MemoryTransport::new()), config)
    };
    index.create(true, true).await?;

    let users: Vec<redisvl::Record> = serde_json::from_value(json!([
        {"id": "1", "user": "john", "age": 18, "job": "engineer", "credit_score": "high",
         "location": "-122.4194,37.7749", "user_embedding": [0.1, 0.1, 0.5]},
        {"id": "2", "user": "Sam", "age": 42, "job": "dentist", "credit_score": "low",
         "location": "-122.4194,37.7749", "user_embedding": [0.9, 0.9, 0.1]}
    ]))?;
    let keys = index.load(users, "id").await?;
    println!("   ├─ Loaded {}", keys.join(", "));
    if let Some(row) = index.fetch("2").await? {
        println!("   └─ {} -> job={:?}", row.id, row.get_str("job"));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Compile and run queries
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Queries:");

    let sam_over_ten = FilterExpression::tag_equals("user", "Sam")?
        .and(FilterExpression::numeric_greater_than("age", 10.0)?);

    let knn = index
        .vector_query("user_embedding", &[0.1, 0.1, 0.5], 3)?
        .with_filter(sam_over_ten.clone())
        .return_fields(["user", "age"]);
    show("knn", &knn, &index);
    index.search(&knn).await?;

    let range = index
        .range_query("user_embedding", &[0.1, 0.1, 0.5], 0.2)?
        .with_filter(sam_over_ten);
    show("range", &range, &index);
    index.search(&range).await?;

    let nearby = FilterExpression::geo_radius("location", -122.4194, 37.7749, 25.0, GeoUnit::Km)?
        .and(FilterExpression::text_fuzzy("job", "engin")?)
        .and(FilterExpression::tag_not_equals("credit_score", "low")?);
    let filter = index.filter_query(nearby.clone()).sort_by("age", false);
    show("filter", &filter, &index);
    index.search(&filter).await?;

    let count = index.count(nearby).await?;
    println!("   └─ count: {} documents", count);

    // Compile errors never reach the server
    let bad = index.filter_query(FilterExpression::text_match("age", "forty")?);
    if let Err(e) = index.search(&bad).await {
        println!("   └─ rejected: {}", e);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    println!("\n🧹 Dropping index...");
    index.delete(true).await?;

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                        Done!                                  ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

fn show(label: &str, query: &dyn SearchQuery, index: &SearchIndex) {
    match query.compile(index.schema()) {
        Ok(compiled) => {
            println!("   ┌─ {}", label);
            println!("   │  FT.SEARCH {} \"{}\"", index.name(), compiled.command());
            for (name, value) in compiled.params() {
                println!("   │  PARAMS {} = {} bytes", name, value.len());
            }
        }
        Err(e) => println!("   ┌─ {} failed: {}", label, e),
    }
}

/// Dump all captured metrics
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut counters = Vec::new();
    let mut histograms = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let name = if labels.is_empty() {
            key.name().to_string()
        } else {
            format!("{}{{{}}}", key.name(), labels.join(","))
        };

        match value {
            DebugValue::Counter(v) => counters.push((name, v)),
            DebugValue::Gauge(_) => {}
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                histograms.push((name, count, sum));
            }
        }
    }

    counters.sort();
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    if !counters.is_empty() {
        println!("   ┌─ Counters");
        for (name, value) in &counters {
            println!("   │  └─ {} = {}", name, value);
        }
    }
    if !histograms.is_empty() {
        println!("   └─ Histograms");
        for (name, count, sum) in &histograms {
            let avg = if *count > 0 { sum / *count as f64 } else { 0.0 };
            println!("      └─ {} count={} avg={:.6}s", name, count, avg);
        }
    }
    if counters.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
