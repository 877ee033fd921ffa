//! Stats merging and CSV rendering.
//!
//! The final tables combine two sources per symphony: the platform's own
//! stats block and locally computed metrics. Merging is per key with the
//! computed metrics winning on collision. CSV rendering is deterministic:
//! rows sorted by symphony id, metric columns sorted by name.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracing::warn;

use symlab_core::extract::SymphonyRecord;

/// One symphony's named stats, JSON-valued so platform and computed entries
/// share a representation.
pub type MetricMap = BTreeMap<String, Value>;

/// Merge two metric maps; `overlay` wins on key collision.
pub fn merge_metric_maps(base: &MetricMap, overlay: &MetricMap) -> MetricMap {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Merge two per-symphony stats maps.
///
/// The result covers the union of ids; where both sides carry an id, the
/// inner maps are merged with `overlay` winning per key.
pub fn merge_stats_by_id(
    base: &HashMap<String, MetricMap>,
    overlay: &HashMap<String, MetricMap>,
) -> HashMap<String, MetricMap> {
    let mut merged = base.clone();
    for (id, overlay_map) in overlay {
        match merged.get_mut(id) {
            Some(existing) => *existing = merge_metric_maps(existing, overlay_map),
            None => {
                merged.insert(id.clone(), overlay_map.clone());
            }
        }
    }
    merged
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Arrays and objects pass through as JSON text.
        other => other.to_string(),
    }
}

/// Render a per-symphony stats table as CSV.
///
/// Columns are `sid`, `name`, then the sorted union of every metric key seen
/// across all symphonies; a symphony missing a key gets an empty cell. Named
/// symphonies with no stats entry are logged and skipped.
pub fn stats_csv(
    names: &HashMap<String, String>,
    stats: &HashMap<String, MetricMap>,
) -> anyhow::Result<String> {
    // BTreeSet gives the sorted union of metric keys.
    let columns: Vec<&String> = stats
        .values()
        .flat_map(|m| m.keys())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["sid".to_string(), "name".to_string()];
    header.extend(columns.iter().map(|c| c.to_string()));
    writer.write_record(&header)?;

    let mut ids: Vec<&String> = names.keys().collect();
    ids.sort();
    for id in ids {
        let Some(map) = stats.get(id) else {
            warn!(%id, "symphony has no stats row, skipping");
            continue;
        };
        let mut row = vec![id.clone(), names[id].clone()];
        row.extend(
            columns
                .iter()
                .map(|c| map.get(*c).map(render_cell).unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().context("flushing CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Render the discovered symphony catalog as CSV, sorted by id.
pub fn symphonies_csv(records: &BTreeMap<String, SymphonyRecord>) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["symphony_sid", "title", "url", "timestamp", "name"])?;
    for record in records.values() {
        writer.write_record([
            &record.id,
            &record.title,
            &record.url,
            &record.timestamp,
            &record.author,
        ])?;
    }
    let bytes = writer.into_inner().context("flushing CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Write rendered CSV to disk, creating parent directories as needed.
pub fn write_csv(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(entries: &[(&str, Value)]) -> MetricMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn overlay_wins_per_key() {
        let base = map(&[("sharpe", json!(1.0)), ("benchmark", json!("SPY"))]);
        let overlay = map(&[("sharpe", json!(2.0)), ("cagr", json!(0.1))]);

        let merged = merge_metric_maps(&base, &overlay);
        assert_eq!(merged["sharpe"], json!(2.0));
        assert_eq!(merged["benchmark"], json!("SPY"));
        assert_eq!(merged["cagr"], json!(0.1));
    }

    #[test]
    fn merge_by_id_covers_the_union() {
        let base = HashMap::from([
            ("a".to_string(), map(&[("x", json!(1))])),
            ("b".to_string(), map(&[("x", json!(2))])),
        ]);
        let overlay = HashMap::from([
            ("b".to_string(), map(&[("x", json!(20)), ("y", json!(21))])),
            ("c".to_string(), map(&[("x", json!(3))])),
        ]);

        let merged = merge_stats_by_id(&base, &overlay);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged["a"]["x"], json!(1));
        assert_eq!(merged["b"]["x"], json!(20));
        assert_eq!(merged["b"]["y"], json!(21));
        assert_eq!(merged["c"]["x"], json!(3));
    }

    #[test]
    fn stats_csv_union_columns_and_empty_cells() {
        let names = HashMap::from([
            ("a".to_string(), "Alpha".to_string()),
            ("b".to_string(), "Beta".to_string()),
        ]);
        let stats = HashMap::from([
            ("a".to_string(), map(&[("sharpe", json!(1.5))])),
            ("b".to_string(), map(&[("cagr", json!(0.2))])),
        ]);

        let csv = stats_csv(&names, &stats).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "sid,name,cagr,sharpe");
        assert_eq!(lines[1], "a,Alpha,,1.5");
        assert_eq!(lines[2], "b,Beta,0.2,");
    }

    #[test]
    fn stats_csv_skips_ids_without_stats() {
        let names = HashMap::from([
            ("a".to_string(), "Alpha".to_string()),
            ("missing".to_string(), "Gone".to_string()),
        ]);
        let stats = HashMap::from([("a".to_string(), map(&[("sharpe", json!(1.0))]))]);

        let csv = stats_csv(&names, &stats).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(!csv.contains("Gone"));
    }

    #[test]
    fn stats_csv_renders_null_as_empty_and_nested_as_json() {
        let names = HashMap::from([("a".to_string(), "Alpha".to_string())]);
        let stats = HashMap::from([(
            "a".to_string(),
            map(&[("bad", Value::Null), ("nested", json!({ "k": 1 }))]),
        )]);

        let csv = stats_csv(&names, &stats).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], r#"a,Alpha,,"{""k"":1}""#);
    }

    #[test]
    fn symphonies_csv_rows_sorted_by_id() {
        let mut records = BTreeMap::new();
        for (id, title) in [("b", "Second"), ("a", "First")] {
            records.insert(
                id.to_string(),
                SymphonyRecord {
                    id: id.to_string(),
                    title: title.to_string(),
                    url: format!("https://app.composer.trade/symphony/{id}"),
                    timestamp: "2024-06-01T00:00:00Z".to_string(),
                    author: "alice".to_string(),
                },
            );
        }

        let csv = symphonies_csv(&records).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "symphony_sid,title,url,timestamp,name");
        assert!(lines[1].starts_with("a,First,"));
        assert!(lines[2].starts_with("b,Second,"));
    }

    #[test]
    fn write_csv_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        write_csv(&path, "a,b\n1,2\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
    }
}
