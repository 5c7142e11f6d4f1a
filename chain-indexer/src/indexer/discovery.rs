//! Filesystem discovery of SQL-defined indexers (spec.md §6: "Filesystem
//! layout for indexers").
//!
//! Layout: `sql/<variant>/<subdir>/<indexer>.sql` where `<variant>` is
//! `{vm}_metrics` or `{vm}_incremental`, and `<subdir>` is `batched` or
//! `immediate` for incrementals. `<vm>` is `evm` or `pchain`, matching the
//! chain's configured [`Vm`](crate::types::primitives::Vm).

use std::fs;
use std::path::Path;

use crate::error::{DomainError, Result};
use crate::types::primitives::Vm;

/// One discovered granular-metric SQL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranularMetricDef {
    /// Indexer name (file stem), used as the watermark key and in `metrics.metric_name`.
    pub name: String,
    /// Raw SQL template, brace tokens not yet substituted.
    pub sql_template: String,
}

/// One discovered block-range incremental SQL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalDef {
    /// Indexer name (file stem), used as the watermark key.
    pub name: String,
    /// Raw SQL template, brace tokens not yet substituted.
    pub sql_template: String,
}

/// Every indexer discovered for one virtual machine dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredIndexers {
    /// Granular metric definitions, instantiated by the runner across all
    /// four granularities.
    pub granular_metrics: Vec<GranularMetricDef>,
    /// Batched (≤ once per 5 minutes) block-range incrementals.
    pub batched_incrementals: Vec<IncrementalDef>,
    /// Immediate (0.9s floor) block-range incrementals.
    pub immediate_incrementals: Vec<IncrementalDef>,
}

/// Walk `sql_root` for every SQL file belonging to `vm`'s dialect.
///
/// # Errors
///
/// Returns [`DomainError::UnrecognisedIndexerLayout`] if a subdirectory under
/// `{vm}_incremental` is neither `batched` nor `immediate`. Missing
/// directories are treated as "no indexers of that class", not an error —
/// a chain may have only metrics, or only incrementals, or neither.
pub fn discover(sql_root: &Path, vm: Vm) -> Result<DiscoveredIndexers> {
    let prefix = match vm {
        Vm::Evm => "evm",
        Vm::PChain => "pchain",
    };

    let mut out = DiscoveredIndexers::default();

    let metrics_dir = sql_root.join(format!("{prefix}_metrics"));
    if metrics_dir.is_dir() {
        for (name, sql_template) in read_sql_files(&metrics_dir)? {
            out.granular_metrics.push(GranularMetricDef { name, sql_template });
        }
    }

    let incremental_dir = sql_root.join(format!("{prefix}_incremental"));
    if incremental_dir.is_dir() {
        for entry in fs::read_dir(&incremental_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let subdir_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
            match subdir_name.as_str() {
                "batched" => {
                    for (name, sql_template) in read_sql_files(&path)? {
                        out.batched_incrementals.push(IncrementalDef { name, sql_template });
                    }
                }
                "immediate" => {
                    for (name, sql_template) in read_sql_files(&path)? {
                        out.immediate_incrementals.push(IncrementalDef { name, sql_template });
                    }
                }
                other => {
                    return Err(DomainError::UnrecognisedIndexerLayout(format!(
                        "{prefix}_incremental/{other}"
                    ))
                    .into());
                }
            }
        }
    }

    Ok(out)
}

fn read_sql_files(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let name = path.file_stem().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        let sql_template = fs::read_to_string(&path)?;
        files.push((name, sql_template));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).expect("write fixture file");
    }

    #[test]
    fn discovers_metrics_and_incrementals() {
        let tmp = tempdir();
        let metrics = tmp.join("evm_metrics");
        fs::create_dir_all(&metrics).unwrap();
        write(&metrics, "tx_count.sql", "SELECT 1");

        let batched = tmp.join("evm_incremental").join("batched");
        fs::create_dir_all(&batched).unwrap();
        write(&batched, "address_on_chain.sql", "SELECT 2");

        let immediate = tmp.join("evm_incremental").join("immediate");
        fs::create_dir_all(&immediate).unwrap();
        write(&immediate, "running_balance.sql", "SELECT 3");

        let discovered = discover(&tmp, Vm::Evm).expect("discovery succeeds");
        assert_eq!(discovered.granular_metrics.len(), 1);
        assert_eq!(discovered.granular_metrics[0].name, "tx_count");
        assert_eq!(discovered.batched_incrementals.len(), 1);
        assert_eq!(discovered.immediate_incrementals.len(), 1);

        fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn rejects_unrecognised_subdirectory() {
        let tmp = tempdir();
        let bogus = tmp.join("evm_incremental").join("weekly");
        fs::create_dir_all(&bogus).unwrap();

        let err = discover(&tmp, Vm::Evm).expect_err("should reject unknown subdir");
        assert!(matches!(err, crate::error::AppError::Domain(DomainError::UnrecognisedIndexerLayout(_))));

        fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn missing_directories_yield_empty_population() {
        let tmp = tempdir();
        fs::create_dir_all(&tmp).unwrap();
        let discovered = discover(&tmp, Vm::PChain).expect("discovery succeeds");
        assert_eq!(discovered, DiscoveredIndexers::default());
        fs::remove_dir_all(&tmp).ok();
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "chain-indexer-discovery-test-{}-{}",
            std::process::id(),
            tempdir_counter()
        ));
        dir
    }

    fn tempdir_counter() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::SeqCst)
    }
}
