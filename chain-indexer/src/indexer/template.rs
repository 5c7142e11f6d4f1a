//! Brace-substitution half of the two-mechanism parameter model (spec.md
//! §4.5/§9): typed binds carry WHERE-clause literals through
//! [`crate::ports::Store`]; this module handles the purely textual
//! function-name/chain-id splices that have to land in the SQL string
//! itself before it reaches the store.
//!
//! Substitution order matters (spec.md §9's "template substitution
//! ambiguity" note): `toStartOf{Granularity}` is replaced before
//! `{granularity}` so that a template referencing both never has its
//! capitalised token partially consumed by the lowercase one.

use crate::types::primitives::Granularity;

/// Substitute the brace tokens a granular-metric template may reference.
#[must_use]
pub fn substitute_granular(sql: &str, chain_id: u32, granularity: Granularity) -> String {
    sql.replace("toStartOf{Granularity}", granularity.to_start_of_fn())
        .replace("{granularity}", granularity.as_str())
        .replace("{chain_id}", &chain_id.to_string())
}

/// Substitute the brace tokens a block-range incremental template may
/// reference (no granularity token applies).
#[must_use]
pub fn substitute_incremental(sql: &str, chain_id: u32) -> String {
    sql.replace("{chain_id}", &chain_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granular_substitution_handles_both_token_families() {
        let sql = "SELECT toStartOf{Granularity}(block_time) AS period, '{granularity}' AS g \
                    FROM raw_blocks WHERE chain_id = {chain_id}";
        let out = substitute_granular(sql, 43114, Granularity::Day);
        assert_eq!(
            out,
            "SELECT toStartOfDay(block_time) AS period, 'day' AS g \
                    FROM raw_blocks WHERE chain_id = 43114"
        );
    }

    #[test]
    fn specific_token_does_not_leak_into_generic_replacement() {
        // If the generic `{granularity}` token were substituted first, the
        // capitalised `{Granularity}` half of `toStartOf{Granularity}` would
        // survive untouched and corrupt the function name.
        let sql = "toStartOf{Granularity} / {granularity}";
        let out = substitute_granular(sql, 1, Granularity::Week);
        assert_eq!(out, "toStartOfWeek / week");
    }

    #[test]
    fn incremental_substitution_only_touches_chain_id() {
        let sql = "SELECT * FROM raw_txs WHERE chain_id = {chain_id} AND block_number > 0";
        let out = substitute_incremental(sql, 7);
        assert_eq!(out, "SELECT * FROM raw_txs WHERE chain_id = 7 AND block_number > 0");
    }
}
