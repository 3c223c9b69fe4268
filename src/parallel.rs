use serde::{Deserialize, Serialize};

/// Controls whether row-parallel stages run sequentially or with Rayon.
///
/// Parallelism only kicks in when the crate is built with the `parallel`
/// feature and the stage touches at least `min_rows_for_parallel` rows
/// (points, vertices or belief rows).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParallelOptions {
    pub enabled: bool,
    pub min_rows_for_parallel: usize,
}

impl ParallelOptions {
    /// Construct explicit options.
    pub fn new(enabled: bool, min_rows_for_parallel: usize) -> Self {
        Self {
            enabled,
            min_rows_for_parallel: min_rows_for_parallel.max(1),
        }
    }

    /// Disable parallel execution regardless of problem size.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            min_rows_for_parallel: usize::MAX,
        }
    }

    /// Returns true when a stage over `rows` rows should use Rayon.
    #[inline]
    pub fn should_parallelize(&self, rows: usize) -> bool {
        cfg!(feature = "parallel") && self.enabled && rows >= self.min_rows_for_parallel
    }

    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows_for_parallel = min_rows.max(1);
        self
    }
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            enabled: cfg!(feature = "parallel"),
            min_rows_for_parallel: 2048,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_stages_stay_sequential() {
        let opts = ParallelOptions::new(true, 0).with_min_rows(100);
        assert_eq!(opts.min_rows_for_parallel, 100);
        assert!(!opts.should_parallelize(99));
        assert_eq!(opts.should_parallelize(100), cfg!(feature = "parallel"));
        assert!(!ParallelOptions::disabled().should_parallelize(usize::MAX));
        assert_eq!(ParallelOptions::new(true, 0).min_rows_for_parallel, 1);
    }

    #[test]
    fn json_keys_are_camel_case() {
        let opts: ParallelOptions =
            serde_json::from_str(r#"{ "enabled": false, "minRowsForParallel": 64 }"#).unwrap();
        assert_eq!(opts, ParallelOptions::new(false, 64));
        let json = serde_json::to_value(opts).unwrap();
        assert_eq!(json["minRowsForParallel"], 64);
    }
}
