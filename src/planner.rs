//! Job planner: decide which months still need work.
//!
//! work = (downloaded − processed) ∪ (requested − processed)
//!
//! An output file is the only completion marker, so re-planning after a successful run
//! over the same range yields nothing, and a stray archive left by an interrupted run is
//! always finished even when it falls outside the requested years.

use crate::config::SentimentOptions;
use crate::date::{months_of_years, YearMonth};
use crate::paths::{discover_all, Discovered};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Everything one unit of work needs to run independently of the others.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkUnit {
    pub ym: YearMonth,
    pub url: String,
    pub archive_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Clone, Debug, Default)]
pub struct WorkPlan {
    /// Sorted ascending by month.
    pub units: Vec<WorkUnit>,
    /// Requested months skipped because their output already exists.
    pub omitted: BTreeSet<YearMonth>,
    /// Months with a downloaded archive but no output (picked up regardless of range).
    pub resumed: BTreeSet<YearMonth>,
}

/// The set algebra on its own, free of the filesystem.
pub fn select_units(
    downloaded: &BTreeSet<YearMonth>,
    processed: &BTreeSet<YearMonth>,
    requested: &BTreeSet<YearMonth>,
) -> BTreeSet<YearMonth> {
    let unfinished = downloaded.difference(processed);
    let todo = requested.difference(processed);
    unfinished.chain(todo).copied().collect()
}

/// Scan the archive and output directories and plan `start_year..=end_year`.
pub fn plan(opts: &SentimentOptions) -> WorkPlan {
    let discovered = discover_all(&opts.archive_dir, &opts.output_dir, &opts.naming);
    plan_from(opts, &discovered)
}

pub fn plan_from(opts: &SentimentOptions, discovered: &Discovered) -> WorkPlan {
    let downloaded: BTreeSet<YearMonth> = discovered.archives.keys().copied().collect();
    let processed: BTreeSet<YearMonth> = discovered.outputs.keys().copied().collect();
    let requested: BTreeSet<YearMonth> = months_of_years(opts.start_year, opts.end_year).collect();

    let selected = select_units(&downloaded, &processed, &requested);
    let units = selected
        .iter()
        .map(|&ym| WorkUnit {
            ym,
            url: opts.naming.archive_url(&opts.base_url, ym),
            archive_path: discovered
                .archives
                .get(&ym)
                .cloned()
                .unwrap_or_else(|| opts.archive_dir.join(opts.naming.archive_name(ym))),
            output_path: opts.output_dir.join(opts.naming.output_name(ym)),
        })
        .collect();

    WorkPlan {
        units,
        omitted: requested.intersection(&processed).copied().collect(),
        resumed: downloaded.difference(&processed).filter(|ym| !requested.contains(ym)).copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(y: u16, m: u8) -> YearMonth {
        YearMonth::new(y, m)
    }

    fn set(v: &[YearMonth]) -> BTreeSet<YearMonth> {
        v.iter().copied().collect()
    }

    #[test]
    fn union_of_unfinished_and_requested_minus_processed() {
        let downloaded = set(&[ym(2004, 12), ym(2005, 1), ym(2005, 2)]);
        let processed = set(&[ym(2005, 2), ym(2005, 3)]);
        let requested = set(&[ym(2005, 1), ym(2005, 2), ym(2005, 3), ym(2005, 4)]);

        let got = select_units(&downloaded, &processed, &requested);
        // 2004-12: downloaded, outside range, unfinished → included
        // 2005-01: downloaded and requested → once
        // 2005-02: downloaded but processed → skipped
        // 2005-03: processed → skipped
        // 2005-04: requested only → included
        assert_eq!(got, set(&[ym(2004, 12), ym(2005, 1), ym(2005, 4)]));
    }

    #[test]
    fn nothing_left_once_everything_is_processed() {
        let requested: BTreeSet<_> = months_of_years(2005, 2006).collect();
        let downloaded = requested.clone();
        let processed = requested.clone();
        assert!(select_units(&downloaded, &processed, &requested).is_empty());
    }

    #[test]
    fn units_carry_their_paths_and_url() {
        let opts = SentimentOptions::default()
            .with_archive_dir("/data/archives")
            .with_output_dir("/data/out")
            .with_base_url("http://mirror.local/comments/")
            .with_years(2006, 2006);
        let mut d = Discovered::default();
        d.archives.insert(ym(2006, 2), PathBuf::from("/data/archives/old/RC_2006-02.zst"));
        d.outputs.insert(ym(2006, 3), PathBuf::from("/data/out/RC_2006-03.tsv"));

        let plan = plan_from(&opts, &d);
        assert_eq!(plan.units.len(), 11);
        assert_eq!(plan.omitted, set(&[ym(2006, 3)]));
        assert!(plan.resumed.is_empty());

        let jan = &plan.units[0];
        assert_eq!(jan.ym, ym(2006, 1));
        assert_eq!(jan.url, "http://mirror.local/comments/RC_2006-01.zst");
        assert_eq!(jan.archive_path, PathBuf::from("/data/archives/RC_2006-01.zst"));
        assert_eq!(jan.output_path, PathBuf::from("/data/out/RC_2006-01.tsv"));

        let feb = &plan.units[1];
        assert_eq!(feb.archive_path, PathBuf::from("/data/archives/old/RC_2006-02.zst"));
    }
}
