//! Archive/output naming templates and discovery of what already sits on disk.

use crate::date::YearMonth;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Fixed naming template shared by archives and their outputs:
/// `{prefix}_{YYYY}-{MM}.{ext}` for the archive, `{prefix}_{YYYY}-{MM}.tsv` for the output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveNaming {
    pub prefix: String, // "RC" for comments
    pub ext: String,    // "zst"
}

impl Default for ArchiveNaming {
    fn default() -> Self {
        Self { prefix: "RC".into(), ext: "zst".into() }
    }
}

pub const OUTPUT_EXT: &str = "tsv";

impl ArchiveNaming {
    /// `RC_2006-01`
    pub fn stem(&self, ym: YearMonth) -> String {
        format!("{}_{}", self.prefix, ym)
    }

    /// `RC_2006-01.zst`
    pub fn archive_name(&self, ym: YearMonth) -> String {
        format!("{}.{}", self.stem(ym), self.ext)
    }

    /// `RC_2006-01.tsv`
    pub fn output_name(&self, ym: YearMonth) -> String {
        format!("{}.{}", self.stem(ym), OUTPUT_EXT)
    }

    /// Remote location of a month's archive under `base_url`.
    pub fn archive_url(&self, base_url: &str, ym: YearMonth) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.archive_name(ym))
    }

    fn regex_for(&self, ext: &str) -> Regex {
        let pat = format!(r"^{}_(\d{{4}})-(\d{{2}})\.{}$", regex::escape(&self.prefix), regex::escape(ext));
        Regex::new(&pat).expect("escaped naming template is a valid regex")
    }

    /// Reverse of `archive_name`/`output_name` for an arbitrary file name.
    fn parse_with(re: &Regex, name: &str) -> Option<YearMonth> {
        let caps = re.captures(name)?;
        let year: u16 = caps[1].parse().ok()?;
        let month: u8 = caps[2].parse().ok()?;
        YearMonth::try_new(year, month)
    }
}

/// Months found on disk, with the path where each was found.
#[derive(Clone, Debug, Default)]
pub struct Discovered {
    pub archives: BTreeMap<YearMonth, PathBuf>,
    pub outputs: BTreeMap<YearMonth, PathBuf>,
}

fn discover_month_map(dir: &Path, re: &Regex) -> BTreeMap<YearMonth, PathBuf> {
    let mut map = BTreeMap::new();
    if !dir.exists() {
        return map;
    }
    for ent in WalkDir::new(dir).min_depth(1).into_iter().flatten() {
        if !ent.file_type().is_file() {
            continue;
        }
        if let Some(name) = ent.file_name().to_str() {
            if let Some(ym) = ArchiveNaming::parse_with(re, name) {
                map.entry(ym).or_insert_with(|| ent.path().to_path_buf());
            }
        }
    }
    map
}

/// Recursively scan `archive_dir` for complete archives and `output_dir` for finished outputs.
/// Partial downloads (`.part`) and in-progress outputs never match the templates.
pub fn discover_all(archive_dir: &Path, output_dir: &Path, naming: &ArchiveNaming) -> Discovered {
    Discovered {
        archives: discover_month_map(archive_dir, &naming.regex_for(&naming.ext)),
        outputs: discover_month_map(output_dir, &naming.regex_for(OUTPUT_EXT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::months_of_years;
    use std::collections::HashSet;

    #[test]
    fn names_are_zero_padded_and_templated() {
        let n = ArchiveNaming::default();
        let ym = YearMonth::new(2005, 12);
        assert_eq!(n.archive_name(ym), "RC_2005-12.zst");
        assert_eq!(n.output_name(ym), "RC_2005-12.tsv");
        assert_eq!(n.archive_name(YearMonth::new(2006, 1)), "RC_2006-01.zst");
        assert_eq!(
            n.archive_url("https://files.pushshift.io/reddit/comments/", YearMonth::new(2006, 1)),
            "https://files.pushshift.io/reddit/comments/RC_2006-01.zst"
        );
    }

    #[test]
    fn naming_is_deterministic_and_injective() {
        let n = ArchiveNaming::default();
        let units: Vec<_> = months_of_years(2005, 2020).collect();
        let archives: HashSet<_> = units.iter().map(|u| n.archive_name(*u)).collect();
        let outputs: HashSet<_> = units.iter().map(|u| n.output_name(*u)).collect();
        assert_eq!(archives.len(), units.len());
        assert_eq!(outputs.len(), units.len());
        for u in &units {
            assert_eq!(n.archive_name(*u), n.archive_name(*u));
        }
    }

    #[test]
    fn names_parse_back_to_their_unit() {
        let n = ArchiveNaming::default();
        let re = n.regex_for(&n.ext);
        let ym = YearMonth::new(2011, 7);
        assert_eq!(ArchiveNaming::parse_with(&re, &n.archive_name(ym)), Some(ym));
        assert_eq!(ArchiveNaming::parse_with(&re, "RC_2011-07.zst.part"), None);
        assert_eq!(ArchiveNaming::parse_with(&re, "RC_2011-13.zst"), None);
        assert_eq!(ArchiveNaming::parse_with(&re, "RS_2011-07.zst"), None);
    }
}
