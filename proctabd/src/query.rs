//! Filter, sort and paginate a snapshot.
//!
//! Nothing here can fail: unknown or malformed parameters fall back to their
//! defaults.

use std::cmp::Ordering;

use crate::snapshot::Snapshot;
use crate::types::{ProcessPage, ProcessRecord};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Pid,
    Cpu,
    Memory,
    StartTime,
    Name,
}

impl SortKey {
    pub fn parse(s: &str) -> Self {
        match s {
            "cpu" => Self::Cpu,
            "memory" => Self::Memory,
            "start_time" => Self::StartTime,
            "name" => Self::Name,
            _ => Self::Pid,
        }
    }

    fn compare(self, a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
        match self {
            Self::Pid => a.pid.cmp(&b.pid),
            Self::Cpu => a.cpu.total_cmp(&b.cpu),
            Self::Memory => a.rss.cmp(&b.rss),
            Self::StartTime => a.create_time.cmp(&b.create_time),
            Self::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(s: &str) -> Self {
        if s == "desc" { Self::Desc } else { Self::Asc }
    }
}

/// Raw list parameters as they arrive from a query string. Everything is a
/// string so a malformed number degrades to its default instead of
/// rejecting the request.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub status: Option<String>,
    pub username: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub page: usize,
    pub limit: usize,
    pub sort_by: SortKey,
    pub sort_dir: SortDir,
    pub status: Option<String>,
    pub username: Option<String>,
    pub search: Option<String>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            sort_by: SortKey::Pid,
            sort_dir: SortDir::Asc,
            status: None,
            username: None,
            search: None,
        }
    }
}

impl ListParams {
    /// Build from decoded query pairs. The first value of a repeated key
    /// wins; unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "page" => &mut params.page,
                "limit" => &mut params.limit,
                "sort_by" => &mut params.sort_by,
                "sort_dir" => &mut params.sort_dir,
                "status" => &mut params.status,
                "username" => &mut params.username,
                "search" => &mut params.search,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

impl From<ListParams> for QuerySpec {
    fn from(p: ListParams) -> Self {
        Self {
            page: positive(p.page.as_deref()).unwrap_or(DEFAULT_PAGE),
            limit: positive(p.limit.as_deref()).unwrap_or(DEFAULT_LIMIT),
            sort_by: p.sort_by.as_deref().map(SortKey::parse).unwrap_or_default(),
            sort_dir: p.sort_dir.as_deref().map(SortDir::parse).unwrap_or_default(),
            status: non_empty(p.status),
            username: non_empty(p.username),
            search: non_empty(p.search),
        }
    }
}

fn positive(raw: Option<&str>) -> Option<usize> {
    raw?.trim().parse::<usize>().ok().filter(|n| *n >= 1)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

impl QuerySpec {
    pub fn matches(&self, record: &ProcessRecord) -> bool {
        if let Some(status) = &self.status
            && record.status != *status
        {
            return false;
        }
        if let Some(username) = &self.username
            && record.username != *username
        {
            return false;
        }
        match &self.search {
            Some(search) => {
                let needle = search.to_lowercase();
                record.name.to_lowercase().contains(&needle)
                    || record.cmd_line.to_lowercase().contains(&needle)
                    || record.pid.to_string().contains(&needle)
            }
            None => true,
        }
    }
}

/// Filter, then stable-sort, then slice out the requested page. `total` is
/// the filtered count before pagination.
pub fn query(snapshot: &Snapshot, spec: &QuerySpec) -> ProcessPage {
    let mut items: Vec<&ProcessRecord> = snapshot
        .records()
        .iter()
        .filter(|r| spec.matches(r))
        .collect();

    items.sort_by(|a, b| {
        let ord = spec.sort_by.compare(a, b);
        match spec.sort_dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });

    let total = items.len();
    let start = spec
        .page
        .max(1)
        .saturating_sub(1)
        .saturating_mul(spec.limit.max(1))
        .min(total);
    let end = start.saturating_add(spec.limit.max(1)).min(total);

    ProcessPage {
        total,
        items: items[start..end].iter().map(|r| (*r).clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pid: i32, name: &str) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: name.to_string(),
            status: "S".to_string(),
            username: "root".to_string(),
            ..ProcessRecord::default()
        }
    }

    fn snapshot(records: Vec<ProcessRecord>) -> Snapshot {
        Snapshot::from_records(records)
    }

    fn pids(page: &ProcessPage) -> Vec<i32> {
        page.items.iter().map(|r| r.pid).collect()
    }

    fn params(pairs: &[(&str, &str)]) -> QuerySpec {
        ListParams::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string()))).into()
    }

    #[test]
    fn repeated_keys_keep_the_first_value() {
        let spec = params(&[
            ("page", "1"),
            ("page", "2"),
            ("sort_by", "cpu"),
            ("sort_by", "name"),
            ("color", "blue"),
        ]);
        assert_eq!(spec.page, 1);
        assert_eq!(spec.sort_by, SortKey::Cpu);
    }

    #[test]
    fn sorts_by_pid_both_directions() {
        let snap = snapshot(vec![rec(30, "c"), rec(10, "a"), rec(20, "b")]);
        assert_eq!(pids(&query(&snap, &QuerySpec::default())), vec![10, 20, 30]);
        let desc = params(&[("sort_dir", "desc")]);
        assert_eq!(pids(&query(&snap, &desc)), vec![30, 20, 10]);
    }

    #[test]
    fn sorts_by_name_case_insensitively() {
        let snap = snapshot(vec![rec(1, "zsh"), rec(2, "Bash"), rec(3, "apache")]);
        let spec = params(&[("sort_by", "name")]);
        assert_eq!(pids(&query(&snap, &spec)), vec![3, 2, 1]);
    }

    #[test]
    fn sorts_by_cpu_memory_and_start_time() {
        let mut a = rec(1, "a");
        a.cpu = 5.0;
        a.rss = 100;
        a.create_time = 3;
        let mut b = rec(2, "b");
        b.cpu = 1.0;
        b.rss = 300;
        b.create_time = 1;
        let mut c = rec(3, "c");
        c.cpu = 9.5;
        c.rss = 200;
        c.create_time = 2;
        let snap = snapshot(vec![a, b, c]);

        assert_eq!(pids(&query(&snap, &params(&[("sort_by", "cpu")]))), vec![2, 1, 3]);
        assert_eq!(
            pids(&query(&snap, &params(&[("sort_by", "memory"), ("sort_dir", "desc")]))),
            vec![2, 3, 1]
        );
        assert_eq!(
            pids(&query(&snap, &params(&[("sort_by", "start_time")]))),
            vec![2, 3, 1]
        );
    }

    #[test]
    fn ascending_sort_is_stable() {
        let snap = snapshot(vec![rec(3, "same"), rec(1, "same"), rec(2, "same")]);
        let spec = params(&[("sort_by", "name")]);
        assert_eq!(pids(&query(&snap, &spec)), vec![3, 1, 2]);
    }

    #[test]
    fn unknown_values_fall_back_to_defaults() {
        let spec = params(&[
            ("page", "-3"),
            ("limit", "lots"),
            ("sort_by", "colour"),
            ("sort_dir", "sideways"),
        ]);
        assert_eq!(spec, QuerySpec::default());
        assert_eq!(params(&[("page", "0"), ("limit", "0")]), QuerySpec::default());
    }

    #[test]
    fn empty_filters_are_ignored() {
        let spec = params(&[("status", ""), ("username", ""), ("search", "")]);
        assert_eq!(spec, QuerySpec::default());
    }

    #[test]
    fn filters_by_status_and_username() {
        let mut running = rec(1, "a");
        running.status = "R".into();
        let mut other_user = rec(2, "b");
        other_user.username = "alice".into();
        other_user.status = "R".into();
        let snap = snapshot(vec![running, other_user, rec(3, "c")]);

        let page = query(&snap, &params(&[("status", "R")]));
        assert_eq!(pids(&page), vec![1, 2]);
        let page = query(&snap, &params(&[("status", "R"), ("username", "root")]));
        assert_eq!(pids(&page), vec![1]);
        assert!(page.items.iter().all(|r| r.status == "R" && r.username == "root"));
    }

    #[test]
    fn search_is_case_insensitive_over_name_cmdline_and_pid() {
        let mut web = rec(7, "Nginx");
        web.cmd_line = "nginx: master".into();
        let mut py = rec(8, "python3");
        py.cmd_line = "python3 /srv/Worker.py".into();
        let snap = snapshot(vec![web, py, rec(1234, "cron")]);

        assert_eq!(pids(&query(&snap, &params(&[("search", "nginx")]))), vec![7]);
        assert_eq!(pids(&query(&snap, &params(&[("search", "WORKER")]))), vec![8]);
        assert_eq!(pids(&query(&snap, &params(&[("search", "23")]))), vec![1234]);
    }

    #[test]
    fn total_ignores_pagination() {
        let snap = snapshot((1..=45).map(|p| rec(p, "w")).collect());
        for (page, limit) in [("1", "20"), ("3", "20"), ("9", "20"), ("1", "100")] {
            let result = query(&snap, &params(&[("page", page), ("limit", limit)]));
            assert_eq!(result.total, 45);
        }
    }

    #[test]
    fn out_of_range_page_is_empty_with_total() {
        let snap = snapshot((1..=5).map(|p| rec(p, "w")).collect());
        let page = query(&snap, &params(&[("page", "4"), ("limit", "2")]));
        assert!(page.items.is_empty());
        assert_eq!(page.total, 5);
        let huge = query(&snap, &params(&[("page", "18446744073709551615")]));
        assert!(huge.items.is_empty());
    }

    #[test]
    fn pages_cover_every_item_exactly_once() {
        let snap = snapshot((1..=23).rev().map(|p| rec(p, "w")).collect());
        let mut seen = Vec::new();
        for page in 1..=5 {
            let spec = QuerySpec {
                page,
                limit: 5,
                ..QuerySpec::default()
            };
            seen.extend(pids(&query(&snap, &spec)));
        }
        assert_eq!(seen, (1..=23).collect::<Vec<_>>());
    }
}
