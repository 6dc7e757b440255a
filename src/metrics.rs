use crate::affiliation::AffiliationLookup;
use crate::model::{CommitRecord, ProjectMetrics};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorCount {
    pub author: String,
    pub commits: usize,
}

/// Per-author commit counts, ranked by count descending. Authors with equal
/// counts keep the order in which they first appeared in `records`.
pub fn rank_contributors<'a, I>(records: I) -> (usize, Vec<ContributorCount>)
where
    I: IntoIterator<Item = &'a CommitRecord>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut counts: Vec<ContributorCount> = Vec::new();
    let mut total = 0usize;

    for record in records {
        total += 1;
        match index.get(record.author.as_str()) {
            Some(&i) => counts[i].commits += 1,
            None => {
                index.insert(record.author.as_str(), counts.len());
                counts.push(ContributorCount {
                    author: record.author.clone(),
                    commits: 1,
                });
            }
        }
    }

    // sort_by is stable, so ties stay in first-seen order
    counts.sort_by(|a, b| b.commits.cmp(&a.commits));
    (total, counts)
}

/// The highest-volume contributors, `floor(n / 2)` of them.
pub fn top_half(ranked: &[ContributorCount]) -> &[ContributorCount] {
    &ranked[..ranked.len() / 2]
}

fn distinct_affiliations<'a, L>(contributors: &'a [ContributorCount], table: &'a L) -> usize
where
    L: AffiliationLookup + ?Sized,
{
    contributors
        .iter()
        .map(|c| table.affiliation_of(&c.author))
        .collect::<HashSet<_>>()
        .len()
}

pub fn aggregate<'a, I, L>(records: I, table: &L) -> ProjectMetrics
where
    I: IntoIterator<Item = &'a CommitRecord>,
    L: AffiliationLookup + ?Sized,
{
    let (total_commits, ranked) = rank_contributors(records);
    summarize(total_commits, &ranked, table)
}

pub fn summarize<L>(total_commits: usize, ranked: &[ContributorCount], table: &L) -> ProjectMetrics
where
    L: AffiliationLookup + ?Sized,
{
    let top = top_half(ranked);
    ProjectMetrics {
        total_commits,
        total_contributors: ranked.len(),
        total_contributor_affiliations: distinct_affiliations(ranked, table),
        top_half_contributor_count: top.len(),
        top_half_contributor_affiliations: distinct_affiliations(top, table),
    }
}
