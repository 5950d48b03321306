//! Proximity search and duplicate detection

use crate::geo::Coordinates;
use crate::issue::{Category, Issue, Status};

/// Issues within `radius_km` of `center`, nearest first (ties by id)
pub fn nearby<'a>(
    issues: impl Iterator<Item = &'a Issue>,
    center: &Coordinates,
    radius_km: f64,
) -> Vec<(&'a Issue, f64)> {
    let mut hits: Vec<(&Issue, f64)> = issues
        .map(|issue| (issue, issue.location.distance_km(center)))
        .filter(|(_, distance)| *distance < radius_km)
        .collect();

    hits.sort_by(|(a, da), (b, db)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)));
    hits
}

/// Earlier issue that a new report at `location` duplicates.
///
/// Candidates are non-closed, same-category issues that are not themselves
/// duplicates; the nearest wins and equal distances go to the lower id.
pub fn find_duplicate<'a>(
    issues: impl Iterator<Item = &'a Issue>,
    category: Category,
    location: &Coordinates,
    radius_km: f64,
) -> Option<&'a Issue> {
    let candidates = issues.filter(|issue| {
        !issue.is_deleted()
            && issue.category == category
            && issue.status != Status::Closed
            && !issue.is_duplicate
    });

    nearby(candidates, location, radius_km)
        .into_iter()
        .next()
        .map(|(issue, _)| issue)
}
