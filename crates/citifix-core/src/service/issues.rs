//! Issue reporting, triage and deletion

use super::{apply_transition, attach_uploads, IssueView, Service};
use crate::duplicates::{find_duplicate, nearby};
use crate::geo::{BoundingBox, Coordinates};
use crate::issue::{
    validate_address, validate_description, validate_title, Category, Issue, IssueId, IssueUpdate,
    NewIssue, Status,
};
use crate::media::{validate_uploads, Media, MediaOwner, Upload};
use crate::notification::NotificationEvent;
use crate::pagination::{Page, PageRequest};
use crate::points::PointEvent;
use crate::policy;
use crate::rules;
use crate::user::{Actor, UserId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    UpdatedAt,
    Votes,
    Title,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters for issue listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueQuery {
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub reporter_id: Option<UserId>,
    /// Center for a proximity filter; needs `longitude` too
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Proximity radius in km, defaults to the configured nearby radius
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub include_duplicates: bool,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

impl IssueQuery {
    fn center(&self) -> Result<Option<Coordinates>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon).map(Some),
            (None, None) => Ok(None),
            _ => Err(Error::Validation(
                "latitude and longitude must be given together".into(),
            )),
        }
    }

    fn matches(&self, issue: &Issue) -> bool {
        self.status.is_none_or(|s| issue.status == s)
            && self.category.is_none_or(|c| issue.category == c)
            && self.reporter_id.is_none_or(|r| issue.reporter_id == r)
            && (self.include_duplicates || !issue.is_duplicate)
    }

    fn compare(&self, a: &Issue, b: &Issue) -> Ordering {
        let ordering = match self.sort_by {
            SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            SortBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortBy::Votes => a.votes_count.cmp(&b.votes_count),
            SortBy::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        }
        .then_with(|| a.id.cmp(&b.id));

        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Response to a new report
#[derive(Debug, Clone, Serialize)]
pub struct CreatedIssue {
    pub issue: IssueView,
    pub is_duplicate: bool,
    pub parent_issue: Option<Issue>,
}

/// Full issue page
#[derive(Debug, Clone, Serialize)]
pub struct IssueDetail {
    #[serde(flatten)]
    pub view: IssueView,
    pub parent_issue: Option<Issue>,
    pub duplicates: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapPoint {
    pub id: IssueId,
    pub latitude: f64,
    pub longitude: f64,
    pub category: Category,
    pub status: Status,
    pub votes_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    pub value: Category,
    pub label: &'static str,
}

impl Service {
    /// File a new report.
    ///
    /// A same-category open issue within the duplicate radius becomes the
    /// parent and the new issue is flagged; creation still succeeds.
    pub fn create_issue(
        &mut self,
        actor: &Actor,
        draft: NewIssue,
        uploads: Vec<Upload>,
    ) -> Result<CreatedIssue> {
        validate_uploads(&uploads, &self.config.media)?;

        let radius = self.config.geo.duplicate_radius_km;
        let storage = Arc::clone(&self.media);
        let mut written = Vec::new();

        let result = self.commit(|tx| {
            tx.user(actor.user_id)?;

            let parent = find_duplicate(tx.live_issues(), draft.category, &draft.location, radius)
                .map(|issue| issue.id);

            let id = tx.next_issue_id();
            let mut issue = Issue::new(id, actor.user_id, draft);
            if let Some(parent) = parent {
                issue.mark_duplicate_of(parent);
            }
            tx.issues.insert(id, issue);

            tx.award(actor.user_id, PointEvent::IssueCreated)?;
            attach_uploads(
                tx,
                storage.as_ref(),
                MediaOwner::Issue(id),
                &uploads,
                &mut written,
            )?;

            Ok((id, parent))
        });

        let (id, parent) = match result {
            Ok(value) => value,
            Err(e) => {
                self.remove_files(&written);
                return Err(e);
            }
        };

        tracing::info!(
            issue = id,
            reporter = actor.user_id,
            duplicate_of = parent,
            "issue reported"
        );

        let tables = self.tables();
        let issue = tables.issue(id)?;
        Ok(CreatedIssue {
            issue: IssueView::build(tables, issue, actor.user_id),
            is_duplicate: parent.is_some(),
            parent_issue: parent.and_then(|p| tables.issue(p).ok()).cloned(),
        })
    }

    pub fn get_issue(&self, actor: &Actor, id: IssueId) -> Result<IssueDetail> {
        let tables = self.tables();
        let issue = tables.issue(id)?;

        let duplicates = tables
            .live_issues()
            .filter(|i| i.parent_issue_id == Some(id))
            .cloned()
            .collect();

        Ok(IssueDetail {
            view: IssueView::build(tables, issue, actor.user_id),
            parent_issue: issue
                .parent_issue_id
                .and_then(|p| tables.issue(p).ok())
                .cloned(),
            duplicates,
        })
    }

    /// Filtered, sorted, paginated listing. A proximity filter orders by
    /// distance instead of the requested sort.
    pub fn list_issues(&self, actor: &Actor, query: &IssueQuery) -> Result<Page<IssueView>> {
        let tables = self.tables();
        let center = query.center()?;
        let (page, per_page) = self.per_page(PageRequest {
            page: query.page,
            per_page: query.per_page,
        });

        let candidates = tables.live_issues().filter(|i| query.matches(i));

        let ordered: Vec<(&Issue, Option<f64>)> = match center {
            Some(center) => {
                let radius = query.radius.unwrap_or(self.config.geo.nearby_radius_km);
                if radius.is_nan() || radius <= 0.0 {
                    return Err(Error::Validation("radius must be positive".into()));
                }
                nearby(candidates, &center, radius)
                    .into_iter()
                    .map(|(issue, distance)| (issue, Some(distance)))
                    .collect()
            }
            None => {
                let mut issues: Vec<&Issue> = candidates.collect();
                issues.sort_by(|a, b| query.compare(a, b));
                issues.into_iter().map(|issue| (issue, None)).collect()
            }
        };

        Ok(Page::slice(ordered, page, per_page).map(|(issue, distance)| {
            let mut view = IssueView::build(tables, issue, actor.user_id);
            view.distance_km = distance;
            view
        }))
    }

    /// The actor's own reports, duplicates included, newest first
    pub fn my_issues(&self, actor: &Actor, page: PageRequest) -> Result<Page<IssueView>> {
        let query = IssueQuery {
            reporter_id: Some(actor.user_id),
            include_duplicates: true,
            page: page.page,
            per_page: page.per_page,
            ..Default::default()
        };
        self.list_issues(actor, &query)
    }

    /// Edit content, or (staff only) status and assignment
    pub fn update_issue(
        &mut self,
        actor: &Actor,
        id: IssueId,
        update: IssueUpdate,
    ) -> Result<IssueView> {
        self.commit(|tx| {
            let issue = tx.issue(id)?;
            policy::can_update_issue(actor, issue, &update).into_result()?;
            let previous_assignee = issue.assigned_to;

            let title = update.title.as_deref().map(validate_title).transpose()?;
            let description = update
                .description
                .as_deref()
                .map(validate_description)
                .transpose()?;
            let address = update.address.clone().map(validate_address).transpose()?;

            if let Some(Some(assignee)) = update.assigned_to {
                let officer = tx.user(assignee)?;
                if !officer.role.is_staff() {
                    return Err(Error::Validation(format!(
                        "user {assignee} is not an officer"
                    )));
                }
            }

            let issue = tx.issue_mut(id)?;
            if let Some(title) = title {
                issue.title = title;
            }
            if let Some(description) = description {
                issue.description = description;
            }
            if let Some(category) = update.category {
                issue.category = category;
            }
            if let Some(address) = address {
                issue.address = address;
            }
            if let Some(assigned_to) = update.assigned_to {
                issue.assigned_to = assigned_to;
            }
            issue.touch();

            let transition = update.status.and_then(|next| rules::transition(issue, next));
            let assigned_to = issue.assigned_to;
            let title = issue.title.clone();

            if let Some(transition) = transition {
                apply_transition(tx, id, transition)?;
            }

            if let Some(officer) = assigned_to
                && assigned_to != previous_assignee
            {
                tx.notify(officer, NotificationEvent::IssueAssigned { issue_id: id, title });
                tracing::info!(issue = id, officer, "issue assigned");
            }

            Ok(())
        })?;

        let tables = self.tables();
        Ok(IssueView::build(tables, tables.issue(id)?, actor.user_id))
    }

    /// Soft-delete an issue. Votes, comments and media go with it and the
    /// reporter loses the creation points.
    pub fn delete_issue(&mut self, actor: &Actor, id: IssueId) -> Result<()> {
        let paths = self.commit(|tx| {
            let issue = tx.issue(id)?;
            policy::can_delete_issue(actor, issue).into_result()?;
            let reporter = issue.reporter_id;

            tx.votes.retain(|_, v| v.issue_id != id);

            let comment_ids: Vec<_> = tx.comments_for(id).map(|c| c.id).collect();
            let mut paths = tx.remove_media_for(MediaOwner::Issue(id));
            for comment_id in comment_ids {
                paths.extend(tx.remove_media_for(MediaOwner::Comment(comment_id)));
                tx.comments.remove(&comment_id);
            }

            tx.issue_mut(id)?.delete();
            tx.award(reporter, PointEvent::IssueDeleted)?;
            Ok(paths)
        })?;

        self.remove_files(&paths);
        tracing::info!(issue = id, by = actor.user_id, files = paths.len(), "issue deleted");
        Ok(())
    }

    /// Add photos or videos to an existing issue
    pub fn attach_issue_media(
        &mut self,
        actor: &Actor,
        id: IssueId,
        uploads: Vec<Upload>,
    ) -> Result<Vec<Media>> {
        if uploads.is_empty() {
            return Err(Error::Validation("no files uploaded".into()));
        }
        validate_uploads(&uploads, &self.config.media)?;

        let storage = Arc::clone(&self.media);
        let mut written = Vec::new();
        let result = self.commit(|tx| {
            policy::can_attach_issue_media(actor, tx.issue(id)?).into_result()?;
            attach_uploads(
                tx,
                storage.as_ref(),
                MediaOwner::Issue(id),
                &uploads,
                &mut written,
            )
        });

        if result.is_err() {
            self.remove_files(&written);
        }
        result
    }

    /// Live, non-duplicate issues inside a box
    pub fn heatmap(&self, bbox: &BoundingBox) -> Vec<HeatmapPoint> {
        self.tables()
            .live_issues()
            .filter(|i| !i.is_duplicate && bbox.contains(&i.location))
            .map(|i| HeatmapPoint {
                id: i.id,
                latitude: i.location.latitude,
                longitude: i.location.longitude,
                category: i.category,
                status: i.status,
                votes_count: i.votes_count,
            })
            .collect()
    }

    pub fn categories(&self) -> Vec<CategoryInfo> {
        Category::ALL
            .iter()
            .map(|c| CategoryInfo {
                value: *c,
                label: c.label(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::issue::{Category, IssueUpdate, NewIssue, Status};
    use crate::media::Upload;
    use crate::notification::NotificationEvent;
    use crate::pagination::PageRequest;
    use crate::service::testing::Harness;
    use crate::service::{IssueQuery, SortBy, SortOrder};
    use crate::user::Role;
    use crate::Error;

    #[test]
    fn creating_awards_points_and_detects_duplicates() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let bo = h.user("bo", Role::Citizen);

        let a = h.report(&ana, Category::Pothole, 40.0, -74.0);
        assert_eq!(h.points(&ana), 10);

        let draft = NewIssue::new(
            "Same hole",
            "The same pothole again",
            Category::Pothole,
            40.0004,
            -74.0,
            None,
        )
        .unwrap();
        let created = h.service.create_issue(&bo, draft, Vec::new()).unwrap();
        assert!(created.is_duplicate);
        assert_eq!(created.issue.issue.parent_issue_id, Some(a));
        assert_eq!(created.parent_issue.map(|p| p.id), Some(a));

        let draft = NewIssue::new(
            "Paint",
            "Graffiti at the same corner",
            Category::Graffiti,
            40.0,
            -74.0,
            None,
        )
        .unwrap();
        let created = h.service.create_issue(&bo, draft, Vec::new()).unwrap();
        assert!(!created.is_duplicate);
        assert_eq!(created.issue.issue.parent_issue_id, None);
    }

    #[test]
    fn unknown_reporter_is_rejected() {
        let mut h = Harness::new();
        let ghost = crate::user::Actor::new(42, Role::Citizen);
        let draft = NewIssue::new(
            "Leak",
            "Water everywhere on 3rd",
            Category::WaterLeak,
            1.0,
            1.0,
            None,
        )
        .unwrap();
        assert!(matches!(
            h.service.create_issue(&ghost, draft, Vec::new()),
            Err(Error::NotFound(_))
        ));
        assert!(h.service.tables().issues.is_empty());
    }

    #[test]
    fn uploads_are_stored_with_the_issue() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let draft = NewIssue::new(
            "Light out",
            "Street light dark for a week",
            Category::BrokenLight,
            1.0,
            1.0,
            None,
        )
        .unwrap();
        let uploads = vec![
            Upload::new("a.jpg", "image/jpeg", vec![1, 2, 3]),
            Upload::new("b.mp4", "video/mp4", vec![4, 5]),
        ];

        let created = h.service.create_issue(&ana, draft, uploads).unwrap();
        assert_eq!(created.issue.media.len(), 2);
        assert_eq!(h.media.len(), 2);
        for media in &created.issue.media {
            assert!(h.media.contains(&media.file_path));
        }
    }

    #[test]
    fn invalid_upload_blocks_creation() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let draft = NewIssue::new(
            "Light out",
            "Street light dark for a week",
            Category::BrokenLight,
            1.0,
            1.0,
            None,
        )
        .unwrap();
        let uploads = vec![Upload::new("virus.exe", "application/octet-stream", vec![0])];

        assert!(matches!(
            h.service.create_issue(&ana, draft, uploads),
            Err(Error::Validation(_))
        ));
        assert_eq!(h.points(&ana), 0);
        assert!(h.media.is_empty());
    }

    #[test]
    fn listing_excludes_duplicates_by_default() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        h.report(&ana, Category::Pothole, 40.0, -74.0);
        h.report(&ana, Category::Pothole, 40.0001, -74.0);

        let page = h.service.list_issues(&ana, &IssueQuery::default()).unwrap();
        assert_eq!(page.total, 1);

        let query = IssueQuery {
            include_duplicates: true,
            ..Default::default()
        };
        assert_eq!(h.service.list_issues(&ana, &query).unwrap().total, 2);

        // Own reports always include duplicates
        let mine = h.service.my_issues(&ana, PageRequest::default()).unwrap();
        assert_eq!(mine.total, 2);
    }

    #[test]
    fn nearby_listing_orders_by_distance() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let far = h.report(&ana, Category::Pothole, 40.02, -74.0);
        let near = h.report(&ana, Category::Graffiti, 40.001, -74.0);
        h.report(&ana, Category::Other, 41.0, -74.0);

        let query = IssueQuery {
            latitude: Some(40.0),
            longitude: Some(-74.0),
            ..Default::default()
        };
        let page = h.service.list_issues(&ana, &query).unwrap();
        let ids: Vec<_> = page.data.iter().map(|v| v.issue.id).collect();
        assert_eq!(ids, vec![near, far]);
        assert!(page.data[0].distance_km.unwrap() < page.data[1].distance_km.unwrap());

        let half = IssueQuery {
            latitude: Some(40.0),
            ..Default::default()
        };
        assert!(matches!(
            h.service.list_issues(&ana, &half),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn listing_sorts_and_filters() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let bo = h.user("bo", Role::Citizen);
        let first = h.report(&ana, Category::Pothole, 10.0, 10.0);
        let second = h.report(&bo, Category::Graffiti, 20.0, 20.0);
        h.service.vote(&ana, second).unwrap();

        let by_votes = IssueQuery {
            sort_by: SortBy::Votes,
            sort_order: SortOrder::Desc,
            ..Default::default()
        };
        let page = h.service.list_issues(&ana, &by_votes).unwrap();
        assert_eq!(page.data[0].issue.id, second);
        assert!(page.data[0].user_has_voted);
        assert!(!page.data[1].user_has_voted);

        let by_reporter = IssueQuery {
            reporter_id: Some(ana.user_id),
            ..Default::default()
        };
        let page = h.service.list_issues(&bo, &by_reporter).unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].issue.id, first);

        let by_category = IssueQuery {
            category: Some(Category::Graffiti),
            ..Default::default()
        };
        assert_eq!(h.service.list_issues(&ana, &by_category).unwrap().total, 1);
    }

    #[test]
    fn citizen_cannot_change_status() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let id = h.report(&ana, Category::Pothole, 1.0, 1.0);

        let update = IssueUpdate {
            status: Some(Status::Resolved),
            ..Default::default()
        };
        assert!(matches!(
            h.service.update_issue(&ana, id, update),
            Err(Error::Forbidden(_))
        ));
        assert_eq!(h.service.tables().issue(id).unwrap().status, Status::Reported);
    }

    #[test]
    fn reporter_can_edit_content() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let id = h.report(&ana, Category::Pothole, 1.0, 1.0);

        let update = IssueUpdate {
            title: Some("Huge pothole".into()),
            address: Some(Some("Main St 1".into())),
            ..Default::default()
        };
        let view = h.service.update_issue(&ana, id, update).unwrap();
        assert_eq!(view.issue.title, "Huge pothole");
        assert_eq!(view.issue.address.as_deref(), Some("Main St 1"));

        let bad = IssueUpdate {
            description: Some("short".into()),
            ..Default::default()
        };
        assert!(matches!(
            h.service.update_issue(&ana, id, bad),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn officer_lifecycle_pays_bonuses_once() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let officer = h.user("olga", Role::Officer);
        let id = h.report(&ana, Category::Pothole, 1.0, 1.0);

        for status in [
            Status::Verified,
            Status::Reported,
            Status::Verified,
            Status::InProgress,
            Status::Resolved,
        ] {
            let update = IssueUpdate {
                status: Some(status),
                ..Default::default()
            };
            h.service.update_issue(&officer, id, update).unwrap();
        }

        // 10 created + 15 verified + 25 resolved; re-verification pays nothing
        assert_eq!(h.points(&ana), 50);

        let status_changes = h
            .dispatcher
            .sent()
            .into_iter()
            .filter(|n| n.user_id == ana.user_id)
            .filter(|n| matches!(n.data, NotificationEvent::StatusChanged { .. }))
            .count();
        assert_eq!(status_changes, 5);
    }

    #[test]
    fn unchanged_status_does_not_notify() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let officer = h.user("olga", Role::Officer);
        let id = h.report(&ana, Category::Pothole, 1.0, 1.0);

        let update = IssueUpdate {
            status: Some(Status::Reported),
            ..Default::default()
        };
        h.service.update_issue(&officer, id, update).unwrap();
        assert!(h.dispatcher.sent().is_empty());
    }

    #[test]
    fn assignment_notifies_officer() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let officer = h.user("olga", Role::Officer);
        let id = h.report(&ana, Category::Pothole, 1.0, 1.0);

        let assign_citizen = IssueUpdate {
            assigned_to: Some(Some(ana.user_id)),
            ..Default::default()
        };
        assert!(matches!(
            h.service.update_issue(&officer, id, assign_citizen),
            Err(Error::Validation(_))
        ));

        let assign = IssueUpdate {
            assigned_to: Some(Some(officer.user_id)),
            ..Default::default()
        };
        let view = h.service.update_issue(&officer, id, assign.clone()).unwrap();
        assert_eq!(
            view.assigned_officer.map(|u| u.id),
            Some(officer.user_id)
        );

        // Same assignee again is not a new assignment
        h.service.update_issue(&officer, id, assign).unwrap();

        let sent = h.dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, officer.user_id);
        assert!(matches!(sent[0].data, NotificationEvent::IssueAssigned { .. }));
    }

    #[test]
    fn delete_cascades_and_deducts() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let bo = h.user("bo", Role::Citizen);
        let draft = NewIssue::new(
            "Dumping",
            "Mattresses dumped in the park",
            Category::IllegalDumping,
            1.0,
            1.0,
            None,
        )
        .unwrap();
        let id = h
            .service
            .create_issue(
                &ana,
                draft,
                vec![Upload::new("a.png", "image/png", vec![1])],
            )
            .unwrap()
            .issue
            .issue
            .id;
        h.service.vote(&bo, id).unwrap();
        h.service
            .add_comment(
                &bo,
                id,
                "Saw it too",
                vec![Upload::new("b.jpg", "image/jpeg", vec![2])],
            )
            .unwrap();
        assert_eq!(h.points(&ana), 15);
        assert_eq!(h.media.len(), 2);

        assert!(matches!(
            h.service.delete_issue(&bo, id),
            Err(Error::Forbidden(_))
        ));

        h.service.delete_issue(&ana, id).unwrap();

        let tables = h.service.tables();
        assert!(matches!(tables.issue(id), Err(Error::NotFound(_))));
        assert_eq!(tables.votes_for(id).count(), 0);
        assert_eq!(tables.comments_for(id).count(), 0);
        assert!(tables.media.is_empty());
        assert!(h.media.is_empty());
        assert_eq!(h.points(&ana), 5);
        assert!(matches!(h.service.vote(&bo, id), Err(Error::NotFound(_))));
    }

    #[test]
    fn admin_may_delete_any_issue() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let admin = h.user("root", Role::Admin);
        let id = h.report(&ana, Category::Pothole, 1.0, 1.0);

        h.service.delete_issue(&admin, id).unwrap();
        assert_eq!(h.points(&ana), 0);
    }

    #[test]
    fn detail_lists_duplicates() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let parent = h.report(&ana, Category::Pothole, 40.0, -74.0);
        let dup = h.report(&ana, Category::Pothole, 40.0, -74.0);

        let detail = h.service.get_issue(&ana, parent).unwrap();
        assert_eq!(
            detail.duplicates.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![dup]
        );

        let detail = h.service.get_issue(&ana, dup).unwrap();
        assert_eq!(detail.parent_issue.map(|p| p.id), Some(parent));
    }

    #[test]
    fn heatmap_skips_duplicates_and_outside_points() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let inside = h.report(&ana, Category::Pothole, 40.5, -74.0);
        h.report(&ana, Category::Pothole, 40.5, -74.0);
        h.report(&ana, Category::Pothole, 45.0, -74.0);

        let bbox = crate::geo::BoundingBox::new(40.0, 41.0, -75.0, -73.0).unwrap();
        let points = h.service.heatmap(&bbox);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id, inside);
    }

    #[test]
    fn media_attach_requires_reporter_or_staff() {
        let mut h = Harness::new();
        let ana = h.user("ana", Role::Citizen);
        let bo = h.user("bo", Role::Citizen);
        let id = h.report(&ana, Category::Pothole, 1.0, 1.0);
        let upload = || vec![Upload::new("a.gif", "image/gif", vec![1])];

        assert!(matches!(
            h.service.attach_issue_media(&bo, id, upload()),
            Err(Error::Forbidden(_))
        ));
        assert!(h.media.is_empty());

        let media = h.service.attach_issue_media(&ana, id, upload()).unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(h.media.len(), 1);
    }

    #[test]
    fn categories_are_labelled() {
        let h = Harness::new();
        let categories = h.service.categories();
        assert_eq!(categories.len(), 8);
        assert_eq!(categories[1].label, "Broken Street Light");
    }
}
