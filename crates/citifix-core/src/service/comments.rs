use super::{attach_uploads, Service};
use crate::comment::{validate_body, Comment, CommentId};
use crate::issue::IssueId;
use crate::media::{validate_uploads, Media, MediaOwner, Upload};
use crate::notification::NotificationEvent;
use crate::pagination::{Page, PageRequest};
use crate::points::PointEvent;
use crate::policy;
use crate::store::Tables;
use crate::user::{Actor, PublicUser};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;

const COMMENTS_PER_PAGE: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<PublicUser>,
    pub media: Vec<Media>,
}

impl CommentView {
    fn build(tables: &Tables, comment: &Comment) -> Self {
        Self {
            comment: comment.clone(),
            author: tables.users.get(&comment.user_id).map(|u| u.public()),
            media: tables
                .media_for(MediaOwner::Comment(comment.id))
                .cloned()
                .collect(),
        }
    }
}

impl Service {
    /// Comment on an issue. The author earns points; the reporter and the
    /// assigned officer hear about it unless they wrote it.
    pub fn add_comment(
        &mut self,
        actor: &Actor,
        issue_id: IssueId,
        body: &str,
        uploads: Vec<Upload>,
    ) -> Result<CommentView> {
        let body = validate_body(body)?;
        validate_uploads(&uploads, &self.config.media)?;

        let storage = Arc::clone(&self.media);
        let mut written = Vec::new();
        let result = self.commit(|tx| {
            tx.user(actor.user_id)?;
            let issue = tx.issue(issue_id)?;
            let title = issue.title.clone();
            let mut recipients = vec![issue.reporter_id];
            recipients.extend(issue.assigned_to);
            recipients.dedup();

            let id = tx.next_comment_id();
            tx.comments
                .insert(id, Comment::new(id, issue_id, actor.user_id, body));
            attach_uploads(
                tx,
                storage.as_ref(),
                MediaOwner::Comment(id),
                &uploads,
                &mut written,
            )?;
            tx.award(actor.user_id, PointEvent::CommentPosted)?;

            for recipient in recipients.into_iter().filter(|r| *r != actor.user_id) {
                tx.notify(
                    recipient,
                    NotificationEvent::NewComment {
                        issue_id,
                        title: title.clone(),
                        comment_id: id,
                        commenter_id: actor.user_id,
                    },
                );
            }
            Ok(id)
        });

        let id = match result {
            Ok(id) => id,
            Err(e) => {
                self.remove_files(&written);
                return Err(e);
            }
        };

        tracing::info!(issue = issue_id, comment = id, author = actor.user_id, "comment posted");
        let tables = self.tables();
        Ok(CommentView::build(tables, tables.comment(issue_id, id)?))
    }

    /// Oldest first
    pub fn list_comments(&self, issue_id: IssueId, page: PageRequest) -> Result<Page<CommentView>> {
        let tables = self.tables();
        tables.issue(issue_id)?;
        let (page, per_page) =
            page.resolve(COMMENTS_PER_PAGE, self.config.pagination.max_per_page);

        let comments: Vec<CommentView> = tables
            .comments_for(issue_id)
            .map(|c| CommentView::build(tables, c))
            .collect();
        Ok(Page::slice(comments, page, per_page))
    }

    pub fn update_comment(
        &mut self,
        actor: &Actor,
        issue_id: IssueId,
        comment_id: CommentId,
        body: &str,
    ) -> Result<CommentView> {
        let body = validate_body(body)?;
        self.commit(|tx| {
            tx.issue(issue_id)?;
            policy::can_edit_comment(actor, tx.comment(issue_id, comment_id)?).into_result()?;
            tx.comment_mut(issue_id, comment_id)?.edit(body);
            Ok(())
        })?;

        let tables = self.tables();
        Ok(CommentView::build(tables, tables.comment(issue_id, comment_id)?))
    }

    /// Remove a comment and its files. The author loses the comment points
    /// whoever deletes it.
    pub fn delete_comment(
        &mut self,
        actor: &Actor,
        issue_id: IssueId,
        comment_id: CommentId,
    ) -> Result<()> {
        let paths = self.commit(|tx| {
            tx.issue(issue_id)?;
            let comment = tx.comment(issue_id, comment_id)?;
            policy::can_delete_comment(actor, comment).into_result()?;
            let author = comment.user_id;

            tx.comments.remove(&comment_id);
            let paths = tx.remove_media_for(MediaOwner::Comment(comment_id));
            tx.award(author, PointEvent::CommentDeleted)?;
            Ok(paths)
        })?;

        self.remove_files(&paths);
        tracing::info!(issue = issue_id, comment = comment_id, by = actor.user_id, "comment deleted");
        Ok(())
    }

    /// Comments written by the actor on live issues, newest first
    pub fn my_comments(&self, actor: &Actor, page: PageRequest) -> Result<Page<CommentView>> {
        let tables = self.tables();
        let (page, per_page) =
            page.resolve(COMMENTS_PER_PAGE, self.config.pagination.max_per_page);

        let comments: Vec<CommentView> = tables
            .comments
            .values()
            .rev()
            .filter(|c| c.user_id == actor.user_id && tables.issue(c.issue_id).is_ok())
            .map(|c| CommentView::build(tables, c))
            .collect();
        Ok(Page::slice(comments, page, per_page))
    }

    pub fn attach_comment_media(
        &mut self,
        actor: &Actor,
        issue_id: IssueId,
        comment_id: CommentId,
        uploads: Vec<Upload>,
    ) -> Result<Vec<Media>> {
        if uploads.is_empty() {
            return Err(Error::Validation("no files uploaded".into()));
        }
        validate_uploads(&uploads, &self.config.media)?;

        let storage = Arc::clone(&self.media);
        let mut written = Vec::new();
        let result = self.commit(|tx| {
            tx.issue(issue_id)?;
            policy::can_edit_comment(actor, tx.comment(issue_id, comment_id)?).into_result()?;
            attach_uploads(
                tx,
                storage.as_ref(),
                MediaOwner::Comment(comment_id),
                &uploads,
                &mut written,
            )
        });

        if result.is_err() {
            self.remove_files(&written);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::issue::{Category, IssueUpdate};
    use crate::media::Upload;
    use crate::notification::NotificationEvent;
    use crate::pagination::PageRequest;
    use crate::service::testing::Harness;
    use crate::user::Role;
    use crate::Error;

    #[test]
    fn comment_awards_points_and_notifies() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let officer = h.user("olga", Role::Officer);
        let neighbour = h.user("ned", Role::Citizen);
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);
        let update = IssueUpdate {
            assigned_to: Some(Some(officer.user_id)),
            ..Default::default()
        };
        h.service.update_issue(&officer, id, update).unwrap();
        let before = h.dispatcher.sent().len();

        let view = h
            .service
            .add_comment(&neighbour, id, "  Still there today  ", Vec::new())
            .unwrap();
        assert_eq!(view.comment.body, "Still there today");
        assert_eq!(view.author.map(|a| a.id), Some(neighbour.user_id));
        assert_eq!(h.points(&neighbour), 2);

        let sent = h.dispatcher.sent();
        let recipients: Vec<_> = sent[before..].iter().map(|n| n.user_id).collect();
        assert_eq!(recipients, vec![reporter.user_id, officer.user_id]);
        assert!(sent[before..]
            .iter()
            .all(|n| matches!(n.data, NotificationEvent::NewComment { .. })));
    }

    #[test]
    fn own_comment_does_not_notify_author() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);

        h.service
            .add_comment(&reporter, id, "Adding detail", Vec::new())
            .unwrap();
        assert!(h.dispatcher.sent().is_empty());
    }

    #[test]
    fn body_limits_are_enforced() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);

        assert!(matches!(
            h.service.add_comment(&reporter, id, "   ", Vec::new()),
            Err(Error::Validation(_))
        ));
        let long = "x".repeat(1001);
        assert!(matches!(
            h.service.add_comment(&reporter, id, &long, Vec::new()),
            Err(Error::Validation(_))
        ));
        assert_eq!(h.points(&reporter), 10);
    }

    #[test]
    fn only_author_edits() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let admin = h.user("root", Role::Admin);
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);
        let comment = h
            .service
            .add_comment(&reporter, id, "First", Vec::new())
            .unwrap()
            .comment
            .id;

        assert!(matches!(
            h.service.update_comment(&admin, id, comment, "Hijack"),
            Err(Error::Forbidden(_))
        ));
        let view = h
            .service
            .update_comment(&reporter, id, comment, "Edited")
            .unwrap();
        assert_eq!(view.comment.body, "Edited");
    }

    #[test]
    fn admin_delete_charges_author() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let author = h.user("ned", Role::Citizen);
        let admin = h.user("root", Role::Admin);
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);
        let comment = h
            .service
            .add_comment(
                &author,
                id,
                "Look",
                vec![Upload::new("p.png", "image/png", vec![1])],
            )
            .unwrap()
            .comment
            .id;
        assert_eq!(h.points(&author), 2);
        assert_eq!(h.media.len(), 1);

        assert!(matches!(
            h.service.delete_comment(&reporter, id, comment),
            Err(Error::Forbidden(_))
        ));

        h.service.delete_comment(&admin, id, comment).unwrap();
        assert_eq!(h.points(&author), 0);
        assert_eq!(h.points(&admin), 0);
        assert!(h.media.is_empty());
        assert!(h.service.tables().media.is_empty());
    }

    #[test]
    fn comment_must_belong_to_issue() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let a = h.report(&reporter, Category::Pothole, 1.0, 1.0);
        let b = h.report(&reporter, Category::Graffiti, 2.0, 2.0);
        let comment = h
            .service
            .add_comment(&reporter, a, "On a", Vec::new())
            .unwrap()
            .comment
            .id;

        assert!(matches!(
            h.service.delete_comment(&reporter, b, comment),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn listings_page_comments() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let other = h.user("ned", Role::Citizen);
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);
        for i in 0..25 {
            let who = if i % 5 == 0 { &other } else { &reporter };
            h.service
                .add_comment(who, id, &format!("comment {i}"), Vec::new())
                .unwrap();
        }

        let first = h.service.list_comments(id, PageRequest::default()).unwrap();
        assert_eq!(first.per_page, 20);
        assert_eq!(first.total, 25);
        assert_eq!(first.last_page, 2);
        assert_eq!(first.data[0].comment.body, "comment 0");

        let mine = h.service.my_comments(&other, PageRequest::default()).unwrap();
        assert_eq!(mine.total, 5);
        assert_eq!(mine.data[0].comment.body, "comment 20");
    }

    #[test]
    fn author_attaches_media() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let other = h.user("ned", Role::Citizen);
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);
        let comment = h
            .service
            .add_comment(&reporter, id, "Photo follows", Vec::new())
            .unwrap()
            .comment
            .id;
        let upload = || vec![Upload::new("clip.mov", "video/quicktime", vec![1, 2])];

        assert!(matches!(
            h.service.attach_comment_media(&other, id, comment, upload()),
            Err(Error::Forbidden(_))
        ));
        let media = h
            .service
            .attach_comment_media(&reporter, id, comment, upload())
            .unwrap();
        assert_eq!(media.len(), 1);

        let listed = h.service.list_comments(id, PageRequest::default()).unwrap();
        assert_eq!(listed.data[0].media.len(), 1);
    }
}
