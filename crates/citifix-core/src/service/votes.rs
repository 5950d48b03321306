use super::{apply_transition, IssueView, Service};
use crate::issue::{IssueId, Status};
use crate::pagination::{Page, PageRequest};
use crate::points::PointEvent;
use crate::rules;
use crate::user::{Actor, PublicUser};
use crate::vote::Vote;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// State of an issue after a vote or unvote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteOutcome {
    pub issue_id: IssueId,
    pub votes_count: u32,
    pub user_has_voted: bool,
    pub status: Status,
    /// This vote crossed the threshold and verified the issue
    pub auto_verified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoterView {
    pub user: PublicUser,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VotedIssue {
    pub issue: IssueView,
    pub voted_at: DateTime<Utc>,
}

impl Service {
    /// Upvote an issue. The reporter earns points and the issue may verify
    /// itself once enough votes are in.
    pub fn vote(&mut self, actor: &Actor, issue_id: IssueId) -> Result<VoteOutcome> {
        let threshold = self.config.rules.auto_verify_threshold;

        let outcome = self.commit(|tx| {
            tx.user(actor.user_id)?;
            tx.issue(issue_id)?;
            if tx.vote_of(issue_id, actor.user_id).is_some() {
                return Err(Error::Conflict(
                    "You have already voted for this issue".into(),
                ));
            }

            let vote = Vote::new(tx.next_vote_id(), issue_id, actor.user_id);
            tx.votes.insert(vote.id, vote);

            let issue = tx.issue_mut(issue_id)?;
            issue.votes_count += 1;
            let reporter = issue.reporter_id;
            let transition = rules::auto_verify(issue, threshold);
            let votes_count = issue.votes_count;
            let status = issue.status;

            tx.award(reporter, PointEvent::VoteReceived)?;
            if let Some(transition) = transition {
                apply_transition(tx, issue_id, transition)?;
            }

            Ok(VoteOutcome {
                issue_id,
                votes_count,
                user_has_voted: true,
                status,
                auto_verified: transition.is_some(),
            })
        })?;

        tracing::debug!(issue = issue_id, user = actor.user_id, votes = outcome.votes_count, "vote cast");
        if outcome.auto_verified {
            tracing::info!(issue = issue_id, votes = outcome.votes_count, "issue auto-verified");
        }
        Ok(outcome)
    }

    /// Take a vote back. The status never reverts.
    pub fn unvote(&mut self, actor: &Actor, issue_id: IssueId) -> Result<VoteOutcome> {
        let outcome = self.commit(|tx| {
            tx.issue(issue_id)?;
            let vote_id = tx
                .vote_of(issue_id, actor.user_id)
                .map(|v| v.id)
                .ok_or_else(|| Error::Conflict("You have not voted for this issue".into()))?;
            tx.votes.remove(&vote_id);

            let issue = tx.issue_mut(issue_id)?;
            issue.votes_count = issue.votes_count.saturating_sub(1);
            let reporter = issue.reporter_id;
            let votes_count = issue.votes_count;
            let status = issue.status;

            tx.award(reporter, PointEvent::VoteRetracted)?;

            Ok(VoteOutcome {
                issue_id,
                votes_count,
                user_has_voted: false,
                status,
                auto_verified: false,
            })
        })?;

        tracing::debug!(issue = issue_id, user = actor.user_id, votes = outcome.votes_count, "vote retracted");
        Ok(outcome)
    }

    /// Who voted on an issue, most recent first
    pub fn voters(&self, issue_id: IssueId, page: PageRequest) -> Result<Page<VoterView>> {
        let tables = self.tables();
        tables.issue(issue_id)?;
        let (page, per_page) = self.per_page(page);

        let mut votes: Vec<&Vote> = tables.votes_for(issue_id).collect();
        votes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let voters = votes
            .into_iter()
            .filter_map(|vote| {
                tables.users.get(&vote.user_id).map(|user| VoterView {
                    user: user.public(),
                    voted_at: vote.created_at,
                })
            })
            .collect();

        Ok(Page::slice(voters, page, per_page))
    }

    /// Issues the actor has voted on, most recent vote first
    pub fn my_votes(&self, actor: &Actor, page: PageRequest) -> Result<Page<VotedIssue>> {
        let tables = self.tables();
        let (page, per_page) = self.per_page(page);

        let mut votes: Vec<&Vote> = tables
            .votes
            .values()
            .filter(|v| v.user_id == actor.user_id)
            .collect();
        votes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let voted = votes
            .into_iter()
            .filter_map(|vote| {
                tables.issue(vote.issue_id).ok().map(|issue| VotedIssue {
                    issue: IssueView::build(tables, issue, actor.user_id),
                    voted_at: vote.created_at,
                })
            })
            .collect();

        Ok(Page::slice(voted, page, per_page))
    }
}

#[cfg(test)]
mod tests {
    use crate::issue::{Category, IssueUpdate, Status};
    use crate::notification::NotificationEvent;
    use crate::pagination::PageRequest;
    use crate::service::testing::Harness;
    use crate::user::Role;
    use crate::Error;

    #[test]
    fn vote_count_tracks_vote_rows() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let voters: Vec<_> = (0..4)
            .map(|i| h.user(&format!("voter{i}"), Role::Citizen))
            .collect();
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);

        h.service.vote(&voters[0], id).unwrap();
        h.service.vote(&voters[1], id).unwrap();
        h.service.unvote(&voters[0], id).unwrap();
        h.service.vote(&voters[2], id).unwrap();
        h.service.vote(&voters[0], id).unwrap();
        h.service.unvote(&voters[1], id).unwrap();

        let tables = h.service.tables();
        let issue = tables.issue(id).unwrap();
        assert_eq!(issue.votes_count as usize, tables.votes_for(id).count());
        assert_eq!(issue.votes_count, 2);
        // 10 + 4 votes * 5 - 2 retractions * 5
        assert_eq!(h.points(&reporter), 20);
    }

    #[test]
    fn second_vote_conflicts_without_side_effects() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let voter = h.user("vic", Role::Citizen);
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);

        h.service.vote(&voter, id).unwrap();
        let err = h.service.vote(&voter, id).unwrap_err();
        assert!(matches!(err, Error::Conflict(ref m) if m == "You have already voted for this issue"));

        assert_eq!(h.service.tables().issue(id).unwrap().votes_count, 1);
        assert_eq!(h.points(&reporter), 15);
    }

    #[test]
    fn unvote_without_vote_conflicts() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let voter = h.user("vic", Role::Citizen);
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);

        let err = h.service.unvote(&voter, id).unwrap_err();
        assert!(matches!(err, Error::Conflict(ref m) if m == "You have not voted for this issue"));
        assert_eq!(h.points(&reporter), 10);
    }

    #[test]
    fn third_vote_verifies_exactly_once() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let voters: Vec<_> = (0..5)
            .map(|i| h.user(&format!("voter{i}"), Role::Citizen))
            .collect();
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);

        let outcomes: Vec<_> = voters
            .iter()
            .map(|v| h.service.vote(v, id).unwrap())
            .collect();

        let verified: Vec<bool> = outcomes.iter().map(|o| o.auto_verified).collect();
        assert_eq!(verified, vec![false, false, true, false, false]);
        assert_eq!(outcomes[2].status, Status::Verified);

        let issue = h.service.tables().issue(id).unwrap();
        assert!(issue.auto_verified_at.is_some());
        // 10 + 5 * 5 + 15
        assert_eq!(h.points(&reporter), 50);

        let changes = h
            .dispatcher
            .sent()
            .into_iter()
            .filter(|n| matches!(n.data, NotificationEvent::StatusChanged { .. }))
            .count();
        assert_eq!(changes, 1);
    }

    #[test]
    fn unvote_keeps_status() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let voters: Vec<_> = (0..3)
            .map(|i| h.user(&format!("voter{i}"), Role::Citizen))
            .collect();
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);
        for v in &voters {
            h.service.vote(v, id).unwrap();
        }

        let outcome = h.service.unvote(&voters[0], id).unwrap();
        assert_eq!(outcome.status, Status::Verified);
        assert_eq!(outcome.votes_count, 2);

        // Back to three votes does not verify a second time
        h.service.vote(&voters[0], id).unwrap();
        assert_eq!(h.points(&reporter), 10 + 15 + 15 + 5);
    }

    #[test]
    fn auto_verify_skips_issues_past_reported() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let officer = h.user("olga", Role::Officer);
        let voters: Vec<_> = (0..3)
            .map(|i| h.user(&format!("voter{i}"), Role::Citizen))
            .collect();
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);

        let update = IssueUpdate {
            status: Some(Status::InProgress),
            ..Default::default()
        };
        h.service.update_issue(&officer, id, update).unwrap();

        for v in &voters {
            assert!(!h.service.vote(v, id).unwrap().auto_verified);
        }
        assert_eq!(
            h.service.tables().issue(id).unwrap().status,
            Status::InProgress
        );
    }

    #[test]
    fn reporter_reaches_fifty_five_points() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let officer = h.user("olga", Role::Officer);
        let voter = h.user("vic", Role::Citizen);
        let id = h.report(&reporter, Category::Pothole, 1.0, 1.0);

        for status in [Status::Verified, Status::Resolved] {
            let update = IssueUpdate {
                status: Some(status),
                ..Default::default()
            };
            h.service.update_issue(&officer, id, update).unwrap();
        }
        h.service.vote(&voter, id).unwrap();

        assert_eq!(h.points(&reporter), 55);
    }

    #[test]
    fn voting_on_missing_issue_is_not_found() {
        let mut h = Harness::new();
        let voter = h.user("vic", Role::Citizen);
        assert!(matches!(h.service.vote(&voter, 99), Err(Error::NotFound(_))));
        assert!(h.service.tables().votes.is_empty());
    }

    #[test]
    fn lists_voters_and_my_votes() {
        let mut h = Harness::new();
        let reporter = h.user("rita", Role::Citizen);
        let voter = h.user("vic", Role::Citizen);
        let a = h.report(&reporter, Category::Pothole, 1.0, 1.0);
        let b = h.report(&reporter, Category::Graffiti, 2.0, 2.0);

        h.service.vote(&voter, a).unwrap();
        h.service.vote(&voter, b).unwrap();
        h.service.vote(&reporter, a).unwrap();

        let voters = h.service.voters(a, PageRequest::default()).unwrap();
        assert_eq!(voters.total, 2);

        let mine = h.service.my_votes(&voter, PageRequest::default()).unwrap();
        assert_eq!(mine.total, 2);
        assert!(mine.data.iter().all(|v| v.issue.user_has_voted));

        assert!(matches!(
            h.service.voters(42, PageRequest::default()),
            Err(Error::NotFound(_))
        ));
    }
}
