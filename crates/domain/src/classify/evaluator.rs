use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared::types::{ProjectId, RuleId};

use super::{EventFacts, Query};

/// What a rule assigns when it matches
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleTarget {
    Project(ProjectId),
    Attended(bool),
}

/// Where a candidate rule came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrigin {
    User,
    Fingerprint,
}

/// A rule ready for evaluation: stored user rules and synthesized
/// fingerprint rules share this shape.
#[derive(Debug, Clone)]
pub struct RuleCandidate {
    pub id: Option<RuleId>,
    pub query: Query,
    pub target: RuleTarget,
    pub weight: f64,
    pub origin: RuleOrigin,
    pub created_at: DateTime<Utc>,
}

/// Per-project hints from which fingerprint rules are synthesized
#[derive(Debug, Clone)]
pub struct ProjectFingerprints {
    pub project_id: ProjectId,
    pub domains: Vec<String>,
    pub emails: Vec<String>,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of evaluating all rules against one event
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    /// Winning project, when confident enough to classify
    pub project_id: Option<ProjectId>,
    /// The stored rule that carried the decision (None for fingerprints)
    pub rule_id: Option<RuleId>,
    /// Origin of the winning rule
    pub origin: Option<RuleOrigin>,
    pub confidence: f64,
    pub needs_review: bool,
    pub is_skipped: bool,
    /// False means the event stays pending
    pub classified: bool,
}

impl ClassificationOutcome {
    fn pending() -> Self {
        Self {
            project_id: None,
            rule_id: None,
            origin: None,
            confidence: 0.0,
            needs_review: false,
            is_skipped: false,
            classified: false,
        }
    }
}

/// Synthesize one rule per fingerprint hint.
///
/// Hints that fail to parse as a query clause (empty strings, stray quotes)
/// are skipped rather than failing the whole evaluation.
pub fn synthesize_fingerprint_rules(projects: &[ProjectFingerprints]) -> Vec<RuleCandidate> {
    let mut rules = Vec::new();

    for project in projects {
        let clauses = project
            .domains
            .iter()
            .map(|d| format!("domain:\"{}\"", d))
            .chain(project.emails.iter().map(|e| format!("email:\"{}\"", e)))
            .chain(project.keywords.iter().map(|k| format!("title:\"{}\"", k)));

        for clause in clauses {
            if let Ok(query) = Query::parse(&clause) {
                rules.push(RuleCandidate {
                    id: None,
                    query,
                    target: RuleTarget::Project(project.project_id),
                    weight: 1.0,
                    origin: RuleOrigin::Fingerprint,
                    created_at: project.created_at,
                });
            }
        }
    }

    rules
}

#[derive(Debug)]
struct ProjectScore {
    total: f64,
    best_weight: f64,
    best_created_at: DateTime<Utc>,
    best_rule_id: Option<RuleId>,
    best_origin: RuleOrigin,
}

/// Evaluate every candidate rule against the event and score projects.
///
/// Project scoring sums rule weights per project; attendance rules apply
/// independently. Confidence compares the winning score against the
/// runner-up; low-confidence events stay pending, mid-band events are
/// flagged for review.
pub fn classify_event(event: &EventFacts, rules: &[RuleCandidate]) -> ClassificationOutcome {
    let matching: Vec<&RuleCandidate> = rules.iter().filter(|r| r.query.matches(event)).collect();

    let mut scores: HashMap<ProjectId, ProjectScore> = HashMap::new();
    let mut skip_rule: Option<&RuleCandidate> = None;

    for rule in &matching {
        match rule.target {
            RuleTarget::Project(project_id) => {
                let entry = scores.entry(project_id).or_insert(ProjectScore {
                    total: 0.0,
                    best_weight: f64::NEG_INFINITY,
                    best_created_at: rule.created_at,
                    best_rule_id: rule.id,
                    best_origin: rule.origin,
                });
                entry.total += rule.weight;

                let better = rule.weight > entry.best_weight
                    || (rule.weight == entry.best_weight
                        && rule.created_at > entry.best_created_at);
                if better {
                    entry.best_weight = rule.weight;
                    entry.best_created_at = rule.created_at;
                    entry.best_rule_id = rule.id;
                    entry.best_origin = rule.origin;
                }
            }
            RuleTarget::Attended(false) => {
                skip_rule = skip_rule.or(Some(*rule));
            }
            RuleTarget::Attended(true) => {}
        }
    }

    let is_skipped = skip_rule.is_some();

    if scores.is_empty() {
        if let Some(rule) = skip_rule {
            return ClassificationOutcome {
                project_id: None,
                rule_id: rule.id,
                origin: Some(rule.origin),
                confidence: 1.0,
                needs_review: false,
                is_skipped: true,
                classified: true,
            };
        }
        return ClassificationOutcome::pending();
    }

    // Winner: max total, then max single-rule weight, then newest rule,
    // then lexicographically smallest project id.
    let mut ranked: Vec<(&ProjectId, &ProjectScore)> = scores.iter().collect();
    ranked.sort_by(|(a_id, a), (b_id, b)| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.best_weight
                    .partial_cmp(&a.best_weight)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(b.best_created_at.cmp(&a.best_created_at))
            .then(a_id.to_string().cmp(&b_id.to_string()))
    });

    let (winner_id, winner) = ranked[0];
    let top_score = winner.total;
    let second_score = ranked.get(1).map(|(_, s)| s.total).unwrap_or(0.0);

    // An uncontested winner is fully confident; otherwise compare against
    // the runner-up. The winner's share of the pairwise total cannot drop
    // below one half, so an exact tie (0.5) is the floor: contested
    // outcomes always land at or above the review band, never in pending.
    let confidence = if second_score <= 0.0 {
        1.0
    } else {
        (top_score / (top_score + second_score)).min(1.0)
    };
    debug_assert!(confidence >= 0.5);

    ClassificationOutcome {
        project_id: Some(*winner_id),
        rule_id: winner.best_rule_id,
        origin: Some(winner.best_origin),
        confidence,
        needs_review: confidence < 0.8,
        is_skipped,
        classified: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn project(n: u128) -> ProjectId {
        ProjectId::from_uuid(Uuid::from_u128(n))
    }

    fn rule_id(n: u128) -> RuleId {
        RuleId::from_uuid(Uuid::from_u128(n))
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn user_rule(id: u128, query: &str, target: RuleTarget, weight: f64, hour: u32) -> RuleCandidate {
        RuleCandidate {
            id: Some(rule_id(id)),
            query: Query::parse(query).unwrap(),
            target,
            weight,
            origin: RuleOrigin::User,
            created_at: at(hour),
        }
    }

    fn acme_event() -> EventFacts {
        EventFacts {
            title: "Sync".to_string(),
            attendee_emails: vec!["alice@acme.com".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_no_match_stays_pending() {
        let rules = vec![user_rule(
            1,
            "title:standup",
            RuleTarget::Project(project(1)),
            1.0,
            0,
        )];
        let outcome = classify_event(&acme_event(), &rules);
        assert!(!outcome.classified);
        assert_eq!(outcome.project_id, None);
    }

    #[test]
    fn test_single_match_full_confidence() {
        let rules = vec![user_rule(
            1,
            "domain:acme.com",
            RuleTarget::Project(project(1)),
            1.0,
            0,
        )];
        let outcome = classify_event(&acme_event(), &rules);
        assert!(outcome.classified);
        assert_eq!(outcome.project_id, Some(project(1)));
        assert_eq!(outcome.confidence, 1.0);
        assert!(!outcome.needs_review);
        assert_eq!(outcome.origin, Some(RuleOrigin::User));
        assert_eq!(outcome.rule_id, Some(rule_id(1)));
    }

    #[test]
    fn test_fingerprint_classification() {
        let fingerprints = vec![ProjectFingerprints {
            project_id: project(7),
            domains: vec!["acme.com".to_string()],
            emails: vec![],
            keywords: vec![],
            created_at: at(0),
        }];
        let rules = synthesize_fingerprint_rules(&fingerprints);
        let outcome = classify_event(&acme_event(), &rules);

        assert!(outcome.classified);
        assert_eq!(outcome.project_id, Some(project(7)));
        assert_eq!(outcome.confidence, 1.0);
        assert_eq!(outcome.origin, Some(RuleOrigin::Fingerprint));
        assert_eq!(outcome.rule_id, None);
    }

    #[test]
    fn test_weight_sums_decide_winner() {
        let rules = vec![
            user_rule(1, "title:sync", RuleTarget::Project(project(1)), 1.0, 0),
            user_rule(2, "domain:acme.com", RuleTarget::Project(project(1)), 1.0, 1),
            user_rule(3, "title:sync", RuleTarget::Project(project(2)), 1.5, 2),
        ];
        let outcome = classify_event(&acme_event(), &rules);
        // Project 1 totals 2.0, project 2 totals 1.5
        assert_eq!(outcome.project_id, Some(project(1)));
        assert!((outcome.confidence - 2.0 / 3.5).abs() < 1e-6);
        assert!(outcome.needs_review); // 0.57 lands in the review band
    }

    #[test]
    fn test_tie_broken_by_single_rule_weight() {
        let rules = vec![
            user_rule(1, "title:sync", RuleTarget::Project(project(1)), 2.0, 0),
            user_rule(2, "title:sync", RuleTarget::Project(project(2)), 1.5, 0),
            user_rule(3, "domain:acme.com", RuleTarget::Project(project(2)), 0.5, 0),
        ];
        // Both projects total 2.0; project 1 has the heavier single rule
        let outcome = classify_event(&acme_event(), &rules);
        assert_eq!(outcome.project_id, Some(project(1)));
    }

    #[test]
    fn test_tie_broken_by_newest_rule() {
        let rules = vec![
            user_rule(1, "title:sync", RuleTarget::Project(project(1)), 1.0, 0),
            user_rule(2, "title:sync", RuleTarget::Project(project(2)), 1.0, 5),
        ];
        let outcome = classify_event(&acme_event(), &rules);
        assert_eq!(outcome.project_id, Some(project(2)));
    }

    #[test]
    fn test_tie_broken_by_project_id() {
        let rules = vec![
            user_rule(1, "title:sync", RuleTarget::Project(project(2)), 1.0, 0),
            user_rule(2, "title:sync", RuleTarget::Project(project(1)), 1.0, 0),
        ];
        let outcome = classify_event(&acme_event(), &rules);
        assert_eq!(outcome.project_id, Some(project(1)));
    }

    #[test]
    fn test_exact_tie_lands_in_review_band() {
        let rules = vec![
            user_rule(1, "title:sync", RuleTarget::Project(project(1)), 0.4, 0),
            user_rule(2, "title:sync", RuleTarget::Project(project(2)), 1.0, 0),
            user_rule(3, "domain:acme.com", RuleTarget::Project(project(3)), 1.0, 0),
        ];
        // top = 1.0, second = 1.0, confidence exactly 0.5
        let outcome = classify_event(&acme_event(), &rules);
        assert!(outcome.classified);
        assert!(outcome.needs_review);
        assert!((outcome.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_skip_rule_marks_did_not_attend() {
        let rules = vec![user_rule(
            1,
            "response:declined",
            RuleTarget::Attended(false),
            1.0,
            0,
        )];
        let mut event = acme_event();
        event.response_status = Some("declined".to_string());

        let outcome = classify_event(&event, &rules);
        assert!(outcome.classified);
        assert!(outcome.is_skipped);
        assert_eq!(outcome.project_id, None);
    }

    #[test]
    fn test_skip_applies_alongside_project() {
        let rules = vec![
            user_rule(1, "domain:acme.com", RuleTarget::Project(project(1)), 1.0, 0),
            user_rule(2, "response:declined", RuleTarget::Attended(false), 1.0, 0),
        ];
        let mut event = acme_event();
        event.response_status = Some("declined".to_string());

        let outcome = classify_event(&event, &rules);
        assert_eq!(outcome.project_id, Some(project(1)));
        assert!(outcome.is_skipped);
    }

    #[test]
    fn test_attended_true_rule_is_inert() {
        let rules = vec![user_rule(
            1,
            "title:sync",
            RuleTarget::Attended(true),
            1.0,
            0,
        )];
        let outcome = classify_event(&acme_event(), &rules);
        assert!(!outcome.is_skipped);
        assert!(!outcome.classified);
    }
}
