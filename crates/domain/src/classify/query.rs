use std::fmt;

use unicode_normalization::UnicodeNormalization;

use super::EventFacts;

/// Recognized query fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    Domain,
    Email,
    Organizer,
    AttendeeCount,
    Response,
    Recurring,
    Transparency,
}

impl Field {
    fn parse(s: &str) -> Option<Field> {
        match s.to_ascii_lowercase().as_str() {
            "title" => Some(Field::Title),
            "description" => Some(Field::Description),
            "domain" => Some(Field::Domain),
            "email" => Some(Field::Email),
            "organizer" => Some(Field::Organizer),
            "attendee_count" => Some(Field::AttendeeCount),
            "response" => Some(Field::Response),
            "recurring" => Some(Field::Recurring),
            "transparency" => Some(Field::Transparency),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Domain => "domain",
            Field::Email => "email",
            Field::Organizer => "organizer",
            Field::AttendeeCount => "attendee_count",
            Field::Response => "response",
            Field::Recurring => "recurring",
            Field::Transparency => "transparency",
        };
        write!(f, "{}", name)
    }
}

/// Integer comparison operators for `attendee_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Gt,
    Eq,
}

#[derive(Debug, Clone, PartialEq)]
enum Matcher {
    /// Normalized needle for substring / equality matching
    Text(String),
    Count { op: CmpOp, value: i64 },
    Flag(bool),
}

/// One `field:value` clause, possibly negated
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: Field,
    pub negated: bool,
    matcher: Matcher,
}

/// A parsed rule query: space-separated clauses combined by implicit AND.
///
/// Parsing happens at rule save time so that unknown fields and malformed
/// clauses are rejected before a rule is ever stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    clauses: Vec<Clause>,
}

/// Errors produced while parsing a query string
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("malformed clause: {0}")]
    Malformed(String),

    #[error("query has no clauses")]
    Empty,
}

impl Query {
    pub fn parse(input: &str) -> Result<Query, QueryError> {
        let mut clauses = Vec::new();

        for token in tokenize(input)? {
            let (negated, body) = match token.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, token.as_str()),
            };

            let (field_str, value) = body
                .split_once(':')
                .ok_or_else(|| QueryError::Malformed(token.clone()))?;

            let field = Field::parse(field_str)
                .ok_or_else(|| QueryError::UnknownField(field_str.to_string()))?;

            if value.is_empty() {
                return Err(QueryError::Malformed(token.clone()));
            }

            let matcher = match field {
                Field::AttendeeCount => parse_count(value, &token)?,
                Field::Recurring => match value.to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Matcher::Flag(true),
                    "false" | "no" | "0" => Matcher::Flag(false),
                    _ => return Err(QueryError::Malformed(token.clone())),
                },
                _ => Matcher::Text(normalize(value)),
            };

            clauses.push(Clause {
                field,
                negated,
                matcher,
            });
        }

        if clauses.is_empty() {
            return Err(QueryError::Empty);
        }

        Ok(Query { clauses })
    }

    /// True when every clause matches the event
    pub fn matches(&self, event: &EventFacts) -> bool {
        self.clauses.iter().all(|c| clause_matches(c, event))
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

fn parse_count(value: &str, token: &str) -> Result<Matcher, QueryError> {
    let (op, digits) = match value.as_bytes().first() {
        Some(b'<') => (CmpOp::Lt, &value[1..]),
        Some(b'>') => (CmpOp::Gt, &value[1..]),
        Some(b'=') => (CmpOp::Eq, &value[1..]),
        _ => (CmpOp::Eq, value),
    };

    let value: i64 = digits
        .parse()
        .map_err(|_| QueryError::Malformed(token.to_string()))?;

    Ok(Matcher::Count { op, value })
}

fn clause_matches(clause: &Clause, event: &EventFacts) -> bool {
    let hit = match (&clause.matcher, clause.field) {
        (Matcher::Text(needle), Field::Title) => normalize(&event.title).contains(needle),
        (Matcher::Text(needle), Field::Description) => event
            .description
            .as_deref()
            .map(|d| normalize(d).contains(needle))
            .unwrap_or(false),
        (Matcher::Text(needle), Field::Domain) => event
            .attendee_emails
            .iter()
            .any(|e| email_domain(e).map(|d| normalize(d) == *needle).unwrap_or(false)),
        (Matcher::Text(needle), Field::Email) => event
            .attendee_emails
            .iter()
            .any(|e| normalize(e) == *needle),
        (Matcher::Text(needle), Field::Organizer) => event
            .organizer_email
            .as_deref()
            .map(|o| normalize(o) == *needle)
            .unwrap_or(false),
        (Matcher::Text(needle), Field::Response) => event
            .response_status
            .as_deref()
            .map(|r| normalize(r) == *needle)
            .unwrap_or(false),
        (Matcher::Text(needle), Field::Transparency) => event
            .transparency
            .as_deref()
            .map(|t| normalize(t) == *needle)
            .unwrap_or(false),
        (Matcher::Count { op, value }, Field::AttendeeCount) => {
            let count = event.attendee_emails.len() as i64;
            match op {
                CmpOp::Lt => count < *value,
                CmpOp::Gt => count > *value,
                CmpOp::Eq => count == *value,
            }
        }
        (Matcher::Flag(expected), Field::Recurring) => event.is_recurring == *expected,
        // Parser never produces these combinations
        _ => false,
    };

    hit != clause.negated
}

/// NFC-normalize and lowercase for comparison
fn normalize(s: &str) -> String {
    s.nfc().collect::<String>().to_lowercase()
}

fn email_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, domain)| domain)
}

/// Split on whitespace, keeping `field:"quoted phrase"` tokens intact
fn tokenize(input: &str) -> Result<Vec<String>, QueryError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err(QueryError::Malformed("unterminated quote".to_string()));
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> EventFacts {
        EventFacts {
            title: "Weekly Sync".to_string(),
            description: Some("Planning for Q1".to_string()),
            attendee_emails: vec![
                "alice@acme.com".to_string(),
                "bob@example.org".to_string(),
            ],
            organizer_email: Some("alice@acme.com".to_string()),
            response_status: Some("accepted".to_string()),
            is_recurring: true,
            transparency: Some("opaque".to_string()),
            start_time: None,
        }
    }

    #[test]
    fn test_title_substring_case_insensitive() {
        let q = Query::parse("title:sync").unwrap();
        assert!(q.matches(&event()));

        let q = Query::parse("title:standup").unwrap();
        assert!(!q.matches(&event()));
    }

    #[test]
    fn test_quoted_phrase() {
        let q = Query::parse(r#"title:"weekly sync""#).unwrap();
        assert!(q.matches(&event()));

        let q = Query::parse(r#"title:"weekly standup""#).unwrap();
        assert!(!q.matches(&event()));
    }

    #[test]
    fn test_negation() {
        let q = Query::parse("-title:standup").unwrap();
        assert!(q.matches(&event()));

        let q = Query::parse("-title:sync").unwrap();
        assert!(!q.matches(&event()));
    }

    #[test]
    fn test_implicit_and() {
        let q = Query::parse("title:sync domain:acme.com").unwrap();
        assert!(q.matches(&event()));

        let q = Query::parse("title:sync domain:nowhere.io").unwrap();
        assert!(!q.matches(&event()));
    }

    #[test]
    fn test_domain_and_email() {
        assert!(Query::parse("domain:acme.com").unwrap().matches(&event()));
        assert!(Query::parse("email:bob@example.org")
            .unwrap()
            .matches(&event()));
        assert!(!Query::parse("email:example.org").unwrap().matches(&event()));
    }

    #[test]
    fn test_organizer() {
        assert!(Query::parse("organizer:alice@acme.com")
            .unwrap()
            .matches(&event()));
        assert!(!Query::parse("organizer:bob@example.org")
            .unwrap()
            .matches(&event()));
    }

    #[test]
    fn test_attendee_count_operators() {
        assert!(Query::parse("attendee_count:2").unwrap().matches(&event()));
        assert!(Query::parse("attendee_count:=2").unwrap().matches(&event()));
        assert!(Query::parse("attendee_count:>1").unwrap().matches(&event()));
        assert!(Query::parse("attendee_count:<3").unwrap().matches(&event()));
        assert!(!Query::parse("attendee_count:>5").unwrap().matches(&event()));
    }

    #[test]
    fn test_recurring_and_response() {
        assert!(Query::parse("recurring:true").unwrap().matches(&event()));
        assert!(!Query::parse("recurring:false").unwrap().matches(&event()));
        assert!(Query::parse("response:accepted").unwrap().matches(&event()));
        assert!(Query::parse("transparency:opaque")
            .unwrap()
            .matches(&event()));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Query::parse("subject:foo").unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(f) if f == "subject"));
    }

    #[test]
    fn test_malformed_clause_rejected() {
        assert!(matches!(
            Query::parse("title"),
            Err(QueryError::Malformed(_))
        ));
        assert!(matches!(
            Query::parse("attendee_count:abc"),
            Err(QueryError::Malformed(_))
        ));
        assert!(matches!(Query::parse("   "), Err(QueryError::Empty)));
    }

    #[test]
    fn test_unicode_normalization() {
        // Composed vs decomposed e-acute compare equal after NFC
        let mut e = event();
        e.title = "Caf\u{0065}\u{0301} planning".to_string();
        let q = Query::parse("title:caf\u{00e9}").unwrap();
        assert!(q.matches(&e));
    }

    #[test]
    fn test_field_case_insensitive() {
        assert!(Query::parse("TITLE:sync").unwrap().matches(&event()));
    }
}
