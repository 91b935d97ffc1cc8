use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Named collections the dashboards read and write as whole JSON arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Jobs,
    Proposals,
    Messages,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Jobs, Collection::Proposals, Collection::Messages];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Jobs => "jobs",
            Collection::Proposals => "proposals",
            Collection::Messages => "messages",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jobs" => Ok(Collection::Jobs),
            "proposals" => Ok(Collection::Proposals),
            "messages" => Ok(Collection::Messages),
            other => Err(format!("unknown collection: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Open,
    InProgress,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub client_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub budget: u32,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub skills_required: Vec<String>,
    pub status: JobStatus,
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub applicants: u32,
}

impl Job {
    /// Case-insensitive match on title, description or any required skill.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&term)
            || self.description.to_lowercase().contains(&term)
            || self
                .skills_required
                .iter()
                .any(|skill| skill.to_lowercase().contains(&term))
    }

    /// `"All"` matches every category.
    pub fn matches_category(&self, category: &str) -> bool {
        category == ALL_CATEGORIES || self.category == category
    }
}

pub const ALL_CATEGORIES: &str = "All";

pub const CATEGORIES: [&str; 5] = [
    ALL_CATEGORIES,
    "Web Development",
    "Design",
    "Mobile Development",
    "Writing",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
}

impl std::str::FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProposalStatus::Pending),
            "accept" | "accepted" => Ok(ProposalStatus::Accepted),
            "reject" | "rejected" => Ok(ProposalStatus::Rejected),
            other => Err(format!("unknown proposal status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freelancer_id: Option<String>,
    pub freelancer_name: String,
    pub job_title: String,
    pub cover_letter: String,
    pub proposed_budget: u32,
    /// Days
    pub timeline: u32,
    pub status: ProposalStatus,
}

/// Conversation summary shown in the inbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<String>,
    pub last_message: String,
    pub timestamp: DateTime<Utc>,
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .unwrap_or_default()
}

pub fn demo_jobs() -> Vec<Job> {
    vec![
        Job {
            id: "job_1".to_string(),
            client_id: "client_123".to_string(),
            title: "Website Development".to_string(),
            description: "Develop a responsive website".to_string(),
            category: "Web Development".to_string(),
            budget: 3000,
            deadline: utc(2025, 7, 1, 0, 0),
            skills_required: vec!["React".into(), "CSS".into(), "HTML".into()],
            status: JobStatus::Open,
            posted_at: utc(2025, 5, 1, 0, 0),
            applicants: 5,
        },
        Job {
            id: "job_2".to_string(),
            client_id: "client_123".to_string(),
            title: "Mobile App Design".to_string(),
            description: "Design UI/UX for a mobile app".to_string(),
            category: "Design".to_string(),
            budget: 1500,
            deadline: utc(2025, 6, 15, 0, 0),
            skills_required: vec!["Figma".into(), "Adobe XD".into()],
            status: JobStatus::InProgress,
            posted_at: utc(2025, 4, 15, 0, 0),
            applicants: 3,
        },
    ]
}

pub fn demo_proposals() -> Vec<Proposal> {
    vec![
        Proposal {
            id: "proposal_1".to_string(),
            job_id: "job_1".to_string(),
            freelancer_id: None,
            freelancer_name: "John Doe".to_string(),
            job_title: "Website Development".to_string(),
            cover_letter: "I have 5 years experience in React.".to_string(),
            proposed_budget: 2800,
            timeline: 30,
            status: ProposalStatus::Pending,
        },
        Proposal {
            id: "proposal_2".to_string(),
            job_id: "job_2".to_string(),
            freelancer_id: None,
            freelancer_name: "Jane Smith".to_string(),
            job_title: "Mobile App Design".to_string(),
            cover_letter: "Expert in mobile UI/UX design.".to_string(),
            proposed_budget: 1400,
            timeline: 20,
            status: ProposalStatus::Accepted,
        },
    ]
}

pub fn demo_messages() -> Vec<Conversation> {
    vec![
        Conversation {
            id: "msg_1".to_string(),
            participants: vec!["client_123".into(), "freelancer_1".into()],
            last_message: "Looking forward to starting the project!".to_string(),
            timestamp: utc(2025, 5, 20, 10, 0),
        },
        Conversation {
            id: "msg_2".to_string(),
            participants: vec!["client_123".into(), "freelancer_2".into()],
            last_message: "Can you provide more details on the requirements?".to_string(),
            timestamp: utc(2025, 5, 22, 15, 30),
        },
    ]
}

/// Seed payload for a collection, as the JSON array stored on first read
pub fn demo_payload(collection: Collection) -> serde_json::Value {
    let value = match collection {
        Collection::Jobs => serde_json::to_value(demo_jobs()),
        Collection::Proposals => serde_json::to_value(demo_proposals()),
        Collection::Messages => serde_json::to_value(demo_messages()),
    };
    value.unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_matches_skills_case_insensitively() {
        let jobs = demo_jobs();
        let hits: Vec<_> = jobs.iter().filter(|j| j.matches_search("figma")).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "job_2");
    }

    #[test]
    fn all_category_matches_everything() {
        assert!(demo_jobs().iter().all(|j| j.matches_category("All")));
        assert_eq!(
            demo_jobs().iter().filter(|j| j.matches_category("Design")).count(),
            1
        );
    }

    #[test]
    fn demo_payload_is_camel_case_array() {
        let payload = demo_payload(Collection::Jobs);
        let first = &payload.as_array().unwrap()[0];
        assert_eq!(first["skillsRequired"][0], "React");
        assert_eq!(first["status"], "open");
        assert_eq!(demo_payload(Collection::Jobs)[1]["status"], "in-progress");
    }

    #[test]
    fn proposal_status_accepts_review_verbs() {
        assert_eq!("accept".parse::<ProposalStatus>(), Ok(ProposalStatus::Accepted));
        assert_eq!("reject".parse::<ProposalStatus>(), Ok(ProposalStatus::Rejected));
        assert!("maybe".parse::<ProposalStatus>().is_err());
    }
}
