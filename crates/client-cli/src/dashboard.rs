//! Dashboard commands. Each one checks the router put the user on the
//! matching dashboard before touching any data.

use std::collections::BTreeSet;

use anyhow::{anyhow, bail, Result};
use chrono::{Duration, Utc};
use hub_core::{DenialReason, FreemiumGate, GateDecision, PlanState, ProfileStore, FREE_ACTION_LIMIT};
use shared::demo::CATEGORIES;
use shared::{
    Collection, Conversation, Job, JobStatus, Plan, ProfilePatch, Proposal, ProposalStatus, Role,
};
use uuid::Uuid;

use crate::app::App;

/// Open jobs matching the search term (if any) and category
pub fn filter_jobs<'a>(jobs: &'a [Job], search: Option<&str>, category: &str) -> Vec<&'a Job> {
    jobs.iter()
        .filter(|job| job.status == JobStatus::Open)
        .filter(|job| search.map_or(true, |term| job.matches_search(term)))
        .filter(|job| job.matches_category(category))
        .collect()
}

fn plan_banner(gate: &FreemiumGate) -> String {
    match gate.plan_state() {
        PlanState::PlanUnset => "No plan selected. Run `hub plan free` or `hub plan premium`.".to_string(),
        PlanState::PlanFree => format!(
            "Free plan: {} of {} proposal(s) left",
            gate.remaining_free_actions().unwrap_or(0),
            FREE_ACTION_LIMIT
        ),
        PlanState::PlanPremium => "Premium plan: unlimited proposals".to_string(),
    }
}

// ============================================================================
// Freelancer
// ============================================================================

pub async fn list_jobs(app: &App, search: Option<&str>, category: &str) -> Result<()> {
    app.require_dashboard(Role::Freelancer)?;
    let jobs: Vec<Job> = app.collections.fetch(Collection::Jobs).await?;
    let matching = filter_jobs(&jobs, search, category);

    if matching.is_empty() {
        println!("No open jobs match.");
        return Ok(());
    }
    for job in matching {
        println!("\x1b[1m{}\x1b[0m  {} (${})", job.id, job.title, job.budget);
        println!("    {} | due {}", job.category, job.deadline.format("%Y-%m-%d"));
        println!("    {}", job.description);
        if !job.skills_required.is_empty() {
            println!("    skills: {}", job.skills_required.join(", "));
        }
        println!("    {} applicant(s)", job.applicants);
    }
    Ok(())
}

pub async fn choose_plan(app: &App, plan: Plan) -> Result<()> {
    let id = app.require_dashboard(Role::Freelancer)?;
    let mut gate = app.gate(&id).await?;
    gate.select_plan(plan).await?;
    println!("\x1b[32m✓\x1b[0m {}", plan_banner(&gate));
    Ok(())
}

pub async fn upgrade(app: &App) -> Result<()> {
    let id = app.require_dashboard(Role::Freelancer)?;
    let mut gate = app.gate(&id).await?;
    gate.upgrade().await?;
    println!("\x1b[32m✓\x1b[0m {}", plan_banner(&gate));
    Ok(())
}

pub struct ProposalDraft {
    pub job_id: String,
    pub bid: Option<u32>,
    pub days: u32,
    pub cover_letter: String,
}

/// Submit a proposal: the quota-limited action of the free plan
pub async fn propose(app: &App, draft: ProposalDraft) -> Result<()> {
    let id = app.require_dashboard(Role::Freelancer)?;
    let mut gate = app.gate(&id).await?;

    match gate.attempt_gated_action() {
        GateDecision::Permitted => {}
        GateDecision::Denied(DenialReason::PlanNotSelected) => {
            bail!("Choose a plan first: `hub plan free` or `hub plan premium`")
        }
        GateDecision::Denied(DenialReason::QuotaExceeded) => bail!(
            "The free plan allows {} proposal(s). Run `hub upgrade` for unlimited proposals.",
            FREE_ACTION_LIMIT
        ),
    }

    let mut jobs: Vec<Job> = app.collections.fetch(Collection::Jobs).await?;
    let job = jobs
        .iter_mut()
        .find(|job| job.id == draft.job_id && job.status == JobStatus::Open)
        .ok_or_else(|| anyhow!("No open job with id {}", draft.job_id))?;

    let profile = app
        .profiles
        .get(&id)
        .await?
        .ok_or_else(|| anyhow!("Profile for {} is missing", id))?;

    let proposal = Proposal {
        id: format!("proposal_{}", Uuid::new_v4().simple()),
        job_id: job.id.clone(),
        freelancer_id: Some(id.clone()),
        freelancer_name: profile.name,
        job_title: job.title.clone(),
        cover_letter: draft.cover_letter,
        proposed_budget: draft.bid.unwrap_or(job.budget),
        timeline: draft.days,
        status: ProposalStatus::Pending,
    };
    job.applicants += 1;

    let mut proposals: Vec<Proposal> = app.collections.fetch(Collection::Proposals).await?;
    proposals.push(proposal.clone());
    app.collections.store(Collection::Proposals, &proposals).await?;
    app.collections.store(Collection::Jobs, &jobs).await?;

    gate.record_usage().await?;
    tracing::info!("{} submitted {} for {}", id, proposal.id, proposal.job_id);

    println!(
        "\x1b[32m✓\x1b[0m Proposal {} sent for \"{}\"",
        proposal.id, proposal.job_title
    );
    println!("  {}", plan_banner(&gate));
    Ok(())
}

// ============================================================================
// Both dashboards
// ============================================================================

pub async fn show_profile(app: &App) -> Result<()> {
    let (id, role) = app.require_any_dashboard()?;
    let profile = app
        .profiles
        .get(&id)
        .await?
        .ok_or_else(|| anyhow!("Profile for {} is missing", id))?;

    println!("\x1b[1m{}\x1b[0m <{}>  [{}]", profile.name, profile.email, role);
    println!("avatar: {}", profile.avatar);
    match role {
        Role::Freelancer => {
            println!("title: {}", profile.title.unwrap_or_default());
            println!("rate: ${}/hr", profile.hourly_rate.unwrap_or_default());
            let skills = profile.skills.unwrap_or_default();
            if !skills.is_empty() {
                println!("skills: {}", skills.into_iter().collect::<Vec<_>>().join(", "));
            }
            let gate = app.gate(&id).await?;
            println!("{}", plan_banner(&gate));
        }
        Role::Client => {
            println!("company: {}", profile.company.unwrap_or_default());
        }
    }
    if let Some(location) = profile.location {
        println!("location: {}", location);
    }
    if let Some(bio) = profile.bio {
        println!("\n{}", bio);
    }
    Ok(())
}

pub async fn edit_profile(app: &App, patch: ProfilePatch) -> Result<()> {
    let (id, _) = app.require_any_dashboard()?;
    if patch.is_empty() {
        bail!("Nothing to change; pass at least one field");
    }
    app.profiles.update(&id, &patch).await?;
    println!("\x1b[32m✓\x1b[0m Profile updated");
    Ok(())
}

pub fn parse_skills(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn list_messages(app: &App) -> Result<()> {
    let (id, _) = app.require_any_dashboard()?;
    let conversations: Vec<Conversation> = app.collections.fetch(Collection::Messages).await?;
    let mine: Vec<_> = conversations
        .iter()
        .filter(|c| c.participants.iter().any(|p| p == &id))
        .collect();

    if mine.is_empty() {
        println!("No conversations yet.");
    }
    for conversation in mine {
        println!(
            "{}  [{}]  {}",
            conversation.timestamp.format("%Y-%m-%d %H:%M"),
            conversation.participants.join(", "),
            conversation.last_message
        );
    }
    Ok(())
}

// ============================================================================
// Client
// ============================================================================

pub struct JobDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub budget: u32,
    pub days: i64,
    pub skills: Vec<String>,
}

pub async fn post_job(app: &App, draft: JobDraft) -> Result<()> {
    let id = app.require_dashboard(Role::Client)?;
    if !CATEGORIES[1..].contains(&draft.category.as_str()) {
        bail!(
            "Unknown category {:?}; pick one of: {}",
            draft.category,
            CATEGORIES[1..].join(", ")
        );
    }

    let now = Utc::now();
    let job = Job {
        id: format!("job_{}", Uuid::new_v4().simple()),
        client_id: id,
        title: draft.title,
        description: draft.description,
        category: draft.category,
        budget: draft.budget,
        deadline: now + Duration::days(draft.days),
        skills_required: draft.skills,
        status: JobStatus::Open,
        posted_at: now,
        applicants: 0,
    };

    let mut jobs: Vec<Job> = app.collections.fetch(Collection::Jobs).await?;
    jobs.push(job.clone());
    app.collections.store(Collection::Jobs, &jobs).await?;

    println!("\x1b[32m✓\x1b[0m Posted {} \"{}\"", job.id, job.title);
    Ok(())
}

pub async fn list_proposals(app: &App) -> Result<()> {
    app.require_dashboard(Role::Client)?;
    let proposals: Vec<Proposal> = app.collections.fetch(Collection::Proposals).await?;

    if proposals.is_empty() {
        println!("No proposals yet.");
    }
    for p in &proposals {
        println!(
            "\x1b[1m{}\x1b[0m  {} -> {}  ${} / {} days  [{:?}]",
            p.id, p.freelancer_name, p.job_title, p.proposed_budget, p.timeline, p.status
        );
        println!("    {}", p.cover_letter);
    }
    Ok(())
}

pub async fn review(app: &App, proposal_id: &str, status: ProposalStatus) -> Result<()> {
    app.require_dashboard(Role::Client)?;
    if status == ProposalStatus::Pending {
        bail!("A review must accept or reject");
    }

    let mut proposals: Vec<Proposal> = app.collections.fetch(Collection::Proposals).await?;
    let proposal = proposals
        .iter_mut()
        .find(|p| p.id == proposal_id)
        .ok_or_else(|| anyhow!("No proposal with id {}", proposal_id))?;
    proposal.status = status;
    app.collections.store(Collection::Proposals, &proposals).await?;

    println!("\x1b[32m✓\x1b[0m {} marked {:?}", proposal_id, status);
    Ok(())
}
