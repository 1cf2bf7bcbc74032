use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};

use admitdesk_core::api::{ApiClient, Backend, FailureKind, FileUpload};
use admitdesk_core::auth::{CredentialStore, Session};
use admitdesk_core::cache::{QueryCache, QueryKey, Resource, ResourcePayload};
use admitdesk_core::config::Config;
use admitdesk_core::draft::{
    validate_all, ApplicationDraft, Attachment, AttachmentSlot, Document, DraftError,
    EducationInfo, FileDraftStore, Guardian, Olympic, Step, UploadOutcome, Wizard,
};
use admitdesk_core::models::{total_pages, NewExamSubject, Page};
use admitdesk_core::mutation::{Mutation, MutationDispatcher, MutationOutcome};
use admitdesk_core::notify::{Notification, NotificationLevel, Notifier};
use admitdesk_core::stats::{format_percentage, DashboardSummary, RegionFilter};
use admitdesk_core::utils::{format_timestamp, truncate_string};

use crate::Command;

/// Prints notifications as they arrive.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => println!("✓ {}", notification.message),
            NotificationLevel::Info => println!("{}", notification.message),
            NotificationLevel::Error => eprintln!("✗ {}", notification.message),
        }
    }
}

pub async fn run(command: Command) -> Result<()> {
    let mut config = Config::load()?;

    match command {
        Command::Help => Ok(()),
        Command::Login { username, remember } => login(&mut config, &username, remember).await,
        Command::Logout => logout(&config),
        Command::Applications { page, search } => {
            let key = QueryKey::page(Resource::Applications, page).with_filter(search.as_deref());
            let payload = read(&config, key).await?;
            let applications = payload
                .as_applications()
                .context("Unexpected payload for applications")?;
            print_page_header("Applications", applications, config.page_size);
            for app in &applications.results {
                println!(
                    "{:>6}  {:<32}  {:<14}  {:<12}  {:<16}  {}",
                    app.id,
                    truncate_string(&app.full_name(), 32),
                    app.phone,
                    app.status.display_name(),
                    truncate_string(&app.region, 16),
                    format_timestamp(app.created_at.as_ref()),
                );
            }
            Ok(())
        }
        Command::SetStatus { id, status } => {
            let receipt = mutate(&config, Mutation::SetApplicationStatus { id, status }).await?;
            if let MutationOutcome::Application(app) = receipt {
                println!("{} is now {}", app.full_name(), app.status.display_name());
            }
            Ok(())
        }
        Command::Subjects { page } => {
            let payload = read(&config, QueryKey::page(Resource::ExamSubjects, page)).await?;
            let subjects = payload
                .as_exam_subjects()
                .context("Unexpected payload for exam subjects")?;
            print_page_header("Exam subjects", subjects, config.page_size);
            for subject in &subjects.results {
                let max = subject
                    .max_score
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:>6}  {:<40}  {}", subject.id, subject.name, max);
            }
            Ok(())
        }
        Command::AddSubject { name, max_score } => {
            mutate(
                &config,
                Mutation::CreateExamSubject(NewExamSubject { name, max_score }),
            )
            .await?;
            Ok(())
        }
        Command::Staff { page } => {
            let payload = read(&config, QueryKey::page(Resource::Staff, page)).await?;
            let staff = payload.as_staff().context("Unexpected payload for staff")?;
            print_page_header("Staff", staff, config.page_size);
            for member in &staff.results {
                println!(
                    "{:>6}  {:<32}  {:<16}  {}",
                    member.id,
                    truncate_string(&member.full_name, 32),
                    member.role,
                    member.phone.as_deref().unwrap_or("-"),
                );
            }
            Ok(())
        }
        Command::Places { admission_id, page } => {
            let key = QueryKey::page(Resource::Places { admission_id }, page);
            let payload = read(&config, key).await?;
            let places = payload.as_places().context("Unexpected payload for places")?;
            print_page_header("Places", places, config.page_size);
            for place in &places.results {
                println!(
                    "{:<40}  {:>5} / {:<5}  {} left",
                    truncate_string(&place.major, 40),
                    place.filled,
                    place.quota,
                    place.remaining(),
                );
            }
            Ok(())
        }
        Command::Stats { region } => {
            let payload = read(&config, QueryKey::new(Resource::Statistics)).await?;
            let stats = payload
                .as_statistics()
                .context("Unexpected payload for statistics")?;
            let filter = RegionFilter::from_selection(region.as_deref());
            if let RegionFilter::Only(ref name) = filter {
                if !stats.regions.contains(name) {
                    bail!("Unknown region '{}'", name);
                }
            }
            print_dashboard(&DashboardSummary::build(stats, &filter));
            Ok(())
        }
        Command::DraftShow => {
            let wizard = open_draft(&config)?;
            print_draft(&wizard);
            Ok(())
        }
        Command::DraftAddEducation { school, gpa, year } => edit_draft(&config, |draft| {
            draft.education.push(EducationInfo {
                school_name: school,
                school_gpa: gpa,
                graduation_year: year,
                certificate: Attachment::Unattached,
            });
            format!("Added school #{}", draft.education.len() - 1)
        }),
        Command::DraftAddGuardian {
            full_name,
            relation,
            phone,
        } => edit_draft(&config, |draft| {
            draft.guardians.push(Guardian {
                full_name,
                relation,
                phone,
            });
            format!("Added guardian #{}", draft.guardians.len() - 1)
        }),
        Command::DraftAddOlympic { subject, place, year } => edit_draft(&config, |draft| {
            draft.olympics.push(Olympic {
                subject,
                place,
                year,
                certificate: Attachment::Unattached,
            });
            format!("Added olympiad #{}", draft.olympics.len() - 1)
        }),
        Command::DraftAddDocument { kind } => edit_draft(&config, |draft| {
            draft.documents.push(Document {
                kind,
                file: Attachment::Unattached,
            });
            format!("Added document #{}", draft.documents.len() - 1)
        }),
        Command::DraftNext => {
            let mut wizard = open_draft(&config)?;
            let current = wizard.step();
            match wizard.next() {
                Ok(step) => {
                    println!("{} saved, now at {}", current, step);
                    Ok(())
                }
                Err(DraftError::Invalid(errors)) => {
                    for error in &errors {
                        eprintln!("  {}", error);
                    }
                    bail!("{} is not complete yet", current)
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::DraftAttach { slot, path } => attach(&config, slot, Path::new(&path)).await,
        Command::DraftSubmit => submit(&config).await,
        Command::DraftClear => {
            let mut wizard = open_draft(&config)?;
            wizard.abandon()?;
            println!("Draft cleared");
            Ok(())
        }
    }
}

async fn login(config: &mut Config, username: &str, remember: bool) -> Result<()> {
    let client = ApiClient::new(&config.api_base_url, config.request_timeout_secs)?;

    let remembered = CredentialStore::has_credentials(username);
    let password = if remembered {
        CredentialStore::get_password(username)?
    } else {
        rpassword::prompt_password("Password: ").context("Failed to read password")?
    };

    let tokens = match client.login(username, &password).await {
        Ok(tokens) => tokens,
        Err(e) => {
            if remembered && e.kind() == FailureKind::Auth {
                // The stored password is no longer valid
                CredentialStore::delete(username)?;
            }
            bail!("Login failed: {}", e.kind().user_message());
        }
    };

    if remember && !remembered {
        if let Err(e) = CredentialStore::store(username, &password) {
            warn!(error = %e, "Could not remember password");
        }
    }

    let mut session = Session::new(config.cache_dir()?);
    session.update(tokens);
    session.save()?;

    config.last_username = Some(username.to_string());
    config.save()?;
    println!("Logged in as {}", username);
    Ok(())
}

fn logout(config: &Config) -> Result<()> {
    let mut session = Session::new(config.cache_dir()?);
    if let Err(e) = session.load() {
        debug!(error = %e, "Ignoring unreadable session file");
    }
    let username = session
        .data
        .as_ref()
        .map(|d| d.username.clone())
        .or_else(|| config.last_username.clone());
    if let Some(username) = username {
        CredentialStore::delete(&username)?;
    }
    session.clear()?;
    println!("Logged out");
    Ok(())
}

/// API client carrying a valid access token, refreshing it first when due.
async fn connect(config: &Config) -> Result<ApiClient> {
    let mut session = Session::new(config.cache_dir()?);
    session.load()?;
    let tokens = session
        .require_login()
        .map_err(|_| anyhow!("Not logged in. Run `admitdesk login <username>` first."))?
        .clone();

    let client = ApiClient::new(&config.api_base_url, config.request_timeout_secs)?;
    if !tokens.needs_refresh() {
        return Ok(client.with_token(tokens.access));
    }

    match client.refresh_access(&tokens.refresh).await {
        Ok(access) => {
            debug!("Access token refreshed");
            session.set_access(access.clone());
            session.save()?;
            Ok(client.with_token(access))
        }
        Err(e) if e.kind() == FailureKind::Auth => {
            session.clear()?;
            bail!("Session expired. Run `admitdesk login <username>` again.")
        }
        Err(e) => Err(e).context("Failed to refresh access token"),
    }
}

async fn read(config: &Config, key: QueryKey) -> Result<Arc<ResourcePayload>> {
    let backend: Arc<dyn Backend> = Arc::new(connect(config).await?);
    let cache = QueryCache::new(backend, config.stale_after());
    let entry = cache.fetch(&key).await;
    if let Some(failure) = entry.error {
        bail!("{} ({})", failure.kind.user_message(), failure.message);
    }
    entry
        .data
        .ok_or_else(|| anyhow!("No data returned for {}", key))
}

async fn mutate(config: &Config, mutation: Mutation) -> Result<MutationOutcome> {
    let backend: Arc<dyn Backend> = Arc::new(connect(config).await?);
    let cache = QueryCache::new(backend.clone(), config.stale_after());
    let dispatcher = MutationDispatcher::new(backend, cache, Arc::new(ConsoleNotifier));
    // The notifier already reported the failure
    dispatcher
        .mutate(mutation)
        .await
        .map_err(|e| anyhow!("{}", e.0.message))
}

fn open_draft(config: &Config) -> Result<Wizard<FileDraftStore>> {
    let store = FileDraftStore::new(config.drafts_dir()?)?;
    Ok(Wizard::resume(store)?)
}

/// Apply `edit` to the stored draft and write it back.
fn edit_draft(config: &Config, edit: impl FnOnce(&mut ApplicationDraft) -> String) -> Result<()> {
    let mut wizard = open_draft(config)?;
    let message = edit(wizard.draft_mut());
    wizard.persist()?;
    println!("{}", message);
    Ok(())
}

async fn attach(config: &Config, slot: AttachmentSlot, path: &Path) -> Result<()> {
    let upload = FileUpload::from_path(path)?;
    let client = connect(config).await?;
    let mut wizard = open_draft(config)?;

    match wizard.attach(&client, slot, upload).await? {
        UploadOutcome::Attached => {
            wizard.persist()?;
            println!("Attached {}", path.display());
        }
        UploadOutcome::Failed(failure) => bail!("Upload failed: {}", failure.kind.user_message()),
        UploadOutcome::Discarded => bail!("Upload result was discarded"),
    }
    Ok(())
}

async fn submit(config: &Config) -> Result<()> {
    let client = connect(config).await?;
    let mut wizard = open_draft(config)?;

    match wizard.submit(&client).await {
        Ok(receipt) => {
            println!("Application #{} submitted", receipt.id);
            Ok(())
        }
        Err(DraftError::NotAtReview) => {
            print_draft(&wizard);
            bail!("Complete every step before submitting")
        }
        Err(DraftError::Invalid(errors)) => {
            for error in &errors {
                eprintln!("  {}", error);
            }
            bail!("The application has {} problem(s)", errors.len())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_page_header<T>(title: &str, page: &Page<T>, page_size: u32) {
    println!(
        "{} (page {} of {}, {} total)",
        title,
        page.current_page,
        page_count(page, page_size).max(1),
        page.count
    );
}

/// Pages in the listing. Falls back to the configured page size when the
/// server leaves `total_pages` out, and warns when the envelope disagrees
/// with it.
fn page_count<T>(page: &Page<T>, page_size: u32) -> u32 {
    if page.total_pages == 0 {
        return total_pages(page.count, page_size);
    }
    if !page.is_well_formed(page_size) {
        warn!(
            count = page.count,
            total_pages = page.total_pages,
            results = page.results.len(),
            page_size,
            "Page does not match the configured page size"
        );
    }
    page.total_pages
}

fn print_dashboard(summary: &DashboardSummary) {
    println!("Statistics: {}", summary.filter.label());
    println!("  Applications  {}", summary.total_applications);
    println!(
        "  Accepted      {} ({}%)",
        summary.total_accepted,
        format_percentage(summary.acceptance_rate)
    );
    println!("  Rejected      {}", summary.total_rejected);
    println!(
        "  Gender        {} male ({}%), {} female ({}%)",
        summary.gender.male,
        format_percentage(summary.gender.male_percentage),
        summary.gender.female,
        format_percentage(summary.gender.female_percentage),
    );

    println!("\nBy region");
    for (region, count) in &summary.applications_by_region {
        println!("  {:<24} {}", region, count);
    }

    println!("\nBy status");
    for share in &summary.statuses {
        println!(
            "  {:<24} {:>6} {:>7}%",
            share.status.display_name(),
            share.count,
            format_percentage(share.percentage)
        );
    }
}

fn print_draft(wizard: &Wizard<FileDraftStore>) {
    let draft = wizard.draft();
    println!("Current step: {}", wizard.step());
    for step in Step::ALL {
        let count = match step {
            Step::Education => draft.education.len(),
            Step::Guardians => draft.guardians.len(),
            Step::Olympics => draft.olympics.len(),
            Step::Documents => draft.documents.len(),
            Step::Review => 0,
        };
        let mark = if wizard.is_validated(step) { "✓" } else { " " };
        println!("  [{}] {:<12} {} record(s)", mark, step.title(), count);
    }

    let errors = validate_all(draft, wizard.max_year());
    if !errors.is_empty() {
        println!("\nStill missing:");
        for error in errors {
            println!("  {}", error);
        }
    }
}
